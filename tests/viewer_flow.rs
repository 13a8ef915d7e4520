//! End-to-end viewer scenarios against the fake engine.

use std::sync::Arc;
use std::time::Duration;

use scoreview::controller::{ByteSource, KeyInput, ViewerController};
use scoreview::pdf::{DocumentEngine, EngineDocument, EngineError, ViewportBox};
use scoreview::test_utils::{
    FailingResolver, FakeEngine, StaticResolver, init_test_logging, page_track,
    sample_document_bytes, visible_marker,
};
use scoreview::{Tool, ViewerError, ViewerPhase};

const SETTLE: Duration = Duration::from_secs(5);

fn viewer_with(engine: FakeEngine) -> ViewerController {
    init_test_logging();
    let mut viewer = ViewerController::new(Arc::new(engine));
    viewer.set_viewport(ViewportBox::new(800, 600));
    viewer
}

fn loaded_viewer(pages: u32) -> ViewerController {
    let mut viewer = viewer_with(FakeEngine::new(pages));
    viewer.load_bytes(sample_document_bytes(0xAA));
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.phase(), &ViewerPhase::Ready);
    viewer
}

fn draw_stroke(viewer: &mut ViewerController, from: (f32, f32), to: (f32, f32)) {
    let layer = viewer.annotations_mut();
    layer.pointer_down(from);
    layer.pointer_move(to);
    layer.pointer_up();
}

#[test]
fn load_renders_first_page() {
    let viewer = loaded_viewer(10);
    assert_eq!(viewer.page(), 1);
    assert_eq!(viewer.page_count(), 10);
    let data = viewer.current_page_data().unwrap();
    assert_eq!(data.page, 1);
    assert!(data.pixels.width > 0);
}

#[test]
fn out_of_range_navigation_leaves_page_unchanged() {
    let mut viewer = loaded_viewer(10);
    viewer.go_to_page(5);
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.page(), 5);

    viewer.go_to_page(0);
    viewer.go_to_page(11);
    viewer.go_to_page(u32::MAX);
    assert_eq!(viewer.page(), 5);
    assert_eq!(viewer.phase(), &ViewerPhase::Ready);
}

#[test]
fn zoom_is_clamped_and_snapped() {
    let mut viewer = loaded_viewer(3);

    viewer.set_zoom(2.6);
    assert_eq!(viewer.zoom_factor(), 2.5);
    viewer.set_zoom(9.0);
    assert_eq!(viewer.zoom_factor(), 3.0);
    viewer.set_zoom(0.1);
    assert_eq!(viewer.zoom_factor(), 0.5);
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.phase(), &ViewerPhase::Ready);
}

#[test]
fn keyboard_navigation_and_zoom() {
    let mut viewer = loaded_viewer(4);

    viewer.handle_key(KeyInput::ArrowRight);
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.page(), 2);

    viewer.handle_key(KeyInput::End);
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.page(), 4);

    viewer.handle_key(KeyInput::Home);
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.page(), 1);

    viewer.handle_key(KeyInput::Minus);
    assert_eq!(viewer.zoom_factor(), 0.75);
}

#[test]
fn eraser_never_touches_the_primary_surface() {
    let mut viewer = loaded_viewer(3);
    let before = viewer.current_page_data().unwrap().pixels.data.clone();

    viewer.annotations_mut().set_tool(Tool::Pencil);
    draw_stroke(&mut viewer, (20.0, 20.0), (200.0, 200.0));
    viewer.annotations_mut().set_tool(Tool::Eraser);
    draw_stroke(&mut viewer, (20.0, 20.0), (200.0, 200.0));
    draw_stroke(&mut viewer, (50.0, 180.0), (180.0, 40.0));

    let after = &viewer.current_page_data().unwrap().pixels.data;
    assert_eq!(&before, after, "page content must be byte-identical");
}

#[test]
fn page_switch_roundtrip_restores_annotations_exactly() {
    let mut viewer = loaded_viewer(6);
    viewer.go_to_page(2);
    assert!(viewer.pump_until_settled(SETTLE));

    draw_stroke(&mut viewer, (30.0, 30.0), (120.0, 90.0));
    let drawn = viewer.annotations().surface().pixels().to_vec();

    viewer.go_to_page(3);
    assert!(viewer.pump_until_settled(SETTLE));
    assert!(
        viewer.annotations().surface().pixels().iter().all(|&b| b == 0),
        "page 3 starts blank"
    );

    viewer.go_to_page(2);
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.annotations().surface().pixels(), drawn.as_slice());
}

#[test]
fn draw_then_undo_leaves_no_history_entry() {
    // Load a 10-page document, go to page 5, zoom, draw one pencil stroke,
    // undo: the history for page 5 must have no entry at all.
    let mut viewer = loaded_viewer(10);
    viewer.go_to_page(5);
    assert!(viewer.pump_until_settled(SETTLE));
    viewer.set_zoom(1.25);
    assert!(viewer.pump_until_settled(SETTLE));

    viewer.annotations_mut().set_tool(Tool::Pencil);
    draw_stroke(&mut viewer, (40.0, 40.0), (90.0, 140.0));
    assert_eq!(viewer.annotations().history_len(5), 1);

    viewer.handle_key(KeyInput::KeyU);
    assert_eq!(viewer.annotations().history_len(5), 0);
    assert!(!viewer.annotations().has_history(5));
}

#[test]
fn short_buffer_yields_validation_error_without_reaching_the_decoder() {
    struct Unreachable;
    impl DocumentEngine for Unreachable {
        fn open(&self, _bytes: &[u8]) -> Result<Box<dyn EngineDocument>, EngineError> {
            panic!("decoder must not see invalid bytes");
        }
    }

    init_test_logging();
    let mut viewer = ViewerController::new(Arc::new(Unreachable));
    viewer.set_viewport(ViewportBox::new(800, 600));
    viewer.load_bytes(vec![0u8; 64]);

    assert_eq!(
        viewer.phase(),
        &ViewerPhase::Error(ViewerError::TooSmall { len: 64 })
    );
}

#[test]
fn bad_signature_reports_invalid_header() {
    let mut viewer = viewer_with(FakeEngine::new(3));
    let mut bytes = sample_document_bytes(0xAA);
    bytes[..5].copy_from_slice(b"OOPS!");
    viewer.load_bytes(bytes);

    match viewer.phase() {
        ViewerPhase::Error(err) => assert_eq!(err.to_string(), "Invalid header"),
        other => panic!("expected error phase, got {other:?}"),
    }
    assert_eq!(
        viewer.notifications().current().unwrap().message,
        "Invalid header"
    );
}

#[test]
fn second_document_wins_over_a_slow_first_render() {
    let mut viewer = viewer_with(FakeEngine::new(3).with_paint_delay(Duration::from_millis(150)));

    viewer.load_bytes(sample_document_bytes(0xAA));
    // Do not wait: supersede the first document while its page still paints.
    viewer.load_bytes(sample_document_bytes(0xBB));

    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.phase(), &ViewerPhase::Ready);
    let marker = visible_marker(&viewer.current_page_data().unwrap().pixels);
    assert_eq!(marker, 0xBB, "only the second document may be visible");

    // Even after the stale paint finally completes, nothing flips back.
    std::thread::sleep(Duration::from_millis(250));
    viewer.poll();
    let marker = visible_marker(&viewer.current_page_data().unwrap().pixels);
    assert_eq!(marker, 0xBB);
}

#[test]
fn failing_page_escalates_and_retry_recovers() {
    let mut viewer = viewer_with(FakeEngine::new(5).with_failing_page(3));
    viewer.load_bytes(sample_document_bytes(0xAA));
    assert!(viewer.pump_until_settled(SETTLE));

    draw_stroke(&mut viewer, (10.0, 10.0), (60.0, 60.0));
    viewer.go_to_page(3);
    assert!(viewer.pump_until_settled(SETTLE));
    assert!(matches!(
        viewer.phase(),
        ViewerPhase::Error(ViewerError::Render { page: 3, .. })
    ));

    viewer.retry();
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.phase(), &ViewerPhase::Ready);
    assert_eq!(viewer.page(), 1);
    assert!(
        !viewer.annotations().has_history(1),
        "retry resets annotation state"
    );
}

#[test]
fn audio_selection_follows_the_page() {
    let mut viewer = loaded_viewer(6);
    viewer.set_url_resolver(Arc::new(StaticResolver));
    viewer.set_tracks(vec![
        page_track("intro", 1, 30.0),
        page_track("etude-a", 4, 120.0),
        page_track("etude-b", 4, 95.0),
    ]);
    viewer.poll();

    assert_eq!(viewer.audio().selected_track().unwrap().id, "intro");
    assert!(
        viewer
            .audio()
            .playable_url()
            .unwrap()
            .contains("audio/intro.mp3")
    );

    viewer.go_to_page(4);
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.audio().selected_track().unwrap().id, "etude-a");
    assert_eq!(viewer.audio().page_tracks().count(), 2);

    viewer.go_to_page(2);
    assert!(viewer.pump_until_settled(SETTLE));
    assert!(viewer.audio().selected_track().is_none());
    assert!(!viewer.audio().is_playing());
}

#[test]
fn audio_failure_never_blocks_document_viewing() {
    let mut viewer = loaded_viewer(3);
    viewer.set_url_resolver(Arc::new(FailingResolver));
    viewer.set_tracks(vec![page_track("solo", 1, 60.0)]);
    viewer.poll();

    assert!(viewer.audio().playable_url().is_none());
    assert_eq!(viewer.phase(), &ViewerPhase::Ready);

    viewer.go_to_page(2);
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.phase(), &ViewerPhase::Ready);
}

#[test]
fn degenerate_viewport_defers_paint_until_layout() {
    init_test_logging();
    let mut viewer = ViewerController::new(Arc::new(FakeEngine::new(2)));
    // No viewport yet: the container has not been laid out.
    viewer.load_bytes(sample_document_bytes(0xAA));
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.phase(), &ViewerPhase::Rendering);
    assert!(viewer.current_page_data().is_none());

    viewer.set_viewport(ViewportBox::new(800, 600));
    assert!(viewer.pump_until_settled(SETTLE));
    assert_eq!(viewer.phase(), &ViewerPhase::Ready);
    assert!(viewer.current_page_data().is_some());
}

#[test]
fn close_releases_everything() {
    let mut viewer = loaded_viewer(3);
    viewer.set_url_resolver(Arc::new(StaticResolver));
    viewer.set_tracks(vec![page_track("solo", 1, 60.0)]);
    viewer.poll();
    draw_stroke(&mut viewer, (10.0, 10.0), (50.0, 50.0));

    viewer.close();
    assert_eq!(viewer.phase(), &ViewerPhase::Idle);
    assert!(viewer.current_page_data().is_none());
    assert!(viewer.document_id().is_none());
    assert!(!viewer.annotations().has_history(1));
    assert!(viewer.audio().playable_url().is_none());
}

#[test]
fn storage_path_enables_diagnostics() {
    use scoreview::diagnostics::ProbeReport;
    use scoreview::test_utils::StaticProbe;

    struct PathSource(Vec<u8>);
    impl ByteSource for PathSource {
        fn fetch(&self) -> anyhow::Result<Arc<[u8]>> {
            Ok(Arc::from(self.0.clone().into_boxed_slice()))
        }
        fn storage_path(&self) -> Option<&str> {
            Some("scores/nocturne.pdf")
        }
    }

    let mut viewer = viewer_with(FakeEngine::new(2));
    let mut bytes = sample_document_bytes(0xAA);
    bytes[..5].copy_from_slice(b"OOPS!");
    viewer.load_document(Box::new(PathSource(bytes)));
    assert!(matches!(viewer.phase(), ViewerPhase::Error(_)));

    let probe = StaticProbe(ProbeReport {
        http_status: Some(200),
        signature_ok: Some(false),
        ..ProbeReport::default()
    });
    let report = viewer.run_diagnostics(&probe).unwrap().unwrap();
    assert_eq!(report.signature_ok, Some(false));
    assert!(
        report
            .render_lines()
            .contains(&"Signature: FAILED".to_string())
    );
}
