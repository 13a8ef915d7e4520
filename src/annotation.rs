//! Freehand annotation overlay
//!
//! A transparent surface kept pixel-matched to the rendered page. Strokes
//! are captured from pointer input, composited per tool, and committed as
//! full-surface snapshots into a per-page undo history. The history map is
//! owned here, keyed by page number, and never survives a document switch.

use std::collections::HashMap;

use log::debug;

use crate::surface::{Blend, Snapshot, StrokeMask, Surface};

/// Drawing tool. Each tool carries fixed color/width/blend semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Pencil,
    Highlighter,
    Eraser,
}

/// Fixed paint parameters for a tool
#[derive(Clone, Copy, Debug)]
struct ToolPaint {
    rgb: [u8; 3],
    alpha: f32,
    width: f32,
    blend: Blend,
}

impl Tool {
    fn paint(self) -> ToolPaint {
        match self {
            // Solid ink, paints over.
            Tool::Pencil => ToolPaint {
                rgb: [0x1D, 0x4E, 0xD8],
                alpha: 1.0,
                width: 3.0,
                blend: Blend::Normal,
            },
            // Wide translucent marker; multiply keeps content legible.
            Tool::Highlighter => ToolPaint {
                rgb: [0xFA, 0xCC, 0x15],
                alpha: 0.4,
                width: 18.0,
                blend: Blend::Multiply,
            },
            // Removes overlay pixels only; the page surface is a separate
            // buffer and is never touched.
            Tool::Eraser => ToolPaint {
                rgb: [0, 0, 0],
                alpha: 1.0,
                width: 14.0,
                blend: Blend::Erase,
            },
        }
    }
}

/// Client-space box the surface is displayed in (CSS pixels).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

struct ActiveStroke {
    last: (f32, f32),
    mask: StrokeMask,
    tool: Tool,
    drew: bool,
}

/// The annotation overlay and its per-page undo history.
///
/// Invariant: a page either has at least one snapshot in `history` or no
/// entry at all; empty lists are never left behind.
pub struct AnnotationLayer {
    surface: Surface,
    history: HashMap<u32, Vec<Snapshot>>,
    active: Option<ActiveStroke>,
    page: u32,
    tool: Tool,
}

impl Default for AnnotationLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationLayer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            surface: Surface::new(1, 1),
            history: HashMap::new(),
            active: None,
            page: 1,
            tool: Tool::default(),
        }
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Number of snapshots recorded for a page (0 when it has no entry).
    #[must_use]
    pub fn history_len(&self, page: u32) -> usize {
        self.history.get(&page).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn has_history(&self, page: u32) -> bool {
        self.history.contains_key(&page)
    }

    /// Match the overlay to a freshly painted page and restore that page's
    /// latest snapshot.
    ///
    /// When the stored snapshot no longer matches the backing dimensions
    /// (zoom or viewport changed since it was taken) the page's history is
    /// dropped and annotation restarts blank for it. Known limitation: no
    /// scale-preserving redraw is attempted.
    pub fn sync_to_page(&mut self, page: u32, width: u32, height: u32) {
        self.active = None;
        self.page = page;
        self.surface.resize(width, height);

        let Some(stack) = self.history.get(&page) else {
            return;
        };
        let restored = stack
            .last()
            .is_some_and(|snapshot| self.surface.restore(snapshot));
        if !restored {
            debug!("dropping annotation history for page {page}: surface is now {width}x{height}");
            self.history.remove(&page);
            self.surface.clear();
        }
    }

    /// Transform client coordinates into surface pixel space using the
    /// bounding-box-to-backing-resolution ratio. Returns None while the
    /// display box is degenerate.
    #[must_use]
    pub fn map_to_surface(&self, client: (f32, f32), display: DisplayBox) -> Option<(f32, f32)> {
        if display.width <= 0.0 || display.height <= 0.0 {
            return None;
        }
        let sx = self.surface.width() as f32 / display.width;
        let sy = self.surface.height() as f32 / display.height;
        Some(((client.0 - display.x) * sx, (client.1 - display.y) * sy))
    }

    /// Begin a stroke at a surface-space point.
    pub fn pointer_down(&mut self, pos: (f32, f32)) {
        self.active = Some(ActiveStroke {
            last: pos,
            mask: self.surface.fresh_mask(),
            tool: self.tool,
            drew: false,
        });
    }

    /// Extend the active stroke. Draws a continuous segment from the last
    /// point so fast pointer motion never leaves gaps.
    pub fn pointer_move(&mut self, pos: (f32, f32)) {
        let Some(stroke) = self.active.as_mut() else {
            return;
        };
        let paint = stroke.tool.paint();
        let from = stroke.last;
        stroke.last = pos;
        stroke.drew = true;
        self.surface.stroke_segment(
            from,
            pos,
            paint.width,
            paint.rgb,
            paint.alpha,
            paint.blend,
            &mut stroke.mask,
        );
    }

    /// End the active stroke (pointer up, leave, or cancel) and commit a
    /// full-surface snapshot to the page's history.
    ///
    /// A tap without motion leaves no mark and records nothing.
    pub fn pointer_up(&mut self) {
        let Some(stroke) = self.active.take() else {
            return;
        };
        if !stroke.drew {
            return;
        }
        let snapshot = self.surface.snapshot();
        self.history.entry(self.page).or_default().push(snapshot);
    }

    /// Pop the most recent snapshot for the current page and repaint from
    /// the new top. When the stack empties, the page's entry is removed
    /// entirely and the surface cleared.
    pub fn undo(&mut self) -> bool {
        self.active = None;
        let Some(stack) = self.history.get_mut(&self.page) else {
            return false;
        };
        stack.pop();
        let top = stack.last().cloned();

        match top {
            Some(snapshot) => {
                self.surface.restore(&snapshot);
            }
            None => {
                self.history.remove(&self.page);
                self.surface.clear();
            }
        }
        true
    }

    /// Remove all annotation for the current page.
    pub fn clear_page(&mut self) {
        self.active = None;
        self.history.remove(&self.page);
        self.surface.clear();
    }

    /// Drop everything. Called when the document changes; history is keyed
    /// per document and never shared across them.
    pub fn reset(&mut self) {
        self.active = None;
        self.history.clear();
        self.surface.clear();
        self.page = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_stroke(layer: &mut AnnotationLayer, from: (f32, f32), to: (f32, f32)) {
        layer.pointer_down(from);
        layer.pointer_move(to);
        layer.pointer_up();
    }

    fn layer_200() -> AnnotationLayer {
        let mut layer = AnnotationLayer::new();
        layer.sync_to_page(1, 200, 200);
        layer
    }

    #[test]
    fn stroke_commits_one_snapshot() {
        let mut layer = layer_200();
        draw_stroke(&mut layer, (10.0, 10.0), (50.0, 50.0));
        assert_eq!(layer.history_len(1), 1);
    }

    #[test]
    fn undo_to_empty_removes_the_entry() {
        let mut layer = layer_200();
        draw_stroke(&mut layer, (10.0, 10.0), (50.0, 50.0));
        draw_stroke(&mut layer, (60.0, 60.0), (90.0, 90.0));
        assert_eq!(layer.history_len(1), 2);

        assert!(layer.undo());
        assert_eq!(layer.history_len(1), 1);
        assert!(layer.has_history(1));

        assert!(layer.undo());
        assert!(!layer.has_history(1), "empty-but-present list is forbidden");
        assert!(layer.surface().pixels().iter().all(|&b| b == 0));

        assert!(!layer.undo());
    }

    #[test]
    fn undo_restores_previous_snapshot_exactly() {
        let mut layer = layer_200();
        draw_stroke(&mut layer, (10.0, 10.0), (50.0, 50.0));
        let after_first = layer.surface().pixels().to_vec();

        draw_stroke(&mut layer, (100.0, 100.0), (150.0, 150.0));
        assert_ne!(layer.surface().pixels(), after_first.as_slice());

        layer.undo();
        assert_eq!(layer.surface().pixels(), after_first.as_slice());
    }

    #[test]
    fn page_switch_roundtrip_restores_pixels() {
        let mut layer = layer_200();
        draw_stroke(&mut layer, (10.0, 10.0), (50.0, 50.0));
        let page1_pixels = layer.surface().pixels().to_vec();

        layer.sync_to_page(2, 200, 200);
        assert!(layer.surface().pixels().iter().all(|&b| b == 0));
        assert!(layer.has_history(1), "switching away preserves history");

        layer.sync_to_page(1, 200, 200);
        assert_eq!(layer.surface().pixels(), page1_pixels.as_slice());
    }

    #[test]
    fn dimension_change_drops_page_history() {
        let mut layer = layer_200();
        draw_stroke(&mut layer, (10.0, 10.0), (50.0, 50.0));

        // Zoom changed: the page comes back at a different backing size.
        layer.sync_to_page(1, 250, 250);
        assert!(!layer.has_history(1));
        assert!(layer.surface().pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn tap_without_motion_records_nothing() {
        let mut layer = layer_200();
        layer.pointer_down((20.0, 20.0));
        layer.pointer_up();
        assert!(!layer.has_history(1));
    }

    #[test]
    fn clear_page_removes_entry_and_pixels() {
        let mut layer = layer_200();
        draw_stroke(&mut layer, (10.0, 10.0), (50.0, 50.0));
        layer.clear_page();
        assert!(!layer.has_history(1));
        assert!(layer.surface().pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn coordinate_mapping_accounts_for_css_scaling() {
        let mut layer = AnnotationLayer::new();
        layer.sync_to_page(1, 400, 400);

        // Displayed at half the backing resolution, offset by (10, 20).
        let display = DisplayBox {
            x: 10.0,
            y: 20.0,
            width: 200.0,
            height: 200.0,
        };
        let mapped = layer.map_to_surface((110.0, 120.0), display).unwrap();
        assert_eq!(mapped, (200.0, 200.0));

        let degenerate = DisplayBox {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 100.0,
        };
        assert!(layer.map_to_surface((5.0, 5.0), degenerate).is_none());
    }

    #[test]
    fn eraser_removes_pencil_ink_from_overlay() {
        let mut layer = layer_200();
        draw_stroke(&mut layer, (20.0, 100.0), (180.0, 100.0));

        layer.set_tool(Tool::Eraser);
        draw_stroke(&mut layer, (100.0, 80.0), (100.0, 120.0));

        // Mid-stroke pixel is erased, far end survives.
        let alpha = |x: u32, y: u32| layer.surface().pixels()[((y * 200 + x) * 4 + 3) as usize];
        assert_eq!(alpha(100, 100), 0);
        assert!(alpha(20, 100) > 0);
        assert_eq!(layer.history_len(1), 2);
    }

    #[test]
    fn reset_drops_all_pages() {
        let mut layer = layer_200();
        draw_stroke(&mut layer, (10.0, 10.0), (50.0, 50.0));
        layer.sync_to_page(2, 200, 200);
        draw_stroke(&mut layer, (10.0, 10.0), (50.0, 50.0));

        layer.reset();
        assert!(!layer.has_history(1));
        assert!(!layer.has_history(2));
    }
}
