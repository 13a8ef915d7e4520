// Sheet-music document viewer core
pub mod annotation;
pub mod audio;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod notification;
pub mod pdf;
pub mod settings;
pub mod surface;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-export the embedding surface
pub use annotation::{AnnotationLayer, DisplayBox, Tool};
pub use audio::{AudioTrack, AudioTransport, SignedUrlProvider};
pub use controller::{ByteSource, KeyInput, MemorySource, ViewerController};
pub use error::ViewerError;
pub use pdf::{ViewerPhase, ViewportBox};
pub use settings::ViewerSettings;
