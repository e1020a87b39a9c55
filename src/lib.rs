//! 🐹 CHONKER highlight: keeps the extracted-text panel and the rendered PDF
//! in step. Picking a text fragment jumps the viewer to every occurrence and
//! draws a highlight over each one.

pub mod config;
pub mod coordinate_mapping;
pub mod error;
pub mod fragment;
pub mod index;
pub mod logging;
pub mod markdown;
pub mod overlay;
pub mod pdf_viewer;
pub mod sync;
pub mod text_panel;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(feature = "web")]
pub mod web;

pub use config::HighlightConfig;
pub use coordinate_mapping::{to_surface_space, SurfaceRect, ViewportScale};
pub use error::{SyncError, SyncResult};
pub use fragment::{BoundingBox, ExtractionPayload, Fragment, ValidatedDocument};
pub use index::FragmentIndex;
pub use overlay::{OverlayManager, OverlaySurface, ShapeStyle, SurfaceHost, SurfaceSize};
pub use pdf_viewer::{DocumentViewer, RecordingViewer, ZoomMode};
pub use sync::{HighlightController, HighlightPhase, SelectionState};
pub use text_panel::{PanelIntent, PanelView};
