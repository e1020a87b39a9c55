use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::coordinate_mapping::ViewportScale;
use crate::fragment::BoundingBox;
use crate::overlay::SurfaceSize;

/// The document viewer as the highlight engine sees it.
///
/// The viewer renders pages into its own page layer and owns the scale; the
/// engine only reads the scale and asks it to bring regions into view.
pub trait DocumentViewer {
    /// Current document-units → pixels ratio
    fn scale(&self) -> ViewportScale;

    /// Scroll/paginate so that `bbox` on `page` (1-based) is visible
    fn navigate_to(&mut self, page: u32, bbox: &BoundingBox);
}

/// How the viewer picks its scale
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomMode {
    /// Whole page visible (the viewer's default)
    #[default]
    PageFit,
    PageWidth,
    ActualSize,
    Custom(f64),
}

impl ZoomMode {
    /// Resolve a scale for a page of `page` points shown in `viewport` pixels
    pub fn resolve(self, page: SurfaceSize, viewport: SurfaceSize) -> ViewportScale {
        let ratio = |v: u32, p: u32| if p == 0 { 1.0 } else { v as f64 / p as f64 };
        let raw = match self {
            ZoomMode::PageFit => ratio(viewport.width, page.width).min(ratio(viewport.height, page.height)),
            ZoomMode::PageWidth => ratio(viewport.width, page.width),
            ZoomMode::ActualSize => 1.0,
            ZoomMode::Custom(s) => s,
        };
        ViewportScale::new(raw).unwrap_or_default()
    }
}

impl fmt::Display for ZoomMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoomMode::PageFit => f.write_str("page-fit"),
            ZoomMode::PageWidth => f.write_str("page-width"),
            ZoomMode::ActualSize => f.write_str("actual"),
            ZoomMode::Custom(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for ZoomMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "page-fit" | "fit" | "pagefit" => Ok(ZoomMode::PageFit),
            "page-width" | "width" => Ok(ZoomMode::PageWidth),
            "actual" | "actual-size" | "100%" => Ok(ZoomMode::ActualSize),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .map(ZoomMode::Custom)
                .ok_or_else(|| format!("unknown zoom mode '{}'", s)),
        }
    }
}

/// One "jump to region" request sent to the viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Navigation {
    pub page: u32,
    pub bbox: BoundingBox,
}

/// Headless viewer: fixed scale, remembers every navigation request
#[derive(Debug, Clone, Default)]
pub struct RecordingViewer {
    scale: ViewportScale,
    current_page: u32,
    navigations: Vec<Navigation>,
}

impl RecordingViewer {
    pub fn new(scale: ViewportScale) -> Self {
        Self {
            scale,
            current_page: 1,
            navigations: Vec::new(),
        }
    }

    /// Simulate the user zooming
    pub fn set_scale(&mut self, scale: ViewportScale) {
        self.scale = scale;
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn navigations(&self) -> &[Navigation] {
        &self.navigations
    }

    pub fn take_navigations(&mut self) -> Vec<Navigation> {
        std::mem::take(&mut self.navigations)
    }
}

impl DocumentViewer for RecordingViewer {
    fn scale(&self) -> ViewportScale {
        self.scale
    }

    fn navigate_to(&mut self, page: u32, bbox: &BoundingBox) {
        debug!(page, "Viewer navigation requested");
        self.current_page = page;
        self.navigations.push(Navigation { page, bbox: *bbox });
    }
}
