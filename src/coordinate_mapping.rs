use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::fragment::BoundingBox;

/// Ratio between document-native units and on-screen pixels.
///
/// Owned by the document viewer. The transform only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ViewportScale(f64);

impl ViewportScale {
    pub const IDENTITY: ViewportScale = ViewportScale(1.0);

    pub fn new(value: f64) -> SyncResult<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(SyncError::InvalidScale { value })
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for ViewportScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TryFrom<f64> for ViewportScale {
    type Error = SyncError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        ViewportScale::new(value)
    }
}

impl From<ViewportScale> for f64 {
    fn from(scale: ViewportScale) -> Self {
        scale.0
    }
}

/// Rectangle in drawing-surface pixel space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Convert a document-native bounding box to surface pixels at `scale`.
///
/// Both the viewer and the overlay use a top-left origin, so this is a pure
/// scale with no axis flip. Callers must re-run it on every scale change.
pub fn to_surface_space(bbox: &BoundingBox, scale: ViewportScale) -> SurfaceRect {
    let s = scale.get();
    SurfaceRect {
        left: bbox.x0 * s,
        top: bbox.y0 * s,
        width: (bbox.x1 - bbox.x0) * s,
        height: (bbox.y1 - bbox.y0) * s,
    }
}
