//! Overlay surface lifecycle.
//!
//! A drawing surface (a transparent canvas) is mounted over the viewer's page
//! layer. The viewer owns that layer's DOM and may recreate it on zoom or page
//! change, so the surface keeps its own lifecycle: attach when the layer
//! exists, follow its size through a resize subscription, dispose on teardown.
//!
//! The DOM itself sits behind [`SurfaceHost`]. [`headless::HeadlessDom`] is an
//! in-memory implementation; the `web` feature adds a browser one.

pub mod headless;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::Receiver;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coordinate_mapping::{SurfaceRect, ViewportScale};

/// Pixel dimensions of an anchor or a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for SurfaceSize {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `800x1000`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse().map_err(|_| format!("bad width '{}'", w))?;
        let height = h.trim().parse().map_err(|_| format!("bad height '{}'", h))?;
        Ok(Self { width, height })
    }
}

/// Fill and stroke of a highlight rectangle. No interaction semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub fill: String,
    pub stroke: String,
    pub stroke_width: f64,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            fill: "rgba(0, 255, 0, 0.3)".to_string(),
            stroke: "green".to_string(),
            stroke_width: 2.0,
        }
    }
}

/// One drawn highlight, in surface pixel space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayShape {
    pub rect: SurfaceRect,
    pub style: ShapeStyle,
}

/// Why the overlay could not be mounted. A missing anchor (viewer page layer)
/// is recoverable: retry on the next lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("page layer '{selector}' is not mounted")]
    AnchorMissing { selector: String },

    #[error("anchor is not mounted")]
    AnchorAbsent,

    #[error("could not mount overlay canvas: {0}")]
    Mount(String),

    #[error("highlight controller was torn down")]
    TornDown,
}

/// Failure reported by a surface host while touching the DOM
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("node is no longer attached to its anchor")]
    NodeDetached,

    #[error("{0}")]
    Dom(String),
}

/// Passive resize notifications for one anchor.
///
/// The host pushes the anchor's new box into the channel whenever it changes;
/// nothing polls the DOM.
#[derive(Debug)]
pub struct ResizeSubscription {
    id: u64,
    events: Receiver<SurfaceSize>,
}

impl ResizeSubscription {
    pub fn new(id: u64, events: Receiver<SurfaceSize>) -> Self {
        Self { id, events }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Most recent size notified since the last drain, if any
    pub fn latest(&self) -> Option<SurfaceSize> {
        self.events.try_iter().last()
    }
}

/// DOM primitives the overlay needs
pub trait SurfaceHost {
    type Anchor: Clone + fmt::Debug;
    type Canvas: fmt::Debug;

    /// Find the viewer's page layer
    fn query_anchor(&self, selector: &str) -> Option<Self::Anchor>;

    /// Current rendered box of the anchor
    fn anchor_size(&self, anchor: &Self::Anchor) -> SurfaceSize;

    /// Whether the anchor is still part of the document
    fn is_connected(&self, anchor: &Self::Anchor) -> bool;

    /// Create a transparent canvas at the anchor's origin with pointer events
    /// disabled, and append it to the anchor
    fn mount_canvas(&mut self, anchor: &Self::Anchor) -> Result<Self::Canvas, HostError>;

    fn set_canvas_size(&mut self, canvas: &Self::Canvas, size: SurfaceSize);

    fn observe_resize(&mut self, anchor: &Self::Anchor) -> ResizeSubscription;

    fn unobserve(&mut self, subscription: &ResizeSubscription);

    fn clear_canvas(&mut self, canvas: &Self::Canvas, size: SurfaceSize);

    fn draw_rect(&mut self, canvas: &Self::Canvas, shape: &OverlayShape);

    /// Detach the canvas from the anchor
    fn unmount_canvas(&mut self, anchor: &Self::Anchor, canvas: &Self::Canvas)
        -> Result<(), HostError>;
}

/// Owned handle to one mounted drawing surface.
///
/// Only [`OverlayManager`] mutates it.
pub struct OverlaySurface<H: SurfaceHost> {
    anchor: H::Anchor,
    canvas: H::Canvas,
    size: SurfaceSize,
    shapes: Vec<OverlayShape>,
    drawn_at: Option<ViewportScale>,
    subscription: Option<ResizeSubscription>,
    disposed: bool,
}

impl<H: SurfaceHost> OverlaySurface<H> {
    pub fn anchor(&self) -> &H::Anchor {
        &self.anchor
    }

    pub fn canvas(&self) -> &H::Canvas {
        &self.canvas
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn shapes(&self) -> &[OverlayShape] {
        &self.shapes
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    /// Scale the current shapes were computed at
    pub fn drawn_at(&self) -> Option<ViewportScale> {
        self.drawn_at
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<H: SurfaceHost> fmt::Debug for OverlaySurface<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlaySurface")
            .field("anchor", &self.anchor)
            .field("canvas", &self.canvas)
            .field("size", &self.size)
            .field("shapes", &self.shapes.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

/// Owns the host and performs every surface operation
pub struct OverlayManager<H: SurfaceHost> {
    host: H,
}

impl<H: SurfaceHost> OverlayManager<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Look up the page layer by selector and attach to it
    pub fn attach_to(&mut self, selector: &str) -> Result<OverlaySurface<H>, AttachError> {
        let anchor = self.host.query_anchor(selector);
        if anchor.is_none() {
            debug!(selector, "Page layer not mounted yet");
            return Err(AttachError::AnchorMissing {
                selector: selector.to_string(),
            });
        }
        self.attach(anchor)
    }

    /// Mount a surface over `anchor`, sized to its current box and subscribed
    /// to its resizes
    pub fn attach(&mut self, anchor: Option<H::Anchor>) -> Result<OverlaySurface<H>, AttachError> {
        let anchor = match anchor {
            Some(a) if self.host.is_connected(&a) => a,
            _ => return Err(AttachError::AnchorAbsent),
        };

        let canvas = self
            .host
            .mount_canvas(&anchor)
            .map_err(|e| AttachError::Mount(e.to_string()))?;

        let size = self.host.anchor_size(&anchor);
        self.host.set_canvas_size(&canvas, size);
        let subscription = self.host.observe_resize(&anchor);

        info!(%size, "🖍️  Overlay surface attached");

        Ok(OverlaySurface {
            anchor,
            canvas,
            size,
            shapes: Vec::new(),
            drawn_at: None,
            subscription: Some(subscription),
            disposed: false,
        })
    }

    /// Match the surface to new anchor dimensions.
    ///
    /// Resizing a canvas wipes its bitmap, so the recorded shapes go too;
    /// the caller redraws.
    pub fn resize(&mut self, surface: &mut OverlaySurface<H>, size: SurfaceSize) {
        if surface.disposed {
            return;
        }
        self.host.set_canvas_size(&surface.canvas, size);
        surface.size = size;
        surface.shapes.clear();
        surface.drawn_at = None;
        debug!(%size, "Overlay surface resized");
    }

    /// Apply the latest pending resize notification. Returns true if the
    /// surface changed size.
    pub fn sync_size(&mut self, surface: &mut OverlaySurface<H>) -> bool {
        let latest = surface.subscription.as_ref().and_then(|s| s.latest());
        match latest {
            Some(size) if size != surface.size => {
                self.resize(surface, size);
                true
            }
            _ => false,
        }
    }

    /// Remove every drawn shape
    pub fn clear(&mut self, surface: &mut OverlaySurface<H>) {
        if surface.disposed {
            return;
        }
        self.host.clear_canvas(&surface.canvas, surface.size);
        surface.shapes.clear();
        surface.drawn_at = None;
    }

    /// Draw one highlight rectangle
    pub fn add_shape(&mut self, surface: &mut OverlaySurface<H>, rect: SurfaceRect, style: &ShapeStyle) {
        if surface.disposed {
            return;
        }
        let shape = OverlayShape {
            rect,
            style: style.clone(),
        };
        self.host.draw_rect(&surface.canvas, &shape);
        surface.shapes.push(shape);
    }

    /// Record the scale the current shape set was computed at
    pub fn mark_drawn(&mut self, surface: &mut OverlaySurface<H>, scale: ViewportScale) {
        surface.drawn_at = Some(scale);
    }

    /// Release the surface: drop the resize subscription and detach the
    /// canvas. Safe to call again; detach failures are logged, never returned.
    pub fn dispose(&mut self, surface: &mut OverlaySurface<H>) {
        if surface.disposed {
            debug!("Overlay surface already disposed");
            return;
        }
        surface.disposed = true;
        surface.shapes.clear();
        surface.drawn_at = None;

        if let Some(subscription) = surface.subscription.take() {
            self.host.unobserve(&subscription);
        }

        match self.host.unmount_canvas(&surface.anchor, &surface.canvas) {
            Ok(()) => info!("🧹 Overlay surface disposed"),
            Err(e) => warn!(error = %e, "Overlay canvas detach failed during dispose"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::headless::HeadlessDom;
    use super::*;

    const LAYER: &str = ".rpv-core__page-layer";

    fn manager_with_layer(size: SurfaceSize) -> (OverlayManager<HeadlessDom>, headless::NodeId) {
        let mut dom = HeadlessDom::new();
        let layer = dom.mount_page_layer(LAYER, size);
        (OverlayManager::new(dom), layer)
    }

    #[test]
    fn test_attach_requires_anchor() {
        let mut manager = OverlayManager::new(HeadlessDom::new());
        assert_eq!(
            manager.attach_to(LAYER).unwrap_err(),
            AttachError::AnchorMissing {
                selector: LAYER.to_string()
            }
        );
        assert_eq!(manager.attach(None).unwrap_err(), AttachError::AnchorAbsent);
    }

    #[test]
    fn test_attach_mounts_non_interactive_canvas_sized_to_anchor() {
        let (mut manager, layer) = manager_with_layer(SurfaceSize::new(612, 792));
        let surface = manager.attach_to(LAYER).unwrap();

        assert_eq!(surface.size(), SurfaceSize::new(612, 792));
        let dom = manager.host();
        assert!(dom.is_child_of(*surface.canvas(), layer));
        let canvas = dom.canvas(*surface.canvas()).unwrap();
        assert_eq!(canvas.size, SurfaceSize::new(612, 792));
        assert!(canvas.pointer_events_none);
        assert!(canvas.absolutely_positioned);
        assert_eq!(dom.observer_count(), 1);
    }

    #[test]
    fn test_resize_keeps_surface_equal_to_requested_size() {
        let (mut manager, _) = manager_with_layer(SurfaceSize::new(100, 100));
        let mut surface = manager.attach_to(LAYER).unwrap();

        for size in [SurfaceSize::new(300, 400), SurfaceSize::new(1, 1), SurfaceSize::new(1920, 2484)] {
            manager.resize(&mut surface, size);
            assert_eq!(surface.size(), size);
            assert_eq!(manager.host().canvas(*surface.canvas()).unwrap().size, size);
        }
    }

    #[test]
    fn test_resize_notifications_are_applied_on_sync() {
        let (mut manager, layer) = manager_with_layer(SurfaceSize::new(100, 100));
        let mut surface = manager.attach_to(LAYER).unwrap();

        manager.host_mut().resize_node(layer, SurfaceSize::new(200, 150));
        manager.host_mut().resize_node(layer, SurfaceSize::new(640, 480));
        assert!(manager.sync_size(&mut surface));
        assert_eq!(surface.size(), SurfaceSize::new(640, 480));
        assert_eq!(surface.size(), manager.host().node_size(layer));

        assert!(!manager.sync_size(&mut surface));
    }

    #[test]
    fn test_initial_observation_keeps_attach_size() {
        let (mut manager, layer) = manager_with_layer(SurfaceSize::new(620, 800));
        let mut surface = manager.attach_to(LAYER).unwrap();

        // The notification fired when observation starts reports the same box
        assert!(!manager.sync_size(&mut surface));
        assert_eq!(surface.size(), SurfaceSize::new(620, 800));
        assert_eq!(surface.size(), manager.host().anchor_size(&layer));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (mut manager, _) = manager_with_layer(SurfaceSize::new(100, 100));
        let mut surface = manager.attach_to(LAYER).unwrap();
        let style = ShapeStyle::default();

        manager.add_shape(&mut surface, SurfaceRect::new(1.0, 1.0, 5.0, 5.0), &style);
        assert_eq!(surface.shape_count(), 1);
        manager.clear(&mut surface);
        assert_eq!(surface.shape_count(), 0);
        manager.clear(&mut surface);
        assert_eq!(surface.shape_count(), 0);
        assert!(manager.host().canvas(*surface.canvas()).unwrap().visible.is_empty());
    }

    #[test]
    fn test_dispose_detaches_and_is_idempotent() {
        let (mut manager, layer) = manager_with_layer(SurfaceSize::new(100, 100));
        let mut surface = manager.attach_to(LAYER).unwrap();
        let canvas = *surface.canvas();

        manager.dispose(&mut surface);
        assert!(surface.is_disposed());
        assert!(!manager.host().is_child_of(canvas, layer));
        assert_eq!(manager.host().observer_count(), 0);

        manager.dispose(&mut surface);
        assert!(surface.is_disposed());
    }

    #[test]
    fn test_dispose_tolerates_removed_anchor() {
        let (mut manager, layer) = manager_with_layer(SurfaceSize::new(100, 100));
        let mut surface = manager.attach_to(LAYER).unwrap();

        // Viewer unmounts its page layer (and our canvas with it) first
        manager.host_mut().remove_node(layer);
        manager.dispose(&mut surface);
        assert!(surface.is_disposed());
    }

    #[test]
    fn test_parse_surface_size() {
        assert_eq!("800x1000".parse::<SurfaceSize>().unwrap(), SurfaceSize::new(800, 1000));
        assert_eq!("12 X 3".parse::<SurfaceSize>().unwrap(), SurfaceSize::new(12, 3));
        assert!("800".parse::<SurfaceSize>().is_err());
        assert!("ax3".parse::<SurfaceSize>().is_err());
    }
}
