use serde::Serialize;
use tracing::{debug, info};

use crate::config::OverlayConfig;
use crate::coordinate_mapping::{to_surface_space, ViewportScale};
use crate::error::{SyncError, SyncResult};
use crate::fragment::Fragment;
use crate::index::FragmentIndex;
use crate::overlay::{AttachError, OverlayManager, OverlaySurface, ShapeStyle, SurfaceHost};
use crate::pdf_viewer::DocumentViewer;
use crate::text_panel::PanelIntent;

/// The single "active text" shared by the text panel and the overlay
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum SelectionState {
    #[default]
    None,
    Selected(String),
}

impl SelectionState {
    pub fn text(&self) -> Option<&str> {
        match self {
            SelectionState::None => None,
            SelectionState::Selected(text) => Some(text),
        }
    }

    pub fn is_selected(&self, text: &str) -> bool {
        self.text() == Some(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HighlightPhase {
    Idle,
    Resolving,
    Highlighted,
}

/// Why a batch redraw is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawReason {
    Selection,
    Document,
    Attached,
    Resized,
    ScaleChanged,
}

/// Outcome of resolving one selection intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub text: String,
    pub matches: usize,
}

/// What one frame did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FrameReport {
    pub attached: bool,
    pub resized: bool,
    pub redrawn: bool,
    pub shapes: usize,
}

/// Keeps text selection, overlay highlights and viewer navigation in step.
///
/// Sole writer of [`SelectionState`] and sole mutator of the overlay surface.
/// Drawing is batched: intents update state and navigate right away, shapes
/// are produced by [`HighlightController::run_frame`] at the next frame
/// boundary.
pub struct HighlightController<H: SurfaceHost, V: DocumentViewer> {
    index: FragmentIndex,
    selection: SelectionState,
    phase: HighlightPhase,
    overlay: OverlayManager<H>,
    surface: Option<OverlaySurface<H>>,
    viewer: V,
    style: ShapeStyle,
    page_layer_selector: String,
    redraw: Option<RedrawReason>,
    torn_down: bool,
}

impl<H: SurfaceHost, V: DocumentViewer> HighlightController<H, V> {
    pub fn new(index: FragmentIndex, overlay: OverlayManager<H>, viewer: V, config: &OverlayConfig) -> Self {
        Self {
            index,
            selection: SelectionState::None,
            phase: HighlightPhase::Idle,
            overlay,
            surface: None,
            viewer,
            style: config.highlight.clone(),
            page_layer_selector: config.page_layer_selector.clone(),
            redraw: None,
            torn_down: false,
        }
    }

    pub fn index(&self) -> &FragmentIndex {
        &self.index
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn phase(&self) -> HighlightPhase {
        self.phase
    }

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut V {
        &mut self.viewer
    }

    pub fn host(&self) -> &H {
        self.overlay.host()
    }

    /// Gives the embedder access to its DOM (e.g. the viewer remounting layers)
    pub fn host_mut(&mut self) -> &mut H {
        self.overlay.host_mut()
    }

    pub fn surface(&self) -> Option<&OverlaySurface<H>> {
        self.surface.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    /// A batch redraw is waiting for the next frame
    pub fn needs_frame(&self) -> bool {
        self.redraw.is_some() && !self.torn_down
    }

    fn request_redraw(&mut self, reason: RedrawReason) {
        if self.redraw.is_none() {
            debug!(?reason, "Redraw requested");
        }
        self.redraw.get_or_insert(reason);
    }

    /// Mount the overlay on the viewer's page layer now
    pub fn attach(&mut self) -> SyncResult<()> {
        if self.torn_down {
            return Err(AttachError::TornDown.into());
        }
        if self.surface.is_some() {
            return Ok(());
        }
        let surface = self.overlay.attach_to(&self.page_layer_selector)?;
        self.surface = Some(surface);
        self.request_redraw(RedrawReason::Attached);
        Ok(())
    }

    /// Like [`attach`](Self::attach), for event handlers. A missing layer is
    /// expected early in the viewer's lifecycle; call again on the next event.
    pub fn try_attach(&mut self) -> bool {
        match self.attach() {
            Ok(()) => true,
            Err(SyncError::Attach(
                AttachError::AnchorMissing { .. } | AttachError::AnchorAbsent | AttachError::TornDown,
            )) => {
                debug!(selector = %self.page_layer_selector, "Overlay attach deferred");
                false
            }
            Err(e) => {
                crate::log_error!(e, "overlay attach");
                false
            }
        }
    }

    /// Panel → controller entry point
    pub fn dispatch(&mut self, intent: PanelIntent) -> Option<Resolution> {
        match intent {
            PanelIntent::FragmentSelected(text) => self.on_fragment_selected(text),
            PanelIntent::ClearSelection => {
                self.clear_selection();
                None
            }
        }
    }

    /// The user picked `text` in the text panel
    pub fn on_fragment_selected(&mut self, text: impl Into<String>) -> Option<Resolution> {
        if self.torn_down {
            debug!("Selection ignored after teardown");
            return None;
        }
        let text = text.into();
        self.phase = HighlightPhase::Resolving;
        self.selection = SelectionState::Selected(text.clone());

        // Old shapes go in this turn, before anything new is drawn
        if let Some(surface) = self.surface.as_mut() {
            self.overlay.clear(surface);
        }

        let matches = ordered_matches(&self.index, &text);
        for fragment in &matches {
            self.viewer.navigate_to(fragment.page, &fragment.bbox);
        }
        let count = matches.len();

        info!(text = %text, matches = count, "🔍 Selection resolved");
        self.request_redraw(RedrawReason::Selection);
        self.phase = HighlightPhase::Highlighted;

        Some(Resolution { text, matches: count })
    }

    pub fn clear_selection(&mut self) {
        self.selection = SelectionState::None;
        if let Some(surface) = self.surface.as_mut() {
            self.overlay.clear(surface);
        }
        self.redraw = None;
        if !self.torn_down {
            self.phase = HighlightPhase::Idle;
        }
    }

    /// Swap in the index of a newly loaded document; the current selection is
    /// resolved again against it (without navigating)
    pub fn load_document(&mut self, index: FragmentIndex) {
        self.index = index;
        if let Some(surface) = self.surface.as_mut() {
            self.overlay.clear(surface);
        }
        if self.selection.text().is_some() && !self.torn_down {
            self.phase = HighlightPhase::Resolving;
            self.request_redraw(RedrawReason::Document);
            self.phase = HighlightPhase::Highlighted;
        }
        info!(fragments = self.index.len(), "📄 Document index replaced");
    }

    /// The viewer zoomed; shapes must be recomputed
    pub fn on_scale_changed(&mut self) {
        self.request_redraw(RedrawReason::ScaleChanged);
    }

    /// The batch redraw step, run once per animation frame.
    ///
    /// Order: (re)attach, apply resize notifications, notice scale changes,
    /// then clear and draw the full shape set from the current selection at
    /// the current scale.
    pub fn run_frame(&mut self) -> FrameReport {
        let mut report = FrameReport::default();
        if self.torn_down {
            return report;
        }

        // Viewer recreated its page layer underneath us
        let stale = self
            .surface
            .as_ref()
            .map(|s| !self.overlay.host().is_connected(s.anchor()))
            .unwrap_or(false);
        if stale {
            if let Some(mut old) = self.surface.take() {
                debug!("Overlay anchor disconnected, re-attaching");
                self.overlay.dispose(&mut old);
                self.phase = HighlightPhase::Idle;
            }
        }

        if self.surface.is_none() {
            report.attached = self.try_attach();
        }

        let scale = self.viewer.scale();
        let Some(surface) = self.surface.as_mut() else {
            return report;
        };

        if self.overlay.sync_size(surface) {
            report.resized = true;
            self.redraw.get_or_insert(RedrawReason::Resized);
        }

        let has_shapes_to_show = self.selection.text().is_some();
        if has_shapes_to_show && surface.drawn_at().is_some_and(|drawn| drawn != scale) {
            self.redraw.get_or_insert(RedrawReason::ScaleChanged);
        }

        if let Some(reason) = self.redraw.take() {
            report.shapes = draw_selection(
                &mut self.overlay,
                surface,
                &self.index,
                &self.selection,
                scale,
                &self.style,
            );
            report.redrawn = true;
            if self.selection.text().is_some() {
                self.phase = HighlightPhase::Highlighted;
            }
            debug!(?reason, shapes = report.shapes, scale = scale.get(), "Overlay redrawn");
        }

        report
    }

    /// Dispose the surface and reset to Idle. Runs at most once; never fails.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        if let Some(mut surface) = self.surface.take() {
            self.overlay.dispose(&mut surface);
        }
        self.selection = SelectionState::None;
        self.redraw = None;
        self.phase = HighlightPhase::Idle;
        info!("Highlight controller torn down");
    }
}

impl<H: SurfaceHost, V: DocumentViewer> Drop for HighlightController<H, V> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Matches for `text`, page order, extraction order within a page
fn ordered_matches<'a>(index: &'a FragmentIndex, text: &str) -> Vec<&'a Fragment> {
    let mut matches = index.lookup(text);
    matches.sort_by_key(|f| f.page);
    matches
}

fn draw_selection<H: SurfaceHost>(
    overlay: &mut OverlayManager<H>,
    surface: &mut OverlaySurface<H>,
    index: &FragmentIndex,
    selection: &SelectionState,
    scale: ViewportScale,
    style: &ShapeStyle,
) -> usize {
    overlay.clear(surface);
    let Some(text) = selection.text() else {
        return 0;
    };

    let matches = ordered_matches(index, text);
    for fragment in &matches {
        overlay.add_shape(surface, to_surface_space(&fragment.bbox, scale), style);
    }
    overlay.mark_drawn(surface, scale);
    matches.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinate_mapping::SurfaceRect;
    use crate::fragment::BoundingBox;
    use crate::overlay::headless::{HeadlessDom, NodeId};
    use crate::overlay::SurfaceSize;
    use crate::pdf_viewer::RecordingViewer;

    type Controller = HighlightController<HeadlessDom, RecordingViewer>;

    fn frag(text: &str, page: u32, b: [f64; 4]) -> Fragment {
        Fragment::new(text, page, BoundingBox::try_from(b).unwrap())
    }

    fn intro_index() -> FragmentIndex {
        FragmentIndex::build(vec![
            frag("Intro", 3, [5.0, 5.0, 45.0, 15.0]),
            frag("Body", 2, [0.0, 0.0, 10.0, 10.0]),
            frag("Intro", 1, [10.0, 10.0, 50.0, 20.0]),
        ])
    }

    fn controller(with_layer: bool, scale: f64) -> (Controller, Option<NodeId>) {
        let config = OverlayConfig::default();
        let mut dom = HeadlessDom::new();
        let layer = with_layer.then(|| dom.mount_page_layer(&config.page_layer_selector, SurfaceSize::new(800, 1000)));
        let viewer = RecordingViewer::new(ViewportScale::new(scale).unwrap());
        (
            HighlightController::new(intro_index(), OverlayManager::new(dom), viewer, &config),
            layer,
        )
    }

    fn rects(c: &Controller) -> Vec<SurfaceRect> {
        c.surface().unwrap().shapes().iter().map(|s| s.rect).collect()
    }

    #[test]
    fn test_matches_navigate_in_page_order() {
        let (mut c, _) = controller(true, 2.0);
        assert!(c.try_attach());
        let resolution = c.on_fragment_selected("Intro").unwrap();
        assert_eq!(resolution.matches, 2);

        let pages: Vec<u32> = c.viewer().navigations().iter().map(|n| n.page).collect();
        assert_eq!(pages, vec![1, 3]);

        let report = c.run_frame();
        assert!(report.redrawn);
        assert_eq!(report.shapes, 2);
        assert_eq!(
            rects(&c),
            vec![SurfaceRect::new(20.0, 20.0, 80.0, 20.0), SurfaceRect::new(10.0, 10.0, 80.0, 20.0)]
        );
        assert_eq!(c.phase(), HighlightPhase::Highlighted);
    }

    #[test]
    fn test_selection_clears_old_shapes_immediately() {
        let (mut c, _) = controller(true, 1.0);
        c.try_attach();
        c.on_fragment_selected("Intro");
        c.run_frame();
        assert_eq!(c.surface().unwrap().shape_count(), 2);

        c.on_fragment_selected("Body");
        assert_eq!(c.surface().unwrap().shape_count(), 0);
        c.run_frame();
        assert_eq!(rects(&c), vec![SurfaceRect::new(0.0, 0.0, 10.0, 10.0)]);
    }

    #[test]
    fn test_no_match_still_selects() {
        let (mut c, _) = controller(true, 2.0);
        c.try_attach();
        let resolution = c.on_fragment_selected("Nonexistent").unwrap();
        c.run_frame();

        assert_eq!(resolution.matches, 0);
        assert!(c.viewer().navigations().is_empty());
        assert_eq!(c.surface().unwrap().shape_count(), 0);
        assert_eq!(c.selection(), &SelectionState::Selected("Nonexistent".to_string()));
    }

    #[test]
    fn test_navigation_does_not_wait_for_surface() {
        let (mut c, _) = controller(false, 2.0);
        assert!(!c.try_attach());
        c.on_fragment_selected("Intro");
        assert_eq!(c.viewer().navigations().len(), 2);

        let report = c.run_frame();
        assert!(!report.attached);
        assert!(c.needs_frame());

        let selector = OverlayConfig::default().page_layer_selector;
        c.host_mut().mount_page_layer(&selector, SurfaceSize::new(800, 1000));
        let report = c.run_frame();
        assert!(report.attached);
        assert_eq!(report.shapes, 2);
        assert!(!c.needs_frame());
    }

    #[test]
    fn test_scale_change_recomputes_shapes() {
        let (mut c, _) = controller(true, 1.0);
        c.try_attach();
        c.on_fragment_selected("Body");
        c.run_frame();
        assert_eq!(rects(&c), vec![SurfaceRect::new(0.0, 0.0, 10.0, 10.0)]);

        c.viewer_mut().set_scale(ViewportScale::new(3.0).unwrap());
        let report = c.run_frame();
        assert!(report.redrawn);
        assert_eq!(rects(&c), vec![SurfaceRect::new(0.0, 0.0, 30.0, 30.0)]);
        assert_eq!(c.surface().unwrap().drawn_at(), Some(ViewportScale::new(3.0).unwrap()));
    }

    #[test]
    fn test_resize_notification_resizes_and_redraws() {
        let (mut c, layer) = controller(true, 1.0);
        let layer = layer.unwrap();
        c.try_attach();
        c.on_fragment_selected("Intro");
        c.run_frame();

        c.host_mut().resize_node(layer, SurfaceSize::new(400, 500));
        let report = c.run_frame();
        assert!(report.resized);
        assert_eq!(report.shapes, 2);
        assert_eq!(c.surface().unwrap().size(), SurfaceSize::new(400, 500));
        assert_eq!(c.surface().unwrap().size(), c.host().node_size(layer));
    }

    #[test]
    fn test_recreated_page_layer_gets_new_surface() {
        let (mut c, layer) = controller(true, 1.0);
        c.try_attach();
        c.on_fragment_selected("Intro");
        c.run_frame();

        c.host_mut().remove_node(layer.unwrap());
        let selector = OverlayConfig::default().page_layer_selector;
        let new_layer = c.host_mut().mount_page_layer(&selector, SurfaceSize::new(600, 700));

        let report = c.run_frame();
        assert!(report.attached);
        assert_eq!(report.shapes, 2);
        assert_eq!(c.surface().unwrap().anchor(), &new_layer);
        assert_eq!(c.host().observer_count(), 1);
    }

    #[test]
    fn test_document_change_re_resolves_selection() {
        let (mut c, _) = controller(true, 1.0);
        c.try_attach();
        c.on_fragment_selected("Intro");
        c.run_frame();

        c.load_document(FragmentIndex::build(vec![frag("Intro", 7, [1.0, 1.0, 2.0, 2.0])]));
        assert_eq!(c.surface().unwrap().shape_count(), 0);
        let report = c.run_frame();
        assert_eq!(report.shapes, 1);
        assert_eq!(c.viewer().navigations().len(), 2);
    }

    #[test]
    fn test_teardown_disposes_once_and_goes_idle() {
        let (mut c, layer) = controller(true, 1.0);
        c.try_attach();
        let canvas = *c.surface().unwrap().canvas();
        c.on_fragment_selected("Intro");

        c.teardown();
        assert_eq!(c.phase(), HighlightPhase::Idle);
        assert_eq!(c.selection(), &SelectionState::None);
        assert!(!c.host().is_child_of(canvas, layer.unwrap()));
        assert!(!c.needs_frame());

        c.teardown();
        assert!(c.on_fragment_selected("Intro").is_none());
    }

    #[test]
    fn test_clear_selection_intent() {
        let (mut c, _) = controller(true, 1.0);
        c.try_attach();
        c.dispatch(PanelIntent::FragmentSelected("Intro".to_string()));
        c.run_frame();
        c.dispatch(PanelIntent::ClearSelection);
        assert_eq!(c.selection(), &SelectionState::None);
        assert_eq!(c.phase(), HighlightPhase::Idle);
        assert_eq!(c.surface().unwrap().shape_count(), 0);
    }

    #[test]
    fn test_attach_reports_why_it_failed() {
        let (mut c, _) = controller(false, 1.0);
        let err = c.attach().unwrap_err();
        assert!(matches!(err, SyncError::Attach(AttachError::AnchorMissing { .. })));
        assert!(err.is_recoverable());

        let selector = OverlayConfig::default().page_layer_selector;
        c.host_mut().mount_page_layer(&selector, SurfaceSize::new(800, 1000));
        assert!(c.attach().is_ok());
        // Already attached is not an error
        assert!(c.attach().is_ok());

        c.teardown();
        assert!(matches!(c.attach(), Err(SyncError::Attach(AttachError::TornDown))));
        assert!(!c.try_attach());
    }

    #[test]
    fn test_layer_removed_without_replacement_goes_idle() {
        let (mut c, layer) = controller(true, 1.0);
        c.try_attach();
        c.on_fragment_selected("Intro");
        c.run_frame();
        assert_eq!(c.phase(), HighlightPhase::Highlighted);

        c.host_mut().remove_node(layer.unwrap());
        let report = c.run_frame();
        assert!(!report.attached);
        assert!(c.surface().is_none());
        assert_eq!(c.phase(), HighlightPhase::Idle);
        assert_eq!(c.selection(), &SelectionState::Selected("Intro".to_string()));

        let selector = OverlayConfig::default().page_layer_selector;
        c.host_mut().mount_page_layer(&selector, SurfaceSize::new(800, 1000));
        let report = c.run_frame();
        assert!(report.attached);
        assert_eq!(report.shapes, 2);
        assert_eq!(c.phase(), HighlightPhase::Highlighted);
    }

    #[test]
    fn test_scale_pushed_before_first_draw() {
        let (mut c, _) = controller(true, 1.0);
        c.try_attach();
        c.on_fragment_selected("Intro");

        // Zoom lands before any frame ran
        c.viewer_mut().set_scale(ViewportScale::new(2.0).unwrap());
        c.on_scale_changed();
        assert!(c.needs_frame());

        let report = c.run_frame();
        assert!(report.redrawn);
        assert_eq!(
            rects(&c),
            vec![SurfaceRect::new(20.0, 20.0, 80.0, 20.0), SurfaceRect::new(10.0, 10.0, 80.0, 20.0)]
        );
        assert_eq!(c.surface().unwrap().drawn_at(), Some(ViewportScale::new(2.0).unwrap()));
        assert!(!c.needs_frame());
    }

    #[test]
    fn test_scale_change_without_selection_draws_nothing() {
        let (mut c, _) = controller(true, 1.0);
        c.try_attach();
        c.run_frame();

        c.viewer_mut().set_scale(ViewportScale::new(3.0).unwrap());
        c.on_scale_changed();
        let report = c.run_frame();
        assert!(report.redrawn);
        assert_eq!(report.shapes, 0);
        assert_eq!(c.phase(), HighlightPhase::Idle);
    }

    #[test]
    fn test_page_layer_of_another_viewer_is_ignored() {
        let (mut c, _) = controller(false, 1.0);
        let selector = OverlayConfig::default().page_layer_selector;
        c.host_mut().mount_outside_container(&selector, SurfaceSize::new(800, 1000));
        assert!(!c.try_attach());

        let ours = c.host_mut().mount_page_layer(&selector, SurfaceSize::new(800, 1000));
        assert!(c.try_attach());
        assert_eq!(c.surface().unwrap().anchor(), &ours);
    }
}
