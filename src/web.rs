//! Browser bindings.
//!
//! [`DomHost`] drives a real canvas over the viewer's page layer, and
//! [`HighlightSession`] is the JavaScript-facing handle: the text panel calls
//! `selectText`, the viewer reports `pageLayerMounted` and `scaleChanged`, and
//! batch redraws are scheduled on `requestAnimationFrame`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::mpsc::channel;

use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, ResizeObserver, ResizeObserverEntry};

use crate::config::HighlightConfig;
use crate::coordinate_mapping::ViewportScale;
use crate::fragment::{BoundingBox, ExtractionPayload};
use crate::index::FragmentIndex;
use crate::overlay::{HostError, OverlayManager, OverlayShape, ResizeSubscription, SurfaceHost, SurfaceSize};
use crate::pdf_viewer::DocumentViewer;
use crate::sync::HighlightController;
use crate::text_panel;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

type Wake = Rc<dyn Fn()>;

/// Box of an element as the overlay measures it. Attach and resize
/// notifications both go through here so the two never disagree.
fn element_size(element: &Element) -> SurfaceSize {
    SurfaceSize::new(element.client_width().max(0) as u32, element.client_height().max(0) as u32)
}

/// [`SurfaceHost`] over the live DOM, scoped to one viewer container
pub struct DomHost {
    document: Document,
    container: Element,
    observers: HashMap<u64, (ResizeObserver, Closure<dyn FnMut(js_sys::Array)>)>,
    next_observer: u64,
    wake: Option<Wake>,
}

impl DomHost {
    pub fn new(document: Document, container: Element) -> Self {
        Self {
            document,
            container,
            observers: HashMap::new(),
            next_observer: 1,
            wake: None,
        }
    }

    /// Called after every resize notification so a frame gets scheduled
    pub fn set_wake(&mut self, wake: Wake) {
        self.wake = Some(wake);
    }

    fn context(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
        canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
    }
}

impl SurfaceHost for DomHost {
    type Anchor = Element;
    type Canvas = HtmlCanvasElement;

    fn query_anchor(&self, selector: &str) -> Option<Element> {
        self.container.query_selector(selector).ok().flatten()
    }

    fn anchor_size(&self, anchor: &Element) -> SurfaceSize {
        element_size(anchor)
    }

    fn is_connected(&self, anchor: &Element) -> bool {
        anchor.is_connected()
    }

    fn mount_canvas(&mut self, anchor: &Element) -> Result<HtmlCanvasElement, HostError> {
        let canvas = self
            .document
            .create_element("canvas")
            .map_err(|e| HostError::Dom(format!("{:?}", e)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| HostError::Dom("created element is not a canvas".to_string()))?;

        let style = canvas.style();
        for (prop, value) in [
            ("position", "absolute"),
            ("top", "0"),
            ("left", "0"),
            ("pointer-events", "none"),
        ] {
            style
                .set_property(prop, value)
                .map_err(|e| HostError::Dom(format!("{:?}", e)))?;
        }

        anchor
            .append_child(&canvas)
            .map_err(|e| HostError::Dom(format!("{:?}", e)))?;
        Ok(canvas)
    }

    fn set_canvas_size(&mut self, canvas: &HtmlCanvasElement, size: SurfaceSize) {
        canvas.set_width(size.width);
        canvas.set_height(size.height);
    }

    fn observe_resize(&mut self, anchor: &Element) -> ResizeSubscription {
        let (tx, rx) = channel();
        let id = self.next_observer;
        self.next_observer += 1;

        let wake = self.wake.clone();
        let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |entries: js_sys::Array| {
            for entry in entries.iter() {
                let entry: ResizeObserverEntry = entry.unchecked_into();
                let size = element_size(&entry.target());
                if tx.send(size).is_err() {
                    return;
                }
            }
            if let Some(wake) = &wake {
                wake();
            }
        });

        match ResizeObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => {
                observer.observe(anchor);
                self.observers.insert(id, (observer, callback));
            }
            Err(e) => warn!(error = ?e, "ResizeObserver unavailable, overlay will not follow resizes"),
        }
        ResizeSubscription::new(id, rx)
    }

    fn unobserve(&mut self, subscription: &ResizeSubscription) {
        if let Some((observer, _callback)) = self.observers.remove(&subscription.id()) {
            observer.disconnect();
        }
    }

    fn clear_canvas(&mut self, canvas: &HtmlCanvasElement, size: SurfaceSize) {
        if let Some(ctx) = Self::context(canvas) {
            ctx.clear_rect(0.0, 0.0, size.width as f64, size.height as f64);
        }
    }

    #[allow(deprecated)]
    fn draw_rect(&mut self, canvas: &HtmlCanvasElement, shape: &OverlayShape) {
        let Some(ctx) = Self::context(canvas) else {
            debug!("No 2d context, shape dropped");
            return;
        };
        let r = shape.rect;
        ctx.set_fill_style(&JsValue::from_str(&shape.style.fill));
        ctx.fill_rect(r.left, r.top, r.width, r.height);
        ctx.set_stroke_style(&JsValue::from_str(&shape.style.stroke));
        ctx.set_line_width(shape.style.stroke_width);
        ctx.stroke_rect(r.left, r.top, r.width, r.height);
    }

    fn unmount_canvas(&mut self, anchor: &Element, canvas: &HtmlCanvasElement) -> Result<(), HostError> {
        if !anchor.contains(Some(canvas.as_ref())) {
            return Err(HostError::NodeDetached);
        }
        anchor
            .remove_child(canvas)
            .map(|_| ())
            .map_err(|e| HostError::Dom(format!("{:?}", e)))
    }
}

/// The JS viewer: scale pushed in via `scaleChanged`, navigation via callback
pub struct JsViewer {
    scale: ViewportScale,
    navigate: js_sys::Function,
}

impl DocumentViewer for JsViewer {
    fn scale(&self) -> ViewportScale {
        self.scale
    }

    fn navigate_to(&mut self, page: u32, bbox: &BoundingBox) {
        let bbox = match serde_wasm_bindgen::to_value(bbox) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Could not serialize bbox for navigation");
                return;
            }
        };
        if let Err(e) = self.navigate.call2(&JsValue::NULL, &JsValue::from(page), &bbox) {
            warn!(error = ?e, page, "Viewer navigation callback failed");
        }
    }
}

type Controller = HighlightController<DomHost, JsViewer>;

#[wasm_bindgen]
pub struct HighlightSession {
    controller: Rc<RefCell<Controller>>,
    frame_pending: Rc<Cell<bool>>,
    skipped: usize,
}

fn schedule_frame(controller: Weak<RefCell<Controller>>, pending: Rc<Cell<bool>>) {
    if pending.get() {
        return;
    }
    let Some(window) = web_sys::window() else {
        return;
    };
    pending.set(true);
    let flag = Rc::clone(&pending);
    let callback = Closure::once_into_js(move || {
        flag.set(false);
        let Some(controller) = controller.upgrade() else {
            return;
        };
        let report = match controller.try_borrow_mut() {
            Ok(mut c) => c.run_frame(),
            Err(_) => return,
        };
        debug!(shapes = report.shapes, redrawn = report.redrawn, "Frame done");
    });
    if window.request_animation_frame(callback.unchecked_ref()).is_err() {
        pending.set(false);
    }
}

#[wasm_bindgen]
impl HighlightSession {
    /// `payload` is the extraction JSON, `container` the viewer element whose
    /// page layer gets the overlay, `navigate(page, bbox)` the viewer's
    /// jump-to-region callback
    #[wasm_bindgen(constructor)]
    pub fn new(
        payload: &str,
        container: Element,
        scale: f64,
        navigate: js_sys::Function,
        config: JsValue,
    ) -> Result<HighlightSession, JsValue> {
        let config: HighlightConfig = if config.is_undefined() || config.is_null() {
            HighlightConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_err)?
        };

        let document = ExtractionPayload::from_json(payload).map_err(|e| js_err(e.user_message()))?.validate();
        let skipped = document.skipped_count();
        let scale = ViewportScale::new(scale).unwrap_or_default();

        let dom = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let controller = HighlightController::new(
            FragmentIndex::build(document.fragments),
            OverlayManager::new(DomHost::new(dom, container)),
            JsViewer { scale, navigate },
            &config.overlay,
        );
        let controller = Rc::new(RefCell::new(controller));
        let frame_pending = Rc::new(Cell::new(false));

        let weak = Rc::downgrade(&controller);
        let pending = Rc::clone(&frame_pending);
        controller
            .borrow_mut()
            .host_mut()
            .set_wake(Rc::new(move || schedule_frame(weak.clone(), Rc::clone(&pending))));

        let session = HighlightSession {
            controller,
            frame_pending,
            skipped,
        };
        session.page_layer_mounted();
        Ok(session)
    }

    fn request_frame(&self) {
        schedule_frame(Rc::downgrade(&self.controller), Rc::clone(&self.frame_pending));
    }

    /// Text panel click. Returns the number of matches.
    #[wasm_bindgen(js_name = "selectText")]
    pub fn select_text(&self, text: &str) -> usize {
        let resolution = self.controller.borrow_mut().on_fragment_selected(text);
        self.request_frame();
        resolution.map(|r| r.matches).unwrap_or(0)
    }

    #[wasm_bindgen(js_name = "clearSelection")]
    pub fn clear_selection(&self) {
        self.controller.borrow_mut().clear_selection();
    }

    /// The viewer rendered (or re-rendered) its page layer
    #[wasm_bindgen(js_name = "pageLayerMounted")]
    pub fn page_layer_mounted(&self) -> bool {
        let attached = self.controller.borrow_mut().try_attach();
        self.request_frame();
        attached
    }

    #[wasm_bindgen(js_name = "scaleChanged")]
    pub fn scale_changed(&self, scale: f64) -> Result<(), JsValue> {
        let scale = ViewportScale::new(scale).map_err(js_err)?;
        {
            let mut controller = self.controller.borrow_mut();
            controller.viewer_mut().scale = scale;
            controller.on_scale_changed();
        }
        self.request_frame();
        Ok(())
    }

    /// Grouped panel view with the current selection marked
    pub fn panel(&self) -> Result<JsValue, JsValue> {
        let controller = self.controller.borrow();
        let view = text_panel::render(controller.index(), controller.selection());
        serde_wasm_bindgen::to_value(&view).map_err(js_err)
    }

    #[wasm_bindgen(js_name = "skippedFragments")]
    pub fn skipped_fragments(&self) -> usize {
        self.skipped
    }

    pub fn dispose(&self) {
        self.controller.borrow_mut().teardown();
    }
}
