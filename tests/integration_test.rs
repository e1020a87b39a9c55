use chonker_highlight::cli::{run_highlight, HighlightArgs};
use chonker_highlight::config::{HighlightConfig, OverlayConfig};
use chonker_highlight::overlay::headless::HeadlessDom;
use chonker_highlight::sync::FrameReport;
use chonker_highlight::{
    text_panel, ExtractionPayload, FragmentIndex, HighlightController, OverlayManager, PanelIntent, RecordingViewer,
    SelectionState, SurfaceRect, SurfaceSize, ViewportScale, ZoomMode,
};
use std::fs;
use tempfile::tempdir;

const INTRO_PAYLOAD: &str = r#"{
    "id": 7,
    "url": "https://example.org/report.pdf",
    "data": [
        {"text": "Intro", "page": 1, "bbox": [10, 10, 50, 20]},
        {"text": "Intro", "page": 3, "bbox": [5, 5, 45, 15]},
        {"text": "broken", "page": 0, "bbox": [0, 0, 1, 1]},
        {"text": "Summary", "page": 2, "bbox": [1, 2, 3]}
    ]
}"#;

fn engine(scale: f64) -> HighlightController<HeadlessDom, RecordingViewer> {
    let document = ExtractionPayload::from_json(INTRO_PAYLOAD).unwrap().validate();
    let config = OverlayConfig::default();
    let mut dom = HeadlessDom::new();
    dom.mount_page_layer(&config.page_layer_selector, SurfaceSize::new(1224, 1584));
    HighlightController::new(
        FragmentIndex::build(document.fragments),
        OverlayManager::new(dom),
        RecordingViewer::new(ViewportScale::new(scale).unwrap()),
        &config,
    )
}

#[test]
fn test_intro_scenario_end_to_end() {
    let mut engine = engine(2.0);
    assert!(engine.try_attach());

    let view = text_panel::render(engine.index(), engine.selection());
    let click = view.pages[0].spans[0].intent();
    assert_eq!(click, PanelIntent::FragmentSelected("Intro".to_string()));
    engine.dispatch(click);

    let report = engine.run_frame();
    assert_eq!(
        report,
        FrameReport {
            attached: false,
            resized: false,
            redrawn: true,
            shapes: 2
        }
    );

    let pages: Vec<u32> = engine.viewer().navigations().iter().map(|n| n.page).collect();
    assert_eq!(pages, vec![1, 3]);

    let rects: Vec<SurfaceRect> = engine.surface().unwrap().shapes().iter().map(|s| s.rect).collect();
    assert_eq!(
        rects,
        vec![SurfaceRect::new(20.0, 20.0, 80.0, 20.0), SurfaceRect::new(10.0, 10.0, 80.0, 20.0)]
    );

    // The canvas shows exactly what the surface recorded
    let canvas = *engine.surface().unwrap().canvas();
    assert_eq!(engine.host().canvas(canvas).unwrap().visible.len(), 2);

    let view = text_panel::render(engine.index(), engine.selection());
    assert_eq!(view.selected_count(), 2);
}

#[test]
fn test_nonexistent_selection() {
    let mut engine = engine(2.0);
    engine.try_attach();
    engine.on_fragment_selected("Nonexistent");
    engine.run_frame();

    assert!(engine.viewer().navigations().is_empty());
    assert_eq!(engine.surface().unwrap().shape_count(), 0);
    assert_eq!(engine.selection(), &SelectionState::Selected("Nonexistent".to_string()));
}

#[test]
fn test_malformed_fragments_are_skipped_and_counted() {
    let document = ExtractionPayload::from_json(INTRO_PAYLOAD).unwrap().validate();
    assert_eq!(document.fragments.len(), 2);
    assert_eq!(document.skipped_count(), 2);
    assert_eq!(document.skipped[0].position, 2);
}

#[test]
fn test_selection_switch_never_leaves_old_shapes() {
    let mut engine = engine(1.0);
    engine.try_attach();
    engine.on_fragment_selected("Intro");
    engine.run_frame();
    engine.on_fragment_selected("Nonexistent");
    engine.run_frame();

    let canvas = *engine.surface().unwrap().canvas();
    assert!(engine.host().canvas(canvas).unwrap().visible.is_empty());
}

#[test]
fn test_dropping_the_engine_detaches_the_overlay() {
    let config = OverlayConfig::default();
    let mut dom = HeadlessDom::new();
    let layer = dom.mount_page_layer(&config.page_layer_selector, SurfaceSize::new(100, 100));
    let mut engine = HighlightController::new(
        FragmentIndex::default(),
        OverlayManager::new(dom),
        RecordingViewer::default(),
        &config,
    );
    engine.try_attach();
    assert_eq!(engine.host().children(layer).len(), 1);

    engine.teardown();
    assert!(engine.host().children(layer).is_empty());
    assert_eq!(engine.host().observer_count(), 0);
}

#[test]
fn test_headless_highlight_command_report() {
    let dir = tempdir().unwrap();
    let payload = dir.path().join("payload.json");
    fs::write(&payload, INTRO_PAYLOAD).unwrap();

    let args = HighlightArgs {
        payload,
        text: "Intro".to_string(),
        scale: None,
        zoom: Some(ZoomMode::PageWidth),
        viewport: SurfaceSize::new(1224, 1584),
        page_size: SurfaceSize::new(612, 792),
        json: true,
    };
    let report = run_highlight(&args, &HighlightConfig::default()).unwrap();

    assert_eq!(report.scale.get(), 2.0);
    assert_eq!(report.navigations.len(), 2);
    assert_eq!(report.shapes[0].rect, SurfaceRect::new(20.0, 20.0, 80.0, 20.0));
    assert_eq!(report.skipped_fragments, 2);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["generated_at"].is_string());
    assert_eq!(json["shapes"][0]["style"]["stroke"], "green");
}

#[test]
fn test_highlight_command_rejects_unreadable_payload() {
    let dir = tempdir().unwrap();
    let payload = dir.path().join("garbage.json");
    fs::write(&payload, "not json").unwrap();

    let args = HighlightArgs {
        payload,
        text: "Intro".to_string(),
        scale: Some(1.0),
        zoom: None,
        viewport: SurfaceSize::new(10, 10),
        page_size: SurfaceSize::new(10, 10),
        json: false,
    };
    let err = run_highlight(&args, &HighlightConfig::default()).unwrap_err();
    let sync = err.downcast_ref::<chonker_highlight::SyncError>().unwrap();
    assert!(!sync.is_recoverable());
}
