use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::HighlightConfig;
use crate::coordinate_mapping::ViewportScale;
use crate::error::SyncError;
use crate::fragment::{ExtractionPayload, SkippedFragment, ValidatedDocument};
use crate::index::FragmentIndex;
use crate::logging::PerformanceTimer;
use crate::markdown::{self, RunKind};
use crate::overlay::headless::HeadlessDom;
use crate::overlay::{OverlayManager, OverlayShape, SurfaceSize};
use crate::pdf_viewer::{Navigation, RecordingViewer, ZoomMode};
use crate::sync::{HighlightController, SelectionState};
use crate::text_panel;

/// Read and validate an extraction payload from disk
pub fn load_document(path: &Path) -> Result<ValidatedDocument> {
    let _timer = PerformanceTimer::start(format!("load {}", path.display()));
    let json = std::fs::read_to_string(path).map_err(|e| SyncError::file_io(path.display().to_string(), e))?;
    let payload = ExtractionPayload::from_json(&json)?;
    Ok(payload.validate())
}

/// Summarize a payload's index
pub fn index_command(payload: PathBuf) -> Result<()> {
    info!("🔍 Indexing payload: {:?}", payload);
    let document = load_document(&payload)?;
    let skipped = document.skipped.clone();
    let index = FragmentIndex::build(document.fragments);

    println!("  \\___/>");
    println!("  [o-·-o]");
    println!("  (\")~(\")  📇 Fragment index built");
    if let Some(id) = &document.id {
        println!("          Document: {}", id);
    }
    println!("          Fragments: {}", index.len());
    println!("          Distinct texts: {}", index.distinct_texts());
    println!(
        "          Pages: {}",
        index.pages().iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
    );
    println!("          Skipped: {}", skipped.len());
    for SkippedFragment { position, reason } in &skipped {
        println!("            #{}: {}", position, reason);
    }

    Ok(())
}

/// Print the text panel (grouped by page) or the formatted text runs
pub fn panel_command(
    payload: PathBuf,
    select: Option<String>,
    formatted: bool,
    width: usize,
    config: &HighlightConfig,
) -> Result<()> {
    let document = load_document(&payload)?;
    let formatted_text = document.formatted_text.clone();
    let index = FragmentIndex::build(document.fragments);
    let selection = select.map(SelectionState::Selected).unwrap_or_default();

    if !formatted {
        let view = text_panel::render(&index, &selection);
        print!("{}", view.to_plain_text(width));
        info!(selected = view.selected_count(), "Panel rendered");
        return Ok(());
    }

    let text = match formatted_text {
        Some(t) => markdown::normalize(&t)?,
        None => markdown::group_text_by_lines(index.fragments(), config.overlay.line_tolerance),
    };
    let rendered: String = markdown::text_runs(&text, &index, &selection)
        .into_iter()
        .map(|run| match run.kind {
            RunKind::Word if run.selected => format!("[{}]", run.text),
            _ => run.text,
        })
        .collect();
    for line in rendered.lines() {
        for wrapped in textwrap::wrap(line, width.max(10)) {
            println!("{}", wrapped);
        }
    }
    Ok(())
}

/// Everything one headless highlight run produced
#[derive(Debug, Serialize)]
pub struct HighlightReport {
    pub generated_at: DateTime<Utc>,
    pub text: String,
    pub scale: ViewportScale,
    pub surface: SurfaceSize,
    pub navigations: Vec<Navigation>,
    pub shapes: Vec<OverlayShape>,
    pub skipped_fragments: usize,
}

pub struct HighlightArgs {
    pub payload: PathBuf,
    pub text: String,
    pub scale: Option<f64>,
    pub zoom: Option<ZoomMode>,
    pub viewport: SurfaceSize,
    pub page_size: SurfaceSize,
    pub json: bool,
}

/// Run the engine against a headless page layer and report what it did
pub fn highlight_command(args: HighlightArgs, config: &HighlightConfig) -> Result<()> {
    let report = run_highlight(&args, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("  \\___/>");
    println!("  [o-·-o]");
    println!("  (\")~(\")  🖍️  Highlighted \"{}\"", report.text);
    println!("          Scale: {}", report.scale.get());
    println!("          Surface: {}", report.surface);
    println!("          Navigations: {}", report.navigations.len());
    for nav in &report.navigations {
        let b: [f64; 4] = nav.bbox.into();
        println!("            page {} @ {:?}", nav.page, b);
    }
    println!("          Shapes: {}", report.shapes.len());
    for shape in &report.shapes {
        let r = shape.rect;
        println!(
            "            left={} top={} width={} height={}",
            r.left, r.top, r.width, r.height
        );
    }
    Ok(())
}

pub fn run_highlight(args: &HighlightArgs, config: &HighlightConfig) -> Result<HighlightReport> {
    let document = load_document(&args.payload)?;
    let skipped_fragments = document.skipped_count();
    let index = FragmentIndex::build(document.fragments);

    let scale = match args.scale {
        Some(s) => ViewportScale::new(s)?,
        None => args
            .zoom
            .unwrap_or(config.viewer.zoom)
            .resolve(args.page_size, args.viewport),
    };

    let mut dom = HeadlessDom::new();
    dom.mount_page_layer(&config.overlay.page_layer_selector, args.viewport);

    let mut controller = HighlightController::new(
        index,
        OverlayManager::new(dom),
        RecordingViewer::new(scale),
        &config.overlay,
    );
    controller.attach()?;
    controller.on_fragment_selected(args.text.clone());
    controller.run_frame();

    let surface = controller
        .surface()
        .ok_or_else(|| anyhow!("overlay surface went away during the frame"))?;

    Ok(HighlightReport {
        generated_at: Utc::now(),
        text: args.text.clone(),
        scale,
        surface: surface.size(),
        navigations: controller.viewer().navigations().to_vec(),
        shapes: surface.shapes().to_vec(),
        skipped_fragments,
    })
}

pub fn config_show_command(config: &HighlightConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn config_init_command(path: PathBuf) -> Result<()> {
    if path.exists() {
        return Err(anyhow!("Refusing to overwrite existing file: {:?}", path));
    }
    HighlightConfig::default().save_to_file(&path)?;
    println!("⚙️  Default configuration written to {:?}", path);
    Ok(())
}
