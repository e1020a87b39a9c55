use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};
use crate::overlay::ShapeStyle;
use crate::pdf_viewer::ZoomMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub overlay: OverlayConfig,
    pub viewer: ViewerConfig,
    pub logging: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// CSS selector of the viewer's page layer the overlay mounts on
    pub page_layer_selector: String,

    pub highlight: ShapeStyle,

    /// Max vertical drift (document units) for words to share a line
    pub line_tolerance: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub zoom: ZoomMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub log_dir: PathBuf,
    pub enable_file_logging: bool,
    pub enable_json_format: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            page_layer_selector: ".rpv-core__page-layer".to_string(),
            highlight: ShapeStyle::default(),
            line_tolerance: 5.0,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            enable_file_logging: false,
            enable_json_format: false,
        }
    }
}

impl HighlightConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::file_io(path.display().to_string(), e))?;

        toml::from_str(&content)
            .map_err(|e| SyncError::configuration(format!("Failed to parse config file: {}", e)))
    }

    pub fn load_from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// File (if given) first, then environment overrides on top
    pub fn load(path: Option<&Path>) -> SyncResult<Self> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(selector) = std::env::var("CHONKER_PAGE_LAYER_SELECTOR") {
            if !selector.trim().is_empty() {
                self.overlay.page_layer_selector = selector;
            }
        }

        if let Ok(fill) = std::env::var("CHONKER_HIGHLIGHT_FILL") {
            self.overlay.highlight.fill = fill;
        }

        if let Ok(stroke) = std::env::var("CHONKER_HIGHLIGHT_STROKE") {
            self.overlay.highlight.stroke = stroke;
        }

        if let Ok(level) = std::env::var("CHONKER_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SyncResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| SyncError::file_io(path.display().to_string(), e))?;

        Ok(())
    }

    pub fn to_toml(&self) -> SyncResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SyncError::configuration(format!("Failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = HighlightConfig::default();
        assert_eq!(config.overlay.page_layer_selector, ".rpv-core__page-layer");
        assert_eq!(config.overlay.highlight.fill, "rgba(0, 255, 0, 0.3)");
        assert_eq!(config.overlay.highlight.stroke, "green");
        assert_eq!(config.overlay.highlight.stroke_width, 2.0);
        assert_eq!(config.overlay.line_tolerance, 5.0);
        assert_eq!(config.viewer.zoom, ZoomMode::PageFit);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = HighlightConfig::default();
        config.overlay.line_tolerance = 3.5;
        config.viewer.zoom = ZoomMode::Custom(1.25);

        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("highlight.toml");
        config.save_to_file(&config_path).unwrap();

        let loaded = HighlightConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.overlay.line_tolerance, 3.5);
        assert_eq!(loaded.viewer.zoom, ZoomMode::Custom(1.25));
        assert_eq!(loaded.overlay.highlight, ShapeStyle::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "[viewer]\nzoom = \"page-width\"\n").unwrap();

        let loaded = HighlightConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.viewer.zoom, ZoomMode::PageWidth);
        assert_eq!(loaded.overlay.page_layer_selector, ".rpv-core__page-layer");
    }

    #[test]
    fn test_bad_files_are_reported() {
        let temp_dir = tempdir().unwrap();
        let missing = HighlightConfig::load_from_file(temp_dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(SyncError::FileIO { .. })));

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "overlay = [").unwrap();
        assert!(matches!(
            HighlightConfig::load_from_file(&broken),
            Err(SyncError::Configuration { .. })
        ));
    }
}
