use std::{fs, path::Path, time::Duration};

use image::Rgba;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    codec::MaskCompression,
    error::{MaskError, Result},
    types::Brush,
};

/// Session configuration, passed explicitly to every component that needs it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EditorConfig {
    pub canvas: CanvasConfig,
    pub brush: BrushConfig,
    pub history: HistoryConfig,
    pub export: ExportConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: 300, height: 300 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BrushConfig {
    pub min_width: u32,
    pub max_width: u32,
    pub default_width: u32,
    /// Stroke colour as RGBA.
    pub color: [u8; 4],
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            min_width: 1,
            max_width: 20,
            default_width: 5,
            color: [255, 255, 255, 255],
        }
    }
}

impl BrushConfig {
    /// Clamp a requested width into the configured range.
    pub fn clamp_width(&self, width: u32) -> u32 {
        width.clamp(self.min_width, self.max_width)
    }

    pub fn initial_brush(&self) -> Brush {
        Brush::new(self.clamp_width(self.default_width), Rgba(self.color))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HistoryConfig {
    /// Upper bound on retained snapshots; unbounded when absent.
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExportConfig {
    pub compression: MaskCompression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub mask_path: String,
    pub image_path: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            mask_path: "/upload-mask".to_string(),
            image_path: "/upload-image".to_string(),
            timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    pub fn mask_url(&self) -> String {
        join_url(&self.base_url, &self.mask_path)
    }

    pub fn image_url(&self) -> String {
        join_url(&self.base_url, &self.image_path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

impl EditorConfig {
    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EditorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: EditorConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format from the extension and load
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(MaskError::InvalidConfig(format!(
                "{} is neither a .toml nor a .json file",
                path.display()
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(MaskError::InvalidConfig(format!(
                "canvas must not be empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }

        let brush = &self.brush;
        if brush.min_width == 0 || brush.min_width > brush.max_width {
            return Err(MaskError::InvalidConfig(format!(
                "brush width range {}..={} is invalid",
                brush.min_width, brush.max_width
            )));
        }
        if !(brush.min_width..=brush.max_width).contains(&brush.default_width) {
            return Err(MaskError::InvalidConfig(format!(
                "default brush width {} is outside {}..={}",
                brush.default_width, brush.min_width, brush.max_width
            )));
        }

        if self.history.max_entries == Some(0) {
            return Err(MaskError::InvalidConfig("history.max_entries must be at least 1".to_string()));
        }
        Ok(())
    }
}
