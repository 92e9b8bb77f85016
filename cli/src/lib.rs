use mask_editor::{CommandOutcome, EditingSession, EditorCommand, MaskBytes, MaskError};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Editor(#[from] MaskError),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// A recorded editing session: an optional starting brush width followed by
/// the commands to replay against the loaded image.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct EditScript {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brush_width: Option<u32>,
    #[serde(default)]
    pub commands: Vec<EditorCommand>,
}

impl EditScript {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load the script
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// Run every command against `session`.
    ///
    /// Returns the mask from the last `export_mask` command, if the script
    /// contained one.
    pub fn replay(&self, session: &mut EditingSession) -> Result<Option<MaskBytes>, CliError> {
        if let Some(width) = self.brush_width {
            session.set_brush_width(width);
        }

        let mut exported = None;
        for command in &self.commands {
            debug!("Replaying {}", command);
            if let CommandOutcome::Exported(mask) = session.execute(command.clone())? {
                exported = Some(mask);
            }
        }
        Ok(exported)
    }

    /// Replay the script and always finish with a fresh export.
    pub fn render(&self, session: &mut EditingSession) -> Result<MaskBytes, CliError> {
        self.replay(session)?;
        Ok(session.export_mask()?)
    }
}
