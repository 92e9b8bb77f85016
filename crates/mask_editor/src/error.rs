use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to encode mask: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Upload rejected with status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    RemoteRejection { status: u16, message: Option<String> },

    #[error("No image loaded")]
    NoImageLoaded,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Editing session has shut down")]
    SessionClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaskError {
    /// Text shown to the user when an operation fails at a boundary.
    pub fn user_message(&self) -> String {
        match self {
            Self::RemoteRejection { message: Some(message), .. } => message.clone(),
            Self::RemoteRejection { status, message: None } => {
                format!("Failed to upload mask (status {status})")
            }
            Self::NetworkFailure(_) => "Error uploading mask".to_string(),
            Self::UnsupportedFormat(_) => "The selected file is not a PNG or JPEG image".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MaskError>;
