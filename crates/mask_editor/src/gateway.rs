use std::future::Future;

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    codec::MaskBytes,
    config::GatewayConfig,
    error::{MaskError, Result},
};

/// Successful response from the inpainting backend.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub status: u16,
    /// Parsed JSON body, `Null` when the body was not JSON.
    pub body: Value,
}

impl UploadReceipt {
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

/// Remote endpoint that receives source images and painted masks.
pub trait UploadGateway: Send + Sync {
    fn upload_mask(&self, mask: MaskBytes) -> impl Future<Output = Result<UploadReceipt>> + Send;

    fn upload_image(
        &self,
        file_name: String,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<UploadReceipt>> + Send;
}

/// Multipart HTTP client for the `/upload-mask` and `/upload-image` endpoints.
#[derive(Debug, Clone)]
pub struct HttpUploadGateway {
    client: reqwest::Client,
    mask_url: String,
    image_url: String,
}

impl HttpUploadGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| MaskError::NetworkFailure(e.to_string()))?;
        Ok(Self {
            client,
            mask_url: config.mask_url(),
            image_url: config.image_url(),
        })
    }

    async fn post(&self, url: &str, form: Form) -> Result<UploadReceipt> {
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("Upload to {} failed: {}", url, e);
                MaskError::NetworkFailure(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| MaskError::NetworkFailure(e.to_string()))?;
        interpret_response(status, &body)
    }
}

impl UploadGateway for HttpUploadGateway {
    async fn upload_mask(&self, mask: MaskBytes) -> Result<UploadReceipt> {
        info!("Uploading {} byte mask to {}", mask.len(), self.mask_url);
        let part = Part::bytes(mask.into_vec())
            .file_name(MaskBytes::FILE_NAME)
            .mime_str(MaskBytes::MIME_TYPE)
            .map_err(|e| MaskError::NetworkFailure(e.to_string()))?;
        self.post(&self.mask_url, Form::new().part("mask", part)).await
    }

    async fn upload_image(&self, file_name: String, bytes: Vec<u8>) -> Result<UploadReceipt> {
        info!("Uploading source image {} to {}", file_name, self.image_url);
        let mime = mime_for(&file_name);
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| MaskError::NetworkFailure(e.to_string()))?;
        self.post(&self.image_url, Form::new().part("image", part)).await
    }
}

/// Map an HTTP status and body onto a receipt or a rejection.
pub fn interpret_response(status: u16, body: &str) -> Result<UploadReceipt> {
    let json: Option<Value> = serde_json::from_str(body).ok();
    if (200..300).contains(&status) {
        return Ok(UploadReceipt {
            status,
            body: json.unwrap_or(Value::Null),
        });
    }

    let message = json
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    warn!("Upload rejected with status {}", status);
    Err(MaskError::RemoteRejection { status, message })
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
