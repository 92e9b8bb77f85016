use crate::{
    command::EditorCommand,
    config::EditorConfig,
    gateway::{HttpUploadGateway, UploadGateway},
    session::{EditingSession, SessionStatus},
};
use rmcp::{
    handler::server::tool::IntoCallToolResult, model::{CallToolResult, Content, ServerCapabilities, ServerInfo}, schemars, tool, Error as McpError, ServerHandler
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Request for loading the base image from disk
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct LoadImageRequest {
    #[schemars(description = "Path to a PNG or JPEG file")]
    pub path: String,
}

/// Request for drawing one stroke
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DrawStrokeRequest {
    #[schemars(description = "Surface-local [x, y] points visited by the stroke, in order")]
    pub points: Vec<[f32; 2]>,
    #[schemars(
        description = "Brush width for this and later strokes",
        range(min = 1, max = 20)
    )]
    pub width: Option<u32>,
}

/// Request for changing the brush width
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct BrushWidthRequest {
    #[schemars(range(min = 1, max = 20))]
    pub width: u32,
}

/// Request for exporting the mask
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExportRequest {
    #[schemars(description = "Optional path to write mask.png to")]
    pub path: Option<String>,
}

/// Response describing the session after a tool call
#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct EditResponse {
    #[schemars(description = "What happened")]
    pub message: String,
    #[schemars(description = "Session state after the call, absent before an image is loaded")]
    pub status: Option<SessionStatus>,
}

impl IntoCallToolResult for EditResponse {
    fn into_call_tool_result(self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&self).unwrap_or_else(|_| format!("{:?}", self)),
        )]))
    }
}

/// MCP Server exposing one mask-editing session
#[derive(Clone)]
pub struct MaskEditorMcpServer {
    config: EditorConfig,
    session: Arc<RwLock<Option<EditingSession>>>,
    gateway: Arc<HttpUploadGateway>,
}

impl MaskEditorMcpServer {
    pub fn new(config: EditorConfig) -> crate::error::Result<Self> {
        let gateway = HttpUploadGateway::new(&config.gateway)?;
        Ok(Self {
            config,
            session: Arc::new(RwLock::new(None)),
            gateway: Arc::new(gateway),
        })
    }

    fn status(&self) -> Option<SessionStatus> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(EditingSession::status)
    }

    fn respond(&self, message: impl Into<String>) -> EditResponse {
        EditResponse {
            message: message.into(),
            status: self.status(),
        }
    }

    /// Run `f` against the session, or explain that nothing is loaded yet.
    fn edit<F>(&self, f: F) -> EditResponse
    where
        F: FnOnce(&mut EditingSession) -> String,
    {
        let message = {
            let mut guard = self.session.write().unwrap_or_else(PoisonError::into_inner);
            match guard.as_mut() {
                Some(session) => f(session),
                None => "No image loaded. Please load an image or start a blank canvas first.".to_string(),
            }
        };
        self.respond(message)
    }

    fn replace_session(&self, session: EditingSession) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }
}

#[tool(tool_box)]
impl MaskEditorMcpServer {
    #[tool(description = "Load the base photograph (PNG or JPEG) and start a new editing session")]
    fn load_image(&self, #[tool(aggr)] LoadImageRequest { path }: LoadImageRequest) -> EditResponse {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => return self.respond(format!("Failed to read {}: {}", path, e)),
        };
        match EditingSession::from_image_bytes(self.config.clone(), &bytes) {
            Ok(session) => {
                self.replace_session(session);
                self.respond(format!("Image loaded successfully from {}", path))
            }
            Err(e) => self.respond(format!("Failed to load image from {}: {}", path, e.user_message())),
        }
    }

    #[tool(description = "Start a new editing session on a transparent canvas")]
    fn start_blank(&self) -> EditResponse {
        self.replace_session(EditingSession::blank(self.config.clone()));
        self.respond("Started blank canvas")
    }

    #[tool(description = "Draw one stroke through the given points and record it in history")]
    fn draw_stroke(&self, #[tool(aggr)] DrawStrokeRequest { points, width }: DrawStrokeRequest) -> EditResponse {
        self.edit(|session| {
            if let Some(width) = width {
                session.set_brush_width(width);
            }
            let count = points.len();
            for command in EditorCommand::stroke(points) {
                if let Err(e) = session.execute(command) {
                    return format!("Stroke failed: {}", e);
                }
            }
            format!("Drew stroke through {} points at width {}", count, session.brush_width())
        })
    }

    #[tool(description = "Set the brush width used by the next stroke")]
    fn set_brush_width(&self, #[tool(aggr)] BrushWidthRequest { width }: BrushWidthRequest) -> EditResponse {
        self.edit(|session| format!("Brush width is {}", session.set_brush_width(width)))
    }

    #[tool(description = "Undo the last stroke or clear")]
    fn undo(&self) -> EditResponse {
        self.edit(|session| if session.undo() { "Undone".into() } else { "Nothing to undo".into() })
    }

    #[tool(description = "Redo the last undone step")]
    fn redo(&self) -> EditResponse {
        self.edit(|session| if session.redo() { "Redone".into() } else { "Nothing to redo".into() })
    }

    #[tool(description = "Remove all strokes by reloading the base image")]
    fn clear_mask(&self) -> EditResponse {
        self.edit(|session| {
            if session.clear_mask() { "Mask cleared".into() } else { "No base image to clear back to".into() }
        })
    }

    #[tool(description = "Encode the canvas as mask.png, optionally writing it to a file")]
    fn export_mask(&self, #[tool(aggr)] ExportRequest { path }: ExportRequest) -> EditResponse {
        self.edit(|session| {
            let mask = match session.export_mask() {
                Ok(mask) => mask,
                Err(e) => return format!("Export failed: {}", e.user_message()),
            };
            match path {
                Some(path) => match std::fs::write(&path, mask.as_bytes()) {
                    Ok(()) => format!("Wrote {} byte mask to {}", mask.len(), path),
                    Err(e) => format!("Failed to write {}: {}", path, e),
                },
                None => mask.to_data_url(),
            }
        })
    }

    #[tool(description = "Export the mask and upload it to the inpainting backend")]
    async fn upload_mask(&self) -> EditResponse {
        let exported = {
            let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
            guard.as_ref().map(EditingSession::export_mask)
        };
        let mask = match exported {
            Some(Ok(mask)) => mask,
            Some(Err(e)) => return self.respond(format!("Export failed: {}", e.user_message())),
            None => return self.respond("No image loaded. Please load an image first."),
        };

        match self.gateway.upload_mask(mask).await {
            Ok(receipt) => self.respond(receipt.message().unwrap_or("Mask uploaded successfully!").to_string()),
            Err(e) => self.respond(format!("Failed to upload mask: {}", e.user_message())),
        }
    }

    #[tool(description = "Get the current session state")]
    fn session_status(&self) -> EditResponse {
        self.respond("Current session state")
    }

    #[tool(description = "Get the JSON schema for EditorCommand")]
    fn get_command_schema(&self) -> String {
        let schema = EditorCommand::schema();
        serde_json::to_string_pretty(&schema)
            .unwrap_or_else(|e| format!("Failed to serialize schema: {}", e))
    }
}

#[tool(tool_box)]
impl ServerHandler for MaskEditorMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Mask Editor Server - Paint a mask over an uploaded photograph with brush strokes, undo/redo them, and export or upload the mask for inpainting.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MaskCodec;

    fn server() -> MaskEditorMcpServer {
        let mut config = EditorConfig::default();
        config.canvas.width = 32;
        config.canvas.height = 32;
        MaskEditorMcpServer::new(config).expect("client builds")
    }

    #[test]
    fn edits_require_a_session() {
        let server = server();
        let response = server.undo();
        assert!(response.message.starts_with("No image loaded"));
        assert!(response.status.is_none());
    }

    #[test]
    fn stroke_then_undo_round_trips_through_tools() {
        let server = server();
        server.start_blank();

        let drawn = server.draw_stroke(DrawStrokeRequest {
            points: vec![[1.0, 1.0], [30.0, 30.0]],
            width: Some(3),
        });
        let status = drawn.status.expect("session exists");
        assert_eq!((status.history_len, status.brush_width), (2, 3));

        let undone = server.undo();
        assert_eq!(undone.message, "Undone");
        assert_eq!(undone.status.and_then(|s| s.history_cursor), Some(0));
    }

    #[test]
    fn export_without_path_returns_data_url() {
        let server = server();
        server.start_blank();
        let response = server.export_mask(ExportRequest { path: None });
        assert!(response.message.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn export_writes_file() {
        let server = server();
        server.start_blank();
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("mask.png");

        server.export_mask(ExportRequest { path: Some(path.display().to_string()) });

        let bytes = std::fs::read(&path).expect("mask written");
        let decoded = MaskCodec::default()
            .decode_initial_image(&bytes)
            .expect("valid PNG");
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }
}
