//! # Mask Editor
//!
//! Interactive mask painting for an inpainting backend: a fixed-size raster
//! surface, a pointer-driven stroke engine, a linear undo/redo history and a
//! PNG codec for exporting the painted mask.
//!
//! ## Core Features
//!
//! - **Raster Surface**: blend round-capped brush strokes into an RGBA buffer
//! - **Stroke Engine**: idle/drawing state machine fed by pointer events
//! - **History Stack**: undo/redo over snapshots stored as changed regions
//! - **Mask Codec**: PNG/JPEG ingestion and deterministic PNG export
//! - **Upload Gateway**: multipart upload of the mask to `/upload-mask`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mask_editor::{EditingSession, EditorCommand, EditorConfig};
//!
//! let photo = std::fs::read("photo.jpg")?;
//! let mut session = EditingSession::from_image_bytes(EditorConfig::default(), &photo)?;
//!
//! for command in EditorCommand::stroke([[10.0, 10.0], [120.0, 80.0]]) {
//!     session.execute(command)?;
//! }
//! session.undo();
//! session.redo();
//!
//! let mask = session.export_mask()?;
//! std::fs::write("mask.png", mask.as_bytes())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Event Loop
//!
//! ```rust,no_run
//! use mask_editor::{EditorCommand, EditorConfig, EditorLoop, HttpUploadGateway};
//!
//! # async fn run() -> mask_editor::Result<()> {
//! let config = EditorConfig::default();
//! let gateway = HttpUploadGateway::new(&config.gateway)?;
//! let (editor, mut notices, _task) = EditorLoop::spawn(config, gateway);
//!
//! editor.load_image(std::fs::read("photo.png")?)?;
//! editor.send(EditorCommand::ExportMask)?;
//! while let Some(notice) = notices.recv().await {
//!     println!("{notice:?}");
//! }
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod surface;
pub mod stroke;
pub mod history;
pub mod codec;
pub mod config;
pub mod command;
pub mod session;
pub mod runtime;
pub mod gateway;
pub mod mcp;

// Re-exports for convenience
pub use error::{MaskError, Result};
pub use types::{Brush, DecodedImage, Point};
pub use surface::RasterSurface;
pub use stroke::{CompletedStroke, StrokeEngine, StrokeState};
pub use history::{HistoryStack, Snapshot};
pub use codec::{MaskBytes, MaskCodec, MaskCompression};
pub use config::EditorConfig;
pub use command::{CommandOutcome, EditorCommand};
pub use session::{EditingSession, SessionStatus};
pub use runtime::{EditorHandle, EditorLoop, Notice};
pub use gateway::{HttpUploadGateway, UploadGateway, UploadReceipt};
