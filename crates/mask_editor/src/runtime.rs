//! Serial event loop that owns an [`EditingSession`].
//!
//! Pointer and control commands, image decode completions and state queries
//! all travel through one queue and are applied by one task, so a decode that
//! finishes mid-stroke can never interleave with it. Decoding runs on the
//! blocking pool and re-enters the queue when done; uploads are spawned and
//! report back through [`Notice`]s without touching the session.

use std::sync::Arc;

use image::RgbaImage;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    codec::MaskCodec,
    command::{CommandOutcome, EditorCommand},
    config::EditorConfig,
    error::{MaskError, Result},
    gateway::UploadGateway,
    session::{EditingSession, SessionStatus},
    types::DecodedImage,
};

/// User-facing notifications emitted by the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    SessionStarted { width: u32, height: u32 },
    LoadFailed { message: String },
    /// The mask was encoded and its upload is in flight.
    ExportStarted { bytes: usize },
    ExportFailed { message: String },
    UploadSucceeded { message: Option<String> },
    UploadFailed { message: String },
}

enum Message {
    Command(EditorCommand),
    StartBlank,
    Load(Vec<u8>),
    Decoded { generation: u64, result: Result<DecodedImage> },
    Status(oneshot::Sender<Option<SessionStatus>>),
    Pixels(oneshot::Sender<Option<RgbaImage>>),
    Shutdown,
}

/// Cloneable sender side of the editor loop.
#[derive(Debug, Clone)]
pub struct EditorHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(command) => write!(f, "Command({command})"),
            Self::StartBlank => write!(f, "StartBlank"),
            Self::Load(bytes) => write!(f, "Load({} bytes)", bytes.len()),
            Self::Decoded { generation, .. } => write!(f, "Decoded({generation})"),
            Self::Status(_) => write!(f, "Status"),
            Self::Pixels(_) => write!(f, "Pixels"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl EditorHandle {
    pub fn send(&self, command: EditorCommand) -> Result<()> {
        self.post(Message::Command(command))
    }

    /// Start over on a transparent canvas with no base image.
    pub fn start_blank(&self) -> Result<()> {
        self.post(Message::StartBlank)
    }

    /// Decode `bytes` off the loop and start a new session from them.
    /// Only the most recent load is applied.
    pub fn load_image(&self, bytes: Vec<u8>) -> Result<()> {
        self.post(Message::Load(bytes))
    }

    pub async fn status(&self) -> Result<Option<SessionStatus>> {
        let (reply, rx) = oneshot::channel();
        self.post(Message::Status(reply))?;
        rx.await.map_err(|_| MaskError::SessionClosed)
    }

    pub async fn pixels(&self) -> Result<Option<RgbaImage>> {
        let (reply, rx) = oneshot::channel();
        self.post(Message::Pixels(reply))?;
        rx.await.map_err(|_| MaskError::SessionClosed)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.post(Message::Shutdown)
    }

    fn post(&self, message: Message) -> Result<()> {
        self.tx.send(message).map_err(|_| MaskError::SessionClosed)
    }
}

pub struct EditorLoop<G> {
    config: EditorConfig,
    codec: MaskCodec,
    gateway: Arc<G>,
    session: Option<EditingSession>,
    rx: mpsc::UnboundedReceiver<Message>,
    reentry: mpsc::WeakUnboundedSender<Message>,
    notices: mpsc::UnboundedSender<Notice>,
    load_generation: u64,
}

impl<G> EditorLoop<G>
where
    G: UploadGateway + 'static,
{
    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(
        config: EditorConfig,
        gateway: G,
    ) -> (EditorHandle, mpsc::UnboundedReceiver<Notice>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notices, notice_rx) = mpsc::unbounded_channel();

        let editor = Self {
            codec: MaskCodec::new(config.export.compression),
            config,
            gateway: Arc::new(gateway),
            session: None,
            rx,
            reentry: tx.downgrade(),
            notices,
            load_generation: 0,
        };
        let task = tokio::spawn(editor.run());
        (EditorHandle { tx }, notice_rx, task)
    }

    async fn run(mut self) {
        info!("Editor loop started");
        while let Some(message) = self.rx.recv().await {
            match message {
                Message::Command(command) => self.handle_command(command),
                Message::StartBlank => {
                    // a pending decode must not replace the blank session later
                    self.load_generation += 1;
                    self.begin(EditingSession::blank(self.config.clone()));
                }
                Message::Load(bytes) => self.start_decode(bytes),
                Message::Decoded { generation, result } => self.finish_decode(generation, result),
                Message::Status(reply) => {
                    let _ = reply.send(self.session.as_ref().map(EditingSession::status));
                }
                Message::Pixels(reply) => {
                    let pixels = self.session.as_ref().map(|s| s.surface().pixels().clone());
                    let _ = reply.send(pixels);
                }
                Message::Shutdown => break,
            }
        }
        info!("Editor loop stopped");
    }

    fn handle_command(&mut self, command: EditorCommand) {
        let Some(session) = self.session.as_mut() else {
            debug!("Dropping {} before any image is loaded", command);
            return;
        };

        match session.execute(command) {
            Ok(CommandOutcome::Exported(mask)) => {
                self.notify(Notice::ExportStarted { bytes: mask.len() });
                let gateway = Arc::clone(&self.gateway);
                let notices = self.notices.clone();
                tokio::spawn(async move {
                    let notice = match gateway.upload_mask(mask).await {
                        Ok(receipt) => Notice::UploadSucceeded {
                            message: receipt.message().map(str::to_owned),
                        },
                        Err(e) => Notice::UploadFailed { message: e.user_message() },
                    };
                    let _ = notices.send(notice);
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Export failed: {}", e);
                self.notify(Notice::ExportFailed { message: e.user_message() });
            }
        }
    }

    fn start_decode(&mut self, bytes: Vec<u8>) {
        self.load_generation += 1;
        let generation = self.load_generation;
        let codec = self.codec;
        let reentry = self.reentry.clone();
        debug!("Decoding {} byte image (load {})", bytes.len(), generation);

        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || codec.decode_initial_image(&bytes))
                .await
                .unwrap_or_else(|e| Err(MaskError::UnsupportedFormat(format!("decoder stopped: {e}"))));
            if let Some(tx) = reentry.upgrade() {
                let _ = tx.send(Message::Decoded { generation, result });
            }
        });
    }

    fn finish_decode(&mut self, generation: u64, result: Result<DecodedImage>) {
        if generation != self.load_generation {
            debug!("Discarding stale decode {} (latest is {})", generation, self.load_generation);
            return;
        }

        match result {
            Ok(image) => self.begin(EditingSession::with_base_image(self.config.clone(), image)),
            Err(e) => {
                warn!("Could not load image: {}", e);
                self.notify(Notice::LoadFailed { message: e.user_message() });
            }
        }
    }

    fn begin(&mut self, session: EditingSession) {
        let status = session.status();
        self.session = Some(session);
        self.notify(Notice::SessionStarted {
            width: status.width,
            height: status.height,
        });
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }
}
