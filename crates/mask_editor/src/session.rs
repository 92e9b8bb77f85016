use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, info};
use ts_rs::TS;

use crate::{
    codec::{MaskBytes, MaskCodec},
    command::{CommandOutcome, EditorCommand},
    config::EditorConfig,
    error::Result,
    history::{HistoryStack, Snapshot},
    stroke::{CompletedStroke, StrokeEngine},
    surface::RasterSurface,
    types::{DecodedImage, Point},
};

/// One mask-editing session: the surface, its history and the base image.
///
/// Every change to the surface is followed by a `record`, and every undo or
/// redo by a `restore`, so the history cursor always matches the pixels.
#[derive(Debug, Clone)]
pub struct EditingSession {
    config: EditorConfig,
    surface: RasterSurface,
    strokes: StrokeEngine,
    history: HistoryStack,
    codec: MaskCodec,
    base_image: Option<DecodedImage>,
}

impl EditingSession {
    /// A session over a transparent canvas with no base image.
    pub fn blank(config: EditorConfig) -> Self {
        Self::start(config, None)
    }

    /// A session seeded from an already decoded base image.
    pub fn with_base_image(config: EditorConfig, base_image: DecodedImage) -> Self {
        Self::start(config, Some(base_image))
    }

    /// Decode `bytes` and start a session from them. No session exists on failure.
    pub fn from_image_bytes(config: EditorConfig, bytes: &[u8]) -> Result<Self> {
        let base_image = MaskCodec::new(config.export.compression).decode_initial_image(bytes)?;
        Ok(Self::with_base_image(config, base_image))
    }

    fn start(config: EditorConfig, base_image: Option<DecodedImage>) -> Self {
        let mut surface = RasterSurface::new(config.canvas.width, config.canvas.height);
        if let Some(image) = &base_image {
            surface.clear_and_composite(image);
        }

        let mut history = match config.history.max_entries {
            Some(max) => HistoryStack::with_max_entries(max),
            None => HistoryStack::new(),
        };
        history.record(surface.snapshot());

        info!(
            "Started {}x{} editing session ({})",
            surface.width(),
            surface.height(),
            if base_image.is_some() { "base image loaded" } else { "blank" }
        );

        Self {
            strokes: StrokeEngine::new(config.brush.initial_brush()),
            codec: MaskCodec::new(config.export.compression),
            config,
            surface,
            history,
            base_image,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn base_image(&self) -> Option<&DecodedImage> {
        self.base_image.as_ref()
    }

    pub fn brush_width(&self) -> u32 {
        self.strokes.brush().width
    }

    pub fn is_drawing(&self) -> bool {
        self.strokes.is_drawing()
    }

    pub fn pointer_down(&mut self, point: Point) -> bool {
        let point = self.clamp(point);
        if let Some(unfinished) = self.strokes.pointer_down(point) {
            self.record_stroke(unfinished);
        }
        true
    }

    pub fn pointer_move(&mut self, point: Point) -> bool {
        let point = self.clamp(point);
        self.strokes.pointer_move(point, &mut self.surface)
    }

    pub fn pointer_up(&mut self) -> bool {
        match self.strokes.pointer_up() {
            Some(stroke) => {
                self.record_stroke(stroke);
                true
            }
            None => false,
        }
    }

    /// Clamp and apply a new brush width; returns the width actually used.
    pub fn set_brush_width(&mut self, width: u32) -> u32 {
        let width = self.config.brush.clamp_width(width);
        self.strokes.set_brush_width(width);
        debug!("Brush width set to {}", width);
        width
    }

    pub fn undo(&mut self) -> bool {
        self.finish_open_stroke();
        match self.history.undo() {
            Some(snapshot) => self.apply(snapshot),
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.finish_open_stroke();
        match self.history.redo() {
            Some(snapshot) => self.apply(snapshot),
            None => false,
        }
    }

    /// Re-composite the base image and record it. No-op without a base image.
    pub fn clear_mask(&mut self) -> bool {
        self.finish_open_stroke();
        let Some(base_image) = &self.base_image else {
            debug!("Clear mask ignored: no base image loaded");
            return false;
        };
        self.surface.clear_and_composite(base_image);
        let index = self.history.record(self.surface.snapshot());
        info!("Mask cleared, recorded snapshot {}", index);
        true
    }

    /// Encode the current surface. Does not touch the surface or history.
    pub fn export_mask(&self) -> Result<MaskBytes> {
        let mask = self.codec.encode_mask(self.surface.pixels())?;
        info!("Exported mask ({} bytes)", mask.len());
        Ok(mask)
    }

    pub fn execute(&mut self, command: EditorCommand) -> Result<CommandOutcome> {
        let applied = match command {
            EditorCommand::PointerDown { x, y } => self.pointer_down(Point::new(x, y)),
            EditorCommand::PointerMove { x, y } => self.pointer_move(Point::new(x, y)),
            EditorCommand::PointerUp => self.pointer_up(),
            EditorCommand::SetBrushWidth { width } => {
                let previous = self.brush_width();
                self.set_brush_width(width) != previous
            }
            EditorCommand::Undo => self.undo(),
            EditorCommand::Redo => self.redo(),
            EditorCommand::ClearMask => self.clear_mask(),
            EditorCommand::ExportMask => return self.export_mask().map(CommandOutcome::Exported),
        };

        Ok(if applied {
            CommandOutcome::Applied
        } else {
            CommandOutcome::Ignored
        })
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            width: self.surface.width(),
            height: self.surface.height(),
            brush_width: self.brush_width(),
            drawing: self.is_drawing(),
            history_len: self.history.len(),
            history_cursor: self.history.cursor(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            has_base_image: self.base_image.is_some(),
            history_bytes: self.history.memory_usage(),
        }
    }

    fn clamp(&self, point: Point) -> Point {
        point.clamped(self.surface.width(), self.surface.height())
    }

    fn record_stroke(&mut self, stroke: CompletedStroke) {
        let index = self.history.record(self.surface.snapshot());
        debug!(
            "Recorded stroke of {} segments at width {} as snapshot {}",
            stroke.segments, stroke.width, index
        );
    }

    /// History navigation during a stroke would leave its pixels unrecorded.
    fn finish_open_stroke(&mut self) {
        if let Some(stroke) = self.strokes.pointer_up() {
            self.record_stroke(stroke);
        }
    }

    fn apply(&mut self, snapshot: Snapshot) -> bool {
        self.surface.restore(&snapshot);
        debug!("Restored snapshot {}", snapshot.index());
        true
    }
}

/// Read-only view of a session for front ends.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema, TS)]
#[ts(export)]
pub struct SessionStatus {
    pub width: u32,
    pub height: u32,
    pub brush_width: u32,
    pub drawing: bool,
    pub history_len: usize,
    pub history_cursor: Option<usize>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub has_base_image: bool,
    pub history_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MaskError;
    use image::{Rgba, RgbaImage};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn config(width: u32, height: u32) -> EditorConfig {
        let mut config = EditorConfig::default();
        config.canvas.width = width;
        config.canvas.height = height;
        config
    }

    fn draw(session: &mut EditingSession, points: &[[f32; 2]]) {
        for command in EditorCommand::stroke(points.iter().copied()) {
            session.execute(command).expect("Drawing never fails");
        }
    }

    fn red_session() -> EditingSession {
        let base = DecodedImage::new(RgbaImage::from_pixel(10, 10, RED));
        EditingSession::with_base_image(config(10, 10), base)
    }

    #[test]
    fn session_starts_with_one_snapshot() {
        let session = red_session();
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history().cursor(), Some(0));
        assert!(session.surface().pixels().pixels().all(|p| *p == RED));
    }

    #[test]
    fn undoing_every_stroke_returns_to_the_loaded_state() {
        let mut session = red_session();
        let loaded = session.surface().pixels().clone();

        for i in 0..6 {
            let y = i as f32;
            draw(&mut session, &[[0.0, y], [9.0, y]]);
        }
        assert_eq!(session.history().len(), 7);

        for _ in 0..6 {
            assert!(session.undo());
        }
        assert!(!session.undo());
        assert!(!session.undo());

        assert_eq!(session.history().cursor(), Some(0));
        assert_eq!(session.surface().pixels(), &loaded);
    }

    #[test]
    fn surface_matches_history_after_every_step() {
        let mut session = red_session();
        draw(&mut session, &[[1.0, 1.0], [8.0, 8.0]]);
        draw(&mut session, &[[8.0, 1.0], [1.0, 8.0]]);
        session.undo();
        session.redo();
        session.undo();
        session.clear_mask();

        let current = session.history().current().expect("history is never empty");
        assert_eq!(session.surface().pixels(), current.pixels());
    }

    #[test]
    fn redo_at_end_is_a_no_op() {
        let mut session = red_session();
        draw(&mut session, &[[0.0, 0.0], [9.0, 9.0]]);
        let before = (session.status(), session.surface().pixels().clone());

        assert_eq!(session.execute(EditorCommand::Redo).expect("redo"), CommandOutcome::Ignored);
        assert_eq!((session.status(), session.surface().pixels().clone()), before);
    }

    #[test]
    fn new_stroke_after_undo_discards_redo() {
        let mut session = red_session();
        draw(&mut session, &[[0.0, 0.0], [9.0, 0.0]]);
        draw(&mut session, &[[0.0, 5.0], [9.0, 5.0]]);
        session.undo();
        let cursor_before = session.history().cursor().expect("cursor");

        draw(&mut session, &[[0.0, 9.0], [9.0, 9.0]]);

        assert_eq!(session.history().len(), cursor_before + 2);
        assert!(!session.redo());
        assert_eq!(session.surface().pixels().get_pixel(4, 5), &RED);
    }

    #[test]
    fn clear_mask_restores_the_loaded_image() {
        let mut session = red_session();
        let loaded = session.surface().pixels().clone();

        session.set_brush_width(3);
        draw(&mut session, &[[0.0, 5.0], [9.0, 5.0]]);
        assert_eq!(session.surface().pixels().get_pixel(5, 5), &Rgba([255, 255, 255, 255]));

        assert!(session.clear_mask());
        assert_eq!(session.surface().pixels(), &loaded);
        assert_eq!(session.history().len(), 3);

        // the cleared state is itself undoable
        assert!(session.undo());
        assert_ne!(session.surface().pixels(), &loaded);
    }

    #[test]
    fn clear_mask_without_base_image_is_a_no_op() {
        let mut session = EditingSession::blank(config(20, 20));
        draw(&mut session, &[[0.0, 0.0], [19.0, 19.0]]);
        let before = session.surface().pixels().clone();

        assert_eq!(session.execute(EditorCommand::ClearMask).expect("clear"), CommandOutcome::Ignored);
        assert_eq!(session.surface().pixels(), &before);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn thin_stroke_exports_exactly_its_line() {
        let mut session = EditingSession::blank(EditorConfig::default());
        session.set_brush_width(1);
        draw(&mut session, &[[0.0, 0.0], [10.0, 10.0]]);

        let mask = match session.execute(EditorCommand::ExportMask).expect("export") {
            CommandOutcome::Exported(mask) => mask,
            other => panic!("unexpected outcome {other:?}"),
        };
        let decoded = MaskCodec::default().decode_mask(&mask).expect("decode");

        assert_eq!(decoded.dimensions(), (300, 300));
        let painted: Vec<(u32, u32)> = decoded
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[3] != 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(painted, (0..=10).map(|i| (i, i)).collect::<Vec<_>>());
        assert!(painted.iter().all(|&(x, y)| x <= 10 && y <= 10));
    }

    #[test]
    fn export_round_trips_reachable_states() {
        let mut session = red_session();
        session.set_brush_width(4);
        draw(&mut session, &[[0.0, 0.0], [9.0, 3.0], [2.0, 9.0]]);

        let mask = session.export_mask().expect("export");
        let decoded = MaskCodec::default().decode_mask(&mask).expect("decode");
        assert_eq!(&decoded, session.surface().pixels());
        assert_eq!(session.export_mask().expect("export"), mask);
    }

    #[test]
    fn undo_mid_stroke_records_the_stroke_first() {
        let mut session = red_session();
        session.pointer_down(Point::new(0.0, 0.0));
        session.pointer_move(Point::new(9.0, 0.0));

        assert!(session.undo());
        assert!(!session.is_drawing());
        assert_eq!(session.history().cursor(), Some(0));
        assert!(session.redo());
        assert_eq!(session.surface().pixels().get_pixel(4, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn brush_width_is_clamped_to_config() {
        let mut session = red_session();
        assert_eq!(session.set_brush_width(50), 20);
        assert_eq!(session.set_brush_width(0), 1);
    }

    #[test]
    fn undecodable_bytes_create_no_session() {
        let result = EditingSession::from_image_bytes(EditorConfig::default(), b"plain text");
        assert!(matches!(result, Err(MaskError::UnsupportedFormat(_))));
    }
}
