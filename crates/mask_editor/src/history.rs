//! Linear undo/redo history of surface snapshots.
//!
//! Only the snapshot at the cursor is held in full. Every step between two
//! neighbouring snapshots is kept as a [`PixelDelta`] covering the bounding
//! box of the pixels that changed, so a long session costs roughly the size
//! of its strokes rather than one full buffer per stroke.

use std::sync::Arc;

use image::{RgbaImage, imageops};
use imageproc::rect::Rect;

/// Immutable capture of the surface pixels at one point in the history.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    index: usize,
    pixels: Arc<RgbaImage>,
}

impl Snapshot {
    /// Copy `image` into a new snapshot. The index is assigned when it is recorded.
    pub fn capture(image: &RgbaImage) -> Self {
        Self {
            index: 0,
            pixels: Arc::new(image.clone()),
        }
    }

    /// Position of this snapshot in the history it was recorded into.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn memory_size(&self) -> usize {
        self.pixels.as_raw().len()
    }

    fn with_index(self, index: usize) -> Self {
        Self { index, ..self }
    }
}

/// Changed region between two consecutive snapshots.
#[derive(Debug, Clone)]
struct PixelDelta {
    region: Option<Rect>,
    before: RgbaImage,
    after: RgbaImage,
}

impl PixelDelta {
    fn between(old: &RgbaImage, new: &RgbaImage) -> Self {
        let region = changed_region(old, new);
        let (before, after) = match region {
            Some(rect) => (crop(old, rect), crop(new, rect)),
            None => (RgbaImage::new(0, 0), RgbaImage::new(0, 0)),
        };
        Self { region, before, after }
    }

    /// Turn the newer snapshot back into the older one.
    fn revert(&self, newer: &RgbaImage) -> RgbaImage {
        self.patch(newer, &self.before)
    }

    /// Turn the older snapshot into the newer one.
    fn replay(&self, older: &RgbaImage) -> RgbaImage {
        self.patch(older, &self.after)
    }

    fn patch(&self, base: &RgbaImage, pixels: &RgbaImage) -> RgbaImage {
        let mut out = base.clone();
        if let Some(rect) = self.region {
            imageops::replace(&mut out, pixels, rect.left() as i64, rect.top() as i64);
        }
        out
    }

    fn memory_size(&self) -> usize {
        self.before.as_raw().len() + self.after.as_raw().len()
    }
}

fn changed_region(old: &RgbaImage, new: &RgbaImage) -> Option<Rect> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for ((x, y, a), b) in old.enumerate_pixels().zip(new.pixels()) {
        if a == b {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0 + 1, y1 - y0 + 1))
}

fn crop(image: &RgbaImage, rect: Rect) -> RgbaImage {
    imageops::crop_imm(image, rect.left() as u32, rect.top() as u32, rect.width(), rect.height()).to_image()
}

/// Ordered snapshots plus a cursor.
///
/// The cursor is `None` only while nothing has been recorded. Recording after
/// an undo discards every snapshot past the cursor before appending.
#[derive(Debug, Clone, Default)]
pub struct HistoryStack {
    current: Option<Snapshot>,
    deltas: Vec<PixelDelta>,
    cursor: Option<usize>,
    max_entries: Option<usize>,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_entries` snapshots, dropping the oldest first.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries.max(1)),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        match self.current {
            Some(_) => self.deltas.len() + 1,
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The snapshot at the cursor, which mirrors what the surface shows.
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.len())
    }

    /// Append `snapshot` after the cursor and move the cursor onto it.
    /// Returns the index it was recorded at.
    pub fn record(&mut self, snapshot: Snapshot) -> usize {
        let index = match (self.cursor, self.current.take()) {
            (Some(cursor), Some(current)) => {
                self.deltas.truncate(cursor);
                self.deltas.push(PixelDelta::between(current.pixels(), snapshot.pixels()));
                cursor + 1
            }
            _ => 0,
        };
        self.current = Some(snapshot.with_index(index));
        self.cursor = Some(index);
        self.prune();
        self.cursor.unwrap_or(index)
    }

    /// Step back one snapshot. Returns `None` at the first snapshot.
    pub fn undo(&mut self) -> Option<Snapshot> {
        let cursor = self.cursor.filter(|&c| c > 0)?;
        let current = self.current.as_ref()?;
        let pixels = self.deltas[cursor - 1].revert(current.pixels());
        Some(self.move_to(cursor - 1, pixels))
    }

    /// Step forward one snapshot. Returns `None` at the last snapshot.
    pub fn redo(&mut self) -> Option<Snapshot> {
        let cursor = self.cursor.filter(|&c| c + 1 < self.len())?;
        let current = self.current.as_ref()?;
        let pixels = self.deltas[cursor].replay(current.pixels());
        Some(self.move_to(cursor + 1, pixels))
    }

    /// Rebuild the snapshot at `index` without moving the cursor.
    pub fn snapshot_at(&self, index: usize) -> Option<Snapshot> {
        let cursor = self.cursor?;
        let current = self.current.as_ref()?;
        if index >= self.len() {
            return None;
        }

        let mut pixels = current.pixels().clone();
        if index < cursor {
            for delta in self.deltas[index..cursor].iter().rev() {
                pixels = delta.revert(&pixels);
            }
        } else {
            for delta in &self.deltas[cursor..index] {
                pixels = delta.replay(&pixels);
            }
        }
        Some(Snapshot {
            index,
            pixels: Arc::new(pixels),
        })
    }

    /// Bytes held by the full snapshot and every stored delta.
    pub fn memory_usage(&self) -> usize {
        let full = self.current.as_ref().map_or(0, Snapshot::memory_size);
        full + self.deltas.iter().map(PixelDelta::memory_size).sum::<usize>()
    }

    fn move_to(&mut self, index: usize, pixels: RgbaImage) -> Snapshot {
        let snapshot = Snapshot {
            index,
            pixels: Arc::new(pixels),
        };
        self.current = Some(snapshot.clone());
        self.cursor = Some(index);
        snapshot
    }

    fn prune(&mut self) {
        let (Some(max), Some(cursor)) = (self.max_entries, self.cursor) else {
            return;
        };
        let excess = self.len().saturating_sub(max).min(cursor);
        if excess == 0 {
            return;
        }

        self.deltas.drain(..excess);
        let cursor = cursor - excess;
        self.cursor = Some(cursor);
        self.current = self.current.take().map(|s| s.with_index(cursor));
        tracing::debug!("Pruned {} oldest history entries", excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// A 16x16 frame with the first `n` pixels of row 3 painted.
    fn frame(n: u32) -> Snapshot {
        let mut image = RgbaImage::new(16, 16);
        for x in 0..n {
            image.put_pixel(x, 3, Rgba([255, 255, 255, 255]));
        }
        Snapshot::capture(&image)
    }

    fn history_of(count: u32) -> HistoryStack {
        let mut history = HistoryStack::new();
        for n in 0..count {
            history.record(frame(n));
        }
        history
    }

    #[test]
    fn empty_history_has_no_cursor() {
        let mut history = HistoryStack::new();
        assert_eq!(history.cursor(), None);
        assert!(history.is_empty());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }

    #[test]
    fn undo_stops_at_first_snapshot() {
        let mut history = history_of(5);
        for _ in 0..4 {
            assert!(history.undo().is_some());
        }
        for _ in 0..3 {
            assert!(history.undo().is_none());
        }

        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.current().map(Snapshot::pixels), Some(frame(0).pixels()));
    }

    #[test]
    fn undo_and_redo_return_exact_snapshots() {
        let mut history = history_of(4);

        let back = history.undo().expect("Should undo");
        assert_eq!(back.index(), 2);
        assert_eq!(back.pixels(), frame(2).pixels());

        let forward = history.redo().expect("Should redo");
        assert_eq!(forward.index(), 3);
        assert_eq!(forward.pixels(), frame(3).pixels());
    }

    #[test]
    fn redo_at_end_changes_nothing() {
        let mut history = history_of(3);
        let before = history.current().cloned();

        assert!(history.redo().is_none());
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.len(), 3);
        assert_eq!(history.current().cloned(), before);
    }

    #[test]
    fn record_after_undo_discards_redo_branch() {
        let mut history = history_of(5);
        history.undo();
        history.undo();
        let cursor_before = history.cursor().expect("cursor");

        history.record(frame(9));

        assert_eq!(history.len(), cursor_before + 2);
        assert!(history.redo().is_none());
        assert_eq!(history.current().map(Snapshot::pixels), Some(frame(9).pixels()));
        assert_eq!(history.undo().map(|s| s.pixels().clone()).as_ref(), Some(frame(2).pixels()));
    }

    #[test]
    fn snapshot_at_rebuilds_any_index() {
        let mut history = history_of(6);
        history.undo();
        history.undo();

        for n in 0..6 {
            let snapshot = history.snapshot_at(n as usize).expect("index in range");
            assert_eq!(snapshot.pixels(), frame(n).pixels());
        }
        assert!(history.snapshot_at(6).is_none());
        assert_eq!(history.cursor(), Some(3));
    }

    #[test]
    fn identical_snapshots_are_still_recorded() {
        let mut history = HistoryStack::new();
        history.record(frame(2));
        history.record(frame(2));

        assert_eq!(history.len(), 2);
        assert!(history.can_undo());
    }

    #[test]
    fn deltas_are_smaller_than_full_copies() {
        let history = history_of(10);
        let full = frame(0).memory_size();
        assert!(history.memory_usage() < full * 2);
    }

    #[test]
    fn capped_history_moves_the_floor_forward() {
        let mut history = HistoryStack::with_max_entries(3);
        for n in 0..6 {
            history.record(frame(n));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), Some(2));
        history.undo();
        let floor = history.undo().expect("Should reach floor");
        assert_eq!(floor.index(), 0);
        assert_eq!(floor.pixels(), frame(3).pixels());
        assert!(history.undo().is_none());
    }
}
