use crate::{
    surface::RasterSurface,
    types::{Brush, Point},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrokeState {
    Idle,
    Drawing {
        last: Point,
        /// Width sampled on pointer-down; later brush changes do not apply.
        width: u32,
        segments: usize,
    },
}

/// Summary of a stroke handed back on pointer-up so the caller can record it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletedStroke {
    pub width: u32,
    pub segments: usize,
}

/// Turns pointer events into line segments rasterized onto a [`RasterSurface`].
#[derive(Debug, Clone)]
pub struct StrokeEngine {
    state: StrokeState,
    brush: Brush,
}

impl StrokeEngine {
    pub fn new(brush: Brush) -> Self {
        Self {
            state: StrokeState::Idle,
            brush,
        }
    }

    pub fn state(&self) -> StrokeState {
        self.state
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, StrokeState::Drawing { .. })
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    /// Takes effect from the next pointer-down.
    pub fn set_brush_width(&mut self, width: u32) {
        self.brush.width = width;
    }

    /// Begin a stroke at `point`.
    ///
    /// A pointer-down while a stroke is still open completes that stroke first,
    /// and it is returned so the caller can record it.
    pub fn pointer_down(&mut self, point: Point) -> Option<CompletedStroke> {
        let unfinished = self.pointer_up();
        self.state = StrokeState::Drawing {
            last: point,
            width: self.brush.width,
            segments: 0,
        };
        unfinished
    }

    /// Rasterize a segment from the last point to `point`. No-op while idle.
    pub fn pointer_move(&mut self, point: Point, surface: &mut RasterSurface) -> bool {
        let StrokeState::Drawing { last, width, segments } = self.state else {
            return false;
        };

        let brush = Brush::new(width, self.brush.color);
        surface.draw(last, point, &brush);
        self.state = StrokeState::Drawing {
            last: point,
            width,
            segments: segments + 1,
        };
        true
    }

    /// Finish the open stroke. Returns `None` when idle.
    pub fn pointer_up(&mut self) -> Option<CompletedStroke> {
        match std::mem::replace(&mut self.state, StrokeState::Idle) {
            StrokeState::Drawing { width, segments, .. } => Some(CompletedStroke { width, segments }),
            StrokeState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn engine() -> StrokeEngine {
        StrokeEngine::new(Brush::new(1, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn moves_while_idle_are_ignored() {
        let mut engine = engine();
        let mut surface = RasterSurface::new(10, 10);

        assert!(!engine.pointer_move(Point::new(5.0, 5.0), &mut surface));
        assert!(surface.pixels().pixels().all(|p| p.0[3] == 0));
        assert_eq!(engine.pointer_up(), None);
    }

    #[test]
    fn stroke_draws_each_segment() {
        let mut engine = engine();
        let mut surface = RasterSurface::new(10, 10);

        engine.pointer_down(Point::new(0.0, 0.0));
        engine.pointer_move(Point::new(4.0, 0.0), &mut surface);
        engine.pointer_move(Point::new(4.0, 4.0), &mut surface);
        let stroke = engine.pointer_up().expect("Stroke should complete");

        assert_eq!(stroke.segments, 2);
        assert_eq!(surface.pixels().get_pixel(2, 0).0[3], 255);
        assert_eq!(surface.pixels().get_pixel(4, 2).0[3], 255);
        assert_eq!(engine.state(), StrokeState::Idle);
    }

    #[test]
    fn width_is_sampled_when_the_stroke_starts() {
        let mut engine = engine();
        let mut surface = RasterSurface::new(20, 20);

        engine.pointer_down(Point::new(2.0, 10.0));
        engine.set_brush_width(9);
        engine.pointer_move(Point::new(17.0, 10.0), &mut surface);
        let stroke = engine.pointer_up().expect("Stroke should complete");

        assert_eq!(stroke.width, 1);
        assert_eq!(surface.pixels().get_pixel(10, 11).0[3], 0);

        engine.pointer_down(Point::new(2.0, 10.0));
        engine.pointer_move(Point::new(17.0, 10.0), &mut surface);
        assert_eq!(engine.pointer_up().map(|s| s.width), Some(9));
        assert_eq!(surface.pixels().get_pixel(10, 13).0[3], 255);
    }

    #[test]
    fn second_pointer_down_completes_open_stroke() {
        let mut engine = engine();
        let mut surface = RasterSurface::new(10, 10);

        engine.pointer_down(Point::new(0.0, 0.0));
        engine.pointer_move(Point::new(3.0, 3.0), &mut surface);
        let unfinished = engine.pointer_down(Point::new(5.0, 5.0));

        assert_eq!(unfinished, Some(CompletedStroke { width: 1, segments: 1 }));
        assert!(engine.is_drawing());
    }
}
