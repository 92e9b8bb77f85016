use image::{Pixel, Rgba, RgbaImage, imageops};
use imageproc::drawing::BresenhamLineIter;

use crate::{
    history::Snapshot,
    types::{Brush, DecodedImage, Point},
};

/// Fixed-size RGBA pixel buffer the mask is painted onto.
///
/// The buffer is only ever written through [`draw`](Self::draw),
/// [`clear_and_composite`](Self::clear_and_composite) and [`restore`](Self::restore).
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.image
    }

    /// Blend a round-capped line of the brush width and colour between two points.
    ///
    /// Width 1 follows the Bresenham rasterization exactly; wider brushes cover
    /// every pixel centre within half the width of the segment.
    pub fn draw(&mut self, start: Point, end: Point, brush: &Brush) {
        if brush.width <= 1 {
            for (x, y) in BresenhamLineIter::new((start.x, start.y), (end.x, end.y)) {
                self.blend_pixel(x, y, brush.color);
            }
            return;
        }

        let radius = brush.radius();
        let min_x = (start.x.min(end.x) - radius).floor().max(0.0) as i64;
        let min_y = (start.y.min(end.y) - radius).floor().max(0.0) as i64;
        let max_x = ((start.x.max(end.x) + radius).ceil() as i64).min(self.width() as i64 - 1);
        let max_y = ((start.y.max(end.y) + radius).ceil() as i64).min(self.height() as i64 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let centre = Point::new(x as f32, y as f32);
                if distance_to_segment(centre, start, end) <= radius {
                    self.blend_pixel(x as i32, y as i32, brush.color);
                }
            }
        }
    }

    /// Wipe the buffer and draw `source` scaled to the surface dimensions.
    pub fn clear_and_composite(&mut self, source: &DecodedImage) {
        let (width, height) = (self.width(), self.height());
        let scaled = if source.width() == width && source.height() == height {
            source.pixels().clone()
        } else {
            imageops::resize(source.pixels(), width, height, imageops::FilterType::Triangle)
        };

        self.image = RgbaImage::new(width, height);
        imageops::overlay(&mut self.image, &scaled, 0, 0);
    }

    /// Capture an owned copy of the current pixels.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.image)
    }

    /// Replace every pixel with the contents of `snapshot`.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        if snapshot.width() != self.width() || snapshot.height() != self.height() {
            tracing::warn!(
                "Ignoring snapshot of {}x{} for a {}x{} surface",
                snapshot.width(),
                snapshot.height(),
                self.width(),
                self.height()
            );
            return;
        }
        self.image.copy_from_slice(snapshot.pixels().as_raw());
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return;
        }
        self.image.get_pixel_mut(x as u32, y as u32).blend(&color);
    }
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance_to(Point::new(a.x + t * dx, a.y + t * dy))
}
