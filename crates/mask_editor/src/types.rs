use std::sync::Arc;

use image::{Rgba, RgbaImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Surface-local pointer position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamp into the pixel grid of a `width` x `height` surface.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        Self {
            x: self.x.clamp(0.0, max_x),
            y: self.y.clamp(0.0, max_y),
        }
    }

    pub fn distance_to(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

/// Session-scoped brush settings read by the stroke engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub width: u32,
    pub color: Rgba<u8>,
}

impl Brush {
    pub fn new(width: u32, color: Rgba<u8>) -> Self {
        Self { width, color }
    }

    /// Distance from the stroke centre line that still counts as covered.
    pub fn radius(&self) -> f32 {
        self.width.max(1) as f32 / 2.0
    }
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            width: 5,
            color: Rgba([255, 255, 255, 255]),
        }
    }
}

/// A decoded raster ready for compositing. Cloning shares the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
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
}

impl From<RgbaImage> for DecodedImage {
    fn from(pixels: RgbaImage) -> Self {
        Self::new(pixels)
    }
}
