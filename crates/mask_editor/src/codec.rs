use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{
    ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage,
    codecs::png::{CompressionType, FilterType, PngEncoder},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    error::{MaskError, Result},
    types::DecodedImage,
};

/// PNG-encoded mask ready to be attached to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskBytes {
    bytes: Vec<u8>,
}

impl MaskBytes {
    pub const MIME_TYPE: &'static str = "image/png";
    pub const FILE_NAME: &'static str = "mask.png";

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:image/png;base64,...` form, as a browser canvas would export it.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", Self::MIME_TYPE, STANDARD.encode(&self.bytes))
    }
}

impl From<Vec<u8>> for MaskBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// zlib effort used for exported masks. Every level is lossless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MaskCompression {
    Fast,
    #[default]
    Default,
    Best,
}

impl From<MaskCompression> for CompressionType {
    fn from(value: MaskCompression) -> Self {
        match value {
            MaskCompression::Fast => CompressionType::Fast,
            MaskCompression::Default => CompressionType::Default,
            MaskCompression::Best => CompressionType::Best,
        }
    }
}

/// Decodes the uploaded photograph and encodes the painted mask.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaskCodec {
    compression: MaskCompression,
}

impl MaskCodec {
    pub fn new(compression: MaskCompression) -> Self {
        Self { compression }
    }

    /// Decode PNG or JPEG bytes. Anything else is [`MaskError::UnsupportedFormat`].
    pub fn decode_initial_image(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let format = image::guess_format(bytes)
            .map_err(|e| MaskError::UnsupportedFormat(e.to_string()))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            return Err(MaskError::UnsupportedFormat(format!("{format:?}")));
        }

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| MaskError::UnsupportedFormat(e.to_string()))?;
        tracing::debug!("Decoded {:?} image of {}x{}", format, decoded.width(), decoded.height());
        Ok(DecodedImage::new(decoded.to_rgba8()))
    }

    /// Encode `pixels` as PNG. Equal pixels always produce equal bytes.
    pub fn encode_mask(&self, pixels: &RgbaImage) -> Result<MaskBytes> {
        let mut bytes = Vec::new();
        PngEncoder::new_with_quality(&mut bytes, self.compression.into(), FilterType::Adaptive)
            .write_image(pixels.as_raw(), pixels.width(), pixels.height(), ExtendedColorType::Rgba8)
            .map_err(MaskError::Encode)?;
        Ok(MaskBytes::from(bytes))
    }

    /// Decode an exported mask back into RGBA pixels.
    pub fn decode_mask(&self, mask: &MaskBytes) -> Result<RgbaImage> {
        let decoded = image::load_from_memory_with_format(mask.as_bytes(), ImageFormat::Png)
            .map_err(|e| MaskError::UnsupportedFormat(e.to_string()))?;
        Ok(decoded.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, codecs::jpeg::JpegEncoder};

    fn sample() -> RgbaImage {
        RgbaImage::from_fn(12, 7, |x, y| Rgba([(x * 20) as u8, (y * 30) as u8, 90, if x % 3 == 0 { 0 } else { 255 }]))
    }

    #[test]
    fn garbage_is_unsupported() {
        let err = MaskCodec::default()
            .decode_initial_image(b"definitely not an image")
            .expect_err("Should reject garbage");
        assert!(matches!(err, MaskError::UnsupportedFormat(_)));
    }

    #[test]
    fn other_raster_formats_are_unsupported() {
        let gif_header = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        let err = MaskCodec::default()
            .decode_initial_image(gif_header)
            .expect_err("Should reject GIF");
        assert!(matches!(err, MaskError::UnsupportedFormat(_)));
    }

    #[test]
    fn truncated_png_is_unsupported() {
        let codec = MaskCodec::default();
        let mask = codec.encode_mask(&sample()).expect("Should encode");
        let truncated = &mask.as_bytes()[..mask.len() / 2];

        assert!(matches!(
            codec.decode_initial_image(truncated),
            Err(MaskError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn png_round_trip_is_pixel_exact() {
        let codec = MaskCodec::new(MaskCompression::Best);
        let image = sample();

        let mask = codec.encode_mask(&image).expect("Should encode");
        assert_eq!(&codec.decode_mask(&mask).expect("Should decode"), &image);

        let reloaded = codec.decode_initial_image(mask.as_bytes()).expect("PNG is accepted");
        assert_eq!(reloaded.pixels(), &image);
    }

    #[test]
    fn jpeg_is_accepted() {
        let mut bytes = Vec::new();
        let photo = RgbImage::from_pixel(16, 9, Rgb([200, 40, 40]));
        JpegEncoder::new_with_quality(&mut bytes, 90)
            .encode_image(&photo)
            .expect("Should encode JPEG");

        let decoded = MaskCodec::default().decode_initial_image(&bytes).expect("JPEG is accepted");
        assert_eq!((decoded.width(), decoded.height()), (16, 9));
        assert!(decoded.pixels().pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn encoding_is_deterministic() {
        let codec = MaskCodec::default();
        let first = codec.encode_mask(&sample()).expect("Should encode");
        let second = codec.encode_mask(&sample()).expect("Should encode");
        assert_eq!(first, second);
    }

    #[test]
    fn data_url_has_png_prefix() {
        let mask = MaskCodec::default().encode_mask(&sample()).expect("Should encode");
        assert!(mask.to_data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
