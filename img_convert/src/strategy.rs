//! Format Strategy Module
//!
//! Per-format table of pixel transform plus encoder parameters. The engine looks a
//! strategy up by target format, applies its transform to the decoded raster and hands
//! the result to the matching encoder.

use crate::formats::{ColorMode, ImageHandle, OutputFormat};
use crate::gif_palette::{self, IndexedImage};
use image::codecs::avif::AvifEncoder;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::error::{EncodingError, ImageFormatHint};
use image::{DynamicImage, ImageError, ImageFormat, ImageResult};
use serde::Serialize;
use std::io::{Seek, Write};

pub const JPEG_QUALITY: u8 = 95;
pub const AVIF_QUALITY: u8 = 90;
/// Speed used by the AVIF encoder's own default constructor.
pub const AVIF_SPEED: u8 = 4;

/// How the decoded pixels are reshaped before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelTransform {
    /// Keep mode and bit depth, narrowing only what the encoder cannot take.
    Preserve,
    /// 8-bit RGB, or 8-bit RGBA when the source has alpha.
    Preserve8,
    /// 8-bit RGB with alpha dropped.
    FlattenRgb,
    /// Transparent-keyed adaptive palette.
    Palette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatStrategy {
    pub transform: PixelTransform,
    /// Lossy quality 1-100; `None` for lossless targets.
    pub quality: Option<u8>,
    pub reason: &'static str,
}

impl Default for FormatStrategy {
    fn default() -> Self {
        Self {
            transform: PixelTransform::Preserve,
            quality: None,
            reason: "lossless passthrough with encoder defaults",
        }
    }
}

pub fn strategy_for(format: OutputFormat) -> FormatStrategy {
    match format {
        OutputFormat::Jpg => FormatStrategy {
            transform: PixelTransform::FlattenRgb,
            quality: Some(JPEG_QUALITY),
            reason: "JPEG has no alpha channel; flatten to RGB at high quality",
        },
        OutputFormat::Bmp => FormatStrategy {
            transform: PixelTransform::FlattenRgb,
            quality: None,
            reason: "BMP written as 24-bit RGB",
        },
        OutputFormat::Webp => FormatStrategy {
            transform: PixelTransform::Preserve8,
            quality: None,
            reason: "lossless WebP keeps RGBA exactly",
        },
        OutputFormat::Avif => FormatStrategy {
            transform: PixelTransform::Preserve8,
            quality: Some(AVIF_QUALITY),
            reason: "AVIF at quality 90 keeping alpha",
        },
        OutputFormat::Gif => FormatStrategy {
            transform: PixelTransform::Palette,
            quality: None,
            reason: "adaptive palette with index 0 as the transparency key",
        },
        OutputFormat::Png | OutputFormat::Tiff => FormatStrategy::default(),
    }
}

/// Pixels in the shape the target encoder expects.
#[derive(Debug)]
pub enum PreparedImage {
    Raster(ImageHandle),
    Indexed(IndexedImage),
}

impl PreparedImage {
    pub fn mode(&self) -> ColorMode {
        match self {
            PreparedImage::Raster(handle) => handle.mode(),
            PreparedImage::Indexed(_) => ColorMode::Palette,
        }
    }
}

impl FormatStrategy {
    /// Consume the decoded handle and reshape it for `format`.
    pub fn apply(&self, handle: ImageHandle, format: OutputFormat) -> PreparedImage {
        let has_alpha = handle.mode().has_alpha();
        let pixels = handle.into_pixels();

        let reshaped = match self.transform {
            PixelTransform::Palette => {
                let canvas = gif_palette::composite_on_transparent(&pixels);
                return PreparedImage::Indexed(gif_palette::quantize(&canvas));
            }
            PixelTransform::FlattenRgb => DynamicImage::ImageRgb8(pixels.to_rgb8()),
            PixelTransform::Preserve8 if has_alpha => DynamicImage::ImageRgba8(pixels.to_rgba8()),
            PixelTransform::Preserve8 => DynamicImage::ImageRgb8(pixels.to_rgb8()),
            PixelTransform::Preserve => pixels,
        };

        PreparedImage::Raster(ImageHandle::new(fit_to_encoder(reshaped, format)))
    }
}

/// Widen or narrow pixel layouts the target encoder has no mode for.
fn fit_to_encoder(image: DynamicImage, format: OutputFormat) -> DynamicImage {
    match (format, image) {
        (_, DynamicImage::ImageRgb32F(img)) => {
            DynamicImage::ImageRgb16(DynamicImage::ImageRgb32F(img).to_rgb16())
        }
        (_, DynamicImage::ImageRgba32F(img)) => {
            DynamicImage::ImageRgba16(DynamicImage::ImageRgba32F(img).to_rgba16())
        }
        (OutputFormat::Tiff, DynamicImage::ImageLumaA8(img)) => {
            DynamicImage::ImageRgba8(DynamicImage::ImageLumaA8(img).to_rgba8())
        }
        (OutputFormat::Tiff, DynamicImage::ImageLumaA16(img)) => {
            DynamicImage::ImageRgba16(DynamicImage::ImageLumaA16(img).to_rgba16())
        }
        (_, other) => other,
    }
}

/// Encode prepared pixels with the strategy's parameters.
pub fn encode<W: Write + Seek>(
    prepared: PreparedImage,
    format: OutputFormat,
    strategy: &FormatStrategy,
    mut writer: W,
) -> ImageResult<()> {
    let pixels = match prepared {
        PreparedImage::Indexed(indexed) => return encode_gif(&indexed, writer),
        PreparedImage::Raster(handle) => handle.into_pixels(),
    };

    match format {
        OutputFormat::Jpg => {
            let quality = strategy.quality.unwrap_or(JPEG_QUALITY);
            pixels.write_with_encoder(JpegEncoder::new_with_quality(writer, quality))
        }
        OutputFormat::Png => pixels.write_with_encoder(PngEncoder::new(writer)),
        OutputFormat::Webp => pixels.write_with_encoder(WebPEncoder::new_lossless(writer)),
        OutputFormat::Avif => {
            let quality = strategy.quality.unwrap_or(AVIF_QUALITY);
            pixels.write_with_encoder(AvifEncoder::new_with_speed_quality(
                writer, AVIF_SPEED, quality,
            ))
        }
        OutputFormat::Bmp => pixels.write_with_encoder(BmpEncoder::new(&mut writer)),
        OutputFormat::Tiff => pixels.write_with_encoder(TiffEncoder::new(writer)),
        // a raster reaching the GIF encoder still needs its transparency key
        OutputFormat::Gif => {
            let canvas = gif_palette::composite_on_transparent(&pixels);
            encode_gif(&gif_palette::quantize(&canvas), writer)
        }
    }
}

fn encode_gif<W: Write>(indexed: &IndexedImage, writer: W) -> ImageResult<()> {
    gif_palette::write_gif(indexed, writer)
        .map(|_| ())
        .map_err(|e| match e {
            gif::EncodingError::Io(io) => ImageError::IoError(io),
            other => ImageError::Encoding(EncodingError::new(
                ImageFormatHint::Exact(ImageFormat::Gif),
                other,
            )),
        })
}
