//! Output formats, extension normalization and pixel modes

use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use shared_utils::ConvertError;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The seven formats the engine can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpg,
    Webp,
    Gif,
    Bmp,
    Tiff,
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Png,
        OutputFormat::Jpg,
        OutputFormat::Webp,
        OutputFormat::Gif,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
        OutputFormat::Avif,
    ];

    /// Canonical lowercase extension used to name output files.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Webp => "webp",
            OutputFormat::Gif => "gif",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn supports_alpha(&self) -> bool {
        !matches!(self, OutputFormat::Jpg | OutputFormat::Bmp)
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpg => ImageFormat::Jpeg,
            OutputFormat::Webp => ImageFormat::WebP,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Bmp => ImageFormat::Bmp,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::Avif => ImageFormat::Avif,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_uppercase())
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = fold_extension_alias(&s.trim().trim_start_matches('.').to_ascii_lowercase());
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.extension() == key)
            .ok_or_else(|| ConvertError::InvalidOutputFormat(s.to_string()))
    }
}

/// Map synonymous extensions onto one comparison key.
fn fold_extension_alias(ext: &str) -> String {
    match ext {
        "jpeg" | "jpe" | "jfif" => "jpg".to_string(),
        "tif" => "tiff".to_string(),
        other => other.to_string(),
    }
}

/// Lowercased, alias-folded extension of `path`, used only for the same-format check.
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| fold_extension_alias(&e))
}

/// Extensions of every format the decoder registry can read, sorted and deduplicated.
pub fn supported_input_extensions() -> Vec<&'static str> {
    let mut exts: Vec<&'static str> = ImageFormat::all()
        .filter(|f| f.reading_enabled())
        .flat_map(|f| f.extensions_str().iter().copied())
        .collect();
    exts.sort_unstable();
    exts.dedup();
    exts
}

/// Pixel layout of an in-memory raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorMode {
    Grayscale,
    Rgb,
    Rgba,
    Palette,
}

impl ColorMode {
    /// Gray+alpha reports `Rgba`: what matters downstream is whether alpha exists.
    pub fn of(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_) => ColorMode::Grayscale,
            DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgb32F(_) => ColorMode::Rgb,
            _ if image.color().has_alpha() => ColorMode::Rgba,
            _ => ColorMode::Rgb,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, ColorMode::Rgba)
    }
}

/// A decoded raster owned by the conversion of exactly one file.
#[derive(Debug)]
pub struct ImageHandle {
    pixels: DynamicImage,
    mode: ColorMode,
}

impl ImageHandle {
    pub fn new(pixels: DynamicImage) -> Self {
        let mode = ColorMode::of(&pixels);
        Self { pixels, mode }
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.pixels.width(), self.pixels.height())
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> DynamicImage {
        self.pixels
    }
}
