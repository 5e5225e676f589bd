//! GIF Palette Module
//!
//! Reduces an RGBA raster to an indexed image for GIF output. Index 0 is reserved as
//! the transparency key; every fully transparent pixel maps there and nothing else does.

use color_quant::NeuQuant;
use image::{imageops, DynamicImage, RgbaImage};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;

pub const TRANSPARENT_INDEX: u8 = 0;

/// Colors available for opaque pixels once the transparency slot is taken.
const MAX_OPAQUE_COLORS: usize = 255;

/// NeuQuant sampling factor: 1 is slowest and best, 30 fastest.
const NEUQUANT_SAMPLE_FACTOR: i32 = 10;

/// Palette-indexed raster ready for the GIF encoder.
#[derive(Debug, Clone)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    /// Flat RGB triplets; entry 0 is the transparency key.
    pub palette: Vec<u8>,
    /// One palette index per pixel, row-major.
    pub indices: Vec<u8>,
}

impl IndexedImage {
    pub fn palette_len(&self) -> usize {
        self.palette.len() / 3
    }

    pub fn transparent_pixel_count(&self) -> usize {
        self.indices.iter().filter(|&&i| i == TRANSPARENT_INDEX).count()
    }
}

/// Convert to RGBA and paste at the origin of a fully transparent canvas of the same size.
///
/// Pixels are copied, not blended, so alpha values come through untouched.
pub fn composite_on_transparent(image: &DynamicImage) -> RgbaImage {
    let source = image.to_rgba8();
    let mut canvas = RgbaImage::new(source.width(), source.height());
    imageops::replace(&mut canvas, &source, 0, 0);
    canvas
}

/// Build an adaptive palette and map every pixel onto it.
pub fn quantize(rgba: &RgbaImage) -> IndexedImage {
    let (width, height) = rgba.dimensions();

    let mut distinct: HashMap<[u8; 3], u8> = HashMap::new();
    let mut exact = true;
    for px in rgba.pixels() {
        if px[3] == 0 {
            continue;
        }
        let rgb = [px[0], px[1], px[2]];
        if distinct.contains_key(&rgb) {
            continue;
        }
        if distinct.len() == MAX_OPAQUE_COLORS {
            exact = false;
            break;
        }
        let index = (distinct.len() + 1) as u8;
        distinct.insert(rgb, index);
    }

    if exact {
        exact_palette(rgba, width, height, distinct)
    } else {
        neuquant_palette(rgba, width, height)
    }
}

fn exact_palette(
    rgba: &RgbaImage,
    width: u32,
    height: u32,
    lookup: HashMap<[u8; 3], u8>,
) -> IndexedImage {
    let mut palette = vec![0u8; (lookup.len() + 1) * 3];
    for (rgb, &index) in &lookup {
        let offset = index as usize * 3;
        palette[offset..offset + 3].copy_from_slice(rgb);
    }

    let indices = rgba
        .pixels()
        .map(|px| {
            if px[3] == 0 {
                TRANSPARENT_INDEX
            } else {
                lookup
                    .get(&[px[0], px[1], px[2]])
                    .copied()
                    .unwrap_or(TRANSPARENT_INDEX + 1)
            }
        })
        .collect();

    IndexedImage {
        width,
        height,
        palette,
        indices,
    }
}

fn neuquant_palette(rgba: &RgbaImage, width: u32, height: u32) -> IndexedImage {
    let opaque: Vec<u8> = rgba
        .pixels()
        .filter(|px| px[3] != 0)
        .flat_map(|px| [px[0], px[1], px[2], 255])
        .collect();

    let quant = NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, MAX_OPAQUE_COLORS, &opaque);

    let mut palette = vec![0u8; 3];
    palette.extend(quant.color_map_rgb());

    let indices = rgba
        .pixels()
        .map(|px| {
            if px[3] == 0 {
                TRANSPARENT_INDEX
            } else {
                (quant.index_of(&[px[0], px[1], px[2], 255]) + 1) as u8
            }
        })
        .collect();

    IndexedImage {
        width,
        height,
        palette,
        indices,
    }
}

/// Write a single-frame GIF89a with index 0 as the transparency key.
pub fn write_gif<W: Write>(image: &IndexedImage, writer: W) -> Result<W, gif::EncodingError> {
    let (width, height) = gif_dimensions(image)?;

    let mut encoder = gif::Encoder::new(writer, width, height, &image.palette)?;
    let frame = gif::Frame {
        width,
        height,
        transparent: Some(TRANSPARENT_INDEX),
        buffer: Cow::Borrowed(&image.indices),
        ..gif::Frame::default()
    };
    encoder.write_frame(&frame)?;
    encoder.into_inner().map_err(gif::EncodingError::from)
}

fn gif_dimensions(image: &IndexedImage) -> Result<(u16, u16), gif::EncodingError> {
    let too_large = || {
        gif::EncodingError::from(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!(
                "{}x{} exceeds the GIF limit of 65535x65535",
                image.width, image.height
            ),
        ))
    };
    let width = u16::try_from(image.width).map_err(|_| too_large())?;
    let height = u16::try_from(image.height).map_err(|_| too_large())?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn decode_indexed(bytes: &[u8]) -> (Vec<u8>, Option<u8>) {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(bytes).unwrap();
        let frame = decoder.read_next_frame().unwrap().unwrap();
        (frame.buffer.to_vec(), frame.transparent)
    }

    #[test]
    fn test_composite_preserves_alpha_exactly() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 1]));
        img.put_pixel(2, 0, Rgba([10, 20, 30, 255]));

        let canvas = composite_on_transparent(&DynamicImage::ImageRgba8(img.clone()));
        assert_eq!(canvas, img);
    }

    #[test]
    fn test_exact_palette_reserves_index_zero() {
        let mut img = RgbaImage::new(4, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        img.put_pixel(2, 0, Rgba([255, 0, 0, 128]));
        img.put_pixel(3, 0, Rgba([0, 0, 0, 255]));

        let indexed = quantize(&img);
        assert_eq!(indexed.palette_len(), 3);
        assert_eq!(indexed.indices[0], TRANSPARENT_INDEX);
        assert_ne!(indexed.indices[1], TRANSPARENT_INDEX);
        assert_ne!(indexed.indices[2], TRANSPARENT_INDEX);
        assert_eq!(indexed.indices[1], indexed.indices[3]);

        // opaque black must not collide with the transparency key's black
        let i = indexed.indices[1] as usize * 3;
        assert_eq!(&indexed.palette[i..i + 3], &[0, 0, 0]);
        let j = indexed.indices[2] as usize * 3;
        assert_eq!(&indexed.palette[j..j + 3], &[255, 0, 0]);
    }

    #[test]
    fn test_many_colors_fall_back_to_neuquant() {
        let mut img = RgbaImage::new(32, 32);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let alpha = if (x + y) % 7 == 0 { 0 } else { 255 };
            *px = Rgba([(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8, alpha]);
        }

        let indexed = quantize(&img);
        assert!(indexed.palette_len() <= 256);
        for ((_, _, px), &index) in img.enumerate_pixels().zip(&indexed.indices) {
            assert_eq!(px[3] == 0, index == TRANSPARENT_INDEX);
        }
    }

    #[test]
    fn test_fully_transparent_image() {
        let img = RgbaImage::new(2, 2);
        let indexed = quantize(&img);
        assert_eq!(indexed.palette_len(), 1);
        assert_eq!(indexed.transparent_pixel_count(), 4);
    }

    #[test]
    fn test_write_gif_keeps_transparency_key() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        img.put_pixel(1, 1, Rgba([200, 100, 50, 255]));

        let indexed = quantize(&img);
        let bytes = write_gif(&indexed, Vec::new()).unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");

        let (buffer, transparent) = decode_indexed(&bytes);
        assert_eq!(transparent, Some(TRANSPARENT_INDEX));
        assert_eq!(buffer, indexed.indices);
        assert_eq!(buffer[1], TRANSPARENT_INDEX);
        assert_eq!(buffer[2], TRANSPARENT_INDEX);
    }

    #[test]
    fn test_oversized_gif_is_rejected() {
        let indexed = IndexedImage {
            width: 70_000,
            height: 1,
            palette: vec![0; 3],
            indices: Vec::new(),
        };
        assert!(write_gif(&indexed, Vec::new()).is_err());
    }
}
