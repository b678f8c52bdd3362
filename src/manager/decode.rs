//! The Decoder component (spec §4.3): turns a fully-assembled, still
//! possibly-compressed payload into a validated, row-major RGB/RGBA bitmap.

use std::io::Read;

use flate2::read::ZlibDecoder;
use image::{DynamicImage, GenericImageView};

use crate::command::{Compression, ImageFormat};
use crate::error::Error;

/// A fully decoded bitmap, ready to hand to the GPU collaborator or keep
/// resident in memory.
pub(crate) struct DecodedBitmap {
    pub(crate) bytes: Vec<u8>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) is_opaque: bool,
}

impl DecodedBitmap {
    /// A row is 4-byte aligned when every pixel is (RGBA), or when an RGB
    /// row's byte width happens to land on a 4-byte boundary. The GPU
    /// collaborator uses this to decide whether it needs an unpack-alignment
    /// fallback.
    pub(crate) fn is_4byte_aligned(&self, bytes_per_pixel: u32) -> bool {
        bytes_per_pixel == 4 || (self.width * bytes_per_pixel) % 4 == 0
    }
}

fn inflate_zlib(compressed: &[u8], expected_size: usize) -> Result<Vec<u8>, Error> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut out = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::invalid(format!("Failed to zlib decompress image data: {e}")))?;
    Ok(out)
}

/// Decompresses (if needed) and validates a raw RGB/RGBA payload, or decodes
/// a PNG payload, per spec §4.3's three checks: size matches
/// `width * height * bytes_per_pixel`, dimensions are nonzero, and (for PNG)
/// the container actually contains an image.
pub(crate) fn decode(
    format: ImageFormat,
    compressed: Compression,
    width: u32,
    height: u32,
    payload: &[u8],
) -> Result<DecodedBitmap, Error> {
    match format {
        ImageFormat::Png => decode_png(compressed, payload),
        ImageFormat::Rgb | ImageFormat::Rgba => decode_raw(format, compressed, width, height, payload),
    }
}

fn decode_raw(
    format: ImageFormat,
    compressed: Compression,
    width: u32,
    height: u32,
    payload: &[u8],
) -> Result<DecodedBitmap, Error> {
    if width == 0 || height == 0 {
        return Err(Error::invalid("Image width or height not specified"));
    }

    let bytes_per_pixel = format
        .bytes_per_pixel()
        .expect("raw formats always have a fixed pixel size");
    let expected_size = (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(bytes_per_pixel as usize))
        .ok_or_else(|| Error::too_big("Image dimensions overflow"))?;

    let bytes = match compressed {
        Compression::None => payload.to_vec(),
        Compression::Zlib => inflate_zlib(payload, expected_size)?,
    };

    if bytes.len() != expected_size {
        return Err(Error::invalid(format!(
            "Image dimensions: {width}x{height} do not match data size: {}, expected size: {expected_size}",
            bytes.len()
        )));
    }

    Ok(DecodedBitmap {
        bytes,
        width,
        height,
        is_opaque: matches!(format, ImageFormat::Rgb),
    })
}

fn decode_png(compressed: Compression, payload: &[u8]) -> Result<DecodedBitmap, Error> {
    let raw = match compressed {
        Compression::None => payload.to_vec(),
        Compression::Zlib => inflate_zlib(payload, payload.len())?,
    };

    let img = image::load_from_memory(&raw)
        .map_err(|e| Error::invalid(format!("Failed to decode PNG data: {e}")))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::invalid("PNG image has zero width or height"));
    }

    let is_opaque = !matches!(img, DynamicImage::ImageRgba8(_) | DynamicImage::ImageLumaA8(_));
    let bytes = if is_opaque {
        img.to_rgb8().into_raw()
    } else {
        img.to_rgba8().into_raw()
    };

    Ok(DecodedBitmap {
        bytes,
        width,
        height,
        is_opaque,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn raw_rgba_size_mismatch_is_invalid() {
        let err = decode(ImageFormat::Rgba, Compression::None, 2, 2, &[0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Invalid);
    }

    #[test]
    fn raw_rgb_exact_size_decodes() {
        let payload = vec![0u8; 3 * 2 * 2];
        let bitmap = decode(ImageFormat::Rgb, Compression::None, 2, 2, &payload).unwrap();
        assert_eq!(bitmap.width, 2);
        assert_eq!(bitmap.height, 2);
        assert!(bitmap.is_opaque);
    }

    #[test]
    fn zero_dimension_raw_is_invalid() {
        let err = decode(ImageFormat::Rgba, Compression::None, 0, 4, &[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Invalid);
    }
}
