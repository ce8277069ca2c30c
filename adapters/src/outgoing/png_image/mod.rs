//! PNG codec for palette-indexed images.
//!
//! Files we wrote ourselves are 8-bit indexed PNGs carrying the exact
//! WPlace palette, which decode without any color conversion. Anything else
//! (upstream tiles, freshly uploaded targets) is decoded to RGBA and coerced
//! through the palette, failing on foreign colors.

use std::io::Cursor;

use domain::coords::Size;
use domain::image::PalettedImage;
use domain::palette::Palette;

use pixel_hawk_application::error::{AppError, AppResult};

/// A decoded image plus whether the source was already stored in our
/// indexed form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub image: PalettedImage,
    pub was_paletted: bool,
}

fn codec_error(message: String) -> AppError {
    AppError::CodecError { message }
}

/// Decodes PNG bytes into a palette-indexed image.
pub fn decode(bytes: &[u8], palette: &Palette) -> AppResult<DecodedImage> {
    if let Some(image) = try_decode_indexed(bytes, palette)? {
        return Ok(DecodedImage {
            image,
            was_paletted: true,
        });
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| codec_error(format!("Failed to decode image: {e}")))?;
    let rgba = decoded.to_rgba8();
    let size = Size::new(rgba.width(), rgba.height());
    let image = palette.coerce_rgba(rgba.as_raw(), size)?;
    Ok(DecodedImage {
        image,
        was_paletted: false,
    })
}

/// Fast path: an 8-bit indexed PNG whose PLTE matches our palette byte for
/// byte is taken as-is. Returns `Ok(None)` when the fast path does not
/// apply.
fn try_decode_indexed(bytes: &[u8], palette: &Palette) -> AppResult<Option<PalettedImage>> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let Ok(mut reader) = decoder.read_info() else {
        // Not a readable PNG; let the general decoder produce the error.
        return Ok(None);
    };

    if reader.output_color_type() != (png::ColorType::Indexed, png::BitDepth::Eight) {
        return Ok(None);
    }
    let matches_palette = reader
        .info()
        .palette
        .as_ref()
        .is_some_and(|plte| plte.as_ref() == palette.plte_bytes());
    if !matches_palette {
        return Ok(None);
    }

    let mut buffer = vec![0u8; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buffer)
        .map_err(|e| codec_error(format!("Failed to read indexed PNG frame: {e}")))?;
    buffer.truncate(frame.buffer_size());
    let size = Size::new(frame.width, frame.height);
    let image = PalettedImage::from_raw(size, buffer)?;
    Ok(Some(image))
}

/// Encodes a palette-indexed image as an 8-bit indexed PNG with entry 0
/// marked fully transparent.
pub fn encode(image: &PalettedImage, palette: &Palette) -> AppResult<Vec<u8>> {
    let size = image.size();
    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, size.w, size.h);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(palette.plte_bytes());
        encoder.set_trns(&[0u8][..]);
        let mut writer = encoder
            .write_header()
            .map_err(|e| codec_error(format!("Failed to write PNG header: {e}")))?;
        writer
            .write_image_data(image.data())
            .map_err(|e| codec_error(format!("Failed to write PNG data: {e}")))?;
    }
    Ok(bytes)
}
