use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::sync::OnceLock;

use crate::color::RgbColor;
use crate::coords::Size;
use crate::error::DomainResult;
use crate::image::PalettedImage;

// THIS IS THE OFFICIAL WPLACE PALETTE. It is not expected to change.
// The first color (FF00FF) is a transparency placeholder and is never
// matched by RGB lookup.
const COLOR_HEX: &str = "
    FF00FF 000000 3C3C3C 787878 D2D2D2 FFFFFF 600018 ED1C24 FF7F27 F6AA09 F9DD3B FFFABC 0EB968 13E67B 87FF5E 0C816E
    10AEA6 13E1BE 60F7F2 28509E 4093E4 6B50F6 99B1FB 780C99 AA38B9 E09FF9 CB007A EC1F80 F38DA9 684634 95682A F8B277
    AAAAAA A50E1E FA8072 E45C1A 9C8431 C5AD31 E8D45F 4A6B3A 5A944A 84C573 0F799F BBFAF2 7DC7FF 4D31B8 4A4284 7A71C4
    B5AEF1 9B5249 D18078 FAB6A4 DBA463 7B6352 9C846B D6B594 D18051 FFC5A5 6D643F 948C6B CDC59E 333941 6D758D B3B9D1
";

/// Number of palette entries, including the transparency placeholder.
pub const PALETTE_SIZE: usize = 64;

// Wrong teal reported in wplacepaint.com, honored as an alias.
const TEAL_ALIAS: u32 = 0x0010_AE82;
const TEAL_CANONICAL: u32 = 0x0010_AEA6;

/// The fixed 64-entry color table. Index 0 is transparent; every other entry
/// maps one exact 24-bit RGB value.
#[derive(Debug)]
pub struct Palette {
    colors: Vec<RgbColor>,
    raw: Vec<u8>,
    rgb_to_index: HashMap<u32, u8>,
}

impl Palette {
    fn from_colors(colors: Vec<RgbColor>) -> Self {
        let mut raw = Vec::with_capacity(colors.len() * 3);
        let mut rgb_to_index = HashMap::with_capacity(colors.len());
        for (index, color) in colors.iter().enumerate() {
            raw.extend_from_slice(&[color.r, color.g, color.b]);
            if index > 0 {
                rgb_to_index.insert(color.to_rgb_u32(), index as u8);
            }
        }
        if let Some(&canonical) = rgb_to_index.get(&TEAL_CANONICAL) {
            rgb_to_index.insert(TEAL_ALIAS, canonical);
        }
        Self {
            colors,
            raw,
            rgb_to_index,
        }
    }

    fn parse(hex_table: &str) -> DomainResult<Self> {
        let colors = hex_table
            .split_whitespace()
            .map(RgbColor::from_hex)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(Self::from_colors(colors))
    }

    /// The process-wide WPlace palette, built once and immutable afterwards.
    #[must_use]
    pub fn wplace() -> &'static Palette {
        static PALETTE: OnceLock<Palette> = OnceLock::new();
        PALETTE.get_or_init(|| {
            // The table is a compile-time constant.
            #[allow(clippy::expect_used)]
            let palette = Palette::parse(COLOR_HEX).expect("builtin palette table is well-formed");
            palette
        })
    }

    #[must_use]
    pub fn colors(&self) -> &[RgbColor] {
        &self.colors
    }

    /// The palette as PNG `PLTE` bytes (r, g, b per entry).
    #[must_use]
    pub fn plte_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Looks up the palette index for one RGBA pixel. Fully transparent
    /// pixels map to index 0; unknown colors are tallied into `misses` and
    /// map to 0 as well.
    #[must_use]
    pub fn lookup_rgba(&self, rgba: [u8; 4], misses: &mut BTreeMap<u32, u64>) -> u8 {
        let [r, g, b, a] = rgba;
        if a == 0 {
            return 0;
        }
        let rgb = RgbColor::new(r, g, b).to_rgb_u32();
        match self.rgb_to_index.get(&rgb) {
            Some(&index) => index,
            None => {
                *misses.entry(rgb).or_insert(0) += 1;
                0
            }
        }
    }

    /// Converts a packed RGBA byte buffer (4 bytes per pixel) into a
    /// palette-indexed image. Any color outside the palette fails the whole
    /// image with a tally of the offending colors.
    pub fn coerce_rgba(&self, rgba: &[u8], size: Size) -> Result<PalettedImage, PaletteMismatch> {
        if rgba.len() != size.area() * 4 {
            return Err(PaletteMismatch::bad_buffer(size, rgba.len()));
        }
        let mut misses = BTreeMap::new();
        let data: Vec<u8> = rgba
            .chunks_exact(4)
            .map(|px| {
                let px: [u8; 4] = px.try_into().unwrap_or([0, 0, 0, 0]);
                self.lookup_rgba(px, &mut misses)
            })
            .collect();
        if !misses.is_empty() {
            return Err(PaletteMismatch::new(misses));
        }
        // data length equals size.area() by construction
        #[allow(clippy::expect_used)]
        let image = PalettedImage::from_raw(size, data).expect("coerced buffer matches size");
        Ok(image)
    }

    /// Maps a palette index back to its color; `None` for index 0 and
    /// out-of-range values.
    #[must_use]
    pub fn color_of(&self, index: u8) -> Option<RgbColor> {
        if index == 0 {
            return None;
        }
        self.colors.get(usize::from(index)).copied()
    }
}

/// An image contained colors outside the palette; carries a per-color pixel
/// tally for the error report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteMismatch {
    report: BTreeMap<u32, u64>,
    buffer_note: Option<String>,
}

impl PaletteMismatch {
    #[must_use]
    pub fn new(report: BTreeMap<u32, u64>) -> Self {
        Self {
            report,
            buffer_note: None,
        }
    }

    fn bad_buffer(size: Size, got: usize) -> Self {
        Self {
            report: BTreeMap::new(),
            buffer_note: Some(format!(
                "RGBA buffer of {got} bytes does not cover {size}"
            )),
        }
    }

    #[must_use]
    pub fn report(&self) -> &BTreeMap<u32, u64> {
        &self.report
    }
}

impl Error for PaletteMismatch {}

impl fmt::Display for PaletteMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(note) = &self.buffer_note {
            return write!(f, "{note}");
        }
        let total: u64 = self.report.values().sum();
        if self.report.len() > 5 {
            write!(
                f,
                "Found {total} pixels not in the palette ({} colors)",
                self.report.len()
            )
        } else {
            let detail: Vec<String> = self.report.keys().map(|rgb| format!("#{rgb:06x}")).collect();
            write!(
                f,
                "Found {total} pixels not in the palette ({})",
                detail.join(", ")
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{PALETTE_SIZE, Palette, TEAL_ALIAS, TEAL_CANONICAL};
    use crate::coords::Size;
    use std::collections::BTreeMap;

    #[test]
    fn has_sixty_four_colors() {
        let palette = Palette::wplace();
        assert_eq!(palette.colors().len(), PALETTE_SIZE);
        assert_eq!(palette.plte_bytes().len(), PALETTE_SIZE * 3);
    }

    #[test]
    fn transparent_placeholder_is_not_matched() {
        let palette = Palette::wplace();
        let mut misses = BTreeMap::new();
        // Opaque magenta is the placeholder color; it must report a miss.
        assert_eq!(palette.lookup_rgba([0xFF, 0x00, 0xFF, 0xFF], &mut misses), 0);
        assert_eq!(misses.len(), 1);
    }

    #[test]
    fn alpha_zero_maps_to_transparent() {
        let palette = Palette::wplace();
        let mut misses = BTreeMap::new();
        assert_eq!(palette.lookup_rgba([1, 2, 3, 0], &mut misses), 0);
        assert!(misses.is_empty());
    }

    #[test]
    fn exact_colors_resolve() {
        let palette = Palette::wplace();
        let mut misses = BTreeMap::new();
        // 000000 is entry 1.
        assert_eq!(palette.lookup_rgba([0, 0, 0, 255], &mut misses), 1);
        // FFFFFF is entry 5.
        assert_eq!(palette.lookup_rgba([255, 255, 255, 255], &mut misses), 5);
        assert!(misses.is_empty());
    }

    #[test]
    fn teal_alias_is_honored() {
        let palette = Palette::wplace();
        let mut misses = BTreeMap::new();
        let aliased = palette.lookup_rgba(
            [
                (TEAL_ALIAS >> 16) as u8,
                (TEAL_ALIAS >> 8) as u8,
                TEAL_ALIAS as u8,
                255,
            ],
            &mut misses,
        );
        let canonical = palette.lookup_rgba(
            [
                (TEAL_CANONICAL >> 16) as u8,
                (TEAL_CANONICAL >> 8) as u8,
                TEAL_CANONICAL as u8,
                255,
            ],
            &mut misses,
        );
        assert_eq!(aliased, canonical);
        assert_ne!(aliased, 0);
        assert!(misses.is_empty());
    }

    #[test]
    fn coerce_accepts_valid_buffer() {
        let palette = Palette::wplace();
        let rgba = [
            [0u8, 0, 0, 255],
            [255, 255, 255, 255],
            [9, 9, 9, 0],
            [0, 0, 0, 255],
        ]
        .concat();
        let image = palette.coerce_rgba(&rgba, Size::new(2, 2)).unwrap();
        assert_eq!(image.data(), &[1, 5, 0, 1]);
    }

    #[test]
    fn coerce_rejects_unknown_colors_with_report() {
        let palette = Palette::wplace();
        let rgba = [[1u8, 2, 3, 255], [1, 2, 3, 255], [4, 5, 6, 255]].concat();
        let err = palette.coerce_rgba(&rgba, Size::new(3, 1)).unwrap_err();
        assert_eq!(err.report().len(), 2);
        assert_eq!(err.report().get(&0x0001_0203), Some(&2));
        let message = err.to_string();
        assert!(message.contains("3 pixels"));
        assert!(message.contains("#010203"));
    }

    #[test]
    fn coerce_rejects_short_buffer() {
        let palette = Palette::wplace();
        assert!(palette.coerce_rgba(&[0, 0, 0], Size::new(1, 1)).is_err());
    }
}
