use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn to_rgb_u32(&self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    #[must_use]
    pub fn from_rgb_u32(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
        }
    }

    pub fn from_hex(hex: &str) -> DomainResult<Self> {
        if hex.len() != 6 {
            return Err(DomainError::InvalidColorFormat(format!(
                "Expected 6 hex digits, got '{hex}'"
            )));
        }
        let rgb = u32::from_str_radix(hex, 16).map_err(|e| {
            DomainError::InvalidColorFormat(format!("Invalid hex color '{hex}': {e}"))
        })?;
        Ok(Self::from_rgb_u32(rgb))
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::RgbColor;

    #[test]
    fn hex_round_trip() {
        let color = RgbColor::from_hex("10AEA6").unwrap();
        assert_eq!(color, RgbColor::new(0x10, 0xAE, 0xA6));
        assert_eq!(color.to_rgb_u32(), 0x0010_AEA6);
        assert_eq!(color.to_string(), "#10aea6");
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(RgbColor::from_hex("10AEA").is_err());
        assert!(RgbColor::from_hex("nothex").is_err());
    }
}
