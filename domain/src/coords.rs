use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::{fmt, str::FromStr};

use crate::error::{DomainError, DomainResult};
use crate::geo::GeoPoint;

/// Pixels along one side of a tile.
pub const TILE_PIXELS: u32 = 1000;
/// Tiles along one side of the canvas.
pub const TILE_GRID: u32 = 2048;
/// Pixels along one side of the whole canvas.
pub const CANVAS_PIXELS: u32 = TILE_GRID * TILE_PIXELS;

/// A tile in the 2048x2048 lattice, each covering 1000x1000 pixels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TileCoord {
    pub x: u16,
    pub y: u16,
}

impl TileCoord {
    #[must_use]
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    pub fn validate_bounds(&self) -> DomainResult<()> {
        if u32::from(self.x) >= TILE_GRID || u32::from(self.y) >= TILE_GRID {
            return Err(DomainError::InvalidTileCoordinates(format!(
                "Tile ({}, {}) outside the {TILE_GRID}x{TILE_GRID} lattice",
                self.x, self.y
            )));
        }
        Ok(())
    }

    /// Canonical identifier: `x * 2048 + y`.
    #[must_use]
    pub fn id(&self) -> u32 {
        u32::from(self.x) * TILE_GRID + u32::from(self.y)
    }

    pub fn from_id(id: u32) -> DomainResult<Self> {
        if id >= TILE_GRID * TILE_GRID {
            return Err(DomainError::InvalidTileCoordinates(format!(
                "Tile id {id} out of range"
            )));
        }
        Ok(Self::new((id / TILE_GRID) as u16, (id % TILE_GRID) as u16))
    }

    /// Top-left pixel of this tile in canvas coordinates.
    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(
            u32::from(self.x) * TILE_PIXELS,
            u32::from(self.y) * TILE_PIXELS,
        )
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s.split_once('_').ok_or_else(|| {
            DomainError::InvalidTileCoordinates(format!("Expected format 'x_y', got '{s}'"))
        })?;
        let x = x.parse::<u16>().map_err(|e| {
            DomainError::InvalidTileCoordinates(format!("Invalid x coordinate '{x}': {e}"))
        })?;
        let y = y.parse::<u16>().map_err(|e| {
            DomainError::InvalidTileCoordinates(format!("Invalid y coordinate '{y}': {e}"))
        })?;
        let tile = Self::new(x, y);
        tile.validate_bounds()?;
        Ok(tile)
    }
}

/// A pixel in canvas coordinates. Tile membership is implicit: every 1000
/// pixels along an axis starts a new tile.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Builds a point from the `(tx, ty, px, py)` quadruple used in project
    /// file names.
    pub fn from_parts(tx: u16, ty: u16, px: u16, py: u16) -> DomainResult<Self> {
        TileCoord::new(tx, ty).validate_bounds()?;
        if u32::from(px) >= TILE_PIXELS || u32::from(py) >= TILE_PIXELS {
            return Err(DomainError::InvalidCoordinates(format!(
                "Pixel offset ({px}, {py}) exceeds tile size {TILE_PIXELS}"
            )));
        }
        Ok(Self::new(
            u32::from(tx) * TILE_PIXELS + u32::from(px),
            u32::from(ty) * TILE_PIXELS + u32::from(py),
        ))
    }

    /// Splits into the `(tx, ty, px, py)` quadruple.
    #[must_use]
    pub fn to_parts(&self) -> (u16, u16, u16, u16) {
        (
            (self.x / TILE_PIXELS) as u16,
            (self.y / TILE_PIXELS) as u16,
            (self.x % TILE_PIXELS) as u16,
            (self.y % TILE_PIXELS) as u16,
        )
    }

    #[must_use]
    pub fn tile(&self) -> TileCoord {
        TileCoord::new((self.x / TILE_PIXELS) as u16, (self.y / TILE_PIXELS) as u16)
    }

    /// Signed offset of `self` relative to `origin`.
    #[must_use]
    pub fn offset_from(&self, origin: Point) -> (i64, i64) {
        (
            i64::from(self.x) - i64::from(origin.x),
            i64::from(self.y) - i64::from(origin.y),
        )
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (tx, ty, px, py) = self.to_parts();
        write!(f, "{tx}_{ty}_{px}_{py}")
    }
}

/// A pixel extent in canvas space.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    #[must_use]
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    #[must_use]
    pub fn area(&self) -> usize {
        self.w as usize * self.h as usize
    }

    /// Web Mercator zoom level that fits this extent into a viewport of the
    /// given pixel size. The floor of 5 keeps zero-sized extents finite.
    #[must_use]
    pub fn to_zoom(&self, viewport_size: f64) -> f64 {
        let zoom_factor = (f64::from(CANVAS_PIXELS) / 256.0).log2();
        let largest = f64::from(self.w.max(self.h).max(5));
        zoom_factor + (viewport_size / largest).log2()
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// An axis-aligned pixel rectangle in canvas space, PIL-style: `right` and
/// `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Rectangle {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rectangle {
    #[must_use]
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn from_point_size(point: Point, size: Size) -> Self {
        Self::new(point.x, point.y, point.x + size.w, point.y + size.h)
    }

    /// Top-left corner.
    #[must_use]
    pub fn point(&self) -> Point {
        Point::new(self.left.min(self.right), self.top.min(self.bottom))
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(
            self.left.abs_diff(self.right),
            self.top.abs_diff(self.bottom),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left == self.right || self.top == self.bottom
    }

    /// Tiles covered by this rectangle. Empty rectangles cover no tiles.
    #[must_use]
    pub fn tiles(&self) -> BTreeSet<TileCoord> {
        if self.is_empty() {
            return BTreeSet::new();
        }
        let point = self.point();
        let size = self.size();
        let left = point.x / TILE_PIXELS;
        let top = point.y / TILE_PIXELS;
        let right = (point.x + size.w).div_ceil(TILE_PIXELS);
        let bottom = (point.y + size.h).div_ceil(TILE_PIXELS);
        let mut tiles = BTreeSet::new();
        for tx in left..right {
            for ty in top..bottom {
                tiles.insert(TileCoord::new(tx as u16, ty as u16));
            }
        }
        tiles
    }

    /// A wplace.live link displaying the live contents of this rectangle.
    #[must_use]
    pub fn canvas_link(&self, viewport_size: f64) -> String {
        let center_x = (f64::from(self.left) + f64::from(self.right)) / 2.0;
        let center_y = (f64::from(self.top) + f64::from(self.bottom)) / 2.0;
        let geo = GeoPoint::from_pixel(center_x, center_y);
        let lat = (geo.latitude * 1e6).round() / 1e6;
        let lon = (geo.longitude * 1e6).round() / 1e6;
        let zoom = (self.size().to_zoom(viewport_size) * 1e3).round() / 1e3;
        format!("https://wplace.live/?lat={lat}&lng={lon}&zoom={zoom}")
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.size(), self.point())
    }
}
