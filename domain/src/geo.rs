use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::coords::{CANVAS_PIXELS, Point};

/// Latitude/longitude pair projected onto the square pixel canvas with Web
/// Mercator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Inverse Web Mercator projection from canvas pixels.
    #[must_use]
    pub fn from_pixel(x: f64, y: f64) -> Self {
        let canvas = f64::from(CANVAS_PIXELS);
        let longitude = x / canvas * 360.0 - 180.0;
        let latitude = (PI * (1.0 - 2.0 * y / canvas)).sinh().atan().to_degrees();
        Self {
            latitude,
            longitude,
        }
    }

    /// Forward Web Mercator projection to canvas pixels.
    #[must_use]
    pub fn to_pixel(&self) -> Point {
        let canvas = f64::from(CANVAS_PIXELS);
        let x = (self.longitude + 180.0) / 360.0 * canvas;
        let lat_rad = self.latitude.to_radians();
        let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * canvas;
        Point::new(
            x.round().clamp(0.0, canvas) as u32,
            y.round().clamp(0.0, canvas) as u32,
        )
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::GeoPoint;
    use crate::coords::{CANVAS_PIXELS, Point};
    use proptest::prelude::*;

    #[test]
    fn canvas_center_is_null_island() {
        let geo = GeoPoint::from_pixel(
            f64::from(CANVAS_PIXELS) / 2.0,
            f64::from(CANVAS_PIXELS) / 2.0,
        );
        assert!(geo.latitude.abs() < 1e-9);
        assert!(geo.longitude.abs() < 1e-9);
    }

    #[test]
    fn known_point_round_trip() {
        let pixel = Point::new(1_000_000, 700_000);
        let geo = GeoPoint::from_pixel(f64::from(pixel.x), f64::from(pixel.y));
        let back = geo.to_pixel();
        assert!(back.x.abs_diff(pixel.x) <= 1);
        assert!(back.y.abs_diff(pixel.y) <= 1);
    }

    proptest! {
        #[test]
        fn pixel_round_trip_within_one_pixel(
            x in 0u32..CANVAS_PIXELS,
            y in 0u32..CANVAS_PIXELS,
        ) {
            let geo = GeoPoint::from_pixel(f64::from(x), f64::from(y));
            let back = geo.to_pixel();
            prop_assert!(back.x.abs_diff(x) <= 1);
            prop_assert!(back.y.abs_diff(y) <= 1);
        }

        #[test]
        fn geo_round_trip_within_tolerance(
            lat in -85.0f64..85.0,
            lon in -179.99f64..179.99,
        ) {
            let pixel = GeoPoint::new(lat, lon).to_pixel();
            let geo = GeoPoint::from_pixel(f64::from(pixel.x), f64::from(pixel.y));
            // One canvas pixel is ~1.76e-4 degrees of longitude.
            prop_assert!((geo.longitude - lon).abs() < 2e-4);
            prop_assert!((geo.latitude - lat).abs() < 2e-4);
        }
    }
}
