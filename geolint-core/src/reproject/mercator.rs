//! Projection Web Mercator (EPSG:3857)
//!
//! Modèle sphérique sur le rayon équatorial WGS84.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use super::ellipsoid::WGS84;
use super::Geographic;
use crate::GeolintError;

/// Latitude maximale représentable (degrés)
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Géographique vers Web Mercator
///
/// Les latitudes au-delà de [`MAX_LATITUDE`] sont refusées plutôt que bornées.
pub fn geographic_to_web_mercator(geo: Geographic) -> Result<(f64, f64), GeolintError> {
    if geo.lat.abs() > MAX_LATITUDE.to_radians() {
        return Err(GeolintError::reprojection(format!(
            "latitude {:.6} outside Web Mercator domain",
            geo.lat.to_degrees()
        )));
    }

    let r = WGS84::A;
    let x = r * geo.lon;
    let y = r * (FRAC_PI_4 + geo.lat / 2.0).tan().ln();

    Ok((x, y))
}

/// Demi-largeur de la projection (mètres)
const EXTENT: f64 = PI * WGS84::A;

/// Web Mercator vers géographique
pub fn web_mercator_to_geographic(x: f64, y: f64) -> Result<Geographic, GeolintError> {
    if x.abs() > EXTENT * (1.0 + 1e-9) || y.abs() > EXTENT * (1.0 + 1e-9) {
        return Err(GeolintError::reprojection(format!(
            "({:.1}, {:.1}) outside Web Mercator extent",
            x, y
        )));
    }

    let lon = x / WGS84::A;
    let lat = 2.0 * (y / WGS84::A).exp().atan() - FRAC_PI_2;

    Ok(Geographic::new(lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paris_to_web_mercator() {
        let geo = Geographic::from_degrees(2.35, 48.85);
        let (x, y) = geographic_to_web_mercator(geo).unwrap();

        assert!((x - 261600.0).abs() < 1000.0, "x={}", x);
        assert!((y - 6250000.0).abs() < 10000.0, "y={}", y);
    }

    #[test]
    fn test_roundtrip() {
        let geo = Geographic::from_degrees(2.35, 48.85);
        let (x, y) = geographic_to_web_mercator(geo).unwrap();
        let (lon, lat) = web_mercator_to_geographic(x, y).unwrap().to_degrees();

        assert!((lon - 2.35).abs() < 1e-9, "lon={}", lon);
        assert!((lat - 48.85).abs() < 1e-9, "lat={}", lat);
    }

    #[test]
    fn test_polar_latitude_rejected() {
        assert!(geographic_to_web_mercator(Geographic::from_degrees(0.0, 89.0)).is_err());
        let (_, y) = geographic_to_web_mercator(Geographic::from_degrees(0.0, MAX_LATITUDE)).unwrap();
        assert!((y - 20037508.34).abs() < 1.0, "y={}", y);
    }

    #[test]
    fn test_inverse_outside_extent() {
        assert!(web_mercator_to_geographic(3.0e7, 0.0).is_err());
        assert!(web_mercator_to_geographic(0.0, -2.1e7).is_err());
    }
}
