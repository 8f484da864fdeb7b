//! Projection UTM (Universal Transverse Mercator) sur WGS84
//!
//! Zones 1 à 60, hémisphères nord (EPSG:326xx) et sud (EPSG:327xx).
//! Développements en série de Snyder, précision sub-métrique dans la zone.

use super::ellipsoid::WGS84;
use super::Geographic;
use crate::GeolintError;

const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500000.0;
const FALSE_NORTHING_SOUTH: f64 = 10000000.0;

/// Zone et hémisphère d'un code EPSG WGS84 / UTM
pub fn zone_of(epsg: u32) -> Option<(u32, bool)> {
    match epsg {
        32601..=32660 => Some((epsg - 32600, false)),
        32701..=32760 => Some((epsg - 32700, true)),
        _ => None,
    }
}

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// Géographique vers UTM
pub fn geographic_to_utm(geo: Geographic, zone: u32, south: bool) -> Result<(f64, f64), GeolintError> {
    let lat_deg = geo.lat.to_degrees();
    if !(-80.0..=84.0).contains(&lat_deg) {
        return Err(GeolintError::reprojection(format!(
            "latitude {:.6} outside UTM domain",
            lat_deg
        )));
    }

    let ep2 = WGS84::EP2;
    let cos_lat = geo.lat.cos();
    let tan_lat = geo.lat.tan();

    let n = WGS84::prime_vertical_radius(geo.lat);
    let t = tan_lat.powi(2);
    let c = ep2 * cos_lat.powi(2);
    let a = cos_lat * (geo.lon - central_meridian(zone));
    let m = WGS84::meridian_arc(geo.lat);

    let x = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t.powi(2) + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;

    let y = K0
        * (m + n
            * tan_lat
            * (a.powi(2) / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c.powi(2)) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t.powi(2) + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0))
        + if south { FALSE_NORTHING_SOUTH } else { 0.0 };

    Ok((x, y))
}

/// UTM vers géographique
pub fn utm_to_geographic(x: f64, y: f64, zone: u32, south: bool) -> Result<Geographic, GeolintError> {
    let a = WGS84::A;
    let e2 = WGS84::E2;
    let ep2 = WGS84::EP2;

    let x = x - FALSE_EASTING;
    let y = y - if south { FALSE_NORTHING_SOUTH } else { 0.0 };

    // Latitude d'empreinte
    let m = y / K0;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let n1 = WGS84::prime_vertical_radius(phi1);
    let t1 = tan_phi1.powi(2);
    let c1 = ep2 * cos_phi1.powi(2);
    let r1 = WGS84::meridian_radius(phi1);
    let d = x / (n1 * K0);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2) - 252.0 * ep2 - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    Ok(Geographic::new(lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_martinique() {
        let geo = utm_to_geographic(708000.0, 1615000.0, 20, false).unwrap();
        let (lon, lat) = geo.to_degrees();

        assert!((lon - (-61.07)).abs() < 0.2, "lon={}", lon);
        assert!((lat - 14.60).abs() < 0.2, "lat={}", lat);
    }

    #[test]
    fn test_reunion() {
        let geo = utm_to_geographic(338000.0, 7691000.0, 40, true).unwrap();
        let (lon, lat) = geo.to_degrees();

        assert!((lon - 55.45).abs() < 0.2, "lon={}", lon);
        assert!((lat - (-20.88)).abs() < 0.2, "lat={}", lat);
    }

    #[test]
    fn test_central_meridian_forward() {
        // Sur le méridien central, x vaut le faux est
        let (x, y) = geographic_to_utm(Geographic::from_degrees(3.0, 0.0), 31, false).unwrap();
        assert!((x - 500000.0).abs() < 1e-6, "x={}", x);
        assert!(y.abs() < 1e-6, "y={}", y);
    }

    #[test]
    fn test_forward_inverse_roundtrip() {
        for &(lon, lat, zone, south) in &[
            (2.35, 48.85, 31, false),
            (-61.07, 14.60, 20, false),
            (55.45, -20.88, 40, true),
            (9.2, 45.5, 32, false),
        ] {
            let (x, y) = geographic_to_utm(Geographic::from_degrees(lon, lat), zone, south).unwrap();
            let (lon2, lat2) = utm_to_geographic(x, y, zone, south).unwrap().to_degrees();
            assert!((lon - lon2).abs() < 1e-5, "lon={} lon2={}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-5, "lat={} lat2={}", lat, lat2);
        }
    }

    #[test]
    fn test_zone_of() {
        assert_eq!(zone_of(32631), Some((31, false)));
        assert_eq!(zone_of(32740), Some((40, true)));
        assert_eq!(zone_of(4326), None);
    }
}
