//! Reprojection légère en Rust pur (sans dépendances externes)
//!
//! Couvre le registre d'inférence :
//! - WGS84 (EPSG:4326)
//! - Web Mercator (EPSG:3857)
//! - WGS84 / UTM, zones nord (EPSG:32601-32660) et sud (EPSG:32701-32760)

use super::{mercator, utm, CoordinateTransform, Geographic};
use crate::GeolintError;

/// Transformation entre deux codes du registre, via WGS84 géographique
#[derive(Debug, Clone, Copy)]
pub struct LiteTransform {
    source_epsg: u32,
    target_epsg: u32,
}

impl LiteTransform {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self, GeolintError> {
        if !Self::is_supported(source_epsg, target_epsg) {
            return Err(GeolintError::UnsupportedTransform {
                source_crs: format!("EPSG:{}", source_epsg),
                target_crs: format!("EPSG:{}", target_epsg),
            });
        }

        Ok(Self {
            source_epsg,
            target_epsg,
        })
    }

    pub fn is_supported_code(epsg: u32) -> bool {
        matches!(epsg, 4326 | 3857) || utm::zone_of(epsg).is_some()
    }

    pub fn is_supported(source: u32, target: u32) -> bool {
        Self::is_supported_code(source) && Self::is_supported_code(target)
    }

    fn to_geographic(&self, x: f64, y: f64) -> Result<Geographic, GeolintError> {
        match self.source_epsg {
            4326 => Ok(Geographic::from_degrees(x, y)),
            3857 => mercator::web_mercator_to_geographic(x, y),
            code => match utm::zone_of(code) {
                Some((zone, south)) => utm::utm_to_geographic(x, y, zone, south),
                None => Err(GeolintError::UnknownCrs(format!("EPSG:{}", code))),
            },
        }
    }

    fn from_geographic(&self, geo: Geographic) -> Result<(f64, f64), GeolintError> {
        match self.target_epsg {
            4326 => Ok(geo.to_degrees()),
            3857 => mercator::geographic_to_web_mercator(geo),
            code => match utm::zone_of(code) {
                Some((zone, south)) => utm::geographic_to_utm(geo, zone, south),
                None => Err(GeolintError::UnknownCrs(format!("EPSG:{}", code))),
            },
        }
    }
}

impl CoordinateTransform for LiteTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), GeolintError> {
        let geo = self.to_geographic(x, y)?;
        self.from_geographic(geo)
    }

    fn description(&self) -> &'static str {
        "lite (pure Rust)"
    }
}
