//! Choix automatique de la transformation : identité, lite, puis PROJ

use super::lite::LiteTransform;
use super::{CoordinateTransform, TransformProvider};
use crate::crs::Crs;
use crate::GeolintError;

/// Pas de reprojection (source == cible)
#[derive(Debug, Clone, Copy)]
pub struct IdentityTransform;

impl CoordinateTransform for IdentityTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), GeolintError> {
        Ok((x, y))
    }

    fn description(&self) -> &'static str {
        "identity"
    }
}

/// Transformations du registre uniquement, en Rust pur
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteTransformProvider;

impl TransformProvider for LiteTransformProvider {
    fn transform(&self, source: &Crs, target: &Crs) -> Result<Box<dyn CoordinateTransform>, GeolintError> {
        if source.same_as(target) {
            return Ok(Box::new(IdentityTransform));
        }

        let (Some(from), Some(to)) = (source.code, target.code) else {
            return Err(unsupported(source, target));
        };

        Ok(Box::new(LiteTransform::new(from, to)?))
    }
}

/// Fournisseur par défaut
///
/// Essaie d'abord la transformation lite, puis PROJ si la feature `proj` est activée.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartProvider;

impl TransformProvider for SmartProvider {
    fn transform(&self, source: &Crs, target: &Crs) -> Result<Box<dyn CoordinateTransform>, GeolintError> {
        match LiteTransformProvider.transform(source, target) {
            Ok(transform) => Ok(transform),
            #[cfg(feature = "proj")]
            Err(GeolintError::UnsupportedTransform { .. }) => {
                super::proj::ProjTransformProvider.transform(source, target)
            }
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn unsupported(source: &Crs, target: &Crs) -> GeolintError {
    GeolintError::UnsupportedTransform {
        source_crs: source.identifier.clone(),
        target_crs: target.identifier.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let t = SmartProvider.transform(&Crs::epsg(4326), &Crs::parse("WGS84")).unwrap();
        assert_eq!(t.description(), "identity");
        assert_eq!(t.transform(2.0, 3.0).unwrap(), (2.0, 3.0));
    }

    #[test]
    fn test_lite() {
        let t = SmartProvider.transform(&Crs::epsg(32631), &Crs::epsg(4326)).unwrap();
        assert_eq!(t.description(), "lite (pure Rust)");
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn test_unsupported_without_proj() {
        let err = match SmartProvider.transform(&Crs::epsg(2154), &Crs::epsg(4326)) {
            Err(e) => e,
            Ok(_) => panic!("EPSG:2154 is outside the lite registry"),
        };
        assert!(matches!(err, GeolintError::UnsupportedTransform { .. }));

        let raw = Crs::parse("+proj=longlat");
        assert!(SmartProvider.transform(&raw, &Crs::epsg(4326)).is_err());
    }
}
