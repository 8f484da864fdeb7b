//! Transformations via PROJ
//!
//! Disponible uniquement avec la feature `proj`.

use proj::Proj;

use super::smart::unsupported;
use super::{CoordinateTransform, TransformProvider};
use crate::crs::Crs;
use crate::GeolintError;

/// Transformation PROJ entre deux définitions connues
pub struct ProjTransform {
    proj: Proj,
}

impl CoordinateTransform for ProjTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), GeolintError> {
        self.proj
            .convert((x, y))
            .map_err(|e| GeolintError::reprojection(format!("PROJ conversion failed: {}", e)))
    }

    fn description(&self) -> &'static str {
        "proj (PROJ library)"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjTransformProvider;

impl TransformProvider for ProjTransformProvider {
    fn transform(&self, source: &Crs, target: &Crs) -> Result<Box<dyn CoordinateTransform>, GeolintError> {
        let proj = Proj::new_known_crs(&source.identifier, &target.identifier, None).map_err(|e| {
            tracing::debug!(error = %e, "PROJ could not build transformation");
            unsupported(source, target)
        })?;

        Ok(Box::new(ProjTransform { proj }))
    }
}
