//! Reprojection des jeux de données validés
//!
//! Le moteur consomme un [`TransformProvider`] qui fournit une
//! [`CoordinateTransform`] pour un couple de CRS. Le fournisseur par défaut
//! ([`SmartProvider`]) utilise la transformation lite (Rust pur), puis PROJ
//! si la feature `proj` est activée.
//!
//! Une feature dont une coordonnée sort du domaine source ou devient non
//! finie est écartée et enregistrée ; le fichier n'échoue que si toutes les
//! features non vides échouent.

mod ellipsoid;
pub mod lite;
mod mercator;
#[cfg(feature = "proj")]
pub mod proj;
pub mod smart;
mod utm;

use std::fmt;
use std::sync::Arc;

use geo::{Coord, CoordsIter, Geometry, MapCoords};
use serde::Serialize;
use tracing::{debug, info};

use crate::crs::{lookup, Crs, CrsKind};
use crate::types::{Dataset, Envelope, Feature};
use crate::validation::Validated;
use crate::GeolintError;

pub use ellipsoid::WGS84;
pub use lite::LiteTransform;
pub use smart::{IdentityTransform, LiteTransformProvider, SmartProvider};

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Transformation de coordonnées pour un couple de CRS fixé
pub trait CoordinateTransform {
    fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), GeolintError>;

    /// Nom court de la méthode utilisée
    fn description(&self) -> &'static str;
}

/// Fabrique de transformations
pub trait TransformProvider: Send + Sync {
    /// # Errors
    ///
    /// `UnsupportedTransform` si le couple n'est pas pris en charge.
    fn transform(&self, source: &Crs, target: &Crs) -> Result<Box<dyn CoordinateTransform>, GeolintError>;
}

/// Transforme une géométrie en conservant son type et son nombre de sommets
pub fn transform_geometry(
    transform: &dyn CoordinateTransform,
    geometry: &Geometry,
) -> Result<Geometry, GeolintError> {
    geometry.try_map_coords(|c: Coord| {
        let (x, y) = transform.transform(c.x, c.y)?;
        if !x.is_finite() || !y.is_finite() {
            return Err(GeolintError::reprojection(format!(
                "non-finite result for ({}, {})",
                c.x, c.y
            )));
        }
        Ok(Coord { x, y })
    })
}

/// Feature écartée lors de la reprojection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReprojectionFailure {
    /// Index de la feature dans le jeu validé
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ReprojectionOutcome {
    pub dataset: Dataset,
    pub source_crs: Crs,
    pub target_crs: Crs,
    pub failures: Vec<ReprojectionFailure>,
    pub envelope_before: Option<Envelope>,
    pub envelope_after: Option<Envelope>,
    /// Méthode de transformation utilisée
    pub method: &'static str,
}

/// Nature de la transformation, d'après les CRS source et cible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    Identity,
    GeographicToGeographic,
    GeographicToProjected,
    ProjectedToGeographic,
    ProjectedToProjected,
    Unknown,
}

impl TransformationType {
    fn between(source: &Crs, target: &Crs) -> Self {
        if source.same_as(target) {
            return Self::Identity;
        }
        match (source.kind(), target.kind()) {
            (Some(CrsKind::Geographic), Some(CrsKind::Geographic)) => Self::GeographicToGeographic,
            (Some(CrsKind::Geographic), Some(CrsKind::Projected)) => Self::GeographicToProjected,
            (Some(CrsKind::Projected), Some(CrsKind::Geographic)) => Self::ProjectedToGeographic,
            (Some(CrsKind::Projected), Some(CrsKind::Projected)) => Self::ProjectedToProjected,
            _ => Self::Unknown,
        }
    }
}

/// Aperçu d'une transformation, calculé sur les coins de l'emprise
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformPreview {
    pub source_crs: String,
    pub target_crs: String,
    pub transformation: TransformationType,
    pub envelope_before: Envelope,
    pub envelope_after: Envelope,
    /// Aire après / aire avant, absente pour une emprise dégénérée
    pub area_ratio: Option<f64>,
}

/// Moteur de reprojection
#[derive(Clone)]
pub struct ReprojectionEngine {
    provider: Arc<dyn TransformProvider>,
}

impl fmt::Debug for ReprojectionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReprojectionEngine").finish_non_exhaustive()
    }
}

impl Default for ReprojectionEngine {
    fn default() -> Self {
        Self::new(SmartProvider)
    }
}

impl ReprojectionEngine {
    pub fn new(provider: impl TransformProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Reprojette un jeu validé de `source` vers `target`
    ///
    /// # Errors
    ///
    /// - `UnsupportedTransform` si le couple n'est pas pris en charge
    /// - `Reprojection` si toutes les features non vides échouent
    pub fn reproject(
        &self,
        validated: &Validated,
        source: &Crs,
        target: &Crs,
    ) -> Result<ReprojectionOutcome, GeolintError> {
        let dataset = validated.dataset();
        let transform = self.provider.transform(source, target)?;
        let domain = source.code.and_then(lookup).map(|d| d.domain);

        let mut features: Vec<Feature> = Vec::with_capacity(dataset.len());
        let mut failures = Vec::new();
        let mut non_empty = 0;

        for (index, feature) in dataset.features.iter().enumerate() {
            let Some(geometry) = feature.geometry.as_ref().filter(|g| g.coords_count() > 0) else {
                features.push(feature.clone());
                continue;
            };
            non_empty += 1;

            let result = check_domain(geometry, domain.as_ref())
                .and_then(|_| transform_geometry(transform.as_ref(), geometry));

            match result {
                Ok(geometry) => features.push(Feature {
                    geometry: Some(geometry),
                    attributes: feature.attributes.clone(),
                }),
                Err(e) => {
                    debug!(dataset = %dataset.name, feature = index, error = %e, "Feature reprojection failed");
                    failures.push(ReprojectionFailure {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if non_empty > 0 && failures.len() == non_empty {
            return Err(GeolintError::reprojection(format!(
                "all {} features failed to reproject from {} to {} (first: {})",
                non_empty, source.identifier, target.identifier, failures[0].reason
            )));
        }

        let mut output = dataset.with_features(features);
        output.crs = Some(target.normalized());

        info!(
            dataset = %dataset.name,
            from = %source.identifier,
            to = %target.identifier,
            method = transform.description(),
            failed = failures.len(),
            "Dataset reprojected"
        );

        Ok(ReprojectionOutcome {
            envelope_before: dataset.envelope(),
            envelope_after: output.envelope(),
            dataset: output,
            source_crs: source.clone(),
            target_crs: target.normalized(),
            failures,
            method: transform.description(),
        })
    }

    /// Aperçu de la transformation sur les quatre coins de l'emprise
    ///
    /// # Errors
    ///
    /// `CrsUnresolved` si le jeu n'a aucune coordonnée, ou les erreurs de
    /// transformation des coins.
    pub fn preview(&self, dataset: &Dataset, source: &Crs, target: &Crs) -> Result<TransformPreview, GeolintError> {
        let envelope_before = dataset.envelope().ok_or_else(|| GeolintError::CrsUnresolved {
            best: "none".to_string(),
            confidence: 0.0,
        })?;
        let transform = self.provider.transform(source, target)?;

        let corners = envelope_before
            .corners()
            .iter()
            .map(|&(x, y)| transform.transform(x, y))
            .collect::<Result<Vec<_>, _>>()?;

        let envelope_after = corners
            .iter()
            .map(|&(x, y)| Envelope::new(x, y, x, y))
            .reduce(|a, b| a.union(&b))
            .unwrap_or(envelope_before);

        let area_ratio = (envelope_before.area() > 0.0).then(|| envelope_after.area() / envelope_before.area());

        Ok(TransformPreview {
            source_crs: source.identifier.clone(),
            target_crs: target.identifier.clone(),
            transformation: TransformationType::between(source, target),
            envelope_before,
            envelope_after,
            area_ratio,
        })
    }
}

/// Vérifie que toutes les coordonnées sont dans le domaine du CRS source
fn check_domain(geometry: &Geometry, domain: Option<&Envelope>) -> Result<(), GeolintError> {
    let Some(domain) = domain else {
        return Ok(());
    };

    match geometry.coords_iter().find(|c| !domain.contains_point(c.x, c.y)) {
        Some(c) => Err(GeolintError::reprojection(format!(
            "coordinate ({}, {}) outside source CRS domain",
            c.x, c.y
        ))),
        None => Ok(()),
    }
}
