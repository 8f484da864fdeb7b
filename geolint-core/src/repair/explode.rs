//! Éclatement des géométries multiples

use geo::{CoordsIter, Geometry};

use crate::types::Feature;

/// Une feature par composante non vide, attributs dupliqués
///
/// Retourne `None` pour une géométrie simple ou une géométrie multiple sans
/// composante non vide.
pub fn explode(feature: &Feature) -> Option<Vec<Feature>> {
    let parts: Vec<Geometry> = match feature.geometry.as_ref()? {
        Geometry::MultiPoint(mp) => mp.iter().copied().map(Geometry::Point).collect(),
        Geometry::MultiLineString(mls) => mls
            .iter()
            .filter(|ls| !ls.0.is_empty())
            .cloned()
            .map(Geometry::LineString)
            .collect(),
        Geometry::MultiPolygon(mp) => mp
            .iter()
            .filter(|p| p.coords_count() > 0)
            .cloned()
            .map(Geometry::Polygon)
            .collect(),
        _ => return None,
    };

    if parts.is_empty() {
        return None;
    }

    Some(
        parts
            .into_iter()
            .map(|geometry| Feature {
                geometry: Some(geometry),
                attributes: feature.attributes.clone(),
            })
            .collect(),
    )
}
