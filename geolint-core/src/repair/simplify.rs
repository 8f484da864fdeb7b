//! Simplification des géométries (Douglas-Peucker)

use geo::{CoordsIter, Geometry, Simplify};

use crate::validation::validity::is_valid;

/// Géométrie simplifiée avec le nombre de sommets avant et après
#[derive(Debug, Clone, PartialEq)]
pub struct Simplified {
    pub geometry: Geometry,
    pub vertices_before: usize,
    pub vertices_after: usize,
}

/// Simplifie une géométrie linéaire ou surfacique
///
/// `None` pour les points et les géométries invalides, si aucun sommet
/// n'est retiré ou si le résultat n'est plus valide.
pub fn simplify_geometry(geometry: &Geometry, tolerance: f64) -> Option<Simplified> {
    if !is_valid(geometry) {
        return None;
    }

    let simplified = match geometry {
        Geometry::LineString(ls) => Geometry::LineString(ls.simplify(&tolerance)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(mls.simplify(&tolerance)),
        Geometry::Polygon(p) => Geometry::Polygon(p.simplify(&tolerance)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(mp.simplify(&tolerance)),
        _ => return None,
    };

    let vertices_before = geometry.coords_count();
    let vertices_after = simplified.coords_count();
    if vertices_after >= vertices_before || !is_valid(&simplified) {
        return None;
    }

    Some(Simplified {
        geometry: simplified,
        vertices_before,
        vertices_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon};

    #[test]
    fn test_simplify_line() {
        let line = Geometry::LineString(line_string![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0005),
            (x: 2.0, y: 0.0),
            (x: 3.0, y: 0.0),
        ]);
        let simplified = simplify_geometry(&line, 0.001).unwrap();
        assert_eq!(simplified.vertices_before, 4);
        assert_eq!(simplified.vertices_after, 2);
        assert!(simplify_geometry(&simplified.geometry, 0.001).is_none());
    }

    #[test]
    fn test_collapsed_polygon_kept() {
        let thin = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 5.0, y: 0.1),
        ]);
        assert!(simplify_geometry(&thin, 1.0).is_none());
        assert!(simplify_geometry(&Geometry::Point(point!(x: 1.0, y: 1.0)), 1.0).is_none());
    }
}
