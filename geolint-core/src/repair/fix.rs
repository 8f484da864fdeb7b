//! Correction d'une géométrie invalide en conservant son type

use std::panic::{self, AssertUnwindSafe};

use geo::{BooleanOps, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};
use tracing::debug;

use crate::validation::validity::{distinct_vertices, is_empty_polygon, is_valid, overlapping_parts};

use super::ring::{repair_ring, RingRepair};
use super::topology::{orient, retain_contained_holes};

/// Géométrie corrigée
#[derive(Debug, Clone, PartialEq)]
pub struct Fixed {
    pub geometry: Geometry,
    /// Au moins un anneau remplacé par son enveloppe convexe
    pub used_hull: bool,
}

/// Corrige une géométrie, `None` si elle est irréparable
pub fn fix_geometry(geometry: &Geometry) -> Option<Fixed> {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Some(Fixed {
            geometry: geometry.clone(),
            used_hull: false,
        }),
        Geometry::LineString(ls) => fix_line(ls).map(|ls| Fixed {
            geometry: Geometry::LineString(ls),
            used_hull: false,
        }),
        Geometry::MultiLineString(mls) => {
            let lines = mls
                .iter()
                .filter(|ls| !ls.0.is_empty())
                .map(fix_line)
                .collect::<Option<Vec<_>>>()?;
            Some(Fixed {
                geometry: Geometry::MultiLineString(MultiLineString::new(lines)),
                used_hull: false,
            })
        }
        Geometry::Polygon(p) => fix_polygon(p).map(|(p, used_hull)| Fixed {
            geometry: Geometry::Polygon(p),
            used_hull,
        }),
        Geometry::MultiPolygon(mp) => {
            let mut used_hull = false;
            let mut polygons = Vec::with_capacity(mp.0.len());
            for p in mp.iter().filter(|p| !is_empty_polygon(p)) {
                if is_valid(&Geometry::Polygon(p.clone())) {
                    polygons.push(p.clone());
                    continue;
                }
                let (fixed, hull) = fix_polygon(p)?;
                used_hull |= hull;
                polygons.push(fixed);
            }

            let mut multi = MultiPolygon::new(polygons);
            if let Some((i, j)) = overlapping_parts(&multi) {
                debug!(first = i, second = j, "Merging overlapping parts");
                multi = dissolve(&multi)?;
            }
            Some(Fixed {
                geometry: Geometry::MultiPolygon(multi),
                used_hull,
            })
        }
        _ => None,
    }
}

fn fix_line(ls: &LineString) -> Option<LineString> {
    let coords = distinct_vertices(&ls.0);
    if coords.len() < 2 {
        return None;
    }
    Some(LineString::new(coords))
}

fn fix_polygon(p: &Polygon) -> Option<(Polygon, bool)> {
    let exterior = repair_ring(p.exterior());
    let mut used_hull = matches!(exterior, RingRepair::Hull(_));
    let exterior = exterior.ring()?.clone();

    let mut holes = Vec::with_capacity(p.interiors().len());
    for interior in p.interiors() {
        let repaired = repair_ring(interior);
        used_hull |= matches!(repaired, RingRepair::Hull(_));
        match repaired.ring() {
            Some(ring) => holes.push(ring.clone()),
            None => debug!(points = interior.0.len(), "Dropping degenerate interior ring"),
        }
    }

    let (holes, dropped) = retain_contained_holes(&exterior, holes);
    if dropped > 0 {
        debug!(dropped, "Dropping interior rings outside exterior");
    }

    Some((orient(&Polygon::new(exterior, holes)), used_hull))
}

/// Union des composantes, orientées comme les autres polygones corrigés
fn dissolve(mp: &MultiPolygon) -> Option<MultiPolygon> {
    // Les opérations booléennes de geo peuvent paniquer sur des entrées dégénérées
    let union = panic::catch_unwind(AssertUnwindSafe(|| {
        mp.iter().fold(MultiPolygon::new(vec![]), |acc, p| {
            acc.union(&MultiPolygon::new(vec![p.clone()]))
        })
    }));

    match union {
        Ok(union) if !union.0.is_empty() => Some(MultiPolygon::new(union.iter().map(orient).collect())),
        _ => {
            debug!(parts = mp.0.len(), "Union of overlapping parts failed");
            None
        }
    }
}
