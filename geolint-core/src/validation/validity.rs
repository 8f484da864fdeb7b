//! Tests de validité topologique
//!
//! Règles appliquées aux géométries non vides :
//! - Point : toujours valide (coordonnées finies garanties par l'intégrité)
//! - LineString : au moins deux sommets distincts
//! - Polygon : anneaux fermés, au moins 4 coordonnées, aire non nulle,
//!   pas d'auto-intersection, trous à l'intérieur de l'extérieur sans le
//!   croiser ni le longer, aucun trou dans un autre trou
//! - Multi* : chaque composante non vide est valide ; les polygones d'un
//!   MultiPolygon ne se recouvrent pas (un contact ponctuel est admis)

use geo::algorithm::coordinate_position::{CoordPos, CoordinatePosition};
use geo::algorithm::line_intersection::LineIntersection;
use geo::{BoundingRect, Coord, Geometry, LineString, MultiPolygon, Polygon, Rect};

use super::crossings::{intersections, ring_segments, Segment};

/// Diagnostic de la première non-conformité rencontrée, `None` si valide
pub fn validity_error(geometry: &Geometry) -> Option<String> {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => None,
        Geometry::LineString(ls) => line_error(ls),
        Geometry::MultiLineString(mls) => mls
            .iter()
            .enumerate()
            .filter(|(_, ls)| !ls.0.is_empty())
            .find_map(|(i, ls)| line_error(ls).map(|e| format!("part {}: {}", i, e))),
        Geometry::Polygon(p) => polygon_error(p),
        Geometry::MultiPolygon(mp) => mp
            .iter()
            .enumerate()
            .filter(|(_, p)| !is_empty_polygon(p))
            .find_map(|(i, p)| polygon_error(p).map(|e| format!("part {}: {}", i, e)))
            .or_else(|| overlapping_parts(mp).map(|(i, j)| format!("parts {} and {} overlap", i, j))),
        _ => Some("unsupported geometry type".to_string()),
    }
}

pub fn is_valid(geometry: &Geometry) -> bool {
    validity_error(geometry).is_none()
}

pub(crate) fn is_empty_polygon(p: &Polygon) -> bool {
    p.exterior().0.is_empty() && p.interiors().iter().all(|r| r.0.is_empty())
}

fn line_error(ls: &LineString) -> Option<String> {
    if distinct_vertices(&ls.0).len() < 2 {
        return Some("zero-length line (fewer than 2 distinct vertices)".to_string());
    }
    None
}

fn polygon_error(p: &Polygon) -> Option<String> {
    if p.exterior().0.is_empty() {
        return Some("empty exterior ring with interior rings".to_string());
    }

    if let Some(e) = ring_error(p.exterior()) {
        return Some(format!("exterior ring: {}", e));
    }

    for (i, interior) in p.interiors().iter().enumerate() {
        if let Some(e) = ring_error(interior) {
            return Some(format!("interior ring {}: {}", i, e));
        }
    }

    // Anneau 0 : extérieur, anneau i + 1 : trou i
    let rings: Vec<&LineString> = std::iter::once(p.exterior()).chain(p.interiors()).collect();
    if let Some((a, b, at)) = ring_contact(&rings) {
        return Some(if a == 0 {
            format!("interior ring {} crosses exterior at ({}, {})", b - 1, at.x, at.y)
        } else {
            format!("interior rings {} and {} cross at ({}, {})", a - 1, b - 1, at.x, at.y)
        });
    }

    let shell = Polygon::new(p.exterior().clone(), vec![]);
    for (i, interior) in p.interiors().iter().enumerate() {
        if interior
            .0
            .iter()
            .any(|c| shell.coordinate_position(c) == CoordPos::Outside)
        {
            return Some(format!("interior ring {} lies outside exterior", i));
        }
    }

    nested_hole(p.interiors()).map(|(inner, outer)| format!("interior ring {} lies inside interior ring {}", inner, outer))
}

/// Diagnostic d'un anneau isolé
pub(crate) fn ring_error(ring: &LineString) -> Option<String> {
    let coords = &ring.0;

    if coords.len() < 4 {
        return Some(format!("ring has {} coordinates (minimum 4)", coords.len()));
    }

    if coords.first() != coords.last() {
        return Some("ring is not closed".to_string());
    }

    let distinct = distinct_vertices(coords);
    if distinct.len() < 4 {
        return Some("degenerate ring (fewer than 3 distinct vertices)".to_string());
    }

    if is_zero_area(&distinct) {
        return Some("zero-area ring".to_string());
    }

    if let Some(at) = self_intersection(&distinct) {
        return Some(format!("self-intersection at ({}, {})", at.x, at.y));
    }

    None
}

/// Sommets sans doublons consécutifs
pub(crate) fn distinct_vertices(coords: &[Coord]) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::with_capacity(coords.len());
    for &c in coords {
        if out.last() != Some(&c) {
            out.push(c);
        }
    }
    out
}

/// Anneau dégénéré : tous les sommets sont alignés
pub(crate) fn is_zero_area(coords: &[Coord]) -> bool {
    let Some(&origin) = coords.first() else {
        return true;
    };

    let far = coords.iter().copied().fold(origin, |best, c| {
        if dist2(origin, c) > dist2(origin, best) {
            c
        } else {
            best
        }
    });
    let base = dist2(origin, far);
    if base == 0.0 {
        return true;
    }

    coords
        .iter()
        .all(|&c| cross(origin, far, c).abs() <= 1e-9 * base)
}

fn dist2(a: Coord, b: Coord) -> f64 {
    (a.x - b.x).powi(2) + (a.y - b.y).powi(2)
}

/// Produit vectoriel (b - a) x (c - a)
pub(crate) fn cross(a: Coord, b: Coord, c: Coord) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Première auto-intersection d'un anneau fermé sans doublons consécutifs
pub(crate) fn self_intersection(coords: &[Coord]) -> Option<Coord> {
    let segments: Vec<Segment> = ring_segments(0, coords).collect();
    let n = segments.len();

    intersections(&segments)
        .into_iter()
        .find_map(|(a, b, hit)| {
            let (i, j) = (a.index, b.index);
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match hit {
                // Deux segments consécutifs se touchent à leur sommet commun
                LineIntersection::SinglePoint { .. } if adjacent => None,
                LineIntersection::SinglePoint { intersection, .. } => Some(intersection),
                LineIntersection::Collinear { intersection } => Some(intersection.start),
            }
        })
}

/// Premier contact interdit entre deux anneaux distincts
///
/// Un croisement propre ou un tronçon commun est interdit, un sommet
/// commun est admis. Retourne les index des deux anneaux et le point.
pub(crate) fn ring_contact(rings: &[&LineString]) -> Option<(usize, usize, Coord)> {
    let segments: Vec<Segment> = rings
        .iter()
        .enumerate()
        .flat_map(|(r, ring)| ring_segments(r, &ring.0))
        .collect();

    intersections(&segments)
        .into_iter()
        .filter(|(a, b, _)| a.ring != b.ring)
        .find_map(|(a, b, hit)| match hit {
            LineIntersection::SinglePoint {
                intersection,
                is_proper: true,
            } => Some((a.ring, b.ring, intersection)),
            LineIntersection::Collinear { intersection } => Some((a.ring, b.ring, intersection.start)),
            LineIntersection::SinglePoint { .. } => None,
        })
}

/// Position d'un anneau par rapport à un polygone qu'il ne croise pas
///
/// Décidée par le premier sommet ou milieu de segment hors de la frontière.
fn ring_inside(ring: &LineString, polygon: &Polygon) -> bool {
    let (Some(inner), Some(outer)) = (ring.bounding_rect(), polygon.bounding_rect()) else {
        return false;
    };
    if !rect_contains(&outer, &inner) {
        return false;
    }

    let midpoints = ring.0.windows(2).map(|w| Coord {
        x: (w[0].x + w[1].x) / 2.0,
        y: (w[0].y + w[1].y) / 2.0,
    });
    ring.0
        .iter()
        .copied()
        .chain(midpoints)
        .map(|c| polygon.coordinate_position(&c))
        .find(|pos| *pos != CoordPos::OnBoundary)
        == Some(CoordPos::Inside)
}

fn rect_contains(outer: &Rect, inner: &Rect) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

/// Premier trou contenu dans un autre trou : (trou intérieur, trou englobant)
pub(crate) fn nested_hole(holes: &[LineString]) -> Option<(usize, usize)> {
    let areas: Vec<Polygon> = holes.iter().map(|h| Polygon::new(h.clone(), vec![])).collect();
    for i in 0..holes.len() {
        for j in 0..holes.len() {
            if i != j && ring_inside(&holes[i], &areas[j]) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Premier couple de composantes d'un MultiPolygon qui se recouvrent
///
/// Deux composantes se recouvrent si leurs frontières se croisent ou se
/// longent, ou si l'extérieur de l'une est à l'intérieur de l'autre.
pub(crate) fn overlapping_parts(mp: &MultiPolygon) -> Option<(usize, usize)> {
    let parts: Vec<(usize, &Polygon)> = mp.iter().enumerate().filter(|(_, p)| !is_empty_polygon(p)).collect();
    if parts.len() < 2 {
        return None;
    }

    let segments: Vec<Segment> = parts
        .iter()
        .flat_map(|&(i, p)| {
            std::iter::once(p.exterior())
                .chain(p.interiors())
                .flat_map(move |ring| ring_segments(i, &ring.0))
        })
        .collect();
    let contact = intersections(&segments)
        .into_iter()
        .filter(|(a, b, _)| a.ring != b.ring)
        .find(|(_, _, hit)| hit.is_proper() || matches!(hit, LineIntersection::Collinear { .. }));
    if let Some((a, b, _)) = contact {
        return Some((a.ring, b.ring));
    }

    for (n, (i, a)) in parts.iter().enumerate() {
        for (j, b) in &parts[n + 1..] {
            if ring_inside(a.exterior(), b) || ring_inside(b.exterior(), a) {
                return Some((*i, *j));
            }
        }
    }
    None
}
