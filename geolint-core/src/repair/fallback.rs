//! Fallback convex hull pour les anneaux non démêlables

use geo::{ConvexHull, Coord, LineString, MultiPoint, Point};

/// Enveloppe convexe des sommets d'un anneau
///
/// Retourne `None` s'il y a moins de 3 points.
pub fn convex_hull_ring(coords: &[Coord]) -> Option<LineString> {
    if coords.len() < 3 {
        return None;
    }

    let points: Vec<Point> = coords.iter().map(|&c| Point::from(c)).collect();
    let hull = MultiPoint::new(points).convex_hull();
    let (exterior, _) = hull.into_inner();

    Some(exterior)
}
