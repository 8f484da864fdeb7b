//! Gestion de la topologie (trous, orientation)

use geo::algorithm::coordinate_position::{CoordPos, CoordinatePosition};
use geo::orient::{Direction, Orient};
use geo::{LineString, Polygon};

use crate::validation::validity::{nested_hole, ring_contact};

/// Conserve les trous situés à l'intérieur de l'extérieur
///
/// Un trou qui croise ou longe l'extérieur ou un trou déjà retenu est
/// écarté, de même qu'un trou contenu dans un trou retenu (ou le contenant).
/// Retourne les trous conservés et le nombre de trous écartés.
pub fn retain_contained_holes(exterior: &LineString, holes: Vec<LineString>) -> (Vec<LineString>, usize) {
    let shell = Polygon::new(exterior.clone(), vec![]);
    let mut kept: Vec<LineString> = Vec::with_capacity(holes.len());
    let mut dropped = 0;

    for hole in holes {
        let inside = hole
            .0
            .iter()
            .all(|c| shell.coordinate_position(c) != CoordPos::Outside);

        if inside && ring_contact(&[exterior, &hole]).is_none() && !kept.iter().any(|k| conflicts(k, &hole)) {
            kept.push(hole);
        } else {
            dropped += 1;
        }
    }

    (kept, dropped)
}

/// Deux trous qui se croisent, se longent ou s'emboîtent
fn conflicts(a: &LineString, b: &LineString) -> bool {
    ring_contact(&[a, b]).is_some() || nested_hole(&[a.clone(), b.clone()]).is_some()
}

/// Oriente un polygone : extérieur anti-horaire, trous horaires
pub fn orient(polygon: &Polygon) -> Polygon {
    polygon.orient(Direction::Default)
}
