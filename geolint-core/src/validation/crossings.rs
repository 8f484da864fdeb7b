//! Recherche des intersections entre segments
//!
//! Au-delà de quelques dizaines de segments, la recherche passe par le
//! balayage de Bentley-Ottmann de `geo` (O((n + k) log n)) au lieu de la
//! comparaison de toutes les paires.

use std::panic::{self, AssertUnwindSafe};

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::sweep::{Cross, Intersections, LineOrPoint};
use geo::{Coord, Line};
use tracing::debug;

/// En dessous, la comparaison par paires est plus rapide que le balayage
const SWEEP_MIN_SEGMENTS: usize = 64;

/// Segment repéré par son anneau (ou sa composante) et sa position
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Segment {
    pub ring: usize,
    pub index: usize,
    pub line: Line,
}

impl Cross for Segment {
    type Scalar = f64;

    fn line(&self) -> LineOrPoint<f64> {
        self.line.into()
    }
}

/// Deux segments qui se rencontrent, ordonnés par (anneau, position)
pub(crate) type Crossing = (Segment, Segment, LineIntersection<f64>);

/// Segments d'un anneau fermé
pub(crate) fn ring_segments(ring: usize, coords: &[Coord]) -> impl Iterator<Item = Segment> + '_ {
    coords.windows(2).enumerate().map(move |(index, w)| Segment {
        ring,
        index,
        line: Line::new(w[0], w[1]),
    })
}

/// Toutes les intersections, triées par (anneau, position) du premier puis du second segment
pub(crate) fn intersections(segments: &[Segment]) -> Vec<Crossing> {
    let mut found = if segments.len() < SWEEP_MIN_SEGMENTS {
        pairwise(segments)
    } else {
        // Le balayage de geo peut paniquer sur des entrées dégénérées
        panic::catch_unwind(AssertUnwindSafe(|| sweep(segments))).unwrap_or_else(|_| {
            debug!(segments = segments.len(), "Sweep failed, comparing all pairs");
            pairwise(segments)
        })
    };

    found.sort_by_key(|(a, b, _)| (a.ring, a.index, b.ring, b.index));
    found.dedup_by_key(|(a, b, _)| (a.ring, a.index, b.ring, b.index));
    found
}

fn key(s: &Segment) -> (usize, usize) {
    (s.ring, s.index)
}

fn ordered(a: Segment, b: Segment, hit: LineIntersection<f64>) -> Crossing {
    if key(&a) <= key(&b) {
        (a, b, hit)
    } else {
        (b, a, hit)
    }
}

fn pairwise(segments: &[Segment]) -> Vec<Crossing> {
    let mut found = Vec::new();
    for (i, a) in segments.iter().enumerate() {
        for b in &segments[i + 1..] {
            if let Some(hit) = line_intersection(a.line, b.line) {
                found.push(ordered(*a, *b, hit));
            }
        }
    }
    found
}

fn sweep(segments: &[Segment]) -> Vec<Crossing> {
    Intersections::from_iter(segments.iter().copied())
        .map(|(a, b, hit)| ordered(a, b, hit))
        .collect()
}
