//! Nettoyage et démêlage des anneaux

use std::collections::{BTreeMap, BTreeSet};

use geo::algorithm::line_intersection::line_intersection;
use geo::{Coord, Line, LineString};
use tracing::debug;

use crate::validation::crossings::{intersections, ring_segments, Segment};
use crate::validation::validity::{cross, is_zero_area, ring_error};

use super::fallback::convex_hull_ring;

/// Résultat de la réparation d'un anneau
#[derive(Debug, Clone, PartialEq)]
pub enum RingRepair {
    /// Anneau simple obtenu en conservant les sommets
    Fixed(LineString),
    /// Les croisements persistent : enveloppe convexe des sommets
    Hull(LineString),
    /// Moins de 3 sommets distincts ou aire nulle
    Degenerate,
}

impl RingRepair {
    pub fn ring(&self) -> Option<&LineString> {
        match self {
            Self::Fixed(ring) | Self::Hull(ring) => Some(ring),
            Self::Degenerate => None,
        }
    }
}

/// Répare un anneau : doublons, pointes, fermeture, puis démêlage
pub fn repair_ring(ring: &LineString) -> RingRepair {
    let mut open = clean_ring(&ring.0);

    if open.len() < 3 || is_zero_area(&open) {
        return RingRepair::Degenerate;
    }

    if untangle(&mut open) {
        let closed = close_ring(open.clone());
        if ring_error(&closed).is_none() {
            return RingRepair::Fixed(closed);
        }
    }

    debug!(points = open.len(), "Ring still self-intersecting, using convex hull");
    match convex_hull_ring(&open) {
        Some(hull) if ring_error(&hull).is_none() => RingRepair::Hull(hull),
        _ => RingRepair::Degenerate,
    }
}

/// Anneau ouvert (sans sommet de fermeture), sans doublons ni pointes
pub fn clean_ring(coords: &[Coord]) -> Vec<Coord> {
    let mut open = dedup(coords);

    loop {
        let before = open.len();
        remove_spikes(&mut open);
        open = dedup(&open);
        if open.len() == before {
            break;
        }
    }

    open
}

/// Supprime les doublons consécutifs, y compris entre le dernier et le premier sommet
fn dedup(coords: &[Coord]) -> Vec<Coord> {
    let mut out: Vec<Coord> = Vec::with_capacity(coords.len());
    for &c in coords {
        if out.last() != Some(&c) {
            out.push(c);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Supprime les sommets formant un aller-retour de largeur nulle
fn remove_spikes(open: &mut Vec<Coord>) {
    let mut i = 0;
    while open.len() >= 3 && i < open.len() {
        let n = open.len();
        let prev = open[(i + n - 1) % n];
        let cur = open[i];
        let next = open[(i + 1) % n];

        let back_and_forth = cross(prev, cur, next) == 0.0
            && (cur.x - prev.x) * (next.x - cur.x) + (cur.y - prev.y) * (next.y - cur.y) < 0.0;

        if back_and_forth {
            open.remove(i);
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
}

/// Ferme un anneau ouvert
pub fn close_ring(mut open: Vec<Coord>) -> LineString {
    if let Some(&first) = open.first() {
        if open.last() != Some(&first) || open.len() == 1 {
            open.push(first);
        }
    }
    LineString::new(open)
}

/// Supprime les auto-intersections par inversion de segments (2-opt)
///
/// Tous les sommets sont conservés. Retourne `false` si des croisements
/// persistent après le nombre maximal d'itérations.
pub fn untangle(open: &mut [Coord]) -> bool {
    let n = open.len();
    if n < 4 {
        return true;
    }

    let mut tour = Tour::new(open);
    let max_iterations = (4 * n * n).min(64 * n + 1024);
    for _ in 0..max_iterations {
        let Some((a, b)) = tour.crossings.first().copied() else {
            break;
        };
        tour.uncross(a, b);
    }

    for (slot, &id) in open.iter_mut().zip(&tour.order) {
        *slot = tour.coords[id];
    }
    tour.crossings.is_empty()
}

/// Arête non orientée entre deux sommets, repérés par leur index d'origine
type Edge = (usize, usize);

fn edge(u: usize, v: usize) -> Edge {
    (u.min(v), u.max(v))
}

fn pair(a: Edge, b: Edge) -> (Edge, Edge) {
    (a.min(b), a.max(b))
}

fn shares_vertex(a: Edge, b: Edge) -> bool {
    a.0 == b.0 || a.0 == b.1 || a.1 == b.0 || a.1 == b.1
}

/// Parcours de l'anneau et ensemble des croisements entre arêtes non voisines
///
/// Une inversion ne crée que deux arêtes : seules celles-ci sont
/// comparées au reste de l'anneau.
struct Tour {
    coords: Vec<Coord>,
    order: Vec<usize>,
    pos: Vec<usize>,
    crossings: BTreeSet<(Edge, Edge)>,
    partners: BTreeMap<Edge, BTreeSet<Edge>>,
}

impl Tour {
    fn new(open: &[Coord]) -> Self {
        let n = open.len();
        let mut tour = Self {
            coords: open.to_vec(),
            order: (0..n).collect(),
            pos: (0..n).collect(),
            crossings: BTreeSet::new(),
            partners: BTreeMap::new(),
        };

        let closed: Vec<Coord> = open.iter().chain(open.first()).copied().collect();
        let segments: Vec<Segment> = ring_segments(0, &closed).collect();
        for (a, b, _) in intersections(&segments) {
            tour.link(edge(a.index, (a.index + 1) % n), edge(b.index, (b.index + 1) % n));
        }
        tour
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn edge_at(&self, k: usize) -> Edge {
        edge(self.order[k], self.order[(k + 1) % self.len()])
    }

    /// Position de l'arête dans le parcours
    fn position(&self, e: Edge) -> usize {
        let (pu, pv) = (self.pos[e.0], self.pos[e.1]);
        if pv == (pu + 1) % self.len() {
            pu
        } else {
            pv
        }
    }

    fn line(&self, e: Edge) -> Line {
        Line::new(self.coords[e.0], self.coords[e.1])
    }

    fn link(&mut self, a: Edge, b: Edge) {
        if a == b || shares_vertex(a, b) {
            return;
        }
        self.crossings.insert(pair(a, b));
        self.partners.entry(a).or_default().insert(b);
        self.partners.entry(b).or_default().insert(a);
    }

    fn unlink_all(&mut self, e: Edge) {
        for other in self.partners.remove(&e).unwrap_or_default() {
            self.crossings.remove(&pair(e, other));
            if let Some(set) = self.partners.get_mut(&other) {
                set.remove(&e);
            }
        }
    }

    /// Inverse le chemin entre deux arêtes qui se croisent
    fn uncross(&mut self, a: Edge, b: Edge) {
        let (pa, pb) = (self.position(a), self.position(b));
        let (i, j) = (pa.min(pb), pa.max(pb));

        self.unlink_all(a);
        self.unlink_all(b);

        self.order[i + 1..=j].reverse();
        for k in i + 1..=j {
            self.pos[self.order[k]] = k;
        }

        for created in [self.edge_at(i), self.edge_at(j)] {
            let line = self.line(created);
            for k in 0..self.len() {
                let other = self.edge_at(k);
                if !shares_vertex(created, other) && line_intersection(line, self.line(other)).is_some() {
                    self.link(created, other);
                }
            }
        }
    }
}
