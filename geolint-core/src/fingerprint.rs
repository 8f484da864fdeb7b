//! Empreinte BLAKE3 des géométries d'un jeu de données
//!
//! Les anneaux de polygones sont normalisés pour commencer au sommet
//! lexicographiquement le plus petit : un polygone qui démarre à un autre
//! sommet a la même empreinte. Les attributs ne sont pas pris en compte.

use std::fmt;

use blake3::Hasher;
use geo::{Coord, Geometry, LineString, Polygon};
use serde::{Serialize, Serializer};

use crate::types::Dataset;

/// Empreinte de 32 octets, affichée en hexadécimal
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Préfixe court pour l'affichage
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Empreinte des géométries d'un jeu de données, dans l'ordre des features
pub fn dataset_fingerprint(dataset: &Dataset) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(&(dataset.features.len() as u64).to_le_bytes());

    for feature in &dataset.features {
        match &feature.geometry {
            Some(geometry) => hash_geometry(&mut hasher, geometry),
            None => {
                hasher.update(b"NULL");
            }
        }
    }

    Fingerprint(*hasher.finalize().as_bytes())
}

/// Empreinte d'une géométrie isolée
pub fn geometry_fingerprint(geometry: &Geometry) -> Fingerprint {
    let mut hasher = Hasher::new();
    hash_geometry(&mut hasher, geometry);
    Fingerprint(*hasher.finalize().as_bytes())
}

fn hash_geometry(hasher: &mut Hasher, geometry: &Geometry) {
    match geometry {
        Geometry::Point(p) => {
            hasher.update(b"POINT");
            hash_coord(hasher, p.0);
        }
        Geometry::LineString(ls) => {
            hasher.update(b"LINESTRING");
            hash_line(hasher, ls);
        }
        Geometry::Polygon(p) => hash_polygon(hasher, p),
        Geometry::MultiPoint(mp) => {
            hasher.update(b"MULTIPOINT");
            hasher.update(&(mp.0.len() as u64).to_le_bytes());
            for point in mp.iter() {
                hash_coord(hasher, point.0);
            }
        }
        Geometry::MultiLineString(mls) => {
            hasher.update(b"MULTILINESTRING");
            for ls in mls.iter() {
                hasher.update(b"LS");
                hash_line(hasher, ls);
            }
        }
        Geometry::MultiPolygon(mp) => {
            hasher.update(b"MULTIPOLYGON");
            for p in mp.iter() {
                hash_polygon(hasher, p);
            }
        }
        other => {
            hasher.update(format!("{:?}", other).as_bytes());
        }
    }
}

fn hash_line(hasher: &mut Hasher, ls: &LineString) {
    hasher.update(&(ls.0.len() as u64).to_le_bytes());
    for &coord in &ls.0 {
        hash_coord(hasher, coord);
    }
}

fn hash_polygon(hasher: &mut Hasher, p: &Polygon) {
    hasher.update(b"POLYGON");
    hash_ring_normalized(hasher, p.exterior());
    for interior in p.interiors() {
        hasher.update(b"INT");
        hash_ring_normalized(hasher, interior);
    }
}

/// Hash un anneau en commençant au sommet le plus petit (x, puis y)
fn hash_ring_normalized(hasher: &mut Hasher, ring: &LineString) {
    // Le sommet de fermeture est ignoré
    let len = if ring.0.len() > 1 && ring.0.first() == ring.0.last() {
        ring.0.len() - 1
    } else {
        ring.0.len()
    };

    hasher.update(&(len as u64).to_le_bytes());
    if len == 0 {
        return;
    }

    let start = (0..len)
        .min_by(|&a, &b| {
            let (ca, cb) = (ring.0[a], ring.0[b]);
            ca.x.total_cmp(&cb.x).then_with(|| ca.y.total_cmp(&cb.y))
        })
        .unwrap_or(0);

    for i in 0..len {
        hash_coord(hasher, ring.0[(start + i) % len]);
    }
}

fn hash_coord(hasher: &mut Hasher, coord: Coord) {
    hasher.update(&coord.x.to_bits().to_le_bytes());
    hasher.update(&coord.y.to_bits().to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feature;
    use geo::{point, Point};

    fn square_from(start: usize) -> Geometry {
        let mut coords = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        coords.rotate_left(start);
        Geometry::Polygon(Polygon::new(LineString::from(coords), vec![]))
    }

    #[test]
    fn test_same_geometry_same_fingerprint() {
        let p1 = Geometry::Point(Point::new(1.0, 2.0));
        let p2 = Geometry::Point(Point::new(1.0, 2.0));
        assert_eq!(geometry_fingerprint(&p1), geometry_fingerprint(&p2));
        assert_ne!(
            geometry_fingerprint(&p1),
            geometry_fingerprint(&Geometry::Point(Point::new(1.0, 3.0)))
        );
    }

    #[test]
    fn test_polygon_ring_start_independent() {
        let first = geometry_fingerprint(&square_from(0));
        for start in 1..4 {
            assert_eq!(first, geometry_fingerprint(&square_from(start)), "start={}", start);
        }
    }

    #[test]
    fn test_dataset_fingerprint_ignores_attributes() {
        let a = Dataset::new("a", vec![Feature::new(point!(x: 1.0, y: 1.0)).with_attribute("k", 1i64)]);
        let b = Dataset::new("b", vec![Feature::new(point!(x: 1.0, y: 1.0))]);
        assert_eq!(dataset_fingerprint(&a), dataset_fingerprint(&b));

        let c = Dataset::new("c", vec![Feature::new(point!(x: 1.0, y: 1.0)), Feature::null()]);
        assert_ne!(dataset_fingerprint(&a), dataset_fingerprint(&c));
    }

    #[test]
    fn test_hex_output() {
        let fp = geometry_fingerprint(&square_from(0));
        assert_eq!(fp.to_hex().len(), 64);
        assert_eq!(fp.short().len(), 12);
        assert_eq!(serde_json::to_value(fp).unwrap(), serde_json::json!(fp.to_hex()));
    }
}
