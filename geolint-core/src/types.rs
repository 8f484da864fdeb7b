//! Types de données pour le crate geolint-core

use std::collections::BTreeMap;
use std::fmt;

use geo::{BoundingRect, CoordsIter, Geometry, Rect};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;

/// Un jeu de données vectoriel chargé par un `FormatIO`
///
/// Une fois passé à la validation, un `Dataset` n'est plus modifié :
/// chaque étape retourne une nouvelle valeur.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Nom du fichier source (ou `merged`)
    pub name: String,

    /// Features, dans l'ordre du fichier source
    pub features: Vec<Feature>,

    /// CRS déclaré par le fichier, s'il existe
    pub crs: Option<Crs>,

    /// Type de géométrie déclaré par le format, s'il existe
    pub geometry_hint: Option<GeometryKind>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            features,
            crs: None,
            geometry_hint: None,
        }
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    /// Type commun à toutes les géométries non nulles, `None` si mixte ou absent
    pub fn uniform_kind(&self) -> Option<GeometryKind> {
        let mut kinds = self.features.iter().filter_map(Feature::kind);
        let first = kinds.next()?;
        kinds.all(|k| k == first).then_some(first)
    }

    /// Copie le jeu de données en remplaçant ses features
    pub fn with_features(&self, features: Vec<Feature>) -> Self {
        Self {
            name: self.name.clone(),
            features,
            crs: self.crs.clone(),
            geometry_hint: self.geometry_hint,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Emprise de toutes les géométries non vides
    pub fn envelope(&self) -> Option<Envelope> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .filter_map(|g| g.bounding_rect())
            .map(Envelope::from)
            .reduce(|a, b| a.union(&b))
    }

    /// Nombre total de sommets
    pub fn vertex_count(&self) -> usize {
        self.features.iter().map(Feature::vertex_count).sum()
    }
}

/// Une feature : une géométrie et ses attributs
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Géométrie, `None` pour une géométrie nulle
    pub geometry: Option<Geometry>,

    /// Attributs (clé -> valeur scalaire)
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry>) -> Self {
        Self {
            geometry: Some(geometry.into()),
            attributes: BTreeMap::new(),
        }
    }

    /// Feature sans géométrie
    pub fn null() -> Self {
        Self {
            geometry: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Vrai si la géométrie est nulle ou ne contient aucune coordonnée
    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    pub fn vertex_count(&self) -> usize {
        self.geometry.as_ref().map_or(0, |g| g.coords_count())
    }

    pub fn kind(&self) -> Option<GeometryKind> {
        self.geometry.as_ref().and_then(GeometryKind::of)
    }
}

/// Valeur d'attribut scalaire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Valeur absente, aussi utilisée pour compléter le schéma lors d'une fusion
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// Nom du type, utilisé pour détecter les conflits de schéma
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Types de géométrie reconnus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl GeometryKind {
    /// Type d'une géométrie, `None` si elle n'est pas reconnue
    pub fn of(geometry: &Geometry) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(Self::Point),
            Geometry::LineString(_) => Some(Self::LineString),
            Geometry::Polygon(_) => Some(Self::Polygon),
            Geometry::MultiPoint(_) => Some(Self::MultiPoint),
            Geometry::MultiLineString(_) => Some(Self::MultiLineString),
            Geometry::MultiPolygon(_) => Some(Self::MultiPolygon),
            _ => None,
        }
    }

    pub fn base(self) -> BaseKind {
        match self {
            Self::Point | Self::MultiPoint => BaseKind::Point,
            Self::LineString | Self::MultiLineString => BaseKind::Line,
            Self::Polygon | Self::MultiPolygon => BaseKind::Polygon,
        }
    }

    /// Type d'une composante : les variantes Multi deviennent simples
    pub fn single(self) -> Self {
        match self {
            Self::MultiPoint => Self::Point,
            Self::MultiLineString => Self::LineString,
            Self::MultiPolygon => Self::Polygon,
            other => other,
        }
    }

    pub fn is_multi(self) -> bool {
        matches!(
            self,
            Self::MultiPoint | Self::MultiLineString | Self::MultiPolygon
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::LineString => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPoint => "MultiPoint",
            Self::MultiLineString => "MultiLineString",
            Self::MultiPolygon => "MultiPolygon",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type de base : les variantes Multi sont rattachées à leur type simple
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseKind {
    Point,
    Line,
    Polygon,
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Polygon => "polygon",
        })
    }
}

/// Emprise (bounding box) en unités du CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Fraction de cette emprise contenue dans `domain`
    ///
    /// Pour une emprise dégénérée (point ou segment), on teste le centre.
    pub fn overlap_ratio(&self, domain: &Envelope) -> f64 {
        if self.area() <= 0.0 {
            let (x, y) = self.center();
            let corners_inside = domain.contains_point(self.min_x, self.min_y)
                && domain.contains_point(self.max_x, self.max_y);
            return if corners_inside && domain.contains_point(x, y) {
                1.0
            } else {
                0.0
            };
        }

        let x1 = self.min_x.max(domain.min_x);
        let y1 = self.min_y.max(domain.min_y);
        let x2 = self.max_x.min(domain.max_x);
        let y2 = self.max_y.min(domain.max_y);

        if x1 >= x2 || y1 >= y2 {
            return 0.0;
        }

        ((x2 - x1) * (y2 - y1)) / self.area()
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
            (self.max_x, self.min_y),
        ]
    }
}

impl From<Rect> for Envelope {
    fn from(rect: Rect) -> Self {
        Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, MultiPoint};

    #[test]
    fn test_feature_emptiness() {
        assert!(Feature::null().is_empty());
        assert!(Feature::new(MultiPoint::<f64>::new(vec![])).is_empty());
        assert!(!Feature::new(point!(x: 1.0, y: 2.0)).is_empty());
    }

    #[test]
    fn test_base_kind() {
        assert_eq!(GeometryKind::MultiPolygon.base(), BaseKind::Polygon);
        assert_eq!(GeometryKind::LineString.base(), BaseKind::Line);
        assert!(GeometryKind::MultiPoint.is_multi());
        assert!(!GeometryKind::Point.is_multi());
        assert_eq!(GeometryKind::MultiLineString.single(), GeometryKind::LineString);
    }

    #[test]
    fn test_uniform_kind() {
        let points = Dataset::new(
            "points",
            vec![Feature::new(point!(x: 0.0, y: 0.0)), Feature::null(), Feature::new(point!(x: 1.0, y: 1.0))],
        );
        assert_eq!(points.uniform_kind(), Some(GeometryKind::Point));

        let mixed = points.with_features(vec![
            Feature::new(point!(x: 0.0, y: 0.0)),
            Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
        ]);
        assert_eq!(mixed.uniform_kind(), None);
        assert_eq!(Dataset::new("none", vec![Feature::null()]).uniform_kind(), None);
    }

    #[test]
    fn test_dataset_envelope() {
        let dataset = Dataset::new(
            "test",
            vec![
                Feature::new(point!(x: -1.0, y: 2.0)),
                Feature::null(),
                Feature::new(line_string![(x: 3.0, y: -4.0), (x: 5.0, y: 0.0)]),
            ],
        );
        let env = dataset.envelope().unwrap();
        assert_eq!(env, Envelope::new(-1.0, -4.0, 5.0, 2.0));
        assert_eq!(dataset.vertex_count(), 3);
    }

    #[test]
    fn test_envelope_overlap() {
        let domain = Envelope::new(-180.0, -90.0, 180.0, 90.0);
        assert_eq!(Envelope::new(0.0, 0.0, 10.0, 10.0).overlap_ratio(&domain), 1.0);
        assert_eq!(
            Envelope::new(170.0, 0.0, 190.0, 10.0).overlap_ratio(&domain),
            0.5
        );
        assert_eq!(Envelope::new(5.0, 5.0, 5.0, 5.0).overlap_ratio(&domain), 1.0);
        assert_eq!(
            Envelope::new(500.0, 5.0, 500.0, 5.0).overlap_ratio(&domain),
            0.0
        );
    }

    #[test]
    fn test_polygon_vertex_count() {
        let feature = Feature::new(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]);
        assert_eq!(feature.vertex_count(), 4);
        assert_eq!(feature.kind(), Some(GeometryKind::Polygon));
    }
}
