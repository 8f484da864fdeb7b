//! Résolution et inférence du système de coordonnées (CRS)
//!
//! Un CRS déclaré par le fichier est toujours conservé (normalisé, jamais
//! re-noté). En son absence, on classe les candidats d'un petit registre
//! fermé (WGS84, Web Mercator, WGS84 / UTM) selon l'adéquation de l'emprise
//! des données avec le domaine de validité de chaque candidat.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Dataset, Envelope};
use crate::GeolintError;

/// Seuil de confiance minimal par défaut
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Écart en dessous duquel deux candidats sont considérés ex aequo
pub const DEFAULT_TIE_EPSILON: f64 = 0.02;

/// Descripteur normalisé d'un système de coordonnées
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    /// Forme normalisée (`EPSG:4326`) ou définition brute
    pub identifier: String,

    /// Code EPSG si connu
    pub code: Option<u32>,

    /// Nom lisible si le code est dans le registre
    pub name: Option<String>,

    /// Vrai si le CRS a été deviné à partir des coordonnées
    pub inferred: bool,

    /// Confiance de l'inférence, uniquement quand `inferred` est vrai
    pub confidence: Option<f64>,
}

impl Crs {
    /// CRS déclaré à partir d'un code EPSG
    pub fn epsg(code: u32) -> Self {
        Self {
            identifier: format!("EPSG:{}", code),
            code: Some(code),
            name: lookup(code).map(|d| d.name),
            inferred: false,
            confidence: None,
        }
    }

    /// Normalise un identifiant utilisateur ou une métadonnée de fichier
    ///
    /// Les formes inconnues sont conservées telles quelles (sans espaces
    /// superflus) comme définition brute.
    pub fn parse(input: &str) -> Self {
        match parse_epsg_code(input) {
            Some(code) => Self::epsg(code),
            None => Self {
                identifier: input.trim().to_string(),
                code: None,
                name: None,
                inferred: false,
                confidence: None,
            },
        }
    }

    /// Représentation normalisée, toujours considérée comme vérité terrain
    pub fn normalized(&self) -> Self {
        let mut crs = match self.code {
            Some(code) => Self::epsg(code),
            None => Self::parse(&self.identifier),
        };
        crs.inferred = false;
        crs.confidence = None;
        crs
    }

    /// Deux CRS désignent-ils le même système ?
    pub fn same_as(&self, other: &Crs) -> bool {
        match (self.code, other.code) {
            (Some(a), Some(b)) => a == b,
            _ => self.identifier == other.identifier,
        }
    }

    /// Nature du CRS si le code est dans le registre
    pub fn kind(&self) -> Option<CrsKind> {
        self.code.and_then(lookup).map(|d| d.kind)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.confidence {
            Some(c) if self.inferred => write!(f, "{} (inferred, confidence {:.3})", self.identifier, c),
            _ => f.write_str(&self.identifier),
        }
    }
}

/// Extrait un code EPSG des formes usuelles
fn parse_epsg_code(input: &str) -> Option<u32> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    static WGS84_ALIASES: OnceLock<Regex> = OnceLock::new();

    let input = input.trim();

    let aliases = WGS84_ALIASES.get_or_init(|| {
        Regex::new(r"(?i)^(urn:ogc:def:crs:ogc:(1\.3)?:crs84|ogc:crs84|crs84|wgs\s?84)$")
            .expect("valid regex")
    });
    if aliases.is_match(input) {
        return Some(4326);
    }

    let patterns = PATTERNS.get_or_init(|| {
        [
            r"(?i)^epsg\s*:\s*(\d+)$",
            r"^(\d+)$",
            r"(?i)^urn:ogc:def:crs:epsg:[^:]*:(\d+)$",
            r"(?i)^https?://www\.opengis\.net/def/crs/epsg/[^/]+/(\d+)$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    });

    patterns
        .iter()
        .find_map(|re| re.captures(input))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Géographique (degrés) ou projeté (mètres)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrsKind {
    Geographic,
    Projected,
}

/// Entrée du registre de CRS candidats
#[derive(Debug, Clone, PartialEq)]
pub struct CrsDefinition {
    pub code: u32,
    pub name: String,
    pub kind: CrsKind,
    /// Domaine de validité en unités du CRS
    pub domain: Envelope,
    /// Probabilité a priori du candidat
    pub prior: f64,
}

const WGS84_DOMAIN: Envelope = Envelope {
    min_x: -180.0,
    min_y: -90.0,
    max_x: 180.0,
    max_y: 90.0,
};

const WEB_MERCATOR_DOMAIN: Envelope = Envelope {
    min_x: -20037508.34,
    min_y: -20048966.10,
    max_x: 20037508.34,
    max_y: 20048966.10,
};

const UTM_DOMAIN: Envelope = Envelope {
    min_x: 100_000.0,
    min_y: 0.0,
    max_x: 900_000.0,
    max_y: 10_000_000.0,
};

fn wgs84() -> CrsDefinition {
    CrsDefinition {
        code: 4326,
        name: "WGS 84".to_string(),
        kind: CrsKind::Geographic,
        domain: WGS84_DOMAIN,
        prior: 1.0,
    }
}

fn web_mercator() -> CrsDefinition {
    CrsDefinition {
        code: 3857,
        name: "WGS 84 / Pseudo-Mercator".to_string(),
        kind: CrsKind::Projected,
        domain: WEB_MERCATOR_DOMAIN,
        prior: 0.9,
    }
}

fn utm(zone: u8, south: bool) -> CrsDefinition {
    let base = if south { 32700 } else { 32600 };
    CrsDefinition {
        code: base + zone as u32,
        name: format!("WGS 84 / UTM zone {}{}", zone, if south { 'S' } else { 'N' }),
        kind: CrsKind::Projected,
        domain: UTM_DOMAIN,
        prior: 0.95,
    }
}

/// Recherche un code dans le registre
pub fn lookup(code: u32) -> Option<CrsDefinition> {
    match code {
        4326 => Some(wgs84()),
        3857 => Some(web_mercator()),
        32601..=32660 => Some(utm((code - 32600) as u8, false)),
        32701..=32760 => Some(utm((code - 32700) as u8, true)),
        _ => None,
    }
}

/// Zone UTM (1..=60) et hémisphère pour une position en degrés
pub fn utm_zone_for(lon: f64, lat: f64) -> (u8, bool) {
    let zone = (((lon + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8;
    (zone, lat < 0.0)
}

fn is_degree_like(env: &Envelope) -> bool {
    WGS84_DOMAIN.contains_point(env.min_x, env.min_y) && WGS84_DOMAIN.contains_point(env.max_x, env.max_y)
}

/// Un candidat noté
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsCandidate {
    pub code: u32,
    pub name: String,
    pub kind: CrsKind,
    pub confidence: f64,
}

impl CrsCandidate {
    fn into_crs(self) -> Crs {
        Crs {
            identifier: format!("EPSG:{}", self.code),
            code: Some(self.code),
            name: Some(self.name),
            inferred: true,
            confidence: Some(self.confidence),
        }
    }
}

/// Résolveur de CRS
#[derive(Debug, Clone)]
pub struct CrsResolver {
    /// En dessous de ce seuil, l'inférence échoue
    pub min_confidence: f64,
    /// Écart de score considéré comme une égalité
    pub tie_epsilon: f64,
    /// Position approximative (lon, lat) des données, pour choisir la zone UTM
    pub location_hint: Option<(f64, f64)>,
}

impl Default for CrsResolver {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            tie_epsilon: DEFAULT_TIE_EPSILON,
            location_hint: None,
        }
    }
}

impl CrsResolver {
    pub fn new(min_confidence: f64) -> Self {
        Self {
            min_confidence,
            ..Default::default()
        }
    }

    pub fn with_location_hint(mut self, lon: f64, lat: f64) -> Self {
        self.location_hint = Some((lon, lat));
        self
    }

    /// Détermine le CRS d'un jeu de données
    ///
    /// # Errors
    ///
    /// `CrsUnresolved` si le jeu n'a pas de coordonnées ou si aucun candidat
    /// n'atteint `min_confidence`.
    pub fn resolve(&self, dataset: &Dataset) -> Result<Crs, GeolintError> {
        if let Some(crs) = &dataset.crs {
            return Ok(crs.normalized());
        }

        let Some(envelope) = dataset.envelope() else {
            return Err(GeolintError::CrsUnresolved {
                best: "none".to_string(),
                confidence: 0.0,
            });
        };

        let ranked = self.rank(&envelope);
        let Some(best) = self.pick(&ranked) else {
            return Err(GeolintError::CrsUnresolved {
                best: "none".to_string(),
                confidence: 0.0,
            });
        };

        debug!(
            dataset = %dataset.name,
            code = best.code,
            confidence = best.confidence,
            "CRS inferred from envelope"
        );

        if best.confidence < self.min_confidence {
            return Err(GeolintError::CrsUnresolved {
                best: format!("EPSG:{}", best.code),
                confidence: best.confidence,
            });
        }

        Ok(best.clone().into_crs())
    }

    /// Classe les candidats du registre par confiance décroissante
    pub fn rank(&self, envelope: &Envelope) -> Vec<CrsCandidate> {
        let mut definitions = vec![wgs84(), web_mercator()];

        let position = self
            .location_hint
            .or_else(|| is_degree_like(envelope).then(|| envelope.center()));
        if let Some((lon, lat)) = position {
            let (zone, south) = utm_zone_for(lon, lat);
            definitions.push(utm(zone, south));
        }

        let mut candidates: Vec<CrsCandidate> = definitions
            .into_iter()
            .map(|def| CrsCandidate {
                confidence: score(&def, envelope),
                code: def.code,
                name: def.name,
                kind: def.kind,
            })
            .collect();

        // Tri stable : à score égal, l'ordre du registre est conservé
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }

    /// Meilleur candidat, le géographique l'emporte en cas d'égalité
    fn pick<'a>(&self, ranked: &'a [CrsCandidate]) -> Option<&'a CrsCandidate> {
        let top = ranked.first()?;
        ranked
            .iter()
            .take_while(|c| top.confidence - c.confidence <= self.tie_epsilon)
            .find(|c| c.kind == CrsKind::Geographic)
            .or(Some(top))
    }
}

/// Score d'un candidat pour une emprise, dans [0, 1]
fn score(def: &CrsDefinition, envelope: &Envelope) -> f64 {
    let overlap = envelope.overlap_ratio(&def.domain);
    let degree_like = is_degree_like(envelope);
    let magnitude = match (def.kind, degree_like) {
        (CrsKind::Geographic, true) => 1.0,
        (CrsKind::Geographic, false) => 0.0,
        (CrsKind::Projected, false) => 1.0,
        (CrsKind::Projected, true) => 0.25,
    };

    let raw = def.prior * (0.6 * overlap + 0.4 * magnitude);
    (raw.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}
