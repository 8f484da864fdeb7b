//! Réparation des géométries
//!
//! Les corrections s'appliquent dans un ordre fixe sur les features signalées
//! par le rapport de validation :
//! 1. suppression des géométries vides
//! 2. correction des géométries invalides
//! 3. éclatement des géométries multiples
//! 4. simplification (optionnelle, sur toutes les features)
//!
//! Une correction dont le résultat reste invalide est abandonnée : la
//! feature est conservée telle quelle et sera signalée à nouveau.

pub mod explode;
pub mod fallback;
pub mod fix;
pub mod ring;
pub mod simplify;
pub mod topology;

use std::collections::BTreeSet;

use geo::{CoordsIter, Geometry};
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{Dataset, Feature, GeometryKind};
use crate::validation::{is_valid, IssueKind, Locator, Validated};

pub use fix::{fix_geometry, Fixed};

/// Corrections à appliquer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RepairOptions {
    pub fix_invalid: bool,
    pub remove_empty: bool,
    pub explode_multipart: bool,
    /// Tolérance Douglas-Peucker, dans l'unité des coordonnées
    pub simplify_tolerance: Option<f64>,
}

impl RepairOptions {
    /// Toutes les corrections, sans simplification
    pub fn all() -> Self {
        Self {
            fix_invalid: true,
            remove_empty: true,
            explode_multipart: true,
            simplify_tolerance: None,
        }
    }

    pub fn with_simplify(mut self, tolerance: f64) -> Self {
        self.simplify_tolerance = Some(tolerance);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    /// Suppression d'une feature vide
    EmptyGeometry,
    /// Correction d'une géométrie invalide
    InvalidGeometry,
    /// Éclatement d'une géométrie multiple
    Multipart,
    /// Sommets retirés par simplification
    Simplified,
}

/// Une modification effective du jeu de données
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairAction {
    pub kind: RepairKind,
    /// Index de la feature dans le jeu validé
    pub locator: Locator,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    pub dataset: Dataset,
    pub actions: Vec<RepairAction>,
}

impl RepairOutcome {
    pub fn count(&self, kind: RepairKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }
}

/// Réparateur de géométries
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryRepairer;

impl GeometryRepairer {
    pub fn new() -> Self {
        Self
    }

    pub fn repair(&self, validated: &Validated, options: &RepairOptions) -> RepairOutcome {
        let dataset = validated.dataset();
        let report = validated.report();

        // (index d'origine, feature)
        let mut features: Vec<(usize, Feature)> = dataset.features.iter().cloned().enumerate().collect();
        let mut actions = Vec::new();

        if options.remove_empty {
            let empty = report.flagged_features(IssueKind::EmptyGeometry);
            features.retain(|(index, feature)| {
                if !empty.contains(index) {
                    return true;
                }
                actions.push(RepairAction {
                    kind: RepairKind::EmptyGeometry,
                    locator: Locator::Feature(*index),
                    before: describe(feature.geometry.as_ref()),
                    after: "removed".to_string(),
                });
                false
            });
        }

        // Features encore invalides après l'étape de correction
        let mut still_invalid = BTreeSet::new();

        if options.fix_invalid {
            let invalid = report.flagged_features(IssueKind::InvalidGeometry);
            for (index, feature) in features.iter_mut().filter(|(i, _)| invalid.contains(i)) {
                let Some(geometry) = &feature.geometry else {
                    continue;
                };
                match try_fix(geometry) {
                    Some((fixed, after)) => {
                        actions.push(RepairAction {
                            kind: RepairKind::InvalidGeometry,
                            locator: Locator::Feature(*index),
                            before: describe_invalid(geometry, report_detail(validated, *index)),
                            after,
                        });
                        feature.geometry = Some(fixed);
                    }
                    None => {
                        warn!(
                            dataset = %dataset.name,
                            feature = *index,
                            "Geometry could not be repaired, left as-is"
                        );
                        still_invalid.insert(*index);
                    }
                }
            }
        }

        if options.explode_multipart {
            let mut exploded = Vec::with_capacity(features.len());
            for (index, feature) in features {
                let Some(parts) = explode::explode(&feature) else {
                    exploded.push((index, feature));
                    continue;
                };

                actions.push(RepairAction {
                    kind: RepairKind::Multipart,
                    locator: Locator::Feature(index),
                    before: describe(feature.geometry.as_ref()),
                    after: format!("{} features", parts.len()),
                });

                for mut part in parts {
                    // Une composante isolée peut être corrigée seule
                    if still_invalid.contains(&index) {
                        if let Some(geometry) = part.geometry.as_ref().filter(|g| !is_valid(g)) {
                            if let Some((fixed, after)) = try_fix(geometry) {
                                actions.push(RepairAction {
                                    kind: RepairKind::InvalidGeometry,
                                    locator: Locator::Feature(index),
                                    before: describe(Some(geometry)),
                                    after,
                                });
                                part.geometry = Some(fixed);
                            }
                        }
                    }
                    exploded.push((index, part));
                }
            }
            features = exploded;
        }

        if let Some(tolerance) = options.simplify_tolerance {
            for (index, feature) in features.iter_mut() {
                let Some(simplified) = feature
                    .geometry
                    .as_ref()
                    .and_then(|g| simplify::simplify_geometry(g, tolerance))
                else {
                    continue;
                };
                actions.push(RepairAction {
                    kind: RepairKind::Simplified,
                    locator: Locator::Feature(*index),
                    before: describe(feature.geometry.as_ref()),
                    after: describe(Some(&simplified.geometry)),
                });
                feature.geometry = Some(simplified.geometry);
            }
        }

        debug!(
            dataset = %dataset.name,
            actions = actions.len(),
            features = features.len(),
            "Repair done"
        );

        let mut repaired = dataset.with_features(features.into_iter().map(|(_, f)| f).collect());
        if options.explode_multipart {
            repaired.geometry_hint = repaired.geometry_hint.map(GeometryKind::single);
        }

        RepairOutcome {
            dataset: repaired,
            actions,
        }
    }
}

/// Corrige et vérifie, `None` si le résultat n'est pas valide ou identique
fn try_fix(geometry: &Geometry) -> Option<(Geometry, String)> {
    let fixed = fix_geometry(geometry)?;
    if !is_valid(&fixed.geometry) || &fixed.geometry == geometry {
        return None;
    }

    let mut after = describe(Some(&fixed.geometry));
    if fixed.used_hull {
        after.push_str(" [convex hull]");
    }
    Some((fixed.geometry, after))
}

fn report_detail(validated: &Validated, index: usize) -> Option<&str> {
    validated
        .report()
        .issues_of(IssueKind::InvalidGeometry)
        .find(|i| i.locator == Locator::Feature(index))
        .map(|i| i.detail.as_str())
}

fn describe(geometry: Option<&Geometry>) -> String {
    match geometry {
        None => "null geometry".to_string(),
        Some(g) => {
            let kind = GeometryKind::of(g).map_or("geometry", GeometryKind::name);
            format!("{} ({} vertices)", kind, g.coords_count())
        }
    }
}

fn describe_invalid(geometry: &Geometry, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("{}: {}", describe(Some(geometry)), detail),
        None => describe(Some(geometry)),
    }
}
