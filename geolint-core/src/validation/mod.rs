//! Validation des jeux de données
//!
//! La validation est une fonction pure : elle ne modifie jamais le jeu de
//! données et produit un [`ValidationReport`]. Le résultat est encapsulé dans
//! un [`Validated`], seul point d'entrée accepté par la réparation et la
//! reprojection.
//!
//! Ordre des problèmes : niveau fichier, puis par feature (index croissant),
//! puis niveau jeu de données.

pub(crate) mod crossings;
pub mod report;
pub mod validity;

use std::collections::BTreeMap;

use geo::CoordsIter;
use tracing::debug;

use crate::types::{BaseKind, Dataset, GeometryKind};

pub use report::{GeometryStats, Issue, IssueKind, IssueSummary, Locator, Severity, ValidationReport};
pub use validity::{is_valid, validity_error};

/// Un jeu de données accompagné de son rapport de validation
///
/// Ne peut être construit que par [`ValidationEngine::validate`].
#[derive(Debug, Clone)]
pub struct Validated {
    dataset: Dataset,
    report: ValidationReport,
}

impl Validated {
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }
}

/// Moteur de validation
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Valide un jeu de données et conserve un instantané pour les étapes suivantes
    pub fn validate(&self, dataset: &Dataset) -> Validated {
        Validated {
            dataset: dataset.clone(),
            report: self.report(dataset),
        }
    }

    /// Produit uniquement le rapport
    pub fn report(&self, dataset: &Dataset) -> ValidationReport {
        let feature_count = dataset.features.len();

        if let Err(reason) = check_integrity(dataset) {
            debug!(dataset = %dataset.name, reason = %reason, "Integrity check failed");
            return ValidationReport::integrity_failure(feature_count, reason);
        }

        let mut issues = Vec::new();
        let mut stats = GeometryStats::default();

        if dataset.crs.is_none() {
            issues.push(Issue::new(
                IssueKind::MissingCrs,
                Severity::Warning,
                Locator::File,
                "dataset declares no coordinate reference system",
            ));
        }

        let mut base_counts: BTreeMap<BaseKind, usize> = BTreeMap::new();

        for (index, feature) in dataset.features.iter().enumerate() {
            let geometry = match &feature.geometry {
                Some(g) if g.coords_count() > 0 => g,
                Some(g) => {
                    let kind = GeometryKind::of(g).map_or("geometry", GeometryKind::name);
                    stats.empty_count += 1;
                    issues.push(Issue::new(
                        IssueKind::EmptyGeometry,
                        Severity::Warning,
                        Locator::Feature(index),
                        format!("empty {}", kind),
                    ));
                    continue;
                }
                None => {
                    stats.empty_count += 1;
                    issues.push(Issue::new(
                        IssueKind::EmptyGeometry,
                        Severity::Warning,
                        Locator::Feature(index),
                        "null geometry",
                    ));
                    continue;
                }
            };

            // Les types non reconnus sont écartés par le contrôle d'intégrité
            if let Some(kind) = GeometryKind::of(geometry) {
                *stats.by_kind.entry(kind).or_insert(0) += 1;
                *base_counts.entry(kind.base()).or_insert(0) += 1;
                if kind.is_multi() {
                    stats.multipart_count += 1;
                }
            }

            if let Some(diagnostic) = validity_error(geometry) {
                stats.invalid_count += 1;
                issues.push(Issue::new(
                    IssueKind::InvalidGeometry,
                    Severity::Error,
                    Locator::Feature(index),
                    diagnostic,
                ));
            }
        }

        if base_counts.len() > 1 {
            let observed = base_counts
                .iter()
                .map(|(kind, count)| format!("{}: {}", kind, count))
                .collect::<Vec<_>>()
                .join(", ");
            issues.push(Issue::new(
                IssueKind::MixedGeometryTypes,
                Severity::Warning,
                Locator::Dataset,
                format!("mixed geometry types ({})", observed),
            ));
        }

        let report = ValidationReport::new(feature_count, issues, stats);
        debug!(
            dataset = %dataset.name,
            features = feature_count,
            errors = report.summary.errors,
            warnings = report.summary.warnings,
            "Dataset validated"
        );
        report
    }
}

/// Contrôle de cohérence préalable à toute autre vérification
fn check_integrity(dataset: &Dataset) -> Result<(), String> {
    for (index, feature) in dataset.features.iter().enumerate() {
        if feature.attributes.keys().any(|k| k.is_empty()) {
            return Err(format!("feature #{} has an empty attribute name", index));
        }

        let Some(geometry) = &feature.geometry else {
            continue;
        };

        if GeometryKind::of(geometry).is_none() {
            return Err(format!("feature #{} has an unsupported geometry type", index));
        }

        if let Some(c) = geometry
            .coords_iter()
            .find(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(format!(
                "feature #{} has a non-finite coordinate ({}, {})",
                index, c.x, c.y
            ));
        }
    }

    Ok(())
}
