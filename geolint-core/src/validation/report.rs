//! Problèmes détectés et rapport de validation

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::types::GeometryKind;

/// Catégorie de problème
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingCrs,
    InvalidGeometry,
    EmptyGeometry,
    MixedGeometryTypes,
    FormatIntegrity,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCrs => "missing_crs",
            Self::InvalidGeometry => "invalid_geometry",
            Self::EmptyGeometry => "empty_geometry",
            Self::MixedGeometryTypes => "mixed_geometry_types",
            Self::FormatIntegrity => "format_integrity",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Portée d'un problème
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "index", rename_all = "snake_case")]
pub enum Locator {
    File,
    /// Index de la feature dans le jeu de données validé
    Feature(usize),
    Dataset,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Feature(i) => write!(f, "feature #{}", i),
            Self::Dataset => f.write_str("dataset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub locator: Locator,
    pub detail: String,
}

impl Issue {
    pub fn new(kind: IssueKind, severity: Severity, locator: Locator, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            locator,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.locator, self.detail)
    }
}

/// Comptages par catégorie et par sévérité
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueSummary {
    pub by_kind: BTreeMap<IssueKind, usize>,
    pub errors: usize,
    pub warnings: usize,
}

/// Statistiques géométriques du jeu validé
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeometryStats {
    /// Nombre de features non vides par type
    pub by_kind: BTreeMap<GeometryKind, usize>,
    pub multipart_count: usize,
    pub empty_count: usize,
    pub invalid_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub feature_count: usize,
    pub issues: Vec<Issue>,
    pub summary: IssueSummary,
    pub stats: GeometryStats,
}

impl ValidationReport {
    pub(crate) fn new(feature_count: usize, issues: Vec<Issue>, stats: GeometryStats) -> Self {
        let mut summary = IssueSummary::default();
        for issue in &issues {
            *summary.by_kind.entry(issue.kind).or_insert(0) += 1;
            match issue.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
            }
        }

        Self {
            feature_count,
            issues,
            summary,
            stats,
        }
    }

    /// Rapport d'un fichier incohérent : un unique problème d'intégrité
    pub(crate) fn integrity_failure(feature_count: usize, reason: impl Into<String>) -> Self {
        Self::new(
            feature_count,
            vec![Issue::new(
                IssueKind::FormatIntegrity,
                Severity::Error,
                Locator::File,
                reason,
            )],
            GeometryStats::default(),
        )
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.summary.by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn has(&self, kind: IssueKind) -> bool {
        self.count(kind) > 0
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Aucun problème, quelle que soit sa sévérité
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    /// Index des features signalées pour une catégorie
    pub fn flagged_features(&self, kind: IssueKind) -> BTreeSet<usize> {
        self.issues_of(kind)
            .filter_map(|i| match i.locator {
                Locator::Feature(index) => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn integrity_failed(&self) -> bool {
        self.has(IssueKind::FormatIntegrity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let report = ValidationReport::new(
            3,
            vec![
                Issue::new(IssueKind::MissingCrs, Severity::Warning, Locator::File, "no CRS"),
                Issue::new(IssueKind::EmptyGeometry, Severity::Warning, Locator::Feature(0), "empty"),
                Issue::new(IssueKind::InvalidGeometry, Severity::Error, Locator::Feature(2), "bowtie"),
            ],
            GeometryStats::default(),
        );

        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 2);
        assert_eq!(report.count(IssueKind::InvalidGeometry), 1);
        assert_eq!(report.count(IssueKind::MixedGeometryTypes), 0);
        assert!(report.has_errors());
        assert_eq!(
            report.flagged_features(IssueKind::InvalidGeometry),
            BTreeSet::from([2])
        );
    }

    #[test]
    fn test_locator_json() {
        let json = serde_json::to_value(Locator::Feature(4)).unwrap();
        assert_eq!(json, serde_json::json!({"scope": "feature", "index": 4}));
        let json = serde_json::to_value(Locator::File).unwrap();
        assert_eq!(json, serde_json::json!({"scope": "file"}));
    }
}
