//! Rapport de traitement par lots
//!
//! [`ReportBuilder`] transforme un [`BatchJob`] en [`BatchReport`]
//! sérialisable : détail par fichier, agrégats et résumé de la fusion.
//! L'affichage et l'écriture sur disque sont laissés à l'application.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::batch::{
    crs_distribution, BatchJob, BatchStrategy, CrsShare, FileResult, FileStatus, ReprojectionSummary, SchemaConflict,
};
use crate::fingerprint::Fingerprint;
use crate::repair::{RepairAction, RepairKind};
use crate::types::GeometryKind;
use crate::validation::{IssueKind, ValidationReport};

/// Pénalités du score de santé
const MISSING_CRS_PENALTY: f64 = 20.0;
const INVALID_PENALTY: f64 = 30.0;
const EMPTY_PENALTY: f64 = 20.0;
const MIXED_PENALTY: f64 = 10.0;

/// Statut global du lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    /// Tous les fichiers ont été traités
    Success,
    /// Au moins un fichier traité et au moins un en échec
    PartialSuccess,
    /// Aucun fichier traité
    Failed,
}

/// Cause d'échec d'un fichier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub code: &'static str,
    pub message: String,
}

/// Rapport d'un fichier
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub name: String,
    pub status: FileStatus,
    pub failure: Option<FailureReport>,
    pub crs: Option<String>,
    pub crs_inferred: bool,
    pub output_crs: Option<String>,
    /// Type de géométrie déclaré du jeu livré
    pub geometry_type: Option<GeometryKind>,
    pub validation: Option<ValidationReport>,
    pub repairs: Vec<RepairAction>,
    pub post_validation: Option<ValidationReport>,
    pub reprojection: Option<ReprojectionSummary>,
    pub fingerprint_before: Option<Fingerprint>,
    pub fingerprint_after: Option<Fingerprint>,
    pub features_in: usize,
    pub features_out: usize,
    /// Score de santé du fichier tel que livré
    pub health_before: Option<f64>,
    /// Score de santé après réparation
    pub health_after: Option<f64>,
}

/// Agrégats sur l'ensemble du lot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub files_total: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub issues_before: BTreeMap<IssueKind, usize>,
    pub issues_after: BTreeMap<IssueKind, usize>,
    pub repairs: BTreeMap<RepairKind, usize>,
    pub features_in: usize,
    pub features_out: usize,
    pub health_avg: Option<f64>,
    pub health_min: Option<f64>,
    pub health_max: Option<f64>,
    /// CRS sources des fichiers traités
    pub crs_distribution: Vec<CrsShare>,
}

impl AggregateStats {
    pub fn total_repairs(&self) -> usize {
        self.repairs.values().sum()
    }
}

/// Résumé du jeu fusionné
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub crs: Option<String>,
    pub sources: Vec<String>,
    pub skipped: Vec<String>,
    pub feature_count: usize,
    pub schema_conflicts: Vec<SchemaConflict>,
    pub validation: ValidationReport,
}

/// Rapport complet du lot
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub strategy: BatchStrategy,
    pub target_crs: Option<String>,
    pub files: Vec<FileReport>,
    pub aggregate: AggregateStats,
    pub merged: Option<MergeSummary>,
}

impl BatchReport {
    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let health = self
            .aggregate
            .health_avg
            .map_or_else(|| "n/a".to_string(), |h| format!("{:.1}", h));

        format!(
            "{:?}: {}/{} files processed, {} failed, {} -> {} features, {} repairs, avg health {}",
            self.status,
            self.aggregate.files_processed,
            self.aggregate.files_total,
            self.aggregate.files_failed,
            self.aggregate.features_in,
            self.aggregate.features_out,
            self.aggregate.total_repairs(),
            health
        )
    }
}

/// Score de santé dans [0, 100]
///
/// 100, moins 20 sans CRS, moins jusqu'à 30 selon la proportion de
/// géométries invalides, moins jusqu'à 20 selon la proportion de géométries
/// vides, moins 10 en cas de types mixtes.
pub fn health_score(report: &ValidationReport) -> f64 {
    if report.integrity_failed() {
        return 0.0;
    }

    let ratio = |n: usize| {
        if report.feature_count == 0 {
            0.0
        } else {
            n as f64 / report.feature_count as f64
        }
    };

    let mut score = 100.0;
    if report.has(IssueKind::MissingCrs) {
        score -= MISSING_CRS_PENALTY;
    }
    score -= INVALID_PENALTY * ratio(report.count(IssueKind::InvalidGeometry));
    score -= EMPTY_PENALTY * ratio(report.count(IssueKind::EmptyGeometry));
    if report.has(IssueKind::MixedGeometryTypes) {
        score -= MIXED_PENALTY;
    }

    score.clamp(0.0, 100.0)
}

/// Constructeur de rapport, sans effet de bord
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBuilder;

impl ReportBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, job: &BatchJob) -> BatchReport {
        let files: Vec<FileReport> = job.files.iter().map(file_report).collect();
        let aggregate = aggregate(&job.files, &files);

        let status = match (aggregate.files_processed, aggregate.files_failed) {
            (0, _) => BatchStatus::Failed,
            (_, 0) => BatchStatus::Success,
            _ => BatchStatus::PartialSuccess,
        };

        let merged = job.merged.as_ref().map(|m| MergeSummary {
            crs: m.dataset.crs.as_ref().map(|c| c.identifier.clone()),
            sources: m.sources.clone(),
            skipped: m.skipped.clone(),
            feature_count: m.dataset.len(),
            schema_conflicts: m.schema_conflicts.clone(),
            validation: m.validation.clone(),
        });

        BatchReport {
            status,
            strategy: job.strategy.clone(),
            target_crs: job.target_crs.as_ref().map(|c| c.identifier.clone()),
            files,
            aggregate,
            merged,
        }
    }
}

fn file_report(file: &FileResult) -> FileReport {
    let processed = file.is_processed();

    FileReport {
        name: file.name.clone(),
        status: file.status,
        failure: file.failure.as_ref().map(|e| FailureReport {
            code: e.code(),
            message: e.to_string(),
        }),
        crs: file.crs.as_ref().map(|c| c.identifier.clone()),
        crs_inferred: file.crs.as_ref().is_some_and(|c| c.inferred),
        output_crs: file.output_crs().map(|c| c.identifier.clone()),
        geometry_type: file.dataset.as_ref().and_then(|d| d.geometry_hint),
        validation: file.validation.clone(),
        repairs: file.repairs.clone(),
        post_validation: file.post_validation.clone(),
        reprojection: file.reprojection.clone(),
        fingerprint_before: file.fingerprint_before,
        fingerprint_after: file.fingerprint_after,
        features_in: file.features_in,
        features_out: file.features_out(),
        health_before: file.validation.as_ref().filter(|_| processed).map(health_score),
        health_after: file.post_validation.as_ref().filter(|_| processed).map(health_score),
    }
}

fn aggregate(results: &[FileResult], reports: &[FileReport]) -> AggregateStats {
    let mut stats = AggregateStats {
        files_total: results.len(),
        crs_distribution: crs_distribution(results),
        ..Default::default()
    };

    for (file, report) in results.iter().zip(reports) {
        if file.is_processed() {
            stats.files_processed += 1;
        } else {
            stats.files_failed += 1;
        }

        if let Some(validation) = &file.validation {
            merge_counts(&mut stats.issues_before, validation);
        }
        if let Some(validation) = &file.post_validation {
            merge_counts(&mut stats.issues_after, validation);
        }
        for action in &file.repairs {
            *stats.repairs.entry(action.kind).or_insert(0) += 1;
        }

        stats.features_in += file.features_in;
        stats.features_out += report.features_out;
    }

    let scores: Vec<f64> = reports.iter().filter_map(|r| r.health_after).collect();
    if !scores.is_empty() {
        stats.health_avg = Some(scores.iter().sum::<f64>() / scores.len() as f64);
        stats.health_min = scores.iter().copied().reduce(f64::min);
        stats.health_max = scores.iter().copied().reduce(f64::max);
    }

    stats
}

fn merge_counts(into: &mut BTreeMap<IssueKind, usize>, report: &ValidationReport) {
    for (kind, count) in &report.summary.by_kind {
        *into.entry(*kind).or_insert(0) += count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchCoordinator, BatchInput};
    use crate::crs::Crs;
    use crate::types::{Dataset, Feature};
    use crate::validation::ValidationEngine;
    use crate::GeolintError;
    use geo::{point, polygon};

    fn shapes() -> Dataset {
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
        ];
        Dataset::new(
            "shapes",
            vec![
                Feature::new(bowtie),
                Feature::null(),
                Feature::new(polygon![(x: 2.0, y: 2.0), (x: 3.0, y: 2.0), (x: 3.0, y: 3.0)]),
                Feature::new(point!(x: 2.5, y: 2.5)),
            ],
        )
    }

    #[test]
    fn test_health_score_penalties() {
        let report = ValidationEngine.report(&shapes());
        // 100 - 20 (CRS) - 30/4 (invalide) - 20/4 (vide) - 10 (types mixtes)
        assert!((health_score(&report) - 57.5).abs() < 1e-9);

        let clean = ValidationEngine.report(&Dataset::new("ok", vec![]).with_crs(Crs::epsg(4326)));
        assert_eq!(health_score(&clean), 100.0);
    }

    #[test]
    fn test_build_partial_success() {
        let strategy = BatchStrategy {
            fix_geometries: true,
            ..Default::default()
        };
        let job = BatchCoordinator::new(strategy).run(vec![
            BatchInput::new("shapes", Ok(shapes().with_crs(Crs::epsg(4326)))),
            BatchInput::new("broken", Err(GeolintError::integrity("broken", "truncated archive"))),
        ]);

        let report = ReportBuilder.build(&job);
        assert_eq!(report.status, BatchStatus::PartialSuccess);
        assert_eq!(report.aggregate.files_processed, 1);
        assert_eq!(report.aggregate.files_failed, 1);
        assert_eq!(report.aggregate.features_in, 4);
        assert_eq!(report.aggregate.features_out, 3);
        assert_eq!(report.aggregate.repairs.get(&RepairKind::EmptyGeometry), Some(&1));
        assert_eq!(report.aggregate.repairs.get(&RepairKind::InvalidGeometry), Some(&1));
        assert_eq!(report.aggregate.issues_before.get(&IssueKind::FormatIntegrity), Some(&1));
        assert_eq!(report.aggregate.issues_after.get(&IssueKind::InvalidGeometry), None);

        let broken = &report.files[1];
        assert_eq!(broken.failure.as_ref().unwrap().code, "file_integrity");
        assert!(broken.health_after.is_none());

        let shapes = &report.files[0];
        assert!(shapes.health_after.unwrap() > shapes.health_before.unwrap());
        assert_eq!(report.aggregate.health_min, shapes.health_after);

        let shares: Vec<(&str, usize)> = report
            .aggregate
            .crs_distribution
            .iter()
            .map(|s| (s.crs.as_str(), s.count))
            .collect();
        assert_eq!(shares, vec![("EPSG:4326", 1)]);
        assert_eq!(report.aggregate.crs_distribution[0].share, 1.0);
    }

    #[test]
    fn test_build_statuses() {
        let job = BatchCoordinator::new(BatchStrategy::default()).run(vec![BatchInput::new(
            "broken",
            Err(GeolintError::integrity("broken", "empty archive")),
        )]);
        let report = ReportBuilder.build(&job);
        assert_eq!(report.status, BatchStatus::Failed);
        assert!(report.aggregate.health_avg.is_none());

        let job = BatchCoordinator::new(BatchStrategy::default()).run(vec![BatchInput::new(
            "ok",
            Ok(Dataset::new("ok", vec![Feature::new(point!(x: 2.0, y: 48.0))]).with_crs(Crs::epsg(4326))),
        )]);
        let report = ReportBuilder.build(&job);
        assert_eq!(report.status, BatchStatus::Success);
        assert_eq!(report.aggregate.health_avg, Some(100.0));
    }

    #[test]
    fn test_summary() {
        let job = BatchCoordinator::new(BatchStrategy::default()).run(vec![BatchInput::new(
            "ok",
            Ok(Dataset::new("ok", vec![Feature::new(point!(x: 2.0, y: 48.0))]).with_crs(Crs::epsg(4326))),
        )]);
        let summary = ReportBuilder.build(&job).summary();
        assert!(summary.starts_with("Success"));
        assert!(summary.contains("1/1 files processed"));
        assert!(summary.contains("avg health 100.0"));
    }

    #[test]
    fn test_report_serializes() {
        let job = BatchCoordinator::new(BatchStrategy::default()).run(vec![BatchInput::new(
            "shapes",
            Ok(shapes()),
        )]);
        let json = serde_json::to_value(ReportBuilder.build(&job)).unwrap();
        assert_eq!(json["files"][0]["name"], "shapes");
        assert_eq!(json["files"][0]["crs_inferred"], true);
        assert!(json["aggregate"]["issues_before"]["invalid_geometry"].is_number());
        assert_eq!(json["aggregate"]["crs_distribution"][0]["count"], 1);
    }

    #[test]
    fn test_geometry_type_reported() {
        let mut dataset = Dataset::new("pts", vec![Feature::new(point!(x: 2.0, y: 48.0))]).with_crs(Crs::epsg(4326));
        dataset.geometry_hint = Some(GeometryKind::Point);
        let job = BatchCoordinator::new(BatchStrategy::default()).run(vec![BatchInput::new("pts", Ok(dataset))]);
        let report = ReportBuilder.build(&job);
        assert_eq!(report.files[0].geometry_type, Some(GeometryKind::Point));
    }
}
