//! Affichage console et écriture des résultats

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geolint_core::batch::{BatchJob, FileStatus};
use geolint_core::crs::Crs;
use geolint_core::validation::{Severity, ValidationReport};
use geolint_core::{BatchReport, Dataset, FormatIO};
use serde::Serialize;
use tracing::info;

use crate::formats::GeoJsonIO;

const MAX_LISTED_ISSUES: usize = 20;

/// Résultat de la commande `validate`
#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub file: String,
    pub crs: Option<Crs>,
    /// Raison de l'échec de résolution du CRS
    pub crs_error: Option<String>,
    pub health: f64,
    pub validation: ValidationReport,
}

/// Affiche le rapport de validation d'un fichier
pub fn display_validation(output: &ValidateOutput) {
    println!("\n{}", "=".repeat(60));
    println!("VALIDATION - {}", output.file);
    println!("{}", "=".repeat(60));

    match (&output.crs, &output.crs_error) {
        (Some(crs), _) if crs.inferred => println!(
            "CRS: {} (inferred, confidence {:.3})",
            crs,
            crs.confidence.unwrap_or(0.0)
        ),
        (Some(crs), _) => println!("CRS: {}", crs),
        (None, Some(error)) => println!("CRS: unresolved ({})", error),
        (None, None) => println!("CRS: unresolved"),
    }

    let report = &output.validation;
    println!("Features: {}", report.feature_count);
    println!("Health: {:.1}/100", output.health);
    println!(
        "Issues: {} errors, {} warnings",
        report.summary.errors, report.summary.warnings
    );
    print_issues(report);

    println!("\n{}", "=".repeat(60));
}

fn print_issues(report: &ValidationReport) {
    if report.issues.is_empty() {
        return;
    }

    println!("\n--- ISSUES ({}) ---", report.issues.len());
    for issue in report.issues.iter().take(MAX_LISTED_ISSUES) {
        let level = match issue.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        println!("  {} {}", level, issue);
    }
    if report.issues.len() > MAX_LISTED_ISSUES {
        println!("  ... and {} more", report.issues.len() - MAX_LISTED_ISSUES);
    }
}

/// Affiche le rapport du lot sur la console
pub fn display_batch(report: &BatchReport) {
    println!("\n{}", "=".repeat(60));
    println!("BATCH REPORT");
    println!("{}", "=".repeat(60));

    println!("\nStatus: {:?}", report.status);
    if let Some(target) = &report.target_crs {
        println!("Target CRS: {}", target);
    }

    let agg = &report.aggregate;
    println!("\n--- SUMMARY ---");
    println!(
        "Files: {} processed, {} failed (of {})",
        agg.files_processed, agg.files_failed, agg.files_total
    );
    println!("Features: {} in, {} out", agg.features_in, agg.features_out);
    if let (Some(avg), Some(min), Some(max)) = (agg.health_avg, agg.health_min, agg.health_max) {
        println!("Health: avg {:.1}, min {:.1}, max {:.1}", avg, min, max);
    }

    if !agg.crs_distribution.is_empty() {
        println!("\n--- CRS ---");
        for share in &agg.crs_distribution {
            println!("  {}: {} files ({:.0}%)", share.crs, share.count, share.share * 100.0);
        }
    }

    if !agg.issues_before.is_empty() {
        println!("\n--- ISSUES (before -> after repair) ---");
        for (kind, before) in &agg.issues_before {
            let after = agg.issues_after.get(kind).copied().unwrap_or(0);
            println!("  {}: {} -> {}", kind, before, after);
        }
    }

    if !agg.repairs.is_empty() {
        println!("\n--- REPAIRS ---");
        for (kind, count) in &agg.repairs {
            println!("  {:?}: {}", kind, count);
        }
    }

    println!("\n--- FILES ---");
    for file in &report.files {
        match (&file.status, &file.failure) {
            (FileStatus::Processed, _) => println!(
                "  OK   {} [{}] {} -> {} features, health {}",
                file.name,
                file.output_crs.as_deref().unwrap_or("?"),
                file.features_in,
                file.features_out,
                file.health_after.map_or_else(|| "n/a".to_string(), |h| format!("{:.1}", h))
            ),
            (status, failure) => println!(
                "  {:<4} {} {}",
                if *status == FileStatus::Aborted { "ABRT" } else { "FAIL" },
                file.name,
                failure.as_ref().map_or("", |f| f.message.as_str())
            ),
        }
        if let Some(reprojection) = file.reprojection.as_ref().filter(|r| !r.failures.is_empty()) {
            println!(
                "       {} features dropped during reprojection",
                reprojection.failures.len()
            );
        }
    }

    if let Some(merged) = &report.merged {
        println!("\n--- MERGED ---");
        println!(
            "{} features from {} files [{}]",
            merged.feature_count,
            merged.sources.len(),
            merged.crs.as_deref().unwrap_or("?")
        );
        if !merged.skipped.is_empty() {
            println!("Skipped (different CRS): {}", merged.skipped.join(", "));
        }
        for conflict in &merged.schema_conflicts {
            println!("  {:?} {}: {}", conflict.kind, conflict.field, conflict.detail);
        }
        print_issues(&merged.validation);
    }

    println!("\n{}", "=".repeat(60));
}

/// Sauvegarde un rapport en JSON
pub fn save_report<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(())
}

/// Écrit les jeux produits en GeoJSON
///
/// Avec fusion : le jeu fusionné puis chaque fichier écarté de la fusion.
/// Sans fusion : un fichier par entrée traitée. Un nom déjà pris reçoit un
/// suffixe `-1`, `-2`... dans l'ordre d'entrée.
pub fn write_datasets(job: &BatchJob, output: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let datasets: Vec<&Dataset> = match &job.merged {
        Some(merged) => std::iter::once(&merged.dataset)
            .chain(
                job.processed()
                    .filter(|f| merged.skipped.contains(&f.name))
                    .filter_map(|f| f.dataset.as_ref()),
            )
            .collect(),
        None => job.processed().filter_map(|f| f.dataset.as_ref()).collect(),
    };

    let mut used = BTreeSet::new();
    let mut written = Vec::with_capacity(datasets.len());
    for dataset in datasets {
        let path = output.join(format!("{}.geojson", unique_name(&dataset.name, &mut used)));
        GeoJsonIO
            .write(dataset, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), features = dataset.len(), "Dataset written");
        written.push(path);
    }

    Ok(written)
}

/// Nom libre, comparé sans tenir compte de la casse
fn unique_name(name: &str, used: &mut BTreeSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut suffix = 0;
    while used.contains(&candidate.to_lowercase()) {
        suffix += 1;
        candidate = format!("{}-{}", name, suffix);
    }
    used.insert(candidate.to_lowercase());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name() {
        let mut used = BTreeSet::new();
        assert_eq!(unique_name("roads", &mut used), "roads");
        assert_eq!(unique_name("Roads", &mut used), "Roads-1");
        assert_eq!(unique_name("roads", &mut used), "roads-2");
        assert_eq!(unique_name("rivers", &mut used), "rivers");
    }
}
