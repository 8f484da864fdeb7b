//! Traitement par lots et fusion
//!
//! Chaque fichier suit la chaîne validation → CRS → réparation →
//! validation post-réparation, en parallèle avec rayon. La reprojection vers
//! le CRS cible se fait dans une seconde passe parallèle, une fois le CRS
//! unifié connu. La fusion est le seul point de sérialisation.
//!
//! Un échec reste confiné au [`FileResult`] du fichier concerné.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crs::{Crs, CrsResolver};
use crate::fingerprint::{dataset_fingerprint, Fingerprint};
use crate::repair::{GeometryRepairer, RepairAction, RepairOptions};
use crate::reproject::{ReprojectionEngine, ReprojectionFailure};
use crate::types::{AttributeValue, Dataset, Envelope, Feature};
use crate::validation::{IssueKind, ValidationEngine, ValidationReport, Validated};
use crate::GeolintError;

/// Champs ajoutés par le suivi de provenance
pub const SOURCE_DATASET_FIELD: &str = "source_dataset";
pub const SOURCE_INDEX_FIELD: &str = "source_index";

/// Choix du CRS commun quand aucun CRS cible n'est imposé
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifyStrategy {
    /// CRS du premier fichier traité
    #[default]
    FirstFile,
    /// CRS le plus fréquent parmi les fichiers traités
    MostCommon,
    /// CRS porté par plus de la moitié des fichiers, sinon WGS 84
    AutoDetect,
}

/// Options du traitement par lots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStrategy {
    /// Reprojeter tous les fichiers vers un CRS commun
    pub unify_crs: bool,
    pub unify_strategy: UnifyStrategy,
    /// CRS cible explicite, prioritaire sur `unify_strategy`
    pub target_crs: Option<Crs>,
    /// Corriger les géométries invalides et supprimer les vides
    pub fix_geometries: bool,
    pub explode_multipart: bool,
    /// Tolérance de simplification Douglas-Peucker
    pub simplify_tolerance: Option<f64>,
    pub merge: bool,
    /// Un CRS inféré suffit pour poursuivre le traitement
    pub accept_inferred_crs: bool,
    /// Ajouter `source_dataset` / `source_index` aux features fusionnées
    pub track_source: bool,
}

impl Default for BatchStrategy {
    fn default() -> Self {
        Self {
            unify_crs: false,
            unify_strategy: UnifyStrategy::FirstFile,
            target_crs: None,
            fix_geometries: false,
            explode_multipart: false,
            simplify_tolerance: None,
            merge: false,
            accept_inferred_crs: true,
            track_source: false,
        }
    }
}

impl BatchStrategy {
    pub fn repair_options(&self) -> RepairOptions {
        RepairOptions {
            fix_invalid: self.fix_geometries,
            remove_empty: self.fix_geometries,
            explode_multipart: self.explode_multipart,
            simplify_tolerance: self.simplify_tolerance,
        }
    }
}

/// Part d'un CRS parmi les fichiers traités
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsShare {
    pub crs: String,
    pub count: usize,
    /// Entre 0 et 1
    pub share: f64,
}

/// Répartition des CRS sources des fichiers traités, du plus fréquent au moins fréquent
///
/// À effectif égal, l'ordre d'entrée est conservé.
pub fn crs_distribution<'a>(files: impl IntoIterator<Item = &'a FileResult>) -> Vec<CrsShare> {
    let counts = crs_counts(files);
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    counts
        .into_iter()
        .map(|(crs, count)| CrsShare {
            crs: crs.identifier,
            count,
            share: count as f64 / total as f64,
        })
        .collect()
}

fn crs_counts<'a>(files: impl IntoIterator<Item = &'a FileResult>) -> Vec<(Crs, usize)> {
    let mut counts: Vec<(Crs, usize)> = Vec::new();
    for crs in files
        .into_iter()
        .filter(|f| f.is_processed())
        .filter_map(|f| f.crs.as_ref())
    {
        let crs = crs.normalized();
        match counts.iter_mut().find(|(c, _)| c.same_as(&crs)) {
            Some((_, n)) => *n += 1,
            None => counts.push((crs, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Un fichier à traiter, tel que chargé par un `FormatIO`
#[derive(Debug)]
pub struct BatchInput {
    pub name: String,
    pub dataset: Result<Dataset, GeolintError>,
    /// CRS fourni par l'utilisateur, prioritaire sur celui du fichier
    pub crs_override: Option<Crs>,
}

impl BatchInput {
    pub fn new(name: impl Into<String>, dataset: Result<Dataset, GeolintError>) -> Self {
        Self {
            name: name.into(),
            dataset,
            crs_override: None,
        }
    }

    pub fn with_crs_override(mut self, crs: Crs) -> Self {
        self.crs_override = Some(crs);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Processed,
    Failed,
    /// Interrompu avant traitement
    Aborted,
}

/// Résumé de la reprojection d'un fichier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReprojectionSummary {
    pub source_crs: String,
    pub target_crs: String,
    pub method: String,
    pub failures: Vec<ReprojectionFailure>,
    pub envelope_before: Option<Envelope>,
    pub envelope_after: Option<Envelope>,
}

/// Résultat du traitement d'un fichier
#[derive(Debug)]
pub struct FileResult {
    pub name: String,
    pub status: FileStatus,
    pub failure: Option<GeolintError>,
    /// CRS résolu (avant reprojection)
    pub crs: Option<Crs>,
    pub validation: Option<ValidationReport>,
    pub repairs: Vec<RepairAction>,
    pub post_validation: Option<ValidationReport>,
    pub reprojection: Option<ReprojectionSummary>,
    pub fingerprint_before: Option<Fingerprint>,
    pub fingerprint_after: Option<Fingerprint>,
    pub features_in: usize,
    /// Jeu de données final, uniquement pour un fichier traité
    pub dataset: Option<Dataset>,
}

impl FileResult {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: FileStatus::Failed,
            failure: None,
            crs: None,
            validation: None,
            repairs: Vec::new(),
            post_validation: None,
            reprojection: None,
            fingerprint_before: None,
            fingerprint_after: None,
            features_in: 0,
            dataset: None,
        }
    }

    fn fail(mut self, error: GeolintError) -> Self {
        warn!(file = %self.name, error = %error, "File failed");
        self.status = if matches!(error, GeolintError::Aborted) {
            FileStatus::Aborted
        } else {
            FileStatus::Failed
        };
        self.failure = Some(error);
        self.dataset = None;
        self
    }

    pub fn is_processed(&self) -> bool {
        self.status == FileStatus::Processed
    }

    pub fn features_out(&self) -> usize {
        self.dataset.as_ref().map_or(0, Dataset::len)
    }

    /// CRS du jeu de données final
    pub fn output_crs(&self) -> Option<&Crs> {
        self.dataset.as_ref().and_then(|d| d.crs.as_ref())
    }
}

/// Catégorie de conflit de schéma
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaConflictKind {
    /// Champ absent de certains fichiers, complété par `Null`
    MissingField,
    /// Valeurs de types différents selon les fichiers ou les features
    TypeMismatch,
}

/// Différence de schéma constatée lors de la fusion (informatif)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaConflict {
    pub field: String,
    pub kind: SchemaConflictKind,
    pub detail: String,
}

/// Résultat de la fusion
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub dataset: Dataset,
    pub validation: ValidationReport,
    /// Fichiers inclus, dans l'ordre d'entrée
    pub sources: Vec<String>,
    /// Fichiers traités mais écartés (CRS différent)
    pub skipped: Vec<String>,
    pub schema_conflicts: Vec<SchemaConflict>,
}

#[derive(Debug)]
pub struct BatchJob {
    pub files: Vec<FileResult>,
    pub target_crs: Option<Crs>,
    pub merged: Option<MergeResult>,
    pub strategy: BatchStrategy,
}

impl BatchJob {
    pub fn processed(&self) -> impl Iterator<Item = &FileResult> {
        self.files.iter().filter(|f| f.is_processed())
    }

    pub fn all_failed(&self) -> bool {
        !self.files.is_empty() && self.processed().next().is_none()
    }
}

/// Coordinateur du traitement par lots
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    strategy: BatchStrategy,
    validator: ValidationEngine,
    resolver: CrsResolver,
    repairer: GeometryRepairer,
    reprojector: ReprojectionEngine,
    abort: Arc<AtomicBool>,
}

impl BatchCoordinator {
    pub fn new(strategy: BatchStrategy) -> Self {
        Self {
            strategy,
            validator: ValidationEngine,
            resolver: CrsResolver::default(),
            repairer: GeometryRepairer,
            reprojector: ReprojectionEngine::default(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_resolver(mut self, resolver: CrsResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_reprojector(mut self, reprojector: ReprojectionEngine) -> Self {
        self.reprojector = reprojector;
        self
    }

    pub fn strategy(&self) -> &BatchStrategy {
        &self.strategy
    }

    /// Drapeau d'interruption partagé, vérifié avant chaque fichier
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Traite tous les fichiers et fusionne si demandé
    pub fn run(&self, inputs: Vec<BatchInput>) -> BatchJob {
        let total = inputs.len();
        info!(files = total, "Starting batch");

        let done = AtomicUsize::new(0);
        let staged: Vec<(FileResult, Option<Validated>)> = inputs
            .par_iter()
            .map(|input| {
                let result = self.process_file(input);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                info!(processed = n, total, file = %input.name, "Batch progress");
                result
            })
            .collect();

        let target_crs = self.strategy.target_crs.as_ref().map(Crs::normalized).or_else(|| {
            self.strategy
                .unify_crs
                .then(|| self.unified_crs(staged.iter().map(|(f, _)| f)))
                .flatten()
        });

        let files: Vec<FileResult> = staged
            .into_par_iter()
            .map(|(file, validated)| match (&target_crs, validated) {
                (Some(target), Some(validated)) => self.reproject_file(file, &validated, target),
                _ => file,
            })
            .collect();

        let merged = self.strategy.merge.then(|| self.merge(&files, target_crs.as_ref())).flatten();

        let processed = files.iter().filter(|f| f.is_processed()).count();
        info!(
            processed,
            failed = total - processed,
            merged = merged.as_ref().map(|m| m.dataset.len()),
            "Batch complete"
        );

        BatchJob {
            files,
            target_crs,
            merged,
            strategy: self.strategy.clone(),
        }
    }

    /// CRS commun choisi parmi les CRS sources des fichiers traités
    fn unified_crs<'a>(&self, files: impl Iterator<Item = &'a FileResult>) -> Option<Crs> {
        let strategy = self.strategy.unify_strategy;
        let crs = match strategy {
            UnifyStrategy::FirstFile => files
                .filter(|f| f.is_processed())
                .find_map(|f| f.crs.as_ref())
                .map(Crs::normalized),
            UnifyStrategy::MostCommon => crs_counts(files).into_iter().next().map(|(crs, _)| crs),
            UnifyStrategy::AutoDetect => {
                let counts = crs_counts(files);
                let total: usize = counts.iter().map(|(_, n)| n).sum();
                match counts.into_iter().next() {
                    Some((crs, count)) if 2 * count > total => Some(crs),
                    Some(_) => Some(Crs::epsg(4326)),
                    None => None,
                }
            }
        };

        if let Some(crs) = &crs {
            info!(crs = %crs.identifier, strategy = ?strategy, "Unified CRS selected");
        }
        crs
    }

    /// Première passe : validation, CRS, réparation, validation post-réparation
    fn process_file(&self, input: &BatchInput) -> (FileResult, Option<Validated>) {
        let mut result = FileResult::new(&input.name);

        if self.aborted() {
            return (result.fail(GeolintError::Aborted), None);
        }

        let dataset = match &input.dataset {
            Ok(dataset) => dataset,
            Err(e) => {
                result.validation = Some(ValidationReport::integrity_failure(0, e.to_string()));
                let error = match e {
                    GeolintError::FileIntegrity { file, reason } => GeolintError::integrity(file, reason),
                    other => GeolintError::integrity(&input.name, other.to_string()),
                };
                return (result.fail(error), None);
            }
        };

        result.features_in = dataset.len();
        result.fingerprint_before = Some(dataset_fingerprint(dataset));

        let validated = self.validator.validate(dataset);
        result.validation = Some(validated.report().clone());

        if let Some(issue) = validated.report().issues_of(IssueKind::FormatIntegrity).next() {
            let error = GeolintError::integrity(&input.name, issue.detail.clone());
            return (result.fail(error), None);
        }

        let crs = match &input.crs_override {
            Some(crs) => crs.normalized(),
            None => match self.resolver.resolve(dataset) {
                Ok(crs) => crs,
                Err(e) => return (result.fail(e), None),
            },
        };

        if crs.inferred && !self.strategy.accept_inferred_crs {
            let error = GeolintError::CrsUnresolved {
                best: crs.identifier.clone(),
                confidence: crs.confidence.unwrap_or(0.0),
            };
            result.crs = Some(crs);
            return (result.fail(error), None);
        }
        result.crs = Some(crs.clone());

        let outcome = self.repairer.repair(&validated, &self.strategy.repair_options());
        result.repairs = outcome.actions;

        let mut repaired = outcome.dataset;
        repaired.crs = Some(crs);

        let post = self.validator.validate(&repaired);
        result.post_validation = Some(post.report().clone());
        result.fingerprint_after = Some(dataset_fingerprint(&repaired));
        result.dataset = Some(repaired);
        result.status = FileStatus::Processed;

        (result, Some(post))
    }

    /// Seconde passe : reprojection vers le CRS cible
    fn reproject_file(&self, mut file: FileResult, validated: &Validated, target: &Crs) -> FileResult {
        if self.aborted() {
            return file.fail(GeolintError::Aborted);
        }

        let Some(source) = file.crs.clone() else {
            return file;
        };
        if source.same_as(target) {
            return file;
        }

        match self.reprojector.reproject(validated, &source, target) {
            Ok(outcome) => {
                file.reprojection = Some(ReprojectionSummary {
                    source_crs: outcome.source_crs.identifier.clone(),
                    target_crs: outcome.target_crs.identifier.clone(),
                    method: outcome.method.to_string(),
                    failures: outcome.failures,
                    envelope_before: outcome.envelope_before,
                    envelope_after: outcome.envelope_after,
                });
                file.fingerprint_after = Some(dataset_fingerprint(&outcome.dataset));
                file.dataset = Some(outcome.dataset);
                file
            }
            Err(e) => file.fail(e),
        }
    }

    /// Fusionne les fichiers traités partageant le CRS unifié
    fn merge(&self, files: &[FileResult], target_crs: Option<&Crs>) -> Option<MergeResult> {
        let processed: Vec<&FileResult> = files.iter().filter(|f| f.is_processed()).collect();
        let merge_crs = target_crs
            .cloned()
            .or_else(|| processed.first().and_then(|f| f.output_crs().cloned()))?;

        let (included, skipped): (Vec<&FileResult>, Vec<&FileResult>) = processed
            .into_iter()
            .partition(|f| f.output_crs().is_some_and(|crs| crs.same_as(&merge_crs)));

        for file in &skipped {
            warn!(file = %file.name, "Skipping file with a different CRS from merge");
        }

        let datasets: Vec<&Dataset> = included.iter().filter_map(|f| f.dataset.as_ref()).collect();
        let schema_conflicts = schema_conflicts(&datasets);

        let mut fields: BTreeSet<String> = datasets
            .iter()
            .flat_map(|d| d.features.iter().flat_map(|f| f.attributes.keys().cloned()))
            .collect();
        if self.strategy.track_source {
            fields.insert(SOURCE_DATASET_FIELD.to_string());
            fields.insert(SOURCE_INDEX_FIELD.to_string());
        }

        let mut features = Vec::with_capacity(datasets.iter().map(|d| d.len()).sum());
        for dataset in &datasets {
            for (index, feature) in dataset.features.iter().enumerate() {
                let mut attributes: BTreeMap<String, AttributeValue> = fields
                    .iter()
                    .map(|field| {
                        let value = feature.attributes.get(field).cloned().unwrap_or(AttributeValue::Null);
                        (field.clone(), value)
                    })
                    .collect();

                if self.strategy.track_source {
                    attributes.insert(SOURCE_DATASET_FIELD.to_string(), dataset.name.clone().into());
                    attributes.insert(SOURCE_INDEX_FIELD.to_string(), (index as i64).into());
                }

                features.push(Feature {
                    geometry: feature.geometry.clone(),
                    attributes,
                });
            }
        }

        let mut dataset = Dataset::new("merged", features).with_crs(merge_crs);
        dataset.geometry_hint = dataset.uniform_kind();
        let validation = self.validator.report(&dataset);

        info!(
            files = datasets.len(),
            features = dataset.len(),
            conflicts = schema_conflicts.len(),
            "Datasets merged"
        );

        Some(MergeResult {
            dataset,
            validation,
            sources: included.iter().map(|f| f.name.clone()).collect(),
            skipped: skipped.iter().map(|f| f.name.clone()).collect(),
            schema_conflicts,
        })
    }
}

/// Différences de schéma entre les jeux fusionnés
fn schema_conflicts(datasets: &[&Dataset]) -> Vec<SchemaConflict> {
    // champ -> jeux qui le portent
    let mut present: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    // champ -> type -> jeux
    let mut types: BTreeMap<&str, BTreeMap<&'static str, BTreeSet<&str>>> = BTreeMap::new();

    for dataset in datasets {
        for feature in &dataset.features {
            for (field, value) in &feature.attributes {
                present.entry(field).or_default().insert(&dataset.name);
                if !matches!(value, AttributeValue::Null) {
                    types
                        .entry(field)
                        .or_default()
                        .entry(value.type_name())
                        .or_default()
                        .insert(&dataset.name);
                }
            }
        }
    }

    let mut conflicts = Vec::new();
    for (field, owners) in &present {
        if owners.len() < datasets.len() {
            let missing: Vec<&str> = datasets
                .iter()
                .map(|d| d.name.as_str())
                .filter(|name| !owners.contains(name))
                .collect();
            conflicts.push(SchemaConflict {
                field: field.to_string(),
                kind: SchemaConflictKind::MissingField,
                detail: format!("absent from {}", missing.join(", ")),
            });
        }

        if let Some(by_type) = types.get(field).filter(|t| t.len() > 1) {
            let detail = by_type
                .iter()
                .map(|(ty, names)| format!("{} in {}", ty, names.iter().copied().collect::<Vec<_>>().join(", ")))
                .collect::<Vec<_>>()
                .join("; ");
            conflicts.push(SchemaConflict {
                field: field.to_string(),
                kind: SchemaConflictKind::TypeMismatch,
                detail,
            });
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon};

    fn points(name: &str, coords: &[(f64, f64)]) -> Dataset {
        Dataset::new(
            name,
            coords
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| Feature::new(point!(x: x, y: y)).with_attribute("id", i as i64))
                .collect(),
        )
    }

    #[test]
    fn test_failures_are_isolated() {
        let inputs = vec![
            BatchInput::new("good.geojson", Ok(points("good", &[(2.0, 48.0)]))),
            BatchInput::new(
                "broken.tar.bz2",
                Err(GeolintError::integrity("broken.tar.bz2", "no .geojson member")),
            ),
            BatchInput::new("far.geojson", Ok(points("far", &[(1e9, 1e9), (2e9, 2e9)]))),
        ];

        let job = BatchCoordinator::new(BatchStrategy::default()).run(inputs);
        let statuses: Vec<FileStatus> = job.files.iter().map(|f| f.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Processed, FileStatus::Failed, FileStatus::Failed]
        );
        assert!(job.files[1].validation.as_ref().unwrap().integrity_failed());
        assert!(matches!(
            job.files[2].failure,
            Some(GeolintError::CrsUnresolved { .. })
        ));
        // Les rapports de validation du fichier non résolu sont conservés
        assert!(job.files[2].validation.is_some());
        assert!(!job.all_failed());
    }

    #[test]
    fn test_reject_inferred_crs() {
        let strategy = BatchStrategy {
            accept_inferred_crs: false,
            ..Default::default()
        };
        let inputs = vec![
            BatchInput::new("inferred", Ok(points("inferred", &[(2.0, 48.0)]))),
            BatchInput::new("declared", Ok(points("declared", &[(2.0, 48.0)]).with_crs(Crs::epsg(4326)))),
            BatchInput::new("override", Ok(points("override", &[(2.0, 48.0)]))).with_crs_override(Crs::epsg(4326)),
        ];

        let job = BatchCoordinator::new(strategy).run(inputs);
        assert_eq!(job.files[0].status, FileStatus::Failed);
        assert_eq!(job.files[1].status, FileStatus::Processed);
        assert_eq!(job.files[2].status, FileStatus::Processed);
    }

    #[test]
    fn test_unify_uses_first_successful_crs() {
        let strategy = BatchStrategy {
            unify_crs: true,
            ..Default::default()
        };
        let inputs = vec![
            BatchInput::new("bad", Err(GeolintError::integrity("bad", "truncated"))),
            BatchInput::new("mercator", Ok(points("mercator", &[(261600.0, 6250000.0)]).with_crs(Crs::epsg(3857)))),
            BatchInput::new("wgs84", Ok(points("wgs84", &[(2.35, 48.85)]).with_crs(Crs::epsg(4326)))),
        ];

        let job = BatchCoordinator::new(strategy).run(inputs);
        assert_eq!(job.target_crs, Some(Crs::epsg(3857)));
        assert!(job.files[1].reprojection.is_none());
        let summary = job.files[2].reprojection.as_ref().unwrap();
        assert_eq!(summary.target_crs, "EPSG:3857");
        assert_eq!(job.files[2].output_crs(), Some(&Crs::epsg(3857)));
    }

    #[test]
    fn test_merge_pads_schema_and_tracks_source() {
        let a = Dataset::new(
            "a",
            vec![
                Feature::new(point!(x: 1.0, y: 1.0)).with_attribute("name", "x"),
                Feature::new(point!(x: 2.0, y: 2.0)).with_attribute("name", "y"),
            ],
        )
        .with_crs(Crs::epsg(4326));
        let b = Dataset::new(
            "b",
            vec![Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)])
                .with_attribute("name", 5i64)
                .with_attribute("lanes", 2i64)],
        )
        .with_crs(Crs::epsg(4326));

        let strategy = BatchStrategy {
            merge: true,
            track_source: true,
            ..Default::default()
        };
        let job = BatchCoordinator::new(strategy).run(vec![
            BatchInput::new("a", Ok(a)),
            BatchInput::new("b", Ok(b)),
        ]);

        let merged = job.merged.unwrap();
        assert_eq!(merged.dataset.len(), 3);
        assert_eq!(merged.sources, vec!["a".to_string(), "b".to_string()]);

        let first = &merged.dataset.features[0];
        assert_eq!(first.attributes.get("lanes"), Some(&AttributeValue::Null));
        assert_eq!(first.attributes.get(SOURCE_DATASET_FIELD), Some(&AttributeValue::from("a")));
        assert_eq!(merged.dataset.features[2].attributes.get(SOURCE_INDEX_FIELD), Some(&AttributeValue::Int(0)));

        let kinds: Vec<(&str, SchemaConflictKind)> = merged
            .schema_conflicts
            .iter()
            .map(|c| (c.field.as_str(), c.kind))
            .collect();
        assert!(kinds.contains(&("lanes", SchemaConflictKind::MissingField)));
        assert!(kinds.contains(&("name", SchemaConflictKind::TypeMismatch)));

        // Types mixtes signalés, jamais corrigés
        assert!(merged.validation.has(IssueKind::MixedGeometryTypes));
    }

    #[test]
    fn test_merge_skips_other_crs() {
        let strategy = BatchStrategy {
            merge: true,
            ..Default::default()
        };
        let job = BatchCoordinator::new(strategy).run(vec![
            BatchInput::new("a", Ok(points("a", &[(2.0, 48.0)]).with_crs(Crs::epsg(4326)))),
            BatchInput::new("b", Ok(points("b", &[(261600.0, 6250000.0)]).with_crs(Crs::epsg(3857)))),
        ]);

        let merged = job.merged.unwrap();
        assert_eq!(merged.sources, vec!["a".to_string()]);
        assert_eq!(merged.skipped, vec!["b".to_string()]);
    }

    #[test]
    fn test_abort_marks_files() {
        let coordinator = BatchCoordinator::new(BatchStrategy::default());
        coordinator.abort_handle().store(true, Ordering::Relaxed);

        let job = coordinator.run(vec![BatchInput::new("a", Ok(points("a", &[(2.0, 48.0)])))]);
        assert_eq!(job.files[0].status, FileStatus::Aborted);
        assert!(matches!(job.files[0].failure, Some(GeolintError::Aborted)));
        assert!(job.all_failed());
    }

    #[test]
    fn test_fix_geometries_in_batch() {
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
        ];
        let dataset = Dataset::new("shapes", vec![Feature::new(bowtie), Feature::null()]).with_crs(Crs::epsg(4326));

        let strategy = BatchStrategy {
            fix_geometries: true,
            ..Default::default()
        };
        let job = BatchCoordinator::new(strategy).run(vec![BatchInput::new("shapes", Ok(dataset))]);
        let file = &job.files[0];

        assert_eq!(file.repairs.len(), 2);
        assert!(file.post_validation.as_ref().unwrap().is_clean());
        assert_eq!(file.features_out(), 1);
        assert_ne!(file.fingerprint_before, file.fingerprint_after);
    }

    fn three_crs_inputs() -> Vec<BatchInput> {
        vec![
            BatchInput::new("utm", Ok(points("utm", &[(448000.0, 5411000.0)]).with_crs(Crs::epsg(32631)))),
            BatchInput::new("wgs84", Ok(points("wgs84", &[(2.35, 48.85)]).with_crs(Crs::epsg(4326)))),
            BatchInput::new("gps", Ok(points("gps", &[(2.30, 48.80)]).with_crs(Crs::epsg(4326)))),
        ]
    }

    #[test]
    fn test_crs_distribution() {
        let job = BatchCoordinator::new(BatchStrategy::default()).run(three_crs_inputs());
        let shares = crs_distribution(&job.files);

        let summary: Vec<(&str, usize)> = shares.iter().map(|s| (s.crs.as_str(), s.count)).collect();
        assert_eq!(summary, vec![("EPSG:4326", 2), ("EPSG:32631", 1)]);
        assert!((shares[0].share - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_unify_most_common() {
        let strategy = BatchStrategy {
            unify_crs: true,
            unify_strategy: UnifyStrategy::MostCommon,
            ..Default::default()
        };
        let job = BatchCoordinator::new(strategy).run(three_crs_inputs());
        assert_eq!(job.target_crs, Some(Crs::epsg(4326)));
        assert!(job.files[0].reprojection.is_some());

        let first = BatchStrategy {
            unify_crs: true,
            ..Default::default()
        };
        let job = BatchCoordinator::new(first).run(three_crs_inputs());
        assert_eq!(job.target_crs, Some(Crs::epsg(32631)));
    }

    #[test]
    fn test_unify_auto_detect_falls_back_to_wgs84() {
        let strategy = BatchStrategy {
            unify_crs: true,
            unify_strategy: UnifyStrategy::AutoDetect,
            ..Default::default()
        };
        let inputs = vec![
            BatchInput::new("utm", Ok(points("utm", &[(448000.0, 5411000.0)]).with_crs(Crs::epsg(32631)))),
            BatchInput::new("mercator", Ok(points("mercator", &[(261600.0, 6250000.0)]).with_crs(Crs::epsg(3857)))),
        ];
        let job = BatchCoordinator::new(strategy.clone()).run(inputs);
        assert_eq!(job.target_crs, Some(Crs::epsg(4326)));

        let job = BatchCoordinator::new(strategy).run(three_crs_inputs());
        assert_eq!(job.target_crs, Some(Crs::epsg(4326)));
        assert_eq!(job.files[1].reprojection, None);
    }

    #[test]
    fn test_merge_sets_geometry_hint() {
        let strategy = BatchStrategy {
            merge: true,
            ..Default::default()
        };
        let job = BatchCoordinator::new(strategy).run(vec![
            BatchInput::new("a", Ok(points("a", &[(2.0, 48.0)]).with_crs(Crs::epsg(4326)))),
            BatchInput::new("b", Ok(points("b", &[(2.1, 48.1)]).with_crs(Crs::epsg(4326)))),
        ]);
        let merged = job.merged.unwrap();
        assert_eq!(merged.dataset.geometry_hint, Some(crate::types::GeometryKind::Point));
    }

    #[test]
    fn test_simplify_in_batch() {
        let wiggly = line_string![(x: 2.0, y: 48.0), (x: 2.1, y: 48.00001), (x: 2.2, y: 48.0)];
        let dataset = Dataset::new("roads", vec![Feature::new(wiggly)]).with_crs(Crs::epsg(4326));
        let strategy = BatchStrategy {
            simplify_tolerance: Some(0.001),
            ..Default::default()
        };
        let job = BatchCoordinator::new(strategy).run(vec![BatchInput::new("roads", Ok(dataset))]);
        let file = &job.files[0];
        assert_eq!(file.repairs.len(), 1);
        assert_eq!(file.repairs[0].kind, crate::repair::RepairKind::Simplified);
    }

    #[test]
    fn test_custom_reprojector() {
        use crate::reproject::{CoordinateTransform, TransformProvider};

        struct NoTransform;

        impl TransformProvider for NoTransform {
            fn transform(&self, source: &Crs, target: &Crs) -> Result<Box<dyn CoordinateTransform>, GeolintError> {
                Err(GeolintError::UnsupportedTransform {
                    source_crs: source.identifier.clone(),
                    target_crs: target.identifier.clone(),
                })
            }
        }

        let strategy = BatchStrategy {
            target_crs: Some(Crs::epsg(3857)),
            ..Default::default()
        };
        let coordinator = BatchCoordinator::new(strategy).with_reprojector(ReprojectionEngine::new(NoTransform));
        let job = coordinator.run(vec![
            BatchInput::new("wgs84", Ok(points("wgs84", &[(2.0, 48.0)]).with_crs(Crs::epsg(4326)))),
            BatchInput::new("web", Ok(points("web", &[(222_638.0, 6_106_854.0)]).with_crs(Crs::epsg(3857)))),
        ]);

        assert_eq!(job.files[0].status, FileStatus::Failed);
        assert!(matches!(job.files[0].failure, Some(GeolintError::UnsupportedTransform { .. })));
        // Déjà dans le CRS cible : aucune transformation demandée
        assert_eq!(job.files[1].status, FileStatus::Processed);
    }
}
