//! Définition et implémentation des commandes CLI
//!
//! - `validate` : rapport de validation d'un fichier
//! - `batch` : validation, réparation, reprojection et fusion de plusieurs fichiers

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use geolint::config::Config;
use geolint::formats;
use geolint::output::{self, ValidateOutput};
use geolint_core::batch::{BatchCoordinator, BatchInput};
use geolint_core::crs::Crs;
use geolint_core::report::{health_score, ReportBuilder};
use geolint_core::{UnifyStrategy, ValidationEngine};
use rayon::prelude::*;
use tracing::{debug, info, warn};

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a single file and report its issues
    Validate {
        /// GeoJSON file or .tar.bz2 bundle
        input: PathBuf,

        /// Write the validation report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Approximate data location as LON,LAT, used to infer a missing CRS
        #[arg(long, value_name = "LON,LAT", value_parser = parse_location_hint)]
        location_hint: Option<(f64, f64)>,
    },

    /// Validate, repair, reproject and merge several files
    Batch(BatchArgs),
}

#[derive(Args)]
pub struct BatchArgs {
    /// Input files or directories (searched recursively)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config preset name (default/strict/merge) or path to a JSON config
    #[arg(long, default_value = "default")]
    pub config: String,

    /// Target CRS for every output (e.g., EPSG:3857)
    #[arg(long)]
    pub target_crs: Option<String>,

    /// CRS assumed for every input, overriding file metadata and inference
    #[arg(long)]
    pub assume_crs: Option<String>,

    /// Reproject every file to a common CRS
    #[arg(long)]
    pub unify_crs: bool,

    /// How the common CRS is chosen with --unify-crs
    #[arg(long, value_enum)]
    pub unify_strategy: Option<UnifyArg>,

    /// Approximate data location as LON,LAT, used to infer a missing CRS
    #[arg(long, value_name = "LON,LAT", value_parser = parse_location_hint)]
    pub location_hint: Option<(f64, f64)>,

    /// Fix invalid geometries and remove empty ones
    #[arg(long)]
    pub fix_geometries: bool,

    /// Split multipart geometries into one feature per part
    #[arg(long)]
    pub explode_multipart: bool,

    /// Simplify lines and polygons with this tolerance (CRS units)
    #[arg(long, value_name = "TOLERANCE")]
    pub simplify: Option<f64>,

    /// Merge all processed files into a single dataset
    #[arg(long)]
    pub merge: bool,

    /// Output directory for GeoJSON results
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the batch report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Maximum number of files processed concurrently
    #[arg(long, alias = "threads")]
    pub jobs: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UnifyArg {
    /// CRS of the first successful file
    FirstFile,
    /// CRS shared by the most files
    MostCommon,
    /// Majority CRS, WGS84 when no CRS holds a majority
    AutoDetect,
}

impl From<UnifyArg> for UnifyStrategy {
    fn from(arg: UnifyArg) -> Self {
        match arg {
            UnifyArg::FirstFile => UnifyStrategy::FirstFile,
            UnifyArg::MostCommon => UnifyStrategy::MostCommon,
            UnifyArg::AutoDetect => UnifyStrategy::AutoDetect,
        }
    }
}

/// Lit `LON,LAT`
fn parse_location_hint(value: &str) -> Result<(f64, f64), String> {
    let (lon, lat) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LON,LAT, got '{}'", value))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate '{}': {}", v.trim(), e))
    };
    Ok((parse(lon)?, parse(lat)?))
}

impl BatchArgs {
    /// Les options CLI l'emportent sur la configuration
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(crs) = &self.target_crs {
            config.target_crs = Some(crs.clone());
        }
        config.unify_crs |= self.unify_crs;
        if let Some(strategy) = self.unify_strategy {
            config.unify_strategy = strategy.into();
        }
        if self.location_hint.is_some() {
            config.location_hint = self.location_hint;
        }
        config.fix_geometries |= self.fix_geometries;
        config.explode_multipart |= self.explode_multipart;
        if self.simplify.is_some() {
            config.simplify_tolerance = self.simplify;
        }
        config.merge |= self.merge;
        if self.jobs.is_some() {
            config.jobs = self.jobs;
        }
        config.check()
    }
}

/// Exécute la commande validate, `false` si le fichier est inexploitable
pub fn cmd_validate(
    input: &Path,
    report_path: Option<&Path>,
    json: bool,
    location_hint: Option<(f64, f64)>,
) -> Result<bool> {
    let mut config = Config::default();
    config.apply_env()?;
    if location_hint.is_some() {
        config.location_hint = location_hint;
        config.check()?;
    }

    let dataset = formats::open(input).with_context(|| format!("Failed to load {}", input.display()))?;
    let report = ValidationEngine.report(&dataset);

    let (crs, crs_error) = match config.resolver().resolve(&dataset) {
        Ok(crs) => (Some(crs), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let result = ValidateOutput {
        file: input.display().to_string(),
        crs,
        crs_error,
        health: health_score(&report),
        validation: report,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        output::display_validation(&result);
    }

    if let Some(path) = report_path {
        output::save_report(&result, path)?;
        info!(path = %path.display(), "Report saved");
    }

    Ok(!result.validation.integrity_failed())
}

/// Exécute la commande batch, `false` si tous les fichiers ont échoué
pub fn cmd_batch(args: &BatchArgs) -> Result<bool> {
    let start = Instant::now();

    let mut config = Config::resolve(&args.config)?;
    config.apply_env()?;
    args.apply(&mut config)?;

    let inputs = formats::collect_inputs(&args.inputs).context("Failed to list input files")?;
    if inputs.is_empty() {
        anyhow::bail!("No supported input files (.geojson, .json, .tar.bz2) found");
    }

    let jobs = config.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("Failed to build thread pool")?;

    info!(
        files = inputs.len(),
        jobs,
        config = %args.config,
        target_crs = ?config.target_crs,
        "Starting batch"
    );

    let assumed = args.assume_crs.as_deref().map(Crs::parse);
    let coordinator = BatchCoordinator::new(config.strategy()).with_resolver(config.resolver());

    let job = pool.install(|| {
        let loaded_count = AtomicUsize::new(0);
        let loaded: Vec<BatchInput> = inputs
            .par_iter()
            .map(|path| {
                let dataset = formats::open(path);
                if let Err(e) = &dataset {
                    warn!(file = %path.display(), error = %e, "Failed to load");
                }
                let n = loaded_count.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(loaded = n, total = inputs.len(), file = %path.display(), "Load progress");

                let input = BatchInput::new(path.display().to_string(), dataset);
                match &assumed {
                    Some(crs) => input.with_crs_override(crs.clone()),
                    None => input,
                }
            })
            .collect();

        coordinator.run(loaded)
    });

    let report = ReportBuilder.build(&job);
    output::display_batch(&report);

    if let Some(dir) = &args.output {
        let written = output::write_datasets(&job, dir)?;
        println!("Written: {} files to {}", written.len(), dir.display());
    }

    if let Some(path) = &args.report {
        output::save_report(&report, path)?;
        info!(path = %path.display(), "Report saved");
    }

    info!(elapsed_secs = start.elapsed().as_secs_f64(), "Batch finished");
    println!("{}", report.summary());

    Ok(!job.all_failed())
}
