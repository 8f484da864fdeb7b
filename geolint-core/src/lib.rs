//! # geolint-core
//!
//! Validation, inférence de CRS, réparation et reprojection de jeux de
//! données vectoriels.
//!
//! ## Features
//!
//! - Validation pure avec rapport typé (CRS manquant, géométries invalides ou vides, types mixtes)
//! - Inférence de CRS depuis l'emprise avec score de confiance
//! - Réparation déterministe et idempotente des géométries, simplification optionnelle
//! - Reprojection en Rust pur (WGS84, Web Mercator, UTM), PROJ en option (feature `proj`)
//! - Traitement par lots parallèle avec `rayon` et fusion des jeux
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geolint_core::{BatchCoordinator, BatchInput, BatchStrategy, ReportBuilder};
//!
//! let strategy = BatchStrategy { fix_geometries: true, unify_crs: true, ..Default::default() };
//! let job = BatchCoordinator::new(strategy).run(vec![BatchInput::new("roads", Ok(dataset))]);
//! println!("{}", ReportBuilder.build(&job).summary());
//! ```

pub mod batch;
pub mod crs;
pub mod error;
pub mod fingerprint;
pub mod io;
pub mod repair;
pub mod report;
pub mod reproject;
pub mod types;
pub mod validation;

pub use batch::{BatchCoordinator, BatchInput, BatchJob, BatchStrategy, FileResult, FileStatus, UnifyStrategy};
pub use crs::{Crs, CrsResolver};
pub use error::GeolintError;
pub use io::FormatIO;
pub use repair::{GeometryRepairer, RepairOptions};
pub use report::{BatchReport, BatchStatus, ReportBuilder};
pub use reproject::ReprojectionEngine;
pub use types::{AttributeValue, Dataset, Feature};
pub use validation::{ValidationEngine, ValidationReport, Validated};
