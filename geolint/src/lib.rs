//! # geolint
//!
//! Contrôle, réparation et fusion de jeux de données vectoriels.
//!
//! ## Usage CLI
//!
//! ```bash
//! # Valider un fichier
//! geolint validate ./roads.geojson --report roads.json
//!
//! # Réparer et fusionner un dossier, reprojeté en Web Mercator
//! geolint batch ./data/ --fix-geometries --merge --target-crs EPSG:3857 --output ./out/
//! ```

pub mod config;
pub mod formats;
pub mod output;

pub use config::Config;
pub use formats::{BundleIO, GeoJsonIO};
