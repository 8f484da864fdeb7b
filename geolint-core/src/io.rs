//! Interface de lecture et d'écriture des formats de fichiers
//!
//! Les implémentations concrètes (GeoJSON, archives) vivent dans le crate
//! applicatif ; le cœur ne manipule que des [`Dataset`].

use std::path::Path;

use crate::types::Dataset;
use crate::GeolintError;

/// Lecture et écriture d'un format vectoriel
pub trait FormatIO: Send + Sync {
    /// Nom court du format (`geojson`, `bundle`)
    fn name(&self) -> &'static str;

    /// Charge un fichier
    ///
    /// # Errors
    ///
    /// `FileIntegrity` pour un fichier incohérent ou incomplet, `Io` pour
    /// une erreur de lecture.
    fn read(&self, path: &Path) -> Result<Dataset, GeolintError>;

    /// Écrit un jeu de données
    fn write(&self, dataset: &Dataset, path: &Path) -> Result<(), GeolintError>;
}
