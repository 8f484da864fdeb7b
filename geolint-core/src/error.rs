//! Types d'erreurs pour le crate geolint-core

use thiserror::Error;

/// Erreurs pouvant marquer un fichier comme échoué.
///
/// Les défauts récupérables (géométrie invalide ou vide, types mixtes,
/// échec de reprojection d'une seule feature, conflit de schéma) ne sont
/// pas des erreurs : ils apparaissent dans les rapports.
#[derive(Debug, Error)]
pub enum GeolintError {
    /// Erreur d'I/O lors de la lecture ou de l'écriture d'un fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Jeu de données incohérent ou illisible (bundle incomplet, archive tronquée)
    #[error("File integrity error in {file}: {reason}")]
    FileIntegrity { file: String, reason: String },

    /// Aucun CRS candidat n'atteint le seuil de confiance
    #[error("CRS could not be resolved (best guess: {best}, confidence {confidence:.3}); supply an explicit CRS")]
    CrsUnresolved { best: String, confidence: f64 },

    /// Identifiant de CRS non reconnu
    #[error("Unknown CRS: {0}")]
    UnknownCrs(String),

    /// Transformation non disponible pour ce couple de CRS
    #[error("Reprojection from {source_crs} to {target_crs} is not supported")]
    UnsupportedTransform {
        source_crs: String,
        target_crs: String,
    },

    /// Échec de reprojection pour l'ensemble du fichier
    #[error("Reprojection failed: {reason}")]
    Reprojection { reason: String },

    /// Traitement interrompu avant le début du fichier
    #[error("Processing aborted")]
    Aborted,
}

impl GeolintError {
    /// Crée une erreur d'intégrité avec contexte
    pub fn integrity(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FileIntegrity {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Crée une erreur de reprojection
    pub fn reprojection(reason: impl Into<String>) -> Self {
        Self::Reprojection {
            reason: reason.into(),
        }
    }

    /// Code stable utilisé dans les rapports JSON
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::FileIntegrity { .. } => "file_integrity",
            Self::CrsUnresolved { .. } => "crs_unresolved",
            Self::UnknownCrs(_) => "unknown_crs",
            Self::UnsupportedTransform { .. } => "unsupported_transform",
            Self::Reprojection { .. } => "reprojection",
            Self::Aborted => "aborted",
        }
    }
}
