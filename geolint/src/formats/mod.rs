//! Formats de fichiers pris en charge
//!
//! Le format est choisi d'après l'extension : `.geojson` / `.json` ou
//! `.tar.bz2` / `.tbz2`.

pub mod bundle;
pub mod geojson;

use std::path::{Path, PathBuf};

use geolint_core::{Dataset, FormatIO, GeolintError};

pub use bundle::BundleIO;
pub use geojson::GeoJsonIO;

const BUNDLE_SUFFIXES: [&str; 2] = [".tar.bz2", ".tbz2"];
const GEOJSON_SUFFIXES: [&str; 2] = [".geojson", ".json"];

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Format associé à un chemin, `None` si l'extension est inconnue
pub fn format_for(path: &Path) -> Option<Box<dyn FormatIO>> {
    let name = file_name_lower(path);
    if BUNDLE_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        Some(Box::new(BundleIO))
    } else if GEOJSON_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        Some(Box::new(GeoJsonIO))
    } else {
        None
    }
}

pub fn is_supported(path: &Path) -> bool {
    format_for(path).is_some()
}

/// Charge un fichier avec le format correspondant à son extension
pub fn open(path: &Path) -> Result<Dataset, GeolintError> {
    let format = format_for(path).ok_or_else(|| {
        GeolintError::integrity(path.display().to_string(), "unsupported file format")
    })?;
    format.read(path)
}

/// Nom du jeu de données : nom de fichier sans les extensions connues
pub fn dataset_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    BUNDLE_SUFFIXES
        .iter()
        .chain(GEOJSON_SUFFIXES.iter())
        .find_map(|suffix| {
            let cut = name.len().checked_sub(suffix.len())?;
            (name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(suffix)).then(|| name[..cut].to_string())
        })
        .unwrap_or_else(|| name.to_string())
}

/// Collecte les fichiers pris en charge, récursivement pour les dossiers
///
/// Les fichiers passés explicitement sont conservés quelle que soit leur
/// extension : leur échec éventuel apparaît dans le rapport.
pub fn collect_inputs(paths: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    for path in paths {
        if path.is_dir() {
            collect_dir(path, &mut inputs)?;
        } else {
            inputs.push(path.clone());
        }
    }

    Ok(inputs)
}

fn collect_dir(dir: &Path, inputs: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_dir(&path, inputs)?;
        } else if is_supported(&path) {
            inputs.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_name() {
        assert_eq!(dataset_name(Path::new("data/roads.tar.bz2")), "roads");
        assert_eq!(dataset_name(Path::new("Parcels.GeoJSON")), "Parcels");
        assert_eq!(dataset_name(Path::new("a.b.json")), "a.b");
        assert_eq!(dataset_name(Path::new("notes.txt")), "notes.txt");
    }

    #[test]
    fn test_format_dispatch() {
        assert_eq!(format_for(Path::new("x.geojson")).unwrap().name(), "geojson");
        assert_eq!(format_for(Path::new("x.TAR.BZ2")).unwrap().name(), "bundle");
        assert!(format_for(Path::new("x.shp")).is_none());
    }

    #[test]
    fn test_open_unsupported() {
        let err = open(Path::new("layer.shp")).unwrap_err();
        assert!(matches!(err, GeolintError::FileIntegrity { .. }));
    }
}
