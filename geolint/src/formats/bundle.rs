//! Archives `.tar.bz2` : un membre `.geojson` et un `.prj` optionnel
//!
//! Le `.prj` contient un identifiant de CRS (`EPSG:2154`, URN...) et
//! l'emporte sur le membre `crs` du GeoJSON.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use geolint_core::crs::Crs;
use geolint_core::{Dataset, FormatIO, GeolintError};
use tar::{Archive, Builder, Header};
use tracing::debug;

/// Contenu utile d'une archive
#[derive(Debug, Default)]
struct BundleMembers {
    data: Option<(String, Vec<u8>)>,
    prj: Option<String>,
}

/// Archive tar.bz2 contenant un GeoJSON
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleIO;

impl FormatIO for BundleIO {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn read(&self, path: &Path) -> Result<Dataset, GeolintError> {
        let source = path.display().to_string();
        let file = File::open(path)?;
        let members = extract(file)
            .map_err(|e| GeolintError::integrity(&source, format!("unreadable archive: {}", e)))?;

        let (member, data) = members
            .data
            .ok_or_else(|| GeolintError::integrity(&source, "no .geojson member in archive"))?;
        let content = String::from_utf8(data)
            .map_err(|_| GeolintError::integrity(&source, format!("{} is not valid UTF-8", member)))?;

        let mut dataset = super::geojson::parse_str(&super::dataset_name(path), &source, &content)?;

        if let Some(prj) = members.prj.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            dataset.crs = Some(Crs::parse(prj));
        }

        debug!(archive = %source, member = %member, features = dataset.len(), "Bundle extracted");
        Ok(dataset)
    }

    fn write(&self, dataset: &Dataset, path: &Path) -> Result<(), GeolintError> {
        let mut data = Vec::new();
        super::geojson::write_collection(dataset, &mut data)?;

        let file = File::create(path)?;
        let mut builder = Builder::new(BzEncoder::new(file, Compression::default()));

        append(&mut builder, &format!("{}.geojson", dataset.name), &data)?;
        if let Some(crs) = &dataset.crs {
            append(&mut builder, &format!("{}.prj", dataset.name), crs.identifier.as_bytes())?;
        }

        builder.into_inner()?.finish()?;
        Ok(())
    }
}

/// Lit les membres en mémoire
fn extract<R: Read>(reader: R) -> std::io::Result<BundleMembers> {
    let mut archive = Archive::new(BzDecoder::new(reader));
    let mut members = BundleMembers::default();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().to_string();
        let extension = name.rsplit('.').next().unwrap_or("").to_lowercase();

        match extension.as_str() {
            "geojson" | "json" if members.data.is_none() => {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                members.data = Some((name, content));
            }
            "prj" if members.prj.is_none() => {
                let mut content = String::new();
                entry.read_to_string(&mut content)?;
                members.prj = Some(content);
            }
            _ => {
                // Autres fichiers ignorés (métadonnées, documentation)
            }
        }
    }

    Ok(members)
}

fn append<W: std::io::Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> std::io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;
    use geolint_core::Feature;

    #[test]
    fn test_extract_missing_file() {
        let result = BundleIO.read(Path::new("nonexistent.tar.bz2"));
        assert!(matches!(result, Err(GeolintError::Io(_))));
    }

    #[test]
    fn test_write_then_extract_members() {
        let dataset = Dataset::new("roads", vec![Feature::new(point!(x: 700000.0, y: 6600000.0))])
            .with_crs(Crs::parse("EPSG:2154"));
        let path = std::env::temp_dir().join("geolint_bundle_members.tar.bz2");
        BundleIO.write(&dataset, &path).unwrap();

        let members = extract(File::open(&path).unwrap()).unwrap();
        assert_eq!(members.data.unwrap().0, "roads.geojson");
        assert_eq!(members.prj.as_deref(), Some("EPSG:2154"));

        std::fs::remove_file(path).ok();
    }
}
