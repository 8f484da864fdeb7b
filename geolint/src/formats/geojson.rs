//! Lecture et écriture GeoJSON
//!
//! Lecture avec le crate `geojson` (membre `crs` historique pris en compte),
//! écriture en streaming avec le `GeoJsonWriter` de geozero.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geo::Geometry;
use geojson::{GeoJson, JsonObject, JsonValue};
use geolint_core::crs::Crs;
use geolint_core::{AttributeValue, Dataset, Feature, FormatIO, GeolintError};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use tracing::debug;

/// FeatureCollection GeoJSON
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonIO;

impl FormatIO for GeoJsonIO {
    fn name(&self) -> &'static str {
        "geojson"
    }

    fn read(&self, path: &Path) -> Result<Dataset, GeolintError> {
        let content = std::fs::read_to_string(path)?;
        parse_str(&super::dataset_name(path), &path.display().to_string(), &content)
    }

    fn write(&self, dataset: &Dataset, path: &Path) -> Result<(), GeolintError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_collection(dataset, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Analyse un document GeoJSON (FeatureCollection, Feature ou géométrie seule)
pub(crate) fn parse_str(name: &str, source: &str, content: &str) -> Result<Dataset, GeolintError> {
    let geojson: GeoJson = content
        .parse()
        .map_err(|e| GeolintError::integrity(source, format!("invalid GeoJSON: {}", e)))?;

    let (features, foreign) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(feature) => (vec![feature], None),
        GeoJson::Geometry(geometry) => (vec![geojson::Feature::from(geometry)], None),
    };

    let features = features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| convert_feature(source, index, feature))
        .collect::<Result<Vec<_>, _>>()?;

    let mut dataset = Dataset::new(name, features);
    if let Some(crs) = foreign.as_ref().and_then(legacy_crs) {
        dataset = dataset.with_crs(crs);
    }
    // GeoJSON ne déclare pas de type : celui des features s'il est unique
    dataset.geometry_hint = dataset.uniform_kind();

    debug!(
        dataset = %dataset.name,
        features = dataset.len(),
        crs = ?dataset.crs.as_ref().map(|c| c.identifier.as_str()),
        "GeoJSON parsed"
    );
    Ok(dataset)
}

fn convert_feature(source: &str, index: usize, feature: geojson::Feature) -> Result<Feature, GeolintError> {
    let geometry = feature
        .geometry
        .map(Geometry::<f64>::try_from)
        .transpose()
        .map_err(|e| GeolintError::integrity(source, format!("feature #{}: {}", index, e)))?;

    let attributes = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, attribute_value(value)))
        .collect::<BTreeMap<_, _>>();

    Ok(Feature { geometry, attributes })
}

/// Les valeurs imbriquées (tableaux, objets) sont conservées sous forme de texte JSON
fn attribute_value(value: JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => AttributeValue::Int(i),
            None => AttributeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => AttributeValue::Text(s),
        nested => AttributeValue::Text(nested.to_string()),
    }
}

/// Membre `crs` de GeoJSON 2008 : `{"type": "name", "properties": {"name": "..."}}`
fn legacy_crs(foreign: &JsonObject) -> Option<Crs> {
    let name = foreign
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    Some(Crs::parse(name))
}

/// Écrit une FeatureCollection complète
pub(crate) fn write_collection<W: Write>(dataset: &Dataset, writer: &mut W) -> Result<(), GeolintError> {
    write!(writer, r#"{{"type":"FeatureCollection","#)?;

    if let Some(crs) = &dataset.crs {
        let name = match crs.code {
            Some(code) => format!("urn:ogc:def:crs:EPSG::{}", code),
            None => crs.identifier.clone(),
        };
        let member = serde_json::json!({"type": "name", "properties": {"name": name}});
        write!(writer, r#""crs":{},"#, member)?;
    }

    write!(writer, r#""features":["#)?;
    for (i, feature) in dataset.features.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, feature)?;
    }
    write!(writer, "]}}")?;

    Ok(())
}

fn write_feature<W: Write>(writer: &mut W, feature: &Feature) -> Result<(), GeolintError> {
    write!(writer, r#"{{"type":"Feature","geometry":"#)?;

    match &feature.geometry {
        Some(geometry) => {
            let mut geom_buf = Vec::new();
            let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
            geometry
                .process_geom(&mut geom_writer)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            writer.write_all(&geom_buf)?;
        }
        None => write!(writer, "null")?,
    }

    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &feature.attributes).map_err(std::io::Error::from)?;
    write!(writer, "}}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;
    use geolint_core::types::GeometryKind;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
        "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [261600.5, 6250000.0]},
             "properties": {"name": "Paris", "population": 2161000, "ratio": 0.5, "tags": ["a", "b"], "meta": null}},
            {"type": "Feature", "geometry": null, "properties": {}}
        ]
    }"#;

    #[test]
    fn test_parse_collection() {
        let dataset = parse_str("cities", "cities.geojson", SAMPLE).unwrap();
        assert_eq!(dataset.name, "cities");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.crs, Some(Crs::epsg(3857)));

        let attrs = &dataset.features[0].attributes;
        assert_eq!(attrs.get("name"), Some(&AttributeValue::Text("Paris".into())));
        assert_eq!(attrs.get("population"), Some(&AttributeValue::Int(2161000)));
        assert_eq!(attrs.get("ratio"), Some(&AttributeValue::Float(0.5)));
        assert_eq!(attrs.get("tags"), Some(&AttributeValue::Text(r#"["a","b"]"#.into())));
        assert_eq!(attrs.get("meta"), Some(&AttributeValue::Null));
        assert!(dataset.features[1].geometry.is_none());
        assert_eq!(dataset.geometry_hint, Some(GeometryKind::Point));
    }

    #[test]
    fn test_mixed_collection_has_no_hint() {
        let content = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}, "properties": {}},
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}, "properties": {}}
        ]}"#;
        let dataset = parse_str("mixed", "mixed.geojson", content).unwrap();
        assert_eq!(dataset.geometry_hint, None);
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_str("bad", "bad.geojson", "{\"type\": \"FeatureCollection\"").unwrap_err();
        assert!(matches!(err, GeolintError::FileIntegrity { .. }));
    }

    #[test]
    fn test_write_collection() {
        let dataset = Dataset::new(
            "out",
            vec![
                Feature::new(point!(x: 1.5, y: 2.0)).with_attribute("name", "a\"b"),
                Feature::null(),
            ],
        )
        .with_crs(Crs::epsg(4326));

        let mut buffer = Vec::new();
        write_collection(&dataset, &mut buffer).unwrap();
        let json: JsonValue = serde_json::from_slice(&buffer).unwrap();

        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["crs"]["properties"]["name"], "urn:ogc:def:crs:EPSG::4326");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
        assert_eq!(json["features"][0]["properties"]["name"], "a\"b");
        assert!(json["features"][1]["geometry"].is_null());

        let back = parse_str("out", "out.geojson", std::str::from_utf8(&buffer).unwrap()).unwrap();
        assert_eq!(back.features, dataset.features);
        assert_eq!(back.crs, dataset.crs);
    }
}
