//! Configuration du traitement par lots
//!
//! Ordre de priorité : fichier JSON ou preset embarqué, puis variables
//! d'environnement (`GEOLINT_*`, `.env` compris), puis options CLI.

use std::path::Path;

use anyhow::{Context, Result};
use geolint_core::crs::{Crs, CrsResolver};
use geolint_core::{BatchStrategy, UnifyStrategy};
use serde::{Deserialize, Serialize};

pub const ENV_TARGET_CRS: &str = "GEOLINT_TARGET_CRS";
pub const ENV_MIN_CONFIDENCE: &str = "GEOLINT_MIN_CONFIDENCE";
pub const ENV_JOBS: &str = "GEOLINT_JOBS";

/// Presets embarqués
pub const PRESETS: [&str; 3] = ["default", "strict", "merge"];

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// CRS cible (`EPSG:3857`, `urn:ogc:def:crs:EPSG::4326`...)
    pub target_crs: Option<String>,
    pub unify_crs: bool,
    /// `first_file`, `most_common` ou `auto_detect`
    pub unify_strategy: UnifyStrategy,
    /// Corriger les géométries invalides et supprimer les vides
    pub fix_geometries: bool,
    pub explode_multipart: bool,
    /// Tolérance Douglas-Peucker, pas de simplification si absente
    pub simplify_tolerance: Option<f64>,
    pub merge: bool,
    pub accept_inferred_crs: bool,
    /// Ajouter la provenance aux features fusionnées
    pub track_source: bool,
    /// Seuil de confiance de l'inférence de CRS
    pub min_confidence: f64,
    /// Position approximative des données `[lon, lat]`, pour choisir une zone UTM
    pub location_hint: Option<(f64, f64)>,
    /// Nombre de threads (défaut : tous les cœurs)
    pub jobs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_crs: None,
            unify_crs: false,
            unify_strategy: UnifyStrategy::FirstFile,
            fix_geometries: false,
            explode_multipart: false,
            simplify_tolerance: None,
            merge: false,
            accept_inferred_crs: true,
            track_source: false,
            min_confidence: geolint_core::crs::DEFAULT_MIN_CONFIDENCE,
            location_hint: None,
            jobs: None,
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.check()?;
        Ok(config)
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "default" => Self::load_embedded(include_str!("presets/default.json")),
            "strict" => Self::load_embedded(include_str!("presets/strict.json")),
            "merge" => Self::load_embedded(include_str!("presets/merge.json")),
            _ => anyhow::bail!("Unknown preset: {}. Use: {}", preset, PRESETS.join(", ")),
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }

    /// Preset si le nom est connu, fichier JSON sinon
    pub fn resolve(preset_or_path: &str) -> Result<Self> {
        if PRESETS.contains(&preset_or_path) {
            Self::from_preset(preset_or_path)
        } else {
            Self::load(Path::new(preset_or_path))
        }
    }

    /// Applique les variables d'environnement du processus
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Applique des variables fournies par `lookup`
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(crs) = lookup(ENV_TARGET_CRS).filter(|v| !v.trim().is_empty()) {
            self.target_crs = Some(crs);
        }

        if let Some(value) = lookup(ENV_MIN_CONFIDENCE) {
            self.min_confidence = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_MIN_CONFIDENCE, value))?;
        }

        if let Some(value) = lookup(ENV_JOBS) {
            let jobs: usize = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_JOBS, value))?;
            self.jobs = Some(jobs);
        }

        self.check()
    }

    /// Vérifie les bornes des valeurs numériques
    pub fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            anyhow::bail!("min_confidence must be within [0, 1], got {}", self.min_confidence);
        }
        if self.jobs == Some(0) {
            anyhow::bail!("jobs must be at least 1");
        }
        if let Some(tolerance) = self.simplify_tolerance {
            if !(tolerance.is_finite() && tolerance > 0.0) {
                anyhow::bail!("simplify_tolerance must be positive, got {}", tolerance);
            }
        }
        if let Some((lon, lat)) = self.location_hint {
            if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                anyhow::bail!("location_hint ({}, {}) is not a valid longitude/latitude", lon, lat);
            }
        }
        Ok(())
    }

    pub fn strategy(&self) -> BatchStrategy {
        BatchStrategy {
            unify_crs: self.unify_crs,
            unify_strategy: self.unify_strategy,
            target_crs: self.target_crs.as_deref().map(Crs::parse),
            fix_geometries: self.fix_geometries,
            explode_multipart: self.explode_multipart,
            simplify_tolerance: self.simplify_tolerance,
            merge: self.merge,
            accept_inferred_crs: self.accept_inferred_crs,
            track_source: self.track_source,
        }
    }

    pub fn resolver(&self) -> CrsResolver {
        let resolver = CrsResolver::new(self.min_confidence);
        match self.location_hint {
            Some((lon, lat)) => resolver.with_location_hint(lon, lat),
            None => resolver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_presets_parse() {
        for preset in PRESETS {
            let config = Config::from_preset(preset).unwrap();
            assert!(config.check().is_ok(), "preset={}", preset);
        }
        assert_eq!(Config::from_preset("default").unwrap(), Config::default());
        assert!(Config::from_preset("unknown").is_err());
    }

    #[test]
    fn test_strict_preset() {
        let config = Config::from_preset("strict").unwrap();
        let strategy = config.strategy();
        assert!(!strategy.accept_inferred_crs);
        assert!(strategy.fix_geometries);
        assert_eq!(config.resolver().min_confidence, 0.8);
    }

    #[test]
    fn test_merge_preset_strategy() {
        let strategy = Config::from_preset("merge").unwrap().strategy();
        assert!(strategy.merge);
        assert!(strategy.unify_crs);
        assert_eq!(strategy.target_crs, Some(Crs::epsg(4326)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_TARGET_CRS, "EPSG:3857"),
            (ENV_MIN_CONFIDENCE, "0.7"),
            (ENV_JOBS, "2"),
        ]);

        let mut config = Config::default();
        config
            .apply_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.target_crs.as_deref(), Some("EPSG:3857"));
        assert_eq!(config.min_confidence, 0.7);
        assert_eq!(config.jobs, Some(2));
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = Config::default();
        assert!(config
            .apply_vars(|key| (key == ENV_MIN_CONFIDENCE).then(|| "1.5".to_string()))
            .is_err());

        let mut config = Config::default();
        assert!(config
            .apply_vars(|key| (key == ENV_JOBS).then(|| "many".to_string()))
            .is_err());
    }

    #[test]
    fn test_location_hint_selects_utm() {
        use geolint_core::types::{Dataset, Feature};

        let dataset = Dataset::new(
            "utm",
            vec![
                Feature::new(geo::point!(x: 448000.0, y: 5411000.0)),
                Feature::new(geo::point!(x: 452000.0, y: 5415000.0)),
            ],
        );

        let crs = Config::default().resolver().resolve(&dataset).unwrap();
        assert_eq!(crs.code, Some(3857));

        let config: Config = serde_json::from_str(r#"{"location_hint": [2.35, 48.85]}"#).unwrap();
        let crs = config.resolver().resolve(&dataset).unwrap();
        assert_eq!(crs.code, Some(32631));
    }

    #[test]
    fn test_check_rejects_bad_values() {
        let config = Config {
            location_hint: Some((200.0, 10.0)),
            ..Default::default()
        };
        assert!(config.check().is_err());

        let config = Config {
            simplify_tolerance: Some(0.0),
            ..Default::default()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_unify_strategy_from_json() {
        let config: Config = serde_json::from_str(
            r#"{"unify_crs": true, "unify_strategy": "auto_detect", "simplify_tolerance": 0.5}"#,
        )
        .unwrap();
        let strategy = config.strategy();
        assert_eq!(strategy.unify_strategy, UnifyStrategy::AutoDetect);
        assert_eq!(strategy.repair_options().simplify_tolerance, Some(0.5));
        assert!(serde_json::from_str::<Config>(r#"{"unify_strategy": "majority"}"#).is_err());
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join("geolint_config_test.json");
        std::fs::write(&path, r#"{"merge": true, "target_crs": "EPSG:32631"}"#).unwrap();

        let config = Config::resolve(path.to_str().unwrap()).unwrap();
        assert!(config.merge);
        assert!(config.accept_inferred_crs);
        assert_eq!(config.strategy().target_crs, Some(Crs::epsg(32631)));

        std::fs::remove_file(path).ok();
    }
}
