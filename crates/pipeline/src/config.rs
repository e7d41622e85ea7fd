//! Pipeline configuration.
//!
//! Every section defaults, so an empty file is a valid configuration:
//!
//! ```toml
//! store_timeout_ms = 5000
//!
//! [normalize.price_bands]
//! fallback_gap = 20000
//!
//! [scoring]
//! bought_weight = 5.0
//!
//! [diversity]
//! per_brand_cap = 3
//! total = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use phonefinder_query::NormalizeConfig;
use phonefinder_rerank::{DiversityConfig, RerankConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}.")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file at {path:?}.")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{message}")]
    Validation { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalize: NormalizeConfig,
    pub scoring: RerankConfig,
    pub diversity: DiversityConfig,
    /// Upper bound on the catalog store call
    pub store_timeout_ms: u64,
    /// Upper bound on appending the resolution record
    pub record_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            scoring: RerankConfig::default(),
            diversity: DiversityConfig::default(),
            store_timeout_ms: 10_000,
            record_timeout_ms: 2_000,
        }
    }
}

impl PipelineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn record_timeout(&self) -> Duration {
        Duration::from_millis(self.record_timeout_ms)
    }
}

pub fn load(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let cfg = parse(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    validate(&cfg)?;

    Ok(cfg)
}

fn parse(raw: &str) -> Result<PipelineConfig, toml::de::Error> {
    toml::from_str(raw)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}

pub fn validate(cfg: &PipelineConfig) -> Result<(), ConfigError> {
    let tiers = &cfg.normalize.price_bands.tiers;
    if tiers.windows(2).any(|pair| pair[0].up_to >= pair[1].up_to) {
        return Err(invalid(
            "normalize.price_bands.tiers must be in strictly ascending up_to order.",
        ));
    }

    if cfg.diversity.per_brand_cap == 0 {
        return Err(invalid("diversity.per_brand_cap must be greater than zero."));
    }
    if cfg.diversity.total == 0 {
        return Err(invalid("diversity.total must be greater than zero."));
    }

    let weights = [
        ("scoring.bought_weight", cfg.scoring.bought_weight),
        ("scoring.reviews_weight", cfg.scoring.reviews_weight),
        ("scoring.rating_weight", cfg.scoring.rating_weight),
        ("scoring.ram_weight", cfg.scoring.ram_weight),
        ("scoring.storage_weight", cfg.scoring.storage_weight),
    ];
    for (name, weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigError::Validation {
                message: format!("{} must be a finite number, zero or greater.", name),
            });
        }
    }

    if cfg.store_timeout_ms == 0 {
        return Err(invalid("store_timeout_ms must be greater than zero."));
    }
    if cfg.record_timeout_ms == 0 {
        return Err(invalid("record_timeout_ms must be greater than zero."));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonefinder_query::PriceTier;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(parse("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let cfg = parse(
            r#"
            store_timeout_ms = 5000

            [scoring]
            bought_weight = 5.0

            [diversity]
            per_brand_cap = 3

            [[normalize.price_bands.tiers]]
            up_to = 20000
            gap = 4000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.store_timeout_ms, 5000);
        assert_eq!(cfg.scoring.bought_weight, 5.0);
        assert_eq!(cfg.scoring.reviews_weight, 3.0);
        assert_eq!(cfg.diversity.per_brand_cap, 3);
        assert_eq!(cfg.diversity.total, 8);
        assert_eq!(
            cfg.normalize.price_bands.tiers,
            vec![PriceTier {
                up_to: 20000,
                gap: 4000
            }]
        );
        assert_eq!(cfg.normalize.price_bands.fallback_gap, 15000);
        validate(&cfg).unwrap();
    }

    #[test]
    fn test_rejects_unsorted_tiers() {
        let mut cfg = PipelineConfig::default();
        cfg.normalize.price_bands.tiers.reverse();
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_rejects_zero_cap_and_bad_weights() {
        let mut cfg = PipelineConfig::default();
        cfg.diversity.per_brand_cap = 0;
        assert!(validate(&cfg).is_err());

        let mut cfg = PipelineConfig::default();
        cfg.scoring.rating_weight = f64::NAN;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phonefinder.toml");
        std::fs::write(&path, "[diversity]\ntotal = 12\n").unwrap();

        assert_eq!(load(&path).unwrap().diversity.total, 12);
        assert!(matches!(
            load(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
