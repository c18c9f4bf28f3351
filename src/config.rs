//! Batch configuration, read from a TOML file.
//!
//! ```toml
//! data_dir = "/var/lib/bgp/verify"
//! output_dir = "results"
//! relationships = "20190601.as-rel.txt.bz2"
//! asns = [12350, 13030, 14537]
//! variants = ["full", "origin_only"]
//! max_traceback_hops = 255
//! threads = 8
//! ```
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{extrapolation::Variant, traceback::MAX_TRACEBACK_HOPS, Asn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding the `verify_ctrl_*` and `verify_data_*` tables.
    pub data_dir: PathBuf,
    /// Directory the per-variant result files are appended to.
    pub output_dir: PathBuf,
    /// CAIDA AS-relationship file, relative to `data_dir` unless absolute.
    pub relationships: PathBuf,
    /// Collector ASes to verify.
    pub asns: Vec<Asn>,
    pub variants: Vec<Variant>,
    pub max_traceback_hops: usize,
    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("results"),
            relationships: PathBuf::from("as-rel.txt"),
            asns: Vec::new(),
            variants: vec![Variant::Full, Variant::OriginOnly],
            max_traceback_hops: MAX_TRACEBACK_HOPS,
            threads: 0,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_traceback_hops == 0 {
            return Err(ConfigError::Invalid(
                "max_traceback_hops must be at least 1".to_string(),
            ));
        }
        if self.variants.is_empty() {
            return Err(ConfigError::Invalid("no variant selected".to_string()));
        }
        Ok(())
    }

    /// Result file of one variant.
    pub fn output_file(&self, variant: Variant) -> PathBuf {
        self.output_dir.join(format!("{variant}_verified.csv"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = toml::from_str("asns = [12350, 13030]").unwrap();

        assert_eq!(config.asns, vec![12350, 13030]);
        assert_eq!(config.variants, vec![Variant::Full, Variant::OriginOnly]);
        assert_eq!(config.max_traceback_hops, MAX_TRACEBACK_HOPS);
        assert_eq!(config.output_file(Variant::Full), PathBuf::from("results/full_verified.csv"));
    }

    #[test]
    fn full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verify.toml");
        fs::write(
            &path,
            r#"
data_dir = "/srv/bgp"
relationships = "as-rel.txt.bz2"
asns = [6453]
variants = ["no_propagation"]
max_traceback_hops = 64
threads = 4
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/bgp"));
        assert_eq!(config.variants, vec![Variant::NoPropagation]);
        assert_eq!(config.max_traceback_hops, 64);
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn invalid_config() {
        assert!(toml::from_str::<Config>("variants = [\"everything\"]").is_err());
        assert!(toml::from_str::<Config>("colour = true").is_err());

        let config: Config = toml::from_str("max_traceback_hops = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        assert!(matches!(
            Config::from_file("/nonexistent/verify.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
