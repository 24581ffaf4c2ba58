//! Configuration module
//!
//! Worker settings are read from the environment (after loading `.env` if
//! present). Every value has a default except the ones the selected storage
//! backend needs, which `validate` checks.

use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::catalog::{CatalogError, VariantCatalog};
use crate::constants::{
    DEFAULT_CACHE_CONTROL, DEFAULT_MAX_CONCURRENT_UPLOADS, DEFAULT_MAX_SOURCE_PIXELS,
};
use crate::storage_types::StorageBackend;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("{0} is not configured")]
    Missing(&'static str),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::Invalid {
                name: "LOG_FORMAT",
                value: s.to_string(),
            }),
        }
    }
}

/// Derivative worker configuration
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub storage_backend: StorageBackend,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, etc.)
    pub local_storage_path: Option<String>,
    pub max_concurrent_encodes: usize,
    pub max_concurrent_uploads: usize,
    pub max_source_pixels: u64,
    pub cache_control: String,
    pub variant_catalog_path: Option<String>,
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::S3,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            max_concurrent_encodes: default_encode_parallelism(),
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            max_source_pixels: DEFAULT_MAX_SOURCE_PIXELS,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            variant_catalog_path: None,
            log_format: LogFormat::Text,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let storage_backend = match non_empty("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.storage_backend,
        };

        let log_format = match non_empty("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            storage_backend,
            s3_region: non_empty("S3_REGION").or_else(|| non_empty("AWS_REGION")),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            local_storage_path: non_empty("LOCAL_STORAGE_PATH"),
            max_concurrent_encodes: parse_number(
                "MAX_CONCURRENT_ENCODES",
                non_empty("MAX_CONCURRENT_ENCODES"),
                defaults.max_concurrent_encodes,
            )?,
            max_concurrent_uploads: parse_number(
                "MAX_CONCURRENT_UPLOADS",
                non_empty("MAX_CONCURRENT_UPLOADS"),
                defaults.max_concurrent_uploads,
            )?,
            max_source_pixels: parse_number(
                "MAX_SOURCE_PIXELS",
                non_empty("MAX_SOURCE_PIXELS"),
                defaults.max_source_pixels,
            )?,
            cache_control: non_empty("DERIVATIVE_CACHE_CONTROL").unwrap_or(defaults.cache_control),
            variant_catalog_path: non_empty("VARIANT_CATALOG_PATH"),
            log_format,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_encodes == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_ENCODES",
                value: "0".to_string(),
            });
        }
        if self.max_concurrent_uploads == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_UPLOADS",
                value: "0".to_string(),
            });
        }
        match self.storage_backend {
            StorageBackend::S3 if self.s3_region.is_none() => {
                Err(ConfigError::Missing("S3_REGION or AWS_REGION"))
            }
            StorageBackend::Local if self.local_storage_path.is_none() => {
                Err(ConfigError::Missing("LOCAL_STORAGE_PATH"))
            }
            _ => Ok(()),
        }
    }

    /// The configured catalog, or the built-in table when no path is set.
    pub fn load_catalog(&self) -> Result<VariantCatalog, ConfigError> {
        match &self.variant_catalog_path {
            Some(path) => Ok(VariantCatalog::from_json_file(path)?),
            None => Ok(VariantCatalog::standard()),
        }
    }
}

fn parse_number<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

fn default_encode_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::S3);
        assert_eq!(config.cache_control, "public, max-age=31536000");
        assert_eq!(config.max_concurrent_uploads, 10);
        assert!(config.max_concurrent_encodes >= 1);
        assert_eq!(config.log_format, LogFormat::Text);
        // S3 without a region is not usable.
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_region_falls_back_to_aws_region() {
        let config = WorkerConfig::from_lookup(lookup(&[("AWS_REGION", "eu-west-1")])).unwrap();
        assert_eq!(config.s3_region.as_deref(), Some("eu-west-1"));
        assert!(config.validate().is_ok());

        let config = WorkerConfig::from_lookup(lookup(&[
            ("AWS_REGION", "eu-west-1"),
            ("S3_REGION", "us-east-2"),
        ]))
        .unwrap();
        assert_eq!(config.s3_region.as_deref(), Some("us-east-2"));
    }

    #[test]
    fn test_local_backend_requires_path() {
        let config = WorkerConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "local")])).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("LOCAL_STORAGE_PATH"))
        ));

        let config = WorkerConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/prism"),
        ]))
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let result = WorkerConfig::from_lookup(lookup(&[("MAX_CONCURRENT_UPLOADS", "many")]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "MAX_CONCURRENT_UPLOADS",
                ..
            })
        ));

        let config = WorkerConfig::from_lookup(lookup(&[
            ("AWS_REGION", "eu-west-1"),
            ("MAX_CONCURRENT_ENCODES", "0"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("MAX_CONCURRENT_ENCODES", "3"),
            ("MAX_SOURCE_PIXELS", "1000"),
            ("DERIVATIVE_CACHE_CONTROL", "no-cache"),
            ("LOG_FORMAT", "json"),
            ("S3_ENDPOINT", "http://localhost:9000"),
        ]))
        .unwrap();
        assert_eq!(config.max_concurrent_encodes, 3);
        assert_eq!(config.max_source_pixels, 1000);
        assert_eq!(config.cache_control, "no-cache");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.s3_endpoint.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = WorkerConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "  ")])).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::S3);
    }

    #[test]
    fn test_load_catalog_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.load_catalog().unwrap(), VariantCatalog::standard());
    }
}
