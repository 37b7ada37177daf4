// ⚙️ Pipeline configuration
//
// Loaded from an optional JSON file; every field has a default so a partial
// file is fine. Command-line flags are applied on top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::normalize::NationalityPolicy;
use crate::sources::SourceKind;

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite file holding every index.
    pub database: PathBuf,
    pub companies: Option<PathBuf>,
    pub business_names: Option<PathBuf>,
    pub tax_payers: Option<PathBuf>,
    /// Legislator CSV file (or a directory of them).
    pub wabunge: Option<PathBuf>,
    /// `postcode,region,district,ward` lookup table.
    pub postcodes: Option<PathBuf>,
    pub batch_size: usize,
    pub nationality: NationalityPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            database: PathBuf::from("registry.db"),
            companies: None,
            business_names: None,
            tax_payers: None,
            wabunge: None,
            postcodes: None,
            batch_size: DEFAULT_BATCH_SIZE,
            nationality: NationalityPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: PipelineConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than zero");
        }
        if self.nationality.default_label.trim().is_empty() {
            anyhow::bail!("nationality.default_label must not be empty");
        }
        Ok(())
    }

    /// Where records of `kind` are read from, if configured.
    pub fn source_root(&self, kind: SourceKind) -> Option<&Path> {
        match kind {
            SourceKind::Company => self.companies.as_deref(),
            SourceKind::BusinessName => self.business_names.as_deref(),
            SourceKind::TaxPayer => self.tax_payers.as_deref(),
            SourceKind::Legislator => self.wabunge.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(
            &path,
            r#"{"companies": "/data/brela/companies", "nationality": {"infer_from_identifier": false}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();

        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.database, PathBuf::from("registry.db"));
        assert_eq!(
            config.source_root(SourceKind::Company),
            Some(Path::new("/data/brela/companies"))
        );
        assert!(config.source_root(SourceKind::TaxPayer).is_none());
        assert!(!config.nationality.infer_from_identifier);
        assert_eq!(config.nationality.default_label, "Tanzanian");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, r#"{"batch_size": 0}"#).unwrap();

        assert!(PipelineConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(PipelineConfig::from_file("/nonexistent/pipeline.json").is_err());
    }
}
