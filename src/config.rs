// ⚙️ Configuration
// TOML file → EtlConfig, with defaults for every field

use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    /// SQLite database file
    pub database: PathBuf,
    /// Accepted rows per store append
    pub batch_size: usize,
    /// Field delimiter of the input partitions (ASCII)
    pub delimiter: char,
    /// Rejections kept per load report
    pub rejection_sample: usize,
    /// Jurisdiction reference CSV
    pub reference: Option<PathBuf>,
    /// Write `monthly_summary` after aggregating
    pub summary_table_persist: bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            database: PathBuf::from("sales.db"),
            batch_size: 10_000,
            delimiter: ',',
            rejection_sample: 100,
            reference: None,
            summary_table_persist: true,
        }
    }
}

impl EtlConfig {
    /// Read a config file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                let config = Self::from_toml(&text).map_err(|e| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                debug!(path = %path.display(), "loaded config file");
                config
            }
            None => EtlConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be greater than 0".to_string()));
        }
        if !self.delimiter.is_ascii() || self.delimiter == '"' || self.delimiter == '\n' {
            return Err(ConfigError::Invalid(format!(
                "delimiter {:?} must be a single ASCII character other than quote or newline",
                self.delimiter
            )));
        }
        Ok(())
    }

    /// Builder: override the database path
    pub fn with_database(mut self, database: impl Into<PathBuf>) -> Self {
        self.database = database.into();
        self
    }

    /// Builder: override the reference path
    pub fn with_reference(mut self, reference: impl Into<PathBuf>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = EtlConfig::load(None).unwrap();

        assert_eq!(config, EtlConfig::default());
        assert_eq!(config.batch_size, 10_000);
        assert_eq!(config.delimiter, ',');
        assert!(config.summary_table_persist);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EtlConfig::from_toml("batch_size = 500\ndelimiter = \";\"\n").unwrap();

        assert_eq!(config.batch_size, 500);
        assert_eq!(config.delimiter, ';');
        assert_eq!(config.database, PathBuf::from("sales.db"));
        assert_eq!(config.reference, None);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(EtlConfig::from_toml("batchsize = 5\n").is_err());
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let config = EtlConfig {
            batch_size: 0,
            ..EtlConfig::default()
        };

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_non_ascii_delimiter_is_invalid() {
        let config = EtlConfig {
            delimiter: '§',
            ..EtlConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database = \"/tmp/iowa.db\"").unwrap();
        writeln!(file, "reference = \"counties.csv\"").unwrap();
        writeln!(file, "summary_table_persist = false").unwrap();

        let config = EtlConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.database, PathBuf::from("/tmp/iowa.db"));
        assert_eq!(config.reference, Some(PathBuf::from("counties.csv")));
        assert!(!config.summary_table_persist);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = EtlConfig::load(Some(Path::new("/nonexistent/etl.toml"))).unwrap_err();

        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_builder_overrides() {
        let config = EtlConfig::default()
            .with_database("other.db")
            .with_reference("ref.csv");

        assert_eq!(config.database, PathBuf::from("other.db"));
        assert_eq!(config.reference, Some(PathBuf::from("ref.csv")));
    }
}
