//! Connection settings for the two databases.
//!
//! Credentials live in a dotenv-style file with one block of keys per side:
//!
//! ```text
//! SOURCE_HOST=db-primary
//! SOURCE_PORT=3306
//! SOURCE_USER=app
//! SOURCE_PASSWORD=secret
//! SOURCE_DATABASE=shop
//!
//! TARGET_HOST=db-replica
//! TARGET_USER=app
//! TARGET_PASSWORD=secret
//! TARGET_DATABASE=shop
//! ```
//!
//! The file is parsed in isolation; the process environment is never read
//! or modified.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;

/// Connection settings for one MySQL-family database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database (schema) name.
    pub database: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl DatabaseConfig {
    /// Returns `user@host:port/database`, safe for logs and script headers.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }

    fn from_values(values: &HashMap<String, String>, prefix: &str) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            values
                .get(&format!("{}_{}", prefix, name))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            get(name)
                .map(str::to_string)
                .ok_or_else(|| ConfigError::Missing(format!("{}_{}", prefix, name)))
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort {
                key: format!("{}_PORT", prefix),
                value: raw.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(DEFAULT_HOST).to_string(),
            port,
            user: required("USER")?,
            password: required("PASSWORD")?,
            database: required("DATABASE")?,
        })
    }
}

/// Both sides of a synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// The reference database.
    pub source: DatabaseConfig,
    /// The database to bring in line with the source.
    pub target: DatabaseConfig,
}

impl SyncConfig {
    /// Loads both configurations from a dotenv-style file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let parse_error = |source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        };
        let mut values = HashMap::new();
        for item in dotenvy::from_path_iter(path).map_err(parse_error)? {
            let (key, value) = item.map_err(parse_error)?;
            values.insert(key, value);
        }
        debug!(path = %path.display(), keys = values.len(), "Read config file");

        Ok(Self {
            source: DatabaseConfig::from_values(&values, "SOURCE")?,
            target: DatabaseConfig::from_values(&values, "TARGET")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const FULL: &str = "\
SOURCE_HOST=db-primary
SOURCE_PORT=3307
SOURCE_USER=app
SOURCE_PASSWORD=s3cret
SOURCE_DATABASE=shop

TARGET_USER=app
TARGET_PASSWORD=other
TARGET_DATABASE=shop_staging
";

    #[test]
    fn test_load_with_defaults() {
        let file = config_file(FULL);
        let config = SyncConfig::load(file.path()).unwrap();

        assert_eq!(
            config.source,
            DatabaseConfig {
                host: "db-primary".to_string(),
                port: 3307,
                user: "app".to_string(),
                password: "s3cret".to_string(),
                database: "shop".to_string(),
            }
        );
        assert_eq!(config.target.host, "localhost");
        assert_eq!(config.target.port, 3306);
        assert_eq!(config.target.display_name(), "app@localhost:3306/shop_staging");
    }

    #[test]
    fn test_missing_required_key() {
        let file = config_file(&FULL.replace("TARGET_PASSWORD=other\n", ""));
        let err = SyncConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "TARGET_PASSWORD"));
        assert_eq!(err.to_string(), "TARGET_PASSWORD is required in config file");
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let file = config_file(&FULL.replace("SOURCE_USER=app", "SOURCE_USER="));
        let err = SyncConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "SOURCE_USER"));
    }

    #[test]
    fn test_invalid_port() {
        let file = config_file(&FULL.replace("3307", "70000"));
        let err = SyncConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { ref value, .. } if value == "70000"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SyncConfig::load(&dir.path().join("absent.env")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let file = config_file(FULL);
        let config = SyncConfig::load(file.path()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }
}
