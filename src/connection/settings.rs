use crate::core::{RepoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Connection key used when a service is built without one.
pub const DEFAULT_CONNECTION_KEY: &str = "DefaultConnection";

/// Named connection strings, the host configuration repositories resolve
/// their connection key against.
///
/// Deserializes from the usual settings-file shape:
///
/// ```json
/// { "ConnectionStrings": { "DefaultConnection": "memorepo://localhost/shop" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(rename = "ConnectionStrings", default)]
    connection_strings: BTreeMap<String, String>,
}

impl ConnectionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a named connection string.
    pub fn with_connection(mut self, key: impl Into<String>, connection_string: impl Into<String>) -> Self {
        self.connection_strings
            .insert(key.into(), connection_string.into());
        self
    }

    /// Settings with a single `DefaultConnection`.
    pub fn with_default(connection_string: impl Into<String>) -> Self {
        Self::new().with_connection(DEFAULT_CONNECTION_KEY, connection_string)
    }

    pub fn connection_string(&self, key: &str) -> Result<&str> {
        self.connection_strings
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| {
                RepoError::Configuration(format!("No connection string named '{}'", key))
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.connection_strings.keys().map(String::as_str)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RepoError::Configuration(format!("Invalid connection settings: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RepoError::Configuration(format!(
                "Cannot read connection settings '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_json() {
        let settings = ConnectionSettings::from_json_str(
            r#"{
                "ConnectionStrings": {
                    "DefaultConnection": "memorepo://localhost/shop",
                    "Reporting": "memorepo://localhost/reports"
                },
                "Logging": { "Level": "Info" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            settings.connection_string(DEFAULT_CONNECTION_KEY).unwrap(),
            "memorepo://localhost/shop"
        );
        assert_eq!(settings.keys().count(), 2);
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let settings = ConnectionSettings::new();
        assert!(matches!(
            settings.connection_string("Nope"),
            Err(RepoError::Configuration(_))
        ));
    }

    #[test]
    fn test_settings_from_missing_file() {
        assert!(ConnectionSettings::from_json_file("/definitely/not/here.json").is_err());
    }
}
