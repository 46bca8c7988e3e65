use crate::core::{RepoError, Result};
use std::path::{Path, PathBuf};

pub const URL_SCHEME: &str = "memorepo://";

/// Storage connection configuration
///
/// Parsed from connection strings of the form
/// `memorepo://host/catalog[?backup_dir=/path]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Host name (informational for the in-memory engine)
    pub host: String,

    /// Initial catalog (database) name
    pub database: String,

    /// Directory used for backups issued without an explicit path
    pub backup_dir: PathBuf,
}

impl ConnectionConfig {
    /// Create a new configuration for `database` on localhost
    pub fn new(database: &str) -> Self {
        Self {
            host: "localhost".to_string(),
            database: database.to_string(),
            backup_dir: PathBuf::from("."),
        }
    }

    /// Set the host
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the default backup directory
    pub fn backup_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.backup_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Parse from connection string
    ///
    /// # Examples
    ///
    /// ```
    /// use memorepo::ConnectionConfig;
    ///
    /// let config = ConnectionConfig::from_url("memorepo://db.local/shop?backup_dir=/tmp").unwrap();
    /// assert_eq!(config.host, "db.local");
    /// assert_eq!(config.database, "shop");
    /// assert_eq!(config.backup_dir, std::path::PathBuf::from("/tmp"));
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url.trim().strip_prefix(URL_SCHEME).ok_or_else(|| {
            RepoError::Configuration(format!(
                "Connection string must start with '{}': {}",
                URL_SCHEME, url
            ))
        })?;

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };

        let (host, database) = location.split_once('/').ok_or_else(|| {
            RepoError::Configuration(format!("Connection string has no catalog: {}", url))
        })?;

        let mut config = Self::new(database.trim_end_matches('/'));
        if !host.is_empty() {
            config = config.host(host);
        }

        if let Some(query) = query {
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (name, value) = pair.split_once('=').ok_or_else(|| {
                    RepoError::Configuration(format!("Malformed connection option '{}'", pair))
                })?;
                match name {
                    "backup_dir" => config = config.backup_dir(unescape_option(value)?),
                    other => {
                        return Err(RepoError::Configuration(format!(
                            "Unknown connection option '{}'",
                            other
                        )));
                    }
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Connection string for this configuration
    pub fn to_url(&self) -> String {
        let mut url = format!("{}{}/{}", URL_SCHEME, self.host, self.database);
        if self.backup_dir != Path::new(".") {
            url.push_str("?backup_dir=");
            url.push_str(&escape_option(&self.backup_dir.to_string_lossy()));
        }
        url
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(RepoError::Configuration(
                "Catalog name cannot be empty".into(),
            ));
        }

        if self
            .database
            .chars()
            .any(|ch| ch.is_whitespace() || ch == '/' || ch == '\'')
        {
            return Err(RepoError::Configuration(format!(
                "Invalid catalog name '{}'",
                self.database
            )));
        }

        Ok(())
    }
}

/// Characters that delimit the option list; `%` escapes them.
const OPTION_RESERVED: &[char] = &['%', '?', '&', '=', '#'];

fn escape_option(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if OPTION_RESERVED.contains(&ch) {
            escaped.push_str(&format!("%{:02X}", ch as u32));
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

fn unescape_option(value: &str) -> Result<String> {
    let malformed = || RepoError::Configuration(format!("Malformed escape in option value '{}'", value));

    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = value.get(i + 1..i + 3).ok_or_else(malformed)?;
            decoded.push(u8::from_str_radix(hex, 16).map_err(|_| malformed())?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::new("shop");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.database, "shop");
        assert_eq!(config.backup_dir, PathBuf::from("."));
    }

    #[test]
    fn test_config_url_round_trip() {
        let config = ConnectionConfig::new("shop").host("db").backup_dir("/srv/backups");
        let parsed = ConnectionConfig::from_url(&config.to_url()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_backup_dir_with_reserved_characters_round_trips() {
        let config = ConnectionConfig::new("shop").backup_dir("/srv/a?b&c=d/100%");
        let url = config.to_url();
        assert_eq!(url, "memorepo://localhost/shop?backup_dir=/srv/a%3Fb%26c%3Dd/100%25");
        assert_eq!(ConnectionConfig::from_url(&url).unwrap(), config);
    }

    #[test]
    fn test_config_invalid_urls() {
        assert!(ConnectionConfig::from_url("postgres://localhost/shop").is_err());
        assert!(ConnectionConfig::from_url("memorepo://localhost").is_err());
        assert!(ConnectionConfig::from_url("memorepo://localhost/").is_err());
        assert!(ConnectionConfig::from_url("memorepo://localhost/shop?timeout=5").is_err());
        assert!(ConnectionConfig::from_url("memorepo://localhost/shop?backup_dir").is_err());
        assert!(ConnectionConfig::from_url("memorepo://localhost/shop?backup_dir=%G1").is_err());
    }
}
