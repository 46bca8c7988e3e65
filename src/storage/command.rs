use crate::core::{RepoError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref BACKUP_PATTERN: Regex = Regex::new(
        r"(?i)^\s*BACKUP\s+DATABASE\s+(\S+)\s+TO\s+DISK\s*=\s*'((?:[^']|'')*)'\s*;?\s*$"
    )
    .expect("backup command pattern is valid");
}

/// Raw commands understood by the in-memory engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCommand {
    Backup { catalog: String, path: PathBuf },
}

impl StorageCommand {
    pub fn parse(command: &str) -> Result<Self> {
        if let Some(caps) = BACKUP_PATTERN.captures(command) {
            return Ok(Self::Backup {
                catalog: caps[1].to_string(),
                path: PathBuf::from(caps[2].replace("''", "'")),
            });
        }

        Err(RepoError::Storage(format!(
            "Unsupported command: {}",
            command
        )))
    }
}

/// Renders the backup statement for `catalog` and `path`.
///
/// Format: `BACKUP DATABASE {catalog} TO DISK = '{path}'`
pub fn backup_command(catalog: &str, path: &Path) -> String {
    format!(
        "BACKUP DATABASE {} TO DISK = '{}'",
        catalog,
        sql_escape_string(&path.to_string_lossy())
    )
}

/// Escapes a string for inclusion in a quoted literal.
pub fn sql_escape_string(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_command_text() {
        assert_eq!(
            backup_command("shop", Path::new("/var/backups/shop.bak")),
            "BACKUP DATABASE shop TO DISK = '/var/backups/shop.bak'"
        );
    }

    #[test]
    fn test_parse_backup_unescapes_quotes() {
        let command = backup_command("shop", Path::new("/tmp/o'neil.bak"));
        assert_eq!(
            StorageCommand::parse(&command).unwrap(),
            StorageCommand::Backup {
                catalog: "shop".to_string(),
                path: PathBuf::from("/tmp/o'neil.bak"),
            }
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let parsed = StorageCommand::parse("backup database shop to disk = 'a.bak';").unwrap();
        assert!(matches!(parsed, StorageCommand::Backup { .. }));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(matches!(
            StorageCommand::parse("DROP DATABASE shop"),
            Err(RepoError::Storage(_))
        ));
    }
}
