//! Runtime configuration.

use std::env;
use std::path::PathBuf;

/// The database environment override, checked when no `--db` flag is given.
pub const DB_ENV_VAR: &str = "BARROW_DB";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
}

impl Config {
    /// Resolve the database location: explicit flag, then `$BARROW_DB`,
    /// then `~/.barrow.db`.
    pub fn resolve(flag: Option<PathBuf>) -> Self {
        let database_path = flag
            .or_else(|| env::var_os(DB_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| {
                env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".barrow.db")
            });
        Self { database_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins() {
        let config = Config::resolve(Some(PathBuf::from("/tmp/explicit.db")));
        assert_eq!(config.database_path, PathBuf::from("/tmp/explicit.db"));
    }

    #[test]
    fn default_is_in_home() {
        if env::var_os(DB_ENV_VAR).is_some() {
            return;
        }
        let config = Config::resolve(None);
        assert!(config.database_path.ends_with(".barrow.db"));
    }
}
