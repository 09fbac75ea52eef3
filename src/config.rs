use crate::service::FriendshipMode;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG_FILTER: &str = "filmorate=debug,actix_web=info";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown value {value:?} for {key}, expected one of: {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Sled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub storage: StorageKind,
    /// Temporary database when unset.
    pub db_path: Option<PathBuf>,
    pub friendship: FriendshipMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: DEFAULT_BIND.to_owned(),
            storage: StorageKind::Memory,
            db_path: None,
            friendship: FriendshipMode::default(),
        }
    }
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Config::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Config::default();
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                "FILMORATE_BIND" => config.bind = value,
                "FILMORATE_STORAGE" => {
                    config.storage = match value.to_ascii_lowercase().as_str() {
                        "memory" => StorageKind::Memory,
                        "sled" => StorageKind::Sled,
                        _ => {
                            return Err(ConfigError::InvalidValue {
                                key: "FILMORATE_STORAGE",
                                value,
                                expected: "memory, sled",
                            })
                        }
                    }
                }
                "FILMORATE_DB_PATH" if !value.is_empty() => {
                    config.db_path = Some(PathBuf::from(value))
                }
                "FILMORATE_FRIENDSHIP" => {
                    config.friendship = match value.to_ascii_lowercase().as_str() {
                        "symmetric" => FriendshipMode::Symmetric,
                        "direct" => FriendshipMode::Direct,
                        "confirmation" => FriendshipMode::Confirmation,
                        _ => {
                            return Err(ConfigError::InvalidValue {
                                key: "FILMORATE_FRIENDSHIP",
                                value,
                                expected: "symmetric, direct, confirmation",
                            })
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(config)
    }
}
