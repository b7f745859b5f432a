//! Backend selection and environment parsing.
//!
//! # Environment Variables
//!
//! | Variable | Description | Required When |
//! |----------|-------------|---------------|
//! | `ORDKV_BACKEND` | Backend kind (`memory`, `sled`) | Always |
//! | `ORDKV_PATH` | Directory of the sled database | `backend=sled` |
//! | `ORDKV_NAME` | Tree holding the keyspace | Never |
//! | `ORDKV_CACHE_CAPACITY` | sled page cache size in bytes | Never |
//!
//! # Example
//!
//! ```rust
//! use ordkv::config::BackendKind;
//! use std::env;
//!
//! let kind: BackendKind = "sled".parse().unwrap();
//! assert!(matches!(kind, BackendKind::Sled));
//!
//! unsafe {
//!     env::set_var("ORDKV_BACKEND", "memory");
//! }
//! let kind = BackendKind::from_env().unwrap();
//! assert!(matches!(kind, BackendKind::Memory));
//! # unsafe { env::remove_var("ORDKV_BACKEND"); }
//! ```

use std::{env, fmt, str::FromStr};
use thiserror::Error;

/// Environment variable name for backend selection.
pub const ENV_BACKEND: &str = "ORDKV_BACKEND";

/// Environment variable name for the database directory.
pub const ENV_PATH: &str = "ORDKV_PATH";

/// Environment variable name for the keyspace tree.
pub const ENV_NAME: &str = "ORDKV_NAME";

/// Environment variable name for the page cache size.
pub const ENV_CACHE_CAPACITY: &str = "ORDKV_CACHE_CAPACITY";

/// The store engine behind an accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Process-local `BTreeMap`. Nothing is persisted.
    Memory,
    /// On-disk sled database.
    Sled,
}

impl BackendKind {
    /// Load the backend kind from the `ORDKV_BACKEND` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if the variable is not set, or
    /// [`ConfigError::InvalidBackend`] if it cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let value = env::var(ENV_BACKEND).map_err(|_| ConfigError::MissingEnvVar(ENV_BACKEND))?;
        value.parse()
    }

    /// True if the backend persists data.
    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Sled)
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "sled" => Ok(Self::Sled),
            _ => Err(ConfigError::InvalidBackend(s.to_owned())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Sled => write!(f, "sled"),
        }
    }
}

/// Read an optional variable, treating empty values as unset.
pub(crate) fn optional_var(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// No backend was selected.
    #[error("no backend selected")]
    MissingBackend,

    /// Invalid backend string.
    #[error("invalid backend: {0} (expected: memory, sled)")]
    InvalidBackend(String),

    /// Missing required path for the selected backend.
    #[error("missing required path for backend {backend}: environment variable {env_var} not set")]
    MissingPath {
        /// The backend that requires the path.
        backend: BackendKind,
        /// The environment variable name.
        env_var: &'static str,
    },

    /// The cache capacity is not a byte count.
    #[error("invalid cache capacity: {0}")]
    InvalidCacheCapacity(String),
}
