//! Accessor builder for programmatic and environment-based configuration.
//!
//! # Examples
//!
//! ## From Environment
//!
//! ```ignore
//! use ordkv::builder::AccessorBuilder;
//! use std::env;
//!
//! env::set_var("ORDKV_BACKEND", "sled");
//! env::set_var("ORDKV_PATH", "/tmp/ordkv");
//!
//! let store = AccessorBuilder::from_env()?.build()?;
//! ```
//!
//! ## Programmatic
//!
//! ```
//! use ordkv::{builder::AccessorBuilder, config::BackendKind};
//!
//! let store = AccessorBuilder::new().backend(BackendKind::Memory).build().unwrap();
//! store.set_value("greeting", "hello").unwrap();
//! assert_eq!(store.value::<String>("greeting").as_deref(), Some("hello"));
//! ```

use crate::{
    Accessor, AccessorHandle, AccessorResult, AccessorTask, CodecHooks, LazyValue, ScanRequest,
    config::{
        BackendKind, ConfigError, ENV_CACHE_CAPACITY, ENV_NAME, ENV_PATH, optional_var,
    },
};
use ordkv_sled::{DatabaseArguments, SledConnector, SledKv};
use ordkv_store::mem::MemKv;
use serde::{Serialize, de::DeserializeOwned};
use std::{ops::ControlFlow, path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Accessor returned by the builder.
///
/// The backend is chosen at runtime, so the accessor comes wrapped in this
/// enum. The common operations are forwarded. Match on the variants for the
/// rest.
#[derive(Debug)]
pub enum StoreInstance {
    /// Accessor over an in-memory store.
    Memory(Accessor<MemKv>),
    /// Accessor over a sled database.
    Sled(Accessor<SledKv>),
}

macro_rules! forward {
    ($self:expr, $accessor:ident => $body:expr) => {
        match $self {
            StoreInstance::Memory($accessor) => $body,
            StoreInstance::Sled($accessor) => $body,
        }
    };
}

impl StoreInstance {
    /// The backend kind.
    pub const fn backend(&self) -> BackendKind {
        match self {
            Self::Memory(_) => BackendKind::Memory,
            Self::Sled(_) => BackendKind::Sled,
        }
    }

    /// Get the in-memory accessor, if that is the backend.
    pub const fn as_memory(&self) -> Option<&Accessor<MemKv>> {
        match self {
            Self::Memory(accessor) => Some(accessor),
            Self::Sled(_) => None,
        }
    }

    /// Get the sled accessor, if that is the backend.
    pub const fn as_sled(&self) -> Option<&Accessor<SledKv>> {
        match self {
            Self::Sled(accessor) => Some(accessor),
            Self::Memory(_) => None,
        }
    }

    /// Store `value` under `key`. See [`Accessor::set_value`].
    pub fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> AccessorResult<()> {
        forward!(self, a => a.set_value(key, value))
    }

    /// Read the value under `key`. See [`Accessor::value`].
    pub fn value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        forward!(self, a => a.value(key))
    }

    /// True if a value is stored under `key`.
    pub fn value_exists(&self, key: &str) -> bool {
        forward!(self, a => a.value_exists(key))
    }

    /// Remove the value under `key`.
    pub fn remove_value(&self, key: &str) -> AccessorResult<()> {
        forward!(self, a => a.remove_value(key))
    }

    /// Remove every value whose key starts with `prefix`.
    pub fn remove_all_values_with_prefix(&self, prefix: &str) -> AccessorResult<()> {
        forward!(self, a => a.remove_all_values_with_prefix(prefix))
    }

    /// Every key, in ascending order.
    pub fn all_keys(&self) -> Vec<String> {
        forward!(self, a => a.all_keys())
    }

    /// Visit keys in scan order.
    pub fn enumerate_keys<F>(&self, request: ScanRequest<'_>, f: F)
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        forward!(self, a => a.enumerate_keys(request, f))
    }

    /// Visit keys and decoded values in scan order.
    pub fn enumerate_keys_and_values<T, F>(&self, request: ScanRequest<'_>, f: F)
    where
        T: DeserializeOwned,
        F: FnMut(&str, T) -> ControlFlow<()>,
    {
        forward!(self, a => a.enumerate_keys_and_values(request, f))
    }

    /// Visit keys with lazily decoded values in scan order.
    pub fn enumerate_keys_and_values_lazily<T, F>(&self, request: ScanRequest<'_>, f: F)
    where
        T: DeserializeOwned,
        F: FnMut(&str, LazyValue<'_, T>) -> ControlFlow<()>,
    {
        forward!(self, a => a.enumerate_keys_and_values_lazily(request, f))
    }

    /// Release the store handle.
    pub fn close(&self) {
        forward!(self, a => a.close())
    }

    /// Move the accessor onto a background task and return its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self, cancel_token: CancellationToken) -> AccessorHandle {
        match self {
            Self::Memory(accessor) => AccessorTask::spawn(accessor, cancel_token),
            Self::Sled(accessor) => AccessorTask::spawn(accessor, cancel_token),
        }
    }
}

/// Builder for accessors.
///
/// Supports both programmatic configuration and loading from environment
/// variables. Use [`from_env`](Self::from_env) to load from the environment
/// or [`new`](Self::new) for programmatic configuration.
pub struct AccessorBuilder {
    backend: Option<BackendKind>,
    path: Option<PathBuf>,
    name: Option<String>,
    cache_capacity: Option<u64>,
    db_args: Option<DatabaseArguments>,
    hooks: Option<Arc<dyn CodecHooks>>,
}

impl core::fmt::Debug for AccessorBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessorBuilder")
            .field("backend", &self.backend)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("cache_capacity", &self.cache_capacity)
            .finish_non_exhaustive()
    }
}

impl Default for AccessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessorBuilder {
    /// Create a new builder.
    pub const fn new() -> Self {
        Self { backend: None, path: None, name: None, cache_capacity: None, db_args: None, hooks: None }
    }

    /// Create a builder from environment variables.
    ///
    /// Reads configuration from:
    /// - `ORDKV_BACKEND`: backend selection
    /// - `ORDKV_PATH`: database directory (sled only)
    /// - `ORDKV_NAME`: keyspace tree name (optional)
    /// - `ORDKV_CACHE_CAPACITY`: page cache size in bytes (optional)
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = BackendKind::from_env()?;
        let mut builder = Self::new().backend(backend);

        match backend {
            BackendKind::Memory => {}
            BackendKind::Sled => {
                let path = optional_var(ENV_PATH)
                    .ok_or(ConfigError::MissingPath { backend, env_var: ENV_PATH })?;
                builder = builder.path(path);
            }
        }

        if let Some(name) = optional_var(ENV_NAME) {
            builder = builder.name(name);
        }
        if let Some(capacity) = optional_var(ENV_CACHE_CAPACITY) {
            let capacity =
                capacity.parse().map_err(|_| ConfigError::InvalidCacheCapacity(capacity))?;
            builder = builder.cache_capacity(capacity);
        }

        Ok(builder)
    }

    /// Set the backend.
    #[must_use]
    pub const fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the database directory.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the name of the tree holding the keyspace.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the page cache size in bytes. Overrides the value in
    /// [`db_args`](Self::db_args).
    #[must_use]
    pub const fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = Some(bytes);
        self
    }

    /// Set custom database arguments for the sled backend.
    ///
    /// If not set, default arguments are used.
    #[must_use]
    pub fn db_args(mut self, args: DatabaseArguments) -> Self {
        self.db_args = Some(args);
        self
    }

    /// Install codec hooks on the built accessor.
    #[must_use]
    pub fn hooks(mut self, hooks: impl CodecHooks + 'static) -> Self {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    /// The sled connector this builder would open. `None` unless the
    /// backend is sled and a path is set.
    pub fn connector(&self) -> Option<SledConnector> {
        if self.backend != Some(BackendKind::Sled) {
            return None;
        }
        let path = self.path.clone()?;

        let mut args = self.db_args.clone().unwrap_or_default().with_cache_capacity(self.cache_capacity);
        if let Some(name) = &self.name {
            args = args.with_tree(name.clone());
        }
        Some(SledConnector::new(path).with_db_args(args))
    }

    /// Open the configured store.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if no backend is set, or the sled backend
    /// has no path, and a store error if the database fails to open.
    pub fn build(self) -> AccessorResult<StoreInstance> {
        let backend = self.backend.ok_or(ConfigError::MissingBackend)?;
        let instance = match backend {
            BackendKind::Memory => StoreInstance::Memory(Accessor::new(MemKv::new())),
            BackendKind::Sled => {
                let connector = self
                    .connector()
                    .ok_or(ConfigError::MissingPath { backend, env_var: ENV_PATH })?;
                StoreInstance::Sled(Accessor::open(&connector)?)
            }
        };

        if let Some(hooks) = self.hooks {
            forward!(&instance, a => a.set_hooks(hooks));
        }
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessorError, config::ENV_BACKEND};
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        // SAFETY: env-mutating tests are serialized
        unsafe {
            for var in [ENV_BACKEND, ENV_PATH, ENV_NAME, ENV_CACHE_CAPACITY] {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn builder_requires_backend() {
        let result = AccessorBuilder::new().build();
        assert!(matches!(result, Err(AccessorError::Config(ConfigError::MissingBackend))));
    }

    #[test]
    fn builder_requires_sled_path() {
        let result = AccessorBuilder::new().backend(BackendKind::Sled).build();
        assert!(matches!(result, Err(AccessorError::Config(ConfigError::MissingPath { .. }))));
    }

    #[test]
    fn builder_opens_sled() {
        let dir = tempfile::tempdir().unwrap();
        let instance = AccessorBuilder::new()
            .backend(BackendKind::Sled)
            .path(dir.path())
            .name("accounts")
            .cache_capacity(1 << 20)
            .build()
            .unwrap();
        assert_eq!(instance.backend(), BackendKind::Sled);
        assert!(instance.as_sled().is_some());
        instance.set_value("k", &1u8).unwrap();
        assert_eq!(instance.value::<u8>("k"), Some(1));
    }

    #[test]
    fn connector_uses_name_as_tree() {
        let connector = AccessorBuilder::new()
            .backend(BackendKind::Sled)
            .path("/tmp/ordkv")
            .name("events")
            .connector()
            .unwrap();
        assert_eq!(connector.db_args().tree(), "events");
        assert!(AccessorBuilder::new().backend(BackendKind::Memory).connector().is_none());
    }

    #[test]
    #[serial]
    fn from_env_missing_backend() {
        clear_env();
        assert!(matches!(AccessorBuilder::from_env(), Err(ConfigError::MissingEnvVar(ENV_BACKEND))));
    }

    #[test]
    #[serial]
    fn from_env_sled_missing_path() {
        clear_env();
        // SAFETY: env-mutating tests are serialized
        unsafe {
            env::set_var(ENV_BACKEND, "sled");
        }
        assert!(matches!(AccessorBuilder::from_env(), Err(ConfigError::MissingPath { .. })));
        clear_env();
    }

    #[test]
    #[serial]
    fn from_env_sled_valid() {
        clear_env();
        // SAFETY: env-mutating tests are serialized
        unsafe {
            env::set_var(ENV_BACKEND, "sled");
            env::set_var(ENV_PATH, "/tmp/ordkv");
            env::set_var(ENV_NAME, "events");
            env::set_var(ENV_CACHE_CAPACITY, "1048576");
        }

        let builder = AccessorBuilder::from_env().unwrap();
        assert_eq!(builder.backend, Some(BackendKind::Sled));
        assert_eq!(builder.path, Some(PathBuf::from("/tmp/ordkv")));
        assert_eq!(builder.name.as_deref(), Some("events"));
        assert_eq!(builder.cache_capacity, Some(1_048_576));
        clear_env();
    }

    #[test]
    #[serial]
    fn from_env_invalid_cache_capacity() {
        clear_env();
        // SAFETY: env-mutating tests are serialized
        unsafe {
            env::set_var(ENV_BACKEND, "memory");
            env::set_var(ENV_CACHE_CAPACITY, "lots");
        }
        assert!(matches!(
            AccessorBuilder::from_env(),
            Err(ConfigError::InvalidCacheCapacity(v)) if v == "lots"
        ));
        clear_env();
    }
}
