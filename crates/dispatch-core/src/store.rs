//! File-backed JSON store with safe-default loads and atomic saves.
//!
//! `load` never fails: a missing file is a first run, and an unreadable or
//! malformed file is logged and replaced by the default value. `save` writes
//! through [`crate::io::atomic_write`] and reports failures as
//! [`DispatchError::StoreUnavailable`].

use crate::error::{DispatchError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// How a value was obtained by [`JsonStore::load_with_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Parsed from disk.
    Loaded,
    /// No file yet; default substituted.
    Missing,
    /// File present but unusable; default substituted.
    Recovered(String),
}

#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _value: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _value: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> T {
        self.load_with_outcome().0
    }

    pub fn load_with_outcome(&self) -> (T, LoadOutcome) {
        match self.try_load() {
            Ok(Some(value)) => (value, LoadOutcome::Loaded),
            Ok(None) => (T::default(), LoadOutcome::Missing),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    kind = e.kind(),
                    error = %e,
                    "state file unusable, starting from defaults"
                );
                (T::default(), LoadOutcome::Recovered(e.to_string()))
            }
        }
    }

    /// Strict load: `Ok(None)` when the file is absent or empty.
    pub fn try_load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data =
            std::fs::read_to_string(&self.path).map_err(|e| DispatchError::store(&self.path, e))?;
        if data.trim().is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str(&data).map_err(|e| DispatchError::store(&self.path, e))?;
        Ok(Some(value))
    }

    pub fn save(&self, value: &T) -> Result<()> {
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| DispatchError::store(&self.path, e))?;
        crate::io::atomic_write(&self.path, &data).map_err(|e| DispatchError::store(&self.path, e))
    }
}
