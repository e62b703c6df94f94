use serde_json::{Map, Value as JsonValue};
use std::{
    collections::{BTreeMap, HashMap},
    hash::BuildHasher,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::warn;

/// Read-only access to the shared key-value store written by the producer
/// application.
///
/// Implementations must never be written to by the widget.
pub trait ConfigStore: Send + Sync {
    /// The string stored under `key`, or `None` when it is absent.
    fn get_string(&self, key: &str) -> Option<String>;
}

impl<S: BuildHasher + Send + Sync> ConfigStore for HashMap<String, String, S> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigStore for BTreeMap<String, String> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to read preferences file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed preferences file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("preferences file {path} is not a JSON object")]
    NotAnObject { path: PathBuf },
}

/// Snapshot of a preferences file published by the producer application.
///
/// The file holds a single JSON object, e.g.
/// `{"map_image_path": "/data/user/0/app/cache/map.png"}`. Only string values
/// are visible through [`ConfigStore`].
#[derive(Debug, Clone, Default)]
pub struct PrefsFile {
    values: Map<String, JsonValue>,
}

impl PrefsFile {
    /// Load the preferences file at `path`.
    ///
    /// A file that does not exist yet is an empty store: the producer simply
    /// has not published anything.
    ///
    /// # Errors
    /// If the file cannot be read or does not contain a JSON object.
    pub fn load(path: &Path) -> Result<Self, PrefsError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(PrefsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(JsonValue::Object(values)) => Ok(Self { values }),
            Ok(_) => Err(PrefsError::NotAnObject {
                path: path.to_path_buf(),
            }),
            Err(source) => Err(PrefsError::Parse {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigStore for PrefsFile {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            JsonValue::String(value) => Some(value.clone()),
            JsonValue::Null => None,
            other => {
                warn!("Preference {} is not a string: {}", key, other);
                None
            }
        }
    }
}
