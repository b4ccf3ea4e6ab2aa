use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, ErrorDetails};
use crate::exposition::ExpositionDocument;

/// A persistence boundary for exposition documents.
///
/// A scope owns a single opaque document and replaces it wholesale on every
/// write. Implementations backed by real storage must preserve the document's
/// full round-trip fidelity per call: `load` then mutate then `save` is not
/// atomic, and this crate assumes each call individually is.
pub trait Scope: Send + Sync {
    /// Returns the previously saved document, or `None` if nothing was ever
    /// saved under this scope.
    fn load(&self) -> Result<Option<ExpositionDocument>, Error>;

    /// Overwrites the stored document wholesale.
    fn save(&self, document: &ExpositionDocument) -> Result<(), Error>;

    /// Probes whether the backing medium can actually be written.
    fn is_available(&self) -> bool {
        true
    }
}

/// In-memory scope holding the document by reference. Always available.
#[derive(Debug, Default)]
pub struct MemoryScope {
    document: Mutex<Option<ExpositionDocument>>,
}

impl MemoryScope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scope for MemoryScope {
    fn load(&self) -> Result<Option<ExpositionDocument>, Error> {
        Ok(self
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, document: &ExpositionDocument) -> Result<(), Error> {
        *self
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(document.clone());
        Ok(())
    }
}

/// Device-persistent scope serializing the document as JSON text under a
/// single fixed path.
#[derive(Debug)]
pub struct FileScope {
    path: PathBuf,
}

impl FileScope {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Scope for FileScope {
    fn load(&self) -> Result<Option<ExpositionDocument>, Error> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::new(ErrorDetails::Storage {
                    message: format!("failed to read `{}`: {e}", self.path.display()),
                }))
            }
        };

        let document = serde_json::from_str(&text).map_err(|e| {
            Error::new(ErrorDetails::Storage {
                message: format!(
                    "failed to parse exposition document at `{}`: {e}",
                    self.path.display()
                ),
            })
        })?;

        Ok(Some(document))
    }

    fn save(&self, document: &ExpositionDocument) -> Result<(), Error> {
        let text = serde_json::to_string(document).map_err(|e| {
            Error::new(ErrorDetails::Storage {
                message: format!("failed to serialize exposition document: {e}"),
            })
        })?;

        std::fs::write(&self.path, text).map_err(|e| {
            Error::new(ErrorDetails::Storage {
                message: format!("failed to write `{}`: {e}", self.path.display()),
            })
        })
    }

    /// Write-probes the target directory, since permissions or a missing
    /// parent directory only surface on the first write.
    fn is_available(&self) -> bool {
        let probe = self.path.with_extension("probe");
        match std::fs::write(&probe, b"1") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                true
            }
            Err(_) => false,
        }
    }
}

/// How a test configuration designates its scope: the registry default, a
/// catalog entry by name, or a caller-supplied capability. Resolved once at
/// test declaration time, always through the availability fallback chain.
#[derive(Clone, Default)]
pub enum ScopeChoice {
    #[default]
    Default,
    Named(String),
    Custom(std::sync::Arc<dyn Scope>),
}

impl ScopeChoice {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn custom(scope: impl Scope + 'static) -> Self {
        Self::Custom(std::sync::Arc::new(scope))
    }
}

impl std::fmt::Debug for ScopeChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeChoice::Default => f.write_str("Default"),
            ScopeChoice::Named(name) => f.debug_tuple("Named").field(name).finish(),
            ScopeChoice::Custom(_) => f.debug_tuple("Custom").field(&"..").finish(),
        }
    }
}

/// Returns the first available scope in the list.
///
/// A scope that does not override `is_available` is always considered
/// available, so a chain ending in [`MemoryScope`] cannot fail.
pub(crate) fn first_available_scope(
    scopes: Vec<std::sync::Arc<dyn Scope>>,
) -> Result<std::sync::Arc<dyn Scope>, Error> {
    for scope in scopes {
        if scope.is_available() {
            return Ok(scope);
        }
    }
    Err(Error::new(ErrorDetails::Config {
        message: "no available scope provided".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposition::ExpositionManager;
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn test_memory_scope_round_trip() {
        let scope = MemoryScope::new();
        assert!(scope.load().unwrap().is_none());

        let manager = ExpositionManager::new("default");
        manager
            .register_exposition(&scope, "button-color", "red")
            .unwrap();

        let loaded = scope.load().unwrap().unwrap();
        assert_eq!(
            loaded
                .record("default", "button-color")
                .unwrap()
                .variant(),
            "red"
        );
    }

    #[test]
    fn test_memory_scope_is_always_available() {
        assert!(MemoryScope::new().is_available());
    }

    #[test]
    fn test_file_scope_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let scope = FileScope::new(dir.path().join("expositions.json"));
        assert!(scope.load().unwrap().is_none());

        let manager = ExpositionManager::new("default");
        manager
            .register_exposition(&scope, "button-color", "orange")
            .unwrap();

        // A second scope over the same path sees the same document.
        let reread = FileScope::new(dir.path().join("expositions.json"));
        let record = reread
            .load()
            .unwrap()
            .unwrap()
            .record("default", "button-color")
            .cloned()
            .unwrap();
        assert_eq!(record.variant(), "orange");
        assert!(record.recorded_at().unwrap() <= Utc::now());
    }

    #[test]
    fn test_file_scope_unwritable_directory_is_unavailable() {
        let scope = FileScope::new("/nonexistent-cohort-dir/expositions.json");
        assert!(!scope.is_available());
    }

    #[test]
    fn test_file_scope_rejects_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expositions.json");
        std::fs::write(&path, "{not json").unwrap();
        let scope = FileScope::new(path);
        assert!(scope.load().is_err());
    }

    #[test]
    fn test_first_available_scope_falls_back_to_memory() {
        let unavailable: Arc<dyn Scope> =
            Arc::new(FileScope::new("/nonexistent-cohort-dir/expositions.json"));
        let memory: Arc<dyn Scope> = Arc::new(MemoryScope::new());
        let chosen = first_available_scope(vec![unavailable, Arc::clone(&memory)]).unwrap();
        assert!(chosen.is_available());
        chosen.save(&ExpositionDocument::default()).unwrap();
        assert!(memory.load().unwrap().is_some());
    }
}
