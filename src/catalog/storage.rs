use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
#[cfg(test)]
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Categories,
    Products,
    Brands,
}

impl StoreKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            StoreKind::Categories => "arvore_categorias.json",
            StoreKind::Products => "products.json",
            StoreKind::Brands => "marcas.json",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{store} is not valid JSON: {source}")]
    Decode {
        store: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {store}: {source}")]
    Encode {
        store: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[cfg(test)]
    #[error("storage backend unavailable: {0}")]
    Backend(String),
}

pub trait StorageBackend {
    /// Returns `None` when the document has never been written.
    fn read(&self, kind: StoreKind) -> Result<Option<String>, StoreError>;
    fn write(&self, kind: StoreKind, contents: &str) -> Result<(), StoreError>;
}

/// One JSON file per store inside a database directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Creates `dir` if it does not exist yet.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn path(&self, kind: StoreKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, kind: StoreKind) -> Result<Option<String>, StoreError> {
        let path = self.path(kind);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path, err)),
        }
    }

    fn write(&self, kind: StoreKind, contents: &str) -> Result<(), StoreError> {
        let path = self.path(kind);
        // Write-then-rename so an interrupted run never leaves half a document.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, contents).map_err(|err| io_error(&staging, err))?;
        fs::rename(&staging, &path).map_err(|err| io_error(&path, err))
    }
}

/// Keeps documents in memory. Clones share the same documents, so a caller
/// can keep a handle to inspect what the catalog flushed.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    documents: Arc<Mutex<HashMap<StoreKind, String>>>,
}

#[cfg(test)]
impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, kind: StoreKind, contents: impl Into<String>) -> Self {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(kind, contents.into());
        }
        self
    }

    pub fn document(&self, kind: StoreKind) -> Option<String> {
        self.documents
            .lock()
            .ok()
            .and_then(|documents| documents.get(&kind).cloned())
    }
}

#[cfg(test)]
impl StorageBackend for MemoryBackend {
    fn read(&self, kind: StoreKind) -> Result<Option<String>, StoreError> {
        let documents = self
            .documents
            .lock()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(documents.get(&kind).cloned())
    }

    fn write(&self, kind: StoreKind, contents: &str) -> Result<(), StoreError> {
        let mut documents = self
            .documents
            .lock()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        documents.insert(kind, contents.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_backend_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FileBackend::open(dir.path().join("database")).expect("open");
        assert!(backend.read(StoreKind::Brands).unwrap().is_none());

        backend
            .write(StoreKind::Brands, "{\"marcas\": []}")
            .expect("write");
        assert_eq!(
            backend.read(StoreKind::Brands).unwrap().as_deref(),
            Some("{\"marcas\": []}")
        );
        assert!(dir.path().join("database").join("marcas.json").exists());
        assert!(!dir.path().join("database").join("marcas.json.tmp").exists());
    }

    #[test]
    fn memory_backend_clones_share_documents() {
        let backend = MemoryBackend::new();
        let handle = backend.clone();
        backend.write(StoreKind::Products, "{}").unwrap();
        assert_eq!(handle.document(StoreKind::Products).as_deref(), Some("{}"));
        assert!(handle.document(StoreKind::Categories).is_none());
    }
}
