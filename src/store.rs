//! Notebook persistence with optimistic check-and-set.
//!
//! All ledger mutations of one engine invocation commit through a single
//! [`NotebookStore::save`] call, all-or-nothing. The save is conditional on
//! the revision the caller loaded: if another driver (a user action racing
//! the daily sweep) committed in between, the save fails with
//! [`SproutError::ConcurrentGenerationConflict`] instead of silently
//! double-applying the rollover.
//!
//! [`JsonFileStore`] keeps one JSON file per notebook, written via a lock
//! file, a temp file, and an atomic rename so a crash can never leave a
//! half-written record.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, SproutError};
use crate::notebook::{Notebook, NotebookId};

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Lock file suffix for concurrent access prevention.
const LOCK_SUFFIX: &str = ".lock";

/// Storage for notebook aggregates.
pub trait NotebookStore: Send + Sync {
    /// Persist a brand-new notebook.
    ///
    /// # Errors
    ///
    /// Returns [`SproutError::ConcurrentGenerationConflict`] if a notebook
    /// with the same id already exists.
    fn insert(&self, notebook: &Notebook) -> Result<()>;

    /// Load a notebook by id.
    ///
    /// # Errors
    ///
    /// Returns [`SproutError::NotebookNotFound`] for unknown ids.
    fn load(&self, id: NotebookId) -> Result<Notebook>;

    /// Conditionally persist a mutated notebook.
    ///
    /// The write succeeds only while the stored revision still equals
    /// `notebook.revision`; on success the revision is bumped both in the
    /// store and in the caller's copy.
    ///
    /// # Errors
    ///
    /// Returns [`SproutError::ConcurrentGenerationConflict`] when the
    /// check-and-set loses a race, [`SproutError::NotebookNotFound`] when
    /// the record disappeared.
    fn save(&self, notebook: &mut Notebook) -> Result<()>;

    /// All notebook ids known to the store, deleted ones included.
    fn list_ids(&self) -> Result<Vec<NotebookId>>;
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    notebooks: Mutex<HashMap<NotebookId, Notebook>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotebookStore for MemoryStore {
    fn insert(&self, notebook: &Notebook) -> Result<()> {
        let mut map = self.notebooks.lock().expect("store lock poisoned");
        if map.contains_key(&notebook.id) {
            return Err(SproutError::conflict(notebook.id));
        }
        map.insert(notebook.id, notebook.clone());
        Ok(())
    }

    fn load(&self, id: NotebookId) -> Result<Notebook> {
        self.notebooks
            .lock()
            .expect("store lock poisoned")
            .get(&id)
            .cloned()
            .ok_or_else(|| SproutError::notebook_not_found(id))
    }

    fn save(&self, notebook: &mut Notebook) -> Result<()> {
        let mut map = self.notebooks.lock().expect("store lock poisoned");
        let stored = map
            .get(&notebook.id)
            .ok_or_else(|| SproutError::notebook_not_found(notebook.id))?;
        if stored.revision != notebook.revision {
            return Err(SproutError::conflict(notebook.id));
        }
        notebook.revision += 1;
        map.insert(notebook.id, notebook.clone());
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<NotebookId>> {
        Ok(self
            .notebooks
            .lock()
            .expect("store lock poisoned")
            .keys()
            .copied()
            .collect())
    }
}

/// One-file-per-notebook JSON store with atomic, lock-guarded writes.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store over the given directory.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path to a notebook's file.
    #[must_use]
    pub fn notebook_path(&self, id: NotebookId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn tmp_path(&self, id: NotebookId) -> PathBuf {
        self.dir.join(format!("{id}.json{TMP_SUFFIX}"))
    }

    fn lock_path(&self, id: NotebookId) -> PathBuf {
        self.dir.join(format!("{id}.json{LOCK_SUFFIX}"))
    }

    fn acquire_lock(&self, id: NotebookId) -> Result<File> {
        fs::create_dir_all(&self.dir)?;
        let lock_file = File::create(self.lock_path(id))?;
        FileExt::lock_exclusive(&lock_file).map_err(|e| {
            SproutError::Other(anyhow::anyhow!("failed to acquire notebook lock: {e}"))
        })?;
        Ok(lock_file)
    }

    fn read(&self, id: NotebookId) -> Result<Notebook> {
        let path = self.notebook_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SproutError::notebook_not_found(id));
            }
            Err(e) => return Err(e.into()),
        };
        // A corrupted notebook is user data; surface the parse error
        // instead of deleting the file.
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, notebook: &Notebook) -> Result<()> {
        let tmp_path = self.tmp_path(notebook.id);
        let json = serde_json::to_string_pretty(notebook)?;

        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;

        fs::rename(&tmp_path, self.notebook_path(notebook.id))?;
        debug!(notebook = %notebook.id, revision = notebook.revision, "notebook persisted");
        Ok(())
    }
}

impl NotebookStore for JsonFileStore {
    fn insert(&self, notebook: &Notebook) -> Result<()> {
        let _lock = self.acquire_lock(notebook.id)?;
        if self.notebook_path(notebook.id).exists() {
            return Err(SproutError::conflict(notebook.id));
        }
        self.write(notebook)
    }

    fn load(&self, id: NotebookId) -> Result<Notebook> {
        if !self.notebook_path(id).exists() {
            return Err(SproutError::notebook_not_found(id));
        }
        let lock_path = self.lock_path(id);
        if lock_path.exists() {
            let lock_file = File::open(&lock_path)?;
            FileExt::lock_shared(&lock_file).map_err(|e| {
                SproutError::Other(anyhow::anyhow!("failed to acquire notebook lock: {e}"))
            })?;
        }
        self.read(id)
    }

    fn save(&self, notebook: &mut Notebook) -> Result<()> {
        let _lock = self.acquire_lock(notebook.id)?;
        let stored = self.read(notebook.id)?;
        if stored.revision != notebook.revision {
            return Err(SproutError::conflict(notebook.id));
        }
        notebook.revision += 1;
        self.write(notebook)
    }

    fn list_ids(&self) -> Result<Vec<NotebookId>> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(id) = NotebookId::parse(stem) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }
}
