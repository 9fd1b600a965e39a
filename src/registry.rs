//! Multi-database registry.
//!
//! Each database is an independent [`DocumentStore`] with its own
//! relational file and vector index. The registry records which databases
//! exist and which one is active in a `registry.json` file under the
//! storage root:
//!
//! ```text
//! data/
//!   registry.json
//!   default/
//!     documents.sqlite
//!     vectors.sqlite
//!   db_3f2a91c0/
//!     documents.sqlite
//!     vectors.sqlite
//! ```
//!
//! The file is rewritten atomically (temp file + rename) on every change,
//! and in-memory state only moves once the write has succeeded.
//! Opening a registry for the first time creates a `default` database
//! named "My Documents" and makes it active.
//!
//! # Active database
//!
//! Callers reach the active store through [`Registry::active`], which holds
//! the read side of a lock for as long as the returned guard lives.
//! [`Registry::activate`] takes the write side, so a switch waits for every
//! in-flight operation on the previous database to finish.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use docshelf_core::cluster::{index_by_name, ClusterEngine};
use docshelf_core::embedding::EmbeddingProvider;
use docshelf_core::models::{now_millis, Database, Document};
use docshelf_core::store::memory::{InMemoryRelationalStore, InMemoryVectorIndex};
use docshelf_core::{ShelfError, ShelfResult};

use crate::config::Config;
use crate::document_store::DocumentStore;

pub const REGISTRY_FILE: &str = "registry.json";
pub const DEFAULT_DATABASE_ID: &str = "default";
pub const DEFAULT_DATABASE_NAME: &str = "My Documents";

// ═══════════════════════════════════════════════════════════════════════
// Openers
// ═══════════════════════════════════════════════════════════════════════

/// Creates, opens, and removes the storage behind one database.
#[async_trait]
pub trait DatabaseOpener: Send + Sync {
    /// Open (creating if needed) the store for `database`.
    async fn open(&self, database: &Database) -> Result<DocumentStore>;

    /// Remove every trace of `database_id` from storage.
    async fn remove(&self, database_id: &str) -> Result<()>;
}

/// SQLite-backed databases, one directory each under `root`.
pub struct SqliteOpener {
    root: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    config: Config,
}

impl SqliteOpener {
    pub fn new(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            root: config.storage.root.clone(),
            embedder,
            config: config.clone(),
        }
    }

    pub fn database_dir(&self, database_id: &str) -> PathBuf {
        self.root.join(database_id)
    }
}

#[async_trait]
impl DatabaseOpener for SqliteOpener {
    async fn open(&self, database: &Database) -> Result<DocumentStore> {
        let dir = self.database_dir(&database.id);
        let store = DocumentStore::open_sqlite(&database.id, &dir, self.embedder.clone())
            .await
            .with_context(|| format!("Failed to open database '{}'", database.id))?;
        Ok(store
            .with_cluster_engine(cluster_engine(&self.config))
            .with_batch_size(self.config.embedding.batch_size))
    }

    async fn remove(&self, database_id: &str) -> Result<()> {
        let dir = self.database_dir(database_id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Databases that live only as long as the process.
pub struct MemoryOpener {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl MemoryOpener {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl DatabaseOpener for MemoryOpener {
    async fn open(&self, database: &Database) -> Result<DocumentStore> {
        Ok(DocumentStore::new(
            &database.id,
            Arc::new(InMemoryRelationalStore::new()),
            Arc::new(InMemoryVectorIndex::new()),
            self.embedder.clone(),
        ))
    }

    async fn remove(&self, _database_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Cluster engine configured from `[clustering]`.
pub fn cluster_engine(config: &Config) -> ClusterEngine {
    match index_by_name(&config.clustering.validity_index) {
        Some(index) => ClusterEngine::new(index, config.clustering.kmeans_options()),
        None => ClusterEngine::default(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry file
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    active_database_id: String,
    databases: Vec<Database>,
}

impl RegistryFile {
    fn with_default() -> Self {
        let now = now_millis();
        Self {
            active_database_id: DEFAULT_DATABASE_ID.to_string(),
            databases: vec![Database {
                id: DEFAULT_DATABASE_ID.to_string(),
                name: DEFAULT_DATABASE_NAME.to_string(),
                description: None,
                created_at: now,
                last_accessed: now,
                document_count: 0,
            }],
        }
    }

    fn find(&self, id: &str) -> Option<&Database> {
        self.databases.iter().find(|d| d.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Database> {
        self.databases.iter_mut().find(|d| d.id == id)
    }
}

fn load_file(path: &Path) -> Result<Option<RegistryFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: RegistryFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(file))
}

fn write_file(path: &Path, file: &RegistryFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(file)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

pub struct Registry {
    /// `None` keeps the registry in memory only.
    path: Option<PathBuf>,
    state: parking_lot::Mutex<RegistryFile>,
    opener: Arc<dyn DatabaseOpener>,
    stores: DashMap<String, Arc<DocumentStore>>,
    active: RwLock<Arc<DocumentStore>>,
}

impl Registry {
    /// Load `registry.json` at `path`, creating it (with the default
    /// database) if it does not exist yet.
    pub async fn open(path: &Path, opener: Arc<dyn DatabaseOpener>) -> Result<Self> {
        let state = match load_file(path)? {
            Some(file) => file,
            None => {
                let file = RegistryFile::with_default();
                write_file(path, &file)?;
                info!(path = %path.display(), "created registry");
                file
            }
        };
        Self::build(Some(path.to_path_buf()), state, opener).await
    }

    /// Registry that never touches disk.
    pub async fn in_memory(opener: Arc<dyn DatabaseOpener>) -> Result<Self> {
        Self::build(None, RegistryFile::with_default(), opener).await
    }

    /// Open the registry described by `config`, backed by SQLite.
    pub async fn from_config(config: &Config, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let opener = Arc::new(SqliteOpener::new(config, embedder));
        Self::open(&config.registry_path(), opener).await
    }

    async fn build(
        path: Option<PathBuf>,
        mut state: RegistryFile,
        opener: Arc<dyn DatabaseOpener>,
    ) -> Result<Self> {
        if state.find(&state.active_database_id).is_none() {
            let fallback = state
                .databases
                .first()
                .map(|d| d.id.clone())
                .context("registry lists no databases")?;
            debug!(from = %state.active_database_id, to = %fallback, "active database missing, falling back");
            state.active_database_id = fallback;
        }
        let active_db = state
            .find(&state.active_database_id)
            .cloned()
            .context("registry lists no databases")?;

        let store = Arc::new(opener.open(&active_db).await?);
        let stores = DashMap::new();
        stores.insert(active_db.id.clone(), store.clone());

        Ok(Self {
            path,
            state: parking_lot::Mutex::new(state),
            opener,
            stores,
            active: RwLock::new(store),
        })
    }

    /// Apply `change` to a copy of the registry, write it, and only then
    /// make it current. A failed change or write leaves state untouched.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut RegistryFile) -> ShelfResult<T>,
    ) -> ShelfResult<T> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let out = change(&mut next)?;
        if let Some(path) = &self.path {
            write_file(path, &next).map_err(ShelfError::Storage)?;
        }
        *state = next;
        Ok(out)
    }

    /// The active store. The read lock is held until the guard drops.
    pub async fn active(&self) -> RwLockReadGuard<'_, Arc<DocumentStore>> {
        self.active.read().await
    }

    pub fn active_database(&self) -> ShelfResult<Database> {
        let state = self.state.lock();
        state
            .find(&state.active_database_id)
            .cloned()
            .ok_or_else(|| ShelfError::database_not_found(&state.active_database_id))
    }

    pub fn get(&self, id: &str) -> ShelfResult<Database> {
        self.state
            .lock()
            .find(id)
            .cloned()
            .ok_or_else(|| ShelfError::database_not_found(id))
    }

    /// Store for `id`, opened on first use and cached afterwards.
    pub async fn store(&self, id: &str) -> ShelfResult<Arc<DocumentStore>> {
        if let Some(store) = self.stores.get(id) {
            return Ok(store.clone());
        }
        let database = self.get(id)?;
        let opened = Arc::new(
            self.opener
                .open(&database)
                .await
                .map_err(ShelfError::Storage)?,
        );
        Ok(self
            .stores
            .entry(id.to_string())
            .or_insert(opened)
            .clone())
    }

    /// Every database, with `document_count` read live from its store.
    pub async fn list(&self) -> ShelfResult<Vec<Database>> {
        let databases = self.state.lock().databases.clone();
        let mut out = Vec::with_capacity(databases.len());
        for mut database in databases {
            database.document_count = self.store(&database.id).await?.count().await?;
            out.push(database);
        }
        Ok(out)
    }

    pub async fn create(&self, name: &str, description: Option<&str>) -> ShelfResult<Database> {
        let name = validate_name(name)?;
        ensure_unique_name(&self.state.lock(), &name, None)?;

        let now = now_millis();
        let database = Database {
            id: format!("db_{}", &Uuid::new_v4().simple().to_string()[..8]),
            name,
            description: description.map(str::to_string).filter(|d| !d.trim().is_empty()),
            created_at: now,
            last_accessed: now,
            document_count: 0,
        };

        let store = self
            .opener
            .open(&database)
            .await
            .map_err(ShelfError::Storage)?;

        let committed = self.commit(|file| {
            ensure_unique_name(file, &database.name, None)?;
            file.databases.push(database.clone());
            Ok(())
        });
        if let Err(e) = committed {
            store.close().await;
            if let Err(cleanup) = self.opener.remove(&database.id).await {
                warn!(id = %database.id, error = %cleanup, "could not remove storage of uncommitted database");
            }
            return Err(e);
        }
        self.stores.insert(database.id.clone(), Arc::new(store));

        info!(id = %database.id, name = %database.name, "created database");
        Ok(database)
    }

    /// Make `id` the active database. Waits for operations holding the
    /// current active guard to finish.
    pub async fn activate(&self, id: &str) -> ShelfResult<Database> {
        self.get(id)?;
        let store = self.store(id).await?;

        let mut active = self.active.write().await;
        let database = self.commit(|file| {
            let entry = file
                .find_mut(id)
                .ok_or_else(|| ShelfError::database_not_found(id))?;
            entry.last_accessed = now_millis();
            let database = entry.clone();
            file.active_database_id = id.to_string();
            Ok(database)
        })?;
        *active = store;
        drop(active);

        info!(id, "activated database");
        Ok(database)
    }

    /// Rename and/or re-describe a database. An empty description clears it.
    pub fn update(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ShelfResult<Database> {
        let name = name.map(validate_name).transpose()?;
        self.commit(|file| {
            if let Some(name) = &name {
                ensure_unique_name(file, name, Some(id))?;
            }
            let entry = file
                .find_mut(id)
                .ok_or_else(|| ShelfError::database_not_found(id))?;
            if let Some(name) = name {
                entry.name = name;
            }
            if let Some(description) = description {
                entry.description = Some(description.trim().to_string()).filter(|d| !d.is_empty());
            }
            Ok(entry.clone())
        })
    }

    /// Remove a database and its storage. The active database and the
    /// last remaining database cannot be deleted.
    pub async fn delete(&self, id: &str) -> ShelfResult<()> {
        self.commit(|file| {
            if file.find(id).is_none() {
                return Err(ShelfError::database_not_found(id));
            }
            if file.active_database_id == id {
                return Err(ShelfError::InvalidArgument(format!(
                    "cannot delete the active database '{id}'; switch to another first"
                )));
            }
            if file.databases.len() <= 1 {
                return Err(ShelfError::InvalidArgument(
                    "cannot delete the last database".into(),
                ));
            }
            file.databases.retain(|d| d.id != id);
            Ok(())
        })?;

        if let Some((_, store)) = self.stores.remove(id) {
            store.close().await;
        }
        self.opener.remove(id).await.map_err(ShelfError::Storage)?;
        info!(id, "deleted database");
        Ok(())
    }

    /// Move a document out of the active database into `target_id`.
    pub async fn move_document(&self, document_id: &str, target_id: &str) -> ShelfResult<Document> {
        let source = self.active().await;
        self.get(target_id)?;
        let target = self.store(target_id).await?;
        source.move_to(document_id, &target).await
    }
}

fn ensure_unique_name(file: &RegistryFile, name: &str, except: Option<&str>) -> ShelfResult<()> {
    let taken = file
        .databases
        .iter()
        .any(|d| Some(d.id.as_str()) != except && d.name.eq_ignore_ascii_case(name));
    if taken {
        return Err(ShelfError::InvalidArgument(format!(
            "a database named '{name}' already exists"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> ShelfResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ShelfError::InvalidArgument(
            "database name must not be empty".into(),
        ));
    }
    Ok(name.to_string())
}
