//! Workflow catalog: the single source of truth mapping workflow ids to
//! definitions.
//!
//! In [`CatalogMode::Direct`] only definitions registered in memory are
//! served. In [`CatalogMode::SerializedPreferred`] a memory miss falls through
//! to the [`SerializationCache`]; a decoded snapshot is kept in memory for
//! later lookups and re-checked against the store once it is older than
//! `min_serialized_fetch_interval`.
//!
//! Cache trouble (timeouts, store errors, corrupt snapshots) never reaches the
//! caller: it is logged and treated as a miss, or as "keep what we have" on a
//! re-check.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::{CatalogConfig, CatalogMode};
use crate::snapshot::{LoadedSnapshot, SerializationCache};
use crate::{EngineError, WorkflowDefinition};

/// A definition held in memory.
#[derive(Debug, Clone)]
struct CatalogEntry {
    definition: Arc<WorkflowDefinition>,
    /// Timestamp of the snapshot this entry matches.
    last_updated: DateTime<Utc>,
    /// When the entry was last confirmed against the store.
    checked_at: Instant,
}

impl CatalogEntry {
    fn new(definition: Arc<WorkflowDefinition>, last_updated: DateTime<Utc>) -> Self {
        Self {
            definition,
            last_updated,
            checked_at: Instant::now(),
        }
    }
}

/// In-memory registry of workflow definitions, optionally backed by a
/// serialization cache.
#[derive(Debug)]
pub struct WorkflowCatalog {
    config: CatalogConfig,
    cache: Option<SerializationCache>,
    workflows: RwLock<HashMap<String, CatalogEntry>>,
}

impl WorkflowCatalog {
    /// A catalog with no serialization cache.
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            config,
            cache: None,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a serialization cache. Registrations are written to it, and in
    /// serialized-preferred mode lookups read from it.
    pub fn with_cache(mut self, cache: SerializationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn mode(&self) -> CatalogMode {
        self.config.mode
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&SerializationCache> {
        self.cache.as_ref()
    }

    /// Register (or replace) a definition and snapshot it when a cache is
    /// attached. A failed snapshot write is logged; the definition is still
    /// served from memory.
    #[instrument(skip(self, definition), fields(workflow_id = %definition.workflow_id()))]
    pub async fn register(&self, definition: WorkflowDefinition) -> Arc<WorkflowDefinition> {
        let definition = Arc::new(definition);
        let as_of = Utc::now();

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&definition, as_of).await {
                warn!("failed to write snapshot: {}", e);
            }
        }

        let workflow_id = definition.workflow_id().to_owned();
        self.workflows
            .write()
            .await
            .insert(workflow_id, CatalogEntry::new(Arc::clone(&definition), as_of));

        info!("workflow registered");
        definition
    }

    /// Resolve a workflow by id.
    ///
    /// # Errors
    /// [`EngineError::WorkflowNotFound`] when the id is registered nowhere the
    /// current mode looks.
    #[instrument(skip(self))]
    pub async fn lookup(&self, workflow_id: &str) -> Result<Arc<WorkflowDefinition>, EngineError> {
        let cached = self.workflows.read().await.get(workflow_id).cloned();

        match (self.config.mode, cached) {
            (CatalogMode::Direct, Some(entry)) => Ok(entry.definition),
            (CatalogMode::Direct, None) => Err(EngineError::WorkflowNotFound(workflow_id.to_owned())),
            (CatalogMode::SerializedPreferred, Some(entry)) => {
                Ok(self.refresh_if_stale(workflow_id, entry).await)
            }
            (CatalogMode::SerializedPreferred, None) => self
                .populate_from_cache(workflow_id)
                .await
                .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_owned())),
        }
    }

    /// Drop a workflow from memory and, if attached, from the cache.
    /// Returns whether anything was removed.
    #[instrument(skip(self))]
    pub async fn remove(&self, workflow_id: &str) -> bool {
        let in_memory = self.workflows.write().await.remove(workflow_id).is_some();

        let in_cache = match &self.cache {
            Some(cache) => cache.remove(workflow_id).await.unwrap_or_else(|e| {
                warn!("failed to remove snapshot: {}", e);
                false
            }),
            None => false,
        };

        in_memory || in_cache
    }

    /// Sorted ids of every workflow a lookup could resolve.
    ///
    /// Stored ids not yet in memory are listed only if their snapshot decodes.
    pub async fn workflow_ids(&self) -> Vec<String> {
        let mut ids: BTreeSet<String> = self.workflows.read().await.keys().cloned().collect();

        if self.config.mode == CatalogMode::SerializedPreferred {
            if let Some(cache) = &self.cache {
                match tokio::time::timeout(self.config.cache_read_timeout, cache.list_ids()).await {
                    Ok(Ok(stored)) => {
                        for id in stored {
                            if !ids.contains(&id) && self.read_snapshot(&id).await.is_some() {
                                ids.insert(id);
                            }
                        }
                    }
                    Ok(Err(e)) => warn!("cannot list snapshots: {}", e),
                    Err(_) => warn!("listing snapshots timed out"),
                }
            }
        }

        ids.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Internal: cache reads. Every failure collapses to `None`.
    // -----------------------------------------------------------------------

    async fn read_snapshot(&self, workflow_id: &str) -> Option<LoadedSnapshot> {
        let cache = self.cache.as_ref()?;

        match tokio::time::timeout(self.config.cache_read_timeout, cache.load(workflow_id)).await {
            Ok(Ok(loaded)) => loaded,
            Ok(Err(e)) => {
                warn!(workflow_id, "treating snapshot as missing: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    workflow_id,
                    "snapshot read timed out after {:?}", self.config.cache_read_timeout
                );
                None
            }
        }
    }

    async fn populate_from_cache(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        let loaded = self.read_snapshot(workflow_id).await?;
        let entry = CatalogEntry::new(Arc::new(loaded.definition), loaded.last_updated);

        // A concurrent register or populate may have won the race; keep theirs.
        let mut workflows = self.workflows.write().await;
        let kept = workflows.entry(workflow_id.to_owned()).or_insert(entry);
        debug!(workflow_id, "populated from snapshot");
        Some(Arc::clone(&kept.definition))
    }

    async fn refresh_if_stale(&self, workflow_id: &str, entry: CatalogEntry) -> Arc<WorkflowDefinition> {
        let Some(interval) = self.config.min_serialized_fetch_interval else {
            return entry.definition;
        };
        if entry.checked_at.elapsed() < interval {
            return entry.definition;
        }
        let Some(cache) = &self.cache else {
            return entry.definition;
        };

        let stored_at =
            match tokio::time::timeout(self.config.cache_read_timeout, cache.last_updated(workflow_id)).await {
                Ok(Ok(stored_at)) => stored_at,
                Ok(Err(e)) => {
                    warn!(workflow_id, "staleness check failed: {}", e);
                    return entry.definition;
                }
                Err(_) => {
                    warn!(workflow_id, "staleness check timed out");
                    return entry.definition;
                }
            };

        let fresh = match stored_at {
            Some(stored_at) if stored_at > entry.last_updated => self.read_snapshot(workflow_id).await,
            _ => None,
        };

        let mut workflows = self.workflows.write().await;
        match (fresh, workflows.get_mut(workflow_id)) {
            (Some(loaded), Some(current)) if loaded.last_updated > current.last_updated => {
                info!(workflow_id, "reloaded newer snapshot");
                *current = CatalogEntry::new(Arc::new(loaded.definition), loaded.last_updated);
                Arc::clone(&current.definition)
            }
            (_, Some(current)) => {
                current.checked_at = Instant::now();
                Arc::clone(&current.definition)
            }
            // Removed while we were checking; serve what the caller saw.
            (_, None) => entry.definition,
        }
    }
}
