//! Schema registry: owns the current document, drives compilation, and swaps
//! the active route table atomically.
//!
//! The whole new table is built off to the side and published with a single
//! pointer swap; concurrent requests see either the fully-old or fully-new
//! table, never a mixture. A rejected update leaves everything untouched.

use crate::error::AppError;
use crate::model::ModelCache;
use crate::persist;
use crate::schema::{compile_document, EntityDescriptor, SchemaDocument};
use crate::store::{DataAccess, MemoryStore, PgStore};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

const PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// One entity's compiled descriptor plus its bound data access.
pub struct EntityBinding {
    pub descriptor: Arc<EntityDescriptor>,
    pub data: DataAccess,
}

/// The complete set of dynamic routes for one accepted schema document.
pub struct RouteTable {
    document: SchemaDocument,
    routes: HashMap<String, Arc<EntityBinding>>,
}

/// A resolved dynamic route: the entity binding and, for item routes, the id
/// segment after the prefix.
pub struct RouteMatch {
    pub binding: Arc<EntityBinding>,
    pub id: Option<String>,
}

impl RouteTable {
    fn empty() -> Self {
        RouteTable {
            document: SchemaDocument::new(),
            routes: HashMap::new(),
        }
    }

    pub fn document(&self) -> &SchemaDocument {
        &self.document
    }

    pub fn route_prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self.routes.keys().cloned().collect();
        prefixes.sort();
        prefixes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Match a request path against the table: the prefix itself is the
    /// collection route, prefix plus one extra segment is an item route.
    /// Exact prefixes win over item interpretations, so a prefix that extends
    /// another prefix always resolves to its own entity.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        if let Some(binding) = self.routes.get(path) {
            return Some(RouteMatch {
                binding: Arc::clone(binding),
                id: None,
            });
        }
        let (prefix, id) = path.rsplit_once('/')?;
        if id.is_empty() {
            return None;
        }
        self.routes.get(prefix).map(|binding| RouteMatch {
            binding: Arc::clone(binding),
            id: Some(id.to_string()),
        })
    }
}

/// Registry lifecycle while a submit is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryState {
    Idle,
    Validating,
    Compiling,
    Swapping,
}

#[derive(Debug)]
pub struct SubmitOutcome {
    pub entities: Vec<String>,
    /// Set when the in-memory swap succeeded but durable persistence failed.
    pub warning: Option<String>,
}

pub struct SchemaRegistry {
    active: RwLock<Arc<RouteTable>>,
    models: ModelCache,
    /// Serializes submits; a second concurrent submit is rejected.
    submits: tokio::sync::Mutex<()>,
    state: RwLock<RegistryState>,
    postgres: Option<Arc<PgStore>>,
    fallback: Arc<MemoryStore>,
}

impl SchemaRegistry {
    pub fn new(postgres: Option<Arc<PgStore>>) -> Self {
        SchemaRegistry {
            active: RwLock::new(Arc::new(RouteTable::empty())),
            models: ModelCache::new(),
            submits: tokio::sync::Mutex::new(()),
            state: RwLock::new(RegistryState::Idle),
            postgres,
            fallback: Arc::new(MemoryStore::new()),
        }
    }

    /// Registry with no persistent store: everything lives in the fallback.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Snapshot of the active route table. Cheap: clones an Arc.
    pub fn active(&self) -> Arc<RouteTable> {
        Arc::clone(&self.active.read().expect("route table lock poisoned"))
    }

    pub fn document(&self) -> SchemaDocument {
        self.active().document.clone()
    }

    pub fn state(&self) -> RegistryState {
        *self.state.read().expect("state lock poisoned")
    }

    fn set_state(&self, state: RegistryState) {
        tracing::debug!(?state, "registry state");
        *self.state.write().expect("state lock poisoned") = state;
    }

    pub async fn backend_reachable(&self) -> bool {
        match &self.postgres {
            Some(pg) => pg.is_reachable().await,
            None => false,
        }
    }

    pub fn has_postgres(&self) -> bool {
        self.postgres.is_some()
    }

    /// Validate and compile `document`, then atomically replace the active
    /// route table. Any failure rejects the whole update; no partial route-set
    /// mutation is observable.
    pub async fn submit(&self, document: SchemaDocument) -> Result<SubmitOutcome, AppError> {
        let _guard = self
            .submits
            .try_lock()
            .map_err(|_| AppError::UpdateInProgress)?;

        let result = self.apply(document).await;
        self.set_state(RegistryState::Idle);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "schema update rejected, previous schema stays active");
        }
        result
    }

    async fn apply(&self, document: SchemaDocument) -> Result<SubmitOutcome, AppError> {
        self.set_state(RegistryState::Validating);
        self.set_state(RegistryState::Compiling);
        let descriptors = compile_document(&document)?;

        // Compilation succeeded for every entity; only now may handles turn
        // over and the table swap.
        let mut routes = HashMap::with_capacity(descriptors.len());
        let mut keep = HashSet::with_capacity(descriptors.len());
        let mut entities = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let handle = self.models.get_or_create(&descriptor.model);
            let data = DataAccess::new(
                Arc::clone(&descriptor),
                handle,
                self.postgres.clone(),
                Arc::clone(&self.fallback),
            );
            keep.insert(descriptor.model.clone());
            entities.push(descriptor.entity.clone());
            routes.insert(
                descriptor.route.clone(),
                Arc::new(EntityBinding {
                    descriptor,
                    data,
                }),
            );
        }
        self.models.retain(&keep);

        self.set_state(RegistryState::Swapping);
        let table = Arc::new(RouteTable {
            document: document.clone(),
            routes,
        });
        *self.active.write().expect("route table lock poisoned") = table;
        tracing::info!(entities = entities.len(), "schema update applied");

        let warning = self.persist_best_effort(&document).await;
        Ok(SubmitOutcome { entities, warning })
    }

    /// Persistence failure does not roll back the in-memory swap; it is
    /// reported to the caller as a warning.
    async fn persist_best_effort(&self, document: &SchemaDocument) -> Option<String> {
        let pg = self.postgres.as_ref()?;
        let saved = tokio::time::timeout(PERSIST_TIMEOUT, persist::save_document(pg.pool(), document)).await;
        match saved {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to persist schema document");
                Some(format!("schema applied but not persisted: {}", e))
            }
            Err(_) => {
                tracing::warn!("timed out persisting schema document");
                Some("schema applied but not persisted: backend timed out".into())
            }
        }
    }
}
