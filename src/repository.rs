//! Persistence interface, an in-process store and a cache-aside decorator

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::RepoError;
use crate::types::EmailEntity;

/// Page size used by [`MemoryRepository::list`] when `limit` is zero
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Storage for parsed entities
#[async_trait]
pub trait EmailRepository: Send + Sync {
    /// Insert or update, keyed by `message_id`
    async fn save(&self, email: &EmailEntity) -> Result<(), RepoError>;

    async fn get_by_id(&self, id: &str) -> Result<EmailEntity, RepoError>;

    /// Newest first
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<EmailEntity>, RepoError>;
}

#[derive(Default)]
struct Store {
    by_id: HashMap<String, EmailEntity>,
    id_by_message_id: HashMap<String, String>,
}

/// In-process repository with upsert-by-message-id semantics.
///
/// Saving an entity whose `message_id` is already stored replaces the stored
/// row's fields but keeps its original `id` and `created_at`.
#[derive(Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EmailRepository for MemoryRepository {
    async fn save(&self, email: &EmailEntity) -> Result<(), RepoError> {
        let mut store = self.store.write().await;
        let key = email.message_id.as_str().to_string();

        let existing = store
            .id_by_message_id
            .get(&key)
            .and_then(|id| store.by_id.get(id))
            .map(|row| (row.id.clone(), row.created_at));

        let mut row = email.clone();
        if let Some((id, created_at)) = existing {
            row.id = id;
            row.created_at = created_at;
        }

        store.id_by_message_id.insert(key, row.id.clone());
        store.by_id.insert(row.id.clone(), row);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<EmailEntity, RepoError> {
        self.store
            .read()
            .await
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<EmailEntity>, RepoError> {
        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };
        let store = self.store.read().await;

        let mut rows: Vec<&EmailEntity> = store.by_id.values().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Cache-aside decorator: reads by id hit the cache first, writes invalidate.
/// Listings always go to the underlying repository.
pub struct CachedRepository {
    inner: Arc<dyn EmailRepository>,
    cache: Cache<String, Arc<EmailEntity>>,
}

impl CachedRepository {
    #[must_use]
    pub fn new(inner: Arc<dyn EmailRepository>, ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }

    /// Whether an entity is currently cached under `id`
    #[must_use]
    pub fn is_cached(&self, id: &str) -> bool {
        self.cache.contains_key(id)
    }
}

#[async_trait]
impl EmailRepository for CachedRepository {
    async fn save(&self, email: &EmailEntity) -> Result<(), RepoError> {
        self.inner.save(email).await?;

        // An upsert may keep an older id for the same message id.
        let stale: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(_, row)| row.message_id == email.message_id)
            .map(|(key, _)| key)
            .collect();
        for key in stale {
            self.cache.invalidate(key.as_str());
        }
        self.cache.invalidate(email.id.as_str());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<EmailEntity, RepoError> {
        if let Some(hit) = self.cache.get(id) {
            debug!(id, "cache hit");
            return Ok(hit.as_ref().clone());
        }

        let email = self.inner.get_by_id(id).await?;
        self.cache.insert(id.to_string(), Arc::new(email.clone()));
        Ok(email)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<EmailEntity>, RepoError> {
        self.inner.list(limit, offset).await
    }
}
