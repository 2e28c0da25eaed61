//! Facade tying the parser, the batch supervisor and persistence together

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::batch::{BatchOptions, BatchSupervisor};
use crate::builder::{EmailParser, EntityBuilder};
use crate::config::Config;
use crate::error::{ParseError, RepoError, Result};
use crate::language::ScriptDetector;
use crate::repository::{CachedRepository, EmailRepository};
use crate::types::{BatchResult, EmailEntity};

/// Page size used by [`EmailService::list`] when `limit` is zero
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Single and batch entry points over a shared parser and repository
#[derive(Clone)]
pub struct EmailService {
    parser: Arc<dyn EmailParser>,
    repo: Arc<dyn EmailRepository>,
    supervisor: BatchSupervisor,
    persist_timeout: Duration,
}

impl EmailService {
    #[must_use]
    pub fn new(
        parser: Arc<dyn EmailParser>,
        repo: Arc<dyn EmailRepository>,
        persist_timeout: Duration,
    ) -> Self {
        let supervisor = BatchSupervisor::new(Arc::clone(&parser), Arc::clone(&repo));
        Self {
            parser,
            repo,
            supervisor,
            persist_timeout,
        }
    }

    /// Wire a service from configuration. The repository is wrapped in a
    /// cache when caching is enabled.
    #[must_use]
    pub fn from_config(config: &Config, repo: Arc<dyn EmailRepository>) -> Self {
        let parser =
            EntityBuilder::new(config.parser_options()).with_detector(Arc::new(ScriptDetector));

        let repo: Arc<dyn EmailRepository> = if config.cache.enabled {
            info!(
                ttl_ms = crate::types::millis(config.cache.ttl),
                capacity = config.cache.capacity,
                "repository cache enabled"
            );
            Arc::new(CachedRepository::new(repo, config.cache.ttl, config.cache.capacity))
        } else {
            repo
        };

        Self::new(Arc::new(parser), repo, config.persist_timeout)
    }

    /// Parse without persisting
    pub fn parse_one(&self, raw: &[u8]) -> Result<EmailEntity> {
        self.parser.parse(raw)
    }

    /// Parse, persist, and return the stored row.
    ///
    /// If the stored row cannot be read back, the freshly parsed entity is
    /// returned instead.
    pub async fn parse_and_save(&self, raw: &[u8]) -> Result<EmailEntity> {
        let entity = self.parser.parse(raw)?;

        timeout(self.persist_timeout, self.repo.save(&entity))
            .await
            .map_err(|_| ParseError::Timeout(self.persist_timeout))??;

        match self.repo.get_by_id(&entity.id).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                warn!(id = %entity.id, error = %e, "stored email could not be read back");
                Ok(entity)
            }
        }
    }

    /// Parse and persist many messages concurrently
    pub async fn parse_batch(&self, raws: Vec<String>, options: BatchOptions) -> Result<BatchResult> {
        self.supervisor.run(raws, options).await
    }

    pub async fn get_by_id(&self, id: &str) -> std::result::Result<EmailEntity, RepoError> {
        self.repo.get_by_id(id).await
    }

    /// Newest first; a zero `limit` means [`DEFAULT_PAGE_SIZE`]
    pub async fn list(
        &self,
        limit: usize,
        offset: usize,
    ) -> std::result::Result<Vec<EmailEntity>, RepoError> {
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };
        self.repo.list(limit, offset).await
    }
}
