//! Cached list of enabled AI models.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::db::{self, AiModel, DbPool};
use crate::error::Result;

/// Enabled-model list with a time-to-live and explicit invalidation.
///
/// A reload started before an invalidation never overwrites it: the
/// generation is bumped on every invalidation and a load is only stored
/// when the generation it started under is still current.
pub struct ModelCache {
    ttl: Duration,
    entry: RwLock<Option<CachedModels>>,
    generation: AtomicU64,
}

struct CachedModels {
    loaded_at: Instant,
    models: Arc<Vec<AiModel>>,
}

impl ModelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Enabled models, loaded from the database when the cache is empty or stale.
    pub async fn get(&self, pool: &DbPool) -> Result<Arc<Vec<AiModel>>> {
        {
            let entry = self.entry.read().await;
            if let Some(cached) = entry.as_ref() {
                if cached.loaded_at.elapsed() < self.ttl {
                    return Ok(cached.models.clone());
                }
            }
        }

        let generation = self.generation.load(Ordering::Acquire);
        let models = Arc::new(db::list_enabled_models(pool).await?);
        self.store(generation, models.clone()).await;

        Ok(models)
    }

    async fn store(&self, generation: u64, models: Arc<Vec<AiModel>>) {
        let mut entry = self.entry.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("AI model cache invalidated during reload, result discarded");
            return;
        }
        debug!(count = models.len(), "AI model cache refreshed");
        *entry = Some(CachedModels {
            loaded_at: Instant::now(),
            models,
        });
    }

    /// Drop the cached list so the next read hits the database.
    pub async fn invalidate(&self) {
        let mut entry = self.entry.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        *entry = None;
    }
}
