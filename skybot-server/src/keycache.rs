use std::sync::Arc;
use std::time::{Duration, Instant};

use skybot_core::directory::KeyDirectoryClient;
use skybot_core::jwks::SigningKeySet;
use tokio::sync::RwLock;

/// Keeps the most recently fetched signing key set for `ttl`, so that
/// webhook calls don't each pay for two round-trips to the key directory.
///
/// Failed fetches are never cached.
#[derive(Clone)]
pub struct KeySetCache {
    directory: KeyDirectoryClient,
    ttl: Duration,
    min_refresh_interval: Duration,
    entry: Arc<RwLock<Option<CachedKeySet>>>,
}

/// How long a fetched key set is kept before [`KeySetCache::refresh`] may
/// drop it early.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

struct CachedKeySet {
    keys: Arc<SigningKeySet>,
    fetched_at: Instant,
}

impl CachedKeySet {
    fn fresh(&self, ttl: Duration) -> Option<Arc<SigningKeySet>> {
        if self.fetched_at.elapsed() < ttl {
            Some(self.keys.clone())
        } else {
            None
        }
    }
}

impl KeySetCache {
    pub fn new(directory: KeyDirectoryClient, ttl: Duration) -> Self {
        Self {
            directory,
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            entry: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn signing_keys(&self) -> Result<Arc<SigningKeySet>, skybot_core::Error> {
        if let Some(keys) = self.entry.read().await.as_ref().and_then(|e| e.fresh(self.ttl)) {
            return Ok(keys);
        }

        let mut entry = self.entry.write().await;
        // refreshed by another task while waiting for the lock
        if let Some(keys) = entry.as_ref().and_then(|e| e.fresh(self.ttl)) {
            return Ok(keys);
        }

        let keys = Arc::new(self.directory.fetch_signing_keys().await?);
        tracing::debug!(
            keys = keys.key_ids().join(", ").as_str(),
            ttl_seconds = self.ttl.as_secs(),
            "signing keys cached"
        );
        *entry = Some(CachedKeySet {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    /// Drops the cached key set; the next call fetches again.
    pub async fn invalidate(&self) {
        self.entry.write().await.take();
    }

    /// Drops the cached key set unless it was fetched less than the minimum
    /// refresh interval ago. Returns whether it was dropped.
    pub async fn refresh(&self) -> bool {
        let mut entry = self.entry.write().await;
        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.min_refresh_interval {
                tracing::debug!(
                    age_seconds = cached.fetched_at.elapsed().as_secs(),
                    "signing keys fetched recently, not refreshing"
                );
                return false;
            }
        }
        entry.take();
        true
    }
}
