//! TTL cache for the operational directory snapshot.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use foreman_core::OperationalContext;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::directory::DirectoryFetcher;

pub const CONTEXT_TTL_MINUTES: i64 = 5;

/// Injectable clock so TTL behavior is deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Holds the last directory snapshot and replaces it wholesale once it ages
/// past the TTL. Concurrent callers over a cold or expired cache may each
/// trigger their own refresh; the duplicate fetch is bounded and idempotent,
/// so no single-flight coordination is applied.
pub struct ContextCache {
    snapshot: RwLock<Option<Arc<OperationalContext>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ContextCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshot: RwLock::new(None),
            ttl: Duration::minutes(CONTEXT_TTL_MINUTES),
            clock,
        }
    }

    pub async fn get(&self, fetcher: &DirectoryFetcher) -> Arc<OperationalContext> {
        let now = self.clock.now();

        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            if snapshot.is_fresh(now, self.ttl) {
                debug!(
                    event_name = "context_cache_hit",
                    age_secs = (now - snapshot.fetched_at).num_seconds(),
                );
                return Arc::clone(snapshot);
            }
        }

        info!(event_name = "context_cache_miss");
        let mut context = fetcher.fetch().await;
        // Stamp with the cache's clock so TTL math stays consistent with it.
        context.fetched_at = self.clock.now();
        let fresh = Arc::new(context);
        *self.snapshot.write().await = Some(Arc::clone(&fresh));
        fresh
    }
}
