use std::{collections::HashMap, hash::Hash, sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info};

use super::{Token, TokenFetcher};

/// Subtracted from long session intervals so a token is never presented
/// right at its server-side expiry.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// Time-to-live of a cached token for a configured session interval.
pub fn session_ttl(session_interval_secs: u64) -> Duration {
    let interval = Duration::from_secs(session_interval_secs);
    if interval > SAFETY_MARGIN {
        interval - SAFETY_MARGIN
    } else {
        interval
    }
}

#[derive(Debug, Clone)]
pub struct Record {
    pub token: Arc<Token>,
    pub loaded_at: Instant,
}

impl Record {
    fn new(token: Token) -> Self {
        Self {
            token: Arc::new(token),
            loaded_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() >= ttl
    }
}

type Slot = Arc<Mutex<Option<Record>>>;

/// Keyed token cache with expire-after-write eviction.
///
/// Expiry is checked on access; nothing refreshes in the background. Lookups
/// for one key are serialized on that key's slot, so concurrent misses load
/// once while other keys proceed independently.
pub struct TokenCache<Key, Fetcher> {
    fetcher: Fetcher,
    ttl: Duration,
    slots: Mutex<HashMap<Key, Slot>>,
}

impl<Key, Fetcher> TokenCache<Key, Fetcher>
where
    Key: Eq + Hash + Clone + Send + Sync,
    Fetcher: TokenFetcher<Key>,
{
    pub fn new(fetcher: Fetcher, session_interval_secs: u64) -> Self {
        Self::with_ttl(fetcher, session_ttl(session_interval_secs))
    }

    pub fn with_ttl(fetcher: Fetcher, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            slots: Mutex::const_new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    async fn slot(&self, key: &Key) -> Slot {
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }

        // Slots are only cloned under this lock, so a count of one means no
        // lookup is using the slot.
        let ttl = self.ttl;
        let before = slots.len();
        slots.retain(|_, slot| {
            let idle = Arc::strong_count(slot) == 1;
            let stale = slot.try_lock().map_or(false, |cached| {
                cached.as_ref().map_or(true, |record| record.is_expired(ttl))
            });
            !(idle && stale)
        });
        if slots.len() < before {
            debug!(message = "Pruned expired tokens", pruned = before - slots.len());
        }

        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Returns the cached token for `key`, fetching a new one on a miss or
    /// after the TTL has elapsed.
    ///
    /// Fetch errors are returned as-is and leave the key uncached.
    pub async fn get(&self, key: &Key) -> Result<Arc<Token>, Fetcher::Error> {
        let slot = self.slot(key).await;
        let mut cached = slot.lock().await;

        if let Some(record) = cached.as_ref() {
            if !record.is_expired(self.ttl) {
                debug!(message = "Using preexisting token", token_age = ?record.loaded_at.elapsed());
                return Ok(Arc::clone(&record.token));
            }
            debug!(message = "Existing token expired, refreshing", token_age = ?record.loaded_at.elapsed());
        }

        info!(
            message = "No active token found, about to get a new one",
            token_is_stale = cached.is_some(),
        );

        cached.take();
        let record = Record::new(self.fetcher.fetch(key).await?);
        debug!(
            message = "Got new token",
            token_expires_in = record.token.expires_in,
            cache_ttl = ?self.ttl,
        );

        let token = Arc::clone(&record.token);
        cached.replace(record);
        Ok(token)
    }

    /// Drops the cached token for `key` so the next lookup fetches.
    pub async fn invalidate(&self, key: &Key) {
        let slot = self.slots.lock().await.remove(key);
        if let Some(slot) = slot {
            if slot.lock().await.take().is_some() {
                debug!(message = "Invalidated cached token");
            }
        }
    }
}
