use crate::models::{IdentityRecord, PaymentIntent};
use moka::future::Cache;
use std::time::Duration;

/// Per-session state shared between requests of the same browser session.
///
/// Entries expire after the session TTL. Concurrent writes for the same key
/// are last-write-wins.
#[derive(Clone)]
pub struct SessionStore {
    identities: Cache<String, IdentityRecord>,
    intents: Cache<String, PaymentIntent>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            identities: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(10_000)
                .build(),
            intents: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(10_000)
                .build(),
        }
    }

    pub async fn put_identity(&self, session_key: &str, record: IdentityRecord) {
        self.identities.insert(session_key.to_string(), record).await;
    }

    pub async fn identity(&self, session_key: &str) -> Option<IdentityRecord> {
        self.identities.get(session_key).await
    }

    /// Remembers the charge rendered for this session.
    pub async fn cache_intent(&self, session_key: &str, intent: PaymentIntent) {
        self.intents.insert(session_key.to_string(), intent).await;
    }

    pub async fn cached_intent(&self, session_key: &str) -> Option<PaymentIntent> {
        self.intents.get(session_key).await
    }

    /// Drops the cached charge only if it is still `intent_id`. A newer
    /// charge rendered for the same session stays cached.
    pub async fn clear_intent(&self, session_key: &str, intent_id: &str) -> bool {
        match self.intents.get(session_key).await {
            Some(cached) if cached.id == intent_id => {
                self.intents.invalidate(session_key).await;
                true
            }
            _ => false,
        }
    }
}
