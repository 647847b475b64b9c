use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::crypto::concealment::CONCEALMENT_NONCE_SIZE;
use crate::types::error::{AkaError, AkaResult};
use crate::types::identity::Supi;

/// Per-role, per-transaction state between two protocol steps.
pub struct SessionStore<S> {
    sessions: RwLock<HashMap<Uuid, (S, Instant)>>,
}

impl<S> Default for SessionStore<S> {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl<S> SessionStore<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, transaction_id: Uuid, session: S) -> AkaResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&transaction_id) {
            return Err(AkaError::DuplicateTransaction(transaction_id));
        }
        sessions.insert(transaction_id, (session, Instant::now()));
        Ok(())
    }

    /// Removes and returns the session; a later step cannot reuse it.
    pub async fn take(&self, transaction_id: &Uuid) -> Option<S> {
        self.sessions
            .write()
            .await
            .remove(transaction_id)
            .map(|(session, _)| session)
    }

    pub async fn contains(&self, transaction_id: &Uuid) -> bool {
        self.sessions.read().await.contains_key(transaction_id)
    }

    pub async fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&S) -> bool,
    {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, (session, _)| !predicate(session));
        before - sessions.len()
    }

    pub async fn retain_younger_than(&self, max_age: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, (_, created)| created.elapsed() < max_age);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

type Nonce = [u8; CONCEALMENT_NONCE_SIZE];

/// Concealment nonces the home network has accepted, per subscriber. A
/// nonce seen twice inside the retention window is a replayed identity.
pub struct NonceLedger {
    seen: RwLock<HashMap<Supi, VecDeque<(Nonce, Instant)>>>,
    per_subscriber: usize,
}

impl NonceLedger {
    /// Keeps at most `per_subscriber` nonces for each subscriber; the oldest
    /// is forgotten first.
    pub fn new(per_subscriber: usize) -> Self {
        Self {
            seen: RwLock::new(HashMap::new()),
            per_subscriber: per_subscriber.max(1),
        }
    }

    /// Records `nonce` for `supi`. Returns `false` if it is already on record.
    pub async fn record(&self, supi: &Supi, nonce: Nonce) -> bool {
        let mut seen = self.seen.write().await;
        let entries = seen.entry(supi.clone()).or_default();
        if entries.iter().any(|(recorded, _)| *recorded == nonce) {
            return false;
        }
        if entries.len() >= self.per_subscriber {
            entries.pop_front();
        }
        entries.push_back((nonce, Instant::now()));
        true
    }

    pub async fn retain_younger_than(&self, max_age: Duration) -> usize {
        let mut seen = self.seen.write().await;
        let mut evicted = 0;
        for entries in seen.values_mut() {
            let before = entries.len();
            entries.retain(|(_, recorded)| recorded.elapsed() < max_age);
            evicted += before - entries.len();
        }
        seen.retain(|_, entries| !entries.is_empty());
        evicted
    }

    pub async fn len(&self) -> usize {
        self.seen.read().await.values().map(VecDeque::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_take() {
        let store = SessionStore::new();
        let tx = Uuid::new_v4();
        store.insert(tx, "session").await.unwrap();
        assert!(store.contains(&tx).await);

        assert_eq!(store.take(&tx).await, Some("session"));
        assert_eq!(store.take(&tx).await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_transaction_rejected() {
        let store = SessionStore::new();
        let tx = Uuid::new_v4();
        store.insert(tx, 1).await.unwrap();
        assert!(matches!(
            store.insert(tx, 2).await,
            Err(AkaError::DuplicateTransaction(id)) if id == tx
        ));
        assert_eq!(store.take(&tx).await, Some(1));
    }

    #[tokio::test]
    async fn test_remove_where() {
        let store = SessionStore::new();
        store.insert(Uuid::new_v4(), "alice").await.unwrap();
        store.insert(Uuid::new_v4(), "alice").await.unwrap();
        store.insert(Uuid::new_v4(), "bob").await.unwrap();

        assert_eq!(store.remove_where(|s| *s == "alice").await, 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_retain_younger_than() {
        let store = SessionStore::new();
        store.insert(Uuid::new_v4(), ()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.insert(Uuid::new_v4(), ()).await.unwrap();

        assert_eq!(store.retain_younger_than(Duration::from_millis(10)).await, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.retain_younger_than(Duration::from_secs(60)).await, 0);
    }

    fn supi(n: u8) -> Supi {
        Supi::parse(&format!("imsi-00101000000000{}", n)).unwrap()
    }

    #[tokio::test]
    async fn test_nonce_recorded_once_per_subscriber() {
        let ledger = NonceLedger::new(8);
        assert!(ledger.record(&supi(1), [1u8; 16]).await);
        assert!(!ledger.record(&supi(1), [1u8; 16]).await);
        assert!(ledger.record(&supi(2), [1u8; 16]).await);
        assert!(ledger.record(&supi(1), [2u8; 16]).await);
        assert_eq!(ledger.len().await, 3);
    }

    #[tokio::test]
    async fn test_nonce_history_is_bounded() {
        let ledger = NonceLedger::new(2);
        for n in 1..=3u8 {
            assert!(ledger.record(&supi(1), [n; 16]).await);
        }
        assert_eq!(ledger.len().await, 2);
        // The oldest entry was forgotten, the newer ones are still refused.
        assert!(ledger.record(&supi(1), [1u8; 16]).await);
        assert!(!ledger.record(&supi(1), [3u8; 16]).await);
    }

    #[tokio::test]
    async fn test_nonce_ages_out() {
        let ledger = NonceLedger::new(8);
        ledger.record(&supi(1), [1u8; 16]).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        ledger.record(&supi(2), [2u8; 16]).await;

        assert_eq!(ledger.retain_younger_than(Duration::from_millis(10)).await, 1);
        assert!(ledger.record(&supi(1), [1u8; 16]).await);
        assert!(!ledger.record(&supi(2), [2u8; 16]).await);
    }
}
