use crate::error::Result;
use crate::exchange::Exchange;
use crate::store::HistoryStore;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_MAX_CACHED_EXCHANGES: usize = 10;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Most recent exchanges kept in memory per session
    pub max_exchanges: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_exchanges: DEFAULT_MAX_CACHED_EXCHANGES,
        }
    }
}

#[derive(Default)]
struct CacheState {
    histories: HashMap<String, VecDeque<Exchange>>,
    last_access: HashMap<String, Instant>,
}

/// In-memory window over the persisted history of each active session.
///
/// Sessions are loaded from the store on first touch and every read or write
/// refreshes their last-access time. The cached list is always a suffix of
/// what the store holds for the session.
pub struct HistoryCache {
    store: Arc<dyn HistoryStore>,
    state: Mutex<CacheState>,
    max_exchanges: usize,
}

impl HistoryCache {
    pub fn new(store: Arc<dyn HistoryStore>, config: CacheConfig) -> Self {
        Self {
            store,
            state: Mutex::new(CacheState::default()),
            max_exchanges: config.max_exchanges.max(1),
        }
    }

    /// Up to `max_exchanges` of the most recent exchanges, oldest first.
    pub async fn get_context(&self, session_id: &str, max_exchanges: usize) -> Result<Vec<Exchange>> {
        self.with_session(session_id, |history| {
            let skip = history.len().saturating_sub(max_exchanges);
            history.iter().skip(skip).cloned().collect::<Vec<_>>()
        })
        .await
    }

    /// Persist a new exchange and add it to the cached window.
    ///
    /// The store assigns the index. When the write fails nothing is cached.
    pub async fn append(&self, session_id: &str, question: &str, answer: &str) -> Result<Exchange> {
        // Warm the cache first so the row written below is not loaded twice.
        self.with_session(session_id, |_| ()).await?;

        let exchange = self.store.append(session_id, question, answer).await?;

        let mut state = self.state.lock().await;
        let CacheState {
            histories,
            last_access,
        } = &mut *state;
        // Evicted or dropped while the write was in flight: the next read
        // loads it back from the store.
        if let Some(history) = histories.get_mut(session_id) {
            history.push_back(exchange.clone());
            while history.len() > self.max_exchanges {
                history.pop_front();
            }
            last_access.insert(session_id.to_string(), Instant::now());
        }

        debug!(session_id, index = exchange.index, "appended exchange");
        Ok(exchange)
    }

    /// Start the session over: empty window, no persisted rows.
    ///
    /// When the store cannot be cleared the session is dropped from memory,
    /// so the next access reloads whatever is still on disk.
    pub async fn reset(&self, session_id: &str) -> Result<usize> {
        let removed = match self.store.clear(session_id).await {
            Ok(removed) => removed,
            Err(err) => {
                self.drop_session(session_id).await;
                return Err(err);
            }
        };

        let mut state = self.state.lock().await;
        state
            .histories
            .insert(session_id.to_string(), VecDeque::new());
        state
            .last_access
            .insert(session_id.to_string(), Instant::now());

        info!(session_id, removed, "reset session history");
        Ok(removed)
    }

    /// Forget the session in memory only. Returns whether it was cached.
    pub async fn drop_session(&self, session_id: &str) -> bool {
        let mut state = self.state.lock().await;
        state.last_access.remove(session_id);
        let was_cached = state.histories.remove(session_id).is_some();
        if was_cached {
            debug!(session_id, "dropped session from history cache");
        }
        was_cached
    }

    /// Remove every session idle for longer than `max_idle` as of `now`.
    pub async fn evict_idle(&self, now: Instant, max_idle: Duration) -> Vec<String> {
        let mut state = self.state.lock().await;

        let expired: Vec<String> = state
            .last_access
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > max_idle)
            .map(|(session_id, _)| session_id.clone())
            .collect();

        for session_id in &expired {
            state.histories.remove(session_id);
            state.last_access.remove(session_id);
            debug!(session_id = %session_id, "evicted idle session");
        }

        expired
    }

    pub async fn is_cached(&self, session_id: &str) -> bool {
        self.state.lock().await.histories.contains_key(session_id)
    }

    /// Number of exchanges held in memory for the session, if cached.
    pub async fn cached_len(&self, session_id: &str) -> Option<usize> {
        self.state
            .lock()
            .await
            .histories
            .get(session_id)
            .map(VecDeque::len)
    }

    pub async fn last_access(&self, session_id: &str) -> Option<Instant> {
        self.state.lock().await.last_access.get(session_id).copied()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.histories.len()
    }

    /// Run `f` over the cached window, loading it from the store if needed.
    ///
    /// The lock is released while the store is read; if another task cached
    /// the session meanwhile its entry wins.
    async fn with_session<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut VecDeque<Exchange>) -> R,
    ) -> Result<R> {
        {
            let mut state = self.state.lock().await;
            let CacheState {
                histories,
                last_access,
            } = &mut *state;
            if let Some(history) = histories.get_mut(session_id) {
                last_access.insert(session_id.to_string(), Instant::now());
                return Ok(f(history));
            }
        }

        let loaded = self.store.load_recent(session_id, self.max_exchanges).await?;
        debug!(session_id, loaded = loaded.len(), "loaded session history from store");

        let mut state = self.state.lock().await;
        let CacheState {
            histories,
            last_access,
        } = &mut *state;
        let history = histories
            .entry(session_id.to_string())
            .or_insert_with(|| VecDeque::from(loaded));
        last_access.insert(session_id.to_string(), Instant::now());
        Ok(f(history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HistoryError;
    use crate::store::SqliteHistoryStore;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// SQLite store whose `clear` always fails.
    struct NoClearStore(SqliteHistoryStore);

    #[async_trait]
    impl HistoryStore for NoClearStore {
        async fn append(&self, session_id: &str, question: &str, answer: &str) -> Result<Exchange> {
            self.0.append(session_id, question, answer).await
        }

        async fn load(&self, session_id: &str) -> Result<Vec<Exchange>> {
            self.0.load(session_id).await
        }

        async fn load_recent(&self, session_id: &str, limit: usize) -> Result<Vec<Exchange>> {
            self.0.load_recent(session_id, limit).await
        }

        async fn clear(&self, _session_id: &str) -> Result<usize> {
            Err(HistoryError::Worker("disk gone".into()))
        }

        async fn count(&self, session_id: &str) -> Result<usize> {
            self.0.count(session_id).await
        }
    }

    fn temp_cache() -> (TempDir, Arc<SqliteHistoryStore>, HistoryCache) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteHistoryStore::open(dir.path().join("historico.db")).unwrap());
        let cache = HistoryCache::new(store.clone(), CacheConfig::default());
        (dir, store, cache)
    }

    #[tokio::test]
    async fn test_get_context_returns_most_recent_suffix() {
        let (_dir, _store, cache) = temp_cache();
        for i in 0..3 {
            cache.append("s1", &format!("q{i}"), &format!("a{i}")).await.unwrap();
        }

        let context = cache.get_context("s1", 5).await.unwrap();
        assert_eq!(context.len(), 3);

        let context = cache.get_context("s1", 2).await.unwrap();
        let questions: Vec<_> = context.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q2"]);
    }

    #[tokio::test]
    async fn test_window_is_bounded() {
        let (_dir, store, cache) = temp_cache();
        for i in 0..15 {
            cache.append("s1", &format!("q{i}"), &format!("a{i}")).await.unwrap();
            assert!(cache.cached_len("s1").await.unwrap() <= DEFAULT_MAX_CACHED_EXCHANGES);
        }

        let window = cache.get_context("s1", usize::MAX).await.unwrap();
        let indices: Vec<_> = window.iter().map(|e| e.index).collect();
        assert_eq!(indices, (5..15).collect::<Vec<_>>());
        assert_eq!(store.count("s1").await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_indices_keep_growing_after_truncation() {
        let (_dir, store, cache) = temp_cache();
        for i in 0..12 {
            let exchange = cache.append("s1", &format!("q{i}"), "a").await.unwrap();
            assert_eq!(exchange.index, i);
        }

        let persisted = store.load("s1").await.unwrap();
        let questions: Vec<_> = persisted.iter().map(|e| e.question.clone()).collect();
        let expected: Vec<_> = (0..12).map(|i| format!("q{i}")).collect();
        assert_eq!(questions, expected);
    }

    #[tokio::test]
    async fn test_last_access_refreshed_on_read() {
        let (_dir, _store, cache) = temp_cache();
        cache.append("s1", "q", "a").await.unwrap();
        let first = cache.last_access("s1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.get_context("s1", 5).await.unwrap();
        let second = cache.last_access("s1").await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_unknown_session_looks_new() {
        let (_dir, _store, cache) = temp_cache();
        assert!(cache.get_context("nobody", 5).await.unwrap().is_empty());
        assert_eq!(cache.cached_len("nobody").await, Some(0));
    }

    #[tokio::test]
    async fn test_evict_idle_respects_threshold() {
        let (_dir, _store, cache) = temp_cache();
        let max_idle = Duration::from_secs(3600);

        cache.get_context("old", 5).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.get_context("fresh", 5).await.unwrap();
        let old_seen = cache.last_access("old").await.unwrap();

        // Exactly at the threshold nothing goes
        let evicted = cache.evict_idle(old_seen + max_idle, max_idle).await;
        assert!(evicted.is_empty());

        let evicted = cache
            .evict_idle(old_seen + max_idle + Duration::from_millis(5), max_idle)
            .await;
        assert_eq!(evicted, vec!["old".to_string()]);
        assert!(!cache.is_cached("old").await);
        assert!(cache.last_access("old").await.is_none());
        assert!(cache.is_cached("fresh").await);
    }

    #[tokio::test]
    async fn test_drop_session_keeps_store() {
        let (_dir, store, cache) = temp_cache();
        cache.append("s1", "q", "a").await.unwrap();

        assert!(cache.drop_session("s1").await);
        assert!(!cache.drop_session("s1").await);
        assert!(!cache.is_cached("s1").await);
        assert_eq!(store.count("s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_cache_in_line_with_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteHistoryStore::open(dir.path().join("historico.db")).unwrap();
        let cache = HistoryCache::new(Arc::new(NoClearStore(store)), CacheConfig::default());
        cache.append("s1", "q0", "a0").await.unwrap();
        cache.append("s1", "q1", "a1").await.unwrap();

        assert!(cache.reset("s1").await.is_err());
        assert!(!cache.is_cached("s1").await);

        // The rows survived on disk, so the window must still show them
        let context = cache.get_context("s1", 5).await.unwrap();
        let questions: Vec<_> = context.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q0", "q1"]);
    }
}
