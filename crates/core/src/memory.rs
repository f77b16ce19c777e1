use crate::models::Exchange;
use chrono::Utc;
use lru::LruCache;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_MAX_HISTORY: usize = 5;

/// Sessions kept before the least recently used one is evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Exchanges rendered into the prompt preamble.
pub const CONTEXT_WINDOW: usize = 3;

/// Bounded FIFO log of one conversation's exchanges.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    max_history: usize,
    history: VecDeque<Exchange>,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ConversationMemory {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            history: VecDeque::with_capacity(max_history.saturating_add(1)),
        }
    }

    pub fn add_exchange(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.history.push_back(Exchange {
            query: query.into(),
            answer: answer.into(),
            timestamp: Utc::now(),
        });
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// The last few exchanges, oldest first, or an empty string when there is
    /// no history yet.
    pub fn get_context(&self) -> String {
        if self.history.is_empty() {
            return String::new();
        }

        let skip = self.history.len().saturating_sub(CONTEXT_WINDOW);
        let mut context = String::from("Previous conversation:\n");
        for exchange in self.history.iter().skip(skip) {
            context.push_str("Q: ");
            context.push_str(&exchange.query);
            context.push_str("\nA: ");
            context.push_str(&exchange.answer);
            context.push_str("\n\n");
        }
        context
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.history.iter()
    }

    pub fn last_exchange(&self) -> Option<&Exchange> {
        self.history.back()
    }
}

pub type SessionHandle = Arc<Mutex<ConversationMemory>>;

/// Per-session memories, bounded by an LRU over session ids. Each session
/// gets its own lock so commits within a session serialize while separate
/// sessions never contend past the lookup.
#[derive(Debug, Clone)]
pub struct SessionStore {
    max_history: usize,
    sessions: Arc<Mutex<LruCache<String, SessionHandle>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    /// A zero `max_sessions` is treated as one.
    pub fn new(max_history: usize, max_sessions: usize) -> Self {
        let capacity = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_history,
            sessions: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Gets or creates the session, marking it most recently used. Creating
    /// one past capacity evicts the least recently used session.
    pub async fn session(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(session_id) {
            return Arc::clone(handle);
        }

        let handle = Arc::new(Mutex::new(ConversationMemory::new(self.max_history)));
        if let Some((evicted, _)) = sessions.push(session_id.to_string(), Arc::clone(&handle)) {
            debug!(session_id = %evicted, "evicted least recently used session");
        }
        handle
    }

    /// Looks a session up without creating it or touching its recency.
    pub async fn existing(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.lock().await.peek(session_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn capacity(&self) -> usize {
        self.sessions.lock().await.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_memory_renders_nothing() {
        assert_eq!(ConversationMemory::default().get_context(), "");
    }

    #[test]
    fn eviction_keeps_the_most_recent_entries_in_order() {
        let mut memory = ConversationMemory::new(5);
        for index in 1..=8 {
            memory.add_exchange(format!("q{index}"), format!("a{index}"));
            assert!(memory.len() <= 5);
        }

        let kept: Vec<&str> = memory.exchanges().map(|e| e.query.as_str()).collect();
        assert_eq!(kept, vec!["q4", "q5", "q6", "q7", "q8"]);
    }

    #[test]
    fn context_renders_last_three_oldest_first() {
        let mut memory = ConversationMemory::new(5);
        for index in 1..=6 {
            memory.add_exchange(format!("q{index}"), format!("a{index}"));
        }

        assert_eq!(
            memory.get_context(),
            "Previous conversation:\nQ: q4\nA: a4\n\nQ: q5\nA: a5\n\nQ: q6\nA: a6\n\n"
        );
    }

    #[test]
    fn context_with_fewer_than_three_renders_all() {
        let mut memory = ConversationMemory::new(5);
        memory.add_exchange("কে?", "অনুপম");
        assert_eq!(memory.get_context(), "Previous conversation:\nQ: কে?\nA: অনুপম\n\n");
    }

    #[test]
    fn zero_capacity_never_keeps_history() {
        let mut memory = ConversationMemory::new(0);
        memory.add_exchange("q", "a");
        assert!(memory.is_empty());
        assert_eq!(memory.get_context(), "");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new(2, 8);
        store.session("a").await.lock().await.add_exchange("q", "a");

        assert_eq!(store.session("a").await.lock().await.len(), 1);
        assert_eq!(store.session("b").await.lock().await.len(), 0);
        assert!(store.existing("c").await.is_none());
        assert_eq!(store.session_count().await, 2);
    }

    #[tokio::test]
    async fn least_recently_used_session_is_evicted() {
        let store = SessionStore::new(5, 2);
        store.session("a").await.lock().await.add_exchange("q", "a");
        store.session("b").await;
        // touching "a" leaves "b" as the oldest
        store.session("a").await;
        store.session("c").await;

        assert_eq!(store.session_count().await, 2);
        assert!(store.existing("b").await.is_none());
        let kept = store.existing("a").await.expect("a survives");
        assert_eq!(kept.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn looking_up_a_session_does_not_create_it() {
        let store = SessionStore::default();
        assert!(store.existing("ghost").await.is_none());
        assert_eq!(store.session_count().await, 0);
        assert_eq!(store.capacity().await, DEFAULT_MAX_SESSIONS);
    }

    #[tokio::test]
    async fn zero_session_capacity_keeps_one() {
        let store = SessionStore::new(5, 0);
        assert_eq!(store.capacity().await, 1);
    }
}
