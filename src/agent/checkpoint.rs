//! Conversation state store keyed by thread id.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::message::Message;

/// Store for per-thread message history.
pub trait Checkpointer: Send + Sync {
    /// Full history of a thread; empty for an unknown thread.
    fn load(&self, thread_id: &str) -> Vec<Message>;

    /// Replace the history of a thread.
    fn save(&self, thread_id: &str, messages: Vec<Message>);
}

#[derive(Debug, Clone)]
struct Checkpoint {
    messages: Vec<Message>,
    updated_at: DateTime<Utc>,
}

/// In-memory checkpointer. History lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySaver {
    threads: Mutex<HashMap<String, Checkpoint>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the thread was last saved.
    #[cfg(test)]
    fn updated_at(&self, thread_id: &str) -> Option<DateTime<Utc>> {
        self.lock().get(thread_id).map(|c| c.updated_at)
    }

    /// Number of threads with saved history.
    #[cfg(test)]
    fn thread_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Checkpoint>> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.threads.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Checkpointer for MemorySaver {
    fn load(&self, thread_id: &str) -> Vec<Message> {
        self.lock()
            .get(thread_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    fn save(&self, thread_id: &str, messages: Vec<Message>) {
        let count = messages.len();
        let previous = self.lock().insert(
            thread_id.to_string(),
            Checkpoint {
                messages,
                updated_at: Utc::now(),
            },
        );
        match previous {
            Some(previous) => debug!(
                "Thread {} saved: {} message(s), previous save at {}",
                thread_id,
                count,
                previous.updated_at.to_rfc3339()
            ),
            None => debug!("Thread {} created: {} message(s)", thread_id, count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_thread_is_empty() {
        let saver = MemorySaver::new();
        assert!(saver.load("nope").is_empty());
        assert!(saver.updated_at("nope").is_none());
    }

    #[test]
    fn test_threads_are_isolated() {
        let saver = MemorySaver::new();
        saver.save("a", vec![Message::user("one")]);
        saver.save("b", vec![Message::user("two"), Message::assistant("2")]);

        assert_eq!(saver.load("a").len(), 1);
        assert_eq!(saver.load("b").len(), 2);
        assert_eq!(saver.thread_count(), 2);
        assert!(saver.updated_at("a").is_some());
    }

    #[test]
    fn test_save_replaces_history() {
        let saver = MemorySaver::new();
        saver.save("a", vec![Message::user("one")]);
        saver.save("a", vec![Message::user("one"), Message::assistant("1")]);

        assert_eq!(saver.load("a").last().unwrap().content, "1");
        assert_eq!(saver.thread_count(), 1);
    }
}
