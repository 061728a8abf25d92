//! Persistence collaborator: whole-deck get/put keyed by deck id.

use crate::model::Deck;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {0}")]
    WriteFailed(String),
}

/// A key-value deck store. Writes are whole-deck overwrites; last write wins.
pub trait DeckStore {
    fn get(&self, deck_id: &str) -> Result<Option<Deck>, StoreError>;
    fn put(&self, deck: &Deck) -> Result<(), StoreError>;
}

impl<S: DeckStore + ?Sized> DeckStore for &S {
    fn get(&self, deck_id: &str) -> Result<Option<Deck>, StoreError> {
        (**self).get(deck_id)
    }

    fn put(&self, deck: &Deck) -> Result<(), StoreError> {
        (**self).put(deck)
    }
}

/// In-memory store. `fail_puts` makes every write fail, for exercising the
/// optimistic-update paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    decks: Mutex<HashMap<String, Deck>>,
    fail_puts: AtomicBool,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::Relaxed);
    }

    /// Number of `put` calls so far, failed ones included.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.decks.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeckStore for MemoryStore {
    fn get(&self, deck_id: &str) -> Result<Option<Deck>, StoreError> {
        let decks = self
            .decks
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(decks.get(deck_id).cloned())
    }

    fn put(&self, deck: &Deck) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if self.fail_puts.load(Ordering::Relaxed) {
            return Err(StoreError::WriteFailed("injected failure".into()));
        }
        let mut decks = self
            .decks
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        decks.insert(deck.id.clone(), deck.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Slide;

    #[test]
    fn put_then_get() {
        let store = MemoryStore::new();
        let deck = Deck::new("d", "t", vec![Slide::blank()]).unwrap();
        store.put(&deck).unwrap();
        assert_eq!(store.get(&deck.id).unwrap(), Some(deck));
        assert_eq!(store.get("missing").unwrap(), None);
        assert_eq!(store.put_count(), 1);
    }

    #[test]
    fn injected_failure() {
        let store = MemoryStore::new();
        store.set_fail_puts(true);
        let deck = Deck::new("d", "t", vec![Slide::blank()]).unwrap();
        assert!(store.put(&deck).is_err());
        assert!(store.is_empty());
        assert_eq!(store.put_count(), 1);
    }
}
