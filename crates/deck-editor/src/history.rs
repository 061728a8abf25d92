//! Deck history: bounded undo/redo over whole-deck snapshots.
//!
//! Every content edit enters through [`DeckHistory::record_edit`], which
//! snapshots the pre-edit deck before mutating, so each undo step restores
//! exactly one complete prior state. Persistence is optimistic: a failed
//! write leaves the in-memory deck and stacks as they are and raises a
//! warning notice.

use crate::notice::Notice;
use deck_core::model::{Deck, DeckError, Slide};
use deck_core::store::DeckStore;
use std::collections::VecDeque;

pub const SAVE_FAILED: &str = "Error saving changes.";

pub struct DeckHistory<S: DeckStore> {
    deck: Deck,
    /// Oldest first; the back is the most recent snapshot.
    undo: VecDeque<Deck>,
    /// The front is the next state to redo.
    redo: VecDeque<Deck>,
    depth: usize,
    store: S,
    notices: Vec<Notice>,
}

impl<S: DeckStore> DeckHistory<S> {
    pub fn new(deck: Deck, store: S, depth: usize) -> Self {
        Self {
            deck,
            undo: VecDeque::with_capacity(depth),
            redo: VecDeque::new(),
            depth: depth.max(1),
            store,
            notices: Vec::new(),
        }
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Snapshot the current deck. Evicts the oldest snapshot past the depth
    /// bound and clears redo.
    pub fn push_undo(&mut self) {
        self.push_undo_snapshot(self.deck.clone());
        self.redo.clear();
    }

    fn push_undo_snapshot(&mut self, deck: Deck) {
        self.undo.push_back(deck);
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
    }

    /// Restore the most recent snapshot. Returns `false` when there is none.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo.pop_back() else {
            return false;
        };
        let current = std::mem::replace(&mut self.deck, previous);
        self.redo.push_front(current);
        self.redo.truncate(self.depth);
        self.persist();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo.pop_front() else {
            return false;
        };
        let current = std::mem::replace(&mut self.deck, next);
        self.push_undo_snapshot(current);
        self.persist();
        true
    }

    /// Replace one slide's content as a single undoable step. Identical
    /// content is not an edit: returns `Ok(false)` and leaves history alone.
    pub fn record_edit(&mut self, index: usize, content: String) -> Result<bool, DeckError> {
        if self.deck.slide(index)?.content == content {
            return Ok(false);
        }
        self.push_undo();
        self.deck.set_slide_content(index, content)?;
        self.persist();
        Ok(true)
    }

    /// Swap in a whole new deck (restyle) as one undoable step.
    pub fn replace_deck(&mut self, deck: Deck) {
        self.push_undo();
        self.deck = deck;
        self.persist();
    }

    /// Append a blank slide and return its index. Not undoable.
    pub fn add_slide(&mut self) -> usize {
        let index = self.deck.add_slide(Slide::blank());
        self.persist();
        index
    }

    /// Remove a slide and return the index to show next. Not undoable. The
    /// last remaining slide is never removed.
    pub fn delete_slide(&mut self, index: usize) -> usize {
        match self.deck.delete_slide(index) {
            Ok(_) => {
                self.persist();
                index.saturating_sub(1)
            }
            Err(DeckError::LastSlide) => {
                self.notices.push(Notice::warning("Cannot delete last slide"));
                index
            }
            Err(e) => {
                log::warn!("delete_slide ignored: {e}");
                index.min(self.deck.slides.len() - 1)
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.put(&self.deck) {
            log::warn!("failed to persist deck {}: {e}", self.deck.id);
            self.notices.push(Notice::warning(SAVE_FAILED));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn deck() -> Deck {
        Deck::new(
            "History",
            "minimal",
            vec![Slide::new("a", "<p>0</p>"), Slide::new("b", "<p>b</p>")],
        )
        .unwrap()
    }

    #[test]
    fn undo_then_redo() {
        let store = MemoryStore::new();
        let mut h = DeckHistory::new(deck(), &store, 20);
        assert!(h.record_edit(0, "<p>1</p>".into()).unwrap());
        assert!(h.record_edit(0, "<p>2</p>".into()).unwrap());
        assert!(h.undo());
        assert_eq!(h.deck().slides[0].content, "<p>1</p>");
        assert!(h.undo());
        assert_eq!(h.deck().slides[0].content, "<p>0</p>");
        assert!(!h.undo());
        assert!(h.redo());
        assert!(h.redo());
        assert_eq!(h.deck().slides[0].content, "<p>2</p>");
        assert!(!h.redo());
        // 2 edits + 2 undos + 2 redos.
        assert_eq!(store.put_count(), 6);
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut h = DeckHistory::new(deck(), MemoryStore::new(), 20);
        h.record_edit(0, "<p>1</p>".into()).unwrap();
        h.undo();
        assert!(h.can_redo());
        h.record_edit(1, "<p>x</p>".into()).unwrap();
        assert!(!h.can_redo());
    }

    #[test]
    fn identical_content_is_not_recorded() {
        let store = MemoryStore::new();
        let mut h = DeckHistory::new(deck(), &store, 20);
        assert!(!h.record_edit(0, "<p>0</p>".into()).unwrap());
        assert_eq!(h.undo_len(), 0);
        assert_eq!(store.put_count(), 0);
    }

    #[test]
    fn out_of_range_edit_errors() {
        let mut h = DeckHistory::new(deck(), MemoryStore::new(), 20);
        assert_eq!(
            h.record_edit(9, String::new()),
            Err(DeckError::SlideOutOfRange { index: 9, len: 2 })
        );
        assert_eq!(h.undo_len(), 0);
    }

    #[test]
    fn failed_write_keeps_state_and_warns() {
        let store = MemoryStore::new();
        store.set_fail_puts(true);
        let mut h = DeckHistory::new(deck(), &store, 20);
        h.record_edit(0, "<p>1</p>".into()).unwrap();
        assert_eq!(h.deck().slides[0].content, "<p>1</p>");
        assert_eq!(h.undo_len(), 1);
        assert_eq!(h.take_notices(), vec![Notice::warning(SAVE_FAILED)]);
    }

    #[test]
    fn slide_add_and_delete() {
        let mut h = DeckHistory::new(deck(), MemoryStore::new(), 20);
        assert_eq!(h.add_slide(), 2);
        assert_eq!(h.delete_slide(2), 1);
        assert_eq!(h.delete_slide(0), 0);
        assert_eq!(h.deck().slides.len(), 1);
        assert_eq!(h.delete_slide(0), 0);
        assert_eq!(h.take_notices(), vec![Notice::warning("Cannot delete last slide")]);
        // Slide operations are not undoable.
        assert!(!h.can_undo());
    }
}
