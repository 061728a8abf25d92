//! Editing session: one deck, its history, and the canvas for the active
//! slide.
//!
//! The session is the only place canvas commits meet history. After every
//! canvas operation it drains the commit outbox into `record_edit`; after
//! every history move it reloads the canvas, which re-resolves the
//! selection against the new content.

use crate::canvas::{Canvas, CanvasMode};
use crate::config::EditorConfig;
use crate::history::DeckHistory;
use crate::input::{InputEvent, Modifiers};
use crate::notice::Notice;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use deck_core::model::Deck;
use deck_core::store::DeckStore;
use std::time::Duration;

pub struct DeckSession<S: DeckStore> {
    history: DeckHistory<S>,
    canvas: Canvas,
    active: usize,
}

impl<S: DeckStore> DeckSession<S> {
    pub fn new(deck: Deck, store: S, config: EditorConfig) -> Self {
        let content = deck
            .slides
            .first()
            .map(|s| s.content.clone())
            .unwrap_or_default();
        Self {
            canvas: Canvas::new(&content, config.clone()),
            history: DeckHistory::new(deck, store, config.undo_depth),
            active: 0,
        }
    }

    pub fn deck(&self) -> &Deck {
        self.history.deck()
    }

    pub fn history(&self) -> &DeckHistory<S> {
        &self.history
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn active_slide(&self) -> usize {
        self.active
    }

    /// Run a canvas operation, then record whatever it committed.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Canvas) -> R) -> R {
        let result = f(&mut self.canvas);
        self.flush();
        result
    }

    fn flush(&mut self) {
        for content in self.canvas.take_commits() {
            if let Err(e) = self.history.record_edit(self.active, content) {
                log::warn!("dropping commit for slide {}: {e}", self.active);
            }
        }
    }

    fn active_content(&self) -> &str {
        self.history
            .deck()
            .slides
            .get(self.active)
            .map(|s| s.content.as_str())
            .unwrap_or_default()
    }

    /// Reload the canvas from the deck, keeping the active index in range.
    fn sync_canvas(&mut self) {
        let last = self.history.deck().slides.len().saturating_sub(1);
        if self.active > last {
            self.active = last;
            let content = self.active_content().to_string();
            self.canvas.navigate(&content);
        } else {
            let content = self.active_content().to_string();
            self.canvas.reload(&content);
        }
    }

    pub fn handle_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::Key { key, modifiers } => {
                self.handle_key(key, *modifiers);
            }
            _ => self.edit(|canvas| canvas.handle_event(event)),
        }
    }

    /// Apply a keyboard shortcut. Ignored while busy or while text is being
    /// edited.
    pub fn handle_key(&mut self, key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        if self.canvas.is_busy() || !matches!(self.canvas.mode(), CanvasMode::Idle) {
            return None;
        }
        let action = ShortcutMap::resolve(
            key,
            modifiers.ctrl,
            modifiers.shift,
            modifiers.alt,
            modifiers.meta,
        )?;
        match action {
            ShortcutAction::Undo => {
                self.undo();
            }
            ShortcutAction::Redo => {
                self.redo();
            }
            ShortcutAction::Delete => self.edit(Canvas::delete_selected),
            ShortcutAction::Duplicate => self.edit(Canvas::duplicate_selected),
            ShortcutAction::BringToFront => self.edit(Canvas::bring_to_front),
            ShortcutAction::SendToBack => self.edit(Canvas::send_to_back),
            ShortcutAction::Deselect => self.canvas.clear_selection(),
        }
        Some(action)
    }

    pub fn undo(&mut self) -> bool {
        self.flush();
        let moved = self.history.undo();
        if moved {
            self.sync_canvas();
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        self.flush();
        let moved = self.history.redo();
        if moved {
            self.sync_canvas();
        }
        moved
    }

    /// Show another slide. Out-of-range indices are ignored.
    pub fn navigate(&mut self, index: usize) {
        if index >= self.history.deck().slides.len() {
            return;
        }
        self.flush();
        self.active = index;
        let content = self.active_content().to_string();
        self.canvas.navigate(&content);
    }

    pub fn add_slide(&mut self) -> usize {
        self.flush();
        let index = self.history.add_slide();
        self.navigate(index);
        index
    }

    pub fn delete_slide(&mut self, index: usize) {
        self.flush();
        let next = self.history.delete_slide(index);
        self.navigate(next);
    }

    /// Content produced outside the canvas (an AI slide edit) for one slide.
    pub fn apply_slide_content(&mut self, index: usize, content: String) {
        self.flush();
        match self.history.record_edit(index, content) {
            Ok(true) if index == self.active => self.sync_canvas(),
            Ok(_) => {}
            Err(e) => log::warn!("slide edit rejected: {e}"),
        }
    }

    /// Whole-deck replacement (restyle), undoable as one step.
    pub fn replace_deck(&mut self, deck: Deck) {
        self.flush();
        self.history.replace_deck(deck);
        self.sync_canvas();
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.canvas.set_busy(busy);
    }

    /// Advance timers (text-edit blur grace).
    pub fn tick(&mut self, now: Duration) {
        self.edit(|canvas| canvas.tick(now));
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        let mut notices = self.canvas.take_notices();
        notices.extend(self.history.take_notices());
        notices
    }
}
