//! Deck data model.
//!
//! A `Deck` is an ordered list of `Slide`s plus theme and metadata. Each slide's
//! `content` is a self-contained HTML fragment laid out on a fixed 1920×1080
//! logical canvas. The deck is always persisted whole; there are no partial
//! updates.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// HTML inserted for a freshly added slide.
pub const BLANK_SLIDE_HTML: &str = r#"<div class="absolute inset-0 bg-white flex items-center justify-center"><h1 class="text-7xl">TITLE</h1></div>"#;

/// Fallback deck title when the outline offers none.
pub const UNTITLED_DECK: &str = "Untitled Presentation";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeckError {
    #[error("a deck must contain at least one slide")]
    Empty,
    #[error("cannot delete the last slide")]
    LastSlide,
    #[error("slide index {index} out of range (deck has {len} slides)")]
    SlideOutOfRange { index: usize, len: usize },
}

// ─── Slide ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub id: String,
    pub title: String,
    /// Self-contained HTML fragment for the 1920×1080 canvas.
    pub content: String,
}

impl Slide {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// A placeholder slide, as inserted by "add slide".
    pub fn blank() -> Self {
        Self::new("New", BLANK_SLIDE_HTML)
    }
}

// ─── Deck ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub title: String,
    pub slides: Vec<Slide>,
    /// Theme identifier from the external theme catalog.
    pub theme: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub updated_at: i64,
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Deck {
    /// Create a deck with a fresh id. Rejects an empty slide list.
    pub fn new(
        title: impl Into<String>,
        theme: impl Into<String>,
        slides: Vec<Slide>,
    ) -> Result<Self, DeckError> {
        if slides.is_empty() {
            return Err(DeckError::Empty);
        }
        let now = now_millis();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            slides,
            theme: theme.into(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    pub fn slide(&self, index: usize) -> Result<&Slide, DeckError> {
        self.slides.get(index).ok_or(DeckError::SlideOutOfRange {
            index,
            len: self.slides.len(),
        })
    }

    /// Overwrite one slide's HTML and bump `updated_at`.
    pub fn set_slide_content(&mut self, index: usize, content: String) -> Result<(), DeckError> {
        let len = self.slides.len();
        let slide = self
            .slides
            .get_mut(index)
            .ok_or(DeckError::SlideOutOfRange { index, len })?;
        slide.content = content;
        self.touch();
        Ok(())
    }

    /// Append a slide, returning its index.
    pub fn add_slide(&mut self, slide: Slide) -> usize {
        self.slides.push(slide);
        self.touch();
        self.slides.len() - 1
    }

    /// Remove a slide. A deck never drops to zero slides.
    pub fn delete_slide(&mut self, index: usize) -> Result<Slide, DeckError> {
        if index >= self.slides.len() {
            return Err(DeckError::SlideOutOfRange {
                index,
                len: self.slides.len(),
            });
        }
        if self.slides.len() <= 1 {
            return Err(DeckError::LastSlide);
        }
        let removed = self.slides.remove(index);
        self.touch();
        Ok(removed)
    }
}

// ─── Outline ─────────────────────────────────────────────────────────────

/// One entry of the outline stage; slides are generated 1:1 in this order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutlineItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub points: Vec<String>,
}

impl OutlineItem {
    /// Fill empty ids positionally as `slide-{i}`.
    pub fn assign_missing_ids(items: &mut [OutlineItem]) {
        for (i, item) in items.iter_mut().enumerate() {
            if item.id.is_empty() {
                item.id = format!("slide-{i}");
            }
        }
    }
}

/// Render the outline block that is handed to the slide generator.
pub fn format_outline(items: &[OutlineItem]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            format!(
                "Slide {}: {}\n   - Content Focus: {}",
                i + 1,
                item.title,
                item.points.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deck title from the first outline entry: the text after its last `": "`.
pub fn deck_title_from_outline(items: &[OutlineItem]) -> String {
    items
        .first()
        .and_then(|item| {
            let tail = item.title.rsplit(": ").next().unwrap_or(&item.title).trim();
            (!tail.is_empty()).then(|| tail.to_string())
        })
        .unwrap_or_else(|| UNTITLED_DECK.to_string())
}
