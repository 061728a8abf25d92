use deck_core::layout::Viewport;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Editor tuning knobs. Every field has a default, so a partial config
/// deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub viewport: Viewport,
    /// Undo (and redo) depth.
    pub undo_depth: usize,
    /// How long a blurred text edit waits before it is closed, so toolbar
    /// clicks can refocus it.
    pub blur_grace: Duration,
    /// Offset applied to absolutely positioned duplicates, in px.
    pub duplicate_offset: f64,
    /// Smallest crop, in source-image pixels, along either axis.
    pub min_crop_px: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            undo_depth: 20,
            blur_grace: Duration::from_millis(200),
            duplicate_offset: 20.0,
            min_crop_px: 1.0,
        }
    }
}
