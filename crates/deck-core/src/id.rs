//! Element ids.
//!
//! Slide HTML addresses elements by their `id` attribute. Selection, undo
//! restoration and AI element edits all key on it, so ids are interned once
//! and compared as integers afterwards.

use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

static NEXT_SYNTHETIC: AtomicU64 = AtomicU64::new(0);

/// An HTML `id` attribute value.
///
/// Generated slides often leave elements without an id; the editor assigns
/// `el-N` ids to those when they are first selected, and the id is written
/// back into the markup on the next save.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(Spur);

impl ElementId {
    pub fn intern(s: &str) -> Self {
        ElementId(INTERNER.get_or_intern(s))
    }

    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Next `el-N` id. Not checked against any document; use
    /// [`crate::document::SlideDocument::ensure_id`] to assign one to an
    /// element.
    pub fn generate() -> Self {
        let n = NEXT_SYNTHETIC.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("el-{n}"))
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Serialized as the bare attribute value, e.g. in selection lists handed to
// the browser.
impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(ElementId::intern(&value))
    }
}
