//! Sync engine: live slide tree ↔ persisted slide HTML.
//!
//! The engine owns the parsed tree of the active slide plus the `baseline`,
//! the canonical emission of the last-known persisted content. Canvas
//! gestures arrive as [`EditMutation`]s and change the tree in place;
//! [`SyncEngine::commit`] serializes the tree and reports new content only
//! when it differs from the baseline. Synthetic ids the engine minted purely
//! to track elements are not, on their own, a change.

use deck_core::document::SlideDocument;
use deck_core::emitter::emit_fragment;
use deck_core::id::ElementId;
use deck_core::layout::{BoundsMap, Viewport, format_px, is_absolute, resolve_layout};
use deck_core::{NodeIndex, parse_fragment};
use kurbo::Rect;
use std::collections::{HashMap, HashSet};

pub struct SyncEngine {
    /// The live tree for the active slide.
    pub doc: SlideDocument,

    /// Resolved bounds, recomputed after every mutation.
    pub bounds: BoundsMap,

    pub viewport: Viewport,

    /// Canonical form of the last-known persisted content.
    baseline: String,

    /// Raw content as last handed to `load`.
    source: String,

    /// Ids assigned by the engine since the last commit or load.
    minted: HashSet<ElementId>,

    /// Host-measured boxes that override the static layout.
    measured: HashMap<ElementId, Rect>,
}

impl SyncEngine {
    pub fn from_content(content: &str, viewport: Viewport) -> Self {
        let doc = SlideDocument::parse(content);
        let baseline = emit_fragment(&doc);
        let bounds = resolve_layout(&doc, viewport);
        Self {
            doc,
            bounds,
            viewport,
            baseline,
            source: content.to_string(),
            minted: HashSet::new(),
            measured: HashMap::new(),
        }
    }

    /// Replace the live tree with persisted content. Returns `false` (and
    /// keeps the live tree) when the content is what the engine already holds.
    pub fn load(&mut self, content: &str) -> bool {
        if content == self.source || content == self.baseline {
            return false;
        }
        self.doc = SlideDocument::parse(content);
        self.baseline = emit_fragment(&self.doc);
        self.source = content.to_string();
        self.minted.clear();
        self.measured.clear();
        self.relayout();
        true
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// Recompute bounds, then apply measured overrides.
    pub fn relayout(&mut self) {
        self.bounds = resolve_layout(&self.doc, self.viewport);
        for (id, rect) in &self.measured {
            if let Some(idx) = self.doc.index_of(*id) {
                self.bounds.insert(idx, *rect);
            }
        }
    }

    /// Record a box measured by the host renderer for `id`.
    pub fn set_measured_bounds(&mut self, id: ElementId, rect: Rect) {
        self.measured.insert(id, rect);
        if let Some(idx) = self.doc.index_of(id) {
            self.bounds.insert(idx, rect);
        }
    }

    pub fn bounds_of(&self, id: ElementId) -> Option<Rect> {
        self.doc
            .index_of(id)
            .and_then(|idx| self.bounds.get(&idx).copied())
    }

    /// Id of the element at `idx`, minting a synthetic one when it has none.
    pub fn ensure_id(&mut self, idx: NodeIndex) -> Option<ElementId> {
        if let Some(id) = self.doc.id_of(idx) {
            return Some(id);
        }
        let id = self.doc.ensure_id(idx)?;
        self.minted.insert(id);
        Some(id)
    }

    /// Apply one mutation. Returns the id of the affected element afterwards
    /// (the clone for `Duplicate`, the replacement for `Replace`), or `None`
    /// when the target no longer exists and nothing changed.
    pub fn apply_mutation(&mut self, mutation: EditMutation) -> Option<ElementId> {
        let result = match mutation {
            EditMutation::Move { id, dx, dy } => {
                let idx = self.doc.index_of(id)?;
                let (left, top) = self.offset_in_parent(idx);
                self.doc.set_style_property(idx, "left", &format_px(left + dx));
                self.doc.set_style_property(idx, "top", &format_px(top + dy));
                Some(id)
            }
            EditMutation::Resize { id, width, height } => {
                let idx = self.doc.index_of(id)?;
                self.doc
                    .set_style_property(idx, "width", &format_px(width.max(1.0)));
                self.doc
                    .set_style_property(idx, "height", &format_px(height.max(1.0)));
                self.measured.remove(&id);
                Some(id)
            }
            EditMutation::Rotate { id, degrees } => {
                let idx = self.doc.index_of(id)?;
                let degrees = (degrees * 100.0).round() / 100.0;
                self.doc
                    .set_style_property(idx, "transform", &format!("rotate({degrees}deg)"));
                Some(id)
            }
            EditMutation::SetStyle {
                id,
                property,
                value,
            } => {
                let idx = self.doc.index_of(id)?;
                self.doc.set_style_property(idx, &property, &value);
                Some(id)
            }
            EditMutation::SetAttr { id, name, value } => {
                let idx = self.doc.index_of(id)?;
                self.doc.set_attr(idx, &name, &value);
                self.doc.id_of(idx)
            }
            EditMutation::SetText { id, text } => {
                let idx = self.doc.index_of(id)?;
                self.doc.set_text(idx, &text);
                Some(id)
            }
            EditMutation::SetInnerHtml { id, html } => {
                let idx = self.doc.index_of(id)?;
                self.doc.set_inner_html(idx, &html);
                Some(id)
            }
            EditMutation::Remove { id } => {
                let idx = self.doc.index_of(id)?;
                self.doc.remove_subtree(idx);
                self.measured.remove(&id);
                Some(id)
            }
            EditMutation::Duplicate { id, offset } => {
                let idx = self.doc.index_of(id)?;
                let style = self.doc.inline_style(idx);
                let left = style.px("left").unwrap_or(0.0);
                let top = style.px("top").unwrap_or(0.0);
                let clone = self.doc.duplicate_subtree(idx)?;
                self.doc.move_to_front(clone);
                if offset != 0.0 && is_absolute(&self.doc, clone) {
                    self.doc
                        .set_style_property(clone, "left", &format_px(left + offset));
                    self.doc
                        .set_style_property(clone, "top", &format_px(top + offset));
                }
                self.doc.ensure_id(clone)
            }
            EditMutation::BringToFront { id } => {
                let idx = self.doc.index_of(id)?;
                self.doc.move_to_front(idx).then_some(id)
            }
            EditMutation::SendToBack { id } => {
                let idx = self.doc.index_of(id)?;
                self.doc.move_to_back(idx).then_some(id)
            }
            EditMutation::Replace { id, html } => {
                let idx = self.doc.index_of(id)?;
                let fragment = parse_fragment(&html);
                let first = fragment.element_children(fragment.root).into_iter().next()?;
                let new_idx = self.doc.replace_subtree(idx, &fragment, first)?;
                self.measured.remove(&id);
                // Generated replacements often drop the id; keep the old one
                // so the element stays addressable and selected.
                match self.doc.id_of(new_idx) {
                    Some(new_id) => Some(new_id),
                    None => {
                        self.doc.set_attr(new_idx, "id", id.as_str());
                        Some(id)
                    }
                }
            }
        };
        self.relayout();
        result
    }

    /// Position relative to the parent box, from inline style when present,
    /// otherwise from resolved bounds.
    fn offset_in_parent(&self, idx: NodeIndex) -> (f64, f64) {
        let style = self.doc.inline_style(idx);
        let rect = self.bounds.get(&idx).copied().unwrap_or_default();
        let parent = self
            .doc
            .parent(idx)
            .and_then(|p| self.bounds.get(&p).copied())
            .unwrap_or_default();
        (
            style.px("left").unwrap_or(rect.x0 - parent.x0),
            style.px("top").unwrap_or(rect.y0 - parent.y0),
        )
    }

    /// Serialize the tree without editing artifacts.
    pub fn emit_clean(&self) -> String {
        let mut clean = self.doc.clone();
        clean.strip_editing_artifacts();
        emit_fragment(&clean)
    }

    /// Content to persist, or `None` when nothing changed since the baseline.
    /// Adopts the returned content as the new baseline.
    pub fn commit(&mut self) -> Option<String> {
        let html = self.emit_clean();
        if html == self.baseline {
            return None;
        }
        if !self.minted.is_empty() && self.emit_without_minted() == self.baseline {
            log::debug!("commit suppressed: only synthetic ids changed");
            return None;
        }
        self.baseline = html.clone();
        self.source = html.clone();
        self.minted.clear();
        Some(html)
    }

    fn emit_without_minted(&self) -> String {
        let mut clean = self.doc.clone();
        clean.strip_editing_artifacts();
        for id in &self.minted {
            if let Some(idx) = clean.index_of(*id) {
                clean.remove_attr(idx, "id");
            }
        }
        emit_fragment(&clean)
    }
}

/// Canvas-originated changes to the live tree.
#[derive(Debug, Clone, PartialEq)]
pub enum EditMutation {
    Move { id: ElementId, dx: f64, dy: f64 },
    Resize { id: ElementId, width: f64, height: f64 },
    Rotate { id: ElementId, degrees: f64 },
    SetStyle { id: ElementId, property: String, value: String },
    SetAttr { id: ElementId, name: String, value: String },
    SetText { id: ElementId, text: String },
    SetInnerHtml { id: ElementId, html: String },
    Remove { id: ElementId },
    /// Clone as the topmost sibling; absolute clones shift by `offset` px.
    Duplicate { id: ElementId, offset: f64 },
    BringToFront { id: ElementId },
    SendToBack { id: ElementId },
    /// Swap the element for the first element of `html`.
    Replace { id: ElementId, html: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SLIDE: &str = r#"<div class="absolute inset-0 bg-white"><h1 class="absolute text-7xl" id="title" style="left: 100px; top: 80px;">Hello</h1><p class="text-xl">Body</p></div>"#;

    fn engine() -> SyncEngine {
        SyncEngine::from_content(SLIDE, Viewport::default())
    }

    fn id(s: &str) -> ElementId {
        ElementId::intern(s)
    }

    #[test]
    fn untouched_commit_is_none() {
        let mut e = engine();
        assert_eq!(e.commit(), None);
    }

    #[test]
    fn move_commits_new_position() {
        let mut e = engine();
        e.apply_mutation(EditMutation::Move {
            id: id("title"),
            dx: 10.0,
            dy: -5.5,
        });
        let html = e.commit().unwrap();
        assert!(html.contains(r#"style="left: 110px; top: 74.5px;""#), "{html}");
        // Baseline adopted.
        assert_eq!(e.commit(), None);
    }

    #[test]
    fn minted_ids_alone_do_not_commit() {
        let mut e = engine();
        let p = e
            .doc
            .elements()
            .into_iter()
            .find(|&n| e.doc.is_tag(n, "p"))
            .unwrap();
        let pid = e.ensure_id(p).unwrap();
        assert!(pid.as_str().starts_with("el-"));
        assert_eq!(e.commit(), None);

        e.apply_mutation(EditMutation::SetText {
            id: pid,
            text: "Changed".into(),
        });
        let html = e.commit().unwrap();
        assert!(html.contains(&format!(r#"id="{pid}">Changed</p>"#)), "{html}");
    }

    #[test]
    fn editing_artifacts_never_reach_commit() {
        let mut e = engine();
        e.apply_mutation(EditMutation::SetAttr {
            id: id("title"),
            name: "contenteditable".into(),
            value: "true".into(),
        });
        assert_eq!(e.commit(), None);
    }

    #[test]
    fn load_skips_identical_content() {
        let mut e = engine();
        assert!(!e.load(SLIDE));
        assert!(e.load("<p id=\"x\">new</p>"));
        assert!(e.doc.index_of(id("x")).is_some());
        assert!(e.doc.index_of(id("title")).is_none());
    }

    #[test]
    fn duplicate_offsets_absolute_clone() {
        let mut e = engine();
        let clone = e
            .apply_mutation(EditMutation::Duplicate {
                id: id("title"),
                offset: 20.0,
            })
            .unwrap();
        assert_ne!(clone, id("title"));
        let idx = e.doc.index_of(clone).unwrap();
        let style = e.doc.inline_style(idx);
        assert_eq!(style.px("left"), Some(120.0));
        assert_eq!(style.px("top"), Some(100.0));
        // Appended as the topmost sibling.
        let parent = e.doc.parent(idx).unwrap();
        assert_eq!(e.doc.element_children(parent).last(), Some(&idx));
    }

    #[test]
    fn replace_without_element_is_noop() {
        let mut e = engine();
        assert_eq!(
            e.apply_mutation(EditMutation::Replace {
                id: id("title"),
                html: "just text".into(),
            }),
            None
        );
        assert_eq!(e.commit(), None);

        let new = e.apply_mutation(EditMutation::Replace {
            id: id("title"),
            html: r#"<h2 id="title2">New</h2>"#.into(),
        });
        assert_eq!(new, Some(id("title2")));
        assert!(e.commit().unwrap().contains("<h2 id=\"title2\">New</h2>"));
    }

    #[test]
    fn replacement_without_id_keeps_old_id() {
        let mut e = engine();
        let new = e.apply_mutation(EditMutation::Replace {
            id: id("title"),
            html: r#"<h2 class="absolute">Rewritten</h2>"#.into(),
        });
        assert_eq!(new, Some(id("title")));
        let idx = e.doc.index_of(id("title")).unwrap();
        assert!(e.doc.is_tag(idx, "h2"));
        let html = e.commit().unwrap();
        assert!(html.contains("Rewritten"), "{html}");
        assert!(html.contains(r#"id="title""#), "{html}");
    }

    #[test]
    fn measured_bounds_survive_relayout() {
        let mut e = engine();
        let rect = Rect::new(100.0, 80.0, 500.0, 180.0);
        e.set_measured_bounds(id("title"), rect);
        e.relayout();
        assert_eq!(e.bounds_of(id("title")), Some(rect));
    }
}
