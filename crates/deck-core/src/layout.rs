//! Static geometry over the logical slide canvas.
//!
//! Resolves a `kurbo::Rect` per element from what the markup states
//! explicitly: inline `left/top/width/height`, `inset-0`, and Tailwind
//! arbitrary-value classes such as `w-[640px]`. Anything unstated falls back
//! to the parent box. Hosts that can measure real rendered boxes override
//! these through [`BoundsMap::insert`].

use crate::document::SlideDocument;
pub use crate::style::{InlineStyle, format_px, parse_px};
use kurbo::Rect;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type BoundsMap = HashMap<NodeIndex, Rect>;

/// The logical canvas every slide is authored against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

impl Viewport {
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Resolve bounds for the root and every element.
pub fn resolve_layout(doc: &SlideDocument, viewport: Viewport) -> BoundsMap {
    let mut bounds = BoundsMap::new();
    bounds.insert(doc.root, viewport.rect());
    resolve_children(doc, doc.root, &mut bounds);
    bounds
}

fn resolve_children(doc: &SlideDocument, parent: NodeIndex, bounds: &mut BoundsMap) {
    let parent_rect = bounds.get(&parent).copied().unwrap_or_default();
    for child in doc.element_children(parent) {
        let rect = element_rect(doc, child, parent_rect);
        bounds.insert(child, rect);
        resolve_children(doc, child, bounds);
    }
}

fn element_rect(doc: &SlideDocument, idx: NodeIndex, parent: Rect) -> Rect {
    if doc.has_class(idx, "inset-0") {
        return parent;
    }
    let style = doc.inline_style(idx);
    if style.get("inset").and_then(parse_px) == Some(0.0) {
        return parent;
    }
    let length = |prop: &str, class: &str| style.px(prop).or_else(|| class_px(doc, idx, class));

    let width = length("width", "w").unwrap_or(parent.width());
    let height = length("height", "h").unwrap_or(parent.height());
    let x = match (length("left", "left"), length("right", "right")) {
        (Some(left), _) => parent.x0 + left,
        (None, Some(right)) => parent.x1 - right - width,
        (None, None) => parent.x0,
    };
    let y = match (length("top", "top"), length("bottom", "bottom")) {
        (Some(top), _) => parent.y0 + top,
        (None, Some(bottom)) => parent.y1 - bottom - height,
        (None, None) => parent.y0,
    };
    Rect::new(x, y, x + width.max(0.0), y + height.max(0.0))
}

/// `prefix-[Npx]` arbitrary-value utility class.
fn class_px(doc: &SlideDocument, idx: NodeIndex, prefix: &str) -> Option<f64> {
    let el = doc.element(idx)?;
    el.classes().find_map(|class| {
        let value = class
            .strip_prefix(prefix)?
            .strip_prefix("-[")?
            .strip_suffix(']')?;
        parse_px(value)
    })
}

/// Is the element positioned absolutely, by class or inline style?
pub fn is_absolute(doc: &SlideDocument, idx: NodeIndex) -> bool {
    doc.has_class(idx, "absolute")
        || doc
            .inline_style(idx)
            .get("position")
            .is_some_and(|p| p.eq_ignore_ascii_case("absolute"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ElementId;
    use pretty_assertions::assert_eq;

    fn rect_of(doc: &SlideDocument, bounds: &BoundsMap, id: &str) -> Rect {
        bounds[&doc.index_of(ElementId::intern(id)).unwrap()]
    }

    #[test]
    fn inline_px_relative_to_parent() {
        let doc = SlideDocument::parse(
            r#"<div id="card" class="absolute" style="left: 100px; top: 50px; width: 400px; height: 300px;"><p id="t" class="absolute" style="left: 10px; top: 20px; width: 50px; height: 10px;">x</p></div>"#,
        );
        let b = resolve_layout(&doc, Viewport::default());
        assert_eq!(rect_of(&doc, &b, "card"), Rect::new(100.0, 50.0, 500.0, 350.0));
        assert_eq!(rect_of(&doc, &b, "t"), Rect::new(110.0, 70.0, 160.0, 80.0));
    }

    #[test]
    fn inset_zero_fills_parent() {
        let doc = SlideDocument::parse(r#"<div id="bg" class="absolute inset-0"></div>"#);
        let b = resolve_layout(&doc, Viewport::default());
        assert_eq!(rect_of(&doc, &b, "bg"), Rect::new(0.0, 0.0, 1920.0, 1080.0));
    }

    #[test]
    fn arbitrary_value_classes() {
        let doc = SlideDocument::parse(
            r#"<img id="i" class="absolute left-[40px] top-[60px] w-[200px] h-[100px]">"#,
        );
        let b = resolve_layout(&doc, Viewport::default());
        assert_eq!(rect_of(&doc, &b, "i"), Rect::new(40.0, 60.0, 240.0, 160.0));
    }

    #[test]
    fn right_bottom_anchor() {
        let doc = SlideDocument::parse(
            r#"<div id="d" style="position: absolute; right: 20px; bottom: 10px; width: 100px; height: 50px;"></div>"#,
        );
        let b = resolve_layout(&doc, Viewport::default());
        assert_eq!(rect_of(&doc, &b, "d"), Rect::new(1800.0, 1020.0, 1900.0, 1070.0));
        assert!(is_absolute(&doc, doc.index_of(ElementId::intern("d")).unwrap()));
    }
}
