//! Hit testing: point → element and rectangle → elements.
//!
//! Walks children in reverse order (last painted = topmost) and prefers the
//! deepest element under the point.

use deck_core::NodeIndex;
use deck_core::document::SlideDocument;
use deck_core::layout::BoundsMap;
use kurbo::{Point, Rect};

/// Topmost, deepest element containing `point`. `None` means background.
pub fn hit_test(doc: &SlideDocument, bounds: &BoundsMap, point: Point) -> Option<NodeIndex> {
    hit_test_node(doc, doc.root, bounds, point)
}

fn hit_test_node(
    doc: &SlideDocument,
    idx: NodeIndex,
    bounds: &BoundsMap,
    point: Point,
) -> Option<NodeIndex> {
    for &child in doc.element_children(idx).iter().rev() {
        if let Some(hit) = hit_test_node(doc, child, bounds, point) {
            return Some(hit);
        }
    }
    if idx == doc.root {
        return None;
    }
    bounds
        .get(&idx)
        .filter(|b| b.contains(point))
        .map(|_| idx)
}

/// Strict overlap: touching edges do not count.
pub fn intersects(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && a.x1 > b.x0 && a.y0 < b.y1 && a.y1 > b.y0
}

/// All elements (document order) whose bounds overlap `rect`.
pub fn hit_test_rect(doc: &SlideDocument, bounds: &BoundsMap, rect: Rect) -> Vec<NodeIndex> {
    doc.elements()
        .into_iter()
        .filter(|idx| bounds.get(idx).is_some_and(|b| intersects(*b, rect)))
        .collect()
}
