//! Arena document tree for one slide's HTML.
//!
//! The slide content is held as a `StableDiGraph` whose nodes are HTML nodes
//! and whose edges go parent → child. Handles (`NodeIndex`) stay valid across
//! unrelated insertions and removals, so the editor can hold on to them for
//! the lifetime of a render. Element `id` attributes are indexed so that a
//! selection persisted as ids can be re-resolved after the content is
//! replaced wholesale (undo, AI rewrite).

use crate::id::ElementId;
use crate::parser::parse_fragment;
use crate::style::InlineStyle;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use smallvec::SmallVec;
use std::collections::HashMap;

/// The id of the element the editor renders slide content into.
pub const CANVAS_ROOT_ID: &str = "editor-canvas-root";

/// Classes of transient transform-control overlays that must never be persisted.
pub const OVERLAY_CLASSES: &[&str] = &["moveable-control", "moveable-control-box"];

// ─── Nodes ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Raw value as written (entities are not decoded).
    pub value: Option<String>,
    pub quote: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name as written.
    pub tag: String,
    pub attrs: SmallVec<[Attribute; 4]>,
    pub self_closing: bool,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: SmallVec::new(),
            self_closing: false,
        }
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(attr) = self
            .attrs
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            let quote = match attr.quote {
                Some(q) if !value.contains(q) => q,
                _ => '"',
            };
            attr.quote = Some(quote);
            attr.value = Some(escape_attr(value, quote));
        } else {
            self.attrs.push(Attribute {
                name: name.to_string(),
                value: Some(escape_attr(value, '"')),
                quote: Some('"'),
            });
        }
    }

    fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| !a.name.eq_ignore_ascii_case(name));
        self.attrs.len() != before
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlNode {
    /// The canvas root; never serialized itself.
    Root,
    Element(Element),
    /// Raw text as written (entities are not decoded).
    Text(String),
    Comment(String),
    Doctype(String),
}

// ─── Document ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SlideDocument {
    pub graph: StableDiGraph<HtmlNode, ()>,
    pub root: NodeIndex,
    /// `id` attribute → element. First occurrence in document order wins.
    pub id_index: HashMap<ElementId, NodeIndex>,
    child_order: HashMap<NodeIndex, Vec<NodeIndex>>,
}

impl Default for SlideDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SlideDocument {
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(HtmlNode::Root);
        let mut id_index = HashMap::new();
        id_index.insert(ElementId::intern(CANVAS_ROOT_ID), root);
        Self {
            graph,
            root,
            id_index,
            child_order: HashMap::new(),
        }
    }

    /// Parse an HTML fragment. Never fails.
    pub fn parse(html: &str) -> Self {
        parse_fragment(html)
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&HtmlNode> {
        self.graph.node_weight(idx)
    }

    pub fn contains(&self, idx: NodeIndex) -> bool {
        self.graph.contains_node(idx)
    }

    /// Append a node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeIndex, node: HtmlNode) -> NodeIndex {
        let len = self.children(parent).len();
        self.insert_node(parent, len, node)
    }

    /// Insert a node as child number `position` of `parent`.
    pub fn insert_node(&mut self, parent: NodeIndex, position: usize, node: HtmlNode) -> NodeIndex {
        let id = match &node {
            HtmlNode::Element(el) => el.attr("id").filter(|v| !v.is_empty()).map(ElementId::intern),
            _ => None,
        };
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        let order = self.child_order.entry(parent).or_default();
        let position = position.min(order.len());
        order.insert(position, idx);
        if let Some(id) = id {
            self.id_index.entry(id).or_insert(idx);
        }
        idx
    }

    /// Remove a node and everything below it.
    pub fn remove_subtree(&mut self, idx: NodeIndex) {
        if idx == self.root || !self.contains(idx) {
            return;
        }
        if let Some(parent) = self.parent(idx)
            && let Some(order) = self.child_order.get_mut(&parent)
        {
            order.retain(|&c| c != idx);
        }
        let mut doomed = self.descendants(idx);
        doomed.push(idx);
        for n in doomed {
            self.child_order.remove(&n);
            self.graph.remove_node(n);
        }
        self.rebuild_id_index();
    }

    /// Look up an element by its `id` attribute.
    pub fn index_of(&self, id: ElementId) -> Option<NodeIndex> {
        self.id_index
            .get(&id)
            .copied()
            .filter(|idx| self.contains(*idx))
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// Children in document order.
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.child_order.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn element_children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.children(idx)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    /// All nodes below `idx` in pre-order, excluding `idx` itself.
    pub fn descendants(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIndex> = self.children(idx).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// All elements in document order.
    pub fn elements(&self) -> Vec<NodeIndex> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.element(n).is_some())
            .collect()
    }

    pub fn element(&self, idx: NodeIndex) -> Option<&Element> {
        match self.graph.node_weight(idx)? {
            HtmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, idx: NodeIndex) -> Option<&mut Element> {
        match self.graph.node_weight_mut(idx)? {
            HtmlNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, idx: NodeIndex) -> Option<&str> {
        self.element(idx).map(|el| el.tag.as_str())
    }

    pub fn is_tag(&self, idx: NodeIndex, tag: &str) -> bool {
        self.element(idx).is_some_and(|el| el.is(tag))
    }

    pub fn attr(&self, idx: NodeIndex, name: &str) -> Option<&str> {
        self.element(idx)?.attr(name)
    }

    pub fn has_class(&self, idx: NodeIndex, class: &str) -> bool {
        self.element(idx).is_some_and(|el| el.has_class(class))
    }

    /// The element's id, if it carries a non-empty `id` attribute.
    pub fn id_of(&self, idx: NodeIndex) -> Option<ElementId> {
        if idx == self.root {
            return Some(ElementId::intern(CANVAS_ROOT_ID));
        }
        self.attr(idx, "id")
            .filter(|v| !v.is_empty())
            .map(ElementId::intern)
    }

    /// Set an attribute. Setting `id` re-indexes the element.
    pub fn set_attr(&mut self, idx: NodeIndex, name: &str, value: &str) {
        let Some(el) = self.element_mut(idx) else {
            return;
        };
        el.set_attr(name, value);
        if name.eq_ignore_ascii_case("id") {
            self.rebuild_id_index();
        }
    }

    pub fn remove_attr(&mut self, idx: NodeIndex, name: &str) -> bool {
        let removed = self
            .element_mut(idx)
            .is_some_and(|el| el.remove_attr(name));
        if removed && name.eq_ignore_ascii_case("id") {
            self.rebuild_id_index();
        }
        removed
    }

    /// Return the element's id, assigning a fresh synthetic one if it has none.
    /// Returns `None` for non-element nodes.
    pub fn ensure_id(&mut self, idx: NodeIndex) -> Option<ElementId> {
        if let Some(id) = self.id_of(idx) {
            return Some(id);
        }
        self.element(idx)?;
        let id = loop {
            let candidate = ElementId::generate();
            if !self.id_index.contains_key(&candidate) {
                break candidate;
            }
        };
        if let Some(el) = self.element_mut(idx) {
            el.set_attr("id", id.as_str());
        }
        self.id_index.insert(id, idx);
        Some(id)
    }

    /// Nearest ancestor-or-self element (below the root) satisfying `pred`.
    pub fn closest(
        &self,
        idx: NodeIndex,
        pred: impl Fn(&Self, NodeIndex) -> bool,
    ) -> Option<NodeIndex> {
        let mut cur = Some(idx);
        while let Some(n) = cur {
            if n == self.root {
                return None;
            }
            if self.element(n).is_some() && pred(self, n) {
                return Some(n);
            }
            cur = self.parent(n);
        }
        None
    }

    /// First descendant element (pre-order) satisfying `pred`.
    pub fn find_descendant(
        &self,
        idx: NodeIndex,
        pred: impl Fn(&Self, NodeIndex) -> bool,
    ) -> Option<NodeIndex> {
        self.descendants(idx)
            .into_iter()
            .find(|&n| self.element(n).is_some() && pred(self, n))
    }

    /// Concatenated, entity-decoded text below `idx` (like `textContent`).
    pub fn text_content(&self, idx: NodeIndex) -> String {
        let mut out = String::new();
        for n in self.descendants(idx) {
            if let Some(HtmlNode::Text(t)) = self.node(n) {
                out.push_str(&decode_entities(t));
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, idx: NodeIndex, text: &str) {
        self.clear_children(idx);
        if !text.is_empty() {
            self.append_child(idx, HtmlNode::Text(escape_text(text)));
        }
    }

    /// Replace all children with the parsed `html` fragment.
    pub fn set_inner_html(&mut self, idx: NodeIndex, html: &str) {
        self.clear_children(idx);
        let fragment = parse_fragment(html);
        for &child in fragment.children(fragment.root) {
            let pos = self.children(idx).len();
            self.graft(idx, pos, &fragment, child);
        }
        self.rebuild_id_index();
    }

    fn clear_children(&mut self, idx: NodeIndex) {
        for child in self.children(idx).to_vec() {
            self.remove_subtree(child);
        }
    }

    pub fn inline_style(&self, idx: NodeIndex) -> InlineStyle {
        InlineStyle::parse(self.attr(idx, "style").unwrap_or(""))
    }

    /// Set one CSS declaration in the element's `style` attribute.
    pub fn set_style_property(&mut self, idx: NodeIndex, property: &str, value: &str) {
        let mut style = self.inline_style(idx);
        style.set(property, value);
        self.set_attr(idx, "style", &style.to_string());
    }

    /// Copy the subtree at `src_idx` of `src` under `parent` at `position`.
    pub fn graft(
        &mut self,
        parent: NodeIndex,
        position: usize,
        src: &SlideDocument,
        src_idx: NodeIndex,
    ) -> NodeIndex {
        let node = src.graph[src_idx].clone();
        let idx = self.insert_node(parent, position, node);
        for (i, &child) in src.children(src_idx).iter().enumerate() {
            self.graft(idx, i, src, child);
        }
        idx
    }

    /// Replace the element at `idx` with a copy of `src_idx` from `src`,
    /// keeping its position among siblings. Returns the new handle.
    pub fn replace_subtree(
        &mut self,
        idx: NodeIndex,
        src: &SlideDocument,
        src_idx: NodeIndex,
    ) -> Option<NodeIndex> {
        let parent = self.parent(idx)?;
        let position = self.children(parent).iter().position(|&c| c == idx)?;
        self.remove_subtree(idx);
        let new_idx = self.graft(parent, position, src, src_idx);
        self.rebuild_id_index();
        Some(new_idx)
    }

    /// Clone `idx` as its next sibling. Ids inside the clone are re-minted so
    /// the id index stays unambiguous.
    pub fn duplicate_subtree(&mut self, idx: NodeIndex) -> Option<NodeIndex> {
        let parent = self.parent(idx)?;
        self.element(idx)?;
        let position = self.children(parent).iter().position(|&c| c == idx)? + 1;
        let snapshot = self.clone();
        let clone = self.graft(parent, position, &snapshot, idx);
        let mut cloned = self.descendants(clone);
        cloned.insert(0, clone);
        for n in cloned {
            if self.attr(n, "id").is_some_and(|v| !v.is_empty()) {
                self.remove_attr(n, "id");
                self.ensure_id(n);
            }
        }
        self.rebuild_id_index();
        Some(clone)
    }

    /// Paint last among siblings (topmost).
    pub fn move_to_front(&mut self, idx: NodeIndex) -> bool {
        self.reorder(idx, |order, pos| {
            let n = order.remove(pos);
            order.push(n);
        })
    }

    /// Paint first among siblings (bottommost).
    pub fn move_to_back(&mut self, idx: NodeIndex) -> bool {
        self.reorder(idx, |order, pos| {
            let n = order.remove(pos);
            order.insert(0, n);
        })
    }

    fn reorder(&mut self, idx: NodeIndex, f: impl FnOnce(&mut Vec<NodeIndex>, usize)) -> bool {
        let Some(parent) = self.parent(idx) else {
            return false;
        };
        let Some(order) = self.child_order.get_mut(&parent) else {
            return false;
        };
        let Some(pos) = order.iter().position(|&c| c == idx) else {
            return false;
        };
        let before = order.clone();
        f(order, pos);
        *order != before
    }

    /// Drop editing-only state: `contenteditable` markers and transform
    /// overlays injected by the canvas.
    pub fn strip_editing_artifacts(&mut self) {
        for n in self.elements() {
            if !self.contains(n) {
                continue;
            }
            if OVERLAY_CLASSES.iter().any(|c| self.has_class(n, c)) {
                self.remove_subtree(n);
                continue;
            }
            if let Some(el) = self.element_mut(n) {
                el.remove_attr("contenteditable");
            }
        }
    }

    fn rebuild_id_index(&mut self) {
        let mut index = HashMap::new();
        index.insert(ElementId::intern(CANVAS_ROOT_ID), self.root);
        for n in self.elements() {
            if let Some(id) = self.attr(n, "id").filter(|v| !v.is_empty()) {
                index.entry(ElementId::intern(id)).or_insert(n);
            }
        }
        self.id_index = index;
    }
}

// ─── Entities ────────────────────────────────────────────────────────────

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str, quote: char) -> String {
    match quote {
        '"' => s.replace('"', "&quot;"),
        '\'' => s.replace('\'', "&#39;"),
        _ => s.to_string(),
    }
}

/// Decode the handful of entities generated slides actually use.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&nbsp;", "\u{a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::emit_fragment;
    use pretty_assertions::assert_eq;

    #[test]
    fn ids_are_indexed() {
        let doc = SlideDocument::parse(r#"<div id="a"><p id="b">x</p></div>"#);
        let a = doc.index_of(ElementId::intern("a")).unwrap();
        let b = doc.index_of(ElementId::intern("b")).unwrap();
        assert_eq!(doc.parent(b), Some(a));
        assert_eq!(doc.parent(a), Some(doc.root));
    }

    #[test]
    fn ensure_id_assigns_once() {
        let mut doc = SlideDocument::parse("<p>x</p>");
        let p = doc.elements()[0];
        let id = doc.ensure_id(p).unwrap();
        assert_eq!(doc.ensure_id(p), Some(id));
        assert_eq!(doc.index_of(id), Some(p));
        assert_eq!(doc.attr(p, "id"), Some(id.as_str()));
    }

    #[test]
    fn remove_subtree_unindexes() {
        let mut doc = SlideDocument::parse(r#"<div id="a"><p id="b">x</p></div><span id="c"></span>"#);
        let a = doc.index_of(ElementId::intern("a")).unwrap();
        doc.remove_subtree(a);
        assert!(doc.index_of(ElementId::intern("a")).is_none());
        assert!(doc.index_of(ElementId::intern("b")).is_none());
        assert!(doc.index_of(ElementId::intern("c")).is_some());
        assert_eq!(emit_fragment(&doc), r#"<span id="c"></span>"#);
    }

    #[test]
    fn strip_artifacts() {
        let mut doc = SlideDocument::parse(
            r#"<p id="t" contenteditable="true">Hi</p><div class="moveable-control-box"><div class="moveable-control"></div></div>"#,
        );
        doc.strip_editing_artifacts();
        assert_eq!(emit_fragment(&doc), r#"<p id="t">Hi</p>"#);
    }

    #[test]
    fn duplicate_gets_fresh_ids() {
        let mut doc = SlideDocument::parse(r#"<div id="card" class="absolute"><p id="inner">x</p></div>"#);
        let card = doc.index_of(ElementId::intern("card")).unwrap();
        let clone = doc.duplicate_subtree(card).unwrap();
        assert_ne!(doc.id_of(clone), Some(ElementId::intern("card")));
        assert_eq!(doc.index_of(ElementId::intern("card")), Some(card));
        assert_eq!(doc.children(doc.root), &[card, clone]);
        assert_eq!(doc.text_content(clone), "x");
    }

    #[test]
    fn replace_keeps_position() {
        let mut doc = SlideDocument::parse(r#"<p id="a">1</p><p id="b">2</p><p id="c">3</p>"#);
        let incoming = SlideDocument::parse(r#"<h2 id="b2">two</h2>"#);
        let b = doc.index_of(ElementId::intern("b")).unwrap();
        doc.replace_subtree(b, &incoming, incoming.elements()[0]).unwrap();
        assert_eq!(
            emit_fragment(&doc),
            r#"<p id="a">1</p><h2 id="b2">two</h2><p id="c">3</p>"#
        );
        assert!(doc.index_of(ElementId::intern("b")).is_none());
    }

    #[test]
    fn z_order_moves() {
        let mut doc = SlideDocument::parse(r#"<i id="a"></i><i id="b"></i><i id="c"></i>"#);
        let a = doc.index_of(ElementId::intern("a")).unwrap();
        assert!(doc.move_to_front(a));
        assert!(!doc.move_to_front(a));
        assert_eq!(
            emit_fragment(&doc),
            r#"<i id="b"></i><i id="c"></i><i id="a"></i>"#
        );
        assert!(doc.move_to_back(a));
        assert_eq!(
            emit_fragment(&doc),
            r#"<i id="a"></i><i id="b"></i><i id="c"></i>"#
        );
    }

    #[test]
    fn text_roundtrip_escapes() {
        let mut doc = SlideDocument::parse("<p>old</p>");
        let p = doc.elements()[0];
        doc.set_text(p, "a < b & c");
        assert_eq!(emit_fragment(&doc), "<p>a &lt; b &amp; c</p>");
        assert_eq!(doc.text_content(p), "a < b & c");
    }

    #[test]
    fn set_attr_escapes_quotes() {
        let mut doc = SlideDocument::parse("<img src='a.png'>");
        let img = doc.elements()[0];
        doc.set_attr(img, "alt", "say \"hi\"");
        doc.set_attr(img, "src", "b.png");
        assert_eq!(
            emit_fragment(&doc),
            r#"<img src='b.png' alt="say &quot;hi&quot;">"#
        );
    }
}
