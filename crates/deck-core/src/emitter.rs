//! Serializer: [`SlideDocument`] → HTML text.
//!
//! Attribute values, text and comments are written back exactly as they were
//! read. Non-void elements always get an explicit end tag.

use crate::document::{Element, HtmlNode, SlideDocument};
use crate::lexer::is_void_element;
use petgraph::graph::NodeIndex;
use std::fmt::Write;

/// Emit the children of the canvas root.
pub fn emit_fragment(doc: &SlideDocument) -> String {
    emit_inner(doc, doc.root)
}

/// Emit the children of `idx` (like `innerHTML`).
pub fn emit_inner(doc: &SlideDocument, idx: NodeIndex) -> String {
    let mut out = String::new();
    for &child in doc.children(idx) {
        emit_node(doc, child, &mut out);
    }
    out
}

/// Emit `idx` itself and its subtree (like `outerHTML`).
pub fn emit_outer(doc: &SlideDocument, idx: NodeIndex) -> String {
    let mut out = String::new();
    if idx == doc.root {
        return emit_fragment(doc);
    }
    emit_node(doc, idx, &mut out);
    out
}

fn emit_node(doc: &SlideDocument, idx: NodeIndex, out: &mut String) {
    match doc.node(idx) {
        Some(HtmlNode::Element(el)) => {
            open_tag(el, out);
            if el.self_closing || is_void_element(&el.tag) {
                return;
            }
            for &child in doc.children(idx) {
                emit_node(doc, child, out);
            }
            let _ = write!(out, "</{}>", el.tag);
        }
        Some(HtmlNode::Text(text)) => out.push_str(text),
        Some(HtmlNode::Comment(text)) => {
            let _ = write!(out, "<!--{text}-->");
        }
        Some(HtmlNode::Doctype(text)) => {
            let _ = write!(out, "<!{text}>");
        }
        Some(HtmlNode::Root) => {
            for &child in doc.children(idx) {
                emit_node(doc, child, out);
            }
        }
        None => {}
    }
}

fn open_tag(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for attr in &el.attrs {
        out.push(' ');
        out.push_str(&attr.name);
        if let Some(value) = &attr.value {
            out.push('=');
            match attr.quote {
                Some(q) => {
                    out.push(q);
                    out.push_str(value);
                    out.push(q);
                }
                None => out.push_str(value),
            }
        }
    }
    out.push_str(if el.self_closing { " />" } else { ">" });
}
