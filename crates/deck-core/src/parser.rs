//! Tree builder: token stream → [`SlideDocument`].
//!
//! Tolerant by construction. Unknown end tags are dropped, unclosed elements
//! are closed at end of input, and a `<` that does not start a tag is text.

use crate::document::{Attribute, Element, HtmlNode, SlideDocument};
use crate::lexer::{StartTag, Token, is_void_element, lex};
use petgraph::graph::NodeIndex;

/// Parse an HTML fragment into a document rooted at the canvas root.
pub fn parse_fragment(html: &str) -> SlideDocument {
    let mut doc = SlideDocument::new();
    let root = doc.root;
    let mut open: Vec<NodeIndex> = vec![root];

    for spanned in lex(html) {
        let parent = open.last().copied().unwrap_or(root);
        match spanned.token {
            Token::Text(text) => {
                doc.append_child(parent, HtmlNode::Text(text.to_string()));
            }
            Token::Comment(text) => {
                doc.append_child(parent, HtmlNode::Comment(text.to_string()));
            }
            Token::Doctype(text) => {
                doc.append_child(parent, HtmlNode::Doctype(text.to_string()));
            }
            Token::StartTag(tag) => {
                let leaf = tag.self_closing || is_void_element(tag.name);
                let idx = doc.append_child(parent, HtmlNode::Element(element_from(&tag)));
                if !leaf {
                    open.push(idx);
                }
            }
            Token::EndTag(name) => {
                let matching = open
                    .iter()
                    .rposition(|&n| n != root && doc.is_tag(n, name));
                match matching {
                    Some(pos) => open.truncate(pos),
                    None => log::debug!(
                        "dropping stray </{name}> at {}..{}",
                        spanned.span.start,
                        spanned.span.end
                    ),
                }
            }
        }
    }
    doc
}

fn element_from(tag: &StartTag<'_>) -> Element {
    let mut el = Element::new(tag.name);
    el.self_closing = tag.self_closing;
    el.attrs = tag
        .attrs
        .iter()
        .map(|a| Attribute {
            name: a.name.to_string(),
            value: a.value.map(str::to_string),
            quote: a.quote,
        })
        .collect();
    el
}
