pub mod document;
pub mod emitter;
pub mod id;
pub mod layout;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod store;
pub mod style;

pub use document::{Attribute, CANVAS_ROOT_ID, Element, HtmlNode, SlideDocument};
pub use emitter::{emit_fragment, emit_inner, emit_outer};
pub use id::ElementId;
pub use layout::{BoundsMap, Viewport, resolve_layout};
pub use model::{Deck, DeckError, OutlineItem, Slide};
pub use parser::parse_fragment;
pub use petgraph::graph::NodeIndex;
pub use store::{DeckStore, MemoryStore, StoreError};
pub use style::InlineStyle;
