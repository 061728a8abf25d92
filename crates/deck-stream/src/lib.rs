pub mod assets;
pub mod error;
pub mod extract;
pub mod generate;
pub mod reader;

pub use assets::{AssetConfig, PlaceholderMap, TokenizeScope, Tokenizer, detokenize, tokenize};
pub use error::GenerateError;
pub use extract::{Extraction, SlideDraft, extract, finalize};
pub use generate::{
    ChunkStream, DeckRequest, EditContext, Generator, InputMode, OutlineRequest, RefineAction,
    RetryPolicy, create_outline, edit_content, generate_deck, refine_text, restyle_deck,
};
pub use reader::{StreamProgress, StreamReader};
