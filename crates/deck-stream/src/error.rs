use deck_core::model::DeckError;
use deck_core::store::StoreError;
use thiserror::Error;

/// Failures at the generation boundary. Pure stages (extractor, tokenizer)
/// never produce these; they degrade instead.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// HTTP 429 from the generative backend. Never retried.
    #[error("rate limit exceeded (429)")]
    RateLimited,

    /// Any other backend or transport failure. Retried with backoff.
    #[error("generation backend failed: {0}")]
    Backend(String),

    /// The finished stream is not a valid `{ "slides": [...] }` document.
    #[error("generated deck is not valid JSON: {0}")]
    MalformedStream(String),

    #[error("generated deck contains no slides")]
    EmptyDeck,

    /// The backend answered, but not with the structure that was asked for.
    #[error("invalid response structure: {0}")]
    InvalidResponse(String),

    #[error("AI service failed after {attempts} attempts. Last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<GenerateError>,
    },

    #[error(transparent)]
    Deck(#[from] DeckError),

    #[error("saving the deck failed: {0}")]
    Store(#[from] StoreError),
}

impl GenerateError {
    pub fn is_rate_limited(&self) -> bool {
        match self {
            GenerateError::RateLimited => true,
            GenerateError::RetriesExhausted { last, .. } => last.is_rate_limited(),
            _ => false,
        }
    }
}
