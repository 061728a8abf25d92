//! Generation orchestration: the generator seam, retry policy, final deck
//! assembly and the AI edit/restyle passes around the asset tokenizer.

use crate::assets::{AssetConfig, TokenizeScope, Tokenizer, detokenize, resolve_generated_assets};
use crate::error::GenerateError;
use crate::extract::{SlideDraft, finalize, strip_code_fence};
use crate::reader::{StreamProgress, StreamReader};
use async_trait::async_trait;
use deck_core::model::{Deck, OutlineItem, Slide, deck_title_from_outline, format_outline};
use deck_core::store::DeckStore;
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text chunks of a streamed generation.
pub type ChunkStream = BoxStream<'static, Result<String, GenerateError>>;

/// Where the outline stage gets its material from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Prompt,
    Text,
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineRequest {
    pub mode: InputMode,
    pub input: String,
}

/// Everything the slide stage needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckRequest {
    pub title: String,
    pub outline: Vec<OutlineItem>,
    pub theme: String,
    pub mode: String,
    #[serde(default)]
    pub instructions: String,
}

impl DeckRequest {
    /// A request titled after the outline's first entry.
    pub fn new(outline: Vec<OutlineItem>, theme: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            title: deck_title_from_outline(&outline),
            outline,
            theme: theme.into(),
            mode: mode.into(),
            instructions: String::new(),
        }
    }

    pub fn formatted_outline(&self) -> String {
        format_outline(&self.outline)
    }
}

/// Scope of an instructed edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditContext {
    Slide,
    Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefineAction {
    Expand,
    Condense,
    Rewrite,
    Tone,
}

/// The opaque generative backend. Implementations map HTTP 429 to
/// [`GenerateError::RateLimited`] and everything else to
/// [`GenerateError::Backend`].
#[async_trait]
pub trait Generator: Send + Sync {
    async fn create_outline(&self, request: &OutlineRequest) -> Result<Vec<OutlineItem>, GenerateError>;

    async fn stream_slides(&self, request: &DeckRequest) -> Result<ChunkStream, GenerateError>;

    /// Rewrite `html` per `instruction`. An empty reply means "no change".
    async fn edit_content(
        &self,
        html: &str,
        instruction: &str,
        context: EditContext,
    ) -> Result<String, GenerateError>;

    async fn restyle(
        &self,
        slides: &[SlideDraft],
        old_theme: &str,
        new_theme: &str,
    ) -> Result<Vec<SlideDraft>, GenerateError>;

    async fn refine_text(&self, text: &str, action: RefineAction) -> Result<String, GenerateError>;
}

/// Parse a JSON reply that may be wrapped in a markdown fence.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, GenerateError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| GenerateError::InvalidResponse(e.to_string()))
}

// ─── Retry ───────────────────────────────────────────────────────────────

/// Bounded retries with linear backoff (`backoff_step * attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, it is rate limited, or attempts run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GenerateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerateError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(GenerateError::RateLimited) => {
                    log::error!("rate limit exceeded (429); aborting retries");
                    return Err(GenerateError::RateLimited);
                }
                Err(e) => {
                    if attempt < attempts {
                        let wait = self.backoff_step * attempt;
                        log::warn!("attempt {attempt} of {attempts} failed, retrying in {wait:?}: {e}");
                        tokio::time::sleep(wait).await;
                    } else {
                        log::warn!("attempt {attempt} of {attempts} failed: {e}");
                    }
                    last = Some(e);
                }
            }
        }
        Err(GenerateError::RetriesExhausted {
            attempts,
            last: Box::new(last.unwrap_or(GenerateError::Backend("no attempt was made".into()))),
        })
    }
}

// ─── Orchestration ───────────────────────────────────────────────────────

/// Outline stage: ids are filled positionally when the backend omits them.
pub async fn create_outline<G: Generator + ?Sized>(
    generator: &G,
    request: &OutlineRequest,
    policy: &RetryPolicy,
) -> Result<Vec<OutlineItem>, GenerateError> {
    let mut items = policy.run(|| generator.create_outline(request)).await?;
    if items.is_empty() {
        return Err(GenerateError::InvalidResponse(
            "AI returned an invalid outline structure.".into(),
        ));
    }
    OutlineItem::assign_missing_ids(&mut items);
    Ok(items)
}

/// Stream a deck, persist it once, and return it.
///
/// The stream is opened with retries; the stream itself is consumed once.
/// A document that does not parse once the stream ends is terminal and
/// nothing is persisted.
pub async fn generate_deck<G, S, F>(
    generator: &G,
    request: &DeckRequest,
    store: &S,
    policy: &RetryPolicy,
    config: &AssetConfig,
    on_progress: F,
) -> Result<Deck, GenerateError>
where
    G: Generator + ?Sized,
    S: DeckStore + ?Sized,
    F: FnMut(&StreamProgress),
{
    let stream = policy.run(|| generator.stream_slides(request)).await?;
    let mut reader = StreamReader::new();
    reader.consume(stream, on_progress).await?;

    let drafts = finalize(reader.as_str())?;
    log::info!("stream finished: {} slides, {} bytes", drafts.len(), reader.len());
    let slides = drafts
        .into_iter()
        .map(|d| Slide::new(d.title, resolve_generated_assets(&d.content, config)))
        .collect();
    let title = if request.title.trim().is_empty() {
        deck_title_from_outline(&request.outline)
    } else {
        request.title.clone()
    };
    let deck = Deck::new(title, request.theme.clone(), slides)?;
    store.put(&deck)?;
    Ok(deck)
}

/// Instructed edit of a slide or element, with local images shielded.
pub async fn edit_content<G: Generator + ?Sized>(
    generator: &G,
    html: &str,
    instruction: &str,
    context: EditContext,
    policy: &RetryPolicy,
    config: &AssetConfig,
) -> Result<String, GenerateError> {
    let mut tokenizer = Tokenizer::new(config, TokenizeScope::Edit);
    let cleaned = tokenizer.tokenize(html);
    let reply = policy
        .run(|| generator.edit_content(&cleaned, instruction, context))
        .await?;
    if reply.trim().is_empty() {
        log::debug!("empty edit reply; keeping original content");
        return Ok(html.to_string());
    }
    Ok(detokenize(&reply, tokenizer.map(), config))
}

/// Restyle every slide for a new theme. Slides are matched by position;
/// any position the reply does not cover keeps its original slide.
pub async fn restyle_deck<G: Generator + ?Sized>(
    generator: &G,
    slides: &[Slide],
    old_theme: &str,
    new_theme: &str,
    policy: &RetryPolicy,
    config: &AssetConfig,
) -> Result<Vec<Slide>, GenerateError> {
    let mut tokenizer = Tokenizer::new(config, TokenizeScope::Restyle);
    let drafts: Vec<SlideDraft> = slides
        .iter()
        .map(|s| SlideDraft {
            title: s.title.clone(),
            content: tokenizer.tokenize(&s.content),
        })
        .collect();
    let restyled = policy
        .run(|| generator.restyle(&drafts, old_theme, new_theme))
        .await?;
    if restyled.is_empty() {
        return Err(GenerateError::InvalidResponse(
            "AI returned an invalid deck structure.".into(),
        ));
    }
    let map = tokenizer.into_map();
    Ok(slides
        .iter()
        .enumerate()
        .map(|(i, original)| match restyled.get(i) {
            Some(draft) => Slide {
                content: detokenize(&draft.content, &map, config),
                ..original.clone()
            },
            None => original.clone(),
        })
        .collect())
}

/// Expand, condense, rewrite or re-tone a text selection.
pub async fn refine_text<G: Generator + ?Sized>(
    generator: &G,
    text: &str,
    action: RefineAction,
    policy: &RetryPolicy,
) -> Result<String, GenerateError> {
    let reply = policy.run(|| generator.refine_text(text, action)).await?;
    Ok(if reply.trim().is_empty() {
        text.to_string()
    } else {
        reply
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = quick()
            .run(|| async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(GenerateError::Backend("503".into())),
                    _ => Ok("done"),
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = quick()
            .run(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GenerateError::RateLimited)
            })
            .await;
        assert!(matches!(result, Err(GenerateError::RateLimited)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_carries_last_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = quick()
            .run(|| async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(GenerateError::Backend(format!("fail {n}")))
            })
            .await;
        match result {
            Err(GenerateError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last.to_string(), "generation backend failed: fail 2");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn json_reply_with_fence() {
        #[derive(Deserialize)]
        struct Reply {
            html: String,
        }
        let reply: Reply = parse_json_reply("```json\n{\"html\":\"<p>x</p>\"}\n```").unwrap();
        assert_eq!(reply.html, "<p>x</p>");
        assert!(parse_json_reply::<Reply>("nope").is_err());
    }
}
