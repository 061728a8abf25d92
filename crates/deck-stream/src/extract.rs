//! Incremental slide extractor.
//!
//! A pure function of the accumulated stream text. It is re-run from scratch on
//! every chunk, so it carries no state between calls: the same prefix always
//! yields the same [`Extraction`].

use crate::error::GenerateError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static CONTENT_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""content"\s*:\s*""#).expect("static regex"));

/// A slide as the generator writes it, before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDraft {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub complete_slides: Vec<SlideDraft>,
    /// Best-effort renderable preview of the slide still being written.
    pub in_progress_html: String,
}

#[derive(Deserialize)]
struct DeckPayload {
    slides: Vec<SlideDraft>,
}

/// Drop a leading markdown fence marker (`` ```json `` or `` ``` ``).
fn strip_leading_fence(text: &str) -> &str {
    let trimmed = text.trim_start();
    let marker = if trimmed.starts_with("```json") {
        "```json"
    } else if trimmed.starts_with("```") {
        "```"
    } else {
        return text;
    };
    text.find(marker)
        .map_or(text, |at| &text[at + marker.len()..])
}

/// Trim and strip a complete markdown fence around a JSON reply.
pub fn strip_code_fence(text: &str) -> &str {
    let mut clean = text.trim();
    if let Some(rest) = clean.strip_prefix("```json") {
        clean = rest;
    } else if let Some(rest) = clean.strip_prefix("```") {
        clean = rest;
    } else {
        return clean;
    }
    clean.strip_suffix("```").unwrap_or(clean)
}

/// Extract complete slides and the in-progress preview from `accumulated`.
pub fn extract(accumulated: &str) -> Extraction {
    let text = strip_leading_fence(accumulated);
    let Some(array_start) = text.find('[') else {
        return Extraction::default();
    };
    let body = &text[array_start + 1..];
    let bytes = body.as_bytes();

    let mut slides: Vec<SlideDraft> = Vec::new();
    let mut last_complete_end = 0;
    let mut depth = 0usize;
    let mut object_start: Option<usize> = None;
    let mut in_string = false;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            // Escapes consume the next byte uninterpreted, in or out of strings.
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' => in_string = !in_string,
            b'{' if !in_string => {
                if depth == 0 {
                    object_start = Some(i);
                }
                depth += 1;
            }
            b'}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(start) = object_start.take()
                {
                    let candidate = &body[start..=i];
                    match serde_json::from_str::<SlideDraft>(candidate) {
                        Ok(slide) => {
                            upsert_by_title(&mut slides, slide);
                            last_complete_end = i + 1;
                        }
                        Err(e) => log::debug!("skipping partial slide candidate: {e}"),
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    Extraction {
        complete_slides: slides,
        in_progress_html: in_progress_html(&body[last_complete_end..]),
    }
}

fn upsert_by_title(slides: &mut Vec<SlideDraft>, slide: SlideDraft) {
    match slides.iter_mut().find(|s| s.title == slide.title) {
        Some(existing) => *existing = slide,
        None => slides.push(slide),
    }
}

/// Preview of the trailing, unterminated `content` string.
fn in_progress_html(tail: &str) -> String {
    let Some(m) = CONTENT_FIELD.find(tail) else {
        return String::new();
    };
    let html = tail[m.end()..]
        .replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\\\", "\\");
    close_outer_div(&html)
}

/// Balance the outermost `<div>`: keep everything up to the last `</div>` and
/// close the container once. Anything not rooted in a `<div>` renders nothing.
fn close_outer_div(html: &str) -> String {
    let Some(tag_end) = html.find('>') else {
        return String::new();
    };
    let (open_tag, inner) = html.split_at(tag_end + 1);
    if !open_tag.starts_with("<div") {
        return String::new();
    }
    match inner.rfind("</div>") {
        Some(last) => format!("{open_tag}{}</div>", &inner[..last + "</div>".len()]),
        None => format!("{open_tag}</div>"),
    }
}

/// Parse the finished stream as a whole deck. This is the terminal check: a
/// document that is still not valid JSON here fails the generation attempt.
pub fn finalize(accumulated: &str) -> Result<Vec<SlideDraft>, GenerateError> {
    let payload: DeckPayload = serde_json::from_str(strip_code_fence(accumulated))
        .map_err(|e| GenerateError::MalformedStream(e.to_string()))?;
    if payload.slides.is_empty() {
        return Err(GenerateError::EmptyDeck);
    }
    Ok(payload.slides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn draft(title: &str, content: &str) -> SlideDraft {
        SlideDraft {
            title: title.into(),
            content: content.into(),
        }
    }

    #[test]
    fn empty_and_whitespace() {
        assert_eq!(extract(""), Extraction::default());
        assert_eq!(extract("   \n"), Extraction::default());
        assert_eq!(extract("```json\n"), Extraction::default());
    }

    #[test]
    fn complete_and_in_progress() {
        let text = r#"```json
{"slides": [{"title": "A", "content": "<div>a</div>"}, {"title": "B", "content": "<div class=\"x\"><p>one</p></div><div>tw"#;
        let out = extract(text);
        assert_eq!(out.complete_slides, vec![draft("A", "<div>a</div>")]);
        assert_eq!(out.in_progress_html, r#"<div class="x"><p>one</p></div></div>"#);
    }

    #[test]
    fn escaped_quote_before_closing_brace() {
        let text = r#"{"slides":[{"title":"Q","content":"She said \"hi\""}"#;
        let out = extract(text);
        assert_eq!(out.complete_slides, vec![draft("Q", r#"She said "hi""#)]);
    }

    #[test]
    fn braces_inside_strings_ignored() {
        let text = r#"{"slides":[{"title":"{x}","content":"<style>.a{b:c}</style>"},"#;
        let out = extract(text);
        assert_eq!(
            out.complete_slides,
            vec![draft("{x}", "<style>.a{b:c}</style>")]
        );
    }

    #[test]
    fn upsert_replaces_same_title() {
        let text = r#"{"slides":[{"title":"A","content":"1"},{"title":"A","content":"2"},{"title":"B","content":"3"}]}"#;
        let out = extract(text);
        assert_eq!(out.complete_slides, vec![draft("A", "2"), draft("B", "3")]);
    }

    #[test]
    fn non_div_preview_is_empty() {
        let out = extract(r#"{"slides":[{"title":"A","content":"<section><p>x"#);
        assert_eq!(out.in_progress_html, "");
        let out = extract(r#"{"slides":[{"title":"A","content":"<div class=\"abs"#);
        assert_eq!(out.in_progress_html, "");
    }

    #[test]
    fn div_without_closing_gets_closed() {
        let out = extract(r#"{"slides":[{"title":"A","content":"<div class=\"a\"><h1>Ti"#);
        assert_eq!(out.in_progress_html, r#"<div class="a"></div>"#);
    }

    #[test]
    fn unescapes_newlines_in_preview() {
        let out = extract(r#"[{"title":"A","content":"<div>\n<div>x</div>\n<p"#);
        assert_eq!(out.in_progress_html, "<div>\n<div>x</div></div>");
    }

    #[test]
    fn finalize_strips_fences() {
        let text = "```json\n{\"slides\":[{\"title\":\"A\",\"content\":\"<p>x</p>\"}]}\n```";
        assert_eq!(finalize(text).unwrap(), vec![draft("A", "<p>x</p>")]);
    }

    #[test]
    fn finalize_errors() {
        assert!(matches!(
            finalize(r#"{"slides":[{"title":"A""#),
            Err(GenerateError::MalformedStream(_))
        ));
        assert!(matches!(
            finalize(r#"{"slides":[]}"#),
            Err(GenerateError::EmptyDeck)
        ));
    }
}
