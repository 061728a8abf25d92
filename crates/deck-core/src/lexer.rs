//! Streaming HTML tokenizer.
//!
//! Built on `winnow` 0.7. Produces a flat sequence of tokens, each carrying
//! the byte range it occupies in the input, so callers can rewrite a single
//! attribute value without re-serializing anything around it.
//!
//! Lexing never fails: a `<` that does not start well-formed markup is
//! emitted as text, the way a browser would treat it.

use std::ops::Range;
use winnow::ascii::multispace0;
use winnow::combinator::delimited;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{take_till, take_until, take_while};

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    /// Inner text of `<!-- ... -->`.
    Comment(&'a str),
    /// Inner text of `<!...>` (doctype and other declarations).
    Doctype(&'a str),
    StartTag(StartTag<'a>),
    /// Tag name of `</name>`.
    EndTag(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag<'a> {
    pub name: &'a str,
    pub attrs: Vec<RawAttr<'a>>,
    /// Written as `<name ... />`.
    pub self_closing: bool,
}

/// An attribute exactly as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttr<'a> {
    pub name: &'a str,
    /// `None` for a bare boolean attribute (`<input disabled>`).
    pub value: Option<&'a str>,
    /// Quote character around the value, if any.
    pub quote: Option<char>,
    /// Byte range of the value (inside the quotes) in the lexed input.
    pub value_span: Option<Range<usize>>,
}

impl<'a> StartTag<'a> {
    /// Case-insensitive attribute lookup.
    pub fn attr(&self, name: &str) -> Option<&RawAttr<'a>> {
        self.attrs.iter().find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Tokenize an HTML fragment.
pub fn lex(html: &str) -> Vec<Spanned<Token<'_>>> {
    let mut out = Vec::new();
    let mut rest = html;
    let mut text_start: Option<usize> = None;

    while !rest.is_empty() {
        let start = offset_in(html, rest);

        if rest.starts_with('<') {
            let checkpoint = rest;
            match markup(&mut rest) {
                Ok(token) => {
                    flush_text(html, &mut text_start, start, &mut out);
                    let raw_element = match &token {
                        Token::StartTag(tag) if !tag.self_closing => RAW_TEXT_ELEMENTS
                            .iter()
                            .find(|name| tag.is(name))
                            .copied(),
                        _ => None,
                    };
                    let token = fix_attr_spans(html, token);
                    out.push(Spanned {
                        token,
                        span: start..offset_in(html, rest),
                    });
                    if let Some(name) = raw_element {
                        let body_len = find_end_tag(rest, name).unwrap_or(rest.len());
                        if body_len > 0 {
                            let body_start = offset_in(html, rest);
                            out.push(Spanned {
                                token: Token::Text(&rest[..body_len]),
                                span: body_start..body_start + body_len,
                            });
                        }
                        rest = &rest[body_len..];
                    }
                    continue;
                }
                Err(_) => rest = checkpoint,
            }
            // Not markup: a literal '<' inside text.
            text_start.get_or_insert(start);
            rest = &rest[1..];
        } else {
            text_start.get_or_insert(start);
            let n = rest.find('<').unwrap_or(rest.len());
            rest = &rest[n..];
        }
    }

    flush_text(html, &mut text_start, html.len(), &mut out);
    out
}

/// Is `tag` an HTML void element (never has children or an end tag)?
pub fn is_void_element(tag: &str) -> bool {
    const VOID: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
        "track", "wbr",
    ];
    VOID.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// Byte offset of `sub` within `whole`. `sub` must be a subslice of `whole`.
fn offset_in(whole: &str, sub: &str) -> usize {
    sub.as_ptr() as usize - whole.as_ptr() as usize
}

fn flush_text<'a>(
    html: &'a str,
    text_start: &mut Option<usize>,
    end: usize,
    out: &mut Vec<Spanned<Token<'a>>>,
) {
    if let Some(start) = text_start.take()
        && end > start
    {
        out.push(Spanned {
            token: Token::Text(&html[start..end]),
            span: start..end,
        });
    }
}

fn fix_attr_spans<'a>(html: &'a str, token: Token<'a>) -> Token<'a> {
    match token {
        Token::StartTag(mut tag) => {
            for attr in &mut tag.attrs {
                attr.value_span = attr.value.map(|v| {
                    let s = offset_in(html, v);
                    s..s + v.len()
                });
            }
            Token::StartTag(tag)
        }
        other => other,
    }
}

fn find_end_tag(rest: &str, name: &str) -> Option<usize> {
    let needle = format!("</{name}");
    rest.to_ascii_lowercase().find(&needle)
}

// ─── Low-level parsers ──────────────────────────────────────────────────

fn skip_ws(input: &mut &str) {
    let _: Result<&str, ErrMode<ContextError>> = multispace0.parse_next(input);
}

fn backtrack<T>() -> ModalResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn expect(input: &mut &str, literal: &str) -> ModalResult<()> {
    match input.strip_prefix(literal) {
        Some(rest) => {
            *input = rest;
            Ok(())
        }
        None => backtrack(),
    }
}

fn markup<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    if input.starts_with("<!--") {
        comment(input)
    } else if input.starts_with("<!") {
        doctype(input)
    } else if input.starts_with("</") {
        end_tag(input)
    } else {
        start_tag(input)
    }
}

fn comment<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    delimited("<!--", take_until(0.., "-->"), "-->")
        .map(Token::Comment)
        .parse_next(input)
}

fn doctype<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    delimited("<!", take_till(0.., '>'), '>')
        .map(Token::Doctype)
        .parse_next(input)
}

fn tag_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    if !input.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return backtrack();
    }
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
    })
    .parse_next(input)
}

fn end_tag<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    expect(input, "</")?;
    let name = tag_name(input)?;
    skip_ws(input);
    expect(input, ">")?;
    Ok(Token::EndTag(name))
}

fn start_tag<'a>(input: &mut &'a str) -> ModalResult<Token<'a>> {
    expect(input, "<")?;
    let name = tag_name(input)?;
    let mut attrs = Vec::new();

    loop {
        skip_ws(input);
        if input.starts_with("/>") {
            *input = &input[2..];
            return Ok(Token::StartTag(StartTag {
                name,
                attrs,
                self_closing: true,
            }));
        }
        if input.starts_with('>') {
            *input = &input[1..];
            return Ok(Token::StartTag(StartTag {
                name,
                attrs,
                self_closing: false,
            }));
        }
        if input.starts_with('/') {
            // Stray slash between attributes (`<img / src=x>`).
            *input = &input[1..];
            continue;
        }
        if input.is_empty() || input.starts_with('<') {
            return backtrack();
        }
        attrs.push(attribute(input)?);
    }
}

fn attribute<'a>(input: &mut &'a str) -> ModalResult<RawAttr<'a>> {
    let name = attr_name(input)?;
    skip_ws(input);
    if !input.starts_with('=') {
        return Ok(RawAttr {
            name,
            value: None,
            quote: None,
            value_span: None,
        });
    }
    *input = &input[1..];
    skip_ws(input);

    let (value, quote) = if input.starts_with('"') {
        (quoted(input, '"')?, Some('"'))
    } else if input.starts_with('\'') {
        (quoted(input, '\'')?, Some('\''))
    } else {
        (unquoted(input)?, None)
    };

    Ok(RawAttr {
        name,
        value: Some(value),
        quote,
        value_span: None,
    })
}

fn attr_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| {
        !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '<' | '"' | '\'')
    })
    .parse_next(input)
}

fn unquoted<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| !c.is_whitespace() && c != '>').parse_next(input)
}

fn quoted<'a>(input: &mut &'a str, q: char) -> ModalResult<&'a str> {
    delimited(q, take_till(0.., q), q).parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(html: &str) -> Vec<String> {
        lex(html)
            .into_iter()
            .map(|t| match t.token {
                Token::Text(s) => format!("text:{s}"),
                Token::Comment(s) => format!("comment:{s}"),
                Token::Doctype(s) => format!("doctype:{s}"),
                Token::StartTag(tag) => format!("start:{}", tag.name),
                Token::EndTag(name) => format!("end:{name}"),
            })
            .collect()
    }

    #[test]
    fn lex_basic_structure() {
        assert_eq!(
            kinds(r#"<div class="a"><p>Hi</p><!-- note --></div>"#),
            vec![
                "start:div",
                "start:p",
                "text:Hi",
                "end:p",
                "comment: note ",
                "end:div"
            ]
        );
    }

    #[test]
    fn spans_cover_input() {
        let html = r#"<img src='a.png' alt=x>tail"#;
        let tokens = lex(html);
        assert_eq!(tokens[0].span, 0..23);
        assert_eq!(tokens[1].span, 23..27);
        let Token::StartTag(tag) = &tokens[0].token else {
            panic!("expected start tag");
        };
        let src = tag.attr("SRC").unwrap();
        assert_eq!(src.value, Some("a.png"));
        assert_eq!(src.quote, Some('\''));
        assert_eq!(&html[src.value_span.clone().unwrap()], "a.png");
        assert_eq!(tag.attr("alt").unwrap().quote, None);
    }

    #[test]
    fn stray_lt_is_text() {
        assert_eq!(kinds("a < b <3"), vec!["text:a < b <3"]);
    }

    #[test]
    fn unterminated_tag_is_text() {
        assert_eq!(
            kinds("<p>x</p><div class=\"y"),
            vec!["start:p", "text:x", "end:p", "text:<div class=\"y"]
        );
    }

    #[test]
    fn raw_text_elements_swallow_markup() {
        assert_eq!(
            kinds("<style>.a > p { }</style><p>x</p>"),
            vec!["start:style", "text:.a > p { }", "end:style", "start:p", "text:x", "end:p"]
        );
    }

    #[test]
    fn self_closing_and_boolean_attrs() {
        let tokens = lex("<input disabled/>");
        let Token::StartTag(tag) = &tokens[0].token else {
            panic!("expected start tag");
        };
        assert!(tag.self_closing);
        assert_eq!(tag.attrs[0].name, "disabled");
        assert_eq!(tag.attrs[0].value, None);
    }

    #[test]
    fn void_elements() {
        assert!(is_void_element("IMG"));
        assert!(is_void_element("br"));
        assert!(!is_void_element("div"));
    }
}
