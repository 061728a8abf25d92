//! Asset tokenizer / detokenizer.
//!
//! Before slide HTML is handed to the generator for an edit or restyle, local
//! image sources (data URIs, blob paths) are swapped for short placeholder URLs
//! so the model can neither corrupt nor bloat them. After the reply comes
//! back, [`detokenize`] resolves generator-specific markup and puts the
//! originals back.

use deck_core::lexer::{Token, lex};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::LazyLock;

/// `name="value"` or `name='value'` inside a chart pseudo-tag.
static CHART_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static regex")
});

const CHART_TAG: &str = "<quickchart";

/// Hosts, keys and endpoints used by the asset passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Image sources on these schemes are considered stable and left alone
    /// by an edit-scoped tokenizer.
    pub remote_schemes: Vec<String>,
    pub placeholder_host: String,
    pub image_gen_host: String,
    pub image_gen_model: String,
    pub image_gen_key: String,
    pub chart_endpoint: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            remote_schemes: vec!["https".into()],
            placeholder_host: "placeholder.img".into(),
            image_gen_host: "gen.pollinations.ai".into(),
            image_gen_model: "flux".into(),
            image_gen_key: String::new(),
            chart_endpoint: "https://quickchart.io/chart".into(),
        }
    }
}

impl AssetConfig {
    /// Defaults, with the image-generation key taken from `POLLINATIONS_API_KEY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        match std::env::var("POLLINATIONS_API_KEY") {
            Ok(key) => config.image_gen_key = key,
            Err(_) => log::warn!("POLLINATIONS_API_KEY is not set; generated images will be unauthenticated"),
        }
        config
    }

    fn is_remote(&self, src: &str) -> bool {
        self.remote_schemes.iter().any(|scheme| {
            src.get(..scheme.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
                && src[scheme.len()..].starts_with("://")
        })
    }
}

// ─── Placeholder map ─────────────────────────────────────────────────────

/// Placeholder URL → original asset reference, scoped to one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderMap {
    entries: HashMap<String, String>,
}

impl PlaceholderMap {
    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.entries.get(placeholder).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every placeholder still present with its original value.
    ///
    /// Single pass over an alternation sorted longest-first, so `id-1` never
    /// matches inside `id-10`.
    pub fn restore(&self, html: &str) -> String {
        if self.entries.is_empty() {
            return html.to_string();
        }
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_by_key(|k| Reverse(k.len()));
        let pattern = keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        match Regex::new(&pattern) {
            Ok(re) => re
                .replace_all(html, |caps: &Captures<'_>| {
                    self.get(&caps[0]).unwrap_or(&caps[0]).to_string()
                })
                .into_owned(),
            Err(e) => {
                log::warn!("placeholder pattern rejected ({e}); restoring one by one");
                keys.iter().fold(html.to_string(), |acc, &k| {
                    acc.replace(k, self.get(k).unwrap_or(k))
                })
            }
        }
    }
}

// ─── Tokenizer ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeScope {
    /// One slide or element: only non-remote sources, `id-N`.
    Edit,
    /// A whole-deck restyle: every image, `global-id-N`.
    Restyle,
}

impl TokenizeScope {
    fn prefix(self) -> &'static str {
        match self {
            TokenizeScope::Edit => "id-",
            TokenizeScope::Restyle => "global-id-",
        }
    }
}

/// Mints placeholders into one shared map; reuse it across every slide of
/// an operation so numbering stays unique.
#[derive(Debug)]
pub struct Tokenizer<'c> {
    config: &'c AssetConfig,
    scope: TokenizeScope,
    next: usize,
    map: PlaceholderMap,
}

impl<'c> Tokenizer<'c> {
    pub fn new(config: &'c AssetConfig, scope: TokenizeScope) -> Self {
        Self {
            config,
            scope,
            next: 0,
            map: PlaceholderMap::default(),
        }
    }

    /// Replace qualifying `<img src>` values. Everything else is copied
    /// through byte for byte.
    pub fn tokenize(&mut self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut cursor = 0;
        for spanned in lex(html) {
            let Token::StartTag(tag) = &spanned.token else {
                continue;
            };
            if !tag.is("img") {
                continue;
            }
            let Some(src) = tag.attr("src") else {
                continue;
            };
            let (Some(value), Some(span)) = (src.value, src.value_span.clone()) else {
                continue;
            };
            if value.is_empty()
                || (self.scope == TokenizeScope::Edit && self.config.is_remote(value))
            {
                continue;
            }
            let placeholder = self.mint(value);
            out.push_str(&html[cursor..span.start]);
            out.push_str(&placeholder);
            cursor = span.end;
        }
        out.push_str(&html[cursor..]);
        out
    }

    fn mint(&mut self, original: &str) -> String {
        let placeholder = format!(
            "https://{}/{}{}",
            self.config.placeholder_host,
            self.scope.prefix(),
            self.next
        );
        self.next += 1;
        self.map
            .entries
            .insert(placeholder.clone(), original.to_string());
        placeholder
    }

    pub fn map(&self) -> &PlaceholderMap {
        &self.map
    }

    pub fn into_map(self) -> PlaceholderMap {
        self.map
    }
}

/// Tokenize one fragment for an edit.
pub fn tokenize(html: &str, config: &AssetConfig) -> (String, PlaceholderMap) {
    let mut tokenizer = Tokenizer::new(config, TokenizeScope::Edit);
    let cleaned = tokenizer.tokenize(html);
    (cleaned, tokenizer.into_map())
}

// ─── Detokenizer ─────────────────────────────────────────────────────────

/// Resolve generator markup, then restore placeholders. Order matters: chart
/// tags become real `<img>` tags before restoration runs last.
pub fn detokenize(html: &str, map: &PlaceholderMap, config: &AssetConfig) -> String {
    map.restore(&resolve_generated_assets(html, config))
}

/// The generator-markup passes alone, for freshly generated slides.
pub fn resolve_generated_assets(html: &str, config: &AssetConfig) -> String {
    convert_chart_tags(&rewrite_image_gen_urls(html, config), config)
}

/// Normalize image-generation URLs: decode the description segment
/// (underscores are spaces), re-encode it, and append model and key.
pub fn rewrite_image_gen_urls(html: &str, config: &AssetConfig) -> String {
    let pattern = format!(
        r#"(?i)https?://{}/image/([^\\"\s>?]+)(\?[^\\"\s>]*)?"#,
        regex::escape(&config.image_gen_host)
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(e) => {
            log::error!("invalid image generation host {:?}: {e}", config.image_gen_host);
            return html.to_string();
        }
    };
    re.replace_all(html, |caps: &Captures<'_>| {
        let spaced = caps[1].replace('_', " ");
        let description = urlencoding::decode(&spaced)
            .map(|d| d.into_owned())
            .unwrap_or(spaced);
        let mut url = format!(
            "https://{}/image/{}?model={}",
            config.image_gen_host,
            urlencoding::encode(&description),
            config.image_gen_model
        );
        if !config.image_gen_key.is_empty() {
            url.push_str("&key=");
            url.push_str(&config.image_gen_key);
        }
        url
    })
    .into_owned()
}

/// Turn `<quickchart config="..." ...>` pseudo-tags into `<img>` tags backed
/// by the chart endpoint. Tags without a usable `config` stay as they are.
pub fn convert_chart_tags(html: &str, config: &AssetConfig) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(at) = rest.find(CHART_TAG) {
        out.push_str(&rest[..at]);
        let after = &rest[at + CHART_TAG.len()..];
        let Some(end) = chart_tag_end(after) else {
            rest = &rest[at..];
            break;
        };
        let tag = &rest[at..at + CHART_TAG.len() + end + 1];
        match chart_img_tag(&after[..end], config) {
            Some(img) => out.push_str(&img),
            None => {
                log::error!("chart tag without a parsable config attribute: {tag}");
                out.push_str(tag);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Offset of the `>` closing the pseudo-tag, skipping quoted values
/// (escaped quotes count as quotes). Falls back to the first `>`.
fn chart_tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let c = match (c, chars.peek()) {
            ('\\', Some(&(_, q @ ('"' | '\'')))) => {
                chars.next();
                q
            }
            _ => c,
        };
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    s.find('>')
}

fn chart_img_tag(raw_attrs: &str, config: &AssetConfig) -> Option<String> {
    let cleaned = raw_attrs.replace("\\\"", "\"").replace("\\'", "'");
    let mut attrs: Vec<(String, String)> = Vec::new();
    for caps in CHART_ATTR.captures_iter(&cleaned) {
        let name = caps[1].to_string();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str())
            .to_string();
        match attrs.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => attrs.push((name, value)),
        }
    }

    let chart = attrs
        .iter()
        .find(|(n, v)| n == "config" && !v.is_empty())
        .map(|(_, v)| v.replace('\'', "\""))?;
    let mut img = format!(
        r#"<img src="{}?c={}""#,
        config.chart_endpoint,
        urlencoding::encode(&chart)
    );
    for (name, value) in attrs.iter().filter(|(n, _)| n != "config") {
        img.push_str(&format!(r#" {name}="{}""#, value.replace('"', "&quot;")));
    }
    img.push('>');
    Some(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> AssetConfig {
        AssetConfig {
            image_gen_key: "KEY".into(),
            ..AssetConfig::default()
        }
    }

    #[test]
    fn tokenize_skips_remote() {
        let html = r#"<img src="data:image/png;base64,AAA"><img class="x" src='https://cdn.example/a.png'><img src="local.png" alt="y">"#;
        let (cleaned, map) = tokenize(html, &config());
        assert_eq!(
            cleaned,
            r#"<img src="https://placeholder.img/id-0"><img class="x" src='https://cdn.example/a.png'><img src="https://placeholder.img/id-1" alt="y">"#
        );
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("https://placeholder.img/id-0"), Some("data:image/png;base64,AAA"));
    }

    #[test]
    fn restyle_scope_takes_everything() {
        let cfg = config();
        let mut t = Tokenizer::new(&cfg, TokenizeScope::Restyle);
        let a = t.tokenize(r#"<img src="https://cdn.example/a.png">"#);
        let b = t.tokenize(r#"<img src="b.png">"#);
        assert_eq!(a, r#"<img src="https://placeholder.img/global-id-0">"#);
        assert_eq!(b, r#"<img src="https://placeholder.img/global-id-1">"#);
        assert_eq!(t.map().len(), 2);
    }

    #[test]
    fn restore_longest_first() {
        let cfg = config();
        let mut t = Tokenizer::new(&cfg, TokenizeScope::Edit);
        let html: String = (0..11).map(|i| format!(r#"<img src="p{i}.png">"#)).collect();
        let cleaned = t.tokenize(&html);
        assert!(cleaned.contains("id-10\""));
        assert_eq!(detokenize(&cleaned, t.map(), &cfg), html);
    }

    #[test]
    fn image_gen_urls_normalized() {
        let html = r#"<img src="https://gen.pollinations.ai/image/a_red%20fox_at_dawn">"#;
        let out = rewrite_image_gen_urls(html, &config());
        assert_eq!(
            out,
            r#"<img src="https://gen.pollinations.ai/image/a%20red%20fox%20at%20dawn?model=flux&key=KEY">"#
        );
        assert_eq!(rewrite_image_gen_urls(&out, &config()), out);
    }

    #[test]
    fn chart_tag_converted() {
        let html = r#"<div><quickchart config="{'type':'bar','data':{'labels':['a>b']}}" class="w-full h-64" alt='Sales'></div>"#;
        let out = convert_chart_tags(html, &config());
        let encoded = urlencoding::encode(r#"{"type":"bar","data":{"labels":["a>b"]}}"#);
        assert_eq!(
            out,
            format!(
                r#"<div><img src="https://quickchart.io/chart?c={encoded}" class="w-full h-64" alt="Sales"></div>"#
            )
        );
    }

    #[test]
    fn escaped_chart_attrs_are_cleaned() {
        let html = r#"<quickchart config=\"{'type':'pie'}\" id=\"c1\">"#;
        let out = convert_chart_tags(html, &config());
        assert!(out.starts_with(r#"<img src="https://quickchart.io/chart?c="#));
        assert!(out.ends_with(r#" id="c1">"#));
    }

    #[test]
    fn chart_without_config_untouched() {
        let html = r#"<p>x</p><quickchart width="400" alt="none"><p>y</p>"#;
        assert_eq!(convert_chart_tags(html, &config()), html);
    }

    #[test]
    fn remote_scheme_check() {
        let cfg = config();
        assert!(cfg.is_remote("https://a/b.png"));
        assert!(cfg.is_remote("HTTPS://a/b.png"));
        assert!(!cfg.is_remote("http://a/b.png"));
        assert!(!cfg.is_remote("https"));
        assert!(!cfg.is_remote("data:image/png;base64,AAA"));
    }
}
