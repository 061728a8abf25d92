//! Integration tests: parse → emit → re-parse round-trip over generated slide HTML.

use deck_core::document::SlideDocument;
use deck_core::emitter::emit_fragment;
use deck_core::id::ElementId;
use deck_core::layout::{Viewport, resolve_layout};
use deck_core::model::BLANK_SLIDE_HTML;
use pretty_assertions::assert_eq;

// ─── Helpers ─────────────────────────────────────────────────────────────

/// Parse, emit, re-parse, and compare element counts + ids.
fn assert_roundtrip_preserves(input: &str) {
    let doc1 = SlideDocument::parse(input);
    let emitted = emit_fragment(&doc1);
    let doc2 = SlideDocument::parse(&emitted);

    assert_eq!(
        doc1.elements().len(),
        doc2.elements().len(),
        "element count mismatch after round-trip.\nOriginal:\n{input}\nEmitted:\n{emitted}"
    );
    for id in doc1.id_index.keys() {
        assert!(
            doc2.id_index.contains_key(id),
            "element id {id:?} lost after round-trip"
        );
    }
    assert_eq!(emit_fragment(&doc2), emitted, "emission is not a fixed point");
}

const TITLE_SLIDE: &str = r#"<div class="absolute inset-0 bg-gradient-to-br from-slate-900 to-slate-700">
  <h1 id="title" class="absolute text-white text-8xl font-bold" style="left: 120px; top: 380px; width: 1680px;">Rust &amp; the Web</h1>
  <p id="subtitle" class="absolute text-slate-300 text-3xl" style="left: 120px; top: 560px;">Fast, safe &mdash; and fun</p>
  <img id="logo" class="absolute w-[200px] h-[200px] right-[80px] top-[80px]" src="data:image/png;base64,iVBORw0KGgo=" alt="logo">
</div>"#;

const CHART_SLIDE: &str = r#"<div class="absolute inset-0 bg-white flex flex-col p-24">
  <h2 class="text-6xl">Growth</h2>
  <div class="relative flex-1"><img src="https://quickchart.io/chart?c=%7B%22type%22%3A%22bar%22%7D" class="w-full h-full object-contain"></div>
  <style>.x > .y { color: #333; }</style>
</div>"#;

// ─── Round-trips ─────────────────────────────────────────────────────────

#[test]
fn roundtrip_blank_slide() {
    let doc = SlideDocument::parse(BLANK_SLIDE_HTML);
    assert_eq!(emit_fragment(&doc), BLANK_SLIDE_HTML);
}

#[test]
fn roundtrip_title_slide() {
    assert_roundtrip_preserves(TITLE_SLIDE);
    assert_eq!(emit_fragment(&SlideDocument::parse(TITLE_SLIDE)), TITLE_SLIDE);
}

#[test]
fn roundtrip_chart_slide() {
    assert_roundtrip_preserves(CHART_SLIDE);
}

#[test]
fn roundtrip_truncated_stream_preview() {
    // What a half-streamed slide looks like after the closure heuristic.
    assert_roundtrip_preserves(r#"<div class="absolute inset-0"><h1>Half a tit"#);
}

// ─── Edits survive a round-trip ──────────────────────────────────────────

#[test]
fn edits_survive_reparse() {
    let mut doc = SlideDocument::parse(TITLE_SLIDE);
    let title = doc.index_of(ElementId::intern("title")).unwrap();
    doc.set_style_property(title, "left", "200px");
    doc.set_text(title, "Edited <title>");
    let logo = doc.index_of(ElementId::intern("logo")).unwrap();
    doc.remove_subtree(logo);

    let emitted = emit_fragment(&doc);
    let doc2 = SlideDocument::parse(&emitted);
    let title2 = doc2.index_of(ElementId::intern("title")).unwrap();
    assert_eq!(doc2.text_content(title2), "Edited <title>");
    assert_eq!(doc2.inline_style(title2).px("left"), Some(200.0));
    assert!(doc2.index_of(ElementId::intern("logo")).is_none());
}

#[test]
fn layout_of_title_slide() {
    let doc = SlideDocument::parse(TITLE_SLIDE);
    let bounds = resolve_layout(&doc, Viewport::default());
    let title = doc.index_of(ElementId::intern("title")).unwrap();
    let logo = doc.index_of(ElementId::intern("logo")).unwrap();
    assert_eq!(bounds[&title].x0, 120.0);
    assert_eq!(bounds[&title].y0, 380.0);
    assert_eq!(bounds[&title].width(), 1680.0);
    assert_eq!(bounds[&logo].x0, 1920.0 - 80.0 - 200.0);
}
