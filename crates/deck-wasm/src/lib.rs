//! WASM bridge for the browser editor.
//!
//! Compiled via `wasm-pack build --target web`. Structured values cross the
//! boundary as JSON strings; the host owns rendering, networking and
//! durable storage.

use deck_core::id::ElementId;
use deck_core::model::Deck;
use deck_core::store::{DeckStore, StoreError};
use deck_editor::colors::{CUSTOM_COLORS_KEY, CustomColors};
use deck_editor::crop::{CropError, ImageFetcher};
use deck_editor::store::{MemorySettings, SettingsStore};
use deck_editor::{CanvasMode, DeckSession, EditorConfig, InputEvent, Modifiers};
use deck_stream::assets::{AssetConfig, PlaceholderMap, convert_chart_tags, resolve_generated_assets};
use deck_stream::{StreamReader, detokenize, finalize, tokenize};
use kurbo::{Point, Rect};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use wasm_bindgen::prelude::*;

// ─── Host store ──────────────────────────────────────────────────────────

/// Deck writes are queued for the host, which persists them (IndexedDB) and
/// reports failures back through [`DeckEditor::set_storage_available`].
#[derive(Default)]
struct HostStore {
    pending: RefCell<Option<Deck>>,
    unavailable: Cell<bool>,
}

impl DeckStore for HostStore {
    fn get(&self, deck_id: &str) -> Result<Option<Deck>, StoreError> {
        Ok(self
            .pending
            .borrow()
            .as_ref()
            .filter(|d| d.id == deck_id)
            .cloned())
    }

    fn put(&self, deck: &Deck) -> Result<(), StoreError> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable("host storage offline".into()));
        }
        // Whole-deck overwrite; only the latest write matters.
        *self.pending.borrow_mut() = Some(deck.clone());
        Ok(())
    }
}

/// Image bytes the host fetched itself (with CORS) before confirming a crop.
struct Prefetched(Option<Vec<u8>>);

impl ImageFetcher for Prefetched {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CropError> {
        self.0
            .clone()
            .ok_or_else(|| CropError::Fetch(url.to_string()))
    }
}

// ─── Editor ──────────────────────────────────────────────────────────────

/// The WASM-facing editor controller: one deck, its history, and the canvas
/// for the active slide.
#[wasm_bindgen]
pub struct DeckEditor {
    session: DeckSession<HostStore>,
}

fn mods(shift: bool, ctrl: bool, alt: bool, meta: bool) -> Modifiers {
    Modifiers {
        shift,
        ctrl,
        alt,
        meta,
    }
}

fn to_json<T: serde::Serialize>(value: &T, fallback: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        log::error!("serialization failed: {e}");
        fallback.to_string()
    })
}

#[wasm_bindgen]
impl DeckEditor {
    /// Open a deck from its JSON form.
    #[wasm_bindgen(constructor)]
    pub fn new(deck_json: &str, config_json: Option<String>) -> Result<DeckEditor, JsValue> {
        init_logging();
        let deck: Deck = serde_json::from_str(deck_json)
            .map_err(|e| JsValue::from_str(&format!("invalid deck: {e}")))?;
        if deck.slides.is_empty() {
            return Err(JsValue::from_str("a deck must contain at least one slide"));
        }
        let config = match config_json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| JsValue::from_str(&format!("invalid config: {e}")))?,
            None => EditorConfig::default(),
        };
        Ok(Self {
            session: DeckSession::new(deck, HostStore::default(), config),
        })
    }

    pub fn deck_json(&self) -> String {
        to_json(self.session.deck(), "null")
    }

    /// The latest deck awaiting a durable write, or an empty string.
    pub fn take_pending_save(&self) -> String {
        self.session
            .history()
            .store()
            .pending
            .borrow_mut()
            .take()
            .map(|deck| to_json(&deck, ""))
            .unwrap_or_default()
    }

    /// While unavailable, writes fail and surface a save-error notice.
    pub fn set_storage_available(&self, available: bool) {
        self.session
            .history()
            .store()
            .unavailable
            .set(!available);
    }

    /// Content of the active slide as the canvas should render it.
    pub fn slide_html(&self) -> String {
        self.session.canvas().sync.emit_clean()
    }

    pub fn active_slide(&self) -> usize {
        self.session.active_slide()
    }

    pub fn navigate(&mut self, index: usize) {
        self.session.navigate(index);
    }

    pub fn add_slide(&mut self) -> usize {
        self.session.add_slide()
    }

    pub fn delete_slide(&mut self, index: usize) {
        self.session.delete_slide(index);
    }

    // ─── Input ───────────────────────────────────────────────────────────

    pub fn handle_pointer_down(&mut self, x: f64, y: f64, shift: bool, ctrl: bool, alt: bool, meta: bool) {
        self.session.handle_event(&InputEvent::PointerDown {
            x,
            y,
            modifiers: mods(shift, ctrl, alt, meta),
        });
    }

    pub fn handle_pointer_move(&mut self, x: f64, y: f64) {
        self.session.handle_event(&InputEvent::PointerMove { x, y });
    }

    pub fn handle_pointer_up(&mut self, x: f64, y: f64) {
        self.session.handle_event(&InputEvent::PointerUp { x, y });
    }

    pub fn handle_double_click(&mut self, x: f64, y: f64) {
        self.session.handle_event(&InputEvent::DoubleClick { x, y });
    }

    pub fn handle_context_menu(&mut self, x: f64, y: f64) {
        self.session.handle_event(&InputEvent::ContextMenu { x, y });
    }

    /// Dismiss the context menu (click outside it, or an action chosen).
    pub fn close_context_menu(&mut self) {
        self.session.edit(|c| c.close_context_menu());
    }

    /// `[x, y]` of the open context menu, or an empty array.
    pub fn context_menu_position(&self) -> Vec<f64> {
        self.session
            .canvas()
            .context_menu()
            .map(|m| vec![m.position.x, m.position.y])
            .unwrap_or_default()
    }

    /// Returns the triggered action name, or an empty string.
    pub fn handle_key(&mut self, key: &str, shift: bool, ctrl: bool, alt: bool, meta: bool) -> String {
        self.session
            .handle_key(key, mods(shift, ctrl, alt, meta))
            .map(|action| format!("{action:?}"))
            .unwrap_or_default()
    }

    /// Host-measured box for an element, in logical px.
    pub fn set_measured_bounds(&mut self, id: &str, x: f64, y: f64, width: f64, height: f64) {
        self.session.edit(|c| {
            c.sync
                .set_measured_bounds(ElementId::intern(id), Rect::new(x, y, x + width, y + height))
        });
    }

    // ─── State ───────────────────────────────────────────────────────────

    pub fn selected_ids(&self) -> String {
        let ids: Vec<&str> = self
            .session
            .canvas()
            .selection()
            .iter()
            .map(|id| id.as_str())
            .collect();
        to_json(&ids, "[]")
    }

    pub fn active_image(&self) -> Option<String> {
        self.session
            .canvas()
            .active_image()
            .map(|id| id.as_str().to_string())
    }

    /// `idle`, `text-editing`, `marquee`, `transforming` or `cropping`.
    pub fn mode(&self) -> String {
        match self.session.canvas().mode() {
            CanvasMode::Idle => "idle",
            CanvasMode::TextEditing { .. } => "text-editing",
            CanvasMode::MarqueeDrawing { .. } => "marquee",
            CanvasMode::Transforming(_) => "transforming",
            CanvasMode::Cropping(_) => "cropping",
        }
        .to_string()
    }

    /// `[x0, y0, x1, y1]` of the marquee being drawn, or an empty array.
    pub fn marquee_rect(&self) -> Vec<f64> {
        self.session
            .canvas()
            .marquee_rect()
            .map(|r| vec![r.x0, r.y0, r.x1, r.y1])
            .unwrap_or_default()
    }

    pub fn can_undo(&self) -> bool {
        self.session.history().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.history().can_redo()
    }

    pub fn undo(&mut self) -> bool {
        self.session.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.session.redo()
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.session.set_busy(busy);
    }

    /// Notices raised since the last call, as a JSON array.
    pub fn take_notices(&mut self) -> String {
        to_json(&self.session.take_notices(), "[]")
    }

    // ─── Text editing ────────────────────────────────────────────────────

    pub fn set_editing_html(&mut self, html: &str) {
        self.session.edit(|c| c.set_editing_html(html));
    }

    pub fn blur(&mut self, now_ms: f64) {
        self.session.edit(|c| c.blur(millis(now_ms)));
    }

    pub fn refocus(&mut self) {
        self.session.edit(|c| c.refocus());
    }

    pub fn tick(&mut self, now_ms: f64) {
        self.session.tick(millis(now_ms));
    }

    pub fn finish_text_editing(&mut self) {
        self.session.edit(|c| c.finish_text_editing());
    }

    // ─── Element actions ─────────────────────────────────────────────────

    pub fn delete_selected(&mut self) {
        self.session.edit(|c| c.delete_selected());
    }

    pub fn duplicate_selected(&mut self) {
        self.session.edit(|c| c.duplicate_selected());
    }

    pub fn bring_to_front(&mut self) {
        self.session.edit(|c| c.bring_to_front());
    }

    pub fn send_to_back(&mut self) {
        self.session.edit(|c| c.send_to_back());
    }

    pub fn replace_image(&mut self, data_url: &str) -> bool {
        self.session.edit(|c| c.replace_image(data_url))
    }

    pub fn set_object_fit(&mut self, fit: &str) {
        self.session.edit(|c| c.set_object_fit(fit));
    }

    pub fn set_border_radius(&mut self, radius: &str) {
        self.session.edit(|c| c.set_border_radius(radius));
    }

    /// Serialized element for an AI edit request.
    pub fn element_html(&self, id: &str) -> Option<String> {
        self.session
            .canvas()
            .element_outer_html(ElementId::intern(id))
    }

    pub fn apply_element_edit(&mut self, id: &str, html: &str) -> bool {
        self.session
            .edit(|c| c.apply_element_edit(ElementId::intern(id), html))
    }

    /// New content for a whole slide (AI slide edit).
    pub fn apply_slide_content(&mut self, index: usize, html: String) {
        self.session.apply_slide_content(index, html);
    }

    /// Replace the whole deck (restyle) as one undoable step.
    pub fn replace_deck(&mut self, deck_json: &str) -> Result<(), JsValue> {
        let deck: Deck = serde_json::from_str(deck_json)
            .map_err(|e| JsValue::from_str(&format!("invalid deck: {e}")))?;
        if deck.slides.is_empty() {
            return Err(JsValue::from_str("a deck must contain at least one slide"));
        }
        self.session.replace_deck(deck);
        Ok(())
    }

    // ─── Crop ────────────────────────────────────────────────────────────

    pub fn begin_crop(&mut self, zoom: f64) -> bool {
        self.session.edit(|c| c.begin_crop(zoom))
    }

    /// `[x0, y0, x1, y1]` of the crop rect in screen space, or empty.
    pub fn crop_rect(&self) -> Vec<f64> {
        match self.session.canvas().mode() {
            CanvasMode::Cropping(s) => {
                let r = s.crop();
                vec![r.x0, r.y0, r.x1, r.y1]
            }
            _ => Vec::new(),
        }
    }

    pub fn set_crop_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        self.session.edit(|c| {
            c.set_crop_rect(Rect::from_points(Point::new(x0, y0), Point::new(x1, y1)))
        });
    }

    /// Confirm the crop. `image_bytes` carries the source for remote images
    /// the host fetched; data URIs need none.
    pub fn confirm_crop(&mut self, image_bytes: Option<Vec<u8>>) -> bool {
        let fetcher = Prefetched(image_bytes);
        self.session.edit(|c| c.confirm_crop(&fetcher))
    }

    pub fn cancel_crop(&mut self) {
        self.session.edit(|c| c.cancel_crop());
    }
}

// ─── Custom colors ───────────────────────────────────────────────────────

/// Text-color palette backed by the host's `localStorage` value.
#[wasm_bindgen]
pub struct ColorPalette {
    settings: MemorySettings,
}

#[wasm_bindgen]
impl ColorPalette {
    /// `saved` is the raw stored value, if any.
    #[wasm_bindgen(constructor)]
    pub fn new(saved: Option<String>) -> Self {
        let settings = MemorySettings::new();
        if let Some(raw) = saved
            && let Err(e) = settings.set(CUSTOM_COLORS_KEY, &raw)
        {
            log::warn!("could not seed color palette: {e}");
        }
        Self { settings }
    }

    pub fn colors(&self) -> String {
        to_json(&CustomColors::load(&self.settings).colors(), "[]")
    }

    /// Returns true when the palette changed and `stored_value` should be
    /// written back.
    pub fn add(&self, color: &str) -> bool {
        CustomColors::load(&self.settings).add(color)
    }

    pub fn stored_value(&self) -> Option<String> {
        self.settings.get(CUSTOM_COLORS_KEY)
    }
}

fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}

// ─── Streaming ───────────────────────────────────────────────────────────

/// Incremental slide extraction over a generation stream the host reads.
#[wasm_bindgen]
#[derive(Default)]
pub struct SlideStream {
    reader: StreamReader,
}

#[wasm_bindgen]
impl SlideStream {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk; returns `{completeSlides, inProgressHtml}` as JSON.
    pub fn push(&mut self, chunk: &str) -> String {
        to_json(&self.reader.push_and_extract(chunk), "{}")
    }

    /// Final slides as a JSON array once the stream has ended, with chart
    /// and image-generation markup resolved.
    pub fn finish(&self, image_gen_key: &str) -> Result<String, JsValue> {
        let slides = finalize(self.reader.as_str()).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let config = config_with_key(image_gen_key);
        let resolved: Vec<_> = slides
            .into_iter()
            .map(|mut s| {
                s.content = resolve_generated_assets(&s.content, &config);
                s
            })
            .collect();
        Ok(to_json(&resolved, "[]"))
    }
}

// ─── Asset helpers ───────────────────────────────────────────────────────

/// Swap local image sources for placeholders. Returns
/// `{"html": ..., "placeholders": {...}}`.
#[wasm_bindgen]
pub fn tokenize_html(html: &str) -> String {
    let (html, map) = tokenize(html, &AssetConfig::default());
    to_json(
        &serde_json::json!({ "html": html, "placeholders": map }),
        "{}",
    )
}

#[wasm_bindgen]
pub fn detokenize_html(html: &str, placeholders_json: &str, image_gen_key: &str) -> String {
    let map: PlaceholderMap = serde_json::from_str(placeholders_json).unwrap_or_else(|e| {
        log::warn!("placeholder map unreadable, restoring nothing: {e}");
        PlaceholderMap::default()
    });
    detokenize(html, &map, &config_with_key(image_gen_key))
}

fn config_with_key(image_gen_key: &str) -> AssetConfig {
    AssetConfig {
        image_gen_key: image_gen_key.to_string(),
        ..AssetConfig::default()
    }
}

#[wasm_bindgen]
pub fn convert_charts(html: &str) -> String {
    convert_chart_tags(html, &AssetConfig::default())
}

// ─── Logging ─────────────────────────────────────────────────────────────

#[cfg(target_arch = "wasm32")]
struct ConsoleLogger;

#[cfg(target_arch = "wasm32")]
impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&msg),
            log::Level::Warn => web_sys::console::warn_1(&msg),
            _ => web_sys::console::log_1(&msg),
        }
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
static LOGGER: ConsoleLogger = ConsoleLogger;

fn init_logging() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            if log::set_logger(&LOGGER).is_ok() {
                log::set_max_level(log::LevelFilter::Info);
            }
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("deck WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}
