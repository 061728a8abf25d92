//! Canvas selection and edit state machine.
//!
//! Exactly one [`CanvasMode`] is active at a time. Text editing and cropping
//! suppress marquee and transform gestures, and gestures in progress
//! suppress entering either. Every completed edit goes through the sync
//! engine's commit; changed content lands in an outbox the session drains
//! into history.

use crate::config::EditorConfig;
use crate::crop::{CropError, CropSession, ImageFetcher};
use crate::hit::{hit_test, hit_test_rect};
use crate::input::{InputEvent, Modifiers};
use crate::notice::Notice;
use crate::sync::{EditMutation, SyncEngine};
use deck_core::NodeIndex;
use deck_core::document::SlideDocument;
use deck_core::emitter::emit_outer;
use deck_core::id::ElementId;
use deck_core::layout::{format_px, is_absolute};
use kurbo::{Point, Rect, Vec2};
use smallvec::SmallVec;
use std::time::Duration;

/// Tags a double-click can turn into an in-place text editor.
const EDITABLE_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "p", "div", "span", "li", "ul", "a"];

pub type Selection = SmallVec<[ElementId; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasMode {
    Idle,
    TextEditing {
        element: ElementId,
        /// Set on blur; the edit closes once `tick` passes it.
        blur_deadline: Option<Duration>,
    },
    MarqueeDrawing {
        origin: Point,
        current: Point,
    },
    Transforming(Transform),
    Cropping(CropSession),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub kind: TransformKind,
    pub origin: Point,
    pub last: Point,
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformKind {
    /// Moves every selected element.
    Drag,
    Resize { id: ElementId, start: Rect },
    Rotate { id: ElementId, center: Point },
}

/// An open context menu. `target` is `None` for the bare canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextMenu {
    pub position: Point,
    pub target: Option<ElementId>,
}

pub struct Canvas {
    pub sync: SyncEngine,
    config: EditorConfig,
    mode: CanvasMode,
    selection: Selection,
    active_image: Option<ElementId>,
    context_menu: Option<ContextMenu>,
    busy: bool,
    notices: Vec<Notice>,
    commits: Vec<String>,
}

impl Canvas {
    pub fn new(content: &str, config: EditorConfig) -> Self {
        Self {
            sync: SyncEngine::from_content(content, config.viewport),
            config,
            mode: CanvasMode::Idle,
            selection: Selection::new(),
            active_image: None,
            context_menu: None,
            busy: false,
            notices: Vec::new(),
            commits: Vec::new(),
        }
    }

    pub fn mode(&self) -> &CanvasMode {
        &self.mode
    }

    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    pub fn active_image(&self) -> Option<ElementId> {
        self.active_image
    }

    pub fn context_menu(&self) -> Option<ContextMenu> {
        self.context_menu
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// While a generation call is in flight every gesture is ignored.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Committed slide content, oldest first.
    pub fn take_commits(&mut self) -> Vec<String> {
        std::mem::take(&mut self.commits)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// The marquee rectangle while one is being drawn.
    pub fn marquee_rect(&self) -> Option<Rect> {
        match self.mode {
            CanvasMode::MarqueeDrawing { origin, current } => Some(Rect::from_points(origin, current)),
            _ => None,
        }
    }

    /// Dispatch a pointer event. Key events belong to the session.
    pub fn handle_event(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::PointerDown { x, y, modifiers } => {
                self.pointer_down(Point::new(x, y), modifiers)
            }
            InputEvent::PointerMove { x, y } => self.pointer_move(Point::new(x, y)),
            InputEvent::PointerUp { x, y } => self.pointer_up(Point::new(x, y)),
            InputEvent::DoubleClick { x, y } => self.double_click(Point::new(x, y)),
            InputEvent::ContextMenu { x, y } => self.open_context_menu(Point::new(x, y)),
            InputEvent::Key { .. } => {}
        }
    }

    fn commit(&mut self) {
        if let Some(html) = self.sync.commit() {
            self.commits.push(html);
        }
    }

    fn is_idle(&self) -> bool {
        matches!(self.mode, CanvasMode::Idle)
    }

    fn on_canvas(&self, point: Point) -> bool {
        self.sync.viewport.rect().contains(point)
    }

    // ─── Pointer gestures ────────────────────────────────────────────────

    pub fn pointer_down(&mut self, point: Point, modifiers: Modifiers) {
        if self.busy || !self.is_idle() {
            return;
        }
        self.context_menu = None;

        if self.on_canvas(point)
            && let Some(target) = hit_test(&self.sync.doc, &self.sync.bounds, point)
        {
            let is_img = self.sync.doc.is_tag(target, "img");
            let container = if is_img {
                Some(target)
            } else {
                self.sync.doc.closest(target, is_container)
            };
            self.active_image = if is_img { self.sync.ensure_id(target) } else { None };

            if let Some(id) = container.and_then(|c| self.sync.ensure_id(c)) {
                if modifiers.toggles_selection() {
                    match self.selection.iter().position(|s| *s == id) {
                        Some(pos) => {
                            self.selection.remove(pos);
                        }
                        None => self.selection.push(id),
                    }
                } else if !self.selection.contains(&id) {
                    self.selection = Selection::from_slice(&[id]);
                } else if self.selection_is_absolute() {
                    self.mode = CanvasMode::Transforming(Transform {
                        kind: TransformKind::Drag,
                        origin: point,
                        last: point,
                        changed: false,
                    });
                }
                return;
            }
        }

        self.selection.clear();
        self.mode = CanvasMode::MarqueeDrawing {
            origin: point,
            current: point,
        };
    }

    fn selection_is_absolute(&self) -> bool {
        self.selection.iter().all(|id| {
            self.sync
                .doc
                .index_of(*id)
                .is_some_and(|idx| is_absolute(&self.sync.doc, idx))
        })
    }

    /// Start a resize from a host-drawn handle.
    pub fn begin_resize(&mut self, id: ElementId, point: Point) -> bool {
        let Some(start) = self.gesture_target(id) else {
            return false;
        };
        self.mode = CanvasMode::Transforming(Transform {
            kind: TransformKind::Resize { id, start },
            origin: point,
            last: point,
            changed: false,
        });
        true
    }

    /// Start a rotation from a host-drawn handle.
    pub fn begin_rotate(&mut self, id: ElementId, point: Point) -> bool {
        let Some(start) = self.gesture_target(id) else {
            return false;
        };
        self.mode = CanvasMode::Transforming(Transform {
            kind: TransformKind::Rotate {
                id,
                center: start.center(),
            },
            origin: point,
            last: point,
            changed: false,
        });
        true
    }

    fn gesture_target(&self, id: ElementId) -> Option<Rect> {
        if self.busy || !self.is_idle() || !self.selection.contains(&id) {
            return None;
        }
        self.sync.bounds_of(id)
    }

    pub fn pointer_move(&mut self, point: Point) {
        let mut mutations = Vec::new();
        match &mut self.mode {
            CanvasMode::MarqueeDrawing { current, .. } => *current = point,
            CanvasMode::Transforming(t) => {
                let delta: Vec2 = point - t.last;
                match t.kind {
                    TransformKind::Drag => {
                        if delta != Vec2::ZERO {
                            mutations.extend(self.selection.iter().map(|&id| EditMutation::Move {
                                id,
                                dx: delta.x,
                                dy: delta.y,
                            }));
                        }
                    }
                    TransformKind::Resize { id, start } => {
                        let total = point - t.origin;
                        mutations.push(EditMutation::Resize {
                            id,
                            width: start.width() + total.x,
                            height: start.height() + total.y,
                        });
                    }
                    TransformKind::Rotate { id, center } => {
                        let v = point - center;
                        mutations.push(EditMutation::Rotate {
                            id,
                            degrees: v.y.atan2(v.x).to_degrees() + 90.0,
                        });
                    }
                }
                t.last = point;
                t.changed |= !mutations.is_empty();
            }
            _ => {}
        }
        for mutation in mutations {
            self.sync.apply_mutation(mutation);
        }
    }

    pub fn pointer_up(&mut self, point: Point) {
        match std::mem::replace(&mut self.mode, CanvasMode::Idle) {
            CanvasMode::MarqueeDrawing { origin, .. } => {
                self.selection = self.marquee_hits(Rect::from_points(origin, point));
            }
            CanvasMode::Transforming(t) => {
                if t.changed {
                    self.commit();
                }
            }
            other => self.mode = other,
        }
    }

    /// Id-bearing elements overlapping `rect` whose parent is the canvas root
    /// or an absolutely positioned container.
    fn marquee_hits(&self, rect: Rect) -> Selection {
        let doc = &self.sync.doc;
        hit_test_rect(doc, &self.sync.bounds, rect)
            .into_iter()
            .filter(|&n| doc.attr(n, "id").is_some_and(|id| !id.is_empty()))
            .filter(|&n| {
                doc.parent(n)
                    .is_some_and(|p| p == doc.root || doc.has_class(p, "absolute"))
            })
            .filter_map(|n| doc.id_of(n))
            .collect()
    }

    // ─── Text editing ────────────────────────────────────────────────────

    pub fn double_click(&mut self, point: Point) {
        if self.busy || !self.is_idle() || !self.on_canvas(point) {
            return;
        }
        let doc = &self.sync.doc;
        let Some(target) = hit_test(doc, &self.sync.bounds, point) else {
            return;
        };
        let Some(editable) = doc.closest(target, |d, n| {
            EDITABLE_TAGS.iter().any(|tag| d.is_tag(n, tag))
        }) else {
            return;
        };
        // Positioned wrappers around other elements are not text.
        if doc.has_class(editable, "absolute")
            && !doc.element_children(editable).is_empty()
            && doc.text_content(editable).trim().is_empty()
        {
            return;
        }
        let Some(id) = self.sync.ensure_id(editable) else {
            return;
        };
        self.sync.apply_mutation(EditMutation::SetAttr {
            id,
            name: "contenteditable".into(),
            value: "true".into(),
        });
        self.selection.clear();
        self.mode = CanvasMode::TextEditing {
            element: id,
            blur_deadline: None,
        };
    }

    /// Push the editor's current inner HTML into the tree.
    pub fn set_editing_html(&mut self, html: &str) {
        if let CanvasMode::TextEditing { element, .. } = self.mode {
            self.sync.apply_mutation(EditMutation::SetInnerHtml {
                id: element,
                html: html.to_string(),
            });
        }
    }

    /// The editor lost focus at `now`; it closes after the grace delay.
    pub fn blur(&mut self, now: Duration) {
        let grace = self.config.blur_grace;
        if let CanvasMode::TextEditing { blur_deadline, .. } = &mut self.mode {
            *blur_deadline = Some(now + grace);
        }
    }

    /// Focus came back (toolbar interaction) before the grace delay ran out.
    pub fn refocus(&mut self) {
        if let CanvasMode::TextEditing { blur_deadline, .. } = &mut self.mode {
            *blur_deadline = None;
        }
    }

    pub fn tick(&mut self, now: Duration) {
        if let CanvasMode::TextEditing {
            blur_deadline: Some(deadline),
            ..
        } = self.mode
            && now >= deadline
        {
            self.finish_text_editing();
        }
    }

    /// Leave text editing and commit.
    pub fn finish_text_editing(&mut self) {
        let CanvasMode::TextEditing { element, .. } = self.mode else {
            return;
        };
        self.mode = CanvasMode::Idle;
        if let Some(idx) = self.sync.doc.index_of(element) {
            self.sync.doc.remove_attr(idx, "contenteditable");
        }
        self.commit();
    }

    // ─── Context menu ────────────────────────────────────────────────────

    pub fn open_context_menu(&mut self, point: Point) {
        if self.busy {
            return;
        }
        let doc = &self.sync.doc;
        let hit = self
            .on_canvas(point)
            .then(|| hit_test(doc, &self.sync.bounds, point))
            .flatten();
        let target = hit.map(|mut n| {
            while let Some(parent) = doc.parent(n)
                && parent != doc.root
                && !doc.has_class(n, "absolute")
            {
                n = parent;
            }
            n
        });
        let target = target.and_then(|n| self.sync.ensure_id(n));
        if let Some(id) = target
            && !self.selection.contains(&id)
        {
            self.selection = Selection::from_slice(&[id]);
        }
        self.context_menu = Some(ContextMenu {
            position: point,
            target,
        });
    }

    /// Drop the selection and any menu (Escape).
    pub fn clear_selection(&mut self) {
        if matches!(self.mode, CanvasMode::Transforming(_)) {
            return;
        }
        self.selection.clear();
        self.active_image = None;
        self.context_menu = None;
    }

    pub fn close_context_menu(&mut self) {
        self.context_menu = None;
    }

    fn apply_to_selection(&mut self, f: impl Fn(ElementId) -> EditMutation) -> Vec<ElementId> {
        let targets: Vec<ElementId> = self.selection.to_vec();
        targets
            .into_iter()
            .filter_map(|id| self.sync.apply_mutation(f(id)))
            .collect()
    }

    pub fn delete_selected(&mut self) {
        if self.busy || self.selection.is_empty() {
            return;
        }
        self.apply_to_selection(|id| EditMutation::Remove { id });
        self.selection.clear();
        self.active_image = None;
        self.context_menu = None;
        self.commit();
    }

    /// Duplicates become the new selection.
    pub fn duplicate_selected(&mut self) {
        if self.busy || self.selection.is_empty() {
            return;
        }
        let offset = self.config.duplicate_offset;
        let clones = self.apply_to_selection(|id| EditMutation::Duplicate { id, offset });
        self.selection = clones.into_iter().collect();
        self.context_menu = None;
        self.commit();
    }

    pub fn bring_to_front(&mut self) {
        if self.busy {
            return;
        }
        self.apply_to_selection(|id| EditMutation::BringToFront { id });
        self.context_menu = None;
        self.commit();
    }

    pub fn send_to_back(&mut self) {
        if self.busy {
            return;
        }
        self.apply_to_selection(|id| EditMutation::SendToBack { id });
        self.context_menu = None;
        self.commit();
    }

    // ─── Images ──────────────────────────────────────────────────────────

    /// The element itself when it is an `<img>`, otherwise its first
    /// descendant image.
    fn image_within(&mut self, id: ElementId) -> Option<ElementId> {
        let doc = &self.sync.doc;
        let idx = doc.index_of(id)?;
        let img = if doc.is_tag(idx, "img") {
            idx
        } else {
            doc.find_descendant(idx, |d, n| d.is_tag(n, "img"))?
        };
        self.sync.ensure_id(img)
    }

    fn selected_image(&mut self) -> Option<ElementId> {
        if let Some(img) = self.active_image
            && self.sync.doc.index_of(img).is_some()
        {
            return Some(img);
        }
        let first = *self.selection.first()?;
        self.image_within(first)
    }

    /// Swap the selected image's source for an uploaded data URL.
    pub fn replace_image(&mut self, data_url: &str) -> bool {
        if self.busy {
            return false;
        }
        let Some(img) = self.selected_image() else {
            return false;
        };
        self.sync.apply_mutation(EditMutation::SetAttr {
            id: img,
            name: "src".into(),
            value: data_url.to_string(),
        });
        self.sync.apply_mutation(EditMutation::SetAttr {
            id: img,
            name: "alt".into(),
            value: "custom image".into(),
        });
        self.commit();
        self.notices.push(Notice::info("Image replaced successfully."));
        true
    }

    /// `fit` is `contain`, `cover` or `fill`; the image is stretched to its box.
    pub fn set_object_fit(&mut self, fit: &str) {
        if self.busy {
            return;
        }
        let images: Vec<ElementId> = self
            .selection
            .to_vec()
            .into_iter()
            .filter_map(|id| self.image_within(id))
            .collect();
        for img in images {
            for (property, value) in [("object-fit", fit), ("width", "100%"), ("height", "100%")] {
                self.sync.apply_mutation(EditMutation::SetStyle {
                    id: img,
                    property: property.into(),
                    value: value.into(),
                });
            }
        }
        self.commit();
    }

    pub fn set_border_radius(&mut self, radius: &str) {
        if self.busy {
            return;
        }
        for id in self.selection.to_vec() {
            for (property, value) in [("border-radius", radius), ("overflow", "hidden")] {
                self.sync.apply_mutation(EditMutation::SetStyle {
                    id,
                    property: property.into(),
                    value: value.into(),
                });
            }
        }
        self.commit();
    }

    // ─── AI element edit ─────────────────────────────────────────────────

    /// Serialized element, as handed to the generator.
    pub fn element_outer_html(&self, id: ElementId) -> Option<String> {
        let idx = self.sync.doc.index_of(id)?;
        let mut clean = self.sync.doc.clone();
        clean.strip_editing_artifacts();
        clean
            .contains(idx)
            .then(|| emit_outer(&clean, idx))
    }

    /// Swap `id` for the first element of a generated reply. A reply with no
    /// element leaves the slide untouched.
    pub fn apply_element_edit(&mut self, id: ElementId, html: &str) -> bool {
        let Some(new_id) = self.sync.apply_mutation(EditMutation::Replace {
            id,
            html: html.to_string(),
        }) else {
            log::warn!("element edit for {id} produced no element");
            self.notices.push(Notice::error("Edit failed"));
            return false;
        };
        for s in self.selection.iter_mut().filter(|s| **s == id) {
            *s = new_id;
        }
        if self.active_image == Some(id) {
            self.active_image = None;
        }
        self.commit();
        true
    }

    // ─── Crop ────────────────────────────────────────────────────────────

    /// Enter cropping for the single selected image-bearing element.
    pub fn begin_crop(&mut self, zoom: f64) -> bool {
        if self.busy || !self.is_idle() || self.selection.len() != 1 {
            return false;
        }
        let element = self.selection[0];
        let Some(image) = self.image_within(element) else {
            return false;
        };
        let (Some(element_bounds), Some(image_bounds)) =
            (self.sync.bounds_of(element), self.sync.bounds_of(image))
        else {
            return false;
        };
        let doc = &self.sync.doc;
        let parent_origin = doc
            .index_of(element)
            .and_then(|idx| doc.parent(idx))
            .and_then(|p| self.sync.bounds.get(&p))
            .map(|b| b.origin())
            .unwrap_or(Point::ZERO);
        let offset = Point::new(
            element_bounds.x0 - parent_origin.x,
            element_bounds.y0 - parent_origin.y,
        );
        self.context_menu = None;
        self.mode = CanvasMode::Cropping(CropSession::new(
            element,
            image,
            element_bounds,
            image_bounds,
            offset,
            zoom,
        ));
        true
    }

    pub fn set_crop_rect(&mut self, rect: Rect) {
        if let CanvasMode::Cropping(session) = &mut self.mode {
            session.set_crop(rect);
        }
    }

    pub fn cancel_crop(&mut self) {
        if matches!(self.mode, CanvasMode::Cropping(_)) {
            self.mode = CanvasMode::Idle;
        }
    }

    /// Rasterize the crop and rewrite the container. Any failure leaves the
    /// slide untouched and raises a notice.
    pub fn confirm_crop(&mut self, fetcher: &dyn ImageFetcher) -> bool {
        let CanvasMode::Cropping(session) = std::mem::replace(&mut self.mode, CanvasMode::Idle)
        else {
            return false;
        };
        let Some(src) = self
            .sync
            .doc
            .index_of(session.image)
            .and_then(|idx| self.sync.doc.attr(idx, "src"))
            .map(str::to_string)
        else {
            let err = CropError::Decode("image has no source".into());
            log::warn!("crop of {} aborted: {err:?}", session.image);
            self.notices.push(Notice::error(err.to_string()));
            return false;
        };
        let outcome = match session.confirm(&src, fetcher, self.config.min_crop_px) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("crop of {} aborted: {e:?}", session.image);
                self.notices.push(Notice::error(e.to_string()));
                return false;
            }
        };
        self.sync.apply_mutation(EditMutation::SetAttr {
            id: session.image,
            name: "src".into(),
            value: outcome.data_url,
        });
        let g = outcome.geometry;
        for (property, value) in [
            ("width", g.width),
            ("height", g.height),
            ("left", g.left),
            ("top", g.top),
        ] {
            self.sync.apply_mutation(EditMutation::SetStyle {
                id: session.element,
                property: property.into(),
                value: format_px(value),
            });
        }
        self.commit();
        true
    }

    // ─── Content changes ─────────────────────────────────────────────────

    /// New persisted content for the active slide (undo, redo, AI edit).
    /// The selection is re-resolved by id; missing elements drop out.
    pub fn reload(&mut self, content: &str) {
        if !self.sync.load(content) {
            return;
        }
        let doc = &self.sync.doc;
        let restored: Selection = self
            .selection
            .iter()
            .copied()
            .filter(|id| doc.index_of(*id).is_some())
            .collect();
        if restored != self.selection {
            self.selection = restored;
        }
        if self
            .active_image
            .is_some_and(|img| self.sync.doc.index_of(img).is_none())
        {
            self.active_image = None;
        }
        if self.selection.len() == 1 && self.active_image.is_none() {
            let only = self.selection[0];
            self.active_image = self.image_within(only);
        }
        let stale = match &self.mode {
            CanvasMode::TextEditing { element, .. } => Some(*element),
            CanvasMode::Cropping(session) => Some(session.element),
            CanvasMode::Transforming(_) | CanvasMode::MarqueeDrawing { .. } => None,
            CanvasMode::Idle => None,
        };
        if stale.is_some_and(|id| self.sync.doc.index_of(id).is_none())
            || matches!(self.mode, CanvasMode::Transforming(_))
        {
            self.mode = CanvasMode::Idle;
        }
        if let Some(menu) = self.context_menu
            && menu
                .target
                .is_some_and(|id| self.sync.doc.index_of(id).is_none())
        {
            self.context_menu = None;
        }
    }

    /// Switch to another slide. Transient state is dropped unconditionally;
    /// nothing is committed.
    pub fn navigate(&mut self, content: &str) {
        self.mode = CanvasMode::Idle;
        self.selection.clear();
        self.active_image = None;
        self.context_menu = None;
        self.sync = SyncEngine::from_content(content, self.config.viewport);
    }
}

/// Elements a click selects: images, positioned or flex boxes, and anything
/// styled with a text utility.
fn is_container(doc: &SlideDocument, n: NodeIndex) -> bool {
    doc.is_tag(n, "img")
        || ["relative", "absolute", "flex"]
            .iter()
            .any(|c| doc.has_class(n, c))
        || doc.attr(n, "class").is_some_and(|c| c.contains("text-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SLIDE: &str = concat!(
        r#"<div class="absolute inset-0 bg-white">"#,
        r#"<h1 id="title" class="absolute text-7xl" style="left: 100px; top: 100px; width: 800px; height: 120px;">Hello</h1>"#,
        r#"<div id="card" class="absolute" style="left: 1000px; top: 400px; width: 400px; height: 300px;"><img id="photo" src="https://cdn.example.com/p.png" class="w-full"></div>"#,
        r#"</div>"#
    );

    fn canvas() -> Canvas {
        Canvas::new(SLIDE, EditorConfig::default())
    }

    fn id(s: &str) -> ElementId {
        ElementId::intern(s)
    }

    #[test]
    fn click_selects_then_shift_toggles() {
        let mut c = canvas();
        c.pointer_down(Point::new(150.0, 150.0), Modifiers::NONE);
        c.pointer_up(Point::new(150.0, 150.0));
        assert_eq!(c.selection(), &[id("title")]);

        c.pointer_down(Point::new(1100.0, 500.0), Modifiers::SHIFT);
        assert_eq!(c.selection(), &[id("title"), id("photo")]);
        assert_eq!(c.active_image(), Some(id("photo")));

        c.pointer_down(Point::new(150.0, 150.0), Modifiers::SHIFT);
        assert_eq!(c.selection(), &[id("photo")]);
    }

    #[test]
    fn press_outside_canvas_starts_marquee() {
        let mut c = canvas();
        c.pointer_down(Point::new(150.0, 150.0), Modifiers::NONE);
        c.pointer_down(Point::new(-50.0, -50.0), Modifiers::NONE);
        assert!(c.selection().is_empty());
        assert!(c.marquee_rect().is_some());
        c.pointer_move(Point::new(1200.0, 200.0));
        c.pointer_up(Point::new(1200.0, 200.0));
        // The id-less background is skipped; the card lies below the band.
        assert_eq!(c.selection(), &[id("title")]);
        assert_eq!(c.mode(), &CanvasMode::Idle);
    }

    #[test]
    fn drag_commits_once_per_gesture() {
        let mut c = canvas();
        c.pointer_down(Point::new(150.0, 150.0), Modifiers::NONE);
        c.pointer_up(Point::new(150.0, 150.0));
        assert!(c.take_commits().is_empty());

        c.pointer_down(Point::new(150.0, 150.0), Modifiers::NONE);
        assert!(matches!(c.mode(), CanvasMode::Transforming(_)));
        for step in 1..=10 {
            c.pointer_move(Point::new(150.0 + step as f64 * 5.0, 150.0));
        }
        c.pointer_up(Point::new(200.0, 150.0));
        let commits = c.take_commits();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].contains("left: 150px; top: 100px;"), "{}", commits[0]);
    }

    #[test]
    fn double_click_edit_without_change_is_silent() {
        let mut c = canvas();
        c.double_click(Point::new(150.0, 150.0));
        assert_eq!(
            c.mode(),
            &CanvasMode::TextEditing {
                element: id("title"),
                blur_deadline: None
            }
        );
        // Gestures are suppressed while editing.
        c.pointer_down(Point::new(-10.0, -10.0), Modifiers::NONE);
        assert!(matches!(c.mode(), CanvasMode::TextEditing { .. }));

        c.blur(Duration::from_millis(1000));
        c.tick(Duration::from_millis(1100));
        assert!(matches!(c.mode(), CanvasMode::TextEditing { .. }));
        c.tick(Duration::from_millis(1200));
        assert_eq!(c.mode(), &CanvasMode::Idle);
        assert!(c.take_commits().is_empty());
    }

    #[test]
    fn refocus_cancels_blur() {
        let mut c = canvas();
        c.double_click(Point::new(150.0, 150.0));
        c.blur(Duration::ZERO);
        c.refocus();
        c.tick(Duration::from_secs(5));
        assert!(matches!(c.mode(), CanvasMode::TextEditing { .. }));
        c.set_editing_html("Hello <b>world</b>");
        c.finish_text_editing();
        let commits = c.take_commits();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].contains(">Hello <b>world</b></h1>"));
        assert!(!commits[0].contains("contenteditable"));
    }

    #[test]
    fn positioned_wrapper_is_not_text_editable() {
        let mut c = canvas();
        // Shrink the image so the point lands on the card itself.
        c.sync.set_measured_bounds(id("photo"), Rect::new(1000.0, 400.0, 1400.0, 500.0));
        c.double_click(Point::new(1100.0, 650.0));
        assert_eq!(c.mode(), &CanvasMode::Idle);
    }

    #[test]
    fn context_menu_targets_positioned_ancestor() {
        let mut c = canvas();
        c.open_context_menu(Point::new(1100.0, 500.0));
        let menu = c.context_menu().unwrap();
        assert_eq!(menu.target, Some(id("card")));
        assert_eq!(c.selection(), &[id("card")]);

        c.duplicate_selected();
        let commits = c.take_commits();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].contains("left: 1020px; top: 420px;"));
        assert_ne!(c.selection(), &[id("card")]);

        c.send_to_back();
        c.delete_selected();
        assert_eq!(c.take_commits().len(), 2);
        assert!(c.selection().is_empty());
    }

    #[test]
    fn busy_canvas_ignores_gestures() {
        let mut c = canvas();
        c.set_busy(true);
        c.pointer_down(Point::new(150.0, 150.0), Modifiers::NONE);
        c.double_click(Point::new(150.0, 150.0));
        assert!(c.selection().is_empty());
        assert_eq!(c.mode(), &CanvasMode::Idle);
    }

    #[test]
    fn image_style_and_replace() {
        let mut c = canvas();
        c.pointer_down(Point::new(1100.0, 500.0), Modifiers::NONE);
        c.pointer_up(Point::new(1100.0, 500.0));
        assert_eq!(c.selection(), &[id("photo")]);

        c.set_object_fit("cover");
        let html = c.take_commits().pop().unwrap();
        assert!(html.contains(r#"style="object-fit: cover; width: 100%; height: 100%;""#));

        assert!(c.replace_image("data:image/png;base64,AAAA"));
        let html = c.take_commits().pop().unwrap();
        assert!(html.contains(r#"src="data:image/png;base64,AAAA""#));
        assert!(html.contains(r#"alt="custom image""#));
        assert_eq!(
            c.take_notices(),
            vec![Notice::info("Image replaced successfully.")]
        );
    }

    #[test]
    fn failed_element_edit_keeps_original() {
        let mut c = canvas();
        let before = c.sync.emit_clean();
        assert!(!c.apply_element_edit(id("title"), "Sorry, I can't do that."));
        assert_eq!(c.sync.emit_clean(), before);
        assert!(c.take_commits().is_empty());
        assert_eq!(c.take_notices(), vec![Notice::error("Edit failed")]);
    }

    #[test]
    fn crop_of_image_without_source_raises_notice() {
        let mut c = Canvas::new(
            concat!(
                r#"<div class="absolute inset-0">"#,
                r#"<div id="frame" class="absolute" style="left: 0px; top: 0px; width: 200px; height: 100px;"><img class="w-full h-full"></div>"#,
                r#"</div>"#
            ),
            EditorConfig::default(),
        );
        c.open_context_menu(Point::new(50.0, 50.0));
        assert_eq!(c.selection(), &[id("frame")]);
        assert!(c.begin_crop(1.0));
        assert!(!c.confirm_crop(&crate::crop::NoFetch));
        assert_eq!(c.mode(), &CanvasMode::Idle);
        assert!(c.take_commits().is_empty());
        assert_eq!(c.take_notices(), vec![Notice::error("Failed to process image.")]);
    }

    #[test]
    fn navigation_resets_everything() {
        let mut c = canvas();
        c.pointer_down(Point::new(150.0, 150.0), Modifiers::NONE);
        c.open_context_menu(Point::new(150.0, 150.0));
        c.navigate("<p>other</p>");
        assert!(c.selection().is_empty());
        assert!(c.context_menu().is_none());
        assert_eq!(c.mode(), &CanvasMode::Idle);
        assert!(c.take_commits().is_empty());
    }
}
