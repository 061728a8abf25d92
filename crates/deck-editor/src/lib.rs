pub mod canvas;
pub mod colors;
pub mod config;
pub mod crop;
pub mod history;
pub mod hit;
pub mod input;
pub mod notice;
pub mod session;
pub mod shortcuts;
pub mod store;
pub mod sync;

pub use canvas::{Canvas, CanvasMode, ContextMenu};
pub use config::EditorConfig;
pub use crop::{CropError, CropSession, ImageFetcher};
pub use history::DeckHistory;
pub use input::{InputEvent, Modifiers};
pub use notice::{Notice, NoticeLevel};
pub use session::DeckSession;
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use sync::{EditMutation, SyncEngine};
