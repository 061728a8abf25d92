//! User-defined text colors, kept in insertion order without duplicates.

use crate::store::SettingsStore;

pub const CUSTOM_COLORS_KEY: &str = "customColors";

pub struct CustomColors<S: SettingsStore> {
    colors: Vec<String>,
    store: S,
}

impl<S: SettingsStore> CustomColors<S> {
    /// Load the saved palette. Missing or malformed data yields an empty one.
    pub fn load(store: S) -> Self {
        let colors = match store.get(CUSTOM_COLORS_KEY) {
            Some(raw) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_else(|e| {
                log::warn!("ignoring malformed {CUSTOM_COLORS_KEY}: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        };
        Self { colors, store }
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    /// Append `color` unless already present; saves on change.
    pub fn add(&mut self, color: &str) -> bool {
        if self.colors.iter().any(|c| c == color) {
            return false;
        }
        self.colors.push(color.to_string());
        self.save();
        true
    }

    fn save(&self) {
        let encoded = match serde_json::to_string(&self.colors) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::warn!("cannot encode {CUSTOM_COLORS_KEY}: {e}");
                return;
            }
        };
        if let Err(e) = self.store.set(CUSTOM_COLORS_KEY, &encoded) {
            log::warn!("cannot save {CUSTOM_COLORS_KEY}: {e}");
        }
    }
}
