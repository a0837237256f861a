use crate::models::{BannerSettings, Session, ViewMode};
use serde::{Deserialize, Serialize};

pub(crate) const SESSION_KEY: &str = "duo_session";
pub(crate) const BANNER_KEY: &str = "duo_banner";
pub(crate) const VIEW_MODE_KEY: &str = "duo_view_mode";

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

pub(crate) fn load_json_from_storage<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    let storage = local_storage()?;
    let json = storage.get_item(key).ok().flatten()?;
    serde_json::from_str(&json).ok()
}

pub(crate) fn save_json_to_storage<T: Serialize>(key: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        if let Some(storage) = local_storage() {
            if storage.set_item(key, &json).is_err() {
                log::warn!("failed to persist {key} to localStorage");
            }
        }
    }
}

pub(crate) fn remove_from_storage(key: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.remove_item(key);
    }
}

pub(crate) fn load_string_from_storage(key: &str) -> Option<String> {
    local_storage()?.get_item(key).ok().flatten()
}

pub(crate) fn save_string_to_storage(key: &str, value: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.set_item(key, value);
    }
}

// Browser APIs are unavailable in native builds (tests), where `web_sys::window()`
// would panic instead of returning `None`.
pub(crate) fn storage_available() -> bool {
    cfg!(target_arch = "wasm32")
}

pub(crate) fn load_session() -> Option<Session> {
    if !storage_available() {
        return None;
    }
    load_json_from_storage::<Session>(SESSION_KEY)
}

pub(crate) fn save_session(session: &Session) {
    if storage_available() {
        save_json_to_storage(SESSION_KEY, session);
    }
}

pub(crate) fn clear_session() {
    if storage_available() {
        remove_from_storage(SESSION_KEY);
    }
}

pub(crate) fn load_banner() -> BannerSettings {
    if !storage_available() {
        return BannerSettings::default();
    }
    load_json_from_storage::<BannerSettings>(BANNER_KEY).unwrap_or_default()
}

pub(crate) fn save_banner(banner: &BannerSettings) {
    if storage_available() {
        save_json_to_storage(BANNER_KEY, banner);
    }
}

pub(crate) fn load_view_mode() -> ViewMode {
    if !storage_available() {
        return ViewMode::default();
    }
    load_string_from_storage(VIEW_MODE_KEY)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

pub(crate) fn save_view_mode(mode: ViewMode) {
    if storage_available() {
        save_string_to_storage(VIEW_MODE_KEY, &mode.to_string());
    }
}
