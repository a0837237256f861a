use serde::{Deserialize, Serialize};

pub const DEFAULT_DATA_URL: &str = "http://localhost:54321";

/// Runtime configuration injected by the host page as `window.ENV`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    pub data_url: String,
    pub anon_key: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            anon_key: String::new(),
        }
    }
}

impl EnvConfig {
    pub fn from_window() -> Self {
        let mut config = Self::default();
        if !cfg!(target_arch = "wasm32") {
            return config;
        }

        let Some(env) = web_sys::window().and_then(|w| w.get("ENV")) else {
            return config;
        };
        if env.is_undefined() || !env.is_object() {
            return config;
        }

        // Prefer the documented upper-case keys, fall back to lower-case ones.
        let read = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|k| {
                js_sys::Reflect::get(&env, &(*k).into())
                    .ok()
                    .and_then(|v| v.as_string())
            })
        };

        if let Some(url) = read(&["SUPABASE_URL", "supabase_url"]) {
            config.data_url = url;
        }
        if let Some(key) = read(&["SUPABASE_ANON_KEY", "supabase_anon_key"]) {
            config.anon_key = key;
        }
        config.normalized()
    }

    /// Trim whitespace and trailing slashes so paths can be appended directly.
    pub fn normalized(mut self) -> Self {
        self.data_url = self.data_url.trim().trim_end_matches('/').to_string();
        if self.data_url.is_empty() {
            self.data_url = DEFAULT_DATA_URL.to_string();
        }
        self.anon_key = self.anon_key.trim().to_string();
        self
    }
}
