mod api;
mod app;
mod colors;
mod components;
mod config;
mod import;
mod logging;
mod models;
mod observe;
mod pages;
mod shortcuts;
mod state;
mod storage;
mod util;

use crate::app::App;
use crate::logging::{default_level, init_logging};
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    init_logging(default_level());
    log::info!("duo-notes {} starting", env!("CARGO_PKG_VERSION"));
    mount_to_body(App);
}
