use super::modals::{Modal, ModalFooter};
use crate::components::ui::{Button, ButtonSize, ButtonVariant, Checkbox, Input, Label};
use crate::models::BannerSettings;
use crate::state::{AppContext, DashboardActions};
use crate::storage::save_banner;
use icons::{Pencil, X};
use leptos::prelude::*;

#[component]
pub fn Banner() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let actions = expect_context::<DashboardActions>();
    let banner = app_state.0.banner;

    let dismiss = move |_| {
        banner.update(|b| b.visible = false);
        save_banner(&banner.get_untracked());
    };

    view! {
        <Show when=move || banner.with(|b| b.visible && !b.text.trim().is_empty()) fallback=|| ().into_view()>
            <div
                class="flex items-center gap-3 px-4 py-2 text-sm"
                style=move || banner.with(|b| format!("background-color: {}; color: {}", b.background_color, b.text_color))
            >
                <div class="mx-auto min-w-0 flex-1 truncate text-center">{move || banner.with(|b| b.text.clone())}</div>
                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::IconSm
                    class="text-inherit hover:bg-white/20 hover:text-inherit"
                    attr:title="Edit banner"
                    on:click=move |_| actions.open_banner.run(())
                >
                    <Pencil />
                </Button>
                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::IconSm
                    class="text-inherit hover:bg-white/20 hover:text-inherit"
                    attr:title="Dismiss"
                    on:click=dismiss
                >
                    <X />
                </Button>
            </div>
        </Show>
    }
}

#[component]
pub fn BannerModal(open: RwSignal<bool>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let banner = app_state.0.banner;

    let text: RwSignal<String> = RwSignal::new(String::new());
    let background: RwSignal<String> = RwSignal::new(String::new());
    let foreground: RwSignal<String> = RwSignal::new(String::new());
    let visible: RwSignal<bool> = RwSignal::new(true);

    Effect::new(move |_| {
        if !open.get() {
            return;
        }
        let current = banner.get_untracked();
        text.set(current.text);
        background.set(current.background_color);
        foreground.set(current.text_color);
        visible.set(current.visible);
    });

    let submit = move || {
        let next = BannerSettings {
            text: text.get_untracked().trim().to_string(),
            background_color: background.get_untracked().trim().to_string(),
            text_color: foreground.get_untracked().trim().to_string(),
            visible: visible.get_untracked(),
        };
        save_banner(&next);
        banner.set(next);
        open.set(false);
    };

    let reset = move |_| {
        let defaults = BannerSettings::default();
        text.set(defaults.text);
        background.set(defaults.background_color);
        foreground.set(defaults.text_color);
        visible.set(true);
    };

    view! {
        <Modal open=open title="Edit banner".to_string() on_close=move |_| open.set(false)>
            <div class="space-y-1">
                <Label html_for="banner-text" class="text-xs">"Text"</Label>
                <Input id="banner-text" bind_value=text class="h-8 text-sm" />
            </div>
            <div class="grid grid-cols-2 gap-2">
                <div class="space-y-1">
                    <Label html_for="banner-bg" class="text-xs">"Background"</Label>
                    <Input id="banner-bg" bind_value=background class="h-8 font-mono text-xs" />
                </div>
                <div class="space-y-1">
                    <Label html_for="banner-fg" class="text-xs">"Text color"</Label>
                    <Input id="banner-fg" bind_value=foreground class="h-8 font-mono text-xs" />
                </div>
            </div>
            <div
                class="rounded-md px-3 py-2 text-center text-sm"
                style=move || format!("background-color: {}; color: {}", background.get(), foreground.get())
            >
                {move || text.get()}
            </div>
            <div class="flex items-center justify-between">
                <label class="flex items-center gap-2 text-xs">
                    <Checkbox checked=visible on_toggle=move |on: bool| visible.set(on) />
                    "Show banner"
                </label>
                <Button variant=ButtonVariant::Link size=ButtonSize::Sm on:click=reset>
                    "Reset"
                </Button>
            </div>
            <ModalFooter
                busy=Signal::stored(false)
                label="Save"
                busy_label="Saving..."
                on_cancel=move |_| open.set(false)
                on_submit=move |_| submit()
            />
        </Modal>
    }
}
