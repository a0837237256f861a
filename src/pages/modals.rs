use crate::colors::{generate_pastel_color, is_valid_color, DEFAULT_TAG_COLOR, PALETTE};
use crate::components::ui::{
    Button, ButtonSize, ButtonVariant, ErrorAlert, Input, Label, Spinner, Textarea,
};
use crate::models::{NotePatch, TagFields};
use crate::state::{AppContext, AppResult, Generation};
use icons::{Check, Shuffle, X};
use leptos::prelude::*;
use leptos::task::spawn_local;

/// Centered dialog over a dimmed backdrop. Clicking the backdrop closes it.
#[component]
pub fn Modal(
    #[prop(into)] open: Signal<bool>,
    #[prop(into)] title: Signal<String>,
    #[prop(into)] on_close: Callback<()>,
    children: ChildrenFn,
) -> impl IntoView {
    let children = StoredValue::new(children);

    view! {
        <Show when=move || open.get() fallback=|| ().into_view()>
            <div
                class="fixed inset-0 z-50 flex items-center justify-center bg-black/30 px-4"
                on:click=move |_| on_close.run(())
            >
                <div
                    class="w-full max-w-md rounded-md border border-border bg-background shadow-lg"
                    on:click=|ev: web_sys::MouseEvent| ev.stop_propagation()
                >
                    <div class="flex items-center justify-between border-b border-border px-4 py-3">
                        <div class="text-sm font-medium">{move || title.get()}</div>
                        <Button
                            variant=ButtonVariant::Ghost
                            size=ButtonSize::IconSm
                            attr:title="Close"
                            on:click=move |_| on_close.run(())
                        >
                            <X />
                        </Button>
                    </div>
                    <div class="space-y-3 p-4">{move || children.with_value(|c| c())}</div>
                </div>
            </div>
        </Show>
    }
}

/// Cancel / primary action row used at the bottom of every form modal.
#[component]
pub fn ModalFooter(
    #[prop(into)] busy: Signal<bool>,
    #[prop(into)] label: String,
    #[prop(into)] busy_label: String,
    #[prop(into)] on_cancel: Callback<()>,
    #[prop(into)] on_submit: Callback<()>,
) -> impl IntoView {
    view! {
        <div class="flex items-center justify-end gap-2 pt-2">
            <Button
                variant=ButtonVariant::Outline
                size=ButtonSize::Sm
                attr:disabled=move || busy.get()
                on:click=move |_| on_cancel.run(())
            >
                "Cancel"
            </Button>
            <Button
                size=ButtonSize::Sm
                attr:disabled=move || busy.get()
                on:click=move |_| on_submit.run(())
            >
                <span class="inline-flex items-center gap-2">
                    <Show when=move || busy.get() fallback=|| ().into_view()>
                        <Spinner />
                    </Show>
                    {move || if busy.get() { busy_label.clone() } else { label.clone() }}
                </span>
            </Button>
        </div>
    }
}

/// Create a note, or edit the one in `editing`, including its tags.
#[component]
pub fn NoteModal(open: RwSignal<bool>, editing: RwSignal<Option<String>>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let title: RwSignal<String> = RwSignal::new(String::new());
    let content: RwSignal<String> = RwSignal::new(String::new());
    let tag_ids: RwSignal<Vec<String>> = RwSignal::new(vec![]);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let saving: RwSignal<bool> = RwSignal::new(false);
    // Only the lookup for the note currently being edited may fill `tag_ids`.
    let tag_lookup = StoredValue::new_local(Generation::new());
    // Saving before the lookup lands must not overwrite the note's tags.
    let tags_loaded: RwSignal<bool> = RwSignal::new(false);

    // Populate the form each time the modal opens.
    Effect::new(move |_| {
        let is_open = open.get();
        let editing_id = editing.get();
        tag_lookup.with_value(Generation::invalidate);
        if !is_open {
            return;
        }
        error.set(None);
        saving.set(false);
        tag_ids.set(vec![]);
        tags_loaded.set(editing_id.is_none());

        let Some(id) = editing_id else {
            title.set(String::new());
            content.set(String::new());
            return;
        };

        if let Some(note) = app_state.0.notes.with_untracked(|s| s.find(&id).cloned()) {
            title.set(note.title);
            content.set(note.content);
        }
        let stores = app_state.0.stores();
        let lookup = tag_lookup.get_value();
        spawn_local(async move {
            let Some(result) = lookup.run(stores.tags.get_tags_for_note(&id)).await else {
                log::debug!("dropping stale tag lookup for note {id}");
                return;
            };
            match result {
                Ok(tags) => {
                    tag_ids.set(tags.into_iter().map(|t| t.id).collect());
                    tags_loaded.set(true);
                }
                Err(e) => error.set(Some(e.to_string())),
            }
        });
    });

    let toggle_tag = move |id: String| {
        tag_ids.update(|ids| {
            if let Some(pos) = ids.iter().position(|t| *t == id) {
                ids.remove(pos);
            } else {
                ids.push(id);
            }
        });
    };

    let submit = move || {
        if saving.get_untracked() {
            return;
        }
        if title.get_untracked().trim().is_empty() {
            error.set(Some("Title is required".to_string()));
            return;
        }

        let stores = app_state.0.stores();
        let editing_id = editing.get_untracked();
        let title_val = title.get_untracked();
        let content_val = content.get_untracked();
        let tags_val = tag_ids.get_untracked();
        let write_tags = tags_loaded.get_untracked();

        saving.set(true);
        error.set(None);

        spawn_local(async move {
            let result: AppResult<()> = async {
                match editing_id {
                    None => {
                        let note = stores.notes.create(&title_val, &content_val).await?;
                        if !tags_val.is_empty() {
                            stores.set_note_tags(&note.id, &tags_val).await?;
                        }
                    }
                    Some(id) => {
                        let patch = NotePatch {
                            title: Some(title_val.trim().to_string()),
                            content: Some(content_val),
                            ..Default::default()
                        };
                        stores.notes.update(&id, patch).await?;
                        if write_tags {
                            stores.set_note_tags(&id, &tags_val).await?;
                        }
                    }
                }
                Ok(())
            }
            .await;

            match result {
                Ok(()) => {
                    app_state.0.tag_links_changed();
                    open.set(false);
                }
                Err(e) => error.set(Some(e.to_string())),
            }
            saving.set(false);
        });
    };

    let modal_title = Signal::derive(move || {
        if editing.get().is_some() {
            "Edit note".to_string()
        } else {
            "New note".to_string()
        }
    });

    view! {
        <Modal open=open title=modal_title on_close=move |_| open.set(false)>
            <div class="space-y-1">
                <Label html_for="note-title" class="text-xs">"Title"</Label>
                <Input id="note-title" bind_value=title class="h-8 text-sm" />
            </div>
            <div class="space-y-1">
                <Label html_for="note-content" class="text-xs">"Content"</Label>
                <Textarea id="note-content" bind_value=content rows=8 class="text-sm" />
            </div>

            <div class="space-y-1">
                <div class="text-xs font-medium">"Tags"</div>
                <div class="flex flex-wrap gap-1.5">
                    <For
                        each=move || app_state.0.tags.with(|s| s.tags.clone())
                        key=|t| (t.id.clone(), t.name.clone(), t.color.clone())
                        let:tag
                    >
                        {
                            let id = tag.id.clone();
                            let id_for_check = tag.id.clone();
                            let is_on = move || tag_ids.with(|ids| ids.contains(&id_for_check));
                            view! {
                                <button
                                    type="button"
                                    class=move || {
                                        if is_on() {
                                            "inline-flex items-center gap-1 rounded-full border border-primary px-2 py-0.5 text-xs"
                                        } else {
                                            "inline-flex items-center gap-1 rounded-full border border-border px-2 py-0.5 text-xs text-muted-foreground"
                                        }
                                    }
                                    on:click=move |_| toggle_tag(id.clone())
                                >
                                    <span class="size-2 rounded-full" style=format!("background-color: {}", tag.color)></span>
                                    {tag.name.clone()}
                                </button>
                            }
                        }
                    </For>
                    <Show
                        when=move || app_state.0.tags.with(|s| s.tags.is_empty())
                        fallback=|| ().into_view()
                    >
                        <span class="text-xs text-muted-foreground">"No tags yet."</span>
                    </Show>
                </div>
            </div>

            <ErrorAlert message=error />

            <ModalFooter
                busy=saving
                label="Save"
                busy_label="Saving..."
                on_cancel=move |_| open.set(false)
                on_submit=move |_| submit()
            />
        </Modal>
    }
}

/// Create a tag, or edit the one in `editing`.
#[component]
pub fn TagModal(open: RwSignal<bool>, editing: RwSignal<Option<String>>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let name: RwSignal<String> = RwSignal::new(String::new());
    let color: RwSignal<String> = RwSignal::new(DEFAULT_TAG_COLOR.to_string());
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let saving: RwSignal<bool> = RwSignal::new(false);

    Effect::new(move |_| {
        if !open.get() {
            return;
        }
        error.set(None);
        saving.set(false);
        let existing = editing
            .get()
            .and_then(|id| app_state.0.tags.with_untracked(|s| s.find(&id).cloned()));
        match existing {
            Some(tag) => {
                name.set(tag.name);
                color.set(tag.color);
            }
            None => {
                name.set(String::new());
                color.set(DEFAULT_TAG_COLOR.to_string());
            }
        }
    });

    let submit = move || {
        if saving.get_untracked() {
            return;
        }
        let fields = TagFields {
            name: name.get_untracked(),
            color: color.get_untracked(),
        };
        if !is_valid_color(&fields.color) {
            error.set(Some("Pick a palette color or enter #RRGGBB / hsl(...)".to_string()));
            return;
        }

        let stores = app_state.0.stores();
        let editing_id = editing.get_untracked();
        saving.set(true);
        error.set(None);

        spawn_local(async move {
            let result = match editing_id {
                Some(id) => stores.tags.update(&id, fields).await,
                None => stores
                    .tags
                    .create(&fields.name, &fields.color)
                    .await
                    .map(|_| ()),
            };
            match result {
                Ok(()) => {
                    app_state.0.tag_links_changed();
                    open.set(false);
                }
                Err(e) => error.set(Some(e.to_string())),
            }
            saving.set(false);
        });
    };

    let modal_title = Signal::derive(move || {
        if editing.get().is_some() {
            "Edit tag".to_string()
        } else {
            "New tag".to_string()
        }
    });

    view! {
        <Modal open=open title=modal_title on_close=move |_| open.set(false)>
            <div class="space-y-1">
                <Label html_for="tag-name" class="text-xs">"Name"</Label>
                <Input id="tag-name" bind_value=name class="h-8 text-sm" />
            </div>

            <div class="space-y-1.5">
                <div class="text-xs font-medium">"Color"</div>
                <div class="flex flex-wrap gap-2">
                    {PALETTE
                        .iter()
                        .map(|swatch| {
                            let swatch = swatch.to_string();
                            let value = swatch.clone();
                            let selected = {
                                let swatch = swatch.clone();
                                move || color.with(|c| c.eq_ignore_ascii_case(&swatch))
                            };
                            view! {
                                <button
                                    type="button"
                                    class="inline-flex size-7 items-center justify-center rounded-full text-white ring-offset-2 hover:ring-2 hover:ring-border"
                                    style=format!("background-color: {swatch}")
                                    title=swatch.clone()
                                    on:click=move |_| color.set(value.clone())
                                >
                                    <Show when=selected fallback=|| ().into_view()>
                                        <Check class="size-4" />
                                    </Show>
                                </button>
                            }
                        })
                        .collect_view()}
                </div>
                <div class="flex items-center gap-2">
                    <span
                        class="size-7 shrink-0 rounded-full border border-border"
                        style=move || format!("background-color: {}", color.get())
                    ></span>
                    <Input bind_value=color class="h-8 font-mono text-xs" />
                    <Button
                        variant=ButtonVariant::Outline
                        size=ButtonSize::Sm
                        attr:title="Random pastel"
                        on:click=move |_| color.set(generate_pastel_color(&mut rand::thread_rng()))
                    >
                        <Shuffle />
                    </Button>
                </div>
            </div>

            <ErrorAlert message=error />

            <ModalFooter
                busy=saving
                label="Save"
                busy_label="Saving..."
                on_cancel=move |_| open.set(false)
                on_submit=move |_| submit()
            />
        </Modal>
    }
}
