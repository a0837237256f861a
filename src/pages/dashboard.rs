use super::banner::{Banner, BannerModal};
use super::import::ImportModal;
use super::login::LoginPage;
use super::modals::{NoteModal, TagModal};
use super::note_card::NoteCard;
use super::sidebar::Sidebar;
use crate::components::ui::{Button, ButtonSize, ButtonVariant, ErrorAlert, PageSpinner};
use crate::models::{NoteFilter, ViewMode};
use crate::shortcuts::{shortcut_for, KeyPress, Shortcut};
use crate::state::{AppContext, BulkOutcome, DashboardActions};
use crate::storage::save_view_mode;
use icons::{LayoutGrid, List, Plus, RotateCcw, Star, Trash2, X};
use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::window_event_listener;
use strum::IntoEnumIterator;
use wasm_bindgen::JsCast;

/// Shows `children` once a session exists, the login form otherwise.
#[component]
pub fn RootAuthed(children: ChildrenFn) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let session = app_state.0.session;

    if !session.with_untracked(|s| s.initialized) {
        let stores = app_state.0.stores();
        spawn_local(async move { stores.session.refresh_session().await });
    }

    // Reload the containers whenever the signed-in user changes.
    let user_id = Memo::new(move |_| session.with(|s| s.user.as_ref().map(|u| u.id.clone())));
    Effect::new(move |_| {
        if user_id.get().is_none() {
            return;
        }
        let stores = app_state.0.stores();
        spawn_local(async move {
            if let Err(e) = stores.load().await {
                log::error!("initial load failed: {e}");
            }
        });
    });

    let children = StoredValue::new(children);

    view! {
        <Show
            when=move || session.with(|s| s.initialized)
            fallback=|| view! { <PageSpinner label="Loading your notes..." /> }
        >
            <Show when=move || user_id.get().is_some() fallback=move || view! { <LoginPage /> }>
                {move || children.with_value(|c| c())}
            </Show>
        </Show>
    }
}

fn outcome_message(verb: &str, outcome: &BulkOutcome) -> Option<String> {
    if outcome.is_success() {
        return None;
    }
    let first = outcome
        .failed
        .first()
        .map(|(_, e)| e.to_string())
        .unwrap_or_default();
    Some(format!(
        "Could not {verb} {} of {} notes: {first}",
        outcome.failed.len(),
        outcome.failed.len() + outcome.succeeded.len()
    ))
}

#[component]
fn BulkBar(message: RwSignal<Option<String>>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let selected = app_state.0.selected;
    let in_trash = move || app_state.0.notes.with(|s| s.filter == NoteFilter::Trash);
    let busy: RwSignal<bool> = RwSignal::new(false);
    let tag_choice: RwSignal<String> = RwSignal::new(String::new());

    // Runs a bulk operation over the current selection and reports failures.
    let run = move |verb: &'static str, clear_after: bool, op: BulkOp| {
        let ids: Vec<String> = selected.with_untracked(|s| s.iter().cloned().collect());
        if ids.is_empty() || busy.get_untracked() {
            return;
        }
        let stores = app_state.0.stores();
        busy.set(true);
        message.set(None);
        spawn_local(async move {
            let outcome = match op {
                BulkOp::Favorite => stores.notes.bulk_set_favorite(&ids, true).await,
                BulkOp::Trash => stores.notes.bulk_move_to_trash(&ids).await,
                BulkOp::Restore => stores.notes.bulk_restore(&ids).await,
                BulkOp::DeleteForever => stores.notes.bulk_permanently_delete(&ids).await,
                BulkOp::AddTag(tag_id) => {
                    let outcome = stores.bulk_add_tag(&ids, &tag_id).await;
                    app_state.0.tag_links_changed();
                    outcome
                }
            };
            message.set(outcome_message(verb, &outcome));
            if clear_after {
                selected.update(|s| {
                    for id in &outcome.succeeded {
                        s.remove(id);
                    }
                });
            }
            busy.set(false);
        });
    };

    let on_delete_forever = move |_| {
        let n = selected.with_untracked(|s| s.len());
        let confirmed = window()
            .confirm_with_message(&format!("Delete {n} notes forever? This cannot be undone."))
            .unwrap_or(false);
        if confirmed {
            run("delete", true, BulkOp::DeleteForever);
        }
    };

    let on_tag_change = move |ev: web_sys::Event| {
        let Some(value) = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlSelectElement>().ok())
            .map(|el| el.value())
        else {
            return;
        };
        tag_choice.set(String::new());
        if !value.is_empty() {
            run("tag", false, BulkOp::AddTag(value));
        }
    };

    view! {
        <Show when=move || selected.with(|s| !s.is_empty()) fallback=|| ().into_view()>
            <div class="flex flex-wrap items-center gap-2 rounded-md border border-border bg-muted/40 px-3 py-2 text-sm">
                <span class="font-medium">{move || format!("{} selected", selected.with(|s| s.len()))}</span>
                <div class="flex-1"></div>
                <Show
                    when=move || !in_trash()
                    fallback=move || view! {
                        <Button variant=ButtonVariant::Outline size=ButtonSize::Sm attr:disabled=move || busy.get() on:click=move |_| run("restore", true, BulkOp::Restore)>
                            <RotateCcw />
                            "Restore"
                        </Button>
                        <Button variant=ButtonVariant::Destructive size=ButtonSize::Sm attr:disabled=move || busy.get() on:click=on_delete_forever>
                            <Trash2 />
                            "Delete forever"
                        </Button>
                    }
                >
                    <Button variant=ButtonVariant::Outline size=ButtonSize::Sm attr:disabled=move || busy.get() on:click=move |_| run("favorite", false, BulkOp::Favorite)>
                        <Star />
                        "Favorite"
                    </Button>
                    <select
                        class="h-8 rounded-md border border-input bg-transparent px-2 text-sm"
                        prop:value=move || tag_choice.get()
                        disabled=move || busy.get()
                        on:change=on_tag_change
                    >
                        <option value="">"Add tag..."</option>
                        {move || {
                            app_state
                                .0
                                .tags
                                .with(|s| s.tags.clone())
                                .into_iter()
                                .map(|t| view! { <option value=t.id>{t.name}</option> })
                                .collect_view()
                        }}
                    </select>
                    <Button variant=ButtonVariant::Outline size=ButtonSize::Sm attr:disabled=move || busy.get() on:click=move |_| run("trash", true, BulkOp::Trash)>
                        <Trash2 />
                        "Move to trash"
                    </Button>
                </Show>
                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::IconSm
                    attr:title="Clear selection"
                    on:click=move |_| selected.update(|s| s.clear())
                >
                    <X />
                </Button>
            </div>
        </Show>
    }
}

#[derive(Clone)]
enum BulkOp {
    Favorite,
    Trash,
    Restore,
    DeleteForever,
    AddTag(String),
}

#[component]
pub fn Dashboard() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let notes = app_state.0.notes;
    let tags = app_state.0.tags;
    let view_mode = app_state.0.view_mode;

    let note_modal_open = RwSignal::new(false);
    let note_editing: RwSignal<Option<String>> = RwSignal::new(None);
    let tag_modal_open = RwSignal::new(false);
    let tag_editing: RwSignal<Option<String>> = RwSignal::new(None);
    let import_open = RwSignal::new(false);
    let banner_open = RwSignal::new(false);

    provide_context(DashboardActions {
        open_new_note: Callback::new(move |_| {
            note_editing.set(None);
            note_modal_open.set(true);
        }),
        open_edit_note: Callback::new(move |id: String| {
            note_editing.set(Some(id));
            note_modal_open.set(true);
        }),
        open_new_tag: Callback::new(move |_| {
            tag_editing.set(None);
            tag_modal_open.set(true);
        }),
        open_edit_tag: Callback::new(move |id: String| {
            tag_editing.set(Some(id));
            tag_modal_open.set(true);
        }),
        open_import: Callback::new(move |_| import_open.set(true)),
        open_banner: Callback::new(move |_| banner_open.set(true)),
    });

    let search: RwSignal<String> = RwSignal::new(notes.with_untracked(|s| s.search_query.clone()));
    let search_ref: NodeRef<html::Input> = NodeRef::new();
    Effect::new(move |_| {
        let q = search.get();
        app_state.0.stores().notes.set_search_query(&q);
    });

    let _key_handle = window_event_listener(ev::keydown, move |ev: web_sys::KeyboardEvent| {
        let key = ev.key();
        let target_tag = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
            .map(|el| el.tag_name().to_lowercase());
        let press = KeyPress {
            key: &key,
            ctrl: ev.ctrl_key(),
            meta: ev.meta_key(),
            target_tag: target_tag.as_deref(),
        };
        match shortcut_for(&press) {
            Some(Shortcut::FocusSearch) => {
                ev.prevent_default();
                if let Some(input) = search_ref.get() {
                    let _ = input.focus();
                }
            }
            Some(Shortcut::ClearSearch) => search.set(String::new()),
            None => {}
        }
    });

    let bulk_message: RwSignal<Option<String>> = RwSignal::new(None);
    let store_error = Signal::derive(move || {
        notes
            .with(|s| s.error.clone())
            .or_else(|| tags.with(|s| s.error.clone()))
    });
    let dismiss_error = move |_| {
        let stores = app_state.0.stores();
        stores.notes.dismiss_error();
        stores.tags.dismiss_error();
    };

    let heading = move || {
        notes.with(|s| match &s.filter {
            NoteFilter::Tag(id) => tags
                .with(|t| t.find(id).map(|tag| tag.name.clone()))
                .unwrap_or_else(|| s.filter.title().to_string()),
            other => other.title().to_string(),
        })
    };
    let visible = Memo::new(move |_| notes.with(|s| s.visible_notes()));
    let in_trash = move || notes.with(|s| s.filter == NoteFilter::Trash);

    let on_empty_trash = move |_| {
        let confirmed = window()
            .confirm_with_message("Permanently delete every note in the trash?")
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        let stores = app_state.0.stores();
        spawn_local(async move {
            let outcome = stores.notes.empty_trash().await;
            app_state.0.selected.update(|s| s.clear());
            bulk_message.set(outcome_message("delete", &outcome));
        });
    };

    let list_class = move || match view_mode.get() {
        ViewMode::Grid => "grid grid-cols-1 gap-3 sm:grid-cols-2 xl:grid-cols-3",
        ViewMode::List => "flex flex-col gap-2",
    };

    view! {
        <div class="flex min-h-screen flex-col bg-background text-foreground">
            <Banner />
            <div class="flex min-h-0 flex-1">
                <Sidebar search=search search_ref=search_ref />

                <main class="min-w-0 flex-1 space-y-4 p-6">
                    <div class="flex items-center gap-3">
                        <h1 class="text-lg font-semibold">{heading}</h1>
                        <span class="text-sm text-muted-foreground">{move || visible.with(Vec::len)}</span>
                        <div class="flex-1"></div>
                        <Show when=in_trash fallback=|| ().into_view()>
                            <Button
                                variant=ButtonVariant::Outline
                                size=ButtonSize::Sm
                                attr:disabled=move || notes.with(|s| s.counts().trash == 0)
                                on:click=on_empty_trash
                            >
                                <Trash2 />
                                "Empty trash"
                            </Button>
                        </Show>
                        <div class="flex items-center rounded-md border border-border p-0.5">
                            {ViewMode::iter()
                                .map(|mode| {
                                    let title = mode.to_string();
                                    view! {
                                        <span class="rounded-md" class:bg-accent=move || view_mode.get() == mode>
                                            <Button
                                                variant=ButtonVariant::Ghost
                                                size=ButtonSize::IconSm
                                                attr:title=title
                                                on:click=move |_| {
                                                    view_mode.set(mode);
                                                    save_view_mode(mode);
                                                }
                                            >
                                                {match mode {
                                                    ViewMode::Grid => view! { <LayoutGrid /> }.into_any(),
                                                    ViewMode::List => view! { <List /> }.into_any(),
                                                }}
                                            </Button>
                                        </span>
                                    }
                                })
                                .collect_view()}
                        </div>
                    </div>

                    <Show when=move || store_error.with(Option::is_some) fallback=|| ().into_view()>
                        <div class="flex items-start gap-2">
                            <div class="flex-1">
                                <ErrorAlert message=store_error />
                            </div>
                            <Button variant=ButtonVariant::Ghost size=ButtonSize::IconSm attr:title="Dismiss" on:click=dismiss_error>
                                <X />
                            </Button>
                        </div>
                    </Show>
                    <ErrorAlert message=bulk_message />

                    <BulkBar message=bulk_message />

                    <Show
                        when=move || !notes.with(|s| s.loading && s.notes.is_empty())
                        fallback=|| view! { <PageSpinner label="Loading notes..." /> }
                    >
                        <Show
                            when=move || visible.with(|v| !v.is_empty())
                            fallback=move || view! {
                                <div class="flex flex-col items-center gap-3 rounded-md border border-dashed border-border px-6 py-16 text-center text-sm text-muted-foreground">
                                    {move || {
                                        if !search.with(|q| q.trim().is_empty()) {
                                            "No notes match your search."
                                        } else if in_trash() {
                                            "Trash is empty."
                                        } else {
                                            "No notes yet."
                                        }
                                    }}
                                    <Show when=move || !in_trash() fallback=|| ().into_view()>
                                        <Button size=ButtonSize::Sm on:click=move |_| {
                                            note_editing.set(None);
                                            note_modal_open.set(true);
                                        }>
                                            <Plus />
                                            "New note"
                                        </Button>
                                    </Show>
                                </div>
                            }
                        >
                            <div class=list_class>
                                <For
                                    each=move || visible.get()
                                    key=|n| (n.id.clone(), n.updated_at, n.is_favorite, n.is_deleted)
                                    let:note
                                >
                                    <NoteCard note=note />
                                </For>
                            </div>
                        </Show>
                    </Show>
                </main>
            </div>

            <NoteModal open=note_modal_open editing=note_editing />
            <TagModal open=tag_modal_open editing=tag_editing />
            <ImportModal open=import_open />
            <BannerModal open=banner_open />
        </div>
    }
}
