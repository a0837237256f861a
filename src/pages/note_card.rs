use crate::components::ui::{Button, ButtonSize, ButtonVariant, Checkbox};
use crate::models::{Note, ViewMode};
use crate::state::{AppContext, DashboardActions};
use crate::util::{format_timestamp, preview};
use icons::{Pencil, RotateCcw, Star, Trash2, X};
use leptos::prelude::*;
use leptos::task::spawn_local;

const PREVIEW_CHARS: usize = 180;

#[component]
pub fn NoteCard(note: Note) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let actions = expect_context::<DashboardActions>();

    let id = StoredValue::new(note.id.clone());
    let selected = Signal::derive(move || {
        app_state
            .0
            .selected
            .with(|s| id.with_value(|id| s.contains(id)))
    });

    // Re-read whenever tags are renamed or assignments change.
    let note_tags = LocalResource::new(move || {
        app_state.0.tags.track();
        app_state.0.tag_links_revision.track();
        let stores = app_state.0.stores();
        let id = id.get_value();
        async move { stores.tags.get_tags_for_note(&id).await.unwrap_or_default() }
    });

    let on_toggle_selected = move |on: bool| {
        app_state.0.selected.update(|s| {
            let id = id.get_value();
            if on {
                s.insert(id);
            } else {
                s.remove(&id);
            }
        });
    };

    let on_favorite = move |_| {
        let stores = app_state.0.stores();
        let id = id.get_value();
        spawn_local(async move {
            if let Err(e) = stores.notes.toggle_favorite(&id).await {
                log::warn!("toggle favorite failed: {e}");
            }
        });
    };

    let on_trash = move |_| {
        let stores = app_state.0.stores();
        let id = id.get_value();
        app_state.0.selected.update(|s| {
            s.remove(&id);
        });
        spawn_local(async move {
            if let Err(e) = stores.notes.move_to_trash(&id).await {
                log::warn!("move to trash failed: {e}");
            }
        });
    };

    let on_restore = move |_| {
        let stores = app_state.0.stores();
        let id = id.get_value();
        spawn_local(async move {
            if let Err(e) = stores.notes.restore(&id).await {
                log::warn!("restore failed: {e}");
            }
        });
    };

    let on_delete_forever = move |_| {
        let confirmed = window()
            .confirm_with_message("Delete this note forever? This cannot be undone.")
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        let stores = app_state.0.stores();
        let id = id.get_value();
        app_state.0.selected.update(|s| {
            s.remove(&id);
        });
        spawn_local(async move {
            if let Err(e) = stores.notes.permanently_delete(&id).await {
                log::warn!("permanent delete failed: {e}");
            }
        });
    };

    let is_favorite = note.is_favorite;
    let is_deleted = note.is_deleted;
    let view_mode = app_state.0.view_mode;
    let container_class = move || match view_mode.get() {
        ViewMode::Grid => "group flex h-full flex-col gap-2 rounded-xl border border-border bg-card p-4 shadow-sm",
        ViewMode::List => "group flex flex-col gap-1.5 rounded-md border border-border bg-card px-4 py-3",
    };
    let content = StoredValue::new(note.content.clone());
    let body = move || {
        let limit = match view_mode.get() {
            ViewMode::Grid => PREVIEW_CHARS,
            ViewMode::List => PREVIEW_CHARS / 2,
        };
        content.with_value(|c| preview(c, limit))
    };
    let updated = format_timestamp(&note.updated_at);

    view! {
        <div
            class=container_class
            class:ring-2=move || selected.get()
            class:ring-primary=move || selected.get()
        >
            <div class="flex items-start gap-2">
                <Checkbox class="mt-0.5" checked=selected on_toggle=on_toggle_selected />
                <div class="min-w-0 flex-1">
                    <div class="truncate text-sm font-medium">{note.title.clone()}</div>
                    <div class="text-[11px] text-muted-foreground">{updated}</div>
                </div>
            </div>

            <div class="min-w-0 flex-1 whitespace-pre-wrap break-words text-xs text-muted-foreground">
                {body}
            </div>

            <div class="flex flex-wrap gap-1">
                {move || {
                    note_tags
                        .get()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|tag| {
                            view! {
                                <span
                                    class="inline-flex items-center rounded-full px-2 py-0.5 text-[11px] text-foreground"
                                    style=format!("background-color: {}", tag.color)
                                >
                                    {tag.name}
                                </span>
                            }
                        })
                        .collect_view()
                }}
            </div>

            <div class="flex items-center justify-end gap-1 opacity-70 group-hover:opacity-100">
                <Show
                    when=move || !is_deleted
                    fallback=move || view! {
                        <Button variant=ButtonVariant::Ghost size=ButtonSize::IconSm attr:title="Restore" on:click=on_restore>
                            <RotateCcw />
                        </Button>
                        <Button variant=ButtonVariant::Ghost size=ButtonSize::IconSm class="text-destructive" attr:title="Delete forever" on:click=on_delete_forever>
                            <X />
                        </Button>
                    }
                >
                    <Button
                        variant=ButtonVariant::Ghost
                        size=ButtonSize::IconSm
                        class=if is_favorite { "text-amber-500" } else { "" }
                        attr:title=if is_favorite { "Unfavorite" } else { "Favorite" }
                        on:click=on_favorite
                    >
                        <Star class=if is_favorite { "fill-current" } else { "" } />
                    </Button>
                    <Button
                        variant=ButtonVariant::Ghost
                        size=ButtonSize::IconSm
                        attr:title="Edit"
                        on:click=move |_| actions.open_edit_note.run(id.get_value())
                    >
                        <Pencil />
                    </Button>
                    <Button variant=ButtonVariant::Ghost size=ButtonSize::IconSm attr:title="Move to trash" on:click=on_trash>
                        <Trash2 />
                    </Button>
                </Show>
            </div>
        </div>
    }
}
