use crate::components::ui::{Button, ButtonSize, ButtonVariant, Input};
use crate::models::NoteFilter;
use crate::state::{AppContext, DashboardActions};
use icons::{FileText, LogOut, Megaphone, Pencil, Plus, Search, Star, Tag, Trash2, Upload, X};
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_router::hooks::use_navigate;

fn apply_filter(app_state: AppContext, filter: NoteFilter) {
    let stores = app_state.0.stores();
    app_state.0.selected.update(|s| s.clear());
    spawn_local(async move {
        if let Err(e) = stores.notes.set_filter(filter).await {
            log::warn!("set filter failed: {e}");
        }
    });
}

#[component]
fn FilterItem(
    filter: NoteFilter,
    label: &'static str,
    count: Signal<usize>,
    children: Children,
) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let target = StoredValue::new(filter);
    let active = move || app_state.0.notes.with(|s| target.with_value(|f| s.filter == *f));

    view! {
        <button
            type="button"
            class=move || {
                if active() {
                    "flex w-full items-center gap-2 rounded-md bg-accent px-2 py-1.5 text-sm text-accent-foreground"
                } else {
                    "flex w-full items-center gap-2 rounded-md px-2 py-1.5 text-sm text-muted-foreground hover:bg-accent/50"
                }
            }
            on:click=move |_| apply_filter(app_state, target.get_value())
        >
            {children()}
            <span class="flex-1 text-left">{label}</span>
            <span class="text-xs tabular-nums">{move || count.get()}</span>
        </button>
    }
}

#[component]
pub fn Sidebar(search: RwSignal<String>, search_ref: NodeRef<html::Input>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let actions = expect_context::<DashboardActions>();
    let navigate = StoredValue::new(use_navigate());

    let counts = Memo::new(move |_| app_state.0.notes.with(|s| s.counts()));
    let email = move || {
        app_state
            .0
            .session
            .with(|s| s.user.as_ref().and_then(|u| u.email.clone()).unwrap_or_default())
    };

    let on_delete_tag = move |id: String, name: String| {
        let confirmed = window()
            .confirm_with_message(&format!(
                "Delete tag \"{name}\"? Notes keep their content but lose this tag."
            ))
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        let stores = app_state.0.stores();
        spawn_local(async move {
            match stores.delete_tag(&id).await {
                Ok(()) => app_state.0.tag_links_changed(),
                Err(e) => log::warn!("delete tag failed: {e}"),
            }
        });
    };

    let on_sign_out = move |_| {
        let stores = app_state.0.stores();
        spawn_local(async move {
            if let Err(e) = stores.sign_out().await {
                log::warn!("sign out failed: {e}");
            }
            app_state.0.selected.set(Default::default());
            navigate.with_value(|nav| nav("/login", Default::default()));
        });
    };

    view! {
        <aside class="flex w-64 shrink-0 flex-col gap-4 border-r border-border bg-muted/30 p-3">
            <div class="flex items-center justify-between px-1">
                <div class="text-sm font-semibold">"Duo Notes"</div>
                <Button size=ButtonSize::IconSm attr:title="New note" on:click=move |_| actions.open_new_note.run(())>
                    <Plus />
                </Button>
            </div>

            <div class="relative">
                <Search class="pointer-events-none absolute left-2 top-1/2 size-3.5 -translate-y-1/2 text-muted-foreground" />
                <Input
                    node_ref=search_ref
                    bind_value=search
                    placeholder="Search notes (Ctrl+K)"
                    class="h-8 pl-7 text-sm"
                />
            </div>

            <nav class="space-y-0.5">
                <FilterItem filter=NoteFilter::All label="All Notes" count=Signal::derive(move || counts.get().all)>
                    <FileText class="size-4" />
                </FilterItem>
                <FilterItem filter=NoteFilter::Favorites label="Favorites" count=Signal::derive(move || counts.get().favorites)>
                    <Star class="size-4" />
                </FilterItem>
                <FilterItem filter=NoteFilter::Trash label="Trash" count=Signal::derive(move || counts.get().trash)>
                    <Trash2 class="size-4" />
                </FilterItem>
            </nav>

            <div class="min-h-0 flex-1 space-y-1 overflow-y-auto">
                <div class="flex items-center justify-between px-2">
                    <div class="text-xs font-medium uppercase tracking-wide text-muted-foreground">"Tags"</div>
                    <Button
                        variant=ButtonVariant::Ghost
                        size=ButtonSize::IconSm
                        attr:title="New tag"
                        on:click=move |_| actions.open_new_tag.run(())
                    >
                        <Plus />
                    </Button>
                </div>

                <Show
                    when=move || app_state.0.tags.with(|s| !s.tags.is_empty())
                    fallback=|| view! { <div class="px-2 text-xs text-muted-foreground">"No tags yet."</div> }
                >
                    <For
                        each=move || app_state.0.tags.with(|s| s.tags.clone())
                        key=|t| (t.id.clone(), t.name.clone(), t.color.clone())
                        let:tag
                    >
                        {
                            let id = StoredValue::new(tag.id.clone());
                            let name = StoredValue::new(tag.name.clone());
                            let active = move || {
                                app_state.0.notes.with(|s| id.with_value(|id| s.filter.tag_id() == Some(id.as_str())))
                            };
                            view! {
                                <div
                                    class=move || {
                                        if active() {
                                            "group flex items-center gap-2 rounded-md bg-accent px-2 py-1 text-sm"
                                        } else {
                                            "group flex items-center gap-2 rounded-md px-2 py-1 text-sm hover:bg-accent/50"
                                        }
                                    }
                                >
                                    <button
                                        type="button"
                                        class="flex min-w-0 flex-1 items-center gap-2 text-left"
                                        on:click=move |_| apply_filter(app_state, NoteFilter::Tag(id.get_value()))
                                    >
                                        <span class="inline-flex shrink-0" style=format!("color: {}", tag.color)>
                                            <Tag class="size-3.5" />
                                        </span>
                                        <span class="truncate">{tag.name.clone()}</span>
                                    </button>
                                    <button
                                        type="button"
                                        class="hidden text-muted-foreground hover:text-foreground group-hover:inline-flex"
                                        title="Edit tag"
                                        on:click=move |_| actions.open_edit_tag.run(id.get_value())
                                    >
                                        <Pencil class="size-3.5" />
                                    </button>
                                    <button
                                        type="button"
                                        class="hidden text-muted-foreground hover:text-destructive group-hover:inline-flex"
                                        title="Delete tag"
                                        on:click=move |_| on_delete_tag(id.get_value(), name.get_value())
                                    >
                                        <X class="size-3.5" />
                                    </button>
                                </div>
                            }
                        }
                    </For>
                </Show>
            </div>

            <div class="space-y-1 border-t border-border pt-3">
                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::Sm
                    class="w-full justify-start"
                    on:click=move |_| actions.open_import.run(())
                >
                    <Upload />
                    "Import bookmarks"
                </Button>
                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::Sm
                    class="w-full justify-start"
                    on:click=move |_| actions.open_banner.run(())
                >
                    <Megaphone />
                    "Edit banner"
                </Button>
                <div class="flex items-center gap-2 px-2 pt-1">
                    <div class="min-w-0 flex-1 truncate text-xs text-muted-foreground">{email}</div>
                    <Button variant=ButtonVariant::Ghost size=ButtonSize::IconSm attr:title="Sign out" on:click=on_sign_out>
                        <LogOut />
                    </Button>
                </div>
            </div>
        </aside>
    }
}
