use super::modals::Modal;
use crate::components::ui::{ErrorAlert, Spinner};
use crate::import::{import_bookmarks_with_progress, ImportEvent};
use crate::state::AppContext;
use leptos::prelude::*;
use leptos::task::spawn_local;
use leptos_dom::helpers::set_timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

async fn read_file_text(file: web_sys::File) -> Result<String, String> {
    let text = JsFuture::from(file.text())
        .await
        .map_err(|e| format!("Could not read file: {e:?}"))?;
    text.as_string()
        .ok_or_else(|| "Could not read file as text".to_string())
}

#[component]
pub fn ImportModal(open: RwSignal<bool>) -> impl IntoView {
    let app_state = expect_context::<AppContext>();

    let loading: RwSignal<bool> = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let imported: RwSignal<usize> = RwSignal::new(0);
    let progress: RwSignal<Vec<String>> = RwSignal::new(vec![]);

    Effect::new(move |_| {
        if open.get() {
            error.set(None);
            imported.set(0);
            progress.set(vec![]);
        }
    });

    let on_file = move |ev: web_sys::Event| {
        let Some(file) = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
            .and_then(|input| input.files())
            .and_then(|files| files.get(0))
        else {
            return;
        };
        if loading.get_untracked() {
            return;
        }

        let stores = app_state.0.stores();
        loading.set(true);
        error.set(None);
        imported.set(0);
        progress.set(vec!["Parsing HTML file...".to_string()]);

        spawn_local(async move {
            let result = match read_file_text(file).await {
                Ok(html) => {
                    let mut rng = rand::thread_rng();
                    import_bookmarks_with_progress(
                        &stores.notes,
                        &stores.tags,
                        &html,
                        &mut rng,
                        |event| {
                            if let ImportEvent::Imported { count, .. } = event {
                                imported.set(*count);
                            }
                            progress.update(|lines| lines.push(event.to_string()));
                        },
                    )
                    .await
                    .map_err(|e| e.to_string())
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(report) => {
                    app_state.0.tag_links_changed();
                    if let Some(reason) = report.aborted {
                        error.set(Some(reason));
                    } else if !report.partially_imported.is_empty() {
                        error.set(Some(format!(
                            "Imported without their folder tag: {}",
                            report.partially_imported.join(", ")
                        )));
                    } else {
                        set_timeout(move || open.set(false), std::time::Duration::from_millis(1500));
                    }
                }
                Err(e) => {
                    log::error!("Error importing bookmarks: {e}");
                    error.set(Some(e));
                }
            }
            loading.set(false);
        });
    };

    view! {
        <Modal open=open title="Import bookmarks".to_string() on_close=move |_| open.set(false)>
            <Show
                when=move || error.get().is_none()
                fallback=move || view! { <ErrorAlert message=error /> }
            >
                <p class="text-sm text-muted-foreground">
                    "Import bookmarks exported from Chrome, Firefox or any other browser. "
                    "Each bookmark becomes a note and each folder becomes a tag."
                </p>
                <ol class="list-inside list-decimal space-y-1 text-sm text-muted-foreground">
                    <li>"Open your browser's bookmarks manager"</li>
                    <li>"Export your bookmarks as HTML"</li>
                    <li>"Upload the exported file here"</li>
                </ol>
            </Show>

            <input
                type="file"
                accept=".html,.htm"
                class="block w-full text-sm text-muted-foreground file:mr-4 file:rounded-full file:border-0 file:bg-secondary file:px-4 file:py-2 file:text-sm file:font-semibold disabled:cursor-not-allowed disabled:opacity-50"
                disabled=move || loading.get()
                on:change=on_file
            />

            <Show when=move || !progress.with(Vec::is_empty) fallback=|| ().into_view()>
                <div class="max-h-40 overflow-y-auto rounded-md bg-muted p-2 font-mono text-xs text-muted-foreground">
                    {move || progress.get().into_iter().map(|line| view! { <div>{line}</div> }).collect_view()}
                </div>
            </Show>

            <Show when=move || { loading.get() || imported.get() > 0 } fallback=|| ().into_view()>
                <div class="flex items-center gap-2 border-t border-border pt-3 text-sm">
                    <Show
                        when=move || loading.get()
                        fallback=move || view! {
                            <span class="text-success">{move || format!("Successfully imported {} bookmarks!", imported.get())}</span>
                        }
                    >
                        <Spinner />
                        <span class="text-muted-foreground">
                            {move || match imported.get() {
                                0 => "Importing bookmarks...".to_string(),
                                n => format!("Imported {n} bookmarks..."),
                            }}
                        </span>
                    </Show>
                </div>
            </Show>
        </Modal>
    }
}
