use icons::LoaderCircle;
use leptos::prelude::*;
use tw_merge::tw_merge;

#[component]
pub fn Spinner(#[prop(into, optional)] class: String) -> impl IntoView {
    let merged_class = tw_merge!("size-4 animate-spin", class);

    view! { <LoaderCircle class=merged_class attr:role="status" attr:aria-label="Loading" /> }
}

/// Centered spinner with a caption, for whole-page waits.
#[component]
pub fn PageSpinner(#[prop(into)] label: String) -> impl IntoView {
    view! {
        <div class="flex min-h-screen items-center justify-center gap-2 text-sm text-muted-foreground">
            <Spinner />
            <span>{label}</span>
        </div>
    }
}
