use crate::observe::Store;
use leptos::prelude::*;

/// Mirror a [`Store`] into a signal owned by the current reactive scope.
///
/// The subscription lives in a local `StoredValue`, so it is dropped (and the
/// store listener removed) together with the owning component.
pub fn use_store<T>(store: &Store<T>) -> ReadSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    let (value, set_value) = signal(store.get());
    let subscription = store.subscribe(move |next: &T| {
        // The owner may already be disposed while a late response lands.
        let _ = set_value.try_set(next.clone());
    });
    let _ = StoredValue::new_local(subscription);
    value
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_signal_follows_store() {
        let owner = Owner::new();
        owner.set();
        let store = Store::new(1_u32);
        let mirrored = use_store(&store);
        store.set(5);
        assert_eq!(mirrored.get_untracked(), 5);
        assert_eq!(store.subscriber_count(), 1);
    }
}
