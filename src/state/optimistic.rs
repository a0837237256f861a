use crate::observe::Store;
use std::future::Future;

/// Apply a local change before the remote call confirms it.
///
/// `capture` reads the prior value of whatever `apply` touches; if `remote`
/// fails, `restore` puts that value back. Only the captured part of the state
/// is rolled back, so concurrent mutations of other items survive.
pub async fn with_rollback<T, S, R, E, Fut>(
    store: &Store<T>,
    capture: impl FnOnce(&T) -> S,
    apply: impl FnOnce(&mut T),
    restore: impl FnOnce(&mut T, S),
    remote: Fut,
) -> Result<R, E>
where
    T: Clone + 'static,
    Fut: Future<Output = Result<R, E>>,
{
    let prior = store.with(capture);
    store.update(apply);
    match remote.await {
        Ok(value) => Ok(value),
        Err(e) => {
            store.update(|state| restore(state, prior));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_success_keeps_local_change() {
        let store = Store::new(vec![1, 2, 3]);
        let out: Result<&str, String> = block_on(with_rollback(
            &store,
            |v| v[1],
            |v| v[1] = 20,
            |v, prior| v[1] = prior,
            async { Ok("ok") },
        ));
        assert_eq!(out, Ok("ok"));
        assert_eq!(store.get(), vec![1, 20, 3]);
    }

    #[test]
    fn test_failure_restores_only_captured_item() {
        let store = Store::new(vec![1, 2, 3]);
        let other = store.clone();
        let out: Result<(), String> = block_on(with_rollback(
            &store,
            |v| v[0],
            |v| v[0] = 100,
            |v, prior| v[0] = prior,
            async move {
                // Another item changes while the request is in flight.
                other.update(|v| v[2] = 30);
                Err("offline".to_string())
            },
        ));
        assert_eq!(out, Err("offline".to_string()));
        assert_eq!(store.get(), vec![1, 2, 30]);
    }
}
