use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

/// Request-generation counter for dropping stale async responses.
///
/// Each request takes a token from [`Generation::begin`]; its response is
/// applied only while [`Generation::is_current`] still holds for that token.
#[derive(Clone, Debug, Default)]
pub struct Generation(Rc<Cell<u64>>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding every earlier one.
    pub fn begin(&self) -> u64 {
        let next = self.0.get().wrapping_add(1);
        self.0.set(next);
        next
    }

    /// Supersede in-flight requests without starting a new one.
    pub fn invalidate(&self) {
        self.begin();
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.0.get() == token
    }

    /// Await `fut` as a new request; `None` if a newer one started meanwhile.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        let token = self.begin();
        let output = fut.await;
        self.is_current(token).then_some(output)
    }
}
