use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;

struct Inner<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<(u64, Listener<T>)>>,
    next_id: Cell<u64>,
}

/// Shared, single-threaded state cell with change notification.
///
/// Clones share the same value. Every `set`/`update` notifies all current
/// subscribers with a snapshot of the new value, so a listener may freely
/// read or write the store again.
pub struct Store<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.notify();
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.notify();
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let weak: Weak<Inner<T>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    fn notify(&self) {
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        if listeners.is_empty() {
            return;
        }
        let snapshot = self.get();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}

/// Handle returned by every `subscribe`-style call. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Registry of callbacks keyed by id, used by services that push events
/// (e.g. session changes) rather than hold state.
pub struct Listeners<E> {
    inner: Rc<RefCell<Vec<(u64, Rc<dyn Fn(&E)>)>>>,
    next_id: Rc<Cell<u64>>,
}

impl<E> Clone for Listeners<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            next_id: Rc::clone(&self.next_id),
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(1)),
        }
    }
}

impl<E: 'static> Listeners<E> {
    pub fn add(&self, listener: impl Fn(&E) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.inner.borrow_mut().push((id, Rc::new(listener)));

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }

    pub fn emit(&self, event: &E) {
        let listeners: Vec<Rc<dyn Fn(&E)>> =
            self.inner.borrow().iter().map(|(_, l)| Rc::clone(l)).collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_see_every_update() {
        let store = Store::new(0_i32);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_c = Rc::clone(&seen);
        let _sub = store.subscribe(move |v| seen_c.borrow_mut().push(*v));

        store.set(1);
        store.update(|v| *v += 10);

        assert_eq!(*seen.borrow(), vec![1, 11]);
        assert_eq!(store.get(), 11);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let store = Store::new(String::new());
        let hits = Rc::new(Cell::new(0));
        let hits_c = Rc::clone(&hits);
        let sub = store.subscribe(move |_| hits_c.set(hits_c.get() + 1));
        assert_eq!(store.subscriber_count(), 1);

        store.set("a".into());
        drop(sub);
        store.set("b".into());

        assert_eq!(hits.get(), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_listener_may_write_back_into_store() {
        let store = Store::new(0_u32);
        let store_c = store.clone();
        let _sub = store.subscribe(move |v| {
            if *v == 1 {
                store_c.set(2);
            }
        });
        store.set(1);
        assert_eq!(store.get(), 2);
    }

    #[test]
    fn test_listeners_emit_and_unsubscribe() {
        let listeners: Listeners<String> = Listeners::default();
        let got = Rc::new(RefCell::new(Vec::new()));
        let got_c = Rc::clone(&got);
        let sub = listeners.add(move |e: &String| got_c.borrow_mut().push(e.clone()));

        listeners.emit(&"signed-in".to_string());
        sub.unsubscribe();
        listeners.emit(&"signed-out".to_string());

        assert_eq!(*got.borrow(), vec!["signed-in".to_string()]);
        assert!(listeners.is_empty());
    }
}
