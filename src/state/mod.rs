pub mod error;
pub mod generation;
pub mod notes;
pub mod optimistic;
pub mod session;
pub mod tags;

pub use error::{AppError, AppResult};
pub use generation::Generation;
pub use notes::{BulkOutcome, NoteCounts, NoteState, NoteStore};
pub use session::{SessionAccessor, SessionState, SessionStore};
pub use tags::{TagState, TagStore};

use crate::api::{DataService, RestClient};
use crate::components::hooks::use_store;
use crate::models::{BannerSettings, NoteFilter, ViewMode};
use crate::observe::Subscription;
use crate::storage::{load_banner, load_view_mode};
use leptos::prelude::*;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// The three containers, wired to one data service and to each other.
///
/// Notes and tags read the signed-in identity through the session store. A
/// change of identity clears both, and a permanently deleted note drops out of
/// the tag cache.
#[derive(Clone)]
pub struct Stores {
    pub session: SessionStore,
    pub notes: NoteStore,
    pub tags: TagStore,
    _wiring: Rc<Vec<Subscription>>,
}

impl Stores {
    pub fn new(service: Rc<dyn DataService>) -> Self {
        let session = SessionStore::new(Rc::clone(&service));
        let accessor: Rc<dyn SessionAccessor> = Rc::new(session.clone());
        let notes = NoteStore::new(Rc::clone(&service), Rc::clone(&accessor));
        let tags = TagStore::new(service, accessor);

        let last_user: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let on_identity = {
            let notes = notes.clone();
            let tags = tags.clone();
            session.state().subscribe(move |s: &SessionState| {
                let user_id = s.user.as_ref().map(|u| u.id.clone());
                let changed = *last_user.borrow() != user_id;
                if changed {
                    *last_user.borrow_mut() = user_id;
                    notes.clear();
                    tags.clear();
                }
            })
        };

        let on_removed = {
            let tags = tags.clone();
            notes.on_note_removed(move |id| tags.invalidate_note(id))
        };
        let on_links_cleared = {
            let tags = tags.clone();
            notes.on_note_links_cleared(move |id| tags.invalidate_note(id))
        };

        Self {
            session,
            notes,
            tags,
            _wiring: Rc::new(vec![on_identity, on_removed, on_links_cleared]),
        }
    }

    /// Fetch notes and tags together.
    pub async fn load(&self) -> AppResult<()> {
        let (notes, tags) = futures::join!(self.notes.fetch_all(), self.tags.fetch_all());
        notes.and(tags)
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        self.session.sign_out().await
    }

    pub async fn set_note_tags(&self, note_id: &str, tag_ids: &[String]) -> AppResult<()> {
        self.tags.set_note_tags(note_id, tag_ids).await?;
        self.notes.refresh_tag_filter().await
    }

    pub async fn bulk_add_tag(&self, note_ids: &[String], tag_id: &str) -> BulkOutcome {
        let outcome = self.tags.bulk_add_tag(note_ids, tag_id).await;
        if let Err(e) = self.notes.refresh_tag_filter().await {
            log::warn!("tag filter refresh failed: {e}");
        }
        outcome
    }

    /// Delete a tag; if it was the active filter, fall back to all notes.
    pub async fn delete_tag(&self, tag_id: &str) -> AppResult<()> {
        self.tags.delete(tag_id).await?;
        let selected = self
            .notes
            .state()
            .with(|s| s.filter.tag_id() == Some(tag_id));
        if selected {
            self.notes.set_filter(NoteFilter::All).await?;
        }
        Ok(())
    }
}

/// Reactive view of the stores for the component tree.
#[derive(Clone, Copy)]
pub(crate) struct AppState {
    pub stores: StoredValue<Stores, LocalStorage>,
    pub session: ReadSignal<SessionState>,
    pub notes: ReadSignal<NoteState>,
    pub tags: ReadSignal<TagState>,

    /// Global UI state.
    pub view_mode: RwSignal<ViewMode>,
    pub banner: RwSignal<BannerSettings>,
    /// Note ids picked for a bulk action.
    pub selected: RwSignal<HashSet<String>>,
    /// Bumped after tag assignments change so cards re-read their tags.
    pub tag_links_revision: RwSignal<u64>,
}

impl AppState {
    pub fn new() -> Self {
        let service: Rc<dyn DataService> = Rc::new(RestClient::load_from_storage());
        let stores = Stores::new(service);

        let session = use_store(stores.session.state());
        let notes = use_store(stores.notes.state());
        let tags = use_store(stores.tags.state());

        Self {
            stores: StoredValue::new_local(stores),
            session,
            notes,
            tags,
            view_mode: RwSignal::new(load_view_mode()),
            banner: RwSignal::new(load_banner()),
            selected: RwSignal::new(HashSet::new()),
            tag_links_revision: RwSignal::new(0),
        }
    }

    pub fn stores(&self) -> Stores {
        self.stores.get_value()
    }

    pub fn tag_links_changed(&self) {
        self.tag_links_revision.update(|v| *v += 1);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
pub(crate) struct AppContext(pub AppState);

/// Modal openers shared by the dashboard's sidebar and note list.
#[derive(Clone, Copy)]
pub(crate) struct DashboardActions {
    pub open_new_note: Callback<()>,
    pub open_edit_note: Callback<String>,
    pub open_new_tag: Callback<()>,
    pub open_edit_tag: Callback<String>,
    pub open_import: Callback<()>,
    pub open_banner: Callback<()>,
}
