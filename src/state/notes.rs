use super::error::{AppError, AppResult};
use super::generation::Generation;
use super::optimistic::with_rollback;
use super::session::SessionAccessor;
use crate::api::{
    decode_first, decode_rows, DataService, Filter, Order, NOTES_TABLE, NOTE_TAGS_TABLE,
};
use crate::models::{Note, NoteFilter, NotePatch, NoteTag};
use crate::observe::{Listeners, Store, Subscription};
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use std::collections::HashSet;
use std::rc::Rc;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteState {
    /// Every note of the signed-in user, soft-deleted ones included.
    pub notes: Vec<Note>,
    pub loading: bool,
    pub error: Option<String>,
    pub filter: NoteFilter,
    pub search_query: String,
    /// Ids of the notes linked to the tag selected in `filter`, once resolved.
    pub tag_members: Option<HashSet<String>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoteCounts {
    pub all: usize,
    pub favorites: usize,
    pub trash: usize,
}

impl NoteState {
    pub fn visible_notes(&self) -> Vec<Note> {
        filter_notes(
            &self.notes,
            &self.filter,
            &self.search_query,
            self.tag_members.as_ref(),
        )
    }

    pub fn find(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn counts(&self) -> NoteCounts {
        self.notes.iter().fold(NoteCounts::default(), |mut c, n| {
            if n.is_deleted {
                c.trash += 1;
            } else {
                c.all += 1;
                if n.is_favorite {
                    c.favorites += 1;
                }
            }
            c
        })
    }
}

/// Case-insensitive substring match over title or content. An empty query matches.
pub fn matches_search(note: &Note, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    note.title.to_lowercase().contains(&query) || note.content.to_lowercase().contains(&query)
}

/// Structural filter first, then the search query.
///
/// A tag filter only admits notes whose id is in `tag_members`; while the
/// membership is unresolved nothing is admitted.
pub fn filter_notes(
    notes: &[Note],
    filter: &NoteFilter,
    query: &str,
    tag_members: Option<&HashSet<String>>,
) -> Vec<Note> {
    notes
        .iter()
        .filter(|n| match filter {
            NoteFilter::All => !n.is_deleted,
            NoteFilter::Favorites => !n.is_deleted && n.is_favorite,
            NoteFilter::Trash => n.is_deleted,
            NoteFilter::Tag(_) => {
                !n.is_deleted && tag_members.is_some_and(|ids| ids.contains(&n.id))
            }
        })
        .filter(|n| matches_search(n, query))
        .cloned()
        .collect()
}

/// Per-item result of a bulk operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BulkOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, AppError)>,
}

impl BulkOutcome {
    pub fn from_results(ids: &[String], results: Vec<AppResult<()>>) -> Self {
        let mut out = Self::default();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => out.succeeded.push(id.clone()),
                Err(e) => out.failed.push((id.clone(), e)),
            }
        }
        out
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Mirror of the remote `notes` table for the signed-in user.
///
/// Mutations are applied locally first and rolled back item by item when the
/// remote call fails.
#[derive(Clone)]
pub struct NoteStore {
    state: Store<NoteState>,
    service: Rc<dyn DataService>,
    session: Rc<dyn SessionAccessor>,
    fetch_generation: Generation,
    tag_generation: Generation,
    removed: Listeners<String>,
    links_cleared: Listeners<String>,
}

impl NoteStore {
    pub fn new(service: Rc<dyn DataService>, session: Rc<dyn SessionAccessor>) -> Self {
        Self {
            state: Store::new(NoteState::default()),
            service,
            session,
            fetch_generation: Generation::new(),
            tag_generation: Generation::new(),
            removed: Listeners::default(),
            links_cleared: Listeners::default(),
        }
    }

    pub fn state(&self) -> &Store<NoteState> {
        &self.state
    }

    pub fn snapshot(&self) -> NoteState {
        self.state.get()
    }

    pub fn visible_notes(&self) -> Vec<Note> {
        self.state.with(NoteState::visible_notes)
    }

    /// Called with the id of every note that was permanently deleted.
    pub fn on_note_removed(&self, listener: impl Fn(&String) + 'static) -> Subscription {
        self.removed.add(listener)
    }

    /// Called with a note id once its association rows are gone remotely,
    /// even if deleting the note itself then fails.
    pub fn on_note_links_cleared(&self, listener: impl Fn(&String) + 'static) -> Subscription {
        self.links_cleared.add(listener)
    }

    fn require_user(&self, what: &str) -> AppResult<String> {
        self.session
            .current_user_id()
            .ok_or_else(|| AppError::auth_required(what))
    }

    fn record_error(&self, e: &AppError) {
        let message = e.to_string();
        self.state.update(|s| s.error = Some(message));
    }

    /// Drop all local state, e.g. after sign-out. In-flight responses are ignored.
    pub fn clear(&self) {
        self.fetch_generation.invalidate();
        self.tag_generation.invalidate();
        self.state.set(NoteState::default());
    }

    /// Replace the local set with the remote one, most recently updated first.
    ///
    /// If another fetch starts before this one resolves, this response is dropped.
    pub async fn fetch_all(&self) -> AppResult<()> {
        let user_id = self.require_user("load notes")?;
        let generation = self.fetch_generation.begin();
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self
            .service
            .select(
                NOTES_TABLE,
                &Filter::new().eq("user_id", &user_id),
                Some(&Order::desc("updated_at")),
            )
            .await
            .and_then(decode_rows::<Note>);

        if !self.fetch_generation.is_current(generation) {
            log::debug!("dropping stale notes response (generation {generation})");
            return Ok(());
        }

        match result {
            Ok(notes) => {
                self.state.update(|s| {
                    s.notes = notes;
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                log::error!("Error fetching notes: {e}");
                let err = AppError::from(e);
                let message = err.to_string();
                self.state.update(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    pub async fn create(&self, title: &str, content: &str) -> AppResult<Note> {
        let user_id = self.require_user("create notes")?;
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        let row = json!({
            "user_id": user_id,
            "title": title,
            "content": content,
            "is_favorite": false,
            "is_deleted": false,
        });
        let note: Note = match self.service.insert(NOTES_TABLE, vec![row]).await {
            Ok(rows) => decode_first(rows, "create note")?,
            Err(e) => {
                log::error!("Error creating note: {e}");
                return Err(e.into());
            }
        };

        self.state.update(|s| s.notes.insert(0, note.clone()));
        Ok(note)
    }

    pub async fn update(&self, id: &str, mut patch: NotePatch) -> AppResult<()> {
        if let Some(title) = patch.title.as_mut() {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(AppError::Validation("Title is required".to_string()));
            }
            *title = trimmed.to_string();
        }
        if self.state.with(|s| s.find(id).is_none()) {
            return Err(AppError::NotFound(format!("Note {id}")));
        }
        if patch.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let filter = Filter::by_id(id);
        let fields = patch.to_fields(now);
        let owned_id = id.to_string();

        let result = with_rollback(
            &self.state,
            |s| s.find(id).cloned(),
            |s| {
                if let Some(n) = s.notes.iter_mut().find(|n| n.id == id) {
                    patch.apply_to(n, now);
                }
            },
            |s, prior| restore_note(s, &owned_id, prior),
            self.service.update(NOTES_TABLE, fields, &filter),
        )
        .await;

        match result {
            Ok(rows) => {
                // Prefer the row as stored; the service may normalise timestamps.
                if let Ok(Some(stored)) = decode_rows::<Note>(rows).map(|v| v.into_iter().next()) {
                    self.state.update(|s| {
                        if let Some(n) = s.notes.iter_mut().find(|n| n.id == stored.id) {
                            *n = stored;
                        }
                    });
                }
                Ok(())
            }
            Err(e) => {
                log::error!("Error updating note {id}: {e}");
                let err = AppError::from(e);
                self.record_error(&err);
                Err(err)
            }
        }
    }

    pub async fn set_favorite(&self, id: &str, flag: bool) -> AppResult<()> {
        self.update(id, NotePatch::favorite(flag)).await
    }

    pub async fn toggle_favorite(&self, id: &str) -> AppResult<()> {
        let current = self
            .state
            .with(|s| s.find(id).map(|n| n.is_favorite))
            .ok_or_else(|| AppError::NotFound(format!("Note {id}")))?;
        self.set_favorite(id, !current).await
    }

    /// Soft delete: the row stays and can be restored.
    pub async fn move_to_trash(&self, id: &str) -> AppResult<()> {
        self.update(id, NotePatch::deleted(true)).await
    }

    pub async fn restore(&self, id: &str) -> AppResult<()> {
        self.update(id, NotePatch::deleted(false)).await
    }

    /// Remove the note row and every association row that references it.
    ///
    /// The two deletes are separate requests; if the second fails the
    /// associations are already gone while the note is restored locally, and
    /// `on_note_links_cleared` listeners have been told so.
    pub async fn permanently_delete(&self, id: &str) -> AppResult<()> {
        if self.state.with(|s| s.find(id).is_none()) {
            return Err(AppError::NotFound(format!("Note {id}")));
        }

        let owned_id = id.to_string();
        let remote = async {
            self.service
                .delete(NOTE_TAGS_TABLE, &Filter::new().eq("note_id", id))
                .await?;
            self.links_cleared.emit(&owned_id);
            self.service.delete(NOTES_TABLE, &Filter::by_id(id)).await
        };

        let result = with_rollback(
            &self.state,
            |s| {
                s.notes
                    .iter()
                    .position(|n| n.id == id)
                    .map(|i| (i, s.notes[i].clone()))
            },
            |s| {
                s.notes.retain(|n| n.id != id);
                if let Some(members) = s.tag_members.as_mut() {
                    members.remove(id);
                }
            },
            |s, prior| {
                if let Some((index, note)) = prior {
                    let index = index.min(s.notes.len());
                    s.notes.insert(index, note);
                }
            },
            remote,
        )
        .await;

        match result {
            Ok(()) => {
                self.removed.emit(&owned_id);
                Ok(())
            }
            Err(e) => {
                log::error!("Error deleting note {id}: {e}");
                let err = AppError::from(e);
                self.record_error(&err);
                Err(err)
            }
        }
    }

    pub async fn bulk_set_favorite(&self, ids: &[String], flag: bool) -> BulkOutcome {
        let results = join_all(ids.iter().map(|id| self.set_favorite(id, flag))).await;
        BulkOutcome::from_results(ids, results)
    }

    pub async fn bulk_move_to_trash(&self, ids: &[String]) -> BulkOutcome {
        let results = join_all(ids.iter().map(|id| self.move_to_trash(id))).await;
        BulkOutcome::from_results(ids, results)
    }

    pub async fn bulk_restore(&self, ids: &[String]) -> BulkOutcome {
        let results = join_all(ids.iter().map(|id| self.restore(id))).await;
        BulkOutcome::from_results(ids, results)
    }

    pub async fn bulk_permanently_delete(&self, ids: &[String]) -> BulkOutcome {
        let results = join_all(ids.iter().map(|id| self.permanently_delete(id))).await;
        BulkOutcome::from_results(ids, results)
    }

    pub async fn empty_trash(&self) -> BulkOutcome {
        let trashed: Vec<String> = self.state.with(|s| {
            s.notes
                .iter()
                .filter(|n| n.is_deleted)
                .map(|n| n.id.clone())
                .collect()
        });
        self.bulk_permanently_delete(&trashed).await
    }

    pub fn set_search_query(&self, query: &str) {
        let query = query.to_string();
        self.state.update(|s| s.search_query = query);
    }

    /// Switch the structural filter. A tag filter resolves its member notes
    /// from the association table; a newer filter switch wins over an older
    /// one still in flight.
    pub async fn set_filter(&self, filter: NoteFilter) -> AppResult<()> {
        let generation = self.tag_generation.begin();
        let tag_id = filter.tag_id().map(str::to_string);
        self.state.update(|s| {
            s.filter = filter;
            s.tag_members = None;
        });

        match tag_id {
            Some(tag_id) => self.resolve_tag_members(&tag_id, generation).await,
            None => Ok(()),
        }
    }

    /// Re-resolve the selected tag's members after associations changed.
    pub async fn refresh_tag_filter(&self) -> AppResult<()> {
        let Some(tag_id) = self.state.with(|s| s.filter.tag_id().map(str::to_string)) else {
            return Ok(());
        };
        let generation = self.tag_generation.begin();
        self.resolve_tag_members(&tag_id, generation).await
    }

    async fn resolve_tag_members(&self, tag_id: &str, generation: u64) -> AppResult<()> {
        let result = self
            .service
            .select(NOTE_TAGS_TABLE, &Filter::new().eq("tag_id", tag_id), None)
            .await
            .and_then(decode_rows::<NoteTag>);

        if !self.tag_generation.is_current(generation) {
            log::debug!("dropping stale tag membership for {tag_id}");
            return Ok(());
        }

        match result {
            Ok(links) => {
                let members: HashSet<String> = links.into_iter().map(|l| l.note_id).collect();
                self.state.update(|s| s.tag_members = Some(members));
                Ok(())
            }
            Err(e) => {
                log::error!("Error fetching notes for tag {tag_id}: {e}");
                let err = AppError::from(e);
                self.record_error(&err);
                Err(err)
            }
        }
    }

    pub fn dismiss_error(&self) {
        self.state.update(|s| s.error = None);
    }
}

fn restore_note(state: &mut NoteState, id: &str, prior: Option<Note>) {
    if let Some(prior) = prior {
        if let Some(n) = state.notes.iter_mut().find(|n| n.id == id) {
            *n = prior;
        }
    }
}
