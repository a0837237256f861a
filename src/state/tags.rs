use super::error::{AppError, AppResult};
use super::generation::Generation;
use super::notes::BulkOutcome;
use super::optimistic::with_rollback;
use super::session::SessionAccessor;
use crate::api::{
    decode_first, decode_rows, ApiErrorKind, DataService, Filter, Order, NOTE_TAGS_TABLE,
    TAGS_TABLE,
};
use crate::colors::is_valid_color;
use crate::models::{NoteTag, Tag, TagFields};
use crate::observe::Store;
use futures::future::join_all;
use serde_json::json;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagState {
    /// Sorted by name, case-insensitively.
    pub tags: Vec<Tag>,
    pub loading: bool,
    pub error: Option<String>,
}

impl TagState {
    pub fn find(&self, id: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id == id)
    }
}

fn sort_tags(tags: &mut [Tag]) {
    tags.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn validate(fields: &TagFields) -> AppResult<TagFields> {
    let name = fields.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Tag name is required".to_string()));
    }
    let color = fields.color.trim();
    if !is_valid_color(color) {
        return Err(AppError::Validation(format!("Invalid color: {color}")));
    }
    Ok(TagFields {
        name: name.to_string(),
        color: color.to_string(),
    })
}

/// Mirror of the user's tags plus a per-note cache of tag assignments.
#[derive(Clone)]
pub struct TagStore {
    state: Store<TagState>,
    service: Rc<dyn DataService>,
    session: Rc<dyn SessionAccessor>,
    fetch_generation: Generation,
    note_tags: Rc<RefCell<HashMap<String, Vec<Tag>>>>,
}

impl TagStore {
    pub fn new(service: Rc<dyn DataService>, session: Rc<dyn SessionAccessor>) -> Self {
        Self {
            state: Store::new(TagState::default()),
            service,
            session,
            fetch_generation: Generation::new(),
            note_tags: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn state(&self) -> &Store<TagState> {
        &self.state
    }

    pub fn snapshot(&self) -> TagState {
        self.state.get()
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

    /// Forget cached assignments for one note.
    pub fn invalidate_note(&self, note_id: &str) {
        self.note_tags.borrow_mut().remove(note_id);
    }

    pub fn invalidate_all(&self) {
        self.note_tags.borrow_mut().clear();
    }

    pub fn clear(&self) {
        self.fetch_generation.invalidate();
        self.invalidate_all();
        self.state.set(TagState::default());
    }

    pub async fn fetch_all(&self) -> AppResult<()> {
        let user_id = self.require_user("load tags")?;
        let generation = self.fetch_generation.begin();
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = self
            .service
            .select(
                TAGS_TABLE,
                &Filter::new().eq("user_id", &user_id),
                Some(&Order::asc("name")),
            )
            .await
            .and_then(decode_rows::<Tag>);

        if !self.fetch_generation.is_current(generation) {
            log::debug!("dropping stale tags response (generation {generation})");
            return Ok(());
        }

        match result {
            Ok(mut tags) => {
                sort_tags(&mut tags);
                self.state.update(|s| {
                    s.tags = tags;
                    s.loading = false;
                });
                Ok(())
            }
            Err(e) => {
                log::error!("Error fetching tags: {e}");
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

    pub async fn create(&self, name: &str, color: &str) -> AppResult<Tag> {
        let user_id = self.require_user("create tags")?;
        let fields = validate(&TagFields {
            name: name.to_string(),
            color: color.to_string(),
        })?;

        let row = json!({
            "user_id": user_id,
            "name": fields.name,
            "color": fields.color,
        });
        let tag: Tag = match self.service.insert(TAGS_TABLE, vec![row]).await {
            Ok(rows) => decode_first(rows, "create tag")?,
            Err(e) => {
                log::error!("Error creating tag: {e}");
                return Err(e.into());
            }
        };

        self.state.update(|s| {
            s.tags.push(tag.clone());
            sort_tags(&mut s.tags);
        });
        Ok(tag)
    }

    pub async fn update(&self, id: &str, fields: TagFields) -> AppResult<()> {
        let fields = validate(&fields)?;
        if self.state.with(|s| s.find(id).is_none()) {
            return Err(AppError::NotFound(format!("Tag {id}")));
        }

        let payload = json!({ "name": fields.name, "color": fields.color });
        let filter = Filter::by_id(id);
        let owned_id = id.to_string();

        let result = with_rollback(
            &self.state,
            |s| s.find(id).cloned(),
            |s| {
                if let Some(t) = s.tags.iter_mut().find(|t| t.id == id) {
                    t.name = fields.name.clone();
                    t.color = fields.color.clone();
                }
                sort_tags(&mut s.tags);
            },
            |s, prior| {
                if let Some(prior) = prior {
                    if let Some(t) = s.tags.iter_mut().find(|t| t.id == owned_id) {
                        *t = prior;
                    }
                    sort_tags(&mut s.tags);
                }
            },
            self.service.update(TAGS_TABLE, payload, &filter),
        )
        .await;

        match result {
            Ok(_) => {
                // Cached assignments carry the old name and color.
                self.invalidate_all();
                Ok(())
            }
            Err(e) => {
                log::error!("Error updating tag {id}: {e}");
                let err = AppError::from(e);
                self.record_error(&err);
                Err(err)
            }
        }
    }

    /// Delete the tag after removing every association that references it.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        if self.state.with(|s| s.find(id).is_none()) {
            return Err(AppError::NotFound(format!("Tag {id}")));
        }

        let remote = async {
            self.service
                .delete(NOTE_TAGS_TABLE, &Filter::new().eq("tag_id", id))
                .await?;
            self.service.delete(TAGS_TABLE, &Filter::by_id(id)).await
        };

        let result = with_rollback(
            &self.state,
            |s| {
                s.tags
                    .iter()
                    .position(|t| t.id == id)
                    .map(|i| (i, s.tags[i].clone()))
            },
            |s| s.tags.retain(|t| t.id != id),
            |s, prior| {
                if let Some((index, tag)) = prior {
                    let index = index.min(s.tags.len());
                    s.tags.insert(index, tag);
                }
            },
            remote,
        )
        .await;

        // The association delete may have gone through even if the tag delete failed.
        self.invalidate_all();

        result.map_err(|e| {
            log::error!("Error deleting tag {id}: {e}");
            let err = AppError::from(e);
            self.record_error(&err);
            err
        })
    }

    /// Tags linked to `note_id`, sorted by name. Served from cache when possible.
    pub async fn get_tags_for_note(&self, note_id: &str) -> AppResult<Vec<Tag>> {
        if let Some(cached) = self.note_tags.borrow().get(note_id) {
            return Ok(cached.clone());
        }

        let tag_ids = self.tag_ids_for_note(note_id).await?;
        let mut tags: Vec<Tag> = if tag_ids.is_empty() {
            Vec::new()
        } else {
            self.service
                .select(TAGS_TABLE, &Filter::new().is_in("id", &tag_ids), None)
                .await
                .and_then(decode_rows::<Tag>)
                .map_err(|e| {
                    log::error!("Error fetching tags for note {note_id}: {e}");
                    AppError::from(e)
                })?
        };
        sort_tags(&mut tags);

        self.note_tags
            .borrow_mut()
            .insert(note_id.to_string(), tags.clone());
        Ok(tags)
    }

    async fn tag_ids_for_note(&self, note_id: &str) -> AppResult<Vec<String>> {
        let links = self
            .service
            .select(NOTE_TAGS_TABLE, &Filter::new().eq("note_id", note_id), None)
            .await
            .and_then(decode_rows::<NoteTag>)
            .map_err(|e| {
                log::error!("Error fetching associations for note {note_id}: {e}");
                AppError::from(e)
            })?;
        Ok(links.into_iter().map(|l| l.tag_id).collect())
    }

    pub async fn note_ids_for_tag(&self, tag_id: &str) -> AppResult<Vec<String>> {
        let links = self
            .service
            .select(NOTE_TAGS_TABLE, &Filter::new().eq("tag_id", tag_id), None)
            .await
            .and_then(decode_rows::<NoteTag>)
            .map_err(AppError::from)?;
        Ok(links.into_iter().map(|l| l.note_id).collect())
    }

    /// Link a tag to a note. An existing link is not an error.
    pub async fn add_tag_to_note(&self, note_id: &str, tag_id: &str) -> AppResult<()> {
        self.require_user("tag notes")?;
        let row = json!({ "note_id": note_id, "tag_id": tag_id });
        let result = self.service.insert(NOTE_TAGS_TABLE, vec![row]).await;
        self.invalidate_note(note_id);
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.kind == ApiErrorKind::Conflict => {
                log::debug!("note {note_id} already tagged {tag_id}");
                Ok(())
            }
            Err(e) => {
                log::error!("Error adding tag {tag_id} to note {note_id}: {e}");
                Err(e.into())
            }
        }
    }

    /// Unlink a tag from a note. Removing a missing link is a no-op.
    pub async fn remove_tag_from_note(&self, note_id: &str, tag_id: &str) -> AppResult<()> {
        self.require_user("tag notes")?;
        let filter = Filter::new().eq("note_id", note_id).eq("tag_id", tag_id);
        let result = self.service.delete(NOTE_TAGS_TABLE, &filter).await;
        self.invalidate_note(note_id);
        result.map_err(|e| {
            log::error!("Error removing tag {tag_id} from note {note_id}: {e}");
            e.into()
        })
    }

    /// Make the note's tag set equal to `tag_ids`.
    pub async fn set_note_tags(&self, note_id: &str, tag_ids: &[String]) -> AppResult<()> {
        self.require_user("tag notes")?;
        let current: HashSet<String> = self.tag_ids_for_note(note_id).await?.into_iter().collect();
        let wanted: HashSet<&String> = tag_ids.iter().collect();

        for tag_id in tag_ids.iter().filter(|t| !current.contains(*t)) {
            self.add_tag_to_note(note_id, tag_id).await?;
        }
        for tag_id in current.iter().filter(|t| !wanted.contains(t)) {
            self.remove_tag_from_note(note_id, tag_id).await?;
        }
        self.invalidate_note(note_id);
        Ok(())
    }

    pub async fn bulk_add_tag(&self, note_ids: &[String], tag_id: &str) -> BulkOutcome {
        let results = join_all(note_ids.iter().map(|id| self.add_tag_to_note(id, tag_id))).await;
        BulkOutcome::from_results(note_ids, results)
    }

    pub fn dismiss_error(&self) {
        self.state.update(|s| s.error = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryService;
    use crate::state::session::SessionStore;
    use futures::executor::block_on;

    struct Fixture {
        service: Rc<MemoryService>,
        session: SessionStore,
        tags: TagStore,
    }

    fn fixture() -> Fixture {
        let service = Rc::new(MemoryService::new());
        service.add_account("ada@example.com", "hunter22");
        let session = SessionStore::new(service.clone());
        let tags = TagStore::new(service.clone(), Rc::new(session.clone()));
        Fixture {
            service,
            session,
            tags,
        }
    }

    fn signed_in() -> Fixture {
        let f = fixture();
        block_on(f.session.sign_in("ada@example.com", "hunter22")).unwrap();
        f
    }

    fn names(f: &Fixture) -> Vec<String> {
        f.tags.snapshot().tags.into_iter().map(|t| t.name).collect()
    }

    #[test]
    fn test_create_requires_auth() {
        let f = fixture();
        let err = block_on(f.tags.create("Work", "#fff")).unwrap_err();
        assert!(matches!(err, AppError::AuthRequired(_)));
        assert!(f.tags.snapshot().tags.is_empty());
    }

    #[test]
    fn test_create_validates_and_keeps_name_order() {
        let f = signed_in();
        assert!(matches!(
            block_on(f.tags.create("  ", "#fff")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            block_on(f.tags.create("Work", "blue")),
            Err(AppError::Validation(_))
        ));

        block_on(f.tags.create("work", "#3B82F6")).unwrap();
        block_on(f.tags.create(" Archive ", "hsl(10, 60%, 80%)")).unwrap();
        assert_eq!(names(&f), vec!["Archive", "work"]);
    }

    #[test]
    fn test_update_renames_and_invalidates_cache() {
        let f = signed_in();
        let tag = block_on(f.tags.create("Work", "#3B82F6")).unwrap();
        block_on(f.tags.add_tag_to_note("n1", &tag.id)).unwrap();
        assert_eq!(block_on(f.tags.get_tags_for_note("n1")).unwrap()[0].name, "Work");

        block_on(f.tags.update(
            &tag.id,
            TagFields {
                name: "Job".into(),
                color: "#EF4444".into(),
            },
        ))
        .unwrap();

        assert_eq!(names(&f), vec!["Job"]);
        let cached = block_on(f.tags.get_tags_for_note("n1")).unwrap();
        assert_eq!(cached[0].name, "Job");
        assert_eq!(cached[0].color, "#EF4444");
    }

    #[test]
    fn test_update_failure_rolls_back() {
        let f = signed_in();
        let tag = block_on(f.tags.create("Work", "#3B82F6")).unwrap();
        f.service.fail_next("update", TAGS_TABLE);
        let fields = TagFields {
            name: "Job".into(),
            color: "#EF4444".into(),
        };
        assert!(block_on(f.tags.update(&tag.id, fields)).is_err());
        assert_eq!(f.tags.snapshot().find(&tag.id), Some(&tag));
        assert!(f.tags.snapshot().error.is_some());
    }

    #[test]
    fn test_delete_cascades_associations() {
        let f = signed_in();
        let work = block_on(f.tags.create("Work", "#3B82F6")).unwrap();
        let home = block_on(f.tags.create("Home", "#10B981")).unwrap();
        block_on(f.tags.add_tag_to_note("n1", &work.id)).unwrap();
        block_on(f.tags.add_tag_to_note("n2", &work.id)).unwrap();
        block_on(f.tags.add_tag_to_note("n1", &home.id)).unwrap();
        block_on(f.tags.get_tags_for_note("n1")).unwrap();

        block_on(f.tags.delete(&work.id)).unwrap();

        assert_eq!(names(&f), vec!["Home"]);
        let links = f.service.rows(NOTE_TAGS_TABLE);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0]["tag_id"], json!(home.id));
        let n1 = block_on(f.tags.get_tags_for_note("n1")).unwrap();
        assert_eq!(n1.len(), 1);
        assert_eq!(n1[0].id, home.id);
    }

    #[test]
    fn test_delete_failure_restores_tag_in_place() {
        let f = signed_in();
        block_on(f.tags.create("A", "#fff")).unwrap();
        let b = block_on(f.tags.create("B", "#fff")).unwrap();
        block_on(f.tags.create("C", "#fff")).unwrap();
        f.service.fail_next("delete", TAGS_TABLE);

        assert!(block_on(f.tags.delete(&b.id)).is_err());
        assert_eq!(names(&f), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let f = signed_in();
        let tag = block_on(f.tags.create("Work", "#fff")).unwrap();

        block_on(f.tags.add_tag_to_note("n1", &tag.id)).unwrap();
        block_on(f.tags.add_tag_to_note("n1", &tag.id)).unwrap();
        assert_eq!(f.service.rows(NOTE_TAGS_TABLE).len(), 1);

        block_on(f.tags.remove_tag_from_note("n1", &tag.id)).unwrap();
        block_on(f.tags.remove_tag_from_note("n1", &tag.id)).unwrap();
        assert!(f.service.rows(NOTE_TAGS_TABLE).is_empty());
    }

    #[test]
    fn test_get_tags_for_note_uses_cache_until_write() {
        let f = signed_in();
        let tag = block_on(f.tags.create("Work", "#fff")).unwrap();
        block_on(f.tags.add_tag_to_note("n1", &tag.id)).unwrap();

        block_on(f.tags.get_tags_for_note("n1")).unwrap();
        block_on(f.tags.get_tags_for_note("n1")).unwrap();
        assert_eq!(f.service.call_count("select", NOTE_TAGS_TABLE), 1);

        block_on(f.tags.remove_tag_from_note("n1", &tag.id)).unwrap();
        assert!(block_on(f.tags.get_tags_for_note("n1")).unwrap().is_empty());
        assert_eq!(f.service.call_count("select", NOTE_TAGS_TABLE), 2);
    }

    #[test]
    fn test_set_note_tags_adds_and_removes() {
        let f = signed_in();
        let a = block_on(f.tags.create("A", "#fff")).unwrap();
        let b = block_on(f.tags.create("B", "#fff")).unwrap();
        let c = block_on(f.tags.create("C", "#fff")).unwrap();
        block_on(f.tags.add_tag_to_note("n1", &a.id)).unwrap();
        block_on(f.tags.add_tag_to_note("n1", &b.id)).unwrap();

        block_on(f.tags.set_note_tags("n1", &[b.id.clone(), c.id.clone()])).unwrap();

        let ids: Vec<String> = block_on(f.tags.get_tags_for_note("n1"))
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![b.id.clone(), c.id.clone()]);
        assert_eq!(block_on(f.tags.note_ids_for_tag(&a.id)).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_bulk_add_tag_reports_per_note() {
        let f = signed_in();
        let tag = block_on(f.tags.create("Work", "#fff")).unwrap();
        f.service.fail_next("insert", NOTE_TAGS_TABLE);

        let ids = vec!["n1".to_string(), "n2".to_string()];
        let outcome = block_on(f.tags.bulk_add_tag(&ids, &tag.id));
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(f.service.rows(NOTE_TAGS_TABLE).len(), 1);
    }

    #[test]
    fn test_fetch_all_is_scoped_to_user() {
        let f = signed_in();
        block_on(f.tags.create("Mine", "#fff")).unwrap();
        f.service.seed(
            TAGS_TABLE,
            json!({"id": "x", "user_id": "user-9", "name": "Theirs", "color": "#fff",
                   "created_at": "2024-01-01T00:00:00Z"}),
        );
        f.tags.clear();
        block_on(f.tags.fetch_all()).unwrap();
        assert_eq!(names(&f), vec!["Mine"]);
    }

    #[test]
    fn test_rename_keeps_fractional_hsl_color() {
        let f = signed_in();
        let user_id = f.session.snapshot().user.unwrap().id;
        let color = "hsl(123, 57.38291%, 79.1234%)";
        f.service.seed(
            TAGS_TABLE,
            json!({"id": "t-old", "user_id": user_id, "name": "Work", "color": color,
                   "created_at": "2024-01-01T00:00:00Z"}),
        );
        block_on(f.tags.fetch_all()).unwrap();

        block_on(f.tags.update(
            "t-old",
            TagFields {
                name: "Job".into(),
                color: color.into(),
            },
        ))
        .unwrap();

        let tag = f.tags.snapshot().find("t-old").cloned().unwrap();
        assert_eq!(tag.name, "Job");
        assert_eq!(tag.color, color);
    }
}
