//! In-memory `DataService` used by the store tests.

use super::{
    ApiError, ApiErrorKind, ApiResult, DataService, Filter, Order, SessionCallback,
    NOTES_TABLE, NOTE_TAGS_TABLE, TAGS_TABLE,
};
use crate::models::{Session, User};
use crate::observe::{Listeners, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use futures::channel::oneshot;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct MemoryService {
    tables: RefCell<HashMap<String, Vec<Value>>>,
    next_id: Cell<u64>,
    tick: Cell<i64>,
    accounts: RefCell<Vec<(String, String, User)>>,
    session: RefCell<Option<Session>>,
    listeners: Listeners<Option<Session>>,
    failures: RefCell<Vec<(String, String)>>,
    gates: RefCell<Vec<(String, oneshot::Receiver<()>)>>,
    calls: RefCell<Vec<(String, String)>>,
}

fn column_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(dx), Ok(dy)) => dx.cmp(&dy),
                _ => x.cmp(y),
            }
        }
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => column_text(a).cmp(&column_text(b)),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    let col = |c: &str| row.get(c).map(column_text).unwrap_or_else(|| "null".into());
    filter.eq.iter().all(|(c, v)| col(c) == *v)
        && filter
            .is_in
            .iter()
            .all(|(c, vs)| vs.iter().any(|v| *v == col(c)))
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, email: &str, password: &str) -> User {
        let user = User {
            id: format!("user-{}", self.accounts.borrow().len() + 1),
            email: Some(email.to_string()),
        };
        self.accounts
            .borrow_mut()
            .push((email.to_string(), password.to_string(), user.clone()));
        user
    }

    /// Make the next `op` (`select`/`insert`/`update`/`delete`) on `table` fail.
    pub fn fail_next(&self, op: &str, table: &str) {
        self.failures
            .borrow_mut()
            .push((op.to_string(), table.to_string()));
    }

    /// Hold the next `select` on `table` after it has read its rows, until the
    /// returned sender fires or is dropped.
    pub fn pause_next_select(&self, table: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().push((table.to_string(), rx));
        tx
    }

    fn take_gate(&self, table: &str) -> Option<oneshot::Receiver<()>> {
        let mut gates = self.gates.borrow_mut();
        let pos = gates.iter().position(|(t, _)| t == table)?;
        Some(gates.remove(pos).1)
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .borrow()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed(&self, table: &str, row: Value) {
        self.tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn call_count(&self, op: &str, table: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|(o, t)| o == op && t == table)
            .count()
    }

    pub fn timestamp(&self) -> String {
        let t = self.tick.get() + 1;
        self.tick.set(t);
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (base + Duration::seconds(t)).to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn record(&self, op: &str, table: &str) -> ApiResult<()> {
        self.calls
            .borrow_mut()
            .push((op.to_string(), table.to_string()));
        let mut failures = self.failures.borrow_mut();
        if let Some(pos) = failures.iter().position(|(o, t)| o == op && t == table) {
            failures.remove(pos);
            return Err(ApiError {
                kind: ApiErrorKind::Network,
                message: format!("{op} {table}: injected failure"),
            });
        }
        Ok(())
    }

    fn with_defaults(&self, table: &str, mut row: Value) -> Value {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let now = self.timestamp();
        if let Some(obj) = row.as_object_mut() {
            obj.entry("id").or_insert_with(|| json!(format!("{table}-{id}")));
            match table {
                NOTES_TABLE => {
                    obj.entry("content").or_insert(json!(""));
                    obj.entry("is_favorite").or_insert(json!(false));
                    obj.entry("is_deleted").or_insert(json!(false));
                    obj.entry("created_at").or_insert(json!(now.clone()));
                    obj.entry("updated_at").or_insert(json!(now));
                }
                TAGS_TABLE | NOTE_TAGS_TABLE => {
                    obj.entry("created_at").or_insert(json!(now));
                }
                _ => {}
            }
        }
        row
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.borrow_mut() = session.clone();
        self.listeners.emit(&session);
    }
}

#[async_trait(?Send)]
impl DataService for MemoryService {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> ApiResult<Vec<Value>> {
        self.record("select", table)?;
        let mut out: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|r| matches(r, filter))
            .collect();
        if let Some(order) = order {
            out.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(gate) = self.take_gate(table) {
            let _ = gate.await;
        }
        Ok(out)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> ApiResult<Vec<Value>> {
        self.record("insert", table)?;
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            if table == NOTE_TAGS_TABLE {
                let existing = self.rows(table);
                let duplicate = existing.iter().any(|r| {
                    r.get("note_id") == row.get("note_id") && r.get("tag_id") == row.get("tag_id")
                });
                if duplicate {
                    return Err(ApiError::conflict("duplicate key value violates unique constraint"));
                }
            }
            let row = self.with_defaults(table, row);
            self.seed(table, row.clone());
            stored.push(row);
        }
        Ok(stored)
    }

    async fn update(&self, table: &str, fields: Value, filter: &Filter) -> ApiResult<Vec<Value>> {
        self.record("update", table)?;
        let mut tables = self.tables.borrow_mut();
        let rows = tables.entry(table.to_string()).or_default();
        let mut affected = Vec::new();
        for row in rows.iter_mut().filter(|r| matches(r, filter)) {
            if let (Some(obj), Some(patch)) = (row.as_object_mut(), fields.as_object()) {
                for (k, v) in patch {
                    obj.insert(k.clone(), v.clone());
                }
            }
            affected.push(row.clone());
        }
        Ok(affected)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> ApiResult<()> {
        self.record("delete", table)?;
        if let Some(rows) = self.tables.borrow_mut().get_mut(table) {
            rows.retain(|r| !matches(r, filter));
        }
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> ApiResult<Session> {
        let user = self
            .accounts
            .borrow()
            .iter()
            .find(|(e, p, _)| e == email && p == password)
            .map(|(_, _, u)| u.clone());
        let Some(user) = user else {
            return Err(ApiError::unauthorized("Invalid login credentials"));
        };
        let session = Session {
            access_token: format!("token-{}", user.id),
            refresh_token: None,
            expires_in: Some(3600),
            user,
        };
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> ApiResult<()> {
        self.set_session(None);
        Ok(())
    }

    async fn get_session(&self) -> ApiResult<Option<Session>> {
        Ok(self.session.borrow().clone())
    }

    fn current_user(&self) -> Option<User> {
        self.session.borrow().as_ref().map(|s| s.user.clone())
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.listeners
            .add(move |s: &Option<Session>| callback(s.clone()))
    }
}
