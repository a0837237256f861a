#[cfg(test)]
pub(crate) mod memory;
mod rest;

pub use rest::RestClient;

use crate::models::{Session, User};
use crate::observe::Subscription;
use async_trait::async_trait;
use serde_json::Value;

pub const NOTES_TABLE: &str = "notes";
pub const TAGS_TABLE: &str = "tags";
pub const NOTE_TAGS_TABLE: &str = "note_tags";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
    Conflict,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn network(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    pub fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Conflict,
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: &str, ctx: &str) -> Self {
        Self {
            kind: ApiErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Row match used by select/update/delete. All conditions must hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub eq: Vec<(String, String)>,
    pub is_in: Vec<(String, Vec<String>)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        Self::new().eq("id", id)
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.eq.push((column.to_string(), value.to_string()));
        self
    }

    pub fn is_in<S: ToString>(mut self, column: &str, values: impl IntoIterator<Item = S>) -> Self {
        self.is_in.push((
            column.to_string(),
            values.into_iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.eq.is_empty() && self.is_in.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: true,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            ascending: false,
        }
    }
}

pub type SessionCallback = Box<dyn Fn(Option<Session>)>;

/// The hosted data service as seen by the state containers.
///
/// Rows travel as JSON objects keyed by column name; the containers own the
/// typed conversion. Futures are not `Send` because the browser runtime is
/// single-threaded.
#[async_trait(?Send)]
pub trait DataService {
    async fn select(&self, table: &str, filter: &Filter, order: Option<&Order>)
        -> ApiResult<Vec<Value>>;

    /// Inserts `rows` and returns them as stored (with generated columns).
    async fn insert(&self, table: &str, rows: Vec<Value>) -> ApiResult<Vec<Value>>;

    /// Applies `fields` to every matching row and returns the affected rows.
    async fn update(&self, table: &str, fields: Value, filter: &Filter) -> ApiResult<Vec<Value>>;

    async fn delete(&self, table: &str, filter: &Filter) -> ApiResult<()>;

    async fn authenticate(&self, email: &str, password: &str) -> ApiResult<Session>;

    async fn sign_out(&self) -> ApiResult<()>;

    /// Session the service currently holds, if any (e.g. restored from storage).
    async fn get_session(&self) -> ApiResult<Option<Session>>;

    fn current_user(&self) -> Option<User>;

    fn on_session_change(&self, callback: SessionCallback) -> Subscription;
}

/// Decode rows returned by the service into a typed model.
pub fn decode_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> ApiResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(ApiError::parse))
        .collect()
}

pub fn decode_first<T: serde::de::DeserializeOwned>(rows: Vec<Value>, ctx: &str) -> ApiResult<T> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::parse(format!("{ctx}: response contained no rows")))?;
    serde_json::from_value(row).map_err(ApiError::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tag;

    #[test]
    fn test_filter_builder_collects_conditions() {
        let f = Filter::new()
            .eq("note_id", "n1")
            .is_in("tag_id", ["t1", "t2"]);
        assert_eq!(f.eq, vec![("note_id".to_string(), "n1".to_string())]);
        assert_eq!(f.is_in[0].1, vec!["t1".to_string(), "t2".to_string()]);
        assert!(!f.is_empty());
        assert!(Filter::new().is_empty());
    }

    #[test]
    fn test_decode_first_reports_empty_response() {
        let err = decode_first::<Tag>(vec![], "create tag").unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Parse);
        assert!(err.message.contains("create tag"));
    }

    #[test]
    fn test_http_error_message_includes_status() {
        let e = ApiError::http(500, "boom", "Request failed");
        assert_eq!(e.to_string(), "Request failed (500): boom");
    }
}
