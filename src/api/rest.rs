use super::{ApiError, ApiErrorKind, ApiResult, DataService, Filter, Order, SessionCallback};
use crate::config::EnvConfig;
use crate::models::{Session, User};
use crate::observe::{Listeners, Subscription};
use crate::storage::{clear_session, load_session, save_session};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Serialize, Clone, Debug)]
struct PasswordGrantRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Error body shapes returned by the auth service across versions.
#[derive(Deserialize, Debug, Default)]
struct AuthErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message)
    }
}

/// `DataService` backed by a hosted PostgREST + auth deployment.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
    session: Rc<RefCell<Option<Session>>>,
    listeners: Listeners<Option<Session>>,
    persist: bool,
}

impl RestClient {
    pub fn new(config: EnvConfig) -> Self {
        let config = config.normalized();
        Self {
            base_url: config.data_url,
            anon_key: config.anon_key,
            http: reqwest::Client::new(),
            session: Rc::new(RefCell::new(None)),
            listeners: Listeners::default(),
            persist: false,
        }
    }

    /// Client configured from `window.ENV` with the session cached in localStorage.
    pub fn load_from_storage() -> Self {
        let mut client = Self::new(EnvConfig::from_window());
        client.persist = true;
        *client.session.borrow_mut() = load_session();
        client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bearer(&self) -> String {
        let token = self
            .session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());
        format!("Bearer {token}")
    }

    fn with_auth_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header("Authorization", self.bearer())
    }

    pub(crate) fn table_url(&self, table: &str, filter: &Filter, order: Option<&Order>) -> String {
        let mut params: Vec<String> = vec!["select=*".to_string()];
        params.extend(Self::filter_params(filter));
        if let Some(order) = order {
            let dir = if order.ascending { "asc" } else { "desc" };
            params.push(format!("order={}.{dir}", urlencoding::encode(&order.column)));
        }
        format!("{}/rest/v1/{}?{}", self.base_url, table, params.join("&"))
    }

    pub(crate) fn filter_params(filter: &Filter) -> Vec<String> {
        let mut params = Vec::with_capacity(filter.eq.len() + filter.is_in.len());
        for (column, value) in &filter.eq {
            params.push(format!(
                "{}=eq.{}",
                urlencoding::encode(column),
                urlencoding::encode(value)
            ));
        }
        for (column, values) in &filter.is_in {
            let quoted = values
                .iter()
                .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
                .collect::<Vec<_>>()
                .join(",");
            params.push(format!(
                "{}=in.{}",
                urlencoding::encode(column),
                urlencoding::encode(&format!("({quoted})"))
            ));
        }
        params
    }

    async fn send(&self, req: reqwest::RequestBuilder, ctx: &str) -> ApiResult<reqwest::Response> {
        let res = self
            .with_auth_headers(req)
            .send()
            .await
            .map_err(ApiError::network)?;

        let status = res.status().as_u16();
        if res.status().is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        match status {
            401 => Err(ApiError::unauthorized(format!("{ctx}: unauthorized"))),
            409 => Err(ApiError::conflict(format!("{ctx}: {body}"))),
            _ => Err(ApiError::http(status, &body, ctx)),
        }
    }

    async fn send_rows(&self, req: reqwest::RequestBuilder, ctx: &str) -> ApiResult<Vec<Value>> {
        let res = self.send(req, ctx).await?;
        let text = res.text().await.map_err(ApiError::network)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&text).map_err(ApiError::parse)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.borrow_mut() = session.clone();
        if self.persist {
            match &session {
                Some(s) => save_session(s),
                None => clear_session(),
            }
        }
        self.listeners.emit(&session);
    }
}

#[async_trait(?Send)]
impl DataService for RestClient {
    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> ApiResult<Vec<Value>> {
        let url = self.table_url(table, filter, order);
        self.send_rows(self.http.get(url), &format!("select {table}"))
            .await
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> ApiResult<Vec<Value>> {
        let url = format!("{}/rest/v1/{}?select=*", self.base_url, table);
        let req = self
            .http
            .post(url)
            .header("Prefer", "return=representation")
            .json(&rows);
        self.send_rows(req, &format!("insert {table}")).await
    }

    async fn update(&self, table: &str, fields: Value, filter: &Filter) -> ApiResult<Vec<Value>> {
        let url = self.table_url(table, filter, None);
        let req = self
            .http
            .patch(url)
            .header("Prefer", "return=representation")
            .json(&fields);
        self.send_rows(req, &format!("update {table}")).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> ApiResult<()> {
        let mut url = format!("{}/rest/v1/{}", self.base_url, table);
        let params = Self::filter_params(filter);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        self.send(self.http.delete(url), &format!("delete {table}"))
            .await?;
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> ApiResult<Session> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let res = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&PasswordGrantRequest { email, password })
            .send()
            .await
            .map_err(ApiError::network)?;

        let status = res.status().as_u16();
        if !res.status().is_success() {
            let body = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AuthErrorBody>(&body)
                .ok()
                .and_then(AuthErrorBody::into_message)
                .unwrap_or_else(|| "Invalid login credentials".to_string());
            return match status {
                400 | 401 | 403 => Err(ApiError::unauthorized(message)),
                _ => Err(ApiError::http(status, &body, "Sign in failed")),
            };
        }

        let session: Session = res.json().await.map_err(ApiError::parse)?;
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> ApiResult<()> {
        let had_session = self.session.borrow().is_some();
        let result = if had_session {
            let url = format!("{}/auth/v1/logout", self.base_url);
            self.send(self.http.post(url), "sign out").await.map(|_| ())
        } else {
            Ok(())
        };
        // Local identity is dropped even when the remote call fails.
        self.set_session(None);
        result
    }

    async fn get_session(&self) -> ApiResult<Option<Session>> {
        let Some(session) = self.session.borrow().clone() else {
            return Ok(None);
        };

        let url = format!("{}/auth/v1/user", self.base_url);
        match self.send(self.http.get(url), "get user").await {
            Ok(res) => {
                let user: User = res.json().await.map_err(ApiError::parse)?;
                let refreshed = Session { user, ..session };
                *self.session.borrow_mut() = Some(refreshed.clone());
                Ok(Some(refreshed))
            }
            Err(e) if e.kind == ApiErrorKind::Unauthorized => {
                log::info!("stored session rejected, clearing");
                self.set_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn current_user(&self) -> Option<User> {
        self.session.borrow().as_ref().map(|s| s.user.clone())
    }

    fn on_session_change(&self, callback: SessionCallback) -> Subscription {
        self.listeners.add(move |session: &Option<Session>| callback(session.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RestClient {
        RestClient::new(EnvConfig {
            data_url: "https://proj.example.co/".to_string(),
            anon_key: "anon".to_string(),
        })
    }

    #[test]
    fn test_table_url_with_eq_and_order() {
        let url = client().table_url(
            "notes",
            &Filter::new().eq("user_id", "u 1"),
            Some(&Order::desc("updated_at")),
        );
        assert_eq!(
            url,
            "https://proj.example.co/rest/v1/notes?select=*&user_id=eq.u%201&order=updated_at.desc"
        );
    }

    #[test]
    fn test_filter_params_quote_in_lists() {
        let params = RestClient::filter_params(&Filter::new().is_in("id", ["a", "b"]));
        assert_eq!(params, vec!["id=in.%28%22a%22%2C%22b%22%29".to_string()]);
    }

    #[test]
    fn test_bearer_falls_back_to_anon_key() {
        let c = client();
        assert_eq!(c.bearer(), "Bearer anon");
        assert!(c.current_user().is_none());
    }

    #[test]
    fn test_set_session_notifies_listeners() {
        let c = client();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_c = Rc::clone(&seen);
        let _sub = c.on_session_change(Box::new(move |s: Option<Session>| {
            seen_c.borrow_mut().push(s.map(|s| s.user.id))
        }));

        c.set_session(Some(Session {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_in: None,
            user: User {
                id: "u1".to_string(),
                email: None,
            },
        }));
        assert_eq!(c.bearer(), "Bearer tok");
        c.set_session(None);

        assert_eq!(*seen.borrow(), vec![Some("u1".to_string()), None]);
    }

    #[test]
    fn test_auth_error_body_prefers_description() {
        let body: AuthErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));

        let body: AuthErrorBody =
            serde_json::from_str(r#"{"code":400,"msg":"Email not confirmed"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Email not confirmed"));
    }
}
