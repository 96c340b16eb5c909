//! HTTP adapter for a Supabase project: GoTrue auth under `/auth/v1` and the
//! PostgREST table API under `/rest/v1`.

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tasknotes_core::{
    models::{NewTask, OrderBy, Principal, Session, Task, TaskChanges, TaskId},
    NoteError, NoteResult, StoreError,
};

use crate::config::ClientConfig;
use crate::store::{AuthBackend, RemoteStore, StoreResult};

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Token grant body. Sign-up returns the same shape when it signs the user in,
/// and a bare user object otherwise.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<Principal>,
}

impl TokenResponse {
    fn into_session(self) -> Option<Session> {
        Some(Session {
            access_token: self.access_token?,
            refresh_token: self.refresh_token,
            user: self.user?,
        })
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<serde_json::Value>,
    error_code: Option<String>,
}

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &ClientConfig) -> NoteResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| NoteError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Every request carries the anon key; the bearer is the user's access
    /// token when signed in.
    fn request(&self, method: Method, url: String, session: Option<&Session>) -> RequestBuilder {
        let bearer = session
            .map(|s| s.access_token.as_str())
            .unwrap_or(self.anon_key.as_str());

        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    tracing::warn!("Request to backend failed: {}", err);
    let store_error = StoreError::new(format!("Network request failed: {}", err));
    match err.status() {
        Some(status) => store_error.with_status(status.as_u16()),
        None => store_error,
    }
}

async fn error_from_response(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    parse_error_body(status, &body)
}

/// Picks the human-readable message out of a GoTrue or PostgREST error body.
fn parse_error_body(status: StatusCode, body: &str) -> StoreError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response from server")
                .to_string()
        });

    let code = parsed.error_code.or_else(|| {
        parsed.code.map(|code| match code {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
    });

    tracing::debug!(status = status.as_u16(), code = ?code, "Backend returned error: {}", message);

    let error = StoreError::new(message).with_status(status.as_u16());
    match code {
        Some(code) => error.with_code(code),
        None => error,
    }
}

fn decode_error(err: reqwest::Error) -> StoreError {
    StoreError::new(format!("Failed to decode response: {}", err))
}

fn order_param(order: &OrderBy) -> String {
    format!("{}.{}", order.column, order.direction)
}

fn id_filter(id: TaskId) -> String {
    format!("eq.{}", id)
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn current_user(&self, session: Option<&Session>) -> StoreResult<Option<Principal>> {
        let Some(session) = session else {
            return Ok(None);
        };

        let response = self
            .request(Method::GET, self.auth_url("user"), Some(session))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::info!("Access token rejected; treating as signed out");
                Ok(None)
            }
            status if status.is_success() => {
                let principal = response.json::<Principal>().await.map_err(decode_error)?;
                Ok(Some(principal))
            }
            _ => Err(error_from_response(response).await),
        }
    }

    async fn select_all(
        &self,
        session: Option<&Session>,
        table: &str,
        order: &OrderBy,
    ) -> StoreResult<Vec<Task>> {
        let request = self
            .request(Method::GET, self.table_url(table), session)
            .query(&[("select", "*".to_string()), ("order", order_param(order))]);

        let rows = self
            .send(request)
            .await?
            .json::<Vec<Task>>()
            .await
            .map_err(decode_error)?;
        tracing::debug!("Fetched {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    async fn insert(&self, session: Option<&Session>, table: &str, row: &NewTask) -> StoreResult<()> {
        let request = self
            .request(Method::POST, self.table_url(table), session)
            .header("Prefer", "return=minimal")
            .json(row);
        self.send(request).await?;
        Ok(())
    }

    async fn update_by_id(
        &self,
        session: Option<&Session>,
        table: &str,
        id: TaskId,
        fields: &TaskChanges,
    ) -> StoreResult<()> {
        let request = self
            .request(Method::PATCH, self.table_url(table), session)
            .query(&[("id", id_filter(id))])
            .header("Prefer", "return=minimal")
            .json(fields);
        self.send(request).await?;
        Ok(())
    }

    async fn delete_by_id(&self, session: Option<&Session>, table: &str, id: TaskId) -> StoreResult<()> {
        let request = self
            .request(Method::DELETE, self.table_url(table), session)
            .query(&[("id", id_filter(id))])
            .header("Prefer", "return=minimal");
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthBackend for SupabaseClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> StoreResult<Session> {
        let request = self
            .request(Method::POST, self.auth_url("token"), None)
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password });

        let token = self
            .send(request)
            .await?
            .json::<TokenResponse>()
            .await
            .map_err(decode_error)?;

        token
            .into_session()
            .ok_or_else(|| StoreError::new("Sign-in response did not include a session"))
    }

    async fn sign_up(&self, email: &str, password: &str) -> StoreResult<Option<Session>> {
        let request = self
            .request(Method::POST, self.auth_url("signup"), None)
            .json(&Credentials { email, password });

        let body = self
            .send(request)
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(decode_error)?;

        if body.get("access_token").is_none() {
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| StoreError::new(format!("Failed to decode response: {}", e)))?;
        Ok(token.into_session())
    }

    async fn sign_out(&self, session: &Session) -> StoreResult<()> {
        let request = self.request(Method::POST, self.auth_url("logout"), Some(session));
        self.send(request).await?;
        Ok(())
    }
}
