//! Blocking HTTP client for the test-intelligence service.
//!
//! One client per invocation; every call is a single synchronous request
//! scoped to the workspace named by the API token.

use reqwest::blocking::Body;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;

use launchable_core::TestCaseEvent;

use crate::results::TestResults;
use crate::stream::gzip_events;

/// API token: `v1:<organization>/<workspace>:<key>`.
pub const TOKEN_ENV: &str = "LAUNCHABLE_TOKEN";

/// Service base URL override.
pub const BASE_URL_ENV: &str = "LAUNCHABLE_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "https://api.mercury.launchableinc.com";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("LAUNCHABLE_TOKEN is not set; set it to your workspace API token")]
    MissingToken,

    #[error("malformed API token; expected v1:<organization>/<workspace>:<key>")]
    MalformedToken,

    #[error("test session {0} not found")]
    SessionNotFound(String),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response from {url}: {detail}")]
    MalformedResponse { url: String, detail: String },
}

pub struct LaunchableClient {
    http: reqwest::blocking::Client,
    base_url: String,
    organization: String,
    workspace: String,
    token: String,
}

impl LaunchableClient {
    /// Build a client from `LAUNCHABLE_TOKEN` and the optional
    /// `LAUNCHABLE_BASE_URL` override.
    pub fn from_env() -> Result<Self, ClientError> {
        let token = std::env::var(TOKEN_ENV).map_err(|_| ClientError::MissingToken)?;
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(&base_url, &token)
    }

    pub fn new(base_url: &str, token: &str) -> Result<Self, ClientError> {
        let (organization, workspace) = parse_token(token)?;
        Ok(LaunchableClient {
            http: reqwest::blocking::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            organization,
            workspace,
            token: token.to_string(),
        })
    }

    /// Absolute URL for a workspace-scoped path.
    pub fn workspace_url(&self, path: &str) -> String {
        format!(
            "{}/intake/organizations/{}/workspaces/{}/{}",
            self.base_url,
            self.organization,
            self.workspace,
            path.trim_start_matches('/')
        )
    }

    /// Register a new test session for `build_name`, returning the
    /// server-issued session id.
    pub fn create_test_session(&self, build_name: &str) -> Result<String, ClientError> {
        let url = self.workspace_url(&format!("builds/{}/test_sessions", build_name));
        tracing::debug!(%url, "creating test session");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({}))
            .send()?;
        let response = self.expect_success(response, &url)?;

        let value: serde_json::Value = response.json()?;
        match value.get("id") {
            Some(id) if id.is_number() => Ok(id.to_string()),
            Some(serde_json::Value::String(id)) => Ok(id.clone()),
            _ => Err(ClientError::MalformedResponse {
                url,
                detail: "missing session id".to_string(),
            }),
        }
    }

    /// Stream the events to `POST .../{session}/events` as a
    /// gzip-compressed JSON body. `session_name` is the
    /// `builds/<build>/test_sessions/<id>` form.
    pub fn upload_events<I>(&self, session_name: &str, events: I) -> Result<(), ClientError>
    where
        I: Iterator<Item = anyhow::Result<TestCaseEvent>> + Send + 'static,
    {
        let url = self.workspace_url(&format!("{}/events", session_name));
        tracing::debug!(%url, "uploading test case events");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_ENCODING, "gzip")
            .body(Body::new(gzip_events(events)))
            .send()?;
        self.expect_success(response, &url)?;
        Ok(())
    }

    /// Fetch the recorded results of a session. 404 becomes
    /// [`ClientError::SessionNotFound`] so callers can warn instead of
    /// crash.
    pub fn fetch_test_results(&self, session_id: &str) -> Result<TestResults, ClientError> {
        let url = self.workspace_url(&format!("test_sessions/{}/events", session_id));
        tracing::debug!(%url, "fetching recorded results");

        let response = self.http.get(&url).bearer_auth(&self.token).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::SessionNotFound(session_id.to_string()));
        }
        let response = self.expect_success(response, &url)?;

        let raw: Vec<serde_json::Value> = response.json()?;
        Ok(TestResults::from_raw(raw))
    }

    fn expect_success(
        &self,
        response: reqwest::blocking::Response,
        url: &str,
    ) -> Result<reqwest::blocking::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}

/// Pull the organization and workspace out of a `v1:org/workspace:key`
/// token. The key itself is only ever sent as a bearer header.
fn parse_token(token: &str) -> Result<(String, String), ClientError> {
    let parts: Vec<&str> = token.split(':').collect();
    let [version, scope, key] = parts.as_slice() else {
        return Err(ClientError::MalformedToken);
    };
    if *version != "v1" || key.is_empty() {
        return Err(ClientError::MalformedToken);
    }

    let scope_parts: Vec<&str> = scope.split('/').collect();
    match scope_parts.as_slice() {
        [org, ws] if !org.is_empty() && !ws.is_empty() => {
            Ok((org.to_string(), ws.to_string()))
        }
        _ => Err(ClientError::MalformedToken),
    }
}
