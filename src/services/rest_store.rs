//! Remote store over the hosted backend's REST interface.
//!
//! Talks to a PostgREST-style `/rest/v1/bookmarks` endpoint with the project
//! API key and the signed-in user's bearer token. Change subscriptions go
//! through the backend's realtime websocket.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::json;
use zeroize::Zeroizing;

use crate::services::realtime_client::RealtimeClient;
use crate::services::remote_store::{RemoteStore, Subscription};
use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::StoreError;
use crate::types::settings::{BackendSettings, RealtimeSettings};

const BOOKMARKS_PATH: &str = "/rest/v1/bookmarks";

/// HTTP client for the hosted bookmarks table.
pub struct RestStore {
    client: Client,
    endpoint: String,
    anon_key: String,
    access_token: Zeroizing<String>,
    realtime: RealtimeClient,
}

impl RestStore {
    pub fn new(
        backend: &BackendSettings,
        realtime: &RealtimeSettings,
        access_token: &str,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("smartmarks/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: bookmarks_endpoint(&backend.url),
            anon_key: backend.anon_key.clone(),
            access_token: Zeroizing::new(access_token.to_string()),
            realtime: RealtimeClient::new(backend, realtime, access_token)?,
        })
    }

    pub fn realtime(&self) -> &RealtimeClient {
        &self.realtime
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(self.access_token.as_str())
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        check_status(response)
    }
}

/// `{base}/rest/v1/bookmarks`, tolerating a trailing slash on the base URL.
pub fn bookmarks_endpoint(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), BOOKMARKS_PATH)
}

/// Maps a non-success response to the matching store error.
fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().unwrap_or_default();
    Err(status_error(status, message))
}

pub fn status_error(status: StatusCode, message: String) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(message),
        _ => StoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

/// Decodes a PostgREST row array.
pub fn decode_rows(body: &str) -> Result<Vec<Bookmark>, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))
}

impl RemoteStore for RestStore {
    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        let owner = format!("eq.{}", user_id);
        let request = self.client.get(&self.endpoint).query(&[
            ("select", "*"),
            ("user_id", owner.as_str()),
            ("order", "created_at.desc"),
        ]);
        let body = self
            .send(request)?
            .text()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        decode_rows(&body)
    }

    fn insert_bookmark(&self, new: &NewBookmark) -> Result<Bookmark, StoreError> {
        let request = self
            .client
            .post(&self.endpoint)
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": new.user_id,
                "title": new.title,
                "url": new.url,
            }));
        let body = self
            .send(request)?
            .text()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        decode_rows(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no rows".to_string()))
    }

    fn delete_bookmark(&self, id: &str) -> Result<(), StoreError> {
        let filter = format!("eq.{}", id);
        let request = self.client.delete(&self.endpoint).query(&[("id", filter.as_str())]);
        self.send(request)?;
        Ok(())
    }

    fn subscribe_changes(&self, user_id: &str) -> Result<Subscription, StoreError> {
        self.realtime.subscribe(user_id)
    }
}
