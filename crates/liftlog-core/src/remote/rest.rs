//! REST adapter for the hosted data service.
//!
//! Targets a PostgREST-style interface: row filters as query parameters
//! (`?owner_id=eq.{id}`), `Prefer` headers controlling returned
//! representations, and upserts via `on_conflict` on the client key column.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::models::{RemoteExercise, RemoteProfile, RemoteRoutine, RemoteSession};

use super::{GatewayError, Identity, NewExercise, NewSession, NewSet, RemoteGateway};

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const PROFILES_TABLE: &str = "profiles";
const EXERCISES_TABLE: &str = "exercises";
const ROUTINES_TABLE: &str = "routines";
const SESSIONS_TABLE: &str = "workout_sessions";
const SETS_TABLE: &str = "session_sets";

#[derive(Debug, Deserialize)]
struct AuthUserResponse {
    id: String,
    email: Option<String>,
}

/// REST client for the remote data service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestGateway {
    client: Client,
    base_url: String,
    api_key: String,
    token: Option<String>,
    storage_bucket: String,
}

impl RestGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        storage_bucket: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            token: None,
            storage_bucket: storage_bucket.into(),
        })
    }

    /// Create a gateway with the given bearer token, sharing the connection
    /// pool with `self`.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            token: Some(token),
            ..self.clone()
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, GatewayError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&self.api_key)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?,
        );
        let bearer = self.token.as_deref().unwrap_or(&self.api_key);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?,
        );
        Ok(headers)
    }

    /// Check if a response is successful, turning failures into a typed
    /// error with a truncated body.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(GatewayError::from_status(status, &body))
        }
    }

    async fn fetch_rows<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        owner_id: &str,
    ) -> Result<Vec<T>, GatewayError> {
        let owner_filter = format!("eq.{}", owner_id);
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.auth_headers()?)
            .query(&[("select", "*"), ("owner_id", owner_filter.as_str())])
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let rows = response.json().await?;
        Ok(rows)
    }

    async fn insert_row<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.auth_headers()?)
            .query(&[("on_conflict", "client_key")])
            .header(
                "Prefer",
                "return=representation,resolution=merge-duplicates",
            )
            .json(body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let mut rows: Vec<T> = response.json().await?;
        rows.pop()
            .ok_or_else(|| GatewayError::InvalidResponse("insert returned no rows".to_string()))
    }
}

#[async_trait]
impl RemoteGateway for RestGateway {
    async fn current_identity(&self) -> Result<Option<Identity>, GatewayError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        let response = Self::check_response(response).await?;
        let user: AuthUserResponse = response.json().await?;
        Ok(Some(Identity {
            id: user.id,
            email: user.email,
        }))
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<RemoteProfile>, GatewayError> {
        let id_filter = format!("eq.{}", user_id);
        let response = self
            .client
            .get(self.table_url(PROFILES_TABLE))
            .headers(self.auth_headers()?)
            .query(&[("select", "*"), ("id", id_filter.as_str())])
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let mut rows: Vec<RemoteProfile> = response.json().await?;
        Ok(rows.pop())
    }

    async fn fetch_exercises(&self, owner_id: &str) -> Result<Vec<RemoteExercise>, GatewayError> {
        self.fetch_rows(EXERCISES_TABLE, owner_id).await
    }

    async fn fetch_routines(&self, owner_id: &str) -> Result<Vec<RemoteRoutine>, GatewayError> {
        self.fetch_rows(ROUTINES_TABLE, owner_id).await
    }

    async fn insert_exercise(
        &self,
        exercise: &NewExercise,
    ) -> Result<RemoteExercise, GatewayError> {
        debug!(name = %exercise.name, "inserting exercise");
        self.insert_row(EXERCISES_TABLE, exercise).await
    }

    async fn delete_exercise(&self, id: &str) -> Result<(), GatewayError> {
        let id_filter = format!("eq.{}", id);
        let response = self
            .client
            .delete(self.table_url(EXERCISES_TABLE))
            .headers(self.auth_headers()?)
            .query(&[("id", id_filter.as_str())])
            .send()
            .await?;
        // A delete matching zero rows still returns success, which is the
        // idempotency the deletion queue relies on.
        Self::check_response(response).await?;
        Ok(())
    }

    async fn insert_session(&self, session: &NewSession) -> Result<RemoteSession, GatewayError> {
        debug!(routine = %session.routine_name, "inserting session header");
        self.insert_row(SESSIONS_TABLE, session).await
    }

    async fn insert_set(&self, set: &NewSet) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.table_url(SETS_TABLE))
            .headers(self.auth_headers()?)
            .query(&[("on_conflict", "client_key")])
            .header("Prefer", "return=minimal,resolution=merge-duplicates")
            .json(set)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn upload_image(&self, key: &str, bytes: &[u8]) -> Result<String, GatewayError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.storage_bucket, key
        );
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;
        Self::check_response(response).await?;

        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.storage_bucket, key
        ))
    }
}
