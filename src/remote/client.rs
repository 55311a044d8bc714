use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::config::settings::BackendConfig;
use crate::error::{DeskError, DeskResult};
use crate::models::Session;
use crate::upload::SelectedFile;

const MISSING_ENV: &str = "Supabase environment variables are missing";

/// Header that scopes function reads to one tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Identity, storage and function endpoints of the hosted backend.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> DeskResult<Session>;

    async fn sign_up(&self, email: &str, password: &str, tenant_name: &str)
        -> DeskResult<Session>;

    /// Stores `file` at `bucket/key` and returns that path.
    async fn upload_document(
        &self,
        bucket: &str,
        key: &str,
        file: &SelectedFile,
        token: &str,
    ) -> DeskResult<String>;

    async fn call_function(
        &self,
        name: &str,
        payload: serde_json::Value,
        token: &str,
    ) -> DeskResult<serde_json::Value>;

    /// GETs `{name}/{id}` from the functions endpoint on behalf of `tenant_id`.
    async fn fetch_from_function(
        &self,
        name: &str,
        id: &str,
        tenant_id: &str,
        token: &str,
    ) -> DeskResult<serde_json::Value>;
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: Option<String>,
    anon_key: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: Option<String>, anon_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            anon_key,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.resolved_url(), config.resolved_anon_key())
    }

    fn credentials(&self) -> DeskResult<(&str, &str)> {
        match (self.base_url.as_deref(), self.anon_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Ok((url, key)),
            _ => Err(DeskError::config(MISSING_ENV)),
        }
    }

    async fn auth_request(&self, path: &str, body: serde_json::Value) -> DeskResult<Session> {
        let (base, key) = self.credentials()?;
        let response = self
            .http
            .post(format!("{}{}", base, path))
            .header("apikey", key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, "").await?;
        let text = response.text().await?;
        let session: Session = serde_json::from_str(&text)
            .map_err(|e| DeskError::parse(format!("Malformed auth response: {}", e)))?;
        if !session.is_valid() {
            return Err(DeskError::parse("Auth response did not include an access token"));
        }
        Ok(session)
    }
}

/// `base` joined with `segments`, each one percent-encoded.
fn endpoint_url<'a>(
    base: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> DeskResult<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| DeskError::config(format!("Invalid Supabase URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| DeskError::config(format!("Invalid Supabase URL {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `{base}/storage/v1/object/{bucket}/{key}`. Names containing `#`, `?` or
/// spaces keep their full key.
fn object_url(base: &str, bucket: &str, key: &str) -> DeskResult<reqwest::Url> {
    endpoint_url(
        base,
        ["storage", "v1", "object", bucket]
            .into_iter()
            .chain(key.split('/')),
    )
}

async fn parse_json(response: reqwest::Response, source: &str) -> DeskResult<serde_json::Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| DeskError::parse(format!("Malformed response from {}: {}", source, e)))
}

/// Turns a non-2xx response into `DeskError::Http`, keeping the body as the message.
async fn ensure_success(response: reqwest::Response, prefix: &str) -> DeskResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body = if body.trim().is_empty() || prefix.is_empty() {
        body
    } else {
        format!("{}{}", prefix, body)
    };
    Err(DeskError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RemoteClient for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> DeskResult<Session> {
        tracing::debug!(email, "password grant");
        let body = serde_json::to_value(Credentials { email, password })?;
        self.auth_request("/auth/v1/token?grant_type=password", body)
            .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        tenant_name: &str,
    ) -> DeskResult<Session> {
        tracing::debug!(email, tenant_name, "sign up");
        let body = json!({
            "email": email,
            "password": password,
            "data": { "tenant_name": tenant_name },
        });
        self.auth_request("/auth/v1/signup", body).await
    }

    async fn upload_document(
        &self,
        bucket: &str,
        key: &str,
        file: &SelectedFile,
        token: &str,
    ) -> DeskResult<String> {
        let (base, api_key) = self.credentials()?;
        let url = object_url(base, bucket, key)?;
        tracing::debug!(bucket, key, bytes = file.size(), "uploading object");

        let response = self
            .http
            .put(url)
            .header("apikey", api_key)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, file.mime())
            .body(file.bytes().to_vec())
            .send()
            .await?;
        ensure_success(response, "Upload failed: ").await?;

        Ok(format!("{}/{}", bucket, key))
    }

    async fn call_function(
        &self,
        name: &str,
        payload: serde_json::Value,
        token: &str,
    ) -> DeskResult<serde_json::Value> {
        let (base, api_key) = self.credentials()?;
        tracing::debug!(function = name, "calling function");

        let response = self
            .http
            .post(format!("{}/functions/v1/{}", base, name))
            .header("apikey", api_key)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        let response = ensure_success(response, "").await?;
        parse_json(response, name).await
    }

    async fn fetch_from_function(
        &self,
        name: &str,
        id: &str,
        tenant_id: &str,
        token: &str,
    ) -> DeskResult<serde_json::Value> {
        let (base, api_key) = self.credentials()?;
        let url = endpoint_url(base, ["functions", "v1", name, id])?;
        tracing::debug!(function = name, id, tenant = tenant_id, "fetching from function");

        let response = self
            .http
            .get(url)
            .header("apikey", api_key)
            .bearer_auth(token)
            .header(TENANT_HEADER, tenant_id)
            .send()
            .await?;
        let response = ensure_success(response, "").await?;
        parse_json(response, name).await
    }
}
