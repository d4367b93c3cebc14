//! Supabase PostgREST client.
//!
//! Provides authenticated HTTP access to the hosted store's REST surface,
//! used for the order tables, the customer/address directory, the store
//! directory, and the translation tables.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{PosError, Result};
use crate::storage;

/// Default timeout for REST requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the Supabase project URL:
/// - strip trailing slashes
/// - strip a trailing `/rest/v1` segment (operators paste the REST root a lot)
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_supabase_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    if url.ends_with("/rest/v1") {
        url.truncate(url.len() - "/rest/v1".len());
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Connection-string decoding
// ---------------------------------------------------------------------------

fn decode_connection_string_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<Value>(trimmed).ok();
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('{') {
        return serde_json::from_str::<Value>(&compact).ok();
    }
    if compact.len() < 20 {
        return None;
    }

    let base64 = compact.replace('-', "+").replace('_', "/");
    let padded = format!(
        "{}{}",
        base64,
        "=".repeat((4usize.wrapping_sub(base64.len() % 4)) % 4)
    );
    let decoded = BASE64_STANDARD.decode(padded).ok()?;
    serde_json::from_slice::<Value>(&decoded).ok()
}

pub fn extract_key_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("key")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

pub fn extract_url_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("url")
                .and_then(Value::as_str)
                .map(normalize_supabase_url)
        })
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach the hosted store at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid Supabase URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Anon key is invalid or expired".to_string(),
        403 => "Request rejected by row-level security".to_string(),
        404 => "Table or endpoint not found".to_string(),
        s if s >= 500 => format!("Hosted store server error (HTTP {s})"),
        s => format!("Unexpected response from hosted store (HTTP {s})"),
    }
}

/// PostgREST error bodies carry `message` plus optional `details`/`hint`;
/// preserve them so sync failures stay diagnosable.
fn response_error_detail(status: StatusCode, body_text: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body_text) {
        let message = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .unwrap_or_else(|| status_error(status));
        let details = json.get("details").or_else(|| json.get("hint")).cloned();
        if let Some(details) = details.filter(|d| !d.is_null()) {
            format!("{message} (HTTP {}): {}", status.as_u16(), details)
        } else {
            format!("{message} (HTTP {})", status.as_u16())
        }
    } else if !body_text.trim().is_empty() {
        format!(
            "{} (HTTP {}): {}",
            status_error(status),
            status.as_u16(),
            body_text.trim()
        )
    } else {
        format!("{} (HTTP {})", status_error(status), status.as_u16())
    }
}

/// Total-row count from a `Content-Range` header like `0-24/3573` or `*/0`.
fn parse_content_range_total(value: &str) -> Option<i64> {
    value.rsplit('/').next()?.trim().parse::<i64>().ok()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated PostgREST client for one Supabase project.
#[derive(Clone)]
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    http: Client,
}

impl SupabaseClient {
    pub fn new(url: &str, anon_key: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| PosError::config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: normalize_supabase_url(url),
            anon_key: anon_key.trim().to_string(),
            http,
        })
    }

    /// Build a client from the stored terminal credentials.
    pub fn from_storage() -> Result<Self> {
        let (url, key) = storage::supabase_config()?;
        Self::new(&url, &key)
    }

    fn rest_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rest/v1/{table}", self.base_url))
            .map_err(|e| PosError::config(format!("Invalid Supabase URL: {e}")))?;
        {
            let mut qp = url.query_pairs_mut();
            for (k, v) in params {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .header("Content-Type", "application/json")
    }

    async fn decode_rows(&self, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(PosError::remote(response_error_detail(status, &body_text)));
        }
        let body_text = resp.text().await.unwrap_or_default();
        if body_text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text)
            .map_err(|e| PosError::remote(format!("Invalid JSON from hosted store: {e}")))
    }

    /// `GET /rest/v1/{table}` with PostgREST filter params. Returns the row
    /// array as JSON.
    pub async fn select(&self, table: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self.rest_url(table, params)?;
        debug!(table, url = %url, "supabase select");
        let resp = self
            .authed(self.http.get(url))
            .send()
            .await
            .map_err(|e| PosError::remote(friendly_error(&self.base_url, &e)))?;
        self.decode_rows(resp).await
    }

    /// `maybeSingle` equivalent: first matching row, or `None`.
    pub async fn select_one(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Option<Value>> {
        let mut params = params.to_vec();
        params.push(("limit", "1".to_string()));
        let rows = self.select(table, &params).await?;
        Ok(rows
            .as_array()
            .and_then(|arr| arr.first())
            .cloned())
    }

    /// `POST /rest/v1/{table}` with `Prefer: return=representation`.
    /// `body` may be a single object or an array of rows.
    pub async fn insert(&self, table: &str, body: &Value) -> Result<Value> {
        let url = self.rest_url(table, &[])?;
        debug!(table, "supabase insert");
        let resp = self
            .authed(self.http.post(url))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| PosError::remote(friendly_error(&self.base_url, &e)))?;
        self.decode_rows(resp).await
    }

    /// `PATCH /rest/v1/{table}?{filters}`. Returns the updated rows so the
    /// caller can tell whether anything matched.
    pub async fn update(
        &self,
        table: &str,
        params: &[(&str, String)],
        body: &Value,
    ) -> Result<Value> {
        let url = self.rest_url(table, params)?;
        debug!(table, "supabase update");
        let resp = self
            .authed(self.http.patch(url))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| PosError::remote(friendly_error(&self.base_url, &e)))?;
        self.decode_rows(resp).await
    }

    /// `DELETE /rest/v1/{table}?{filters}`.
    pub async fn delete(&self, table: &str, params: &[(&str, String)]) -> Result<()> {
        let url = self.rest_url(table, params)?;
        debug!(table, "supabase delete");
        let resp = self
            .authed(self.http.delete(url))
            .send()
            .await
            .map_err(|e| PosError::remote(friendly_error(&self.base_url, &e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(PosError::remote(response_error_detail(status, &body_text)));
        }
        Ok(())
    }

    /// Exact row count via a HEAD request with `Prefer: count=exact`.
    pub async fn count(&self, table: &str, params: &[(&str, String)]) -> Result<i64> {
        let url = self.rest_url(table, params)?;
        let resp = self
            .authed(self.http.head(url))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| PosError::remote(friendly_error(&self.base_url, &e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PosError::remote(status_error(status)));
        }
        resp.headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| PosError::remote("Hosted store did not report a row count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_adds_scheme_and_strips_rest_suffix() {
        assert_eq!(
            normalize_supabase_url("abc.supabase.co"),
            "https://abc.supabase.co"
        );
        assert_eq!(
            normalize_supabase_url("https://abc.supabase.co/rest/v1/"),
            "https://abc.supabase.co"
        );
        assert_eq!(
            normalize_supabase_url("localhost:54321//"),
            "http://localhost:54321"
        );
    }

    #[test]
    fn connection_string_round_trips_through_base64() {
        let payload = serde_json::json!({
            "url": "abc.supabase.co",
            "key": "anon-key-value"
        });
        let encoded = BASE64_STANDARD.encode(payload.to_string());
        assert_eq!(
            extract_key_from_connection_string(&encoded).as_deref(),
            Some("anon-key-value")
        );
        assert_eq!(
            extract_url_from_connection_string(&encoded).as_deref(),
            Some("https://abc.supabase.co")
        );
    }

    #[test]
    fn connection_string_accepts_raw_json() {
        let raw = r#"{ "url": "https://abc.supabase.co", "key": "k-123456789" }"#;
        assert_eq!(
            extract_key_from_connection_string(raw).as_deref(),
            Some("k-123456789")
        );
    }

    #[test]
    fn short_garbage_is_not_a_connection_string() {
        assert_eq!(extract_key_from_connection_string("anon-key"), None);
    }

    #[test]
    fn content_range_total_parses_both_shapes() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn response_error_detail_prefers_postgrest_message() {
        let detail = response_error_detail(
            StatusCode::CONFLICT,
            r#"{"message":"duplicate key value violates unique constraint","details":"Key (id) already exists."}"#,
        );
        assert!(detail.contains("duplicate key value"));
        assert!(detail.contains("409"));
    }
}
