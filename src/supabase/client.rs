//! Supabase HTTP Client
//!
//! Reqwest-backed implementation of `SupabaseApi`. One client is
//! created per project and cached for the process lifetime; the API
//! key travels as both the `apikey` header and a bearer token, the
//! way PostgREST expects it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};

use crate::supabase::ProbeError;
use crate::types::SupabaseApi;

/// Upper bound for any single probe request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one Supabase project.
pub struct SupabaseHttpClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl SupabaseHttpClient {
    /// Create a client for the project at `base_url` authenticated
    /// with `api_key`.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: Client::new(),
        }
    }

    /// Issue an authenticated GET against `path` (relative to the
    /// project base URL) with the bounded request timeout.
    async fn get(&self, path: &str) -> Result<Response, ProbeError> {
        let url = format!("{}{}", self.base_url, path);

        self.http
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|source| ProbeError::Http {
                endpoint: path.to_string(),
                source,
            })
    }

    /// Like `get`, but requires a 2xx response.
    async fn get_ok(&self, path: &str) -> Result<(), ProbeError> {
        let resp = self.get(path).await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl SupabaseApi for SupabaseHttpClient {
    async fn query_table(&self, table: &str) -> Result<(), ProbeError> {
        let path = format!("/rest/v1/{}?select=*&limit=1", urlencoding::encode(table));
        self.get_ok(&path).await
    }

    async fn list_users(&self, per_page: u32) -> Result<(), ProbeError> {
        self.get_ok(&format!("/auth/v1/admin/users?per_page={per_page}"))
            .await
    }

    async fn check_session(&self) -> Result<(), ProbeError> {
        self.get_ok("/auth/v1/settings").await
    }

    async fn rest_ping(&self) -> Result<u16, ProbeError> {
        let resp = self.get("/rest/v1/").await?;
        Ok(resp.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = SupabaseHttpClient::new("https://abc.supabase.co/", "key");
        assert_eq!(client.base_url, "https://abc.supabase.co");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        // Reserved TLD, guaranteed not to resolve.
        let client = SupabaseHttpClient::new("https://nonexistent.invalid", "key");
        let err = client.rest_ping().await.unwrap_err();
        assert!(matches!(err, ProbeError::Http { .. }));
    }
}
