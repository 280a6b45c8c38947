//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication,
//! HTTP functionality, and the provider configuration.

use super::auth::GcpCredentials;
use super::http::HttpClient;
use crate::config::{OperationTimeouts, ProviderConfig};
use anyhow::{Context, Result};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub config: ProviderConfig,
    pub credentials: GcpCredentials,
    pub http: HttpClient,
}

impl GcpClient {
    /// Create a new GCP client using Application Default Credentials
    pub async fn new(config: ProviderConfig) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Self::with_credentials(config, credentials)
    }

    /// Create a client around explicit credentials (tests use a static token)
    pub fn with_credentials(config: ProviderConfig, credentials: GcpCredentials) -> Result<Self> {
        let http = HttpClient::new(config.retry_attempts).context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            credentials,
            http,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// Per-operation timeout budgets from the provider configuration
    pub fn timeouts(&self) -> &OperationTimeouts {
        &self.config.timeouts
    }

    /// Issue a request with the given verb, optional JSON body, and timeout
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let token = self.get_token().await?;
        self.http
            .request(method, url, &token, body, timeout)
            .await
            .map_err(anyhow::Error::from)
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<Value> {
        self.send(Method::GET, url, None, timeout).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>, timeout: Duration) -> Result<Value> {
        self.send(Method::POST, url, body, timeout).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch(&self, url: &str, body: Option<&Value>, timeout: Duration) -> Result<Value> {
        self.send(Method::PATCH, url, body, timeout).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str, timeout: Duration) -> Result<Value> {
        self.send(Method::DELETE, url, None, timeout).await
    }

    // =========================================================================
    // Service URL helpers
    // =========================================================================

    /// Build an AlloyDB API URL
    pub fn alloydb_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.alloydb_base(), path)
    }

    /// Build a Cloud KMS API URL
    pub fn kms_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.kms_base(), path)
    }

    /// Build a regional Secret Manager API URL.
    ///
    /// The default base path carries a `{location}` placeholder for the
    /// regional endpoints; overrides without the placeholder (mock servers)
    /// are used verbatim.
    pub fn secret_manager_url(&self, location: &str, path: &str) -> String {
        let base = self
            .config
            .secret_manager_regional_base()
            .replace("{location}", location);
        format!("{}/{}", base, path)
    }

    /// Build a TPU v2 API URL
    pub fn tpu_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.tpu_v2_base(), path)
    }
}
