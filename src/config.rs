//! Provider Configuration
//!
//! Holds the ambient defaults (project, region, zone), per-service API base
//! paths, and per-operation timeout budgets used by the resource handlers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API base paths, overridable per service (e.g. to point at a
/// sandbox endpoint or a mock server in tests).
pub const ALLOYDB_BASE_PATH: &str = "https://alloydb.googleapis.com/v1";
pub const KMS_BASE_PATH: &str = "https://cloudkms.googleapis.com/v1";
/// Regional service: `{location}` is substituted with the secret's location.
pub const SECRET_MANAGER_REGIONAL_BASE_PATH: &str =
    "https://secretmanager.{location}.rep.googleapis.com/v1";
pub const TPU_V2_BASE_PATH: &str = "https://tpu.googleapis.com/v2";

/// Timeout budgets for the four operation classes.
///
/// Create/delete on operation-backed services (AlloyDB, TPU) routinely take
/// tens of minutes; reads are quick.
#[derive(Debug, Clone, Copy)]
pub struct OperationTimeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(4 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Default project ID applied when a resource reference omits one
    #[serde(default)]
    pub project: Option<String>,
    /// Default region (e.g. "us-central1")
    #[serde(default)]
    pub region: Option<String>,
    /// Default zone (e.g. "us-central1-a")
    #[serde(default)]
    pub zone: Option<String>,

    /// Per-service base path overrides
    #[serde(default)]
    pub alloydb_base_path: Option<String>,
    #[serde(default)]
    pub kms_base_path: Option<String>,
    #[serde(default)]
    pub secret_manager_regional_base_path: Option<String>,
    #[serde(default)]
    pub tpu_v2_base_path: Option<String>,

    /// Maximum attempts for retryable transport errors (429/5xx)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Poll interval for long-running operations
    #[serde(skip, default = "default_poll_interval")]
    pub operation_poll_interval: Duration,

    /// Timeout budgets applied per operation class
    #[serde(skip)]
    pub timeouts: OperationTimeouts,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            project: None,
            region: None,
            zone: None,
            alloydb_base_path: None,
            kms_base_path: None,
            secret_manager_regional_base_path: None,
            tpu_v2_base_path: None,
            retry_attempts: default_retry_attempts(),
            operation_poll_interval: default_poll_interval(),
            timeouts: OperationTimeouts::default(),
        }
    }
}

impl ProviderConfig {
    /// Create a config with the given default project
    pub fn with_project(project: &str) -> Self {
        Self {
            project: Some(project.to_string()),
            ..Self::default()
        }
    }

    /// Effective default project (explicit config > environment > gcloud config).
    ///
    /// Fails with a configuration error when nothing is set; short-form
    /// resource references that omit the project depend on this.
    pub fn default_project(&self) -> Result<String> {
        self.project
            .clone()
            .or_else(crate::gcp::auth::get_default_project)
            .ok_or_else(|| anyhow::anyhow!("default project must be set"))
    }

    /// Effective region (explicit config > zone-derived > environment)
    pub fn default_region(&self) -> Option<String> {
        if let Some(region) = &self.region {
            return Some(region.clone());
        }
        self.default_zone().map(|z| region_from_zone(&z))
    }

    /// Effective zone (explicit config > environment > gcloud config)
    pub fn default_zone(&self) -> Option<String> {
        self.zone
            .clone()
            .or_else(crate::gcp::auth::get_default_zone)
    }

    pub fn alloydb_base(&self) -> &str {
        self.alloydb_base_path.as_deref().unwrap_or(ALLOYDB_BASE_PATH)
    }

    pub fn kms_base(&self) -> &str {
        self.kms_base_path.as_deref().unwrap_or(KMS_BASE_PATH)
    }

    pub fn secret_manager_regional_base(&self) -> &str {
        self.secret_manager_regional_base_path
            .as_deref()
            .unwrap_or(SECRET_MANAGER_REGIONAL_BASE_PATH)
    }

    pub fn tpu_v2_base(&self) -> &str {
        self.tpu_v2_base_path.as_deref().unwrap_or(TPU_V2_BASE_PATH)
    }
}

/// Derive the region from a zone name ("us-central1-a" -> "us-central1")
pub fn region_from_zone(zone: &str) -> String {
    let parts: Vec<&str> = zone.rsplitn(2, '-').collect();
    if parts.len() == 2 {
        parts[1].to_string()
    } else {
        zone.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_zone() {
        assert_eq!(region_from_zone("us-central1-a"), "us-central1");
        assert_eq!(region_from_zone("europe-west4-b"), "europe-west4");
        assert_eq!(region_from_zone("weird"), "weird");
    }

    #[test]
    fn test_default_project_explicit() {
        let config = ProviderConfig::with_project("my-project");
        assert_eq!(config.default_project().unwrap(), "my-project");
    }

    #[test]
    fn test_base_path_overrides() {
        let mut config = ProviderConfig::default();
        assert_eq!(config.kms_base(), KMS_BASE_PATH);
        config.kms_base_path = Some("http://localhost:1234/v1".to_string());
        assert_eq!(config.kms_base(), "http://localhost:1234/v1");
    }

    #[test]
    fn test_region_falls_back_to_zone() {
        let config = ProviderConfig {
            zone: Some("us-east1-b".to_string()),
            ..ProviderConfig::default()
        };
        assert_eq!(config.default_region().as_deref(), Some("us-east1"));
    }
}
