//! TPU placement lookups
//!
//! Accelerator types and runtime versions vary by zone; both lists are
//! paginated.

use crate::gcp::client::GcpClient;
use crate::resource::pager;
use anyhow::Result;
use serde_json::Value;

/// List the accelerator types available in a zone
pub async fn list_accelerator_types(
    client: &GcpClient,
    project: &str,
    zone: &str,
) -> Result<Vec<Value>> {
    let url = client.tpu_url(&format!(
        "projects/{}/locations/{}/acceleratorTypes",
        project, zone
    ));
    pager::list_all(client, &url, "acceleratorTypes", &[]).await
}

/// List the TPU runtime versions available in a zone
pub async fn list_runtime_versions(
    client: &GcpClient,
    project: &str,
    zone: &str,
) -> Result<Vec<Value>> {
    let url = client.tpu_url(&format!(
        "projects/{}/locations/{}/runtimeVersions",
        project, zone
    ));
    pager::list_all(client, &url, "runtimeVersions", &[]).await
}
