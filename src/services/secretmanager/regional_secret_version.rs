//! Regional secret version data source
//!
//! Read-only: resolves a version of a regional secret (`"latest"` when no
//! version is given) and fetches its payload through `:access`. The payload
//! arrives base64-encoded; `secret_data_base64` always carries it as
//! received, and `secret_data` carries the decoded text when the bytes are
//! valid UTF-8. Binary payloads stay lossless through the base64 form.

use crate::gcp::client::GcpClient;
use crate::name::SecretName;
use crate::resource::mapping::flatten_string;
use crate::resource::pager;
use crate::state::ResourceState;
use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;

/// Read one version of a regional secret into state.
///
/// `state` must carry a `secret` reference (any accepted secret name shape)
/// and may carry `version`; absent, the server-side `latest` alias is used.
pub async fn read(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let secret_ref = state
        .get_str("secret")
        .context("\"secret\" is required for a regional secret version")?;
    let secret = SecretName::parse(secret_ref, client.config.project.as_deref())?;
    let version = state.get_str("version").unwrap_or("latest").to_string();

    let version_path = format!("{}/versions/{}", secret.resource_path(), version);
    let url = client.secret_manager_url(&secret.location, &version_path);
    let res = client
        .get(&url, client.timeouts().read)
        .await
        .with_context(|| format!("error reading SecretVersion {:?}", version_path))?;

    // The metadata name carries the resolved version number even when the
    // caller asked for "latest".
    let resolved = res
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(&version_path)
        .to_string();

    state.set_id(resolved.as_str());
    state.set("secret", secret.resource_path().as_str());
    state.set("location", secret.location.as_str());
    state.set("project", secret.project.as_str());
    state.set("name", resolved.as_str());
    state.set(
        "version",
        resolved.rsplit('/').next().unwrap_or(version.as_str()),
    );
    state.set("create_time", flatten_string(res.get("createTime")));
    state.set("destroy_time", flatten_string(res.get("destroyTime")));
    let version_state = res.get("state").and_then(|v| v.as_str()).unwrap_or("");
    state.set("enabled", version_state == "ENABLED");

    let access_url = client.secret_manager_url(&secret.location, &format!("{}:access", resolved));
    let payload = client
        .get(&access_url, client.timeouts().read)
        .await
        .with_context(|| format!("error accessing SecretVersion {:?}", resolved))?;

    let encoded = payload
        .get("payload")
        .and_then(|p| p.get("data"))
        .and_then(|d| d.as_str())
        .unwrap_or("");
    flatten_payload(state, encoded)
        .with_context(|| format!("invalid payload for SecretVersion {:?}", resolved))?;

    Ok(())
}

/// Decode the `payload.data` field into state.
///
/// `secret_data_base64` is always set to the wire value; `secret_data` only
/// when the decoded bytes are UTF-8, so binary payloads are never corrupted
/// by a lossy conversion.
fn flatten_payload(state: &mut ResourceState, encoded: &str) -> Result<()> {
    let data = general_purpose::STANDARD
        .decode(encoded)
        .context("payload is not valid base64")?;

    state.set("secret_data_base64", encoded);
    match String::from_utf8(data) {
        Ok(text) => state.set("secret_data", text),
        Err(_) => {
            tracing::debug!("secret payload is not UTF-8; only secret_data_base64 is set");
            state.remove("secret_data");
        }
    }
    Ok(())
}

/// List every version of a regional secret, following pagination
pub async fn list_versions(client: &GcpClient, secret_ref: &str) -> Result<Vec<Value>> {
    let secret = SecretName::parse(secret_ref, client.config.project.as_deref())?;
    let url = client.secret_manager_url(
        &secret.location,
        &format!("{}/versions", secret.resource_path()),
    );
    pager::list_all(client, &url, "versions", &[]).await
}
