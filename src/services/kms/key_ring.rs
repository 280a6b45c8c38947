//! Cloud KMS key ring
//!
//! Key rings hold crypto keys and cannot be deleted once created; delete is
//! therefore state-only.

use crate::gcp::client::GcpClient;
use crate::name::KeyRingName;
use crate::resource::{handle_not_found, ReadOutcome};
use crate::state::ResourceState;
use anyhow::{Context, Result};
use serde_json::json;

/// Resolve the key ring name from state (id when set, attributes otherwise)
fn ring_name(client: &GcpClient, state: &ResourceState) -> Result<KeyRingName> {
    if let Some(id) = state.id() {
        return Ok(KeyRingName::parse(id, client.config.project.as_deref())?);
    }

    let name = state
        .get_str("name")
        .context("\"name\" is required for a key ring")?;
    let location = state
        .get_str("location")
        .context("\"location\" is required for a key ring")?;
    let project = match state.get_str("project") {
        Some(p) => p.to_string(),
        None => client.config.default_project()?,
    };

    Ok(KeyRingName::new(&project, location, name))
}

pub async fn create(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let ring = ring_name(client, state)?;

    let url = client.kms_url(&format!(
        "{}/keyRings?keyRingId={}",
        ring.parent_path(),
        ring.name
    ));

    tracing::debug!("creating KeyRing {}", ring);
    client
        .post(&url, Some(&json!({})), client.timeouts().create)
        .await
        .with_context(|| format!("error creating KeyRing {:?}", ring.name))?;

    state.set_id(ring.resource_path());
    match read(client, state).await? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Removed => Err(anyhow::anyhow!(
            "KeyRing {:?} was not found after creation",
            ring.name
        )),
    }
}

pub async fn read(client: &GcpClient, state: &mut ResourceState) -> Result<ReadOutcome> {
    let ring = ring_name(client, state)?;
    let url = client.kms_url(&ring.resource_path());

    let res = match client.get(&url, client.timeouts().read).await {
        Ok(res) => res,
        Err(err) => {
            return handle_not_found(err, state, &format!("KmsKeyRing {:?}", ring.resource_path()))
        }
    };

    state.set_id(ring.resource_path());
    state.set("project", ring.project.as_str());
    state.set("location", ring.location.as_str());
    state.set("name", ring.name.as_str());
    state.set(
        "create_time",
        crate::resource::mapping::flatten_string(res.get("createTime")),
    );

    Ok(ReadOutcome::Present)
}

/// Key rings cannot be deleted from GCP; the ring is only removed from state
/// and remains present on the server.
pub async fn delete(_client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    tracing::warn!(
        "KMS KeyRing {:?} cannot be deleted from GCP; removing from state only",
        state.id().unwrap_or("<unknown>")
    );
    state.clear();
    Ok(())
}

pub async fn import_state(client: &GcpClient, id: &str) -> Result<ResourceState> {
    let ring = KeyRingName::parse(id, client.config.project.as_deref())?;
    let mut state = ResourceState::with_id(ring.resource_path().as_str());

    match read(client, &mut state).await? {
        ReadOutcome::Present => Ok(state),
        ReadOutcome::Removed => Err(anyhow::anyhow!("KeyRing {:?} does not exist", id)),
    }
}
