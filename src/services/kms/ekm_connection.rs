//! Cloud KMS EKM connection
//!
//! Connects Cloud KMS to an external key manager reachable through Service
//! Directory. Service resolvers nest a list of leaf server certificates;
//! both levels map element-wise between wire and state shape. EKM
//! connections cannot be deleted server-side.

use crate::gcp::client::GcpClient;
use crate::name::EkmConnectionName;
use crate::resource::mapping::{flatten_string, set_omit_empty};
use crate::resource::{handle_not_found, update_mask, ReadOutcome};
use crate::state::ResourceState;
use anyhow::{Context, Result};
use serde_json::{Map, Value};

fn connection_name(client: &GcpClient, state: &ResourceState) -> Result<EkmConnectionName> {
    if let Some(id) = state.id() {
        return Ok(EkmConnectionName::parse(id, client.config.project.as_deref())?);
    }

    let name = state
        .get_str("name")
        .context("\"name\" is required for an EKM connection")?;
    let location = state
        .get_str("location")
        .context("\"location\" is required for an EKM connection")?;
    let project = match state.get_str("project") {
        Some(p) => p.to_string(),
        None => client.config.default_project()?,
    };

    Ok(EkmConnectionName::new(&project, location, name))
}

fn expand_server_certificate(original: &Map<String, Value>) -> Value {
    let mut transformed = Map::new();
    set_omit_empty(
        &mut transformed,
        "rawDer",
        original.get("raw_der").cloned().unwrap_or(Value::Null),
    );
    Value::Object(transformed)
}

fn expand_service_resolver(original: &Map<String, Value>) -> Value {
    let mut transformed = Map::new();
    set_omit_empty(
        &mut transformed,
        "serviceDirectoryService",
        original
            .get("service_directory_service")
            .cloned()
            .unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut transformed,
        "hostname",
        original.get("hostname").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut transformed,
        "endpointFilter",
        original.get("endpoint_filter").cloned().unwrap_or(Value::Null),
    );

    if let Some(Value::Array(certificates)) = original.get("server_certificates") {
        let expanded: Vec<Value> = certificates
            .iter()
            .filter_map(|c| c.as_object().map(expand_server_certificate))
            .collect();
        set_omit_empty(&mut transformed, "serverCertificates", Value::Array(expanded));
    }

    Value::Object(transformed)
}

fn expand_service_resolvers(value: Option<&Value>) -> Value {
    let Some(Value::Array(resolvers)) = value else {
        return Value::Null;
    };

    Value::Array(
        resolvers
            .iter()
            .filter_map(|r| r.as_object().map(expand_service_resolver))
            .collect(),
    )
}

fn flatten_server_certificate(original: &Value) -> Value {
    let mut transformed = Map::new();
    transformed.insert(
        "raw_der".to_string(),
        original.get("rawDer").cloned().unwrap_or(Value::Null),
    );
    // Parse outputs computed by the server from raw_der
    for (state_key, wire_key) in [
        ("parsed", "parsed"),
        ("issuer", "issuer"),
        ("subject", "subject"),
        ("not_before_time", "notBeforeTime"),
        ("not_after_time", "notAfterTime"),
        ("serial_number", "serialNumber"),
        ("sha256_fingerprint", "sha256Fingerprint"),
    ] {
        if let Some(v) = original.get(wire_key) {
            transformed.insert(state_key.to_string(), v.clone());
        }
    }
    Value::Object(transformed)
}

fn flatten_service_resolver(original: &Value) -> Value {
    let mut transformed = Map::new();
    transformed.insert(
        "service_directory_service".to_string(),
        original
            .get("serviceDirectoryService")
            .cloned()
            .unwrap_or(Value::Null),
    );
    transformed.insert(
        "hostname".to_string(),
        original.get("hostname").cloned().unwrap_or(Value::Null),
    );
    if let Some(filter) = original.get("endpointFilter") {
        transformed.insert("endpoint_filter".to_string(), filter.clone());
    }
    if let Some(Value::Array(certificates)) = original.get("serverCertificates") {
        transformed.insert(
            "server_certificates".to_string(),
            Value::Array(certificates.iter().map(flatten_server_certificate).collect()),
        );
    }
    Value::Object(transformed)
}

fn flatten_service_resolvers(value: Option<&Value>) -> Value {
    let Some(Value::Array(resolvers)) = value else {
        return Value::Null;
    };
    Value::Array(resolvers.iter().map(flatten_service_resolver).collect())
}

fn expand(state: &ResourceState) -> Value {
    let mut obj = Map::new();
    set_omit_empty(
        &mut obj,
        "serviceResolvers",
        expand_service_resolvers(state.get("service_resolvers")),
    );
    set_omit_empty(
        &mut obj,
        "keyManagementMode",
        state.get("key_management_mode").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "cryptoSpacePath",
        state.get("crypto_space_path").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "etag",
        state.get("etag").cloned().unwrap_or(Value::Null),
    );
    Value::Object(obj)
}

fn flatten(state: &mut ResourceState, res: &Value, name: &EkmConnectionName) {
    state.set("name", name.name.as_str());
    state.set("location", name.location.as_str());
    state.set("project", name.project.as_str());
    state.set(
        "service_resolvers",
        flatten_service_resolvers(res.get("serviceResolvers")),
    );
    state.set(
        "key_management_mode",
        flatten_string(res.get("keyManagementMode")),
    );
    state.set("crypto_space_path", flatten_string(res.get("cryptoSpacePath")));
    state.set("etag", flatten_string(res.get("etag")));
    state.set("create_time", flatten_string(res.get("createTime")));
}

pub async fn create(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let name = connection_name(client, state)?;
    let obj = expand(state);

    let url = client.kms_url(&format!(
        "{}/ekmConnections?ekmConnectionId={}",
        name.parent_path(),
        name.name
    ));

    tracing::debug!("creating EkmConnection {}: {}", name, obj);
    client
        .post(&url, Some(&obj), client.timeouts().create)
        .await
        .with_context(|| format!("error creating EkmConnection {:?}", name.name))?;

    state.set_id(name.resource_path());
    match read(client, state).await? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Removed => Err(anyhow::anyhow!(
            "EkmConnection {:?} was not found after creation",
            name.name
        )),
    }
}

pub async fn read(client: &GcpClient, state: &mut ResourceState) -> Result<ReadOutcome> {
    let name = connection_name(client, state)?;
    let url = client.kms_url(&name.resource_path());

    let res = match client.get(&url, client.timeouts().read).await {
        Ok(res) => res,
        Err(err) => {
            return handle_not_found(
                err,
                state,
                &format!("KMSEkmConnection {:?}", name.resource_path()),
            )
        }
    };

    state.set_id(name.resource_path());
    flatten(state, &res, &name);
    Ok(ReadOutcome::Present)
}

pub async fn update(
    client: &GcpClient,
    prior: &ResourceState,
    state: &mut ResourceState,
) -> Result<()> {
    let name = connection_name(client, state)?;
    let obj = expand(state);

    let update_mask = update_mask(
        state,
        prior,
        &[
            ("service_resolvers", "serviceResolvers"),
            ("key_management_mode", "keyManagementMode"),
            ("crypto_space_path", "cryptoSpacePath"),
        ],
    );

    if update_mask.is_empty() {
        tracing::debug!("no updatable changes for EkmConnection {}", name);
        return Ok(());
    }

    let url = client.kms_url(&format!(
        "{}?updateMask={}",
        name.resource_path(),
        update_mask.join(",")
    ));

    tracing::debug!("updating EkmConnection {}: {}", name, obj);
    client
        .patch(&url, Some(&obj), client.timeouts().update)
        .await
        .with_context(|| format!("error updating EkmConnection {:?}", name.name))?;

    read(client, state).await?;
    Ok(())
}

/// EKM connections cannot be deleted from GCP; state-only removal
pub async fn delete(_client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    tracing::warn!(
        "KMS EkmConnection {:?} cannot be deleted from GCP; removing from state only",
        state.id().unwrap_or("<unknown>")
    );
    state.clear();
    Ok(())
}

pub async fn import_state(client: &GcpClient, id: &str) -> Result<ResourceState> {
    let name = EkmConnectionName::parse(id, client.config.project.as_deref())?;
    let mut state = ResourceState::with_id(name.resource_path().as_str());

    match read(client, &mut state).await? {
        ReadOutcome::Present => Ok(state),
        ReadOutcome::Removed => Err(anyhow::anyhow!("EkmConnection {:?} does not exist", id)),
    }
}
