//! TPU v2 node
//!
//! Nodes are zonal; the zone fills the `locations/{l}` segment of the
//! resource name. Network endpoints and lifecycle state are computed by the
//! server and only ever flattened.

use crate::gcp::client::GcpClient;
use crate::gcp::operation;
use crate::name::NodeName;
use crate::resource::mapping::{flatten_map, flatten_string, set_omit_empty};
use crate::resource::{handle_not_found, update_mask, ReadOutcome};
use crate::state::ResourceState;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

fn node_name(client: &GcpClient, state: &ResourceState) -> Result<NodeName> {
    if let Some(id) = state.id() {
        return Ok(NodeName::parse(id, client.config.project.as_deref())?);
    }

    let name = state
        .get_str("name")
        .context("\"name\" is required for a TPU node")?;
    let zone = state
        .get_str("zone")
        .context("\"zone\" is required for a TPU node")?;
    let project = match state.get_str("project") {
        Some(p) => p.to_string(),
        None => client.config.default_project()?,
    };

    Ok(NodeName::new(&project, zone, name))
}

fn expand_network_config(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    set_omit_empty(
        &mut transformed,
        "network",
        original.get("network").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut transformed,
        "subnetwork",
        original.get("subnetwork").cloned().unwrap_or(Value::Null),
    );
    if let Some(enable) = original.get("enable_external_ips").and_then(|v| v.as_bool()) {
        transformed.insert("enableExternalIps".to_string(), json!(enable));
    }
    set_omit_empty(
        &mut transformed,
        "queueCount",
        original.get("queue_count").cloned().unwrap_or(Value::Null),
    );
    Value::Object(transformed)
}

fn flatten_network_config(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    for (state_key, wire_key) in [
        ("network", "network"),
        ("subnetwork", "subnetwork"),
        ("enable_external_ips", "enableExternalIps"),
        ("queue_count", "queueCount"),
    ] {
        if let Some(v) = original.get(wire_key) {
            transformed.insert(state_key.to_string(), v.clone());
        }
    }
    Value::Object(transformed)
}

fn expand_scheduling_config(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    if let Some(preemptible) = original.get("preemptible").and_then(|v| v.as_bool()) {
        transformed.insert("preemptible".to_string(), json!(preemptible));
    }
    if let Some(spot) = original.get("spot").and_then(|v| v.as_bool()) {
        transformed.insert("spot".to_string(), json!(spot));
    }
    Value::Object(transformed)
}

fn flatten_scheduling_config(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    for key in ["preemptible", "spot"] {
        if let Some(v) = original.get(key) {
            transformed.insert(key.to_string(), v.clone());
        }
    }
    Value::Object(transformed)
}

fn flatten_network_endpoints(value: Option<&Value>) -> Value {
    let Some(Value::Array(endpoints)) = value else {
        return Value::Null;
    };

    Value::Array(
        endpoints
            .iter()
            .map(|e| {
                json!({
                    "ip_address": e.get("ipAddress").cloned().unwrap_or(Value::Null),
                    "port": e.get("port").cloned().unwrap_or(Value::Null),
                    "access_config": e.get("accessConfig").map(|a| {
                        json!({"external_ip": a.get("externalIp").cloned().unwrap_or(Value::Null)})
                    }).unwrap_or(Value::Null),
                })
            })
            .collect(),
    )
}

fn expand(state: &ResourceState) -> Value {
    let mut obj = Map::new();

    set_omit_empty(
        &mut obj,
        "acceleratorType",
        state.get("accelerator_type").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "runtimeVersion",
        state.get("runtime_version").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "description",
        state.get("description").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "networkConfig",
        expand_network_config(state.get("network_config")),
    );
    set_omit_empty(
        &mut obj,
        "schedulingConfig",
        expand_scheduling_config(state.get("scheduling_config")),
    );
    set_omit_empty(
        &mut obj,
        "labels",
        state.get("labels").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "metadata",
        state.get("metadata").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "tags",
        state.get("tags").cloned().unwrap_or(Value::Null),
    );

    Value::Object(obj)
}

fn flatten(state: &mut ResourceState, res: &Value, name: &NodeName) {
    state.set("name", name.name.as_str());
    state.set("zone", name.location.as_str());
    state.set("project", name.project.as_str());

    state.set("accelerator_type", flatten_string(res.get("acceleratorType")));
    state.set("runtime_version", flatten_string(res.get("runtimeVersion")));
    state.set("description", flatten_string(res.get("description")));
    state.set(
        "network_config",
        flatten_network_config(res.get("networkConfig")),
    );
    state.set(
        "scheduling_config",
        flatten_scheduling_config(res.get("schedulingConfig")),
    );
    state.set("labels", flatten_map(res.get("labels")));
    state.set("metadata", flatten_map(res.get("metadata")));
    state.set("tags", res.get("tags").cloned().unwrap_or(Value::Null));
    state.set("state", flatten_string(res.get("state")));
    state.set(
        "network_endpoints",
        flatten_network_endpoints(res.get("networkEndpoints")),
    );
}

pub async fn create(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let name = node_name(client, state)?;
    let obj = expand(state);

    let url = client.tpu_url(&format!(
        "{}/nodes?nodeId={}",
        name.parent_path(),
        name.name
    ));

    tracing::debug!("creating TPU node {}: {}", name, obj);
    let op = client
        .post(&url, Some(&obj), client.timeouts().create)
        .await
        .with_context(|| format!("error creating Node {:?}", name.name))?;

    operation::wait(
        client,
        client.config.tpu_v2_base(),
        &op,
        &format!("creating Node {:?}", name.name),
        client.timeouts().create,
    )
    .await?;

    state.set_id(name.resource_path());
    match read(client, state).await? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Removed => Err(anyhow::anyhow!(
            "Node {:?} was not found after creation",
            name.name
        )),
    }
}

pub async fn read(client: &GcpClient, state: &mut ResourceState) -> Result<ReadOutcome> {
    let name = node_name(client, state)?;
    let url = client.tpu_url(&name.resource_path());

    let res = match client.get(&url, client.timeouts().read).await {
        Ok(res) => res,
        Err(err) => {
            return handle_not_found(err, state, &format!("TpuNode {:?}", name.resource_path()))
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
    let name = node_name(client, state)?;
    let obj = expand(state);

    let update_mask = update_mask(
        state,
        prior,
        &[
            ("description", "description"),
            ("labels", "labels"),
            ("metadata", "metadata"),
            ("tags", "tags"),
        ],
    );

    if update_mask.is_empty() {
        tracing::debug!("no updatable changes for Node {}", name);
        return Ok(());
    }

    let url = client.tpu_url(&format!(
        "{}?updateMask={}",
        name.resource_path(),
        update_mask.join(",")
    ));

    tracing::debug!("updating TPU node {}: {}", name, obj);
    let op = client
        .patch(&url, Some(&obj), client.timeouts().update)
        .await
        .with_context(|| format!("error updating Node {:?}", name.name))?;

    operation::wait(
        client,
        client.config.tpu_v2_base(),
        &op,
        &format!("updating Node {:?}", name.name),
        client.timeouts().update,
    )
    .await?;

    read(client, state).await?;
    Ok(())
}

pub async fn delete(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let name = node_name(client, state)?;
    let url = client.tpu_url(&name.resource_path());

    tracing::debug!("deleting TPU node {}", name);
    let op = client
        .delete(&url, client.timeouts().delete)
        .await
        .with_context(|| format!("error deleting Node {:?}", name.name))?;

    operation::wait(
        client,
        client.config.tpu_v2_base(),
        &op,
        &format!("deleting Node {:?}", name.name),
        client.timeouts().delete,
    )
    .await?;

    state.clear();
    Ok(())
}

pub async fn import_state(client: &GcpClient, id: &str) -> Result<ResourceState> {
    let name = NodeName::parse(id, client.config.project.as_deref())?;
    let mut state = ResourceState::with_id(name.resource_path().as_str());

    match read(client, &mut state).await? {
        ReadOutcome::Present => Ok(state),
        ReadOutcome::Removed => Err(anyhow::anyhow!("Node {:?} does not exist", id)),
    }
}
