//! AlloyDB instance
//!
//! Instances live under a cluster. A SECONDARY (read pool replica of a
//! secondary cluster) instance is created through `instances:createsecondary`
//! instead of the plain collection POST.

use crate::gcp::client::GcpClient;
use crate::gcp::operation;
use crate::name::{ClusterName, InstanceName};
use crate::resource::mapping::{flatten_map, flatten_string, set_omit_empty};
use crate::resource::{handle_not_found, update_mask, ReadOutcome};
use crate::state::ResourceState;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

fn instance_name(client: &GcpClient, state: &ResourceState) -> Result<InstanceName> {
    if let Some(id) = state.id() {
        return Ok(InstanceName::parse(id, client.config.project.as_deref())?);
    }

    let instance_id = state
        .get_str("instance_id")
        .context("\"instance_id\" is required for an AlloyDB instance")?;
    let cluster_ref = state
        .get_str("cluster")
        .context("\"cluster\" is required for an AlloyDB instance")?;
    let cluster = ClusterName::parse(cluster_ref, client.config.project.as_deref())?;

    Ok(InstanceName {
        name: instance_id.to_string(),
        cluster,
    })
}

fn expand(state: &ResourceState) -> Value {
    let mut obj = Map::new();

    if let Some(instance_type) = state.get_str("instance_type") {
        obj.insert("instanceType".to_string(), json!(instance_type));
    }
    set_omit_empty(
        &mut obj,
        "displayName",
        state.get("display_name").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "availabilityType",
        state.get("availability_type").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "databaseFlags",
        state.get("database_flags").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "labels",
        state.get("labels").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "annotations",
        state.get("annotations").cloned().unwrap_or(Value::Null),
    );

    if let Some(Value::Object(machine)) = state.get("machine_config") {
        let mut out = Map::new();
        set_omit_empty(
            &mut out,
            "cpuCount",
            machine.get("cpu_count").cloned().unwrap_or(Value::Null),
        );
        set_omit_empty(&mut obj, "machineConfig", Value::Object(out));
    }

    Value::Object(obj)
}

fn flatten(state: &mut ResourceState, res: &Value, name: &InstanceName) {
    state.set("instance_id", name.name.as_str());
    state.set("cluster", name.cluster.resource_path().as_str());

    state.set("name", flatten_string(res.get("name")));
    state.set("uid", flatten_string(res.get("uid")));
    state.set("state", flatten_string(res.get("state")));
    state.set("instance_type", flatten_string(res.get("instanceType")));
    state.set("display_name", flatten_string(res.get("displayName")));
    state.set("availability_type", flatten_string(res.get("availabilityType")));
    state.set("database_flags", flatten_map(res.get("databaseFlags")));
    state.set("labels", flatten_map(res.get("labels")));
    state.set("annotations", flatten_map(res.get("annotations")));
    state.set("ip_address", flatten_string(res.get("ipAddress")));
    if let Some(machine) = res.get("machineConfig") {
        state.set(
            "machine_config",
            json!({"cpu_count": machine.get("cpuCount").cloned().unwrap_or(Value::Null)}),
        );
    }
}

pub async fn create(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let name = instance_name(client, state)?;
    let obj = expand(state);

    let verb = if state.get_str("instance_type") == Some("SECONDARY") {
        "instances:createsecondary?instanceId="
    } else {
        "instances?instanceId="
    };
    let url = client.alloydb_url(&format!(
        "{}/{}{}",
        name.cluster.resource_path(),
        verb,
        name.name
    ));

    tracing::debug!("creating AlloyDB instance {}: {}", name, obj);
    let op = client
        .post(&url, Some(&obj), client.timeouts().create)
        .await
        .with_context(|| format!("error creating Instance {:?}", name.name))?;

    operation::wait(
        client,
        client.config.alloydb_base(),
        &op,
        &format!("creating Instance {:?}", name.name),
        client.timeouts().create,
    )
    .await?;

    state.set_id(name.resource_path());
    match read(client, state).await? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Removed => Err(anyhow::anyhow!(
            "Instance {:?} was not found after creation",
            name.name
        )),
    }
}

pub async fn read(client: &GcpClient, state: &mut ResourceState) -> Result<ReadOutcome> {
    let name = instance_name(client, state)?;
    let url = client.alloydb_url(&name.resource_path());

    let res = match client.get(&url, client.timeouts().read).await {
        Ok(res) => res,
        Err(err) => {
            return handle_not_found(
                err,
                state,
                &format!("AlloydbInstance {:?}", name.resource_path()),
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
    let name = instance_name(client, state)?;
    let obj = expand(state);

    let update_mask = update_mask(
        state,
        prior,
        &[
            ("display_name", "displayName"),
            ("availability_type", "availabilityType"),
            ("database_flags", "databaseFlags"),
            ("labels", "labels"),
            ("annotations", "annotations"),
            ("machine_config", "machineConfig"),
        ],
    );

    if update_mask.is_empty() {
        tracing::debug!("no updatable changes for Instance {}", name);
        return Ok(());
    }

    let url = client.alloydb_url(&format!(
        "{}?updateMask={}",
        name.resource_path(),
        update_mask.join(",")
    ));

    tracing::debug!("updating AlloyDB instance {}: {}", name, obj);
    let op = client
        .patch(&url, Some(&obj), client.timeouts().update)
        .await
        .with_context(|| format!("error updating Instance {:?}", name.name))?;

    operation::wait(
        client,
        client.config.alloydb_base(),
        &op,
        &format!("updating Instance {:?}", name.name),
        client.timeouts().update,
    )
    .await?;

    read(client, state).await?;
    Ok(())
}

pub async fn delete(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let name = instance_name(client, state)?;
    let url = client.alloydb_url(&name.resource_path());

    tracing::debug!("deleting AlloyDB instance {}", name);
    let op = client
        .delete(&url, client.timeouts().delete)
        .await
        .with_context(|| format!("error deleting Instance {:?}", name.name))?;

    operation::wait(
        client,
        client.config.alloydb_base(),
        &op,
        &format!("deleting Instance {:?}", name.name),
        client.timeouts().delete,
    )
    .await?;

    state.clear();
    Ok(())
}

pub async fn import_state(client: &GcpClient, id: &str) -> Result<ResourceState> {
    let name = InstanceName::parse(id, client.config.project.as_deref())?;
    let mut state = ResourceState::with_id(name.resource_path().as_str());

    match read(client, &mut state).await? {
        ReadOutcome::Present => Ok(state),
        ReadOutcome::Removed => Err(anyhow::anyhow!("Instance {:?} does not exist", id)),
    }
}
