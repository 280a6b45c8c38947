//! Regional secret
//!
//! Unlike global secrets there is no replication block; the location is part
//! of the resource name and selects the regional endpoint.

use crate::gcp::client::GcpClient;
use crate::name::SecretName;
use crate::resource::mapping::{flatten_map, flatten_string, set_omit_empty};
use crate::resource::{handle_not_found, update_mask, ReadOutcome};
use crate::state::ResourceState;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

fn secret_name(client: &GcpClient, state: &ResourceState) -> Result<SecretName> {
    if let Some(id) = state.id() {
        return Ok(SecretName::parse(id, client.config.project.as_deref())?);
    }

    let secret_id = state
        .get_str("secret_id")
        .context("\"secret_id\" is required for a regional secret")?;
    let location = state
        .get_str("location")
        .context("\"location\" is required for a regional secret")?;
    let project = match state.get_str("project") {
        Some(p) => p.to_string(),
        None => client.config.default_project()?,
    };

    Ok(SecretName::new(&project, location, secret_id))
}

fn expand_rotation(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    set_omit_empty(
        &mut transformed,
        "nextRotationTime",
        original
            .get("next_rotation_time")
            .cloned()
            .unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut transformed,
        "rotationPeriod",
        original
            .get("rotation_period")
            .cloned()
            .unwrap_or(Value::Null),
    );
    Value::Object(transformed)
}

fn flatten_rotation(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    if let Some(next) = original.get("nextRotationTime") {
        transformed.insert("next_rotation_time".to_string(), next.clone());
    }
    if let Some(period) = original.get("rotationPeriod") {
        transformed.insert("rotation_period".to_string(), period.clone());
    }
    Value::Object(transformed)
}

fn expand_topics(value: Option<&Value>) -> Value {
    let Some(Value::Array(topics)) = value else {
        return Value::Null;
    };
    Value::Array(
        topics
            .iter()
            .map(|t| json!({"name": t.get("name").cloned().unwrap_or(Value::Null)}))
            .collect(),
    )
}

fn flatten_topics(value: Option<&Value>) -> Value {
    let Some(Value::Array(topics)) = value else {
        return Value::Null;
    };
    Value::Array(
        topics
            .iter()
            .map(|t| json!({"name": t.get("name").cloned().unwrap_or(Value::Null)}))
            .collect(),
    )
}

fn expand(state: &ResourceState) -> Value {
    let mut obj = Map::new();

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
    set_omit_empty(&mut obj, "topics", expand_topics(state.get("topics")));
    set_omit_empty(&mut obj, "rotation", expand_rotation(state.get("rotation")));
    set_omit_empty(
        &mut obj,
        "versionDestroyTtl",
        state.get("version_destroy_ttl").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "expireTime",
        state.get("expire_time").cloned().unwrap_or(Value::Null),
    );

    if let Some(Value::Object(encryption)) = state.get("customer_managed_encryption") {
        let mut out = Map::new();
        set_omit_empty(
            &mut out,
            "kmsKeyName",
            encryption.get("kms_key_name").cloned().unwrap_or(Value::Null),
        );
        set_omit_empty(&mut obj, "customerManagedEncryption", Value::Object(out));
    }

    Value::Object(obj)
}

fn flatten(state: &mut ResourceState, res: &Value, name: &SecretName) {
    state.set("secret_id", name.name.as_str());
    state.set("location", name.location.as_str());
    state.set("project", name.project.as_str());

    state.set("name", flatten_string(res.get("name")));
    state.set("labels", flatten_map(res.get("labels")));
    state.set("annotations", flatten_map(res.get("annotations")));
    state.set("topics", flatten_topics(res.get("topics")));
    state.set("rotation", flatten_rotation(res.get("rotation")));
    state.set("version_destroy_ttl", flatten_string(res.get("versionDestroyTtl")));
    state.set("expire_time", flatten_string(res.get("expireTime")));
    state.set("create_time", flatten_string(res.get("createTime")));
    if let Some(encryption) = res.get("customerManagedEncryption") {
        state.set(
            "customer_managed_encryption",
            json!({
                "kms_key_name": encryption.get("kmsKeyName").cloned().unwrap_or(Value::Null)
            }),
        );
    }
}

pub async fn create(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let name = secret_name(client, state)?;
    let obj = expand(state);

    let url = client.secret_manager_url(
        &name.location,
        &format!("{}/secrets?secretId={}", name.parent_path(), name.name),
    );

    tracing::debug!("creating regional Secret {}: {}", name, obj);
    client
        .post(&url, Some(&obj), client.timeouts().create)
        .await
        .with_context(|| format!("error creating Secret {:?}", name.name))?;

    state.set_id(name.resource_path());
    match read(client, state).await? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Removed => Err(anyhow::anyhow!(
            "Secret {:?} was not found after creation",
            name.name
        )),
    }
}

pub async fn read(client: &GcpClient, state: &mut ResourceState) -> Result<ReadOutcome> {
    let name = secret_name(client, state)?;
    let url = client.secret_manager_url(&name.location, &name.resource_path());

    let res = match client.get(&url, client.timeouts().read).await {
        Ok(res) => res,
        Err(err) => {
            return handle_not_found(
                err,
                state,
                &format!("SecretManagerRegionalSecret {:?}", name.resource_path()),
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
    let name = secret_name(client, state)?;
    let obj = expand(state);

    let update_mask = update_mask(
        state,
        prior,
        &[
            ("labels", "labels"),
            ("annotations", "annotations"),
            ("topics", "topics"),
            ("rotation", "rotation"),
            ("version_destroy_ttl", "versionDestroyTtl"),
            ("expire_time", "expireTime"),
            ("customer_managed_encryption", "customerManagedEncryption"),
        ],
    );

    if update_mask.is_empty() {
        tracing::debug!("no updatable changes for Secret {}", name);
        return Ok(());
    }

    let url = client.secret_manager_url(
        &name.location,
        &format!("{}?updateMask={}", name.resource_path(), update_mask.join(",")),
    );

    tracing::debug!("updating regional Secret {}: {}", name, obj);
    client
        .patch(&url, Some(&obj), client.timeouts().update)
        .await
        .with_context(|| format!("error updating Secret {:?}", name.name))?;

    read(client, state).await?;
    Ok(())
}

pub async fn delete(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let name = secret_name(client, state)?;
    let url = client.secret_manager_url(&name.location, &name.resource_path());

    tracing::debug!("deleting regional Secret {}", name);
    client
        .delete(&url, client.timeouts().delete)
        .await
        .with_context(|| format!("error deleting Secret {:?}", name.name))?;

    state.clear();
    Ok(())
}

pub async fn import_state(client: &GcpClient, id: &str) -> Result<ResourceState> {
    let name = SecretName::parse(id, client.config.project.as_deref())?;
    let mut state = ResourceState::with_id(name.resource_path().as_str());

    match read(client, &mut state).await? {
        ReadOutcome::Present => Ok(state),
        ReadOutcome::Removed => Err(anyhow::anyhow!("Secret {:?} does not exist", id)),
    }
}
