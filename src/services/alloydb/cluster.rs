//! AlloyDB cluster
//!
//! Clusters come in three creation shapes: a plain primary cluster, a
//! restore from a backup or a point in time (`clusters:restore`), and a
//! secondary cluster replicating a primary (`clusters:createsecondary`).
//! The restore sources are mutually exclusive, and the secondary shape
//! requires `secondary_config.primary_cluster_name`.

use crate::gcp::client::GcpClient;
use crate::gcp::operation;
use crate::name::ClusterName;
use crate::resource::mapping::{flatten_map, flatten_string, set_omit_empty};
use crate::resource::{handle_not_found, update_mask, ReadOutcome};
use crate::state::ResourceState;
use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};

fn cluster_name(client: &GcpClient, state: &ResourceState) -> Result<ClusterName> {
    if let Some(id) = state.id() {
        return Ok(ClusterName::parse(id, client.config.project.as_deref())?);
    }

    let cluster_id = state
        .get_str("cluster_id")
        .context("\"cluster_id\" is required for an AlloyDB cluster")?;
    let location = state
        .get_str("location")
        .context("\"location\" is required for an AlloyDB cluster")?;
    let project = match state.get_str("project") {
        Some(p) => p.to_string(),
        None => client.config.default_project()?,
    };

    Ok(ClusterName::new(&project, location, cluster_id))
}

/// Reject configurations the server would refuse anyway, before any request
/// is sent.
fn validate(state: &ResourceState) -> Result<()> {
    let has_backup_source = state.is_set("restore_backup_source");
    let has_continuous_source = state.is_set("restore_continuous_backup_source");
    if has_backup_source && has_continuous_source {
        bail!(
            "\"restore_backup_source\" and \"restore_continuous_backup_source\" are mutually \
             exclusive; a cluster can be restored from a backup or from a point in time, not both"
        );
    }

    let cluster_type = state.get_str("cluster_type").unwrap_or("PRIMARY");
    let has_secondary_config = state.is_set("secondary_config");
    if cluster_type == "SECONDARY" && !has_secondary_config {
        bail!(
            "a SECONDARY cluster requires \"secondary_config.primary_cluster_name\" pointing at \
             its primary cluster"
        );
    }
    if cluster_type != "SECONDARY" && has_secondary_config {
        bail!("\"secondary_config\" can only be set on a SECONDARY cluster");
    }

    Ok(())
}

/// A backup start time is a complete time of day. Proto3 JSON omits zero
/// fields, so absent hours/minutes/seconds/nanos mean midnight components;
/// both directions always carry all four fields explicitly to keep the
/// state diff-stable.
fn normalize_start_time(original: &Value) -> Value {
    let mut transformed = Map::new();
    // field names are identical in wire and state shape
    for field in ["hours", "minutes", "seconds", "nanos"] {
        let value = original
            .get(field)
            .and_then(crate::resource::mapping::coerce_i64)
            .unwrap_or(0);
        transformed.insert(field.to_string(), json!(value));
    }
    Value::Object(transformed)
}

fn expand_weekly_schedule(original: &Value) -> Value {
    let mut transformed = Map::new();
    if let Some(Value::Array(times)) = original.get("start_times") {
        transformed.insert(
            "startTimes".to_string(),
            Value::Array(times.iter().map(normalize_start_time).collect()),
        );
    }
    set_omit_empty(
        &mut transformed,
        "daysOfWeek",
        original.get("days_of_week").cloned().unwrap_or(Value::Null),
    );
    Value::Object(transformed)
}

fn flatten_weekly_schedule(original: &Value) -> Value {
    let mut transformed = Map::new();
    if let Some(Value::Array(times)) = original.get("startTimes") {
        transformed.insert(
            "start_times".to_string(),
            Value::Array(times.iter().map(normalize_start_time).collect()),
        );
    }
    if let Some(days) = original.get("daysOfWeek") {
        transformed.insert("days_of_week".to_string(), days.clone());
    }
    Value::Object(transformed)
}

fn expand_automated_backup_policy(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    if let Some(schedule) = original.get("weekly_schedule") {
        transformed.insert(
            "weeklySchedule".to_string(),
            expand_weekly_schedule(schedule),
        );
    }
    if let Some(Value::Object(retention)) = original.get("quantity_based_retention") {
        let mut out = Map::new();
        set_omit_empty(
            &mut out,
            "count",
            retention.get("count").cloned().unwrap_or(Value::Null),
        );
        transformed.insert("quantityBasedRetention".to_string(), Value::Object(out));
    }
    if let Some(Value::Object(retention)) = original.get("time_based_retention") {
        let mut out = Map::new();
        set_omit_empty(
            &mut out,
            "retentionPeriod",
            retention
                .get("retention_period")
                .cloned()
                .unwrap_or(Value::Null),
        );
        transformed.insert("timeBasedRetention".to_string(), Value::Object(out));
    }
    if let Some(enabled) = original.get("enabled").and_then(|v| v.as_bool()) {
        transformed.insert("enabled".to_string(), json!(enabled));
    }
    set_omit_empty(
        &mut transformed,
        "backupWindow",
        original.get("backup_window").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut transformed,
        "location",
        original.get("location").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut transformed,
        "labels",
        original.get("labels").cloned().unwrap_or(Value::Null),
    );
    Value::Object(transformed)
}

fn flatten_automated_backup_policy(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    if let Some(schedule) = original.get("weeklySchedule") {
        transformed.insert(
            "weekly_schedule".to_string(),
            flatten_weekly_schedule(schedule),
        );
    }
    if let Some(retention) = original.get("quantityBasedRetention") {
        transformed.insert(
            "quantity_based_retention".to_string(),
            json!({"count": retention.get("count").cloned().unwrap_or(Value::Null)}),
        );
    }
    if let Some(retention) = original.get("timeBasedRetention") {
        transformed.insert(
            "time_based_retention".to_string(),
            json!({"retention_period": retention.get("retentionPeriod").cloned().unwrap_or(Value::Null)}),
        );
    }
    if let Some(enabled) = original.get("enabled") {
        transformed.insert("enabled".to_string(), enabled.clone());
    }
    for (state_key, wire_key) in [
        ("backup_window", "backupWindow"),
        ("location", "location"),
        ("labels", "labels"),
    ] {
        if let Some(v) = original.get(wire_key) {
            transformed.insert(state_key.to_string(), v.clone());
        }
    }
    Value::Object(transformed)
}

fn expand_continuous_backup_config(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    if let Some(enabled) = original.get("enabled").and_then(|v| v.as_bool()) {
        transformed.insert("enabled".to_string(), json!(enabled));
    }
    set_omit_empty(
        &mut transformed,
        "recoveryWindowDays",
        original
            .get("recovery_window_days")
            .cloned()
            .unwrap_or(Value::Null),
    );
    if let Some(Value::Object(encryption)) = original.get("encryption_config") {
        let mut out = Map::new();
        set_omit_empty(
            &mut out,
            "kmsKeyName",
            encryption.get("kms_key_name").cloned().unwrap_or(Value::Null),
        );
        set_omit_empty(&mut transformed, "encryptionConfig", Value::Object(out));
    }
    Value::Object(transformed)
}

fn flatten_continuous_backup_config(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    if let Some(enabled) = original.get("enabled") {
        transformed.insert("enabled".to_string(), enabled.clone());
    }
    if let Some(days) = original.get("recoveryWindowDays") {
        transformed.insert("recovery_window_days".to_string(), days.clone());
    }
    if let Some(encryption) = original.get("encryptionConfig") {
        transformed.insert(
            "encryption_config".to_string(),
            json!({"kms_key_name": encryption.get("kmsKeyName").cloned().unwrap_or(Value::Null)}),
        );
    }
    Value::Object(transformed)
}

/// Request body shared by the three creation shapes and update
fn expand(state: &ResourceState) -> Value {
    let mut obj = Map::new();

    set_omit_empty(
        &mut obj,
        "databaseVersion",
        state.get("database_version").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "displayName",
        state.get("display_name").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "network",
        state.get("network").cloned().unwrap_or(Value::Null),
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

    // Write-only: sent on create, never returned by the API
    if let Some(Value::Object(user)) = state.get("initial_user") {
        let mut out = Map::new();
        set_omit_empty(
            &mut out,
            "user",
            user.get("user").cloned().unwrap_or(Value::Null),
        );
        set_omit_empty(
            &mut out,
            "password",
            user.get("password").cloned().unwrap_or(Value::Null),
        );
        set_omit_empty(&mut obj, "initialUser", Value::Object(out));
    }

    set_omit_empty(
        &mut obj,
        "automatedBackupPolicy",
        expand_automated_backup_policy(state.get("automated_backup_policy")),
    );
    set_omit_empty(
        &mut obj,
        "continuousBackupConfig",
        expand_continuous_backup_config(state.get("continuous_backup_config")),
    );

    if let Some(cluster_type) = state.get_str("cluster_type") {
        obj.insert("clusterType".to_string(), json!(cluster_type));
    }
    if let Some(Value::Object(secondary)) = state.get("secondary_config") {
        let mut out = Map::new();
        set_omit_empty(
            &mut out,
            "primaryClusterName",
            secondary
                .get("primary_cluster_name")
                .cloned()
                .unwrap_or(Value::Null),
        );
        set_omit_empty(&mut obj, "secondaryConfig", Value::Object(out));
    }

    Value::Object(obj)
}

fn flatten(state: &mut ResourceState, res: &Value, name: &ClusterName) {
    state.set("cluster_id", name.name.as_str());
    state.set("location", name.location.as_str());
    state.set("project", name.project.as_str());

    state.set("name", flatten_string(res.get("name")));
    state.set("uid", flatten_string(res.get("uid")));
    state.set("state", flatten_string(res.get("state")));
    state.set("database_version", flatten_string(res.get("databaseVersion")));
    state.set("display_name", flatten_string(res.get("displayName")));
    state.set("network", flatten_string(res.get("network")));
    state.set("labels", flatten_map(res.get("labels")));
    state.set("annotations", flatten_map(res.get("annotations")));
    state.set("cluster_type", flatten_string(res.get("clusterType")));
    state.set(
        "automated_backup_policy",
        flatten_automated_backup_policy(res.get("automatedBackupPolicy")),
    );
    state.set(
        "continuous_backup_config",
        flatten_continuous_backup_config(res.get("continuousBackupConfig")),
    );
    if let Some(secondary) = res.get("secondaryConfig") {
        state.set(
            "secondary_config",
            json!({
                "primary_cluster_name":
                    secondary.get("primaryClusterName").cloned().unwrap_or(Value::Null)
            }),
        );
    }
    // initial_user and the restore sources are write-only; the API never
    // returns them, so the state values stay as configured.
}

pub async fn create(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    validate(state)?;
    let name = cluster_name(client, state)?;
    let cluster = expand(state);

    let cluster_type = state.get_str("cluster_type").unwrap_or("PRIMARY");

    let (url, body) = if state.is_set("restore_backup_source")
        || state.is_set("restore_continuous_backup_source")
    {
        let mut body = Map::new();
        if let Some(Value::Object(source)) = state.get("restore_backup_source") {
            body.insert(
                "backupSource".to_string(),
                json!({"backupName": source.get("backup_name").cloned().unwrap_or(Value::Null)}),
            );
        }
        if let Some(Value::Object(source)) = state.get("restore_continuous_backup_source") {
            body.insert(
                "continuousBackupSource".to_string(),
                json!({
                    "cluster": source.get("cluster").cloned().unwrap_or(Value::Null),
                    "pointInTime": source.get("point_in_time").cloned().unwrap_or(Value::Null),
                }),
            );
        }
        body.insert("clusterId".to_string(), json!(name.name));
        body.insert("cluster".to_string(), cluster);

        (
            client.alloydb_url(&format!("{}/clusters:restore", name.parent_path())),
            Value::Object(body),
        )
    } else if cluster_type == "SECONDARY" {
        (
            client.alloydb_url(&format!(
                "{}/clusters:createsecondary?clusterId={}",
                name.parent_path(),
                name.name
            )),
            cluster,
        )
    } else {
        (
            client.alloydb_url(&format!(
                "{}/clusters?clusterId={}",
                name.parent_path(),
                name.name
            )),
            cluster,
        )
    };

    tracing::debug!("creating AlloyDB cluster {}: {}", name, body);
    let op = client
        .post(&url, Some(&body), client.timeouts().create)
        .await
        .with_context(|| format!("error creating Cluster {:?}", name.name))?;

    operation::wait(
        client,
        client.config.alloydb_base(),
        &op,
        &format!("creating Cluster {:?}", name.name),
        client.timeouts().create,
    )
    .await?;

    state.set_id(name.resource_path());
    match read(client, state).await? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Removed => Err(anyhow::anyhow!(
            "Cluster {:?} was not found after creation",
            name.name
        )),
    }
}

pub async fn read(client: &GcpClient, state: &mut ResourceState) -> Result<ReadOutcome> {
    let name = cluster_name(client, state)?;
    let url = client.alloydb_url(&name.resource_path());

    let res = match client.get(&url, client.timeouts().read).await {
        Ok(res) => res,
        Err(err) => {
            return handle_not_found(
                err,
                state,
                &format!("AlloydbCluster {:?}", name.resource_path()),
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
    validate(state)?;
    let name = cluster_name(client, state)?;
    let obj = expand(state);

    let update_mask = update_mask(
        state,
        prior,
        &[
            ("display_name", "displayName"),
            ("labels", "labels"),
            ("annotations", "annotations"),
            ("automated_backup_policy", "automatedBackupPolicy"),
            ("continuous_backup_config", "continuousBackupConfig"),
        ],
    );

    if update_mask.is_empty() {
        tracing::debug!("no updatable changes for Cluster {}", name);
        return Ok(());
    }

    let url = client.alloydb_url(&format!(
        "{}?updateMask={}",
        name.resource_path(),
        update_mask.join(",")
    ));

    tracing::debug!("updating AlloyDB cluster {}: {}", name, obj);
    let op = client
        .patch(&url, Some(&obj), client.timeouts().update)
        .await
        .with_context(|| format!("error updating Cluster {:?}", name.name))?;

    operation::wait(
        client,
        client.config.alloydb_base(),
        &op,
        &format!("updating Cluster {:?}", name.name),
        client.timeouts().update,
    )
    .await?;

    read(client, state).await?;
    Ok(())
}

pub async fn delete(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let name = cluster_name(client, state)?;

    let mut url = client.alloydb_url(&name.resource_path());
    if state.get_str("deletion_policy") == Some("FORCE") {
        url.push_str("?force=true");
    }

    tracing::debug!("deleting AlloyDB cluster {}", name);
    let op = client
        .delete(&url, client.timeouts().delete)
        .await
        .with_context(|| format!("error deleting Cluster {:?}", name.name))?;

    operation::wait(
        client,
        client.config.alloydb_base(),
        &op,
        &format!("deleting Cluster {:?}", name.name),
        client.timeouts().delete,
    )
    .await?;

    state.clear();
    Ok(())
}

pub async fn import_state(client: &GcpClient, id: &str) -> Result<ResourceState> {
    let name = ClusterName::parse(id, client.config.project.as_deref())?;
    let mut state = ResourceState::with_id(name.resource_path().as_str());

    match read(client, &mut state).await? {
        ReadOutcome::Present => Ok(state),
        ReadOutcome::Removed => Err(anyhow::anyhow!("Cluster {:?} does not exist", id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_sources_are_mutually_exclusive() {
        let mut state = ResourceState::new();
        state.set("restore_backup_source", json!({"backup_name": "b"}));
        state.set(
            "restore_continuous_backup_source",
            json!({"cluster": "c", "point_in_time": "2024-01-01T00:00:00Z"}),
        );
        let err = validate(&state).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_secondary_requires_secondary_config() {
        let mut state = ResourceState::new();
        state.set("cluster_type", "SECONDARY");
        assert!(validate(&state).is_err());

        state.set(
            "secondary_config",
            json!({"primary_cluster_name": "projects/p/locations/l/clusters/primary"}),
        );
        assert!(validate(&state).is_ok());
    }

    #[test]
    fn test_secondary_config_rejected_on_primary() {
        let mut state = ResourceState::new();
        state.set(
            "secondary_config",
            json!({"primary_cluster_name": "projects/p/locations/l/clusters/primary"}),
        );
        assert!(validate(&state).is_err());
    }

    #[test]
    fn test_midnight_start_time_round_trips() {
        let policy = json!({
            "weekly_schedule": {
                "start_times": [{"hours": 0, "minutes": 0, "seconds": 0, "nanos": 0}],
                "days_of_week": ["MONDAY"]
            },
            "enabled": true
        });

        let wire = expand_automated_backup_policy(Some(&policy));
        // midnight components are sent explicitly
        assert_eq!(wire["weeklySchedule"]["startTimes"][0]["hours"], 0);

        // the server omits zero proto3 fields; flatten restores them
        let server_echo = json!({
            "weeklySchedule": {
                "startTimes": [{}],
                "daysOfWeek": ["MONDAY"]
            },
            "enabled": true
        });
        let back = flatten_automated_backup_policy(Some(&server_echo));
        assert_eq!(back, policy);
    }

    #[test]
    fn test_backup_policy_retention_mapping() {
        let policy = json!({
            "quantity_based_retention": {"count": 5},
            "backup_window": "3600s"
        });
        let wire = expand_automated_backup_policy(Some(&policy));
        assert_eq!(wire["quantityBasedRetention"]["count"], 5);
        assert_eq!(wire["backupWindow"], "3600s");

        let back = flatten_automated_backup_policy(Some(&wire));
        assert_eq!(back["quantity_based_retention"]["count"], 5);
        assert_eq!(back["backup_window"], "3600s");
    }

    #[test]
    fn test_expand_carries_initial_user_but_flatten_preserves_it() {
        let mut state = ResourceState::new();
        state.set("initial_user", json!({"user": "admin", "password": "hunter2"}));
        let obj = expand(&state);
        assert_eq!(obj["initialUser"]["user"], "admin");

        let name = ClusterName::new("p", "us-central1", "c");
        flatten(&mut state, &json!({"name": name.resource_path()}), &name);
        // write-only field untouched by flatten
        assert_eq!(state.get("initial_user").unwrap()["user"], "admin");
    }
}
