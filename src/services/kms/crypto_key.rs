//! Cloud KMS crypto key
//!
//! Crypto keys live under a key ring and cannot be deleted server-side.
//! Delete destroys every remaining key version and disables automatic
//! rotation before dropping the key from state.

use crate::gcp::client::GcpClient;
use crate::name::CryptoKeyName;
use crate::resource::mapping::{flatten_map, flatten_string, set_omit_empty};
use crate::resource::pager;
use crate::resource::{handle_not_found, update_mask, ReadOutcome};
use crate::state::ResourceState;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

/// Rotation periods are second-denominated durations like "100000s",
/// with at most 9 fractional digits
static ROTATION_PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:\.(\d+))?s$").expect("static pattern"));

/// Minimum rotation period accepted by the API: one day
const MIN_ROTATION_SECONDS: i64 = 86400;

/// Validate a rotation period string.
///
/// Rejects anything under a day, and fractional components longer than
/// nanosecond precision.
pub fn validate_rotation_period(period: &str) -> Result<()> {
    let captures = ROTATION_PERIOD_RE
        .captures(period)
        .with_context(|| format!("invalid rotation period {:?}; expected a duration in seconds like \"86400s\"", period))?;

    let seconds: i64 = captures[1]
        .parse()
        .with_context(|| format!("invalid rotation period {:?}", period))?;

    if let Some(fraction) = captures.get(2) {
        if fraction.as_str().len() > 9 {
            bail!(
                "invalid rotation period {:?}: fractional seconds cannot exceed 9 digits",
                period
            );
        }
    }

    if seconds < MIN_ROTATION_SECONDS {
        bail!(
            "rotation period must be at least one day (86400s), got {:?}",
            period
        );
    }

    Ok(())
}

/// Compute the next rotation timestamp: now plus the rotation period,
/// in RFC 3339 with nanosecond precision
pub fn next_rotation_time(now: DateTime<Utc>, period: &str) -> Result<String> {
    validate_rotation_period(period)?;
    let captures = ROTATION_PERIOD_RE.captures(period).expect("validated above");

    let seconds: i64 = captures[1].parse()?;
    let nanos: i64 = match captures.get(2) {
        Some(fraction) => {
            // Right-pad to nanoseconds: "5" means 0.5s
            let padded = format!("{:0<9}", fraction.as_str());
            padded.parse()?
        }
        None => 0,
    };

    let next = now + Duration::seconds(seconds) + Duration::nanoseconds(nanos);
    Ok(next.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn key_name(client: &GcpClient, state: &ResourceState) -> Result<CryptoKeyName> {
    if let Some(id) = state.id() {
        return Ok(CryptoKeyName::parse(id, client.config.project.as_deref())?);
    }

    let name = state
        .get_str("name")
        .context("\"name\" is required for a crypto key")?;
    let ring_ref = state
        .get_str("key_ring")
        .context("\"key_ring\" is required for a crypto key")?;
    let key_ring =
        crate::name::KeyRingName::parse(ring_ref, client.config.project.as_deref())?;

    Ok(CryptoKeyName {
        key_ring,
        name: name.to_string(),
    })
}

fn expand_version_template(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    let mut transformed = Map::new();
    set_omit_empty(
        &mut transformed,
        "algorithm",
        original.get("algorithm").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut transformed,
        "protectionLevel",
        original
            .get("protection_level")
            .cloned()
            .unwrap_or(Value::Null),
    );
    Value::Object(transformed)
}

fn flatten_version_template(value: Option<&Value>) -> Value {
    let Some(Value::Object(original)) = value else {
        return Value::Null;
    };

    json!({
        "algorithm": original.get("algorithm").cloned().unwrap_or(Value::Null),
        "protection_level": original.get("protectionLevel").cloned().unwrap_or(Value::Null),
    })
}

/// Build the request body; `now` feeds the next-rotation computation so
/// tests can pin it
fn expand(state: &ResourceState, now: DateTime<Utc>) -> Result<Value> {
    let mut obj = Map::new();

    set_omit_empty(
        &mut obj,
        "purpose",
        state.get("purpose").cloned().unwrap_or(Value::Null),
    );

    if let Some(period) = state.get_str("rotation_period") {
        validate_rotation_period(period)?;
        obj.insert("rotationPeriod".to_string(), json!(period));
        // if rotationPeriod is set, nextRotationTime must also be set.
        obj.insert(
            "nextRotationTime".to_string(),
            json!(next_rotation_time(now, period)?),
        );
    }

    set_omit_empty(
        &mut obj,
        "versionTemplate",
        expand_version_template(state.get("version_template")),
    );
    set_omit_empty(
        &mut obj,
        "labels",
        state.get("labels").cloned().unwrap_or(Value::Null),
    );
    set_omit_empty(
        &mut obj,
        "destroyScheduledDuration",
        state
            .get("destroy_scheduled_duration")
            .cloned()
            .unwrap_or(Value::Null),
    );
    if let Some(import_only) = state.get_bool("import_only") {
        obj.insert("importOnly".to_string(), json!(import_only));
    }

    Ok(Value::Object(obj))
}

fn flatten(state: &mut ResourceState, res: &Value, key: &CryptoKeyName) {
    // Take the returned long form of the name as `self_link` and keep the
    // user-specified short form in `name`.
    state.set("self_link", flatten_string(res.get("name")));
    state.set("name", key.name.as_str());
    state.set("key_ring", key.key_ring.resource_path().as_str());

    state.set("purpose", flatten_string(res.get("purpose")));
    state.set("rotation_period", flatten_string(res.get("rotationPeriod")));
    state.set(
        "version_template",
        flatten_version_template(res.get("versionTemplate")),
    );
    state.set("labels", flatten_map(res.get("labels")));
    state.set(
        "destroy_scheduled_duration",
        flatten_string(res.get("destroyScheduledDuration")),
    );
    state.set(
        "import_only",
        res.get("importOnly").cloned().unwrap_or(Value::Null),
    );
    state.set(
        "primary",
        flatten_string(res.get("primary").and_then(|p| p.get("name"))),
    );
}

pub async fn create(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let key = key_name(client, state)?;
    let obj = expand(state, Utc::now())?;

    let mut url = client.kms_url(&format!(
        "{}/cryptoKeys?cryptoKeyId={}",
        key.key_ring.resource_path(),
        key.name
    ));
    if state.get_bool("skip_initial_version_creation").unwrap_or(false) {
        url.push_str("&skipInitialVersionCreation=true");
    }

    tracing::debug!("creating CryptoKey {}: {}", key, obj);
    client
        .post(&url, Some(&obj), client.timeouts().create)
        .await
        .with_context(|| format!("error creating CryptoKey {:?}", key.name))?;

    state.set_id(key.resource_path());
    match read(client, state).await? {
        ReadOutcome::Present => Ok(()),
        ReadOutcome::Removed => Err(anyhow::anyhow!(
            "CryptoKey {:?} was not found after creation",
            key.name
        )),
    }
}

pub async fn read(client: &GcpClient, state: &mut ResourceState) -> Result<ReadOutcome> {
    let key = key_name(client, state)?;
    let url = client.kms_url(&key.resource_path());

    let res = match client.get(&url, client.timeouts().read).await {
        Ok(res) => res,
        Err(err) => {
            return handle_not_found(err, state, &format!("KmsCryptoKey {:?}", key.resource_path()))
        }
    };

    state.set_id(key.resource_path());
    flatten(state, &res, &key);
    Ok(ReadOutcome::Present)
}

pub async fn update(
    client: &GcpClient,
    prior: &ResourceState,
    state: &mut ResourceState,
) -> Result<()> {
    let key = key_name(client, state)?;
    let obj = expand(state, Utc::now())?;

    // a rotation change must carry both schedule fields
    let update_mask = update_mask(
        state,
        prior,
        &[
            ("rotation_period", "rotationPeriod,nextRotationTime"),
            ("version_template", "versionTemplate.algorithm"),
            ("labels", "labels"),
        ],
    );

    if update_mask.is_empty() {
        tracing::debug!("no updatable changes for CryptoKey {}", key);
        return Ok(());
    }

    let url = client.kms_url(&format!(
        "{}?updateMask={}",
        key.resource_path(),
        update_mask.join(",")
    ));

    tracing::debug!("updating CryptoKey {}: {}", key, obj);
    client
        .patch(&url, Some(&obj), client.timeouts().update)
        .await
        .with_context(|| format!("error updating CryptoKey {:?}", key.name))?;

    read(client, state).await?;
    Ok(())
}

/// Crypto keys cannot be deleted from GCP. All key versions are destroyed
/// and automatic rotation is disabled, then the key is dropped from state;
/// the key itself remains on the server.
pub async fn delete(client: &GcpClient, state: &mut ResourceState) -> Result<()> {
    let key = key_name(client, state)?;

    tracing::warn!(
        "KMS CryptoKey {} cannot be deleted from GCP; destroying its versions and removing it from state",
        key
    );

    clear_crypto_key_versions(client, &key).await?;

    if state.is_set("rotation_period") {
        disable_rotation(client, &key).await.with_context(|| {
            format!(
                "versions of {} were destroyed, but automatic rotation could not be disabled; \
                 retry or disable rotation manually to prevent new versions",
                key
            )
        })?;
    }

    state.clear();
    Ok(())
}

/// Destroy every version of the key that is not already destroyed or
/// scheduled for destruction
async fn clear_crypto_key_versions(client: &GcpClient, key: &CryptoKeyName) -> Result<()> {
    let url = client.kms_url(&format!("{}/cryptoKeyVersions", key.resource_path()));
    let versions = pager::list_all(client, &url, "cryptoKeyVersions", &[]).await?;

    for version in versions {
        let version_state = version.get("state").and_then(|v| v.as_str()).unwrap_or("");
        if matches!(version_state, "DESTROYED" | "DESTROY_SCHEDULED") {
            continue;
        }

        let Some(name) = version.get("name").and_then(|v| v.as_str()) else {
            continue;
        };
        let destroy_url = client.kms_url(&format!("{}:destroy", name));
        client
            .post(&destroy_url, Some(&json!({})), client.timeouts().delete)
            .await
            .with_context(|| format!("error destroying CryptoKeyVersion {:?}", name))?;
    }

    Ok(())
}

async fn disable_rotation(client: &GcpClient, key: &CryptoKeyName) -> Result<()> {
    let url = client.kms_url(&format!(
        "{}?updateMask=rotationPeriod,nextRotationTime",
        key.resource_path()
    ));
    client
        .patch(&url, Some(&json!({})), client.timeouts().delete)
        .await?;
    Ok(())
}

pub async fn import_state(client: &GcpClient, id: &str) -> Result<ResourceState> {
    let key = CryptoKeyName::parse(id, client.config.project.as_deref())?;
    let mut state = ResourceState::with_id(key.resource_path().as_str());
    state.set("name", key.name.as_str());
    state.set("key_ring", key.key_ring.resource_path().as_str());

    match read(client, &mut state).await? {
        ReadOutcome::Present => Ok(state),
        ReadOutcome::Removed => Err(anyhow::anyhow!("CryptoKey {:?} does not exist", id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rotation_period_minimum() {
        assert!(validate_rotation_period("86400s").is_ok());
        assert!(validate_rotation_period("86401s").is_ok());
        assert!(validate_rotation_period("86399s").is_err());
        assert!(validate_rotation_period("1s").is_err());
    }

    #[test]
    fn test_rotation_period_fraction_limit() {
        assert!(validate_rotation_period("86400.123456789s").is_ok());
        assert!(validate_rotation_period("86400.1234567890s").is_err());
    }

    #[test]
    fn test_rotation_period_shape() {
        assert!(validate_rotation_period("86400").is_err());
        assert!(validate_rotation_period("1d").is_err());
        assert!(validate_rotation_period("").is_err());
        assert!(validate_rotation_period("-86400s").is_err());
    }

    #[test]
    fn test_next_rotation_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = next_rotation_time(now, "86400s").unwrap();
        assert_eq!(next, "2024-01-02T00:00:00Z");
    }

    #[test]
    fn test_next_rotation_time_fractional() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = next_rotation_time(now, "86400.5s").unwrap();
        assert_eq!(next, "2024-01-02T00:00:00.500Z");
    }

    #[test]
    fn test_expand_includes_next_rotation() {
        let mut state = ResourceState::new();
        state.set("purpose", "ENCRYPT_DECRYPT");
        state.set("rotation_period", "100000s");

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let obj = expand(&state, now).unwrap();
        assert_eq!(obj["rotationPeriod"], "100000s");
        assert!(obj["nextRotationTime"].as_str().unwrap().starts_with("2024-06-02T"));
    }

    #[test]
    fn test_expand_rejects_short_rotation() {
        let mut state = ResourceState::new();
        state.set("rotation_period", "3600s");
        assert!(expand(&state, Utc::now()).is_err());
    }

    #[test]
    fn test_version_template_round_trip() {
        let template = json!({
            "algorithm": "GOOGLE_SYMMETRIC_ENCRYPTION",
            "protection_level": "SOFTWARE"
        });
        let wire = expand_version_template(Some(&template));
        assert_eq!(wire["algorithm"], "GOOGLE_SYMMETRIC_ENCRYPTION");
        assert_eq!(wire["protectionLevel"], "SOFTWARE");

        let back = flatten_version_template(Some(&wire));
        assert_eq!(back, template);
    }

    #[test]
    fn test_flatten_keeps_short_name_and_sets_self_link() {
        let key = CryptoKeyName::parse("projects/p/locations/us/keyRings/r/cryptoKeys/k", None)
            .unwrap();
        let mut state = ResourceState::new();
        let res = json!({
            "name": "projects/p/locations/us/keyRings/r/cryptoKeys/k",
            "purpose": "ENCRYPT_DECRYPT",
            "primary": {"name": "projects/p/locations/us/keyRings/r/cryptoKeys/k/cryptoKeyVersions/1"}
        });

        flatten(&mut state, &res, &key);
        assert_eq!(state.get_str("name"), Some("k"));
        assert_eq!(
            state.get_str("self_link"),
            Some("projects/p/locations/us/keyRings/r/cryptoKeys/k")
        );
        assert!(state.get_str("primary").unwrap().ends_with("/cryptoKeyVersions/1"));
    }
}
