//! Long-running operation polling
//!
//! AlloyDB and TPU v2 mutations return `operations/*` resources that finish
//! asynchronously. `wait` polls the operation until `done: true` or the
//! caller's timeout budget runs out.

use super::client::GcpClient;
use anyhow::Result;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Poll an operation returned by a mutation until it completes.
///
/// `base_url` is the service base the operation name is relative to
/// (e.g. the AlloyDB v1 base). On success returns the operation's
/// `response` field when present, otherwise the final operation document.
pub async fn wait(
    client: &GcpClient,
    base_url: &str,
    operation: &Value,
    activity: &str,
    timeout: Duration,
) -> Result<Value> {
    let deadline = Instant::now() + timeout;
    let mut current = operation.clone();

    loop {
        if is_done(&current) {
            return finish(current, activity);
        }

        let name = current
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("operation for {} has no name", activity))?
            .to_string();

        if Instant::now() >= deadline {
            return Err(anyhow::anyhow!(
                "timed out waiting for {} (operation {})",
                activity,
                name
            ));
        }

        tokio::time::sleep(client.config.operation_poll_interval).await;

        let url = format!("{}/{}", base_url, name);
        tracing::debug!("polling operation {} for {}", name, activity);
        current = client.get(&url, client.timeouts().read).await?;
    }
}

fn is_done(operation: &Value) -> bool {
    operation
        .get("done")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn finish(operation: Value, activity: &str) -> Result<Value> {
    if let Some(error) = operation.get("error") {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown operation error");
        return Err(anyhow::anyhow!("{} failed: {}", activity, message));
    }

    Ok(operation
        .get("response")
        .cloned()
        .unwrap_or(operation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_done_operation_returns_response() {
        let op = json!({
            "name": "projects/p/locations/l/operations/op-1",
            "done": true,
            "response": {"name": "projects/p/locations/l/clusters/c"}
        });
        let result = finish(op, "creating cluster").unwrap();
        assert_eq!(result["name"], "projects/p/locations/l/clusters/c");
    }

    #[test]
    fn test_failed_operation_surfaces_error_message() {
        let op = json!({
            "name": "projects/p/locations/l/operations/op-2",
            "done": true,
            "error": {"code": 9, "message": "quota exhausted"}
        });
        let err = finish(op, "creating cluster").unwrap_err();
        assert!(err.to_string().contains("quota exhausted"));
    }

    #[test]
    fn test_done_without_response_returns_operation() {
        let op = json!({"name": "operations/op-3", "done": true});
        let result = finish(op.clone(), "deleting node").unwrap();
        assert_eq!(result, op);
    }
}
