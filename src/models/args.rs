//! # Task Args
//!
//! The typed shapes behind a task's opaque payload. `args.type` is a
//! discriminated union tag validated at admission; this is the only place
//! domain awareness enters the scheduling core, and it stops at shape
//! validation. Handlers receive the payload verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchedulerError};

/// Reference to the connection a script runs against
///
/// Field casing matches the wire format of the callers (snake_case inside
/// the `connection` object, unlike the camelCase around it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub id: i64,
    pub connection_id: String,
    pub provider_config_key: String,
    pub environment_id: i64,
}

/// Shape-validated task payloads, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskArgs {
    #[serde(rename = "sync", rename_all = "camelCase")]
    Sync {
        sync_id: String,
        sync_name: String,
        debug: bool,
        connection: ConnectionRef,
    },
    #[serde(rename = "action", rename_all = "camelCase")]
    Action {
        action_name: String,
        activity_log_id: String,
        input: Value,
        connection: ConnectionRef,
    },
    #[serde(rename = "webhook", rename_all = "camelCase")]
    Webhook {
        webhook_name: String,
        parent_sync_name: String,
        activity_log_id: String,
        input: Value,
        connection: ConnectionRef,
    },
    #[serde(rename = "post-connection-script", rename_all = "camelCase")]
    PostConnectionScript {
        post_connection_name: String,
        version: String,
        file_location: String,
        activity_log_id: String,
        connection: ConnectionRef,
    },
}

impl TaskArgs {
    /// Parse and validate a raw payload
    pub fn from_payload(payload: &Value) -> Result<TaskArgs> {
        serde_json::from_value(payload.clone())
            .map_err(|e| SchedulerError::Validation(format!("invalid args: {e}")))
    }

    /// The `type` tag of this payload
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sync { .. } => "sync",
            Self::Action { .. } => "action",
            Self::Webhook { .. } => "webhook",
            Self::PostConnectionScript { .. } => "post-connection-script",
        }
    }

    pub fn connection(&self) -> &ConnectionRef {
        match self {
            Self::Sync { connection, .. }
            | Self::Action { connection, .. }
            | Self::Webhook { connection, .. }
            | Self::PostConnectionScript { connection, .. } => connection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection_json() -> Value {
        json!({
            "id": 7,
            "connection_id": "conn-1",
            "provider_config_key": "github",
            "environment_id": 3
        })
    }

    #[test]
    fn test_action_args_parse() {
        let payload = json!({
            "type": "action",
            "actionName": "create-issue",
            "activityLogId": "log-42",
            "input": {"title": "hello"},
            "connection": connection_json()
        });

        let args = TaskArgs::from_payload(&payload).unwrap();
        assert_eq!(args.kind(), "action");
        assert_eq!(args.connection().provider_config_key, "github");
        match args {
            TaskArgs::Action { action_name, input, .. } => {
                assert_eq!(action_name, "create-issue");
                assert_eq!(input["title"], "hello");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_sync_args_parse() {
        let payload = json!({
            "type": "sync",
            "syncId": "sync-9",
            "syncName": "issues",
            "debug": false,
            "connection": connection_json()
        });
        let args = TaskArgs::from_payload(&payload).unwrap();
        assert_eq!(args.kind(), "sync");
    }

    #[test]
    fn test_post_connection_script_tag() {
        let payload = json!({
            "type": "post-connection-script",
            "postConnectionName": "setup-webhooks",
            "version": "0.0.1",
            "fileLocation": "remote/github/setup-webhooks.js",
            "activityLogId": "log-1",
            "connection": connection_json()
        });
        let args = TaskArgs::from_payload(&payload).unwrap();
        assert_eq!(args.kind(), "post-connection-script");
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let payload = json!({"type": "cron", "name": "x"});
        assert!(TaskArgs::from_payload(&payload).is_err());
    }

    #[test]
    fn test_missing_field_rejected() {
        // webhook without a parentSyncName must not validate
        let payload = json!({
            "type": "webhook",
            "webhookName": "on-push",
            "activityLogId": "log-2",
            "input": {},
            "connection": connection_json()
        });
        assert!(TaskArgs::from_payload(&payload).is_err());
    }

    #[test]
    fn test_wire_roundtrip_preserves_tag() {
        let args = TaskArgs::Webhook {
            webhook_name: "on-push".into(),
            parent_sync_name: "issues".into(),
            activity_log_id: "log-2".into(),
            input: json!({"sha": "abc"}),
            connection: serde_json::from_value(connection_json()).unwrap(),
        };
        let value = serde_json::to_value(&args).unwrap();
        assert_eq!(value["type"], "webhook");
        assert_eq!(value["parentSyncName"], "issues");
        assert_eq!(TaskArgs::from_payload(&value).unwrap(), args);
    }
}
