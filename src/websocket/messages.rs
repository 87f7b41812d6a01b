//! WebSocket Message Types
//!
//! Frames exchanged between sync clients and the repsync server. Control
//! frames are tagged with `type`; push frames additionally carry the
//! `resource` they were routed by and the event payload in `data`:
//!
//! ```json
//! {"type": "subset_created", "resource": "users:1", "data": {"id": 3, ...}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    Exercise, MeasurementEntry, Set, Subset, User, UserFull, UserSettings, Workout,
};

/// Resource id helpers
///
/// Resource ids are opaque strings on the wire. The server produces
/// `users` for the user list and `<kind>:<id>` for single entities.
pub mod resource {
    pub const USERS: &str = "users";

    const KINDS: [&str; 5] = ["users", "workouts", "exercises", "sets", "subsets"];

    pub fn user(id: i64) -> String {
        format!("users:{}", id)
    }

    pub fn workout(id: i64) -> String {
        format!("workouts:{}", id)
    }

    pub fn exercise(id: i64) -> String {
        format!("exercises:{}", id)
    }

    pub fn set(id: i64) -> String {
        format!("sets:{}", id)
    }

    pub fn subset(id: i64) -> String {
        format!("subsets:{}", id)
    }

    /// `users`, or a known kind followed by a numeric id
    pub fn is_valid(resource: &str) -> bool {
        if resource == USERS {
            return true;
        }
        match resource.split_once(':') {
            Some((kind, id)) => {
                KINDS.contains(&kind) && !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
            }
            None => false,
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start receiving pushes for a resource
    Subscribe { resource: String },
    /// Stop receiving pushes for a resource
    Unsubscribe { resource: String },
    /// Ping for keepalive
    Ping,
}

/// Control frames sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { connection_id: String },
    /// Subscription confirmed
    Subscribed { resource: String },
    /// Unsubscription confirmed
    Unsubscribed { resource: String },
    /// Pong response to ping
    Pong,
    /// Error message
    Error { message: String },
}

impl ServerMessage {
    pub const KINDS: [&'static str; 5] =
        ["connected", "subscribed", "unsubscribed", "pong", "error"];
}

/// A data change, one variant per push `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    UserCreated(User),
    /// Name, bio or profile image changed
    UserUpdated(UserFull),
    WorkoutCreated(Workout),
    ExerciseCreated(Exercise),
    SetCreated(Set),
    SubsetCreated(Subset),
    SettingsUpdated(UserSettings),
    MeasurementAdded(MeasurementEntry),
}

impl Event {
    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserCreated(_) => "user_created",
            Self::UserUpdated(_) => "user_updated",
            Self::WorkoutCreated(_) => "workout_created",
            Self::ExerciseCreated(_) => "exercise_created",
            Self::SetCreated(_) => "set_created",
            Self::SubsetCreated(_) => "subset_created",
            Self::SettingsUpdated(_) => "settings_updated",
            Self::MeasurementAdded(_) => "measurement_added",
        }
    }
}

/// An event routed to one resource
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub resource: String,
    pub event: Event,
}

impl PushMessage {
    pub fn new(resource: impl Into<String>, event: Event) -> Self {
        Self {
            resource: resource.into(),
            event,
        }
    }

    pub fn to_value(&self) -> Result<Value, FrameError> {
        let mut value = serde_json::to_value(&self.event)?;
        if let Value::Object(map) = &mut value {
            map.insert("resource".to_string(), Value::String(self.resource.clone()));
        }
        Ok(value)
    }

    pub fn to_json(&self) -> Result<String, FrameError> {
        Ok(self.to_value()?.to_string())
    }

    /// Decode a `{type, resource, data}` object
    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        let Value::Object(mut map) = value else {
            return Err(FrameError::NotAnObject);
        };
        let resource = match map.remove("resource") {
            Some(Value::String(resource)) => resource,
            Some(_) => return Err(FrameError::InvalidField("resource")),
            None => return Err(FrameError::MissingField("resource")),
        };
        let kind = map
            .remove("type")
            .ok_or(FrameError::MissingField("type"))?;
        let data = map.remove("data").unwrap_or(Value::Null);

        let event = serde_json::from_value(serde_json::json!({ "type": kind, "data": data }))?;
        Ok(Self { resource, event })
    }
}

/// Any frame a client can receive
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Control(ServerMessage),
    Push(PushMessage),
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameError::MissingField("type"))?;

        if ServerMessage::KINDS.contains(&kind) {
            Ok(Self::Control(serde_json::from_value(value)?))
        } else {
            Ok(Self::Push(PushMessage::from_value(value)?))
        }
    }
}

/// Errors decoding or encoding a frame
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field: {0}")]
    InvalidField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn subset() -> Subset {
        Subset {
            id: 3,
            set_id: 1,
            subset_number: 1,
            reps: 5,
            weight: 100.0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_client_message_deserialize_subscribe() {
        let json = r#"{"type": "subscribe", "resource": "users:1"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                resource: "users:1".to_string()
            }
        );
    }

    #[test]
    fn test_client_message_deserialize_ping() {
        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_server_message_serialize_connected() {
        let msg = ServerMessage::Connected {
            connection_id: "abc-123".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"connection_id\":\"abc-123\""));
    }

    #[test]
    fn test_push_message_wire_shape() {
        let push = PushMessage::new("users:1", Event::SubsetCreated(subset()));
        let value = push.to_value().unwrap();

        assert_eq!(value["type"], "subset_created");
        assert_eq!(value["resource"], "users:1");
        assert_eq!(value["data"]["reps"], 5);
    }

    #[test]
    fn test_inbound_parse_push() {
        let push = PushMessage::new("workouts:2", Event::SubsetCreated(subset()));
        let parsed = InboundFrame::parse(&push.to_json().unwrap()).unwrap();
        assert_eq!(parsed, InboundFrame::Push(push));
    }

    #[test]
    fn test_inbound_parse_control() {
        let parsed = InboundFrame::parse(r#"{"type":"subscribed","resource":"users:4"}"#).unwrap();
        assert_eq!(
            parsed,
            InboundFrame::Control(ServerMessage::Subscribed {
                resource: "users:4".to_string()
            })
        );
    }

    #[test]
    fn test_inbound_parse_rejects_malformed() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"resource":"users:1"}"#).is_err());
        assert!(InboundFrame::parse(r#"{"type":"subset_created","data":{}}"#).is_err());
        // Payload does not match the event's type
        assert!(InboundFrame::parse(
            r#"{"type":"subset_created","resource":"users:1","data":{"name":"x"}}"#
        )
        .is_err());
        assert!(InboundFrame::parse(r#"{"type":"teleported","resource":"users:1"}"#).is_err());
    }

    #[test]
    fn test_resource_validation() {
        assert!(resource::is_valid("users"));
        assert!(resource::is_valid("users:12"));
        assert!(resource::is_valid(&resource::subset(3)));
        assert!(!resource::is_valid("users:"));
        assert!(!resource::is_valid("users:abc"));
        assert!(!resource::is_valid("meals:1"));
        assert!(!resource::is_valid("12"));
    }
}
