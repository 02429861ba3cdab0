//! Request and reply values shared by every transport.
//!
//! A reply carries either its payload or a business error in `err`; an empty
//! `err` means success. JSON omits `err` when it is empty.

use crate::model::Location;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exposes the business error embedded in a reply, if any.
pub trait Failer {
    fn failed(&self) -> Option<&str>;
}

fn failed(err: &str) -> Option<&str> {
    if err.is_empty() {
        None
    } else {
        Some(err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub device_type: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegisterReply {
    pub registered: bool,
    pub device_id: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
}

impl RegisterReply {
    pub fn registered(device_id: u64) -> Self {
        Self {
            registered: true,
            device_id,
            err: String::new(),
        }
    }

    pub fn failure(err: impl ToString) -> Self {
        Self {
            registered: false,
            device_id: 0,
            err: err.to_string(),
        }
    }
}

impl Failer for RegisterReply {
    fn failed(&self) -> Option<&str> {
        failed(&self.err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Overridden by the route when the transport addresses the device by path.
    #[serde(default)]
    pub device_id: u64,
    pub location: Location,
    pub battery_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateReply {
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
}

impl UpdateReply {
    pub fn acknowledged(acknowledged: bool) -> Self {
        Self {
            acknowledged,
            err: String::new(),
        }
    }

    pub fn failure(err: impl ToString) -> Self {
        Self {
            acknowledged: false,
            err: err.to_string(),
        }
    }
}

impl Failer for UpdateReply {
    fn failed(&self) -> Option<&str> {
        failed(&self.err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRequest {
    #[serde(default)]
    pub device_id: u64,
    pub readings: HashMap<String, f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryReply {
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
}

impl TelemetryReply {
    pub fn acknowledged(acknowledged: bool) -> Self {
        Self {
            acknowledged,
            err: String::new(),
        }
    }

    pub fn failure(err: impl ToString) -> Self {
        Self {
            acknowledged: false,
            err: err.to_string(),
        }
    }
}

impl Failer for TelemetryReply {
    fn failed(&self) -> Option<&str> {
        failed(&self.err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_err_omitted_on_success() {
        let json = serde_json::to_value(RegisterReply::registered(12)).unwrap();
        assert_eq!(json, serde_json::json!({"registered": true, "device_id": 12}));
    }

    #[test]
    fn test_failure_reply_shape() {
        let reply = RegisterReply::failure("store error: down");
        assert!(!reply.registered);
        assert_eq!(reply.device_id, 0);
        assert_eq!(reply.failed(), Some("store error: down"));

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["err"], "store error: down");
    }

    #[test]
    fn test_register_request_fields_default_to_empty() {
        let req: RegisterRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(req.name, "x");
        assert_eq!(req.owner, "");
        assert_eq!(req.device_type, "");
    }

    #[test]
    fn test_update_request_device_id_defaults() {
        let req: UpdateRequest = serde_json::from_str(
            r#"{"location":{"latitude":1.0,"longitude":2.0,"altitude":3.0},"battery_remaining":70}"#,
        )
        .unwrap();
        assert_eq!(req.device_id, 0);
        assert_eq!(req.battery_remaining, 70);
        assert_eq!(req.location.altitude, 3.0);
    }
}
