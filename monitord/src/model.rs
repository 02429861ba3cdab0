use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const DEVICE_ID_COUNTER: &str = "id:devices";
pub const FLEET_SET: &str = "devices";

/// Closed set of device kinds understood by the RPC transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Drone,
    Sensor,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Drone => "Drone",
            DeviceType::Sensor => "Sensor",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("drone") {
            Ok(DeviceType::Drone)
        } else if s.eq_ignore_ascii_case("sensor") {
            Ok(DeviceType::Sensor)
        } else {
            Err(format!("unknown device type '{s}'"))
        }
    }
}

/// A registered fleet member. The device type is stored as given.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: u64,
    pub name: String,
    pub owner: String,
    pub device_type: String,
}

impl Device {
    pub fn key(id: u64) -> String {
        format!("device:{id}")
    }

    pub fn fields(&self) -> Vec<(String, String)> {
        vec![
            ("name".to_string(), self.name.clone()),
            ("owner".to_string(), self.owner.clone()),
            ("device_type".to_string(), self.device_type.clone()),
            ("id".to_string(), self.id.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
}

/// Latest physical state of a device; each write replaces the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub device_id: u64,
    pub location: Location,
    pub battery: u32,
    pub timestamp: i64,
}

impl StatusRecord {
    pub fn key(device_id: u64) -> String {
        format!("status:{device_id}")
    }

    pub fn fields(&self) -> Vec<(String, String)> {
        vec![
            ("lat".to_string(), self.location.latitude.to_string()),
            ("long".to_string(), self.location.longitude.to_string()),
            ("alt".to_string(), self.location.altitude.to_string()),
            ("battery".to_string(), self.battery.to_string()),
            ("timestamp".to_string(), self.timestamp.to_string()),
        ]
    }
}

/// Application-defined readings, merged field by field into the stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub device_id: u64,
    pub readings: HashMap<String, f32>,
    pub timestamp: i64,
}

impl TelemetryRecord {
    pub fn key(device_id: u64) -> String {
        format!("telemetry:{device_id}")
    }

    pub fn reading_fields(&self) -> Vec<(String, String)> {
        self.readings
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect()
    }

    pub fn timestamp_field(&self) -> Vec<(String, String)> {
        vec![("timestamp".to_string(), self.timestamp.to_string())]
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
