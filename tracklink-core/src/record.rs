//! Canonical outbound records published to the three bus topics.

use serde::Serialize;
use serde_json::{Map, Value};

/// Fixed topic names. The bus is a compatibility surface: these strings and
/// the record payload shapes below must not change independently of a wire
/// version bump.
pub mod topic {
    pub const EVENTS: &str = "events";
    pub const LOCATION: &str = "location";
    pub const STATUS: &str = "status";
}

/// Canonical event status strings published on the `events` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Online,
    Offline,
    Sos,
    LowBattery,
    Tempered,
    Shock,
    EngineCut,
    InvalidLocation,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Online => "ONLINE",
            EventStatus::Offline => "OFFLINE",
            EventStatus::Sos => "SOS",
            EventStatus::LowBattery => "LOW_BATTERY",
            EventStatus::Tempered => "TEMPERED",
            EventStatus::Shock => "SHOCK",
            EventStatus::EngineCut => "ENGINE_CUT",
            EventStatus::InvalidLocation => "INVALID_LOCATION",
        }
    }
}

/// `{imei, status, timestamp, serial_no?}`, published to the `events` topic.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub imei: String,
    pub status: &'static str,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_no: Option<u16>,
}

impl EventRecord {
    pub fn new(imei: impl Into<String>, status: EventStatus, timestamp: i64, serial_no: Option<u16>) -> Self {
        Self { imei: imei.into(), status: status.as_str(), timestamp, serial_no }
    }
}

/// `{imei, device_time, lat, lng, speed, course, satellites, gps_tracking,
/// gps_accuracy, timestamp, serial_no?, ...extra}`, published to `location`.
#[derive(Debug, Clone, Serialize)]
pub struct LocationRecord {
    pub imei: String,
    pub device_time: String,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub course: u16,
    pub satellites: u8,
    pub gps_tracking: bool,
    pub gps_accuracy: &'static str,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_no: Option<u16>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `{imei, voltage_level, gsm_signal_strength, ignition, charge, activated,
/// gps_tracking, events{...}, language?, timestamp, serial_no?}`, published
/// to `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRecord {
    pub imei: String,
    pub voltage_level: u8,
    pub gsm_signal_strength: u8,
    pub ignition: bool,
    pub charge: bool,
    pub activated: bool,
    pub gps_tracking: bool,
    pub events: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'static str>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_no: Option<u16>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
