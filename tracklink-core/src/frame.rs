//! The decoded-frame data model. `DecodedFrame` is a tagged variant per
//! frame kind, matched exhaustively by callers, and every `decode()` call
//! returns a freshly-built value — nothing here is a shared, mutable
//! prototype.

use serde_json::{Map, Value};

/// A decoded location fix. Sign of `lat`/`lng` and fix validity
/// (`gps_tracking`) are already resolved by the codec's own per-protocol
/// hemisphere/direction rules.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationFields {
    pub device_time: String,
    pub satellites: u8,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub course: u16,
    pub gps_tracking: bool,
    pub differential: bool,
    pub extra: Map<String, Value>,
}

/// A decoded status/terminal-info frame: voltage, signal, ignition/charge
/// flags, and whichever alarm/event flags the protocol's bit layout set.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusFields {
    pub voltage_level: u8,
    pub gsm_signal_strength: u8,
    pub ignition: bool,
    pub charge: bool,
    pub activated: bool,
    pub gps_tracking: bool,
    pub events: Map<String, Value>,
    pub alarm_status: Option<&'static str>,
    pub language: Option<&'static str>,
    pub extra: Map<String, Value>,
}

/// One decoded frame. Every codec's `decode()` returns one of these; the
/// session dispatches on the variant, never on a raw opcode string.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    Login {
        imei: String,
        serial_no: Option<u16>,
    },
    Status {
        serial_no: Option<u16>,
        status: StatusFields,
    },
    /// Location or alarm opcode. `alarm_status` is populated when the
    /// frame also carried appended status bytes (ET300/GT06/WeTrack alarm
    /// frames).
    Location {
        serial_no: Option<u16>,
        location: LocationFields,
        alarm_status: Option<StatusFields>,
    },
    /// GT06 analog sub-frame (opcode `94`).
    Analog {
        serial_no: Option<u16>,
        external_voltage: Option<f64>,
    },
    /// A structurally valid frame whose opcode this codec does not
    /// interpret. Produces no publication and does not end the session.
    Unknown {
        opcode: String,
    },
}

impl DecodedFrame {
    pub fn serial_no(&self) -> Option<u16> {
        match self {
            DecodedFrame::Login { serial_no, .. }
            | DecodedFrame::Status { serial_no, .. }
            | DecodedFrame::Location { serial_no, .. }
            | DecodedFrame::Analog { serial_no, .. } => *serial_no,
            DecodedFrame::Unknown { .. } => None,
        }
    }
}
