//! Pure functions translating decoded frames into the three canonical
//! outbound records. Nothing here touches the network, the clock, or the
//! bus — callers pass in `now` and get back the records to publish.

use crate::frame::{LocationFields, StatusFields};
use crate::record::{topic, EventRecord, EventStatus, LocationRecord, StatusRecord};

/// One canonical record tagged with the topic it belongs on.
#[derive(Debug, Clone)]
pub enum OutboundRecord {
    Event(EventRecord),
    Location(LocationRecord),
    Status(StatusRecord),
}

impl OutboundRecord {
    pub fn topic(&self) -> &'static str {
        match self {
            OutboundRecord::Event(_) => topic::EVENTS,
            OutboundRecord::Location(_) => topic::LOCATION,
            OutboundRecord::Status(_) => topic::STATUS,
        }
    }

    /// The `imei` every variant carries. The publisher drops a record
    /// whose `imei` is empty rather than forwarding it to the bus.
    pub fn imei(&self) -> &str {
        match self {
            OutboundRecord::Event(e) => &e.imei,
            OutboundRecord::Location(l) => &l.imei,
            OutboundRecord::Status(s) => &s.imei,
        }
    }

    /// Serialize to the UTF-8 JSON payload the bus carries.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            OutboundRecord::Event(e) => serde_json::to_vec(e),
            OutboundRecord::Location(l) => serde_json::to_vec(l),
            OutboundRecord::Status(s) => serde_json::to_vec(s),
        }
    }
}

/// `^[0-9]+$`, matching the source's login-gating regex.
pub fn is_valid_imei(imei: &str) -> bool {
    !imei.is_empty() && imei.bytes().all(|b| b.is_ascii_digit())
}

pub fn online_event(imei: &str, serial_no: Option<u16>, now: i64) -> OutboundRecord {
    OutboundRecord::Event(EventRecord::new(imei, EventStatus::Online, now, serial_no))
}

pub fn offline_event(imei: &str, serial_no: Option<u16>, now: i64) -> OutboundRecord {
    OutboundRecord::Event(EventRecord::new(imei, EventStatus::Offline, now, serial_no))
}

/// A status frame always publishes a status record; if its alarm trigram
/// (or GT06's immobilizer bit) fired, it also publishes the matching event.
pub fn status(imei: &str, status: &StatusFields, serial_no: Option<u16>, now: i64) -> Vec<OutboundRecord> {
    let mut out = vec![OutboundRecord::Status(StatusRecord {
        imei: imei.to_string(),
        voltage_level: status.voltage_level,
        gsm_signal_strength: status.gsm_signal_strength,
        ignition: status.ignition,
        charge: status.charge,
        activated: status.activated,
        gps_tracking: status.gps_tracking,
        events: status.events.clone(),
        language: status.language,
        timestamp: now,
        serial_no,
        extra: status.extra.clone(),
    })];

    if let Some(alarm) = status.alarm_status {
        out.push(OutboundRecord::Event(EventRecord {
            imei: imei.to_string(),
            status: alarm,
            timestamp: now,
            serial_no,
        }));
    }
    out
}

/// A location/alarm frame publishes a location record only when the fix is
/// valid; otherwise it publishes `INVALID_LOCATION` instead. An alarm
/// frame's appended status bytes additionally go through [`status`].
pub fn location(
    imei: &str,
    location: &LocationFields,
    alarm_status: Option<&StatusFields>,
    serial_no: Option<u16>,
    now: i64,
) -> Vec<OutboundRecord> {
    if !location.gps_tracking {
        return vec![OutboundRecord::Event(EventRecord::new(imei, EventStatus::InvalidLocation, now, serial_no))];
    }

    let mut out = vec![OutboundRecord::Location(LocationRecord {
        imei: imei.to_string(),
        device_time: location.device_time.clone(),
        lat: location.lat,
        lng: location.lng,
        speed: location.speed,
        course: location.course,
        satellites: location.satellites,
        gps_tracking: location.gps_tracking,
        gps_accuracy: if location.differential { "differential positioning" } else { "real-time" },
        timestamp: now,
        serial_no,
        extra: location.extra.clone(),
    })];

    if let Some(alarm) = alarm_status {
        out.extend(status(imei, alarm, serial_no, now));
    }
    out
}

/// Merge a GT06 analog reading into the session's last known status frame
/// (or a zeroed one, if none has arrived yet) and publish the result as a
/// status record — matching the source's `analog()` reusing `self._status`.
pub fn analog_status(last_status: Option<&StatusFields>, external_voltage: Option<f64>) -> StatusFields {
    let mut merged = last_status.cloned().unwrap_or_else(|| StatusFields {
        voltage_level: 0,
        gsm_signal_strength: 0,
        ignition: false,
        charge: false,
        activated: false,
        gps_tracking: false,
        events: Default::default(),
        alarm_status: None,
        language: None,
        extra: Default::default(),
    });
    if let Some(voltage) = external_voltage {
        let mut analog = serde_json::Map::new();
        analog.insert("external_voltage".into(), voltage.into());
        merged.events.insert("analog".into(), analog.into());
    }
    merged
}
