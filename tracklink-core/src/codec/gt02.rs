//! GT02: `(...)` ASCII framing, no acknowledgement on login, login detected
//! by the dedicated `BP05` opcode rather than by trailing any frame that
//! happens to carry an IMEI.

use serde_json::{Map, Value};

use super::ascii;
use super::{Ack, FrameCodec};
use crate::error::DecodeResult;
use crate::frame::{DecodedFrame, LocationFields};

const OP_LOGIN: &str = "BP05";
const OP_LOCATION: &str = "BR00";

#[derive(Debug, Default)]
pub struct Gt02Codec {
    /// Connection-local frame counter, starting at 1 (mirrors the source's
    /// `i = 1` starting value) — GT02 has no wire-level serial field.
    next_serial: u16,
}

impl FrameCodec for Gt02Codec {
    const PORT: u16 = 5003;
    const NAME: &'static str = "gt02";

    fn decode(&mut self, buf: &[u8]) -> DecodeResult<DecodedFrame> {
        let frame = ascii::parse(buf)?;
        let serial = if self.next_serial == 0 { 1 } else { self.next_serial };
        self.next_serial = serial + 1;
        let serial_no = Some(serial);

        match frame.opcode.as_str() {
            OP_LOGIN => Ok(DecodedFrame::Login { imei: frame.imei, serial_no }),
            OP_LOCATION => {
                let fix = ascii::decode_fix(&frame.body)?;
                let io = fix.io_state.as_bytes();
                let mut extra = Map::new();
                extra.insert("ignition".into(), Value::Bool(io.first() == Some(&b'1') && io.get(1) == Some(&b'1')));
                extra.insert("charge".into(), Value::Bool(io.first() == Some(&b'0')));
                extra.insert("temperature".into(), Value::String(fix.io_state[2..5].to_string()));
                extra.insert(
                    "voltage_input".into(),
                    Value::from(decode_voltage(&fix.io_state[5..8])),
                );
                extra.insert("total_distance".into(), Value::from(fix.distance_metres as f64 / 1000.0));

                let location = LocationFields {
                    device_time: fix.device_time,
                    satellites: 0,
                    lat: fix.lat,
                    lng: fix.lng,
                    speed: fix.speed,
                    course: fix.course,
                    gps_tracking: fix.gps_tracking,
                    differential: false,
                    extra,
                };
                Ok(DecodedFrame::Location { serial_no, location, alarm_status: None })
            }
            other => Ok(DecodedFrame::Unknown { opcode: other.to_string() }),
        }
    }

    fn ack(&mut self, _buf: &[u8], _frame: &DecodedFrame) -> Ack {
        Ack::None
    }
}

/// `io_state[5..8]` is three ASCII hex digits read as a base-16-weighted
/// decimal, then scaled by 100 — exactly what the source computes, kept
/// as-is rather than reinterpreted as a plain hex-to-decimal conversion.
fn decode_voltage(digits: &str) -> f64 {
    let mut chars = digits.chars();
    let hi = chars.next().and_then(|c| c.to_digit(16)).unwrap_or(0) as f64;
    let mid = chars.next().and_then(|c| c.to_digit(16)).unwrap_or(0) as f64;
    let lo = chars.next().and_then(|c| c.to_digit(16)).unwrap_or(0) as f64;
    (hi * 256.0 + mid * 16.0 + lo) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_carries_imei_with_no_ack() {
        let raw = "(035566306435BP05)".to_string();
        let mut codec = Gt02Codec::default();
        match codec.decode(raw.as_bytes()).unwrap() {
            DecodedFrame::Login { imei, .. } => assert_eq!(imei, "035566306435"),
            other => panic!("expected Login, got {other:?}"),
        }
        let decoded = codec.decode(raw.as_bytes()).unwrap();
        assert_eq!(codec.ack(raw.as_bytes(), &decoded), Ack::None);
    }

    #[test]
    fn invalid_fix_is_reported_as_not_tracking() {
        let body = "230501V2836.8340N07712.5400E0004212000000009001010010X00002710";
        let raw = format!("(035566306435BR00{body})");
        let mut codec = Gt02Codec::default();
        match codec.decode(raw.as_bytes()).unwrap() {
            DecodedFrame::Location { location, .. } => assert!(!location.gps_tracking),
            other => panic!("expected Location, got {other:?}"),
        }
    }
}
