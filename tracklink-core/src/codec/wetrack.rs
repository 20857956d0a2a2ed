//! WeTrack: same `7878` binary framing and terminal-bit layout as ET300, but
//! every opcode gets a freshly recomputed short-frame ack (login, status)
//! rather than a header echo, and its status decode has a documented quirk:
//! `charge == false` always reports `TEMPERED`, even stacking on top of an
//! already-set alarm trigram.

use serde_json::Map;

use super::binary::{self, bits_msb_first, decode_fix};
use super::{Ack, FrameCodec};
use crate::error::{DecodeError, DecodeResult};
use crate::frame::{DecodedFrame, LocationFields, StatusFields};

const OP_LOGIN: u8 = 0x01;
const OP_LOCATION: u8 = 0x12;
const OP_STATUS: u8 = 0x13;
const OP_ALARM: u8 = 0x16;

#[derive(Debug, Default)]
pub struct WeTrackCodec;

impl FrameCodec for WeTrackCodec {
    const PORT: u16 = 5004;
    const NAME: &'static str = "wetrack";

    fn decode(&mut self, buf: &[u8]) -> DecodeResult<DecodedFrame> {
        let frame = binary::parse(buf)?;
        let serial_no = Some(frame.serial_no);

        match frame.opcode {
            OP_LOGIN => Ok(DecodedFrame::Login { imei: decode_login_imei(&frame.payload)?, serial_no }),
            OP_STATUS => Ok(DecodedFrame::Status { serial_no, status: decode_status(&frame.payload)? }),
            OP_LOCATION | OP_ALARM => {
                let fix = decode_fix(&frame.payload)?;
                let location = LocationFields {
                    device_time: fix.device_time,
                    satellites: fix.satellites,
                    lat: fix.lat,
                    lng: fix.lng,
                    speed: fix.speed,
                    course: fix.course,
                    gps_tracking: fix.course_bit_tracking,
                    differential: fix.differential,
                    extra: Map::new(),
                };
                let alarm_status = if frame.opcode == OP_ALARM && frame.payload.len() > 27 {
                    Some(decode_status(&frame.payload[27..])?)
                } else {
                    None
                };
                Ok(DecodedFrame::Location { serial_no, location, alarm_status })
            }
            other => Ok(DecodedFrame::Unknown { opcode: format!("{other:02x}") }),
        }
    }

    fn ack(&mut self, _buf: &[u8], frame: &DecodedFrame) -> Ack {
        match frame {
            DecodedFrame::Login { serial_no: Some(serial_no), .. } => {
                Ack::Immediate(binary::computed_short_ack(OP_LOGIN, *serial_no))
            }
            DecodedFrame::Status { serial_no: Some(serial_no), .. } => {
                Ack::Immediate(binary::computed_short_ack(OP_STATUS, *serial_no))
            }
            _ => Ack::None,
        }
    }
}

fn decode_login_imei(payload: &[u8]) -> DecodeResult<String> {
    if payload.is_empty() {
        return Err(DecodeError::Malformed("login payload is empty"));
    }
    let hex: String = payload.iter().map(|b| format!("{b:02x}")).collect();
    Ok(hex[1..].to_string())
}

/// Same terminal-bit layout as ET300: `[0]`=engine-off, `[1]`=tracking,
/// `[2..5]`=alarm trigram, `[5]`=charge, `[6]`=ignition, `[7]`=activated.
/// Unlike ET300, a clear charge bit unconditionally overwrites whatever
/// trigram-derived event status was just set with `TEMPERED` — preserved
/// exactly as the two causes collapsing into one event code.
fn decode_status(a: &[u8]) -> DecodeResult<StatusFields> {
    if a.len() < 5 {
        return Err(DecodeError::Malformed("status payload shorter than 5 bytes"));
    }
    let bits = bits_msb_first(a[0]);
    let mut events = Map::new();
    let mut alarm_status = match (bits[2], bits[3], bits[4]) {
        (true, false, false) => {
            events.insert("sos".into(), true.into());
            Some("SOS")
        }
        (false, true, true) => {
            events.insert("low_battery".into(), true.into());
            Some("LOW_BATTERY")
        }
        (false, true, false) => {
            events.insert("power_cut".into(), true.into());
            Some("TEMPERED")
        }
        (false, false, true) => {
            events.insert("shock".into(), true.into());
            Some("SHOCK")
        }
        _ => None,
    };

    let charge = bits[5];
    if !charge {
        alarm_status = Some("TEMPERED");
    }

    match a[3] {
        0x01 => events.insert("sos".into(), true.into()),
        0x02 => events.insert("power_cut".into(), true.into()),
        0x03 => events.insert("shock".into(), true.into()),
        0x04 => events.insert("fence_in".into(), true.into()),
        0x05 => events.insert("fence_out".into(), true.into()),
        _ => None,
    };

    let language = match a[4] {
        0x01 => Some("Chinese"),
        0x02 => Some("English"),
        _ => None,
    };

    Ok(StatusFields {
        voltage_level: a[1],
        gsm_signal_strength: a[2],
        ignition: bits[6],
        charge,
        activated: bits[7],
        gps_tracking: bits[1],
        events,
        alarm_status,
        language,
        extra: Map::new(),
    })
}
