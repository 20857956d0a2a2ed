//! GT06: `7878`/`7979` binary framing, a canned (not recomputed) login/status
//! ack, and an analog sub-frame carried under opcode `94`. Status-bit layout
//! is shifted by one position relative to ET300/WeTrack, and alarm frames
//! append their status bytes 1 byte earlier (offset 26, not 27).

use std::time::Duration;

use serde_json::Map;

use super::binary::{self, bits_msb_first, decode_fix, GT06_CANNED_ACK};
use super::{Ack, FrameCodec};
use crate::error::{DecodeError, DecodeResult};
use crate::frame::{DecodedFrame, LocationFields, StatusFields};

const OP_LOGIN: u8 = 0x01;
const OP_LOCATION: u8 = 0x12;
const OP_STATUS: u8 = 0x13;
const OP_ALARM: u8 = 0x16;
const OP_ANALOG: u8 = 0x94;

const STATUS_ACK_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
pub struct Gt06Codec {
    /// The terminal's last reported tracking bit, carried forward onto the
    /// next location frame (the source reads `self._status['gps_tracking']`
    /// inside `location()`, i.e. the most recently decoded status frame).
    last_gps_tracking: bool,
}

impl FrameCodec for Gt06Codec {
    const PORT: u16 = 5005;
    const NAME: &'static str = "gt06";

    fn decode(&mut self, buf: &[u8]) -> DecodeResult<DecodedFrame> {
        let frame = binary::parse(buf)?;
        let serial_no = Some(frame.serial_no);

        match frame.opcode {
            OP_LOGIN => Ok(DecodedFrame::Login { imei: decode_login_imei(&frame.payload)?, serial_no }),
            OP_STATUS => {
                let status = decode_status(&frame.payload)?;
                self.last_gps_tracking = status.gps_tracking;
                Ok(DecodedFrame::Status { serial_no, status })
            }
            OP_LOCATION | OP_ALARM => {
                let fix = decode_fix(&frame.payload)?;
                let location = LocationFields {
                    device_time: fix.device_time,
                    satellites: fix.satellites,
                    lat: fix.lat,
                    lng: fix.lng,
                    speed: fix.speed,
                    course: fix.course,
                    gps_tracking: self.last_gps_tracking,
                    differential: fix.differential,
                    extra: Map::new(),
                };
                let alarm_status = if frame.opcode == OP_ALARM && frame.payload.len() > 26 {
                    let status = decode_status(&frame.payload[26..])?;
                    self.last_gps_tracking = status.gps_tracking;
                    Some(status)
                } else {
                    None
                };
                Ok(DecodedFrame::Location { serial_no, location, alarm_status })
            }
            OP_ANALOG => {
                let external_voltage = if frame.payload.first() == Some(&0x00) && frame.payload.len() >= 3 {
                    let raw = u16::from_be_bytes([frame.payload[1], frame.payload[2]]);
                    Some(raw as f64 / 100.0)
                } else {
                    None
                };
                Ok(DecodedFrame::Analog { serial_no, external_voltage })
            }
            other => Ok(DecodedFrame::Unknown { opcode: format!("{other:02x}") }),
        }
    }

    fn ack(&mut self, _buf: &[u8], frame: &DecodedFrame) -> Ack {
        match frame {
            DecodedFrame::Login { .. } => Ack::Immediate(GT06_CANNED_ACK.to_vec()),
            DecodedFrame::Status { .. } => Ack::Delayed { bytes: GT06_CANNED_ACK.to_vec(), after: STATUS_ACK_DELAY },
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

/// GT06's terminal-bit layout, shifted by one position relative to
/// ET300/WeTrack: `[1]`=ignition, `[2]`=charge, `[3..6]`=alarm trigram,
/// `[6]`=gps-tracking, `[7]`=immobilizer (`ENGINE_CUT`). There is no
/// `activated` bit; GT06 never reports it.
fn decode_status(a: &[u8]) -> DecodeResult<StatusFields> {
    if a.len() < 5 {
        return Err(DecodeError::Malformed("status payload shorter than 5 bytes"));
    }
    let bits = bits_msb_first(a[0]);
    let mut events = Map::new();
    let alarm_status = match (bits[3], bits[4], bits[5]) {
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
    let alarm_status = if bits[7] {
        events.insert("immobilizer".into(), true.into());
        Some("ENGINE_CUT")
    } else {
        alarm_status
    };

    let language = match a[4] {
        0x01 => Some("Chinese"),
        0x02 => Some("English"),
        _ => None,
    };

    Ok(StatusFields {
        voltage_level: a[1],
        gsm_signal_strength: a[2],
        ignition: bits[1],
        charge: bits[2],
        activated: false,
        gps_tracking: bits[6],
        events,
        alarm_status,
        language,
        extra: Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc16_x25;

    fn build_frame(opcode: u8, payload: &[u8], serial_no: u16) -> Vec<u8> {
        let mut body = vec![opcode];
        body.extend_from_slice(payload);
        body.extend_from_slice(&serial_no.to_be_bytes());
        // the wire length field counts opcode+payload+serial+crc, so it
        // runs 2 bytes ahead of `body` (which doesn't include the crc yet).
        let length = (body.len() + 2) as u8;
        let mut crc_region = vec![length];
        crc_region.extend_from_slice(&body);
        let crc = crc16_x25(&crc_region);

        let mut frame = vec![0x78, 0x78, length];
        frame.extend_from_slice(&body);
        frame.extend_from_slice(&crc.to_be_bytes());
        frame.extend_from_slice(&[0x0D, 0x0A]);
        frame
    }

    #[test]
    fn login_ack_is_canned_not_recomputed() {
        let payload = [0x03, 0x55, 0x63, 0x70, 0x64, 0x43, 0x24, 0x91];
        let frame = build_frame(OP_LOGIN, &payload, 77);
        let mut codec = Gt06Codec::default();
        let decoded = codec.decode(&frame).unwrap();
        assert_eq!(codec.ack(&frame, &decoded), Ack::Immediate(GT06_CANNED_ACK.to_vec()));
    }

    #[test]
    fn status_ack_is_delayed_ten_seconds() {
        let payload = [0b0010_1000, 4, 3, 0x01, 0x02];
        let frame = build_frame(OP_STATUS, &payload, 1);
        let mut codec = Gt06Codec::default();
        let decoded = codec.decode(&frame).unwrap();
        match codec.ack(&frame, &decoded) {
            Ack::Delayed { after, .. } => assert_eq!(after, STATUS_ACK_DELAY),
            other => panic!("expected Delayed ack, got {other:?}"),
        }
    }

    #[test]
    fn sos_trigram_sets_event_and_alarm_status() {
        // bits[3..6] = '100' -> SOS
        let payload = [0b0001_0000, 4, 3, 0x00, 0x00];
        let frame = build_frame(OP_STATUS, &payload, 1);
        let mut codec = Gt06Codec::default();
        match codec.decode(&frame).unwrap() {
            DecodedFrame::Status { status, .. } => {
                assert_eq!(status.alarm_status, Some("SOS"));
                assert!(status.events.contains_key("sos"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn location_inherits_tracking_bit_from_last_status() {
        let status_payload = [0b0000_0010, 4, 3, 0x00, 0x00]; // bits[6] = gps_tracking
        let status_frame = build_frame(OP_STATUS, &status_payload, 1);
        let mut codec = Gt06Codec::default();
        codec.decode(&status_frame).unwrap();

        let mut loc_payload = vec![23, 1, 1, 0, 0, 0, 0x08];
        loc_payload.extend_from_slice(&0u32.to_be_bytes());
        loc_payload.extend_from_slice(&0u32.to_be_bytes());
        loc_payload.push(0);
        loc_payload.extend_from_slice(&0u16.to_be_bytes());
        let loc_frame = build_frame(OP_LOCATION, &loc_payload, 2);
        match codec.decode(&loc_frame).unwrap() {
            DecodedFrame::Location { location, .. } => assert!(location.gps_tracking),
            other => panic!("expected Location, got {other:?}"),
        }
    }
}
