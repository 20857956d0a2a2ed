//! ET300: the baseline `7878` binary protocol every other binary codec in
//! this crate is a variant of.

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
pub struct Et300Codec;

impl FrameCodec for Et300Codec {
    const PORT: u16 = 5000;
    const NAME: &'static str = "et300";

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

    fn ack(&mut self, buf: &[u8], frame: &DecodedFrame) -> Ack {
        match frame {
            // The source's generic `server_response` echoes the header for
            // every opcode it's invoked on; ET300 only invokes it for login.
            DecodedFrame::Login { .. } => match binary::parse(buf) {
                Ok(parsed) => Ack::Immediate(binary::echo_ack(buf, &parsed)),
                Err(_) => Ack::None,
            },
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

/// Shared ET300/WeTrack terminal-bit layout: `[0]`=engine-off, `[1]`=gps
/// tracking, `[2..5]`=alarm trigram, `[5]`=charge, `[6]`=ignition,
/// `[7]`=activated.
fn decode_status(a: &[u8]) -> DecodeResult<StatusFields> {
    if a.len() < 5 {
        return Err(DecodeError::Malformed("status payload shorter than 5 bytes"));
    }
    let bits = bits_msb_first(a[0]);
    let mut events = Map::new();
    let alarm_status = match (bits[2], bits[3], bits[4]) {
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
        charge: bits[5],
        activated: bits[7],
        gps_tracking: bits[1],
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
    fn decodes_login_dropping_leading_nibble() {
        let payload = [0x03, 0x55, 0x63, 0x70, 0x64, 0x43, 0x24, 0x91];
        let frame = build_frame(OP_LOGIN, &payload, 1);
        let mut codec = Et300Codec;
        match codec.decode(&frame).unwrap() {
            DecodedFrame::Login { imei, .. } => assert_eq!(imei, "355637064432491"),
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn decodes_location_with_tracking_and_sign_flips() {
        // year 23, month 5, day 1, 12:00:00
        let mut payload = vec![23, 5, 1, 12, 0, 0, 0x08];
        // lat/lng raw chosen so deg ~ 28.6139 / 77.2090
        let lat_raw = (28.6139_f64 * 60.0 * 30000.0).round() as u32;
        let lng_raw = (77.2090_f64 * 60.0 * 30000.0).round() as u32;
        payload.extend_from_slice(&lat_raw.to_be_bytes());
        payload.extend_from_slice(&lng_raw.to_be_bytes());
        payload.push(42); // speed
        // tracking bit (0x1000) set, south clear; bit 5 (0x0400) set so the
        // west-when-0 quirk does NOT fire, course = 90
        let course_word: u16 = 0x1000 | 0x0400 | 90;
        payload.extend_from_slice(&course_word.to_be_bytes());

        let frame = build_frame(OP_LOCATION, &payload, 1);
        let mut codec = Et300Codec;
        match codec.decode(&frame).unwrap() {
            DecodedFrame::Location { location, alarm_status, .. } => {
                assert!((location.lat - 28.6139).abs() < 1e-3);
                assert!((location.lng - 77.2090).abs() < 1e-3);
                assert_eq!(location.speed, 42.0);
                assert_eq!(location.course, 90);
                assert!(location.gps_tracking);
                assert!(alarm_status.is_none());
            }
            other => panic!("expected Location, got {other:?}"),
        }
    }

    #[test]
    fn unknown_opcode_is_not_an_error() {
        let frame = build_frame(0xEE, &[0x01], 1);
        let mut codec = Et300Codec;
        assert!(matches!(codec.decode(&frame).unwrap(), DecodedFrame::Unknown { .. }));
    }
}
