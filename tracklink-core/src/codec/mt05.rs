//! MT05: `40 40 LEN(2) IMEI(14) OPCODE(4) PAYLOAD <trailer(4)>` binary
//! envelope wrapping an ASCII, `|`/`,`-delimited GPRMC-like payload. Frames
//! with an invalid GPRMC fix carry no lat/lng/course at all in the source;
//! the codec reports them as a `Location` with `gps_tracking = false` and
//! zeroed fields, leaving the invalid-fix decision to the normalizer.

use serde_json::Map;

use super::{Ack, FrameCodec};
use crate::error::{DecodeError, DecodeResult};
use crate::frame::{DecodedFrame, LocationFields};

const OP_LOGIN: &str = "5000";
const OP_LOCATION: &str = "9955";

struct Mt05Frame {
    imei: String,
    opcode: String,
    content: Vec<u8>,
    /// Last 4 bytes of the inbound frame, echoed verbatim in the login ack.
    trailer: Vec<u8>,
}

fn parse_frame(buf: &[u8]) -> DecodeResult<Mt05Frame> {
    // start(2) + length(2) + imei(7) + opcode(2) + trailer(4) = 17 minimum.
    if buf.len() < 17 {
        return Err(DecodeError::TooShort { need: 17, got: buf.len() });
    }
    if buf[..2] != [0x40, 0x40] {
        return Err(DecodeError::BadStartMarker(buf[..2].to_vec()));
    }
    let imei_bytes = &buf[4..11];
    let imei: String = imei_bytes.iter().map(|b| format!("{b:02x}")).collect();
    let opcode = format!("{:02x}{:02x}", buf[11], buf[12]);
    let content_end = buf.len() - 4;
    if content_end < 13 {
        return Err(DecodeError::LengthMismatch);
    }
    let content = buf[13..content_end].to_vec();
    let trailer = buf[content_end..].to_vec();
    Ok(Mt05Frame { imei, opcode, content, trailer })
}

#[derive(Debug, Default)]
pub struct Mt05Codec {
    /// Connection-local frame counter, starting at 1.
    next_serial: u16,
}

impl FrameCodec for Mt05Codec {
    const PORT: u16 = 5002;
    const NAME: &'static str = "mt05";

    fn decode(&mut self, buf: &[u8]) -> DecodeResult<DecodedFrame> {
        let frame = parse_frame(buf)?;
        let serial = if self.next_serial == 0 { 1 } else { self.next_serial };
        self.next_serial = serial + 1;
        let serial_no = Some(serial);

        match frame.opcode.as_str() {
            OP_LOGIN => Ok(DecodedFrame::Login { imei: frame.imei, serial_no }),
            OP_LOCATION => {
                let body = std::str::from_utf8(&frame.content).map_err(|_| DecodeError::InvalidEncoding)?;
                Ok(DecodedFrame::Location { serial_no, location: decode_location(body)?, alarm_status: None })
            }
            other => Ok(DecodedFrame::Unknown { opcode: other.to_string() }),
        }
    }

    fn ack(&mut self, buf: &[u8], frame: &DecodedFrame) -> Ack {
        if let DecodedFrame::Login { .. } = frame {
            if let Ok(parsed) = parse_frame(buf) {
                // Echo the raw IMEI bytes straight out of the inbound
                // frame, not the hex-string rendering of them.
                let raw_imei = &buf[4..11];
                let mut out = Vec::with_capacity(8 + raw_imei.len() + 2 + parsed.trailer.len());
                out.extend_from_slice(&[0x40, 0x40, 0x00, 0x12]);
                out.extend_from_slice(raw_imei);
                out.extend_from_slice(&[0x40, 0x00]);
                out.extend_from_slice(&parsed.trailer);
                return Ack::Immediate(out);
            }
        }
        Ack::None
    }
}

fn decode_location(body: &str) -> DecodeResult<LocationFields> {
    let sections: Vec<Vec<&str>> = body.split('|').map(|s| s.split(',').collect()).collect();
    let gprmc = sections.first().ok_or(DecodeError::Malformed("mt05 body has no gprmc section"))?;
    if gprmc.len() < 9 || gprmc[1] != "A" {
        return Ok(LocationFields {
            device_time: String::new(),
            satellites: 0,
            lat: 0.0,
            lng: 0.0,
            speed: 0.0,
            course: 0,
            gps_tracking: false,
            differential: false,
            extra: Map::new(),
        });
    }

    let lat_deg: f64 = gprmc[2].get(..2).unwrap_or("0").parse().unwrap_or(0.0);
    let lat_min: f64 = gprmc[2].get(2..).unwrap_or("0").parse().unwrap_or(0.0);
    let mut lat = lat_deg + lat_min / 60.0;
    if gprmc[3] == "S" {
        lat = -lat;
    }

    let lng_deg: f64 = gprmc[4].get(..3).unwrap_or("0").parse().unwrap_or(0.0);
    let lng_min: f64 = gprmc[4].get(3..).unwrap_or("0").parse().unwrap_or(0.0);
    let mut lng = lng_deg + lng_min / 60.0;
    if gprmc[5] == "W" {
        lng = -lng;
    }

    let speed_knots: f64 = gprmc[6].parse().map_err(|_| DecodeError::Malformed("bad mt05 speed"))?;
    let course: f64 = gprmc[7].parse().map_err(|_| DecodeError::Malformed("bad mt05 course"))?;

    let date = gprmc[8];
    let time = gprmc[0];
    let device_time = format!(
        "{}-{}-{} {}:{}:{}",
        date.get(4..).unwrap_or(""),
        date.get(2..4).unwrap_or(""),
        date.get(..2).unwrap_or(""),
        time.get(..2).unwrap_or(""),
        time.get(2..4).unwrap_or(""),
        time.get(4..10).unwrap_or(""),
    );

    let mut extra = Map::new();
    if let Some(hdop_section) = sections.get(1).and_then(|s| s.first()) {
        if let Ok(hdop) = hdop_section.parse::<f64>() {
            extra.insert("hdop".into(), hdop.into());
        }
    }
    if let Some(alt_section) = sections.get(2).and_then(|s| s.first()) {
        if let Ok(alt) = alt_section.parse::<f64>() {
            extra.insert("alt".into(), alt.into());
        }
    }
    if let Some(odometer_section) = sections.get(5).and_then(|s| s.first()).and_then(|s| s.chars().next()) {
        if let Some(odometer) = odometer_section.to_digit(10) {
            extra.insert("odometer".into(), (odometer as f64).into());
        }
    }

    let mut ignition = false;
    let mut charge = true;
    if let Some(status_hex) = sections.get(3).and_then(|s| s.first()) {
        let bits = hex_to_msb_bits(status_hex)?;
        let bit = |i: usize| bits.get(i).copied().unwrap_or(false);
        if bit(0) {
            extra.insert("immobilizer".into(), true.into());
        }
        if bit(1) {
            extra.insert("alarm".into(), true.into());
        }
        if bit(8) {
            extra.insert("sos".into(), true.into());
        }
        if bit(9) {
            extra.insert("power_cut".into(), true.into());
            charge = false;
        }
        ignition = bit(12);
    }
    extra.insert("ignition".into(), ignition.into());
    extra.insert("charge".into(), charge.into());

    if let Some(battery_section) = sections.get(4) {
        if battery_section.len() >= 2 {
            if let Some(gps_battery) = decode_mt05_voltage(battery_section[0]) {
                extra.insert("gps_battery_level".into(), (gps_battery as f64).into());
            }
            if let Some(voltage) = decode_mt05_voltage(battery_section[1]) {
                extra.insert("voltage_level".into(), ((voltage / 4) as f64).into());
            }
        }
    }

    Ok(LocationFields {
        device_time,
        satellites: 0,
        lat,
        lng,
        speed: speed_knots * 1.852,
        course: course as u16,
        gps_tracking: true,
        differential: false,
        extra,
    })
}

/// `(int(hex, 16) * 6) // 1024`, integer division exactly as the source computes it.
fn decode_mt05_voltage(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex, 16).ok().map(|v| (v * 6) / 1024)
}

fn hex_to_msb_bits(hex: &str) -> DecodeResult<Vec<bool>> {
    let nbits = hex.len() * 4;
    let value = u64::from_str_radix(hex, 16).map_err(|_| DecodeError::Malformed("bad mt05 status hex"))?;
    Ok((0..nbits).map(|i| (value >> (nbits - 1 - i)) & 1 == 1).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_fix_yields_non_tracking_location() {
        let body = "120000,V,,,,,,,010523|";
        let location = decode_location(body).unwrap();
        assert!(!location.gps_tracking);
    }

    #[test]
    fn valid_fix_converts_knots_to_kmh() {
        let body = "120000,A,2836.834,N,07712.540,E,10,90,010523|1.2|100|0400|0A,64|5";
        let location = decode_location(body).unwrap();
        assert!(location.gps_tracking);
        assert!((location.speed - 10.0 * 1.852).abs() < 1e-6);
        assert_eq!(location.course, 90);
        assert!(location.lat > 0.0);
        assert!(location.lng > 0.0);
    }

    #[test]
    fn power_cut_bit_clears_charge() {
        // hex "0040" sets the MSB-indexed status bit 9 (power-cut).
        let body = "120000,A,2836.834,N,07712.540,E,10,90,010523|1.2|100|0040|0A,64|5";
        let location = decode_location(body).unwrap();
        assert_eq!(location.extra.get("charge").and_then(|v| v.as_bool()), Some(false));
    }
}
