//! Shared `(...)`-delimited ASCII framing for GT02 and TK103: both wrap an
//! embedded 12-digit IMEI and a 4-character opcode around a fixed-layout
//! location body, and differ only in ack timing and a handful of
//! extra-field names.

use crate::error::{DecodeError, DecodeResult};

pub(crate) struct AsciiFrame {
    pub imei: String,
    pub opcode: String,
    pub body: String,
}

/// Parse `( IMEI(12) OPCODE(4) BODY )`. The frame must be ASCII (not just
/// UTF-8) since every offset below is a byte offset into 7-bit text.
pub(crate) fn parse(buf: &[u8]) -> DecodeResult<AsciiFrame> {
    let text = std::str::from_utf8(buf).map_err(|_| DecodeError::InvalidEncoding)?;
    if !text.is_ascii() {
        return Err(DecodeError::InvalidEncoding);
    }
    if text.len() < 18 {
        return Err(DecodeError::TooShort { need: 18, got: text.len() });
    }
    if !text.starts_with('(') {
        return Err(DecodeError::BadStartMarker(vec![buf[0]]));
    }
    if !text.ends_with(')') {
        return Err(DecodeError::BadStopMarker(vec![buf[buf.len() - 1]]));
    }

    let imei = text[1..13].to_string();
    let opcode = text[13..17].to_string();
    let body = text[17..text.len() - 1].to_string();
    Ok(AsciiFrame { imei, opcode, body })
}

/// The fixed-layout location body shared by GT02 and TK103: date/time,
/// fix validity, lat/lng in degrees+minutes, speed, course, and an 8-char
/// I/O flag tail whose individual bits each protocol interprets itself.
pub(crate) struct AsciiFix {
    pub device_time: String,
    pub lat: f64,
    pub lng: f64,
    pub speed: f64,
    pub course: u16,
    pub gps_tracking: bool,
    /// `[45:53]`: charge (bit 0), ignition (bit 1), temperature (2..5),
    /// voltage input (5..8) — each byte is itself an ASCII hex digit.
    pub io_state: String,
    /// `[54:62]`: total distance in metres, as 8 hex digits.
    pub distance_metres: u32,
}

pub(crate) fn decode_fix(body: &str) -> DecodeResult<AsciiFix> {
    if body.len() < 62 {
        return Err(DecodeError::Malformed("ascii location body shorter than fixed layout"));
    }
    let field = |range: std::ops::Range<usize>| -> DecodeResult<&str> {
        body.get(range).ok_or(DecodeError::Malformed("ascii location body truncated"))
    };

    let lat_deg: f64 = field(7..9)?.parse().map_err(|_| DecodeError::Malformed("bad lat degrees"))?;
    let lat_min: f64 = field(9..16)?.parse().map_err(|_| DecodeError::Malformed("bad lat minutes"))?;
    let mut lat = lat_deg + lat_min / 60.0;
    if field(16..17)? == "S" {
        lat = -lat;
    }

    let lng_deg: f64 = field(17..20)?.parse().map_err(|_| DecodeError::Malformed("bad lng degrees"))?;
    let lng_min: f64 = field(20..27)?.parse().map_err(|_| DecodeError::Malformed("bad lng minutes"))?;
    let mut lng = lng_deg + lng_min / 60.0;
    if field(27..28)? == "W" {
        lng = -lng;
    }

    let speed: f64 = field(28..33)?.parse().map_err(|_| DecodeError::Malformed("bad speed"))?;
    let course: f64 = field(39..45)?.parse().map_err(|_| DecodeError::Malformed("bad course"))?;
    let device_time = format!(
        "20{}-{}-{} {}:{}:{}",
        field(0..2)?,
        field(2..4)?,
        field(4..6)?,
        field(33..35)?,
        field(35..37)?,
        field(37..39)?
    );
    let gps_tracking = field(6..7)? == "A";
    let io_state = field(45..53)?.to_string();
    let distance_metres =
        u32::from_str_radix(field(54..62)?, 16).map_err(|_| DecodeError::Malformed("bad distance hex"))?;

    Ok(AsciiFix {
        device_time,
        lat,
        lng,
        speed,
        course: course as u16,
        gps_tracking,
        io_state,
        distance_metres,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> String {
        // yymmdd=230501 fix=A lat=28°36.8340' N lng=077°12.5400' E
        // speed=00042 hhmmss=120000 course=000090 io=01010010 (pad) distance=00002710
        "230501A2836.8340N07712.5400E0004212000000009001010010X00002710".to_string()
    }

    #[test]
    fn parses_frame_markers_and_fields() {
        let raw = format!("(035566306435BP05{})", sample_body());
        let frame = parse(raw.as_bytes()).unwrap();
        assert_eq!(frame.imei, "035566306435");
        assert_eq!(frame.opcode, "BP05");
    }

    #[test]
    fn rejects_missing_parens() {
        let raw = "035566306435BP05nobody".to_string();
        assert!(parse(raw.as_bytes()).is_err());
    }
}
