//! TK103: same `(...)` ASCII framing as GT02, but with an explicit login ack
//! and two further configuration acks keyed by connection-local frame
//! index rather than by opcode (the source's `i == 1` / `i == 2` checks).

use serde_json::{Map, Value};

use super::ascii;
use super::{Ack, FrameCodec};
use crate::error::DecodeResult;
use crate::frame::{DecodedFrame, LocationFields};

const OP_LOGIN: &str = "BP05";
const OP_LOCATION: &str = "BR00";

#[derive(Debug, Default)]
pub struct Tk103Codec {
    /// 0-based index of the frame most recently decoded, mirrors the
    /// source's free-running `i` counter.
    frame_index: Option<u32>,
    imei: Option<String>,
}

impl FrameCodec for Tk103Codec {
    const PORT: u16 = 5001;
    const NAME: &'static str = "tk103";

    fn decode(&mut self, buf: &[u8]) -> DecodeResult<DecodedFrame> {
        let frame = ascii::parse(buf)?;
        self.frame_index = Some(self.frame_index.map_or(0, |i| i + 1));
        let serial_no = self.frame_index.map(|i| (i + 1) as u16);

        let result = match frame.opcode.as_str() {
            OP_LOGIN => {
                self.imei = Some(frame.imei.clone());
                DecodedFrame::Login { imei: frame.imei, serial_no }
            }
            OP_LOCATION => {
                let fix = ascii::decode_fix(&frame.body)?;
                let io = fix.io_state.as_bytes();
                let mut extra = Map::new();
                let charge = io.first() == Some(&b'0');
                extra.insert("charge".into(), Value::Bool(charge));
                extra.insert("ignition".into(), Value::Bool(io.get(1) == Some(&b'1')));
                extra.insert("temperature".into(), Value::String(fix.io_state[2..5].to_string()));
                extra.insert("voltage_input".into(), Value::String(fix.io_state[5..8].to_string()));
                extra.insert("distance".into(), Value::from(fix.distance_metres as f64 / 1000.0));
                if !charge {
                    extra.insert("alarm_status".into(), Value::String("TEMPERED".into()));
                }

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
                DecodedFrame::Location { serial_no, location, alarm_status: None }
            }
            other => DecodedFrame::Unknown { opcode: other.to_string() },
        };
        Ok(result)
    }

    fn ack(&mut self, _buf: &[u8], frame: &DecodedFrame) -> Ack {
        let mut out = Vec::new();
        if let DecodedFrame::Login { imei, .. } = frame {
            out.extend_from_slice(format!("({imei}AP05)").as_bytes());
        }
        if let (Some(index), Some(imei)) = (self.frame_index, &self.imei) {
            match index {
                1 => out.extend_from_slice(format!("({imei}AR05000A)").as_bytes()),
                2 => out.extend_from_slice(format!("({imei}AR06003C)").as_bytes()),
                _ => {}
            }
        }
        if out.is_empty() {
            Ack::None
        } else {
            Ack::Immediate(out)
        }
    }
}
