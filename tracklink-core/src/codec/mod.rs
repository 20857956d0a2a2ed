//! Per-protocol frame codecs. Each device family gets its own module
//! implementing [`FrameCodec`]; the session layer is generic over the
//! trait and never special-cases a protocol by name.

mod ascii;
mod binary;
pub mod et300;
pub mod gt02;
pub mod gt06;
pub mod mt05;
pub mod tk103;
pub mod wetrack;

use crate::error::DecodeResult;
use crate::frame::DecodedFrame;
use std::time::Duration;

/// The bytes (and, for GT06 status acks, the delay) a codec wants written
/// back to the device in response to a decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// No acknowledgement required for this frame.
    None,
    /// Write these bytes back immediately.
    Immediate(Vec<u8>),
    /// Write these bytes back after `after` has elapsed, as a detached
    /// timer that tolerates the connection having since closed.
    Delayed { bytes: Vec<u8>, after: Duration },
}

/// Contract every device protocol implements: decode one frame out of a
/// single `read()` buffer, and produce whatever acknowledgement bytes (if
/// any) that frame requires.
///
/// A codec instance is owned by exactly one [`Session`](../../tracklink_server/session/index.html)
/// for the lifetime of one TCP connection, so it is free to carry
/// per-connection state (IMEI, frame-index counters) between calls.
pub trait FrameCodec: Send {
    /// Fixed TCP port this protocol listens on.
    const PORT: u16;

    /// Human-readable protocol name, used in log fields.
    const NAME: &'static str;

    /// Parse a single frame. The server hands over exactly one `read()`
    /// buffer per call; a buffer containing a partial frame is a decode
    /// error, not a request for more bytes.
    fn decode(&mut self, buf: &[u8]) -> DecodeResult<DecodedFrame>;

    /// Build the acknowledgement for a just-decoded frame. Takes the raw
    /// buffer as well as the decoded value: some protocols (ET300's login
    /// and status acks) echo bytes straight out of the original frame
    /// rather than recomputing them from the decoded fields.
    fn ack(&mut self, buf: &[u8], frame: &DecodedFrame) -> Ack;
}
