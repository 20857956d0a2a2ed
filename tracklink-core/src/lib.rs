//! Protocol layer for the tracker ingest server: per-device frame codecs,
//! the canonical outbound record shapes, and the pure normalizer that
//! turns one into the other. No networking or I/O lives in this crate —
//! see `tracklink-server` for sessions, listeners, and the bus.

pub mod codec;
pub mod crc;
pub mod error;
pub mod frame;
pub mod normalize;
pub mod record;

pub use codec::{Ack, FrameCodec};
pub use error::{DecodeError, DecodeResult};
pub use frame::{DecodedFrame, LocationFields, StatusFields};
pub use normalize::OutboundRecord;
pub use record::{topic, EventRecord, EventStatus, LocationRecord, StatusRecord};
