use thiserror::Error;

/// Frame decode failures. Every variant maps to an action the session
/// layer takes: `Malformed` and `Incomplete` always end the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame too short: need at least {need} bytes, got {got}")]
    TooShort { need: usize, got: usize },

    #[error("bad start marker: {0:?}")]
    BadStartMarker(Vec<u8>),

    #[error("bad stop marker: {0:?}")]
    BadStopMarker(Vec<u8>),

    #[error("length field does not match frame size")]
    LengthMismatch,

    #[error("checksum verification failed: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("invalid UTF-8 in ASCII frame")]
    InvalidEncoding,

    #[error("malformed frame: {0}")]
    Malformed(&'static str),
}

pub type DecodeResult<T> = Result<T, DecodeError>;
