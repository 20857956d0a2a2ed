use thiserror::Error;

/// Errors surfaced by the bus boundary: producer construction and
/// per-message send failures. Never fatal to a session — see
/// [`crate::bus::Publisher`].
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to construct bus producer: {0}")]
    Construct(String),

    #[error("bus send failed: {0}")]
    Send(String),
}

/// Configuration load/validate errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),
}

/// Errors that can terminate a protocol worker (bind failure, a panic
/// caught by the supervisor's `JoinSet`). A `ServerError` never
/// propagates past the worker it belongs to — a listener-level error
/// ends that protocol's worker only.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {protocol} listener on port {port}: {source}")]
    Bind { protocol: &'static str, port: u16, #[source] source: std::io::Error },

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Bus(#[from] BusError),

    #[error("protocol worker panicked: {0}")]
    WorkerPanicked(String),
}
