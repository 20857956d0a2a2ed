//! Networking, session state, and the bus boundary for the tracker
//! ingest server. Protocol decoding lives in `tracklink-core`; this crate
//! owns everything that touches a socket, a clock, or the outside world.

pub mod bus;
pub mod config;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod session;
pub mod supervisor;

pub use config::Config;
pub use error::ServerError;
pub use supervisor::Supervisor;
