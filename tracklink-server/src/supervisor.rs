//! Spawns one worker per enabled protocol and keeps them isolated: a
//! panic or a bind failure in one protocol's accept loop never brings
//! down the others. A `JoinSet` gives each protocol its own supervised
//! task, so one misbehaving decoder can't take the whole process down.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use tracklink_core::codec::{et300::Et300Codec, gt02::Gt02Codec, gt06::Gt06Codec, mt05::Mt05Codec, tk103::Tk103Codec, wetrack::WeTrackCodec};

use crate::bus::Publisher;
use crate::config::Config;
use crate::listener;
use crate::metrics::ConnectionCount;

/// One [`ConnectionCount`] per protocol, keyed by name, so a panicked
/// worker's counters don't get confused with a healthy one's if it is
/// ever restarted.
pub struct Supervisor {
    config: Config,
    publisher: Arc<Publisher>,
}

impl Supervisor {
    pub fn new(config: Config, publisher: Arc<Publisher>) -> Self {
        Self { config, publisher }
    }

    /// Run every enabled protocol's accept loop to completion (normally:
    /// until `shutdown` fires). A worker that returns an error or panics
    /// is logged and dropped from the set; its siblings keep running.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut set = JoinSet::new();

        macro_rules! spawn_worker {
            ($settings:expr, $codec:ty) => {
                if $settings.enabled {
                    let port = $settings.port;
                    let publisher = self.publisher.clone();
                    let connections = Arc::new(ConnectionCount::default());
                    let shutdown = shutdown.clone();
                    set.spawn(async move {
                        let name = <$codec as tracklink_core::codec::FrameCodec>::NAME;
                        let result = listener::run::<$codec>(port, publisher, connections, shutdown).await;
                        (name, result)
                    });
                } else {
                    info!(protocol = <$codec as tracklink_core::codec::FrameCodec>::NAME, "protocol disabled, not starting");
                }
            };
        }

        spawn_worker!(self.config.et300, Et300Codec);
        spawn_worker!(self.config.tk103, Tk103Codec);
        spawn_worker!(self.config.mt05, Mt05Codec);
        spawn_worker!(self.config.gt02, Gt02Codec);
        spawn_worker!(self.config.wetrack, WeTrackCodec);
        spawn_worker!(self.config.gt06, Gt06Codec);

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => info!(protocol = name, "worker stopped"),
                Ok((name, Err(e))) => warn!(protocol = name, error = %e, "worker exited with an error"),
                Err(join_err) => error!(error = %join_err, "protocol worker task panicked"),
            }
        }
    }
}
