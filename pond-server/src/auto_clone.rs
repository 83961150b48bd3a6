//! Startup peer discovery and pick-the-biggest-peer replication: discover
//! candidates, ask each one's `STATS`, wait out a window (shortened once
//! the first candidate appears), then clone from whichever peer reports
//! the most records.
//!
//! Zeroconf/Avahi discovery itself needs an mdns client this stack doesn't
//! carry, so it is externalized as [`PeerDiscovery`] — an external
//! collaborator this crate talks to through a trait rather than
//! implements. [`NoDiscovery`] is the default: it finds nothing, so
//! auto-clone is a no-op unless something else implements discovery.

use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::clone_op;
use crate::instance::Instance;

#[async_trait(?Send)]
pub trait PeerDiscovery {
    /// Feeds every peer address it observes into `found` as it discovers
    /// them, for as long as the task lives. `run` drops its receiving end
    /// once the discovery window closes, which is this trait's signal to
    /// stop (a `send` on a closed channel is simply ignored).
    async fn discover(&self, found: mpsc::UnboundedSender<String>);
}

/// The default: finds nothing. Plugging in a real Zeroconf/mdns-backed
/// `PeerDiscovery` is left to whatever deployment wants auto-clone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiscovery;

#[async_trait(?Send)]
impl PeerDiscovery for NoDiscovery {
    async fn discover(&self, _found: mpsc::UnboundedSender<String>) {}
}

/// Full wait with no candidates yet.
const FULL_WINDOW: Duration = Duration::from_secs(90);
/// Once at least one candidate has answered, give stragglers this much
/// longer rather than the full window.
const SHORTENED_WINDOW: Duration = Duration::from_secs(5);

/// Collects discovered peer addresses for up to `FULL_WINDOW`, or
/// `SHORTENED_WINDOW` after the first one arrives, whichever is sooner.
async fn collect_peers(discovery: &dyn PeerDiscovery) -> Vec<String> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let discover = discovery.discover(tx);
    tokio::pin!(discover);

    let mut peers = Vec::new();
    let mut deadline = Instant::now() + FULL_WINDOW;
    let mut discover_done = false;
    loop {
        tokio::select! {
            biased;
            peer = rx.recv() => {
                match peer {
                    Some(peer) => {
                        deadline = deadline.min(Instant::now() + SHORTENED_WINDOW);
                        peers.push(peer);
                    }
                    None => break,
                }
            }
            _ = &mut discover, if !discover_done => { discover_done = true; }
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }
    peers
}

/// Runs once at startup, before the TCP/UDP listeners start accepting
/// traffic — replication completes, or is abandoned, before this instance
/// serves real queries.
pub async fn run(instance: &Rc<Instance>, discovery: &dyn PeerDiscovery) {
    let peers = collect_peers(discovery).await;
    if peers.is_empty() {
        info!("no auto_clone peers found");
        return;
    }

    let mut best: Option<(String, u64)> = None;
    for peer in peers {
        match clone_op::fetch_stats(&peer).await {
            Ok(n_records) => {
                info!(peer = %peer, n_records, "auto_clone candidate");
                if best.as_ref().map(|(_, n)| n_records > *n).unwrap_or(true) {
                    best = Some((peer, n_records));
                }
            }
            Err(e) => warn!(peer = %peer, error = %e, "auto_clone candidate unreachable"),
        }
    }

    let Some((address, n_records)) = best else {
        info!("no auto_clone peer answered STATS");
        return;
    };
    info!(address = %address, n_records, "auto_clone cloning");

    let Some(cancel) = instance.try_begin_blocking() else {
        warn!("auto_clone skipped: instance already blocked");
        return;
    };
    if let Err(e) = clone_op::run_clone(instance.clone(), &address, cancel).await {
        warn!(error = %e, "auto_clone replication failed");
    }
    instance.end_blocking();
}
