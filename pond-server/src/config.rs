//! Process startup configuration.
//!
//! Nested block-syntax config *file* parsing (`receiver {}`, `listener {}`,
//! `database {}`, `auto_clone yes|no`) is out of scope here; this module is
//! the value type such a parser would populate, plus a `clap`-derived CLI
//! surface for the binary.

use std::net::SocketAddr;
use std::time::Duration;

use pond_common::proto::{DEFAULT_TCP_PORT, DEFAULT_UDP_PORT};

#[derive(clap::Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Maximum memory the record arena may occupy.
    #[arg(long, default_value = "64MiB")]
    pub size: bytesize::ByteSize,

    /// Discard records older than this, checked roughly once a minute.
    /// Unset (the default) disables the retention timer entirely.
    #[arg(long)]
    pub max_age: Option<humantime::Duration>,

    /// Per-site rate limit, in `HTTP_ERROR` messages per second. A
    /// non-positive value (the default) disables rate limiting.
    #[arg(long, default_value_t = -1.0)]
    pub per_site_message_rate_limit: f64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PondArgs {
    /// Address to receive UDP log datagrams on.
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_UDP_PORT)))]
    pub receiver: SocketAddr,

    /// Address to listen for TCP query-protocol connections on.
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_TCP_PORT)))]
    pub listener: SocketAddr,

    /// Address to serve the `/metrics` Prometheus scrape endpoint on.
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], 9090)))]
    pub metrics: SocketAddr,

    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Discover peers and clone their database on startup rather than
    /// starting empty. Peer discovery is left to an injected
    /// `PeerDiscovery` implementation — Zeroconf publication/discovery
    /// lives outside this crate.
    #[arg(long)]
    pub auto_clone: bool,
}

impl PondArgs {
    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(|d| d.into())
    }

    pub fn rate_limit(&self) -> pond_core::TokenBucketConfig {
        pond_core::TokenBucketConfig {
            rate: self.per_site_message_rate_limit,
        }
    }
}
