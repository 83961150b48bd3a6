/// Counters exposed via `PondResponseCommand::Stats` and scraped into
/// Prometheus by `pond-server`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub n_received: u64,
    pub n_malformed: u64,
    pub n_discarded: u64,
}
