//! The length-prefixed TCP wire protocol: header framing, request/response
//! command codes, and the handful of fixed-layout payload structs.
//!
//! Everything here is big-endian.

mod header;
mod payloads;
mod request;
mod response;

pub use header::PondHeader;
pub use payloads::{PondFilterHttpStatusPayload, PondGroupSitePayload, PondStatsPayload, PondWindowPayload};
pub use request::PondRequestCommand;
pub use response::PondResponseCommand;

/// Maximum payload size a single frame may carry.
pub const MAX_PAYLOAD_SIZE: usize = 65534;

/// `DEFAULT_PORT` for the TCP query protocol.
pub const DEFAULT_TCP_PORT: u16 = 5480;

/// `DEFAULT_PORT` for the UDP log receiver, inherited from the log protocol.
pub const DEFAULT_UDP_PORT: u16 = 5479;
