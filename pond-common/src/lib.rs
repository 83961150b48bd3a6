//! Wire-level types shared by the storage engine and the protocol server:
//! the log datagram codec, the filter value type, and the TCP query
//! protocol's framing. No I/O, no async runtime dependency.

pub mod datagram;
pub mod error;
pub mod filter;
pub mod http_method;
pub mod log_type;
pub mod proto;
pub mod summary;
pub mod time;

pub use datagram::LogDatagram;
pub use error::{DatagramError, ProtocolError};
pub use filter::{Filter, HttpStatusRange, TimestampWindow};
pub use http_method::{HttpMethod, HttpMethodMask};
pub use log_type::LogType;
pub use summary::Summary;
pub use time::{Micros, TimePoint, UNTIL_GRACE};
