//! The in-memory storage engine: arena-backed record lists, the chronological
//! and per-site orderings, the time-skip acceleration index, filter-aware
//! cursors, and the `Database` facade that ties them together.
//!
//! No networking, no async runtime. `pond-server` drives this from a single
//! cooperative event loop, which is why records are shared via `Rc`/`RefCell`
//! rather than `Arc`/`Mutex` — there is never a second thread to share with.

pub mod arena;
pub mod clock;
pub mod cursor;
pub mod database;
pub mod error;
pub mod list_handle;
pub mod listener;
pub mod per_site;
pub mod record;
pub mod selection;
pub mod skip_index;
pub mod stats;
pub mod token_bucket;

pub use clock::{MockClock, RealSteadyClock, RealSystemClock, SteadyClock, SystemClock};
pub use database::{Database, SiteHandle};
pub use error::EmplaceError;
pub use list_handle::ListHandle;
pub use listener::{AppendListener, AppendListenerSet};
pub use record::Record;
pub use selection::Selection;
pub use stats::Stats;
pub use token_bucket::TokenBucketConfig;
