//! A connection's in-progress request: the fields accumulated between
//! `QUERY`/`CLONE` and `COMMIT`, plus whatever a committed `QUERY` needs to
//! keep streaming. One instance per connection; reset atomically whenever a
//! new `QUERY` or `CLONE` arrives.

use pond_common::Filter;
use pond_core::{Selection, SiteHandle};

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupSite {
    pub max_sites: u32,
    pub skip_sites: u32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Window {
    pub max: u64,
    pub skip: u64,
}

/// What is currently being built or served for one request `id`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    #[default]
    Idle,
    Query,
    Clone,
}

pub struct RequestState {
    pub id: u16,
    pub command: Command,
    pub filter: Filter,
    pub group_site: Option<GroupSite>,
    pub window: Option<Window>,
    pub follow: bool,
    pub continue_: bool,
    pub last: bool,
    pub selection: Option<Selection>,
    pub site_cursor: Option<SiteHandle>,
    pub address: String,
}

impl Default for RequestState {
    fn default() -> Self {
        RequestState {
            id: 0,
            command: Command::Idle,
            filter: Filter::default(),
            group_site: None,
            window: None,
            follow: false,
            continue_: false,
            last: false,
            selection: None,
            site_cursor: None,
            address: String::new(),
        }
    }
}

impl RequestState {
    /// A new `QUERY`/`CLONE` with request id `id` resets everything.
    pub fn start(&mut self, id: u16, command: Command) {
        *self = RequestState {
            id,
            command,
            ..RequestState::default()
        };
    }

    pub fn match_id(&self, id: u16) -> bool {
        self.id == id && self.command != Command::Idle
    }

    pub fn has_group_site(&self) -> bool {
        self.group_site.is_some()
    }

    pub fn has_window(&self) -> bool {
        self.window.is_some()
    }

    /// Returns to idle, keeping `id` so that further packets pipelined
    /// under this now-dead id can be recognized by `ignore_id` rather than
    /// reviving it (`Request::Clear` does not touch `id` either).
    pub fn clear(&mut self) {
        let id = self.id;
        *self = RequestState::default();
        self.id = id;
    }

    /// A packet for `id` arrives while idle and `id` is the last request
    /// id seen (cleared by CANCEL, COMMIT, or an ERROR) — swallow it
    /// silently rather than erroring a second time or reviving it.
    pub fn ignore_id(&self, id: u16) -> bool {
        self.command == Command::Idle && self.id == id
    }
}
