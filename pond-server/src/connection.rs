//! One TCP peer's request-builder state machine, write loop, and
//! append-listener registration. The write side runs as a
//! cooperatively-scheduled async task: `tokio::select!` between "a new
//! packet arrived" and "a write was scheduled", driven by a `Notify`
//! instead of socket-readiness edges.

use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::rc::{Rc, Weak};

use bytes::Bytes;
use pond_common::proto::{
    PondFilterHttpStatusPayload, PondGroupSitePayload, PondHeader, PondRequestCommand, PondResponseCommand, PondWindowPayload,
};
use pond_common::{Filter, LogType};
use pond_core::{AppendListener, Database, Record, SiteHandle};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::admin::PeerCredentials;
use crate::instance::Instance;
use crate::request_state::{Command, GroupSite, RequestState, Window};
use crate::send_queue::SendQueue;

#[derive(Debug, Error)]
#[error("{0}")]
struct ProtocolViolation(String);

impl ProtocolViolation {
    fn new(msg: impl Into<String>) -> Self {
        ProtocolViolation(msg.into())
    }
}

fn encode_frame(buf: &mut Vec<u8>, id: u16, command: PondResponseCommand, payload: &[u8]) {
    let header = PondHeader {
        id,
        command: command as u16,
        size: payload.len() as u16,
    };
    header.encode_into(buf);
    buf.extend_from_slice(payload);
}

fn require_no_nul(payload: &Bytes, name: &str) -> Result<String, ProtocolViolation> {
    if payload.contains(&0u8) {
        return Err(ProtocolViolation::new(format!("Malformed {name}")));
    }
    std::str::from_utf8(payload)
        .map(str::to_owned)
        .map_err(|_| ProtocolViolation::new(format!("Malformed {name}")))
}

fn require_non_empty_no_nul(payload: &Bytes, name: &str) -> Result<String, ProtocolViolation> {
    if payload.is_empty() {
        return Err(ProtocolViolation::new(format!("Malformed {name}")));
    }
    require_no_nul(payload, name)
}

/// A single site with no matching record under `filter`, or every site
/// after `i`, is skipped — used both to land on `GROUP_SITE`'s starting
/// site and to advance past exhausted sites.
fn find_non_empty(db: &Database, mut site: Option<SiteHandle>, filter: &Filter) -> Option<SiteHandle> {
    while let Some(s) = site {
        if let Some(selection) = db.select_at_site(s, filter.clone()) {
            if selection.current().is_some() {
                return Some(s);
            }
        }
        site = db.get_next_site(s);
    }
    None
}

/// The strong owner of a connection's live append-listener registration.
/// Dropping it (on CANCEL, a new QUERY, or a match) lets the old
/// registration's `Weak` fail to upgrade on the next fan-out, which is
/// exactly `AppendListenerSet`'s auto-unlink-on-destruction contract.
struct Follower {
    connection: Weak<Connection>,
}

impl AppendListener for Follower {
    fn on_append(&self, record: &Rc<Record>) -> bool {
        match self.connection.upgrade() {
            Some(conn) => conn.on_follower_append(record),
            None => true,
        }
    }
}

enum FollowUp {
    KeepGoing,
    Done,
    Awaiting,
}

pub struct Connection {
    self_weak: RefCell<Weak<Connection>>,
    instance: Rc<Instance>,
    writer: RefCell<OwnedWriteHalf>,
    send_queue: RefCell<SendQueue>,
    state: RefCell<RequestState>,
    follower: RefCell<Option<Rc<Follower>>>,
    write_scheduled: Cell<bool>,
    notify: Notify,
    peer_admin: bool,
    peer_addr: SocketAddr,
}

impl Connection {
    pub fn new(instance: Rc<Instance>, writer: OwnedWriteHalf, peer_credentials: Option<PeerCredentials>, peer_addr: SocketAddr) -> Rc<Self> {
        let peer_admin = instance.is_local_admin(peer_credentials);
        let conn = Rc::new(Connection {
            self_weak: RefCell::new(Weak::new()),
            instance,
            writer: RefCell::new(writer),
            send_queue: RefCell::new(SendQueue::new()),
            state: RefCell::new(RequestState::default()),
            follower: RefCell::new(None),
            write_scheduled: Cell::new(false),
            notify: Notify::new(),
            peer_admin,
            peer_addr,
        });
        *conn.self_weak.borrow_mut() = Rc::downgrade(&conn);
        conn
    }

    pub async fn run(self: Rc<Self>, mut reader: OwnedReadHalf) {
        loop {
            tokio::select! {
                biased;
                read = Self::read_packet(&mut reader) => {
                    match read {
                        Ok(Some((id, raw_command, payload))) => {
                            if let Err(e) = self.handle_packet(id, raw_command, payload).await {
                                self.send_error(id, &e.0).await;
                            }
                        }
                        Ok(None) => {
                            debug!(peer = %self.peer_addr, "connection closed by peer");
                            break;
                        }
                        Err(e) => {
                            warn!(peer = %self.peer_addr, error = %e, "connection read error");
                            break;
                        }
                    }
                }
                _ = self.notify.notified(), if self.write_scheduled.get() => {
                    self.drive_write().await;
                }
            }
        }
        self.unregister_listener();
    }

    async fn read_packet(reader: &mut OwnedReadHalf) -> std::io::Result<Option<(u16, u16, Bytes)>> {
        let mut header_buf = [0u8; PondHeader::ENCODED_SIZE];
        let n = reader.read(&mut header_buf[..1]).await?;
        if n == 0 {
            return Ok(None);
        }
        reader.read_exact(&mut header_buf[1..]).await?;
        let mut slice = &header_buf[..];
        let header = PondHeader::decode(&mut slice).expect("fixed-size buffer always decodes");

        let mut payload = vec![0u8; header.size as usize];
        reader.read_exact(&mut payload).await?;
        Ok(Some((header.id, header.command, Bytes::from(payload))))
    }

    fn schedule_write(&self) {
        self.write_scheduled.set(true);
        self.notify.notify_one();
    }

    fn unschedule_write(&self) {
        self.write_scheduled.set(false);
    }

    fn unregister_listener(&self) {
        self.follower.borrow_mut().take();
    }

    fn register_listener(&self) {
        let state = self.state.borrow();
        let Some(selection) = state.selection.as_ref() else { return };
        let follower = Rc::new(Follower {
            connection: self.self_weak.borrow().clone(),
        });
        let weak: Weak<dyn AppendListener> = Rc::downgrade(&follower);
        selection.register_follow(weak);
        drop(state);
        *self.follower.borrow_mut() = Some(follower);
    }

    fn on_follower_append(&self, record: &Rc<Record>) -> bool {
        let mut state = self.state.borrow_mut();
        let matched = match state.selection.as_mut() {
            Some(selection) => selection.on_append(record),
            None => return true,
        };
        drop(state);
        if matched {
            self.follower.borrow_mut().take();
            self.schedule_write();
        }
        matched
    }

    async fn send_error(&self, id: u16, message: &str) {
        let mut frame = Vec::new();
        encode_frame(&mut frame, id, PondResponseCommand::Error, message.as_bytes());
        if self.writer.borrow_mut().write_all(&frame).await.is_err() {
            warn!(peer = %self.peer_addr, "failed to send ERROR frame");
        }
        self.unregister_listener();
        self.state.borrow_mut().clear();
        self.unschedule_write();
    }

    async fn send_end(&self, id: u16) {
        let mut frame = Vec::new();
        encode_frame(&mut frame, id, PondResponseCommand::End, &[]);
        let _ = self.writer.borrow_mut().write_all(&frame).await;
    }

    fn require_building(&self, id: u16, name: &str) -> Result<(), ProtocolViolation> {
        let state = self.state.borrow();
        if !state.match_id(id) || state.command != Command::Query {
            return Err(ProtocolViolation::new(format!("Misplaced {name}")));
        }
        Ok(())
    }

    async fn handle_packet(&self, id: u16, raw_command: u16, payload: Bytes) -> Result<(), ProtocolViolation> {
        if self.state.borrow().ignore_id(id) {
            return Ok(());
        }

        if payload.len() > pond_common::proto::MAX_PAYLOAD_SIZE {
            return Err(ProtocolViolation::new(pond_common::ProtocolError::PayloadTooLarge(payload.len()).to_string()));
        }

        let Some(command) = PondRequestCommand::from_repr(raw_command) else {
            return Err(ProtocolViolation::new(pond_common::ProtocolError::UnknownCommand(raw_command).to_string()));
        };

        match command {
            PondRequestCommand::Nop => {}

            PondRequestCommand::Query => {
                self.unschedule_write();
                self.unregister_listener();
                self.state.borrow_mut().start(id, Command::Query);
            }

            PondRequestCommand::Commit => {
                let current_command = {
                    let state = self.state.borrow();
                    if !state.match_id(id) {
                        return Err(ProtocolViolation::new("Misplaced COMMIT"));
                    }
                    state.command
                };
                match current_command {
                    Command::Query => self.commit_query(),
                    Command::Clone => {
                        self.commit_clone()?;
                        self.send_end(id).await;
                    }
                    Command::Idle => return Err(ProtocolViolation::new("Misplaced COMMIT")),
                }
            }

            PondRequestCommand::Cancel => {
                self.unregister_listener();
                self.state.borrow_mut().clear();
                self.unschedule_write();
            }

            PondRequestCommand::FilterSite => {
                self.require_building(id, "FILTER_SITE")?;
                let site = require_no_nul(&payload, "FILTER_SITE")?;
                let mut state = self.state.borrow_mut();
                if state.has_group_site() {
                    return Err(ProtocolViolation::new("FILTER_SITE and GROUP_SITE are mutually exclusive"));
                }
                if !state.filter.sites.insert(site.into()) {
                    return Err(ProtocolViolation::new("Duplicate FILTER_SITE"));
                }
            }

            PondRequestCommand::FilterSince => {
                self.require_building(id, "FILTER_SINCE")?;
                let micros = decode_u64(&payload, "FILTER_SINCE")?;
                let mut state = self.state.borrow_mut();
                if state.filter.timestamp.since != pond_common::TimePoint::MIN {
                    return Err(ProtocolViolation::new("Duplicate FILTER_SINCE"));
                }
                state.filter.timestamp.since = pond_common::TimePoint::from_micros(micros);
            }

            PondRequestCommand::FilterUntil => {
                self.require_building(id, "FILTER_UNTIL")?;
                let micros = decode_u64(&payload, "FILTER_UNTIL")?;
                let mut state = self.state.borrow_mut();
                if state.filter.timestamp.until != pond_common::TimePoint::MAX {
                    return Err(ProtocolViolation::new("Duplicate FILTER_UNTIL"));
                }
                state.filter.timestamp.until = pond_common::TimePoint::from_micros(micros);
            }

            PondRequestCommand::FilterType => {
                self.require_building(id, "FILTER_TYPE")?;
                if payload.len() != 1 {
                    return Err(ProtocolViolation::new("Malformed FILTER_TYPE"));
                }
                let raw = payload[0];
                let log_type = LogType::from_repr(raw).ok_or_else(|| ProtocolViolation::new("Malformed FILTER_TYPE"))?;
                if log_type == LogType::Unspecified {
                    return Err(ProtocolViolation::new("Malformed FILTER_TYPE"));
                }
                let mut state = self.state.borrow_mut();
                if state.filter.log_type != LogType::Unspecified {
                    return Err(ProtocolViolation::new("Duplicate FILTER_TYPE"));
                }
                state.filter.log_type = log_type;
            }

            PondRequestCommand::Follow => {
                {
                    let state = self.state.borrow();
                    if !state.match_id(id) || state.command != Command::Query || state.continue_ {
                        return Err(ProtocolViolation::new("Misplaced FOLLOW"));
                    }
                    if state.follow {
                        return Err(ProtocolViolation::new("Duplicate FOLLOW"));
                    }
                    if state.has_group_site() {
                        return Err(ProtocolViolation::new("FOLLOW and GROUP_SITE are mutually exclusive"));
                    }
                    if state.has_window() {
                        return Err(ProtocolViolation::new("FOLLOW and WINDOW are mutually exclusive"));
                    }
                }
                if !payload.is_empty() {
                    return Err(ProtocolViolation::new("Malformed FOLLOW"));
                }
                self.state.borrow_mut().follow = true;
            }

            PondRequestCommand::Continue => {
                {
                    let state = self.state.borrow();
                    if !state.match_id(id) || state.command != Command::Query || state.follow {
                        return Err(ProtocolViolation::new("Misplaced CONTINUE"));
                    }
                    if state.continue_ {
                        return Err(ProtocolViolation::new("Duplicate CONTINUE"));
                    }
                    if state.has_group_site() {
                        return Err(ProtocolViolation::new("CONTINUE and GROUP_SITE are mutually exclusive"));
                    }
                    if state.has_window() {
                        return Err(ProtocolViolation::new("CONTINUE and WINDOW are mutually exclusive"));
                    }
                }
                if !payload.is_empty() {
                    return Err(ProtocolViolation::new("Malformed CONTINUE"));
                }
                self.state.borrow_mut().continue_ = true;
            }

            PondRequestCommand::Last => {
                self.require_building(id, "LAST")?;
                // Accepted unconditionally alongside FOLLOW/CONTINUE rather
                // than rejected: LAST then wins (seek-to-end-then-scan-back)
                // over a plain forward follow/continue.
                self.state.borrow_mut().last = true;
            }

            PondRequestCommand::GroupSite => {
                self.require_building(id, "GROUP_SITE")?;
                let mut state = self.state.borrow_mut();
                if !state.filter.sites.is_empty() {
                    return Err(ProtocolViolation::new("FILTER_SITE and GROUP_SITE are mutually exclusive"));
                }
                if state.follow || state.continue_ {
                    return Err(ProtocolViolation::new("FOLLOW/CONTINUE and GROUP_SITE are mutually exclusive"));
                }
                if state.has_group_site() {
                    return Err(ProtocolViolation::new("Duplicate GROUP_SITE"));
                }
                let p = PondGroupSitePayload::decode(&payload).map_err(|_| ProtocolViolation::new("Malformed GROUP_SITE"))?;
                if p.max_sites == 0 {
                    return Err(ProtocolViolation::new("Malformed GROUP_SITE"));
                }
                state.group_site = Some(GroupSite {
                    max_sites: p.max_sites,
                    skip_sites: p.skip_sites,
                });
            }

            PondRequestCommand::Window => {
                self.require_building(id, "WINDOW")?;
                let mut state = self.state.borrow_mut();
                if state.follow || state.continue_ {
                    return Err(ProtocolViolation::new("FOLLOW/CONTINUE and WINDOW are mutually exclusive"));
                }
                if state.has_window() {
                    return Err(ProtocolViolation::new("Duplicate WINDOW"));
                }
                let p = PondWindowPayload::decode(&payload).map_err(|_| ProtocolViolation::new("Malformed WINDOW"))?;
                if p.max == 0 {
                    return Err(ProtocolViolation::new("Malformed WINDOW"));
                }
                state.window = Some(Window { max: p.max, skip: p.skip });
            }

            PondRequestCommand::FilterHttpStatus => {
                self.require_building(id, "FILTER_HTTP_STATUS")?;
                let p = PondFilterHttpStatusPayload::decode(&payload).map_err(|_| ProtocolViolation::new("Malformed FILTER_HTTP_STATUS"))?;
                self.state.borrow_mut().filter.http_status = Some(pond_common::HttpStatusRange { begin: p.begin, end: p.end });
            }

            PondRequestCommand::FilterHttpUriStartsWith => {
                self.require_building(id, "FILTER_HTTP_URI_STARTS_WITH")?;
                let prefix = require_non_empty_no_nul(&payload, "FILTER_HTTP_URI_STARTS_WITH")?;
                self.state.borrow_mut().filter.http_uri_starts_with = Some(prefix.into());
            }

            PondRequestCommand::FilterHttpUri => {
                self.require_building(id, "FILTER_HTTP_URI")?;
                let exact = require_no_nul(&payload, "FILTER_HTTP_URI")?;
                self.state.borrow_mut().filter.http_uri_equals = Some(exact.into());
            }

            PondRequestCommand::FilterHost => {
                self.require_building(id, "FILTER_HOST")?;
                let host = require_no_nul(&payload, "FILTER_HOST")?;
                let mut state = self.state.borrow_mut();
                if !state.filter.hosts.insert(host.into()) {
                    return Err(ProtocolViolation::new("Duplicate FILTER_HOST"));
                }
            }

            PondRequestCommand::FilterGenerator => {
                self.require_building(id, "FILTER_GENERATOR")?;
                let generator = require_no_nul(&payload, "FILTER_GENERATOR")?;
                let mut state = self.state.borrow_mut();
                if !state.filter.generators.insert(generator.into()) {
                    return Err(ProtocolViolation::new("Duplicate FILTER_GENERATOR"));
                }
            }

            PondRequestCommand::FilterDurationLonger => {
                self.require_building(id, "FILTER_DURATION_LONGER")?;
                let micros = decode_u64(&payload, "FILTER_DURATION_LONGER")?;
                let mut state = self.state.borrow_mut();
                if state.filter.duration_longer.is_some() {
                    return Err(ProtocolViolation::new("Duplicate FILTER_DURATION_LONGER"));
                }
                state.filter.duration_longer = Some(pond_common::Micros::from_micros(micros));
            }

            PondRequestCommand::FilterHttpMethodUnsafe => {
                self.require_building(id, "FILTER_HTTP_METHOD_UNSAFE")?;
                if !payload.is_empty() {
                    return Err(ProtocolViolation::new("Malformed FILTER_HTTP_METHOD_UNSAFE"));
                }
                self.state.borrow_mut().filter.http_method_unsafe = true;
            }

            PondRequestCommand::FilterHttpMethods => {
                self.require_building(id, "FILTER_HTTP_METHODS")?;
                let mask = decode_u32(&payload, "FILTER_HTTP_METHODS")?;
                self.state.borrow_mut().filter.http_method_mask = Some(pond_common::HttpMethodMask::from_raw(mask));
            }

            PondRequestCommand::Clone => {
                let address = require_non_empty_no_nul(&payload, "CLONE")?;
                self.unschedule_write();
                self.unregister_listener();
                let mut state = self.state.borrow_mut();
                state.start(id, Command::Clone);
                state.address = address;
            }

            PondRequestCommand::InjectLogRecord => {
                if !self.peer_admin {
                    return Err(ProtocolViolation::new("Forbidden"));
                }
                if self.instance.is_blocked() {
                    return Err(ProtocolViolation::new("Blocked"));
                }
                // Parse failures are swallowed uncounted rather than
                // reported back to the injecting peer.
                let _ = self.instance.database.borrow_mut().emplace(payload);
            }

            PondRequestCommand::Stats => {
                let stats = self.instance.stats_payload();
                let mut buf = Vec::new();
                let mut payload_buf = Vec::new();
                stats.encode_into(&mut payload_buf);
                encode_frame(&mut buf, id, PondResponseCommand::Stats, &payload_buf);
                let _ = self.writer.borrow_mut().write_all(&buf).await;
            }

            PondRequestCommand::CancelOperation => {
                self.instance.cancel_blocking_operation();
            }
        }

        Ok(())
    }

    fn commit_query(&self) {
        let now = self.instance.steady_now();
        let mut state = self.state.borrow_mut();
        let filter = state.filter.clone();

        if let Some(gs) = state.group_site {
            let first = {
                let db = self.instance.database.borrow();
                find_non_empty(&db, db.get_first_site(gs.skip_sites as usize), &filter)
            };
            match first {
                None => {
                    // No non-empty site at all: an always-exhausted
                    // placeholder selection, so the write loop's normal
                    // "no more data, no more sites" path sends END.
                    state.selection = Some(self.instance.database.borrow_mut().follow(Filter::default(), now));
                    state.site_cursor = None;
                }
                Some(site) => {
                    state.selection = self.instance.database.borrow().select_at_site(site, filter);
                    state.site_cursor = Some(site);
                }
            }
        } else if state.last {
            drop(state);
            let mut selection = self.instance.database.borrow_mut().follow(filter, now);
            selection.seek_last();
            self.state.borrow_mut().selection = Some(selection);
        } else if state.follow && !state.continue_ {
            let selection = self.instance.database.borrow_mut().follow(filter, now);
            state.selection = Some(selection);
        } else {
            let selection = self.instance.database.borrow_mut().select(filter, now);
            state.selection = Some(selection);
        }

        self.schedule_write();
    }

    /// Starts replication in the background and returns immediately: the
    /// connection that requested CLONE gets an END right after this
    /// returns and is not streamed progress, matching `Connection::CommitClone`
    /// (it sends END, clears `current`, and lets the operation run on
    /// independent of the request that started it).
    fn commit_clone(&self) -> Result<(), ProtocolViolation> {
        if !self.peer_admin {
            return Err(ProtocolViolation::new("Forbidden"));
        }
        let address = self.state.borrow().address.clone();
        let Some(cancel) = self.instance.try_begin_blocking() else {
            return Err(ProtocolViolation::new("Blocked"));
        };

        let instance = self.instance.clone();
        tokio::task::spawn_local(async move {
            if let Err(e) = crate::clone_op::run_clone(instance.clone(), &address, cancel).await {
                warn!(error = %e, "CLONE replication failed");
            }
            instance.end_blocking();
        });

        self.state.borrow_mut().clear();
        Ok(())
    }

    async fn flush_send_queue(&self) -> std::io::Result<()> {
        let mut writer = self.writer.borrow_mut();
        let mut queue = self.send_queue.borrow_mut();
        queue.flush(&mut *writer).await
    }

    fn build_batch(&self, state: &mut RequestState) -> (Vec<u8>, FollowUp) {
        let mut out = Vec::new();
        let Some(selection) = state.selection.as_mut() else {
            return (out, FollowUp::Done);
        };

        selection.fix_deleted();

        if let Some(window) = state.window.as_mut() {
            let mut n_skipped = 0u32;
            while selection.current().is_some() && window.skip > 0 {
                n_skipped += 1;
                if n_skipped > 1 << 20 {
                    // Yield to avoid a DoS via a huge skip count; resume
                    // on the next scheduled turn.
                    return (out, FollowUp::KeepGoing);
                }
                selection.advance();
                window.skip -= 1;
            }
        }

        let cap = state.window.map(|w| w.max).unwrap_or(u64::MAX).min(256);
        let mut n_sent = 0u64;
        while n_sent < cap {
            let Some(record) = selection.current() else { break };
            encode_frame(&mut out, state.id, PondResponseCommand::LogRecord, &record.raw);
            selection.advance();
            n_sent += 1;
        }
        if n_sent > 0 {
            crate::metrics::observe_query_batch_size(n_sent as usize);
        }

        if let Some(window) = state.window.as_mut() {
            window.max = window.max.saturating_sub(n_sent);
            if window.max == 0 {
                encode_frame(&mut out, state.id, PondResponseCommand::End, &[]);
                state.clear();
                return (out, FollowUp::Done);
            }
        }

        if state.selection.as_ref().unwrap().current().is_some() {
            return (out, FollowUp::KeepGoing);
        }

        if let Some(site) = state.site_cursor {
            if let Some(gs) = state.group_site.as_mut() {
                gs.max_sites = gs.max_sites.saturating_sub(1);
                if gs.max_sites > 0 {
                    let db = self.instance.database.borrow();
                    let next = find_non_empty(&db, db.get_next_site(site), &state.filter);
                    if let Some(next_site) = next {
                        let selection = db.select_at_site(next_site, state.filter.clone()).expect("site exists");
                        drop(db);
                        state.site_cursor = Some(next_site);
                        state.selection = Some(selection);
                        return (out, FollowUp::KeepGoing);
                    }
                }
            }
        }

        if state.follow || state.continue_ {
            return (out, FollowUp::Awaiting);
        }

        encode_frame(&mut out, state.id, PondResponseCommand::End, &[]);
        state.clear();
        (out, FollowUp::Done)
    }

    async fn drive_write(&self) {
        loop {
            if let Err(e) = self.flush_send_queue().await {
                warn!(peer = %self.peer_addr, error = %e, "send queue flush failed");
                self.write_scheduled.set(false);
                return;
            }

            let (frame, follow_up) = {
                let mut state = self.state.borrow_mut();
                if state.selection.is_none() {
                    drop(state);
                    self.write_scheduled.set(false);
                    return;
                }
                self.build_batch(&mut state)
            };

            if !frame.is_empty() {
                if let Err(e) = self.writer.borrow_mut().write_all(&frame).await {
                    warn!(peer = %self.peer_addr, error = %e, "write failed");
                    self.write_scheduled.set(false);
                    return;
                }
            }

            match follow_up {
                FollowUp::KeepGoing => continue,
                FollowUp::Done => {
                    self.write_scheduled.set(false);
                    return;
                }
                FollowUp::Awaiting => {
                    self.register_listener();
                    self.write_scheduled.set(false);
                    return;
                }
            }
        }
    }
}

fn decode_u64(payload: &Bytes, name: &str) -> Result<u64, ProtocolViolation> {
    let bytes: [u8; 8] = payload.as_ref().try_into().map_err(|_| ProtocolViolation::new(format!("Malformed {name}")))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_u32(payload: &Bytes, name: &str) -> Result<u32, ProtocolViolation> {
    let bytes: [u8; 4] = payload.as_ref().try_into().map_err(|_| ProtocolViolation::new(format!("Malformed {name}")))?;
    Ok(u32::from_be_bytes(bytes))
}
