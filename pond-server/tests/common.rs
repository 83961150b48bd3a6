//! Shared scaffolding for the protocol integration tests: spin up an
//! `Instance` behind a real loopback TCP listener and drive it with a
//! plain client that speaks the raw frame format.

use std::net::SocketAddr;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use compact_str::CompactString;
use pond_common::proto::{PondHeader, PondRequestCommand, PondResponseCommand};
use pond_common::{HttpMethod, LogDatagram, LogType, Micros, TimePoint};
use pond_core::{Database, RealSystemClock, TokenBucketConfig};
use pond_server::admin::NoCredentials;
use pond_server::instance::Instance;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A clock fixed at a deterministic instant rather than a real wall clock,
/// so token-bucket-adjacent tests stay reproducible.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedSteadyClock;

impl pond_core::SteadyClock for FixedSteadyClock {
    fn now_seconds(&self) -> f64 {
        0.0
    }
}

/// Starts an `Instance` behind a loopback TCP listener with no per-site
/// rate limiting, returning the instance (so a test can inject records
/// directly) and the address to connect test clients to.
pub async fn start_server(capacity: usize) -> (Rc<Instance>, SocketAddr) {
    let database = Database::new(capacity, TokenBucketConfig { rate: -1.0 });
    let instance = Rc::new(Instance::new(database, Box::new(FixedSteadyClock), Box::new(RealSystemClock), None, 0));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback listener");
    let addr = listener.local_addr().unwrap();

    let credentials: Rc<dyn pond_server::admin::CredentialSource> = Rc::new(NoCredentials);
    tokio::task::spawn_local(pond_server::tcp::run(instance.clone(), listener, credentials));

    (instance, addr)
}

pub async fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).await.expect("connect to test server");
    stream.set_nodelay(true).ok();
    stream
}

pub async fn write_frame(stream: &mut TcpStream, id: u16, command: PondRequestCommand, payload: &[u8]) {
    let mut buf = BytesMut::new();
    let header = PondHeader {
        id,
        command: command as u16,
        size: payload.len() as u16,
    };
    header.encode_into(&mut buf);
    buf.extend_from_slice(payload);
    stream.write_all(&buf).await.expect("write frame");
}

pub async fn read_frame(stream: &mut TcpStream) -> (u16, PondResponseCommand, Bytes) {
    let mut header_buf = [0u8; PondHeader::ENCODED_SIZE];
    stream.read_exact(&mut header_buf).await.expect("read header");
    let mut slice = &header_buf[..];
    let header = PondHeader::decode(&mut slice).unwrap();
    let mut payload = vec![0u8; header.size as usize];
    stream.read_exact(&mut payload).await.expect("read payload");
    let command = PondResponseCommand::from_repr(header.command).expect("known response command");
    (header.id, command, Bytes::from(payload))
}

pub fn datagram(site: Option<&str>, log_type: LogType, ts: u64) -> LogDatagram {
    LogDatagram {
        timestamp: Some(TimePoint::from_micros(ts)),
        site: site.map(CompactString::from),
        log_type,
        host: None,
        generator: None,
        http_uri: None,
        http_method: Some(HttpMethod::Get),
        http_status: Some(200),
        duration: Some(Micros::from_micros(1)),
        message: Bytes::from_static(b"hello"),
    }
}

pub fn emplace(instance: &Instance, site: Option<&str>, log_type: LogType, ts: u64) {
    instance.database.borrow_mut().emplace(datagram(site, log_type, ts).to_bytes()).expect("emplace test record");
}
