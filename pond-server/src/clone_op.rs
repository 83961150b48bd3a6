//! The replication client: speaks the query protocol as a peer, not a
//! server. Drives a small async Pond client through STATS or
//! QUERY/COMMIT against a remote peer.

use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use pond_common::proto::{PondHeader, PondRequestCommand, PondResponseCommand, PondStatsPayload};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::instance::Instance;

const REQUEST_ID: u16 = 1;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum CloneError {
    #[error("connecting to {0} timed out")]
    ConnectTimeout(String),
    #[error("connecting to {0} failed: {1}")]
    Connect(String, std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer reported an error: {0}")]
    PeerError(String),
    #[error("unexpected response command {0}")]
    UnexpectedCommand(u16),
    #[error("malformed STATS response")]
    MalformedStats,
    #[error("cancelled")]
    Cancelled,
}

fn encode_request(buf: &mut Vec<u8>, id: u16, command: PondRequestCommand, payload: &[u8]) {
    let header = PondHeader {
        id,
        command: command as u16,
        size: payload.len() as u16,
    };
    header.encode_into(buf);
    buf.extend_from_slice(payload);
}

async fn connect(address: &str) -> Result<TcpStream, CloneError> {
    match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(CloneError::Connect(address.to_owned(), e)),
        Err(_) => Err(CloneError::ConnectTimeout(address.to_owned())),
    }
}

async fn read_frame(stream: &mut TcpStream) -> Result<(u16, u16, Bytes), std::io::Error> {
    let mut header_buf = [0u8; PondHeader::ENCODED_SIZE];
    stream.read_exact(&mut header_buf).await?;
    let mut slice = &header_buf[..];
    let header = PondHeader::decode(&mut slice).expect("fixed-size buffer always decodes");
    let mut payload = vec![0u8; header.size as usize];
    stream.read_exact(&mut payload).await?;
    Ok((header.id, header.command, Bytes::from(payload)))
}

/// Connects to `address`, issues `STATS`, and returns its record count.
/// Used by auto-clone to rank candidate peers before replicating from the
/// one with the most data.
pub async fn fetch_stats(address: &str) -> Result<u64, CloneError> {
    let mut stream = connect(address).await?;

    let mut out = Vec::new();
    encode_request(&mut out, REQUEST_ID, PondRequestCommand::Stats, &[]);
    stream.write_all(&out).await?;

    let (id, command, payload) = read_frame(&mut stream).await?;
    if id != REQUEST_ID {
        return Err(CloneError::UnexpectedCommand(command));
    }
    match PondResponseCommand::from_repr(command) {
        Some(PondResponseCommand::Stats) => {
            let stats = PondStatsPayload::decode(&payload).map_err(|_| CloneError::MalformedStats)?;
            Ok(stats.n_records)
        }
        Some(PondResponseCommand::Error) => Err(CloneError::PeerError(String::from_utf8_lossy(&payload).into_owned())),
        _ => Err(CloneError::UnexpectedCommand(command)),
    }
}

/// Streams every record out of `address` and re-emplaces it locally.
/// Clears the local database only once the first record has actually
/// arrived, so a peer that's merely slow to respond never wipes existing
/// data.
pub async fn run_clone(instance: Rc<Instance>, address: &str, cancel: CancellationToken) -> Result<(), CloneError> {
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(CloneError::Cancelled),
        result = connect(address) => result?,
    };

    let mut out = Vec::new();
    encode_request(&mut out, REQUEST_ID, PondRequestCommand::Query, &[]);
    encode_request(&mut out, REQUEST_ID, PondRequestCommand::Commit, &[]);
    stream.write_all(&out).await?;

    let mut pending_clear = true;
    let mut n_records = 0u64;
    loop {
        let (id, command, payload) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CloneError::Cancelled),
            result = read_frame(&mut stream) => result?,
        };
        if id != REQUEST_ID {
            continue;
        }

        match PondResponseCommand::from_repr(command) {
            Some(PondResponseCommand::Nop) => {}
            Some(PondResponseCommand::Error) => {
                return Err(CloneError::PeerError(String::from_utf8_lossy(&payload).into_owned()));
            }
            Some(PondResponseCommand::End) => {
                debug!(address, n_records, "CLONE finished");
                return Ok(());
            }
            Some(PondResponseCommand::LogRecord) => {
                if pending_clear {
                    pending_clear = false;
                    instance.database.borrow_mut().clear();
                }
                if instance.database.borrow_mut().emplace(payload).is_ok() {
                    n_records += 1;
                }
            }
            Some(PondResponseCommand::Stats) | None => {
                return Err(CloneError::UnexpectedCommand(command));
            }
        }
    }
}
