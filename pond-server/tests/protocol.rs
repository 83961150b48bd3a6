//! End-to-end tests driving the query protocol over a real loopback TCP
//! socket: filter narrowing, GROUP_SITE pagination, follow-after-eviction,
//! cancellation and id reuse, plus connection-level error handling
//! (duplicate/forbidden commands).

mod common;

use bytes::Bytes;
use common::*;
use pond_common::LogType;
use pond_common::proto::{PondRequestCommand, PondResponseCommand};

#[tokio::test(flavor = "current_thread")]
async fn query_filter_site_streams_only_that_sites_records_in_order() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (instance, addr) = start_server(1 << 20).await;
            emplace(&instance, Some("a"), LogType::HttpAccess, 1);
            emplace(&instance, Some("b"), LogType::HttpAccess, 2);
            emplace(&instance, Some("a"), LogType::HttpAccess, 3);
            emplace(&instance, Some("c"), LogType::HttpAccess, 4);

            let mut client = connect(addr).await;
            write_frame(&mut client, 1, PondRequestCommand::Query, &[]).await;
            write_frame(&mut client, 1, PondRequestCommand::FilterSite, b"a").await;
            write_frame(&mut client, 1, PondRequestCommand::Commit, &[]).await;

            let (id, cmd, payload) = read_frame(&mut client).await;
            assert_eq!(id, 1);
            assert_eq!(cmd, PondResponseCommand::LogRecord);
            let decoded = pond_common::LogDatagram::decode(payload).unwrap();
            assert_eq!(decoded.site.as_deref(), Some("a"));
            assert_eq!(decoded.timestamp, Some(pond_common::TimePoint::from_micros(1)));

            let (_, cmd2, payload2) = read_frame(&mut client).await;
            assert_eq!(cmd2, PondResponseCommand::LogRecord);
            let decoded2 = pond_common::LogDatagram::decode(payload2).unwrap();
            assert_eq!(decoded2.site.as_deref(), Some("a"));
            assert_eq!(decoded2.timestamp, Some(pond_common::TimePoint::from_micros(3)));

            let (_, end_cmd, _) = read_frame(&mut client).await;
            assert_eq!(end_cmd, PondResponseCommand::End);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn group_site_pagination_starts_at_nth_non_empty_site() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (instance, addr) = start_server(1 << 20).await;
            for (site, ts) in [("a", 1), ("a", 2), ("b", 3), ("b", 4), ("c", 5), ("c", 6)] {
                emplace(&instance, Some(site), LogType::HttpAccess, ts);
            }

            let mut client = connect(addr).await;
            write_frame(&mut client, 2, PondRequestCommand::Query, &[]).await;
            // skip_sites=1: start at the 2nd non-empty site ("b").
            write_frame(&mut client, 2, PondRequestCommand::GroupSite, &[0, 0, 0, 10, 0, 0, 0, 1]).await;
            write_frame(&mut client, 2, PondRequestCommand::Commit, &[]).await;

            let mut records = Vec::new();
            loop {
                let (_, cmd, payload) = read_frame(&mut client).await;
                match cmd {
                    PondResponseCommand::LogRecord => records.push(payload),
                    PondResponseCommand::End => break,
                    other => panic!("unexpected response {other:?}"),
                }
            }
            // b's 2 records then c's 2 records, contiguous per site.
            assert_eq!(records.len(), 4);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn follow_resumes_after_eviction_and_delivers_only_new_records() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            // Small arena: appending a handful more records evicts the
            // ones present when FOLLOW was committed.
            let (instance, addr) = start_server(400).await;
            for ts in 1..=5u64 {
                emplace(&instance, None, LogType::HttpAccess, ts);
            }

            let mut client = connect(addr).await;
            write_frame(&mut client, 3, PondRequestCommand::Query, &[]).await;
            write_frame(&mut client, 3, PondRequestCommand::Follow, &[]).await;
            write_frame(&mut client, 3, PondRequestCommand::Commit, &[]).await;

            for ts in 6..=20u64 {
                emplace(&instance, None, LogType::HttpAccess, ts);
            }

            let (id, cmd, _payload) = read_frame(&mut client).await;
            assert_eq!(id, 3);
            assert_eq!(cmd, PondResponseCommand::LogRecord);
            // A follow selection only ever delivers records appended after
            // COMMIT; the pre-existing ones (now evicted) are never seen.
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn cancel_mid_build_then_unrelated_packet_is_ignored() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (_instance, addr) = start_server(1 << 20).await;
            let mut client = connect(addr).await;

            write_frame(&mut client, 7, PondRequestCommand::Query, &[]).await;
            write_frame(&mut client, 7, PondRequestCommand::FilterSite, b"x").await;
            write_frame(&mut client, 7, PondRequestCommand::Cancel, &[]).await;

            // A further packet for the now-dead id 7 is silently ignored:
            // no ERROR, no response at all for it.
            write_frame(&mut client, 7, PondRequestCommand::FilterSince, &0u64.to_be_bytes()).await;

            // A fresh QUERY with a new id still works normally.
            write_frame(&mut client, 8, PondRequestCommand::Query, &[]).await;
            write_frame(&mut client, 8, PondRequestCommand::Commit, &[]).await;

            let (id, cmd, _) = read_frame(&mut client).await;
            assert_eq!(id, 8);
            assert_eq!(cmd, PondResponseCommand::End);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn duplicate_filter_site_is_a_protocol_error_and_connection_stays_open() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (_instance, addr) = start_server(1 << 20).await;
            let mut client = connect(addr).await;

            write_frame(&mut client, 1, PondRequestCommand::Query, &[]).await;
            write_frame(&mut client, 1, PondRequestCommand::FilterSite, b"a").await;
            write_frame(&mut client, 1, PondRequestCommand::FilterSite, b"a").await;

            let (id, cmd, payload) = read_frame(&mut client).await;
            assert_eq!(id, 1);
            assert_eq!(cmd, PondResponseCommand::Error);
            assert!(!payload.is_empty());

            // Connection survives: a fresh QUERY on a new id works.
            write_frame(&mut client, 2, PondRequestCommand::Query, &[]).await;
            write_frame(&mut client, 2, PondRequestCommand::Commit, &[]).await;
            let (id2, cmd2, _) = read_frame(&mut client).await;
            assert_eq!(id2, 2);
            assert_eq!(cmd2, PondResponseCommand::End);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn follow_and_group_site_are_mutually_exclusive() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (_instance, addr) = start_server(1 << 20).await;
            let mut client = connect(addr).await;

            write_frame(&mut client, 1, PondRequestCommand::Query, &[]).await;
            write_frame(&mut client, 1, PondRequestCommand::Follow, &[]).await;
            write_frame(&mut client, 1, PondRequestCommand::GroupSite, &[0, 0, 0, 1, 0, 0, 0, 0]).await;

            let (_, cmd, _) = read_frame(&mut client).await;
            assert_eq!(cmd, PondResponseCommand::Error);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn stats_reports_capacity_and_record_count() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (instance, addr) = start_server(1 << 20).await;
            emplace(&instance, Some("a"), LogType::HttpAccess, 1);
            emplace(&instance, Some("b"), LogType::HttpAccess, 2);

            let mut client = connect(addr).await;
            write_frame(&mut client, 9, PondRequestCommand::Stats, &[]).await;

            let (id, cmd, payload) = read_frame(&mut client).await;
            assert_eq!(id, 9);
            assert_eq!(cmd, PondResponseCommand::Stats);
            let stats = pond_common::proto::PondStatsPayload::decode(&payload).unwrap();
            assert_eq!(stats.n_records, 2);
            assert_eq!(stats.memory_capacity, 1 << 20);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn inject_log_record_is_forbidden_without_admin_credentials() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (instance, addr) = start_server(1 << 20).await;
            let mut client = connect(addr).await;

            let raw = datagram(Some("a"), LogType::HttpAccess, 1).to_bytes();
            write_frame(&mut client, 1, PondRequestCommand::InjectLogRecord, &raw).await;

            let (_, cmd, payload) = read_frame(&mut client).await;
            assert_eq!(cmd, PondResponseCommand::Error);
            assert_eq!(payload, Bytes::from_static(b"Forbidden"));
            assert_eq!(instance.database.borrow().record_count(), 0);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn oversized_payload_is_a_protocol_error_and_connection_stays_open() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (_instance, addr) = start_server(1 << 20).await;
            let mut client = connect(addr).await;

            // One byte past the 65534 limit, still representable in the
            // header's u16 size field.
            let oversized = vec![0u8; 65535];
            write_frame(&mut client, 1, PondRequestCommand::Nop, &oversized).await;

            let (id, cmd, payload) = read_frame(&mut client).await;
            assert_eq!(id, 1);
            assert_eq!(cmd, PondResponseCommand::Error);
            assert!(!payload.is_empty());

            write_frame(&mut client, 2, PondRequestCommand::Query, &[]).await;
            write_frame(&mut client, 2, PondRequestCommand::Commit, &[]).await;
            let (id2, cmd2, _) = read_frame(&mut client).await;
            assert_eq!(id2, 2);
            assert_eq!(cmd2, PondResponseCommand::End);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn clone_is_forbidden_without_admin_credentials() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let (_instance, addr) = start_server(1 << 20).await;
            let mut client = connect(addr).await;

            write_frame(&mut client, 1, PondRequestCommand::Clone, b"127.0.0.1:1").await;
            write_frame(&mut client, 1, PondRequestCommand::Commit, &[]).await;

            let (_, cmd, payload) = read_frame(&mut client).await;
            assert_eq!(cmd, PondResponseCommand::Error);
            assert_eq!(payload, Bytes::from_static(b"Forbidden"));
        })
        .await;
}
