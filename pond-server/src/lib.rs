//! The event-loop process around `pond-core`: UDP ingest, the TCP query
//! protocol, replication, and the background retention sweep.

pub mod admin;
pub mod auto_clone;
pub mod clone_op;
pub mod config;
pub mod connection;
pub mod instance;
pub mod metrics;
pub mod metrics_http;
pub mod request_state;
pub mod retention;
pub mod send_queue;
pub mod tcp;
pub mod udp;
