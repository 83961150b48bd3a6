//! The query-protocol listener: accepts TCP connections and spawns one
//! `Connection` task per peer.

use std::rc::Rc;

use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::admin::CredentialSource;
use crate::connection::Connection;
use crate::instance::Instance;

pub async fn run(instance: Rc<Instance>, listener: TcpListener, credentials: Rc<dyn CredentialSource>) {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "TCP accept error");
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            warn!(peer = %peer_addr, error = %e, "failed to set TCP_NODELAY");
        }

        let peer_credentials = credentials.peer_credentials();
        let (reader, writer) = stream.into_split();
        let connection = Connection::new(instance.clone(), writer, peer_credentials, peer_addr);
        debug!(peer = %peer_addr, "connection accepted");
        tokio::task::spawn_local(connection.run(reader));
    }
}
