//! The log receiver: binds a UDP socket, widens its receive buffer, and
//! feeds every datagram into the database.

use std::net::SocketAddr;
use std::rc::Rc;

use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tracing::warn;

use crate::instance::Instance;

/// Datagrams arriving at exactly this size are assumed truncated by the
/// kernel and are never handed to the parser.
const MAX_DATAGRAM_SIZE: usize = 4096;

/// Ask for 4 MiB, then force it past `net.core.rmem_max` if the kernel
/// would otherwise cap a plain `SO_RCVBUF` request.
const RECEIVE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

pub fn bind(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::DGRAM, None)?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;

    if let Err(e) = socket.set_recv_buffer_size(RECEIVE_BUFFER_SIZE) {
        warn!(error = %e, "SO_RCVBUF failed, datagrams may be dropped under load");
    }
    // socket2 has no SO_RCVBUFFORCE wrapper; best-effort widen only.

    UdpSocket::from_std(socket.into())
}

pub async fn run(instance: Rc<Instance>, socket: UdpSocket) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let (n, _peer) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "UDP receive error");
                continue;
            }
        };

        // While a CLONE/auto-clone is in flight, incoming datagrams are
        // dropped uncounted rather than racing the replication's Clear().
        if instance.is_blocked() {
            continue;
        }

        if n == MAX_DATAGRAM_SIZE {
            instance.record_truncated();
            crate::metrics::malformed().inc();
            crate::metrics::received().inc();
            continue;
        }

        let payload = bytes::Bytes::copy_from_slice(&buf[..n]);
        let outcome = instance.database.borrow_mut().check_emplace(payload, instance.steady_clock());
        instance.record_emplace_outcome(&outcome);
        crate::metrics::received().inc();
        match &outcome {
            Err(_) => crate::metrics::malformed().inc(),
            Ok(None) => crate::metrics::discarded().inc(),
            Ok(Some(_)) => {}
        }
    }
}
