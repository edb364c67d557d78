//! UDP listener (§4.6).
//!
//! Mirrors the original's `threading`-per-datagram worker model with
//! `tokio::spawn`: the accept loop only reads one datagram and hands the
//! rest off, so one slow handler chain never blocks the next client.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hickory_proto::serialize::binary::BinEncodable;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::handler::Handler;

use super::{bind_addr, handle_request, try_decode};

/// Read buffer size for inbound UDP datagrams, matching the client side's
/// `remote::udp::MAX_RECEIVE_BUFFER_SIZE` (RFC 6891 §6.2.5).
const MAX_RECEIVE_BUFFER_SIZE: usize = 4096;

/// A running UDP front door. Dropping this without calling [`terminate`]
/// leaves the accept loop running; always pair construction with shutdown.
pub struct UdpServer {
    shutdown: Arc<Notify>,
    task: tokio::task::JoinHandle<()>,
}

impl UdpServer {
    /// Binds `(ip, port)` and starts serving in the background immediately
    /// (§4.6 "ServeUntilTerminate").
    pub async fn bind(ip: IpAddr, port: u16, root: Arc<dyn Handler>) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(bind_addr(ip, port)).await?);
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(serve(socket, root, shutdown.clone()));
        Ok(UdpServer { shutdown, task })
    }

    /// Stops accepting new datagrams and waits for the accept loop to exit.
    /// In-flight workers are not awaited, matching the original's
    /// fire-and-forget per-request threads.
    pub async fn terminate(self) {
        self.shutdown.notify_one();
        let _ = self.task.await;
    }
}

async fn serve(socket: Arc<UdpSocket>, root: Arc<dyn Handler>, shutdown: Arc<Notify>) {
    let mut buf = vec![0u8; MAX_RECEIVE_BUFFER_SIZE];
    loop {
        let (len, peer) = tokio::select! {
            result = socket.recv_from(&mut buf) => match result {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "UDP recv_from failed");
                    continue;
                }
            },
            _ = shutdown.notified() => {
                debug!("UDP listener terminating");
                return;
            }
        };

        let Some(request) = try_decode(&buf[..len]) else {
            debug!(%peer, "dropped malformed UDP datagram");
            continue;
        };

        let socket = socket.clone();
        let root = root.clone();
        tokio::spawn(async move {
            let response = crate::selflock::SelfLockMutex::scoped(handle_request(root.as_ref(), &request)).await;
            match response.to_bytes() {
                Ok(bytes) => {
                    if let Err(e) = socket.send_to(&bytes, peer).await {
                        warn!(%peer, error = %e, "UDP send_to failed");
                    }
                }
                Err(e) => warn!(%peer, error = %e, "failed to encode UDP response"),
            }
        });
    }
}
