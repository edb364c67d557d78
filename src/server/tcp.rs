//! TCP listener (§4.6).
//!
//! Each accepted connection gets its own worker task that loops reading
//! 2-byte length-prefixed messages until the peer closes or sends a
//! malformed frame, mirroring `Server/TCP.py`'s per-connection thread.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hickory_proto::serialize::binary::BinEncodable;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::handler::Handler;

use super::{bind_addr, handle_request, try_decode};

pub struct TcpServer {
    shutdown: Arc<Notify>,
    task: tokio::task::JoinHandle<()>,
}

impl TcpServer {
    pub async fn bind(ip: IpAddr, port: u16, root: Arc<dyn Handler>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr(ip, port)).await?;
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(serve(listener, root, shutdown.clone()));
        Ok(TcpServer { shutdown, task })
    }

    /// Stops accepting new connections and waits for the accept loop to
    /// exit. Already-open connections finish their current request but are
    /// not force-closed, matching the original's non-forceful shutdown.
    pub async fn terminate(self) {
        self.shutdown.notify_one();
        let _ = self.task.await;
    }
}

async fn serve(listener: TcpListener, root: Arc<dyn Handler>, shutdown: Arc<Notify>) {
    loop {
        let (stream, peer) = tokio::select! {
            result = listener.accept() => match result {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "TCP accept failed");
                    continue;
                }
            },
            _ = shutdown.notified() => {
                debug!("TCP listener terminating");
                return;
            }
        };

        let root = root.clone();
        tokio::spawn(crate::selflock::SelfLockMutex::scoped(serve_connection(stream, peer, root)));
    }
}

async fn serve_connection(mut stream: TcpStream, peer: SocketAddr, root: Arc<dyn Handler>) {
    let _ = stream.set_nodelay(true);
    loop {
        let mut len_buf = [0u8; 2];
        if stream.read_exact(&mut len_buf).await.is_err() {
            return;
        }
        let len = u16::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        if stream.read_exact(&mut buf).await.is_err() {
            return;
        }

        let Some(request) = try_decode(&buf) else {
            debug!(%peer, "dropped malformed TCP message");
            continue;
        };

        let response = handle_request(root.as_ref(), &request).await;
        let bytes = match response.to_bytes() {
            Ok(b) => b,
            Err(e) => {
                warn!(%peer, error = %e, "failed to encode TCP response");
                return;
            }
        };
        let Ok(out_len) = u16::try_from(bytes.len()) else {
            warn!(%peer, "TCP response too large to frame");
            return;
        };
        if stream.write_all(&out_len.to_be_bytes()).await.is_err() || stream.write_all(&bytes).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
    use hickory_proto::rr::{Name, RecordType};
    use hickory_proto::serialize::binary::BinDecodable;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    struct Echo;
    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, msg: &Message, _stack: &crate::recursion::Stack) -> Result<Message, crate::error::DnsError> {
            let mut resp = Message::new();
            resp.set_id(msg.id());
            resp.set_message_type(MessageType::Response);
            resp.set_response_code(ResponseCode::NoError);
            Ok(resp)
        }
    }

    #[tokio::test]
    async fn test_tcp_server_roundtrip_multiple_messages_and_terminate() {
        let fixed_port = 15354u16;
        let server = match TcpServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), fixed_port, Arc::new(Echo)).await {
            Ok(s) => s,
            Err(_) => return,
        };

        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, fixed_port)).await.unwrap();

        for id in [1u16, 2u16] {
            let mut req = Message::new();
            req.set_id(id);
            let mut q = Query::new();
            q.set_name(Name::from_str("example.com.").unwrap());
            q.set_query_type(RecordType::A);
            req.add_query(q);
            let bytes = req.to_bytes().unwrap();
            stream.write_all(&(bytes.len() as u16).to_be_bytes()).await.unwrap();
            stream.write_all(&bytes).await.unwrap();

            let mut len_buf = [0u8; 2];
            stream.read_exact(&mut len_buf).await.unwrap();
            let len = u16::from_be_bytes(len_buf) as usize;
            let mut resp_buf = vec![0u8; len];
            stream.read_exact(&mut resp_buf).await.unwrap();
            let resp = Message::from_bytes(&resp_buf).unwrap();
            assert_eq!(resp.id(), id);
            assert_eq!(resp.response_code(), ResponseCode::NoError);
        }

        drop(stream);
        server.terminate().await;
    }
}
