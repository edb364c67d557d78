//! TCP upstream client (§4.4, §5).
//!
//! One `TcpClient` wraps a lazily-established, persistent connection guarded
//! by a [`SelfLockMutex`] so a recursive call chain that loops back onto the
//! same connection fails fast instead of deadlocking. Connections are pooled
//! across requests via [`SessionPool`]; messages on the wire are framed with
//! a 2-byte big-endian length prefix per RFC 1035 §4.2.2.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;
use crate::selflock::SelfLockMutex;

use super::endpoint::Endpoint;
use super::protocol::{message_to_entries, Protocol};
use super::session_pool::SessionPool;

/// A persistent TCP connection to one upstream, connected lazily on first
/// use and kept open across queries.
pub struct TcpClient {
    target: SocketAddr,
    conn: SelfLockMutex<Option<TcpStream>>,
}

impl TcpClient {
    pub fn new(target: SocketAddr) -> Arc<Self> {
        Arc::new(TcpClient { target, conn: SelfLockMutex::new(None) })
    }

    async fn ensure_connected(stream_slot: &mut Option<TcpStream>, target: SocketAddr) -> Result<(), DnsError> {
        if stream_slot.is_some() {
            return Ok(());
        }
        let stream = TcpStream::connect(target)
            .await
            .map_err(|e| DnsError::ServerNetworkError(format!("TCP connect to {target} failed: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| DnsError::ServerNetworkError(format!("failed to set TCP_NODELAY for {target}: {e}")))?;
        *stream_slot = Some(stream);
        Ok(())
    }
}

#[async_trait]
impl Protocol for TcpClient {
    async fn query(&self, msg: &Message, timeout: Duration) -> Result<Message, DnsError> {
        let this = self;
        let mut guard = this.conn.lock().await?;

        tokio::time::timeout(timeout, async {
            TcpClient::ensure_connected(&mut guard, this.target).await?;
            let stream = guard.as_mut().expect("connected above");

            let bytes = msg
                .to_bytes()
                .map_err(|e| DnsError::ServerFault(format!("failed to encode DNS message: {e}")))?;
            let len = u16::try_from(bytes.len())
                .map_err(|_| DnsError::ServerFault("DNS message too large for TCP framing".to_string()))?;

            let write_result: Result<(), std::io::Error> = async {
                stream.write_all(&len.to_be_bytes()).await?;
                stream.write_all(&bytes).await?;
                Ok(())
            }
            .await;
            if let Err(e) = write_result {
                *guard = None;
                return Err(DnsError::ServerNetworkError(format!("TCP write to {} failed: {e}", this.target)));
            }

            let read_result: Result<Message, std::io::Error> = async {
                let mut len_buf = [0u8; 2];
                stream.read_exact(&mut len_buf).await?;
                let resp_len = u16::from_be_bytes(len_buf) as usize;
                let mut resp_buf = vec![0u8; resp_len];
                stream.read_exact(&mut resp_buf).await?;
                Ok(Message::from_bytes(&resp_buf).map_err(std::io::Error::other)?)
            }
            .await;

            match read_result {
                Ok(message) => Ok(message),
                Err(e) => {
                    *guard = None;
                    Err(DnsError::ServerNetworkError(format!("TCP read from {} failed: {e}", this.target)))
                }
            }
        })
        .await
        .map_err(|_| DnsError::ServerNetworkError(format!("TCP query to {} timed out", self.target)))?
    }

    async fn terminate(&self) {
        if let Ok(mut guard) = self.conn.lock().await {
            *guard = None;
        }
    }
}

/// [`QuestionHandler`] wrapper pooling [`TcpClient`] connections per
/// endpoint address via [`SessionPool`].
pub struct TcpHandler {
    instance_id: Uuid,
    endpoint: Endpoint,
    timeout: Duration,
    pool: SessionPool<TcpClient>,
}

impl TcpHandler {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        TcpHandler { instance_id: Uuid::new_v4(), endpoint, timeout, pool: SessionPool::new() }
    }
}

#[async_trait]
impl QuestionHandler for TcpHandler {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "TcpHandler.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;

        let ip = self.endpoint.get_ip_addr(&stack).await?;
        let target = SocketAddr::new(ip, self.endpoint.port);
        let remote = target.to_string();

        let client = self.pool.get(|| TcpClient::new(target)).await;
        let result = client.query(&question.make_query_message(), self.timeout).await;
        self.pool.put(&client);

        let response = result?;
        message_to_entries(question, &response, &remote)
    }

    async fn terminate(&self) {
        self.pool.terminate_all().await;
    }
}

impl QuickLookup for TcpHandler {}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::ResponseCode;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
    use std::net::{IpAddr, Ipv4Addr};
    use std::str::FromStr;
    use tokio::net::TcpListener;

    async fn spawn_echo_server() -> (u16, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            loop {
                let mut len_buf = [0u8; 2];
                if stream.read_exact(&mut len_buf).await.is_err() {
                    break;
                }
                let len = u16::from_be_bytes(len_buf) as usize;
                let mut buf = vec![0u8; len];
                stream.read_exact(&mut buf).await.unwrap();
                let req = Message::from_bytes(&buf).unwrap();

                let mut resp = Message::new();
                resp.add_query(req.query().unwrap().clone());
                resp.set_id(req.id());
                resp.set_response_code(ResponseCode::NoError);
                resp.add_answer(Record::from_rdata(
                    Name::from_str("example.com.").unwrap(),
                    300,
                    RData::A(A::new(93, 184, 216, 34)),
                ));
                let bytes = resp.to_bytes().unwrap();
                stream.write_all(&(bytes.len() as u16).to_be_bytes()).await.unwrap();
                stream.write_all(&bytes).await.unwrap();
            }
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_tcp_client_roundtrip_and_reuse() {
        let (port, _handle) = spawn_echo_server().await;
        let client = TcpClient::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
        let question = Question::new(Name::from_str("example.com.").unwrap(), DNSClass::IN, RecordType::A);

        let resp1 = client.query(&question.make_query_message(), Duration::from_secs(2)).await.unwrap();
        assert_eq!(resp1.response_code(), ResponseCode::NoError);

        let resp2 = client.query(&question.make_query_message(), Duration::from_secs(2)).await.unwrap();
        assert_eq!(resp2.answers().len(), 1);
    }

    #[tokio::test]
    async fn test_reentrant_query_on_same_client_is_rejected() {
        let (port, _handle) = spawn_echo_server().await;
        let client = TcpClient::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port));
        let question = Question::new(Name::from_str("example.com.").unwrap(), DNSClass::IN, RecordType::A);

        crate::selflock::SelfLockMutex::scoped(async {
            let _guard = client.conn.lock().await.unwrap();
            let err = client.query(&question.make_query_message(), Duration::from_secs(2)).await.unwrap_err();
            assert!(matches!(err, DnsError::ServerFault(_)));
        })
        .await;
    }
}
