//! UDP upstream client (§4.4).
//!
//! Unlike TCP and DoH, UDP sessions aren't pooled: §4.4 has each query bind
//! and connect a fresh socket pair rather than reuse one across requests,
//! so there's nothing a pool would buy beyond what creating a new
//! [`tokio::net::UdpSocket`] per call already gives for free.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use tokio::net::UdpSocket;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

use super::endpoint::Endpoint;
use super::protocol::{message_to_entries, Protocol};

/// Max size for the UDP receive buffer, per RFC 6891 §6.2.5.
pub const MAX_RECEIVE_BUFFER_SIZE: usize = 4096;

async fn connect(target: SocketAddr) -> Result<UdpSocket, DnsError> {
    let local = SocketAddr::new(
        match target.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        },
        0,
    );
    let socket = UdpSocket::bind(local)
        .await
        .map_err(|e| DnsError::ServerNetworkError(format!("failed to bind UDP socket: {e}")))?;
    socket
        .connect(target)
        .await
        .map_err(|e| DnsError::ServerNetworkError(format!("failed to connect UDP socket to {target}: {e}")))?;
    Ok(socket)
}

/// Sends one query over a fresh connected UDP socket and decodes the reply.
pub struct UdpClient {
    target: SocketAddr,
}

impl UdpClient {
    pub fn new(target: SocketAddr) -> Self {
        UdpClient { target }
    }
}

#[async_trait]
impl Protocol for UdpClient {
    async fn query(&self, msg: &Message, timeout: Duration) -> Result<Message, DnsError> {
        let socket = connect(self.target).await?;

        let bytes = msg
            .to_bytes()
            .map_err(|e| DnsError::ServerFault(format!("failed to encode DNS message: {e}")))?;
        tokio::time::timeout(timeout, socket.send(&bytes))
            .await
            .map_err(|_| DnsError::ServerNetworkError(format!("UDP send to {} timed out", self.target)))?
            .map_err(|e| DnsError::ServerNetworkError(format!("UDP send to {} failed: {e}", self.target)))?;

        let mut buf = vec![0u8; MAX_RECEIVE_BUFFER_SIZE];
        let read_count = tokio::time::timeout(timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| DnsError::ServerNetworkError(format!("UDP recv from {} timed out", self.target)))?
            .map_err(|e| DnsError::ServerNetworkError(format!("UDP recv from {} failed: {e}", self.target)))?;

        Message::from_bytes(&buf[..read_count])
            .map_err(|e| DnsError::ServerFault(format!("failed to decode DNS response: {e}")))
    }
}

/// [`QuestionHandler`] wrapper resolving `endpoint`'s address on each call
/// and dispatching through a fresh [`UdpClient`].
pub struct UdpHandler {
    instance_id: Uuid,
    endpoint: Endpoint,
    timeout: Duration,
}

impl UdpHandler {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        UdpHandler { instance_id: Uuid::new_v4(), endpoint, timeout }
    }
}

#[async_trait]
impl QuestionHandler for UdpHandler {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "UdpHandler.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;

        let ip = self.endpoint.get_ip_addr(&stack).await?;
        let target = SocketAddr::new(ip, self.endpoint.port);
        let remote = target.to_string();

        let client = UdpClient::new(target);
        let response = client.query(&question.make_query_message(), self.timeout).await?;
        message_to_entries(question, &response, &remote)
    }
}

impl QuickLookup for UdpHandler {}
