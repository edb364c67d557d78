//! DNS-over-HTTPS upstream client (§4.4, RFC 8484).
//!
//! Queries are sent as `GET https://<ip>:<port>/dns-query?dns=<base64url>`
//! with `ct=application/dns-message`. The request URL's *authority* is the
//! upstream's host name, not its IP: a per-client `reqwest::resolve()`
//! override pins that host name to the already-resolved IP, so the
//! connection lands on the right address while TLS SNI and the `Host`
//! header both carry the name — matching §4.4's "TLS verification uses the
//! *name*, not the *IP*". Connection pooling and keep-alive are left to
//! `reqwest`/hyper, as the original delegates them to `requests.Session`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use reqwest::tls::Version as TlsVersion;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

use super::endpoint::Endpoint;
use super::protocol::{message_to_entries, Protocol};
use super::session_pool::SessionPool;

/// One upstream DoH resolver pinned to a resolved `(ip, port)` under a
/// fixed host name used for SNI/`Host`.
pub struct DohClient {
    client: reqwest::Client,
    url: String,
}

impl DohClient {
    pub fn new(host_name: &str, ip: IpAddr, port: u16) -> Result<Arc<Self>, DnsError> {
        let client = reqwest::Client::builder()
            .min_tls_version(TlsVersion::TLS_1_2)
            .resolve(host_name, SocketAddr::new(ip, port))
            .build()
            .map_err(|e| DnsError::ServerFault(format!("failed to build DoH client: {e}")))?;
        Ok(Arc::new(DohClient { client, url: format!("https://{host_name}:{port}/dns-query") }))
    }
}

#[async_trait]
impl Protocol for DohClient {
    async fn query(&self, msg: &Message, timeout: Duration) -> Result<Message, DnsError> {
        let bytes = msg
            .to_bytes()
            .map_err(|e| DnsError::ServerFault(format!("failed to encode DNS message: {e}")))?;
        let encoded = URL_SAFE_NO_PAD.encode(bytes);

        let resp = self
            .client
            .get(&self.url)
            .query(&[("dns", encoded.as_str()), ("ct", "application/dns-message")])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DnsError::ServerNetworkError(format!("DoH request to {} failed: {e}", self.url)))?;

        let body = resp
            .error_for_status()
            .map_err(|e| DnsError::ServerNetworkError(format!("DoH request to {} failed: {e}", self.url)))?
            .bytes()
            .await
            .map_err(|e| DnsError::ServerNetworkError(format!("DoH response body from {} failed: {e}", self.url)))?;

        Message::from_bytes(&body)
            .map_err(|e| DnsError::ServerFault(format!("failed to decode DoH response: {e}")))
    }
}

/// [`QuestionHandler`] wrapper pooling [`DohClient`]s per resolved address
/// via [`SessionPool`], mirroring [`super::tcp::TcpHandler`].
pub struct DohHandler {
    instance_id: Uuid,
    endpoint: Endpoint,
    timeout: Duration,
    pool: SessionPool<DohClient>,
}

impl DohHandler {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        DohHandler { instance_id: Uuid::new_v4(), endpoint, timeout, pool: SessionPool::new() }
    }
}

#[async_trait]
impl QuestionHandler for DohHandler {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "DohHandler.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;

        let ip = self.endpoint.get_ip_addr(&stack).await?;
        let port = self.endpoint.port;
        let host = self.endpoint.host_name.clone().unwrap_or_else(|| ip.to_string());
        let remote = format!("{host}:{port}");

        let client = {
            let host = host.clone();
            let make = move || DohClient::new(&host, ip, port).expect("DoH client construction is infallible for valid TLS config");
            self.pool.get(make).await
        };
        let result = client.query(&question.make_query_message(), self.timeout).await;
        self.pool.put(&client);

        let response = result?;
        message_to_entries(question, &response, &remote)
    }

    async fn terminate(&self) {
        self.pool.terminate_all().await;
    }
}

impl QuickLookup for DohHandler {}
