//! `ByProtocol` dispatch factory (§4.4, §6 `Remote.ByProtocol`): picks the
//! UDP, TCP or DoH question-handler to build for an [`Endpoint`] based on
//! its configured `proto`, so config doesn't have to name the protocol
//! twice (once on the endpoint, once on the remote module).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

use super::doh::DohHandler;
use super::endpoint::{Endpoint, Proto};
use super::tcp::TcpHandler;
use super::udp::UdpHandler;

/// Wraps whichever concrete protocol handler matches `endpoint.proto`.
/// `Proto::Tls` is accepted at the URI-parsing level (§6) but has no
/// dedicated client in this core; it is dispatched as DoH-over-TLS is not
/// implemented, so picking `tls://` here is a construction-time error.
pub enum ByProtocol {
    Udp(UdpHandler),
    Tcp(TcpHandler),
    Https(DohHandler),
}

impl ByProtocol {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self, String> {
        match endpoint.proto {
            Proto::Udp => Ok(ByProtocol::Udp(UdpHandler::new(endpoint, timeout))),
            Proto::Tcp => Ok(ByProtocol::Tcp(TcpHandler::new(endpoint, timeout))),
            Proto::Https => Ok(ByProtocol::Https(DohHandler::new(endpoint, timeout))),
            Proto::Tls => Err("Remote.ByProtocol: \"tls\" has no dedicated client in this core".to_string()),
        }
    }
}

#[async_trait]
impl QuestionHandler for ByProtocol {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        match self {
            ByProtocol::Udp(h) => h.handle_question(question, stack).await,
            ByProtocol::Tcp(h) => h.handle_question(question, stack).await,
            ByProtocol::Https(h) => h.handle_question(question, stack).await,
        }
    }

    async fn terminate(&self) {
        match self {
            ByProtocol::Udp(h) => h.terminate().await,
            ByProtocol::Tcp(h) => h.terminate().await,
            ByProtocol::Https(h) => h.terminate().await,
        }
    }
}

impl QuickLookup for ByProtocol {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    struct Dummy;
    #[async_trait]
    impl QuestionHandler for Dummy {
        async fn handle_question(&self, _q: &Question, _s: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
            Ok(vec![])
        }
    }
    impl QuickLookup for Dummy {}

    #[test]
    fn test_picks_udp_for_udp_proto() {
        let endpoint = Endpoint::new_static(Proto::Udp, IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53, Arc::new(Dummy), false);
        assert!(matches!(ByProtocol::new(endpoint, Duration::from_secs(2)).unwrap(), ByProtocol::Udp(_)));
    }

    #[test]
    fn test_rejects_tls_proto() {
        let endpoint = Endpoint::new_static(Proto::Tls, IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 853, Arc::new(Dummy), false);
        assert!(ByProtocol::new(endpoint, Duration::from_secs(2)).is_err());
    }
}
