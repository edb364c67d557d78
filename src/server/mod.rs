//! Listeners (§4.6): UDP and TCP front doors that decode client queries,
//! drive them through the configured root handler, and map any
//! [`crate::error::DnsError`] to the RCODE a DNS client expects rather than
//! ever dropping the connection on an application-level error.

pub mod tcp;
pub mod udp;

use hickory_proto::op::{Message, MessageType, ResponseCode};

use crate::error::DnsError;
use crate::handler::Handler;
use crate::recursion::Stack;

/// Runs `root` over `request`, producing a response message. On success,
/// the handler's own response is returned verbatim; on error, a minimal
/// syntactically valid response carrying the mapped RCODE is built instead
/// (§7: "the listener MUST always return a syntactically valid DNS
/// response").
pub async fn handle_request(root: &dyn Handler, request: &Message) -> Message {
    match root.handle(request, &Stack::new()).await {
        Ok(response) => response,
        Err(err) => respond_with_error(request, &err),
    }
}

/// Builds the minimal valid response carrying `err`'s mapped RCODE,
/// mirroring `Server/Utils.py`'s `CommonDNSMsgHandling`.
fn respond_with_error(request: &Message, err: &DnsError) -> Message {
    tracing::warn!(error = %err, "handler raised error, mapping to RCODE");
    let mut resp = Message::new();
    resp.set_id(request.id());
    resp.set_message_type(MessageType::Response);
    resp.set_op_code(request.op_code());
    resp.set_recursion_desired(request.recursion_desired());
    resp.set_recursion_available(true);
    resp.set_response_code(err.to_rcode());
    for query in request.queries() {
        resp.add_query(query.clone());
    }
    resp
}

/// Used by both listeners' worker loops: malformed wire data is dropped
/// silently rather than answered (§4.6).
pub fn try_decode(buf: &[u8]) -> Option<Message> {
    use hickory_proto::serialize::binary::BinDecodable;
    Message::from_bytes(buf).ok()
}

/// Picks the unspecified bind address of the right family for `ip`, mirroring
/// the "auto-select IPv4/IPv6 family by the configured IP" requirement.
pub fn bind_addr(ip: std::net::IpAddr, port: u16) -> std::net::SocketAddr {
    std::net::SocketAddr::new(ip, port)
}
