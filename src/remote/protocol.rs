//! Wire-level protocol trait shared by the UDP, TCP and DoH clients (§4.4).
//!
//! `Protocol` is the raw "one message in, one message out" contract against
//! a single upstream; `remote::udp`/`tcp`/`doh` each implement it, and the
//! question-handler wrappers around them (`UdpClient`, `TcpHandler`,
//! `DohHandler`) translate a single [`crate::msgentry::Question`] to/from
//! the wire message and map RCODEs through [`crate::error::rcode_to_result`].

use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::Message;

use crate::error::DnsError;
use crate::msgentry::{MsgEntry, Question};

#[async_trait]
pub trait Protocol: Send + Sync {
    /// Sends `msg` and returns the decoded response, or `ServerNetworkError`
    /// on timeout or transport failure.
    async fn query(&self, msg: &Message, timeout: Duration) -> Result<Message, DnsError>;

    /// Releases any held resources (sockets, connections).
    async fn terminate(&self) {}
}

/// Maps a wire response for `question` into the entry list a
/// [`crate::handler::QuestionHandler`] should return, applying §7's
/// upstream RCODE mapping first.
pub fn message_to_entries(question: &Question, msg: &Message, remote: &str) -> Result<Vec<MsgEntry>, DnsError> {
    crate::error::rcode_to_result(msg.response_code(), &question.name_str(), remote)?;

    let mut entries = MsgEntry::answers_from_records(msg.answers());
    entries.extend(MsgEntry::authority_from_records(msg.name_servers()));
    entries.extend(MsgEntry::additionals_from_records(msg.additionals()));
    Ok(entries)
}
