//! Handler trait hierarchy (§4.1): `Handler` → `QuestionHandler` → `QuickLookup`.
//!
//! Every downstream module in `local`, `logical` and `remote` implements at
//! least `Handler`; most implement `QuestionHandler` and get `Handler::handle`
//! for free. `QuickLookup` adds the `lookup_ip_addr` convenience used by
//! remote endpoint resolution.

use std::net::IpAddr;

use async_trait::async_trait;
use hickory_proto::op::Message;
use hickory_proto::rr::{DNSClass, RData, RecordType};
use rand::seq::SliceRandom;

use crate::error::DnsError;
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

/// Base entry point: a full DNS message in, a full DNS message out.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, msg: &Message, stack: &Stack) -> Result<Message, DnsError>;

    /// Releases any held resources (sockets, pooled connections). A no-op
    /// for handlers that own nothing, and for non-owning static views.
    async fn terminate(&self) {}
}

/// A handler that answers one question at a time; `handle` is provided in
/// terms of it, splitting multi-question messages and concatenating the
/// per-question results into the answer/additional/authority sections.
#[async_trait]
pub trait QuestionHandler: Send + Sync {
    async fn handle_question(
        &self,
        question: &Question,
        stack: &Stack,
    ) -> Result<Vec<MsgEntry>, DnsError>;

    async fn terminate(&self) {}
}

#[async_trait]
impl<T: QuestionHandler + ?Sized> Handler for T {
    async fn handle(&self, msg: &Message, stack: &Stack) -> Result<Message, DnsError> {
        let mut resp = Message::new();
        resp.set_id(msg.id());
        resp.set_message_type(hickory_proto::op::MessageType::Response);
        resp.set_op_code(msg.op_code());
        resp.set_recursion_desired(msg.recursion_desired());
        resp.set_recursion_available(true);

        for query in msg.queries() {
            let question = Question::from(query);
            let entries = self.handle_question(&question, stack).await?;
            resp.add_query(question.to_query());
            crate::msgentry::concat_to_message(&mut resp, &entries);
        }
        Ok(resp)
    }

    async fn terminate(&self) {
        QuestionHandler::terminate(self).await
    }
}

/// Adds address-lookup convenience on top of [`QuestionHandler`], used by
/// `remote::endpoint::Endpoint` to resolve hostnames through the same
/// handler graph that serves client queries.
#[async_trait]
pub trait QuickLookup: QuestionHandler {
    /// Resolves `name` to one address, preferring `prefer_ipv6` ?
    /// AAAA-then-A : A-then-AAAA. On `NameNotFound`/`ZeroAnswer` for the
    /// preferred family, falls back to the other family before giving up.
    /// When multiple addresses are returned, one is chosen uniformly at
    /// random — mirroring `QuickLookup.LookupIpAddr` in the original.
    async fn lookup_ip_addr(
        &self,
        name: &str,
        prefer_ipv6: bool,
        stack: &Stack,
    ) -> Result<IpAddr, DnsError> {
        let parsed: hickory_proto::rr::Name = name
            .parse()
            .map_err(|e| DnsError::ServerFault(format!("invalid name \"{name}\": {e}")))?;

        let (first, second) = if prefer_ipv6 {
            (RecordType::AAAA, RecordType::A)
        } else {
            (RecordType::A, RecordType::AAAA)
        };

        match self.lookup_one_family(&parsed, first, stack).await {
            Ok(addr) => Ok(addr),
            Err(DnsError::NameNotFound { .. }) | Err(DnsError::ZeroAnswer { .. }) => {
                self.lookup_one_family(&parsed, second, stack).await
            }
            Err(other) => Err(other),
        }
    }

    async fn lookup_one_family(
        &self,
        name: &hickory_proto::rr::Name,
        rtype: RecordType,
        stack: &Stack,
    ) -> Result<IpAddr, DnsError> {
        let question = Question::new(name.clone(), DNSClass::IN, rtype);
        let entries = self.handle_question(&question, stack).await?;

        let mut addrs: Vec<IpAddr> = Vec::new();
        for entry in &entries {
            if let MsgEntry::Answer(ans) = entry {
                for rdata in &ans.data {
                    match rdata {
                        RData::A(a) => addrs.push(IpAddr::V4(a.0)),
                        RData::AAAA(a) => addrs.push(IpAddr::V6(a.0)),
                        _ => {}
                    }
                }
            }
        }

        if addrs.is_empty() {
            return Err(DnsError::ZeroAnswer { name: name.to_utf8() });
        }

        let mut rng = rand::thread_rng();
        Ok(*addrs.choose(&mut rng).expect("non-empty checked above"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgentry::AnsEntry;
    use hickory_proto::rr::rdata::A;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedAnswer {
        calls: Arc<AtomicUsize>,
        rtype: RecordType,
        ip: Ipv4Addr,
    }

    #[async_trait]
    impl QuestionHandler for FixedAnswer {
        async fn handle_question(
            &self,
            question: &Question,
            _stack: &Stack,
        ) -> Result<Vec<MsgEntry>, DnsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if question.rtype != self.rtype {
                return Err(DnsError::NameNotFound {
                    name: question.name_str(),
                    resp_server: "test".into(),
                });
            }
            let entry = AnsEntry::new(
                question.name.clone(),
                DNSClass::IN,
                self.rtype,
                vec![RData::A(A(self.ip))],
                60,
            )
            .unwrap();
            Ok(vec![MsgEntry::Answer(entry)])
        }
    }

    impl QuickLookup for FixedAnswer {}

    #[tokio::test]
    async fn test_lookup_ip_addr_falls_back_to_other_family() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = FixedAnswer { calls: calls.clone(), rtype: RecordType::A, ip: Ipv4Addr::new(9, 9, 9, 9) };
        let stack = Stack::new();
        let ip = handler.lookup_ip_addr("example.com", true, &stack).await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lookup_ip_addr_uses_preferred_family_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = FixedAnswer { calls: calls.clone(), rtype: RecordType::A, ip: Ipv4Addr::new(1, 1, 1, 1) };
        let stack = Stack::new();
        let ip = handler.lookup_ip_addr("example.com", false, &stack).await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
