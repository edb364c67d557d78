//! Static host table (§4.2 `Hosts`): domain → class → type → rdata set,
//! with CNAME-following lookup and CNAME/other-type coexistence rejected at
//! construction (mirrors standard DNS zone rules and the original's
//! `Local/Hosts.py` validation).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{AnsEntry, MsgEntry, Question};
use crate::recursion::Stack;

const MAX_CNAME_HOPS: usize = 16;

type TypeMap = HashMap<RecordType, Vec<RData>>;
type ClassMap = HashMap<DNSClass, TypeMap>;

#[derive(Default)]
pub struct HostsData {
    entries: HashMap<Name, ClassMap>,
}

impl HostsData {
    pub fn new() -> Self {
        HostsData::default()
    }

    /// Inserts one rrset, rejecting CNAME coexisting with any other type
    /// (or vice versa) at the same `(name, class)`.
    pub fn insert(
        &mut self,
        name: Name,
        class: DNSClass,
        rtype: RecordType,
        data: Vec<RData>,
    ) -> Result<(), String> {
        let class_map = self.entries.entry(name.clone()).or_default();
        let type_map = class_map.entry(class).or_default();

        let has_cname = type_map.contains_key(&RecordType::CNAME);
        let has_other = type_map.keys().any(|t| *t != RecordType::CNAME);

        if rtype == RecordType::CNAME && has_other {
            return Err(format!("\"{name}\" already has non-CNAME records; cannot add CNAME"));
        }
        if rtype != RecordType::CNAME && has_cname {
            return Err(format!("\"{name}\" already has a CNAME; cannot add {rtype}"));
        }

        type_map.insert(rtype, data);
        Ok(())
    }

    fn lookup(&self, name: &Name, class: DNSClass, rtype: RecordType) -> Option<&Vec<RData>> {
        self.entries.get(name)?.get(&class)?.get(&rtype)
    }

    fn domain_present(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    fn cname_target(&self, name: &Name, class: DNSClass) -> Option<Name> {
        let data = self.entries.get(name)?.get(&class)?.get(&RecordType::CNAME)?;
        match data.first()? {
            RData::CNAME(c) => Some(c.0.clone()),
            _ => None,
        }
    }
}

pub struct Hosts {
    instance_id: Uuid,
    data: Mutex<HostsData>,
}

impl Hosts {
    pub fn new(data: HostsData) -> Self {
        Hosts { instance_id: Uuid::new_v4(), data: Mutex::new(data) }
    }
}

#[async_trait]
impl QuestionHandler for Hosts {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let _stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "Hosts.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        let data = self.data.lock().expect("hosts mutex poisoned");

        let mut entries = Vec::new();
        let mut current = question.name.clone();

        for _ in 0..MAX_CNAME_HOPS {
            if let Some(rdata) = data.lookup(&current, question.class, question.rtype) {
                let ans = AnsEntry::new(current.clone(), question.class, question.rtype, rdata.clone(), AnsEntry::DEFAULT_TTL)
                    .map_err(DnsError::ServerFault)?;
                entries.push(MsgEntry::Answer(ans));
                return Ok(entries);
            }

            match data.cname_target(&current, question.class) {
                Some(target) => {
                    let cname_data = data
                        .lookup(&current, question.class, RecordType::CNAME)
                        .cloned()
                        .unwrap_or_default();
                    let ans = AnsEntry::new(current.clone(), question.class, RecordType::CNAME, cname_data, AnsEntry::DEFAULT_TTL)
                        .map_err(DnsError::ServerFault)?;
                    entries.push(MsgEntry::Answer(ans));
                    current = target;
                }
                None => {
                    if data.domain_present(&current) {
                        // Domain is known but carries no CNAME and no
                        // record of the queried type: NOERROR/empty, not
                        // NXDOMAIN (§4.2 lookup algorithm).
                        return Err(DnsError::ZeroAnswer { name: question.name_str() });
                    }
                    return Err(DnsError::NameNotFound {
                        name: question.name_str(),
                        resp_server: "local.hosts".to_string(),
                    });
                }
            }
        }

        Err(DnsError::ServerFault(format!(
            "CNAME chain for \"{}\" exceeded {MAX_CNAME_HOPS} hops",
            question.name_str()
        )))
    }
}

impl QuickLookup for Hosts {}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::{A, CNAME};
    use std::net::Ipv4Addr;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_insert_rejects_cname_coexistence() {
        let mut data = HostsData::new();
        data.insert(name("a.com."), DNSClass::IN, RecordType::A, vec![RData::A(A(Ipv4Addr::new(1, 1, 1, 1)))]).unwrap();
        let err = data
            .insert(name("a.com."), DNSClass::IN, RecordType::CNAME, vec![RData::CNAME(CNAME(name("b.com.")))])
            .unwrap_err();
        assert!(err.contains("non-CNAME"));
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let mut data = HostsData::new();
        data.insert(name("a.com."), DNSClass::IN, RecordType::A, vec![RData::A(A(Ipv4Addr::new(1, 1, 1, 1)))]).unwrap();
        let hosts = Hosts::new(data);
        let q = Question::new(name("a.com."), DNSClass::IN, RecordType::A);
        let entries = hosts.handle_question(&q, &Stack::new()).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_follows_cname_chain() {
        let mut data = HostsData::new();
        data.insert(name("alias.com."), DNSClass::IN, RecordType::CNAME, vec![RData::CNAME(CNAME(name("target.com.")))]).unwrap();
        data.insert(name("target.com."), DNSClass::IN, RecordType::A, vec![RData::A(A(Ipv4Addr::new(2, 2, 2, 2)))]).unwrap();
        let hosts = Hosts::new(data);
        let q = Question::new(name("alias.com."), DNSClass::IN, RecordType::A);
        let entries = hosts.handle_question(&q, &Stack::new()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(&entries[0], MsgEntry::Answer(a) if a.rtype == RecordType::CNAME));
        assert!(matches!(&entries[1], MsgEntry::Answer(a) if a.rtype == RecordType::A));
    }

    #[tokio::test]
    async fn test_missing_name_returns_name_not_found() {
        let hosts = Hosts::new(HostsData::new());
        let q = Question::new(name("missing.com."), DNSClass::IN, RecordType::A);
        let err = hosts.handle_question(&q, &Stack::new()).await.unwrap_err();
        assert!(matches!(err, DnsError::NameNotFound { .. }));
    }

    #[tokio::test]
    async fn test_present_name_without_queried_type_returns_zero_answer() {
        let mut data = HostsData::new();
        data.insert(name("a.com."), DNSClass::IN, RecordType::A, vec![RData::A(A(Ipv4Addr::new(1, 1, 1, 1)))]).unwrap();
        let hosts = Hosts::new(data);
        let q = Question::new(name("a.com."), DNSClass::IN, RecordType::AAAA);
        let err = hosts.handle_question(&q, &Stack::new()).await.unwrap_err();
        assert!(matches!(err, DnsError::ZeroAnswer { .. }));
    }
}
