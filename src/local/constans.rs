//! Fixed-answer handler (§4.2 `ConstAns`): returns a preconfigured rdata
//! set per query type, regardless of name. Non-`IN` class or a type with
//! no configured records yields an empty answer rather than an error,
//! mirroring the original's `Downstream/Logical/ConstAns.py`.

use std::collections::HashMap;

use async_trait::async_trait;
use hickory_proto::rr::{DNSClass, RData, RecordType};
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{AnsEntry, MsgEntry, Question};
use crate::recursion::Stack;

pub const DEFAULT_TTL: u32 = 300;

pub struct ConstAns {
    instance_id: Uuid,
    records: HashMap<RecordType, Vec<RData>>,
    ttl: u32,
}

impl ConstAns {
    pub fn new(records: HashMap<RecordType, Vec<RData>>, ttl: Option<u32>) -> Result<Self, String> {
        for (rtype, data) in &records {
            for d in data {
                if d.record_type() != *rtype {
                    return Err(format!("inconsistent rdtype: {} != {rtype}", d.record_type()));
                }
            }
        }
        Ok(ConstAns { instance_id: Uuid::new_v4(), records, ttl: ttl.unwrap_or(DEFAULT_TTL) })
    }
}

#[async_trait]
impl QuestionHandler for ConstAns {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let _stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "ConstAns.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        if question.class != DNSClass::IN {
            return Ok(Vec::new());
        }
        let Some(data) = self.records.get(&question.rtype) else {
            return Ok(Vec::new());
        };

        let ans = AnsEntry::new(question.name.clone(), DNSClass::IN, question.rtype, data.clone(), self.ttl)
            .map_err(DnsError::ServerFault)?;
        Ok(vec![MsgEntry::Answer(ans)])
    }
}

impl QuickLookup for ConstAns {}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::A;
    use std::net::Ipv4Addr;

    fn one(rtype: RecordType, data: Vec<RData>) -> HashMap<RecordType, Vec<RData>> {
        HashMap::from([(rtype, data)])
    }

    #[tokio::test]
    async fn test_const_ans_returns_fixed_rdata() {
        let handler = ConstAns::new(one(RecordType::A, vec![RData::A(A(Ipv4Addr::new(8, 8, 8, 8)))]), None).unwrap();
        let q = Question::new("anything.com.".parse().unwrap(), DNSClass::IN, RecordType::A);
        let entries = handler.handle_question(&q, &Stack::new()).await.unwrap();
        assert_eq!(entries.len(), 1);
        if let MsgEntry::Answer(ans) = &entries[0] {
            assert_eq!(ans.ttl, DEFAULT_TTL);
        } else {
            panic!("expected answer");
        }
    }

    #[tokio::test]
    async fn test_const_ans_empty_for_non_in_class() {
        let handler = ConstAns::new(one(RecordType::A, vec![RData::A(A(Ipv4Addr::new(8, 8, 8, 8)))]), None).unwrap();
        let q = Question::new("anything.com.".parse().unwrap(), DNSClass::CH, RecordType::A);
        let entries = handler.handle_question(&q, &Stack::new()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_const_ans_empty_for_unconfigured_type() {
        let handler = ConstAns::new(one(RecordType::A, vec![RData::A(A(Ipv4Addr::new(8, 8, 8, 8)))]), None).unwrap();
        let q = Question::new("anything.com.".parse().unwrap(), DNSClass::IN, RecordType::AAAA);
        let entries = handler.handle_question(&q, &Stack::new()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_new_rejects_mismatched_rdata() {
        let err = ConstAns::new(
            one(RecordType::A, vec![RData::CNAME(hickory_proto::rr::rdata::CNAME("b.com.".parse().unwrap()))]),
            None,
        )
        .unwrap_err();
        assert!(err.contains("inconsistent rdtype"));
    }
}
