//! Typed wrappers for question/answer/additional/authority records (§3).
//!
//! `MsgEntry` is a tagged variant over exactly these four kinds; handlers
//! exchange `Vec<MsgEntry>` rather than raw wire records so that combinators
//! can inspect TTLs and record types without re-parsing.

use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

/// `(name, class, type)`. Equality/hash are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    pub name: Name,
    pub class: DNSClass,
    pub rtype: RecordType,
}

impl Question {
    pub fn new(name: Name, class: DNSClass, rtype: RecordType) -> Self {
        Question { name, class, rtype }
    }

    /// The dotted name without the trailing root dot.
    pub fn name_str(&self) -> String {
        self.name.to_utf8().trim_end_matches('.').to_string()
    }

    pub fn to_query(&self) -> Query {
        let mut q = Query::new();
        q.set_name(self.name.clone());
        q.set_query_class(self.class);
        q.set_query_type(self.rtype);
        q
    }

    pub fn make_query_message(&self) -> Message {
        let mut msg = Message::new();
        msg.add_query(self.to_query());
        msg.set_recursion_desired(true);
        msg.set_id(rand::random());
        msg
    }
}

impl From<&Query> for Question {
    fn from(q: &Query) -> Self {
        Question { name: q.name().clone(), class: q.query_class(), rtype: q.query_type() }
    }
}

/// `(name, class, type, ttl, rdata...)`. Every rdata's class/type must match
/// the record's — enforced at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsEntry {
    pub name: Name,
    pub class: DNSClass,
    pub rtype: RecordType,
    pub ttl: u32,
    pub data: Vec<RData>,
}

impl AnsEntry {
    pub const DEFAULT_TTL: u32 = 3600;

    pub fn new(
        name: Name,
        class: DNSClass,
        rtype: RecordType,
        data: Vec<RData>,
        ttl: u32,
    ) -> Result<Self, String> {
        for d in &data {
            if d.record_type() != rtype {
                return Err(format!(
                    "inconsistent rdtype: {} != {rtype}",
                    d.record_type()
                ));
            }
        }
        Ok(AnsEntry { name, class, rtype, ttl, data })
    }

    pub fn to_records(&self) -> Vec<Record> {
        self.data
            .iter()
            .map(|d| Record::from_rdata(self.name.clone(), self.ttl, d.clone()))
            .collect()
    }

    pub fn from_record_group(records: &[Record]) -> Option<Self> {
        let first = records.first()?;
        let ttl = records.iter().map(Record::ttl).min().unwrap_or(Self::DEFAULT_TTL);
        Some(AnsEntry {
            name: first.name().clone(),
            class: first.dns_class(),
            rtype: first.record_type(),
            ttl,
            data: records.iter().filter_map(|r| r.data().cloned()).collect(),
        })
    }
}

/// Opaque wrapper around one resource-record set; equality/hash are over
/// its textual form since additional-section data isn't otherwise
/// interpreted by the core.
#[derive(Debug, Clone)]
pub struct AddEntry {
    pub records: Vec<Record>,
    text: String,
}

impl AddEntry {
    pub fn new(records: Vec<Record>) -> Self {
        let text = records.iter().map(|r| format!("{r}")).collect::<Vec<_>>().join("\n");
        AddEntry { records, text }
    }

    pub fn from_record_groups(records: &[Record]) -> Vec<AddEntry> {
        records.iter().cloned().map(|r| AddEntry::new(vec![r])).collect()
    }
}

impl PartialEq for AddEntry {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}
impl Eq for AddEntry {}

impl std::hash::Hash for AddEntry {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.text.hash(state)
    }
}

/// Tagged variant over exactly {QUESTION, ANSWER, ADDITIONAL, AUTHORITY}.
#[derive(Debug, Clone, PartialEq)]
pub enum MsgEntry {
    Question(Question),
    Answer(AnsEntry),
    Additional(AddEntry),
    Authority(AnsEntry),
}

impl MsgEntry {
    pub fn answers_from_records(records: &[Record]) -> Vec<MsgEntry> {
        group_by_rrset(records).into_iter().map(MsgEntry::Answer).collect()
    }

    pub fn additionals_from_records(records: &[Record]) -> Vec<MsgEntry> {
        AddEntry::from_record_groups(records).into_iter().map(MsgEntry::Additional).collect()
    }

    pub fn authority_from_records(records: &[Record]) -> Vec<MsgEntry> {
        group_by_rrset(records).into_iter().map(MsgEntry::Authority).collect()
    }

    /// Appends this entry into the matching section of `msg`.
    pub fn append_to(&self, msg: &mut Message) {
        match self {
            MsgEntry::Question(q) => msg.add_query(q.to_query()),
            MsgEntry::Answer(a) => {
                for r in a.to_records() {
                    msg.add_answer(r);
                }
                msg
            }
            MsgEntry::Additional(a) => {
                for r in &a.records {
                    msg.add_additional(r.clone());
                }
                msg
            }
            MsgEntry::Authority(a) => {
                for r in a.to_records() {
                    msg.add_name_server(r);
                }
                msg
            }
        };
    }
}

/// Groups records sharing `(name, class, type)` into single [`AnsEntry`]
/// values, matching AnsEntry's "list of typed rdata" shape.
fn group_by_rrset(records: &[Record]) -> Vec<AnsEntry> {
    let mut order: Vec<(Name, DNSClass, RecordType)> = Vec::new();
    let mut groups: std::collections::HashMap<(Name, DNSClass, RecordType), Vec<Record>> =
        std::collections::HashMap::new();
    for r in records {
        let key = (r.name().clone(), r.dns_class(), r.record_type());
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(r.clone());
    }
    order
        .into_iter()
        .filter_map(|key| groups.get(&key).and_then(|recs| AnsEntry::from_record_group(recs)))
        .collect()
}

pub fn concat_to_message(msg: &mut Message, entries: &[MsgEntry]) {
    for e in entries {
        e.append_to(msg);
    }
}
