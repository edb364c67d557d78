//! Pass-through question/answer logger (§4.3 `QtAnsLog`).
//!
//! Filters by class/type/name regex, logs matching `(question, answer)`
//! pairs via `tracing`, and logs (then re-propagates) errors from the
//! wrapped handler — it never changes the result it observes.

use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::rr::{DNSClass, RecordType};
use regex::Regex;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

pub struct QtAnsLog {
    instance_id: Uuid,
    inner: Arc<dyn QuestionHandler>,
    classes: Option<Vec<DNSClass>>,
    types: Option<Vec<RecordType>>,
    name_re: Option<Regex>,
}

impl QtAnsLog {
    pub fn new(
        inner: Arc<dyn QuestionHandler>,
        classes: Option<Vec<DNSClass>>,
        types: Option<Vec<RecordType>>,
        name_pattern: Option<&str>,
    ) -> Result<Self, String> {
        let name_re = match name_pattern {
            Some(pat) => Some(Regex::new(pat).map_err(|e| format!("invalid name pattern \"{pat}\": {e}"))?),
            None => None,
        };
        Ok(QtAnsLog { instance_id: Uuid::new_v4(), inner, classes, types, name_re })
    }

    fn should_log(&self, question: &Question) -> bool {
        if let Some(classes) = &self.classes {
            if !classes.contains(&question.class) {
                return false;
            }
        }
        if let Some(types) = &self.types {
            if !types.contains(&question.rtype) {
                return false;
            }
        }
        if let Some(re) = &self.name_re {
            if !re.is_match(&question.name_str()) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl QuestionHandler for QtAnsLog {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "QtAnsLog.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        let log_this = self.should_log(question);
        let result = self.inner.handle_question(question, &stack).await;

        if log_this {
            match &result {
                Ok(entries) => {
                    tracing::info!(question = %question.name_str(), qtype = %question.rtype, answers = entries.len(), "qtanslog");
                }
                Err(err) => {
                    tracing::warn!(question = %question.name_str(), qtype = %question.rtype, error = %err, "qtanslog");
                }
            }
        }

        result
    }
}

impl QuickLookup for QtAnsLog {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl QuestionHandler for Fixed {
        async fn handle_question(&self, _q: &Question, _stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_filters_by_name_pattern() {
        let logger = QtAnsLog::new(Arc::new(Fixed), None, None, Some("^internal\\.")).unwrap();
        let matching = Question::new("internal.example.com.".parse().unwrap(), DNSClass::IN, RecordType::A);
        let non_matching = Question::new("public.example.com.".parse().unwrap(), DNSClass::IN, RecordType::A);

        assert!(logger.should_log(&matching));
        assert!(!logger.should_log(&non_matching));
        // Result is unaffected regardless of whether logging happens.
        assert!(logger.handle_question(&matching, &Stack::new()).await.is_ok());
        assert!(logger.handle_question(&non_matching, &Stack::new()).await.is_ok());
    }
}
