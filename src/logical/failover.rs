//! Failover (§4.3): invokes `initial`; on an error whose class is in the
//! except list (default: `NameNotFound`, `RequestRefused`, `ServerFault`,
//! `ZeroAnswer`), invokes `fallback` instead. Any other error propagates.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

/// Except-list classes used when config doesn't override them (§4.3).
const DEFAULT_EXCEPT_LIST: &[&str] = &["NameNotFound", "RequestRefused", "ServerFault", "ZeroAnswer"];

pub struct Failover {
    instance_id: Uuid,
    initial: Arc<dyn QuestionHandler>,
    fallback: Arc<dyn QuestionHandler>,
    except_list: Vec<String>,
}

impl Failover {
    pub fn new(
        initial: Arc<dyn QuestionHandler>,
        fallback: Arc<dyn QuestionHandler>,
        except_list: Option<Vec<String>>,
    ) -> Result<Self, String> {
        let except_list =
            except_list.unwrap_or_else(|| DEFAULT_EXCEPT_LIST.iter().map(|s| s.to_string()).collect());
        for class in &except_list {
            crate::error::validate_except_name(class)?;
        }
        Ok(Failover { instance_id: Uuid::new_v4(), initial, fallback, except_list })
    }

    fn is_failover_eligible(&self, err: &DnsError) -> bool {
        self.except_list.iter().any(|c| err.matches_class(c))
    }
}

#[async_trait]
impl QuestionHandler for Failover {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "Failover.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        match self.initial.handle_question(question, &stack).await {
            Ok(entries) => Ok(entries),
            Err(err) if self.is_failover_eligible(&err) => self.fallback.handle_question(question, &stack).await,
            Err(err) => Err(err),
        }
    }
}

impl QuickLookup for Failover {}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::{DNSClass, RecordType};

    struct AlwaysFails(&'static str);

    #[async_trait]
    impl QuestionHandler for AlwaysFails {
        async fn handle_question(&self, _q: &Question, _stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
            Err(DnsError::ServerFault(self.0.to_string()))
        }
    }

    struct AlwaysSucceeds;

    #[async_trait]
    impl QuestionHandler for AlwaysSucceeds {
        async fn handle_question(&self, _q: &Question, _stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
            Ok(vec![])
        }
    }

    fn question() -> Question {
        Question::new("a.com.".parse().unwrap(), DNSClass::IN, RecordType::A)
    }

    #[tokio::test]
    async fn test_failover_falls_through_on_eligible_error() {
        let failover = Failover::new(
            Arc::new(AlwaysFails("first")),
            Arc::new(AlwaysSucceeds),
            Some(vec!["ServerFault".to_string()]),
        )
        .unwrap();
        let result = failover.handle_question(&question(), &Stack::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failover_propagates_ineligible_error() {
        let failover = Failover::new(
            Arc::new(AlwaysFails("first")),
            Arc::new(AlwaysSucceeds),
            Some(vec!["NameNotFound".to_string()]),
        )
        .unwrap();
        let err = failover.handle_question(&question(), &Stack::new()).await.unwrap_err();
        assert!(matches!(err, DnsError::ServerFault(_)));
    }

    #[tokio::test]
    async fn test_failover_propagates_fallback_error_when_both_fail() {
        let failover = Failover::new(
            Arc::new(AlwaysFails("first")),
            Arc::new(AlwaysFails("second")),
            Some(vec!["ServerFault".to_string()]),
        )
        .unwrap();
        let err = failover.handle_question(&question(), &Stack::new()).await.unwrap_err();
        assert!(matches!(err, DnsError::ServerFault(msg) if msg == "second"));
    }

    #[tokio::test]
    async fn test_failover_uses_default_except_list() {
        struct NameNotFoundHandler;
        #[async_trait]
        impl QuestionHandler for NameNotFoundHandler {
            async fn handle_question(&self, q: &Question, _stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
                Err(DnsError::NameNotFound { name: q.name_str(), resp_server: "x".into() })
            }
        }
        let failover = Failover::new(Arc::new(NameNotFoundHandler), Arc::new(AlwaysSucceeds), None).unwrap();
        let result = failover.handle_question(&question(), &Stack::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failover_uses_default_except_list_for_server_network_error() {
        struct NetworkErrorHandler;
        #[async_trait]
        impl QuestionHandler for NetworkErrorHandler {
            async fn handle_question(&self, _q: &Question, _stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
                Err(DnsError::ServerNetworkError("upstream timed out".to_string()))
            }
        }
        let failover = Failover::new(Arc::new(NetworkErrorHandler), Arc::new(AlwaysSucceeds), None).unwrap();
        let result = failover.handle_question(&question(), &Stack::new()).await;
        assert!(result.is_ok(), "ServerNetworkError should fail over under the default except list via the ServerFault subtype");
    }
}
