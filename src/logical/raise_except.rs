//! Fixed-error handler (§4.3 `RaiseExcept`): always fails with a
//! preconfigured exception class, used to carve out deny-listed names as a
//! rule in a [`super::rule::QuestionRuleSet`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

pub struct RaiseExcept {
    instance_id: Uuid,
    class_name: String,
    args: Vec<String>,
}

impl RaiseExcept {
    pub fn new(class_name: impl Into<String>, args: Vec<String>) -> Result<Self, String> {
        let class_name = class_name.into();
        crate::error::validate_except_name(&class_name)?;
        // Validate eagerly so a bad config fails at build time, not query time.
        crate::error::except_by_name(&class_name, &args)?;
        Ok(RaiseExcept { instance_id: Uuid::new_v4(), class_name, args })
    }
}

#[async_trait]
impl QuestionHandler for RaiseExcept {
    async fn handle_question(&self, _question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        crate::recursion::guard(
            stack,
            self.instance_id,
            "RaiseExcept.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        Err(crate::error::except_by_name(&self.class_name, &self.args)
            .expect("validated at construction"))
    }
}

impl QuickLookup for RaiseExcept {}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::{DNSClass, RecordType};

    #[tokio::test]
    async fn test_raise_except_raises_configured_class() {
        let handler = RaiseExcept::new("NameNotFound", vec!["blocked.example.com".to_string(), "raise_except".to_string()]).unwrap();
        let q = Question::new("blocked.example.com.".parse().unwrap(), DNSClass::IN, RecordType::A);
        let err = handler.handle_question(&q, &Stack::new()).await.unwrap_err();
        assert!(matches!(err, DnsError::NameNotFound { .. }));
    }

    #[test]
    fn test_new_rejects_unknown_class() {
        assert!(RaiseExcept::new("NotAClass", vec![]).is_err());
    }
}
