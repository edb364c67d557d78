//! Concurrency limiter (§4.3 `LimitConcurrentReq`): bounds the number of
//! in-flight requests reaching the wrapped handler. When `blocking` is
//! false, callers over the limit are refused immediately rather than
//! queued — the "newest variant" read of the limiter's non-blocking mode.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

pub struct LimitConcurrentReq {
    instance_id: Uuid,
    inner: Arc<dyn QuestionHandler>,
    semaphore: Arc<Semaphore>,
    blocking: bool,
}

impl LimitConcurrentReq {
    pub fn new(inner: Arc<dyn QuestionHandler>, limit: usize, blocking: bool) -> Result<Self, String> {
        if limit == 0 {
            return Err("LimitConcurrentReq limit must be positive".to_string());
        }
        Ok(LimitConcurrentReq {
            instance_id: Uuid::new_v4(),
            inner,
            semaphore: Arc::new(Semaphore::new(limit)),
            blocking,
        })
    }
}

#[async_trait]
impl QuestionHandler for LimitConcurrentReq {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "LimitConcurrentReq.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        let _permit = if self.blocking {
            self.semaphore.acquire().await.expect("semaphore is never closed")
        } else {
            self.semaphore.try_acquire().map_err(|_| DnsError::RequestRefused {
                from: "limit_concurrent_req".to_string(),
                to: question.name_str(),
            })?
        };

        self.inner.handle_question(question, &stack).await
    }
}

impl QuickLookup for LimitConcurrentReq {}
