//! Weighted random dispatch (§4.3 `RandomChoice`): picks one of several
//! handlers per query, weighted by configured shares. Cumulative weights
//! are precomputed once at construction rather than on every query.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

pub struct RandomChoice {
    instance_id: Uuid,
    handlers: Vec<Arc<dyn QuestionHandler>>,
    cumulative_weights: Vec<u32>,
}

impl RandomChoice {
    pub fn new(weighted: Vec<(Arc<dyn QuestionHandler>, u32)>) -> Result<Self, String> {
        if weighted.is_empty() {
            return Err("RandomChoice requires at least one handler".to_string());
        }
        if weighted.iter().any(|(_, w)| *w == 0) {
            return Err("RandomChoice weights must be positive".to_string());
        }

        let mut cumulative_weights = Vec::with_capacity(weighted.len());
        let mut handlers = Vec::with_capacity(weighted.len());
        let mut running = 0u32;
        for (handler, weight) in weighted {
            running += weight;
            cumulative_weights.push(running);
            handlers.push(handler);
        }

        Ok(RandomChoice { instance_id: Uuid::new_v4(), handlers, cumulative_weights })
    }

    fn pick(&self) -> &Arc<dyn QuestionHandler> {
        let total = *self.cumulative_weights.last().expect("non-empty checked in new");
        let roll = rand::thread_rng().gen_range(0..total);
        let idx = self
            .cumulative_weights
            .iter()
            .position(|cum| roll < *cum)
            .expect("roll < total guarantees a match");
        &self.handlers[idx]
    }
}

#[async_trait]
impl QuestionHandler for RandomChoice {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "RandomChoice.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        self.pick().handle_question(question, &stack).await
    }
}

impl QuickLookup for RandomChoice {}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::{DNSClass, RecordType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TaggedHandler(usize, Arc<AtomicUsize>);

    #[async_trait]
    impl QuestionHandler for TaggedHandler {
        async fn handle_question(&self, _q: &Question, _stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
            if self.0 == 0 {
                self.1.fetch_add(1, Ordering::SeqCst);
            }
            Ok(vec![])
        }
    }

    #[test]
    fn test_new_rejects_zero_weight() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handlers = vec![(Arc::new(TaggedHandler(0, counter)) as Arc<dyn QuestionHandler>, 0u32)];
        assert!(RandomChoice::new(handlers).is_err());
    }

    #[tokio::test]
    async fn test_single_handler_always_picked() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handlers = vec![(Arc::new(TaggedHandler(0, counter.clone())) as Arc<dyn QuestionHandler>, 10u32)];
        let choice = RandomChoice::new(handlers).unwrap();
        let q = Question::new("a.com.".parse().unwrap(), DNSClass::IN, RecordType::A);
        for _ in 0..20 {
            choice.handle_question(&q, &Stack::new()).await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_weighted_distribution_favors_heavier_handler() {
        let counter0 = Arc::new(AtomicUsize::new(0));
        let counter1 = Arc::new(AtomicUsize::new(0));
        let handlers = vec![
            (Arc::new(TaggedHandler(0, counter0.clone())) as Arc<dyn QuestionHandler>, 95u32),
            (Arc::new(TaggedHandler(1, counter1.clone())) as Arc<dyn QuestionHandler>, 5u32),
        ];
        let choice = RandomChoice::new(handlers).unwrap();
        let q = Question::new("a.com.".parse().unwrap(), DNSClass::IN, RecordType::A);
        for _ in 0..200 {
            choice.handle_question(&q, &Stack::new()).await.unwrap();
        }
        assert!(counter0.load(Ordering::SeqCst) > 100);
    }
}
