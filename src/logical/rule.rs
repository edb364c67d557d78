//! Name-based routing (§4.3 `QuestionRuleSet`).
//!
//! Each rule has a textual grammar `<type>[:->><body>]`, where `type` is
//! one of `sub` (suffix match, default weight 50), `full` (exact match,
//! default weight 90) or `default` (always matches, default weight 10);
//! `body` itself may carry an explicit weight override: `[<weight>:~>>]<bodyText>`.
//! Among the rules matching a question, the one with the highest weight
//! wins; ties favor whichever rule was declared first.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::{QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

const TYPE_SEP: &str = ":->>";
const WEIGHT_SEP: &str = ":~>>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Sub,
    Full,
    Default,
}

impl RuleKind {
    fn default_weight(self) -> u32 {
        match self {
            RuleKind::Sub => 50,
            RuleKind::Full => 90,
            RuleKind::Default => 10,
        }
    }

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "sub" => Ok(RuleKind::Sub),
            "full" => Ok(RuleKind::Full),
            "default" => Ok(RuleKind::Default),
            other => Err(format!("unknown rule type \"{other}\"")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuestionRule {
    pub kind: RuleKind,
    pub weight: u32,
    pub body: String,
}

impl QuestionRule {
    pub fn parse(rule_str: &str) -> Result<Self, String> {
        let (type_part, body_part) = match rule_str.split_once(TYPE_SEP) {
            Some((t, b)) => (t, Some(b)),
            None => (rule_str, None),
        };
        let kind = RuleKind::from_str(type_part.trim())?;

        if kind == RuleKind::Default && body_part.is_some() {
            return Err("\"default\" rules do not take a body".to_string());
        }
        if kind != RuleKind::Default && body_part.is_none() {
            return Err(format!("rule type \"{type_part}\" requires a body"));
        }

        let (weight, body) = match body_part {
            None => (kind.default_weight(), String::new()),
            Some(body_part) => match body_part.split_once(WEIGHT_SEP) {
                Some((w, rest)) => {
                    let weight = w.trim().parse::<u32>().map_err(|e| format!("invalid weight \"{w}\": {e}"))?;
                    (weight, rest.to_string())
                }
                None => (kind.default_weight(), body_part.to_string()),
            },
        };

        Ok(QuestionRule { kind, weight, body })
    }

    pub fn matches(&self, question: &Question) -> bool {
        match self.kind {
            RuleKind::Default => true,
            RuleKind::Full => question.name_str().eq_ignore_ascii_case(&self.body),
            RuleKind::Sub => {
                let name = question.name_str().to_ascii_lowercase();
                let suffix = self.body.to_ascii_lowercase();
                name == suffix || name.ends_with(&format!(".{suffix}"))
            }
        }
    }
}

pub struct QuestionRuleSet {
    instance_id: Uuid,
    rules: Vec<(QuestionRule, Arc<dyn QuestionHandler>)>,
}

impl QuestionRuleSet {
    pub fn new(rules: Vec<(QuestionRule, Arc<dyn QuestionHandler>)>) -> Result<Self, String> {
        if rules.is_empty() {
            return Err("QuestionRuleSet requires at least one rule".to_string());
        }
        Ok(QuestionRuleSet { instance_id: Uuid::new_v4(), rules })
    }

    fn select(&self, question: &Question) -> Option<&Arc<dyn QuestionHandler>> {
        let mut best: Option<(usize, u32, &Arc<dyn QuestionHandler>)> = None;
        for (idx, (rule, handler)) in self.rules.iter().enumerate() {
            if !rule.matches(question) {
                continue;
            }
            if best.map(|(_, w, _)| rule.weight > w).unwrap_or(true) {
                best = Some((idx, rule.weight, handler));
            }
        }
        best.map(|(_, _, handler)| handler)
    }
}

#[async_trait]
impl QuestionHandler for QuestionRuleSet {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "QuestionRuleSet.HandleQuestion",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        match self.select(question) {
            Some(handler) => handler.handle_question(question, &stack).await,
            None => Err(DnsError::NameNotFound { name: question.name_str(), resp_server: "question_rule_set".to_string() }),
        }
    }
}

impl QuickLookup for QuestionRuleSet {}
