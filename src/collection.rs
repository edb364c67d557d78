//! Named handler storage and non-owning "static shared" views (§4.5).
//!
//! Handlers are registered under names matching `^[A-Za-z][A-Za-z0-9_-]+$`
//! and referenced elsewhere in config by the `s:<name>` syntax; a
//! `StaticSharedHandler` lets one physical handler be reused by multiple
//! combinators without either owning its lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::op::Message;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::DnsError;
use crate::handler::{Handler, QuestionHandler, QuickLookup};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_-]+$").unwrap();
}

pub fn validate_handler_name(name: &str) -> Result<(), String> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(format!("invalid handler name \"{name}\": must match {}", NAME_RE.as_str()))
    }
}

/// `s:<name>` reference syntax used throughout config (§6).
pub const SHARED_REF_PREFIX: &str = "s:";

pub fn parse_shared_ref(value: &str) -> Option<&str> {
    value.strip_prefix(SHARED_REF_PREFIX)
}

/// Insertion-ordered map of named handlers. Kept as `Vec<String>` +
/// `HashMap` rather than pulling in `indexmap`, matching the teacher's
/// dependency footprint.
#[derive(Default)]
pub struct HandlerStore {
    order: Vec<String>,
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerStore {
    pub fn new() -> Self {
        HandlerStore::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Result<(), String> {
        let name = name.into();
        validate_handler_name(&name)?;
        if self.handlers.contains_key(&name) {
            return Err(format!("duplicate handler name \"{name}\""));
        }
        self.order.push(name.clone());
        self.handlers.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub async fn terminate_all(&self) {
        for name in &self.order {
            if let Some(h) = self.handlers.get(name) {
                h.terminate().await;
            }
        }
    }
}

/// Non-owning view over a shared [`Handler`]: `terminate` is a no-op since
/// the underlying handler's lifecycle belongs to whoever registered it in
/// the [`HandlerStore`].
pub struct StaticSharedHandler {
    inner: Arc<dyn Handler>,
}

impl StaticSharedHandler {
    pub fn new(inner: Arc<dyn Handler>) -> Self {
        StaticSharedHandler { inner }
    }
}

#[async_trait]
impl Handler for StaticSharedHandler {
    async fn handle(&self, msg: &Message, stack: &Stack) -> Result<Message, DnsError> {
        self.inner.handle(msg, stack).await
    }

    async fn terminate(&self) {}
}

/// Same non-owning idea, but over a [`QuickLookup`] so endpoint resolvers
/// can be registered once and shared across remote protocol clients.
pub struct StaticSharedQuickLookup {
    inner: Arc<dyn QuickLookup>,
}

impl StaticSharedQuickLookup {
    pub fn new(inner: Arc<dyn QuickLookup>) -> Self {
        StaticSharedQuickLookup { inner }
    }
}

#[async_trait]
impl QuestionHandler for StaticSharedQuickLookup {
    async fn handle_question(&self, question: &Question, stack: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        self.inner.handle_question(question, stack).await
    }

    async fn terminate(&self) {}
}

impl QuickLookup for StaticSharedQuickLookup {}

/// Groups the handlers that serve client queries alongside the handlers
/// resolving upstream endpoint hostnames, so both can be torn down together
/// at shutdown. Mirrors `DownstreamCollection` in the original.
#[derive(Default)]
pub struct DownstreamCollection {
    pub handlers: HandlerStore,
}

impl DownstreamCollection {
    pub fn new() -> Self {
        DownstreamCollection::default()
    }

    pub async fn terminate(&self) {
        self.handlers.terminate_all().await;
    }
}
