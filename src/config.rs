//! JSON configuration model and the builder that turns it into a running
//! [`DownstreamCollection`] plus a set of [`Endpoint`]s and servers (§6).
//!
//! The original resolves module names through a dynamic registry
//! (`ModuleManager.py`: a string key looked up against classes registered at
//! import time). Rust has no equivalent reflection story, so
//! [`ModulePath`] is a closed enum parsed from the dotted string and
//! [`build_downstream_item`]/[`build_endpoint_item`] are `match` blocks over
//! it — the same "dotted name resolves to a constructor" idea, collapsed
//! into a compile-time-checked switch instead of a runtime lookup table.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::rr::rdata::{A, AAAA, CNAME, NS, PTR, TXT};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use serde::Deserialize;

use crate::collection::{parse_shared_ref, DownstreamCollection};
use crate::error::DnsError;
use crate::handler::{Handler, QuestionHandler, QuickLookup};
use crate::local::cache::Cache;
use crate::local::constans::ConstAns;
use crate::local::hosts::{Hosts, HostsData};
use crate::logical::failover::Failover;
use crate::logical::limit_concurrent::LimitConcurrentReq;
use crate::logical::qtanslog::QtAnsLog;
use crate::logical::raise_except::RaiseExcept;
use crate::logical::random_choice::RandomChoice;
use crate::logical::rule::{QuestionRule, QuestionRuleSet};
use crate::msgentry::{MsgEntry, Question};
use crate::recursion::Stack;
use crate::remote::by_protocol::ByProtocol;
use crate::remote::doh::DohHandler;
use crate::remote::endpoint::{Endpoint, Proto};
use crate::remote::tcp::TcpHandler;
use crate::remote::udp::UdpHandler;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logger: LoggerConfig,
    pub downstream: ItemsConfig,
    pub server: ItemsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub level: String,
    pub console: bool,
    pub file: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig { level: "info".to_string(), console: true, file: None }
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemsConfig {
    pub items: Vec<ModuleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleEntry {
    pub module: String,
    pub name: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Closed set of module paths this core knows how to build (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModulePath {
    LocalHosts,
    LocalCache,
    LocalConstAns,
    LogicalFailover,
    LogicalRandomChoice,
    LogicalLimitConcurrentReq,
    LogicalQuestionRuleSet,
    LogicalRaiseExcept,
    LogicalQtAnsLog,
    RemoteEndpoint,
    RemoteStaticEndpoint,
    RemoteUdp,
    RemoteTcp,
    RemoteHttps,
    RemoteByProtocol,
    ServerUdp,
    ServerTcp,
}

impl ModulePath {
    fn parse(path: &str) -> Result<Self, String> {
        Ok(match path {
            "Downstream.Local.Hosts" => ModulePath::LocalHosts,
            "Downstream.Local.Cache" => ModulePath::LocalCache,
            "Downstream.Logical.ConstAns" => ModulePath::LocalConstAns,
            "Downstream.Logical.Failover" => ModulePath::LogicalFailover,
            "Downstream.Logical.RandomChoice" => ModulePath::LogicalRandomChoice,
            "Downstream.Logical.LimitConcurrentReq" => ModulePath::LogicalLimitConcurrentReq,
            "Downstream.Logical.QuestionRuleSet" => ModulePath::LogicalQuestionRuleSet,
            "Downstream.Logical.RaiseExcept" => ModulePath::LogicalRaiseExcept,
            "Downstream.Logical.QtAnsLog" => ModulePath::LogicalQtAnsLog,
            "Downstream.Remote.Endpoint" => ModulePath::RemoteEndpoint,
            "Downstream.Remote.StaticEndpoint" => ModulePath::RemoteStaticEndpoint,
            "Downstream.Remote.UDP" => ModulePath::RemoteUdp,
            "Downstream.Remote.TCP" => ModulePath::RemoteTcp,
            "Downstream.Remote.HTTPS" => ModulePath::RemoteHttps,
            "Downstream.Remote.ByProtocol" => ModulePath::RemoteByProtocol,
            "Server.UDP" => ModulePath::ServerUdp,
            "Server.TCP" => ModulePath::ServerTcp,
            other => return Err(format!("unrecognized module path \"{other}\"")),
        })
    }
}

/// A handler that should never actually be called: the resolver argument
/// [`Endpoint::new_static`] requires but never touches, since a static
/// endpoint's `get_ip_addr` returns its literal IP before ever consulting it.
struct NullResolver;

#[async_trait::async_trait]
impl QuestionHandler for NullResolver {
    async fn handle_question(&self, _q: &Question, _s: &Stack) -> Result<Vec<MsgEntry>, DnsError> {
        Err(DnsError::ServerFault("static endpoint resolver must never be invoked".to_string()))
    }
}
impl QuickLookup for NullResolver {}

/// Builds a [`DownstreamCollection`] and the set of named [`Endpoint`]s from
/// parsed config, in declaration order, so later items may reference
/// earlier ones by `s:<name>`.
pub struct Builder {
    pub collection: DownstreamCollection,
    question_handlers: HashMap<String, Arc<dyn QuestionHandler>>,
    resolvers: HashMap<String, Arc<dyn QuickLookup>>,
    endpoints: HashMap<String, Endpoint>,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            collection: DownstreamCollection::new(),
            question_handlers: HashMap::new(),
            resolvers: HashMap::new(),
            endpoints: HashMap::new(),
        }
    }

    fn resolve_handler(&self, value: &serde_json::Value, field: &str) -> Result<Arc<dyn Handler>, String> {
        let raw = value.as_str().ok_or_else(|| format!("\"{field}\" must be a handler reference string"))?;
        let name = parse_shared_ref(raw).ok_or_else(|| format!("\"{field}\" must use the \"s:<name>\" syntax, got \"{raw}\""))?;
        self.collection
            .handlers
            .get(name)
            .ok_or_else(|| format!("\"{field}\" references unknown handler \"{name}\""))
    }

    fn resolve_question_handler(&self, value: &serde_json::Value, field: &str) -> Result<Arc<dyn QuestionHandler>, String> {
        let raw = value.as_str().ok_or_else(|| format!("\"{field}\" must be a handler reference string"))?;
        let name = parse_shared_ref(raw).ok_or_else(|| format!("\"{field}\" must use the \"s:<name>\" syntax, got \"{raw}\""))?;
        self.question_handlers
            .get(name)
            .cloned()
            .ok_or_else(|| format!("\"{field}\" references unknown handler \"{name}\""))
    }

    fn resolve_resolver(&self, value: &serde_json::Value, field: &str) -> Result<Arc<dyn QuickLookup>, String> {
        let raw = value.as_str().ok_or_else(|| format!("\"{field}\" must be a handler reference string"))?;
        let name = parse_shared_ref(raw).ok_or_else(|| format!("\"{field}\" must use the \"s:<name>\" syntax, got \"{raw}\""))?;
        self.resolvers.get(name).cloned().ok_or_else(|| format!("\"{field}\" references unknown resolver \"{name}\""))
    }

    fn take_endpoint(&mut self, value: &serde_json::Value, field: &str) -> Result<Endpoint, String> {
        let raw = value.as_str().ok_or_else(|| format!("\"{field}\" must be an endpoint reference string"))?;
        let name = parse_shared_ref(raw).ok_or_else(|| format!("\"{field}\" must use the \"s:<name>\" syntax, got \"{raw}\""))?;
        self.endpoints
            .remove(name)
            .ok_or_else(|| format!("\"{field}\" references unknown or already-consumed endpoint \"{name}\""))
    }

    /// Registers `handler` under `name` (if given) in both the handler store
    /// (as the erased [`Handler`] trait object) and the resolver map (as the
    /// erased [`QuickLookup`] trait object), since every concrete downstream
    /// module implements both.
    fn register<T>(&mut self, name: Option<String>, handler: Arc<T>) -> Result<Arc<dyn Handler>, String>
    where
        T: QuickLookup + 'static,
    {
        let as_handler: Arc<dyn Handler> = handler.clone();
        let as_question_handler: Arc<dyn QuestionHandler> = handler.clone();
        if let Some(name) = name {
            self.collection.handlers.insert(name.clone(), as_handler.clone())?;
            self.question_handlers.insert(name.clone(), as_question_handler);
            self.resolvers.insert(name, handler);
        }
        Ok(as_handler)
    }

    pub fn apply_downstream_item(&mut self, item: &ModuleEntry) -> Result<(), String> {
        let path = ModulePath::parse(&item.module)?;
        match path {
            ModulePath::RemoteEndpoint | ModulePath::RemoteStaticEndpoint => {
                let endpoint = self.build_endpoint(path, item)?;
                let name = item.name.clone().ok_or("endpoint modules require a \"name\"")?;
                self.endpoints.insert(name, endpoint);
                Ok(())
            }
            _ => self.build_downstream_handler(path, item).map(|_| ()),
        }
    }

    fn build_endpoint(&mut self, path: ModulePath, item: &ModuleEntry) -> Result<Endpoint, String> {
        let cfg = &item.config;
        let prefer_ipv6 = cfg.get("preferIPv6").and_then(|v| v.as_bool()).unwrap_or(false);
        match path {
            ModulePath::RemoteEndpoint => {
                let uri = cfg.get("uri").and_then(|v| v.as_str()).ok_or("Remote.Endpoint requires \"uri\"")?;
                let resolver_field = cfg.get("resolver").ok_or("Remote.Endpoint requires \"resolver\"")?;
                let resolver = self.resolve_resolver(resolver_field, "resolver")?;
                Endpoint::from_uri(uri, resolver, prefer_ipv6)
            }
            ModulePath::RemoteStaticEndpoint => {
                let proto = parse_proto(cfg.get("proto").and_then(|v| v.as_str()).unwrap_or("udp"))?;
                let ip: IpAddr = cfg
                    .get("ip")
                    .and_then(|v| v.as_str())
                    .ok_or("Remote.StaticEndpoint requires \"ip\"")?
                    .parse()
                    .map_err(|e| format!("invalid \"ip\": {e}"))?;
                let port = cfg.get("port").and_then(|v| v.as_u64()).map(|p| p as u16).unwrap_or_else(|| proto.default_port());
                Ok(Endpoint::new_static(proto, ip, port, Arc::new(NullResolver), prefer_ipv6))
            }
            _ => unreachable!(),
        }
    }

    fn build_downstream_handler(&mut self, path: ModulePath, item: &ModuleEntry) -> Result<Arc<dyn Handler>, String> {
        let cfg = &item.config;
        let name = item.name.clone();
        match path {
            ModulePath::LocalHosts => {
                let data = build_hosts_data(cfg.get("records").and_then(|v| v.as_array()).unwrap_or(&Vec::new()))?;
                let handler = Arc::new(Hosts::new(data));
                self.register(name, handler)
            }
            ModulePath::LocalCache => {
                let inner_field = cfg.get("inner").ok_or("Local.Cache requires \"inner\"")?;
                let inner = self.resolve_question_handler(inner_field, "inner")?;
                let capacity = cfg.get("capacity").and_then(|v| v.as_u64()).map(|v| v as usize);
                let handler = Arc::new(Cache::new(inner, capacity));
                self.register(name, handler)
            }
            ModulePath::LocalConstAns => {
                let records = cfg.get("records").and_then(|v| v.as_array()).ok_or("ConstAns requires \"records\"")?;
                let mut by_type: HashMap<RecordType, Vec<RData>> = HashMap::new();
                for record in records {
                    let rtype = parse_rtype(
                        record.get("type").and_then(|v| v.as_str()).ok_or("ConstAns record requires \"type\"")?,
                    )?;
                    let raw = record.get("rdata").and_then(|v| v.as_str()).ok_or("ConstAns record requires \"rdata\"")?;
                    by_type.entry(rtype).or_default().push(parse_rdata(rtype, raw)?);
                }
                let ttl = cfg.get("ttl").and_then(|v| v.as_u64()).map(|v| v as u32);
                let handler = Arc::new(ConstAns::new(by_type, ttl)?);
                self.register(name, handler)
            }
            ModulePath::LogicalFailover => {
                let initial = self.resolve_question_handler(
                    cfg.get("initialHandler").ok_or("Failover requires \"initialHandler\"")?,
                    "initialHandler",
                )?;
                let fallback = self.resolve_question_handler(
                    cfg.get("failoverHandler").ok_or("Failover requires \"failoverHandler\"")?,
                    "failoverHandler",
                )?;
                let except_list = cfg.get("exceptList").map(|_| string_array(cfg.get("exceptList")));
                let handler = Arc::new(Failover::new(initial, fallback, except_list)?);
                self.register(name, handler)
            }
            ModulePath::LogicalRandomChoice => {
                let handler_list = cfg
                    .get("handlerList")
                    .and_then(|v| v.as_array())
                    .ok_or("RandomChoice requires \"handlerList\"")?;
                let weight_list = cfg.get("weightList").and_then(|v| v.as_array());
                let weighted = handler_list
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let handler = self.resolve_question_handler(v, "handlerList[]")?;
                        let weight = weight_list
                            .and_then(|w| w.get(i))
                            .and_then(|w| w.as_u64())
                            .unwrap_or(1) as u32;
                        Ok((handler, weight))
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                let handler = Arc::new(RandomChoice::new(weighted)?);
                self.register(name, handler)
            }
            ModulePath::LogicalLimitConcurrentReq => {
                let inner_field = cfg.get("targetHandler").ok_or("LimitConcurrentReq requires \"targetHandler\"")?;
                let inner = self.resolve_question_handler(inner_field, "targetHandler")?;
                let limit = cfg
                    .get("maxNumConcurrentReq")
                    .and_then(|v| v.as_u64())
                    .ok_or("LimitConcurrentReq requires \"maxNumConcurrentReq\"")? as usize;
                let blocking = cfg.get("blocking").and_then(|v| v.as_bool()).unwrap_or(false);
                let handler = Arc::new(LimitConcurrentReq::new(inner, limit, blocking)?);
                self.register(name, handler)
            }
            ModulePath::LogicalQuestionRuleSet => {
                let rules_cfg = cfg
                    .get("ruleAndHandlers")
                    .and_then(|v| v.as_object())
                    .ok_or("QuestionRuleSet requires \"ruleAndHandlers\"")?;
                let rules = rules_cfg
                    .iter()
                    .map(|(rule_str, handler_value)| {
                        let rule = QuestionRule::parse(rule_str)?;
                        let handler = self.resolve_question_handler(handler_value, "ruleAndHandlers{}")?;
                        Ok((rule, handler))
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                let handler = Arc::new(QuestionRuleSet::new(rules)?);
                self.register(name, handler)
            }
            ModulePath::LogicalRaiseExcept => {
                let class_name = cfg
                    .get("exceptToRaise")
                    .and_then(|v| v.as_str())
                    .ok_or("RaiseExcept requires \"exceptToRaise\"")?;
                let args = string_array(cfg.get("exceptArgs"));
                let handler = Arc::new(RaiseExcept::new(class_name, args)?);
                self.register(name, handler)
            }
            ModulePath::LogicalQtAnsLog => {
                let inner_field = cfg.get("inner").ok_or("QtAnsLog requires \"inner\"")?;
                let inner = self.resolve_question_handler(inner_field, "inner")?;
                let classes = cfg.get("classes").and_then(|v| v.as_array()).map(|arr| {
                    arr.iter().filter_map(|v| v.as_str()).filter_map(parse_class_opt).collect()
                });
                let types = cfg.get("types").and_then(|v| v.as_array()).map(|arr| {
                    arr.iter().filter_map(|v| v.as_str()).filter_map(parse_rtype_opt).collect()
                });
                let name_pattern = cfg.get("namePattern").and_then(|v| v.as_str());
                let handler = Arc::new(QtAnsLog::new(inner, classes, types, name_pattern)?);
                self.register(name, handler)
            }
            ModulePath::RemoteUdp => {
                let endpoint = self.take_endpoint(cfg.get("endpoint").ok_or("Remote.UDP requires \"endpoint\"")?, "endpoint")?;
                let timeout = parse_timeout(cfg);
                let handler = Arc::new(UdpHandler::new(endpoint, timeout));
                self.register(name, handler)
            }
            ModulePath::RemoteTcp => {
                let endpoint = self.take_endpoint(cfg.get("endpoint").ok_or("Remote.TCP requires \"endpoint\"")?, "endpoint")?;
                let timeout = parse_timeout(cfg);
                let handler = Arc::new(TcpHandler::new(endpoint, timeout));
                self.register(name, handler)
            }
            ModulePath::RemoteHttps => {
                let endpoint = self.take_endpoint(cfg.get("endpoint").ok_or("Remote.HTTPS requires \"endpoint\"")?, "endpoint")?;
                let timeout = parse_timeout(cfg);
                let handler = Arc::new(DohHandler::new(endpoint, timeout));
                self.register(name, handler)
            }
            ModulePath::RemoteByProtocol => {
                let endpoint = self.take_endpoint(cfg.get("endpoint").ok_or("Remote.ByProtocol requires \"endpoint\"")?, "endpoint")?;
                let timeout = parse_timeout(cfg);
                let handler = Arc::new(ByProtocol::new(endpoint, timeout)?);
                self.register(name, handler)
            }
            ModulePath::RemoteEndpoint | ModulePath::RemoteStaticEndpoint | ModulePath::ServerUdp | ModulePath::ServerTcp => {
                unreachable!("handled elsewhere")
            }
        }
    }

    /// Resolves a `Server.UDP`/`Server.TCP` item's `downstream` field to the
    /// handler it should serve, without building a listener — listener
    /// construction needs an async bind and belongs in `service.rs`.
    pub fn resolve_server_downstream(&self, item: &ModuleEntry) -> Result<(IpAddr, u16, Arc<dyn Handler>), String> {
        let cfg = &item.config;
        let ip: IpAddr = cfg
            .get("ip")
            .and_then(|v| v.as_str())
            .ok_or("server item requires \"ip\"")?
            .parse()
            .map_err(|e| format!("invalid \"ip\": {e}"))?;
        let port = cfg.get("port").and_then(|v| v.as_u64()).ok_or("server item requires \"port\"")? as u16;
        let downstream_field = cfg.get("downstream").ok_or("server item requires \"downstream\"")?;
        let handler = self.resolve_handler(downstream_field, "downstream")?;
        Ok((ip, port, handler))
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

fn parse_timeout(cfg: &serde_json::Value) -> Duration {
    let ms = cfg.get("timeoutMs").and_then(|v| v.as_u64()).unwrap_or(2000);
    Duration::from_millis(ms)
}

fn parse_proto(s: &str) -> Result<Proto, String> {
    match s.to_ascii_lowercase().as_str() {
        "udp" => Ok(Proto::Udp),
        "tcp" => Ok(Proto::Tcp),
        "tls" => Ok(Proto::Tls),
        "https" => Ok(Proto::Https),
        other => Err(format!("unknown protocol \"{other}\"")),
    }
}

fn string_array(value: Option<&serde_json::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn parse_rtype(s: &str) -> Result<RecordType, String> {
    parse_rtype_opt(s).ok_or_else(|| format!("unsupported record type \"{s}\""))
}

fn parse_rtype_opt(s: &str) -> Option<RecordType> {
    match s.to_ascii_uppercase().as_str() {
        "A" => Some(RecordType::A),
        "AAAA" => Some(RecordType::AAAA),
        "CNAME" => Some(RecordType::CNAME),
        "NS" => Some(RecordType::NS),
        "PTR" => Some(RecordType::PTR),
        "TXT" => Some(RecordType::TXT),
        _ => None,
    }
}

fn parse_class_opt(s: &str) -> Option<DNSClass> {
    match s.to_ascii_uppercase().as_str() {
        "IN" => Some(DNSClass::IN),
        "CH" => Some(DNSClass::CH),
        "HS" => Some(DNSClass::HS),
        _ => None,
    }
}

/// Parses one textual rdata value for `rtype`. Only the record types
/// `Downstream.Local.Hosts`/`ConstAns` configs realistically need are
/// supported; anything else is a config-time error rather than a panic.
fn parse_rdata(rtype: RecordType, raw: &str) -> Result<RData, String> {
    match rtype {
        RecordType::A => raw.parse().map(A).map(RData::A).map_err(|e| format!("invalid A rdata \"{raw}\": {e}")),
        RecordType::AAAA => raw.parse().map(AAAA).map(RData::AAAA).map_err(|e| format!("invalid AAAA rdata \"{raw}\": {e}")),
        RecordType::CNAME => raw.parse::<Name>().map(CNAME).map(RData::CNAME).map_err(|e| format!("invalid CNAME rdata \"{raw}\": {e}")),
        RecordType::NS => raw.parse::<Name>().map(NS).map(RData::NS).map_err(|e| format!("invalid NS rdata \"{raw}\": {e}")),
        RecordType::PTR => raw.parse::<Name>().map(PTR).map(RData::PTR).map_err(|e| format!("invalid PTR rdata \"{raw}\": {e}")),
        RecordType::TXT => Ok(RData::TXT(TXT::new(vec![raw.to_string()]))),
        other => Err(format!("unsupported rdata type {other}")),
    }
}

fn build_hosts_data(records: &[serde_json::Value]) -> Result<HostsData, String> {
    let mut data = HostsData::new();
    for record in records {
        let name: Name = record
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or("Hosts record requires \"name\"")?
            .parse()
            .map_err(|e| format!("invalid hosts record name: {e}"))?;
        let class = record
            .get("class")
            .and_then(|v| v.as_str())
            .and_then(parse_class_opt)
            .unwrap_or(DNSClass::IN);
        let rtype = parse_rtype(record.get("type").and_then(|v| v.as_str()).ok_or("Hosts record requires \"type\"")?)?;
        let rdata = record.get("rdata").and_then(|v| v.as_array()).ok_or("Hosts record requires \"rdata\"")?;
        let parsed = rdata
            .iter()
            .map(|v| parse_rdata(rtype, v.as_str().unwrap_or_default()))
            .collect::<Result<Vec<_>, _>>()?;
        data.insert(name, class, rtype, parsed)?;
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(module: &str, name: Option<&str>, config: serde_json::Value) -> ModuleEntry {
        ModuleEntry { module: module.to_string(), name: name.map(str::to_string), config }
    }

    #[test]
    fn test_build_hosts_and_cache_chain() {
        let mut builder = Builder::new();
        builder
            .apply_downstream_item(&entry(
                "Downstream.Local.Hosts",
                Some("hosts1"),
                serde_json::json!({"records": [{"name": "dns.google.", "type": "A", "rdata": ["8.8.8.8", "8.8.4.4"]}]}),
            ))
            .unwrap();
        builder
            .apply_downstream_item(&entry(
                "Downstream.Local.Cache",
                Some("cache1"),
                serde_json::json!({"inner": "s:hosts1"}),
            ))
            .unwrap();

        assert!(builder.collection.handlers.get("cache1").is_some());
    }

    #[test]
    fn test_unknown_module_path_rejected() {
        let err = ModulePath::parse("Downstream.Bogus.Thing").unwrap_err();
        assert!(err.contains("unrecognized"));
    }

    #[test]
    fn test_endpoint_then_udp_consumes_it() {
        let mut builder = Builder::new();
        builder
            .apply_downstream_item(&entry(
                "Downstream.Remote.StaticEndpoint",
                Some("bootstrap"),
                serde_json::json!({"ip": "8.8.8.8", "proto": "udp"}),
            ))
            .unwrap();
        assert!(builder.endpoints.contains_key("bootstrap"));

        builder
            .apply_downstream_item(&entry(
                "Downstream.Remote.UDP",
                Some("udp1"),
                serde_json::json!({"endpoint": "s:bootstrap"}),
            ))
            .unwrap();
        assert!(!builder.endpoints.contains_key("bootstrap"));
        assert!(builder.collection.handlers.get("udp1").is_some());
    }

    #[test]
    fn test_server_item_resolves_downstream_ref() {
        let mut builder = Builder::new();
        builder
            .apply_downstream_item(&entry("Downstream.Local.Hosts", Some("hosts1"), serde_json::json!({"records": []})))
            .unwrap();
        let server_item = entry("Server.UDP", None, serde_json::json!({"ip": "0.0.0.0", "port": 53, "downstream": "s:hosts1"}));
        let (ip, port, _handler) = builder.resolve_server_downstream(&server_item).unwrap();
        assert_eq!(ip, IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));
        assert_eq!(port, 53);
    }
}
