//! DNS-level error taxonomy.
//!
//! Handlers propagate these variants unchanged so combinators such as
//! [`crate::logical::failover::Failover`] can pattern-match on their class.
//! `ServerNetworkError` is logically a subtype of `ServerFault` (see
//! [`DnsError::is_server_fault`]) since Rust enums don't carry subtyping.

use hickory_proto::op::ResponseCode;

use crate::recursion::Frame;

#[derive(thiserror::Error, Debug, Clone)]
pub enum DnsError {
    #[error("DNS name \"{name}\" not found by \"{resp_server}\"")]
    NameNotFound { name: String, resp_server: String },

    #[error("DNS name \"{name}\" has zero answer")]
    ZeroAnswer { name: String },

    #[error("DNS request from \"{from}\" to \"{to}\" has been refused")]
    RequestRefused { from: String, to: String },

    #[error("{0}")]
    ServerFault(String),

    #[error("{0}")]
    ServerNetworkError(String),

    #[error("recursion depth exceeded, stack: {0:?}")]
    RecursionDepthError(Vec<Frame>),
}

impl DnsError {
    /// True for `ServerFault` and its network-error "subtype".
    pub fn is_server_fault(&self) -> bool {
        matches!(self, DnsError::ServerFault(_) | DnsError::ServerNetworkError(_))
    }

    /// The coarse class name used by config-driven except lists
    /// (`Failover.exceptList`, `RaiseExcept.exceptToRaise`).
    pub fn class_name(&self) -> &'static str {
        match self {
            DnsError::NameNotFound { .. } => "NameNotFound",
            DnsError::ZeroAnswer { .. } => "ZeroAnswer",
            DnsError::RequestRefused { .. } => "RequestRefused",
            DnsError::ServerFault(_) => "ServerFault",
            DnsError::ServerNetworkError(_) => "ServerNetworkError",
            DnsError::RecursionDepthError(_) => "RecursionDepthError",
        }
    }

    /// Matches an except-list class name against this error, honoring the
    /// taxonomy (`DNSException` is the root and matches everything;
    /// `ServerNetworkError` is a subtype of `ServerFault`, per §7).
    pub fn matches_class(&self, class: &str) -> bool {
        if class == "DNSException" {
            return true;
        }
        if class == "ServerFault" && self.is_server_fault() {
            return true;
        }
        self.class_name() == class
    }

    /// Maps this error to the RCODE the listener should answer with.
    pub fn to_rcode(&self) -> ResponseCode {
        match self {
            DnsError::NameNotFound { .. } => ResponseCode::NXDomain,
            DnsError::ZeroAnswer { .. } => ResponseCode::NoError,
            DnsError::RequestRefused { .. } => ResponseCode::Refused,
            DnsError::ServerFault(_)
            | DnsError::ServerNetworkError(_)
            | DnsError::RecursionDepthError(_) => ResponseCode::ServFail,
        }
    }
}

/// Parses the upstream's own RCODE into our error taxonomy, per §7's
/// "Upstream RCODE mapping (protocol client side)".
pub fn rcode_to_result(rcode: ResponseCode, query_name: &str, remote: &str) -> Result<(), DnsError> {
    match rcode {
        ResponseCode::NoError => Ok(()),
        ResponseCode::Refused => {
            Err(DnsError::RequestRefused { from: "local".to_string(), to: remote.to_string() })
        }
        ResponseCode::ServFail => Err(DnsError::ServerFault(format!(
            "the remote server {remote} failed to process the request for name {query_name}"
        ))),
        ResponseCode::NXDomain => {
            Err(DnsError::NameNotFound { name: query_name.to_string(), resp_server: remote.to_string() })
        }
        other => Err(DnsError::ServerFault(format!(
            "the remote server {remote} returned unsupported response code {other} for name {query_name}"
        ))),
    }
}

/// Resolves an exception class name (as used in config, e.g.
/// `"NameNotFound"`) to a validator over that class. Rejects unknown names,
/// mirroring `Exceptions.GetExceptionByName`.
pub fn validate_except_name(name: &str) -> Result<(), String> {
    const KNOWN: &[&str] = &[
        "DNSException",
        "NameNotFound",
        "ZeroAnswer",
        "RequestRefused",
        "ServerFault",
        "ServerNetworkError",
        "RecursionDepthError",
    ];
    if KNOWN.contains(&name) {
        Ok(())
    } else {
        Err(format!("no such exception \"{name}\""))
    }
}

/// Constructs a `DnsError` for `RaiseExcept`, given a class name and the
/// constructor args it declares in config.
pub fn except_by_name(name: &str, args: &[String]) -> Result<DnsError, String> {
    match name {
        "NameNotFound" => {
            let name = args.first().cloned().unwrap_or_default();
            let resp_server = args.get(1).cloned().unwrap_or_default();
            Ok(DnsError::NameNotFound { name, resp_server })
        }
        "ZeroAnswer" => Ok(DnsError::ZeroAnswer { name: args.first().cloned().unwrap_or_default() }),
        "RequestRefused" => {
            let from = args.first().cloned().unwrap_or_default();
            let to = args.get(1).cloned().unwrap_or_default();
            Ok(DnsError::RequestRefused { from, to })
        }
        "ServerFault" | "DNSException" => {
            Ok(DnsError::ServerFault(args.first().cloned().unwrap_or_default()))
        }
        "ServerNetworkError" => {
            Ok(DnsError::ServerNetworkError(args.first().cloned().unwrap_or_default()))
        }
        other => Err(format!("no such exception \"{other}\"")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_server_fault() {
        assert!(DnsError::ServerFault("x".into()).is_server_fault());
        assert!(DnsError::ServerNetworkError("x".into()).is_server_fault());
        assert!(!DnsError::ZeroAnswer { name: "a".into() }.is_server_fault());
    }

    #[test]
    fn test_rcode_mapping() {
        assert_eq!(DnsError::NameNotFound { name: "a".into(), resp_server: "s".into() }.to_rcode(), ResponseCode::NXDomain);
        assert_eq!(DnsError::ZeroAnswer { name: "a".into() }.to_rcode(), ResponseCode::NoError);
        assert_eq!(DnsError::RequestRefused { from: "a".into(), to: "b".into() }.to_rcode(), ResponseCode::Refused);
        assert_eq!(DnsError::ServerFault("x".into()).to_rcode(), ResponseCode::ServFail);
    }

    #[test]
    fn test_rcode_to_result() {
        assert!(rcode_to_result(ResponseCode::NoError, "a", "r").is_ok());
        assert!(matches!(
            rcode_to_result(ResponseCode::NXDomain, "a", "r"),
            Err(DnsError::NameNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_except_name() {
        assert!(validate_except_name("NameNotFound").is_ok());
        assert!(validate_except_name("NotARealException").is_err());
    }

    #[test]
    fn test_matches_class_server_network_error_is_a_server_fault() {
        let err = DnsError::ServerNetworkError("timed out".to_string());
        assert!(err.matches_class("ServerFault"));
        assert!(err.matches_class("ServerNetworkError"));
        assert!(!err.matches_class("NameNotFound"));
    }

    #[test]
    fn test_matches_class_dns_exception_matches_everything() {
        assert!(DnsError::ZeroAnswer { name: "a".into() }.matches_class("DNSException"));
        assert!(DnsError::ServerFault("x".into()).matches_class("DNSException"));
        assert!(DnsError::ServerNetworkError("x".into()).matches_class("DNSException"));
    }
}
