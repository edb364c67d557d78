//! Upstream endpoint descriptor and URI parsing (§4.4, §6).
//!
//! An [`Endpoint`] names one upstream resolver: protocol, a host name or a
//! literal IP (at least one is required), a port, and the handler used to
//! resolve the host name if one was given. [`Endpoint::new_static`] builds
//! the "static" variant used to break resolver bootstrap cycles: it only
//! accepts a literal IP and refuses to ever delegate to a resolver.

use std::net::IpAddr;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::DnsError;
use crate::handler::QuickLookup;
use crate::recursion::Stack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proto {
    Udp,
    Tcp,
    Tls,
    Https,
}

impl Proto {
    pub fn default_port(self) -> u16 {
        match self {
            Proto::Udp => 53,
            Proto::Tcp => 53,
            Proto::Tls => 853,
            Proto::Https => 443,
        }
    }

    fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Proto::Udp),
            "tcp" => Ok(Proto::Tcp),
            "tls" => Ok(Proto::Tls),
            "https" => Ok(Proto::Https),
            other => Err(format!("unknown endpoint protocol \"{other}\"")),
        }
    }
}

/// `[<proto>://]<host-or-ip>[:<port>]` (§6). Total: returns either a parsed
/// `(proto, host?, ip?, port)` with exactly one of host/ip set, or an error.
pub fn parse_uri(uri: &str) -> Result<(Proto, Option<String>, Option<IpAddr>, u16), String> {
    let (proto, rest) = match uri.split_once("://") {
        Some((p, r)) => (Proto::parse(p)?, r),
        None => (Proto::Udp, uri),
    };

    if rest.is_empty() {
        return Err(format!("empty host in endpoint URI \"{uri}\""));
    }

    let (host_part, port_part) = if let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped
            .find(']')
            .ok_or_else(|| format!("unterminated IPv6 literal in endpoint URI \"{uri}\""))?;
        let host = &stripped[..end];
        let after = &stripped[end + 1..];
        (host, after.strip_prefix(':'))
    } else {
        match rest.rsplit_once(':') {
            Some((h, p)) if !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) => (h, Some(p)),
            _ => (rest, None),
        }
    };

    let port = match port_part {
        Some(p) => p.parse::<u16>().map_err(|e| format!("invalid port \"{p}\" in \"{uri}\": {e}"))?,
        None => proto.default_port(),
    };

    if let Ok(ip) = host_part.parse::<IpAddr>() {
        return Ok((proto, None, Some(ip), port));
    }

    let valid_host = !host_part.is_empty()
        && host_part.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid_host {
        return Err(format!("invalid host \"{host_part}\" in endpoint URI \"{uri}\""));
    }

    Ok((proto, Some(host_part.to_string()), None, port))
}

/// Descriptor of an upstream resolver (§3 `Endpoint`). Construction enforces
/// at least one of `host_name`/`ip_addr`; `is_static` endpoints are built via
/// [`Endpoint::new_static`] and only ever carry a literal IP.
pub struct Endpoint {
    instance_id: Uuid,
    pub proto: Proto,
    pub host_name: Option<String>,
    pub ip_addr: Option<IpAddr>,
    pub port: u16,
    pub resolver: Arc<dyn QuickLookup>,
    pub prefer_ipv6: bool,
    pub is_static: bool,
}

impl Endpoint {
    pub fn new(
        proto: Proto,
        host_name: Option<String>,
        ip_addr: Option<IpAddr>,
        port: u16,
        resolver: Arc<dyn QuickLookup>,
        prefer_ipv6: bool,
    ) -> Result<Self, String> {
        if host_name.is_none() && ip_addr.is_none() {
            return Err("Endpoint requires at least one of host_name/ip_addr".to_string());
        }
        Ok(Endpoint {
            instance_id: Uuid::new_v4(),
            proto,
            host_name,
            ip_addr,
            port,
            resolver,
            prefer_ipv6,
            is_static: false,
        })
    }

    /// A "static" endpoint: literal IP only, never delegates to `resolver`.
    /// Used as the resolver-of-last-resort for other endpoints so bootstrap
    /// doesn't cycle back on itself.
    pub fn new_static(
        proto: Proto,
        ip_addr: IpAddr,
        port: u16,
        resolver: Arc<dyn QuickLookup>,
        prefer_ipv6: bool,
    ) -> Self {
        Endpoint {
            instance_id: Uuid::new_v4(),
            proto,
            host_name: None,
            ip_addr: Some(ip_addr),
            port,
            resolver,
            prefer_ipv6,
            is_static: true,
        }
    }

    pub fn from_uri(
        uri: &str,
        resolver: Arc<dyn QuickLookup>,
        prefer_ipv6: bool,
    ) -> Result<Self, String> {
        let (proto, host_name, ip_addr, port) = parse_uri(uri)?;
        Endpoint::new(proto, host_name, ip_addr, port, resolver, prefer_ipv6)
    }

    /// Returns the literal IP if known; otherwise resolves `host_name`
    /// through `resolver`, pushing `(instance_id, "Endpoint.GetIPAddr")`
    /// onto the recursion stack first.
    pub async fn get_ip_addr(&self, stack: &Stack) -> Result<IpAddr, DnsError> {
        if let Some(ip) = self.ip_addr {
            return Ok(ip);
        }
        let host = self.host_name.as_ref().expect("invariant: host or ip present");
        if self.is_static {
            return Err(DnsError::ServerFault(format!(
                "static endpoint for \"{host}\" has no literal IP configured"
            )));
        }

        let stack = crate::recursion::guard(
            stack,
            self.instance_id,
            "Endpoint.GetIPAddr",
            crate::recursion::DEFAULT_MAX_REC_DEPTH,
            false,
        )?;
        self.resolver.lookup_ip_addr(host, self.prefer_ipv6, &stack).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_parse_https_with_bracketed_ipv6_and_port() {
        let (proto, host, ip, port) = parse_uri("https://[2001:4860:4860::8888]:8443").unwrap();
        assert_eq!(proto, Proto::Https);
        assert_eq!(host, None);
        assert_eq!(ip, Some(IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888))));
        assert_eq!(port, 8443);
    }

    #[test]
    fn test_parse_defaults_to_udp_port_53() {
        let (proto, host, ip, port) = parse_uri("dns.google").unwrap();
        assert_eq!(proto, Proto::Udp);
        assert_eq!(host, Some("dns.google".to_string()));
        assert_eq!(ip, None);
        assert_eq!(port, 53);
    }

    #[test]
    fn test_parse_tcp_with_explicit_port() {
        let (proto, host, ip, port) = parse_uri("tcp://8.8.8.8:5353").unwrap();
        assert_eq!(proto, Proto::Tcp);
        assert_eq!(host, None);
        assert_eq!(ip, Some(IpAddr::V4("8.8.8.8".parse().unwrap())));
        assert_eq!(port, 5353);
    }

    #[test]
    fn test_parse_rejects_unknown_proto() {
        assert!(parse_uri("ftp://8.8.8.8").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_host() {
        assert!(parse_uri("udp://").is_err());
    }

    #[test]
    fn test_new_requires_host_or_ip() {
        struct Dummy;
        #[async_trait::async_trait]
        impl crate::handler::QuestionHandler for Dummy {
            async fn handle_question(
                &self,
                _q: &crate::msgentry::Question,
                _s: &Stack,
            ) -> Result<Vec<crate::msgentry::MsgEntry>, DnsError> {
                Ok(vec![])
            }
        }
        impl QuickLookup for Dummy {}
        let err = Endpoint::new(Proto::Udp, None, None, 53, Arc::new(Dummy), false).unwrap_err();
        assert!(err.contains("requires at least one"));
    }
}
