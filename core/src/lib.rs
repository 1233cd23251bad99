//! Shared types for the UPnP redirection monitor: the redirection record, its
//! dedup identity, the persistence line codec, and the gateway client seam.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Transport protocol of a port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    TCP,
    UDP,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::TCP => f.write_str("TCP"),
            Protocol::UDP => f.write_str("UDP"),
        }
    }
}

/// One port-forwarding rule as seen on the gateway at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub protocol: Protocol,
    /// Internal/LAN address the mapping forwards to.
    pub host_ip: String,
    pub host_port: u16,
    /// Empty means "any remote host".
    pub remote_host: String,
    pub remote_port: u16,
    /// Informational only; never part of the mapping identity.
    pub description: String,
}

/// Dedup identity of a mapping: every field except `description`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingKey {
    pub protocol: Protocol,
    pub host_ip: String,
    pub host_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

// Persisted line layout: [protocol, host_ip, host_port, remote_host, remote_port, description]
type Row = (Protocol, String, u16, String, u16, String);

impl Redirection {
    pub fn key(&self) -> MappingKey {
        MappingKey {
            protocol: self.protocol,
            host_ip: self.host_ip.clone(),
            host_port: self.host_port,
            remote_host: self.remote_host.clone(),
            remote_port: self.remote_port,
        }
    }

    /// True when `other` describes the same mapping, ignoring `description`.
    pub fn same_mapping(&self, other: &Redirection) -> bool {
        self.key() == other.key()
    }

    /// Encode as one persistence-file line: a JSON array in field order.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(&(
            self.protocol,
            &self.host_ip,
            self.host_port,
            &self.remote_host,
            self.remote_port,
            &self.description,
        ))
    }

    /// Decode one persistence-file line.
    pub fn from_line(line: &str) -> serde_json::Result<Redirection> {
        let (protocol, host_ip, host_port, remote_host, remote_port, description): Row =
            serde_json::from_str(line)?;
        Ok(Redirection { protocol, host_ip, host_port, remote_host, remote_port, description })
    }
}

/// Alert format: `TCP 192.168.1.10:8080 => :8080 as "web"`.
impl fmt::Display for Redirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} => {}:{} as \"{}\"",
            self.protocol, self.host_ip, self.host_port, self.remote_host, self.remote_port, self.description
        )
    }
}

/// Seam to the UPnP gateway: yields a point-in-time snapshot of the full
/// mapping table on every call.
pub trait GatewayClient {
    fn redirections(&mut self) -> anyhow::Result<Vec<Redirection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(description: &str) -> Redirection {
        Redirection {
            protocol: Protocol::TCP,
            host_ip: "192.168.1.10".into(),
            host_port: 8080,
            remote_host: String::new(),
            remote_port: 8080,
            description: description.into(),
        }
    }

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }

    #[test]
    fn description_does_not_affect_identity() {
        let a = record("web");
        let b = record("renamed later");
        assert_ne!(a, b);
        assert!(a.same_mapping(&b));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn port_change_breaks_identity() {
        let a = record("web");
        let mut b = record("web");
        b.remote_port = 8081;
        assert!(!a.same_mapping(&b));
    }

    #[test]
    fn line_roundtrip() {
        let r = Redirection {
            protocol: Protocol::UDP,
            host_ip: "10.0.0.2".into(),
            host_port: 5000,
            remote_host: "203.0.113.9".into(),
            remote_port: 6000,
            description: "voip".into(),
        };
        let line = r.to_line().unwrap();
        assert_eq!(line, r#"["UDP","10.0.0.2",5000,"203.0.113.9",6000,"voip"]"#);
        assert_eq!(Redirection::from_line(&line).unwrap(), r);
    }

    #[test]
    fn malformed_line_rejected() {
        assert!(Redirection::from_line("not json").is_err());
        assert!(Redirection::from_line(r#"["TCP","10.0.0.2"]"#).is_err());
        assert!(Redirection::from_line(r#"["ICMP","10.0.0.2",1,"",1,""]"#).is_err());
    }

    #[test]
    fn alert_line_format() {
        assert_eq!(record("web").to_string(), r#"TCP 192.168.1.10:8080 => :8080 as "web""#);
    }
}
