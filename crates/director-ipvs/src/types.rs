//! Domain entities of the IPVS administration layer.
//!
//! Entities are transient, request-scoped values; the kernel is the only
//! store. Tag newtypes validate against the wire-schema registry, so no
//! unregistered value ever reaches the driver.

use std::fmt;
use std::net::Ipv4Addr;

use director_proto::registry;

use crate::error::{AdminError, AdminResult};

/// L4 protocol tag of a virtual server address (`tcp` or `udp`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkProtocol(String);

impl NetworkProtocol {
    /// Wrap a protocol tag. Validation happens in [`Self::valid`].
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The raw tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the tag against the registry.
    pub fn valid(&self) -> AdminResult<()> {
        if registry::is_transport_tag(&self.0) {
            Ok(())
        } else {
            Err(AdminError::Unsupported(format!("NetworkProtocol({})", self.0)))
        }
    }
}

impl fmt::Display for NetworkProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkProtocol {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Load-balancing algorithm tag of a virtual server (`rr`, `wrr`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleMethod(String);

impl ScheduleMethod {
    /// Wrap a schedule tag. Validation happens in [`Self::valid`].
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The raw tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the tag against the registry.
    pub fn valid(&self) -> AdminResult<()> {
        if registry::is_schedule_tag(&self.0) {
            Ok(())
        } else {
            Err(AdminError::Unsupported(format!("ScheduleMethod({})", self.0)))
        }
    }
}

impl fmt::Display for ScheduleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScheduleMethod {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Packet forwarding tag of a real server (`nat`, `dr` or `tun`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PacketForwarder(String);

impl PacketForwarder {
    /// Wrap a forwarder tag. Validation happens in [`Self::valid`].
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The raw tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the tag against the registry.
    pub fn valid(&self) -> AdminResult<()> {
        if registry::is_fwd_tag(&self.0) {
            Ok(())
        } else {
            Err(AdminError::Unsupported(format!("PacketForwarder({})", self.0)))
        }
    }
}

impl fmt::Display for PacketForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PacketForwarder {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// A textual `host:port` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Wrap a `host:port` string as-is.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Join a host and port into an address.
    #[must_use]
    pub fn from_host_port(host: &str, port: u32) -> Self {
        Self(format!("{host}:{port}"))
    }

    /// The raw `host:port` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into an IPv4 host and a port.
    ///
    /// Fails with a descriptive [`AdminError::Address`] when the host is
    /// not an IPv4 literal or the port is not a valid integer.
    pub fn to_host_port(&self) -> AdminResult<(Ipv4Addr, u32)> {
        let (host, port) = self
            .0
            .rsplit_once(':')
            .ok_or_else(|| AdminError::Address(format!("'{}' is not host:port", self.0)))?;
        let host: Ipv4Addr = host
            .parse()
            .map_err(|_| AdminError::Address(format!("'{host}' is not an IPv4 host")))?;
        let port: u32 = port
            .parse()
            .map_err(|_| AdminError::Address(format!("wrong port('{port}')")))?;
        Ok((host, port))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(addr: &str) -> Self {
        Self::new(addr)
    }
}

/// Identity of a virtual server: either an address tuple or a firewall
/// mark. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VirtualServerIdentity {
    /// Keyed by (L4 protocol, IPv4 host, port).
    Address {
        /// L4 protocol tag.
        protocol: NetworkProtocol,
        /// `host:port` endpoint.
        address: Address,
    },
    /// Keyed by a Netfilter firewall mark.
    FirewallMark {
        /// The mark value.
        mark: u32,
    },
}

impl fmt::Display for VirtualServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address { protocol, address } => write!(f, "{protocol}://{address}"),
            Self::FirewallMark { mark } => write!(f, "fwmark:{mark}"),
        }
    }
}

/// A virtual server entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualServer {
    /// Identity of the server.
    pub identity: VirtualServerIdentity,
    /// Scheduling algorithm tag.
    pub schedule_method: ScheduleMethod,
}

/// A real server (backend) entry.
///
/// Invariant, enforced at ingress: `lower_threshold <= upper_threshold`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealServer {
    /// Backend `host:port`.
    pub address: Address,
    /// Packet forwarding tag.
    pub packet_forwarder: PacketForwarder,
    /// Scheduling weight.
    pub weight: u32,
    /// Upper connection threshold.
    pub upper_threshold: u32,
    /// Lower connection threshold.
    pub lower_threshold: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("10.1.2.3:80", Some((Ipv4Addr::new(10, 1, 2, 3), 80)); "plain")]
    #[test_case("0.0.0.0:0", Some((Ipv4Addr::new(0, 0, 0, 0), 0)); "zeroes")]
    #[test_case("example.com:80", None; "hostname rejected")]
    #[test_case("::1:80", None; "ipv6 rejected")]
    #[test_case("10.1.2.3", None; "missing port")]
    #[test_case("10.1.2.3:http", None; "named port")]
    #[test_case("10.1.2.3:-1", None; "negative port")]
    fn address_to_host_port(addr: &str, expected: Option<(Ipv4Addr, u32)>) {
        let got = Address::new(addr).to_host_port();
        match expected {
            Some(pair) => assert_eq!(got.expect("parse"), pair),
            None => assert!(got.is_err()),
        }
    }

    #[test]
    fn identity_equality_is_structural() {
        let a = VirtualServerIdentity::Address {
            protocol: "tcp".into(),
            address: "10.0.0.1:80".into(),
        };
        let b = VirtualServerIdentity::Address {
            protocol: "tcp".into(),
            address: "10.0.0.1:80".into(),
        };
        let c = VirtualServerIdentity::Address {
            protocol: "udp".into(),
            address: "10.0.0.1:80".into(),
        };
        let m = VirtualServerIdentity::FirewallMark { mark: 80 };
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, m);
        assert_eq!(m, VirtualServerIdentity::FirewallMark { mark: 80 });
    }

    #[test]
    fn identity_display_distinguishes_cases() {
        let addr = VirtualServerIdentity::Address {
            protocol: "tcp".into(),
            address: "10.0.0.1:80".into(),
        };
        let mark = VirtualServerIdentity::FirewallMark { mark: 17 };
        assert_eq!(addr.to_string(), "tcp://10.0.0.1:80");
        assert_eq!(mark.to_string(), "fwmark:17");
    }

    #[test]
    fn tag_validation_consults_registry() {
        assert!(NetworkProtocol::new("tcp").valid().is_ok());
        assert!(NetworkProtocol::new("sctp").valid().is_err());
        assert!(ScheduleMethod::new("wlc").valid().is_ok());
        assert!(ScheduleMethod::new("xx-not-a-method").valid().is_err());
        assert!(PacketForwarder::new("dr").valid().is_ok());
        assert!(PacketForwarder::new("bypass").valid().is_err());
    }
}
