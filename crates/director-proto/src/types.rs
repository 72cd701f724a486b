//! Wire entity and enum definitions.
//!
//! Enum values carry an optional string tag, the schema annotation the
//! domain layer keys on. Values without a tag (the `Unspecified` zeroes)
//! never enter the registry and fail validation at every ingress boundary.

use serde::{Deserialize, Serialize};

/// L4 transport of a virtual server address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkTransport {
    /// Zero value, carries no tag.
    #[default]
    Unspecified = 0,
    /// TCP.
    Tcp = 1,
    /// UDP.
    Udp = 2,
}

impl NetworkTransport {
    /// Every wire value, in declaration order.
    pub const VALUES: [Self; 3] = [Self::Unspecified, Self::Tcp, Self::Udp];

    /// The `transport` annotation of this value, if any.
    #[must_use]
    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Self::Unspecified => None,
            Self::Tcp => Some("tcp"),
            Self::Udp => Some("udp"),
        }
    }
}

/// Load-balancing algorithm of a virtual server.
///
/// The tag strings are the kernel scheduler module names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleMethod {
    /// Zero value, carries no tag.
    #[default]
    Unspecified = 0,
    /// Round-robin.
    Rr = 1,
    /// Weighted round-robin.
    Wrr = 2,
    /// Least-connection.
    Lc = 3,
    /// Weighted least-connection.
    Wlc = 4,
    /// Locality-based least-connection.
    Lblc = 5,
    /// Locality-based least-connection with replication.
    Lblcr = 6,
    /// Destination hashing.
    Dh = 7,
    /// Source hashing.
    Sh = 8,
    /// Shortest expected delay.
    Sed = 9,
    /// Never queue.
    Nq = 10,
}

impl ScheduleMethod {
    /// Every wire value, in declaration order.
    pub const VALUES: [Self; 11] = [
        Self::Unspecified,
        Self::Rr,
        Self::Wrr,
        Self::Lc,
        Self::Wlc,
        Self::Lblc,
        Self::Lblcr,
        Self::Dh,
        Self::Sh,
        Self::Sed,
        Self::Nq,
    ];

    /// The `schedule-alg` annotation of this value, if any.
    #[must_use]
    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Self::Unspecified => None,
            Self::Rr => Some("rr"),
            Self::Wrr => Some("wrr"),
            Self::Lc => Some("lc"),
            Self::Wlc => Some("wlc"),
            Self::Lblc => Some("lblc"),
            Self::Lblcr => Some("lblcr"),
            Self::Dh => Some("dh"),
            Self::Sh => Some("sh"),
            Self::Sed => Some("sed"),
            Self::Nq => Some("nq"),
        }
    }
}

/// How the kernel forwards packets to a real server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PacketFwdMethod {
    /// Zero value, carries no tag.
    #[default]
    Unspecified = 0,
    /// Masquerading (NAT).
    Nat = 1,
    /// IP-IP tunnel.
    Tun = 2,
    /// Direct routing.
    Dr = 3,
}

impl PacketFwdMethod {
    /// Every wire value, in declaration order.
    pub const VALUES: [Self; 4] = [Self::Unspecified, Self::Nat, Self::Tun, Self::Dr];

    /// The `fwd-alg` annotation of this value, if any.
    #[must_use]
    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Self::Unspecified => None,
            Self::Nat => Some("nat"),
            Self::Tun => Some("tun"),
            Self::Dr => Some("dr"),
        }
    }
}

/// Virtual server keyed by transport, host and port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualServerAddress {
    /// L4 transport.
    pub network: NetworkTransport,
    /// IPv4 host literal.
    pub host: String,
    /// Port number.
    pub port: u32,
}

/// Identity of a virtual server.
///
/// Exactly one of the two fields is expected to be set; the conversion
/// layer rejects everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualServerIdentity {
    /// Keyed by (transport, host, port).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<VirtualServerAddress>,
    /// Keyed by Netfilter firewall mark.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_mark: Option<u32>,
}

/// A virtual server entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualServer {
    /// Identity of the server.
    pub identity: VirtualServerIdentity,
    /// Scheduling algorithm.
    pub schedule_method: ScheduleMethod,
}

/// Address of a real server (backend).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealServerAddress {
    /// IPv4 host literal.
    pub host: String,
    /// Port number.
    pub port: u32,
}

/// A real server (backend) entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealServer {
    /// Backend address.
    pub address: RealServerAddress,
    /// Packet forwarding method.
    pub packet_forwarder: PacketFwdMethod,
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

    #[test_case(NetworkTransport::Tcp, Some("tcp"))]
    #[test_case(NetworkTransport::Udp, Some("udp"))]
    #[test_case(NetworkTransport::Unspecified, None)]
    fn transport_tags(value: NetworkTransport, tag: Option<&'static str>) {
        assert_eq!(value.tag(), tag);
    }

    #[test]
    fn schedule_values_are_unique() {
        for (i, a) in ScheduleMethod::VALUES.iter().enumerate() {
            for b in &ScheduleMethod::VALUES[i + 1..] {
                assert_ne!(a, b);
                if let (Some(ta), Some(tb)) = (a.tag(), b.tag()) {
                    assert_ne!(ta, tb);
                }
            }
        }
    }

    #[test]
    fn identity_json_shape() {
        let id = VirtualServerIdentity {
            firewall_mark: Some(17),
            ..Default::default()
        };
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, r#"{"firewall_mark":17}"#);

        let back: VirtualServerIdentity = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn virtual_server_json_round_trip() {
        let vs = VirtualServer {
            identity: VirtualServerIdentity {
                address: Some(VirtualServerAddress {
                    network: NetworkTransport::Tcp,
                    host: "10.0.0.1".into(),
                    port: 8080,
                }),
                firewall_mark: None,
            },
            schedule_method: ScheduleMethod::Wrr,
        };
        let json = serde_json::to_string(&vs).expect("serialize");
        assert!(json.contains(r#""network":"TCP""#));
        assert!(json.contains(r#""schedule_method":"WRR""#));
        let back: VirtualServer = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, vs);
    }

    #[test]
    fn real_server_defaults_fill_missing_fields() {
        let rs: RealServer = serde_json::from_str(r#"{"weight": 3}"#).expect("deserialize");
        assert_eq!(rs.weight, 3);
        assert_eq!(rs.packet_forwarder, PacketFwdMethod::Unspecified);
        assert_eq!(rs.address, RealServerAddress::default());
    }
}
