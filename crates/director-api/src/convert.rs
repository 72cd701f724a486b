//! Wire↔domain entity conversion.
//!
//! Ingress (`*_from_wire`) validates and fails with
//! [`ApiError::InvalidArgument`], echoing the offending payload. Egress
//! (`*_to_wire`) can only fail when a domain value carries a tag the
//! registry does not know. That cannot happen after validated ingress,
//! but the driver can surface such tags when listing kernel state.

use director_ipvs::{
    Address, AdminError, AdminResult, NetworkProtocol, PacketForwarder, RealServer,
    ScheduleMethod, VirtualServer, VirtualServerIdentity,
};
use director_proto::registry;
use director_proto::types as wire;

use crate::error::{ApiError, ApiResult};

/// Validate and convert a wire identity.
pub fn identity_from_wire(src: &wire::VirtualServerIdentity) -> ApiResult<VirtualServerIdentity> {
    match (&src.address, src.firewall_mark) {
        (Some(addr), None) => {
            let protocol = NetworkProtocol::new(addr.network.tag().unwrap_or_default());
            protocol
                .valid()
                .map_err(|e| ApiError::invalid_argument(e.to_string(), src))?;
            let address = Address::from_host_port(&addr.host, addr.port);
            address
                .to_host_port()
                .map_err(|e| ApiError::invalid_argument(e.to_string(), src))?;
            Ok(VirtualServerIdentity::Address { protocol, address })
        }
        (None, Some(mark)) => Ok(VirtualServerIdentity::FirewallMark { mark }),
        _ => Err(ApiError::invalid_argument(
            "virtual server identity must set exactly one of address or firewall_mark",
            src,
        )),
    }
}

/// Convert a domain identity back to the wire.
pub fn identity_to_wire(id: &VirtualServerIdentity) -> AdminResult<wire::VirtualServerIdentity> {
    match id {
        VirtualServerIdentity::Address { protocol, address } => {
            let (host, port) = address.to_host_port()?;
            let network = registry::transport_for_tag(protocol.as_str()).ok_or_else(|| {
                AdminError::Unsupported(format!("NetworkProtocol({protocol})"))
            })?;
            Ok(wire::VirtualServerIdentity {
                address: Some(wire::VirtualServerAddress {
                    network,
                    host: host.to_string(),
                    port,
                }),
                firewall_mark: None,
            })
        }
        VirtualServerIdentity::FirewallMark { mark } => Ok(wire::VirtualServerIdentity {
            address: None,
            firewall_mark: Some(*mark),
        }),
    }
}

/// Validate and convert a wire virtual server.
pub fn virtual_server_from_wire(src: &wire::VirtualServer) -> ApiResult<VirtualServer> {
    let identity = identity_from_wire(&src.identity)?;
    let schedule_method = ScheduleMethod::new(src.schedule_method.tag().unwrap_or_default());
    schedule_method
        .valid()
        .map_err(|e| ApiError::invalid_argument(e.to_string(), src))?;
    Ok(VirtualServer {
        identity,
        schedule_method,
    })
}

/// Convert a domain virtual server back to the wire.
pub fn virtual_server_to_wire(src: &VirtualServer) -> AdminResult<wire::VirtualServer> {
    let identity = identity_to_wire(&src.identity)?;
    let schedule_method =
        registry::schedule_for_tag(src.schedule_method.as_str()).ok_or_else(|| {
            AdminError::Unsupported(format!("ScheduleMethod({})", src.schedule_method))
        })?;
    Ok(wire::VirtualServer {
        identity,
        schedule_method,
    })
}

/// Join a wire backend address into a `host:port` string. No validation
/// at this stage; the value is checked where it is consumed.
#[must_use]
pub fn address_from_wire(src: &wire::RealServerAddress) -> Address {
    Address::from_host_port(&src.host, src.port)
}

/// Validate and convert a wire real server.
pub fn real_server_from_wire(src: &wire::RealServer) -> ApiResult<RealServer> {
    let address = address_from_wire(&src.address);
    address
        .to_host_port()
        .map_err(|e| ApiError::invalid_argument(e.to_string(), src))?;
    let packet_forwarder = PacketForwarder::new(src.packet_forwarder.tag().unwrap_or_default());
    packet_forwarder
        .valid()
        .map_err(|e| ApiError::invalid_argument(e.to_string(), src))?;
    if src.lower_threshold > src.upper_threshold {
        return Err(ApiError::invalid_argument(
            format!(
                "lower_threshold({}) > upper_threshold({})",
                src.lower_threshold, src.upper_threshold
            ),
            src,
        ));
    }
    Ok(RealServer {
        address,
        packet_forwarder,
        weight: src.weight,
        upper_threshold: src.upper_threshold,
        lower_threshold: src.lower_threshold,
    })
}

/// Convert a domain real server back to the wire.
pub fn real_server_to_wire(src: &RealServer) -> AdminResult<wire::RealServer> {
    let (host, port) = src.address.to_host_port()?;
    let packet_forwarder =
        registry::fwd_for_tag(src.packet_forwarder.as_str()).ok_or_else(|| {
            AdminError::Unsupported(format!("PacketForwarder({})", src.packet_forwarder))
        })?;
    Ok(wire::RealServer {
        address: wire::RealServerAddress {
            host: host.to_string(),
            port,
        },
        packet_forwarder,
        weight: src.weight,
        upper_threshold: src.upper_threshold,
        lower_threshold: src.lower_threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn address_identity(network: wire::NetworkTransport, host: &str, port: u32) -> wire::VirtualServerIdentity {
        wire::VirtualServerIdentity {
            address: Some(wire::VirtualServerAddress {
                network,
                host: host.into(),
                port,
            }),
            firewall_mark: None,
        }
    }

    #[test_case(wire::NetworkTransport::Tcp, "tcp")]
    #[test_case(wire::NetworkTransport::Udp, "udp")]
    fn protocol_conversion(network: wire::NetworkTransport, tag: &str) {
        let id = identity_from_wire(&address_identity(network, "10.0.0.1", 80)).expect("convert");
        let VirtualServerIdentity::Address { protocol, .. } = &id else {
            panic!("expected address identity");
        };
        assert_eq!(protocol.as_str(), tag);

        let back = identity_to_wire(&id).expect("back");
        assert_eq!(back.address.expect("address").network, network);
    }

    #[test]
    fn identity_requires_exactly_one_case() {
        let none = wire::VirtualServerIdentity::default();
        assert!(matches!(
            identity_from_wire(&none),
            Err(ApiError::InvalidArgument { .. })
        ));

        let both = wire::VirtualServerIdentity {
            address: Some(wire::VirtualServerAddress {
                network: wire::NetworkTransport::Tcp,
                host: "10.0.0.1".into(),
                port: 80,
            }),
            firewall_mark: Some(3),
        };
        assert!(matches!(
            identity_from_wire(&both),
            Err(ApiError::InvalidArgument { .. })
        ));
    }

    #[test_case(wire::NetworkTransport::Unspecified, "10.0.0.1"; "unspecified transport")]
    #[test_case(wire::NetworkTransport::Tcp, "not-an-ip"; "bad host")]
    fn invalid_address_identities_are_rejected(network: wire::NetworkTransport, host: &str) {
        let err = identity_from_wire(&address_identity(network, host, 80))
            .expect_err("must fail validation");
        let ApiError::InvalidArgument { details, .. } = err else {
            panic!("wrong kind: {err:?}");
        };
        // the offending payload is echoed back
        assert!(details.expect("details").to_string().contains(host));
    }

    #[test]
    fn unregistered_schedule_method_is_rejected() {
        let vs = wire::VirtualServer {
            identity: address_identity(wire::NetworkTransport::Tcp, "10.0.0.1", 80),
            schedule_method: wire::ScheduleMethod::Unspecified,
        };
        assert!(matches!(
            virtual_server_from_wire(&vs),
            Err(ApiError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn threshold_order_is_enforced() {
        let rs = wire::RealServer {
            address: wire::RealServerAddress {
                host: "10.0.0.2".into(),
                port: 8080,
            },
            packet_forwarder: wire::PacketFwdMethod::Nat,
            weight: 1,
            upper_threshold: 5,
            lower_threshold: 10,
        };
        let err = real_server_from_wire(&rs).expect_err("lower > upper");
        let ApiError::InvalidArgument { message, .. } = err else {
            panic!("wrong kind");
        };
        assert!(message.contains("lower_threshold(10) > upper_threshold(5)"));
    }

    #[test]
    fn egress_fails_on_unregistered_tags_only() {
        let rs = RealServer {
            address: "10.0.0.2:80".into(),
            packet_forwarder: PacketForwarder::new("4"),
            weight: 1,
            upper_threshold: 0,
            lower_threshold: 0,
        };
        assert!(matches!(
            real_server_to_wire(&rs),
            Err(AdminError::Unsupported(_))
        ));
    }

    fn arb_host() -> impl Strategy<Value = String> {
        any::<[u8; 4]>().prop_map(|o| std::net::Ipv4Addr::from(o).to_string())
    }

    fn arb_transport() -> impl Strategy<Value = wire::NetworkTransport> {
        prop_oneof![
            Just(wire::NetworkTransport::Tcp),
            Just(wire::NetworkTransport::Udp),
        ]
    }

    fn arb_schedule() -> impl Strategy<Value = wire::ScheduleMethod> {
        proptest::sample::select(
            wire::ScheduleMethod::VALUES
                .iter()
                .copied()
                .filter(|m| m.tag().is_some())
                .collect::<Vec<_>>(),
        )
    }

    fn arb_fwd() -> impl Strategy<Value = wire::PacketFwdMethod> {
        proptest::sample::select(
            wire::PacketFwdMethod::VALUES
                .iter()
                .copied()
                .filter(|m| m.tag().is_some())
                .collect::<Vec<_>>(),
        )
    }

    fn arb_identity() -> impl Strategy<Value = wire::VirtualServerIdentity> {
        prop_oneof![
            (arb_transport(), arb_host(), 0u32..=65535).prop_map(|(network, host, port)| {
                wire::VirtualServerIdentity {
                    address: Some(wire::VirtualServerAddress { network, host, port }),
                    firewall_mark: None,
                }
            }),
            any::<u32>().prop_map(|mark| wire::VirtualServerIdentity {
                address: None,
                firewall_mark: Some(mark),
            }),
        ]
    }

    proptest! {
        #[test]
        fn identity_round_trips(id in arb_identity()) {
            let domain = identity_from_wire(&id).expect("valid input converts");
            let back = identity_to_wire(&domain).expect("validated value converts back");
            prop_assert_eq!(back, id);
        }

        #[test]
        fn virtual_server_round_trips(id in arb_identity(), sched in arb_schedule()) {
            let vs = wire::VirtualServer { identity: id, schedule_method: sched };
            let domain = virtual_server_from_wire(&vs).expect("valid input converts");
            let back = virtual_server_to_wire(&domain).expect("validated value converts back");
            prop_assert_eq!(back, vs);
        }

        #[test]
        fn real_server_round_trips(
            host in arb_host(),
            port in 0u32..=65535,
            fwd in arb_fwd(),
            weight in any::<u32>(),
            lower in 0u32..1000,
            extra in 0u32..1000,
        ) {
            let rs = wire::RealServer {
                address: wire::RealServerAddress { host, port },
                packet_forwarder: fwd,
                weight,
                upper_threshold: lower + extra,
                lower_threshold: lower,
            };
            let domain = real_server_from_wire(&rs).expect("valid input converts");
            let back = real_server_to_wire(&domain).expect("validated value converts back");
            prop_assert_eq!(back, rs);
        }
    }
}
