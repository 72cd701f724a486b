//! Tag↔value registry for the wire enums.
//!
//! Built once by walking each enum's values and recording the annotated
//! tags; read-only afterwards. [`init`] forces construction during process
//! bootstrap so no request ever pays for (or races) the build.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::{NetworkTransport, PacketFwdMethod, ScheduleMethod};

struct Registry {
    transport_by_tag: HashMap<&'static str, NetworkTransport>,
    schedule_by_tag: HashMap<&'static str, ScheduleMethod>,
    fwd_by_tag: HashMap<&'static str, PacketFwdMethod>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut transport_by_tag = HashMap::new();
    for value in NetworkTransport::VALUES {
        if let Some(tag) = value.tag() {
            transport_by_tag.insert(tag, value);
        }
    }
    let mut schedule_by_tag = HashMap::new();
    for value in ScheduleMethod::VALUES {
        if let Some(tag) = value.tag() {
            schedule_by_tag.insert(tag, value);
        }
    }
    let mut fwd_by_tag = HashMap::new();
    for value in PacketFwdMethod::VALUES {
        if let Some(tag) = value.tag() {
            fwd_by_tag.insert(tag, value);
        }
    }
    Registry {
        transport_by_tag,
        schedule_by_tag,
        fwd_by_tag,
    }
});

/// Force the registry build. Called once at startup, before serving.
pub fn init() {
    Lazy::force(&REGISTRY);
}

/// Look up the transport value registered for `tag`.
#[must_use]
pub fn transport_for_tag(tag: &str) -> Option<NetworkTransport> {
    REGISTRY.transport_by_tag.get(tag).copied()
}

/// Look up the schedule method registered for `tag`.
#[must_use]
pub fn schedule_for_tag(tag: &str) -> Option<ScheduleMethod> {
    REGISTRY.schedule_by_tag.get(tag).copied()
}

/// Look up the forwarding method registered for `tag`.
#[must_use]
pub fn fwd_for_tag(tag: &str) -> Option<PacketFwdMethod> {
    REGISTRY.fwd_by_tag.get(tag).copied()
}

/// Whether `tag` names a registered transport.
#[must_use]
pub fn is_transport_tag(tag: &str) -> bool {
    REGISTRY.transport_by_tag.contains_key(tag)
}

/// Whether `tag` names a registered schedule method.
#[must_use]
pub fn is_schedule_tag(tag: &str) -> bool {
    REGISTRY.schedule_by_tag.contains_key(tag)
}

/// Whether `tag` names a registered forwarding method.
#[must_use]
pub fn is_fwd_tag(tag: &str) -> bool {
    REGISTRY.fwd_by_tag.contains_key(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_mapping_is_bidirectional() {
        assert_eq!(transport_for_tag("tcp"), Some(NetworkTransport::Tcp));
        assert_eq!(transport_for_tag("udp"), Some(NetworkTransport::Udp));
        assert_eq!(NetworkTransport::Tcp.tag(), Some("tcp"));
        assert_eq!(transport_for_tag("icmp"), None);
    }

    #[test]
    fn every_annotated_value_round_trips() {
        for value in ScheduleMethod::VALUES {
            match value.tag() {
                Some(tag) => assert_eq!(schedule_for_tag(tag), Some(value)),
                None => assert_eq!(value, ScheduleMethod::Unspecified),
            }
        }
        for value in PacketFwdMethod::VALUES {
            match value.tag() {
                Some(tag) => assert_eq!(fwd_for_tag(tag), Some(value)),
                None => assert_eq!(value, PacketFwdMethod::Unspecified),
            }
        }
    }

    #[test]
    fn unannotated_values_are_absent() {
        assert!(!is_schedule_tag(""));
        assert!(!is_schedule_tag("xx-not-a-method"));
        assert!(!is_fwd_tag("bypass"));
        assert!(!is_transport_tag("sctp"));
    }
}
