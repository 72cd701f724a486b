//! # director-proto
//!
//! Wire schema for the director IPVS administration API.
//!
//! The types here mirror what travels over the JSON gateway: enum values
//! carry string tags (the schema annotations the rest of the system keys
//! on), and [`registry`] exposes the read-only tag↔value mappings built
//! once at startup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod messages;
pub mod registry;
pub mod types;

pub use messages::{
    FindVirtualServerRequest, FindVirtualServerResponse, IssueCode, IssueReason,
    ListVirtualServersRequest, ListVirtualServersResponse, RealServerIssue, RealServerIssueWhen,
    UpdateRealServersRequest, UpdateRealServersResponse, UpdateVirtualServersRequest,
    UpdateVirtualServersResponse, VirtualServerIssue, VirtualServerIssueWhen,
    VirtualServerWithReals,
};
pub use types::{
    NetworkTransport, PacketFwdMethod, RealServer, RealServerAddress, ScheduleMethod,
    VirtualServer, VirtualServerAddress, VirtualServerIdentity,
};
