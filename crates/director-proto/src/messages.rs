//! Request, response and issue messages of the admin API.

use serde::{Deserialize, Serialize};

use crate::types::{RealServer, RealServerAddress, VirtualServer, VirtualServerIdentity};

/// Request for `POST /v2/ipvs/virtual-server/find`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindVirtualServerRequest {
    /// Identity to search for.
    pub virtual_server_identity: VirtualServerIdentity,
    /// Attach the server's backends to the response.
    pub include_reals: bool,
}

/// Response for `POST /v2/ipvs/virtual-server/find`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindVirtualServerResponse {
    /// The matching entry.
    pub virtual_server: VirtualServerWithReals,
}

/// Request for `POST /v2/ipvs/virtual-servers/list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListVirtualServersRequest {
    /// Attach each server's backends to the response.
    pub include_reals: bool,
}

/// Response for `POST /v2/ipvs/virtual-servers/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListVirtualServersResponse {
    /// One entry per virtual server.
    pub virtual_servers: Vec<VirtualServerWithReals>,
}

/// A virtual server together with its (optionally listed) backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualServerWithReals {
    /// The virtual server.
    pub virtual_server: VirtualServer,
    /// Its backends; empty unless `include_reals` was requested.
    pub real_servers: Vec<RealServer>,
}

/// Request for `POST /v2/ipvs/virtual-servers/update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateVirtualServersRequest {
    /// Identities to delete; processed before `update`.
    pub delete: Vec<VirtualServerIdentity>,
    /// Entries to update.
    pub update: Vec<VirtualServer>,
    /// Create entries that do not exist instead of failing the update.
    pub force_upsert: bool,
}

/// Response for `POST /v2/ipvs/virtual-servers/update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateVirtualServersResponse {
    /// Per-item non-fatal outcomes; order unspecified.
    pub issues: Vec<VirtualServerIssue>,
}

/// Request for `POST /v2/ipvs/real-servers/update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateRealServersRequest {
    /// Parent virtual server.
    pub virtual_server_identity: VirtualServerIdentity,
    /// Backend addresses to delete; processed before `update`.
    pub delete: Vec<RealServerAddress>,
    /// Backends to update.
    pub update: Vec<RealServer>,
    /// Create backends that do not exist instead of failing the update.
    pub force_upsert: bool,
}

/// Response for `POST /v2/ipvs/real-servers/update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateRealServersResponse {
    /// Per-item non-fatal outcomes; order unspecified.
    pub issues: Vec<RealServerIssue>,
}

/// Reason classification of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCode {
    /// The named virtual server does not exist.
    VirtualServerNotFound,
    /// The named real server does not exist.
    RealServerNotFound,
    /// The operation or a tag in it is unsupported.
    Unsupported,
    /// The kernel rejected the operation.
    ExternalError,
}

/// Reason attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReason {
    /// Classification.
    pub code: IssueCode,
    /// Free-form description.
    pub message: String,
}

/// Which sub-operation of a virtual-server update produced an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtualServerIssueWhen {
    /// The delete of this identity.
    Delete(VirtualServerIdentity),
    /// The update of this entry.
    Update(VirtualServer),
}

/// Per-item outcome of a virtual-server mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualServerIssue {
    /// The sub-operation, with its target echoed back.
    pub when: VirtualServerIssueWhen,
    /// Why it did not succeed.
    pub reason: IssueReason,
}

/// Which sub-operation of a real-server update produced an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealServerIssueWhen {
    /// The delete of this backend address.
    Delete(RealServerAddress),
    /// The update of this backend.
    Update(RealServer),
}

/// Per-item outcome of a real-server mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealServerIssue {
    /// The sub-operation, with its target echoed back.
    pub when: RealServerIssueWhen,
    /// Why it did not succeed.
    pub reason: IssueReason,
}
