//! # director-ipvs
//!
//! Kernel-facing administration layer for the Linux IPVS subsystem.
//!
//! [`Admin`] enumerates and mutates virtual servers and their backends by
//! exchanging generic-netlink messages with the kernel. On Linux the
//! driver talks to the `IPVS` netlink family; everywhere else a
//! [`FakeAdmin`] refuses all operations uniformly so the layers above
//! stay buildable and testable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use async_trait::async_trait;

pub mod error;
mod fake;
pub mod types;

#[cfg(target_os = "linux")]
mod linux;

pub use error::{AdminError, AdminResult};
pub use fake::FakeAdmin;
#[cfg(target_os = "linux")]
pub use linux::NetlinkAdmin;
pub use types::{
    Address, NetworkProtocol, PacketForwarder, RealServer, ScheduleMethod, VirtualServer,
    VirtualServerIdentity,
};

/// Consumer verdict during a listing: keep iterating or stop early.
///
/// Stopping is not an error; it is the clean way for a caller to
/// short-circuit a scan once it has what it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep feeding entries.
    Continue,
    /// Stop the iteration; the listing call returns `Ok`.
    Stop,
}

/// Consumer invoked once per listed virtual server.
pub type VirtualServerConsumer<'a> =
    &'a mut (dyn FnMut(VirtualServer) -> AdminResult<Flow> + Send);

/// Consumer invoked once per listed real server.
pub type RealServerConsumer<'a> = &'a mut (dyn FnMut(RealServer) -> AdminResult<Flow> + Send);

/// Opt-in semantic modifiers for mutating operations.
///
/// Flags not read by a given operation are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminOpts {
    /// After an update fails with a not-exist error, retry the same
    /// payload as a create.
    pub force_add_if_not_exist: bool,
    /// Treat a not-exist error on delete as success.
    pub keep_calm_if_not_exist: bool,
}

impl AdminOpts {
    /// Options with `force_add_if_not_exist` set.
    #[must_use]
    pub const fn force_add() -> Self {
        Self {
            force_add_if_not_exist: true,
            keep_calm_if_not_exist: false,
        }
    }

    /// Options with `keep_calm_if_not_exist` set.
    #[must_use]
    pub const fn keep_calm() -> Self {
        Self {
            force_add_if_not_exist: false,
            keep_calm_if_not_exist: true,
        }
    }
}

/// IPVS administration surface.
///
/// Implementations never retry transient kernel errors and never log;
/// they report and let the caller decide.
#[async_trait]
pub trait Admin: Send + Sync {
    /// Iterate all virtual servers, feeding each to `consumer`.
    ///
    /// A consumer error aborts the iteration and is surfaced unchanged;
    /// [`Flow::Stop`] ends it successfully.
    async fn list_virtual_servers(&self, consumer: VirtualServerConsumer<'_>) -> AdminResult<()>;

    /// Iterate the real servers of the virtual server identified by `key`.
    async fn list_real_servers(
        &self,
        key: &VirtualServerIdentity,
        consumer: RealServerConsumer<'_>,
    ) -> AdminResult<()>;

    /// Update a virtual server; with `force_add_if_not_exist`, create it
    /// when it is missing.
    async fn update_virtual_server(
        &self,
        server: &VirtualServer,
        opts: AdminOpts,
    ) -> AdminResult<()>;

    /// Remove a virtual server; with `keep_calm_if_not_exist`, a missing
    /// server is success.
    async fn remove_virtual_server(
        &self,
        key: &VirtualServerIdentity,
        opts: AdminOpts,
    ) -> AdminResult<()>;

    /// Update a backend under the virtual server identified by `key`.
    ///
    /// Fails with [`AdminError::VirtualServerNotExist`] when the parent
    /// cannot be located.
    async fn update_real_server(
        &self,
        key: &VirtualServerIdentity,
        server: &RealServer,
        opts: AdminOpts,
    ) -> AdminResult<()>;

    /// Remove a backend under the virtual server identified by `key`.
    async fn remove_real_server(
        &self,
        key: &VirtualServerIdentity,
        address: &Address,
        opts: AdminOpts,
    ) -> AdminResult<()>;
}

/// Build the driver for the current platform: netlink on Linux, the
/// refusing fake everywhere else.
#[must_use]
pub fn platform_admin() -> Arc<dyn Admin> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(NetlinkAdmin::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(FakeAdmin::new())
    }
}
