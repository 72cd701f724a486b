//! Platform-substitute driver that refuses every operation.

use async_trait::async_trait;

use crate::error::{AdminError, AdminResult};
use crate::types::{Address, RealServer, VirtualServer, VirtualServerIdentity};
use crate::{Admin, AdminOpts, RealServerConsumer, VirtualServerConsumer};

/// Driver used where the kernel IPVS subsystem is unavailable.
///
/// Every operation fails with [`AdminError::Unsupported`] naming the
/// running OS. The layers above it (gate, validation, conversion, issue
/// accounting) stay fully exercised, which makes this the substrate of
/// the facade's unit tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeAdmin;

impl FakeAdmin {
    /// Create the refusing driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn not_supported() -> AdminError {
        AdminError::Unsupported(format!("not supported in OS('{}')", std::env::consts::OS))
    }
}

#[async_trait]
impl Admin for FakeAdmin {
    async fn list_virtual_servers(&self, _consumer: VirtualServerConsumer<'_>) -> AdminResult<()> {
        Err(Self::not_supported())
    }

    async fn list_real_servers(
        &self,
        _key: &VirtualServerIdentity,
        _consumer: RealServerConsumer<'_>,
    ) -> AdminResult<()> {
        Err(Self::not_supported())
    }

    async fn update_virtual_server(
        &self,
        _server: &VirtualServer,
        _opts: AdminOpts,
    ) -> AdminResult<()> {
        Err(Self::not_supported())
    }

    async fn remove_virtual_server(
        &self,
        _key: &VirtualServerIdentity,
        _opts: AdminOpts,
    ) -> AdminResult<()> {
        Err(Self::not_supported())
    }

    async fn update_real_server(
        &self,
        _key: &VirtualServerIdentity,
        _server: &RealServer,
        _opts: AdminOpts,
    ) -> AdminResult<()> {
        Err(Self::not_supported())
    }

    async fn remove_real_server(
        &self,
        _key: &VirtualServerIdentity,
        _address: &Address,
        _opts: AdminOpts,
    ) -> AdminResult<()> {
        Err(Self::not_supported())
    }
}
