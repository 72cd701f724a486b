//! Driver error taxonomy.

use thiserror::Error;

/// Errors produced by an [`crate::Admin`] implementation.
///
/// The first four kinds are the domain-known causes the facade turns into
/// per-item issues; everything else aborts the surrounding request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// The operation, platform or a tag in the payload is unsupported.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The addressed virtual server does not exist.
    #[error("virtual server does not exist")]
    VirtualServerNotExist,

    /// The addressed real server does not exist.
    #[error("real server does not exist")]
    RealServerNotExist,

    /// The kernel rejected the operation with an error we do not interpret.
    #[error("external error: {0}")]
    External(String),

    /// A `host:port` value did not parse as an IPv4 address and port.
    #[error("invalid address: {0}")]
    Address(String),

    /// Netlink transport failure, including handle acquisition.
    #[error("netlink: {0}")]
    Netlink(String),
}

/// Result alias for driver operations.
pub type AdminResult<T> = Result<T, AdminError>;
