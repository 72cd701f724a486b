//! Request-scoped orchestration over the IPVS driver.
//!
//! Mutating calls hold a facade-wide single-writer gate, fan their
//! sub-operations out with bounded parallelism, deduplicate redundant
//! targets, and split driver failures into per-item issues versus fatal
//! request errors. Listing calls bypass the gate entirely.

use std::collections::HashSet;
use std::sync::Arc;

use director_ipvs::{
    Admin, AdminError, AdminOpts, Flow, VirtualServer, VirtualServerIdentity,
};
use director_proto::messages as msg;
use director_proto::types as wire;
use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::context::CallContext;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::parallel::run_bounded;

/// Width of the bounded worker pool used for request fan-out.
const FAN_OUT_WIDTH: usize = 10;

/// The admin RPC facade.
pub struct AdminService {
    admin: Arc<dyn Admin>,
    gate: Semaphore,
    shutdown: CancellationToken,
}

impl AdminService {
    /// Build the facade over a driver. `shutdown` is the process-wide
    /// stop signal; a fired token aborts waiting mutations.
    #[must_use]
    pub fn new(admin: Arc<dyn Admin>, shutdown: CancellationToken) -> Self {
        Self {
            admin,
            gate: Semaphore::new(1),
            shutdown,
        }
    }

    /// Acquire the single-writer gate, racing both cancellation sources.
    /// The permit releases on drop, on every exit path.
    async fn enter(&self, ctx: &CallContext) -> ApiResult<SemaphorePermit<'_>> {
        tokio::select! {
            permit = self.gate.acquire() => {
                permit.map_err(|_| ApiError::Internal("mutation gate closed".into()))
            }
            () = self.shutdown.cancelled() => Err(ApiError::Canceled),
            () = ctx.done() => Err(ctx.error()),
        }
    }

    /// Stream all virtual servers; with `include_reals`, attach each
    /// server's backends, fetched in parallel. Never takes the gate.
    pub async fn list_virtual_servers(
        &self,
        ctx: &CallContext,
        include_reals: bool,
    ) -> ApiResult<msg::ListVirtualServersResponse> {
        if ctx.is_done() {
            return Err(ctx.error());
        }
        let mut items: Vec<msg::VirtualServerWithReals> = Vec::new();
        let mut keys: Vec<(usize, VirtualServerIdentity)> = Vec::new();
        self.admin
            .list_virtual_servers(&mut |vs| {
                let entry = convert::virtual_server_to_wire(&vs)?;
                if include_reals {
                    keys.push((items.len(), vs.identity));
                }
                items.push(msg::VirtualServerWithReals {
                    virtual_server: entry,
                    real_servers: Vec::new(),
                });
                Ok(Flow::Continue)
            })
            .await?;

        if !keys.is_empty() {
            let collected: Mutex<Vec<(usize, Vec<wire::RealServer>)>> = Mutex::new(Vec::new());
            run_bounded(ctx, FAN_OUT_WIDTH, keys, |(index, key)| {
                let admin = Arc::clone(&self.admin);
                let collected = &collected;
                async move {
                    let mut reals = Vec::new();
                    admin
                        .list_real_servers(&key, &mut |rs| {
                            reals.push(convert::real_server_to_wire(&rs)?);
                            Ok(Flow::Continue)
                        })
                        .await?;
                    collected.lock().push((index, reals));
                    Ok(())
                }
            })
            .await?;
            for (index, reals) in collected.into_inner() {
                items[index].real_servers = reals;
            }
        }
        Ok(msg::ListVirtualServersResponse {
            virtual_servers: items,
        })
    }

    /// Scan the listing for the entry matching `identity`, stopping at
    /// the first hit. A completed scan without a match is `NotFound`.
    pub async fn find_virtual_server(
        &self,
        ctx: &CallContext,
        identity: &wire::VirtualServerIdentity,
        include_reals: bool,
    ) -> ApiResult<msg::FindVirtualServerResponse> {
        if ctx.is_done() {
            return Err(ctx.error());
        }
        let wanted = convert::identity_from_wire(identity)?;
        let mut found: Option<VirtualServer> = None;
        self.admin
            .list_virtual_servers(&mut |vs| {
                if vs.identity == wanted {
                    found = Some(vs);
                    Ok(Flow::Stop)
                } else {
                    Ok(Flow::Continue)
                }
            })
            .await?;

        let Some(vs) = found else {
            return Err(ApiError::NotFound(format!("virtual-server {wanted}")));
        };
        let mut entry = msg::VirtualServerWithReals {
            virtual_server: convert::virtual_server_to_wire(&vs)?,
            real_servers: Vec::new(),
        };
        if include_reals {
            self.admin
                .list_real_servers(&vs.identity, &mut |rs| {
                    entry.real_servers.push(convert::real_server_to_wire(&rs)?);
                    Ok(Flow::Continue)
                })
                .await?;
        }
        Ok(msg::FindVirtualServerResponse {
            virtual_server: entry,
        })
    }

    /// Apply a batch of virtual-server deletes and updates. Deletes run
    /// strictly before updates; non-fatal driver failures come back as
    /// issues.
    pub async fn update_virtual_servers(
        &self,
        ctx: &CallContext,
        req: msg::UpdateVirtualServersRequest,
    ) -> ApiResult<msg::UpdateVirtualServersResponse> {
        let _permit = self.enter(ctx).await?;
        let span = tracing::debug_span!(
            "update_virtual_servers",
            delete_count = req.delete.len(),
            update_count = req.update.len(),
            force_upsert = req.force_upsert,
        );
        async move {
            let seen = SeenSet::new();
            let issues: Mutex<Vec<msg::VirtualServerIssue>> = Mutex::new(Vec::new());

            if !req.delete.is_empty() {
                debug!(payload = ?req.delete, "delete");
                run_bounded(ctx, FAN_OUT_WIDTH, req.delete, |target| {
                    let admin = Arc::clone(&self.admin);
                    let seen = &seen;
                    let issues = &issues;
                    async move {
                        let identity = convert::identity_from_wire(&target)?;
                        if seen.when_seen(identity.to_string()) {
                            return Ok(());
                        }
                        match admin
                            .remove_virtual_server(&identity, AdminOpts::default())
                            .await
                        {
                            Ok(()) => Ok(()),
                            Err(err) => match issue_reason(&err) {
                                Some(reason) => {
                                    issues.lock().push(msg::VirtualServerIssue {
                                        when: msg::VirtualServerIssueWhen::Delete(target),
                                        reason,
                                    });
                                    Ok(())
                                }
                                None => Err(err.into()),
                            },
                        }
                    }
                })
                .await?;
            }

            if !req.update.is_empty() {
                debug!(payload = ?req.update, "update");
                if req.force_upsert {
                    // a caller that upserts what it just deleted expects
                    // the upsert to actually happen
                    seen.clear();
                }
                let opts = if req.force_upsert {
                    AdminOpts::force_add()
                } else {
                    AdminOpts::default()
                };
                run_bounded(ctx, FAN_OUT_WIDTH, req.update, |target| {
                    let admin = Arc::clone(&self.admin);
                    let seen = &seen;
                    let issues = &issues;
                    async move {
                        let server = convert::virtual_server_from_wire(&target)?;
                        if seen.when_seen(server.identity.to_string()) {
                            return Ok(());
                        }
                        match admin.update_virtual_server(&server, opts).await {
                            Ok(()) => Ok(()),
                            Err(err) => match issue_reason(&err) {
                                Some(reason) => {
                                    issues.lock().push(msg::VirtualServerIssue {
                                        when: msg::VirtualServerIssueWhen::Update(target),
                                        reason,
                                    });
                                    Ok(())
                                }
                                None => Err(err.into()),
                            },
                        }
                    }
                })
                .await?;
            }

            Ok(msg::UpdateVirtualServersResponse {
                issues: issues.into_inner(),
            })
        }
        .instrument(span)
        .await
    }

    /// Apply a batch of real-server deletes and updates under one parent
    /// virtual server.
    pub async fn update_real_servers(
        &self,
        ctx: &CallContext,
        req: msg::UpdateRealServersRequest,
    ) -> ApiResult<msg::UpdateRealServersResponse> {
        let _permit = self.enter(ctx).await?;
        let span = tracing::debug_span!(
            "update_real_servers",
            delete_count = req.delete.len(),
            update_count = req.update.len(),
            force_upsert = req.force_upsert,
            virtual_server = ?req.virtual_server_identity,
        );
        async move {
            let parent = convert::identity_from_wire(&req.virtual_server_identity)?;
            let seen = SeenSet::new();
            let issues: Mutex<Vec<msg::RealServerIssue>> = Mutex::new(Vec::new());

            if !req.delete.is_empty() {
                debug!(payload = ?req.delete, "delete");
                run_bounded(ctx, FAN_OUT_WIDTH, req.delete, |target| {
                    let admin = Arc::clone(&self.admin);
                    let parent = &parent;
                    let seen = &seen;
                    let issues = &issues;
                    async move {
                        let address = convert::address_from_wire(&target);
                        if seen.when_seen(address.as_str().to_owned()) {
                            return Ok(());
                        }
                        match admin
                            .remove_real_server(parent, &address, AdminOpts::default())
                            .await
                        {
                            Ok(()) => Ok(()),
                            Err(err) => match issue_reason(&err) {
                                Some(reason) => {
                                    issues.lock().push(msg::RealServerIssue {
                                        when: msg::RealServerIssueWhen::Delete(target),
                                        reason,
                                    });
                                    Ok(())
                                }
                                None => Err(err.into()),
                            },
                        }
                    }
                })
                .await?;
            }

            if !req.update.is_empty() {
                debug!(payload = ?req.update, "update");
                if req.force_upsert {
                    seen.clear();
                }
                let opts = if req.force_upsert {
                    AdminOpts::force_add()
                } else {
                    AdminOpts::default()
                };
                run_bounded(ctx, FAN_OUT_WIDTH, req.update, |target| {
                    let admin = Arc::clone(&self.admin);
                    let parent = &parent;
                    let seen = &seen;
                    let issues = &issues;
                    async move {
                        let server = convert::real_server_from_wire(&target)?;
                        if seen.when_seen(server.address.as_str().to_owned()) {
                            return Ok(());
                        }
                        match admin.update_real_server(parent, &server, opts).await {
                            Ok(()) => Ok(()),
                            Err(err) => match issue_reason(&err) {
                                Some(reason) => {
                                    issues.lock().push(msg::RealServerIssue {
                                        when: msg::RealServerIssueWhen::Update(target),
                                        reason,
                                    });
                                    Ok(())
                                }
                                None => Err(err.into()),
                            },
                        }
                    }
                })
                .await?;
            }

            Ok(msg::UpdateRealServersResponse {
                issues: issues.into_inner(),
            })
        }
        .instrument(span)
        .await
    }
}

/// Targets already handled in this request. Shared between the delete
/// and update phases.
struct SeenSet(Mutex<HashSet<String>>);

impl SeenSet {
    fn new() -> Self {
        Self(Mutex::new(HashSet::new()))
    }

    /// Record `key`; true when it was already present.
    fn when_seen(&self, key: String) -> bool {
        !self.0.lock().insert(key)
    }

    fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Map a driver error onto an issue reason; `None` means the error is
/// fatal for the whole request.
fn issue_reason(err: &AdminError) -> Option<msg::IssueReason> {
    let code = match err {
        AdminError::VirtualServerNotExist => msg::IssueCode::VirtualServerNotFound,
        AdminError::RealServerNotExist => msg::IssueCode::RealServerNotFound,
        AdminError::Unsupported(_) => msg::IssueCode::Unsupported,
        AdminError::External(_) => msg::IssueCode::ExternalError,
        AdminError::Address(_) | AdminError::Netlink(_) => return None,
    };
    Some(msg::IssueReason {
        code,
        message: err.to_string(),
    })
}
