//! Netlink-backed [`Admin`] implementation.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use futures::StreamExt;
use genetlink::GenetlinkHandle;
use netlink_packet_core::{NetlinkMessage, NetlinkPayload, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST};
use netlink_packet_generic::GenlMessage;
use tokio::sync::OnceCell;

use super::message::{DestAttr, IpvsAttr, IpvsCmd, IpvsCtrl, SvcAttr};
use crate::error::{AdminError, AdminResult};
use crate::types::{
    Address, NetworkProtocol, PacketForwarder, RealServer, ScheduleMethod, VirtualServer,
    VirtualServerIdentity,
};
use crate::{Admin, AdminOpts, Flow, RealServerConsumer, VirtualServerConsumer};

// IP_VS_CONN_F_* forwarding codes, masked by IP_VS_CONN_F_FWD_MASK.
const FWD_MASQ: u32 = 0;
const FWD_TUNNEL: u32 = 2;
const FWD_DROUTE: u32 = 3;
const FWD_MASK: u32 = 0x7;

/// Which entity a kernel reply refers to; decides the errno mapping.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Service,
    Dest,
}

/// Driver talking to the kernel `IPVS` generic-netlink family.
///
/// The netlink handle is acquired lazily on first use and memoized for
/// the lifetime of the instance; an acquisition failure is latched and
/// returned by every subsequent call.
pub struct NetlinkAdmin {
    handle: OnceCell<Result<GenetlinkHandle, AdminError>>,
}

impl NetlinkAdmin {
    /// Create the driver without touching the kernel yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: OnceCell::new(),
        }
    }

    async fn handle(&self) -> AdminResult<GenetlinkHandle> {
        self.handle
            .get_or_init(|| async {
                match genetlink::new_connection() {
                    Ok((conn, handle, _)) => {
                        tokio::spawn(conn);
                        Ok(handle)
                    }
                    Err(e) => Err(AdminError::Netlink(format!(
                        "open generic netlink connection: {e}"
                    ))),
                }
            })
            .await
            .clone()
    }

    /// One request/response exchange. Dump replies are collected into a
    /// list; a kernel error reply is classified per `scope`.
    async fn roundtrip(
        &self,
        payload: IpvsCtrl,
        flags: u16,
        scope: Scope,
    ) -> AdminResult<Vec<IpvsCtrl>> {
        let mut handle = self.handle().await?;

        let mut genlmsg = GenlMessage::from_payload(payload);
        genlmsg.finalize();
        let mut nlmsg = NetlinkMessage::from(genlmsg);
        nlmsg.header.flags = flags;
        nlmsg.finalize();

        let responses = handle
            .request(nlmsg)
            .await
            .map_err(|e| AdminError::Netlink(format!("request to IPVS family: {e}")))?;
        futures::pin_mut!(responses);

        let mut entries = Vec::new();
        while let Some(message) = responses.next().await {
            let message =
                message.map_err(|e| AdminError::Netlink(format!("decode IPVS reply: {e}")))?;
            match message.payload {
                NetlinkPayload::InnerMessage(genl) => entries.push(genl.payload),
                NetlinkPayload::Error(err) => {
                    let io = err.to_io();
                    match io.raw_os_error() {
                        // an ack
                        None | Some(0) => {}
                        Some(errno) => return Err(classify_errno(scope, errno, &io.to_string())),
                    }
                }
                _ => {}
            }
        }
        Ok(entries)
    }

    /// Whether a virtual server with this identity currently exists.
    async fn service_exists(&self, key: &VirtualServerIdentity) -> AdminResult<bool> {
        let request = IpvsCtrl {
            cmd: IpvsCmd::GetService,
            nlas: Vec::new(),
        };
        let entries = self
            .roundtrip(request, NLM_F_REQUEST | NLM_F_DUMP, Scope::Service)
            .await?;
        for entry in &entries {
            if service_from_reply(entry)?.identity == *key {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Default for NetlinkAdmin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Admin for NetlinkAdmin {
    async fn list_virtual_servers(&self, consumer: VirtualServerConsumer<'_>) -> AdminResult<()> {
        let request = IpvsCtrl {
            cmd: IpvsCmd::GetService,
            nlas: Vec::new(),
        };
        let entries = self
            .roundtrip(request, NLM_F_REQUEST | NLM_F_DUMP, Scope::Service)
            .await?;
        for entry in &entries {
            match consumer(service_from_reply(entry)?)? {
                Flow::Continue => {}
                Flow::Stop => break,
            }
        }
        Ok(())
    }

    async fn list_real_servers(
        &self,
        key: &VirtualServerIdentity,
        consumer: RealServerConsumer<'_>,
    ) -> AdminResult<()> {
        let request = IpvsCtrl {
            cmd: IpvsCmd::GetDest,
            nlas: vec![IpvsAttr::Service(identity_attrs(key)?)],
        };
        let entries = self
            .roundtrip(request, NLM_F_REQUEST | NLM_F_DUMP, Scope::Service)
            .await?;
        for entry in &entries {
            match consumer(dest_from_reply(entry)?)? {
                Flow::Continue => {}
                Flow::Stop => break,
            }
        }
        Ok(())
    }

    async fn update_virtual_server(
        &self,
        server: &VirtualServer,
        opts: AdminOpts,
    ) -> AdminResult<()> {
        let attrs = service_attrs(server)?;
        let update = IpvsCtrl {
            cmd: IpvsCmd::SetService,
            nlas: vec![IpvsAttr::Service(attrs.clone())],
        };
        match self
            .roundtrip(update, NLM_F_REQUEST | NLM_F_ACK, Scope::Service)
            .await
        {
            Err(AdminError::VirtualServerNotExist) if opts.force_add_if_not_exist => {
                let create = IpvsCtrl {
                    cmd: IpvsCmd::NewService,
                    nlas: vec![IpvsAttr::Service(attrs)],
                };
                self.roundtrip(create, NLM_F_REQUEST | NLM_F_ACK, Scope::Service)
                    .await
                    .map(drop)
            }
            other => other.map(drop),
        }
    }

    async fn remove_virtual_server(
        &self,
        key: &VirtualServerIdentity,
        opts: AdminOpts,
    ) -> AdminResult<()> {
        let request = IpvsCtrl {
            cmd: IpvsCmd::DelService,
            nlas: vec![IpvsAttr::Service(identity_attrs(key)?)],
        };
        match self
            .roundtrip(request, NLM_F_REQUEST | NLM_F_ACK, Scope::Service)
            .await
        {
            Err(AdminError::VirtualServerNotExist) if opts.keep_calm_if_not_exist => Ok(()),
            other => other.map(drop),
        }
    }

    async fn update_real_server(
        &self,
        key: &VirtualServerIdentity,
        server: &RealServer,
        opts: AdminOpts,
    ) -> AdminResult<()> {
        let dest = dest_attrs(server)?;
        if !self.service_exists(key).await? {
            return Err(AdminError::VirtualServerNotExist);
        }
        let service = identity_attrs(key)?;
        let update = IpvsCtrl {
            cmd: IpvsCmd::SetDest,
            nlas: vec![
                IpvsAttr::Service(service.clone()),
                IpvsAttr::Dest(dest.clone()),
            ],
        };
        match self
            .roundtrip(update, NLM_F_REQUEST | NLM_F_ACK, Scope::Dest)
            .await
        {
            Err(AdminError::RealServerNotExist) if opts.force_add_if_not_exist => {
                let create = IpvsCtrl {
                    cmd: IpvsCmd::NewDest,
                    nlas: vec![IpvsAttr::Service(service), IpvsAttr::Dest(dest)],
                };
                self.roundtrip(create, NLM_F_REQUEST | NLM_F_ACK, Scope::Dest)
                    .await
                    .map(drop)
            }
            other => other.map(drop),
        }
    }

    async fn remove_real_server(
        &self,
        key: &VirtualServerIdentity,
        address: &Address,
        opts: AdminOpts,
    ) -> AdminResult<()> {
        if !self.service_exists(key).await? {
            return Err(AdminError::VirtualServerNotExist);
        }
        let (host, port) = split_address(address)?;
        let request = IpvsCtrl {
            cmd: IpvsCmd::DelDest,
            nlas: vec![
                IpvsAttr::Service(identity_attrs(key)?),
                IpvsAttr::Dest(vec![DestAttr::Addr(host), DestAttr::Port(port)]),
            ],
        };
        match self
            .roundtrip(request, NLM_F_REQUEST | NLM_F_ACK, Scope::Dest)
            .await
        {
            Err(AdminError::RealServerNotExist) if opts.keep_calm_if_not_exist => Ok(()),
            other => other.map(drop),
        }
    }
}

fn classify_errno(scope: Scope, errno: i32, detail: &str) -> AdminError {
    match (scope, errno) {
        (Scope::Service, libc::ESRCH) => AdminError::VirtualServerNotExist,
        (Scope::Dest, libc::ENOENT) => AdminError::RealServerNotExist,
        _ => AdminError::External(detail.to_string()),
    }
}

fn split_address(address: &Address) -> AdminResult<(Ipv4Addr, u16)> {
    let (host, port) = address.to_host_port()?;
    let port = u16::try_from(port)
        .map_err(|_| AdminError::Address(format!("wrong port({port})")))?;
    Ok((host, port))
}

/// Kernel descriptor attributes for a virtual-server identity. IPv4 only.
fn identity_attrs(key: &VirtualServerIdentity) -> AdminResult<Vec<SvcAttr>> {
    match key {
        VirtualServerIdentity::Address { protocol, address } => {
            let (host, port) = split_address(address)?;
            let proto = match protocol.as_str() {
                "tcp" => libc::IPPROTO_TCP as u16,
                "udp" => libc::IPPROTO_UDP as u16,
                other => {
                    return Err(AdminError::Unsupported(format!("protocol({other})")));
                }
            };
            Ok(vec![
                SvcAttr::AddressFamily(libc::AF_INET as u16),
                SvcAttr::Protocol(proto),
                SvcAttr::Addr(host),
                SvcAttr::Port(port),
            ])
        }
        VirtualServerIdentity::FirewallMark { mark } => Ok(vec![
            SvcAttr::AddressFamily(libc::AF_INET as u16),
            SvcAttr::Fwmark(*mark),
        ]),
    }
}

/// Full service spec for create/update: identity plus the attributes the
/// kernel requires on NEW/SET.
fn service_attrs(server: &VirtualServer) -> AdminResult<Vec<SvcAttr>> {
    let mut attrs = identity_attrs(&server.identity)?;
    attrs.push(SvcAttr::SchedName(server.schedule_method.as_str().to_owned()));
    attrs.push(SvcAttr::Flags {
        flags: 0,
        mask: u32::MAX,
    });
    attrs.push(SvcAttr::Timeout(0));
    attrs.push(SvcAttr::Netmask(u32::MAX));
    Ok(attrs)
}

fn dest_attrs(server: &RealServer) -> AdminResult<Vec<DestAttr>> {
    let (host, port) = split_address(&server.address)?;
    let fwd = match server.packet_forwarder.as_str() {
        "nat" => FWD_MASQ,
        "dr" => FWD_DROUTE,
        "tun" => FWD_TUNNEL,
        other => {
            return Err(AdminError::Unsupported(format!("packet-forward '{other}'")));
        }
    };
    Ok(vec![
        DestAttr::Addr(host),
        DestAttr::Port(port),
        DestAttr::FwdMethod(fwd),
        DestAttr::Weight(server.weight),
        DestAttr::UpperThreshold(server.upper_threshold),
        DestAttr::LowerThreshold(server.lower_threshold),
    ])
}

fn protocol_tag(proto: u16) -> String {
    match i32::from(proto) {
        libc::IPPROTO_TCP => "tcp".to_string(),
        libc::IPPROTO_UDP => "udp".to_string(),
        other => other.to_string(),
    }
}

fn forwarder_tag(raw: u32) -> String {
    match raw & FWD_MASK {
        FWD_MASQ => "nat".to_string(),
        FWD_TUNNEL => "tun".to_string(),
        FWD_DROUTE => "dr".to_string(),
        // surfaced verbatim; validation rejects it downstream if it is
        // ever sent back in
        _ => raw.to_string(),
    }
}

/// Map a service dump entry back to the domain. An entry without an
/// address attribute is a firewall-mark service.
fn service_from_reply(entry: &IpvsCtrl) -> AdminResult<VirtualServer> {
    let attrs = entry
        .nlas
        .iter()
        .find_map(|attr| match attr {
            IpvsAttr::Service(attrs) => Some(attrs),
            _ => None,
        })
        .ok_or_else(|| AdminError::Netlink("service reply without service attributes".into()))?;

    let mut addr: Option<Ipv4Addr> = None;
    let mut port: u16 = 0;
    let mut proto: u16 = 0;
    let mut fwmark: u32 = 0;
    let mut sched = String::new();
    for attr in attrs {
        match attr {
            SvcAttr::Addr(ip) => addr = Some(*ip),
            SvcAttr::Port(p) => port = *p,
            SvcAttr::Protocol(p) => proto = *p,
            SvcAttr::Fwmark(mark) => fwmark = *mark,
            SvcAttr::SchedName(name) => sched = name.clone(),
            _ => {}
        }
    }

    let identity = match addr {
        Some(host) => VirtualServerIdentity::Address {
            protocol: NetworkProtocol::new(protocol_tag(proto)),
            address: Address::from_host_port(&host.to_string(), u32::from(port)),
        },
        None => VirtualServerIdentity::FirewallMark { mark: fwmark },
    };
    Ok(VirtualServer {
        identity,
        schedule_method: ScheduleMethod::new(sched),
    })
}

/// Map a destination dump entry back to the domain.
fn dest_from_reply(entry: &IpvsCtrl) -> AdminResult<RealServer> {
    let attrs = entry
        .nlas
        .iter()
        .find_map(|attr| match attr {
            IpvsAttr::Dest(attrs) => Some(attrs),
            _ => None,
        })
        .ok_or_else(|| {
            AdminError::Netlink("destination reply without destination attributes".into())
        })?;

    let mut addr = Ipv4Addr::UNSPECIFIED;
    let mut port: u16 = 0;
    let mut fwd: u32 = 0;
    let mut weight: u32 = 0;
    let mut upper: u32 = 0;
    let mut lower: u32 = 0;
    for attr in attrs {
        match attr {
            DestAttr::Addr(ip) => addr = *ip,
            DestAttr::Port(p) => port = *p,
            DestAttr::FwdMethod(m) => fwd = *m,
            DestAttr::Weight(w) => weight = *w,
            DestAttr::UpperThreshold(t) => upper = *t,
            DestAttr::LowerThreshold(t) => lower = *t,
            DestAttr::Other(..) => {}
        }
    }

    Ok(RealServer {
        address: Address::from_host_port(&addr.to_string(), u32::from(port)),
        packet_forwarder: PacketForwarder::new(forwarder_tag(fwd)),
        weight,
        upper_threshold: upper,
        lower_threshold: lower,
    })
}
