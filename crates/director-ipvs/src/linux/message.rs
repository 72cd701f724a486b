//! Wire codec for the `IPVS` generic-netlink family.
//!
//! Attribute numbering and value encodings follow the kernel's
//! `uapi/linux/ip_vs.h`: ports and addresses travel in network byte
//! order, scalar u32/u16 attributes in native order, scheduler names as
//! null-terminated strings.

use std::net::Ipv4Addr;

use netlink_packet_core::{
    parse_u16, parse_u16_be, parse_u32, DecodeError, Emitable, Nla, NlaBuffer, NlasIterator,
};
use netlink_packet_generic::{GenlFamily, GenlHeader};

const IPVS_CMD_NEW_SERVICE: u8 = 1;
const IPVS_CMD_SET_SERVICE: u8 = 2;
const IPVS_CMD_DEL_SERVICE: u8 = 3;
const IPVS_CMD_GET_SERVICE: u8 = 4;
const IPVS_CMD_NEW_DEST: u8 = 5;
const IPVS_CMD_SET_DEST: u8 = 6;
const IPVS_CMD_DEL_DEST: u8 = 7;
const IPVS_CMD_GET_DEST: u8 = 8;

const IPVS_CMD_ATTR_SERVICE: u16 = 1;
const IPVS_CMD_ATTR_DEST: u16 = 2;

const IPVS_SVC_ATTR_AF: u16 = 1;
const IPVS_SVC_ATTR_PROTOCOL: u16 = 2;
const IPVS_SVC_ATTR_ADDR: u16 = 3;
const IPVS_SVC_ATTR_PORT: u16 = 4;
const IPVS_SVC_ATTR_FWMARK: u16 = 5;
const IPVS_SVC_ATTR_SCHED_NAME: u16 = 6;
const IPVS_SVC_ATTR_FLAGS: u16 = 7;
const IPVS_SVC_ATTR_TIMEOUT: u16 = 8;
const IPVS_SVC_ATTR_NETMASK: u16 = 9;

const IPVS_DEST_ATTR_ADDR: u16 = 1;
const IPVS_DEST_ATTR_PORT: u16 = 2;
const IPVS_DEST_ATTR_FWD_METHOD: u16 = 3;
const IPVS_DEST_ATTR_WEIGHT: u16 = 4;
const IPVS_DEST_ATTR_U_THRESH: u16 = 5;
const IPVS_DEST_ATTR_L_THRESH: u16 = 6;

const NLA_F_NESTED: u16 = 1 << 15;
const NLA_TYPE_MASK: u16 = !(3 << 14);

/// Commands of the IPVS family this driver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum IpvsCmd {
    NewService,
    SetService,
    DelService,
    GetService,
    NewDest,
    SetDest,
    DelDest,
    GetDest,
}

impl From<IpvsCmd> for u8 {
    fn from(cmd: IpvsCmd) -> Self {
        match cmd {
            IpvsCmd::NewService => IPVS_CMD_NEW_SERVICE,
            IpvsCmd::SetService => IPVS_CMD_SET_SERVICE,
            IpvsCmd::DelService => IPVS_CMD_DEL_SERVICE,
            IpvsCmd::GetService => IPVS_CMD_GET_SERVICE,
            IpvsCmd::NewDest => IPVS_CMD_NEW_DEST,
            IpvsCmd::SetDest => IPVS_CMD_SET_DEST,
            IpvsCmd::DelDest => IPVS_CMD_DEL_DEST,
            IpvsCmd::GetDest => IPVS_CMD_GET_DEST,
        }
    }
}

impl TryFrom<u8> for IpvsCmd {
    type Error = DecodeError;

    fn try_from(cmd: u8) -> Result<Self, Self::Error> {
        Ok(match cmd {
            IPVS_CMD_NEW_SERVICE => Self::NewService,
            IPVS_CMD_SET_SERVICE => Self::SetService,
            IPVS_CMD_DEL_SERVICE => Self::DelService,
            IPVS_CMD_GET_SERVICE => Self::GetService,
            IPVS_CMD_NEW_DEST => Self::NewDest,
            IPVS_CMD_SET_DEST => Self::SetDest,
            IPVS_CMD_DEL_DEST => Self::DelDest,
            IPVS_CMD_GET_DEST => Self::GetDest,
            other => return Err(DecodeError::from(format!("unknown IPVS command {other}"))),
        })
    }
}

/// Attributes of a virtual-service descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SvcAttr {
    AddressFamily(u16),
    Protocol(u16),
    Addr(Ipv4Addr),
    Port(u16),
    Fwmark(u32),
    SchedName(String),
    Flags { flags: u32, mask: u32 },
    Timeout(u32),
    Netmask(u32),
    Other(u16, Vec<u8>),
}

impl Nla for SvcAttr {
    fn value_len(&self) -> usize {
        match self {
            Self::AddressFamily(_) | Self::Protocol(_) | Self::Port(_) => 2,
            Self::Addr(_) => 4,
            Self::Fwmark(_) | Self::Timeout(_) | Self::Netmask(_) => 4,
            Self::SchedName(name) => name.len() + 1,
            Self::Flags { .. } => 8,
            Self::Other(_, bytes) => bytes.len(),
        }
    }

    fn kind(&self) -> u16 {
        match self {
            Self::AddressFamily(_) => IPVS_SVC_ATTR_AF,
            Self::Protocol(_) => IPVS_SVC_ATTR_PROTOCOL,
            Self::Addr(_) => IPVS_SVC_ATTR_ADDR,
            Self::Port(_) => IPVS_SVC_ATTR_PORT,
            Self::Fwmark(_) => IPVS_SVC_ATTR_FWMARK,
            Self::SchedName(_) => IPVS_SVC_ATTR_SCHED_NAME,
            Self::Flags { .. } => IPVS_SVC_ATTR_FLAGS,
            Self::Timeout(_) => IPVS_SVC_ATTR_TIMEOUT,
            Self::Netmask(_) => IPVS_SVC_ATTR_NETMASK,
            Self::Other(kind, _) => *kind,
        }
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match self {
            Self::AddressFamily(v) | Self::Protocol(v) => {
                buffer.copy_from_slice(&v.to_ne_bytes());
            }
            Self::Addr(ip) => buffer.copy_from_slice(&ip.octets()),
            // network byte order, as the kernel expects
            Self::Port(v) => buffer.copy_from_slice(&v.to_be_bytes()),
            Self::Fwmark(v) | Self::Timeout(v) | Self::Netmask(v) => {
                buffer.copy_from_slice(&v.to_ne_bytes());
            }
            Self::SchedName(name) => {
                buffer[..name.len()].copy_from_slice(name.as_bytes());
                buffer[name.len()] = 0;
            }
            Self::Flags { flags, mask } => {
                buffer[..4].copy_from_slice(&flags.to_ne_bytes());
                buffer[4..8].copy_from_slice(&mask.to_ne_bytes());
            }
            Self::Other(_, bytes) => buffer.copy_from_slice(bytes),
        }
    }
}

fn parse_ipv4(payload: &[u8]) -> Result<Ipv4Addr, DecodeError> {
    // the kernel emits the full 16-byte address union; IPv4 occupies the
    // leading 4 bytes
    let octets: [u8; 4] = payload
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| DecodeError::from("address attribute too short"))?;
    Ok(Ipv4Addr::from(octets))
}

impl<'a, T: AsRef<[u8]> + ?Sized> netlink_packet_core::Parseable<NlaBuffer<&'a T>> for SvcAttr {
    fn parse(buf: &NlaBuffer<&'a T>) -> Result<Self, DecodeError> {
        let payload = buf.value();
        Ok(match buf.kind() & NLA_TYPE_MASK {
            IPVS_SVC_ATTR_AF => Self::AddressFamily(parse_u16(payload)?),
            IPVS_SVC_ATTR_PROTOCOL => Self::Protocol(parse_u16(payload)?),
            IPVS_SVC_ATTR_ADDR => Self::Addr(parse_ipv4(payload)?),
            IPVS_SVC_ATTR_PORT => Self::Port(parse_u16_be(payload)?),
            IPVS_SVC_ATTR_FWMARK => Self::Fwmark(parse_u32(payload)?),
            IPVS_SVC_ATTR_SCHED_NAME => {
                let name = std::str::from_utf8(payload)
                    .map_err(|_| DecodeError::from("scheduler name is not utf-8"))?
                    .trim_end_matches('\0')
                    .to_string();
                Self::SchedName(name)
            }
            IPVS_SVC_ATTR_FLAGS => {
                if payload.len() < 8 {
                    return Err(DecodeError::from("flags attribute too short"));
                }
                Self::Flags {
                    flags: parse_u32(&payload[..4])?,
                    mask: parse_u32(&payload[4..8])?,
                }
            }
            IPVS_SVC_ATTR_TIMEOUT => Self::Timeout(parse_u32(payload)?),
            IPVS_SVC_ATTR_NETMASK => Self::Netmask(parse_u32(payload)?),
            kind => Self::Other(kind, payload.to_vec()),
        })
    }
}

/// Attributes of a destination (real server) descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum DestAttr {
    Addr(Ipv4Addr),
    Port(u16),
    FwdMethod(u32),
    Weight(u32),
    UpperThreshold(u32),
    LowerThreshold(u32),
    Other(u16, Vec<u8>),
}

impl Nla for DestAttr {
    fn value_len(&self) -> usize {
        match self {
            Self::Addr(_) => 4,
            Self::Port(_) => 2,
            Self::FwdMethod(_)
            | Self::Weight(_)
            | Self::UpperThreshold(_)
            | Self::LowerThreshold(_) => 4,
            Self::Other(_, bytes) => bytes.len(),
        }
    }

    fn kind(&self) -> u16 {
        match self {
            Self::Addr(_) => IPVS_DEST_ATTR_ADDR,
            Self::Port(_) => IPVS_DEST_ATTR_PORT,
            Self::FwdMethod(_) => IPVS_DEST_ATTR_FWD_METHOD,
            Self::Weight(_) => IPVS_DEST_ATTR_WEIGHT,
            Self::UpperThreshold(_) => IPVS_DEST_ATTR_U_THRESH,
            Self::LowerThreshold(_) => IPVS_DEST_ATTR_L_THRESH,
            Self::Other(kind, _) => *kind,
        }
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match self {
            Self::Addr(ip) => buffer.copy_from_slice(&ip.octets()),
            Self::Port(v) => buffer.copy_from_slice(&v.to_be_bytes()),
            Self::FwdMethod(v)
            | Self::Weight(v)
            | Self::UpperThreshold(v)
            | Self::LowerThreshold(v) => buffer.copy_from_slice(&v.to_ne_bytes()),
            Self::Other(_, bytes) => buffer.copy_from_slice(bytes),
        }
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> netlink_packet_core::Parseable<NlaBuffer<&'a T>> for DestAttr {
    fn parse(buf: &NlaBuffer<&'a T>) -> Result<Self, DecodeError> {
        let payload = buf.value();
        Ok(match buf.kind() & NLA_TYPE_MASK {
            IPVS_DEST_ATTR_ADDR => Self::Addr(parse_ipv4(payload)?),
            IPVS_DEST_ATTR_PORT => Self::Port(parse_u16_be(payload)?),
            IPVS_DEST_ATTR_FWD_METHOD => Self::FwdMethod(parse_u32(payload)?),
            IPVS_DEST_ATTR_WEIGHT => Self::Weight(parse_u32(payload)?),
            IPVS_DEST_ATTR_U_THRESH => Self::UpperThreshold(parse_u32(payload)?),
            IPVS_DEST_ATTR_L_THRESH => Self::LowerThreshold(parse_u32(payload)?),
            kind => Self::Other(kind, payload.to_vec()),
        })
    }
}

/// Top-level attributes of an IPVS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum IpvsAttr {
    Service(Vec<SvcAttr>),
    Dest(Vec<DestAttr>),
    Other(u16, Vec<u8>),
}

fn nested_len<T: Nla>(nlas: &[T]) -> usize {
    nlas.iter().map(|nla| nla.buffer_len()).sum()
}

fn emit_nested<T: Nla>(nlas: &[T], buffer: &mut [u8]) {
    let mut offset = 0;
    for nla in nlas {
        let len = nla.buffer_len();
        nla.emit(&mut buffer[offset..offset + len]);
        offset += len;
    }
}

impl Nla for IpvsAttr {
    fn value_len(&self) -> usize {
        match self {
            Self::Service(nlas) => nested_len(nlas),
            Self::Dest(nlas) => nested_len(nlas),
            Self::Other(_, bytes) => bytes.len(),
        }
    }

    fn kind(&self) -> u16 {
        match self {
            Self::Service(_) => IPVS_CMD_ATTR_SERVICE | NLA_F_NESTED,
            Self::Dest(_) => IPVS_CMD_ATTR_DEST | NLA_F_NESTED,
            Self::Other(kind, _) => *kind,
        }
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match self {
            Self::Service(nlas) => emit_nested(nlas, buffer),
            Self::Dest(nlas) => emit_nested(nlas, buffer),
            Self::Other(_, bytes) => buffer.copy_from_slice(bytes),
        }
    }
}

fn parse_nested<'a, A>(payload: &'a [u8]) -> Result<Vec<A>, DecodeError>
where
    A: netlink_packet_core::Parseable<NlaBuffer<&'a [u8]>>,
{
    let mut nlas = Vec::new();
    for nla in NlasIterator::new(payload) {
        let nla = nla?;
        nlas.push(A::parse(&nla)?);
    }
    Ok(nlas)
}

/// Payload of an IPVS generic-netlink message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct IpvsCtrl {
    pub cmd: IpvsCmd,
    pub nlas: Vec<IpvsAttr>,
}

impl GenlFamily for IpvsCtrl {
    fn family_name() -> &'static str {
        "IPVS"
    }

    fn command(&self) -> u8 {
        self.cmd.into()
    }

    fn version(&self) -> u8 {
        1
    }
}

impl Emitable for IpvsCtrl {
    fn buffer_len(&self) -> usize {
        nested_len(&self.nlas)
    }

    fn emit(&self, buffer: &mut [u8]) {
        emit_nested(&self.nlas, buffer);
    }
}

impl netlink_packet_core::ParseableParametrized<[u8], GenlHeader> for IpvsCtrl {
    fn parse_with_param(buf: &[u8], header: GenlHeader) -> Result<Self, DecodeError> {
        let cmd = IpvsCmd::try_from(header.cmd)?;
        let mut nlas = Vec::new();
        for nla in NlasIterator::new(buf) {
            let nla = nla?;
            let attr = match nla.kind() & NLA_TYPE_MASK {
                IPVS_CMD_ATTR_SERVICE => IpvsAttr::Service(parse_nested(nla.value())?),
                IPVS_CMD_ATTR_DEST => IpvsAttr::Dest(parse_nested(nla.value())?),
                kind => IpvsAttr::Other(kind, nla.value().to_vec()),
            };
            nlas.push(attr);
        }
        Ok(Self { cmd, nlas })
    }
}
