//! Linux driver: generic netlink against the kernel `IPVS` family.

mod admin;
mod message;

pub use admin::NetlinkAdmin;
