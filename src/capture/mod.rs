//! Captured packet headers and packet sources.
//! Raw capture lives outside the agent; sources hand over already-decoded header fields.

mod replay;

pub use replay::NdjsonReplay;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub const TCP_FIN: u8 = 0x01;
pub const TCP_SYN: u8 = 0x02;
pub const TCP_ACK: u8 = 0x10;
pub const TCP_URG: u8 = 0x20;

/// One captured packet. Only lives for a single classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPacket {
    /// Total captured length in bytes
    pub len: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportHeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpHeader {
    pub src: IpAddr,
    pub dst: IpAddr,
    /// IANA protocol number (6 tcp, 17 udp, 1 icmp)
    pub protocol: u8,
    pub ttl: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportHeader {
    Tcp {
        src_port: u16,
        dst_port: u16,
        window: u16,
        flags: u8,
    },
    Udp {
        src_port: u16,
        dst_port: u16,
    },
}

impl TransportHeader {
    pub fn ports(&self) -> (u16, u16) {
        match *self {
            TransportHeader::Tcp {
                src_port, dst_port, ..
            }
            | TransportHeader::Udp { src_port, dst_port } => (src_port, dst_port),
        }
    }
}

impl RawPacket {
    pub fn tcp(src: IpAddr, dst: IpAddr, len: u32, ttl: u8, ports: (u16, u16), window: u16, flags: u8) -> Self {
        Self {
            len,
            ip: Some(IpHeader {
                src,
                dst,
                protocol: 6,
                ttl,
            }),
            transport: Some(TransportHeader::Tcp {
                src_port: ports.0,
                dst_port: ports.1,
                window,
                flags,
            }),
        }
    }

    pub fn udp(src: IpAddr, dst: IpAddr, len: u32, ttl: u8, ports: (u16, u16)) -> Self {
        Self {
            len,
            ip: Some(IpHeader {
                src,
                dst,
                protocol: 17,
                ttl,
            }),
            transport: Some(TransportHeader::Udp {
                src_port: ports.0,
                dst_port: ports.1,
            }),
        }
    }

    /// Frame with no network-layer header (ARP, raw L2)
    pub fn non_ip(len: u32) -> Self {
        Self {
            len,
            ip: None,
            transport: None,
        }
    }
}

/// Anything that yields packets one at a time. `Ok(None)` means the source is exhausted.
pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<RawPacket>>;
}
