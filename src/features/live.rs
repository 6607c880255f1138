//! Fields observable from a single packet.
//!
//! Live vectors carry these ten values at positions `0..min(L, 10)` and zero everywhere
//! else: connection counts, rates and every other aggregate from the training schema do
//! not exist for one packet. The classifier therefore sees a sparser vector online than
//! it was trained on, which bounds online prediction quality.
//!
//! The placement is positional only. Training columns are ordered by
//! [`CategoricalEncoding::feature_names`](super::CategoricalEncoding::feature_names)
//! (sorted names, one-hot columns included), so position 0 holds `protocol` online but
//! whichever column sorts first offline. On the KDD schema `protocol` lands on `Count`,
//! `packet_size` on `Duration` and `src_port` on `Hot`. Nothing lines up by name.

use crate::capture::{RawPacket, TransportHeader, TCP_ACK, TCP_FIN, TCP_SYN, TCP_URG};

pub const LIVE_FIELD_COUNT: usize = 10;

pub const LIVE_FIELD_NAMES: [&str; LIVE_FIELD_COUNT] = [
    "protocol",
    "packet_size",
    "ttl",
    "src_port",
    "dst_port",
    "window_size",
    "urg_flag",
    "ack_flag",
    "syn_flag",
    "fin_flag",
];

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveFields {
    pub protocol: u8,
    pub packet_size: u32,
    pub ttl: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub window_size: u16,
    pub urg: bool,
    pub ack: bool,
    pub syn: bool,
    pub fin: bool,
}

impl LiveFields {
    /// `None` when the packet has no network-layer header.
    pub fn from_packet(packet: &RawPacket) -> Option<Self> {
        let ip = packet.ip.as_ref()?;
        let mut f = LiveFields {
            protocol: ip.protocol,
            packet_size: packet.len,
            ttl: ip.ttl,
            ..Default::default()
        };
        match packet.transport {
            Some(TransportHeader::Tcp {
                src_port,
                dst_port,
                window,
                flags,
            }) => {
                f.src_port = src_port;
                f.dst_port = dst_port;
                f.window_size = window;
                f.urg = flags & TCP_URG != 0;
                f.ack = flags & TCP_ACK != 0;
                f.syn = flags & TCP_SYN != 0;
                f.fin = flags & TCP_FIN != 0;
            }
            Some(TransportHeader::Udp { src_port, dst_port }) => {
                f.src_port = src_port;
                f.dst_port = dst_port;
            }
            None => {}
        }
        Some(f)
    }

    pub fn to_array(&self) -> [f64; LIVE_FIELD_COUNT] {
        let bit = |b: bool| if b { 1.0 } else { 0.0 };
        [
            f64::from(self.protocol),
            f64::from(self.packet_size),
            f64::from(self.ttl),
            f64::from(self.src_port),
            f64::from(self.dst_port),
            f64::from(self.window_size),
            bit(self.urg),
            bit(self.ack),
            bit(self.syn),
            bit(self.fin),
        ]
    }
}
