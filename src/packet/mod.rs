mod decode;

pub use decode::*;

use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;

/// Link-layer type reported by the capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    RawIp,
    /// Linux "cooked" capture, used by the `any` pseudo-device.
    LinuxSll,
    /// BSD loopback: a 4-byte address family, then the IP packet.
    Null,
    Other(i32),
}

impl LinkLayer {
    /// Maps a libpcap DLT value.
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            0 | 108 => LinkLayer::Null,
            1 => LinkLayer::Ethernet,
            12 | 14 | 101 => LinkLayer::RawIp,
            113 => LinkLayer::LinuxSll,
            other => LinkLayer::Other(other),
        }
    }
}

/// One frame as delivered by the capture device, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub timestamp: DateTime<Utc>,
    /// Length on the wire, which may exceed `data.len()` when truncated by snaplen.
    pub wire_len: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Header fields pulled out of a frame. Each one is `None` when its layer
/// was not found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameHeaders {
    pub src_mac: Option<MacAddr>,
    pub dst_mac: Option<MacAddr>,
    pub src_ip: Option<IpAddr>,
    pub dst_ip: Option<IpAddr>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

/// A frame ready for display. Dropped as soon as it has been printed.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub timestamp: DateTime<Utc>,
    pub length: u32,
    pub data: Vec<u8>,
    pub headers: FrameHeaders,
}

impl DecodedFrame {
    pub fn new(raw: RawFrame, headers: FrameHeaders) -> Self {
        Self {
            timestamp: raw.timestamp,
            length: raw.wire_len,
            data: raw.data,
            headers,
        }
    }
}
