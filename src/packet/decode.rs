use etherparse::{
    EtherType, LaxNetSlice, LaxSlicedPacket, LinkSlice, LinuxSllHeader, LinuxSllProtocolType,
    TransportSlice,
};
use log::debug;
use std::fmt::Display;
use std::net::IpAddr;

use super::{FrameHeaders, LinkLayer, MacAddr};

/// Address family prefix in front of every BSD loopback packet.
const NULL_HEADER_LEN: usize = 4;

/// Turns raw frame bytes into per-layer header fields.
pub trait FrameDecoder {
    fn decode(&self, link: LinkLayer, data: &[u8]) -> FrameHeaders;
}

/// Decoder backed by `etherparse`.
///
/// Slicing is lax: a frame cut short by the snapshot length, or an IP total
/// length that runs past the captured bytes, still yields every layer whose
/// header fits.
#[derive(Debug, Default, Clone, Copy)]
pub struct EtherparseDecoder;

impl FrameDecoder for EtherparseDecoder {
    fn decode(&self, link: LinkLayer, data: &[u8]) -> FrameHeaders {
        match link {
            LinkLayer::Ethernet => match LaxSlicedPacket::from_ethernet(data) {
                Ok(sliced) => headers_from_slices(&sliced),
                Err(err) => undecodable(link, err),
            },
            LinkLayer::RawIp => decode_ip(link, data),
            LinkLayer::Null => match data.get(NULL_HEADER_LEN..) {
                Some(packet) => decode_ip(link, packet),
                None => undecodable(link, "shorter than the loopback header"),
            },
            LinkLayer::LinuxSll => decode_linux_sll(data),
            LinkLayer::Other(dlt) => {
                debug!("no decoder for link type {dlt}, showing raw bytes only");
                FrameHeaders::default()
            }
        }
    }
}

fn decode_ip(link: LinkLayer, packet: &[u8]) -> FrameHeaders {
    match LaxSlicedPacket::from_ip(packet) {
        Ok(sliced) => headers_from_slices(&sliced),
        Err(err) => undecodable(link, err),
    }
}

fn decode_linux_sll(data: &[u8]) -> FrameHeaders {
    let (sll, payload) = match LinuxSllHeader::from_slice(data) {
        Ok(parsed) => parsed,
        Err(err) => {
            // etherparse only knows a handful of ARPHRD types. Loopback and
            // tunnels on the `any` device still carry an EtherType at 14..16.
            debug!("cooked header not recognised: {err}");
            return match (data.get(14..16), data.get(LinuxSllHeader::LEN..)) {
                (Some(&[hi, lo]), Some(payload)) => {
                    let ether_type = EtherType(u16::from_be_bytes([hi, lo]));
                    headers_from_slices(&LaxSlicedPacket::from_ether_type(ether_type, payload))
                }
                _ => FrameHeaders::default(),
            };
        }
    };

    let mut headers = match sll.protocol_type {
        LinuxSllProtocolType::EtherType(ether_type) => {
            headers_from_slices(&LaxSlicedPacket::from_ether_type(ether_type, payload))
        }
        other => {
            debug!("cooked frame carries {other:?}, no network layer decoded");
            FrameHeaders::default()
        }
    };

    // Cooked captures only record the sender; the destination is unknown.
    if sll.sender_address_valid_length == 6 {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&sll.sender_address[..6]);
        headers.src_mac = Some(MacAddr(mac));
    }
    headers
}

fn undecodable(link: LinkLayer, err: impl Display) -> FrameHeaders {
    debug!("{link:?} frame did not decode: {err}");
    FrameHeaders::default()
}

fn headers_from_slices(sliced: &LaxSlicedPacket<'_>) -> FrameHeaders {
    let mut headers = FrameHeaders::default();

    if let Some((err, layer)) = &sliced.stop_err {
        debug!("decoding stopped at {layer}: {err}");
    }

    if let Some(LinkSlice::Ethernet2(eth)) = &sliced.link {
        headers.src_mac = Some(MacAddr(eth.source()));
        headers.dst_mac = Some(MacAddr(eth.destination()));
    }

    match &sliced.net {
        Some(LaxNetSlice::Ipv4(ipv4)) => {
            headers.src_ip = Some(IpAddr::V4(ipv4.header().source_addr()));
            headers.dst_ip = Some(IpAddr::V4(ipv4.header().destination_addr()));
        }
        Some(LaxNetSlice::Ipv6(ipv6)) => {
            headers.src_ip = Some(IpAddr::V6(ipv6.header().source_addr()));
            headers.dst_ip = Some(IpAddr::V6(ipv6.header().destination_addr()));
        }
        None => {}
    }

    match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => {
            headers.src_port = Some(tcp.source_port());
            headers.dst_port = Some(tcp.destination_port());
        }
        Some(TransportSlice::Udp(udp)) => {
            headers.src_port = Some(udp.source_port());
            headers.dst_port = Some(udp.destination_port());
        }
        _ => {}
    }

    headers
}
