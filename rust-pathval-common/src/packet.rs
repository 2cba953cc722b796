//! Ethernet/IPv4/ICMP frame helpers.
//!
//! The tracer only cares whether a controller-delivered frame is an ICMP
//! probe. Classification fails closed: a truncated, non-IPv4, or non-ICMP
//! frame is reported as not-of-interest rather than raised as an error.

use bytes::Bytes;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpPacket, IcmpTypes, MutableIcmpPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{self, Ipv4Packet, MutableIpv4Packet};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

const ETHER_HDR_LEN: usize = 14;
const IPV4_HDR_LEN: usize = 20;
const ICMP_ECHO_LEN: usize = 8;

/// Link-layer endpoints of an ICMP probe frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeInfo {
    pub src: MacAddr,
    pub dst: MacAddr,
}

/// Classify a raw frame, returning the probe endpoints when the frame is an
/// IPv4 ICMP packet and `None` for everything else.
pub fn classify_probe(frame: &[u8]) -> Option<ProbeInfo> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }
    let ip = Ipv4Packet::new(eth.payload())?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    // A frame claiming to carry ICMP but too short to hold the header is
    // treated the same as any other non-probe frame.
    IcmpPacket::new(ip.payload())?;
    Some(ProbeInfo {
        src: eth.get_source(),
        dst: eth.get_destination(),
    })
}

/// Source and destination link-layer addresses of a frame, if it is at least
/// a whole Ethernet header.
pub fn eth_endpoints(frame: &[u8]) -> Option<(MacAddr, MacAddr)> {
    let eth = EthernetPacket::new(frame)?;
    Some((eth.get_source(), eth.get_destination()))
}

/// Whether the frame carries an IPv4 payload.
pub fn is_ipv4(frame: &[u8]) -> bool {
    EthernetPacket::new(frame).is_some_and(|eth| eth.get_ethertype() == EtherTypes::Ipv4)
}

/// Build an ICMP echo-request frame usable as a path probe.
pub fn build_echo_request(
    src_mac: MacAddr,
    dst_mac: MacAddr,
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    seq: u16,
) -> Bytes {
    const IPV4_LEN: usize = IPV4_HDR_LEN + ICMP_ECHO_LEN;
    const FRAME_LEN: usize = ETHER_HDR_LEN + IPV4_LEN;

    let mut buf = vec![0u8; FRAME_LEN];

    // The buffer is statically sized for every header below, so the packet
    // views cannot fail to allocate.
    let mut eth = MutableEthernetPacket::new(&mut buf).expect("frame buffer fits ethernet header");
    eth.set_destination(dst_mac);
    eth.set_source(src_mac);
    eth.set_ethertype(EtherTypes::Ipv4);

    let mut ip =
        MutableIpv4Packet::new(&mut buf[ETHER_HDR_LEN..]).expect("frame buffer fits ipv4 header");
    ip.set_version(4);
    ip.set_header_length((IPV4_HDR_LEN / 4) as u8);
    ip.set_total_length(IPV4_LEN as u16);
    ip.set_ttl(64);
    ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
    ip.set_source(src_ip);
    ip.set_destination(dst_ip);

    let icmp_off = ETHER_HDR_LEN + IPV4_HDR_LEN;
    let mut echo =
        MutableEchoRequestPacket::new(&mut buf[icmp_off..]).expect("frame buffer fits icmp echo");
    echo.set_icmp_type(IcmpTypes::EchoRequest);
    echo.set_identifier(0x7061);
    echo.set_sequence_number(seq);

    let icmp_csum = {
        let view = IcmpPacket::new(&buf[icmp_off..]).expect("frame buffer fits icmp header");
        icmp::checksum(&view)
    };
    MutableIcmpPacket::new(&mut buf[icmp_off..])
        .expect("frame buffer fits icmp header")
        .set_checksum(icmp_csum);

    let ip_csum = {
        let view = Ipv4Packet::new(&buf[ETHER_HDR_LEN..]).expect("frame buffer fits ipv4 header");
        ipv4::checksum(&view)
    };
    MutableIpv4Packet::new(&mut buf[ETHER_HDR_LEN..])
        .expect("frame buffer fits ipv4 header")
        .set_checksum(ip_csum);

    Bytes::from(buf)
}
