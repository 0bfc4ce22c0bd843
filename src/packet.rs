//! The packets a workload materializes: just enough of the IP, transport,
//! and payload layers for a fitness function to score.

use std::{net::Ipv4Addr, ops::BitOr};

use serde::{Deserialize, Serialize};

use crate::quantities::Time;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub time: Time,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub ttl: u8,
    pub transport: Transport,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "proto", rename_all = "snake_case")]
pub enum Transport {
    Tcp(TcpSegment),
    Udp(UdpDatagram),
    Icmp(IcmpMessage),
}

impl Transport {
    #[must_use]
    pub const fn as_tcp(&self) -> Option<&TcpSegment> {
        match self {
            Transport::Tcp(segment) => Some(segment),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_udp(&self) -> Option<&UdpDatagram> {
        match self {
            Transport::Udp(datagram) => Some(datagram),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_icmp(&self) -> Option<&IcmpMessage> {
        match self {
            Transport::Icmp(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpSegment {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: TcpFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpDatagram {
    pub src_port: u16,
    pub dst_port: u16,
}

/// ICMP echo bookkeeping: `seq` numbers the requests, `ack` names the
/// request a reply answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpMessage {
    pub kind: u8,
    pub seq: u32,
    pub ack: u32,
}

/// TCP control flags, bit-packed as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TcpFlags(u8);

impl TcpFlags {
    pub const NONE: TcpFlags = TcpFlags(0);
    pub const FIN: TcpFlags = TcpFlags(0x01);
    pub const SYN: TcpFlags = TcpFlags(0x02);
    pub const RST: TcpFlags = TcpFlags(0x04);
    pub const ACK: TcpFlags = TcpFlags(0x10);

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, flags: TcpFlags) -> bool {
        self.0 & flags.0 == flags.0
    }
}

impl BitOr for TcpFlags {
    type Output = TcpFlags;

    fn bitor(self, rhs: TcpFlags) -> TcpFlags {
        TcpFlags(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::TcpFlags;

    #[test]
    fn flags_combine_and_test() {
        let flags = TcpFlags::SYN | TcpFlags::ACK;
        assert!(flags.contains(TcpFlags::SYN));
        assert!(flags.contains(TcpFlags::ACK));
        assert!(!flags.contains(TcpFlags::FIN));
        assert_ne!(flags, TcpFlags::SYN);
        assert_eq!(TcpFlags::NONE.bits(), 0);
    }
}
