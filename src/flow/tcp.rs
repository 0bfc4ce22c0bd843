use std::net::Ipv4Addr;

use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

use crate::{
    packet::{Packet, TcpFlags, TcpSegment, Transport},
    quantities::{seconds, Time, TimeSpan},
    translator::Translator,
    util::rand::Rng,
};

use super::{l5_payload, random_port, Direction, FlowParams};

/// The connection lifecycle a generated TCP flow walks through.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Syn,
    SynAck,
    HandshakeAck,
    Data,
    FinReverse,
    FinForward,
}

/// A TCP conversation: three-way handshake, bidirectional data until the
/// deadline, symmetric FIN teardown. Sequence and acknowledgment numbers
/// follow RFC arithmetic modulo 2³².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpFlow {
    pub params: FlowParams,
    pub port1: u16,
    pub port2: u16,
}

impl TcpFlow {
    #[must_use]
    pub const fn new(port1: u16, port2: u16, params: FlowParams) -> TcpFlow {
        TcpFlow {
            params,
            port1,
            port2,
        }
    }

    #[must_use]
    pub fn random(node1: usize, node2: usize, rng: &mut Rng) -> TcpFlow {
        TcpFlow {
            params: FlowParams::random(node1, node2, rng),
            port1: random_port(rng),
            port2: random_port(rng),
        }
    }

    pub(crate) fn randomize_port(&mut self, second: bool, rng: &mut Rng) {
        if second {
            self.port2 = random_port(rng);
        } else {
            self.port1 = random_port(rng);
        }
    }

    pub(crate) fn generate(&self, translator: &Translator, t0: Time, rng: &mut Rng) -> Vec<Packet> {
        let endpoints = (
            translator.ip(self.params.node1),
            translator.ip(self.params.node2),
        );
        let deadline = self.params.deadline(t0, rng);
        let mut seq1 = random_seq(rng);
        let mut seq2 = random_seq(rng);
        let mut packets = Vec::new();
        let mut t = t0;
        let mut phase = Phase::Syn;

        loop {
            match phase {
                Phase::Syn => {
                    packets.push(self.segment(
                        Direction::Forward,
                        t,
                        TcpFlags::SYN,
                        Vec::new(),
                        seq1,
                        0,
                        endpoints,
                        rng,
                    ));
                    seq1 = seq1.wrapping_add(1);
                    t = t + self.gap(Direction::Forward, rng);
                    phase = Phase::SynAck;
                }
                Phase::SynAck => {
                    packets.push(self.segment(
                        Direction::Reverse,
                        t,
                        TcpFlags::SYN | TcpFlags::ACK,
                        Vec::new(),
                        seq2,
                        seq1,
                        endpoints,
                        rng,
                    ));
                    seq2 = seq2.wrapping_add(1);
                    t = t + self.gap(Direction::Reverse, rng);
                    phase = Phase::HandshakeAck;
                }
                Phase::HandshakeAck => {
                    packets.push(self.segment(
                        Direction::Forward,
                        t,
                        TcpFlags::ACK,
                        Vec::new(),
                        seq1,
                        seq2,
                        endpoints,
                        rng,
                    ));
                    t = t + self.gap(Direction::Forward, rng);
                    phase = Phase::Data;
                }
                Phase::Data => {
                    if t >= deadline {
                        phase = Phase::FinReverse;
                        continue;
                    }
                    // each data packet flips an independent fair coin for
                    // its direction; the half-flow selector is not consulted
                    let direction = if rng.coin() {
                        Direction::Forward
                    } else {
                        Direction::Reverse
                    };
                    let payload = self.payload(direction, rng);
                    let advance = payload_advance(&payload);
                    let (seq, ack) = match direction {
                        Direction::Forward => (seq1, seq2),
                        Direction::Reverse => (seq2, seq1),
                    };
                    packets.push(self.segment(
                        direction,
                        t,
                        TcpFlags::ACK,
                        payload,
                        seq,
                        ack,
                        endpoints,
                        rng,
                    ));
                    match direction {
                        Direction::Forward => seq1 = seq1.wrapping_add(advance),
                        Direction::Reverse => seq2 = seq2.wrapping_add(advance),
                    }
                    t = t + self.gap(direction, rng);
                }
                Phase::FinReverse => {
                    let payload = self.payload(Direction::Reverse, rng);
                    let advance = payload_advance(&payload);
                    packets.push(self.segment(
                        Direction::Reverse,
                        t,
                        TcpFlags::FIN | TcpFlags::ACK,
                        payload,
                        seq2,
                        seq1,
                        endpoints,
                        rng,
                    ));
                    seq2 = seq2.wrapping_add(advance);
                    t = t + self.gap(Direction::Reverse, rng);
                    phase = Phase::FinForward;
                }
                Phase::FinForward => {
                    let payload = self.payload(Direction::Forward, rng);
                    packets.push(self.segment(
                        Direction::Forward,
                        t,
                        TcpFlags::FIN | TcpFlags::ACK,
                        payload,
                        seq1,
                        seq2,
                        endpoints,
                        rng,
                    ));
                    return packets;
                }
            }
        }
    }

    fn payload(&self, direction: Direction, rng: &mut Rng) -> Vec<u8> {
        #[allow(clippy::cast_possible_truncation)]
        let length = self.params.half(direction).payload_len.sample_int(rng) as usize;
        l5_payload(length)
    }

    fn gap(&self, direction: Direction, rng: &mut Rng) -> TimeSpan {
        seconds(self.params.half(direction).gap.sample(rng))
    }

    #[allow(clippy::too_many_arguments)]
    fn segment(
        &self,
        direction: Direction,
        time: Time,
        flags: TcpFlags,
        payload: Vec<u8>,
        seq: u32,
        ack: u32,
        endpoints: (Ipv4Addr, Ipv4Addr),
        rng: &mut Rng,
    ) -> Packet {
        let (ip1, ip2) = endpoints;
        let (src, dst, src_port, dst_port) = match direction {
            Direction::Forward => (ip1, ip2, self.port1, self.port2),
            Direction::Reverse => (ip2, ip1, self.port2, self.port1),
        };
        #[allow(clippy::cast_possible_truncation)]
        let ttl = self.params.half(direction).ttl.sample_int(rng) as u8;
        Packet {
            time,
            src,
            dst,
            ttl,
            transport: Transport::Tcp(TcpSegment {
                src_port,
                dst_port,
                seq,
                ack,
                flags,
            }),
            payload,
        }
    }
}

fn random_seq(rng: &mut Rng) -> u32 {
    #[allow(clippy::cast_possible_truncation)]
    {
        rng.sample(&Uniform::new(0_u64, 1 << 32)) as u32
    }
}

#[allow(clippy::cast_possible_truncation)]
fn payload_advance(payload: &[u8]) -> u32 {
    payload.len() as u32
}
