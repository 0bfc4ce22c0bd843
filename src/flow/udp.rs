use serde::{Deserialize, Serialize};

use crate::{
    packet::{Packet, Transport, UdpDatagram},
    quantities::{seconds, Time},
    translator::Translator,
    util::rand::Rng,
};

use super::{l5_payload, random_port, Direction, FlowParams};

/// Unstructured bidirectional datagram traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdpFlow {
    pub params: FlowParams,
    pub port1: u16,
    pub port2: u16,
}

impl UdpFlow {
    #[must_use]
    pub const fn new(port1: u16, port2: u16, params: FlowParams) -> UdpFlow {
        UdpFlow {
            params,
            port1,
            port2,
        }
    }

    #[must_use]
    pub fn random(node1: usize, node2: usize, rng: &mut Rng) -> UdpFlow {
        UdpFlow {
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
        let ip1 = translator.ip(self.params.node1);
        let ip2 = translator.ip(self.params.node2);
        let deadline = self.params.deadline(t0, rng);
        let mut packets = Vec::new();
        let mut t = t0;
        while t < deadline {
            let direction = self.params.pick_direction(rng);
            let half = self.params.half(direction);
            let (src, dst, src_port, dst_port) = match direction {
                Direction::Forward => (ip1, ip2, self.port1, self.port2),
                Direction::Reverse => (ip2, ip1, self.port2, self.port1),
            };
            #[allow(clippy::cast_possible_truncation)]
            let ttl = half.ttl.sample_int(rng) as u8;
            #[allow(clippy::cast_possible_truncation)]
            let length = half.payload_len.sample_int(rng) as usize;
            packets.push(Packet {
                time: t,
                src,
                dst,
                ttl,
                transport: Transport::Udp(UdpDatagram { src_port, dst_port }),
                payload: l5_payload(length),
            });
            t = t + seconds(half.gap.sample(rng));
        }
        packets
    }
}
