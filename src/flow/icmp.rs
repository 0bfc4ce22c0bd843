use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

use crate::{
    packet::{IcmpMessage, Packet, Transport},
    quantities::{seconds, Time},
    translator::Translator,
    util::rand::Rng,
};

use super::{l5_payload, Direction, FlowError, FlowParams};

/// The largest assigned ICMP message type.
pub const ICMP_TYPE_MAX: u8 = 40;

/// Echo-style request/reply traffic.
///
/// Forward packets carry a sequence number that counts up from zero; each
/// reverse packet answers the most recent forward one by echoing its
/// sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcmpFlow {
    pub params: FlowParams,
    pub type1: u8,
    pub type2: u8,
}

impl IcmpFlow {
    pub fn new(type1: u8, type2: u8, params: FlowParams) -> Result<IcmpFlow, FlowError> {
        let flow = IcmpFlow {
            params,
            type1,
            type2,
        };
        flow.check_types()?;
        Ok(flow)
    }

    #[must_use]
    pub fn random(node1: usize, node2: usize, rng: &mut Rng) -> IcmpFlow {
        IcmpFlow {
            params: FlowParams::random(node1, node2, rng),
            type1: random_type(rng),
            type2: random_type(rng),
        }
    }

    pub(crate) fn check_types(&self) -> Result<(), FlowError> {
        for got in [self.type1, self.type2] {
            if got > ICMP_TYPE_MAX {
                return Err(FlowError::IcmpTypeOutOfRange { got });
            }
        }
        Ok(())
    }

    pub(crate) fn randomize_type(&mut self, second: bool, rng: &mut Rng) {
        if second {
            self.type2 = random_type(rng);
        } else {
            self.type1 = random_type(rng);
        }
    }

    pub(crate) fn generate(&self, translator: &Translator, t0: Time, rng: &mut Rng) -> Vec<Packet> {
        let ip1 = translator.ip(self.params.node1);
        let ip2 = translator.ip(self.params.node2);
        let deadline = self.params.deadline(t0, rng);
        let mut packets = Vec::new();
        let mut t = t0;
        let mut next_seq: u32 = 0;
        let mut pending_ack: u32 = 0;
        while t < deadline {
            let direction = self.params.pick_direction(rng);
            let half = self.params.half(direction);
            let (src, dst, message) = match direction {
                Direction::Forward => {
                    let message = IcmpMessage {
                        kind: self.type1,
                        seq: next_seq,
                        ack: 0,
                    };
                    pending_ack = next_seq;
                    next_seq = next_seq.wrapping_add(1);
                    (ip1, ip2, message)
                }
                Direction::Reverse => (
                    ip2,
                    ip1,
                    IcmpMessage {
                        kind: self.type2,
                        seq: pending_ack,
                        ack: pending_ack,
                    },
                ),
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
                transport: Transport::Icmp(message),
                payload: l5_payload(length),
            });
            t = t + seconds(half.gap.sample(rng));
        }
        packets
    }
}

fn random_type(rng: &mut Rng) -> u8 {
    rng.sample(&Uniform::new(0, ICMP_TYPE_MAX + 1))
}

#[cfg(test)]
mod tests {
    use super::{IcmpFlow, ICMP_TYPE_MAX};
    use crate::{
        dist::{Cdf, Domain},
        flow::{FlowError, FlowParams, HalfFlowDists},
        quantities::Time,
        translator::{Net, Side, Translator},
        util::rand::Rng,
    };

    fn steady_params() -> FlowParams {
        let half = || {
            HalfFlowDists::new(
                Cdf::new(Domain::INTER_PACKET_GAP, &[(1.0, 0.1)]).unwrap(),
                Cdf::new(Domain::PAYLOAD_LEN, &[(1.0, 100.)]).unwrap(),
                Cdf::new(Domain::TTL, &[(1.0, 1.)]).unwrap(),
            )
            .unwrap()
        };
        FlowParams::new(
            0,
            1,
            half(),
            half(),
            Cdf::new(Domain::FLOW_DURATION, &[(1.0, 100.)]).unwrap(),
            Cdf::new(Domain::DIRECTION, &[(0.5, 0.), (1.0, 1.)]).unwrap(),
        )
        .unwrap()
    }

    fn two_sided_translator() -> Translator {
        Translator::new(
            &[
                Net::new(8, Side::Left).unwrap(),
                Net::new(16, Side::Right).unwrap(),
            ],
            &[0, 1],
        )
        .unwrap()
    }

    #[test]
    fn requests_count_up_and_replies_echo() {
        let translator = two_sided_translator();
        let flow = IcmpFlow::new(0, 8, steady_params()).unwrap();
        let mut rng = Rng::from_seed(13);
        let packets = flow.generate(&translator, Time::start(), &mut rng);
        assert!(packets.len() > 950 && packets.len() < 1050);

        let mut expected_seq = 0_u32;
        let mut last_request: Option<u32> = None;
        for packet in &packets {
            let message = packet.transport.as_icmp().unwrap();
            if packet.src == translator.ip(0) {
                assert_eq!(message.kind, 0);
                assert_eq!(message.seq, expected_seq);
                expected_seq += 1;
                last_request = Some(message.seq);
            } else {
                assert_eq!(message.kind, 8);
                if let Some(seq) = last_request {
                    assert_eq!(message.ack, seq);
                    assert_eq!(message.seq, seq);
                }
            }
        }
        assert!(last_request.is_some());
    }

    #[test]
    fn types_outside_the_assigned_range_are_rejected() {
        assert!(matches!(
            IcmpFlow::new(0, ICMP_TYPE_MAX + 1, steady_params()),
            Err(FlowError::IcmpTypeOutOfRange { .. })
        ));
        assert!(IcmpFlow::new(0, ICMP_TYPE_MAX, steady_params()).is_ok());
    }
}
