//! Bidirectional traffic flows and their evolvable parameters.

pub mod icmp;
pub mod tcp;
pub mod udp;

pub use icmp::IcmpFlow;
pub use tcp::TcpFlow;
pub use udp::UdpFlow;

use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

use crate::{
    dist::{Cdf, Domain},
    packet::Packet,
    quantities::{seconds, Time},
    translator::Translator,
    util::rand::Rng,
};

/// One half of a bidirectional flow: `Forward` runs node1 → node2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("distribution carries domain {got:?}, expected {want:?}")]
    DomainMismatch { got: Domain, want: Domain },
    #[error("ICMP type {got} is outside [0, 40]")]
    IcmpTypeOutOfRange { got: u8 },
}

fn expect_domain(cdf: &Cdf, want: Domain) -> Result<(), FlowError> {
    if cdf.domain() == want {
        Ok(())
    } else {
        Err(FlowError::DomainMismatch {
            got: cdf.domain(),
            want,
        })
    }
}

/// The distributions steering one half-flow: inter-packet gap, payload
/// length, and TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfFlowDists {
    pub gap: Cdf,
    pub payload_len: Cdf,
    pub ttl: Cdf,
}

impl HalfFlowDists {
    pub fn new(gap: Cdf, payload_len: Cdf, ttl: Cdf) -> Result<HalfFlowDists, FlowError> {
        let dists = HalfFlowDists {
            gap,
            payload_len,
            ttl,
        };
        dists.check_domains()?;
        Ok(dists)
    }

    #[must_use]
    pub fn random(rng: &mut Rng) -> HalfFlowDists {
        HalfFlowDists {
            gap: Cdf::random(Domain::INTER_PACKET_GAP, rng),
            payload_len: Cdf::random(Domain::PAYLOAD_LEN, rng),
            ttl: Cdf::random(Domain::TTL, rng),
        }
    }

    fn check_domains(&self) -> Result<(), FlowError> {
        expect_domain(&self.gap, Domain::INTER_PACKET_GAP)?;
        expect_domain(&self.payload_len, Domain::PAYLOAD_LEN)?;
        expect_domain(&self.ttl, Domain::TTL)
    }
}

/// What every flow shares: the endpoints and the distributions steering both
/// half-flows, the flow duration, and the half-flow selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowParams {
    pub node1: usize,
    pub node2: usize,
    pub fwd: HalfFlowDists,
    pub rev: HalfFlowDists,
    pub duration: Cdf,
    pub direction: Cdf,
}

impl FlowParams {
    /// How many distributions a flow contributes to the chromosome.
    pub(crate) const DIST_COUNT: usize = 8;

    pub fn new(
        node1: usize,
        node2: usize,
        fwd: HalfFlowDists,
        rev: HalfFlowDists,
        duration: Cdf,
        direction: Cdf,
    ) -> Result<FlowParams, FlowError> {
        let params = FlowParams {
            node1,
            node2,
            fwd,
            rev,
            duration,
            direction,
        };
        params.check_domains()?;
        Ok(params)
    }

    #[must_use]
    pub fn random(node1: usize, node2: usize, rng: &mut Rng) -> FlowParams {
        FlowParams {
            node1,
            node2,
            fwd: HalfFlowDists::random(rng),
            rev: HalfFlowDists::random(rng),
            duration: Cdf::random(Domain::FLOW_DURATION, rng),
            direction: Cdf::random(Domain::DIRECTION, rng),
        }
    }

    pub(crate) fn check_domains(&self) -> Result<(), FlowError> {
        self.fwd.check_domains()?;
        self.rev.check_domains()?;
        expect_domain(&self.duration, Domain::FLOW_DURATION)?;
        expect_domain(&self.direction, Domain::DIRECTION)
    }

    /// The flow's slice of the chromosome, in a stable order.
    pub fn dists(&self) -> impl Iterator<Item = &Cdf> {
        [
            &self.fwd.gap,
            &self.fwd.payload_len,
            &self.fwd.ttl,
            &self.rev.gap,
            &self.rev.payload_len,
            &self.rev.ttl,
            &self.duration,
            &self.direction,
        ]
        .into_iter()
    }

    pub fn dists_mut(&mut self) -> impl Iterator<Item = &mut Cdf> {
        [
            &mut self.fwd.gap,
            &mut self.fwd.payload_len,
            &mut self.fwd.ttl,
            &mut self.rev.gap,
            &mut self.rev.payload_len,
            &mut self.rev.ttl,
            &mut self.duration,
            &mut self.direction,
        ]
        .into_iter()
    }

    pub(crate) const fn half(&self, direction: Direction) -> &HalfFlowDists {
        match direction {
            Direction::Forward => &self.fwd,
            Direction::Reverse => &self.rev,
        }
    }

    /// Consults the half-flow selector: 0 means forward, anything else
    /// reverse.
    pub(crate) fn pick_direction(&self, rng: &mut Rng) -> Direction {
        if self.direction.sample_int(rng) == 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    pub(crate) fn deadline(&self, t0: Time, rng: &mut Rng) -> Time {
        t0 + seconds(self.duration.sample(rng))
    }
}

/// A bidirectional flow between two nodes of the owning genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "proto", rename_all = "snake_case")]
pub enum Flow {
    Tcp(TcpFlow),
    Udp(UdpFlow),
    Icmp(IcmpFlow),
}

impl Flow {
    /// A fresh flow between the given nodes, drawn uniformly across the
    /// three protocols.
    #[must_use]
    pub fn random(node1: usize, node2: usize, rng: &mut Rng) -> Flow {
        match rng.index(3) {
            0 => Flow::Tcp(TcpFlow::random(node1, node2, rng)),
            1 => Flow::Udp(UdpFlow::random(node1, node2, rng)),
            _ => Flow::Icmp(IcmpFlow::random(node1, node2, rng)),
        }
    }

    #[must_use]
    pub const fn params(&self) -> &FlowParams {
        match self {
            Flow::Tcp(flow) => &flow.params,
            Flow::Udp(flow) => &flow.params,
            Flow::Icmp(flow) => &flow.params,
        }
    }

    pub(crate) fn params_mut(&mut self) -> &mut FlowParams {
        match self {
            Flow::Tcp(flow) => &mut flow.params,
            Flow::Udp(flow) => &mut flow.params,
            Flow::Icmp(flow) => &mut flow.params,
        }
    }

    #[must_use]
    pub const fn node1(&self) -> usize {
        self.params().node1
    }

    #[must_use]
    pub const fn node2(&self) -> usize {
        self.params().node2
    }

    pub fn dists(&self) -> impl Iterator<Item = &Cdf> {
        self.params().dists()
    }

    pub(crate) fn check(&self) -> Result<(), FlowError> {
        self.params().check_domains()?;
        if let Flow::Icmp(flow) = self {
            flow.check_types()?;
        }
        Ok(())
    }

    /// Mutates exactly one evolvable parameter: one of the eight
    /// distributions, or one of the protocol's two scalars.
    pub fn mutate(&mut self, rng: &mut Rng) {
        let choice = rng.index(FlowParams::DIST_COUNT + 2);
        if choice < FlowParams::DIST_COUNT {
            self.params_mut()
                .dists_mut()
                .nth(choice)
                .expect("choice addresses one of the eight distributions")
                .mutate(rng);
        } else {
            let second = choice == FlowParams::DIST_COUNT + 1;
            match self {
                Flow::Tcp(flow) => flow.randomize_port(second, rng),
                Flow::Udp(flow) => flow.randomize_port(second, rng),
                Flow::Icmp(flow) => flow.randomize_type(second, rng),
            }
        }
    }

    /// Expands the flow into a timestamped packet sequence starting at `t0`.
    #[must_use]
    pub fn generate(&self, translator: &Translator, t0: Time, rng: &mut Rng) -> Vec<Packet> {
        match self {
            Flow::Tcp(flow) => flow.generate(translator, t0, rng),
            Flow::Udp(flow) => flow.generate(translator, t0, rng),
            Flow::Icmp(flow) => flow.generate(translator, t0, rng),
        }
    }
}

pub(crate) fn random_port(rng: &mut Rng) -> u16 {
    #[allow(clippy::cast_possible_truncation)]
    {
        rng.sample(&Uniform::new(0_u32, 1 << 16)) as u16
    }
}

/// `length` bytes of ASCII filler.
pub(crate) fn l5_payload(length: usize) -> Vec<u8> {
    vec![b'A'; length]
}

#[cfg(test)]
mod tests {
    use super::{Flow, FlowError, FlowParams, HalfFlowDists};
    use crate::{
        dist::{Cdf, Domain},
        util::rand::Rng,
    };

    #[test]
    fn half_flow_dists_reject_misassigned_roles() {
        let mut rng = Rng::from_seed(1);
        let gap = Cdf::random(Domain::INTER_PACKET_GAP, &mut rng);
        let payload = Cdf::random(Domain::PAYLOAD_LEN, &mut rng);
        let ttl = Cdf::random(Domain::TTL, &mut rng);
        assert!(HalfFlowDists::new(gap.clone(), payload.clone(), ttl.clone()).is_ok());
        assert!(matches!(
            HalfFlowDists::new(payload, gap, ttl),
            Err(FlowError::DomainMismatch { .. })
        ));
    }

    #[test]
    fn params_expose_eight_dists() {
        let mut rng = Rng::from_seed(2);
        let mut params = FlowParams::random(0, 1, &mut rng);
        assert_eq!(params.dists().count(), FlowParams::DIST_COUNT);
        assert_eq!(params.dists_mut().count(), FlowParams::DIST_COUNT);
        assert!(params.check_domains().is_ok());
    }

    #[test]
    fn mutation_touches_exactly_one_parameter() {
        let mut rng = Rng::from_seed(3);
        for _ in 0..50 {
            let flow = Flow::random(0, 1, &mut rng);
            let mut mutated = flow.clone();
            mutated.mutate(&mut rng);
            assert!(mutated.check().is_ok());
            let differing = flow
                .dists()
                .zip(mutated.dists())
                .filter(|(a, b)| a != b)
                .count();
            // either one distribution moved, or a scalar did (possibly onto
            // the same value it had)
            assert!(differing <= 1);
            assert_eq!(flow.node1(), mutated.node1());
            assert_eq!(flow.node2(), mutated.node2());
        }
    }

    #[test]
    fn cloned_flows_do_not_share_distributions() {
        let mut rng = Rng::from_seed(4);
        let original = Flow::random(3, 4, &mut rng);
        let reference = original.clone();
        let mut clone = original.clone();
        for _ in 0..100 {
            clone.mutate(&mut rng);
        }
        assert!(original == reference);
    }
}
