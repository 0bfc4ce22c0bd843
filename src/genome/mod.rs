//! The evolvable unit: network topology, flows, and workload-wide
//! distributions.

pub mod operators;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    dist::{Cdf, Domain},
    flow::{Flow, FlowError},
    packet::Packet,
    quantities::{Float, Time, TimeSpan},
    translator::{Net, Side, TranslateError, Translator},
    util::rand::Rng,
    Evolvable, MutateConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum GenomeError {
    #[error("node {node} references net {net}, but only {nets} nets exist")]
    NetIndexOutOfRange { node: usize, net: usize, nets: usize },
    #[error("flow {flow} references node {node}, but only {nodes} nodes exist")]
    NodeIndexOutOfRange {
        flow: usize,
        node: usize,
        nodes: usize,
    },
    #[error("flow {flow} is malformed")]
    MalformedFlow {
        flow: usize,
        #[source]
        source: FlowError,
    },
    #[error("the flow-count distribution carries domain {got:?}")]
    FlowCountDomain { got: Domain },
}

/// A full workload description and the unit of evolution.
///
/// `nodes[i]` names the net node `i` lives on; each flow names two nodes.
/// Cloning is deep: a clone shares no distribution state with the original,
/// so a driver may hand clones to parallel workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub(crate) nets: Vec<Net>,
    pub(crate) nodes: Vec<usize>,
    pub(crate) flows: Vec<Flow>,
    pub(crate) flow_count: Cdf,
    pub(crate) horizon: TimeSpan,
}

impl Genome {
    pub fn new(
        nets: Vec<Net>,
        nodes: Vec<usize>,
        flows: Vec<Flow>,
        flow_count: Cdf,
        horizon: TimeSpan,
    ) -> Result<Genome, GenomeError> {
        let genome = Genome {
            nets,
            nodes,
            flows,
            flow_count,
            horizon,
        };
        genome.validate()?;
        Ok(genome)
    }

    #[must_use]
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    #[must_use]
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    #[must_use]
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    #[must_use]
    pub const fn flow_count(&self) -> &Cdf {
        &self.flow_count
    }

    /// The observation window the workload is scored over.
    #[must_use]
    pub const fn horizon(&self) -> TimeSpan {
        self.horizon
    }

    /// Checks the referential and domain invariants. Operators call this as
    /// their post-condition; a failure after construction means an operator
    /// is broken.
    pub fn validate(&self) -> Result<(), GenomeError> {
        for (node, &net) in self.nodes.iter().enumerate() {
            if net >= self.nets.len() {
                return Err(GenomeError::NetIndexOutOfRange {
                    node,
                    net,
                    nets: self.nets.len(),
                });
            }
        }
        for (index, flow) in self.flows.iter().enumerate() {
            for node in [flow.node1(), flow.node2()] {
                if node >= self.nodes.len() {
                    return Err(GenomeError::NodeIndexOutOfRange {
                        flow: index,
                        node,
                        nodes: self.nodes.len(),
                    });
                }
            }
            flow.check()
                .map_err(|source| GenomeError::MalformedFlow {
                    flow: index,
                    source,
                })?;
        }
        if self.flow_count.domain() != Domain::FLOW_COUNT {
            return Err(GenomeError::FlowCountDomain {
                got: self.flow_count.domain(),
            });
        }
        Ok(())
    }

    /// Every evolvable distribution: each flow's eight, then the flow count.
    pub fn chromosome(&self) -> impl Iterator<Item = &Cdf> {
        self.flows
            .iter()
            .flat_map(Flow::dists)
            .chain(std::iter::once(&self.flow_count))
    }

    /// Expands every flow and merges the results into a single time-ordered
    /// packet sequence starting at `t0`.
    pub fn generate(&self, t0: Time, rng: &mut Rng) -> Result<Vec<Packet>, TranslateError> {
        let translator = Translator::new(&self.nets, &self.nodes)?;
        let mut packets = self
            .flows
            .iter()
            .flat_map(|flow| flow.generate(&translator, t0, rng))
            .collect_vec();
        packets.sort_by_key(|packet| packet.time);
        Ok(packets)
    }

    /// Like [`generate`](Genome::generate), but splits the traffic by the
    /// observation point its sender sits at. Each half is time-ordered.
    pub fn generate_by_side(
        &self,
        t0: Time,
        rng: &mut Rng,
    ) -> Result<(Vec<Packet>, Vec<Packet>), TranslateError> {
        let translator = Translator::new(&self.nets, &self.nodes)?;
        let (mut left, mut right): (Vec<Packet>, Vec<Packet>) = self
            .flows
            .iter()
            .flat_map(|flow| flow.generate(&translator, t0, rng))
            .partition(|packet| translator.side_of(packet.src) == Some(Side::Left));
        left.sort_by_key(|packet| packet.time);
        right.sort_by_key(|packet| packet.time);
        Ok((left, right))
    }

    /// The RMS distance between two genomes over the probability and
    /// normalized-value coordinates of their zipped chromosomes. Identical
    /// genomes measure 0.
    #[must_use]
    pub fn divergence(&self, other: &Genome) -> Float {
        let mut sum = 0.;
        let mut terms = 0_u32;
        for (ours, theirs) in self.chromosome().zip(other.chromosome()) {
            for (a, b) in ours.normalized_points().zip(theirs.normalized_points()) {
                sum += (a.p - b.p).powi(2) + (a.v - b.v).powi(2);
                terms += 2;
            }
        }
        if terms == 0 {
            return 0.;
        }
        (sum / Float::from(terms)).sqrt()
    }
}

impl Evolvable for Genome {
    fn initialize(rng: &mut Rng) -> Genome {
        operators::initialize(rng)
    }

    /// Applies exactly one mutation; `config.pmut` is ignored (see
    /// [`MutateConfig`]).
    fn mutate(&mut self, _config: &MutateConfig, rng: &mut Rng) {
        operators::mutate(self, rng);
    }

    fn crossover(&self, other: &Genome, rng: &mut Rng) -> (Genome, Genome) {
        operators::crossover(self, other, rng)
    }

    fn replicate(&self) -> Genome {
        self.clone()
    }
}
