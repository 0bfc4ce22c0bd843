#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::suboptimal_flops,
    clippy::float_cmp
)]

use serde::{Deserialize, Serialize};

use crate::{quantities::Float, util::rand::Rng};

#[macro_use]
pub mod util;
pub mod dist;
pub mod evaluator;
pub mod flow;
pub mod genome;
pub mod packet;
pub mod quantities;
pub mod translator;

pub use dist::{Cdf, Domain, MutationKind, Support};
pub use evaluator::{FitnessFunction, Jitter, PacketCount};
pub use flow::Flow;
pub use genome::Genome;
pub use packet::{Packet, Transport};
pub use translator::{Net, Side, Translator};

/// Keyword-style knobs a GA driver may pass to [`Evolvable::mutate`].
///
/// `pmut` is accepted for driver compatibility and deliberately ignored by
/// the default genome mutator, which applies exactly one mutation per call
/// regardless of the requested rate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MutateConfig {
    pub pmut: Option<Float>,
}

/// The contract an individual exposes to an external GA driver.
///
/// The driver itself (selection, termination, population statistics) lives
/// outside this crate; it only ever calls these four operations plus a
/// fitness function.
pub trait Evolvable: Sized {
    /// A fresh random individual.
    fn initialize(rng: &mut Rng) -> Self;

    /// Mutates the individual in place.
    fn mutate(&mut self, config: &MutateConfig, rng: &mut Rng);

    /// One-point recombination of `self` and `other` into two children.
    #[must_use]
    fn crossover(&self, other: &Self, rng: &mut Rng) -> (Self, Self);

    /// A deep copy that shares no mutable state with the original.
    #[must_use]
    fn replicate(&self) -> Self;
}
