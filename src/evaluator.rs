//! Fitness functions over generated workloads.

use crate::{
    genome::Genome,
    quantities::{Float, Time},
    util::{
        logging::{Logger, NothingLogger},
        rand::Rng,
    },
};

/// Scores a genome for the external GA driver; higher is fitter.
pub trait FitnessFunction {
    fn score(&mut self, genome: &Genome, rng: &mut Rng) -> Float;
}

/// The reference fitness: how many packets does the workload emit?
///
/// A genome whose topology cannot be addressed scores 0 rather than aborting
/// the surrounding GA run.
#[derive(Debug)]
pub struct PacketCount<L = NothingLogger> {
    t0: Time,
    logger: L,
}

impl PacketCount {
    #[must_use]
    pub const fn new() -> PacketCount<NothingLogger> {
        PacketCount {
            t0: Time::start(),
            logger: NothingLogger::new(),
        }
    }
}

impl Default for PacketCount {
    fn default() -> Self {
        PacketCount::new()
    }
}

impl<L: Logger> PacketCount<L> {
    pub const fn with_logger(t0: Time, logger: L) -> PacketCount<L> {
        PacketCount { t0, logger }
    }
}

impl<L: Logger> FitnessFunction for PacketCount<L> {
    fn score(&mut self, genome: &Genome, rng: &mut Rng) -> Float {
        match genome.generate(self.t0, rng) {
            Ok(packets) => {
                if let Some(last) = packets.last() {
                    log!(
                        self.logger,
                        "workload emitted {} packets over {}",
                        packets.len(),
                        last.time - self.t0
                    );
                }
                #[allow(clippy::cast_precision_loss)]
                {
                    packets.len() as Float
                }
            }
            Err(error) => {
                log!(self.logger, "workload is unaddressable ({error}), scoring 0");
                0.
            }
        }
    }
}

/// Scores the spread of the workload's inter-arrival gaps: the standard
/// deviation, in seconds, of the deltas between consecutive packets of the
/// merged sequence. Fewer than three packets (and unaddressable genomes)
/// score 0.
#[derive(Debug)]
pub struct Jitter {
    t0: Time,
}

impl Jitter {
    #[must_use]
    pub const fn new(t0: Time) -> Jitter {
        Jitter { t0 }
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Jitter::new(Time::start())
    }
}

impl FitnessFunction for Jitter {
    fn score(&mut self, genome: &Genome, rng: &mut Rng) -> Float {
        let Ok(packets) = genome.generate(self.t0, rng) else {
            return 0.;
        };
        let gaps: Vec<Float> = packets
            .windows(2)
            .map(|pair| (pair[1].time - pair[0].time).seconds())
            .collect();
        if gaps.len() < 2 {
            return 0.;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = gaps.len() as Float;
        let mean = gaps.iter().sum::<Float>() / count;
        let variance = gaps.iter().map(|gap| (gap - mean).powi(2)).sum::<Float>() / count;
        variance.sqrt()
    }
}
