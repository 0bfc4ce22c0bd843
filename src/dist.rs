//! The evolvable empirical distributions behind every workload parameter.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{quantities::Float, util::rand::Rng};

/// Whether a distribution ranges over whole numbers or over a continuum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Support {
    Integer,
    Real,
}

/// An inclusive value range `[lo, hi]` with a sampling type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub support: Support,
    pub lo: Float,
    pub hi: Float,
}

impl Domain {
    /// Seconds between consecutive packets of a half-flow.
    pub const INTER_PACKET_GAP: Domain = Domain::real(0., 0.1);
    /// L5 payload length, in bytes.
    pub const PAYLOAD_LEN: Domain = Domain::integer(100., 1300.);
    /// IP time-to-live.
    pub const TTL: Domain = Domain::integer(0., 100.);
    /// Seconds a flow keeps emitting.
    pub const FLOW_DURATION: Domain = Domain::real(0., 100.);
    /// How many flows a workload spawns.
    pub const FLOW_COUNT: Domain = Domain::integer(0., 1_000_000.);
    /// Which half-flow the next packet belongs to.
    pub const DIRECTION: Domain = Domain::integer(0., 1.);

    #[must_use]
    pub const fn integer(lo: Float, hi: Float) -> Domain {
        Domain {
            support: Support::Integer,
            lo,
            hi,
        }
    }

    #[must_use]
    pub const fn real(lo: Float, hi: Float) -> Domain {
        Domain {
            support: Support::Real,
            lo,
            hi,
        }
    }

    /// The measure of the range under uniform resampling: one more than the
    /// interval length for integer support, which counts both endpoints.
    #[must_use]
    pub fn width(&self) -> Float {
        match self.support {
            Support::Integer => self.hi - self.lo + 1.,
            Support::Real => self.hi - self.lo,
        }
    }

    #[must_use]
    pub fn contains(&self, v: Float) -> bool {
        self.lo <= v && v <= self.hi
    }

    /// Truncates `v` to a representable value of the support.
    #[must_use]
    pub fn coerce(&self, v: Float) -> Float {
        match self.support {
            Support::Integer => v.trunc(),
            Support::Real => v,
        }
    }

    /// `lo + U[0, 1) · width`, coerced to the support.
    pub fn draw(&self, rng: &mut Rng) -> Float {
        self.coerce(self.lo + rng.unit() * self.width())
    }
}

/// One step of the transposed CDF: cumulative probability `p` selects `v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub p: Float,
    pub v: Float,
}

#[derive(Debug, thiserror::Error)]
pub enum DistError {
    /// A distribution with no points can neither be loaded nor sampled.
    #[error("a distribution needs at least one point")]
    EmptyDistribution,
    #[error("point ({p}, {v}) lies outside [0, 1] x [{lo}, {hi}]")]
    InvalidDomain {
        p: Float,
        v: Float,
        lo: Float,
        hi: Float,
    },
}

/// The closed set of point mutations the GA can apply to a [`Cdf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Value(usize),
    Probability(usize),
    AddPoint,
    RemovePoint(usize),
}

impl MutationKind {
    /// A uniform choice over the applicable mutations; removal is off the
    /// menu while only one point remains.
    #[must_use]
    pub fn choose(len: usize, rng: &mut Rng) -> MutationKind {
        let i = rng.index(len);
        match rng.index(if len > 1 { 4 } else { 3 }) {
            0 => MutationKind::Value(i),
            1 => MutationKind::Probability(i),
            2 => MutationKind::AddPoint,
            _ => MutationKind::RemovePoint(i),
        }
    }
}

/// An empirical piecewise CDF over a typed domain.
///
/// Every evolvable workload parameter is one of these: sampled by inverse
/// lookup, reshaped point by point under the GA's mutations. The points are
/// kept sorted by cumulative probability and the last probability is pinned
/// to exactly 1, so sampling always terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cdf {
    domain: Domain,
    points: Vec<Point>,
}

impl Cdf {
    pub fn new(domain: Domain, points: &[(Float, Float)]) -> Result<Cdf, DistError> {
        let mut cdf = Cdf {
            domain,
            points: Vec::new(),
        };
        cdf.load(points)?;
        Ok(cdf)
    }

    /// A fresh distribution of 1-10 random points over `domain`.
    #[must_use]
    pub fn random(domain: Domain, rng: &mut Rng) -> Cdf {
        let count = 1 + rng.index(10);
        let points = (0..count)
            .map(|_| (rng.unit() * 0.99, domain.draw(rng)))
            .collect_vec();
        Cdf::new(domain, &points).expect("freshly drawn points lie inside the domain")
    }

    /// Replaces the points wholesale.
    ///
    /// Validates every `(p, v)` pair against `[0, 1] x [lo, hi]`, coerces
    /// values to the support, drops all but the first point sharing a
    /// probability, sorts ascending, and pins the last probability to 1.
    pub fn load(&mut self, points: &[(Float, Float)]) -> Result<(), DistError> {
        if points.is_empty() {
            return Err(DistError::EmptyDistribution);
        }
        let mut fresh: Vec<Point> = Vec::with_capacity(points.len());
        for &(p, v) in points {
            if !(0. ..=1.).contains(&p) || !self.domain.contains(v) {
                return Err(DistError::InvalidDomain {
                    p,
                    v,
                    lo: self.domain.lo,
                    hi: self.domain.hi,
                });
            }
            if fresh.iter().all(|q| q.p != p) {
                fresh.push(Point {
                    p,
                    v: self.domain.coerce(v),
                });
            }
        }
        fresh.sort_by(|a, b| a.p.total_cmp(&b.p));
        fresh
            .last_mut()
            .expect("at least one point survives deduplication")
            .p = 1.0;
        self.points = fresh;
        Ok(())
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The domain-relative view: values rescaled so that `lo` maps to 0 and
    /// `hi` to the top of the unit interval.
    pub fn normalized_points(&self) -> impl Iterator<Item = Point> + '_ {
        let lo = self.domain.lo;
        let width = self.domain.width();
        self.points.iter().map(move |point| Point {
            p: point.p,
            v: (point.v - lo) / width,
        })
    }

    /// Inverse-CDF sampling: the first point whose cumulative probability
    /// reaches a fresh `U[0, 1)` draw.
    pub fn sample(&self, rng: &mut Rng) -> Float {
        let r = rng.unit();
        let point = self
            .points
            .iter()
            .find(|point| r <= point.p)
            .expect("the last point's probability is pinned to 1");
        assert!(
            self.domain.contains(point.v),
            "sampled {} outside [{}, {}]",
            point.v,
            self.domain.lo,
            self.domain.hi
        );
        point.v
    }

    /// [`sample`](Cdf::sample) truncated to an unsigned integer, for the
    /// integer-support roles.
    pub fn sample_int(&self, rng: &mut Rng) -> u64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.sample(rng) as u64
        }
    }

    /// Applies one uniformly chosen mutation.
    pub fn mutate(&mut self, rng: &mut Rng) {
        self.apply(MutationKind::choose(self.points.len(), rng), rng);
    }

    /// Restricted variant: only resamples a value.
    pub fn mutate_value(&mut self, rng: &mut Rng) {
        let i = rng.index(self.points.len());
        self.apply(MutationKind::Value(i), rng);
    }

    /// Restricted variant: only reshapes a probability.
    pub fn mutate_probability(&mut self, rng: &mut Rng) {
        let i = rng.index(self.points.len());
        self.apply(MutationKind::Probability(i), rng);
    }

    /// Applies a specific mutation.
    pub fn apply(&mut self, kind: MutationKind, rng: &mut Rng) {
        match kind {
            MutationKind::Value(i) => self.points[i].v = self.domain.draw(rng),
            MutationKind::Probability(i) => {
                self.points[i].p = rng.unit() * 0.99;
                self.points.sort_by(|a, b| a.p.total_cmp(&b.p));
                self.points.last_mut().expect("never empty").p = 1.0;
            }
            MutationKind::AddPoint => {
                self.points.push(Point {
                    p: rng.unit() * 0.99,
                    v: self.domain.draw(rng),
                });
                // fresh probabilities stay below 0.99, so the pinned point
                // keeps the last slot
                self.points.sort_by(|a, b| a.p.total_cmp(&b.p));
            }
            MutationKind::RemovePoint(i) => {
                if self.points.len() > 1 {
                    self.points.remove(i);
                    self.points.last_mut().expect("never empty").p = 1.0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Cdf, DistError, Domain, MutationKind, Point};
    use crate::util::rand::Rng;

    fn assert_well_formed(cdf: &Cdf) {
        let points = cdf.points();
        assert!(!points.is_empty());
        assert_eq!(points.last().unwrap().p, 1.0);
        for pair in points.windows(2) {
            assert!(pair[0].p <= pair[1].p);
        }
        for point in points {
            assert!((0. ..=1.).contains(&point.p));
            assert!(cdf.domain().contains(point.v));
        }
    }

    #[test]
    fn load_sorts_and_pins_the_last_probability() {
        let cdf = Cdf::new(Domain::integer(10., 109.), &[(0.5, 42.), (0.2, 10.)]).unwrap();
        assert_eq!(
            cdf.points(),
            &[Point { p: 0.2, v: 10. }, Point { p: 1.0, v: 42. }]
        );
    }

    #[test]
    fn load_keeps_the_first_of_duplicate_probabilities() {
        let cdf = Cdf::new(
            Domain::real(10., 20.),
            &[(0.2, 19.), (0.2, 18.), (0.5, 10.), (1.0, 14.)],
        )
        .unwrap();
        let normalized: Vec<_> = cdf.normalized_points().collect();
        let expected = [(0.2, 0.9), (0.5, 0.0), (1.0, 0.4)];
        assert_eq!(normalized.len(), expected.len());
        for (got, want) in normalized.iter().zip(expected) {
            assert_eq!(got.p, want.0);
            assert!((got.v - want.1).abs() < 1e-12);
        }
    }

    #[test]
    fn integer_width_counts_both_endpoints() {
        let cdf = Cdf::new(
            Domain::integer(10., 19.),
            &[(0.2, 19.), (0.5, 10.), (1.0, 14.)],
        )
        .unwrap();
        let normalized: Vec<_> = cdf.normalized_points().map(|point| point.v).collect();
        for (got, want) in normalized.iter().zip([0.9, 0.0, 0.4]) {
            assert!((got - want).abs() < 1e-12);
        }

        let cdf = Cdf::new(
            Domain::real(10., 19.),
            &[(0.2, 19.), (0.5, 10.), (1.0, 14.)],
        )
        .unwrap();
        let normalized: Vec<_> = cdf.normalized_points().map(|point| point.v).collect();
        for (got, want) in normalized.iter().zip([1.0, 0.0, 4. / 9.]) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn load_coerces_integer_values() {
        let cdf = Cdf::new(Domain::integer(1., 100.), &[(1.0, 42.7)]).unwrap();
        assert_eq!(cdf.points(), &[Point { p: 1.0, v: 42. }]);
    }

    #[test]
    fn out_of_domain_points_are_rejected() {
        assert!(matches!(
            Cdf::new(Domain::integer(10., 109.), &[(0.5, 10.), (0.2, 110.)]),
            Err(DistError::InvalidDomain { .. })
        ));
        assert!(matches!(
            Cdf::new(Domain::integer(10., 109.), &[(1.5, 10.)]),
            Err(DistError::InvalidDomain { .. })
        ));
        assert!(matches!(
            Cdf::new(Domain::integer(10., 109.), &[]),
            Err(DistError::EmptyDistribution)
        ));
    }

    #[test]
    fn samples_never_leave_the_domain() {
        let mut rng = Rng::from_seed(99);
        for domain in [
            Domain::INTER_PACKET_GAP,
            Domain::PAYLOAD_LEN,
            Domain::TTL,
            Domain::FLOW_DURATION,
            Domain::FLOW_COUNT,
            Domain::DIRECTION,
        ] {
            let cdf = Cdf::random(domain, &mut rng);
            assert_well_formed(&cdf);
            for _ in 0..10_000 {
                assert!(domain.contains(cdf.sample(&mut rng)));
            }
        }
    }

    #[test]
    fn sampling_tracks_the_empirical_ratio() {
        let cdf = Cdf::new(Domain::integer(1., 100.), &[(0.2, 42.), (1.0, 9.)]).unwrap();
        let mut rng = Rng::from_seed(42);
        let mut hits_42 = 0_u32;
        let mut hits_9 = 0_u32;
        for _ in 0..10_000 {
            #[allow(clippy::cast_possible_truncation)]
            match cdf.sample(&mut rng) as i64 {
                42 => hits_42 += 1,
                9 => hits_9 += 1,
                other => panic!("sampled {other}, which is not a point of the distribution"),
            }
        }
        let ratio = f64::from(hits_42) / f64::from(hits_9);
        assert!((0.23..0.27).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn mutation_changes_the_points_eventually() {
        let initial = Cdf::new(Domain::integer(1., 100.), &[(0.2, 42.), (1.0, 9.)]).unwrap();
        let mut cdf = initial.clone();
        let mut rng = Rng::from_seed(7);
        let mut changed = false;
        for _ in 0..100 {
            cdf.mutate(&mut rng);
            assert_well_formed(&cdf);
            changed |= cdf.points() != initial.points();
        }
        assert!(changed);
    }

    #[test]
    fn probability_mutation_restores_the_pin() {
        let mut cdf = Cdf::new(
            Domain::integer(10., 109.),
            &[(0.2, 42.), (0.5, 10.), (1.0, 13.)],
        )
        .unwrap();
        let mut rng = Rng::from_seed(3);
        for _ in 0..50 {
            cdf.mutate_probability(&mut rng);
            assert_well_formed(&cdf);
        }
        for _ in 0..50 {
            cdf.mutate_value(&mut rng);
            assert_well_formed(&cdf);
            assert_eq!(cdf.points().len(), 3);
        }
    }

    #[test]
    fn removal_is_refused_for_a_singleton() {
        let mut cdf = Cdf::new(Domain::DIRECTION, &[(1.0, 1.)]).unwrap();
        let mut rng = Rng::from_seed(0);
        cdf.apply(MutationKind::RemovePoint(0), &mut rng);
        assert_eq!(cdf.points().len(), 1);
        assert_well_formed(&cdf);
    }

    #[test]
    fn adding_and_removing_points_preserves_the_pin() {
        let mut cdf = Cdf::new(Domain::PAYLOAD_LEN, &[(1.0, 100.)]).unwrap();
        let mut rng = Rng::from_seed(11);
        for _ in 0..20 {
            cdf.apply(MutationKind::AddPoint, &mut rng);
            assert_well_formed(&cdf);
        }
        while cdf.points().len() > 1 {
            let i = rng.index(cdf.points().len());
            cdf.apply(MutationKind::RemovePoint(i), &mut rng);
            assert_well_formed(&cdf);
        }
    }

    #[test]
    fn clones_do_not_alias() {
        let original = Cdf::new(Domain::integer(1., 100.), &[(0.2, 42.), (1.0, 9.)]).unwrap();
        let reference = original.clone();
        let mut clone = original.clone();
        let mut rng = Rng::from_seed(5);
        for _ in 0..100 {
            clone.mutate(&mut rng);
        }
        assert_eq!(original, reference);
    }

    #[test]
    fn reloading_reported_points_is_an_identity() {
        let mut rng = Rng::from_seed(21);
        let mut cdf = Cdf::random(Domain::FLOW_COUNT, &mut rng);
        let reported: Vec<_> = cdf.points().iter().map(|point| (point.p, point.v)).collect();
        let before = cdf.clone();
        cdf.load(&reported).unwrap();
        assert_eq!(cdf, before);
    }
}
