use std::{
    fmt::Display,
    ops::{Add, Sub},
};

use format_num::format_num;
use serde::{Deserialize, Serialize};

pub type Float = f64;

/// A length of workload time, in seconds.
#[derive(PartialEq, PartialOrd, Clone, Copy, Serialize, Deserialize, Debug)]
pub struct TimeSpan(Float);

impl TimeSpan {
    pub const ZERO: TimeSpan = TimeSpan(0.);

    #[must_use]
    pub const fn seconds(self) -> Float {
        self.0
    }
}

impl Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", format_num!(".3s", self.0))
    }
}

#[must_use]
pub const fn seconds(value: Float) -> TimeSpan {
    TimeSpan(value)
}

impl Add for TimeSpan {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        TimeSpan(self.0 + rhs.0)
    }
}

/// An instant on a generated workload's clock.
#[derive(PartialEq, Clone, Copy, Serialize, Deserialize, Debug)]
pub struct Time(Float);

impl Time {
    #[must_use]
    pub const fn from_start(t: Float) -> Time {
        Time(t)
    }

    #[must_use]
    pub const fn start() -> Time {
        Time::from_start(0.)
    }

    #[must_use]
    pub const fn seconds(self) -> Float {
        self.0
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Sub<Time> for Time {
    type Output = TimeSpan;

    fn sub(self, Time(t): Time) -> Self::Output {
        TimeSpan(self.0 - t)
    }
}

impl Add<TimeSpan> for Time {
    type Output = Time;

    fn add(self, rhs: TimeSpan) -> Self::Output {
        Time::from_start(self.0 + rhs.seconds())
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}t", self.0)
    }
}
