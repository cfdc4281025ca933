//! Logical time value types and the built-in HLA time factories.
//!
//! A [`LogicalTimeValue`] is a federation's notion of simulated time. It is always paired with
//! an integer `tag` (see [`LogicalTimePair`]) that orders zero-duration events occurring at the
//! same time value: a payload message, an "available to advance" marker, and a "time advance
//! complete" marker, in that order.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TimeError;

/// A federation's logical time representation: the `LogicalTime` of an HLA `LogicalTimeFactory`.
///
/// Implementations must be totally ordered, copyable, and able to round-trip through a byte
/// encoding so a lower bound can be carried across a federate boundary.
pub trait LogicalTimeValue: Ord + Copy + std::fmt::Debug + Send + Sync + 'static {
    /// The associated interval (duration) type, e.g. a federate's lookahead.
    type Interval: Ord + Copy + Default + std::fmt::Debug + Send + Sync + 'static;

    /// `self + interval`.
    fn add(&self, interval: Self::Interval) -> Self;
    /// `self - interval`.
    fn sub_interval(&self, interval: Self::Interval) -> Self;
    /// `self - other`, as an interval.
    fn sub(&self, other: Self) -> Self::Interval;
    /// The smallest representable time strictly greater than `self`.
    fn next_after(&self) -> Self;
    fn is_zero_interval(interval: Self::Interval) -> bool;
    fn is_positive_interval(interval: Self::Interval) -> bool;
    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<Self, TimeError>;
}

/// Supplies the initial time and zero interval for a [`LogicalTimeValue`] representation.
pub trait LogicalTimeFactory {
    type Time: LogicalTimeValue;

    fn initial_time() -> Self::Time;
    fn zero_interval() -> <Self::Time as LogicalTimeValue>::Interval;
}

/// A `(time, tag)` pair used to order zero-duration events at the same logical time.
///
/// `tag` follows the convention `-1` (a payload message), `0` (available to advance), `1`
/// (advance complete), so that for a fixed `time`, `(time, -1) < (time, 0) < (time, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogicalTimePair<T> {
    pub time: T,
    pub tag: i8,
}

impl<T> LogicalTimePair<T> {
    pub const fn new(time: T, tag: i8) -> Self {
        Self { time, tag }
    }
}

/// The builtin 64-bit integer logical time, as used by `HLAinteger64TimeFactory`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Int64Time(pub i64);

impl LogicalTimeValue for Int64Time {
    type Interval = i64;

    fn add(&self, interval: i64) -> Self {
        Int64Time(self.0 + interval)
    }

    fn sub_interval(&self, interval: i64) -> Self {
        Int64Time(self.0 - interval)
    }

    fn sub(&self, other: Self) -> i64 {
        self.0 - other.0
    }

    fn next_after(&self) -> Self {
        Int64Time(self.0 + 1)
    }

    fn is_zero_interval(interval: i64) -> bool {
        interval == 0
    }

    fn is_positive_interval(interval: i64) -> bool {
        interval > 0
    }

    fn encode(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        let slice = bytes.get(..8).ok_or(TimeError::ShortBuffer {
            got: bytes.len(),
            need: 8,
        })?;
        Ok(Int64Time(i64::from_be_bytes(slice.try_into().unwrap())))
    }
}

/// `LogicalTimeFactory` for [`Int64Time`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Int64TimeFactory;

impl LogicalTimeFactory for Int64TimeFactory {
    type Time = Int64Time;

    fn initial_time() -> Int64Time {
        Int64Time(0)
    }

    fn zero_interval() -> i64 {
        0
    }
}

/// The builtin float64 logical time, as used by `RTI1516Efloat64TimeFactory`.
#[derive(Debug, Default, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Float64Time(pub f64);

impl PartialEq for Float64Time {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Float64Time {}

impl PartialOrd for Float64Time {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Float64Time {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .expect("logical time must never be NaN")
    }
}
impl std::hash::Hash for Float64Time {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

impl LogicalTimeValue for Float64Time {
    type Interval = f64;

    fn add(&self, interval: f64) -> Self {
        Float64Time(self.0 + interval)
    }

    fn sub_interval(&self, interval: f64) -> Self {
        Float64Time(self.0 - interval)
    }

    fn sub(&self, other: Self) -> f64 {
        self.0 - other.0
    }

    fn next_after(&self) -> Self {
        Float64Time(next_up(self.0))
    }

    fn is_zero_interval(interval: f64) -> bool {
        interval == 0.0
    }

    fn is_positive_interval(interval: f64) -> bool {
        interval > 0.0
    }

    fn encode(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, TimeError> {
        let slice = bytes.get(..8).ok_or(TimeError::ShortBuffer {
            got: bytes.len(),
            need: 8,
        })?;
        Ok(Float64Time(f64::from_be_bytes(slice.try_into().unwrap())))
    }
}

/// `LogicalTimeFactory` for [`Float64Time`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Float64TimeFactory;

impl LogicalTimeFactory for Float64TimeFactory {
    type Time = Float64Time;

    fn initial_time() -> Float64Time {
        Float64Time(0.0)
    }

    fn zero_interval() -> f64 {
        0.0
    }
}

/// Equivalent to `std::nextafter(x, +inf)`, written out by hand rather than relying on a
/// recently-stabilized `f64::next_up` so this crate's MSRV isn't pinned to it.
fn next_up(x: f64) -> f64 {
    if x.is_nan() || x == f64::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f64::from_bits(1);
    }
    let bits = x.to_bits();
    let next_bits = if x > 0.0 { bits + 1 } else { bits - 1 };
    f64::from_bits(next_bits)
}
