//! Core logical-time value types and the federate/object-instance handle types shared across
//! an HLA-style federation's time-management stack.

pub mod error;
pub mod keys;
pub mod time;

pub use error::TimeError;
pub use keys::{FederateHandle, ObjectInstanceHandle};
pub use time::{
    Float64Time, Float64TimeFactory, Int64Time, Int64TimeFactory, LogicalTimeFactory,
    LogicalTimePair, LogicalTimeValue,
};
