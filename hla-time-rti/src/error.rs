use thiserror::Error;

use crate::protocol::RejectReason;

/// Errors a [`TimeManagement`](crate::TimeManagement) engine's entry points can return.
///
/// These are contract violations a caller can reasonably trigger (an out-of-order advance
/// request, a message queued for a time already passed); true internal-invariant breaks stay
/// `debug_assert!`/`unreachable!` inside the engine rather than surfacing here.
#[derive(Debug, Error)]
pub enum TimeManagementError {
    #[error("time advance request of {requested} regresses past the last granted time {granted}")]
    TimeRegressed { requested: String, granted: String },

    #[error("a time advance request is already pending for this federate")]
    AdvancePending,

    #[error("time regulation can only be enabled from the disabled state")]
    InvalidRegulationTransition,

    #[error("time constrained can only be enabled from the disabled state")]
    InvalidConstrainedTransition,

    #[error("message queued for a time already passed")]
    TimeAlreadyPassed,

    #[error("the RTI rejected the federate: {0:?}")]
    Rejected(RejectReason),

    #[error(transparent)]
    Time(#[from] hla_time_core::TimeError),
}
