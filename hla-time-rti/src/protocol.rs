//! Message and handshake types exchanged between a federate's [`TimeManagement`] engine and its
//! peers.
//!
//! Framing and transport are explicitly out of scope (see the crate's non-goals): this module
//! only defines the logical payloads an [`AmbassadorSink`](crate::AmbassadorSink) hands off to,
//! or receives from, whatever transport an embedder wires up.

use hla_time_core::{FederateHandle, LogicalTimePair, ObjectInstanceHandle};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::lower_bound_map::CommitType;

/// Handshake identity a federate presents when joining a federation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FedIds {
    pub federate_handle: FederateHandle,
    pub federation_id: String,
}

/// Reasons an RTI may refuse a federate's join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RejectReason {
    FederationIdDoesNotMatch,
    FederateHandleOutOfRange,
    FederateHandleInUse,
    WrongServer,
    UnexpectedMessage,
}

/// A federate's upstream/downstream peers, sized by the deadlock-detection neighbor set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeighborStructure {
    pub upstream: Vec<FederateHandle>,
    pub downstream: Vec<FederateHandle>,
}

/// Whether clock synchronization is in use for this federate.
///
/// Out of scope for time management itself; carried only as a handshake field so an embedder's
/// transport can negotiate it independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClockSyncStat {
    Off,
    On { udp_port: u16 },
}

/// An application payload addressed to a specific federate and, optionally, object instance.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    pub dest_federate: FederateHandle,
    pub object_instance: Option<ObjectInstanceHandle>,
    pub payload: Vec<u8>,
}

/// Logical-time protocol messages exchanged with peers.
///
/// `T` is the federation's [`LogicalTimeValue`](hla_time_core::LogicalTimeValue). This enum
/// models the logical shape of the protocol; encoding `T` for an actual transport is left to the
/// embedder via `LogicalTimeValue::encode`/`decode`.
#[derive(Debug, Clone)]
pub enum RtiMsg<T> {
    FedIds(FedIds),
    Ack,
    Reject(RejectReason),
    NeighborStructure(NeighborStructure),
    ClockSync(ClockSyncStat),

    EnableTimeRegulationRequest {
        federate: FederateHandle,
        pair: LogicalTimePair<T>,
        commit_id: u64,
    },
    EnableTimeRegulationResponse {
        federate: FederateHandle,
        pair: LogicalTimePair<T>,
        /// Whether `pair` is the proposer's own requested time, or a stricter time the
        /// responder corrected it to because it was already regulating or constrained past it.
        valid: bool,
    },
    DisableTimeRegulationRequest {
        federate: FederateHandle,
    },

    CommitLowerBoundTimeStamp {
        federate: FederateHandle,
        pair: LogicalTimePair<T>,
        commit_type: CommitType,
        commit_id: u64,
    },
    CommitLowerBoundTimeStampResponse {
        federate: FederateHandle,
        commit_id: u64,
    },
    LockedByNextMessageRequest {
        federate: FederateHandle,
        locked: bool,
    },

    TimeAdvanceGrant(LogicalTimePair<T>),
    ProvisionalTimeAdvanceGrant(LogicalTimePair<T>),

    TaggedMessage {
        tag: LogicalTimePair<T>,
        message: Message,
    },
    PortAbsent {
        federate: FederateHandle,
        port: u64,
        tag: LogicalTimePair<T>,
    },

    StopRequest {
        tag: LogicalTimePair<T>,
    },
    StopGranted {
        tag: LogicalTimePair<T>,
    },
}
