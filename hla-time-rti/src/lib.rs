//! Distributed time-management core for an HLA-style federation.
//!
//! This crate implements the federate-local pieces of HLA time management: the
//! [`FederateLowerBoundMap`] used to compute GALT and next-message-GALT, the
//! [`TimeManagement`] engine that drives the regulation/constrained/advance state machine on
//! top of it, the pooled [`MessageQueue`] it dispatches callbacks from, and the
//! [`AmbassadorSink`] port an embedder implements to actually move messages between federates.
//! Wire framing and transport are out of scope; see [`protocol`] for the message shapes a real
//! transport would carry.

pub mod ambassador;
pub mod config;
pub mod error;
pub mod lower_bound_map;
pub mod message_queue;
pub mod negotiation;
pub mod protocol;
pub mod time_management;

pub use ambassador::{AmbassadorSink, ChannelSink, NoopSink, OutboundMessage};
pub use config::RtiConfig;
pub use error::TimeManagementError;
pub use lower_bound_map::{CommitType, FederateLowerBoundMap};
pub use message_queue::{MessageKey, MessageQueue};
pub use protocol::{ClockSyncStat, FedIds, Message, NeighborStructure, RejectReason, RtiMsg};
pub use time_management::{
    AdvanceMode, AsyncDelivery, ConstrainedMode, DispatchedCallback, RegulationMode, TimeManagement,
};

pub use hla_time_core::{
    FederateHandle, Float64Time, Float64TimeFactory, Int64Time, Int64TimeFactory,
    LogicalTimeFactory, LogicalTimePair, LogicalTimeValue, ObjectInstanceHandle, TimeError,
};
