//! The [`AmbassadorSink`] port: the interface a [`TimeManagement`](crate::TimeManagement) engine
//! uses to hand outbound protocol messages and synthetic time-advance callbacks to whatever
//! federate-side transport is wired up. The engine never touches a socket directly.

use hla_time_core::{LogicalTimePair, LogicalTimeValue};
use tokio::sync::mpsc;

use crate::protocol::RtiMsg;

/// Messages the engine has decided to hand off to the ambassador/transport layer.
#[derive(Debug, Clone)]
pub enum OutboundMessage<T> {
    /// A wire-level protocol message addressed to a peer.
    Protocol(RtiMsg<T>),
    /// Synthetic callback: time regulation finished enabling at this tagged time.
    TimeRegulationEnabled(LogicalTimePair<T>),
    /// Synthetic callback: time constrained finished enabling at this tagged time.
    TimeConstrainedEnabled(LogicalTimePair<T>),
    /// Synthetic callback: a pending time advance request was granted.
    TimeAdvanceGranted(LogicalTimePair<T>),
}

/// Port a [`TimeManagement`](crate::TimeManagement) engine sends outbound events through.
///
/// Implementations decide how, or whether, to actually deliver an `OutboundMessage` to peers;
/// they are never required to block the engine.
pub trait AmbassadorSink<T: LogicalTimeValue> {
    fn send(&mut self, message: OutboundMessage<T>);
}

/// An [`AmbassadorSink`] that discards everything. Useful in tests that only assert on the
/// engine's own state.
#[derive(Debug, Default)]
pub struct NoopSink;

impl<T: LogicalTimeValue> AmbassadorSink<T> for NoopSink {
    fn send(&mut self, _message: OutboundMessage<T>) {}
}

/// An [`AmbassadorSink`] backed by an unbounded channel, for wiring the engine up to a real (or
/// simulated) transport task.
#[derive(Debug, Clone)]
pub struct ChannelSink<T> {
    sender: mpsc::UnboundedSender<OutboundMessage<T>>,
}

impl<T> ChannelSink<T> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage<T>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl<T: LogicalTimeValue> AmbassadorSink<T> for ChannelSink<T> {
    fn send(&mut self, message: OutboundMessage<T>) {
        // The receiving end may have been dropped, e.g. in a test that only checks engine
        // state; losing an outbound message in that case is not a time-management error.
        let _ = self.sender.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hla_time_core::Int64Time;

    #[test]
    fn noop_sink_accepts_everything() {
        let mut sink = NoopSink;
        sink.send(OutboundMessage::TimeAdvanceGranted(LogicalTimePair::new(
            Int64Time(1),
            1,
        )));
    }

    #[tokio::test]
    async fn channel_sink_forwards_messages() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.send(OutboundMessage::TimeAdvanceGranted(LogicalTimePair::new(
            Int64Time(5),
            1,
        )));
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, OutboundMessage::TimeAdvanceGranted(p) if p.time == Int64Time(5)));
    }
}
