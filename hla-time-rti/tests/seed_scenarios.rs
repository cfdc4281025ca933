//! Black-box scenarios exercising `TimeManagement` the way an embedder would: only through the
//! crate's public API, simulating peer-to-peer delivery by draining each federate's
//! `AmbassadorSink` and feeding the relevant protocol messages into the other federate by hand.

use hla_time_core::{FederateHandle, Int64Time, Int64TimeFactory, LogicalTimePair, ObjectInstanceHandle};
use hla_time_rti::{
    AdvanceMode, AmbassadorSink, CommitType, DispatchedCallback, OutboundMessage, RtiMsg,
    TimeManagement,
};

#[derive(Default)]
struct Recorder(Vec<OutboundMessage<Int64Time>>);

impl AmbassadorSink<Int64Time> for Recorder {
    fn send(&mut self, message: OutboundMessage<Int64Time>) {
        self.0.push(message);
    }
}

fn fed(n: u64) -> FederateHandle {
    FederateHandle::from(n as usize)
}

/// Hand a single outbound commit-bookkeeping message to the engine it was addressed to. Anything
/// else (handshake acks, synthetic callbacks) is dropped — this harness only routes the messages
/// the lower-bound-map gossip protocol actually needs to converge.
fn deliver<M>(to: &mut TimeManagement<Int64TimeFactory, M>, message: OutboundMessage<Int64Time>, to_sink: &mut Recorder) {
    match message {
        OutboundMessage::Protocol(RtiMsg::CommitLowerBoundTimeStamp {
            federate,
            pair,
            commit_type,
            commit_id,
        }) => {
            to.accept_commit_lower_bound_timestamp(federate, pair.time, commit_type, commit_id, to_sink);
        }
        OutboundMessage::Protocol(RtiMsg::CommitLowerBoundTimeStampResponse { federate, commit_id }) => {
            to.accept_commit_lower_bound_timestamp_response(federate, commit_id, to_sink);
        }
        OutboundMessage::Protocol(RtiMsg::LockedByNextMessageRequest { federate, locked }) => {
            to.accept_locked_by_next_message_request(federate, locked, to_sink);
        }
        _ => {}
    }
}

/// Bounce every commit-bookkeeping message between `tm_a` and `tm_b` back and forth until neither
/// side has anything new to say. The next-message-mode deadlock-avoidance handshake takes more
/// than one round trip to converge (commit, then the commit-id ack, then the lock transition), so
/// a single pass of routing isn't enough once real peers are involved.
fn route_until_quiescent<M>(
    tm_a: &mut TimeManagement<Int64TimeFactory, M>,
    sink_a: &mut Recorder,
    tm_b: &mut TimeManagement<Int64TimeFactory, M>,
    sink_b: &mut Recorder,
) {
    loop {
        let from_a = std::mem::take(&mut sink_a.0);
        let from_b = std::mem::take(&mut sink_b.0);
        if from_a.is_empty() && from_b.is_empty() {
            return;
        }
        for message in from_a {
            deliver(tm_b, message, sink_b);
        }
        for message in from_b {
            deliver(tm_a, message, sink_a);
        }
    }
}

#[test]
fn solo_federate_requesting_an_advance_is_granted_exactly_once() {
    let mut tm = TimeManagement::<Int64TimeFactory, ()>::new(fed(0));
    let mut sink = Recorder::default();

    tm.time_advance_request(Int64Time(10), AdvanceMode::TimeAdvanceRequest, &mut sink)
        .unwrap();
    assert!(matches!(
        tm.dispatch_callback(&mut sink),
        Some(DispatchedCallback::AdvanceGranted(pair)) if pair.time == Int64Time(10)
    ));
    assert_eq!(tm.dispatch_callback(&mut sink), None, "no second grant");
    assert_eq!(tm.logical_time(), Int64Time(10));
}

#[test]
fn regulated_constrained_pair_delivers_a_message_before_the_grant() {
    let mut tm_a = TimeManagement::<Int64TimeFactory, &'static str>::new(fed(0));
    let mut tm_b = TimeManagement::<Int64TimeFactory, &'static str>::new(fed(1));
    let mut sink_a = Recorder::default();
    let mut sink_b = Recorder::default();

    tm_a.insert_peer(fed(1), 0, &mut sink_a);
    tm_b.insert_peer(fed(0), 0, &mut sink_b);

    tm_a.enable_time_regulation(5, &[fed(1)], &mut sink_a).unwrap();
    tm_b.enable_time_regulation(5, &[fed(0)], &mut sink_b).unwrap();
    // Peer acks are simulated directly rather than round-tripped through a transport.
    tm_a.accept_time_regulation_ack(fed(1), &mut sink_a);
    tm_b.accept_time_regulation_ack(fed(0), &mut sink_b);
    assert!(matches!(
        tm_a.dispatch_callback(&mut sink_a),
        Some(DispatchedCallback::RegulationEnabled(_))
    ));
    assert!(matches!(
        tm_b.dispatch_callback(&mut sink_b),
        Some(DispatchedCallback::RegulationEnabled(_))
    ));

    route_until_quiescent(&mut tm_a, &mut sink_a, &mut tm_b, &mut sink_b);

    tm_b.enable_time_constrained(&mut sink_b).unwrap();
    assert!(matches!(
        tm_b.dispatch_callback(&mut sink_b),
        Some(DispatchedCallback::ConstrainedEnabled(_))
    ));

    tm_b.queue_time_stamped_message(LogicalTimePair::new(Int64Time(5), 1), "payload", None, &mut sink_b)
        .unwrap();

    tm_a.time_advance_request(Int64Time(10), AdvanceMode::TimeAdvanceRequest, &mut sink_a)
        .unwrap();
    tm_b.time_advance_request(Int64Time(10), AdvanceMode::TimeAdvanceRequest, &mut sink_b)
        .unwrap();

    route_until_quiescent(&mut tm_a, &mut sink_a, &mut tm_b, &mut sink_b);

    assert!(tm_b.query_galt().unwrap() >= Int64Time(5));
    assert_eq!(
        tm_b.dispatch_callback(&mut sink_b),
        Some(DispatchedCallback::Message("payload")),
        "the payload committed at t=5 precedes the grant at t=10"
    );
    assert!(matches!(
        tm_b.dispatch_callback(&mut sink_b),
        Some(DispatchedCallback::AdvanceGranted(pair)) if pair.time == Int64Time(10)
    ));
}

#[test]
fn concurrent_next_message_requests_with_no_outstanding_messages_both_converge() {
    let mut tm_a = TimeManagement::<Int64TimeFactory, ()>::new(fed(0));
    let mut tm_b = TimeManagement::<Int64TimeFactory, ()>::new(fed(1));
    let mut sink_a = Recorder::default();
    let mut sink_b = Recorder::default();

    tm_a.insert_peer(fed(1), 0, &mut sink_a);
    tm_b.insert_peer(fed(0), 0, &mut sink_b);
    tm_a.enable_time_regulation(0, &[fed(1)], &mut sink_a).unwrap();
    tm_b.enable_time_regulation(0, &[fed(0)], &mut sink_b).unwrap();
    tm_a.accept_time_regulation_ack(fed(1), &mut sink_a);
    tm_b.accept_time_regulation_ack(fed(0), &mut sink_b);
    tm_a.dispatch_callback(&mut sink_a);
    tm_b.dispatch_callback(&mut sink_b);
    tm_a.enable_time_constrained(&mut sink_a).unwrap();
    tm_b.enable_time_constrained(&mut sink_b).unwrap();
    tm_a.dispatch_callback(&mut sink_a);
    tm_b.dispatch_callback(&mut sink_b);
    route_until_quiescent(&mut tm_a, &mut sink_a, &mut tm_b, &mut sink_b);

    tm_a.time_advance_request(Int64Time(100), AdvanceMode::NextMessageRequest, &mut sink_a)
        .unwrap();
    tm_b.time_advance_request(Int64Time(100), AdvanceMode::NextMessageRequest, &mut sink_b)
        .unwrap();
    assert_eq!(tm_a.dispatch_callback(&mut sink_a), None, "A hasn't heard from B yet");
    assert_eq!(tm_b.dispatch_callback(&mut sink_b), None, "B hasn't heard from A yet");

    route_until_quiescent(&mut tm_a, &mut sink_a, &mut tm_b, &mut sink_b);

    assert!(matches!(
        tm_a.dispatch_callback(&mut sink_a),
        Some(DispatchedCallback::AdvanceGranted(pair)) if pair.time == Int64Time(100)
    ));
    assert!(matches!(
        tm_b.dispatch_callback(&mut sink_b),
        Some(DispatchedCallback::AdvanceGranted(pair)) if pair.time == Int64Time(100)
    ));
}

#[test]
fn next_message_request_shrinks_to_an_earlier_arriving_message() {
    let mut tm_a = TimeManagement::<Int64TimeFactory, &'static str>::new(fed(0));
    let mut sink_a = Recorder::default();
    tm_a.insert_peer(fed(1), 0, &mut sink_a);

    tm_a.time_advance_request(Int64Time(100), AdvanceMode::NextMessageRequest, &mut sink_a)
        .unwrap();
    assert_eq!(tm_a.dispatch_callback(&mut sink_a), None, "federate 1 hasn't moved its bound yet");

    tm_a.queue_time_stamped_message(LogicalTimePair::new(Int64Time(30), 1), "early", None, &mut sink_a)
        .unwrap();
    assert_eq!(tm_a.dispatch_callback(&mut sink_a), None, "still waiting on federate 1");

    // Federate 1 only commits as far as the message's own time, not the original request of 100,
    // then completes the deadlock-avoidance handshake by converging on our commit round.
    tm_a.accept_commit_lower_bound_timestamp(fed(1), Int64Time(30), CommitType::NEXT_MESSAGE, 0, &mut sink_a);
    tm_a.accept_commit_lower_bound_timestamp_response(fed(1), (-16i64) as u64, &mut sink_a);
    tm_a.accept_locked_by_next_message_request(fed(1), true, &mut sink_a);

    assert_eq!(
        tm_a.dispatch_callback(&mut sink_a),
        Some(DispatchedCallback::Message("early")),
    );
    assert!(
        matches!(
            tm_a.dispatch_callback(&mut sink_a),
            Some(DispatchedCallback::AdvanceGranted(pair)) if pair.time == Int64Time(30)
        ),
        "the grant honors the pulled-back bound of 30, not the original request of 100"
    );
}

#[test]
fn flush_queue_drains_every_message_including_ones_past_the_requested_time() {
    let mut tm = TimeManagement::<Int64TimeFactory, &'static str>::new(fed(0));
    let mut sink = Recorder::default();

    tm.enable_time_constrained(&mut sink).unwrap();
    tm.dispatch_callback(&mut sink);

    tm.queue_time_stamped_message(LogicalTimePair::new(Int64Time(2), 1), "two", None, &mut sink)
        .unwrap();
    tm.queue_time_stamped_message(LogicalTimePair::new(Int64Time(4), 1), "four", None, &mut sink)
        .unwrap();
    tm.queue_time_stamped_message(LogicalTimePair::new(Int64Time(6), 1), "six", None, &mut sink)
        .unwrap();

    tm.time_advance_request(Int64Time(5), AdvanceMode::FlushQueue, &mut sink)
        .unwrap();

    assert_eq!(tm.dispatch_callback(&mut sink), Some(DispatchedCallback::Message("two")));
    assert_eq!(tm.dispatch_callback(&mut sink), Some(DispatchedCallback::Message("four")));
    assert_eq!(
        tm.dispatch_callback(&mut sink),
        Some(DispatchedCallback::Message("six")),
        "flush queue drains a message timestamped past the requested advance too"
    );
    assert!(matches!(
        tm.dispatch_callback(&mut sink),
        Some(DispatchedCallback::AdvanceGranted(_))
    ));
}

#[test]
fn erasing_an_object_instances_messages_leaves_other_objects_untouched() {
    let mut tm = TimeManagement::<Int64TimeFactory, &'static str>::new(fed(0));
    let mut sink = Recorder::default();
    let o = ObjectInstanceHandle::from(1usize);
    let q = ObjectInstanceHandle::from(2usize);

    tm.queue_time_stamped_message(LogicalTimePair::new(Int64Time(5), 1), "o5", Some(o), &mut sink)
        .unwrap();
    tm.queue_time_stamped_message(LogicalTimePair::new(Int64Time(7), 1), "o7", Some(o), &mut sink)
        .unwrap();
    tm.queue_time_stamped_message(LogicalTimePair::new(Int64Time(10), 1), "o10", Some(o), &mut sink)
        .unwrap();
    tm.queue_time_stamped_message(LogicalTimePair::new(Int64Time(6), 1), "q6", Some(q), &mut sink)
        .unwrap();

    assert_eq!(tm.erase_messages_for_object_instance(o), 3);

    tm.time_advance_request(Int64Time(10), AdvanceMode::FlushQueue, &mut sink)
        .unwrap();
    assert_eq!(tm.dispatch_callback(&mut sink), Some(DispatchedCallback::Message("q6")));
    assert!(matches!(
        tm.dispatch_callback(&mut sink),
        Some(DispatchedCallback::AdvanceGranted(_))
    ));
    assert_eq!(tm.dispatch_callback(&mut sink), None);
}
