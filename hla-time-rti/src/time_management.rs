//! The federate-local time-management engine: time regulation/constrained state, advance-mode
//! dispatch, and the message queues it drains callbacks from.
//!
//! Ported from OpenRTI's `TemplateTimeManagement`. The commit-id counter starts at `-17`,
//! matching the original's choice to exercise wraparound-adjacent values from the very first
//! commit rather than leaving it untested until a federation has been running a very long time.

use std::collections::HashSet;

use hla_time_core::{
    FederateHandle, LogicalTimeFactory, LogicalTimePair, LogicalTimeValue, ObjectInstanceHandle,
};
use tracing::{debug, instrument};

use crate::ambassador::{AmbassadorSink, OutboundMessage};
use crate::error::TimeManagementError;
use crate::lower_bound_map::{CommitType, FederateLowerBoundMap};
use crate::message_queue::MessageQueue;
use crate::protocol::RtiMsg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegulationMode {
    #[default]
    Disabled,
    EnablePending,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstrainedMode {
    #[default]
    Disabled,
    EnablePending,
    Enabled,
}

/// What kind of advance, if any, a federate is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvanceMode {
    /// No advance pending; the federate is sitting at its last granted time.
    #[default]
    Granted,
    /// `TimeAdvanceRequest`: advance to an exact time.
    TimeAdvanceRequest,
    /// `TimeAdvanceRequestAvailable`: advance to an exact time, granting early if no peer will
    /// ever produce an earlier message.
    TimeAdvanceRequestAvailable,
    /// `NextMessageRequest`: advance only as far as the next queued message, to avoid
    /// overshooting a message that hasn't arrived yet.
    NextMessageRequest,
    /// `NextMessageRequestAvailable`: the early-grant variant of `NextMessageRequest`.
    NextMessageRequestAvailable,
    /// Drain every queued message at the current time before granting.
    FlushQueue,
}

impl AdvanceMode {
    fn is_any_advance_request(self) -> bool {
        !matches!(self, AdvanceMode::Granted)
    }

    fn is_any_next_message_mode(self) -> bool {
        matches!(
            self,
            AdvanceMode::NextMessageRequest | AdvanceMode::NextMessageRequestAvailable
        )
    }

    fn is_flush_queue_mode(self) -> bool {
        matches!(self, AdvanceMode::FlushQueue)
    }

    fn is_available(self) -> bool {
        matches!(
            self,
            AdvanceMode::TimeAdvanceRequestAvailable | AdvanceMode::NextMessageRequestAvailable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsyncDelivery {
    #[default]
    Off,
    On,
}

/// The federate-local time-coordination engine.
///
/// `F` is the logical-time factory in use for the federation; `M` is the application message
/// payload type queued for dispatch.
pub struct TimeManagement<F: LogicalTimeFactory, M> {
    federate: FederateHandle,
    lower_bound_map: FederateLowerBoundMap<F::Time>,

    regulation: RegulationMode,
    constrained: ConstrainedMode,
    advance: AdvanceMode,
    async_delivery: AsyncDelivery,

    logical_time: F::Time,
    pending_logical_time: F::Time,

    current_lookahead: <F::Time as LogicalTimeValue>::Interval,
    target_lookahead: <F::Time as LogicalTimeValue>::Interval,

    outbound_lower_bound: F::Time,
    last_outbound_lower_bound: F::Time,
    committed_outbound_lower_bound: F::Time,
    committed_next_message_lower_bound: F::Time,

    commit_id: i64,
    time_regulation_enable_pending: HashSet<FederateHandle>,

    /// Set once an `AdvanceGranted` callback has been enqueued for the current advance, so a
    /// re-entrant readiness check (e.g. triggered by another peer's commit while the marker is
    /// still sitting in the queue) doesn't enqueue a second one.
    grant_queued: bool,

    /// The last `locked_by_next_message` value broadcast to peers this advance round, so
    /// [`Self::recompute_and_broadcast_lock`] only speaks up on an actual transition.
    locked_broadcast: Option<bool>,

    queue: MessageQueue<F::Time, Callback<M>>,

    stop_tag: Option<LogicalTimePair<F::Time>>,
}

/// Everything that can occupy a slot in the time-ordered dispatch queue: application payloads
/// and the three synthetic self-notifications, so a grant or an enable callback can never jump
/// ahead of an earlier-timestamped message that the application hasn't dispatched yet.
enum Callback<M> {
    Message(M),
    RegulationEnabled,
    ConstrainedEnabled,
    AdvanceGranted,
}

/// What [`TimeManagement::dispatch_callback`] handed back.
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchedCallback<T, M> {
    Message(M),
    RegulationEnabled(LogicalTimePair<T>),
    ConstrainedEnabled(LogicalTimePair<T>),
    AdvanceGranted(LogicalTimePair<T>),
}

impl<F: LogicalTimeFactory, M> TimeManagement<F, M> {
    pub fn new(federate: FederateHandle) -> Self {
        let initial = F::initial_time();
        let zero = F::zero_interval();

        Self {
            federate,
            lower_bound_map: FederateLowerBoundMap::new(),
            regulation: RegulationMode::default(),
            constrained: ConstrainedMode::default(),
            advance: AdvanceMode::default(),
            async_delivery: AsyncDelivery::default(),
            logical_time: initial,
            pending_logical_time: initial,
            current_lookahead: zero,
            target_lookahead: zero,
            outbound_lower_bound: initial,
            last_outbound_lower_bound: initial,
            committed_outbound_lower_bound: initial,
            committed_next_message_lower_bound: initial,
            commit_id: -17,
            time_regulation_enable_pending: HashSet::new(),
            grant_queued: false,
            locked_broadcast: None,
            queue: MessageQueue::new(),
            stop_tag: None,
        }
    }

    pub fn federate(&self) -> FederateHandle {
        self.federate
    }

    pub fn logical_time(&self) -> F::Time {
        self.logical_time
    }

    pub fn regulation_mode(&self) -> RegulationMode {
        self.regulation
    }

    pub fn constrained_mode(&self) -> ConstrainedMode {
        self.constrained
    }

    pub fn advance_mode(&self) -> AdvanceMode {
        self.advance
    }

    pub fn set_async_delivery(&mut self, async_delivery: AsyncDelivery) {
        self.async_delivery = async_delivery;
    }

    /// Register a peer federate so this engine's lower-bound map can account for it.
    ///
    /// `commit_id` is the peer's own commit id at the time it joined; this engine's current
    /// commit id minus one seeds the peer's `before_own_commit_id`, so an in-flight
    /// deadlock-detection round doesn't wait on the new peer forever.
    pub fn insert_peer(
        &mut self,
        federate: FederateHandle,
        commit_id: u64,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) {
        let initial = self.lower_bound_map.galt().unwrap_or(self.logical_time);
        let before_own_commit_id = self.commit_id.wrapping_sub(1) as u64;
        self.lower_bound_map
            .insert(federate, initial, initial, commit_id, before_own_commit_id);
        self.recompute_and_broadcast_lock(sink);
    }

    pub fn remove_peer(&mut self, federate: FederateHandle, sink: &mut impl AmbassadorSink<F::Time>) {
        self.lower_bound_map.erase(federate);
        self.recompute_and_broadcast_lock(sink);
    }

    // --- Regulation -----------------------------------------------------------------------

    #[instrument(skip(self, peers, sink))]
    pub fn enable_time_regulation(
        &mut self,
        lookahead: <F::Time as LogicalTimeValue>::Interval,
        peers: &[FederateHandle],
        sink: &mut impl AmbassadorSink<F::Time>,
    ) -> Result<(), TimeManagementError> {
        if self.regulation != RegulationMode::Disabled {
            return Err(TimeManagementError::InvalidRegulationTransition);
        }

        self.regulation = RegulationMode::EnablePending;
        self.target_lookahead = lookahead;
        self.current_lookahead = lookahead;
        self.pending_logical_time = self.pending_logical_time.max(self.logical_time);
        self.outbound_lower_bound = self.pending_logical_time.add(lookahead);

        self.time_regulation_enable_pending = peers.iter().copied().collect();
        self.time_regulation_enable_pending.insert(self.federate);

        for &peer in peers {
            sink.send(OutboundMessage::Protocol(RtiMsg::EnableTimeRegulationRequest {
                federate: self.federate,
                pair: LogicalTimePair::new(self.outbound_lower_bound, 0),
                commit_id: self.commit_id as u64,
            }));
        }

        self.accept_time_regulation_ack(self.federate, sink);
        Ok(())
    }

    /// Accept acknowledgement of a peer's (or our own) readiness to enable time regulation.
    pub fn accept_time_regulation_ack(
        &mut self,
        federate: FederateHandle,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) {
        self.time_regulation_enable_pending.remove(&federate);
        if self.regulation == RegulationMode::EnablePending
            && self.time_regulation_enable_pending.is_empty()
        {
            self.commit_lower_bound_if_changed(sink);
            self.queue.push_time_ordered(
                LogicalTimePair::new(self.pending_logical_time, 1),
                Callback::RegulationEnabled,
                None,
            );
        }
    }

    /// Accept a peer's `EnableTimeRegulationRequest`. A federate hearing its own broadcast
    /// looped back just needs to recheck its own pending enable; a genuine peer gets registered
    /// in the lower-bound map, with its proposed time corrected upward if it would otherwise
    /// undercut a regulation or constraint already pending on our side, per the original's
    /// looped-back-vs-peer split in `acceptInternalMessage(EnableTimeRegulationRequestMessage&)`.
    pub fn accept_enable_time_regulation_request(
        &mut self,
        federate: FederateHandle,
        pair: LogicalTimePair<F::Time>,
        commit_id: u64,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) {
        if federate == self.federate {
            self.accept_time_regulation_ack(self.federate, sink);
            return;
        }

        let (corrected, valid) = if self.regulation != RegulationMode::Disabled {
            if pair.tag > 0 {
                if pair.time <= self.pending_logical_time {
                    (LogicalTimePair::new(self.pending_logical_time.next_after(), pair.tag), false)
                } else {
                    (pair, true)
                }
            } else if pair.time < self.pending_logical_time {
                (LogicalTimePair::new(self.pending_logical_time, pair.tag), false)
            } else {
                (pair, true)
            }
        } else {
            (pair, true)
        };

        sink.send(OutboundMessage::Protocol(RtiMsg::EnableTimeRegulationResponse {
            federate: self.federate,
            pair: corrected,
            valid,
        }));

        let before_own_commit_id = self.commit_id.wrapping_sub(1) as u64;
        self.lower_bound_map
            .insert(federate, corrected.time, corrected.time, commit_id, before_own_commit_id);
        self.recompute_and_broadcast_lock(sink);
    }

    /// Accept a peer's `EnableTimeRegulationResponse`. If the peer had already committed past
    /// our own proposed bound, raise our outbound bound (and the pending logical time behind it)
    /// to match — the "late joiner must skip ahead" rule, so this federate can't regulate at a
    /// time a peer has already moved beyond.
    pub fn accept_enable_time_regulation_response(
        &mut self,
        federate: FederateHandle,
        pair: LogicalTimePair<F::Time>,
        valid: bool,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) {
        if valid && pair.time > self.outbound_lower_bound {
            self.outbound_lower_bound = pair.time;
            let raised = pair.time.sub_interval(self.current_lookahead);
            self.pending_logical_time = self.pending_logical_time.max(raised);
        }
        self.accept_time_regulation_ack(federate, sink);
    }

    pub fn disable_time_regulation(&mut self) {
        self.regulation = RegulationMode::Disabled;
    }

    // --- Constrained ------------------------------------------------------------------------

    /// Enqueues a synthetic `ConstrainedEnabled` callback rather than flipping `constrained`
    /// immediately, so it dispatches in order against any message already queued ahead of it.
    pub fn enable_time_constrained(
        &mut self,
        _sink: &mut impl AmbassadorSink<F::Time>,
    ) -> Result<(), TimeManagementError> {
        if self.constrained != ConstrainedMode::Disabled {
            return Err(TimeManagementError::InvalidConstrainedTransition);
        }
        self.constrained = ConstrainedMode::EnablePending;
        self.pending_logical_time = self.pending_logical_time.max(self.logical_time);
        self.queue.push_time_ordered(
            LogicalTimePair::new(self.pending_logical_time, 0),
            Callback::ConstrainedEnabled,
            None,
        );
        Ok(())
    }

    pub fn disable_time_constrained(&mut self) {
        self.constrained = ConstrainedMode::Disabled;
    }

    // --- Advance ------------------------------------------------------------------------

    #[instrument(skip(self, sink))]
    pub fn time_advance_request(
        &mut self,
        time: F::Time,
        mode: AdvanceMode,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) -> Result<(), TimeManagementError> {
        if self.advance.is_any_advance_request() {
            return Err(TimeManagementError::AdvancePending);
        }
        if time < self.logical_time {
            return Err(TimeManagementError::TimeRegressed {
                requested: format!("{time:?}"),
                granted: format!("{:?}", self.logical_time),
            });
        }

        self.advance = mode;
        self.pending_logical_time = time;
        self.grant_queued = false;
        self.locked_broadcast = None;

        let bound = if mode.is_any_next_message_mode() {
            self.queue
                .front_time()
                .map(|pair| pair.time)
                .map_or(time, |next| next.min(time))
        } else {
            time
        };
        self.set_outbound_lower_bound_and_lookahead(bound);
        self.commit_lower_bound_if_changed(sink);

        self.check_for_pending_time_advance(sink);
        if self.advance.is_flush_queue_mode() {
            self.check_for_pending_flush_queue(sink);
        }
        Ok(())
    }

    /// Mirrors `_setOutboundLowerTimeStampAndCurrentLookahead`: applying the target lookahead
    /// on top of `bound` must never regress the federate's previously-committed outbound lower
    /// bound, so the lookahead shrinks to zero rather than let that happen.
    fn set_outbound_lower_bound_and_lookahead(&mut self, bound: F::Time) {
        self.last_outbound_lower_bound = self.outbound_lower_bound;
        let candidate = bound.add(self.target_lookahead);
        if candidate < self.last_outbound_lower_bound {
            self.current_lookahead = F::zero_interval();
            self.outbound_lower_bound = self.last_outbound_lower_bound.max(bound);
        } else {
            self.current_lookahead = self.target_lookahead;
            self.outbound_lower_bound = candidate;
        }
    }

    /// Mirrors `_sendCommitLowerBoundTimeStampIfChanged`: never commit backward, skip committing
    /// bits that haven't actually changed, and bump the commit id only when the next-message
    /// bound itself diverges while in next-message mode.
    fn commit_lower_bound_if_changed(&mut self, sink: &mut impl AmbassadorSink<F::Time>) {
        if self.outbound_lower_bound < self.committed_outbound_lower_bound {
            return;
        }

        let next_message_mode = self.advance.is_any_next_message_mode();
        let next_message_time = if next_message_mode {
            self.outbound_lower_bound
        } else {
            self.committed_outbound_lower_bound
                .max(self.committed_next_message_lower_bound)
        };

        let time_advance_unchanged = self.outbound_lower_bound == self.committed_outbound_lower_bound;
        let next_message_unchanged = next_message_time == self.committed_next_message_lower_bound;
        if time_advance_unchanged && next_message_unchanged {
            return;
        }

        if next_message_mode && next_message_time != self.committed_next_message_lower_bound {
            self.commit_id = self.commit_id.wrapping_add(1);
        }

        self.committed_outbound_lower_bound = self.outbound_lower_bound;
        self.committed_next_message_lower_bound = next_message_time;

        // An ordinary commit carries both bounds in one round trip; only while in next-message
        // mode does a commit move the next-message bound alone, leaving time-advance behind.
        let commit_type = if next_message_mode {
            CommitType::NEXT_MESSAGE
        } else {
            CommitType::TIME_ADVANCE_AND_NEXT_MESSAGE
        };

        sink.send(OutboundMessage::Protocol(RtiMsg::CommitLowerBoundTimeStamp {
            federate: self.federate,
            pair: LogicalTimePair::new(self.outbound_lower_bound, if next_message_mode { 0 } else { 1 }),
            commit_type,
            commit_id: self.commit_id as u64,
        }));

        if next_message_mode {
            self.send_commit_lower_bound_timestamp_response(sink);
        }
    }

    fn send_commit_lower_bound_timestamp_response(&mut self, sink: &mut impl AmbassadorSink<F::Time>) {
        let commit_id = self.commit_id as u64;
        for federate in self.lower_bound_map.next_message_federate_handles() {
            sink.send(OutboundMessage::Protocol(
                RtiMsg::CommitLowerBoundTimeStampResponse { federate, commit_id },
            ));
        }
    }

    #[instrument(skip(self, sink))]
    fn check_for_pending_time_advance(&mut self, sink: &mut impl AmbassadorSink<F::Time>) {
        self.recompute_and_broadcast_lock(sink);

        if !self.advance.is_any_advance_request() || self.grant_queued {
            return;
        }

        let pending = LogicalTimePair::new(self.pending_logical_time, 0);
        let ready = if self.advance.is_any_next_message_mode() {
            self.lower_bound_map
                .is_safe_to_advance_to_next_message(self.commit_id as u64)
                && self.lower_bound_map.can_advance_to_next_message(pending)
        } else {
            self.lower_bound_map.can_advance_to(pending)
        };

        if !ready {
            let partial = if self.advance.is_any_next_message_mode() {
                self.lower_bound_map.next_message_galt()
            } else {
                self.lower_bound_map.galt()
            };
            if let Some(partial) = partial {
                debug!(?partial, "waiting for peers before granting advance");
            }
            return;
        }

        // Don't flip `advance`/`logical_time` yet: the grant is enqueued as a synthetic callback
        // so it dispatches in time order against any already-queued message at or before
        // `pending_logical_time`, never jumping ahead of one. `check_for_pending_time_advance`
        // may be re-entered (e.g. from another peer's commit) while the marker still sits in the
        // queue; `is_any_advance_request` stays true until it's actually popped, so a caller that
        // re-requests an advance before then is correctly rejected.
        let tag = if self.advance.is_available() { 0 } else { 1 };
        self.grant_queued = true;
        self.queue.push_time_ordered(
            LogicalTimePair::new(self.pending_logical_time, tag),
            Callback::AdvanceGranted,
            None,
        );
    }

    fn check_for_pending_flush_queue(&mut self, _sink: &mut impl AmbassadorSink<F::Time>) {
        if !self.advance.is_flush_queue_mode() || self.grant_queued {
            return;
        }
        if self.queue.front_time().is_some() || self.queue.has_receive_order() {
            return;
        }
        self.grant_queued = true;
        self.queue.push_time_ordered(
            LogicalTimePair::new(self.pending_logical_time, 1),
            Callback::AdvanceGranted,
            None,
        );
    }

    /// Mirrors `getLockedByNextMessage`: recompute whether every next-message-mode federate
    /// (ourselves included) has converged on the same commit round, and broadcast the transition
    /// to our next-message peers, but only on an actual edge — not on every recheck.
    fn recompute_and_broadcast_lock(&mut self, sink: &mut impl AmbassadorSink<F::Time>) {
        if !self.advance.is_any_next_message_mode() {
            return;
        }
        let locked = self.lower_bound_map.locked_by_next_message(self.commit_id as u64);
        if self.locked_broadcast == Some(locked) {
            return;
        }
        self.locked_broadcast = Some(locked);
        for federate in self.lower_bound_map.next_message_federate_handles() {
            sink.send(OutboundMessage::Protocol(RtiMsg::LockedByNextMessageRequest {
                federate: self.federate,
                locked,
            }));
        }
    }

    // --- Peer commit acceptance ------------------------------------------------------------

    #[instrument(skip(self, sink))]
    pub fn accept_commit_lower_bound_timestamp(
        &mut self,
        federate: FederateHandle,
        time: F::Time,
        commit_type: CommitType,
        commit_id: u64,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) {
        let (_, next_message_commit_id_changed) =
            self.lower_bound_map.commit(federate, time, commit_type, commit_id);
        if next_message_commit_id_changed {
            sink.send(OutboundMessage::Protocol(
                RtiMsg::CommitLowerBoundTimeStampResponse {
                    federate: self.federate,
                    commit_id,
                },
            ));
        }
        self.check_for_pending_time_advance(sink);
    }

    pub fn accept_commit_lower_bound_timestamp_response(
        &mut self,
        federate: FederateHandle,
        commit_id: u64,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) {
        self.lower_bound_map.set_federate_wait_commit_id(federate, commit_id);
        self.check_for_pending_time_advance(sink);
    }

    pub fn accept_locked_by_next_message_request(
        &mut self,
        federate: FederateHandle,
        locked: bool,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) {
        self.lower_bound_map.set_federate_locked_by_next_message(federate, locked);
        self.check_for_pending_time_advance(sink);
    }

    // --- Message queues ------------------------------------------------------------------

    pub fn queue_time_stamped_message(
        &mut self,
        pair: LogicalTimePair<F::Time>,
        message: M,
        object_instance: Option<ObjectInstanceHandle>,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) -> Result<(), TimeManagementError> {
        if pair.time < self.logical_time {
            return Err(TimeManagementError::TimeAlreadyPassed);
        }
        self.queue.push_time_ordered(pair, Callback::Message(message), object_instance);

        // NMR/NMRA pull-back: a message arriving earlier than the bound we're currently waiting
        // to advance to would let an about-to-be-granted advance overshoot it. Tighten
        // `pending_logical_time` to the message's time so the readiness check below can no
        // longer say yes past it. We don't re-announce this tightened bound to peers — the
        // already-committed next-message bound stays a conservative (if not maximally tight)
        // upper bound, so a peer may wait one extra round-trip rather than risk re-deriving a
        // commit id under `commit_lower_bound_if_changed`'s no-regression invariant. Once a grant
        // has already been queued for this round the bound is fixed; the message still dispatches
        // ahead of that grant by virtue of sorting earlier in the time-ordered queue.
        if self.advance.is_any_next_message_mode() && !self.grant_queued && pair.time < self.pending_logical_time {
            self.pending_logical_time = pair.time;
            self.check_for_pending_time_advance(sink);
        }
        Ok(())
    }

    pub fn queue_receive_order_message(&mut self, message: M, object_instance: Option<ObjectInstanceHandle>) {
        self.queue.push_receive_order(Callback::Message(message), object_instance);
    }

    /// Remove (without dispatching) every queued message addressed to `handle`.
    pub fn erase_messages_for_object_instance(&mut self, handle: ObjectInstanceHandle) -> usize {
        self.queue.erase_for_object_instance(handle)
    }

    /// Take the next callback ready for application dispatch, if any.
    ///
    /// Receive-order messages dispatch whenever async delivery is on or an advance is pending;
    /// time-ordered messages dispatch once the federation's GALT has moved past their bucket (not
    /// merely once this federate's own logical time has), or unconditionally while flushing the
    /// queue, or unconditionally while not constrained at all. The three synthetic
    /// self-notifications (regulation/constrained enabled, advance granted) are queued the same
    /// way as application messages so they can never dispatch ahead of an earlier-timestamped
    /// message the application hasn't seen yet; once popped they also flip the corresponding
    /// engine state and notify `sink`.
    pub fn dispatch_callback(
        &mut self,
        sink: &mut impl AmbassadorSink<F::Time>,
    ) -> Option<DispatchedCallback<F::Time, M>> {
        if self.receive_order_messages_permitted() {
            if let Some(item) = self.queue.pop_front_receive_order() {
                if let Callback::Message(message) = item {
                    return Some(DispatchedCallback::Message(message));
                }
                unreachable!("only application messages are ever queued receive-order");
            }
        }

        if let Some(front) = self.queue.front_time() {
            let ready = match self.queue.peek_front_time_payload() {
                // While flushing, drain every queued message regardless of its timestamp: a
                // message past `pending_logical_time` still has to come out before the grant, or
                // `check_for_pending_flush_queue` would wait on a front_time() that can never
                // become empty.
                Some(Callback::Message(_)) => {
                    (self.advance.is_flush_queue_mode() || front.time <= self.pending_logical_time)
                        && self.time_stamp_order_messages_permitted(front.time)
                }
                Some(_) => front.time <= self.pending_logical_time,
                None => false,
            };
            if ready {
                let (pair, item) = self
                    .queue
                    .pop_front_time_bucket()
                    .expect("front_time just confirmed a non-empty bucket");
                if self.queue.front_time().is_none() {
                    self.check_for_pending_flush_queue(sink);
                }
                return Some(match item {
                    Callback::Message(message) => DispatchedCallback::Message(message),
                    Callback::RegulationEnabled => {
                        self.regulation = RegulationMode::Enabled;
                        sink.send(OutboundMessage::TimeRegulationEnabled(pair));
                        DispatchedCallback::RegulationEnabled(pair)
                    }
                    Callback::ConstrainedEnabled => {
                        self.constrained = ConstrainedMode::Enabled;
                        sink.send(OutboundMessage::TimeConstrainedEnabled(pair));
                        DispatchedCallback::ConstrainedEnabled(pair)
                    }
                    Callback::AdvanceGranted => {
                        self.logical_time = pair.time;
                        self.advance = AdvanceMode::Granted;
                        self.grant_queued = false;
                        sink.send(OutboundMessage::TimeAdvanceGranted(pair));
                        sink.send(OutboundMessage::Protocol(RtiMsg::TimeAdvanceGrant(pair)));
                        DispatchedCallback::AdvanceGranted(pair)
                    }
                });
            }
        }

        None
    }

    /// Whether the message at `time` may be released to the application: unconditionally while
    /// flushing the queue or while not constrained, otherwise only once every other regulating
    /// federate has committed at least as far as `time` (so no earlier message can still arrive).
    fn time_stamp_order_messages_permitted(&self, time: F::Time) -> bool {
        self.advance.is_flush_queue_mode()
            || self.constrained != ConstrainedMode::Enabled
            || self.lower_bound_map.can_advance_to(LogicalTimePair::new(time, 1))
    }

    fn receive_order_messages_permitted(&self) -> bool {
        self.constrained != ConstrainedMode::Enabled
            || self.async_delivery == AsyncDelivery::On
            || self.advance.is_any_advance_request()
    }

    // --- Queries -----------------------------------------------------------------------

    pub fn query_galt(&self) -> Option<F::Time> {
        self.lower_bound_map.galt()
    }

    pub fn query_lookahead(&self) -> <F::Time as LogicalTimeValue>::Interval {
        self.current_lookahead
    }

    pub fn modify_lookahead(
        &mut self,
        lookahead: <F::Time as LogicalTimeValue>::Interval,
    ) -> Result<(), TimeManagementError> {
        if self.regulation != RegulationMode::Enabled {
            return Err(TimeManagementError::InvalidRegulationTransition);
        }
        self.target_lookahead = lookahead;
        Ok(())
    }

    // --- Stop negotiation (ambient federation-lifecycle addition) ------------------------

    pub fn request_stop(&mut self, tag: LogicalTimePair<F::Time>, sink: &mut impl AmbassadorSink<F::Time>) {
        let should_send = match self.stop_tag {
            Some(current) => tag < current,
            None => true,
        };
        if should_send {
            self.stop_tag = Some(tag);
            sink.send(OutboundMessage::Protocol(RtiMsg::StopRequest { tag }));
        }
    }

    pub fn accept_stop_request(&mut self, tag: LogicalTimePair<F::Time>) {
        self.stop_tag = Some(self.stop_tag.map_or(tag, |current| current.min(tag)));
    }

    pub fn accept_stop_granted(&self, sink: &mut impl AmbassadorSink<F::Time>) {
        if let Some(tag) = self.stop_tag {
            sink.send(OutboundMessage::Protocol(RtiMsg::StopGranted { tag }));
        }
    }

    pub fn stop_tag(&self) -> Option<LogicalTimePair<F::Time>> {
        self.stop_tag
    }
}
