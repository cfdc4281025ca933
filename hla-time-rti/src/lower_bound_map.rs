//! The federate lower-bound-timestamp map: tracks each federate's committed time-advance and
//! next-message lower bounds as two reference-counted ordered multisets, giving O(1)
//! GALT / next-message-GALT lookups and O(log n) commits.
//!
//! Ported from OpenRTI's `FederateHandleLowerBoundTimeStampMap`.

use std::collections::BTreeMap;
use std::collections::HashMap;

use hla_time_core::{FederateHandle, LogicalTimePair, LogicalTimeValue};

/// Which of a federate's two lower bounds a [`FederateLowerBoundMap::commit`] call updates.
///
/// A bit flag, not an either/or choice: the original's `LowerBoundTimeStampCommitType` commits
/// both bounds at once for an ordinary time-advance commit, and only the next-message bound while
/// waiting out a potential deadlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitType(u8);

impl CommitType {
    const TIME_ADVANCE_BIT: u8 = 0b01;
    const NEXT_MESSAGE_BIT: u8 = 0b10;

    /// The plain time-advance-request lower bound only.
    pub const TIME_ADVANCE: CommitType = CommitType(Self::TIME_ADVANCE_BIT);
    /// The next-message-request lower bound only.
    pub const NEXT_MESSAGE: CommitType = CommitType(Self::NEXT_MESSAGE_BIT);
    /// Both bounds together, committed in one round trip.
    pub const TIME_ADVANCE_AND_NEXT_MESSAGE: CommitType =
        CommitType(Self::TIME_ADVANCE_BIT | Self::NEXT_MESSAGE_BIT);

    pub fn is_time_advance(self) -> bool {
        self.0 & Self::TIME_ADVANCE_BIT != 0
    }

    pub fn is_next_message(self) -> bool {
        self.0 & Self::NEXT_MESSAGE_BIT != 0
    }
}

impl std::ops::BitOr for CommitType {
    type Output = CommitType;

    fn bitor(self, rhs: CommitType) -> CommitType {
        CommitType(self.0 | rhs.0)
    }
}

/// A reference-counted ordered multiset of logical times, giving O(1) access to the minimum.
#[derive(Debug)]
struct TimeCountMap<T> {
    counts: BTreeMap<T, u32>,
}

impl<T: LogicalTimeValue> Default for TimeCountMap<T> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<T: LogicalTimeValue> TimeCountMap<T> {
    fn front(&self) -> Option<T> {
        self.counts.keys().next().copied()
    }

    /// Returns whether the front entry changed as a result.
    fn insert(&mut self, time: T) -> bool {
        let before = self.front();
        *self.counts.entry(time).or_insert(0) += 1;
        self.front() != before
    }

    /// Returns whether the front entry changed as a result.
    fn erase(&mut self, time: T) -> bool {
        let before = self.front();
        if let Some(count) = self.counts.get_mut(&time) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&time);
            }
        }
        self.front() != before
    }

    /// Move one reference from `old` to `new`. Returns whether the front entry changed.
    fn move_time(&mut self, old: T, new: T) -> bool {
        if old == new {
            return false;
        }
        let before = self.front();
        self.erase(old);
        self.insert(new);
        self.front() != before
    }

}

/// A single federate's commit record within the map.
#[derive(Debug, Clone)]
struct Commit<T> {
    time_advance: T,
    next_message: T,
    commit_id: u64,
    waiting_for_commit_id: Option<u64>,
    locked_by_next_message: bool,
}

impl<T: LogicalTimeValue> Commit<T> {
    /// A federate is "in next-message mode" once its next-message bound has been pulled behind
    /// its plain time-advance bound, signalling it is waiting to avoid missing a message rather
    /// than just waiting for permission to advance.
    fn is_in_next_message_mode(&self) -> bool {
        debug_assert!(self.time_advance <= self.next_message);
        self.time_advance != self.next_message
    }
}

/// Tracks every *peer* federate's committed lower bounds and derives GALT, next-message-GALT,
/// and the deadlock-detection predicates from them. A federate never inserts itself here — the
/// engine tracks its own bound directly, the same way the original's map is populated
/// exclusively by peer registration and never holds the local federate's own handle.
///
/// Every public method preserves the invariant the original checks with `OpenRTIAssert`: a
/// registered federate's `time_advance` is always `<=` its `next_message`.
#[derive(Debug)]
pub struct FederateLowerBoundMap<T: LogicalTimeValue> {
    time_advance: TimeCountMap<T>,
    next_message: TimeCountMap<T>,
    federates: HashMap<FederateHandle, Commit<T>>,
}

impl<T: LogicalTimeValue> Default for FederateLowerBoundMap<T> {
    fn default() -> Self {
        Self {
            time_advance: TimeCountMap::default(),
            next_message: TimeCountMap::default(),
            federates: HashMap::new(),
        }
    }
}

impl<T: LogicalTimeValue> FederateLowerBoundMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer's initial lower bounds. `before_own_commit_id` seeds the commit id this
    /// federate was waiting on just before the peer joined (`_commitId - 1` in the original),
    /// so a deadlock-detection round already in flight doesn't wait on this peer forever.
    pub fn insert(
        &mut self,
        federate: FederateHandle,
        time_advance: T,
        next_message: T,
        commit_id: u64,
        before_own_commit_id: u64,
    ) {
        self.time_advance.insert(time_advance);
        self.next_message.insert(next_message);
        self.federates.insert(
            federate,
            Commit {
                time_advance,
                next_message,
                commit_id,
                waiting_for_commit_id: Some(before_own_commit_id),
                locked_by_next_message: false,
            },
        );
    }

    pub fn erase(&mut self, federate: FederateHandle) -> bool {
        let Some(commit) = self.federates.remove(&federate) else {
            return false;
        };
        self.time_advance.erase(commit.time_advance);
        self.next_message.erase(commit.next_message);
        true
    }

    pub fn contains(&self, federate: FederateHandle) -> bool {
        self.federates.contains_key(&federate)
    }

    /// Commit a new lower bound for `federate`. `commit_type` is a bit flag: an ordinary commit
    /// sets both bits at once, while a commit made while in next-message mode sets only the
    /// next-message bit, leaving the plain time-advance bound untouched.
    ///
    /// Returns `(front_changed, commit_id_changed_in_next_message_mode)`: whether this commit
    /// moved the time-advance GALT (computed from the time-advance bit alone, matching the
    /// original's `isFirstLogicalTime`), and whether it changed `federate`'s commit id while that
    /// federate was in next-message mode (the trigger for broadcasting a
    /// `CommitLowerBoundTimeStampResponse`).
    pub fn commit(&mut self, federate: FederateHandle, time: T, commit_type: CommitType, commit_id: u64) -> (bool, bool) {
        let commit = self
            .federates
            .get_mut(&federate)
            .expect("commit() called for a federate that was never inserted");

        let front_changed = if commit_type.is_time_advance() {
            let changed = self.time_advance.move_time(commit.time_advance, time);
            commit.time_advance = time;
            changed
        } else {
            false
        };

        if commit_type.is_next_message() {
            self.next_message.move_time(commit.next_message, time);
            commit.next_message = time;
        }

        let next_message_mode = commit.is_in_next_message_mode();
        if !next_message_mode {
            // Dropping out of next-message mode releases any lock a peer was relying on to
            // prove the federate safe to advance past.
            commit.locked_by_next_message = false;
        }

        let commit_id_changed = commit.commit_id != commit_id;
        commit.commit_id = commit_id;

        debug_assert!(self.time_advance.front().map_or(true, |galt| galt <= commit.time_advance));

        (front_changed, commit_id_changed && next_message_mode)
    }

    /// The federation's greatest available logical time: the smallest committed time-advance
    /// bound across every federate.
    pub fn galt(&self) -> Option<T> {
        self.time_advance.front()
    }

    /// The smallest committed next-message bound across every federate.
    pub fn next_message_galt(&self) -> Option<T> {
        self.next_message.front()
    }

    /// Whether some federate's next-message bound is currently tighter than the plain GALT,
    /// meaning deadlock-detection (next-message mode) is constraining the federation.
    pub fn constrained_by_next_message(&self) -> bool {
        matches!((self.galt(), self.next_message_galt()), (Some(galt), Some(nm)) if galt < nm)
    }

    /// Whether a federate may advance its plain time-advance-request to `pair`: empty is always
    /// safe, otherwise `pair.time` must clear the front of every peer's committed time-advance
    /// bound — strictly if `pair.tag` marks this as a message delivery, non-strictly otherwise.
    pub fn can_advance_to(&self, pair: LogicalTimePair<T>) -> bool {
        match self.time_advance.front() {
            Some(front) => {
                if pair.tag > 0 {
                    pair.time < front
                } else {
                    pair.time <= front
                }
            }
            None => true,
        }
    }

    /// Whether a federate may advance its next-message-request to `pair`, mirroring
    /// [`Self::can_advance_to`] against the next-message front instead.
    pub fn can_advance_to_next_message(&self, pair: LogicalTimePair<T>) -> bool {
        match self.next_message.front() {
            Some(front) => {
                if pair.tag > 0 {
                    pair.time < front
                } else {
                    pair.time <= front
                }
            }
            None => true,
        }
    }

    /// O(n): every federate currently in next-message mode must be waiting on `commit_id`, or
    /// this deadlock-avoidance round hasn't yet heard from everyone relevant. Vacuously false
    /// when nothing is actually constrained by next-message mode.
    pub fn locked_by_next_message(&self, commit_id: u64) -> bool {
        if !self.constrained_by_next_message() {
            return false;
        }
        self.federates
            .values()
            .filter(|c| c.is_in_next_message_mode())
            .all(|c| c.waiting_for_commit_id == Some(commit_id))
    }

    /// O(n): the stricter predicate used to break the deadlock — every federate in
    /// next-message mode must both be waiting on `commit_id` *and* have confirmed it is locked.
    /// Vacuously false when nothing is actually constrained by next-message mode.
    pub fn is_safe_to_advance_to_next_message(&self, commit_id: u64) -> bool {
        if !self.constrained_by_next_message() {
            return false;
        }
        self.federates
            .values()
            .filter(|c| c.is_in_next_message_mode())
            .all(|c| c.waiting_for_commit_id == Some(commit_id) && c.locked_by_next_message)
    }

    pub fn set_federate_wait_commit_id(&mut self, federate: FederateHandle, commit_id: u64) {
        if let Some(commit) = self.federates.get_mut(&federate) {
            commit.waiting_for_commit_id = Some(commit_id);
        }
    }

    pub fn set_federate_locked_by_next_message(&mut self, federate: FederateHandle, locked: bool) {
        if let Some(commit) = self.federates.get_mut(&federate) {
            commit.locked_by_next_message = locked;
        }
    }

    pub fn next_message_federate_handles(&self) -> Vec<FederateHandle> {
        self.federates
            .iter()
            .filter(|(_, c)| c.is_in_next_message_mode())
            .map(|(&handle, _)| handle)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hla_time_core::Int64Time;

    fn fed(n: u64) -> FederateHandle {
        FederateHandle::from(n as usize)
    }

    #[test]
    fn galt_is_the_minimum_committed_time_advance() {
        let mut map = FederateLowerBoundMap::new();
        map.insert(fed(0), Int64Time(0), Int64Time(0), 0, 0);
        map.insert(fed(1), Int64Time(0), Int64Time(0), 0, 0);

        map.commit(fed(0), Int64Time(10), CommitType::TIME_ADVANCE_AND_NEXT_MESSAGE, 0);
        assert_eq!(map.galt(), Some(Int64Time(0)), "federate 1 hasn't moved yet");

        map.commit(fed(1), Int64Time(5), CommitType::TIME_ADVANCE_AND_NEXT_MESSAGE, 0);
        assert_eq!(map.galt(), Some(Int64Time(5)));
    }

    #[test]
    fn can_advance_to_is_unconstrained_with_no_peers() {
        let map = FederateLowerBoundMap::<Int64Time>::new();

        assert!(
            map.can_advance_to(LogicalTimePair::new(Int64Time(100), 0)),
            "no peers to block on"
        );
    }

    #[test]
    fn can_advance_to_is_bounded_by_a_slower_peer() {
        let mut map = FederateLowerBoundMap::new();
        map.insert(fed(1), Int64Time(3), Int64Time(3), 0, 0);

        assert!(map.can_advance_to(LogicalTimePair::new(Int64Time(3), 0)));
        assert!(!map.can_advance_to(LogicalTimePair::new(Int64Time(4), 0)));
    }

    #[test]
    fn can_advance_to_for_a_message_delivery_is_strict_at_the_front() {
        let mut map = FederateLowerBoundMap::new();
        map.insert(fed(1), Int64Time(3), Int64Time(3), 0, 0);

        assert!(!map.can_advance_to(LogicalTimePair::new(Int64Time(3), 1)), "tag>0 is strict");
        assert!(map.can_advance_to(LogicalTimePair::new(Int64Time(2), 1)));
    }

    #[test]
    fn next_message_mode_clears_lock_on_exit() {
        let mut map = FederateLowerBoundMap::new();
        map.insert(fed(0), Int64Time(0), Int64Time(0), 0, 0);

        // Enter next-message mode: the next-message bound moves ahead while time-advance stays put.
        map.commit(fed(0), Int64Time(5), CommitType::NEXT_MESSAGE, 0);
        map.set_federate_locked_by_next_message(fed(0), true);
        assert!(map.locked_by_next_message(0));

        // Catching time-advance back up to next-message exits next-message mode and clears the lock.
        map.commit(fed(0), Int64Time(5), CommitType::TIME_ADVANCE, 0);
        assert!(!map.federates[&fed(0)].locked_by_next_message);
    }

    #[test]
    fn locked_by_next_message_is_vacuously_false_when_unconstrained() {
        let mut map = FederateLowerBoundMap::new();
        map.insert(fed(0), Int64Time(0), Int64Time(0), 0, 0);

        assert!(!map.constrained_by_next_message());
        assert!(!map.locked_by_next_message(0), "no federate is in next-message mode yet");
        assert!(!map.is_safe_to_advance_to_next_message(0));
    }

    #[test]
    fn erase_removes_federate_contribution_to_galt() {
        let mut map = FederateLowerBoundMap::new();
        map.insert(fed(0), Int64Time(0), Int64Time(0), 0, 0);
        map.insert(fed(1), Int64Time(9), Int64Time(9), 0, 0);

        assert_eq!(map.galt(), Some(Int64Time(0)));
        assert!(map.erase(fed(0)));
        assert_eq!(map.galt(), Some(Int64Time(9)));
    }
}
