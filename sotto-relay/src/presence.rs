//! Presence interest tracking.
//!
//! Two kinds of interest feed presence notices:
//!
//! - **Links**: pairs of participants that exchanged at least one frame.
//!   When one side disconnects, the other gets a `peer-left` notice.
//! - **Waiting**: participants whose relay named a recipient with no live
//!   session. When that recipient joins, each waiter gets a `peer-online`
//!   notice, and the interest is consumed.
//!
//! Both tables hold identifiers only, never payloads.

use dashmap::DashMap;
use sotto_types::ParticipantId;
use std::collections::HashSet;

/// Tracks who cares about whose presence.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    /// Symmetric frame-exchange links.
    links: DashMap<ParticipantId, HashSet<ParticipantId>>,
    /// awaited identifier → participants to notify when it joins.
    waiting: DashMap<ParticipantId, HashSet<ParticipantId>>,
}

impl PresenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that two participants exchanged a frame.
    ///
    /// Links are symmetric. Frames a participant relays to itself create
    /// no link.
    pub fn link(&self, a: &ParticipantId, b: &ParticipantId) {
        if a == b {
            return;
        }
        self.links.entry(a.clone()).or_default().insert(b.clone());
        self.links.entry(b.clone()).or_default().insert(a.clone());
    }

    /// Record that `waiter` wants to hear when `awaited` joins.
    pub fn add_waiter(&self, awaited: &ParticipantId, waiter: &ParticipantId) {
        self.waiting
            .entry(awaited.clone())
            .or_default()
            .insert(waiter.clone());
    }

    /// Withdraw a waiting interest.
    ///
    /// Returns whether the interest was present. Used to resolve the race
    /// where the awaited participant joins while the interest is being
    /// registered: whoever removes the entry sends the notice.
    pub fn remove_waiter(&self, awaited: &ParticipantId, waiter: &ParticipantId) -> bool {
        let removed = match self.waiting.get_mut(awaited) {
            Some(mut waiters) => waiters.remove(waiter),
            None => false,
        };
        if removed {
            self.waiting.remove_if(awaited, |_, waiters| waiters.is_empty());
        }
        removed
    }

    /// Consume and return all waiters for a participant that just joined.
    pub fn on_join(&self, joined: &ParticipantId) -> Vec<ParticipantId> {
        self.waiting
            .remove(joined)
            .map(|(_, waiters)| waiters.into_iter().collect())
            .unwrap_or_default()
    }

    /// Drop all interest held by or in a departing participant.
    ///
    /// Returns the peers linked to it, each of which should get a
    /// `peer-left` notice. Interests waiting for the departed identifier
    /// stay registered: a waiter still wants to hear if it rejoins.
    pub fn on_leave(&self, departed: &ParticipantId) -> Vec<ParticipantId> {
        let peers: Vec<ParticipantId> = self
            .links
            .remove(departed)
            .map(|(_, set)| set.into_iter().collect())
            .unwrap_or_default();

        for peer in &peers {
            let now_empty = match self.links.get_mut(peer) {
                Some(mut set) => {
                    set.remove(departed);
                    set.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.links.remove_if(peer, |_, set| set.is_empty());
            }
        }

        // The departed can no longer be notified about anyone
        self.waiting.retain(|_, waiters| {
            waiters.remove(departed);
            !waiters.is_empty()
        });

        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[test]
    fn link_is_symmetric() {
        let tracker = PresenceTracker::new();
        tracker.link(&id("alice"), &id("bob"));

        let from_alice = tracker.on_leave(&id("alice"));
        assert_eq!(from_alice, vec![id("bob")]);

        // Second tracker, leave from the other side
        let tracker = PresenceTracker::new();
        tracker.link(&id("alice"), &id("bob"));
        let from_bob = tracker.on_leave(&id("bob"));
        assert_eq!(from_bob, vec![id("alice")]);
    }

    #[test]
    fn self_link_is_ignored() {
        let tracker = PresenceTracker::new();
        tracker.link(&id("alice"), &id("alice"));

        assert!(tracker.on_leave(&id("alice")).is_empty());
    }

    #[test]
    fn repeated_frames_notify_once() {
        let tracker = PresenceTracker::new();
        tracker.link(&id("alice"), &id("bob"));
        tracker.link(&id("alice"), &id("bob"));
        tracker.link(&id("bob"), &id("alice"));

        let peers = tracker.on_leave(&id("alice"));
        assert_eq!(peers, vec![id("bob")]);
    }

    #[test]
    fn leave_purges_reverse_links() {
        let tracker = PresenceTracker::new();
        tracker.link(&id("alice"), &id("bob"));

        tracker.on_leave(&id("alice"));

        // Bob's side was cleaned up: his own leave notifies nobody
        assert!(tracker.on_leave(&id("bob")).is_empty());
    }

    #[test]
    fn leave_returns_all_linked_peers() {
        let tracker = PresenceTracker::new();
        tracker.link(&id("alice"), &id("bob"));
        tracker.link(&id("alice"), &id("carol"));
        tracker.link(&id("bob"), &id("carol"));

        let peers = tracker.on_leave(&id("alice"));
        assert_eq!(peers.len(), 2);
        assert!(peers.contains(&id("bob")));
        assert!(peers.contains(&id("carol")));

        // bob-carol link unaffected
        let peers = tracker.on_leave(&id("bob"));
        assert_eq!(peers, vec![id("carol")]);
    }

    #[test]
    fn waiters_are_drained_on_join() {
        let tracker = PresenceTracker::new();
        tracker.add_waiter(&id("bob"), &id("alice"));
        tracker.add_waiter(&id("bob"), &id("carol"));

        let waiters = tracker.on_join(&id("bob"));
        assert_eq!(waiters.len(), 2);
        assert!(waiters.contains(&id("alice")));
        assert!(waiters.contains(&id("carol")));

        // Interest is consumed
        assert!(tracker.on_join(&id("bob")).is_empty());
    }

    #[test]
    fn remove_waiter_reports_presence() {
        let tracker = PresenceTracker::new();
        tracker.add_waiter(&id("bob"), &id("alice"));

        assert!(tracker.remove_waiter(&id("bob"), &id("alice")));
        assert!(!tracker.remove_waiter(&id("bob"), &id("alice")));
        assert!(tracker.on_join(&id("bob")).is_empty());
    }

    #[test]
    fn departed_waiter_is_forgotten() {
        let tracker = PresenceTracker::new();
        tracker.add_waiter(&id("bob"), &id("alice"));
        tracker.add_waiter(&id("bob"), &id("carol"));

        tracker.on_leave(&id("alice"));

        let waiters = tracker.on_join(&id("bob"));
        assert_eq!(waiters, vec![id("carol")]);
    }

    #[test]
    fn waiting_interest_survives_awaited_leave() {
        let tracker = PresenceTracker::new();

        // Alice asked for bob while he was away; bob briefly appears to
        // someone else and leaves again before alice hears anything
        tracker.add_waiter(&id("bob"), &id("alice"));
        tracker.on_leave(&id("bob"));

        assert_eq!(tracker.on_join(&id("bob")), vec![id("alice")]);
    }
}
