//! Minimal state deltas.
//!
//! A room's state is a set of state event IDs. Records carry the difference
//! between two such sets instead of either set in full, because consecutive
//! states usually differ by one or two events.

use std::collections::BTreeSet;

use roomlog_types::EventId;

/// A set of state event IDs.
///
/// Ordered so that deltas computed from it are deterministic.
pub type StateSet = BTreeSet<EventId>;

/// The difference between two state sets.
///
/// `adds` and `removes` are always disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    /// IDs present in the target set but not the source set.
    pub adds: Vec<EventId>,
    /// IDs present in the source set but not the target set.
    pub removes: Vec<EventId>,
}

impl StateDelta {
    /// Compute the minimal delta that turns `from` into `to`.
    pub fn between(from: &StateSet, to: &StateSet) -> Self {
        Self {
            adds: to.difference(from).cloned().collect(),
            removes: from.difference(to).cloned().collect(),
        }
    }

    /// Build a delta from record fields.
    pub fn new(adds: Vec<EventId>, removes: Vec<EventId>) -> Self {
        Self { adds, removes }
    }

    /// Whether the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.removes.is_empty()
    }

    /// Apply to a state set: removes first, then adds.
    ///
    /// Adds already present and removes already absent are no-ops, so
    /// applying a non-minimal delta still yields the right set.
    pub fn apply_to(&self, state: &mut StateSet) {
        for id in &self.removes {
            state.remove(id);
        }
        state.extend(self.adds.iter().cloned());
    }

    /// Apply to a copy of a state set.
    pub fn applied(&self, state: &StateSet) -> StateSet {
        let mut next = state.clone();
        self.apply_to(&mut next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> StateSet {
        ids.iter().map(|id| EventId::from(*id)).collect()
    }

    fn ids(ids: &[&str]) -> Vec<EventId> {
        ids.iter().map(|id| EventId::from(*id)).collect()
    }

    #[test]
    fn delta_is_symmetric_difference() {
        let prev = set(&["$a", "$b", "$c"]);
        let next = set(&["$b", "$c", "$d", "$e"]);
        let delta = StateDelta::between(&prev, &next);
        assert_eq!(delta.adds, ids(&["$d", "$e"]));
        assert_eq!(delta.removes, ids(&["$a"]));
    }

    #[test]
    fn identical_sets_give_empty_delta() {
        let s = set(&["$a", "$b"]);
        assert!(StateDelta::between(&s, &s).is_empty());
    }

    #[test]
    fn adds_and_removes_are_disjoint() {
        let prev = set(&["$a", "$b", "$x"]);
        let next = set(&["$b", "$c", "$x"]);
        let delta = StateDelta::between(&prev, &next);
        assert!(delta.adds.iter().all(|id| !delta.removes.contains(id)));
    }

    #[test]
    fn delta_never_replaces_whole_state() {
        let prev: StateSet = (0..100).map(|i| EventId::new(format!("$s{i}"))).collect();
        let mut next = prev.clone();
        next.insert("$new".into());
        let delta = StateDelta::between(&prev, &next);
        assert_eq!(delta.adds, ids(&["$new"]));
        assert!(delta.removes.is_empty());
    }

    #[test]
    fn applying_delta_reaches_target() {
        let prev = set(&["$a", "$b", "$c"]);
        let next = set(&["$b", "$d"]);
        let delta = StateDelta::between(&prev, &next);
        assert_eq!(delta.applied(&prev), next);
    }

    #[test]
    fn duplicate_adds_are_deduplicated() {
        let mut state = set(&["$a"]);
        StateDelta::new(ids(&["$a", "$b", "$b"]), vec![]).apply_to(&mut state);
        assert_eq!(state, set(&["$a", "$b"]));
    }

    #[test]
    fn removes_apply_before_adds() {
        // An ID in both lists ends up present.
        let mut state = set(&["$a"]);
        StateDelta::new(ids(&["$a"]), ids(&["$a"])).apply_to(&mut state);
        assert_eq!(state, set(&["$a"]));
    }
}
