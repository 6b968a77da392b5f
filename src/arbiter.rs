// Exclusive-hover arbitration between overlapping regions.
// Every tick, regions that test inside offer their center distance; only the closest one keeps "inside".

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::types::TargetId;

/// One region's claim for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoverCandidate {
    pub target: TargetId,
    /// Pointer distance to the region center.
    pub distance: f64,
}

/// Per-tick arbiter, owned by whoever drives the tick.
#[derive(Debug, Default)]
pub struct HoverArbiter {
    tick: u64,
    candidates: Vec<HoverCandidate>,
}

impl HoverArbiter {
    pub fn new() -> Self {
        HoverArbiter {
            tick: 0,
            candidates: Vec::new(),
        }
    }

    /// Start collecting for `tick`. Candidates of any other tick are discarded.
    pub fn begin_tick(&mut self, tick: u64) {
        if tick != self.tick {
            self.tick = tick;
            self.candidates.clear();
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Register a claim. Claims keyed to a stale tick are ignored.
    pub fn offer(&mut self, tick: u64, target: TargetId, distance: f64) {
        if tick != self.tick {
            return;
        }
        let distance = if distance.is_nan() { f64::INFINITY } else { distance };
        match self.candidates.iter_mut().find(|c| c.target == target) {
            Some(existing) => existing.distance = existing.distance.min(distance),
            None => self.candidates.push(HoverCandidate { target, distance }),
        }
    }

    pub fn candidates(&self) -> &[HoverCandidate] {
        &self.candidates
    }

    /// Closest candidate; ties go to the lower target id so the result never depends on order.
    pub fn winner(&self) -> Option<TargetId> {
        self.candidates
            .iter()
            .min_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(Ordering::Equal)
                    .then(a.target.cmp(&b.target))
            })
            .map(|c| c.target)
    }

    pub fn is_granted(&self, target: TargetId) -> bool {
        self.winner() == Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_candidate_wins() {
        let mut arbiter = HoverArbiter::new();
        arbiter.begin_tick(1);
        arbiter.offer(1, TargetId::new(1), 0.10);
        arbiter.offer(1, TargetId::new(2), 0.04);
        arbiter.offer(1, TargetId::new(3), 0.07);
        assert_eq!(arbiter.winner(), Some(TargetId::new(2)));
        assert!(!arbiter.is_granted(TargetId::new(1)));
    }

    #[test]
    fn ties_go_to_lower_id() {
        let mut arbiter = HoverArbiter::new();
        arbiter.begin_tick(5);
        arbiter.offer(5, TargetId::new(9), 0.05);
        arbiter.offer(5, TargetId::new(4), 0.05);
        assert_eq!(arbiter.winner(), Some(TargetId::new(4)));
    }

    #[test]
    fn new_tick_discards_old_claims() {
        let mut arbiter = HoverArbiter::new();
        arbiter.begin_tick(1);
        arbiter.offer(1, TargetId::new(1), 0.01);
        arbiter.begin_tick(2);
        assert_eq!(arbiter.winner(), None);
        // Late claim for the previous tick.
        arbiter.offer(1, TargetId::new(1), 0.01);
        assert!(arbiter.candidates().is_empty());
    }

    #[test]
    fn nan_distance_never_beats_a_real_one() {
        let mut arbiter = HoverArbiter::new();
        arbiter.begin_tick(1);
        arbiter.offer(1, TargetId::new(1), f64::NAN);
        arbiter.offer(1, TargetId::new(2), 0.3);
        assert_eq!(arbiter.winner(), Some(TargetId::new(2)));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The winner's distance is the minimum over all candidates.
            #[test]
            fn winner_is_minimal(distances in proptest::collection::vec(0.0f64..2.0, 1..20)) {
                let mut arbiter = HoverArbiter::new();
                arbiter.begin_tick(7);
                for (i, d) in distances.iter().enumerate() {
                    arbiter.offer(7, TargetId::new(i as u32), *d);
                }
                let winner = arbiter.winner().unwrap();
                let best = distances.iter().cloned().fold(f64::INFINITY, f64::min);
                prop_assert_eq!(distances[winner.as_u32() as usize], best);
            }
        }
    }
}
