// Dwell selection: per-region gating state machine.
// presence -> spatial hysteresis -> palm-stability delay -> dwell fill -> selection -> cooldown.
// Progress decays instead of resetting, so a brief slip off the target is forgiven.

use std::sync::Arc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::{DwellConfig, ResumePolicy};
use crate::types::*;

const MIN_DWELL_SEC: f64 = 1e-3;
/// One microsecond. Summed frame times drift below exact thresholds (120 × 1/60 < 2.0).
const TIME_EPSILON: f64 = 1e-6;

/// Conceptual state of a dwell target, reported for feedback and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DwellPhase {
    /// Spawn block or cooldown is active.
    Blocked,
    /// Nothing is accruing.
    Idle,
    /// Pointer qualifies, waiting out the palm delay. No ring yet.
    PalmWaiting,
    /// Hold time is accruing.
    Dwelling,
    /// Pointer left; hold drains toward zero.
    Decaying,
    /// A pinch (or its debounce window) holds the target back.
    PinchSuppressed,
    /// Fired this tick. Lasts one tick before the cooldown shows as `Blocked`.
    Selected,
}

/// Mutable per-target state. Reset by `start_cooldown`, dropped with the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwellRuntimeState {
    pub hold_time: f64,
    pub hovering: bool,
    pub last_inside_time: Option<Timestamp>,
    pub cooldown_until: Timestamp,
    pub spawn_block_until: Timestamp,
    pub palm_stable_start: Option<Timestamp>,
    pub ever_exited_since_activation: bool,
    pub last_pinch_time: Option<Timestamp>,
    pub fill: f64,
    pub ring_visible: bool,
    pub phase: DwellPhase,
    last_position: Option<NormalizedCoord>,
}

impl DwellRuntimeState {
    fn new(spawn_block_until: Timestamp) -> Self {
        DwellRuntimeState {
            hold_time: 0.0,
            hovering: false,
            last_inside_time: None,
            cooldown_until: Timestamp::default(),
            spawn_block_until,
            palm_stable_start: None,
            ever_exited_since_activation: false,
            last_pinch_time: None,
            fill: 0.0,
            ring_visible: false,
            phase: DwellPhase::Blocked,
            last_position: None,
        }
    }
}

/// One dwell-selectable region.
#[derive(Debug, Clone)]
pub struct DwellTarget {
    id: TargetId,
    config: Arc<DwellConfig>,
    region: HitRegion,
    state: DwellRuntimeState,
}

impl DwellTarget {
    /// Create a target that becomes interactive now; the spawn block starts immediately.
    pub fn new(id: TargetId, config: Arc<DwellConfig>, region: HitRegion, now: Timestamp) -> Self {
        let spawn_block_until = now.add_secs(config.spawn_block_seconds);
        DwellTarget {
            id,
            config,
            region,
            state: DwellRuntimeState::new(spawn_block_until),
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn config(&self) -> &DwellConfig {
        &self.config
    }

    pub fn region(&self) -> &HitRegion {
        &self.region
    }

    /// Layout moved the region. Takes effect on the next hit test.
    pub fn set_region(&mut self, region: HitRegion) {
        self.region = region;
    }

    pub fn state(&self) -> &DwellRuntimeState {
        &self.state
    }

    pub fn fill(&self) -> f64 {
        self.state.fill
    }

    pub fn phase(&self) -> DwellPhase {
        self.state.phase
    }

    pub fn is_blocked(&self, now: Timestamp) -> bool {
        now < self.state.cooldown_until || now < self.state.spawn_block_until
    }

    /// Hysteresis hit test: the tighter or looser pad depending on whether we already hover.
    /// Returns the distance to the region center when inside.
    pub fn hit_test(&self, position: &NormalizedCoord) -> Option<f64> {
        let pad = if self.state.hovering {
            self.config.exit_pad
        } else {
            self.config.enter_pad
        };
        self.region.hit(position, pad)
    }

    /// Whether this target may compete for exclusive hover this tick.
    /// Blocked, unarmed and pinch-suppressed targets stay out of arbitration.
    pub fn can_claim(&self, input: &PointerInput, now: Timestamp) -> bool {
        input.fresh
            && !self.is_blocked(now)
            && self.is_armed()
            && !self.pinch_suppressed(input, now)
    }

    /// Self-contained tick without cross-target arbitration.
    pub fn tick(&mut self, input: &PointerInput, now: Timestamp, dt: f64) -> Option<SelectionEvent> {
        let hit = input.fresh && self.hit_test(&input.position).is_some();
        self.update(input, hit, true, now, dt)
    }

    /// Advance the state machine. `hit` is this target's own padded hit test; `granted` is
    /// false when another target won exclusive hover. Only a missed hit counts as leaving.
    pub fn update(
        &mut self,
        input: &PointerInput,
        hit: bool,
        granted: bool,
        now: Timestamp,
        dt: f64,
    ) -> Option<SelectionEvent> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let speed = self.pointer_speed(input, dt);

        if self.is_blocked(now) {
            self.decay(dt);
            self.state.hovering = false;
            self.state.ring_visible = false;
            self.set_phase(DwellPhase::Blocked);
            return None;
        }

        if !input.fresh {
            self.decay(dt);
            self.state.hovering = false;
            self.state.ring_visible = false;
            self.set_phase(self.resting_phase());
            return None;
        }

        if self.pinch_gate(input, now) {
            return None;
        }

        let cfg = Arc::clone(&self.config);
        let present = input.present || (cfg.allow_pointer_as_presence && input.fresh);
        if !hit {
            self.state.ever_exited_since_activation = true;
        }
        self.state.hovering = hit;
        let inside = hit && granted;
        if inside && present {
            self.state.last_inside_time = Some(now);
        }

        let palm = !(cfg.only_palm && input.fist);
        let steady = match (cfg.max_pointer_speed, speed) {
            (Some(max), Some(speed)) => speed <= max,
            _ => true,
        };
        let qualifies = inside && present && palm && steady && self.is_armed();

        let ready = if qualifies {
            match cfg.resume_policy {
                ResumePolicy::Immediate if self.state.hold_time > 0.0 => true,
                _ => {
                    let start = *self.state.palm_stable_start.get_or_insert(now);
                    now.secs_since(start) + TIME_EPSILON >= cfg.palm_delay_seconds
                }
            }
        } else {
            self.state.palm_stable_start = None;
            false
        };

        if ready {
            self.state.hold_time += dt;
            let dwell = dwell_seconds(&cfg);
            self.state.fill = (self.state.hold_time / dwell).clamp(0.0, 1.0);
            self.state.ring_visible = true;
            self.set_phase(DwellPhase::Dwelling);

            if self.state.hold_time + TIME_EPSILON >= dwell {
                return Some(self.select(now));
            }
        } else {
            let away_for_long = self
                .state
                .last_inside_time
                .map_or(true, |t| now.secs_since(t) > cfg.grace_seconds);
            if away_for_long {
                self.decay(dt);
            }
            self.state.ring_visible = false;
            let phase = if qualifies {
                DwellPhase::PalmWaiting
            } else {
                self.resting_phase()
            };
            self.set_phase(phase);
        }
        None
    }

    /// Block selection for `seconds` and clear all progress. Used after a selection and when
    /// the UI rebuilds a menu under the hand.
    pub fn start_cooldown(&mut self, now: Timestamp, seconds: f64) {
        let until = now.add_secs(seconds);
        self.state.cooldown_until = until;
        self.state.spawn_block_until = self.state.spawn_block_until.max(until);
        self.state.hold_time = 0.0;
        self.state.fill = 0.0;
        self.state.hovering = false;
        self.state.ever_exited_since_activation = false;
        self.state.palm_stable_start = None;
        self.state.ring_visible = false;
        self.set_phase(DwellPhase::Blocked);
        debug!("dwell target {} cooling down for {:.3}s", self.id.as_u32(), seconds.max(0.0));
    }

    fn select(&mut self, now: Timestamp) -> SelectionEvent {
        debug!("dwell target {} selected", self.id.as_u32());
        self.start_cooldown(now, self.config.cooldown_seconds);
        // Show the full ring on the selection tick.
        self.state.fill = 1.0;
        self.set_phase(DwellPhase::Selected);
        SelectionEvent {
            target: self.id,
            kind: SelectionKind::Dwell,
            at: now,
        }
    }

    fn is_armed(&self) -> bool {
        !self.config.require_enter_from_outside || self.state.ever_exited_since_activation
    }

    fn pinch_suppressed(&self, input: &PointerInput, now: Timestamp) -> bool {
        self.config.only_palm
            && (input.pinch_stable
                || self
                    .state
                    .last_pinch_time
                    .is_some_and(|t| now.secs_since(t) < self.config.pinch_debounce_seconds))
    }

    /// Returns true when a pinch (or the debounce after one) suppresses this tick.
    fn pinch_gate(&mut self, input: &PointerInput, now: Timestamp) -> bool {
        if !self.pinch_suppressed(input, now) {
            return false;
        }
        if input.pinch_stable {
            self.state.last_pinch_time = Some(now);
            if self.config.reset_progress_on_pinch {
                self.state.hold_time = 0.0;
                self.state.palm_stable_start = None;
            }
        }
        self.state.fill = (self.state.hold_time / dwell_seconds(&self.config)).clamp(0.0, 1.0);
        self.state.ring_visible = false;
        self.set_phase(DwellPhase::PinchSuppressed);
        true
    }

    /// Drain at `dwell/reset` seconds of hold per second: a full ring empties in `reset_seconds`.
    fn decay(&mut self, dt: f64) {
        let dwell = dwell_seconds(&self.config);
        if self.state.hold_time > 0.0 {
            let rate = dwell / self.config.reset_seconds.max(MIN_DWELL_SEC);
            self.state.hold_time = (self.state.hold_time - rate * dt).max(0.0);
        }
        self.state.fill = (self.state.hold_time / dwell).clamp(0.0, 1.0);
    }

    fn pointer_speed(&mut self, input: &PointerInput, dt: f64) -> Option<f64> {
        if !input.fresh {
            self.state.last_position = None;
            return None;
        }
        let previous = self.state.last_position.replace(input.position);
        match previous {
            Some(prev) if dt > 0.0 => Some(prev.distance(&input.position) / dt),
            _ => None,
        }
    }

    fn resting_phase(&self) -> DwellPhase {
        if self.state.hold_time > 0.0 {
            DwellPhase::Decaying
        } else {
            DwellPhase::Idle
        }
    }

    fn set_phase(&mut self, phase: DwellPhase) {
        if self.state.phase != phase {
            trace!(
                "dwell target {}: {:?} -> {:?}",
                self.id.as_u32(),
                self.state.phase,
                phase
            );
            self.state.phase = phase;
        }
    }
}

fn dwell_seconds(config: &DwellConfig) -> f64 {
    config.dwell_seconds.max(MIN_DWELL_SEC)
}
