// Pointer stabilization: freshness grace, presence hysteresis, One-Euro smoothing,
// latency compensation, pinch debounce and the cursor fade. One instance per cursor.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::StabilizerSettings;
use crate::filter::{lerp, time_constant_alpha, OneEuroFilter2D, SmoothDamp};
use crate::types::*;

const MIN_DT: f64 = 1e-4;

/// Per-tick output of the stabilizer. Consumers read it, only the stabilizer writes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizedState {
    pub filtered_position: NormalizedCoord,
    pub filtered_velocity: Vec2,
    /// Filtered position extrapolated by the sample age; what the cursor should draw.
    pub predicted_position: NormalizedCoord,
    pub pinch_lowpass: f64,
    pub pinch_stable: bool,
    pub present: bool,
    pub presence_since: Option<Timestamp>,
    pub last_seen_time: Option<Timestamp>,
    pub last_valid_time: Option<Timestamp>,
    pub visible_alpha: f64,
    /// This tick's sample was inside the freshness window.
    pub fresh: bool,
    pub fist: bool,
}

impl Default for StabilizedState {
    fn default() -> Self {
        StabilizedState {
            filtered_position: NormalizedCoord::center(),
            filtered_velocity: Vec2::ZERO,
            predicted_position: NormalizedCoord::center(),
            pinch_lowpass: 0.0,
            pinch_stable: false,
            present: false,
            presence_since: None,
            last_seen_time: None,
            last_valid_time: None,
            visible_alpha: 0.0,
            fresh: false,
            fist: false,
        }
    }
}

impl StabilizedState {
    /// The signal handed to interactive regions. Hit tests use the filtered position;
    /// the prediction is only for drawing.
    pub fn pointer_input(&self) -> PointerInput {
        PointerInput {
            position: self.filtered_position,
            present: self.present,
            pinch_stable: self.pinch_stable,
            fist: self.fist,
            fresh: self.fresh,
        }
    }
}

/// Turns the raw pointer feed into a display-stable cursor signal.
pub struct PointerStabilizer {
    settings: StabilizerSettings,
    filter: OneEuroFilter2D,
    fade: SmoothDamp,
    shown_at: Option<Timestamp>,
    state: StabilizedState,
}

impl PointerStabilizer {
    pub fn new(settings: StabilizerSettings) -> Self {
        let filter = OneEuroFilter2D::new(settings.min_cutoff, settings.beta, settings.d_cutoff);
        PointerStabilizer {
            settings,
            filter,
            fade: SmoothDamp::new(0.0),
            shown_at: None,
            state: StabilizedState::default(),
        }
    }

    pub fn settings(&self) -> &StabilizerSettings {
        &self.settings
    }

    pub fn state(&self) -> &StabilizedState {
        &self.state
    }

    /// Forget everything, as if no sample had ever arrived.
    pub fn reset(&mut self) {
        self.filter.reset();
        self.fade.set_immediate(0.0);
        self.shown_at = None;
        self.state = StabilizedState::default();
    }

    /// Advance one render tick. Call every frame, whether or not a new sample arrived.
    pub fn update(&mut self, raw: &RawSample, now: Timestamp, dt: f64) -> &StabilizedState {
        let dt = if dt.is_finite() { dt.max(MIN_DT) } else { MIN_DT };

        self.state.fresh = raw.valid;
        self.state.fist = raw.valid && raw.fist;
        self.update_pinch(raw, dt);

        if raw.valid {
            self.state.last_valid_time = Some(now);
            let position = if self.settings.mirror_x {
                raw.position.mirrored_x()
            } else {
                raw.position
            };
            self.track(position, raw, now, dt);
        } else {
            self.hold_stale(now);
        }

        self.update_fade(now, dt);
        &self.state
    }

    fn track(&mut self, position: NormalizedCoord, raw: &RawSample, now: Timestamp, dt: f64) {
        if !self.claims_presence(position, raw.presence_flag) {
            self.hold_absent(now);
            return;
        }

        if !self.state.present {
            self.filter.seed(position);
            self.state.present = true;
            self.state.presence_since = Some(now);
            self.shown_at = Some(now);
            debug!("pointer presence acquired at {:?}", position);
        } else {
            match self.filter.value() {
                Some(filtered) if filtered.distance(&position) < self.settings.movement_threshold => {
                    // Sensor noise: keep the position, let the velocity settle.
                    self.filter.hold(dt);
                }
                _ => {
                    self.filter.filter(position, dt);
                }
            }
        }

        self.state.last_seen_time = Some(now);
        self.publish_position(raw.sample_time, now);
    }

    /// Presence hysteresis. The pointer parks at the screen center when no hand is tracked,
    /// so the distance from the center tells a real hand from an idle feed.
    fn claims_presence(&self, position: NormalizedCoord, presence_flag: bool) -> bool {
        let d = position.center_distance();
        let by_distance = if self.state.present {
            d > self.settings.hide_deadzone
        } else {
            d > self.settings.show_deadzone
        };
        by_distance
            || (self.settings.trust_presence_flag && presence_flag)
            || (self.settings.pinch_counts_as_presence && self.state.pinch_stable)
    }

    /// Fresh data that no longer claims presence: keep the cursor for `hide_grace_sec`.
    fn hold_absent(&mut self, now: Timestamp) {
        self.filter.stop();
        let within_grace = self
            .state
            .last_seen_time
            .is_some_and(|t| now.secs_since(t) <= self.settings.hide_grace_sec);
        if !within_grace {
            self.drop_presence();
        }
        self.freeze_output();
    }

    /// Stale data: hold while either grace window is still open.
    fn hold_stale(&mut self, now: Timestamp) {
        self.filter.stop();
        let within_valid = self
            .state
            .last_valid_time
            .is_some_and(|t| now.secs_since(t) <= self.settings.valid_grace_sec);
        let within_seen = self
            .state
            .last_seen_time
            .is_some_and(|t| now.secs_since(t) <= self.settings.hide_grace_sec);
        if !(within_valid || within_seen) {
            self.drop_presence();
        }
        self.freeze_output();
    }

    fn drop_presence(&mut self) {
        if self.state.present {
            debug!("pointer presence lost");
        }
        self.state.present = false;
        self.state.presence_since = None;
    }

    fn freeze_output(&mut self) {
        if let Some(filtered) = self.filter.value() {
            self.state.filtered_position = filtered;
            self.state.predicted_position = filtered;
        }
        self.state.filtered_velocity = Vec2::ZERO;
    }

    fn publish_position(&mut self, sample_time: Timestamp, now: Timestamp) {
        let Some(filtered) = self.filter.value() else {
            return;
        };
        let velocity = self.filter.velocity();
        let age = now
            .secs_since(sample_time)
            .clamp(0.0, self.settings.max_sample_age.max(0.0));
        let lead = age + self.settings.extra_lead;
        let cap = self.settings.max_predict_step.max(0.0);
        let step = Vec2::new(
            (velocity.x * lead).clamp(-cap, cap),
            (velocity.y * lead).clamp(-cap, cap),
        );

        self.state.filtered_position = filtered;
        self.state.filtered_velocity = velocity;
        self.state.predicted_position = filtered.offset(step);
    }

    /// Low-pass the boolean pinch flag, then a Schmitt trigger. Stale samples release the pinch.
    fn update_pinch(&mut self, raw: &RawSample, dt: f64) {
        let target = if raw.valid && raw.pinching { 1.0 } else { 0.0 };
        let a = time_constant_alpha(self.settings.pinch_smooth_sec, dt);
        let lowpass = lerp(self.state.pinch_lowpass, target, a).clamp(0.0, 1.0);
        self.state.pinch_lowpass = lowpass;

        if !self.state.pinch_stable && lowpass >= self.settings.pinch_on_threshold {
            self.state.pinch_stable = true;
        } else if self.state.pinch_stable && lowpass <= self.settings.pinch_off_threshold {
            self.state.pinch_stable = false;
        }
    }

    fn update_fade(&mut self, now: Timestamp, dt: f64) {
        let min_visible_open = self
            .shown_at
            .is_some_and(|t| now.secs_since(t) < self.settings.min_visible_sec);
        let alpha = if self.state.present || min_visible_open {
            self.fade.step(1.0, self.settings.appear_fade_sec, dt)
        } else {
            self.fade.step(0.0, self.settings.disappear_fade_sec, dt)
        };
        self.state.visible_alpha = alpha.clamp(0.0, 1.0);
    }
}
