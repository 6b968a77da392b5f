// One input session: sample slot -> stabilizer -> arbitrated regions -> selections.
// The host calls `tick` once per rendered frame; producers publish into the slot at any rate.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::arbiter::HoverArbiter;
use crate::config::{DwellConfig, EngineConfig, PinchConfig};
use crate::dwell::{DwellPhase, DwellTarget};
use crate::error::EngineError;
use crate::pinch::{PinchTarget, PinchVisual};
use crate::sample::SampleSlot;
use crate::scroll::{ScrollController, ScrollFrame};
use crate::stabilizer::{PointerStabilizer, StabilizedState};
use crate::types::*;

/// A registered region.
#[derive(Debug, Clone)]
pub enum Interactive {
    Dwell(DwellTarget),
    Pinch(PinchTarget),
}

impl Interactive {
    fn set_region(&mut self, region: HitRegion) {
        match self {
            Interactive::Dwell(t) => t.set_region(region),
            Interactive::Pinch(t) => t.set_region(region),
        }
    }

    fn start_cooldown(&mut self, now: Timestamp, seconds: f64) {
        match self {
            Interactive::Dwell(t) => t.start_cooldown(now, seconds),
            Interactive::Pinch(t) => t.start_cooldown(now, seconds),
        }
    }
}

/// What the cursor should draw this frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorFrame {
    pub position: NormalizedCoord,
    pub filtered_position: NormalizedCoord,
    pub visible_alpha: f64,
    pub present: bool,
    pub pinching: bool,
    pub fresh: bool,
}

impl From<&StabilizedState> for CursorFrame {
    fn from(state: &StabilizedState) -> Self {
        CursorFrame {
            position: state.predicted_position,
            filtered_position: state.filtered_position,
            visible_alpha: state.visible_alpha,
            present: state.present,
            pinching: state.pinch_stable,
            fresh: state.fresh,
        }
    }
}

/// Per-region feedback for the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetFrame {
    Dwell {
        id: TargetId,
        phase: DwellPhase,
        fill: f64,
        ring_visible: bool,
        hovering: bool,
    },
    Pinch {
        id: TargetId,
        visual: PinchVisual,
        hovering: bool,
    },
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    pub tick: u64,
    pub cursor: CursorFrame,
    pub targets: Vec<TargetFrame>,
    pub selections: Vec<SelectionEvent>,
    pub scroll: Option<ScrollFrame>,
}

pub struct InputSession {
    slot: SampleSlot,
    stabilizer: PointerStabilizer,
    dwell_config: Arc<DwellConfig>,
    pinch_config: PinchConfig,
    targets: BTreeMap<TargetId, Interactive>,
    arbiter: HoverArbiter,
    scroll: Option<ScrollController>,
    tick: u64,
}

impl InputSession {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let config = config.sanitized();
        Ok(InputSession {
            slot: SampleSlot::new(config.data_timeout_sec),
            stabilizer: PointerStabilizer::new(config.stabilizer),
            dwell_config: Arc::new(config.dwell),
            pinch_config: config.pinch,
            targets: BTreeMap::new(),
            arbiter: HoverArbiter::new(),
            scroll: config.scroll.map(ScrollController::new),
            tick: 0,
        })
    }

    /// Producer end of the sample slot. Clone it onto the receiving thread.
    pub fn slot(&self) -> &SampleSlot {
        &self.slot
    }

    pub fn publish_json(&self, json: &str, received_at: Timestamp) -> Result<(), EngineError> {
        self.slot.publish_json(json, received_at)
    }

    pub fn cursor(&self) -> &StabilizedState {
        self.stabilizer.state()
    }

    /// Register a dwell region with the session-wide dwell tuning.
    pub fn add_dwell_target(
        &mut self,
        id: TargetId,
        region: HitRegion,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        let config = Arc::clone(&self.dwell_config);
        self.insert(id, Interactive::Dwell(DwellTarget::new(id, config, region, now)))
    }

    /// Register a dwell region with its own tuning.
    pub fn add_dwell_target_with(
        &mut self,
        id: TargetId,
        config: DwellConfig,
        region: HitRegion,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        config.validate()?;
        let config = Arc::new(config.sanitized());
        self.insert(id, Interactive::Dwell(DwellTarget::new(id, config, region, now)))
    }

    pub fn add_pinch_target(&mut self, id: TargetId, region: HitRegion) -> Result<(), EngineError> {
        let target = PinchTarget::new(id, self.pinch_config.clone(), region);
        self.insert(id, Interactive::Pinch(target))
    }

    pub fn set_region(&mut self, id: TargetId, region: HitRegion) -> Result<(), EngineError> {
        self.target_mut(id)?.set_region(region);
        Ok(())
    }

    pub fn remove_target(&mut self, id: TargetId) -> Result<(), EngineError> {
        self.targets
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::UnknownTarget(id))
    }

    pub fn start_cooldown(
        &mut self,
        id: TargetId,
        now: Timestamp,
        seconds: f64,
    ) -> Result<(), EngineError> {
        self.target_mut(id)?.start_cooldown(now, seconds);
        Ok(())
    }

    /// Block every region, e.g. right after a menu was rebuilt under the hand.
    pub fn start_cooldown_all(&mut self, now: Timestamp, seconds: f64) {
        for target in self.targets.values_mut() {
            target.start_cooldown(now, seconds);
        }
    }

    pub fn target(&self, id: TargetId) -> Option<&Interactive> {
        self.targets.get(&id)
    }

    pub fn dwell_target(&self, id: TargetId) -> Option<&DwellTarget> {
        match self.targets.get(&id) {
            Some(Interactive::Dwell(t)) => Some(t),
            _ => None,
        }
    }

    pub fn pinch_target(&self, id: TargetId) -> Option<&PinchTarget> {
        match self.targets.get(&id) {
            Some(Interactive::Pinch(t)) => Some(t),
            _ => None,
        }
    }

    pub fn scroll_mut(&mut self) -> Option<&mut ScrollController> {
        self.scroll.as_mut()
    }

    /// Advance one render frame. `dt` is the unscaled frame time in seconds.
    pub fn tick(&mut self, now: Timestamp, dt: f64) -> FrameOutput {
        self.tick += 1;
        let raw = self.slot.snapshot(now);
        let state = *self.stabilizer.update(&raw, now, dt);
        let input = state.pointer_input();

        let winner = self.arbitrate(&input, now);

        let mut selections = Vec::new();
        let mut frames = Vec::with_capacity(self.targets.len());
        for (id, target) in self.targets.iter_mut() {
            let event = match target {
                Interactive::Dwell(t) => {
                    let hit = input.fresh && t.hit_test(&input.position).is_some();
                    let granted = !t.config().exclusive_hover || winner == Some(*id);
                    let event = t.update(&input, hit, granted, now, dt);
                    let s = t.state();
                    frames.push(TargetFrame::Dwell {
                        id: *id,
                        phase: s.phase,
                        fill: s.fill,
                        ring_visible: s.ring_visible,
                        hovering: s.hovering,
                    });
                    event
                }
                Interactive::Pinch(t) => {
                    let event = t.update(&input, now);
                    frames.push(TargetFrame::Pinch {
                        id: *id,
                        visual: t.visual(),
                        hovering: t.is_hovering(),
                    });
                    event
                }
            };
            selections.extend(event);
        }

        if !selections.is_empty() {
            debug!("tick {}: {} selection(s)", self.tick, selections.len());
        }

        let scroll = self.scroll.as_mut().map(|s| s.update(&input));

        FrameOutput {
            tick: self.tick,
            cursor: CursorFrame::from(&state),
            targets: frames,
            selections,
            scroll,
        }
    }

    /// Collect this tick's claims from exclusive dwell regions that can act on them.
    /// A region that could not progress anyway never takes hover from its neighbours.
    fn arbitrate(&mut self, input: &PointerInput, now: Timestamp) -> Option<TargetId> {
        self.arbiter.begin_tick(self.tick);
        if !input.fresh {
            return None;
        }
        for (id, target) in &self.targets {
            if let Interactive::Dwell(t) = target {
                if !t.config().exclusive_hover || !t.can_claim(input, now) {
                    continue;
                }
                if let Some(distance) = t.hit_test(&input.position) {
                    self.arbiter.offer(self.tick, *id, distance);
                }
            }
        }
        self.arbiter.winner()
    }

    fn insert(&mut self, id: TargetId, target: Interactive) -> Result<(), EngineError> {
        if self.targets.contains_key(&id) {
            return Err(EngineError::DuplicateTarget(id));
        }
        self.targets.insert(id, target);
        Ok(())
    }

    fn target_mut(&mut self, id: TargetId) -> Result<&mut Interactive, EngineError> {
        self.targets.get_mut(&id).ok_or(EngineError::UnknownTarget(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScrollConfig;
    use crate::sample::ReceivedSample;

    const DT: f64 = 0.015625;
    const DT_US: u64 = 15_625;

    fn quick_config() -> EngineConfig {
        EngineConfig {
            dwell: DwellConfig {
                dwell_seconds: 0.5,
                palm_delay_seconds: 0.0,
                spawn_block_seconds: 0.0,
                require_enter_from_outside: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    struct Harness {
        session: InputSession,
        now: u64,
    }

    impl Harness {
        fn new(config: EngineConfig) -> Self {
            Harness {
                session: InputSession::new(config).unwrap(),
                now: 1_000_000,
            }
        }

        fn at(&self) -> Timestamp {
            Timestamp::from_micros(self.now)
        }

        /// Publish a sample and tick once.
        fn frame(&mut self, x: f64, y: f64, pinching: bool) -> FrameOutput {
            self.now += DT_US;
            self.session.slot().publish(ReceivedSample {
                position: NormalizedCoord::new(x, y),
                pinching,
                presence_flag: true,
                fist: false,
                received_at: self.at(),
            });
            self.session.tick(self.at(), DT)
        }

        /// Tick without new data.
        fn idle(&mut self) -> FrameOutput {
            self.now += DT_US;
            self.session.tick(self.at(), DT)
        }
    }

    fn rect(x: f64, y: f64, w: f64, h: f64) -> HitRegion {
        HitRegion::new(NormalizedRect::new(x, y, w, h))
    }

    fn dwell_fill(frame: &FrameOutput, id: u32) -> f64 {
        frame
            .targets
            .iter()
            .find_map(|t| match t {
                TargetFrame::Dwell { id: tid, fill, .. } if tid.as_u32() == id => Some(*fill),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn dwell_selection_end_to_end() {
        let mut h = Harness::new(quick_config());
        let now = h.at();
        h.session
            .add_dwell_target(TargetId::new(1), rect(0.1, 0.1, 0.2, 0.2), now)
            .unwrap();

        let mut selections = Vec::new();
        for _ in 0..64 {
            selections.extend(h.frame(0.2, 0.2, false).selections);
        }
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].target, TargetId::new(1));
        assert_eq!(selections[0].kind, SelectionKind::Dwell);
    }

    #[test]
    fn overlapping_regions_only_closest_progresses() {
        let mut h = Harness::new(quick_config());
        let now = h.at();
        h.session
            .add_dwell_target(TargetId::new(1), rect(0.1, 0.1, 0.3, 0.3), now)
            .unwrap();
        h.session
            .add_dwell_target(TargetId::new(2), rect(0.2, 0.2, 0.3, 0.3), now)
            .unwrap();

        // Inside both; closer to the center of target 2 (0.35, 0.35).
        let mut frame = h.frame(0.33, 0.33, false);
        for _ in 0..10 {
            frame = h.frame(0.33, 0.33, false);
        }
        assert!(dwell_fill(&frame, 2) > 0.0);
        assert_eq!(dwell_fill(&frame, 1), 0.0);
    }

    #[test]
    fn spawned_overlap_waits_for_the_hand_to_leave() {
        let mut config = quick_config();
        config.dwell.require_enter_from_outside = true;
        let mut h = Harness::new(config);
        let now = h.at();
        h.session
            .add_dwell_target(TargetId::new(1), rect(0.1, 0.1, 0.3, 0.3), now)
            .unwrap();
        h.session
            .add_dwell_target(TargetId::new(2), rect(0.2, 0.2, 0.3, 0.3), now)
            .unwrap();

        // The menu appeared under the hand, which drifts but stays inside both regions.
        let mut selections = Vec::new();
        for _ in 0..10 {
            selections.extend(h.frame(0.28, 0.28, false).selections);
        }
        for _ in 0..100 {
            selections.extend(h.frame(0.33, 0.33, false).selections);
        }
        assert!(selections.is_empty());
        let first = h.session.dwell_target(TargetId::new(1)).unwrap();
        assert!(!first.state().ever_exited_since_activation);

        // Leave and come back: the nearer region selects first.
        for _ in 0..30 {
            h.frame(0.8, 0.8, false);
        }
        for _ in 0..60 {
            selections.extend(h.frame(0.33, 0.33, false).selections);
        }
        assert!(!selections.is_empty());
        assert_eq!(selections[0].target, TargetId::new(2));
    }

    #[test]
    fn per_target_config_is_validated() {
        let mut h = Harness::new(quick_config());
        let now = h.at();
        let config = DwellConfig {
            max_pointer_speed: Some(0.0),
            ..Default::default()
        };
        let result = h
            .session
            .add_dwell_target_with(TargetId::new(1), config, rect(0.1, 0.1, 0.2, 0.2), now);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
        assert!(h.session.target(TargetId::new(1)).is_none());
    }

    #[test]
    fn non_exclusive_regions_progress_together() {
        let mut config = quick_config();
        config.dwell.exclusive_hover = false;
        let mut h = Harness::new(config);
        let now = h.at();
        h.session
            .add_dwell_target(TargetId::new(1), rect(0.1, 0.1, 0.3, 0.3), now)
            .unwrap();
        h.session
            .add_dwell_target(TargetId::new(2), rect(0.2, 0.2, 0.3, 0.3), now)
            .unwrap();
        let mut frame = h.frame(0.33, 0.33, false);
        for _ in 0..10 {
            frame = h.frame(0.33, 0.33, false);
        }
        assert!(dwell_fill(&frame, 1) > 0.0);
        assert!(dwell_fill(&frame, 2) > 0.0);
    }

    #[test]
    fn blocked_region_does_not_steal_hover() {
        let mut h = Harness::new(quick_config());
        let now = h.at();
        h.session
            .add_dwell_target(TargetId::new(1), rect(0.1, 0.1, 0.3, 0.3), now)
            .unwrap();
        h.session
            .add_dwell_target(TargetId::new(2), rect(0.2, 0.2, 0.3, 0.3), now)
            .unwrap();
        h.session.start_cooldown(TargetId::new(2), now, 10.0).unwrap();

        let mut frame = h.frame(0.33, 0.33, false);
        for _ in 0..10 {
            frame = h.frame(0.33, 0.33, false);
        }
        assert!(dwell_fill(&frame, 1) > 0.0);
    }

    #[test]
    fn pinch_target_fires_and_suppresses_dwell() {
        let mut h = Harness::new(quick_config());
        let now = h.at();
        h.session
            .add_dwell_target(TargetId::new(1), rect(0.6, 0.6, 0.2, 0.2), now)
            .unwrap();
        h.session
            .add_pinch_target(TargetId::new(2), rect(0.6, 0.6, 0.2, 0.2))
            .unwrap();

        for _ in 0..8 {
            h.frame(0.7, 0.7, false);
        }
        // The debounced pinch needs a few ticks to cross the on-threshold.
        let mut selections = Vec::new();
        for _ in 0..30 {
            selections.extend(h.frame(0.7, 0.7, true).selections);
        }
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].kind, SelectionKind::Pinch);
        assert_eq!(
            h.session.dwell_target(TargetId::new(1)).unwrap().phase(),
            DwellPhase::PinchSuppressed
        );
    }

    #[test]
    fn stale_feed_drains_progress() {
        let mut config = quick_config();
        config.dwell.dwell_seconds = 2.0;
        config.dwell.reset_seconds = 2.0;
        let mut h = Harness::new(config);
        let now = h.at();
        h.session
            .add_dwell_target(TargetId::new(1), rect(0.1, 0.1, 0.2, 0.2), now)
            .unwrap();
        let mut frame = h.frame(0.2, 0.2, false);
        for _ in 0..16 {
            frame = h.frame(0.2, 0.2, false);
        }
        let filled = dwell_fill(&frame, 1);
        assert!(filled > 0.0);

        // The last sample stays fresh for the 0.4 s data timeout, then the target drains.
        for _ in 0..100 {
            frame = h.idle();
        }
        assert!(!frame.cursor.fresh);
        assert!(dwell_fill(&frame, 1) < filled);
    }

    #[test]
    fn registry_errors() {
        let mut h = Harness::new(quick_config());
        let now = h.at();
        let id = TargetId::new(7);
        h.session.add_pinch_target(id, rect(0.0, 0.0, 0.1, 0.1)).unwrap();
        assert_eq!(
            h.session.add_dwell_target(id, rect(0.0, 0.0, 0.1, 0.1), now),
            Err(EngineError::DuplicateTarget(id))
        );
        h.session.remove_target(id).unwrap();
        assert_eq!(
            h.session.set_region(id, rect(0.0, 0.0, 0.1, 0.1)),
            Err(EngineError::UnknownTarget(id))
        );
        assert_eq!(
            h.session.start_cooldown(id, now, 1.0),
            Err(EngineError::UnknownTarget(id))
        );
    }

    #[test]
    fn moved_region_follows_layout() {
        let mut h = Harness::new(quick_config());
        let now = h.at();
        let id = TargetId::new(1);
        h.session.add_dwell_target(id, rect(0.1, 0.1, 0.1, 0.1), now).unwrap();
        h.session.set_region(id, rect(0.7, 0.1, 0.1, 0.1)).unwrap();
        let mut frame = h.frame(0.75, 0.15, false);
        for _ in 0..4 {
            frame = h.frame(0.75, 0.15, false);
        }
        assert!(dwell_fill(&frame, 1) > 0.0);
    }

    #[test]
    fn cooldown_all_blocks_every_region() {
        let mut h = Harness::new(quick_config());
        let now = h.at();
        h.session
            .add_dwell_target(TargetId::new(1), rect(0.1, 0.1, 0.2, 0.2), now)
            .unwrap();
        h.session.start_cooldown_all(now, 5.0);
        let mut selections = Vec::new();
        for _ in 0..100 {
            selections.extend(h.frame(0.2, 0.2, false).selections);
        }
        assert!(selections.is_empty());
    }

    #[test]
    fn pinch_drag_scrolls() {
        let config = EngineConfig {
            scroll: Some(ScrollConfig::default()),
            ..quick_config()
        };
        let mut h = Harness::new(config);
        h.session.scroll_mut().unwrap().set_position(0.5);
        for _ in 0..20 {
            h.frame(0.3, 0.2, true);
        }
        let mut frame = h.frame(0.3, 0.2, true);
        for i in 1..=20 {
            frame = h.frame(0.3 + 0.01 * i as f64, 0.2, true);
        }
        let scroll = frame.scroll.unwrap();
        assert!(scroll.dragging);
        // Dragged right with inversion on: content moves back.
        assert!(scroll.position < 0.5);
    }

    #[test]
    fn frame_serializes_with_kind_tags() {
        let mut h = Harness::new(quick_config());
        h.session
            .add_pinch_target(TargetId::new(4), rect(0.0, 0.0, 0.1, 0.1))
            .unwrap();
        let frame = h.frame(0.9, 0.9, false);
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"kind\":\"pinch\""));
        assert!(json.contains("\"visual\":\"Normal\""));
    }
}
