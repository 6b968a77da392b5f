// Pinch-to-select regions: fire on the rising edge of the debounced pinch while hovered.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::PinchConfig;
use crate::types::*;

/// Highlight state for the host to tint the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PinchVisual {
    #[default]
    Normal,
    Hover,
    /// The tick the pinch landed.
    Pressed,
}

#[derive(Debug, Clone)]
pub struct PinchTarget {
    id: TargetId,
    config: PinchConfig,
    region: HitRegion,
    hovering: bool,
    prev_pinch: bool,
    cooldown_until: Timestamp,
    visual: PinchVisual,
}

impl PinchTarget {
    pub fn new(id: TargetId, config: PinchConfig, region: HitRegion) -> Self {
        PinchTarget {
            id,
            config,
            region,
            hovering: false,
            prev_pinch: false,
            cooldown_until: Timestamp::default(),
            visual: PinchVisual::Normal,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn region(&self) -> &HitRegion {
        &self.region
    }

    pub fn set_region(&mut self, region: HitRegion) {
        self.region = region;
    }

    pub fn visual(&self) -> PinchVisual {
        self.visual
    }

    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    pub fn is_blocked(&self, now: Timestamp) -> bool {
        now < self.cooldown_until
    }

    pub fn hit_test(&self, position: &NormalizedCoord) -> Option<f64> {
        let pad = if self.hovering {
            self.config.exit_pad
        } else {
            self.config.enter_pad
        };
        self.region.hit(position, pad)
    }

    /// A pinch that starts outside and is dragged in does not fire; only a fresh edge does.
    pub fn update(&mut self, input: &PointerInput, now: Timestamp) -> Option<SelectionEvent> {
        let pinching = input.fresh && input.pinch_stable;
        let rising = pinching && !self.prev_pinch;
        self.prev_pinch = pinching;

        if !input.fresh || self.is_blocked(now) {
            self.hovering = false;
            self.visual = PinchVisual::Normal;
            return None;
        }

        self.hovering = self.hit_test(&input.position).is_some();
        if !self.hovering {
            self.visual = PinchVisual::Normal;
            return None;
        }

        if !rising {
            self.visual = PinchVisual::Hover;
            return None;
        }

        debug!("pinch target {} selected", self.id.as_u32());
        self.start_cooldown(now, self.config.cooldown_seconds);
        self.visual = PinchVisual::Pressed;
        Some(SelectionEvent {
            target: self.id,
            kind: SelectionKind::Pinch,
            at: now,
        })
    }

    pub fn start_cooldown(&mut self, now: Timestamp, seconds: f64) {
        self.cooldown_until = now.add_secs(seconds);
        self.hovering = false;
        self.visual = PinchVisual::Normal;
    }
}
