// Pinch-drag scrolling: pointer travel along one axis moves a normalized scroll position.

use serde::{Deserialize, Serialize};

use crate::config::{Axis, ScrollConfig};
use crate::types::PointerInput;

/// Scroll state reported with every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollFrame {
    /// Normalized scroll position in [0,1].
    pub position: f64,
    pub dragging: bool,
}

#[derive(Debug, Clone)]
pub struct ScrollController {
    config: ScrollConfig,
    position: f64,
    anchor: Option<f64>,
}

impl ScrollController {
    pub fn new(config: ScrollConfig) -> Self {
        ScrollController {
            config,
            position: 0.0,
            anchor: None,
        }
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// The host scrolled by other means (wheel, layout change).
    pub fn set_position(&mut self, position: f64) {
        if position.is_finite() {
            self.position = position.clamp(0.0, 1.0);
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.anchor.is_some()
    }

    /// Stale input freezes the drag in place; releasing the pinch ends it.
    pub fn update(&mut self, input: &PointerInput) -> ScrollFrame {
        if input.fresh {
            self.drag(input);
        }
        ScrollFrame {
            position: self.position,
            dragging: self.is_dragging(),
        }
    }

    fn drag(&mut self, input: &PointerInput) {
        if self.config.require_pinch && !input.pinch_stable {
            self.anchor = None;
            return;
        }

        let along = match self.config.axis {
            Axis::Horizontal => input.position.x,
            Axis::Vertical => input.position.y,
        };
        let anchor = match self.anchor {
            Some(anchor) => anchor,
            None => {
                self.anchor = Some(along);
                return;
            }
        };

        let mut delta = along - anchor;
        if self.config.invert {
            delta = -delta;
        }
        // Small motion accumulates against the same anchor until it clears the dead zone.
        if delta.abs() < self.config.dead_zone {
            return;
        }

        self.position = (self.position + delta * self.config.speed).clamp(0.0, 1.0);
        self.anchor = Some(along);
    }
}
