// Strong typing over raw floats. Newtypes for timestamps and target ids, normalized geometry.
// All positions live in normalized screen space: (0,0) top-left, (1,1) bottom-right.

use serde::{Deserialize, Serialize};

/// Timestamp in microseconds on a monotonic, unscaled clock. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_micros(us: u64) -> Self {
        Timestamp(us)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Timestamp((secs * 1_000_000.0).round() as u64)
        } else {
            Timestamp(0)
        }
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Seconds elapsed since `earlier`. Zero if `earlier` is in the future.
    pub fn secs_since(&self, earlier: Timestamp) -> f64 {
        self.0.saturating_sub(earlier.0) as f64 / 1_000_000.0
    }

    /// This timestamp shifted forward by `secs` (negative and non-finite shifts are ignored).
    pub fn add_secs(&self, secs: f64) -> Timestamp {
        if secs.is_finite() && secs > 0.0 {
            Timestamp(self.0.saturating_add((secs * 1_000_000.0).round() as u64))
        } else {
            *self
        }
    }
}

/// Identifier of an interactive region, assigned by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct TargetId(u32);

impl TargetId {
    pub fn new(id: u32) -> Self {
        TargetId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Free 2D vector in normalized units (velocities, deltas). Not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn scale(&self, k: f64) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }
}

/// Normalized coordinate (0.0 to 1.0, resolution-independent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedCoord {
    pub x: f64,
    pub y: f64,
}

impl NormalizedCoord {
    /// Clamps into [0,1]². Non-finite components collapse to the screen center.
    pub fn new(x: f64, y: f64) -> Self {
        NormalizedCoord {
            x: clamp01_or_center(x),
            y: clamp01_or_center(y),
        }
    }

    pub fn center() -> Self {
        NormalizedCoord { x: 0.5, y: 0.5 }
    }

    pub fn mirrored_x(&self) -> Self {
        NormalizedCoord {
            x: 1.0 - self.x,
            y: self.y,
        }
    }

    pub fn delta_to(&self, other: &NormalizedCoord) -> Vec2 {
        Vec2::new(other.x - self.x, other.y - self.y)
    }

    pub fn distance(&self, other: &NormalizedCoord) -> f64 {
        self.delta_to(other).length()
    }

    /// Offset by a vector, clamped back into [0,1]².
    pub fn offset(&self, v: Vec2) -> Self {
        NormalizedCoord::new(self.x + v.x, self.y + v.y)
    }

    /// Chebyshev distance from the screen center.
    pub fn center_distance(&self) -> f64 {
        (self.x - 0.5).abs().max((self.y - 0.5).abs())
    }
}

fn clamp01_or_center(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Normalized rectangle (0-1 coordinates), origin at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        NormalizedRect {
            x,
            y,
            width,
            height,
        }
    }

    /// Center clamped onto the screen, for drawing.
    pub fn center(&self) -> NormalizedCoord {
        NormalizedCoord::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Distance from `p` to the true center, which may lie off-screen for a scrolled item.
    pub fn distance_to_center(&self, p: &NormalizedCoord) -> f64 {
        let dx = p.x - (self.x + self.width / 2.0);
        let dy = p.y - (self.y + self.height / 2.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Non-finite or empty rectangles never contain anything.
    pub fn is_degenerate(&self) -> bool {
        !(self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    pub fn contains(&self, p: &NormalizedCoord) -> bool {
        self.contains_padded(p, 0.0)
    }

    /// Containment with `pad` added on every side. A negative pad shrinks the rectangle.
    pub fn contains_padded(&self, p: &NormalizedCoord, pad: f64) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let pad = if pad.is_finite() { pad } else { 0.0 };
        let min_x = self.x - pad;
        let min_y = self.y - pad;
        let max_x = self.x + self.width + pad;
        let max_y = self.y + self.height + pad;
        p.x >= min_x && p.x <= max_x && p.y >= min_y && p.y <= max_y
    }
}

/// Geometry of an interactive region: its hitbox plus an optional fence (e.g. a scroll viewport).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct HitRegion {
    pub rect: NormalizedRect,
    #[serde(default)]
    pub viewport: Option<NormalizedRect>,
}

impl HitRegion {
    pub fn new(rect: NormalizedRect) -> Self {
        HitRegion {
            rect,
            viewport: None,
        }
    }

    pub fn with_viewport(mut self, viewport: NormalizedRect) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Padded hit test. Returns the pointer's distance to the rect center when inside.
    /// A point outside the viewport is never inside, whatever the padding.
    pub fn hit(&self, p: &NormalizedCoord, pad: f64) -> Option<f64> {
        if let Some(viewport) = &self.viewport {
            if !viewport.contains(p) {
                return None;
            }
        }
        if self.rect.contains_padded(p, pad) {
            Some(self.rect.distance_to_center(p))
        } else {
            None
        }
    }
}

/// Pointer signal consumed by interactive regions, derived from the stabilized state each tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    pub position: NormalizedCoord,
    pub present: bool,
    pub pinch_stable: bool,
    pub fist: bool,
    /// False when the underlying sample was stale this tick.
    pub fresh: bool,
}

impl PointerInput {
    /// A fresh, present open palm at `position`.
    pub fn palm(position: NormalizedCoord) -> Self {
        PointerInput {
            position,
            present: true,
            pinch_stable: false,
            fist: false,
            fresh: true,
        }
    }
}

/// One pointer sample as seen by the tick, already checked for freshness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub position: NormalizedCoord,
    pub pinching: bool,
    /// Explicit hand-detected signal. Some senders never set it.
    pub presence_flag: bool,
    pub fist: bool,
    /// When the sample was received.
    pub sample_time: Timestamp,
    /// False once the sample is older than the freshness window.
    pub valid: bool,
}

impl RawSample {
    /// Sentinel returned when nothing fresh has arrived.
    pub fn invalid() -> Self {
        RawSample {
            position: NormalizedCoord::center(),
            pinching: false,
            presence_flag: false,
            fist: false,
            sample_time: Timestamp::default(),
            valid: false,
        }
    }

    /// A valid open-palm sample at `position`.
    pub fn palm(position: NormalizedCoord, sample_time: Timestamp) -> Self {
        RawSample {
            position,
            pinching: false,
            presence_flag: true,
            fist: false,
            sample_time,
            valid: true,
        }
    }
}

/// Which gesture produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionKind {
    Dwell,
    Pinch,
}

/// Emitted once per activation cycle when a region is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEvent {
    pub target: TargetId,
    pub kind: SelectionKind,
    pub at: Timestamp,
}
