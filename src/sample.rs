// Latest-sample hand-off between the tracker feed and the render tick.
// Producers overwrite, the tick copies. Newer samples always supersede unread ones.

use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{NormalizedCoord, RawSample, Timestamp};

/// What the feed last delivered, before any freshness check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceivedSample {
    pub position: NormalizedCoord,
    pub pinching: bool,
    pub presence_flag: bool,
    pub fist: bool,
    pub received_at: Timestamp,
}

/// Shared single-value slot. Clone it to hand a producer end to another thread.
#[derive(Debug, Clone)]
pub struct SampleSlot {
    latest: Arc<Mutex<Option<ReceivedSample>>>,
    data_timeout_sec: f64,
}

impl SampleSlot {
    pub fn new(data_timeout_sec: f64) -> Self {
        SampleSlot {
            latest: Arc::new(Mutex::new(None)),
            data_timeout_sec: data_timeout_sec.max(0.0),
        }
    }

    pub fn data_timeout_sec(&self) -> f64 {
        self.data_timeout_sec
    }

    /// Replace whatever is stored with `sample`.
    pub fn publish(&self, sample: ReceivedSample) {
        *self.lock() = Some(sample);
    }

    /// Parse one tracker packet and publish it. A malformed packet leaves the slot untouched.
    pub fn publish_json(&self, json: &str, received_at: Timestamp) -> Result<(), EngineError> {
        let payload = HandPayload::from_json(json).map_err(|e| {
            warn!("rejected tracker payload: {}", e);
            e
        })?;
        self.publish(payload.into_sample(received_at));
        Ok(())
    }

    /// Copy-on-read snapshot, tagged valid only if the sample is younger than the timeout.
    pub fn snapshot(&self, now: Timestamp) -> RawSample {
        let latest = *self.lock();
        match latest {
            Some(s) => RawSample {
                position: s.position,
                pinching: s.pinching,
                presence_flag: s.presence_flag,
                fist: s.fist,
                sample_time: s.received_at,
                valid: now.secs_since(s.received_at) < self.data_timeout_sec,
            },
            None => RawSample::invalid(),
        }
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<ReceivedSample>> {
        // The guarded value is a plain Copy; a panicked writer cannot leave it half-written.
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Pointer position as sent by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PayloadPoint {
    pub x: f64,
    pub y: f64,
}

/// One landmark of a pose or hand skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub visibility: f64,
}

/// JSON packet of the hand/body tracker. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HandPayload {
    pub hand_detected: bool,
    pub pointer_position: Option<PayloadPoint>,
    pub is_pinching: bool,
    pub is_fist: bool,
    pub left_hand_detected: bool,
    pub right_hand_detected: bool,
    pub left_hand: Vec<Landmark>,
    pub right_hand: Vec<Landmark>,
    pub body_landmarks: Vec<Landmark>,
    /// Sender-side clock; informational only, freshness uses receipt time.
    pub timestamp: f64,
}

impl HandPayload {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::InvalidPayload(e.to_string()))
    }

    /// Combined presence: the explicit flag or any hand skeleton.
    pub fn hand_present(&self) -> bool {
        self.hand_detected
            || self.left_hand_detected
            || self.right_hand_detected
            || !self.left_hand.is_empty()
            || !self.right_hand.is_empty()
    }

    /// A packet without a pointer keeps the pointer parked at the screen center.
    pub fn into_sample(self, received_at: Timestamp) -> ReceivedSample {
        let position = self
            .pointer_position
            .map(|p| NormalizedCoord::new(p.x, p.y))
            .unwrap_or_else(NormalizedCoord::center);
        ReceivedSample {
            position,
            pinching: self.is_pinching,
            presence_flag: self.hand_present(),
            fist: self.is_fist,
            received_at,
        }
    }
}
