// Engine configuration passed from the host as JSON. Every field has a serde default so a
// partial (or empty) object is valid. Distances are normalized, durations are seconds.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// A published sample stays fresh this long after it was received.
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: f64,
    #[serde(default)]
    pub stabilizer: StabilizerSettings,
    #[serde(default)]
    pub dwell: DwellConfig,
    #[serde(default)]
    pub pinch: PinchConfig,
    #[serde(default)]
    pub scroll: Option<ScrollConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            data_timeout_sec: default_data_timeout(),
            stabilizer: StabilizerSettings::default(),
            dwell: DwellConfig::default(),
            pinch: PinchConfig::default(),
            scroll: None,
        }
    }
}

impl EngineConfig {
    /// Parse, validate and sanitize a JSON config.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config.sanitized())
    }

    /// Reject values the core cannot clamp into something meaningful.
    pub fn validate(&self) -> Result<(), EngineError> {
        check_finite("data_timeout_sec", self.data_timeout_sec)?;
        self.stabilizer.validate()?;
        self.dwell.validate()?;
        self.pinch.validate()?;
        if let Some(scroll) = &self.scroll {
            scroll.validate()?;
        }
        Ok(())
    }

    /// Copy with every duration and distance clamped to be non-negative.
    pub fn sanitized(&self) -> Self {
        EngineConfig {
            data_timeout_sec: self.data_timeout_sec.max(0.0),
            stabilizer: self.stabilizer.sanitized(),
            dwell: self.dwell.sanitized(),
            pinch: self.pinch.sanitized(),
            scroll: self.scroll.as_ref().map(ScrollConfig::sanitized),
        }
    }
}

fn default_data_timeout() -> f64 {
    0.40
}

/// Tuning for the pointer stabilizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizerSettings {
    /// Flip x before processing (front-facing cameras).
    #[serde(default)]
    pub mirror_x: bool,
    /// Raw motion smaller than this is treated as sensor noise.
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f64,
    /// Center distance needed to newly claim presence.
    #[serde(default = "default_show_deadzone")]
    pub show_deadzone: f64,
    /// Center distance needed to keep presence once claimed.
    #[serde(default = "default_hide_deadzone")]
    pub hide_deadzone: f64,
    #[serde(default = "default_true")]
    pub pinch_counts_as_presence: bool,
    /// Accept the sender's explicit hand-detected flag as presence.
    #[serde(default = "default_true")]
    pub trust_presence_flag: bool,
    #[serde(default = "default_hide_grace")]
    pub hide_grace_sec: f64,
    #[serde(default = "default_valid_grace")]
    pub valid_grace_sec: f64,
    #[serde(default = "default_min_cutoff")]
    pub min_cutoff: f64,
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_d_cutoff")]
    pub d_cutoff: f64,
    /// Fixed extra prediction on top of the measured sample age.
    #[serde(default = "default_extra_lead")]
    pub extra_lead: f64,
    /// Upper bound for the measured sample age used in prediction.
    #[serde(default = "default_max_sample_age")]
    pub max_sample_age: f64,
    /// Per-axis cap on the prediction step.
    #[serde(default = "default_max_predict_step")]
    pub max_predict_step: f64,
    #[serde(default = "default_pinch_smooth")]
    pub pinch_smooth_sec: f64,
    #[serde(default = "default_pinch_on")]
    pub pinch_on_threshold: f64,
    #[serde(default = "default_pinch_off")]
    pub pinch_off_threshold: f64,
    #[serde(default = "default_appear_fade")]
    pub appear_fade_sec: f64,
    #[serde(default = "default_disappear_fade")]
    pub disappear_fade_sec: f64,
    #[serde(default = "default_min_visible")]
    pub min_visible_sec: f64,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        StabilizerSettings {
            mirror_x: false,
            movement_threshold: default_movement_threshold(),
            show_deadzone: default_show_deadzone(),
            hide_deadzone: default_hide_deadzone(),
            pinch_counts_as_presence: true,
            trust_presence_flag: true,
            hide_grace_sec: default_hide_grace(),
            valid_grace_sec: default_valid_grace(),
            min_cutoff: default_min_cutoff(),
            beta: default_beta(),
            d_cutoff: default_d_cutoff(),
            extra_lead: default_extra_lead(),
            max_sample_age: default_max_sample_age(),
            max_predict_step: default_max_predict_step(),
            pinch_smooth_sec: default_pinch_smooth(),
            pinch_on_threshold: default_pinch_on(),
            pinch_off_threshold: default_pinch_off(),
            appear_fade_sec: default_appear_fade(),
            disappear_fade_sec: default_disappear_fade(),
            min_visible_sec: default_min_visible(),
        }
    }
}

impl StabilizerSettings {
    fn validate(&self) -> Result<(), EngineError> {
        for (name, v) in [
            ("movement_threshold", self.movement_threshold),
            ("show_deadzone", self.show_deadzone),
            ("hide_deadzone", self.hide_deadzone),
            ("hide_grace_sec", self.hide_grace_sec),
            ("valid_grace_sec", self.valid_grace_sec),
            ("min_cutoff", self.min_cutoff),
            ("beta", self.beta),
            ("d_cutoff", self.d_cutoff),
            ("extra_lead", self.extra_lead),
            ("max_sample_age", self.max_sample_age),
            ("max_predict_step", self.max_predict_step),
            ("pinch_smooth_sec", self.pinch_smooth_sec),
            ("pinch_on_threshold", self.pinch_on_threshold),
            ("pinch_off_threshold", self.pinch_off_threshold),
            ("appear_fade_sec", self.appear_fade_sec),
            ("disappear_fade_sec", self.disappear_fade_sec),
            ("min_visible_sec", self.min_visible_sec),
        ] {
            check_finite(name, v)?;
        }
        if self.pinch_on_threshold <= self.pinch_off_threshold {
            return Err(EngineError::InvalidConfig(format!(
                "pinch_on_threshold ({}) must be above pinch_off_threshold ({})",
                self.pinch_on_threshold, self.pinch_off_threshold
            )));
        }
        Ok(())
    }

    fn sanitized(&self) -> Self {
        StabilizerSettings {
            movement_threshold: self.movement_threshold.max(0.0),
            show_deadzone: self.show_deadzone.max(0.0),
            hide_deadzone: self.hide_deadzone.max(0.0),
            hide_grace_sec: self.hide_grace_sec.max(0.0),
            valid_grace_sec: self.valid_grace_sec.max(0.0),
            min_cutoff: self.min_cutoff.max(0.0),
            beta: self.beta.max(0.0),
            d_cutoff: self.d_cutoff.max(0.0),
            extra_lead: self.extra_lead.max(0.0),
            max_sample_age: self.max_sample_age.max(0.0),
            max_predict_step: self.max_predict_step.max(0.0),
            pinch_smooth_sec: self.pinch_smooth_sec.max(0.0),
            pinch_on_threshold: self.pinch_on_threshold.clamp(0.0, 1.0),
            pinch_off_threshold: self.pinch_off_threshold.clamp(0.0, 1.0),
            appear_fade_sec: self.appear_fade_sec.max(0.0),
            disappear_fade_sec: self.disappear_fade_sec.max(0.0),
            min_visible_sec: self.min_visible_sec.max(0.0),
            ..self.clone()
        }
    }
}

fn default_movement_threshold() -> f64 {
    0.02
}

fn default_show_deadzone() -> f64 {
    0.020
}

fn default_hide_deadzone() -> f64 {
    0.010
}

fn default_hide_grace() -> f64 {
    0.30
}

fn default_valid_grace() -> f64 {
    0.50
}

fn default_min_cutoff() -> f64 {
    7.0
}

fn default_beta() -> f64 {
    0.55
}

fn default_d_cutoff() -> f64 {
    1.5
}

fn default_extra_lead() -> f64 {
    0.006
}

fn default_max_sample_age() -> f64 {
    0.05
}

fn default_max_predict_step() -> f64 {
    0.06
}

fn default_pinch_smooth() -> f64 {
    0.06
}

fn default_pinch_on() -> f64 {
    0.6
}

fn default_pinch_off() -> f64 {
    0.4
}

fn default_appear_fade() -> f64 {
    0.06
}

fn default_disappear_fade() -> f64 {
    0.12
}

fn default_min_visible() -> f64 {
    0.35
}

/// What happens when the pointer comes back to a target whose hold has partly decayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResumePolicy {
    /// The palm-delay gate must be satisfied again before the fill resumes.
    #[default]
    Rearm,
    /// Fill resumes on the first qualifying tick if some hold is left.
    Immediate,
}

/// Dwell tuning shared by every dwell target built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwellConfig {
    /// Hit-test padding while not hovering.
    #[serde(default = "default_enter_pad")]
    pub enter_pad: f64,
    /// Hit-test padding while hovering.
    #[serde(default = "default_exit_pad")]
    pub exit_pad: f64,
    #[serde(default = "default_dwell_seconds")]
    pub dwell_seconds: f64,
    /// Time for a full fill to drain to empty.
    #[serde(default = "default_reset_seconds")]
    pub reset_seconds: f64,
    #[serde(default = "default_palm_delay")]
    pub palm_delay_seconds: f64,
    /// How long the pointer may be away before the hold starts draining.
    #[serde(default = "default_grace_seconds")]
    pub grace_seconds: f64,
    #[serde(default = "default_spawn_block")]
    pub spawn_block_seconds: f64,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: f64,
    #[serde(default = "default_pinch_debounce")]
    pub pinch_debounce_seconds: f64,
    #[serde(default = "default_true")]
    pub only_palm: bool,
    #[serde(default = "default_true")]
    pub reset_progress_on_pinch: bool,
    #[serde(default = "default_true")]
    pub require_enter_from_outside: bool,
    /// Count any fresh sample as presence even if the stabilizer says the hand is gone.
    #[serde(default)]
    pub allow_pointer_as_presence: bool,
    #[serde(default = "default_true")]
    pub exclusive_hover: bool,
    #[serde(default)]
    pub resume_policy: ResumePolicy,
    /// Pointer speed (normalized units per second) above which the palm gate is interrupted.
    #[serde(default)]
    pub max_pointer_speed: Option<f64>,
}

impl Default for DwellConfig {
    fn default() -> Self {
        DwellConfig {
            enter_pad: default_enter_pad(),
            exit_pad: default_exit_pad(),
            dwell_seconds: default_dwell_seconds(),
            reset_seconds: default_reset_seconds(),
            palm_delay_seconds: default_palm_delay(),
            grace_seconds: default_grace_seconds(),
            spawn_block_seconds: default_spawn_block(),
            cooldown_seconds: default_cooldown(),
            pinch_debounce_seconds: default_pinch_debounce(),
            only_palm: true,
            reset_progress_on_pinch: true,
            require_enter_from_outside: true,
            allow_pointer_as_presence: false,
            exclusive_hover: true,
            resume_policy: ResumePolicy::default(),
            max_pointer_speed: None,
        }
    }
}

impl DwellConfig {
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        for (name, v) in [
            ("enter_pad", self.enter_pad),
            ("exit_pad", self.exit_pad),
            ("dwell_seconds", self.dwell_seconds),
            ("reset_seconds", self.reset_seconds),
            ("palm_delay_seconds", self.palm_delay_seconds),
            ("grace_seconds", self.grace_seconds),
            ("spawn_block_seconds", self.spawn_block_seconds),
            ("cooldown_seconds", self.cooldown_seconds),
            ("pinch_debounce_seconds", self.pinch_debounce_seconds),
        ] {
            check_finite(name, v)?;
        }
        if let Some(speed) = self.max_pointer_speed {
            check_finite("max_pointer_speed", speed)?;
            if speed <= 0.0 {
                return Err(EngineError::InvalidConfig(
                    "max_pointer_speed must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Pads may be negative (shrinking the hitbox); durations may not.
    pub fn sanitized(&self) -> Self {
        DwellConfig {
            dwell_seconds: self.dwell_seconds.max(0.0),
            reset_seconds: self.reset_seconds.max(0.0),
            palm_delay_seconds: self.palm_delay_seconds.max(0.0),
            grace_seconds: self.grace_seconds.max(0.0),
            spawn_block_seconds: self.spawn_block_seconds.max(0.0),
            cooldown_seconds: self.cooldown_seconds.max(0.0),
            pinch_debounce_seconds: self.pinch_debounce_seconds.max(0.0),
            ..self.clone()
        }
    }
}

fn default_enter_pad() -> f64 {
    0.02
}

fn default_exit_pad() -> f64 {
    0.03
}

fn default_dwell_seconds() -> f64 {
    2.0
}

fn default_reset_seconds() -> f64 {
    2.0
}

fn default_palm_delay() -> f64 {
    3.0
}

fn default_grace_seconds() -> f64 {
    0.40
}

fn default_spawn_block() -> f64 {
    0.75
}

fn default_cooldown() -> f64 {
    0.75
}

fn default_pinch_debounce() -> f64 {
    0.20
}

/// Tuning for pinch-to-select regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinchConfig {
    #[serde(default = "default_pinch_enter_pad")]
    pub enter_pad: f64,
    #[serde(default = "default_pinch_exit_pad")]
    pub exit_pad: f64,
    #[serde(default = "default_pinch_cooldown")]
    pub cooldown_seconds: f64,
}

impl Default for PinchConfig {
    fn default() -> Self {
        PinchConfig {
            enter_pad: default_pinch_enter_pad(),
            exit_pad: default_pinch_exit_pad(),
            cooldown_seconds: default_pinch_cooldown(),
        }
    }
}

impl PinchConfig {
    fn validate(&self) -> Result<(), EngineError> {
        check_finite("pinch.enter_pad", self.enter_pad)?;
        check_finite("pinch.exit_pad", self.exit_pad)?;
        check_finite("pinch.cooldown_seconds", self.cooldown_seconds)
    }

    fn sanitized(&self) -> Self {
        PinchConfig {
            cooldown_seconds: self.cooldown_seconds.max(0.0),
            ..self.clone()
        }
    }
}

fn default_pinch_enter_pad() -> f64 {
    0.003
}

fn default_pinch_exit_pad() -> f64 {
    0.005
}

fn default_pinch_cooldown() -> f64 {
    0.25
}

/// Scroll axis of a pinch-drag scroller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Axis {
    #[default]
    Horizontal,
    Vertical,
}

/// Tuning for pinch-drag scrolling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollConfig {
    #[serde(default)]
    pub axis: Axis,
    #[serde(default = "default_true")]
    pub require_pinch: bool,
    #[serde(default = "default_scroll_dead_zone")]
    pub dead_zone: f64,
    #[serde(default = "default_scroll_speed")]
    pub speed: f64,
    #[serde(default = "default_true")]
    pub invert: bool,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        ScrollConfig {
            axis: Axis::default(),
            require_pinch: true,
            dead_zone: default_scroll_dead_zone(),
            speed: default_scroll_speed(),
            invert: true,
        }
    }
}

impl ScrollConfig {
    fn validate(&self) -> Result<(), EngineError> {
        check_finite("scroll.dead_zone", self.dead_zone)?;
        check_finite("scroll.speed", self.speed)
    }

    fn sanitized(&self) -> Self {
        ScrollConfig {
            dead_zone: self.dead_zone.max(0.0),
            ..self.clone()
        }
    }
}

fn default_scroll_dead_zone() -> f64 {
    0.02
}

fn default_scroll_speed() -> f64 {
    1.5
}

fn default_true() -> bool {
    true
}

fn check_finite(name: &str, value: f64) -> Result<(), EngineError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::InvalidConfig(format!(
            "{} must be a finite number, got {}",
            name, value
        )))
    }
}
