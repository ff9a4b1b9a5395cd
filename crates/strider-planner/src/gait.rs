//! Gait scheduler for statically stable walking.
//!
//! A single stride phase in [0, 1) is advanced every tick. Each leg's own
//! phase is the stride phase shifted by a per-leg lag; the first `duty`
//! fraction of that phase is stance and the remainder is swing.
//!
//! Timing parameters (cycle duration, duty factors, pair lag) depend on the
//! commanded speed through a [`VelocityLaw`]. Velocity changes are written to
//! the next and next-next cycle buffers only, so the cycle in progress keeps
//! its timing until the stride phase wraps.

use serde::{Deserialize, Serialize};
use strider_core::{ConfigError, LegId, LegTable};

// ---------------------------------------------------------------------------
// Velocity laws
// ---------------------------------------------------------------------------

/// Blend between a parameter's low-speed and high-speed values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VelocityLaw {
    /// Constant low-speed value.
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "lin")]
    Linear,
    /// Fast change close to the low-speed bound.
    #[serde(rename = "log")]
    Log,
    /// Fast change close to the high-speed bound.
    #[serde(rename = "exp")]
    Exp,
}

impl VelocityLaw {
    /// Map a normalized speed `t` in [0, 1] to a blend factor in [0, 1].
    ///
    /// Every law is monotonic with `blend(0) = 0` and `blend(1) = 1`.
    pub fn blend(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::None => 0.0,
            Self::Linear => t,
            Self::Log => (1.0 + t * (std::f64::consts::E - 1.0)).ln(),
            Self::Exp => (t.exp() - 1.0) / (std::f64::consts::E - 1.0),
        }
    }
}

const fn default_max_velocity() -> f64 {
    1.0
}

/// A gait parameter interpolated over commanded speed.
///
/// `value` is used at or below `min_velocity`, `max_value` at or above
/// `max_velocity`. When `max_value` is omitted the parameter is constant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledParameter {
    pub value: f64,
    #[serde(default)]
    pub law: VelocityLaw,
    #[serde(default)]
    pub min_velocity: f64,
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,
    #[serde(default)]
    pub max_value: Option<f64>,
}

impl ScheduledParameter {
    pub const fn constant(value: f64) -> Self {
        Self {
            value,
            law: VelocityLaw::None,
            min_velocity: 0.0,
            max_velocity: 1.0,
            max_value: None,
        }
    }

    pub const fn with_law(
        law: VelocityLaw,
        (min_velocity, value): (f64, f64),
        (max_velocity, max_value): (f64, f64),
    ) -> Self {
        Self {
            value,
            law,
            min_velocity,
            max_velocity,
            max_value: Some(max_value),
        }
    }

    /// Value at or above `max_velocity`.
    pub fn high_speed_value(&self) -> f64 {
        self.max_value.unwrap_or(self.value)
    }

    /// Evaluate the parameter at commanded speed `velocity`.
    pub fn at(&self, velocity: f64) -> f64 {
        if self.law == VelocityLaw::None || velocity <= self.min_velocity {
            return self.value;
        }
        let y_max = self.high_speed_value();
        if velocity >= self.max_velocity {
            return y_max;
        }
        let t = (velocity - self.min_velocity) / (self.max_velocity - self.min_velocity);
        self.value + self.law.blend(t) * (y_max - self.value)
    }

    fn validate(&self, field: &str, range: impl Fn(f64) -> bool) -> Result<(), ConfigError> {
        if !range(self.value) || !range(self.high_speed_value()) {
            return Err(ConfigError::invalid(
                field,
                format!(
                    "values {} / {} out of range",
                    self.value,
                    self.high_speed_value()
                ),
            ));
        }
        if self.law != VelocityLaw::None && self.max_velocity <= self.min_velocity {
            return Err(ConfigError::invalid(
                field,
                "max_velocity must exceed min_velocity",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GaitConfig
// ---------------------------------------------------------------------------

const fn default_cycle_duration() -> ScheduledParameter {
    ScheduledParameter::with_law(VelocityLaw::Linear, (0.0, 2.0), (0.3, 1.2))
}
const fn default_duty_factor() -> ScheduledParameter {
    ScheduledParameter::constant(0.8)
}
const fn default_lag() -> f64 {
    0.5
}
const fn default_pair_lag() -> ScheduledParameter {
    ScheduledParameter::constant(0.75)
}

/// Gait timing table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaitConfig {
    /// Stride duration in seconds.
    #[serde(default = "default_cycle_duration")]
    pub cycle_duration: ScheduledParameter,
    #[serde(default = "default_duty_factor")]
    pub fore_duty_factor: ScheduledParameter,
    #[serde(default = "default_duty_factor")]
    pub hind_duty_factor: ScheduledParameter,
    /// Phase lag of the right fore leg relative to the left fore leg.
    #[serde(default = "default_lag")]
    pub fore_lag: f64,
    /// Phase lag of the right hind leg relative to the left hind leg.
    #[serde(default = "default_lag")]
    pub hind_lag: f64,
    /// Phase lag of the hind pair relative to the fore pair.
    #[serde(default = "default_pair_lag")]
    pub pair_lag: ScheduledParameter,
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            cycle_duration: default_cycle_duration(),
            fore_duty_factor: default_duty_factor(),
            hind_duty_factor: default_duty_factor(),
            fore_lag: default_lag(),
            hind_lag: default_lag(),
            pair_lag: default_pair_lag(),
        }
    }
}

impl GaitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cycle_duration
            .validate("gait.cycle_duration", |v| v > 0.0)?;
        self.fore_duty_factor
            .validate("gait.fore_duty_factor", |v| v > 0.0 && v <= 1.0)?;
        self.hind_duty_factor
            .validate("gait.hind_duty_factor", |v| v > 0.0 && v <= 1.0)?;
        self.pair_lag
            .validate("gait.pair_lag", |v| (0.0..1.0).contains(&v))?;
        for (field, lag) in [("gait.fore_lag", self.fore_lag), ("gait.hind_lag", self.hind_lag)] {
            if !(0.0..1.0).contains(&lag) {
                return Err(ConfigError::invalid(field, format!("{lag} not in [0, 1)")));
            }
        }
        Ok(())
    }

    /// Timing of one stride at commanded speed `velocity`.
    pub fn timing_at(&self, velocity: f64) -> GaitTiming {
        GaitTiming {
            cycle_duration: self.cycle_duration.at(velocity),
            fore_duty_factor: self.fore_duty_factor.at(velocity),
            hind_duty_factor: self.hind_duty_factor.at(velocity),
            fore_lag: self.fore_lag,
            hind_lag: self.hind_lag,
            pair_lag: self.pair_lag.at(velocity),
        }
    }
}

/// Resolved timing parameters for one stride.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaitTiming {
    pub cycle_duration: f64,
    pub fore_duty_factor: f64,
    pub hind_duty_factor: f64,
    pub fore_lag: f64,
    pub hind_lag: f64,
    pub pair_lag: f64,
}

impl GaitTiming {
    pub fn duty_factor(&self, leg: LegId) -> f64 {
        if leg.is_fore() {
            self.fore_duty_factor
        } else {
            self.hind_duty_factor
        }
    }

    /// Stride phase at which `leg` starts its stance.
    pub fn offset(&self, leg: LegId) -> f64 {
        let offset = match leg {
            LegId::LeftFore => 0.0,
            LegId::RightFore => self.fore_lag,
            LegId::LeftHind => self.pair_lag,
            LegId::RightHind => self.pair_lag + self.hind_lag,
        };
        offset.rem_euclid(1.0)
    }

    /// Phase of `leg` within its own cycle, in [0, 1).
    fn leg_phase(&self, leg: LegId, stride_phase: f64) -> f64 {
        (stride_phase - self.offset(leg)).rem_euclid(1.0)
    }
}

// ---------------------------------------------------------------------------
// GaitScheduler
// ---------------------------------------------------------------------------

/// Stride phase clock with velocity-scheduled, double-buffered timing.
#[derive(Clone, Debug)]
pub struct GaitScheduler {
    config: GaitConfig,
    stride_phase: f64,
    current: GaitTiming,
    next: GaitTiming,
    next_next: GaitTiming,
    velocity: f64,
    num_cycles: u64,
}

impl GaitScheduler {
    pub fn new(config: GaitConfig) -> Self {
        let timing = config.timing_at(0.0);
        Self {
            config,
            stride_phase: 0.0,
            current: timing,
            next: timing,
            next_next: timing,
            velocity: 0.0,
            num_cycles: 0,
        }
    }

    /// Advance the stride phase by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        let phase = self.stride_phase + dt / self.current.cycle_duration;
        if phase >= 1.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let wraps = phase.floor() as u64;
            self.num_cycles += wraps;
            // Past two strides every buffer holds the same timing.
            for _ in 0..wraps.min(2) {
                self.current = self.next;
                self.next = self.next_next;
            }
        }
        self.stride_phase = wrap_phase(phase);
    }

    /// Current stride phase in [0, 1).
    pub const fn stride_phase(&self) -> f64 {
        self.stride_phase
    }

    pub fn set_stride_phase(&mut self, phase: f64) {
        self.stride_phase = wrap_phase(phase);
    }

    /// Number of completed strides.
    pub const fn num_cycles(&self) -> u64 {
        self.num_cycles
    }

    /// Commanded speed the buffered timing was last computed for.
    pub const fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Recompute the timing of the next and next-next strides for commanded
    /// speed `velocity`. The stride in progress is left untouched.
    pub fn set_velocity(&mut self, velocity: f64) {
        self.velocity = velocity;
        let timing = self.config.timing_at(velocity);
        self.next = timing;
        self.next_next = timing;
    }

    pub const fn timing(&self) -> &GaitTiming {
        &self.current
    }

    pub const fn next_timing(&self) -> &GaitTiming {
        &self.next
    }

    pub const fn config(&self) -> &GaitConfig {
        &self.config
    }

    /// Normalized stance phase of `leg`, or -1 while it is scheduled to swing.
    pub fn stance_phase(&self, leg: LegId) -> f64 {
        let duty = self.current.duty_factor(leg);
        let phase = self.current.leg_phase(leg, self.stride_phase);
        if duty >= 1.0 {
            phase
        } else if phase < duty {
            phase / duty
        } else {
            -1.0
        }
    }

    /// Normalized swing phase of `leg`, or -1 while it is scheduled in stance.
    pub fn swing_phase(&self, leg: LegId) -> f64 {
        let duty = self.current.duty_factor(leg);
        let phase = self.current.leg_phase(leg, self.stride_phase);
        if duty >= 1.0 || phase < duty {
            -1.0
        } else {
            (phase - duty) / (1.0 - duty)
        }
    }

    /// Stance duration of `leg` in the current stride (seconds).
    pub fn stance_duration(&self, leg: LegId) -> f64 {
        self.current.duty_factor(leg) * self.current.cycle_duration
    }

    /// Swing duration of `leg` in the current stride (seconds).
    pub fn swing_duration(&self, leg: LegId) -> f64 {
        (1.0 - self.current.duty_factor(leg)) * self.current.cycle_duration
    }

    /// Shortest stance duration at zero speed, used to size timeouts.
    pub fn nominal_stance_duration(&self) -> f64 {
        let timing = self.config.timing_at(0.0);
        timing.fore_duty_factor.min(timing.hind_duty_factor) * timing.cycle_duration
    }

    /// Per-leg (stance, swing) phases for the current stride phase.
    pub fn leg_phases(&self) -> LegTable<(f64, f64)> {
        LegTable::from_fn(|leg| (self.stance_phase(leg), self.swing_phase(leg)))
    }
}

/// Wrap into [0, 1), mapping rounding results of exactly 1.0 to 0.0.
fn wrap_phase(phase: f64) -> f64 {
    let wrapped = phase.rem_euclid(1.0);
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_gait() -> GaitConfig {
        GaitConfig {
            cycle_duration: ScheduledParameter::constant(1.0),
            ..GaitConfig::default()
        }
    }

    #[test]
    fn stride_phase_wraps_and_counts_cycles() {
        let mut gait = GaitScheduler::new(constant_gait());
        for _ in 0..250 {
            gait.advance(0.01);
            assert!((0.0..1.0).contains(&gait.stride_phase()));
        }
        assert_eq!(gait.num_cycles(), 2);
        assert_relative_eq!(gait.stride_phase(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn set_stride_phase_wraps() {
        let mut gait = GaitScheduler::new(constant_gait());
        gait.set_stride_phase(1.25);
        assert_relative_eq!(gait.stride_phase(), 0.25, epsilon = 1e-12);
        gait.set_stride_phase(-0.25);
        assert_relative_eq!(gait.stride_phase(), 0.75, epsilon = 1e-12);
    }

    #[test]
    fn exactly_one_phase_active_per_leg() {
        let mut gait = GaitScheduler::new(GaitConfig::default());
        for _ in 0..500 {
            gait.advance(0.007);
            for leg in LegId::ALL {
                let stance = gait.stance_phase(leg);
                let swing = gait.swing_phase(leg);
                assert!(
                    (stance >= 0.0) ^ (swing >= 0.0),
                    "{leg}: stance {stance}, swing {swing}"
                );
                assert!(stance < 1.0 && swing < 1.0);
            }
        }
    }

    #[test]
    fn crawl_liftoff_order() {
        let gait = GaitScheduler::new(GaitConfig::default());
        let timing = gait.timing();
        // Swing starts at offset + duty.
        let liftoff = |leg| (timing.offset(leg) + timing.duty_factor(leg)).rem_euclid(1.0);
        assert_relative_eq!(liftoff(LegId::RightHind), 0.05, epsilon = 1e-12);
        assert_relative_eq!(liftoff(LegId::RightFore), 0.3, epsilon = 1e-12);
        assert_relative_eq!(liftoff(LegId::LeftHind), 0.55, epsilon = 1e-12);
        assert_relative_eq!(liftoff(LegId::LeftFore), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn zero_velocity_no_law_keeps_nominal_split() {
        let config = GaitConfig {
            cycle_duration: ScheduledParameter::constant(2.0),
            ..GaitConfig::default()
        };
        let mut gait = GaitScheduler::new(config);
        gait.set_velocity(0.0);
        gait.set_stride_phase(0.9);
        // LF leg phase 0.9 with duty 0.8: swing phase 0.5.
        assert_relative_eq!(gait.swing_phase(LegId::LeftFore), 0.5, epsilon = 1e-9);
        assert_relative_eq!(gait.stance_duration(LegId::LeftFore), 1.6, epsilon = 1e-12);
        assert_relative_eq!(gait.swing_duration(LegId::LeftFore), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn always_stance_with_full_duty() {
        let config = GaitConfig {
            fore_duty_factor: ScheduledParameter::constant(1.0),
            ..GaitConfig::default()
        };
        let mut gait = GaitScheduler::new(config);
        gait.set_stride_phase(0.99);
        assert!(gait.stance_phase(LegId::LeftFore) >= 0.0);
        assert_relative_eq!(gait.swing_phase(LegId::RightFore), -1.0);
    }

    #[test]
    fn linear_law_bounds_and_monotonic() {
        let p = ScheduledParameter::with_law(VelocityLaw::Linear, (0.1, 2.0), (0.5, 1.0));
        assert_relative_eq!(p.at(0.1), 2.0);
        assert_relative_eq!(p.at(0.5), 1.0);
        assert_relative_eq!(p.at(-3.0), 2.0);
        assert_relative_eq!(p.at(9.0), 1.0);
        assert_relative_eq!(p.at(0.3), 1.5, epsilon = 1e-12);

        let mut last = p.at(0.1);
        for i in 1..=40 {
            let v = p.at(0.1 + 0.01 * f64::from(i));
            assert!(v <= last + 1e-12);
            last = v;
        }
    }

    #[test]
    fn log_and_exp_laws_bend_opposite_ways() {
        for law in [VelocityLaw::Log, VelocityLaw::Exp] {
            assert_relative_eq!(law.blend(0.0), 0.0, epsilon = 1e-12);
            assert_relative_eq!(law.blend(1.0), 1.0, epsilon = 1e-12);
        }
        assert!(VelocityLaw::Log.blend(0.5) > 0.5);
        assert!(VelocityLaw::Exp.blend(0.5) < 0.5);
    }

    #[test]
    fn none_law_ignores_velocity() {
        let p = ScheduledParameter::with_law(VelocityLaw::None, (0.0, 0.8), (1.0, 0.5));
        assert_relative_eq!(p.at(0.0), 0.8);
        assert_relative_eq!(p.at(2.0), 0.8);
    }

    #[test]
    fn set_velocity_only_affects_following_cycles() {
        let mut gait = GaitScheduler::new(GaitConfig::default());
        gait.set_stride_phase(0.5);
        gait.set_velocity(0.3);
        assert_relative_eq!(gait.timing().cycle_duration, 2.0);
        assert_relative_eq!(gait.next_timing().cycle_duration, 1.2, epsilon = 1e-12);

        // Half a stride at the old timing reaches the wrap.
        gait.advance(1.0 - 1e-9);
        assert_relative_eq!(gait.timing().cycle_duration, 2.0);
        gait.advance(0.01);
        assert_relative_eq!(gait.timing().cycle_duration, 1.2, epsilon = 1e-12);
        assert_eq!(gait.num_cycles(), 1);
    }

    #[test]
    fn tick_spanning_two_strides_rotates_both_buffers() {
        let config = GaitConfig::default();
        let mut gait = GaitScheduler::new(config.clone());
        gait.next_next = config.timing_at(0.3);

        gait.advance(5.0);
        assert_eq!(gait.num_cycles(), 2);
        assert_relative_eq!(gait.stride_phase(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(gait.timing().cycle_duration, 1.2, epsilon = 1e-12);
        assert_relative_eq!(gait.next_timing().cycle_duration, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn law_names_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            p: ScheduledParameter,
        }
        let w: Wrapper = toml::from_str(
            "p = { value = 2.0, law = \"exp\", min_velocity = 0.0, max_velocity = 0.4, max_value = 1.0 }",
        )
        .unwrap();
        assert_eq!(w.p.law, VelocityLaw::Exp);
        assert_relative_eq!(w.p.at(0.4), 1.0);
    }

    #[test]
    fn validate_rejects_bad_duty_factor() {
        let config = GaitConfig {
            hind_duty_factor: ScheduledParameter::constant(1.5),
            ..GaitConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gait.hind_duty_factor"));
        assert!(GaitConfig::default().validate().is_ok());
    }
}
