//! Widget configuration.
//!
//! The visualizer variants on the essay pages differ only in these constants,
//! so one validated struct parametrizes the whole component.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use thiserror::Error;

use crate::controller::MAX_DT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(&'static str),

    #[error("config parse failed: {0}")]
    Parse(String),
}

/// Per-metric easing rates (1/s). Higher converges faster.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EaseRates {
    pub nc: f64,
    pub err: f64,
    pub engagement: f64,
}

impl Default for EaseRates {
    fn default() -> Self {
        Self {
            nc: 2.2,
            err: 1.8,
            engagement: 1.4,
        }
    }
}

/// Token pool sizing: a base count scaled by canvas area, then clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParticleBudget {
    pub base: u32,
    pub min: u32,
    pub max: u32,
    /// Used instead of the above when the host asks for reduced motion.
    pub reduced_base: u32,
    pub reduced_min: u32,
    pub reduced_max: u32,
}

impl Default for ParticleBudget {
    fn default() -> Self {
        Self {
            base: 1250,
            min: 700,
            max: 1700,
            reduced_base: 520,
            reduced_min: 420,
            reduced_max: 700,
        }
    }
}

impl ParticleBudget {
    /// `(base, min, max)` for the requested motion preference.
    pub fn bounds(&self, reduced_motion: bool) -> (u32, u32, u32) {
        if reduced_motion {
            (self.reduced_base, self.reduced_min, self.reduced_max)
        } else {
            (self.base, self.min, self.max)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AltrionConfig {
    /// Non-compliance level separating productive friction from collapse.
    pub critical_nc: f64,
    /// Arbitration asks for a rationale once `nc >= critical_nc * near_critical_ratio`.
    pub near_critical_ratio: f64,
    /// G3 staleness threshold (case age, hours).
    pub tau_hours: f64,
    /// G2 value-conflict threshold on the value delta (negative).
    pub theta: f64,
    pub ease_rates: EaseRates,
    pub particle_budget: ParticleBudget,
    /// Pool only resizes when the target moves by at least this many tokens.
    pub resize_hysteresis: u32,
    /// Seconds of simulated time between synthesized cases.
    pub case_interval_s: f64,
    pub case_log_capacity: usize,
    /// Number of segments in the analytic error curve.
    pub curve_samples: usize,
    /// Amplitude of each of the two nc noise sinusoids.
    pub noise_amplitude: f64,
}

impl Default for AltrionConfig {
    fn default() -> Self {
        Self {
            critical_nc: 0.40,
            near_critical_ratio: 0.90,
            tau_hours: 72.0,
            theta: -0.20,
            ease_rates: EaseRates::default(),
            particle_budget: ParticleBudget::default(),
            resize_hysteresis: 60,
            // ~96 frames at 60 fps.
            case_interval_s: 1.6,
            case_log_capacity: 10,
            curve_samples: 80,
            noise_amplitude: 0.007,
        }
    }
}

fn finite_positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl AltrionConfig {
    /// Validate the configuration, returning an error if any field is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.critical_nc.is_finite() && self.critical_nc > 0.0 && self.critical_nc <= 1.0) {
            return Err(ConfigError::Invalid("critical_nc must be in (0, 1]"));
        }
        if !finite_positive(self.near_critical_ratio) || self.near_critical_ratio > 1.0 {
            return Err(ConfigError::Invalid("near_critical_ratio must be in (0, 1]"));
        }
        if !finite_positive(self.tau_hours) {
            return Err(ConfigError::Invalid("tau_hours must be finite and > 0"));
        }
        if !self.theta.is_finite() || self.theta > 0.0 {
            return Err(ConfigError::Invalid("theta must be finite and <= 0"));
        }
        let r = self.ease_rates;
        if !(finite_positive(r.nc) && finite_positive(r.err) && finite_positive(r.engagement)) {
            return Err(ConfigError::Invalid("ease rates must be finite and > 0"));
        }
        let b = self.particle_budget;
        if b.min > b.max || b.reduced_min > b.reduced_max {
            return Err(ConfigError::Invalid("particle budget min must be <= max"));
        }
        // At most one case is decided per tick.
        if !(self.case_interval_s.is_finite() && self.case_interval_s >= MAX_DT) {
            return Err(ConfigError::Invalid("case_interval_s must be finite and >= 0.05"));
        }
        if self.case_log_capacity == 0 {
            return Err(ConfigError::Invalid("case_log_capacity must be >= 1"));
        }
        if self.curve_samples < 2 {
            return Err(ConfigError::Invalid("curve_samples must be >= 2"));
        }
        if !self.noise_amplitude.is_finite() || self.noise_amplitude < 0.0 {
            return Err(ConfigError::Invalid("noise_amplitude must be finite and >= 0"));
        }
        Ok(())
    }

    /// Parse a (possibly partial) JSON document; missing fields take defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Threshold at which arbitration starts asking for a rationale.
    pub fn near_critical_nc(&self) -> f64 {
        self.critical_nc * self.near_critical_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AltrionConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_critical_nc_is_rejected() {
        let cfg = AltrionConfig {
            critical_nc: 0.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn nan_rate_is_rejected() {
        let mut cfg = AltrionConfig::default();
        cfg.ease_rates.err = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn case_interval_below_one_tick_is_rejected() {
        let mut cfg = AltrionConfig::default();
        cfg.case_interval_s = 0.001;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        cfg.case_interval_s = MAX_DT;
        cfg.validate().unwrap();
    }

    #[test]
    fn budget_bounds_follow_motion_preference() {
        let b = ParticleBudget::default();
        assert_eq!(b.bounds(false), (1250, 700, 1700));
        assert_eq!(b.bounds(true), (520, 420, 700));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_fills_defaults() {
        let cfg = AltrionConfig::from_json_str(r#"{ "critical_nc": 0.35, "ease_rates": { "nc": 3.0 } }"#)
            .unwrap();
        assert_eq!(cfg.critical_nc, 0.35);
        assert_eq!(cfg.ease_rates.nc, 3.0);
        assert_eq!(cfg.ease_rates.err, 1.8);
        assert_eq!(cfg.case_log_capacity, 10);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn invalid_json_values_are_rejected() {
        let err = AltrionConfig::from_json_str(r#"{ "critical_nc": -1.0 }"#).unwrap_err();
        assert!(err.to_string().contains("critical_nc"));
        assert!(matches!(
            AltrionConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
