//! Logistic compliance model.
//!
//! Three inputs in `[0, 1]` (fatigue `gamma`, `workload`, gate `friction`) drive
//! a target non-compliance level. Error and engagement targets are then derived
//! from the *smoothed* non-compliance, so the displayed metrics lag the inputs
//! the way an operator population would.

use crate::config::{AltrionConfig, EaseRates};

#[inline]
pub fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Cubic Hermite ease on `[0, 1]`; `t` is clamped first.
#[inline]
pub fn smoothstep(t: f64) -> f64 {
    let t = clamp(t, 0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Inputs as the host writes them. Always stored clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInputs {
    pub gamma: f64,
    pub workload: f64,
    pub friction: f64,
}

impl Default for ModelInputs {
    fn default() -> Self {
        Self {
            gamma: 0.50,
            workload: 0.55,
            friction: 0.62,
        }
    }
}

impl ModelInputs {
    pub fn new(gamma: f64, workload: f64, friction: f64) -> Self {
        Self {
            gamma: sanitize_unit(gamma, 0.50),
            workload: sanitize_unit(workload, 0.55),
            friction: sanitize_unit(friction, 0.62),
        }
    }
}

/// Clamp into `[0, 1]`; NaN and infinities coerce to `fallback`.
#[inline]
pub fn sanitize_unit(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        clamp(v, 0.0, 1.0)
    } else {
        fallback
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Targets {
    pub nc: f64,
    pub err: f64,
    pub engagement: f64,
}

/// Noise-free non-compliance baseline.
pub fn baseline_nc(inputs: &ModelInputs) -> f64 {
    let fatigue = clamp(0.15 + 0.95 * inputs.gamma, 0.0, 1.0);
    let load = clamp(0.10 + 1.10 * inputs.workload, 0.0, 1.25);
    let friction = clamp(inputs.friction, 0.0, 1.0);
    logistic((load * 1.35 + fatigue * 1.15 - friction * 1.25) * 2.6 - 1.25)
}

/// Bounded oscillation added on top of the baseline. Reproducible for a given `time`.
pub fn nc_noise(time: f64, perturbation: f64, amplitude: f64) -> f64 {
    ((time * 0.9).sin() + (time * 0.37 + 1.7).sin()) * amplitude + perturbation * 0.02
}

pub fn nc_target(inputs: &ModelInputs, time: f64, perturbation: f64, noise_amplitude: f64) -> f64 {
    clamp(
        baseline_nc(inputs) + nc_noise(time, perturbation, noise_amplitude),
        0.0,
        1.0,
    )
}

/// How far into the collapse band `nc` sits, eased, in `[0, 1]`.
pub fn collapse_factor(nc: f64, critical_nc: f64) -> f64 {
    smoothstep((nc - critical_nc) / 0.18)
}

pub fn error_target(nc: f64, friction: f64, critical_nc: f64) -> f64 {
    let friction = clamp(friction, 0.0, 1.0);
    let below = clamp(1.0 - nc / critical_nc, 0.0, 1.0);
    let regime = smoothstep(below);

    let error_base = 0.18 + 0.62 * nc;
    let benefit = 0.22 * friction * regime;
    let collapse_penalty = 0.40 * collapse_factor(nc, critical_nc);

    clamp(error_base - benefit + collapse_penalty, 0.01, 0.98)
}

pub fn engagement_target(nc: f64, friction: f64, critical_nc: f64) -> f64 {
    let friction = clamp(friction, 0.0, 1.0);
    let collapse = collapse_factor(nc, critical_nc);
    clamp(
        0.85 - 0.55 * nc + 0.25 * friction - 0.10 * collapse,
        0.05,
        0.98,
    )
}

/// All three targets. Error and engagement are evaluated at `nc`, the current
/// smoothed value, not at the nc target.
pub fn compute_targets(
    inputs: &ModelInputs,
    nc: f64,
    critical_nc: f64,
    time: f64,
    perturbation: f64,
    noise_amplitude: f64,
) -> Targets {
    Targets {
        nc: nc_target(inputs, time, perturbation, noise_amplitude),
        err: error_target(nc, inputs.friction, critical_nc),
        engagement: engagement_target(nc, inputs.friction, critical_nc),
    }
}

/// Exponential pursuit without overshoot; the result stays in `[0, 1]`.
#[inline]
pub fn ease(value: f64, target: f64, dt: f64, rate: f64) -> f64 {
    let k = clamp(dt * rate, 0.0, 1.0);
    clamp(value + (target - value) * k, 0.0, 1.0)
}

/// Smoothed outputs shown by the widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub nc: f64,
    pub err: f64,
    pub engagement: f64,
}

impl Metrics {
    pub const INITIAL: Metrics = Metrics {
        nc: 0.12,
        err: 0.06,
        engagement: 0.66,
    };

    /// Advance one tick. `nc` moves first; err/engagement chase targets computed
    /// from the freshly eased `nc`.
    pub fn advance(
        &mut self,
        dt: f64,
        inputs: &ModelInputs,
        cfg: &AltrionConfig,
        time: f64,
        perturbation: f64,
    ) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let EaseRates {
            nc: nc_rate,
            err: err_rate,
            engagement: eng_rate,
        } = cfg.ease_rates;

        let nc_t = nc_target(inputs, time, perturbation, cfg.noise_amplitude);
        self.nc = ease(self.nc, nc_t, dt, nc_rate);

        let err_t = error_target(self.nc, inputs.friction, cfg.critical_nc);
        self.err = ease(self.err, err_t, dt, err_rate);

        let eng_t = engagement_target(self.nc, inputs.friction, cfg.critical_nc);
        self.engagement = ease(self.engagement, eng_t, dt, eng_rate);
    }

    pub fn is_collapsed(&self, critical_nc: f64) -> bool {
        self.nc >= critical_nc
    }

    /// Integrity readout `P` shown beside the HUD.
    pub fn integrity(&self, critical_nc: f64) -> f64 {
        let collapse = collapse_factor(self.nc, critical_nc);
        clamp(
            1.0 - (0.75 * self.err + 0.35 * self.nc + 0.25 * collapse),
            0.001,
            0.999,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::INITIAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    LaminarFlow,
    Transitional,
    ShearLayer,
    RitualizedCompliance,
}

impl Regime {
    pub fn classify(nc: f64, critical_nc: f64) -> Self {
        if nc >= critical_nc {
            Regime::RitualizedCompliance
        } else if nc >= critical_nc * 0.78 {
            Regime::ShearLayer
        } else if nc >= critical_nc * 0.55 {
            Regime::Transitional
        } else {
            Regime::LaminarFlow
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Regime::LaminarFlow => "Laminar Flow",
            Regime::Transitional => "Transitional",
            Regime::ShearLayer => "Shear Layer",
            Regime::RitualizedCompliance => "Ritualized Compliance",
        }
    }
}
