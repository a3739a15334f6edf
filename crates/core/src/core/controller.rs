//! Frame driver and the single owner of simulation state.
//!
//! Host code only talks to [`Controller`] through its input port
//! (`set_input`, `set_slider`, `apply_preset`, play/pause/reset, case and
//! override requests, `resize`). Derived metrics and particle internals are
//! never writable from outside.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::config::{AltrionConfig, ConfigError};
use crate::gates::{self, CaseContext, CaseLog, CaseRecord};
use crate::model::{clamp, sanitize_unit, Metrics, ModelInputs};
use crate::particles::{target_count, ParticlePool};
use crate::prng::Prng;
use crate::render::{self, Scene, TextMeasure};

/// Largest simulated step per frame (s). Larger wall-clock gaps are dropped.
pub const MAX_DT: f64 = 0.05;

/// Viewport edges are capped at this many CSS pixels.
pub const MAX_VIEWPORT: f64 = 16_384.0;

/// Pointer perturbation is confined to `[-MAX_POINTER, MAX_POINTER]`.
pub const MAX_POINTER: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// CSS pixels.
    pub width: f64,
    pub height: f64,
    pub reduced_motion: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 720.0,
            height: 420.0,
            reduced_motion: false,
        }
    }
}

/// Read-only snapshot handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// Simulated seconds since start or last reset.
    pub time: f64,
    pub inputs: ModelInputs,
    /// Pointer input in `[-0.1, 0.1]`; 0 when the pointer is outside.
    pub perturbation: f64,
    pub critical_nc: f64,
    pub metrics: Metrics,
    pub running: bool,
}

impl SimulationState {
    fn new(critical_nc: f64) -> Self {
        Self {
            time: 0.0,
            inputs: ModelInputs::default(),
            perturbation: 0.0,
            critical_nc,
            metrics: Metrics::INITIAL,
            running: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Gamma,
    Workload,
    Friction,
    Pointer,
}

impl InputField {
    fn default_value(self) -> f64 {
        let d = ModelInputs::default();
        match self {
            InputField::Gamma => d.gamma,
            InputField::Workload => d.workload,
            InputField::Friction => d.friction,
            InputField::Pointer => 0.0,
        }
    }
}

/// Discrete operating modes selectable from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    #[default]
    Steady,
    HighVolume,
    Strained,
}

impl Preset {
    pub fn all() -> &'static [Preset] {
        &[Preset::Steady, Preset::HighVolume, Preset::Strained]
    }

    /// Stable identifier used in exports, the CLI and `<select>` values.
    pub fn label(self) -> &'static str {
        match self {
            Preset::Steady => "steady",
            Preset::HighVolume => "high-volume",
            Preset::Strained => "strained",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Preset::Steady => "Steady",
            Preset::HighVolume => "High volume",
            Preset::Strained => "Strained",
        }
    }

    pub fn from_label(s: &str) -> Option<Preset> {
        Preset::all()
            .iter()
            .copied()
            .find(|p| p.label().eq_ignore_ascii_case(s.trim()))
    }

    pub fn inputs(self) -> ModelInputs {
        match self {
            Preset::Steady => ModelInputs::new(0.50, 0.55, 0.62),
            Preset::HighVolume => ModelInputs::new(0.62, 0.82, 0.44),
            Preset::Strained => ModelInputs::new(0.84, 0.74, 0.18),
        }
    }
}

/// Preset label recorded when inputs were moved by hand.
pub const CUSTOM_PRESET: &str = "custom";

/// Everything one widget instance owns.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    pub config: AltrionConfig,
    pub state: SimulationState,
    pub particles: ParticlePool,
    pub rng: Prng,
    pub log: CaseLog,
    /// `None` once an input was changed away from a preset.
    pub preset: Option<Preset>,
    pub pending_override: Option<String>,
    pub viewport: Viewport,
    started_at: DateTime<Utc>,
    /// Simulated seconds since construction; unlike `state.time` it survives reset.
    session_time: f64,
    case_clock: f64,
    next_seq: u64,
}

impl SimulationContext {
    fn new(config: AltrionConfig, seed: u64, started_at: DateTime<Utc>) -> Self {
        let viewport = Viewport::default();
        let mut rng = Prng::new(seed);
        let mut particles = ParticlePool::new();
        let n = target_count(
            viewport.width,
            viewport.height,
            viewport.reduced_motion,
            &config.particle_budget,
        );
        particles.seed(n, &mut rng);
        Self {
            state: SimulationState::new(config.critical_nc),
            log: CaseLog::new(config.case_log_capacity),
            config,
            particles,
            rng,
            preset: Some(Preset::Steady),
            pending_override: None,
            viewport,
            started_at,
            session_time: 0.0,
            case_clock: 0.0,
            next_seq: 1,
        }
    }

    pub fn preset_label(&self) -> &'static str {
        self.preset.map_or(CUSTOM_PRESET, Preset::label)
    }

    fn target_pool_size(&self) -> usize {
        target_count(
            self.viewport.width,
            self.viewport.height,
            self.viewport.reduced_motion,
            &self.config.particle_budget,
        )
    }

    /// One simulation step. `dt` is already clamped.
    fn step(&mut self, dt: f64) {
        self.state.time += dt;
        self.session_time += dt;

        let inputs = self.state.inputs;
        self.state.metrics.advance(
            dt,
            &inputs,
            &self.config,
            self.state.time,
            self.state.perturbation,
        );

        let m = self.state.metrics;
        self.particles
            .step(dt, m.nc, m.engagement, inputs.workload, &mut self.rng);

        self.case_clock += dt;
        if self.case_clock >= self.config.case_interval_s {
            self.case_clock -= self.config.case_interval_s;
            self.generate_case();
        }
    }

    fn timestamp(&self) -> String {
        let ms = (self.session_time * 1000.0).round() as i64;
        let at = TimeDelta::try_milliseconds(ms)
            .and_then(|d| self.started_at.checked_add_signed(d))
            .unwrap_or(self.started_at);
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Synthesize a case, run it through the gates and append it to the log.
    fn generate_case(&mut self) -> CaseRecord {
        let metrics = self.state.metrics;
        let inputs = gates::synthesize_inputs(&mut self.rng, &metrics, &self.state.inputs);
        let eval = gates::evaluate(
            &self.config,
            &metrics,
            &inputs,
            &mut self.pending_override,
            &mut self.rng,
        );
        if let Some(mark) = eval.token_mark() {
            self.particles.mark(mark);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let id = gates::case_id(seq);
        let summary = gates::summarize(&id, &inputs, &eval);

        debug!(
            case = %id,
            decision = eval.decision.as_str(),
            auditable = eval.auditable,
            nc = metrics.nc,
            "case decided"
        );

        let record = CaseRecord {
            id,
            seq,
            timestamp: self.timestamp(),
            context: CaseContext {
                preset: self.preset_label(),
                gamma: self.state.inputs.gamma,
                workload: self.state.inputs.workload,
                friction: self.state.inputs.friction,
                nc: metrics.nc,
                error: metrics.err,
                critical_nc: self.config.critical_nc,
            },
            inputs,
            gates: eval.gates,
            decision: eval.decision,
            mode: eval.mode,
            auditable: eval.auditable,
            rationale: eval.rationale,
            summary,
        };
        self.log.push(record.clone());
        record
    }
}

/// The widget: owns a [`SimulationContext`] and turns wall-clock frames into
/// simulation ticks and scenes.
#[derive(Debug, Clone)]
pub struct Controller {
    ctx: SimulationContext,
    last_frame_ms: Option<f64>,
}

impl Controller {
    /// Build a controller. `started_at` anchors case timestamps.
    pub fn new(config: AltrionConfig, seed: u64, started_at: DateTime<Utc>) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(seed, critical_nc = config.critical_nc, "altrion controller ready");
        Ok(Self {
            ctx: SimulationContext::new(config, seed, started_at),
            last_frame_ms: None,
        })
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn state(&self) -> &SimulationState {
        &self.ctx.state
    }

    pub fn config(&self) -> &AltrionConfig {
        &self.ctx.config
    }

    pub fn log(&self) -> &CaseLog {
        &self.ctx.log
    }

    pub fn particles(&self) -> &ParticlePool {
        &self.ctx.particles
    }

    pub fn preset(&self) -> Option<Preset> {
        self.ctx.preset
    }

    pub fn viewport(&self) -> Viewport {
        self.ctx.viewport
    }

    pub fn is_running(&self) -> bool {
        self.ctx.state.running
    }

    pub fn has_pending_override(&self) -> bool {
        self.ctx.pending_override.is_some()
    }

    /// Write one input. Values are clamped; non-finite values fall back to the
    /// field default.
    pub fn set_input(&mut self, field: InputField, value: f64) {
        let value = if value.is_finite() {
            value
        } else {
            warn!(?field, value, "non-finite input coerced to default");
            field.default_value()
        };
        let inputs = &mut self.ctx.state.inputs;
        match field {
            InputField::Gamma => inputs.gamma = sanitize_unit(value, 0.50),
            InputField::Workload => inputs.workload = sanitize_unit(value, 0.55),
            InputField::Friction => inputs.friction = sanitize_unit(value, 0.62),
            InputField::Pointer => {
                self.ctx.state.perturbation = clamp(value, -MAX_POINTER, MAX_POINTER);
                return;
            }
        }
        self.ctx.preset = None;
    }

    /// Slider port: integer `0..=100` mapped to `[0, 1]`.
    pub fn set_slider(&mut self, field: InputField, value: i64) {
        self.set_input(field, value.clamp(0, 100) as f64 / 100.0);
    }

    /// Pointer at `x` CSS px inside a widget `width` px wide.
    pub fn set_pointer(&mut self, x: f64, width: f64) {
        if !(width.is_finite() && width > 0.0) {
            self.clear_pointer();
            return;
        }
        self.set_input(InputField::Pointer, (x / width - 0.5) * 0.2);
    }

    pub fn clear_pointer(&mut self) {
        self.ctx.state.perturbation = 0.0;
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.ctx.state.inputs = preset.inputs();
        self.ctx.preset = Some(preset);
        info!(preset = preset.label(), "preset applied");
    }

    pub fn play(&mut self) {
        self.ctx.state.running = true;
    }

    pub fn pause(&mut self) {
        self.ctx.state.running = false;
        self.last_frame_ms = None;
    }

    pub fn toggle_running(&mut self) -> bool {
        if self.is_running() {
            self.pause();
        } else {
            self.play();
        }
        self.is_running()
    }

    /// Zero time, restore initial metrics and re-seed the pool. The case log
    /// and the random stream carry on.
    pub fn reset(&mut self) {
        let n = self.ctx.target_pool_size();
        let ctx = &mut self.ctx;
        ctx.state.time = 0.0;
        ctx.state.metrics = Metrics::INITIAL;
        ctx.particles.seed(n, &mut ctx.rng);
        ctx.pending_override = None;
        ctx.case_clock = 0.0;
        self.last_frame_ms = None;
        info!(particles = n, "simulation reset");
    }

    /// Decide a case right now, independent of the cadence and of pause.
    pub fn request_case(&mut self) -> CaseRecord {
        self.ctx.generate_case()
    }

    /// Queue a human override for the next case that needs a rationale.
    /// `None` withdraws a pending one.
    pub fn request_override(&mut self, rationale: Option<String>) {
        self.ctx.pending_override = rationale;
    }

    /// Recompute the pool target for a new canvas size. Idempotent for an
    /// unchanged size; small changes are absorbed by the hysteresis band.
    pub fn resize(&mut self, width: f64, height: f64, reduced_motion: bool) {
        let sanitize = |v: f64| if v.is_finite() { v.clamp(0.0, MAX_VIEWPORT) } else { 0.0 };
        self.ctx.viewport = Viewport {
            width: sanitize(width),
            height: sanitize(height),
            reduced_motion,
        };
        let target = self.ctx.target_pool_size();
        let hysteresis = self.ctx.config.resize_hysteresis as usize;
        let ctx = &mut self.ctx;
        let before = ctx.particles.len();
        if ctx.particles.resize(target, hysteresis, &mut ctx.rng) {
            info!(before, after = ctx.particles.len(), reduced_motion, "particle pool resized");
        }
    }

    /// Advance by `dt` seconds (clamped to `[0, MAX_DT]`) if running.
    pub fn tick(&mut self, dt: f64) {
        if !self.ctx.state.running {
            return;
        }
        let dt = if dt.is_finite() { clamp(dt, 0.0, MAX_DT) } else { 0.0 };
        if dt > 0.0 {
            self.ctx.step(dt);
        }
    }

    /// Animation-frame entry point: derive `dt` from `now_ms`, tick, render.
    pub fn frame<M: TextMeasure + ?Sized>(&mut self, now_ms: f64, measure: &M) -> Scene {
        let dt = match self.last_frame_ms {
            Some(last) if now_ms.is_finite() => (now_ms - last) / 1000.0,
            _ => 0.0,
        };
        if now_ms.is_finite() {
            self.last_frame_ms = Some(now_ms);
        }
        self.tick(dt);
        self.render(measure)
    }

    pub fn render<M: TextMeasure + ?Sized>(&self, measure: &M) -> Scene {
        render::render(
            &self.ctx.viewport,
            &self.ctx.state,
            self.ctx.particles.particles(),
            &self.ctx.log,
            &self.ctx.config,
            measure,
        )
    }
}
