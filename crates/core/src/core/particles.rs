//! Work-item tokens flowing left to right through the four gates.
//!
//! Coordinates are normalized to the flow panel:
//! - `position` in roughly `[-0.08, 1.06]` (outside `[0, 1]` is the off-screen buffer)
//! - `lane` in `[LANE_MIN, LANE_MAX]`
//!
//! The pool is fixed-size between resizes; tokens that leave on the right are
//! re-randomized in place at the left edge.

use crate::config::ParticleBudget;
use crate::model::{clamp, lerp};
use crate::prng::RandomSource;

/// Horizontal positions of G1..G4 as fractions of the flow panel.
pub const GATE_X: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

pub const LANE_MIN: f64 = 0.12;
pub const LANE_MAX: f64 = 0.92;

/// Tokens past this position are recycled.
pub const EXIT_X: f64 = 1.06;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenState {
    #[default]
    Ok,
    Flagged,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: f64,
    pub lane: f64,
    pub speed: f64,
    pub radius: f64,
    pub alpha: f64,
    pub phase: f64,
    pub state: TokenState,
}

impl Particle {
    /// Fresh token with randomized visuals at the given position.
    fn randomized<R: RandomSource + ?Sized>(position: f64, rng: &mut R) -> Self {
        Self {
            position,
            lane: rng.range(0.14, 0.90),
            speed: rng.range(0.05, 0.17),
            radius: rng.range(0.9, 1.9),
            alpha: rng.range(0.12, 0.92),
            phase: rng.next_f64(),
            state: TokenState::Ok,
        }
    }

    /// Left-edge spawn used when recycling.
    pub fn spawn<R: RandomSource + ?Sized>(rng: &mut R) -> Self {
        let position = rng.range(-0.08, 0.02);
        Self::randomized(position, rng)
    }
}

/// Which gate a case outcome should be shown at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMark {
    Reject,
    Flag { gate: usize },
}

#[derive(Debug, Clone, Default)]
pub struct ParticlePool {
    particles: Vec<Particle>,
}

impl ParticlePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Replace the pool with `n` tokens spread across the panel, denser on the left.
    pub fn seed<R: RandomSource + ?Sized>(&mut self, n: usize, rng: &mut R) {
        self.particles.clear();
        self.particles.reserve(n);
        for _ in 0..n {
            let u = rng.next_f64();
            let position = -0.06 + 1.08 * u * u;
            self.particles.push(Particle::randomized(position, rng));
        }
    }

    /// Grow or shrink toward `target` when the difference is at least `hysteresis`.
    /// Returns whether the pool changed.
    pub fn resize<R: RandomSource + ?Sized>(
        &mut self,
        target: usize,
        hysteresis: usize,
        rng: &mut R,
    ) -> bool {
        if self.particles.is_empty() {
            if target == 0 {
                return false;
            }
            self.seed(target, rng);
            return true;
        }

        let len = self.particles.len();
        if len.abs_diff(target) < hysteresis.max(1) {
            return false;
        }

        if target > len {
            for _ in len..target {
                let position = rng.range(-0.06, 1.02);
                self.particles.push(Particle::randomized(position, rng));
            }
        } else {
            self.particles.truncate(target);
        }
        true
    }

    /// Advance all tokens by `dt` seconds.
    pub fn step<R: RandomSource + ?Sized>(
        &mut self,
        dt: f64,
        nc: f64,
        engagement: f64,
        workload: f64,
        rng: &mut R,
    ) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        let engagement = clamp(engagement, 0.0, 1.0);
        let global_speed =
            lerp(0.06, 0.24, engagement) * lerp(0.78, 1.20, clamp(workload, 0.0, 1.0));
        let jitter = 0.012 + 0.022 * (1.0 - engagement);
        let nc = clamp(nc, 0.0, 1.0);

        for p in self.particles.iter_mut() {
            p.position += (p.speed + global_speed) * dt;

            let wave = ((p.position + p.phase) * 9.0).sin() * 0.002
                + (p.position * 23.0 + p.phase * std::f64::consts::TAU).sin() * 0.0012 * nc;
            let noise = rng.range(-1.0, 1.0) * jitter;
            p.lane = clamp(p.lane + (wave + noise) * dt * 18.0, LANE_MIN, LANE_MAX);

            let rejected_at_gate = p.state == TokenState::Rejected && p.position >= GATE_X[0];
            if p.position > EXIT_X || rejected_at_gate {
                *p = Particle::spawn(rng);
            }
        }
    }

    /// Tag the nearest untagged token upstream of the gate a case fired at.
    /// Returns the tagged index, if any token was waiting in front of the gate.
    pub fn mark(&mut self, mark: GateMark) -> Option<usize> {
        let (gate_x, state) = match mark {
            GateMark::Reject => (GATE_X[0], TokenState::Rejected),
            GateMark::Flag { gate } => (GATE_X[gate.min(GATE_X.len() - 1)], TokenState::Flagged),
        };

        let idx = self
            .particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == TokenState::Ok && p.position < gate_x)
            .max_by(|(_, a), (_, b)| a.position.total_cmp(&b.position))
            .map(|(i, _)| i)?;

        self.particles[idx].state = state;
        Some(idx)
    }

    pub fn count_in(&self, state: TokenState) -> usize {
        self.particles.iter().filter(|p| p.state == state).count()
    }
}

/// Pool size for a canvas of `width`×`height` CSS pixels.
pub fn target_count(width: f64, height: f64, reduced_motion: bool, budget: &ParticleBudget) -> usize {
    let (base, min, max) = budget.bounds(reduced_motion);
    let area = (width.max(0.0) * height.max(0.0)) / (720.0 * 420.0);
    let s = area.max(1.0).sqrt();
    let n = (base as f64 * clamp(s, 0.75, 1.35)).floor();
    clamp(n, min as f64, max as f64) as usize
}
