// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It drives token spawning, case synthesis and film grain, and must be
// reproducible from a seed so tests can replay a session exactly.

/// The one seam through which the simulation draws randomness.
pub trait RandomSource {
    /// Uniform sample in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    #[inline]
    fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Bernoulli trial. `p` is clamped to `[0, 1]`; NaN never fires.
    #[inline]
    fn chance(&mut self, p: f64) -> bool {
        if p.is_nan() || p <= 0.0 {
            return false;
        }
        self.next_f64() < p.min(1.0)
    }
}

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    /// Seed from a float (e.g. simulated time) so per-frame decoration stays a
    /// pure function of the frame.
    pub fn from_f64(v: f64) -> Self {
        Self::new(v.to_bits() ^ 0xA076_1D64_78BD_642F)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        // Marsaglia / Vigna family. Simple, fast, decent for simulation noise.
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

impl RandomSource for Prng {
    #[inline]
    fn next_f64(&mut self) -> f64 {
        // 53 high bits -> [0,1).
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}
