// Seeded pseudo-random number generator for the Versus simulation.
//
// xoshiro256++ (Blackman & Vigna) with the state expanded from a single
// `u64` seed by SplitMix64. Every random decision the city makes flows
// through one `GameRng` owned by `SimState`: decision-interval jitter, idle
// rolls, breeding rolls, director importance rolls and random points inside
// a block footprint.
//
// The helpers here are shaped around those call sites: `chance` for the
// probability rolls, `jitter` for the staggered agent scheduling, and
// `range_f32` / `range_usize` for sampling.
//
// **Critical constraint: determinism.** Two generators built from the same
// seed must produce the same stream on every platform. The core step is
// integer-only; float helpers derive from the integer stream.

use serde::{Deserialize, Serialize};

/// The simulation's single source of randomness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRng {
    s: [u64; 4],
}

impl GameRng {
    /// Build a generator from a `u64` seed.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut s = [0u64; 4];
        for word in &mut s {
            *word = splitmix64(&mut sm);
        }
        Self { s }
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = &mut self.s;
        let result = s0.wrapping_add(*s3).rotate_left(23).wrapping_add(*s0);
        let t = *s1 << 17;
        *s2 ^= *s0;
        *s3 ^= *s1;
        *s1 ^= *s2;
        *s0 ^= *s3;
        *s2 ^= t;
        *s3 = s3.rotate_left(45);
        result
    }

    /// Uniform `f32` in [0, 1), built from the top 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform `f64` in [0, 1), built from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Returns `true` with probability `p`. `p <= 0` never fires, `p >= 1`
    /// always fires.
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }

    /// Uniform value in `[low, high)`. A degenerate range returns `low`
    /// without consuming randomness, so zero-sized footprints are legal.
    pub fn range_f32(&mut self, low: f32, high: f32) -> f32 {
        if high <= low {
            return low;
        }
        low + self.next_f32() * (high - low)
    }

    /// Scale `base` by a uniform factor in `[1 - spread, 1 + spread)`.
    ///
    /// Used to stagger per-agent decision intervals so a large population
    /// does not evaluate in lock-step.
    pub fn jitter(&mut self, base: f32, spread: f32) -> f32 {
        base * self.range_f32(1.0 - spread, 1.0 + spread)
    }

    /// Uniform integer in `[low, high)` via rejection sampling (no modulo
    /// bias).
    ///
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: empty range {low}..{high}");
        let span = high - low;
        if span.is_power_of_two() {
            return low + (self.next_u64() & (span - 1));
        }
        let threshold = span.wrapping_neg() % span;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + r % span;
            }
        }
    }

    /// Uniform `usize` in `[low, high)`. An empty range returns `low`; the
    /// population seeder relies on `range_usize(0, 0) == 0`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        self.range_u64(low as u64, high as u64) as usize
    }
}

/// SplitMix64 step, used only to expand the seed.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = GameRng::new(7);
        let mut b = GameRng::new(7);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = GameRng::new(7);
        let mut b = GameRng::new(8);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn unit_floats_stay_in_range() {
        let mut rng = GameRng::new(2024);
        for _ in 0..10_000 {
            let f = rng.next_f32();
            assert!((0.0..1.0).contains(&f), "f32 out of range: {f}");
            let d = rng.next_f64();
            assert!((0.0..1.0).contains(&d), "f64 out of range: {d}");
        }
    }

    #[test]
    fn jitter_stays_within_spread() {
        let mut rng = GameRng::new(11);
        for _ in 0..10_000 {
            let v = rng.jitter(0.25, 0.1);
            assert!((0.225..0.275).contains(&v), "jitter out of range: {v}");
        }
    }

    #[test]
    fn jitter_actually_varies() {
        let mut rng = GameRng::new(11);
        let first = rng.jitter(1.0, 0.1);
        let varied = (0..100).any(|_| rng.jitter(1.0, 0.1) != first);
        assert!(varied, "jitter should not produce a constant interval");
    }

    #[test]
    fn degenerate_ranges_return_low() {
        let mut rng = GameRng::new(3);
        assert_eq!(rng.range_f32(5.0, 5.0), 5.0);
        assert_eq!(rng.range_usize(0, 0), 0);
        assert_eq!(rng.range_usize(4, 2), 4);
    }

    #[test]
    fn range_u64_covers_bounds() {
        let mut rng = GameRng::new(99);
        let mut seen = [false; 3];
        for _ in 0..10_000 {
            let v = rng.range_u64(10, 13);
            assert!((10..13).contains(&v));
            seen[(v - 10) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s), "every value should be reachable");
    }

    #[test]
    fn chance_extremes() {
        let mut rng = GameRng::new(1);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn chance_distribution_roughly_matches() {
        let mut rng = GameRng::new(42);
        let hits = (0..20_000).filter(|_| rng.chance(0.02)).count();
        let pct = hits as f64 / 20_000.0;
        assert!((0.01..0.03).contains(&pct), "2% roll fired {pct:.3}");
    }

    #[test]
    fn snapshot_resumes_identically() {
        let mut rng = GameRng::new(5);
        for _ in 0..50 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: GameRng = serde_json::from_str(&json).unwrap();
        for _ in 0..50 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
