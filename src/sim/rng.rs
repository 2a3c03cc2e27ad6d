//! Deterministic randomness for channel draws and scenario setup.
//!
//! Every probabilistic decision in a run flows through one `SimRng` so that
//! a (seed, configuration) pair fully determines the trace. The generator is
//! xorshift64: tiny, fast, and plenty for Bernoulli packet-loss draws and
//! uniform node placement.

use std::cell::RefCell;

/// Seeded pseudo-random generator handle.
///
/// Interior mutability keeps the API `&self`, so a single handle can be
/// threaded through channel and placement code without mutable-borrow
/// plumbing. Same seed, same sequence.
pub struct SimRng {
    state: RefCell<u64>,
}

impl SimRng {
    /// Create a new generator from `seed`.
    ///
    /// Seed 0 is remapped to 1 (xorshift state must be non-zero).
    pub fn new(seed: u64) -> Self {
        let seed = if seed == 0 { 1 } else { seed };
        Self {
            state: RefCell::new(seed),
        }
    }

    /// Next raw u64.
    pub fn next_u64(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        // xorshift64
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    /// Uniform f64 in [0.0, 1.0).
    pub fn next_f64(&self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Uniform usize in [0, max); 0 when max is 0.
    pub fn next_usize(&self, max: usize) -> usize {
        if max == 0 {
            0
        } else {
            (self.next_u64() as usize) % max
        }
    }

    /// Bernoulli draw: true with the given probability.
    pub fn next_bool(&self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Fork an independent stream, advancing this one past it.
    pub fn fork(&self) -> Self {
        let child_seed = self.next_u64();
        let _ = self.next_u64();
        Self::new(child_seed)
    }

    /// Current internal state, for debugging or trace capture.
    pub fn state(&self) -> u64 {
        *self.state.borrow()
    }
}

impl Clone for SimRng {
    fn clone(&self) -> Self {
        Self {
            state: RefCell::new(*self.state.borrow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let a = SimRng::new(12345);
        let b = SimRng::new(12345);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn zero_seed_is_usable() {
        let rng = SimRng::new(0);
        assert_ne!(rng.next_u64(), 0);
    }

    #[test]
    fn f64_stays_in_unit_interval() {
        let rng = SimRng::new(42);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn loss_draw_tracks_probability() {
        // A PER of 0.3 should drop roughly 30% of attempts.
        let rng = SimRng::new(42);
        let trials = 10_000;
        let lost = (0..trials).filter(|_| rng.next_bool(0.3)).count();
        let ratio = lost as f64 / trials as f64;
        assert!(ratio > 0.25 && ratio < 0.35);
    }

    #[test]
    fn degenerate_probabilities_are_exact() {
        let rng = SimRng::new(7);
        for _ in 0..100 {
            assert!(!rng.next_bool(0.0));
            assert!(rng.next_bool(1.0));
        }
    }

    #[test]
    fn fork_diverges_from_parent() {
        let rng = SimRng::new(42);
        let _ = rng.next_u64();
        let forked = rng.fork();
        assert_ne!(rng.next_u64(), forked.next_u64());
    }

    #[test]
    fn clone_replays_identically() {
        let rng = SimRng::new(9);
        let _ = rng.next_u64();
        let snapshot = rng.clone();
        assert_eq!(rng.next_u64(), snapshot.next_u64());
    }
}
