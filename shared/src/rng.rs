//! Seeded pseudo-random generator shared by the game client and the verifier.
//!
//! The generator is Mulberry32: a 32-bit counter advanced by a fixed odd
//! increment, followed by an xorshift-multiply output mix. Both sides must
//! produce bit-identical sequences from the same seed, so the algorithm is
//! expressed as a pure step function and every caller goes through it.

/// Increment applied to the state on every draw.
pub const MULBERRY32_INCREMENT: u32 = 0x6D2B_79F5;

const UNIT_DIVISOR: f64 = 4_294_967_296.0;

/// Advances the generator by one draw.
///
/// Returns `(next_state, output)`. All arithmetic wraps at 32 bits.
pub fn step(state: u32) -> (u32, u32) {
    let t = state.wrapping_add(MULBERRY32_INCREMENT);
    let mut r = (t ^ (t >> 15)).wrapping_mul(1 | t);
    r ^= r.wrapping_add((r ^ (r >> 7)).wrapping_mul(61 | r));
    (t, r ^ (r >> 14))
}

/// Stateful wrapper around [`step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    /// Raw 32-bit output of the next draw.
    pub fn next_u32(&mut self) -> u32 {
        let (state, output) = step(self.state);
        self.state = state;
        output
    }

    /// Next draw mapped to `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / UNIT_DIVISOR
    }

    /// `floor(next_f64() * bound)`, the form the game uses for integer picks.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        (self.next_f64() * bound as f64).floor() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_vector_seed_zero() {
        let mut rng = Mulberry32::new(0);
        let drawn: Vec<u32> = (0..5).map(|_| rng.next_u32()).collect();
        assert_eq!(
            drawn,
            vec![1144304738, 1416247, 958946056, 627933444, 2007157716]
        );
    }

    #[test]
    fn test_golden_vector_seed_42() {
        let mut rng = Mulberry32::new(42);
        let drawn: Vec<u32> = (0..5).map(|_| rng.next_u32()).collect();
        assert_eq!(
            drawn,
            vec![2581720956, 1925393290, 3661312704, 2876485805, 750819978]
        );
    }

    #[test]
    fn test_golden_vector_max_seed() {
        let mut rng = Mulberry32::new(u32::MAX);
        assert_eq!(rng.next_u32(), 3850105811);
        assert_eq!(rng.next_u32(), 813802916);
    }

    #[test]
    fn test_step_is_pure() {
        let (state_a, out_a) = step(0xDEAD_BEEF);
        let (state_b, out_b) = step(0xDEAD_BEEF);
        assert_eq!(state_a, state_b);
        assert_eq!(out_a, out_b);
        assert_eq!(out_a, 4043151706);
        assert_eq!(state_a, 0xDEAD_BEEFu32.wrapping_add(MULBERRY32_INCREMENT));
    }

    #[test]
    fn test_unit_interval() {
        let mut rng = Mulberry32::new(7);
        for _ in 0..10_000 {
            let value = rng.next_f64();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn test_next_below_matches_float_floor() {
        let mut a = Mulberry32::new(42);
        let mut b = Mulberry32::new(42);
        for _ in 0..100 {
            let pick = a.next_below(720);
            let expected = (b.next_f64() * 720.0).floor() as u64;
            assert_eq!(pick, expected);
            assert!(pick < 720);
        }
    }
}
