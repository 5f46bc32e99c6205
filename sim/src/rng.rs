//! Deterministic random number generation
//!
//! xoshiro256++ with SplitMix64 seed expansion. The state transition is
//! fully specified here, so a given seed yields the same stream on every
//! platform regardless of standard-library internals.

use common::Rng;

/// Scale factor mapping the top 53 bits of a u64 onto [0, 1).
const U64_TO_UNIT: f64 = 1.0 / 9_007_199_254_740_992.0; // 2^-53

/// xoshiro256++ generator.
#[derive(Debug, Clone)]
pub struct Xoshiro256PlusPlus {
    s: [u64; 4],
}

impl Xoshiro256PlusPlus {
    /// Create a generator, expanding `seed` into the full 256-bit state via
    /// SplitMix64 (a zero state is unreachable this way).
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let s = [splitmix64(&mut sm), splitmix64(&mut sm), splitmix64(&mut sm), splitmix64(&mut sm)];
        Self { s }
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let result = self.s[0].wrapping_add(self.s[3]).rotate_left(23).wrapping_add(self.s[0]);

        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }
}

impl Rng for Xoshiro256PlusPlus {
    #[allow(clippy::cast_precision_loss)]
    fn uniform(&mut self) -> f64 {
        ((self.next_u64() >> 11) as f64) * U64_TO_UNIT
    }

    fn seed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
