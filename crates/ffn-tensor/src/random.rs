//! Counter-based pseudo-random numbers.
//!
//! Every draw is a pure function of `(seed, offset)`: there is no generator
//! state, so any number of parallel workers can draw for their own offsets in
//! any order and still reproduce the same stream. The generator is Philox
//! 4x32 with the usual round and key constants.

/// Seed used when a caller does not pick one.
///
/// The same seed is reused by every launch, so two launches over the same
/// shape produce the same dropout mask. Vary the seed explicitly to get a
/// different mask.
pub const DEFAULT_SEED: u64 = 1337;

/// Default number of Philox rounds.
pub const PHILOX_ROUNDS: usize = 10;

const PHILOX_ROUND_A: u32 = 0xD251_1F53;
const PHILOX_ROUND_B: u32 = 0xCD9E_8D57;
const PHILOX_KEY_A: u32 = 0x9E37_79B9;
const PHILOX_KEY_B: u32 = 0xBB67_AE85;

/// Scale mapping a non-negative `i32` onto `[0, 1)`.
const INT32_TO_UNIT: f32 = 4.656_612_7e-10;

/// Largest f32 strictly below 1.0.
const ONE_BELOW: f32 = 1.0 - f32::EPSILON / 2.0;

#[inline]
fn mulhi(a: u32, b: u32) -> u32 {
    ((a as u64 * b as u64) >> 32) as u32
}

/// Runs the Philox 4x32 bijection on `counter` under the key derived from
/// `seed` (low word first).
pub fn philox4x32(seed: u64, counter: [u32; 4], rounds: usize) -> [u32; 4] {
    let [mut c0, mut c1, mut c2, mut c3] = counter;
    let mut k0 = seed as u32;
    let mut k1 = (seed >> 32) as u32;

    for _ in 0..rounds {
        let (prev_c0, prev_c2) = (c0, c2);
        c0 = mulhi(PHILOX_ROUND_B, prev_c2) ^ c1 ^ k0;
        c2 = mulhi(PHILOX_ROUND_A, prev_c0) ^ c3 ^ k1;
        c1 = PHILOX_ROUND_B.wrapping_mul(prev_c2);
        c3 = PHILOX_ROUND_A.wrapping_mul(prev_c0);
        k0 = k0.wrapping_add(PHILOX_KEY_A);
        k1 = k1.wrapping_add(PHILOX_KEY_B);
    }

    [c0, c1, c2, c3]
}

/// Raw 32-bit draw for `offset` under `seed`.
#[inline]
pub fn random_u32(seed: u64, offset: u64) -> u32 {
    let counter = [offset as u32, (offset >> 32) as u32, 0, 0];
    philox4x32(seed, counter, PHILOX_ROUNDS)[0]
}

/// Maps a raw draw onto `[0, 1)`.
///
/// The word is read as a signed integer and folded onto the non-negative
/// range before scaling, so both halves of the `u32` range are used.
#[inline]
pub fn u32_to_unit_f32(x: u32) -> f32 {
    let signed = x as i32;
    let folded = if signed < 0 { -(signed + 1) } else { signed };
    (folded as f32 * INT32_TO_UNIT).min(ONE_BELOW)
}

/// Uniform draw in `[0, 1)` for `offset` under `seed`.
#[inline]
pub fn uniform(seed: u64, offset: u64) -> f32 {
    u32_to_unit_f32(random_u32(seed, offset))
}
