//! Scalar activation and dropout math shared by the reference backend and
//! the fused kernel epilogue.

use std::f32::consts::PI;

use crate::random;

const GELU_CUBIC: f32 = 0.044_715;

#[inline]
fn sqrt_2_over_pi() -> f32 {
    (2.0 / PI).sqrt()
}

/// Logistic sigmoid: `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Hyperbolic tangent through the identity `tanh(x) = 2 * sigmoid(2x) - 1`.
///
/// Saturates to exactly `-1` / `1` where `exp` overflows or underflows.
#[inline]
pub fn tanh_via_sigmoid(x: f32) -> f32 {
    2.0 * sigmoid(2.0 * x) - 1.0
}

/// Tanh-approximated GELU ("gelu_new"):
///
/// ```text
/// gelu(x) = 0.5 * x * (1 + tanh(sqrt(2/pi) * (x + 0.044715 * x^3)))
/// ```
#[inline]
pub fn gelu_new(x: f32) -> f32 {
    let inner = sqrt_2_over_pi() * (x + GELU_CUBIC * x * x * x);
    0.5 * x * (1.0 + inner.tanh())
}

/// Same as [`gelu_new`] with `tanh` derived from the sigmoid.
#[inline]
pub fn gelu_new_via_sigmoid(x: f32) -> f32 {
    let inner = sqrt_2_over_pi() * (x + GELU_CUBIC * x * x * x);
    0.5 * x * (1.0 + tanh_via_sigmoid(inner))
}

/// Inverted dropout for the value at flat position `offset`.
///
/// The value survives iff the draw for `(seed, offset)` is strictly greater
/// than `p`; survivors are rescaled by `1 / (1 - p)`.
#[inline]
pub fn dropout(x: f32, p: f32, seed: u64, offset: u64) -> f32 {
    if random::uniform(seed, offset) > p {
        x / (1.0 - p)
    } else {
        0.0
    }
}
