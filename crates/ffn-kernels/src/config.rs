use ffn_tensor::random::DEFAULT_SEED;

use crate::error::{KernelError, Result};

pub const DEFAULT_BLOCK_M: usize = 128;
pub const DEFAULT_BLOCK_N: usize = 128;
pub const DEFAULT_BLOCK_K: usize = 64;

/// Tile dimensions used by a launch.
///
/// Any positive sizes are correct; they only trade tile-local memory against
/// the amount of masked work in ragged edge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockConfig {
    /// Output rows per tile.
    pub block_m: usize,
    /// Output columns per tile.
    pub block_n: usize,
    /// Reduction-dimension step of the accumulation loop.
    pub block_k: usize,
}

impl BlockConfig {
    pub fn new(block_m: usize, block_n: usize, block_k: usize) -> Self {
        BlockConfig {
            block_m,
            block_n,
            block_k,
        }
    }

    /// Rejects block sizes that make the tiling or the reduction loop
    /// ill-defined.
    pub fn validate(&self) -> Result<()> {
        if self.block_m == 0 || self.block_n == 0 || self.block_k == 0 {
            return Err(KernelError::UnsupportedConfiguration(format!(
                "block sizes must be positive, got {}x{}x{}",
                self.block_m, self.block_n, self.block_k
            )));
        }
        Ok(())
    }
}

impl Default for BlockConfig {
    fn default() -> Self {
        BlockConfig::new(DEFAULT_BLOCK_M, DEFAULT_BLOCK_N, DEFAULT_BLOCK_K)
    }
}

/// Epilogue switches and launch parameters for one fused feed-forward call.
///
/// Bias and residual are passed as tensors alongside; these are the scalar
/// knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedForwardOptions {
    /// Apply the tanh-approximated GELU after the bias.
    pub apply_activation: bool,
    /// Inverted-dropout probability in `[0, 1)`; `0.0` disables dropout.
    pub dropout_probability: f32,
    /// Seed of the position-keyed dropout stream. Reused as-is on every
    /// call, so identical calls produce identical masks.
    pub seed: u64,
    /// Tile dimensions.
    pub blocks: BlockConfig,
}

impl FeedForwardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_activation(mut self, apply_activation: bool) -> Self {
        self.apply_activation = apply_activation;
        self
    }

    pub fn with_dropout(mut self, probability: f32) -> Self {
        self.dropout_probability = probability;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_blocks(mut self, blocks: BlockConfig) -> Self {
        self.blocks = blocks;
        self
    }

    /// Returns true when the dropout stage does any work.
    pub fn dropout_enabled(&self) -> bool {
        self.dropout_probability > 0.0
    }

    pub fn validate(&self) -> Result<()> {
        self.blocks.validate()?;
        if !(0.0..1.0).contains(&self.dropout_probability) {
            return Err(KernelError::UnsupportedConfiguration(format!(
                "dropout probability must be in [0, 1), got {}",
                self.dropout_probability
            )));
        }
        Ok(())
    }
}

impl Default for FeedForwardOptions {
    fn default() -> Self {
        FeedForwardOptions {
            apply_activation: false,
            dropout_probability: 0.0,
            seed: DEFAULT_SEED,
            blocks: BlockConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blocks() {
        let b = BlockConfig::default();
        assert_eq!((b.block_m, b.block_n, b.block_k), (128, 128, 64));
        assert!(b.validate().is_ok());
    }

    #[test]
    fn test_zero_block_rejected() {
        for b in [
            BlockConfig::new(0, 8, 8),
            BlockConfig::new(8, 0, 8),
            BlockConfig::new(8, 8, 0),
        ] {
            assert!(matches!(
                b.validate(),
                Err(KernelError::UnsupportedConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_default_options() {
        let o = FeedForwardOptions::default();
        assert!(!o.apply_activation);
        assert_eq!(o.dropout_probability, 0.0);
        assert_eq!(o.seed, 1337);
        assert!(!o.dropout_enabled());
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let o = FeedForwardOptions::new()
            .with_activation(true)
            .with_dropout(0.1)
            .with_seed(7)
            .with_blocks(BlockConfig::new(16, 32, 8));
        assert!(o.apply_activation);
        assert!(o.dropout_enabled());
        assert_eq!(o.seed, 7);
        assert_eq!(o.blocks.block_n, 32);
    }

    #[test]
    fn test_dropout_probability_range() {
        for p in [-0.1f32, 1.0, 1.5, f32::NAN] {
            let o = FeedForwardOptions::new().with_dropout(p);
            assert!(o.validate().is_err(), "p={p} should be rejected");
        }
        assert!(FeedForwardOptions::new().with_dropout(0.999).validate().is_ok());
    }
}
