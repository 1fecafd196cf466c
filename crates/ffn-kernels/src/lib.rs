//! `ffn-kernels` - Fused feed-forward kernel.
//!
//! Computes `Z = residual + dropout(gelu(X @ W + bias))` tile by tile:
//! - `tile`: the per-tile index computation, masked loads, f32 reduction
//!   loop and masked store
//! - `epilogue`: bias, activation, dropout and residual applied to a tile
//!   in that fixed order
//! - `dispatch`: shape validation, flattening, the parallel launch and the
//!   final reshape (`fused_feed_forward`)
//! - `reference`: the same computation built from unfused backend primitives

pub mod config;
pub mod dispatch;
pub mod epilogue;
pub mod error;
pub mod reference;
pub mod tile;

pub use config::{BlockConfig, FeedForwardOptions};
pub use dispatch::{fused_feed_forward, LaunchPlan};
pub use epilogue::{Dropout, Epilogue};
pub use error::{KernelError, Result};
pub use reference::unfused_feed_forward;
pub use tile::{GemmProblem, LaunchGrid, Tile, TileCoord};
