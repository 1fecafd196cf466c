//! Post-matmul stages applied to a tile before it is stored.
//!
//! The order is fixed: `+bias -> gelu -> dropout -> +residual`. Each stage
//! is a no-op when its input is absent. Reordering changes results (for
//! instance `gelu(z) + r` differs from `gelu(z + r)`).

use ffn_tensor::cpu::unary;
use ffn_tensor::StorageView;

use crate::tile::Tile;

/// Inverted-dropout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dropout {
    pub probability: f32,
    pub seed: u64,
}

/// The fused epilogue of one launch, shared read-only by every tile.
#[derive(Debug, Clone, Copy)]
pub struct Epilogue<'a> {
    /// `[n]`, broadcast over rows.
    pub bias: Option<StorageView<'a>>,
    pub activation: bool,
    pub dropout: Option<Dropout>,
    /// `[m, n]`, row-major.
    pub residual: Option<StorageView<'a>>,
    /// Output row length, used for flat offsets into the output.
    pub n: usize,
}

impl Epilogue<'_> {
    /// Applies every configured stage to the in-bounds part of `tile`.
    pub fn apply(&self, tile: &mut Tile) {
        self.add_bias(tile);
        self.activate(tile);
        self.drop_out(tile);
        self.add_residual(tile);
    }

    fn add_bias(&self, tile: &mut Tile) {
        let Some(bias) = self.bias else { return };
        let col0 = tile.col0();
        for r in 0..tile.rows() {
            for (c, z) in tile.row_mut(r).iter_mut().enumerate() {
                *z += bias.load(col0 + c);
            }
        }
    }

    fn activate(&self, tile: &mut Tile) {
        if !self.activation {
            return;
        }
        for r in 0..tile.rows() {
            for z in tile.row_mut(r) {
                *z = unary::gelu_new_via_sigmoid(*z);
            }
        }
    }

    fn drop_out(&self, tile: &mut Tile) {
        let Some(Dropout { probability, seed }) = self.dropout else {
            return;
        };
        let (row0, col0) = (tile.row0(), tile.col0());
        for r in 0..tile.rows() {
            let base = ((row0 + r) * self.n + col0) as u64;
            for (c, z) in tile.row_mut(r).iter_mut().enumerate() {
                *z = unary::dropout(*z, probability, seed, base + c as u64);
            }
        }
    }

    fn add_residual(&self, tile: &mut Tile) {
        let Some(residual) = self.residual else { return };
        let (row0, col0) = (tile.row0(), tile.col0());
        for r in 0..tile.rows() {
            let base = (row0 + r) * self.n + col0;
            for (c, z) in tile.row_mut(r).iter_mut().enumerate() {
                *z += residual.load(base + c);
            }
        }
    }
}
