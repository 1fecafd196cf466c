//! Tile scheduler: one `block_m x block_n` output rectangle per unit of work.
//!
//! A tile reads X and W through masked loads (zero past the end of `K`),
//! accumulates in f32 over `ceil(K / block_k)` steps, and finally writes only
//! its in-bounds rows and columns back to the output.
//!
//! Tile-local buffers cover only the in-bounds part of the tile, so their
//! size is bounded by the problem and never by the block sizes alone.

use half::f16;

use ffn_tensor::StorageView;

use crate::config::BlockConfig;

/// Grid coordinates of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub pid_m: usize,
    pub pid_n: usize,
}

/// Number of tiles along each output axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGrid {
    pub grid_m: usize,
    pub grid_n: usize,
}

impl LaunchGrid {
    /// Grid covering an `m x n` output with the given blocks.
    pub fn new(m: usize, n: usize, blocks: &BlockConfig) -> Self {
        LaunchGrid {
            grid_m: m.div_ceil(blocks.block_m),
            grid_n: n.div_ceil(blocks.block_n),
        }
    }

    pub fn num_tiles(&self) -> usize {
        self.grid_m * self.grid_n
    }
}

/// Element type the output buffer is stored in.
pub trait OutputElement: Copy + Send + Sync {
    fn from_acc(value: f32) -> Self;
}

impl OutputElement for f32 {
    #[inline]
    fn from_acc(value: f32) -> Self {
        value
    }
}

impl OutputElement for f16 {
    #[inline]
    fn from_acc(value: f32) -> Self {
        f16::from_f32(value)
    }
}

/// Rounds an operand to the half-precision compute type.
///
/// The product of two rounded operands is exact in f32, so the only
/// precision loss in the reduction is the operand rounding itself.
#[inline]
fn to_compute(value: f32) -> f32 {
    f16::from_f32(value).to_f32()
}

/// The f32 accumulator of one tile plus where it sits in the output.
#[derive(Debug, Clone)]
pub struct Tile {
    coord: TileCoord,
    row0: usize,
    col0: usize,
    rows: usize,
    cols: usize,
    acc: Vec<f32>,
}

impl Tile {
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Absolute index of the tile's first output row.
    pub fn row0(&self) -> usize {
        self.row0
    }

    /// Absolute index of the tile's first output column.
    pub fn col0(&self) -> usize {
        self.col0
    }

    /// Rows of this tile that fall inside the output.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Columns of this tile that fall inside the output.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Accumulator value at tile-local `(r, c)`.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.acc[r * self.cols + c]
    }

    /// Mutable in-bounds row `r`, `cols()` elements long.
    #[inline]
    pub fn row_mut(&mut self, r: usize) -> &mut [f32] {
        let start = r * self.cols;
        &mut self.acc[start..start + self.cols]
    }

    /// Writes the in-bounds part of the tile into its row band.
    ///
    /// `band` holds the `block_m` output rows starting at `row0` (fewer for
    /// the last band), each `n` elements long. Masked rows and columns are
    /// skipped, so nothing outside this tile's rectangle is touched.
    pub fn store<T: OutputElement>(&self, band: &mut [T], n: usize) {
        for r in 0..self.rows {
            let dst = &mut band[r * n + self.col0..r * n + self.col0 + self.cols];
            let src = &self.acc[r * self.cols..(r + 1) * self.cols];
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = T::from_acc(s);
            }
        }
    }
}

/// Borrowed operands and dimensions of the matrix product `X @ W`.
#[derive(Debug, Clone, Copy)]
pub struct GemmProblem<'a> {
    /// Row-major `[m, k]`.
    pub x: StorageView<'a>,
    /// Row-major `[k, n]`.
    pub w: StorageView<'a>,
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub blocks: BlockConfig,
}

impl GemmProblem<'_> {
    /// Runs index computation and the reduction loop for one tile.
    pub fn compute(&self, coord: TileCoord) -> Tile {
        let BlockConfig {
            block_m,
            block_n,
            block_k,
        } = self.blocks;
        let (m, n, k) = (self.m, self.n, self.k);

        let row0 = coord.pid_m.saturating_mul(block_m);
        let col0 = coord.pid_n.saturating_mul(block_n);
        let rows = block_m.min(m.saturating_sub(row0));
        let cols = block_n.min(n.saturating_sub(col0));
        // reduction step actually staged per iteration
        let step = block_k.min(k);

        let mut acc = vec![0.0f32; rows * cols];
        let mut x_tile = vec![0.0f32; rows * step];
        let mut w_tile = vec![0.0f32; step * cols];

        for k0 in (0..k).step_by(block_k) {
            // (rows, step) slice of X
            for r in 0..rows {
                let row = row0 + r;
                for kk in 0..step {
                    let col = k0 + kk;
                    x_tile[r * step + kk] = if col < k {
                        to_compute(self.x.load(row * k + col))
                    } else {
                        0.0
                    };
                }
            }

            // (step, cols) slice of W
            for kk in 0..step {
                let row = k0 + kk;
                for c in 0..cols {
                    w_tile[kk * cols + c] = if row < k {
                        to_compute(self.w.load(row * n + col0 + c))
                    } else {
                        0.0
                    };
                }
            }

            for r in 0..rows {
                let acc_row = &mut acc[r * cols..(r + 1) * cols];
                for kk in 0..step {
                    let a = x_tile[r * step + kk];
                    let w_row = &w_tile[kk * cols..(kk + 1) * cols];
                    for (z, &b) in acc_row.iter_mut().zip(w_row) {
                        *z += a * b;
                    }
                }
            }
        }

        Tile {
            coord,
            row0,
            col0,
            rows,
            cols,
            acc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem<'a>(
        x: &'a [f32],
        w: &'a [f32],
        m: usize,
        k: usize,
        n: usize,
        blocks: BlockConfig,
    ) -> GemmProblem<'a> {
        GemmProblem {
            x: StorageView::F32(x),
            w: StorageView::F32(w),
            m,
            n,
            k,
            blocks,
        }
    }

    #[test]
    fn test_launch_grid() {
        let g = LaunchGrid::new(130, 128, &BlockConfig::default());
        assert_eq!(g, LaunchGrid { grid_m: 2, grid_n: 1 });
        assert_eq!(g.num_tiles(), 2);
        assert_eq!(LaunchGrid::new(0, 5, &BlockConfig::default()).num_tiles(), 0);
    }

    #[test]
    fn test_single_tile_matches_matmul() {
        // [1,2;3,4] @ [5,6;7,8] = [19,22;43,50]
        let x = [1.0, 2.0, 3.0, 4.0];
        let w = [5.0, 6.0, 7.0, 8.0];
        let p = problem(&x, &w, 2, 2, 2, BlockConfig::new(4, 4, 4));
        let t = p.compute(TileCoord { pid_m: 0, pid_n: 0 });
        assert_eq!((t.rows(), t.cols()), (2, 2));
        assert_eq!(t.get(0, 0), 19.0);
        assert_eq!(t.get(0, 1), 22.0);
        assert_eq!(t.get(1, 0), 43.0);
        assert_eq!(t.get(1, 1), 50.0);
    }

    #[test]
    fn test_buffers_bounded_by_problem() {
        // blocks far larger than the problem must not size the tile
        let x = [1.0, 2.0, 3.0, 4.0];
        let w = [5.0, 6.0, 7.0, 8.0];
        let p = problem(&x, &w, 2, 2, 2, BlockConfig::new(1 << 40, 1 << 40, 1 << 40));
        let t = p.compute(TileCoord { pid_m: 0, pid_n: 0 });
        assert_eq!((t.rows(), t.cols()), (2, 2));
        assert_eq!(t.acc.len(), 4);
        assert_eq!(t.get(1, 0), 43.0);
    }

    #[test]
    fn test_ragged_k_is_masked() {
        // k = 3 with block_k = 2: the second step reads one real column
        let x = [1.0, 1.0, 1.0];
        let w = [1.0, 2.0, 4.0];
        let p = problem(&x, &w, 1, 3, 1, BlockConfig::new(1, 1, 2));
        let t = p.compute(TileCoord { pid_m: 0, pid_n: 0 });
        assert_eq!(t.get(0, 0), 7.0);
    }

    #[test]
    fn test_edge_tile_bounds() {
        let m = 5;
        let n = 3;
        let k = 2;
        let x = vec![1.0; m * k];
        let w = vec![1.0; k * n];
        let p = problem(&x, &w, m, k, n, BlockConfig::new(4, 2, 2));
        let t = p.compute(TileCoord { pid_m: 1, pid_n: 1 });
        assert_eq!((t.row0(), t.col0()), (4, 2));
        assert_eq!((t.rows(), t.cols()), (1, 1));
        assert_eq!(t.get(0, 0), 2.0);
    }

    #[test]
    fn test_operands_rounded_to_half() {
        // 1 + 2^-12 rounds to 1.0 in half precision
        let x = [1.0 + 1.0 / 4096.0];
        let w = [1.0];
        let p = problem(&x, &w, 1, 1, 1, BlockConfig::new(1, 1, 1));
        let t = p.compute(TileCoord { pid_m: 0, pid_n: 0 });
        assert_eq!(t.get(0, 0), 1.0);
    }

    #[test]
    fn test_store_skips_masked_region() {
        let m = 3;
        let n = 3;
        let k = 1;
        let x = vec![1.0; m * k];
        let w = vec![2.0; k * n];
        let blocks = BlockConfig::new(2, 2, 1);
        let p = problem(&x, &w, m, k, n, blocks);

        // last band holds the single row 2
        let mut band = vec![-1.0f32; n];
        let t = p.compute(TileCoord { pid_m: 1, pid_n: 1 });
        t.store(&mut band, n);
        assert_eq!(band, vec![-1.0, -1.0, 2.0]);
    }

    #[test]
    fn test_store_to_half() {
        let x = [0.5];
        let w = [0.5];
        let p = problem(&x, &w, 1, 1, 1, BlockConfig::new(1, 1, 1));
        let mut out = vec![f16::ZERO];
        p.compute(TileCoord { pid_m: 0, pid_n: 0 }).store(&mut out, 1);
        assert_eq!(out[0], f16::from_f32(0.25));
    }

    #[test]
    fn test_zero_k_gives_zero_tile() {
        let p = problem(&[], &[], 2, 0, 2, BlockConfig::new(2, 2, 2));
        let t = p.compute(TileCoord { pid_m: 0, pid_n: 0 });
        assert_eq!(t.get(1, 1), 0.0);
    }
}
