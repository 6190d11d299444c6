use candle_core::{Result, Tensor};
use candle_nn::{layer_norm, linear, linear_no_bias, LayerNorm, Linear, Module, VarBuilder};

use super::attention::WindowAttention;
use super::window::{partition, reverse, shifted_window_mask};
use super::{LAYER_NORM_EPS, MLP_RATIO};

/// Pre-norm transformer block over (optionally shifted) local windows.
pub struct SwinBlock {
    norm1: LayerNorm,
    attn: WindowAttention,
    norm2: LayerNorm,
    fc1: Linear,
    fc2: Linear,
    resolution: usize,
    window_size: usize,
    shift: usize,
    attn_mask: Option<Tensor>,
}

impl SwinBlock {
    pub fn new(
        dim: usize,
        resolution: usize,
        num_heads: usize,
        window_size: usize,
        shift: usize,
        vs: VarBuilder,
    ) -> Result<Self> {
        // A map no larger than one window is attended as a whole, unshifted
        let (window_size, shift) = if resolution <= window_size {
            (resolution, 0)
        } else {
            (window_size, shift)
        };

        let attn_mask = if shift > 0 {
            let tokens = window_size * window_size;
            let num_windows = (resolution / window_size) * (resolution / window_size);
            let mask = shifted_window_mask(resolution, resolution, window_size, shift);
            Some(Tensor::from_vec(
                mask,
                (num_windows, tokens, tokens),
                vs.device(),
            )?)
        } else {
            None
        };

        let hidden = dim * MLP_RATIO;

        Ok(Self {
            norm1: layer_norm(dim, LAYER_NORM_EPS, vs.pp("norm1"))?,
            attn: WindowAttention::new(dim, window_size, num_heads, vs.pp("attn"))?,
            norm2: layer_norm(dim, LAYER_NORM_EPS, vs.pp("norm2"))?,
            fc1: linear(dim, hidden, vs.pp("mlp").pp("fc1"))?,
            fc2: linear(hidden, dim, vs.pp("mlp").pp("fc2"))?,
            resolution,
            window_size,
            shift,
            attn_mask,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (b, _, c) = x.dims3()?;
        let side = self.resolution;
        let shift = self.shift as i32;

        let mut h = self.norm1.forward(x)?.reshape((b, side, side, c))?;
        if shift > 0 {
            h = h.roll(-shift, 1)?.roll(-shift, 2)?;
        }

        let windows = partition(&h, self.window_size)?;
        let windows = self.attn.forward(&windows, self.attn_mask.as_ref())?;
        let mut h = reverse(&windows, self.window_size, side, side)?;

        if shift > 0 {
            h = h.roll(shift, 1)?.roll(shift, 2)?;
        }

        let x = (x + h.reshape((b, side * side, c))?)?;
        let mlp = self
            .norm2
            .forward(&x)?
            .apply(&self.fc1)?
            .gelu_erf()?
            .apply(&self.fc2)?;

        x + mlp
    }
}

/// Halves the token grid and doubles the channel width by concatenating
/// every 2x2 neighbourhood and projecting it down.
pub struct PatchMerging {
    norm: LayerNorm,
    reduction: Linear,
    resolution: usize,
}

impl PatchMerging {
    pub fn new(dim: usize, resolution: usize, vs: VarBuilder) -> Result<Self> {
        Ok(Self {
            norm: layer_norm(4 * dim, LAYER_NORM_EPS, vs.pp("norm"))?,
            reduction: linear_no_bias(4 * dim, 2 * dim, vs.pp("reduction"))?,
            resolution,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (b, _, c) = x.dims3()?;
        let half = self.resolution / 2;

        // (b, row, dy, col, dx, c) -> (b, row, col, dx, dy, c) so the
        // concatenation order is (0,0), (1,0), (0,1), (1,1)
        x.reshape((b, half, 2, half, 2, c))?
            .transpose(2, 3)?
            .transpose(3, 4)?
            .contiguous()?
            .reshape((b, half * half, 4 * c))?
            .apply(&self.norm)?
            .apply(&self.reduction)
    }
}

/// One resolution level: a run of blocks alternating between regular and
/// shifted windows, followed by an optional patch merging step.
pub struct Stage {
    blocks: Vec<SwinBlock>,
    downsample: Option<PatchMerging>,
}

impl Stage {
    pub fn new(
        dim: usize,
        resolution: usize,
        depth: usize,
        num_heads: usize,
        window_size: usize,
        downsample: bool,
        vs: VarBuilder,
    ) -> Result<Self> {
        let blocks = (0..depth)
            .map(|i| {
                let shift = if i % 2 == 0 { 0 } else { window_size / 2 };
                SwinBlock::new(
                    dim,
                    resolution,
                    num_heads,
                    window_size,
                    shift,
                    vs.pp(format!("blocks.{}", i)),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let downsample = if downsample {
            Some(PatchMerging::new(dim, resolution, vs.pp("downsample"))?)
        } else {
            None
        };

        Ok(Self { blocks, downsample })
    }

    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut x = x.clone();
        for block in &self.blocks {
            x = block.forward(&x)?;
        }
        match &self.downsample {
            Some(merge) => merge.forward(&x),
            None => Ok(x),
        }
    }
}
