use candle_core::{IndexOp, Result, Tensor};
use candle_nn::{linear, ops::softmax_last_dim, Init, Linear, Module, VarBuilder};

use super::window::relative_position_index;

const BIAS_TABLE_INIT: Init = Init::Randn {
    mean: 0.0,
    stdev: 0.02,
};

/// Multi-head self attention restricted to a single window, with a learned
/// bias per relative token offset.
pub struct WindowAttention {
    qkv: Linear,
    proj: Linear,
    relative_position_bias_table: Tensor,
    relative_position_index: Tensor,
    num_heads: usize,
    scale: f64,
}

impl WindowAttention {
    pub fn new(dim: usize, window_size: usize, num_heads: usize, vs: VarBuilder) -> Result<Self> {
        let span = 2 * window_size - 1;
        let relative_position_bias_table = vs.get_with_hints(
            (span * span, num_heads),
            "relative_position_bias_table",
            BIAS_TABLE_INIT,
        )?;

        let tokens = window_size * window_size;
        let relative_position_index = Tensor::from_vec(
            relative_position_index(window_size),
            tokens * tokens,
            vs.device(),
        )?;

        let head_dim = dim / num_heads;

        Ok(Self {
            qkv: linear(dim, dim * 3, vs.pp("qkv"))?,
            proj: linear(dim, dim, vs.pp("proj"))?,
            relative_position_bias_table,
            relative_position_index,
            num_heads,
            scale: (head_dim as f64).powf(-0.5),
        })
    }

    /// `x` is `(B * num_windows, n, C)`. `mask`, when present, is
    /// `(num_windows, n, n)` and added to the logits of every image.
    pub fn forward(&self, x: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let (b, n, c) = x.dims3()?;
        let head_dim = c / self.num_heads;

        let qkv = self
            .qkv
            .forward(x)?
            .reshape((b, n, 3, self.num_heads, head_dim))?
            .permute((2, 0, 3, 1, 4))?;
        let q = (qkv.i(0)?.contiguous()? * self.scale)?;
        let k = qkv.i(1)?.contiguous()?;
        let v = qkv.i(2)?.contiguous()?;

        let bias = self
            .relative_position_bias_table
            .index_select(&self.relative_position_index, 0)?
            .reshape((n, n, self.num_heads))?
            .permute((2, 0, 1))?
            .contiguous()?
            .unsqueeze(0)?;

        let mut attn = q.matmul(&k.t()?)?.broadcast_add(&bias)?;

        if let Some(mask) = mask {
            let num_windows = mask.dim(0)?;
            let mask = mask.unsqueeze(1)?.unsqueeze(0)?;
            attn = attn
                .reshape((b / num_windows, num_windows, self.num_heads, n, n))?
                .broadcast_add(&mask)?
                .reshape((b, self.num_heads, n, n))?;
        }

        softmax_last_dim(&attn)?
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((b, n, c))?
            .apply(&self.proj)
    }
}
