use candle_core::{Result, Tensor};

use super::MASK_VALUE;

/// Splits a `(B, H, W, C)` token grid into `(B * num_windows, ws * ws, C)`
/// non-overlapping windows, row-major over the window grid.
pub fn partition(x: &Tensor, window_size: usize) -> Result<Tensor> {
    let (b, h, w, c) = x.dims4()?;
    let (rows, cols) = (h / window_size, w / window_size);

    x.reshape((b, rows, window_size, cols, window_size, c))?
        .transpose(2, 3)?
        .contiguous()?
        .reshape((b * rows * cols, window_size * window_size, c))
}

/// Inverse of [`partition`].
pub fn reverse(windows: &Tensor, window_size: usize, h: usize, w: usize) -> Result<Tensor> {
    let (num_windows, _, c) = windows.dims3()?;
    let (rows, cols) = (h / window_size, w / window_size);
    let b = num_windows / (rows * cols);

    windows
        .reshape((b, rows, cols, window_size, window_size, c))?
        .transpose(2, 3)?
        .contiguous()?
        .reshape((b, h, w, c))
}

/// For every pair of tokens inside a window, the row of the relative
/// position bias table holding their bias. Length `(ws * ws)^2`.
pub fn relative_position_index(window_size: usize) -> Vec<u32> {
    let n = window_size * window_size;
    let span = 2 * window_size - 1;
    let mut index = Vec::with_capacity(n * n);

    for i in 0..n {
        let (row_i, col_i) = (i / window_size, i % window_size);
        for j in 0..n {
            let (row_j, col_j) = (j / window_size, j % window_size);
            let dy = row_i + window_size - 1 - row_j;
            let dx = col_i + window_size - 1 - col_j;
            index.push((dy * span + dx) as u32);
        }
    }

    index
}

/// Attention mask for shifted windows, laid out as `(num_windows, n, n)`.
///
/// After the cyclic shift, a window at the bottom or right edge contains
/// tokens from up to four unrelated image regions. Tokens from different
/// regions get [`MASK_VALUE`] so they effectively cannot attend to each other.
pub fn shifted_window_mask(h: usize, w: usize, window_size: usize, shift: usize) -> Vec<f32> {
    let region = |pos: usize, size: usize| {
        if pos < size - window_size {
            0
        } else if pos < size - shift {
            1
        } else {
            2
        }
    };

    let n = window_size * window_size;
    let mut mask = Vec::with_capacity((h / window_size) * (w / window_size) * n * n);

    for window_row in 0..h / window_size {
        for window_col in 0..w / window_size {
            let labels: Vec<usize> = (0..n)
                .map(|i| {
                    let y = window_row * window_size + i / window_size;
                    let x = window_col * window_size + i % window_size;
                    region(y, h) * 3 + region(x, w)
                })
                .collect();

            for &a in &labels {
                for &b in &labels {
                    mask.push(if a == b { 0.0 } else { MASK_VALUE });
                }
            }
        }
    }

    mask
}
