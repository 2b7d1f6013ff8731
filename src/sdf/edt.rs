// ============================================================================
// EXACT EUCLIDEAN DISTANCE TRANSFORM — lower envelope of parabolas
// ============================================================================
//
// Squared distances are computed separably: a 1D transform along every row,
// then along every column of the row result.  Both passes are exact, so the
// final value is the true squared distance to the nearest feature texel.

use image::{GrayImage, Luma};
use rayon::prelude::*;

/// Stand-in for "no feature".  Kept finite so parabola intersections stay
/// well-defined.
const INF: f64 = 1e20;

/// Alpha at or above this counts as inside.
pub const INSIDE_THRESHOLD: u8 = 128;

/// 1D squared-distance transform of the sampled function `f` into `d`.
/// `v` and `z` are scratch buffers of length `n` and `n + 1`.
fn edt_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let mut k = 0usize;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    let intersect = |q: usize, p: usize| {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };
    for q in 1..n {
        let mut s = intersect(q, v[k]);
        // z[0] is -inf, so this never underflows.
        while s <= z[k] {
            k -= 1;
            s = intersect(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }
    let mut k = 0usize;
    for (q, out) in d.iter_mut().enumerate() {
        let qf = q as f64;
        while z[k + 1] < qf {
            k += 1;
        }
        let p = v[k] as f64;
        *out = (qf - p) * (qf - p) + f[v[k]];
    }
}

/// In-place 2D squared-distance transform of a `w × h` grid holding 0 at
/// features and `INF` elsewhere.
fn edt_2d(grid: &mut [f64], w: usize, h: usize) {
    if w == 0 || h == 0 {
        return;
    }

    grid.par_chunks_mut(w).for_each(|row| {
        let f = row.to_vec();
        let mut v = vec![0usize; w];
        let mut z = vec![0.0f64; w + 1];
        edt_1d(&f, row, &mut v, &mut z);
    });

    let columns: Vec<Vec<f64>> = (0..w)
        .into_par_iter()
        .map(|x| {
            let f: Vec<f64> = (0..h).map(|y| grid[y * w + x]).collect();
            let mut d = vec![0.0f64; h];
            let mut v = vec![0usize; h];
            let mut z = vec![0.0f64; h + 1];
            edt_1d(&f, &mut d, &mut v, &mut z);
            d
        })
        .collect();
    for (x, col) in columns.into_iter().enumerate() {
        for (y, value) in col.into_iter().enumerate() {
            grid[y * w + x] = value;
        }
    }
}

/// Signed distance in texels: positive inside, negative outside.
#[derive(Clone, Debug)]
pub struct SignedDistanceField {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl SignedDistanceField {
    /// Texel centres are the samples, so the zero crossing falls half a
    /// texel outside the last inside texel.
    pub fn from_mask(mask: &GrayImage) -> Self {
        let (w, h) = (mask.width() as usize, mask.height() as usize);
        let inside: Vec<bool> = mask.pixels().map(|p| p.0[0] >= INSIDE_THRESHOLD).collect();

        let mut to_inside: Vec<f64> = inside.iter().map(|&i| if i { 0.0 } else { INF }).collect();
        let mut to_outside: Vec<f64> = inside.iter().map(|&i| if i { INF } else { 0.0 }).collect();
        rayon::join(|| edt_2d(&mut to_inside, w, h), || edt_2d(&mut to_outside, w, h));

        let values = inside
            .par_iter()
            .zip(to_inside.par_iter().zip(to_outside.par_iter()))
            .map(|(&is_in, (&d_in, &d_out))| {
                let sd = d_out.sqrt() - d_in.sqrt();
                let sd = if is_in { sd - 0.5 } else { sd + 0.5 };
                sd as f32
            })
            .collect();

        Self { width: w as u32, height: h as u32, values }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    /// Quantize to 8 bits: `127.5 + k · sd`, clamped to the byte range.
    pub fn encode(&self, k: f32) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        for (px, sd) in out.pixels_mut().zip(&self.values) {
            let e = (127.5 + k * sd).round().clamp(0.0, 255.0);
            *px = Luma([e as u8]);
        }
        out
    }
}
