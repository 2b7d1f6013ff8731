// ============================================================================
// RASTER — CPU scanline fill and sprite compositing for 8-bit alpha targets
// ============================================================================
//
// All masks are single-channel `GrayImage`s: 255 = inside, 0 = outside.
// Rows are filled in parallel; each row is sampled at pixel centres.

use image::GrayImage;
use rayon::prelude::*;

use crate::geometry::shape::{Shape, Tessellation};
use crate::math::{Affine2, Bounds, Vec2};

/// How a fill combines with what is already in the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Composite {
    /// Covered pixels become opaque.
    Union,
    /// Covered pixels become transparent.
    Erase,
}

/// Fill closed loops (even-odd between the loops) after mapping them
/// through `to_pixel`.
pub fn fill_loops(img: &mut GrayImage, loops: &[Vec<Vec2>], to_pixel: &Affine2, mode: Composite) {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if w == 0 || h == 0 {
        return;
    }

    let mut edges: Vec<[f32; 4]> = Vec::new();
    let mut bounds = Bounds::EMPTY;
    for l in loops {
        let n = l.len();
        if n < 3 {
            continue;
        }
        let px: Vec<Vec2> = l.iter().map(|p| to_pixel.apply(*p)).collect();
        for i in 0..n {
            let a = px[i];
            let b = px[(i + 1) % n];
            if !(a.is_finite() && b.is_finite()) || a.y == b.y {
                continue;
            }
            bounds.include(a);
            bounds.include(b);
            // Stored top-to-bottom so the span test is half-open.
            if a.y < b.y {
                edges.push([a.x, a.y, b.x, b.y]);
            } else {
                edges.push([b.x, b.y, a.x, a.y]);
            }
        }
    }
    if edges.is_empty() || !bounds.is_finite() {
        return;
    }

    let y_start = ((bounds.min_y - 0.5).ceil().max(0.0) as usize).min(h);
    let y_end = ((bounds.max_y - 0.5).ceil().max(0.0) as usize).min(h);
    if y_start >= y_end {
        return;
    }
    let value = match mode {
        Composite::Union => 255u8,
        Composite::Erase => 0u8,
    };

    let data: &mut [u8] = img;
    data.par_chunks_mut(w)
        .enumerate()
        .skip(y_start)
        .take(y_end - y_start)
        .for_each(|(y, row)| {
            let yc = y as f32 + 0.5;
            let mut xs: Vec<f32> = edges
                .iter()
                .filter(|e| e[1] <= yc && yc < e[3])
                .map(|e| e[0] + (yc - e[1]) / (e[3] - e[1]) * (e[2] - e[0]))
                .collect();
            xs.sort_by(|a, b| a.total_cmp(b));
            for pair in xs.chunks_exact(2) {
                let x0 = ((pair[0] - 0.5).ceil().max(0.0) as usize).min(w);
                let x1 = ((pair[1] - 0.5).ceil().max(0.0) as usize).min(w);
                if x0 < x1 {
                    row[x0..x1].fill(value);
                }
            }
        });
}

/// Clear `img`, fill the union of the solid shapes, then erase the holes.
pub fn rasterize_region(img: &mut GrayImage, shapes: &[Shape], to_pixel: &Affine2, tess: Tessellation) {
    clear(img);
    for s in shapes.iter().filter(|s| !s.hole && !s.is_empty()) {
        fill_loops(img, &s.kind.loops(tess), to_pixel, Composite::Union);
    }
    for s in shapes.iter().filter(|s| s.hole && !s.is_empty()) {
        fill_loops(img, &s.kind.loops(tess), to_pixel, Composite::Erase);
    }
}

pub fn clear(img: &mut GrayImage) {
    let data: &mut [u8] = img;
    data.fill(0);
}

/// `dst *= (1 - cover)` per pixel; both images must share dimensions.
pub fn erase_with(dst: &mut GrayImage, cover: &GrayImage) {
    if dst.dimensions() != cover.dimensions() {
        crate::log_warn!(
            "erase_with: size mismatch {:?} vs {:?}",
            dst.dimensions(),
            cover.dimensions()
        );
        return;
    }
    let src: &[u8] = cover;
    let data: &mut [u8] = dst;
    data.par_iter_mut().zip(src.par_iter()).for_each(|(d, c)| {
        *d = mul_inv(*d, *c);
    });
}

/// Draw an alpha sprite (nearest sampling) through `sprite_to_pixel`.
/// `Erase` removes coverage from `dst`; `Union` takes the maximum.
pub fn composite_sprite(dst: &mut GrayImage, sprite: &GrayImage, sprite_to_pixel: &Affine2, mode: Composite) {
    let (w, h) = (dst.width() as usize, dst.height() as usize);
    let (sw, sh) = (sprite.width(), sprite.height());
    if w == 0 || h == 0 || sw == 0 || sh == 0 {
        return;
    }
    let Some(inv) = sprite_to_pixel.invert() else {
        return;
    };
    let footprint = Bounds::from_points(
        &[
            Vec2::new(0.0, 0.0),
            Vec2::new(sw as f32, 0.0),
            Vec2::new(sw as f32, sh as f32),
            Vec2::new(0.0, sh as f32),
        ]
        .map(|c| sprite_to_pixel.apply(c)),
    );
    if !footprint.is_finite() {
        return;
    }
    let x0 = (footprint.min_x.floor().max(0.0) as usize).min(w);
    let x1 = (footprint.max_x.ceil().max(0.0) as usize).min(w);
    let y0 = (footprint.min_y.floor().max(0.0) as usize).min(h);
    let y1 = (footprint.max_y.ceil().max(0.0) as usize).min(h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let data: &mut [u8] = dst;
    data.par_chunks_mut(w)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate().take(x1).skip(x0) {
                let s = inv.apply(Vec2::new(x as f32 + 0.5, y as f32 + 0.5));
                if !(s.x >= 0.0 && s.y >= 0.0) {
                    continue;
                }
                let (sx, sy) = (s.x as u32, s.y as u32);
                if sx >= sw || sy >= sh {
                    continue;
                }
                let a = sprite.get_pixel(sx, sy).0[0];
                *px = match mode {
                    Composite::Erase => mul_inv(*px, a),
                    Composite::Union => (*px).max(a),
                };
            }
        });
}

/// `v · (255 − a) / 255`, rounded.
#[inline]
fn mul_inv(v: u8, a: u8) -> u8 {
    ((v as u32 * (255 - a as u32) + 127) / 255) as u8
}
