// ============================================================================
// EDGE BUDGETER — fixed-capacity polygon edge lists for shader uniforms
// ============================================================================

use super::shape::{Shape, Tessellation};
use crate::math::Vec2;

/// One edge as `(Ax, Ay, Bx, By)`.
pub type Edge = [f32; 4];

/// Outline loops of every non-empty shape (holes included: the edge list
/// is tested with the even-odd rule).  Curves use `segments` steps.
pub fn region_polygons(shapes: &[Shape], segments: usize) -> Vec<Vec<Vec2>> {
    shapes
        .iter()
        .filter(|s| !s.is_empty())
        .flat_map(|s| s.kind.loops(Tessellation::Fixed(segments)))
        .collect()
}

/// Split `cap` edges over polygons with `counts[i]` vertices each.
///
/// The result sums to exactly `min(cap, Σ counts)` and never exceeds a
/// polygon's own count.  Each polygon is guaranteed 3 edges, relaxed to
/// 2, 1 and finally 0 when there are too many polygons for the cap.
pub fn allocate(counts: &[usize], cap: usize) -> Vec<usize> {
    let total: usize = counts.iter().sum();
    let cap = cap.min(total);
    if cap == 0 {
        return vec![0; counts.len()];
    }

    let n = counts.len();
    let mut min_per = 3;
    while min_per > 0 && n * min_per > cap {
        min_per -= 1;
    }

    let mut alloc: Vec<usize> = counts
        .iter()
        .map(|&m| {
            let share = (cap as f64 * m as f64 / total as f64).round() as usize;
            share.max(min_per).min(m)
        })
        .collect();
    let mut sum: usize = alloc.iter().sum();

    // Over budget: take from whoever has the most slack above the minimum.
    while sum > cap {
        let mut idx = None;
        let mut best = 0usize;
        for (i, &a) in alloc.iter().enumerate() {
            let slack = a.saturating_sub(min_per);
            if slack > best {
                best = slack;
                idx = Some(i);
            }
        }
        let Some(i) = idx else { break };
        alloc[i] -= 1;
        sum -= 1;
    }

    // Under budget: give to the most under-represented polygon.
    while sum < cap {
        let mut idx = None;
        let mut best = -1.0f64;
        for (i, (&a, &m)) in alloc.iter().zip(counts).enumerate() {
            if a >= m {
                continue;
            }
            let score = m as f64 / a.max(1) as f64;
            if score > best {
                best = score;
                idx = Some(i);
            }
        }
        let Some(i) = idx else { break };
        alloc[i] += 1;
        sum += 1;
    }

    alloc
}

/// Exactly `min(cap, Σ vertices)` edges, each polygon subsampled at even
/// index steps over its loop.
pub fn budget_edges(polygons: &[Vec<Vec2>], cap: usize) -> Vec<Edge> {
    let counts: Vec<usize> = polygons.iter().map(Vec::len).collect();
    let alloc = allocate(&counts, cap);
    let mut edges = Vec::with_capacity(alloc.iter().sum());
    for (poly, want) in polygons.iter().zip(alloc) {
        emit_edges(poly, want, &mut edges);
    }
    edges
}

fn emit_edges(poly: &[Vec2], want: usize, out: &mut Vec<Edge>) {
    let m = poly.len();
    if want == 0 || m < 2 {
        return;
    }
    if want == 1 {
        out.push(edge(poly[0], poly[1]));
        return;
    }
    let idxs: Vec<usize> = if want >= m {
        (0..m).collect()
    } else {
        // want < m keeps the floor steps strictly increasing.
        (0..want).map(|i| i * m / want).collect()
    };
    let l = idxs.len();
    for i in 0..l {
        out.push(edge(poly[idxs[i]], poly[idxs[(i + 1) % l]]));
    }
}

#[inline]
fn edge(a: Vec2, b: Vec2) -> Edge {
    [a.x, a.y, b.x, b.y]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(n: usize) -> Vec<Vec2> {
        (0..n)
            .map(|i| {
                let a = i as f32 / n as f32 * std::f32::consts::TAU;
                Vec2::new(a.cos(), a.sin())
            })
            .collect()
    }

    #[test]
    fn allocation_sums_exactly_to_the_cap() {
        for cap in 0..40 {
            let counts = [10, 5, 3, 7];
            let alloc = allocate(&counts, cap);
            let total: usize = counts.iter().sum();
            assert_eq!(alloc.iter().sum::<usize>(), cap.min(total), "cap {}", cap);
            assert!(alloc.iter().zip(&counts).all(|(a, m)| a <= m));
        }
    }

    #[test]
    fn more_polygons_than_cap_still_sums_exactly() {
        let alloc = allocate(&[4, 4, 4, 4, 4], 3);
        assert_eq!(alloc.iter().sum::<usize>(), 3);
    }

    #[test]
    fn minimum_representation_is_kept_when_affordable() {
        let alloc = allocate(&[100, 3], 20);
        assert_eq!(alloc[1], 3);
        assert_eq!(alloc[0], 17);
    }

    #[test]
    fn subsampled_loop_closes_on_itself() {
        let edges = budget_edges(&[square(12)], 4);
        assert_eq!(edges.len(), 4);
        for i in 0..4 {
            let e = edges[i];
            let next = edges[(i + 1) % 4];
            assert_eq!([e[2], e[3]], [next[0], next[1]]);
        }
    }

    #[test]
    fn single_edge_allocation_emits_first_edge() {
        let poly = square(5);
        let edges = budget_edges(&[poly.clone(), square(5), square(5), square(5)], 1);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0], [poly[0].x, poly[0].y, poly[1].x, poly[1].y]);
    }
}
