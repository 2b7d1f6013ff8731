// ============================================================================
// REGION FADE UNIFORMS — GPU-side uniform block for the fade shader
// ============================================================================

use bytemuck::{Pod, Zeroable};

use crate::math::Affine2;

/// Mirrors `RegionFade` in `shaders::REGION_FADE_SHADER`.  Matrices are
/// column-major `mat3x3<f32>` (each column padded to a vec4).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct RegionFadeUniforms {
    pub css_to_world: [[f32; 4]; 3],
    pub uv_from_world: [[f32; 4]; 3],
    pub view_size: [f32; 2],
    pub center: [f32; 2],
    pub half_size: [f32; 2],
    pub sdf_texel: [f32; 2],
    /// (scale, offset) applied to the normalized SDF sample.
    pub sdf_decode: [f32; 2],
    pub rotation: f32,
    /// -1 = mask only, 0 = polygon/SDF, 1 = box, 2 = ellipse.
    pub region_shape: i32,
    pub use_sdf: u32,
    pub edge_count: u32,
    pub fade_pct: f32,
    pub fade_world: f32,
    pub use_pct: u32,
    pub smooth_k_world: f32,
    pub inside_max: f32,
    pub has_mask: f32,
    pub mask_ready: f32,
    pub strength: f32,
    pub device_to_css: f32,
    pub _pad0: f32,
}

pub fn mat3_columns(m: &Affine2) -> [[f32; 4]; 3] {
    let c = m.to_mat3();
    [
        [c[0], c[1], c[2], 0.0],
        [c[3], c[4], c[5], 0.0],
        [c[6], c[7], c[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<RegionFadeUniforms>(), 192);
        assert_eq!(std::mem::offset_of!(RegionFadeUniforms, view_size), 96);
        assert_eq!(std::mem::offset_of!(RegionFadeUniforms, rotation), 136);
        assert_eq!(std::mem::offset_of!(RegionFadeUniforms, strength), 180);
    }

    #[test]
    fn translation_lands_in_the_third_column() {
        let cols = mat3_columns(&Affine2::new(2.0, 0.0, 0.0, 3.0, 5.0, 7.0));
        assert_eq!(cols[2], [5.0, 7.0, 1.0, 0.0]);
        assert_eq!(cols[0][0], 2.0);
        assert_eq!(cols[1][1], 3.0);
    }
}
