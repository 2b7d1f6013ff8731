// ============================================================================
// UNIFORM BINDER — choose a mask mode per region and fill filter uniforms
// ============================================================================

use std::sync::Arc;

use crate::geometry::analyze::{AnalyticMode, AnalyticShape};
use crate::geometry::edges::Edge;
use crate::gpu::uniforms::{mat3_columns, RegionFadeUniforms};
use crate::math::{Affine2, Bounds};
use crate::sdf::SdfTexture;

use super::options::FilterInstance;

/// How a region's filters compute their edge fade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaskMode {
    /// No fade; the mask alone decides coverage.
    MaskOnly,
    Analytic(AnalyticShape),
    /// Single polygonal shape: signed distance from a budgeted edge list.
    EdgeList,
    /// Multi-shape or otherwise general geometry: signed distance texture.
    Sdf,
}

impl MaskMode {
    /// `region_shape` uniform: -1 mask only, 0 polygon, 1 box, 2 ellipse.
    pub fn region_shape(&self) -> i32 {
        match self {
            MaskMode::MaskOnly => -1,
            MaskMode::Analytic(a) => match a.mode {
                AnalyticMode::Box => 1,
                AnalyticMode::Ellipse => 2,
            },
            MaskMode::EdgeList | MaskMode::Sdf => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MaskMode::MaskOnly => "mask",
            MaskMode::Analytic(a) if a.mode == AnalyticMode::Box => "box",
            MaskMode::Analytic(_) => "ellipse",
            MaskMode::EdgeList => "edges",
            MaskMode::Sdf => "sdf",
        }
    }
}

/// Analytic regions keep their primitive unless several solids force the
/// SDF; otherwise a fade picks edge list (one general shape) or SDF.
pub fn select_mode(analytic: Option<AnalyticShape>, force_multi_sdf: bool, wants_fade: bool) -> MaskMode {
    match analytic {
        Some(a) if !force_multi_sdf => MaskMode::Analytic(a),
        _ if !wants_fade => MaskMode::MaskOnly,
        None if !force_multi_sdf => MaskMode::EdgeList,
        _ => MaskMode::Sdf,
    }
}

/// Largest fade fraction requested by any of the filters.
pub fn max_fade_fraction(filters: &[FilterInstance]) -> f32 {
    filters.iter().map(|f| f.options.fade_fraction()).fold(0.0, f32::max)
}

/// Absolute fade width for analytic modes: a fraction of the shorter side
/// of the region bounds.
pub fn fade_world_width(bounds: Option<&Bounds>, fraction: f32) -> f32 {
    match bounds {
        Some(b) => (b.width().max(1e-6).min(b.height().max(1e-6)) * fraction.max(0.0)).max(1e-6),
        None => 1e-6,
    }
}

/// Which mask a filter samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskSource {
    Base,
    Cutout,
}

/// Values shared by every filter of one region for the current view.
#[derive(Clone, Debug)]
pub struct RegionBinding {
    pub mode: MaskMode,
    pub css_to_world: Affine2,
    pub world_per_css: f32,
    pub view_size: [f32; 2],
    pub device_to_css: f32,
    /// Filter output resolution (device pixels per CSS pixel, capped).
    pub resolution: f32,
    pub inradius: f32,
    pub bounds: Option<Bounds>,
    pub edges: Arc<[Edge]>,
    pub sdf: Option<Arc<SdfTexture>>,
    pub has_cutout: bool,
}

impl RegionBinding {
    /// Bind one filter.  The filter starts enabled at its configured
    /// strength; the gate may switch it off afterwards.
    pub fn bind(&self, instance: FilterInstance) -> BoundFilter {
        let fade_pct = instance.options.fade_fraction();
        let fade_world = if fade_pct > 0.0 { fade_world_width(self.bounds.as_ref(), fade_pct) } else { 0.0 };
        let use_pct = matches!(self.mode, MaskMode::EdgeList | MaskMode::Sdf);
        let smooth_k_world = (if fade_world > 0.0 { 0.25 * fade_world } else { 2.0 * self.world_per_css }).max(1e-6);
        let below_tokens = instance.options.below_tokens;
        let base_strength = if instance.options.strength.is_finite() { instance.options.strength.max(0.0) } else { 1.0 };

        let uniforms = FilterUniforms {
            mode: self.mode,
            css_to_world: self.css_to_world,
            view_size: self.view_size,
            device_to_css: self.device_to_css,
            resolution: self.resolution,
            fade_pct,
            fade_world: if use_pct { 0.0 } else { fade_world },
            use_pct,
            smooth_k_world,
            inside_max: self.inradius,
            edges: if self.mode == MaskMode::EdgeList { Arc::clone(&self.edges) } else { Arc::from(Vec::new()) },
            sdf: if self.mode == MaskMode::Sdf { self.sdf.clone() } else { None },
            mask: if below_tokens && self.has_cutout { MaskSource::Cutout } else { MaskSource::Base },
            has_mask: 1.0,
            mask_ready: 1.0,
            strength: base_strength,
        };

        BoundFilter {
            instance,
            uniforms,
            base_strength,
            enabled: true,
            below_tokens,
        }
    }
}

/// CPU copy of everything a region-fade filter reads.
#[derive(Clone, Debug)]
pub struct FilterUniforms {
    pub mode: MaskMode,
    pub css_to_world: Affine2,
    pub view_size: [f32; 2],
    pub device_to_css: f32,
    pub resolution: f32,
    pub fade_pct: f32,
    pub fade_world: f32,
    pub use_pct: bool,
    pub smooth_k_world: f32,
    pub inside_max: f32,
    pub edges: Arc<[Edge]>,
    pub sdf: Option<Arc<SdfTexture>>,
    pub mask: MaskSource,
    pub has_mask: f32,
    pub mask_ready: f32,
    pub strength: f32,
}

impl FilterUniforms {
    pub fn use_sdf(&self) -> bool {
        self.mode == MaskMode::Sdf && self.sdf.is_some()
    }

    /// Fade width in world units, 0 when the smoothstep fallback applies.
    pub fn fade_width(&self) -> f32 {
        if self.use_pct { self.fade_pct * self.inside_max } else { self.fade_world }
    }

    /// Pack into the GPU uniform block.
    pub fn to_gpu(&self) -> RegionFadeUniforms {
        let (center, half_size, rotation) = match self.mode {
            MaskMode::Analytic(a) => (
                [a.center.x, a.center.y],
                [a.half_extents.x.max(1e-6), a.half_extents.y.max(1e-6)],
                a.rotation,
            ),
            _ => ([0.0; 2], [1.0; 2], 0.0),
        };
        let (uv_from_world, sdf_texel, sdf_decode) = match self.sdf.as_deref().filter(|_| self.use_sdf()) {
            Some(sdf) => (
                sdf.decode.uv_from_world,
                sdf.decode.texel,
                [sdf.decode.scale, sdf.decode.offset],
            ),
            None => (Affine2::IDENTITY, [1.0, 1.0], [1.0, 0.0]),
        };
        RegionFadeUniforms {
            css_to_world: mat3_columns(&self.css_to_world),
            uv_from_world: mat3_columns(&uv_from_world),
            view_size: self.view_size,
            center,
            half_size,
            sdf_texel,
            sdf_decode,
            rotation,
            region_shape: self.mode.region_shape(),
            use_sdf: self.use_sdf() as u32,
            edge_count: self.edges.len() as u32,
            fade_pct: self.fade_pct,
            fade_world: self.fade_world,
            use_pct: self.use_pct as u32,
            smooth_k_world: self.smooth_k_world,
            inside_max: self.inside_max,
            has_mask: self.has_mask,
            mask_ready: self.mask_ready,
            strength: self.strength,
            device_to_css: self.device_to_css,
            _pad0: 0.0,
        }
    }
}

/// A filter instance with its bound uniforms.
#[derive(Clone, Debug)]
pub struct BoundFilter {
    pub instance: FilterInstance,
    pub uniforms: FilterUniforms,
    /// Strength captured at bind time, restored when the gate reopens.
    pub base_strength: f32,
    pub enabled: bool,
    pub below_tokens: bool,
}

impl BoundFilter {
    /// Apply a gate result without touching anything else.
    pub fn apply_gate(&mut self, pass: bool) {
        let on = if pass { 1.0 } else { 0.0 };
        self.uniforms.has_mask = on;
        self.uniforms.mask_ready = on;
        self.uniforms.strength = if pass { self.base_strength } else { 0.0 };
        self.enabled = pass;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::options::FilterOptions;
    use crate::math::Vec2;

    fn ellipse() -> AnalyticShape {
        AnalyticShape {
            mode: AnalyticMode::Ellipse,
            center: Vec2::new(0.0, 0.0),
            half_extents: Vec2::new(40.0, 40.0),
            rotation: 0.0,
        }
    }

    fn binding(mode: MaskMode) -> RegionBinding {
        RegionBinding {
            mode,
            css_to_world: Affine2::IDENTITY,
            world_per_css: 1.0,
            view_size: [100.0, 100.0],
            device_to_css: 1.0,
            resolution: 1.0,
            inradius: 10.0,
            bounds: Some(Bounds { min_x: -40.0, min_y: -40.0, max_x: 40.0, max_y: 40.0 }),
            edges: Arc::from(vec![[0.0, 0.0, 1.0, 0.0]]),
            sdf: None,
            has_cutout: true,
        }
    }

    fn filter(fade: f32, below: bool) -> FilterInstance {
        FilterInstance {
            id: "f".into(),
            kind: "color".into(),
            options: FilterOptions { fade_percent: fade, below_tokens: below, strength: 0.8, ..Default::default() },
        }
    }

    #[test]
    fn mode_selection() {
        assert!(matches!(select_mode(Some(ellipse()), false, true), MaskMode::Analytic(_)));
        assert_eq!(select_mode(Some(ellipse()), true, true), MaskMode::Sdf);
        assert_eq!(select_mode(None, false, true), MaskMode::EdgeList);
        assert_eq!(select_mode(None, true, true), MaskMode::Sdf);
        assert_eq!(select_mode(None, true, false), MaskMode::MaskOnly);
        assert_eq!(select_mode(None, false, false), MaskMode::MaskOnly);
    }

    #[test]
    fn analytic_binding_uses_absolute_width() {
        let b = binding(MaskMode::Analytic(ellipse())).bind(filter(50.0, false));
        assert!(!b.uniforms.use_pct);
        assert_eq!(b.uniforms.fade_world, 40.0);
        assert_eq!(b.uniforms.smooth_k_world, 10.0);
        assert_eq!(b.uniforms.mask, MaskSource::Base);
        let g = b.uniforms.to_gpu();
        assert_eq!(g.region_shape, 2);
        assert_eq!(g.edge_count, 0);
        assert_eq!(g.half_size, [40.0, 40.0]);
    }

    #[test]
    fn polygon_binding_scales_by_inradius() {
        let b = binding(MaskMode::EdgeList).bind(filter(20.0, true));
        assert!(b.uniforms.use_pct);
        assert!((b.uniforms.fade_width() - 2.0).abs() < 1e-5);
        assert_eq!(b.uniforms.mask, MaskSource::Cutout);
        let g = b.uniforms.to_gpu();
        assert_eq!((g.region_shape, g.edge_count, g.use_sdf), (0, 1, 0));
    }

    #[test]
    fn zero_fade_falls_back_to_smoothing() {
        let b = binding(MaskMode::EdgeList).bind(filter(0.0, false));
        assert_eq!(b.uniforms.fade_width(), 0.0);
        assert_eq!(b.uniforms.smooth_k_world, 2.0);
    }

    #[test]
    fn gate_toggles_strength_and_readiness() {
        let mut b = binding(MaskMode::MaskOnly).bind(filter(0.0, false));
        b.apply_gate(false);
        assert!(!b.enabled);
        assert_eq!((b.uniforms.strength, b.uniforms.mask_ready, b.uniforms.has_mask), (0.0, 0.0, 0.0));
        b.apply_gate(true);
        assert!(b.enabled);
        assert_eq!(b.uniforms.strength, 0.8);
        assert_eq!(b.uniforms.mask_ready, 1.0);
    }

    #[test]
    fn max_fade_over_filters() {
        let fs = [filter(10.0, false), filter(0.5, false), filter(0.0, false)];
        assert_eq!(max_fade_fraction(&fs), 0.5);
        assert_eq!(max_fade_fraction(&[]), 0.0);
    }
}
