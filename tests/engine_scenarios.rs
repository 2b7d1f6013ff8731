// End-to-end scenarios for the mask engine on the headless device.

use std::sync::Arc;

use regionmask::engine::{MaskEngine, Region, Scene};
use regionmask::filter::fade::coverage;
use regionmask::filter::{FilterInstance, FilterOptions, GateConfig, MaskMode};
use regionmask::geometry::analyze::{analyze, AnalyticMode};
use regionmask::geometry::edges::allocate;
use regionmask::geometry::shape::{Shape, ShapeKind};
use regionmask::gpu::RenderDevice;
use regionmask::mask::ViewState;
use regionmask::math::{Affine2, Vec2};
use regionmask::sdf::SignedDistanceField;
use regionmask::settings::EngineSettings;

fn engine() -> MaskEngine {
    MaskEngine::new(EngineSettings::default(), Some(RenderDevice::headless(4096)))
}

fn filter(fade: f32, below_tokens: bool) -> FilterInstance {
    FilterInstance {
        id: "fx".into(),
        kind: "tint".into(),
        options: FilterOptions { fade_percent: fade, below_tokens, ..Default::default() },
    }
}

fn scene_with(shapes: Vec<Shape>, filters: Vec<FilterInstance>) -> Scene {
    Scene {
        regions: vec![Region { id: "r".into(), shapes, filters, gate: GateConfig::default() }],
        view: ViewState { transform: Affine2::IDENTITY, device_pixel_ratio: 1.0, css_width: 120, css_height: 120 },
        ..Default::default()
    }
}

fn rect(x: f32, y: f32, width: f32, height: f32) -> Shape {
    Shape::solid(ShapeKind::Rectangle { x, y, width, height, rotation: 0.0 })
}

fn circle(x: f32, y: f32, radius: f32) -> ShapeKind {
    ShapeKind::Circle { x, y, radius }
}

#[test]
fn single_rectangle_is_an_analytic_box() {
    let a = analyze(&[rect(0.0, 0.0, 100.0, 50.0)]).expect("rectangle is analytic");
    assert_eq!(a.mode, AnalyticMode::Box);
    assert_eq!(a.half_extents, Vec2::new(50.0, 25.0));
    assert_eq!(a.center, Vec2::new(50.0, 25.0));
    assert_eq!(a.rotation, 0.0);
}

#[test]
fn overlapping_rectangles_use_the_sdf() {
    let mut e = engine();
    let s = scene_with(vec![rect(10.0, 10.0, 50.0, 40.0), rect(40.0, 30.0, 50.0, 40.0)], vec![filter(30.0, false)]);
    let entry = e.build_or_refresh_region_mask(&s, "r").unwrap();
    assert_eq!(entry.mode, MaskMode::Sdf);
    let sdf = entry.sdf.as_ref().expect("sdf built");
    assert!(sdf.sample(Vec2::new(35.0, 30.0)) > 0.0);
    assert!(sdf.sample(Vec2::new(20.0, 65.0)) < 0.0);
    assert!(entry.filters[0].uniforms.use_sdf());
}

#[test]
fn ring_hole_is_cleared() {
    let mut e = engine();
    let shapes = vec![Shape::solid(circle(60.0, 60.0, 40.0)), Shape::hole(circle(60.0, 60.0, 10.0))];
    let s = scene_with(shapes, vec![filter(0.0, false)]);
    let entry = e.build_or_refresh_region_mask(&s, "r").unwrap();
    let base = entry.base.as_ref().unwrap();
    assert_eq!(base.alpha(60, 60), 0);
    assert_eq!(base.alpha(85, 60), 255);
    assert_eq!(base.alpha(115, 60), 0);
}

#[test]
fn circle_fade_is_half_way_at_half_radius() {
    let mut e = engine();
    let s = scene_with(vec![Shape::solid(circle(60.0, 60.0, 40.0))], vec![filter(50.0, false)]);
    let entry = e.build_or_refresh_region_mask(&s, "r").unwrap();
    assert!(matches!(entry.mode, MaskMode::Analytic(_)));
    let u = &entry.filters[0].uniforms;
    let c = coverage(u, Vec2::new(80.0, 60.0));
    assert!((c - 0.5).abs() <= 0.05, "coverage {}", c);
    assert_eq!(coverage(u, Vec2::new(60.0, 60.0)), 1.0);
}

#[test]
fn analytic_regions_never_build_an_sdf() {
    let mut e = engine();
    let s = scene_with(vec![Shape::solid(circle(60.0, 60.0, 40.0))], vec![filter(50.0, false)]);
    let entry = e.build_or_refresh_region_mask(&s, "r").unwrap();
    assert!(entry.sdf.is_none());
    assert!(!entry.filters[0].uniforms.use_sdf());

    let rotated = scene_with(
        vec![Shape::solid(ShapeKind::Rectangle { x: 20.0, y: 40.0, width: 80.0, height: 40.0, rotation: 30.0 })],
        vec![filter(25.0, true)],
    );
    e.draw(&rotated);
    e.on_frame(&rotated);
    assert!(matches!(e.entry("r").unwrap().mode, MaskMode::Analytic(_)));
    assert_eq!(e.sdf_cache().build_count(), 0);
    assert!(e.sdf_cache().is_empty());
}

#[test]
fn edge_budget_allocation() {
    let alloc = allocate(&[10, 5, 3], 8);
    assert_eq!(alloc.iter().sum::<usize>(), 8);
    for (a, c) in alloc.iter().zip([10, 5, 3]) {
        assert!(*a <= c);
    }
}

#[test]
fn sdf_cache_reuses_texture_for_same_geometry() {
    let mut e = engine();
    let s = scene_with(vec![rect(10.0, 10.0, 50.0, 40.0), rect(40.0, 30.0, 50.0, 40.0)], vec![filter(20.0, false)]);
    let first = e.build_or_refresh_region_mask(&s, "r").unwrap().sdf.clone().unwrap();
    let second = e.build_or_refresh_region_mask(&s, "r").unwrap().sdf.clone().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(e.sdf_cache().build_count(), 1);

    e.destroy_region_mask("r");
    assert!(e.sdf_cache().is_empty());
}

#[test]
fn cutout_matches_base_without_foreground() {
    let mut e = engine();
    let s = scene_with(vec![rect(20.0, 20.0, 60.0, 40.0)], vec![filter(0.0, true)]);
    let entry = e.build_or_refresh_region_mask(&s, "r").unwrap();
    let base = entry.base.as_ref().unwrap();
    let cutout = entry.cutout.as_ref().expect("below-token filter gets a cutout");
    assert_eq!(base.pixels, cutout.pixels);
}

#[test]
fn distance_grows_towards_the_interior() {
    let mut mask = image::GrayImage::new(41, 41);
    for y in 5..36 {
        for x in 5..36 {
            mask.put_pixel(x, y, image::Luma([255]));
        }
    }
    let sdf = SignedDistanceField::from_mask(&mask);
    let row: Vec<f32> = (0..=20).map(|x| sdf.get(x, 20)).collect();
    assert!(row.windows(2).all(|w| w[1] > w[0]), "{:?}", row);
    assert!(sdf.get(0, 20) < 0.0);
    assert!(sdf.get(20, 20) > 0.0);
}

#[test]
fn pool_drains_after_destroy_all() {
    let mut e = engine();
    let mut s = scene_with(vec![rect(10.0, 10.0, 50.0, 40.0)], vec![filter(0.0, true)]);
    s.regions.push(Region {
        id: "r2".into(),
        shapes: vec![Shape::solid(circle(80.0, 80.0, 20.0))],
        filters: vec![filter(25.0, false)],
        gate: GateConfig::default(),
    });
    e.draw(&s);
    e.on_frame(&s);
    assert!(e.pool_stats().outstanding > 0);
    e.destroy_all_masks();
    assert_eq!(e.pool_stats().outstanding, 0);
    assert_eq!(e.entries().count(), 0);
}

#[test]
fn engine_without_device_does_nothing() {
    let mut e = MaskEngine::new(EngineSettings::default(), None);
    let s = scene_with(vec![rect(10.0, 10.0, 50.0, 40.0)], vec![filter(10.0, true)]);
    assert!(e.build_or_refresh_region_mask(&s, "r").is_none());
    e.request_all_mask_refresh();
    e.draw(&s);
    e.on_frame(&s);
    assert!(e.entry("r").is_none());
    assert!(!e.is_refresh_pending(None));
    assert_eq!(e.pool_stats().allocated, 0);
}
