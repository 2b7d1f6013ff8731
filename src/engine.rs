// ============================================================================
// MASK ENGINE — per-view owner of region masks, SDFs, cutouts and gates
// ============================================================================
//
// One engine per active view.  Everything runs on the caller's thread from
// the host's frame callback; the only deferral is the next-frame refresh
// queue.  Public operations never fail: problems are logged and the affected
// region is left without effects until a later frame succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::MaskError;
use crate::filter::binder::{max_fade_fraction, select_mode, MaskSource, RegionBinding};
use crate::filter::fade;
use crate::filter::gate::{GateConfig, GateContext, GateEvent, RegionGate, Viewer};
use crate::filter::{BoundFilter, FilterInstance, MaskMode};
use crate::geometry::analyze::{analyze, has_multiple_non_hole_shapes, is_degenerate, region_inradius, region_rect, region_world_bounds};
use crate::geometry::edges::{budget_edges, region_polygons, Edge};
use crate::geometry::fingerprint::GeometryFingerprint;
use crate::geometry::shape::Shape;
use crate::gpu::context::RenderDevice;
use crate::gpu::pool::{PoolStats, RenderTargetPool};
use crate::gpu::target::RenderTarget;
use crate::mask::cache::SdfCache;
use crate::mask::cutout::{CutoutComposer, ForegroundObject};
use crate::mask::renderer::{build_region_mask, filter_resolution, mask_resolution, AlignedView, ViewKey, ViewState};
use crate::scheduler::{RefreshKey, RefreshQueue, RefreshReason, StableViewWatcher};
use crate::sdf::{build_region_sdf, SdfParams, SdfTexture};
use crate::settings::EngineSettings;
use crate::{log_debug, log_err, log_info, log_warn};

// ============================================================================
// SCENE INPUT
// ============================================================================

/// A region as described by the host scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub id: String,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub filters: Vec<FilterInstance>,
    #[serde(default)]
    pub gate: GateConfig,
}

/// Host state read by the engine.  The engine never mutates it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub view: ViewState,
    #[serde(default)]
    pub foreground: Vec<ForegroundObject>,
    #[serde(default)]
    pub viewers: Vec<Viewer>,
    #[serde(default)]
    pub user_is_gm: bool,
}

impl Scene {
    pub fn from_json(text: &str) -> Result<Self, MaskError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    fn gate_context(&self) -> GateContext<'_> {
        GateContext { viewers: &self.viewers, user_is_gm: self.user_is_gm }
    }
}

// ============================================================================
// MASK ENTRY
// ============================================================================

/// Per-region products of the last build.
#[derive(Debug)]
pub struct MaskEntry {
    pub region_id: String,
    pub base: Option<RenderTarget>,
    pub cutout: Option<RenderTarget>,
    pub filters: Vec<BoundFilter>,
    pub mode: MaskMode,
    pub fingerprint: GeometryFingerprint,
    pub sdf: Option<Arc<SdfTexture>>,
    pub view_key: Option<ViewKey>,
    /// No usable mask: every filter is held at zero strength.
    pub inert: bool,
}

impl MaskEntry {
    fn inert(region: &Region) -> Self {
        let mut filters: Vec<BoundFilter> = region
            .filters
            .iter()
            .cloned()
            .map(|f| inert_binding().bind(f))
            .collect();
        for f in &mut filters {
            f.apply_gate(false);
        }
        Self {
            region_id: region.id.clone(),
            base: None,
            cutout: None,
            filters,
            mode: MaskMode::MaskOnly,
            fingerprint: GeometryFingerprint::of(&region.shapes),
            sdf: None,
            view_key: None,
            inert: true,
        }
    }

    /// The mask a filter samples: the cutout for below-token filters when
    /// one exists, otherwise the base mask.
    pub fn mask_for(&self, filter: &BoundFilter) -> Option<&RenderTarget> {
        match filter.uniforms.mask {
            MaskSource::Cutout => self.cutout.as_ref().or(self.base.as_ref()),
            MaskSource::Base => self.base.as_ref(),
        }
    }

    /// CPU rendition of a filter's output coverage at mask resolution.
    pub fn preview(&self, filter: &BoundFilter) -> Option<GrayImage> {
        self.mask_for(filter).map(|m| fade::preview(m, &filter.uniforms))
    }

    pub fn wants_cutout(&self) -> bool {
        self.filters.iter().any(|f| f.below_tokens)
    }

    fn release_targets(&mut self, pool: &mut RenderTargetPool) {
        if let Some(rt) = self.base.take() {
            pool.release(rt);
        }
        if let Some(rt) = self.cutout.take() {
            pool.release(rt);
        }
    }
}

fn inert_binding() -> RegionBinding {
    RegionBinding {
        mode: MaskMode::MaskOnly,
        css_to_world: crate::math::Affine2::IDENTITY,
        world_per_css: 1.0,
        view_size: [1.0, 1.0],
        device_to_css: 1.0,
        resolution: 1.0,
        inradius: 1e-6,
        bounds: None,
        edges: Arc::from(Vec::new()),
        sdf: None,
        has_cutout: false,
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct MaskEngine {
    settings: EngineSettings,
    device: Option<RenderDevice>,
    pool: RenderTargetPool,
    sdf_cache: SdfCache,
    entries: HashMap<String, MaskEntry>,
    gates: HashMap<String, RegionGate>,
    cutout: CutoutComposer,
    refresh: RefreshQueue,
    stable_view: StableViewWatcher<ViewKey>,
    rebuilt_this_tick: bool,
    frame: u64,
    /// SDF builds left to hand unusable bounds, to exercise the retry path.
    #[cfg(test)]
    poisoned_sdf_builds: u32,
}

impl MaskEngine {
    /// `device = None` means no renderer is attached: every operation is a
    /// no-op until an engine with a device is created.
    pub fn new(settings: EngineSettings, device: Option<RenderDevice>) -> Self {
        let pool = RenderTargetPool::new(settings.rt_pool_max_per_key);
        Self {
            settings,
            device,
            pool,
            sdf_cache: SdfCache::new(),
            entries: HashMap::new(),
            gates: HashMap::new(),
            cutout: CutoutComposer::new(),
            refresh: RefreshQueue::new(),
            stable_view: StableViewWatcher::new(),
            rebuilt_this_tick: false,
            frame: 0,
            #[cfg(test)]
            poisoned_sdf_builds: 0,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn device(&self) -> Option<&RenderDevice> {
        self.device.as_ref()
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn entry(&self, region_id: &str) -> Option<&MaskEntry> {
        self.entries.get(region_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MaskEntry> {
        self.entries.values()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn sdf_cache(&self) -> &SdfCache {
        &self.sdf_cache
    }

    pub fn recompose_count(&self) -> u64 {
        self.cutout.recompose_count()
    }

    pub fn gate(&self, region_id: &str) -> Option<&RegionGate> {
        self.gates.get(region_id)
    }

    pub fn is_refresh_pending(&self, region_id: Option<&str>) -> bool {
        match region_id {
            Some(id) => {
                self.refresh.is_pending(&RefreshKey::Region(id.to_string())) || self.refresh.is_pending(&RefreshKey::All)
            }
            None => !self.refresh.is_empty(),
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    // ------------------------------------------------------------------------
    // Immediate operations
    // ------------------------------------------------------------------------

    /// Build (or rebuild) the mask entry of one region.  Regions without
    /// filters, or missing from the scene, lose their entry instead.
    pub fn build_or_refresh_region_mask(&mut self, scene: &Scene, region_id: &str) -> Option<&MaskEntry> {
        self.device.as_ref()?;

        if let Some(mut old) = self.entries.remove(region_id) {
            old.release_targets(&mut self.pool);
        }

        let Some(region) = scene.region(region_id) else {
            self.forget_region(region_id);
            return None;
        };
        if region.filters.is_empty() {
            self.forget_region(region_id);
            return None;
        }

        let view = match AlignedView::new(&scene.view) {
            Ok(v) => v,
            Err(e) => {
                log_warn!("region {}: view rejected ({}), mask not built", region_id, e);
                return None;
            }
        };

        let entry = if is_degenerate(&region.shapes) {
            log_debug!("region {}: no solid geometry, filters held inert", region_id);
            self.sdf_cache.release_region(region_id);
            MaskEntry::inert(region)
        } else {
            match self.build_entry(scene, region, &view) {
                Ok(entry) => entry,
                Err(e) => {
                    log_err!("region {}: mask build failed ({}), retrying next frame", region_id, e);
                    self.refresh.request_region(region_id, RefreshReason::Retry);
                    MaskEntry::inert(region)
                }
            }
        };

        let gate = self
            .gates
            .entry(region_id.to_string())
            .or_insert_with(|| RegionGate::new(region.gate.clone()));
        gate.reconfigure(region.gate.clone());
        gate.reset_cache();

        self.entries.insert(region_id.to_string(), entry);
        self.apply_gate(scene, region_id);
        self.entries.get(region_id)
    }

    fn build_entry(&mut self, scene: &Scene, region: &Region, view: &AlignedView) -> Result<MaskEntry, MaskError> {
        let Some(device) = self.device.as_ref() else {
            return Err(MaskError::NoDevice);
        };
        let max_tex = device.max_texture_dim();
        let shapes = &region.shapes;

        let analytic = analyze(shapes);
        let force_multi = has_multiple_non_hole_shapes(shapes);
        let max_frac = max_fade_fraction(&region.filters);
        let mode = select_mode(analytic, force_multi, max_frac > 0.0);
        let inradius = region_inradius(shapes, self.settings.inradius_cap_ratio);
        let fingerprint = GeometryFingerprint::of(shapes);

        let edges: Vec<Edge> = if mode == MaskMode::EdgeList {
            budget_edges(&region_polygons(shapes, self.settings.budget_ellipse_segments), self.settings.max_edges)
        } else {
            Vec::new()
        };

        // SDF before any target is acquired, so a failure leaves nothing to release.
        let sdf = if mode == MaskMode::Sdf {
            let rect = region_rect(shapes, &view.snapped)?;
            #[cfg(test)]
            let rect = if self.poisoned_sdf_builds > 0 {
                self.poisoned_sdf_builds -= 1;
                crate::math::Rect::new(f32::NAN, rect.y, rect.width, rect.height)
            } else {
                rect
            };
            let desired = (max_frac * inradius).max(1e-6);
            let params = SdfParams {
                device_width: view.device_width as f32,
                device_height: view.device_height as f32,
                max_texture: max_tex,
                encode_k: self.settings.sdf_encode_k,
                pad_px: self.settings.sdf_pad_px,
            };
            let gpu = device.gpu();
            let sdf = self.sdf_cache.get_or_build(&region.id, &fingerprint, desired, |id| {
                let mut tex = build_region_sdf(id, shapes, rect, Some(desired), &params)?;
                if let Some(ctx) = gpu {
                    tex.upload(ctx);
                }
                Ok(tex)
            })?;
            Some(sdf)
        } else {
            self.sdf_cache.release_region(&region.id);
            None
        };

        let res = mask_resolution(view, max_tex, self.settings.mask_resolution_cap);
        let mut base = build_region_mask(shapes, view, res, &mut self.pool);

        let wants_cutout = region.filters.iter().any(|f| f.options.below_tokens);
        let mut cutout =
            wants_cutout.then(|| self.cutout.compose_full(&base, &scene.foreground, view, &mut self.pool, None));

        if let Some(ctx) = device.gpu() {
            base.sync_gpu(ctx);
            if let Some(c) = cutout.as_mut() {
                c.sync_gpu(ctx);
            }
        }

        let binding = RegionBinding {
            mode,
            css_to_world: view.css_to_world,
            world_per_css: view.world_per_css,
            view_size: [view.css_width as f32, view.css_height as f32],
            device_to_css: 1.0 / view.dpr,
            resolution: filter_resolution(view, max_tex),
            inradius,
            bounds: region_world_bounds(shapes),
            edges: Arc::from(edges),
            sdf: sdf.clone(),
            has_cutout: cutout.is_some(),
        };
        let filters = region.filters.iter().cloned().map(|f| binding.bind(f)).collect();

        log_debug!(
            "region {}: {} mask {}x{} @{:.2}, {} filter(s){}",
            region.id,
            mode.name(),
            base.pixel_width(),
            base.pixel_height(),
            res,
            region.filters.len(),
            if cutout.is_some() { ", cutout" } else { "" }
        );

        Ok(MaskEntry {
            region_id: region.id.clone(),
            view_key: Some(view.view_key(res)),
            base: Some(base),
            cutout,
            filters,
            mode,
            fingerprint,
            sdf,
            inert: false,
        })
    }

    /// Rebuild every region that carries filters and drop entries whose
    /// region is gone or no longer has any.
    pub fn refresh_all_region_masks(&mut self, scene: &Scene) {
        if self.device.is_none() {
            return;
        }
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|id| scene.region(id).is_none_or(|r| r.filters.is_empty()))
            .cloned()
            .collect();
        for id in stale {
            self.destroy_region_mask(&id);
        }
        let ids: Vec<String> = scene.regions.iter().filter(|r| !r.filters.is_empty()).map(|r| r.id.clone()).collect();
        for id in ids {
            self.build_or_refresh_region_mask(scene, &id);
        }
    }

    /// Release every resource held for one region.  Safe to repeat.
    pub fn destroy_region_mask(&mut self, region_id: &str) {
        if let Some(mut entry) = self.entries.remove(region_id) {
            entry.release_targets(&mut self.pool);
            log_debug!("region {}: mask destroyed", region_id);
        }
        self.forget_region(region_id);
    }

    fn forget_region(&mut self, region_id: &str) {
        self.sdf_cache.release_region(region_id);
        self.gates.remove(region_id);
        self.refresh.cancel_region(region_id);
    }

    pub fn destroy_all_masks(&mut self) {
        for (_, mut entry) in self.entries.drain() {
            entry.release_targets(&mut self.pool);
        }
        self.sdf_cache.clear();
        self.gates.clear();
        self.refresh.clear();
        self.cutout.reset(&mut self.pool);
    }

    /// Tear down for good: masks, pending work and pooled targets.
    pub fn teardown(&mut self) {
        self.stable_view.cancel();
        self.destroy_all_masks();
        self.pool.drain();
        self.rebuilt_this_tick = false;
        log_info!("mask engine torn down after {} frame(s)", self.frame);
    }

    // ------------------------------------------------------------------------
    // Deferred operations
    // ------------------------------------------------------------------------

    pub fn request_region_mask_refresh(&mut self, region_id: &str) {
        if self.device.is_some() {
            self.refresh.request_region(region_id, RefreshReason::Requested);
        }
    }

    pub fn request_all_mask_refresh(&mut self) {
        if self.device.is_some() {
            self.refresh.request_all(RefreshReason::Requested);
        }
    }

    /// Run one pending refresh now.  Returns whether anything ran.
    pub fn flush_region_refresh(&mut self, scene: &Scene, region_id: &str) -> bool {
        if self.refresh.flush(&RefreshKey::Region(region_id.to_string())).is_none() {
            return false;
        }
        self.build_or_refresh_region_mask(scene, region_id);
        true
    }

    /// Run everything pending now instead of next frame.
    pub fn flush_pending(&mut self, scene: &Scene) {
        self.run_due(scene);
    }

    /// Drop pending refreshes for one region, or all of them.
    pub fn cancel_pending(&mut self, region_id: Option<&str>) {
        match region_id {
            Some(id) => {
                self.refresh.cancel_region(id);
            }
            None => self.refresh.clear(),
        }
    }

    fn run_due(&mut self, scene: &Scene) {
        let due = self.refresh.drain_due();
        if due.is_empty() {
            return;
        }
        log_debug!(
            "frame {}: {} refresh task(s) due, {} request(s) coalesced so far",
            self.frame,
            due.len(),
            self.refresh.coalesced_count()
        );
        for (key, reason) in due {
            match key {
                RefreshKey::All => self.refresh_all_region_masks(scene),
                RefreshKey::Region(id) => {
                    if reason == RefreshReason::Retry {
                        log_debug!("region {}: retrying mask build", id);
                    }
                    self.build_or_refresh_region_mask(scene, &id);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Host hooks
    // ------------------------------------------------------------------------

    /// Initial (or full) draw: build everything and wait for the view to
    /// settle before refreshing once more.
    pub fn draw(&mut self, scene: &Scene) {
        if self.device.is_none() {
            return;
        }
        self.refresh_all_region_masks(scene);
        self.stable_view.arm();
    }

    /// The camera moved: rebuild now and skip this frame's cutout pass.
    pub fn on_camera_change(&mut self, scene: &Scene) {
        if self.device.is_none() {
            return;
        }
        self.rebuilt_this_tick = true;
        self.refresh_all_region_masks(scene);
    }

    pub fn notify_foreground_objects_changed(&mut self) {
        self.cutout.mark_dirty();
    }

    /// Forward a boundary crossing to a region's gate and re-apply it.
    pub fn notify_gate_event(&mut self, scene: &Scene, region_id: &str, event: GateEvent) {
        if let Some(gate) = self.gates.get_mut(region_id) {
            gate.handle(event);
            self.apply_gate(scene, region_id);
        }
    }

    /// Per-frame work, in order: due refreshes, the stable-view watcher, the
    /// cutout recompose policy, then gates.
    pub fn on_frame(&mut self, scene: &Scene) {
        if self.device.is_none() {
            return;
        }
        self.run_due(scene);

        match AlignedView::new(&scene.view) {
            Ok(view) => {
                if self.stable_view.is_armed() {
                    let max_tex = self.max_texture_dim();
                    let key = view.view_key(mask_resolution(&view, max_tex, self.settings.mask_resolution_cap));
                    if self.stable_view.observe(key) {
                        log_debug!("view stable, refreshing all region masks");
                        self.refresh_all_region_masks(scene);
                    }
                }
                self.update_cutouts(scene, &view);
            }
            Err(e) => log_debug!("frame {}: view rejected ({})", self.frame, e),
        }

        let ids: Vec<String> = self.entries.keys().cloned().collect();
        for id in ids {
            if let Some(region) = scene.region(&id)
                && let Some(gate) = self.gates.get_mut(&id)
                && gate.config() != &region.gate
            {
                gate.reconfigure(region.gate.clone());
            }
            self.apply_gate(scene, &id);
        }

        self.rebuilt_this_tick = false;
        self.frame += 1;
    }

    fn max_texture_dim(&self) -> u32 {
        self.device
            .as_ref()
            .map_or(self.settings.fallback_max_texture, |d| d.max_texture_dim())
    }

    fn update_cutouts(&mut self, scene: &Scene, view: &AlignedView) {
        let any_below = self
            .entries
            .values()
            .any(|e| e.base.is_some() && e.cutout.is_some() && e.wants_cutout());
        if !any_below {
            self.cutout.reset(&mut self.pool);
            return;
        }
        if !self.rebuilt_this_tick && self.cutout.needs_recompose(view.cam_frac) {
            let gpu = self.device.as_ref().and_then(|d| d.gpu());
            for entry in self.entries.values_mut() {
                if !entry.wants_cutout() || entry.cutout.is_none() {
                    continue;
                }
                let Some(base) = entry.base.as_ref() else {
                    continue;
                };
                let reuse = entry.cutout.take();
                let mut out = self
                    .cutout
                    .compose_from_tokens(base, &scene.foreground, view, &mut self.pool, reuse);
                if let Some(ctx) = gpu {
                    out.sync_gpu(ctx);
                }
                entry.cutout = Some(out);
            }
        }
        self.cutout.settle(view.cam_frac);
    }

    /// Evaluate one region's gate and push a changed result into its filters.
    fn apply_gate(&mut self, scene: &Scene, region_id: &str) {
        let Some(entry) = self.entries.get_mut(region_id) else {
            return;
        };
        if entry.inert {
            return;
        }
        let Some(gate) = self.gates.get_mut(region_id) else {
            return;
        };
        if let Some(pass) = gate.update(&scene.gate_context()) {
            for f in &mut entry.filters {
                f.apply_gate(pass);
            }
            log_debug!("region {}: gate {}", region_id, if pass { "open" } else { "closed" });
        }
    }
}

impl Drop for MaskEngine {
    fn drop(&mut self) {
        for (_, mut entry) in self.entries.drain() {
            entry.release_targets(&mut self.pool);
        }
        self.cutout.reset(&mut self.pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::gate::GateMode;
    use crate::filter::options::FilterOptions;
    use crate::geometry::shape::ShapeKind;
    use crate::math::Affine2;

    fn filter(fade: f32, below: bool) -> FilterInstance {
        FilterInstance {
            id: "f1".into(),
            kind: "color".into(),
            options: FilterOptions { fade_percent: fade, below_tokens: below, ..Default::default() },
        }
    }

    fn scene(regions: Vec<Region>) -> Scene {
        Scene {
            regions,
            view: ViewState { transform: Affine2::IDENTITY, device_pixel_ratio: 1.0, css_width: 120, css_height: 120 },
            ..Default::default()
        }
    }

    fn rect_region(id: &str, filters: Vec<FilterInstance>) -> Region {
        Region {
            id: id.into(),
            shapes: vec![Shape::solid(ShapeKind::Rectangle { x: 10.0, y: 10.0, width: 60.0, height: 40.0, rotation: 0.0 })],
            filters,
            gate: GateConfig::default(),
        }
    }

    fn engine() -> MaskEngine {
        MaskEngine::new(EngineSettings::default(), Some(RenderDevice::headless(4096)))
    }

    #[test]
    fn regions_without_filters_get_no_entry() {
        let mut e = engine();
        let s = scene(vec![rect_region("a", vec![])]);
        assert!(e.build_or_refresh_region_mask(&s, "a").is_none());
        assert!(e.build_or_refresh_region_mask(&s, "missing").is_none());
        assert_eq!(e.pool_stats().outstanding, 0);
    }

    #[test]
    fn rebuild_releases_previous_targets() {
        let mut e = engine();
        let s = scene(vec![rect_region("a", vec![filter(0.0, true)])]);
        e.build_or_refresh_region_mask(&s, "a");
        e.build_or_refresh_region_mask(&s, "a");
        // base + cutout
        assert_eq!(e.pool_stats().outstanding, 2);
        assert!(e.pool_stats().reused >= 2);
        e.destroy_region_mask("a");
        e.destroy_region_mask("a");
        assert_eq!(e.pool_stats().outstanding, 0);
    }

    #[test]
    fn degenerate_region_is_inert() {
        let mut e = engine();
        let mut r = rect_region("a", vec![filter(30.0, false)]);
        r.shapes = vec![Shape::solid(ShapeKind::Circle { x: 0.0, y: 0.0, radius: 0.0 })];
        let s = scene(vec![r]);
        let entry = e.build_or_refresh_region_mask(&s, "a").unwrap();
        assert!(entry.inert);
        assert!(entry.base.is_none());
        assert!(entry.filters.iter().all(|f| !f.enabled && f.uniforms.strength == 0.0));
        e.on_frame(&s);
        assert!(e.entry("a").unwrap().filters.iter().all(|f| !f.enabled));
    }

    #[test]
    fn requests_coalesce_until_next_frame() {
        let mut e = engine();
        let s = scene(vec![rect_region("a", vec![filter(0.0, false)])]);
        e.request_region_mask_refresh("a");
        e.request_region_mask_refresh("a");
        assert!(e.entry("a").is_none());
        assert!(e.is_refresh_pending(Some("a")));
        e.on_frame(&s);
        assert!(e.entry("a").is_some());
        assert!(!e.is_refresh_pending(None));

        e.request_all_mask_refresh();
        e.cancel_pending(None);
        assert!(!e.is_refresh_pending(None));
    }

    #[test]
    fn gate_events_toggle_filters() {
        let mut e = engine();
        let mut r = rect_region("a", vec![filter(0.0, false)]);
        r.gate = GateConfig { mode: GateMode::EnterExit, ..Default::default() };
        let s = scene(vec![r]);
        e.build_or_refresh_region_mask(&s, "a");
        assert!(!e.entry("a").unwrap().filters[0].enabled);
        e.notify_gate_event(&s, "a", GateEvent::Enter);
        assert!(e.entry("a").unwrap().filters[0].enabled);
        assert_eq!(e.entry("a").unwrap().filters[0].uniforms.strength, 1.0);
        e.notify_gate_event(&s, "a", GateEvent::Exit);
        e.on_frame(&s);
        assert!(!e.entry("a").unwrap().filters[0].enabled);
    }

    #[test]
    fn stable_view_refresh_after_draw() {
        let mut e = engine();
        let s = scene(vec![rect_region("a", vec![filter(0.0, false)])]);
        e.draw(&s);
        let first = e.entry("a").unwrap().base.as_ref().unwrap().id;
        e.on_frame(&s);
        e.on_frame(&s);
        assert_eq!(e.entry("a").unwrap().base.as_ref().unwrap().id, first);
        e.on_frame(&s);
        // Rebuilt once: the previous target came back through the pool.
        assert_eq!(e.pool_stats().outstanding, 1);
        assert!(e.pool_stats().reused >= 1);
    }

    #[test]
    fn cutout_recompose_follows_tokens_and_camera() {
        let mut e = engine();
        let mut s = scene(vec![rect_region("a", vec![filter(0.0, true)])]);
        s.foreground.push(ForegroundObject {
            id: "tok".into(),
            visible: true,
            hidden: false,
            occluded: false,
            transform: Affine2::translate(30.0, 30.0),
            silhouette: crate::mask::cutout::Silhouette::Outline(ShapeKind::Circle { x: 0.0, y: 0.0, radius: 5.0 }),
        });
        e.build_or_refresh_region_mask(&s, "a");
        e.on_frame(&s);
        let after_first = e.recompose_count();
        assert_eq!(after_first, 1);
        e.on_frame(&s);
        assert_eq!(e.recompose_count(), after_first);

        e.notify_foreground_objects_changed();
        e.on_frame(&s);
        assert_eq!(e.recompose_count(), after_first + 1);

        s.view.transform = Affine2::camera(1.0, 0.25, 0.0);
        e.on_frame(&s);
        assert_eq!(e.recompose_count(), after_first + 2);

        s.view.transform = Affine2::camera(1.0, 0.5, 0.0);
        e.on_camera_change(&s);
        e.on_frame(&s);
        assert_eq!(e.recompose_count(), after_first + 2);
    }

    #[test]
    fn without_device_everything_is_a_no_op() {
        let mut e = MaskEngine::new(EngineSettings::default(), None);
        let s = scene(vec![rect_region("a", vec![filter(10.0, true)])]);
        assert!(e.build_or_refresh_region_mask(&s, "a").is_none());
        e.request_all_mask_refresh();
        e.draw(&s);
        e.on_frame(&s);
        e.on_camera_change(&s);
        assert!(e.entry("a").is_none());
        assert!(!e.is_refresh_pending(None));
        assert_eq!(e.pool_stats().allocated, 0);
    }

    #[test]
    fn scene_parses_from_json() {
        let s = Scene::from_json(
            r#"{
                "view": { "transform": { "a": 1, "b": 0, "c": 0, "d": 1, "tx": 0, "ty": 0 }, "cssWidth": 64, "cssHeight": 48 },
                "regions": [{
                    "id": "r1",
                    "shapes": [{ "type": "circle", "x": 10, "y": 10, "radius": 5 }],
                    "filters": [{ "id": "f", "type": "color", "options": { "fadePercent": 25 } }],
                    "gate": { "mode": "pov", "elevation": { "bottom": 0 } }
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(s.view.css_width, 64);
        assert_eq!(s.region("r1").unwrap().gate.mode, GateMode::Pov);
        assert!(Scene::from_json("{ not json").is_err());
    }

    #[test]
    fn failed_sdf_build_is_inert_then_retried() {
        let mut e = engine();
        e.poisoned_sdf_builds = 1;
        let mut r = rect_region("a", vec![filter(30.0, false)]);
        r.shapes.push(Shape::solid(ShapeKind::Rectangle { x: 40.0, y: 30.0, width: 50.0, height: 40.0, rotation: 0.0 }));
        let s = scene(vec![r]);

        let entry = e.build_or_refresh_region_mask(&s, "a").unwrap();
        assert!(entry.inert);
        assert!(entry.base.is_none() && entry.sdf.is_none());
        assert!(entry.filters.iter().all(|f| !f.enabled && f.uniforms.strength == 0.0));
        assert!(e.is_refresh_pending(Some("a")));
        assert_eq!(e.sdf_cache().build_count(), 0);
        assert_eq!(e.pool_stats().outstanding, 0);

        e.on_frame(&s);
        let entry = e.entry("a").unwrap();
        assert!(!entry.inert);
        assert_eq!(entry.mode, MaskMode::Sdf);
        assert!(entry.sdf.is_some());
        assert!(entry.filters.iter().all(|f| f.enabled && f.uniforms.strength == 1.0));
        assert!(!e.is_refresh_pending(None));
        assert_eq!(e.sdf_cache().build_count(), 1);
    }

    #[test]
    fn shared_tokens_target_is_painted_once_per_frame() {
        let mut e = engine();
        let mut second = rect_region("b", vec![filter(0.0, true)]);
        second.shapes = vec![Shape::solid(ShapeKind::Rectangle { x: 50.0, y: 50.0, width: 40.0, height: 40.0, rotation: 0.0 })];
        let mut s = scene(vec![rect_region("a", vec![filter(0.0, true)]), second]);
        s.foreground.push(ForegroundObject {
            id: "tok".into(),
            visible: true,
            hidden: false,
            occluded: false,
            transform: Affine2::translate(55.0, 55.0),
            silhouette: crate::mask::cutout::Silhouette::Outline(ShapeKind::Circle { x: 0.0, y: 0.0, radius: 5.0 }),
        });
        e.refresh_all_region_masks(&s);
        e.on_frame(&s);
        assert_eq!(e.recompose_count(), 2);
        assert_eq!(e.cutout.tokens_paint_count(), 1);

        e.notify_foreground_objects_changed();
        e.on_frame(&s);
        assert_eq!(e.recompose_count(), 4);
        assert_eq!(e.cutout.tokens_paint_count(), 2);
    }
}
