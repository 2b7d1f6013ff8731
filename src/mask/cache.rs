// ============================================================================
// SDF CACHE — region SDF textures shared by geometry fingerprint
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::MaskError;
use crate::geometry::fingerprint::GeometryFingerprint;
use crate::log_debug;
use crate::sdf::SdfTexture;

/// Slack when comparing the cached encodable range with the requested one.
const RANGE_EPS: f32 = 1e-6;

/// SDF textures keyed by fingerprint.  Each region records the fingerprint
/// it currently uses; an entry is dropped once no region references it.
#[derive(Default)]
pub struct SdfCache {
    entries: HashMap<String, Arc<SdfTexture>>,
    region_refs: HashMap<String, String>,
    next_id: u64,
    builds: u64,
}

impl SdfCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached texture for `fingerprint` when it can encode `desired` world
    /// units, otherwise the result of `build` (which receives a fresh id).
    pub fn get_or_build<F>(
        &mut self,
        region_id: &str,
        fingerprint: &GeometryFingerprint,
        desired: f32,
        build: F,
    ) -> Result<Arc<SdfTexture>, MaskError>
    where
        F: FnOnce(u64) -> Result<SdfTexture, MaskError>,
    {
        let key = fingerprint.key.as_str();
        let hit = self
            .entries
            .get(key)
            .filter(|sdf| sdf.max_dist_world + RANGE_EPS >= desired)
            .cloned();

        let sdf = match hit {
            Some(sdf) => sdf,
            None => {
                self.next_id += 1;
                let built = Arc::new(build(self.next_id)?);
                self.builds += 1;
                log_debug!(
                    "sdf cache: built {} for region {} (range {:.3}, wanted {:.3})",
                    fingerprint,
                    region_id,
                    built.max_dist_world,
                    desired
                );
                self.entries.insert(key.to_string(), Arc::clone(&built));
                built
            }
        };

        let previous = self.region_refs.insert(region_id.to_string(), key.to_string());
        if let Some(prev) = previous
            && prev != key
        {
            self.evict_if_unreferenced(&prev);
        }
        Ok(sdf)
    }

    /// Forget a region's reference, dropping its entry if now unused.
    pub fn release_region(&mut self, region_id: &str) {
        if let Some(key) = self.region_refs.remove(region_id) {
            self.evict_if_unreferenced(&key);
        }
    }

    fn evict_if_unreferenced(&mut self, key: &str) {
        if !self.region_refs.values().any(|k| k == key) && self.entries.remove(key).is_some() {
            log_debug!("sdf cache: evicted entry no region references");
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.region_refs.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of SDF builds performed so far.
    pub fn build_count(&self) -> u64 {
        self.builds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::shape::{Shape, ShapeKind};
    use crate::math::Rect;
    use crate::sdf::{build_region_sdf, SdfParams};

    fn shapes(r: f32) -> Vec<Shape> {
        vec![
            Shape::solid(ShapeKind::Rectangle { x: 0.0, y: 0.0, width: 40.0, height: 40.0, rotation: 0.0 }),
            Shape::solid(ShapeKind::Circle { x: 40.0, y: 40.0, radius: r }),
        ]
    }

    fn build(shapes: &[Shape], want: f32) -> impl FnOnce(u64) -> Result<SdfTexture, MaskError> + '_ {
        move |id| {
            let params = SdfParams { device_width: 100.0, device_height: 100.0, max_texture: 512, encode_k: 8.0, pad_px: 2 };
            build_region_sdf(id, shapes, Rect::new(0.0, 0.0, 60.0, 60.0), Some(want), &params)
        }
    }

    #[test]
    fn unchanged_geometry_hits_the_cache() {
        let mut cache = SdfCache::new();
        let s = shapes(20.0);
        let fp = GeometryFingerprint::of(&s);
        let a = cache.get_or_build("r1", &fp, 5.0, build(&s, 5.0)).unwrap();
        let b = cache.get_or_build("r1", &fp, 5.0, build(&s, 5.0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.build_count(), 1);
    }

    #[test]
    fn larger_fade_forces_a_rebuild() {
        let mut cache = SdfCache::new();
        let s = shapes(20.0);
        let fp = GeometryFingerprint::of(&s);
        let a = cache.get_or_build("r1", &fp, 1.0, build(&s, 1.0)).unwrap();
        let want = a.max_dist_world * 4.0;
        let b = cache.get_or_build("r1", &fp, want, build(&s, want)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(b.max_dist_world + 1e-6 >= want);
    }

    #[test]
    fn identical_regions_share_and_unused_entries_are_evicted() {
        let mut cache = SdfCache::new();
        let s = shapes(20.0);
        let fp = GeometryFingerprint::of(&s);
        let a = cache.get_or_build("r1", &fp, 5.0, build(&s, 5.0)).unwrap();
        let b = cache.get_or_build("r2", &fp, 5.0, build(&s, 5.0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let moved = shapes(25.0);
        let fp2 = GeometryFingerprint::of(&moved);
        cache.get_or_build("r1", &fp2, 5.0, build(&moved, 5.0)).unwrap();
        assert_eq!(cache.len(), 2);
        cache.release_region("r2");
        assert_eq!(cache.len(), 1);
        cache.release_region("r1");
        assert!(cache.is_empty());
    }
}
