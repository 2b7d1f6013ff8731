// ============================================================================
// GPU SHADERS — WGSL kept inline for containment
// ============================================================================

// ============================================================================
// REGION FADE SHADER — mask × edge fade, evaluated per output pixel
// ============================================================================
//
// One fullscreen triangle.  Each fragment maps its device position to CSS
// (for the mask lookup) and to world space (for the fade distance), then
// computes the signed distance with whichever representation is bound:
//
//   region_shape 1 / 2 — analytic box / ellipse
//   region_shape 0     — edge list (use_sdf 0) or SDF texture (use_sdf 1)
//
// Output is a single-channel coverage value: mask · fade · strength.
pub const REGION_FADE_SHADER: &str = r#"
struct RegionFade {
    css_to_world: mat3x3<f32>,
    uv_from_world: mat3x3<f32>,
    view_size: vec2<f32>,
    center: vec2<f32>,
    half_size: vec2<f32>,
    sdf_texel: vec2<f32>,
    sdf_decode: vec2<f32>,
    rotation: f32,
    region_shape: i32,
    use_sdf: u32,
    edge_count: u32,
    fade_pct: f32,
    fade_world: f32,
    use_pct: u32,
    smooth_k_world: f32,
    inside_max: f32,
    has_mask: f32,
    mask_ready: f32,
    strength: f32,
    device_to_css: f32,
    _pad0: f32,
};

@group(0) @binding(0) var<uniform> u: RegionFade;
@group(0) @binding(1) var<storage, read> edges: array<vec4<f32>>;
@group(1) @binding(0) var mask_tex: texture_2d<f32>;
@group(1) @binding(1) var mask_samp: sampler;
@group(1) @binding(2) var sdf_tex: texture_2d<f32>;
@group(1) @binding(3) var sdf_samp: sampler;

@vertex
fn vs_fullscreen(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4<f32> {
    let x = f32((vi << 1u) & 2u);
    let y = f32(vi & 2u);
    return vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
}

fn to_local(world: vec2<f32>) -> vec2<f32> {
    let d = world - u.center;
    let c = cos(u.rotation);
    let s = sin(u.rotation);
    return vec2<f32>(d.x * c + d.y * s, -d.x * s + d.y * c);
}

fn sd_box(world: vec2<f32>) -> f32 {
    let p = abs(to_local(world));
    return min(u.half_size.x - p.x, u.half_size.y - p.y);
}

fn sd_ellipse(world: vec2<f32>) -> f32 {
    let p = to_local(world);
    let r = max(u.half_size, vec2<f32>(1e-6));
    if (dot(p, p) < 1e-12) {
        return min(r.x, r.y);
    }
    let k0 = length(p / r);
    let k1 = length(p / (r * r));
    return -k0 * (k0 - 1.0) / k1;
}

fn seg_dist(p: vec2<f32>, a: vec2<f32>, b: vec2<f32>) -> f32 {
    let ab = b - a;
    let len2 = dot(ab, ab);
    var t = 0.0;
    if (len2 > 0.0) {
        t = clamp(dot(p - a, ab) / len2, 0.0, 1.0);
    }
    return length(p - (a + t * ab));
}

fn sd_edges(world: vec2<f32>) -> f32 {
    var inside = false;
    var d = 1e20;
    for (var i = 0u; i < u.edge_count; i = i + 1u) {
        let e = edges[i];
        let a = e.xy;
        let b = e.zw;
        if ((a.y > world.y) != (b.y > world.y)) {
            let x = a.x + (world.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if (world.x < x) {
                inside = !inside;
            }
        }
        d = min(d, seg_dist(world, a, b));
    }
    if (inside) {
        return d;
    }
    return -d;
}

fn sd_texture(world: vec2<f32>) -> f32 {
    let uv = (u.uv_from_world * vec3<f32>(world, 1.0)).xy;
    let v = textureSampleLevel(sdf_tex, sdf_samp, uv, 0.0).r;
    return v * u.sdf_decode.x + u.sdf_decode.y;
}

fn fade(sd: f32) -> f32 {
    var width = u.fade_world;
    if (u.use_pct != 0u) {
        width = u.fade_pct * u.inside_max;
    }
    if (width > 0.0) {
        return clamp(sd / width, 0.0, 1.0);
    }
    return smoothstep(-u.smooth_k_world, u.smooth_k_world, sd);
}

@fragment
fn fs_region_fade(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    if (u.has_mask < 0.5 || u.mask_ready < 0.5) {
        return vec4<f32>(0.0);
    }
    let css = frag.xy * u.device_to_css;
    let world = (u.css_to_world * vec3<f32>(css, 1.0)).xy;
    let mask = textureSampleLevel(mask_tex, mask_samp, css / u.view_size, 0.0).r;

    var f = 1.0;
    if (u.region_shape == 1) {
        f = fade(sd_box(world));
    } else if (u.region_shape == 2) {
        f = fade(sd_ellipse(world));
    } else if (u.use_sdf != 0u) {
        f = fade(sd_texture(world));
    } else if (u.edge_count > 0u) {
        f = fade(sd_edges(world));
    }
    return vec4<f32>(mask * f * u.strength, 0.0, 0.0, 1.0);
}
"#;
