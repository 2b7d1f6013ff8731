// ============================================================================
// regionmask CLI — headless mask rendering from scene description files
// ============================================================================
//
// Usage examples:
//   regionmask -i scene.json
//   regionmask -i scenes/*.json --output-dir out/
//   regionmask -i a.json b.json --max-texture 2048 -v
//   regionmask -i scene.json --gpu --config tuned.cfg
//
// Each scene is drawn once by a fresh engine and every region with filters
// is written out as PNG rasters next to the scene (or into --output-dir).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::GrayImage;

use regionmask::engine::{MaskEngine, MaskEntry, Scene};
use regionmask::filter::BoundFilter;
use regionmask::gpu::{FadeRenderer, GpuContext, RenderDevice};
use regionmask::logger::{self, LogLevel};
use regionmask::settings::EngineSettings;
use regionmask::{log_info, log_warn};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// regionmask headless renderer.
///
/// Builds camera-aligned region masks, token cutouts, SDFs and fade
/// previews for scene files without a host application.
#[derive(Parser, Debug)]
#[command(
    name = "regionmask",
    about = "Render region masks and edge-fade previews from scene files",
    long_about = "Load JSON scene descriptions (regions, view, foreground objects,\n\
                  viewers), build every region mask and write PNG outputs:\n\
                  <scene>_<region>_mask.png, _cutout.png, _sdf.png and _fade.png.\n\n\
                  Example:\n  \
                  regionmask -i scene.json --output-dir out/"
)]
pub struct CliArgs {
    /// Scene file(s). Glob patterns accepted (e.g. "scenes/*.json").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Directory for the PNG outputs. Defaults to each scene's directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Texture size limit for the CPU device.
    #[arg(long, value_name = "N")]
    pub max_texture: Option<u32>,

    /// Mirror rasters to a GPU and render fade previews with the shader.
    #[arg(long)]
    pub gpu: bool,

    /// Settings file (key=value). Defaults to the platform settings path.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-file timing and debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all scenes and return an OS exit code.
/// `0` = all scenes succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let mut settings = match &args.config {
        Some(path) => EngineSettings::load_from(path),
        None => EngineSettings::load(),
    };
    if args.verbose {
        settings.log_level = LogLevel::Debug;
    }
    logger::init(settings.log_level);

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let device = if args.gpu {
        settings.gpu_acceleration = true;
        RenderDevice::detect(&settings)
    } else {
        RenderDevice::headless(args.max_texture.unwrap_or(settings.fallback_max_texture))
    };
    let fade_renderer = device.gpu().map(FadeRenderer::new);

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let out_dir = match &args.output_dir {
            Some(d) => d.clone(),
            None => input_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        };

        match run_one(input_path, &out_dir, &settings, &device, fade_renderer.as_ref()) {
            Ok(written) => {
                if args.verbose || multi {
                    println!(
                        "  → {} file(s) in {} ({:.0}ms)",
                        written,
                        out_dir.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-scene pipeline
// ============================================================================

fn run_one(
    input: &Path,
    out_dir: &Path,
    settings: &EngineSettings,
    device: &RenderDevice,
    fade_renderer: Option<&FadeRenderer>,
) -> Result<usize, String> {
    // -- Step 1: Load ----------------------------------------------------
    let text = std::fs::read_to_string(input).map_err(|e| format!("read failed: {}", e))?;
    let scene = Scene::from_json(&text).map_err(|e| format!("{}", e))?;
    let stem = input
        .file_stem()
        .ok_or_else(|| "input has no file name".to_string())?
        .to_string_lossy()
        .into_owned();

    // -- Step 2: Draw ----------------------------------------------------
    let mut engine = MaskEngine::new(settings.clone(), Some(device.clone()));
    engine.draw(&scene);
    engine.on_frame(&scene);

    // -- Step 3: Write ---------------------------------------------------
    let mut written = 0;
    for region in &scene.regions {
        let Some(entry) = engine.entry(&region.id) else {
            continue;
        };
        if entry.inert {
            log_info!("{}: region {} has no mask", stem, region.id);
            continue;
        }
        let prefix = format!("{}_{}", stem, sanitize(&region.id));
        let save = |suffix: &str, img: &GrayImage| -> Result<(), String> {
            let path = out_dir.join(format!("{}_{}.png", prefix, suffix));
            img.save(&path).map_err(|e| format!("could not write '{}': {}", path.display(), e))
        };

        if let Some(base) = &entry.base {
            save("mask", &base.pixels)?;
            written += 1;
        }
        if let Some(cutout) = &entry.cutout {
            save("cutout", &cutout.pixels)?;
            written += 1;
        }
        if let Some(sdf) = &entry.sdf {
            save("sdf", &sdf.pixels)?;
            written += 1;
        }
        if let Some(filter) = entry.filters.first()
            && let Some(img) = fade_preview(entry, filter, device, fade_renderer)
        {
            save("fade", &img)?;
            written += 1;
        }
    }

    engine.teardown();
    Ok(written)
}

/// Shader output when a GPU is attached, the CPU evaluator otherwise.
fn fade_preview(
    entry: &MaskEntry,
    filter: &BoundFilter,
    device: &RenderDevice,
    renderer: Option<&FadeRenderer>,
) -> Option<GrayImage> {
    if let (Some(ctx), Some(renderer)) = (device.gpu(), renderer)
        && let Some(img) = gpu_fade(ctx, renderer, entry, filter)
    {
        return Some(img);
    }
    entry.preview(filter)
}

fn gpu_fade(ctx: &GpuContext, renderer: &FadeRenderer, entry: &MaskEntry, filter: &BoundFilter) -> Option<GrayImage> {
    let mask = entry.mask_for(filter)?.gpu.as_ref()?;
    let u = &filter.uniforms;
    let sdf = u.sdf.as_ref().and_then(|s| s.gpu.as_ref());
    let width = (u.view_size[0] / u.device_to_css).round().max(1.0) as u32;
    let height = (u.view_size[1] / u.device_to_css).round().max(1.0) as u32;
    match renderer.render(ctx, &u.to_gpu(), &u.edges, mask, sdf, width, height) {
        Ok(img) => Some(img),
        Err(e) => {
            log_warn!("GPU fade preview failed ({}), using CPU evaluator", e);
            None
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Region ids become file name parts.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_ids_are_file_safe() {
        assert_eq!(sanitize("Region.abc/1"), "Region_abc_1");
        assert_eq!(sanitize("ok-id_2"), "ok-id_2");
    }

    #[test]
    fn literal_paths_are_deduplicated() {
        let here = env!("CARGO_MANIFEST_DIR").to_string() + "/Cargo.toml";
        let found = resolve_inputs(&[here.clone(), here]);
        assert_eq!(found.len(), 1);
    }
}
