// ============================================================================
// ENGINE SETTINGS — persisted key=value tuning knobs for the mask engine
// ============================================================================

use std::path::{Path, PathBuf};

use crate::logger::LogLevel;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    /// Capacity of the polygon edge uniform array.
    pub max_edges: usize,
    /// Free render targets kept per (width, height, resolution) key.
    pub rt_pool_max_per_key: usize,
    /// SDF encoding slope: encoded = 127.5 + K * signed texel distance.
    pub sdf_encode_k: f32,
    /// Empty texel ring around the SDF raster.
    pub sdf_pad_px: u32,
    /// Segment count used when polygonizing curves for the edge budget.
    pub budget_ellipse_segments: usize,
    pub mask_resolution_cap: f32,
    /// Texture size limit assumed when the device does not report one.
    pub fallback_max_texture: u32,
    pub inradius_cap_ratio: f32,
    pub gpu_acceleration: bool,
    pub preferred_gpu: String,
    pub log_level: LogLevel,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_edges: 64,
            rt_pool_max_per_key: 8,
            sdf_encode_k: 8.0,
            sdf_pad_px: 2,
            budget_ellipse_segments: 48,
            mask_resolution_cap: 4.0,
            fallback_max_texture: 8192,
            inradius_cap_ratio: 3.0,
            gpu_acceleration: true,
            preferred_gpu: "Auto".to_string(),
            log_level: LogLevel::Info,
        }
    }
}

impl EngineSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/regionmask/regionmask_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\regionmask\regionmask_settings.cfg
    /// On macOS:   ~/Library/Application Support/regionmask/regionmask_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("regionmask").join("regionmask_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("regionmask")
                    .join("regionmask_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("regionmask").join("regionmask_settings.cfg"))
        }
    }

    /// Load from the platform settings file (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::settings_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    /// Unknown keys are ignored; a value that fails to parse keeps its default.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "max_edges" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.max_edges = v.max(1);
                    }
                }
                "rt_pool_max_per_key" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.rt_pool_max_per_key = v.max(1);
                    }
                }
                "sdf_encode_k" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.sdf_encode_k = v;
                    }
                }
                "sdf_pad_px" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.sdf_pad_px = v;
                    }
                }
                "budget_ellipse_segments" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.budget_ellipse_segments = v.max(8);
                    }
                }
                "mask_resolution_cap" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v > 0.0
                    {
                        s.mask_resolution_cap = v;
                    }
                }
                "fallback_max_texture" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.fallback_max_texture = v.max(1);
                    }
                }
                "inradius_cap_ratio" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                        && v >= 1.0
                    {
                        s.inradius_cap_ratio = v;
                    }
                }
                "gpu_acceleration" => {
                    s.gpu_acceleration = val == "true";
                }
                "preferred_gpu" => {
                    s.preferred_gpu = val.to_string();
                }
                "log_level" => {
                    if let Some(level) = LogLevel::parse(val) {
                        s.log_level = level;
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "max_edges={}\n\
             rt_pool_max_per_key={}\n\
             sdf_encode_k={}\n\
             sdf_pad_px={}\n\
             budget_ellipse_segments={}\n\
             mask_resolution_cap={}\n\
             fallback_max_texture={}\n\
             inradius_cap_ratio={}\n\
             gpu_acceleration={}\n\
             preferred_gpu={}\n\
             log_level={}\n",
            self.max_edges,
            self.rt_pool_max_per_key,
            self.sdf_encode_k,
            self.sdf_pad_px,
            self.budget_ellipse_segments,
            self.mask_resolution_cap,
            self.fallback_max_texture,
            self.inradius_cap_ratio,
            self.gpu_acceleration,
            self.preferred_gpu,
            self.log_level.as_str(),
        )
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_values_keep_defaults() {
        let s = EngineSettings::parse("max_edges=abc\nsdf_encode_k=-3\nunknown_key=1\nlog_level=debug\n");
        assert_eq!(s.max_edges, 64);
        assert_eq!(s.sdf_encode_k, 8.0);
        assert_eq!(s.log_level, LogLevel::Debug);
    }

    #[test]
    fn config_string_parses_back() {
        let mut s = EngineSettings::default();
        s.max_edges = 32;
        s.gpu_acceleration = false;
        s.preferred_gpu = "Low Power".to_string();
        assert_eq!(EngineSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn save_and_load_through_a_file() {
        let path = std::env::temp_dir().join(format!("regionmask_settings_{}.cfg", std::process::id()));
        let mut s = EngineSettings::default();
        s.rt_pool_max_per_key = 3;
        s.save_to(&path).unwrap();
        let loaded = EngineSettings::load_from(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.rt_pool_max_per_key, 3);
    }
}
