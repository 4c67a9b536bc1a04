//! Operator settings read by the pipeline every cycle.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::util::{Error, Result};

pub const MAX_BOUNCE_LIMIT: u32 = 32;
pub const RAYS_PER_PIXEL_LIMIT: u32 = 64;

/// Tracer settings that persist between sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerSettings {
    /// Bounces after the primary hit, 0-32.
    pub max_bounce_count: u32,
    /// Samples per pixel per frame, 0-64.
    pub rays_per_pixel: u32,
    /// Blend each frame into the accumulated history.
    pub denoise: bool,
}

impl Default for TracerSettings {
    fn default() -> Self {
        Self {
            max_bounce_count: 4,
            rays_per_pixel: 2,
            denoise: true,
        }
    }
}

impl TracerSettings {
    /// Get settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("boxtrace");
            p.push("settings.json");
            p
        })
    }

    /// Load per-user settings, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Ignoring settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load settings from a file, clamping out-of-range values
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        Ok(settings.sanitized())
    }

    /// Save settings to a file, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Save to the per-user settings file
    pub fn save(&self) -> Result<()> {
        let path = Self::path().ok_or_else(|| Error::other("no config directory"))?;
        self.save_to(path)
    }

    /// Copy with every value clamped to its range.
    pub fn sanitized(mut self) -> Self {
        if self.max_bounce_count > MAX_BOUNCE_LIMIT {
            tracing::warn!("max_bounce_count {} clamped to {}", self.max_bounce_count, MAX_BOUNCE_LIMIT);
            self.max_bounce_count = MAX_BOUNCE_LIMIT;
        }
        if self.rays_per_pixel > RAYS_PER_PIXEL_LIMIT {
            tracing::warn!("rays_per_pixel {} clamped to {}", self.rays_per_pixel, RAYS_PER_PIXEL_LIMIT);
            self.rays_per_pixel = RAYS_PER_PIXEL_LIMIT;
        }
        self
    }

    /// Strict range check, for values coming from the command line.
    pub fn validate(&self) -> Result<()> {
        if self.max_bounce_count > MAX_BOUNCE_LIMIT {
            return Err(Error::InvalidSettings(format!(
                "max_bounce_count must be 0-{MAX_BOUNCE_LIMIT}, got {}",
                self.max_bounce_count
            )));
        }
        if self.rays_per_pixel > RAYS_PER_PIXEL_LIMIT {
            return Err(Error::InvalidSettings(format!(
                "rays_per_pixel must be 0-{RAYS_PER_PIXEL_LIMIT}, got {}",
                self.rays_per_pixel
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = TracerSettings::default();
        assert_eq!(s.max_bounce_count, 4);
        assert_eq!(s.rays_per_pixel, 2);
        assert!(s.denoise);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_sanitize_clamps() {
        let s = TracerSettings { max_bounce_count: 100, rays_per_pixel: 65, denoise: false }.sanitized();
        assert_eq!(s.max_bounce_count, 32);
        assert_eq!(s.rays_per_pixel, 64);
        assert!(!s.denoise);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let s = TracerSettings { rays_per_pixel: 65, ..Default::default() };
        assert!(matches!(s.validate(), Err(Error::InvalidSettings(_))));
        let s = TracerSettings { max_bounce_count: 33, ..Default::default() };
        assert!(matches!(s.validate(), Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: TracerSettings = serde_json::from_str(r#"{ "denoise": false }"#).unwrap();
        assert!(!s.denoise);
        assert_eq!(s.max_bounce_count, 4);
    }

    #[test]
    fn test_save_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let s = TracerSettings { max_bounce_count: 7, rays_per_pixel: 16, denoise: false };
        s.save_to(&path).unwrap();
        assert_eq!(TracerSettings::load_from(&path).unwrap(), s);
    }

    #[test]
    fn test_load_clamps_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "max_bounce_count": 99 }"#).unwrap();
        assert_eq!(TracerSettings::load_from(&path).unwrap().max_bounce_count, 32);
    }

    #[test]
    fn test_load_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(TracerSettings::load_from(&path), Err(Error::Json(_))));
    }
}
