//! Startup settings: the scale table, palette and domain, plus where they
//! are loaded from.

use crate::colour::Rgba;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// One reaction-diffusion layer. Immutable once the pipeline is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    pub activator_radius: f32,
    pub inhibitor_radius: f32,
    pub small_amount: f32,
    pub symmetry: u32,
    pub colour: Rgba,
}

impl ScaleConfig {
    pub fn new(
        activator_radius: f32,
        inhibitor_radius: f32,
        small_amount: f32,
        symmetry: u32,
        colour: Rgba,
    ) -> Self {
        Self {
            activator_radius,
            inhibitor_radius,
            small_amount,
            symmetry,
            colour,
        }
    }

    /// `extent` is the longer domain side; no radius may exceed it.
    pub(crate) fn validate(&self, index: usize, extent: usize) -> Result<(), ConfigError> {
        for (which, value) in [
            ("activator", self.activator_radius),
            ("inhibitor", self.inhibitor_radius),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidRadius {
                    index,
                    which,
                    value,
                });
            }
            if value > extent as f32 {
                return Err(ConfigError::RadiusTooLarge {
                    index,
                    which,
                    value,
                    limit: extent,
                });
            }
        }
        if self.activator_radius > self.inhibitor_radius {
            return Err(ConfigError::RadiiOrder {
                index,
                activator: self.activator_radius,
                inhibitor: self.inhibitor_radius,
            });
        }
        if !self.small_amount.is_finite() || self.small_amount <= 0.0 {
            return Err(ConfigError::InvalidStep {
                index,
                value: self.small_amount,
            });
        }
        if self.symmetry < 1 {
            return Err(ConfigError::InvalidSymmetry { index });
        }
        if !self.colour.is_valid() {
            return Err(ConfigError::InvalidColour {
                field: format!("scales[{index}].colour"),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    /// Fill used by the one-time clear before the first frame.
    pub background: Rgba,
    /// Base tint where the grid noise is -1.
    pub base_low: Rgba,
    /// Base tint where the grid noise is +1.
    pub base_high: Rgba,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Rgba::BLACK,
            base_low: Rgba::from_rgb8(10, 10, 16),
            base_high: Rgba::from_rgb8(28, 26, 38),
        }
    }
}

impl Palette {
    pub fn base(&self, noise: f32) -> Rgba {
        self.base_low.lerp(self.base_high, (noise + 1.0) * 0.5)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub width: usize,
    pub height: usize,
    pub seed: u64,
    #[serde(default)]
    pub palette: Palette,
    pub scales: Vec<ScaleConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            seed: 0xC0FFEE_u64,
            palette: Palette::default(),
            scales: vec![
                ScaleConfig::new(100.0, 200.0, 0.05, 4, Rgba::new(0.9764, 0.7333, 0.9804, 1.0)),
                ScaleConfig::new(150.0, 200.0, 0.04, 2, Rgba::from_rgb8(113, 237, 242)),
                ScaleConfig::new(30.0, 50.0, 0.03, 1, Rgba::from_rgb8(208, 167, 250)),
                ScaleConfig::new(10.0, 50.0, 0.02, 1, Rgba::from_rgb8(251, 255, 155)),
                ScaleConfig::new(1.0, 2.0, 0.01, 1, Rgba::from_rgb8(181, 252, 184)),
            ],
        }
    }
}

impl Settings {
    pub fn cells(&self) -> usize {
        self.width * self.height
    }

    /// Checks every startup invariant. Run once before the first frame.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::EmptyDomain {
                width: self.width,
                height: self.height,
            });
        }
        if self.width.checked_mul(self.height).is_none() {
            return Err(ConfigError::DomainTooLarge {
                width: self.width,
                height: self.height,
            });
        }
        if self.scales.is_empty() {
            return Err(ConfigError::NoScales);
        }
        for (name, c) in [
            ("palette.background", &self.palette.background),
            ("palette.base_low", &self.palette.base_low),
            ("palette.base_high", &self.palette.base_high),
        ] {
            if !c.is_valid() {
                return Err(ConfigError::InvalidColour {
                    field: name.to_string(),
                });
            }
        }
        for (i, s) in self.scales.iter().enumerate() {
            s.validate(i, self.width.max(self.height))?;
        }
        Ok(())
    }

    /// Copy with every radius multiplied by `factor`; used for quick previews
    /// on small domains.
    pub fn scaled(&self, factor: f32) -> Settings {
        let mut out = self.clone();
        for s in &mut out.scales {
            s.activator_radius *= factor;
            s.inhibitor_radius *= factor;
        }
        out
    }
}

pub fn project_settings_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "turing-patterns", "TuringPatterns")?;
    Some(proj.config_dir().join("settings.json"))
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("could not parse settings file {}", path.display()))?;
    debug!(path = %path.display(), scales = settings.scales.len(), "loaded settings");
    Ok(settings)
}

/// Explicit path first, then the per-user settings file if one exists,
/// then built-in defaults.
pub fn resolve_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return load_settings(path);
    }
    match project_settings_path() {
        Some(path) if path.is_file() => {
            info!(path = %path.display(), "using per-user settings");
            load_settings(&path)
        }
        _ => Ok(Settings::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_scale() -> Settings {
        Settings {
            width: 8,
            height: 8,
            seed: 1,
            palette: Palette::default(),
            scales: vec![ScaleConfig::new(1.0, 2.0, 0.1, 1, Rgba::BLACK)],
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(Settings::default().validate(), Ok(()));
        assert_eq!(Settings::default().scales.len(), 5);
    }

    #[test]
    fn test_rejects_empty_domain() {
        let mut s = one_scale();
        s.height = 0;
        assert!(matches!(s.validate(), Err(ConfigError::EmptyDomain { .. })));
    }

    #[test]
    fn test_rejects_no_scales() {
        let mut s = one_scale();
        s.scales.clear();
        assert_eq!(s.validate(), Err(ConfigError::NoScales));
    }

    #[test]
    fn test_rejects_radius_beyond_domain() {
        let mut s = one_scale();
        s.scales[0].inhibitor_radius = 1e30;
        assert!(matches!(
            s.validate(),
            Err(ConfigError::RadiusTooLarge {
                index: 0,
                which: "inhibitor",
                limit: 8,
                ..
            })
        ));
        s.scales[0].inhibitor_radius = 8.0;
        assert_eq!(s.validate(), Ok(()));
        s.scales[0].inhibitor_radius = 8.5;
        assert!(matches!(s.validate(), Err(ConfigError::RadiusTooLarge { .. })));
    }

    #[test]
    fn test_rejects_swapped_radii() {
        let mut s = one_scale();
        s.scales[0].activator_radius = 3.0;
        assert!(matches!(
            s.validate(),
            Err(ConfigError::RadiiOrder { index: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        let mut s = one_scale();
        s.scales[0].activator_radius = 0.0;
        assert!(matches!(
            s.validate(),
            Err(ConfigError::InvalidRadius {
                which: "activator",
                ..
            })
        ));
        s.scales[0].activator_radius = f32::NAN;
        assert!(matches!(s.validate(), Err(ConfigError::InvalidRadius { .. })));
    }

    #[test]
    fn test_rejects_bad_step_and_symmetry() {
        let mut s = one_scale();
        s.scales[0].small_amount = 0.0;
        assert!(matches!(s.validate(), Err(ConfigError::InvalidStep { .. })));
        let mut s = one_scale();
        s.scales[0].symmetry = 0;
        assert_eq!(s.validate(), Err(ConfigError::InvalidSymmetry { index: 0 }));
    }

    #[test]
    fn test_rejects_out_of_range_colour() {
        let mut s = one_scale();
        s.scales[0].colour = Rgba::new(1.5, 0.0, 0.0, 1.0);
        assert!(matches!(s.validate(), Err(ConfigError::InvalidColour { .. })));
    }

    #[test]
    fn test_scaled_multiplies_radii() {
        let s = Settings::default().scaled(0.25);
        assert_eq!(s.scales[0].activator_radius, 25.0);
        assert_eq!(s.scales[0].inhibitor_radius, 50.0);
        assert_eq!(s.scales[0].small_amount, 0.05);
    }

    #[test]
    fn test_json_round_trip_keeps_scales() {
        let s = Settings::default();
        let text = serde_json::to_string_pretty(&s).unwrap();
        let back: Settings = serde_json::from_str(&text).unwrap();
        assert_eq!(back.scales.len(), s.scales.len());
        assert_eq!(back.scales[3].symmetry, 1);
        assert_eq!(back.width, 512);
    }

    #[test]
    fn test_palette_defaults_when_missing() {
        let text = r##"{
            "width": 4, "height": 4, "seed": 7,
            "scales": [
                {"activator_radius": 1, "inhibitor_radius": 2, "small_amount": 0.1,
                 "symmetry": 1, "colour": "#ff0000"}
            ]
        }"##;
        let s: Settings = serde_json::from_str(text).unwrap();
        assert_eq!(s.palette, Palette::default());
        assert_eq!(s.scales[0].colour, Rgba::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_load_settings_reports_missing_file() {
        let path = std::env::temp_dir().join("turing-patterns-missing-settings.json");
        let _ = fs::remove_file(&path);
        let err = load_settings(&path).unwrap_err();
        assert!(err.to_string().contains("could not read settings file"));
    }
}
