use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use config_model::{CanvasConfig, MaskConfig, ThumbnailConfig};
use serde::Deserialize;
use tracing::debug;

use crate::viewport::ZoomLimits;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub viewer: ViewerOptions,
    pub mask: MaskConfig,
    pub canvas: CanvasConfig,
    pub thumbnails: ThumbnailConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_yaml::from_str(&s).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Like [`Configuration::from_yaml_file`], but a missing file yields defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        Self::from_yaml_file(path)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.viewer.validate()?;
        self.mask.validate().context("invalid mask configuration")?;
        self.canvas
            .validate()
            .context("invalid canvas configuration")?;
        self.thumbnails
            .validate()
            .context("invalid thumbnail configuration")?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ViewerOptions {
    /// Initial client size of the viewer window.
    pub window_width: u32,
    pub window_height: u32,
    /// Draw the single view over a transparent background and hit-test by alpha.
    pub transparent_background: bool,
    pub always_on_top: bool,
    pub title_bar: bool,
    pub window_opacity: f32,
    pub zoom_step: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    #[serde(with = "humantime_serde")]
    pub slideshow_interval: Duration,
}

impl ViewerOptions {
    const MIN_OPACITY: f32 = 0.1;

    pub fn zoom_limits(&self) -> ZoomLimits {
        ZoomLimits {
            step: self.zoom_step,
            min: self.min_scale,
            max: self.max_scale,
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.window_width > 0 && self.window_height > 0,
            "viewer window size must be non-zero"
        );
        ensure!(
            (Self::MIN_OPACITY..=1.0).contains(&self.window_opacity),
            "viewer.window-opacity must be within 0.1..=1.0"
        );
        ensure!(self.zoom_step > 1.0, "viewer.zoom-step must exceed 1.0");
        ensure!(
            self.min_scale > 0.0 && self.min_scale < self.max_scale,
            "viewer.min-scale must be positive and below viewer.max-scale"
        );
        ensure!(
            self.slideshow_interval >= Duration::from_millis(100),
            "viewer.slideshow-interval must be at least 100ms"
        );
        Ok(())
    }
}

impl Default for ViewerOptions {
    fn default() -> Self {
        let zoom = ZoomLimits::default();
        Self {
            window_width: 1024,
            window_height: 768,
            transparent_background: false,
            always_on_top: false,
            title_bar: true,
            window_opacity: 1.0,
            zoom_step: zoom.step,
            min_scale: zoom.min,
            max_scale: zoom.max,
            slideshow_interval: Duration::from_secs(3),
        }
    }
}
