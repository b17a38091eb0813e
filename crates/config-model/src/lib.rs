use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

pub use canvas::{CanvasConfig, CanvasStrategy, ControlPanelConfig};
pub use mask::MaskConfig;
pub use thumbnails::ThumbnailConfig;

mod mask {
    use super::*;

    /// Inputs to hit-region generation for translucent windows.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct MaskConfig {
        /// Pixels with alpha strictly above this value accept pointer input.
        pub alpha_threshold: u8,
        /// Longest edge of the sampled sub-image used for alpha detection.
        pub max_sample_dim: u32,
        /// Delay before the confirmation pass that follows window-flag changes.
        #[serde(with = "humantime_serde")]
        pub confirm_delay: Duration,
        /// Visible images larger than this many pixels are scanned off the UI thread.
        pub offload_min_pixels: u64,
    }

    impl MaskConfig {
        const DEFAULT_ALPHA_THRESHOLD: u8 = 30;
        const DEFAULT_MAX_SAMPLE_DIM: u32 = 300;
        const DEFAULT_CONFIRM_DELAY: Duration = Duration::from_millis(200);
        const DEFAULT_OFFLOAD_MIN_PIXELS: u64 = 512 * 512;
        const MAX_CONFIRM_DELAY: Duration = Duration::from_secs(2);

        pub fn validate(&self) -> Result<()> {
            ensure!(
                self.max_sample_dim >= 16,
                "mask.max-sample-dim must be at least 16"
            );
            ensure!(
                self.confirm_delay <= Self::MAX_CONFIRM_DELAY,
                "mask.confirm-delay must not exceed {}ms",
                Self::MAX_CONFIRM_DELAY.as_millis()
            );
            Ok(())
        }
    }

    impl Default for MaskConfig {
        fn default() -> Self {
            Self {
                alpha_threshold: Self::DEFAULT_ALPHA_THRESHOLD,
                max_sample_dim: Self::DEFAULT_MAX_SAMPLE_DIM,
                confirm_delay: Self::DEFAULT_CONFIRM_DELAY,
                offload_min_pixels: Self::DEFAULT_OFFLOAD_MIN_PIXELS,
            }
        }
    }
}

mod canvas {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
    #[serde(rename_all = "kebab-case")]
    pub enum CanvasStrategy {
        /// Hide the viewer and mirror its image into a separate top-most window.
        #[default]
        Overlay,
        /// Turn the viewer window itself frameless, top-most and click-through.
        InPlace,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct ControlPanelConfig {
        pub width: u32,
        pub height: u32,
        pub margin: u32,
    }

    impl Default for ControlPanelConfig {
        fn default() -> Self {
            Self {
                width: 120,
                height: 40,
                margin: 10,
            }
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct CanvasConfig {
        pub strategy: CanvasStrategy,
        pub overlay_opacity: f32,
        /// Time the window server gets to map the overlay before its input shape is set.
        #[serde(with = "humantime_serde")]
        pub settle_delay: Duration,
        /// Draw the grid, border and title band around the mirrored image.
        pub chrome: bool,
        pub control_panel: ControlPanelConfig,
    }

    impl CanvasConfig {
        pub fn validate(&self) -> Result<()> {
            ensure!(
                self.overlay_opacity.is_finite()
                    && self.overlay_opacity > 0.0
                    && self.overlay_opacity <= 1.0,
                "canvas.overlay-opacity must be in (0, 1]"
            );
            ensure!(
                self.control_panel.width > 0 && self.control_panel.height > 0,
                "canvas.control-panel dimensions must be positive"
            );
            ensure!(
                self.settle_delay <= Duration::from_secs(1),
                "canvas.settle-delay must not exceed 1s"
            );
            Ok(())
        }
    }

    impl Default for CanvasConfig {
        fn default() -> Self {
            Self {
                strategy: CanvasStrategy::default(),
                overlay_opacity: 0.7,
                settle_delay: Duration::from_millis(50),
                chrome: true,
                control_panel: ControlPanelConfig::default(),
            }
        }
    }
}

mod thumbnails {
    use super::*;

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct ThumbnailConfig {
        pub size: u32,
        pub spacing: u32,
        pub cache_capacity: usize,
        pub batch_size: usize,
    }

    impl ThumbnailConfig {
        pub fn validate(&self) -> Result<()> {
            ensure!(self.size >= 16, "thumbnails.size must be at least 16");
            ensure!(
                self.cache_capacity > 0,
                "thumbnails.cache-capacity must be greater than zero"
            );
            ensure!(
                self.batch_size > 0,
                "thumbnails.batch-size must be greater than zero"
            );
            Ok(())
        }
    }

    impl Default for ThumbnailConfig {
        fn default() -> Self {
            Self {
                size: 150,
                spacing: 10,
                cache_capacity: 512,
                batch_size: 8,
            }
        }
    }
}
