// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Validated driver configuration.
//!
//! [`DriverConfig`] is built from CLI arguments (or directly in tests),
//! validated once, and then treated as immutable: the node never mutates an
//! active configuration, and a rejected configuration leaves the previously
//! accepted one in effect.  Changing parameters on a live node requires a
//! disable/enable cycle.

use crate::camera::Error;
use clap::ValueEnum;
use std::fmt;
use std::time::Duration;

/// Depth computation quality preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DepthMode {
    /// Fastest mode, lowest depth quality
    Performance,
    /// Balanced quality preset
    #[default]
    Quality,
    /// Highest-detail stereo matching
    Ultra,
    /// Learned depth inference
    Neural,
}

impl fmt::Display for DepthMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DepthMode::Performance => write!(f, "performance"),
            DepthMode::Quality => write!(f, "quality"),
            DepthMode::Ultra => write!(f, "ultra"),
            DepthMode::Neural => write!(f, "neural"),
        }
    }
}

/// Supported capture resolutions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Resolution {
    /// 2208x1242
    Hd2k,
    /// 1920x1080
    Hd1080,
    /// 1280x720
    #[default]
    Hd720,
    /// 672x376
    Vga,
}

impl Resolution {
    /// Capture dimensions in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::Hd2k => (2208, 1242),
            Resolution::Hd1080 => (1920, 1080),
            Resolution::Hd720 => (1280, 720),
            Resolution::Vga => (672, 376),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Resolution::Hd2k => write!(f, "hd2k"),
            Resolution::Hd1080 => write!(f, "hd1080"),
            Resolution::Hd720 => write!(f, "hd720"),
            Resolution::Vga => write!(f, "vga"),
        }
    }
}

/// Validated driver parameters.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    /// Depth computation preset.
    pub depth_mode: DepthMode,
    /// Target frame rate in Hz, 1..=120.
    pub fps: u32,
    /// Capture resolution.
    pub resolution: Resolution,
    /// Depth confidence threshold, 0..=100.
    pub confidence: u8,
    /// Texture confidence threshold, 0..=100.
    pub texture_confidence: u8,
    /// Prefix applied to every non-global frame name.
    pub link_namespace: String,
    /// Log per-sample tracking state.
    pub verbose: bool,
    /// Consecutive grab failures treated as a device disconnection.
    pub grab_failure_limit: u32,
    /// ROI box sizes in metres (forward, lateral, vertical).
    pub roi_box: [f64; 3],
    /// Sleep between transform refresh cycles.
    pub tf_poll_interval: Duration,
    /// Bounded timeout for one transform lookup.
    pub tf_lookup_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            depth_mode: DepthMode::Quality,
            fps: 15,
            resolution: Resolution::Hd720,
            confidence: 50,
            texture_confidence: 100,
            link_namespace: String::new(),
            verbose: false,
            grab_failure_limit: 3,
            roi_box: [2.0, 2.0, 2.0],
            tf_poll_interval: Duration::from_millis(100),
            tf_lookup_timeout: Duration::from_millis(100),
        }
    }
}

impl DriverConfig {
    /// Check every bounded parameter, returning the first violation.
    pub fn validate(&self) -> Result<(), Error> {
        if self.fps == 0 || self.fps > 120 {
            return Err(Error::Config(format!(
                "fps must be within 1..=120, got {}",
                self.fps
            )));
        }
        if self.confidence > 100 {
            return Err(Error::Config(format!(
                "confidence must be within 0..=100, got {}",
                self.confidence
            )));
        }
        if self.texture_confidence > 100 {
            return Err(Error::Config(format!(
                "texture confidence must be within 0..=100, got {}",
                self.texture_confidence
            )));
        }
        if self.grab_failure_limit == 0 {
            return Err(Error::Config(
                "grab failure limit must be at least 1".to_string(),
            ));
        }
        if self.roi_box.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::Config(format!(
                "ROI box sizes must be positive, got {:?}",
                self.roi_box
            )));
        }
        if self.tf_poll_interval.is_zero() {
            return Err(Error::Config(
                "transform poll interval must be non-zero".to_string(),
            ));
        }
        if self.tf_lookup_timeout.is_zero() {
            return Err(Error::Config(
                "transform lookup timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Nominal duration of one frame at the configured rate.
    pub fn frame_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.fps as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DriverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_fps_bounds() {
        let mut config = DriverConfig::default();
        config.fps = 0;
        assert!(config.validate().is_err());
        config.fps = 121;
        assert!(config.validate().is_err());
        config.fps = 120;
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_period(), Duration::from_nanos(8_333_333));
    }

    #[test]
    fn test_confidence_bounds() {
        let mut config = DriverConfig::default();
        config.confidence = 101;
        assert!(config.validate().is_err());
        config.confidence = 100;
        config.texture_confidence = 101;
        assert!(config.validate().is_err());
        config.texture_confidence = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roi_box_rejects_nonpositive() {
        let mut config = DriverConfig::default();
        config.roi_box = [2.0, 0.0, 2.0];
        assert!(config.validate().is_err());
        config.roi_box = [2.0, -1.0, 2.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grab_failure_limit_lower_bound() {
        let mut config = DriverConfig::default();
        config.grab_failure_limit = 0;
        assert!(config.validate().is_err());
        config.grab_failure_limit = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolution_dimensions() {
        assert_eq!(Resolution::Hd720.dimensions(), (1280, 720));
        assert_eq!(Resolution::Vga.dimensions(), (672, 376));
    }
}
