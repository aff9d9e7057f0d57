// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

use crate::camera::Error;
use crate::config::{DepthMode, DriverConfig, Resolution};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera to drive.  Use "sim" for the synthetic backend.
    #[arg(env)]
    pub target: String,

    /// Depth computation quality preset.
    #[arg(long, env, value_enum, default_value_t = DepthMode::Quality)]
    pub depth_mode: DepthMode,

    /// Camera frame rate in Hz.
    #[arg(long, env, default_value = "15",
          value_parser = clap::value_parser!(u32).range(1..=120))]
    pub fps: u32,

    /// Capture resolution.
    #[arg(long, env, value_enum, default_value_t = Resolution::Hd720)]
    pub resolution: Resolution,

    /// Depth confidence threshold, rejects measurements below it.
    #[arg(long, env, default_value = "50",
          value_parser = clap::value_parser!(u8).range(0..=100))]
    pub confidence: u8,

    /// Texture confidence threshold, rejects low-texture measurements.
    #[arg(long, env, default_value = "100",
          value_parser = clap::value_parser!(u8).range(0..=100))]
    pub texture_confidence: u8,

    /// Namespace prefix applied to every non-global frame name.
    #[arg(long, env, default_value = "")]
    pub link_namespace: String,

    /// Log per-sample positional tracking state.
    #[arg(long, env)]
    pub verbose: bool,

    /// Consecutive grab failures treated as a device disconnection.
    #[arg(long, env, default_value = "3",
          value_parser = clap::value_parser!(u32).range(1..))]
    pub grab_failure_limit: u32,

    /// ROI box sizes in metres: forward, lateral, vertical.
    #[arg(
        long,
        env,
        default_value = "2 2 2",
        value_delimiter = ' ',
        num_args = 3
    )]
    pub roi_box: Vec<f64>,

    /// camera base topic
    #[arg(long, env, default_value = "rt/camera")]
    pub camera_topic: String,

    /// Sleep between transform refresh cycles, in milliseconds.
    #[arg(long, env, default_value = "100")]
    pub tf_poll_interval_ms: u64,

    /// Bounded timeout for one transform lookup, in milliseconds.
    #[arg(long, env, default_value = "100")]
    pub tf_lookup_timeout_ms: u64,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,
}

impl Args {
    /// Build the validated driver configuration.
    pub fn driver_config(&self) -> Result<DriverConfig, Error> {
        let config = DriverConfig {
            depth_mode: self.depth_mode,
            fps: self.fps,
            resolution: self.resolution,
            confidence: self.confidence,
            texture_confidence: self.texture_confidence,
            link_namespace: self.link_namespace.clone(),
            verbose: self.verbose,
            grab_failure_limit: self.grab_failure_limit,
            roi_box: [self.roi_box[0], self.roi_box[1], self.roi_box[2]],
            tf_poll_interval: std::time::Duration::from_millis(self.tf_poll_interval_ms),
            tf_lookup_timeout: std::time::Duration::from_millis(self.tf_lookup_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut config = Config::default();

        config
            .insert_json5("mode", &json!(args.mode).to_string())
            .unwrap();

        if !args.connect.is_empty() {
            config
                .insert_json5("connect/endpoints", &json!(args.connect).to_string())
                .unwrap();
        }

        if !args.listen.is_empty() {
            config
                .insert_json5("listen/endpoints", &json!(args.listen).to_string())
                .unwrap();
        }

        if args.no_multicast_scouting {
            config
                .insert_json5("scouting/multicast/enabled", &json!(false).to_string())
                .unwrap();
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        let mut full = vec!["stereopub"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["sim"]).unwrap();
        let config = args.driver_config().unwrap();
        assert_eq!(config.fps, 15);
        assert_eq!(config.confidence, 50);
        assert_eq!(config.texture_confidence, 100);
        assert_eq!(config.grab_failure_limit, 3);
        assert_eq!(config.roi_box, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_bounded_parameters_rejected_at_parse_time() {
        assert!(parse(&["sim", "--fps", "0"]).is_err());
        assert!(parse(&["sim", "--fps", "121"]).is_err());
        assert!(parse(&["sim", "--confidence", "101"]).is_err());
        assert!(parse(&["sim", "--texture-confidence", "101"]).is_err());
        assert!(parse(&["sim", "--grab-failure-limit", "0"]).is_err());
        assert!(parse(&["sim", "--depth-mode", "extreme"]).is_err());
        assert!(parse(&["sim", "--resolution", "hd9000"]).is_err());
    }

    #[test]
    fn test_roi_box_parsing() {
        let args = parse(&["sim", "--roi-box", "1.5 3 0.5"]).unwrap();
        let config = args.driver_config().unwrap();
        assert_eq!(config.roi_box, [1.5, 3.0, 0.5]);

        let args = parse(&["sim", "--roi-box", "1.5 -3 0.5"]).unwrap();
        assert!(args.driver_config().is_err());
    }

    #[test]
    fn test_namespace_flows_into_config() {
        let args = parse(&["sim", "--link-namespace", "drone_1/"]).unwrap();
        let config = args.driver_config().unwrap();
        assert_eq!(config.link_namespace, "drone_1/");
    }
}
