// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_groundplane::{EstimatorConfig, error::Error};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input point cloud in PCD format (ascii or binary).
    #[arg(env)]
    pub input: PathBuf,

    /// Estimation mode: 0 manual, 1 semi-automatic, 2 automatic with
    /// visualization, 3 automatic without visualization.  Any other value
    /// selects manual mode.
    #[arg(long, env, default_value = "3", allow_negative_numbers = true)]
    pub mode: i32,

    /// Maximum ratio of invalid (NaN) points accepted in the input cloud
    #[arg(long, env, default_value = "0.5")]
    pub max_nan_ratio: f32,

    /// JSON file with normal estimation, segmentation and camera parameters
    #[arg(long, env)]
    pub config: Option<PathBuf>,

    /// Seed for the random region colors, overrides the configuration file
    #[arg(long, env)]
    pub seed: Option<u64>,

    /// Print the result as JSON
    #[arg(long, env)]
    pub json: bool,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    #[cfg(feature = "rerun")]
    #[command(flatten)]
    pub rerun: rerun::clap::RerunArgs,
}

impl Args {
    /// Estimator configuration from `--config` and `--seed`.
    pub fn estimator_config(&self) -> Result<EstimatorConfig, Error> {
        let mut config = match &self.config {
            Some(path) => EstimatorConfig::load(path)?,
            None => EstimatorConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.color_seed = seed;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["edgefirst-groundplane", "scene.pcd"]).unwrap();
        assert_eq!(args.mode, 3);
        assert_eq!(args.max_nan_ratio, 0.5);
        assert!(!args.json);
        assert_eq!(args.estimator_config().unwrap(), EstimatorConfig::default());
    }

    #[test]
    fn test_args_negative_mode_and_seed() {
        let args = Args::try_parse_from([
            "edgefirst-groundplane",
            "scene.pcd",
            "--mode",
            "-1",
            "--seed",
            "9",
        ])
        .unwrap();
        assert_eq!(args.mode, -1);
        assert_eq!(args.estimator_config().unwrap().color_seed, 9);
    }
}
