// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use edgefirst_groundplane::{
    GroundPlane, GroundPlaneEstimator, PointCloud, PointXyzRgb, error::Error,
    estimator::EstimatorConfig, pcd::read_pcd, too_many_nan,
};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.rust_log)
        .with_writer(std::io::stderr)
        .init();

    let config = args.estimator_config()?;
    let cloud = read_pcd(&args.input)?;
    info!(
        "loaded {} points ({}x{}) from {}",
        cloud.len(),
        cloud.width,
        cloud.height,
        args.input.display()
    );

    if too_many_nan(&cloud, args.max_nan_ratio) {
        let ratio = match cloud.len() {
            0 => 1.0,
            n => cloud.count_invalid() as f32 / n as f32,
        };
        return Err(Error::TooManyNaN {
            ratio,
            max_ratio: args.max_nan_ratio,
        }
        .into());
    }

    let plane = estimate(&args, &cloud, config)?;
    if args.json {
        println!("{}", serde_json::to_string(&plane)?);
    } else {
        println!("{}", plane);
    }
    Ok(())
}

#[cfg(feature = "rerun")]
fn estimate(
    args: &Args,
    cloud: &PointCloud<PointXyzRgb>,
    config: EstimatorConfig,
) -> Result<GroundPlane, Box<dyn std::error::Error>> {
    use edgefirst_groundplane::rerun_viewer::RerunViewer;

    let mut estimator = GroundPlaneEstimator::with_config(args.mode, config);
    if !estimator.mode().is_interactive() {
        estimator.set_input_cloud(cloud);
        return Ok(estimator.compute()?);
    }

    let (rec, _guard) = args.rerun.init("groundplane")?;
    let mut estimator = estimator.with_viewer(RerunViewer::stdin(rec));
    estimator.set_input_cloud(cloud);
    Ok(estimator.compute()?)
}

#[cfg(not(feature = "rerun"))]
fn estimate(
    args: &Args,
    cloud: &PointCloud<PointXyzRgb>,
    config: EstimatorConfig,
) -> Result<GroundPlane, Box<dyn std::error::Error>> {
    let mut estimator = GroundPlaneEstimator::with_config(args.mode, config);
    if estimator.mode().is_interactive() {
        tracing::warn!("built without the rerun feature, interactive modes receive no picks");
    }
    estimator.set_input_cloud(cloud);
    Ok(estimator.compute()?)
}
