// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst Ground Plane Library
//!
//! This library estimates the ground plane of an organized depth-sensor
//! point cloud as coefficients `[a, b, c, d]` of `ax + by + cz + d = 0`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────────┐
//! │  PointCloud  │ ──► │  normals      │ ──► │  segmentation    │
//! │  (pcd/user)  │     │  (integral)   │     │  (region growing)│
//! └──────────────┘     └───────────────┘     └──────────────────┘
//!                                                     │
//!                                                     ▼
//!               ┌──────────────────┐     ┌──────────────────────┐
//!               │  Viewer          │ ◄── │  selection / picks   │
//!               │  (rerun/scripted)│ ──► │  GroundPlaneEstimator│
//!               └──────────────────┘     └──────────────────────┘
//! ```
//!
//! The estimator runs in one of four modes (see [`estimator`]): manual,
//! semi-automatic, and automatic with or without visualization. Interactive
//! modes talk to a [`viewer::Viewer`], which delivers operator picks over a
//! `kanal` channel.
//!
//! # Modules
//!
//! - [`cloud`]: Point capabilities, cloud container, NaN-ratio guard
//! - [`normals`]: Integral-image normal estimation
//! - [`segmentation`]: Organized multi-plane segmentation
//! - [`plane`]: Plane candidates, ground plane, three-point fit
//! - [`selection`]: Level filter and height ranking
//! - [`color`]: Region coloring for display
//! - [`viewer`]: Viewer abstraction, headless and scripted viewers
//! - [`estimator`]: Mode orchestration
//! - [`pcd`]: PCD file reader
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_groundplane::{GroundPlaneEstimator, pcd::read_pcd, too_many_nan};
//!
//! let cloud = read_pcd("scene.pcd")?;
//! if !too_many_nan(&cloud, 0.5) {
//!     let mut estimator = GroundPlaneEstimator::new(3);
//!     estimator.set_input_cloud(&cloud);
//!     let plane = estimator.compute()?;
//!     println!("{}", plane);
//! }
//! ```

pub mod cloud;
pub mod color;
pub mod error;
pub mod estimator;
mod geometry;
pub mod normals;
pub mod pcd;
pub mod plane;
#[cfg(feature = "rerun")]
pub mod rerun_viewer;
pub mod segmentation;
pub mod selection;
pub mod viewer;

// Re-exports for convenience
pub use cloud::{HasColor, HasPosition, PointCloud, PointXyz, PointXyzRgb, too_many_nan};
pub use error::Error;
pub use estimator::{EstimationMode, EstimatorConfig, GroundPlaneEstimator, estimate_automatic};
pub use plane::{GroundPlane, PlaneCandidate};
pub use selection::{is_higher, plane_height_cmp};
