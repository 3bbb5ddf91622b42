// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Plane models: segmented candidates, the estimated ground plane, and the
//! minimal three-point fit used by manual mode.

use crate::{
    cloud::{HasPosition, PointCloud},
    error::Error,
    geometry::{cross, dot, to_f64},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Planar region found by segmentation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneCandidate {
    /// Plane `[a, b, c, d]` with `ax + by + cz + d = 0`.
    pub coefficients: [f32; 4],
    /// Mean position of the region's points.
    pub centroid: [f32; 3],
    /// Number of points in the region.
    pub inliers: usize,
    /// Surface variation `λ_min / Σλ` of the region.
    pub curvature: f32,
}

impl PlaneCandidate {
    pub fn new(coefficients: [f32; 4], centroid: [f32; 3]) -> Self {
        Self {
            coefficients,
            centroid,
            inliers: 0,
            curvature: 0.0,
        }
    }

    /// Perpendicular distance from `point` to this candidate's plane.
    #[inline]
    pub fn distance(&self, point: [f32; 3]) -> f32 {
        point_plane_distance(&self.coefficients, point)
    }
}

/// Estimated ground plane.
///
/// The coefficients are returned exactly as selected; `(a, b, c)` is not
/// renormalized. Use [`GroundPlane::normalized`] when a unit normal is needed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundPlane {
    pub coefficients: [f32; 4],
}

impl GroundPlane {
    pub fn new(coefficients: [f32; 4]) -> Self {
        Self { coefficients }
    }

    pub fn a(&self) -> f32 {
        self.coefficients[0]
    }

    pub fn b(&self) -> f32 {
        self.coefficients[1]
    }

    pub fn c(&self) -> f32 {
        self.coefficients[2]
    }

    pub fn d(&self) -> f32 {
        self.coefficients[3]
    }

    pub fn normal(&self) -> [f32; 3] {
        [self.a(), self.b(), self.c()]
    }

    /// Perpendicular distance from `point` to the plane.
    pub fn distance(&self, point: [f32; 3]) -> f32 {
        point_plane_distance(&self.coefficients, point)
    }

    /// Coefficients scaled so that `(a, b, c)` has unit length.
    pub fn normalized(&self) -> Option<GroundPlane> {
        let [a, b, c, d] = self.coefficients;
        let norm = (a * a + b * b + c * c).sqrt();
        if norm <= f32::EPSILON || !norm.is_finite() {
            return None;
        }
        Some(GroundPlane::new([a / norm, b / norm, c / norm, d / norm]))
    }
}

impl From<&PlaneCandidate> for GroundPlane {
    fn from(candidate: &PlaneCandidate) -> Self {
        GroundPlane::new(candidate.coefficients)
    }
}

impl fmt::Display for GroundPlane {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.coefficients[0], self.coefficients[1], self.coefficients[2], self.coefficients[3]
        )
    }
}

/// `|a·x + b·y + c·z + d| / sqrt(a² + b² + c²)`.
#[inline]
pub fn point_plane_distance(coefficients: &[f32; 4], point: [f32; 3]) -> f32 {
    let [a, b, c, d] = coefficients;
    (a * point[0] + b * point[1] + c * point[2] + d).abs() / (a * a + b * b + c * c).sqrt()
}

/// Plane through exactly three points.
///
/// The normal is `(p1 - p0) × (p2 - p0)` scaled to unit length and
/// `d = -n·p0`. Collinear or coincident points yield
/// [`Error::DegeneratePlane`].
pub fn plane_from_points(points: &[[f32; 3]; 3]) -> Result<[f32; 4], Error> {
    let p0 = to_f64(points[0]);
    let p1 = to_f64(points[1]);
    let p2 = to_f64(points[2]);
    let e1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
    let e2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];

    let n = cross(e1, e2);
    let norm = dot(n, n).sqrt();
    let scale = (dot(e1, e1) * dot(e2, e2)).sqrt();
    if !norm.is_finite() || norm <= 1e-9 * scale.max(f64::MIN_POSITIVE) {
        return Err(Error::DegeneratePlane);
    }

    let n = [n[0] / norm, n[1] / norm, n[2] / norm];
    let d = -dot(n, p0);
    Ok([n[0] as f32, n[1] as f32, n[2] as f32, d as f32])
}

/// Indices of cloud points within `threshold` of the plane.
pub fn select_within_distance<P: HasPosition>(
    cloud: &PointCloud<P>,
    coefficients: &[f32; 4],
    threshold: f32,
) -> Vec<usize> {
    cloud
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            p.is_finite() && point_plane_distance(coefficients, p.position()) < threshold
        })
        .map(|(i, _)| i)
        .collect()
}
