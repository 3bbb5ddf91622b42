// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Multi-plane segmentation of organized point clouds.
//!
//! 1. **Grow**: 4-connected region growing over the pixel grid. Two
//!    neighbors belong to the same surface when their normals agree within
//!    `angular_threshold` and their plane offsets `d = -n·p` differ by less
//!    than `distance_threshold`.
//!
//! 2. **Fit**: Regions with at least `min_inliers` points get a
//!    least-squares plane through their centroid. Regions that are not flat
//!    enough (`curvature >= maximum_curvature`) are dropped.
//!
//! 3. **Refine**: A forward and a backward raster sweep grow each accepted
//!    region into neighboring pixels that are not part of another accepted
//!    region and lie within `distance_threshold` of its plane. Plane
//!    coefficients are kept; centroids and inlier counts are recomputed.

use crate::{
    cloud::{HasPosition, PointCloud},
    error::Error,
    geometry::{Moments, dot, orient_toward_origin, plane_normal},
    normals::NormalField,
    plane::{PlaneCandidate, point_plane_distance},
};
use ndarray::{ErrorKind, ShapeError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, instrument};

/// Segmentation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Minimum number of points for a region to become a candidate.
    pub min_inliers: usize,
    /// Maximum angle between neighboring normals, in radians.
    pub angular_threshold: f32,
    /// Maximum plane offset difference between neighbors, and maximum
    /// point-to-plane distance during refinement.
    pub distance_threshold: f32,
    /// Regions with a larger surface variation are not planar.
    pub maximum_curvature: f32,
    /// Run the refinement sweep.
    pub refine: bool,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            min_inliers: 500,
            angular_threshold: 2.0 * std::f32::consts::PI / 180.0,
            distance_threshold: 0.2,
            maximum_curvature: 0.001,
            refine: true,
        }
    }
}

const UNLABELED: u32 = u32::MAX;

/// Find planar regions in an organized cloud.
///
/// Candidates are returned in raster order of their first pixel.
#[instrument(skip_all)]
pub fn segment_planes<P: HasPosition>(
    cloud: &PointCloud<P>,
    normals: &NormalField,
    params: &SegmentationParams,
) -> Result<Vec<PlaneCandidate>, Error> {
    if !cloud.is_organized() {
        return Err(Error::NotOrganized {
            width: cloud.width,
            height: cloud.height,
        });
    }
    if normals.width != cloud.width || normals.height != cloud.height {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
    }

    let (w, h) = (cloud.width, cloud.height);
    let cos_threshold = params.angular_threshold.cos();

    let offsets: Vec<f32> = (0..w * h)
        .map(|i| match normals.normal(i) {
            Some(n) if cloud.points[i].is_finite() => {
                let p = cloud.points[i].position();
                -(n[0] * p[0] + n[1] * p[1] + n[2] * p[2])
            }
            _ => f32::NAN,
        })
        .collect();

    let similar = |a: usize, b: usize| -> bool {
        match (normals.normal(a), normals.normal(b)) {
            (Some(na), Some(nb)) => {
                let cos = na[0] * nb[0] + na[1] * nb[1] + na[2] * nb[2];
                cos > cos_threshold && (offsets[a] - offsets[b]).abs() < params.distance_threshold
            }
            _ => false,
        }
    };

    // ── Grow ────────────────────────────────────────────────────────────
    let mut labels = vec![UNLABELED; w * h];
    let mut regions: Vec<Vec<usize>> = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..w * h {
        if labels[seed] != UNLABELED || offsets[seed].is_nan() {
            continue;
        }
        let label = regions.len() as u32;
        let mut members = vec![seed];
        labels[seed] = label;
        queue.push_back(seed);

        while let Some(i) = queue.pop_front() {
            for j in neighbors4(i, w, h).into_iter().flatten() {
                if labels[j] == UNLABELED && similar(i, j) {
                    labels[j] = label;
                    members.push(j);
                    queue.push_back(j);
                }
            }
        }
        regions.push(members);
    }
    debug!("region growing produced {} segments", regions.len());

    // ── Fit ─────────────────────────────────────────────────────────────
    let mut candidates = Vec::new();
    let mut accepted: Vec<Vec<usize>> = Vec::new();
    let mut region_of = vec![UNLABELED; w * h];

    for members in regions.into_iter() {
        if members.len() < params.min_inliers {
            continue;
        }
        let Some(candidate) = fit_region(cloud, &members) else {
            continue;
        };
        if candidate.curvature >= params.maximum_curvature {
            debug!(
                "rejecting region of {} points with curvature {}",
                members.len(),
                candidate.curvature
            );
            continue;
        }
        let id = accepted.len() as u32;
        for &i in &members {
            region_of[i] = id;
        }
        candidates.push(candidate);
        accepted.push(members);
    }

    // ── Refine ──────────────────────────────────────────────────────────
    if params.refine && !candidates.is_empty() {
        refine_regions(
            cloud,
            &candidates,
            &mut region_of,
            &mut accepted,
            params.distance_threshold,
        );
        for (candidate, members) in candidates.iter_mut().zip(accepted.iter()) {
            let moments = region_moments(cloud, members);
            if let Some((mean, _)) = moments.mean_and_covariance() {
                candidate.centroid = [mean[0] as f32, mean[1] as f32, mean[2] as f32];
                candidate.inliers = members.len();
            }
        }
    }

    info!("found {} planar regions", candidates.len());
    Ok(candidates)
}

/// Least-squares plane of a set of cloud points, oriented toward the origin.
fn fit_region<P: HasPosition>(cloud: &PointCloud<P>, members: &[usize]) -> Option<PlaneCandidate> {
    let moments = region_moments(cloud, members);
    let (mean, cov) = moments.mean_and_covariance()?;
    let (normal, curvature) = plane_normal(cov)?;
    let normal = orient_toward_origin(normal, mean);
    let d = -dot(normal, mean);

    Some(PlaneCandidate {
        coefficients: [normal[0] as f32, normal[1] as f32, normal[2] as f32, d as f32],
        centroid: [mean[0] as f32, mean[1] as f32, mean[2] as f32],
        inliers: members.len(),
        curvature: curvature as f32,
    })
}

fn region_moments<P: HasPosition>(cloud: &PointCloud<P>, members: &[usize]) -> Moments {
    let mut moments = Moments::default();
    for &i in members {
        let p = &cloud.points[i];
        if p.is_finite() {
            moments.add(p.position());
        }
    }
    moments
}

/// Forward sweep looks right and down, backward sweep looks left and up.
fn refine_regions<P: HasPosition>(
    cloud: &PointCloud<P>,
    candidates: &[PlaneCandidate],
    region_of: &mut [u32],
    accepted: &mut [Vec<usize>],
    threshold: f32,
) {
    let (w, h) = (cloud.width, cloud.height);
    let mut absorbed = 0usize;

    let mut try_absorb = |from: usize, to: usize, region_of: &mut [u32]| {
        let label = region_of[from];
        if label == UNLABELED || region_of[to] != UNLABELED {
            return;
        }
        let p = &cloud.points[to];
        if !p.is_finite() {
            return;
        }
        let coefficients = &candidates[label as usize].coefficients;
        if point_plane_distance(coefficients, p.position()) < threshold {
            region_of[to] = label;
            accepted[label as usize].push(to);
            absorbed += 1;
        }
    };

    for v in 0..h {
        for u in 0..w {
            let i = v * w + u;
            if u + 1 < w {
                try_absorb(i, i + 1, &mut *region_of);
            }
            if v + 1 < h {
                try_absorb(i, i + w, &mut *region_of);
            }
        }
    }

    for v in (0..h).rev() {
        for u in (0..w).rev() {
            let i = v * w + u;
            if u > 0 {
                try_absorb(i, i - 1, &mut *region_of);
            }
            if v > 0 {
                try_absorb(i, i - w, &mut *region_of);
            }
        }
    }

    debug!("refinement absorbed {} points", absorbed);
}

#[inline]
fn neighbors4(i: usize, w: usize, h: usize) -> [Option<usize>; 4] {
    let (u, v) = (i % w, i / w);
    [
        (u > 0).then(|| i - 1),
        (u + 1 < w).then(|| i + 1),
        (v > 0).then(|| i - w),
        (v + 1 < h).then(|| i + w),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cloud::PointXyz,
        normals::{NormalParams, estimate_normals},
    };

    /// Back wall at z = 6 in the upper rows, floor at y = 1.5 in the lower
    /// rows, separated by a depth jump.
    fn wall_and_floor() -> PointCloud<PointXyz> {
        let (w, h) = (80, 60);
        let mut points = Vec::with_capacity(w * h);
        for v in 0..h {
            for u in 0..w {
                let x = (u as f32 - 40.0) * 0.05;
                if v < 30 {
                    let y = 1.5 - (30 - v) as f32 * 0.05;
                    points.push(PointXyz::new(x, y, 6.0));
                } else {
                    let z = 4.0 - (v - 30) as f32 * 0.05;
                    points.push(PointXyz::new(x, 1.5, z));
                }
            }
        }
        PointCloud::organized(points, w, h).unwrap()
    }

    fn segment(cloud: &PointCloud<PointXyz>, params: &SegmentationParams) -> Vec<PlaneCandidate> {
        let normals = estimate_normals(cloud, &NormalParams::default()).unwrap();
        segment_planes(cloud, &normals, params).unwrap()
    }

    #[test]
    fn test_wall_and_floor_regions() {
        let cloud = wall_and_floor();
        let candidates = segment(&cloud, &SegmentationParams::default());
        assert_eq!(candidates.len(), 2, "{:?}", candidates);

        let wall = &candidates[0];
        assert!((wall.coefficients[2] + 1.0).abs() < 1e-3, "{:?}", wall);
        assert!((wall.coefficients[3] - 6.0).abs() < 1e-2, "{:?}", wall);

        let floor = &candidates[1];
        assert!((floor.coefficients[1] + 1.0).abs() < 1e-3, "{:?}", floor);
        assert!((floor.coefficients[3] - 1.5).abs() < 1e-2, "{:?}", floor);
        assert!(floor.inliers >= 500);
        assert!((floor.centroid[1] - 1.5).abs() < 0.05);
    }

    #[test]
    fn test_refinement_absorbs_edge_rows() {
        let cloud = wall_and_floor();
        let unrefined = segment(
            &cloud,
            &SegmentationParams {
                refine: false,
                ..Default::default()
            },
        );
        let refined = segment(&cloud, &SegmentationParams::default());
        assert_eq!(unrefined.len(), refined.len());
        for (a, b) in unrefined.iter().zip(refined.iter()) {
            assert!(b.inliers > a.inliers);
            assert_eq!(a.coefficients, b.coefficients);
        }
    }

    #[test]
    fn test_small_regions_dropped() {
        let cloud = wall_and_floor();
        let params = SegmentationParams {
            min_inliers: 5000,
            ..Default::default()
        };
        assert!(segment(&cloud, &params).is_empty());
    }

    #[test]
    fn test_mismatched_normals_rejected() {
        let cloud = wall_and_floor();
        let normals = NormalField {
            width: 10,
            height: 10,
            normals: vec![[0.0, 0.0, 1.0]; 100],
        };
        assert!(matches!(
            segment_planes(&cloud, &normals, &SegmentationParams::default()),
            Err(Error::Shape(_))
        ));
    }
}
