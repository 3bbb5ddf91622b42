// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Surface normal estimation for organized point clouds.
//!
//! 1. **Depth-change edges**: A pixel whose depth differs from its right or
//!    lower neighbor by more than `max_depth_change_factor * z` marks an
//!    occlusion boundary. Both pixels of the pair are flagged.
//!
//! 2. **Distance map**: Chebyshev distance from every pixel to the nearest
//!    edge. Smoothing windows never reach past the nearest edge, so normals
//!    are not averaged across surfaces at different depths.
//!
//! 3. **Covariance normals**: First and second moments of the finite points
//!    are accumulated into an integral image, so every window covariance is
//!    O(1). The normal is the smallest eigenvector, flipped to face the
//!    sensor origin.

use crate::{
    cloud::{HasPosition, PointCloud},
    error::Error,
    geometry::{Moments, orient_toward_origin, plane_normal, to_f64},
};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Normal estimation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalParams {
    /// Relative depth jump that separates two neighboring pixels.
    pub max_depth_change_factor: f32,
    /// Full width of the smoothing window, in pixels.
    pub normal_smoothing_size: f32,
}

impl Default for NormalParams {
    fn default() -> Self {
        Self {
            max_depth_change_factor: 0.03,
            normal_smoothing_size: 20.0,
        }
    }
}

/// Per-pixel normals of an organized cloud.
///
/// Invalid pixels hold NaN normals.
#[derive(Clone, Debug)]
pub struct NormalField {
    pub width: usize,
    pub height: usize,
    pub normals: Vec<[f32; 3]>,
}

impl NormalField {
    /// Normal at row-major index `idx`, if one could be estimated.
    #[inline]
    pub fn normal(&self, idx: usize) -> Option<[f32; 3]> {
        let n = *self.normals.get(idx)?;
        if n[0].is_finite() { Some(n) } else { None }
    }

    /// Number of pixels with a valid normal.
    pub fn valid_count(&self) -> usize {
        self.normals.iter().filter(|n| n[0].is_finite()).count()
    }
}

const INVALID_NORMAL: [f32; 3] = [f32::NAN, f32::NAN, f32::NAN];
const FAR: u32 = u32::MAX / 2;

/// Estimate normals for every pixel of an organized cloud.
#[instrument(skip_all)]
pub fn estimate_normals<P: HasPosition>(
    cloud: &PointCloud<P>,
    params: &NormalParams,
) -> Result<NormalField, Error> {
    if !cloud.is_organized() {
        return Err(Error::NotOrganized {
            width: cloud.width,
            height: cloud.height,
        });
    }
    let (w, h) = (cloud.width, cloud.height);

    let depth: Vec<f32> = cloud
        .iter()
        .map(|p| if p.is_finite() { p.position()[2] } else { f32::NAN })
        .collect();
    let depth = Array2::from_shape_vec((h, w), depth)?;

    let edges = depth_change_edges(&depth, params.max_depth_change_factor);
    let distance = chebyshev_distance(&edges);
    let integral = integral_moments(cloud);

    let half = (params.normal_smoothing_size / 2.0).max(0.0) as u32;
    let mut normals = vec![INVALID_NORMAL; w * h];

    for v in 0..h {
        for u in 0..w {
            let idx = v * w + u;
            let p = &cloud.points[idx];
            if !p.is_finite() {
                continue;
            }
            let radius = half.min(distance[[v, u]]) as usize;
            if radius == 0 {
                continue;
            }

            let u0 = u.saturating_sub(radius);
            let v0 = v.saturating_sub(radius);
            let u1 = (u + radius).min(w - 1) + 1;
            let v1 = (v + radius).min(h - 1) + 1;
            let window = window_moments(&integral, u0, v0, u1, v1);
            if window.count < 3.0 {
                continue;
            }

            let Some((_, cov)) = window.mean_and_covariance() else {
                continue;
            };
            let Some((normal, _)) = plane_normal(cov) else {
                continue;
            };
            let normal = orient_toward_origin(normal, to_f64(p.position()));
            normals[idx] = [normal[0] as f32, normal[1] as f32, normal[2] as f32];
        }
    }

    let field = NormalField {
        width: w,
        height: h,
        normals,
    };
    debug!(
        "estimated {} normals for {}x{} cloud",
        field.valid_count(),
        w,
        h
    );
    Ok(field)
}

/// Flag pixels on either side of a depth discontinuity.
fn depth_change_edges(depth: &Array2<f32>, factor: f32) -> Array2<bool> {
    let (h, w) = depth.dim();
    let mut edges = Array2::from_elem((h, w), false);

    for v in 0..h {
        for u in 0..w {
            let z = depth[[v, u]];
            if !z.is_finite() {
                continue;
            }
            let threshold = factor * z.abs();
            for (nv, nu) in [(v, u + 1), (v + 1, u)] {
                if nv >= h || nu >= w {
                    continue;
                }
                let zn = depth[[nv, nu]];
                if zn.is_finite() && (z - zn).abs() > threshold {
                    edges[[v, u]] = true;
                    edges[[nv, nu]] = true;
                }
            }
        }
    }

    edges
}

/// Two-pass chamfer transform giving the Chebyshev distance to the nearest
/// edge pixel. Pixels with no edge anywhere get a very large distance.
fn chebyshev_distance(edges: &Array2<bool>) -> Array2<u32> {
    let (h, w) = edges.dim();
    let mut dist = edges.mapv(|e| if e { 0 } else { FAR });

    for v in 0..h {
        for u in 0..w {
            let mut d = dist[[v, u]];
            if u > 0 {
                d = d.min(dist[[v, u - 1]] + 1);
            }
            if v > 0 {
                d = d.min(dist[[v - 1, u]] + 1);
                if u > 0 {
                    d = d.min(dist[[v - 1, u - 1]] + 1);
                }
                if u + 1 < w {
                    d = d.min(dist[[v - 1, u + 1]] + 1);
                }
            }
            dist[[v, u]] = d;
        }
    }

    for v in (0..h).rev() {
        for u in (0..w).rev() {
            let mut d = dist[[v, u]];
            if u + 1 < w {
                d = d.min(dist[[v, u + 1]] + 1);
            }
            if v + 1 < h {
                d = d.min(dist[[v + 1, u]] + 1);
                if u + 1 < w {
                    d = d.min(dist[[v + 1, u + 1]] + 1);
                }
                if u > 0 {
                    d = d.min(dist[[v + 1, u - 1]] + 1);
                }
            }
            dist[[v, u]] = d;
        }
    }

    dist
}

/// Summed-area table of point moments, shape `(h + 1, w + 1, CHANNELS)`.
fn integral_moments<P: HasPosition>(cloud: &PointCloud<P>) -> Array3<f64> {
    let (w, h) = (cloud.width, cloud.height);
    let mut integral = Array3::<f64>::zeros((h + 1, w + 1, Moments::CHANNELS));

    for v in 0..h {
        for u in 0..w {
            let p = &cloud.points[v * w + u];
            let mut m = Moments::default();
            if p.is_finite() {
                m.add(p.position());
            }
            let ch = m.to_channels();
            for (k, value) in ch.iter().enumerate() {
                integral[[v + 1, u + 1, k]] =
                    value + integral[[v, u + 1, k]] + integral[[v + 1, u, k]] - integral[[v, u, k]];
            }
        }
    }

    integral
}

/// Moments over the half-open pixel window `[u0, u1) × [v0, v1)`.
#[inline]
fn window_moments(integral: &Array3<f64>, u0: usize, v0: usize, u1: usize, v1: usize) -> Moments {
    let mut ch = [0.0; Moments::CHANNELS];
    for (k, c) in ch.iter_mut().enumerate() {
        *c = integral[[v1, u1, k]] - integral[[v0, u1, k]] - integral[[v1, u0, k]]
            + integral[[v0, u0, k]];
    }
    Moments::from_channels(ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::PointXyz;

    /// Floor at y = 1.5 seen from the origin, rows getting closer downward.
    fn floor_cloud(w: usize, h: usize) -> PointCloud<PointXyz> {
        let mut points = Vec::with_capacity(w * h);
        for v in 0..h {
            for u in 0..w {
                let x = (u as f32 - w as f32 / 2.0) * 0.05;
                let z = 4.0 - v as f32 * 0.05;
                points.push(PointXyz::new(x, 1.5, z));
            }
        }
        PointCloud::organized(points, w, h).unwrap()
    }

    #[test]
    fn test_floor_normals_face_sensor() {
        let cloud = floor_cloud(40, 30);
        let field = estimate_normals(&cloud, &NormalParams::default()).unwrap();
        assert_eq!(field.valid_count(), 40 * 30);
        for n in &field.normals {
            assert!((n[1] + 1.0).abs() < 1e-4, "normal {:?}", n);
        }
    }

    #[test]
    fn test_depth_jump_blocks_smoothing() {
        // Two fronto-parallel planes: z = 2 on the left, z = 5 on the right.
        let (w, h) = (30, 20);
        let mut points = Vec::with_capacity(w * h);
        for v in 0..h {
            for u in 0..w {
                let z = if u < 15 { 2.0 } else { 5.0 };
                points.push(PointXyz::new(u as f32 * 0.02, v as f32 * 0.02, z));
            }
        }
        let cloud = PointCloud::organized(points, w, h).unwrap();
        let field = estimate_normals(&cloud, &NormalParams::default()).unwrap();

        // Pixels touching the discontinuity have no normal.
        assert!(field.normal(5 * w + 14).is_none());
        assert!(field.normal(5 * w + 15).is_none());
        // Everything else faces the sensor along -z.
        for v in 0..h {
            for u in [0, 5, 13, 16, 29] {
                let n = field.normal(v * w + u).unwrap();
                assert!((n[2] + 1.0).abs() < 1e-4, "pixel ({u},{v}) normal {:?}", n);
            }
        }
    }

    #[test]
    fn test_invalid_points_have_no_normal() {
        let mut cloud = floor_cloud(20, 20);
        cloud.points[210] = PointXyz::nan();
        let field = estimate_normals(&cloud, &NormalParams::default()).unwrap();
        assert!(field.normal(210).is_none());
        assert!(field.normal(211).is_some());
    }

    #[test]
    fn test_unorganized_cloud_rejected() {
        let cloud = PointCloud::new(vec![PointXyz::new(0.0, 0.0, 1.0); 10]);
        assert!(matches!(
            estimate_normals(&cloud, &NormalParams::default()),
            Err(Error::NotOrganized { .. })
        ));
    }

    #[test]
    fn test_chebyshev_distance() {
        let mut edges = Array2::from_elem((5, 5), false);
        edges[[2, 2]] = true;
        let d = chebyshev_distance(&edges);
        assert_eq!(d[[2, 2]], 0);
        assert_eq!(d[[1, 1]], 1);
        assert_eq!(d[[0, 0]], 2);
        assert_eq!(d[[4, 2]], 2);
    }
}
