// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Small fixed-size linear algebra helpers.
//!
//! Covariance matrices are stored as the upper triangle
//! `[xx, xy, xz, yy, yz, zz]`.

/// Running first and second moments of a point set.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Moments {
    pub count: f64,
    pub sum: [f64; 3],
    pub sq: [f64; 6],
}

impl Moments {
    /// Number of scalar channels when stored in an integral image.
    pub const CHANNELS: usize = 10;

    #[inline]
    pub fn add(&mut self, p: [f32; 3]) {
        let (x, y, z) = (p[0] as f64, p[1] as f64, p[2] as f64);
        self.count += 1.0;
        self.sum[0] += x;
        self.sum[1] += y;
        self.sum[2] += z;
        self.sq[0] += x * x;
        self.sq[1] += x * y;
        self.sq[2] += x * z;
        self.sq[3] += y * y;
        self.sq[4] += y * z;
        self.sq[5] += z * z;
    }

    #[inline]
    pub fn to_channels(self) -> [f64; Self::CHANNELS] {
        let [sx, sy, sz] = self.sum;
        let [a, b, c, d, e, f] = self.sq;
        [self.count, sx, sy, sz, a, b, c, d, e, f]
    }

    #[inline]
    pub fn from_channels(ch: [f64; Self::CHANNELS]) -> Self {
        Self {
            count: ch[0],
            sum: [ch[1], ch[2], ch[3]],
            sq: [ch[4], ch[5], ch[6], ch[7], ch[8], ch[9]],
        }
    }

    /// Mean and covariance, or `None` for an empty set.
    pub fn mean_and_covariance(&self) -> Option<([f64; 3], [f64; 6])> {
        if self.count < 1.0 {
            return None;
        }
        let inv = 1.0 / self.count;
        let m = [self.sum[0] * inv, self.sum[1] * inv, self.sum[2] * inv];
        let cov = [
            self.sq[0] * inv - m[0] * m[0],
            self.sq[1] * inv - m[0] * m[1],
            self.sq[2] * inv - m[0] * m[2],
            self.sq[3] * inv - m[1] * m[1],
            self.sq[4] * inv - m[1] * m[2],
            self.sq[5] * inv - m[2] * m[2],
        ];
        Some((m, cov))
    }
}

/// Least-squares plane normal of a covariance matrix.
///
/// Returns the unit eigenvector of the smallest eigenvalue and the surface
/// curvature `λ_min / (λ0 + λ1 + λ2)`. `None` when the matrix is zero.
pub(crate) fn plane_normal(cov: [f64; 6]) -> Option<([f64; 3], f64)> {
    let trace = cov[0] + cov[3] + cov[5];
    if !trace.is_finite() || trace < 1e-18 {
        return None;
    }
    let (eigenvalues, eigenvectors) = sym3x3_eigen(cov);
    let min_idx = smallest_eigenvalue_index(eigenvalues);
    let curvature = (eigenvalues[min_idx] / trace).max(0.0);
    Some((eigenvectors[min_idx], curvature))
}

/// Flip `normal` so that it points from `point` toward the sensor origin.
#[inline]
pub(crate) fn orient_toward_origin(normal: [f64; 3], point: [f64; 3]) -> [f64; 3] {
    if dot(normal, point) > 0.0 {
        [-normal[0], -normal[1], -normal[2]]
    } else {
        normal
    }
}

#[inline]
pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub(crate) fn to_f64(p: [f32; 3]) -> [f64; 3] {
    [p[0] as f64, p[1] as f64, p[2] as f64]
}

pub(crate) fn smallest_eigenvalue_index(eigenvalues: [f64; 3]) -> usize {
    if eigenvalues[0] <= eigenvalues[1] && eigenvalues[0] <= eigenvalues[2] {
        0
    } else if eigenvalues[1] <= eigenvalues[2] {
        1
    } else {
        2
    }
}

/// Eigendecomposition of a 3×3 symmetric matrix.
///
/// Uses the analytical method described by Smith (1961) / Kopp (2008).
pub(crate) fn sym3x3_eigen(cov: [f64; 6]) -> ([f64; 3], [[f64; 3]; 3]) {
    let [a11, a12, a13, a22, a23, a33] = cov;

    let q = (a11 + a22 + a33) / 3.0;
    let p1 = a12 * a12 + a13 * a13 + a23 * a23;

    let eigenvalues = if p1 < 1e-30 {
        let mut evs = [a11, a22, a33];
        evs.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        evs
    } else {
        let p2 = (a11 - q) * (a11 - q) + (a22 - q) * (a22 - q) + (a33 - q) * (a33 - q) + 2.0 * p1;
        let p = (p2 / 6.0).sqrt();
        let inv_p = 1.0 / p;

        let b11 = (a11 - q) * inv_p;
        let b12 = a12 * inv_p;
        let b13 = a13 * inv_p;
        let b22 = (a22 - q) * inv_p;
        let b23 = a23 * inv_p;
        let b33 = (a33 - q) * inv_p;

        let half_det = (b11 * b22 * b33 + 2.0 * b12 * b13 * b23
            - b11 * b23 * b23
            - b22 * b13 * b13
            - b33 * b12 * b12)
            / 2.0;

        let phi = half_det.clamp(-1.0, 1.0).acos() / 3.0;

        let e1 = q + 2.0 * p * phi.cos();
        let e3 = q + 2.0 * p * (phi + std::f64::consts::TAU / 3.0).cos();
        let e2 = 3.0 * q - e1 - e3;
        [e1, e2, e3]
    };

    let eigenvectors = [
        eigenvector_for(cov, eigenvalues[0]),
        eigenvector_for(cov, eigenvalues[1]),
        eigenvector_for(cov, eigenvalues[2]),
    ];

    (eigenvalues, eigenvectors)
}

/// Eigenvector of a 3×3 symmetric matrix at a given eigenvalue.
///
/// Takes the largest cross product of two rows of `A - λI`.
fn eigenvector_for(mat: [f64; 6], lambda: f64) -> [f64; 3] {
    let r0 = [mat[0] - lambda, mat[1], mat[2]];
    let r1 = [mat[1], mat[3] - lambda, mat[4]];
    let r2 = [mat[2], mat[4], mat[5] - lambda];

    let candidates = [cross(r0, r1), cross(r0, r2), cross(r1, r2)];
    let (best, mag) = candidates
        .iter()
        .map(|v| (*v, dot(*v, *v)))
        .fold(([0.0, 0.0, 1.0], 0.0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });

    if mag < 1e-30 {
        return [0.0, 0.0, 1.0];
    }

    let inv = 1.0 / mag.sqrt();
    [best[0] * inv, best[1] * inv, best[2] * inv]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moments_of(points: &[[f32; 3]]) -> Moments {
        let mut m = Moments::default();
        for p in points {
            m.add(*p);
        }
        m
    }

    #[test]
    fn test_plane_normal_horizontal() {
        let mut pts = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                pts.push([i as f32 * 0.1, 1.5, j as f32 * 0.2]);
            }
        }
        let (_, cov) = moments_of(&pts).mean_and_covariance().unwrap();
        let (n, curvature) = plane_normal(cov).unwrap();
        assert!(n[1].abs() > 0.9999, "normal {:?}", n);
        assert!(curvature < 1e-9);
    }

    #[test]
    fn test_plane_normal_tilted() {
        // Plane x + z = 2, normal (1,0,1)/sqrt(2)
        let mut pts = Vec::new();
        for i in 0..8 {
            for j in 0..8 {
                let x = i as f32 * 0.1;
                pts.push([x, j as f32 * 0.1, 2.0 - x]);
            }
        }
        let (_, cov) = moments_of(&pts).mean_and_covariance().unwrap();
        let (n, _) = plane_normal(cov).unwrap();
        let expected = std::f64::consts::FRAC_1_SQRT_2;
        assert!((n[0].abs() - expected).abs() < 1e-6);
        assert!(n[1].abs() < 1e-6);
        assert!((n[2].abs() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_moments_channels_roundtrip_subtract() {
        let a = moments_of(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let b = moments_of(&[[1.0, 2.0, 3.0]]);
        let (ca, cb) = (a.to_channels(), b.to_channels());
        let mut diff = [0.0; Moments::CHANNELS];
        for k in 0..Moments::CHANNELS {
            diff[k] = ca[k] - cb[k];
        }
        let d = Moments::from_channels(diff);
        assert_eq!(d.count, 1.0);
        assert_eq!(d.sum, [4.0, 5.0, 6.0]);
        let (mean, cov) = d.mean_and_covariance().unwrap();
        assert_eq!(mean, [4.0, 5.0, 6.0]);
        assert!(cov.iter().all(|c| c.abs() < 1e-12));
    }

    #[test]
    fn test_zero_covariance_has_no_normal() {
        assert!(plane_normal([0.0; 6]).is_none());
    }

    #[test]
    fn test_orient_toward_origin() {
        let n = orient_toward_origin([0.0, 1.0, 0.0], [0.0, 1.5, 3.0]);
        assert_eq!(n, [0.0, -1.0, 0.0]);
        let n = orient_toward_origin([0.0, -1.0, 0.0], [0.0, 1.5, 3.0]);
        assert_eq!(n, [0.0, -1.0, 0.0]);
    }
}
