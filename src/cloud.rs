// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point cloud container and point capabilities.
//!
//! Points are described by capability traits rather than a fixed layout:
//! every point has a position ([`HasPosition`]) and some points also carry an
//! RGB color ([`HasColor`]). Operations that only need geometry accept any
//! `P: HasPosition`; the colorization path requires `P: HasColor`.
//!
//! Clouds coming from a depth sensor are *organized*: the points are stored
//! row-major in a `width × height` grid that mirrors the sensor image, which is
//! what the neighborhood-based normal estimation relies on.

use crate::error::Error;

/// A point with a 3-D position.
pub trait HasPosition {
    /// Position as `[x, y, z]` in the sensor frame.
    fn position(&self) -> [f32; 3];

    /// True when all three coordinates are finite.
    #[inline]
    fn is_finite(&self) -> bool {
        let [x, y, z] = self.position();
        x.is_finite() && y.is_finite() && z.is_finite()
    }

    /// Color to draw this point with, when it carries one.
    #[inline]
    fn display_rgb(&self) -> Option<[u8; 3]> {
        None
    }
}

/// A point that carries an RGB color in addition to its position.
pub trait HasColor: HasPosition {
    fn rgb(&self) -> [u8; 3];
    fn set_rgb(&mut self, rgb: [u8; 3]);
}

/// Position-only point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointXyz {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl PointXyz {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Invalid return (no depth measured at this pixel).
    pub const fn nan() -> Self {
        Self::new(f32::NAN, f32::NAN, f32::NAN)
    }
}

impl HasPosition for PointXyz {
    #[inline]
    fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Colored point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointXyzRgb {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PointXyzRgb {
    pub const fn new(x: f32, y: f32, z: f32, rgb: [u8; 3]) -> Self {
        Self {
            x,
            y,
            z,
            r: rgb[0],
            g: rgb[1],
            b: rgb[2],
        }
    }
}

impl HasPosition for PointXyzRgb {
    #[inline]
    fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    fn display_rgb(&self) -> Option<[u8; 3]> {
        Some(self.rgb())
    }
}

impl HasColor for PointXyzRgb {
    #[inline]
    fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    #[inline]
    fn set_rgb(&mut self, rgb: [u8; 3]) {
        self.r = rgb[0];
        self.g = rgb[1];
        self.b = rgb[2];
    }
}

impl HasPosition for [f32; 3] {
    #[inline]
    fn position(&self) -> [f32; 3] {
        *self
    }
}

/// Point cloud, optionally organized as a `width × height` image grid.
///
/// Unorganized clouds have `height == 1` and `width == points.len()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud<P> {
    pub points: Vec<P>,
    pub width: usize,
    pub height: usize,
}

impl<P> PointCloud<P> {
    /// Create an unorganized cloud.
    pub fn new(points: Vec<P>) -> Self {
        let width = points.len();
        Self {
            points,
            width,
            height: 1,
        }
    }

    /// Create an organized cloud from row-major points.
    pub fn organized(points: Vec<P>, width: usize, height: usize) -> Result<Self, Error> {
        if width * height != points.len() {
            return Err(Error::Pcd(format!(
                "{} points do not fill a {}x{} grid",
                points.len(),
                width,
                height
            )));
        }
        Ok(Self {
            points,
            width,
            height,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when the points form an image grid with more than one row.
    pub fn is_organized(&self) -> bool {
        self.height > 1 && self.width * self.height == self.points.len()
    }

    /// Point at column `u`, row `v` of an organized cloud.
    #[inline]
    pub fn at(&self, u: usize, v: usize) -> Option<&P> {
        if u >= self.width || v >= self.height {
            return None;
        }
        self.points.get(v * self.width + u)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, P> {
        self.points.iter()
    }
}

impl<P: HasPosition> PointCloud<P> {
    /// Number of points with a non-finite coordinate.
    pub fn count_invalid(&self) -> usize {
        self.points.iter().filter(|p| !p.is_finite()).count()
    }
}

/// Check whether a frame has too many invalid points to be usable.
///
/// Returns `true` iff the fraction of points with a non-finite x, y, or z is
/// strictly greater than `max_ratio`. An empty cloud is always rejected.
pub fn too_many_nan<P: HasPosition>(cloud: &PointCloud<P>, max_ratio: f32) -> bool {
    if cloud.is_empty() {
        return true;
    }
    let ratio = cloud.count_invalid() as f32 / cloud.len() as f32;
    ratio > max_ratio
}
