// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Candidate region coloring for the operator-facing views.
//!
//! Purely visual: nothing here feeds back into plane selection.

use crate::{
    cloud::{HasColor, HasPosition, PointCloud},
    plane::{PlaneCandidate, select_within_distance},
    viewer::RenderCloud,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Points within this distance of a candidate plane are painted with its color.
pub const REGION_VOXEL_SIZE: f32 = 0.06;

/// Color of the highlighted (selected) candidate.
pub const HIGHLIGHT_COLOR: [u8; 3] = [255, 0, 0];

/// Copy `cloud` and paint each candidate's inliers a random color.
///
/// When `highlight` names a candidate, its inliers are painted
/// [`HIGHLIGHT_COLOR`] after all random colors are applied. Candidates later
/// in the list overwrite earlier ones where their inliers overlap.
pub fn color_regions<P, R>(
    cloud: &PointCloud<P>,
    candidates: &[PlaneCandidate],
    highlight: Option<usize>,
    rng: &mut R,
) -> PointCloud<P>
where
    P: HasColor + Clone,
    R: Rng,
{
    let mut colored = cloud.clone();
    paint_regions(cloud, candidates, highlight, rng, |i, rgb| colored.points[i].set_rgb(rgb));
    colored
}

/// [`color_regions`] prepared for display.
///
/// Works on any cloud: points outside every region keep their own color, or
/// [`UNCOLORED`](crate::viewer::UNCOLORED) when they have none.
pub fn render_regions<P, R>(
    cloud: &PointCloud<P>,
    candidates: &[PlaneCandidate],
    highlight: Option<usize>,
    rng: &mut R,
) -> RenderCloud
where
    P: HasPosition,
    R: Rng,
{
    let mut render = RenderCloud::from_cloud(cloud);
    paint_regions(cloud, candidates, highlight, rng, |i, rgb| render.colors[i] = rgb);
    render
}

/// Random source for region colors.
pub fn color_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Call `paint` with every region inlier index and its color, in paint order.
fn paint_regions<P, R, F>(
    cloud: &PointCloud<P>,
    candidates: &[PlaneCandidate],
    highlight: Option<usize>,
    rng: &mut R,
    mut paint: F,
) where
    P: HasPosition,
    R: Rng,
    F: FnMut(usize, [u8; 3]),
{
    for candidate in candidates {
        let rgb = [rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>()];
        for i in select_within_distance(cloud, &candidate.coefficients, REGION_VOXEL_SIZE) {
            paint(i, rgb);
        }
    }

    if let Some(candidate) = highlight.and_then(|i| candidates.get(i)) {
        for i in select_within_distance(cloud, &candidate.coefficients, REGION_VOXEL_SIZE) {
            paint(i, HIGHLIGHT_COLOR);
        }
    }
}
