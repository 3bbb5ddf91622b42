// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Candidate filtering and ranking.
//!
//! The sensor frame is the optical frame of the depth camera: x right,
//! y down, z forward. With a leveled sensor the floor normal is close to the
//! y axis, and the floor is the plane whose centroid has the largest y.

use crate::plane::PlaneCandidate;
use std::cmp::Ordering;

/// Minimum `|b|` for a plane to be considered level (about 45° from the
/// horizontal). Walls and other steep surfaces fall below this.
pub const MIN_VERTICAL_NORMAL: f32 = 0.70;

/// Coordinate index of the vertical axis in the sensor frame.
pub const HEIGHT_AXIS: usize = 1;

/// Direction in which [`HEIGHT_AXIS`] grows toward the floor. `1.0` for a
/// y-down optical frame, so the ground ranks first in descending order.
pub const HEIGHT_AXIS_TOWARD_GROUND: f32 = 1.0;

/// Ranking key: centroid height measured toward the ground.
#[inline]
fn height_key(candidate: &PlaneCandidate) -> f32 {
    candidate.centroid[HEIGHT_AXIS] * HEIGHT_AXIS_TOWARD_GROUND
}

/// True iff `a` ranks strictly before `b` (`a.centroid.y > b.centroid.y`).
#[inline]
pub fn is_higher(a: &PlaneCandidate, b: &PlaneCandidate) -> bool {
    height_key(a) > height_key(b)
}

/// Ordering for sorting candidates by descending centroid height.
#[inline]
pub fn plane_height_cmp(a: &PlaneCandidate, b: &PlaneCandidate) -> Ordering {
    height_key(b)
        .partial_cmp(&height_key(a))
        .unwrap_or(Ordering::Equal)
}

/// True when the candidate's normal is compatible with a leveled sensor.
#[inline]
pub fn is_level(candidate: &PlaneCandidate) -> bool {
    candidate.coefficients[HEIGHT_AXIS].abs() >= MIN_VERTICAL_NORMAL
}

/// Keep level candidates and order them by descending height.
///
/// The sort is stable, so candidates at equal height keep segmentation order.
pub fn rank_ground_candidates(mut candidates: Vec<PlaneCandidate>) -> Vec<PlaneCandidate> {
    candidates.retain(is_level);
    candidates.sort_by(plane_height_cmp);
    candidates
}

/// Index of the candidate whose plane is closest to `point`.
///
/// Ties go to the first candidate in order.
pub fn nearest_candidate(candidates: &[PlaneCandidate], point: [f32; 3]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let distance = candidate.distance(point);
        if distance.is_nan() {
            continue;
        }
        match best {
            Some((_, min)) if distance >= min => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizontal(y: f32) -> PlaneCandidate {
        PlaneCandidate::new([0.0, -1.0, 0.0, y], [0.0, y, 3.0])
    }

    #[test]
    fn test_walls_are_filtered() {
        let wall = PlaneCandidate::new([0.0, 0.5, -0.866, 4.0], [0.0, 0.5, 4.0]);
        let floor = PlaneCandidate::new([0.0, -0.75, -0.66, 2.0], [0.0, 1.2, 3.0]);
        let ranked = rank_ground_candidates(vec![wall, floor]);
        assert_eq!(ranked, vec![floor]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let edge = PlaneCandidate::new([0.0, 0.70, 0.714, 1.0], [0.0, 1.0, 1.0]);
        assert!(is_level(&edge));
        let below = PlaneCandidate::new([0.0, -0.6999, 0.714, 1.0], [0.0, 1.0, 1.0]);
        assert!(!is_level(&below));
    }

    #[test]
    fn test_rank_by_descending_height() {
        let low = horizontal(1.0);
        let high = horizontal(2.0);
        let ranked = rank_ground_candidates(vec![low, high]);
        assert_eq!(ranked[0].centroid[1], 2.0);
        assert_eq!(ranked[1].centroid[1], 1.0);
    }

    #[test]
    fn test_rank_is_stable_for_equal_heights() {
        let mut a = horizontal(1.5);
        a.inliers = 1;
        let mut b = horizontal(1.5);
        b.inliers = 2;
        let ranked = rank_ground_candidates(vec![a, b]);
        assert_eq!(ranked[0].inliers, 1);
        assert_eq!(ranked[1].inliers, 2);
    }

    #[test]
    fn test_comparator() {
        let a = horizontal(2.0);
        let b = horizontal(1.0);
        assert!(is_higher(&a, &b));
        assert!(!is_higher(&b, &a));
        assert!(!is_higher(&a, &a));
        assert_eq!(plane_height_cmp(&a, &b), Ordering::Less);
        assert_eq!(plane_height_cmp(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_nearest_candidate() {
        let p1 = PlaneCandidate::new([0.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0]);
        let p2 = PlaneCandidate::new([0.0, 0.0, 1.0, -5.0], [0.0, 0.0, 5.0]);
        assert_eq!(nearest_candidate(&[p1, p2], [0.0, 0.0, 0.1]), Some(0));
        assert_eq!(nearest_candidate(&[p1, p2], [0.0, 0.0, 4.0]), Some(1));
        assert_eq!(nearest_candidate(&[], [0.0, 0.0, 0.0]), None);
    }

    #[test]
    fn test_nearest_candidate_tie_keeps_first() {
        let p1 = PlaneCandidate::new([0.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0]);
        let p2 = PlaneCandidate::new([0.0, 0.0, 1.0, -2.0], [0.0, 0.0, 2.0]);
        assert_eq!(nearest_candidate(&[p1, p2], [0.0, 0.0, 1.0]), Some(0));
    }
}
