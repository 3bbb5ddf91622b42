// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Ground plane estimation in one of four operating modes.
//!
//! # Modes
//!
//! 0. **Manual**: The operator picks three floor points in the viewer and
//!    the plane through them is returned. When more than three points are
//!    picked only the last three are kept.
//!
//! 1. **Semi-automatic**: The cloud is segmented into planar regions which
//!    are shown in random colors. The operator picks one point and the region
//!    whose plane is closest to it is returned.
//!
//! 2. **Automatic (visualized)**: Regions that are not level with the
//!    sensor are discarded and the lowest remaining region is returned. The
//!    result is shown highlighted in red before returning.
//!
//! 3. **Automatic (silent)**: As mode 2 without any rendering.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_groundplane::{GroundPlaneEstimator, pcd::read_pcd};
//!
//! let cloud = read_pcd("scene.pcd")?;
//! let mut estimator = GroundPlaneEstimator::new(3);
//! estimator.set_input_cloud(&cloud);
//! let plane = estimator.compute()?;
//! println!("{}", plane);
//! ```

use crate::{
    cloud::{HasPosition, PointCloud},
    color::{color_rng, render_regions},
    error::Error,
    normals::{NormalParams, estimate_normals},
    plane::{GroundPlane, PlaneCandidate, plane_from_points},
    segmentation::{SegmentationParams, segment_planes},
    selection::{nearest_candidate, rank_ground_candidates},
    viewer::{CameraPose, HeadlessViewer, PickEvent, RenderCloud, Viewer},
};
use kanal::Receiver;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt, fs::File, io::BufReader, path::Path};
use tracing::{debug, error, info, info_span, warn};

/// Number of picked points that define a plane in manual mode.
pub const MANUAL_PICKS: usize = 3;

/// Cloud id used for every rendered cloud.
const CLOUD_ID: &str = "input_cloud";

/// Operating mode of the estimator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimationMode {
    Manual = 0,
    SemiAutomatic = 1,
    AutomaticVisualized = 2,
    AutomaticSilent = 3,
}

impl EstimationMode {
    /// Convert a raw mode, falling back to [`EstimationMode::Manual`] with a
    /// warning when the value is out of range.
    pub fn from_raw(mode: i32) -> Self {
        match Self::try_from(mode) {
            Ok(mode) => mode,
            Err(_) => {
                warn!("invalid estimation mode {}, using manual mode", mode);
                EstimationMode::Manual
            }
        }
    }

    /// True for the modes that open a view.
    pub fn is_interactive(&self) -> bool {
        !matches!(self, EstimationMode::AutomaticSilent)
    }
}

impl TryFrom<i32> for EstimationMode {
    type Error = Error;

    fn try_from(mode: i32) -> Result<Self, Self::Error> {
        match mode {
            0 => Ok(EstimationMode::Manual),
            1 => Ok(EstimationMode::SemiAutomatic),
            2 => Ok(EstimationMode::AutomaticVisualized),
            3 => Ok(EstimationMode::AutomaticSilent),
            _ => Err(Error::InvalidMode(mode)),
        }
    }
}

impl fmt::Display for EstimationMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EstimationMode::Manual => "manual",
            EstimationMode::SemiAutomatic => "semi-automatic",
            EstimationMode::AutomaticVisualized => "automatic (visualized)",
            EstimationMode::AutomaticSilent => "automatic (silent)",
        };
        write!(f, "{}", name)
    }
}

/// Tunable parameters of the estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub normals: NormalParams,
    pub segmentation: SegmentationParams,
    /// Seed for the random region colors.
    pub color_seed: u64,
    pub camera: CameraPose,
}

impl EstimatorConfig {
    /// Read a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Estimates the ground plane of a borrowed point cloud.
///
/// The cloud is borrowed for the estimator's lifetime, so it cannot change
/// between `set_input_cloud` and `compute`.
pub struct GroundPlaneEstimator<'a, P, V = HeadlessViewer> {
    mode: EstimationMode,
    config: EstimatorConfig,
    viewer: V,
    cloud: Option<&'a PointCloud<P>>,
}

impl<'a, P> GroundPlaneEstimator<'a, P, HeadlessViewer> {
    /// Create an estimator for a raw mode integer. Values outside `0..=3`
    /// select manual mode.
    pub fn new(mode: i32) -> Self {
        Self::with_config(mode, EstimatorConfig::default())
    }

    pub fn with_config(mode: i32, config: EstimatorConfig) -> Self {
        GroundPlaneEstimator {
            mode: EstimationMode::from_raw(mode),
            config,
            viewer: HeadlessViewer,
            cloud: None,
        }
    }
}

impl<'a, P, V> GroundPlaneEstimator<'a, P, V> {
    /// Replace the viewer used by the interactive modes.
    pub fn with_viewer<W: Viewer>(self, viewer: W) -> GroundPlaneEstimator<'a, P, W> {
        GroundPlaneEstimator {
            mode: self.mode,
            config: self.config,
            viewer,
            cloud: self.cloud,
        }
    }

    pub fn set_input_cloud(&mut self, cloud: &'a PointCloud<P>) {
        self.cloud = Some(cloud);
    }

    pub fn mode(&self) -> EstimationMode {
        self.mode
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    pub fn into_viewer(self) -> V {
        self.viewer
    }
}

impl<'a, P, V> GroundPlaneEstimator<'a, P, V>
where
    P: HasPosition,
    V: Viewer,
{
    /// Estimate the ground plane in the configured mode.
    ///
    /// Only positions are required. Clouds without color are rendered
    /// [`UNCOLORED`](crate::viewer::UNCOLORED) by the interactive modes.
    pub fn compute(&mut self) -> Result<GroundPlane, Error> {
        let cloud = self.cloud.ok_or(Error::NoInputCloud)?;
        if cloud.is_empty() {
            return Err(Error::EmptyCloud);
        }

        let span = info_span!("compute", mode = %self.mode);
        let _guard = span.enter();
        info!("estimating ground plane from {} points", cloud.len());

        let plane = match self.mode {
            EstimationMode::Manual => self.manual(cloud),
            EstimationMode::SemiAutomatic => self.semi_automatic(cloud),
            EstimationMode::AutomaticVisualized | EstimationMode::AutomaticSilent => {
                self.automatic(cloud)
            }
        };

        match &plane {
            Ok(plane) => info!("ground plane: {}", plane),
            Err(err) => error!("ground plane estimation failed: {}", err),
        }
        plane
    }

    fn manual(&mut self, cloud: &PointCloud<P>) -> Result<GroundPlane, Error> {
        let picks = self.show("pick three floor points", &RenderCloud::from_cloud(cloud))?;

        let mut last = VecDeque::with_capacity(MANUAL_PICKS);
        for pick in picks {
            if last.len() == MANUAL_PICKS {
                last.pop_front();
            }
            last.push_back(pick.point);
        }

        if last.len() < MANUAL_PICKS {
            return Err(Error::NotEnoughPicks {
                picked: last.len(),
                required: MANUAL_PICKS,
            });
        }
        let points = [last[0], last[1], last[2]];
        debug!("fitting plane through {:?}", points);
        Ok(GroundPlane::new(plane_from_points(&points)?))
    }

    fn semi_automatic(&mut self, cloud: &PointCloud<P>) -> Result<GroundPlane, Error> {
        let candidates = find_candidates(cloud, &self.config)?;
        if candidates.is_empty() {
            return Err(Error::NoCandidates);
        }

        let mut rng = color_rng(self.config.color_seed);
        let render = render_regions(cloud, &candidates, None, &mut rng);
        let picks = self.show("pick a floor point", &render)?;

        let point = picks.last().ok_or(Error::NoPickedPoint)?.point;
        let index = nearest_candidate(&candidates, point).ok_or(Error::NoCandidates)?;
        debug!("picked {:?} selects candidate {}", point, index);
        Ok(GroundPlane::from(&candidates[index]))
    }

    fn automatic(&mut self, cloud: &PointCloud<P>) -> Result<GroundPlane, Error> {
        let ranked = rank_ground_candidates(find_candidates(cloud, &self.config)?);
        let Some(ground) = ranked.first() else {
            return Err(Error::NoCandidates);
        };

        if self.mode == EstimationMode::AutomaticVisualized {
            let mut rng = color_rng(self.config.color_seed);
            let render = render_regions(cloud, &ranked, Some(0), &mut rng);
            self.show("estimated ground plane", &render)?;
        }
        Ok(GroundPlane::from(ground))
    }

    /// Render one cloud, wait for dismissal and return the picks that landed
    /// on a point.
    fn show(&mut self, title: &str, render: &RenderCloud) -> Result<Vec<PickEvent>, Error> {
        self.viewer.open(title)?;
        self.viewer.add_cloud(CLOUD_ID, render)?;
        self.viewer.set_camera(&self.config.camera)?;
        let rx = self.viewer.pick_events();
        self.viewer.spin()?;
        Ok(drain_picks(&rx))
    }
}

fn drain_picks(rx: &Receiver<PickEvent>) -> Vec<PickEvent> {
    let mut picks = Vec::new();
    while let Ok(Some(pick)) = rx.try_recv() {
        match pick.index {
            Some(_) => picks.push(pick),
            None => debug!("ignoring pick that missed the cloud"),
        }
    }
    picks
}

/// Normals and segmentation: every planar region of the cloud.
pub fn find_candidates<P: HasPosition>(
    cloud: &PointCloud<P>,
    config: &EstimatorConfig,
) -> Result<Vec<PlaneCandidate>, Error> {
    let normals = estimate_normals(cloud, &config.normals)?;
    segment_planes(cloud, &normals, &config.segmentation)
}

/// Silent automatic estimation for clouds without color.
pub fn estimate_automatic<P: HasPosition>(
    cloud: &PointCloud<P>,
    config: &EstimatorConfig,
) -> Result<GroundPlane, Error> {
    if cloud.is_empty() {
        return Err(Error::EmptyCloud);
    }
    let ranked = rank_ground_candidates(find_candidates(cloud, config)?);
    match ranked.first() {
        Some(ground) => Ok(GroundPlane::from(ground)),
        None => {
            error!("no valid ground plane found");
            Err(Error::NoCandidates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cloud::PointXyzRgb, viewer::ScriptedViewer};

    fn flat(points: &[[f32; 3]]) -> PointCloud<PointXyzRgb> {
        PointCloud::new(
            points
                .iter()
                .map(|p| PointXyzRgb::new(p[0], p[1], p[2], [128, 128, 128]))
                .collect(),
        )
    }

    #[test]
    fn test_mode_from_raw() {
        assert_eq!(EstimationMode::from_raw(1), EstimationMode::SemiAutomatic);
        assert_eq!(EstimationMode::from_raw(3), EstimationMode::AutomaticSilent);
        assert_eq!(EstimationMode::from_raw(-1), EstimationMode::Manual);
        assert_eq!(EstimationMode::from_raw(4), EstimationMode::Manual);
        assert!(matches!(
            EstimationMode::try_from(7),
            Err(Error::InvalidMode(7))
        ));
    }

    #[test]
    fn test_config_json_defaults() {
        let config: EstimatorConfig =
            serde_json::from_str(r#"{"segmentation": {"min_inliers": 100}}"#).unwrap();
        assert_eq!(config.segmentation.min_inliers, 100);
        assert_eq!(config.segmentation.distance_threshold, 0.2);
        assert_eq!(config.normals, NormalParams::default());
        assert_eq!(config.camera, CameraPose::default());
    }

    #[test]
    fn test_compute_without_cloud() {
        let mut estimator = GroundPlaneEstimator::<PointXyzRgb>::new(3);
        assert!(matches!(estimator.compute(), Err(Error::NoInputCloud)));
    }

    #[test]
    fn test_compute_empty_cloud() {
        let cloud = PointCloud::<PointXyzRgb>::new(Vec::new());
        let mut estimator = GroundPlaneEstimator::new(3);
        estimator.set_input_cloud(&cloud);
        assert!(matches!(estimator.compute(), Err(Error::EmptyCloud)));
    }

    #[test]
    fn test_manual_uses_last_three_picks() {
        let cloud = flat(&[[0.0, 1.5, 2.0], [1.0, 1.5, 2.0], [0.0, 1.5, 3.0]]);
        let viewer = ScriptedViewer::new(vec![
            PickEvent::at(0, [5.0, -3.0, 9.0]),
            PickEvent::at(0, [0.0, 1.5, 2.0]),
            PickEvent::miss([0.0, 0.0, 0.0]),
            PickEvent::at(1, [1.0, 1.5, 2.0]),
            PickEvent::at(2, [0.0, 1.5, 3.0]),
        ]);
        let mut estimator = GroundPlaneEstimator::new(0).with_viewer(viewer);
        estimator.set_input_cloud(&cloud);
        let plane = estimator.compute().unwrap().normalized().unwrap();
        assert!((plane.b().abs() - 1.0).abs() < 1e-5);
        assert!((plane.distance([0.0, 0.0, 0.0]) - 1.5).abs() < 1e-5);

        let sessions = estimator.viewer().sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].camera, Some(CameraPose::default()));
    }

    #[test]
    fn test_manual_not_enough_picks() {
        let cloud = flat(&[[0.0, 1.5, 2.0], [1.0, 1.5, 2.0]]);
        let viewer = ScriptedViewer::new(vec![
            PickEvent::at(0, [0.0, 1.5, 2.0]),
            PickEvent::at(1, [1.0, 1.5, 2.0]),
        ]);
        let mut estimator = GroundPlaneEstimator::new(0).with_viewer(viewer);
        estimator.set_input_cloud(&cloud);
        assert!(matches!(
            estimator.compute(),
            Err(Error::NotEnoughPicks {
                picked: 2,
                required: 3
            })
        ));
    }

    #[test]
    fn test_manual_collinear_picks() {
        let cloud = flat(&[[0.0, 1.5, 2.0]]);
        let viewer = ScriptedViewer::new(vec![
            PickEvent::at(0, [0.0, 1.5, 2.0]),
            PickEvent::at(0, [1.0, 1.5, 2.0]),
            PickEvent::at(0, [2.0, 1.5, 2.0]),
        ]);
        let mut estimator = GroundPlaneEstimator::new(0).with_viewer(viewer);
        estimator.set_input_cloud(&cloud);
        assert!(matches!(estimator.compute(), Err(Error::DegeneratePlane)));
    }

    #[test]
    fn test_invalid_mode_is_manual() {
        let cloud = flat(&[[0.0, 1.5, 2.0]]);
        let mut estimator = GroundPlaneEstimator::new(42).with_viewer(ScriptedViewer::empty());
        assert_eq!(estimator.mode(), EstimationMode::Manual);
        estimator.set_input_cloud(&cloud);
        assert!(matches!(
            estimator.compute(),
            Err(Error::NotEnoughPicks { picked: 0, .. })
        ));
        assert_eq!(estimator.viewer().sessions()[0].title, "pick three floor points");
    }
}
