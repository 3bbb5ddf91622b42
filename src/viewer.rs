// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Interactive viewer abstraction.
//!
//! This module provides a [`Viewer`] trait that abstracts the operator-facing
//! point cloud view, enabling:
//!
//! - **Live operation**: Rendering through Rerun (with feature flag)
//! - **Unattended operation**: [`HeadlessViewer`] renders nothing
//! - **Testing**: [`ScriptedViewer`] replays pre-recorded picks
//!
//! Picks are delivered as [`PickEvent`] messages over a `kanal` channel. The
//! caller subscribes with [`Viewer::pick_events`] before blocking in
//! [`Viewer::spin`] and drains the receiver once the view is dismissed.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_groundplane::viewer::{PickEvent, ScriptedViewer, Viewer};
//!
//! let mut viewer = ScriptedViewer::new(vec![PickEvent::at(7, [0.0, 1.5, 3.0])]);
//! viewer.open("pick a floor point")?;
//! let picks = viewer.pick_events();
//! viewer.spin()?;
//! while let Ok(Some(pick)) = picks.try_recv() {
//!     println!("{:?}", pick.point);
//! }
//! ```

use crate::{
    cloud::{HasPosition, PointCloud},
    error::Error,
};
use kanal::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Display color for points that carry no color of their own.
pub const UNCOLORED: [u8; 3] = [200, 200, 200];

/// Cloud prepared for display: one position and one color per point.
///
/// Indices match the source cloud, including non-finite points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderCloud {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[u8; 3]>,
}

impl RenderCloud {
    /// Render a cloud with its own colors. Points without one are drawn
    /// [`UNCOLORED`].
    pub fn from_cloud<P: HasPosition>(cloud: &PointCloud<P>) -> Self {
        Self {
            positions: cloud.iter().map(|p| p.position()).collect(),
            colors: cloud
                .iter()
                .map(|p| p.display_rgb().unwrap_or(UNCOLORED))
                .collect(),
        }
    }

    /// Render a cloud with one color for every point.
    pub fn uniform<P: HasPosition>(cloud: &PointCloud<P>, rgb: [u8; 3]) -> Self {
        Self {
            positions: cloud.iter().map(|p| p.position()).collect(),
            colors: vec![rgb; cloud.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Index of the finite point closest to `point`, within `max_distance`.
    pub fn nearest(&self, point: [f32; 3], max_distance: f32) -> Option<usize> {
        let max_sq = max_distance * max_distance;
        self.positions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .map(|(i, p)| {
                let d = [p[0] - point[0], p[1] - point[1], p[2] - point[2]];
                (i, d[0] * d[0] + d[1] * d[1] + d[2] * d[2])
            })
            .filter(|(_, d)| *d <= max_sq)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
    }
}

/// A point picked by the operator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickEvent {
    /// Index of the picked point in the rendered cloud, `None` when the pick
    /// did not land on a point.
    pub index: Option<usize>,
    pub point: [f32; 3],
}

impl PickEvent {
    pub fn at(index: usize, point: [f32; 3]) -> Self {
        Self {
            index: Some(index),
            point,
        }
    }

    pub fn miss(point: [f32; 3]) -> Self {
        Self { index: None, point }
    }
}

/// Camera placement for the interactive view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPose {
    pub position: [f32; 3],
    /// View-up direction. `(0, -1, 0)` matches a y-down sensor frame.
    pub up: [f32; 3],
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, -2.0],
            up: [0.0, -1.0, 0.0],
        }
    }
}

/// Interactive point cloud view.
///
/// A view session starts with [`Viewer::open`] and ends when [`Viewer::spin`]
/// returns after the operator dismisses it.
pub trait Viewer {
    /// Start a new view session, discarding any previously rendered clouds.
    fn open(&mut self, title: &str) -> Result<(), Error>;

    /// Add or replace the cloud rendered under `id`.
    fn add_cloud(&mut self, id: &str, cloud: &RenderCloud) -> Result<(), Error>;

    /// Place the camera.
    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), Error>;

    /// Subscribe to pick events for the current session.
    fn pick_events(&mut self) -> Receiver<PickEvent>;

    /// Block until the operator dismisses the view.
    fn spin(&mut self) -> Result<(), Error>;
}

/// Viewer that renders nothing and never reports picks.
#[derive(Debug, Default)]
pub struct HeadlessViewer;

impl Viewer for HeadlessViewer {
    fn open(&mut self, _title: &str) -> Result<(), Error> {
        Ok(())
    }

    fn add_cloud(&mut self, _id: &str, _cloud: &RenderCloud) -> Result<(), Error> {
        Ok(())
    }

    fn set_camera(&mut self, _pose: &CameraPose) -> Result<(), Error> {
        Ok(())
    }

    fn pick_events(&mut self) -> Receiver<PickEvent> {
        let (_, rx) = kanal::unbounded();
        rx
    }

    fn spin(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// A recorded view session.
#[derive(Clone, Debug, Default)]
pub struct Session {
    pub title: String,
    pub clouds: Vec<(String, RenderCloud)>,
    pub camera: Option<CameraPose>,
    pub dismissed: bool,
}

/// Test viewer that replays a fixed list of picks on every spin.
///
/// Every rendered session is recorded so tests can inspect what the operator
/// would have seen.
#[derive(Debug, Default)]
pub struct ScriptedViewer {
    picks: Vec<PickEvent>,
    subscribers: Vec<Sender<PickEvent>>,
    sessions: Vec<Session>,
}

impl ScriptedViewer {
    /// Create a viewer with pre-defined picks.
    pub fn new(picks: Vec<PickEvent>) -> Self {
        Self {
            picks,
            ..Default::default()
        }
    }

    /// Create a viewer whose operator never picks anything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sessions opened so far, oldest first.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    fn current(&mut self) -> Result<&mut Session, Error> {
        self.sessions
            .last_mut()
            .ok_or_else(|| Error::Viewer("no open view session".to_string()))
    }
}

impl Viewer for ScriptedViewer {
    fn open(&mut self, title: &str) -> Result<(), Error> {
        self.subscribers.clear();
        self.sessions.push(Session {
            title: title.to_string(),
            ..Default::default()
        });
        Ok(())
    }

    fn add_cloud(&mut self, id: &str, cloud: &RenderCloud) -> Result<(), Error> {
        let session = self.current()?;
        session.clouds.retain(|(name, _)| name != id);
        session.clouds.push((id.to_string(), cloud.clone()));
        Ok(())
    }

    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), Error> {
        self.current()?.camera = Some(*pose);
        Ok(())
    }

    fn pick_events(&mut self) -> Receiver<PickEvent> {
        let (tx, rx) = kanal::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn spin(&mut self) -> Result<(), Error> {
        for tx in &self.subscribers {
            for pick in &self.picks {
                // A dropped receiver only means nobody is listening.
                let _ = tx.send(*pick);
            }
        }
        self.current()?.dismissed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{PointXyz, PointXyzRgb};

    fn drain(rx: &Receiver<PickEvent>) -> Vec<PickEvent> {
        let mut out = Vec::new();
        while let Ok(Some(pick)) = rx.try_recv() {
            out.push(pick);
        }
        out
    }

    #[test]
    fn test_scripted_viewer_replays_picks() {
        let picks = vec![PickEvent::at(0, [1.0, 2.0, 3.0]), PickEvent::miss([0.0; 3])];
        let mut viewer = ScriptedViewer::new(picks.clone());
        viewer.open("test").unwrap();
        let rx = viewer.pick_events();
        viewer.spin().unwrap();
        assert_eq!(drain(&rx), picks);
        assert!(viewer.sessions()[0].dismissed);
    }

    #[test]
    fn test_scripted_viewer_replaces_cloud() {
        let cloud = PointCloud::new(vec![PointXyzRgb::new(0.0, 0.0, 1.0, [1, 2, 3])]);
        let mut viewer = ScriptedViewer::empty();
        viewer.open("test").unwrap();
        viewer.add_cloud("input_cloud", &RenderCloud::from_cloud(&cloud)).unwrap();
        viewer.add_cloud("input_cloud", &RenderCloud::from_cloud(&cloud)).unwrap();
        viewer.set_camera(&CameraPose::default()).unwrap();
        let session = &viewer.sessions()[0];
        assert_eq!(session.clouds.len(), 1);
        assert_eq!(session.clouds[0].1.colors, vec![[1, 2, 3]]);
        assert_eq!(session.camera, Some(CameraPose::default()));
    }

    #[test]
    fn test_scripted_viewer_requires_session() {
        let mut viewer = ScriptedViewer::empty();
        assert!(matches!(
            viewer.add_cloud("x", &RenderCloud::default()),
            Err(Error::Viewer(_))
        ));
    }

    #[test]
    fn test_headless_viewer_has_no_picks() {
        let mut viewer = HeadlessViewer;
        viewer.open("test").unwrap();
        let rx = viewer.pick_events();
        viewer.spin().unwrap();
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn test_render_cloud_nearest() {
        let cloud = PointCloud::new(vec![
            PointXyz::new(0.0, 0.0, 1.0),
            PointXyz::nan(),
            PointXyz::new(0.0, 0.0, 2.0),
        ]);
        let render = RenderCloud::uniform(&cloud, [200, 200, 200]);
        assert_eq!(render.nearest([0.0, 0.1, 1.9], 0.5), Some(2));
        assert_eq!(render.nearest([5.0, 5.0, 5.0], 0.5), None);
    }

    #[test]
    fn test_position_only_cloud_renders_uncolored() {
        let cloud = PointCloud::new(vec![PointXyz::new(0.0, 0.0, 1.0), PointXyz::nan()]);
        let render = RenderCloud::from_cloud(&cloud);
        assert_eq!(render.colors, vec![UNCOLORED; 2]);
        assert_eq!(render.positions[0], [0.0, 0.0, 1.0]);
    }
}
