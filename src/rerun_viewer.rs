// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Rerun-backed viewer.
//!
//! Clouds are logged to a Rerun recording under `world/`. Rerun has no
//! picking callback, so the operator reads coordinates off the viewer's
//! hover tooltip and types them as `x y z` lines on the input stream. Each
//! typed point is snapped to the nearest rendered point and shown in red.
//! A `q` line or end of input dismisses the view.
//!
//! ```text
//! cargo run --features rerun -- scene.pcd --mode 0 --connect
//! ```

use crate::{
    error::Error,
    viewer::{CameraPose, PickEvent, RenderCloud, Viewer},
};
use kanal::{Receiver, Sender};
use rerun::RecordingStream;
use std::io::{BufRead, StdinLock};
use tracing::{info, warn};

/// Typed picks farther than this from every rendered point miss the cloud.
pub const PICK_RADIUS: f32 = 0.25;

const PICK_COLOR: [u8; 3] = [255, 0, 0];
const PICK_POINT_RADIUS: f32 = 0.03;

pub struct RerunViewer<R> {
    rec: RecordingStream,
    input: R,
    rendered: Option<RenderCloud>,
    picked: Vec<[f32; 3]>,
    subscribers: Vec<Sender<PickEvent>>,
}

impl RerunViewer<StdinLock<'static>> {
    /// Viewer reading picks from standard input.
    pub fn stdin(rec: RecordingStream) -> Self {
        Self::new(rec, std::io::stdin().lock())
    }
}

impl<R: BufRead> RerunViewer<R> {
    pub fn new(rec: RecordingStream, input: R) -> Self {
        Self {
            rec,
            input,
            rendered: None,
            picked: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Points picked during the current session, after snapping.
    pub fn picked(&self) -> &[[f32; 3]] {
        &self.picked
    }

    fn pick(&mut self, point: [f32; 3]) -> Result<(), Error> {
        let index = self
            .rendered
            .as_ref()
            .and_then(|cloud| cloud.nearest(point, PICK_RADIUS));

        let event = match (index, &self.rendered) {
            (Some(i), Some(cloud)) => PickEvent::at(i, cloud.positions[i]),
            _ => {
                warn!("({}, {}, {}) is not on the cloud", point[0], point[1], point[2]);
                PickEvent::miss(point)
            }
        };

        if event.index.is_some() {
            info!(
                "picked point {:?} at ({}, {}, {})",
                event.index, event.point[0], event.point[1], event.point[2]
            );
            self.picked.push(event.point);
            let [r, g, b] = PICK_COLOR;
            self.rec.log(
                "world/clicked_points",
                &rerun::Points3D::new(self.picked.iter().copied())
                    .with_colors([rerun::Color::from_rgb(r, g, b)])
                    .with_radii([PICK_POINT_RADIUS]),
            )?;
        }

        for tx in &self.subscribers {
            let _ = tx.send(event);
        }
        Ok(())
    }
}

/// Parse an `x y z` line; commas are accepted as separators.
fn parse_point(line: &str) -> Option<[f32; 3]> {
    let mut values = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f32>());
    let point = [
        values.next()?.ok()?,
        values.next()?.ok()?,
        values.next()?.ok()?,
    ];
    match values.next() {
        None => Some(point),
        Some(_) => None,
    }
}

impl<R: BufRead> Viewer for RerunViewer<R> {
    fn open(&mut self, title: &str) -> Result<(), Error> {
        self.rendered = None;
        self.picked.clear();
        self.subscribers.clear();
        self.rec.log("world", &rerun::Clear::recursive())?;
        self.rec.log("log", &rerun::TextLog::new(title))?;
        info!("{}", title);
        Ok(())
    }

    fn add_cloud(&mut self, id: &str, cloud: &RenderCloud) -> Result<(), Error> {
        let (positions, colors): (Vec<[f32; 3]>, Vec<rerun::Color>) = cloud
            .positions
            .iter()
            .zip(cloud.colors.iter())
            .filter(|(p, _)| p.iter().all(|c| c.is_finite()))
            .map(|(p, c)| (*p, rerun::Color::from_rgb(c[0], c[1], c[2])))
            .unzip();
        self.rec.log(
            format!("world/{}", id),
            &rerun::Points3D::new(positions).with_colors(colors),
        )?;
        self.rendered = Some(cloud.clone());
        Ok(())
    }

    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), Error> {
        let coordinates = if pose.up[1] < 0.0 {
            rerun::ViewCoordinates::RDF()
        } else {
            rerun::ViewCoordinates::RUB()
        };
        self.rec.log_static("world", &coordinates)?;
        self.rec.log(
            "world/camera",
            &rerun::Points3D::new([pose.position]).with_labels(["camera"]),
        )?;
        Ok(())
    }

    fn pick_events(&mut self) -> Receiver<PickEvent> {
        let (tx, rx) = kanal::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn spin(&mut self) -> Result<(), Error> {
        info!("enter picked points as 'x y z', 'q' to finish");
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text.eq_ignore_ascii_case("q") {
                break;
            }
            match parse_point(text) {
                Some(point) => self.pick(point)?,
                None => warn!("expected 'x y z', got '{}'", text),
            }
        }
        Ok(())
    }
}
