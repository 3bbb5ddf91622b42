// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Error type shared by every ground plane estimation stage.

use std::fmt;

/// Common error type for ground plane estimation
///
/// Configuration problems (an out-of-range mode) are recovered locally with a
/// warning; everything listed here is a condition the caller has to handle.
#[derive(Debug)]
pub enum Error {
    /// I/O error (file operations, operator input)
    Io(std::io::Error),
    /// Shape error from ndarray operations
    Shape(ndarray::ShapeError),
    /// JSON configuration error
    Json(serde_json::Error),
    /// Malformed or unsupported PCD file
    Pcd(String),
    /// Mode integer outside the supported range
    InvalidMode(i32),
    /// `compute` was called before `set_input_cloud`
    NoInputCloud,
    /// The input cloud has no points
    EmptyCloud,
    /// Ratio of non-finite points exceeds the allowed maximum
    TooManyNaN { ratio: f32, max_ratio: f32 },
    /// Operation requires an organized (image-shaped) cloud
    NotOrganized { width: usize, height: usize },
    /// Manual mode needs three picked points
    NotEnoughPicks { picked: usize, required: usize },
    /// Operator dismissed the view without picking a point
    NoPickedPoint,
    /// Points do not define a plane (collinear or coincident)
    DegeneratePlane,
    /// No planar region survived segmentation and filtering
    NoCandidates,
    /// Viewer backend failure
    Viewer(String),
    /// Rerun recording stream error
    #[cfg(feature = "rerun")]
    Rerun(rerun::RecordingStreamError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Shape(err) => write!(f, "shape error: {}", err),
            Error::Json(err) => write!(f, "json error: {}", err),
            Error::Pcd(msg) => write!(f, "invalid pcd: {}", msg),
            Error::InvalidMode(mode) => write!(f, "invalid estimation mode: {}", mode),
            Error::NoInputCloud => write!(f, "no input cloud set"),
            Error::EmptyCloud => write!(f, "input cloud is empty"),
            Error::TooManyNaN { ratio, max_ratio } => write!(
                f,
                "too many invalid points: ratio {:.3} exceeds {:.3}",
                ratio, max_ratio
            ),
            Error::NotOrganized { width, height } => {
                write!(f, "cloud is not organized: {}x{}", width, height)
            }
            Error::NotEnoughPicks { picked, required } => write!(
                f,
                "not enough picked points: {} of {} required",
                picked, required
            ),
            Error::NoPickedPoint => write!(f, "no point was picked"),
            Error::DegeneratePlane => write!(f, "points do not define a plane"),
            Error::NoCandidates => write!(f, "no valid ground plane found"),
            Error::Viewer(msg) => write!(f, "viewer error: {}", msg),
            #[cfg(feature = "rerun")]
            Error::Rerun(err) => write!(f, "rerun error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Shape(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

#[cfg(feature = "rerun")]
impl From<rerun::RecordingStreamError> for Error {
    fn from(err: rerun::RecordingStreamError) -> Self {
        Error::Rerun(err)
    }
}
