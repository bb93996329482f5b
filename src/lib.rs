//! 相机标定与单帧位姿估计
//!
//! opencv
//! https://docs.rs/opencv/latest/opencv/all.html
//!
//! nalgebra
//! https://docs.rs/nalgebra/latest/nalgebra/

pub mod calibration;
pub mod camera;
pub mod config;
pub mod dataset;
pub mod error;
pub mod global_cast;
pub mod image_utils;
pub mod pattern;
pub mod pipeline;
pub mod pose;
pub mod projection;
pub mod session;
pub mod settings;

#[cfg(test)]
mod synthetic;

pub use calibration::{CameraIntrinsics, IntrinsicsCalibrator};
pub use error::{CalibError, Result};
pub use pattern::{ChessboardPattern, CornerExtractor};
pub use pose::{FramePose, PoseSolver};
pub use session::ArSession;
