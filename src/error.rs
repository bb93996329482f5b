//! 错误类型
//!
//! 检测失败（棋盘格不可见）不是错误，只有结构性误用和底层库错误会走到这里。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibError {
    /// 没有任何角点数据就调用了标定
    #[error("calibration needs at least one correspondence set")]
    InsufficientData,
    /// 有标定数据但不知道图像尺寸
    #[error("calibration views exist but no image size was recorded")]
    UnknownImageSize,
    /// 相机还没有内参
    #[error("camera intrinsics are not available yet")]
    NotCalibrated,
    #[error("pose solving needs at least {required} correspondences, got {actual}")]
    TooFewPoints { required: usize, actual: usize },
    #[error("image/object point counts differ: {image} image points, {object} object points")]
    PointCountMismatch { image: usize, object: usize },
    #[error("pose solver did not converge")]
    PoseNotConverged,
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(i32),
    #[error("expected a {expected} matrix, got {rows}x{cols}")]
    MatShape {
        expected: &'static str,
        rows: i32,
        cols: i32,
    },
    #[error("missing setting `{0}`")]
    MissingSetting(String),
    #[error("unsupported camera model `{0}`")]
    UnsupportedModel(String),
    #[error("viewport and clip planes must be non-degenerate")]
    InvalidViewport,
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, CalibError>;
