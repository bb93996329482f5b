//! 相机参数文件
//!
//! OpenCV FileStorage 格式 (YAML)，与标定结果 [crate::calibration::CameraIntrinsics] 互相转换。

mod pinhole_camera;
pub use pinhole_camera::PinholeParameters;

use crate::error::Result;

/// 相机参数的trait
pub trait CameraParametersTrait: Sized {
    const CAMERA_TYPE: &'static str;
    fn read_from_yaml(path: &str) -> Result<Self>;
    fn write_to_yaml(&self, path: &str) -> Result<()>;
}
