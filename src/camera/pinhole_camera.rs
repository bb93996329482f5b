use nalgebra::Matrix3;
use opencv::core::{
    FileNode, FileNodeTraitConst, FileStorage, FileStorageTrait, FileStorageTraitConst, Size,
};

use super::CameraParametersTrait;
use crate::calibration::CameraIntrinsics;
use crate::error::{CalibError, Result};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PinholeParameters {
    pub camera_name: String,
    // size
    pub image_width: i32,
    pub image_height: i32,
    // intrinsic
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    // distortion
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl PinholeParameters {
    pub fn from_intrinsics(
        camera_name: &str,
        image_size: Size,
        intrinsics: &CameraIntrinsics,
    ) -> Self {
        let d = |i: usize| intrinsics.distortion.get(i).copied().unwrap_or(0.0);
        if intrinsics.distortion.len() > 5 {
            log::warn!(
                "only 5 of {} distortion coefficients are stored",
                intrinsics.distortion.len()
            );
        }
        Self {
            camera_name: camera_name.to_string(),
            image_width: image_size.width,
            image_height: image_size.height,
            fx: intrinsics.fx(),
            fy: intrinsics.fy(),
            cx: intrinsics.cx(),
            cy: intrinsics.cy(),
            k1: d(0),
            k2: d(1),
            p1: d(2),
            p2: d(3),
            k3: d(4),
        }
    }

    pub fn to_intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::new(
            Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0),
            vec![self.k1, self.k2, self.p1, self.p2, self.k3],
        )
    }

    pub fn image_size(&self) -> Size {
        Size::new(self.image_width, self.image_height)
    }
}

/// 读取必需的节点
fn required(parent: &FileNode, name: &str) -> Result<FileNode> {
    let node = parent.get(name)?;
    if node.is_none()? {
        return Err(CalibError::MissingSetting(name.to_string()));
    }
    Ok(node)
}

impl CameraParametersTrait for PinholeParameters {
    const CAMERA_TYPE: &'static str = "PINHOLE";

    fn read_from_yaml(path: &str) -> Result<Self> {
        let fs = FileStorage::new(path, opencv::core::FileStorage_Mode::READ as i32, "utf-8")?;
        if !fs.is_opened()? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cannot open camera file {}", path),
            )
            .into());
        }
        let root = fs.root(0)?;

        let model_type = root.get("model_type")?;
        if !model_type.is_none()? {
            let model_type = model_type.to_string()?;
            if model_type != Self::CAMERA_TYPE {
                log::error!("model type {} is not pinhole", model_type);
                return Err(CalibError::UnsupportedModel(model_type));
            }
        }
        // image
        let camera_name = root.get("camera_name")?.to_string()?;
        let image_width = required(&root, "image_width")?.to_i32()?;
        let image_height = required(&root, "image_height")?.to_i32()?;
        // distortion, k3 可省略
        let distortion_parameters = required(&root, "distortion_parameters")?;
        let k1 = required(&distortion_parameters, "k1")?.to_f64()?;
        let k2 = required(&distortion_parameters, "k2")?.to_f64()?;
        let p1 = required(&distortion_parameters, "p1")?.to_f64()?;
        let p2 = required(&distortion_parameters, "p2")?.to_f64()?;
        let k3 = distortion_parameters.get("k3")?.to_f64()?;
        // intrinsic
        let projection_parameters = required(&root, "projection_parameters")?;
        let fx = required(&projection_parameters, "fx")?.to_f64()?;
        let fy = required(&projection_parameters, "fy")?.to_f64()?;
        let cx = required(&projection_parameters, "cx")?.to_f64()?;
        let cy = required(&projection_parameters, "cy")?.to_f64()?;

        log::info!("camera parameters loaded from {}", path);
        Ok(Self {
            camera_name,
            image_width,
            image_height,
            fx,
            fy,
            cx,
            cy,
            k1,
            k2,
            p1,
            p2,
            k3,
        })
    }

    fn write_to_yaml(&self, path: &str) -> Result<()> {
        let mut fs = FileStorage::new(path, opencv::core::FileStorage_Mode::WRITE as i32, "utf-8")?;

        fs.write_str("model_type", Self::CAMERA_TYPE)?;
        fs.write_str("camera_name", &self.camera_name)?;
        fs.write_i32("image_width", self.image_width)?;
        fs.write_i32("image_height", self.image_height)?;
        // distortion
        fs.start_write_struct("distortion_parameters", opencv::core::FileNode_MAP, "")?;
        fs.write_f64("k1", self.k1)?;
        fs.write_f64("k2", self.k2)?;
        fs.write_f64("p1", self.p1)?;
        fs.write_f64("p2", self.p2)?;
        fs.write_f64("k3", self.k3)?;
        fs.end_write_struct()?;
        // intrinsic
        fs.start_write_struct("projection_parameters", opencv::core::FileNode_MAP, "")?;
        fs.write_f64("fx", self.fx)?;
        fs.write_f64("fy", self.fy)?;
        fs.write_f64("cx", self.cx)?;
        fs.write_f64("cy", self.cy)?;
        fs.end_write_struct()?;
        fs.release()?;
        log::info!("camera parameters saved to {}", path);
        Ok(())
    }
}
