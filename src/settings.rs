//! 扁平化的标定结果
//!
//! 每个矩阵元素一个键，例如 `calibration/matrix/intrinsics/m02`，以 JSON 对象保存。

use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::calibration::CameraIntrinsics;
use crate::error::{CalibError, Result};

const INTRINSICS_PREFIX: &str = "calibration/matrix/intrinsics";
const DISTORTION_PREFIX: &str = "calibration/matrix/distortion";

fn key(prefix: &str, row: usize, col: usize) -> String {
    format!("{}/m{}{}", prefix, row, col)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationSettings(pub BTreeMap<String, f64>);

impl CalibrationSettings {
    pub fn from_intrinsics(intrinsics: &CameraIntrinsics) -> Self {
        let mut values = BTreeMap::new();
        for (r, row) in intrinsics.camera_matrix_rows().iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                values.insert(key(INTRINSICS_PREFIX, r, c), *v);
            }
        }
        for (c, v) in intrinsics.distortion.iter().enumerate() {
            values.insert(key(DISTORTION_PREFIX, 0, c), *v);
        }
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// 相机矩阵的 9 个元素必须齐全，畸变系数读到第一个缺失的列为止
    pub fn to_intrinsics(&self) -> Result<CameraIntrinsics> {
        let mut camera_matrix = Matrix3::zeros();
        for r in 0..3 {
            for c in 0..3 {
                let k = key(INTRINSICS_PREFIX, r, c);
                camera_matrix[(r, c)] = self.get(&k).ok_or(CalibError::MissingSetting(k))?;
            }
        }
        let distortion = (0..)
            .map_while(|c| self.get(&key(DISTORTION_PREFIX, 0, c)))
            .collect();
        Ok(CameraIntrinsics::new(camera_matrix, distortion))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let settings = serde_json::from_reader(std::io::BufReader::new(file))?;
        log::info!("calibration settings loaded from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        log::info!("calibration settings saved to {}", path.as_ref().display());
        Ok(())
    }
}
