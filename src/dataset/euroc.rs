use std::path::{Path, PathBuf};

use super::ImageSequence;
use crate::error::Result;

const EUROC_CAM0_PATH: &str = "mav0/cam0/";

/// 只读取 cam0 的图像列表
#[derive(Debug, Default)]
pub struct EuRoCDataset {
    pub cam0s: Vec<(f64, PathBuf)>,
}

impl EuRoCDataset {
    /// `data.csv`: `#timestamp [ns],filename`
    pub fn read_cam(path: &Path) -> Result<Vec<(f64, PathBuf)>> {
        let csv_path = path.join("data.csv");
        let data_path = path.join("data");
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(csv_path)?;
        let mut cams = Vec::new();
        for record in reader.records() {
            let record = record?;
            let (Some(timestamp), Some(name)) = (record.get(0), record.get(1)) else {
                log::warn!("skip short record {:?}", record);
                continue;
            };
            let Ok(timestamp) = timestamp.parse::<f64>() else {
                log::warn!("skip record with bad timestamp {:?}", record);
                continue;
            };
            cams.push((timestamp * 1e-9, data_path.join(name)));
        }
        Ok(cams)
    }

    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let cam0_base_path = path.as_ref().join(EUROC_CAM0_PATH);
        let cam0s = Self::read_cam(&cam0_base_path)?;
        log::info!("{} cam0 frames in {}", cam0s.len(), path.as_ref().display());
        Ok(Self { cam0s })
    }
}

impl ImageSequence for EuRoCDataset {
    fn frames(&self) -> &[(f64, PathBuf)] {
        &self.cam0s
    }
}
