//! 图像序列
//!
//! 标定图片目录，或 EuRoC Dataset  https://paperswithcode.com/dataset/euroc-mav
mod directory;
mod euroc;

pub use directory::ImageDirectory;
pub use euroc::EuRoCDataset;

use std::path::PathBuf;

pub trait ImageSequence {
    /// 按时间顺序返回 (时间戳[秒], 图像路径)
    fn frames(&self) -> &[(f64, PathBuf)];

    fn paths(&self) -> Vec<PathBuf> {
        self.frames().iter().map(|(_, p)| p.clone()).collect()
    }
}
