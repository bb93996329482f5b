use std::path::{Path, PathBuf};

use super::ImageSequence;
use crate::config::FREQUENCY;
use crate::error::Result;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// 目录中的图片，按文件名排序，时间戳按固定帧率生成
#[derive(Debug, Default)]
pub struct ImageDirectory {
    frames: Vec<(f64, PathBuf)>,
}

impl ImageDirectory {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path.as_ref())? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();
        log::info!("{} images in {}", paths.len(), path.as_ref().display());

        let frames = paths
            .into_iter()
            .enumerate()
            .map(|(i, p)| (i as f64 / FREQUENCY as f64, p))
            .collect();
        Ok(Self { frames })
    }
}

impl ImageSequence for ImageDirectory {
    fn frames(&self) -> &[(f64, PathBuf)] {
        &self.frames
    }
}
