use opencv::{core::Mat, prelude::*};

use crate::config::{CANNY_HIGH, CANNY_LOW};
use crate::error::Result;
use crate::image_utils::convert_to_gray;
use crate::pattern::CornerExtractor;

use super::{FrameContext, FrameProcessor};

/// 原样复制
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl FrameProcessor for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn process_frame(&self, input: &Mat, _ctx: &mut FrameContext<'_>) -> Result<Mat> {
        Ok(input.try_clone()?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

impl FrameProcessor for Grayscale {
    fn name(&self) -> &str {
        "grayscale"
    }

    fn process_frame(&self, input: &Mat, _ctx: &mut FrameContext<'_>) -> Result<Mat> {
        convert_to_gray(input)
    }
}

/// 用当前内参去畸变，未标定时原样输出
#[derive(Debug, Clone, Copy, Default)]
pub struct Undistort;

impl FrameProcessor for Undistort {
    fn name(&self) -> &str {
        "undistort"
    }

    fn process_frame(&self, input: &Mat, ctx: &mut FrameContext<'_>) -> Result<Mat> {
        if ctx.calibrator.intrinsics().is_none() {
            log::debug!("not calibrated, undistort skipped");
            return Ok(input.try_clone()?);
        }
        ctx.calibrator.remap(input)
    }
}

/// 检测棋盘格并绘制角点
#[derive(Debug, Clone)]
pub struct ChessboardOverlay {
    extractor: CornerExtractor,
}

impl ChessboardOverlay {
    pub fn new(extractor: CornerExtractor) -> Self {
        Self { extractor }
    }
}

impl FrameProcessor for ChessboardOverlay {
    fn name(&self) -> &str {
        "chessboard"
    }

    fn process_frame(&self, input: &Mat, _ctx: &mut FrameContext<'_>) -> Result<Mat> {
        let detection = self.extractor.detect(input)?;
        self.extractor.draw(input, &detection)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CannyEdges {
    pub low: f64,
    pub high: f64,
}

impl Default for CannyEdges {
    fn default() -> Self {
        Self {
            low: CANNY_LOW,
            high: CANNY_HIGH,
        }
    }
}

impl CannyEdges {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }
}

impl FrameProcessor for CannyEdges {
    fn name(&self) -> &str {
        "canny"
    }

    fn process_frame(&self, input: &Mat, _ctx: &mut FrameContext<'_>) -> Result<Mat> {
        let gray = convert_to_gray(input)?;
        let mut edges = Mat::default();
        opencv::imgproc::canny(&gray, &mut edges, self.low, self.high, 3, false)?;
        Ok(edges)
    }
}

/// 内置处理器
#[derive(Debug, Clone)]
pub enum Processor {
    Passthrough(Passthrough),
    Grayscale(Grayscale),
    Undistort(Undistort),
    Chessboard(ChessboardOverlay),
    Canny(CannyEdges),
}

impl FrameProcessor for Processor {
    fn name(&self) -> &str {
        match self {
            Processor::Passthrough(p) => p.name(),
            Processor::Grayscale(p) => p.name(),
            Processor::Undistort(p) => p.name(),
            Processor::Chessboard(p) => p.name(),
            Processor::Canny(p) => p.name(),
        }
    }

    fn process_frame(&self, input: &Mat, ctx: &mut FrameContext<'_>) -> Result<Mat> {
        match self {
            Processor::Passthrough(p) => p.process_frame(input, ctx),
            Processor::Grayscale(p) => p.process_frame(input, ctx),
            Processor::Undistort(p) => p.process_frame(input, ctx),
            Processor::Chessboard(p) => p.process_frame(input, ctx),
            Processor::Canny(p) => p.process_frame(input, ctx),
        }
    }
}
