//! 图像处理管线
//!
//! 处理器按名字注册，按配置列表的顺序依次执行，前一级的输出作为后一级的输入。

mod processors;

use std::collections::HashMap;

use opencv::{core::Mat, prelude::*};

use crate::calibration::IntrinsicsCalibrator;
use crate::error::Result;

pub use processors::{CannyEdges, ChessboardOverlay, Grayscale, Passthrough, Processor, Undistort};

/// 处理器执行时可访问的会话状态
pub struct FrameContext<'a> {
    pub calibrator: &'a mut IntrinsicsCalibrator,
}

pub trait FrameProcessor {
    fn name(&self) -> &str;
    /// 不修改输入，返回新图像
    fn process_frame(&self, input: &Mat, ctx: &mut FrameContext<'_>) -> Result<Mat>;
}

#[derive(Debug, Default)]
pub struct ImagePipeline {
    processors: HashMap<String, Processor>,
    configuration: Vec<String>,
}

impl ImagePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册所有内置处理器
    pub fn with_builtin(extractor: crate::pattern::CornerExtractor) -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Processor::Passthrough(Passthrough));
        pipeline.register(Processor::Grayscale(Grayscale));
        pipeline.register(Processor::Undistort(Undistort));
        pipeline.register(Processor::Chessboard(ChessboardOverlay::new(extractor)));
        pipeline.register(Processor::Canny(CannyEdges::default()));
        pipeline
    }

    /// 同名处理器只保留第一次注册的，返回是否注册成功
    pub fn register(&mut self, processor: Processor) -> bool {
        let name = processor.name().to_string();
        if self.processors.contains_key(&name) {
            log::warn!("processor `{}` already registered", name);
            return false;
        }
        self.processors.insert(name, processor);
        true
    }

    pub fn set_configuration<I, S>(&mut self, configuration: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configuration = configuration.into_iter().map(Into::into).collect();
        for name in &self.configuration {
            if !self.processors.contains_key(name) {
                log::warn!("no processor named `{}`, it will be skipped", name);
            }
        }
    }

    pub fn configuration(&self) -> &[String] {
        &self.configuration
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    pub fn process_frame(&self, input: &Mat, ctx: &mut FrameContext<'_>) -> Result<Mat> {
        let mut current = input.try_clone()?;
        for name in &self.configuration {
            if let Some(processor) = self.processors.get(name) {
                current = processor.process_frame(&current, ctx)?;
            }
        }
        Ok(current)
    }
}
