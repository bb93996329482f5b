//! AR 会话
//!
//! 持有标定器、角点提取器、位姿求解器和图像管线，逐帧完成
//! 角点检测 -> 位姿求解 -> 矩阵构造。

use nalgebra::Matrix4;
use opencv::{core::Mat, prelude::*};

use crate::calibration::IntrinsicsCalibrator;
use crate::config::CALIBRATION_CAPTURE_INTERVAL;
use crate::error::{CalibError, Result};
use crate::pattern::{ChessboardPattern, CornerExtractor};
use crate::pipeline::{FrameContext, ImagePipeline};
use crate::pose::{FramePose, PoseSolver};
use crate::projection::{build_projection_matrix, ClipPlanes, ProjectionMatrix, Viewport};

/// OpenCV 相机坐标 (x 右, y 下, z 前) -> OpenGL 相机坐标 (x 右, y 上, z 后)
pub fn cv_to_gl() -> Matrix4<f64> {
    Matrix4::from_diagonal(&nalgebra::Vector4::new(1.0, -1.0, -1.0, 1.0))
}

/// 图像像素 (u, v) 在视口中作为背景纹理时的 NDC 坐标。
///
/// 投影矩阵第一行为 `-2fx/w`，x 轴随之镜像，背景必须同样水平翻转绘制，
/// 虚拟物体才会落在对应的角点上。
pub fn background_ndc(u: f64, v: f64, viewport: Viewport) -> (f64, f64) {
    (1.0 - 2.0 * u / viewport.width, 1.0 - 2.0 * v / viewport.height)
}

/// 交给渲染器的矩阵
#[derive(Debug, Clone)]
pub struct OverlayMatrices {
    pub projection: ProjectionMatrix,
    pub pose: FramePose,
    /// object -> OpenGL camera
    pub model_view: Matrix4<f64>,
    /// 相机在标定板坐标系下的位姿
    pub camera: Matrix4<f64>,
}

#[derive(Debug)]
pub struct FrameOutput {
    /// 管线处理后的图像
    pub image: Mat,
    /// 本帧是否找到完整棋盘格
    pub found: bool,
    pub overlay: Option<OverlayMatrices>,
}

#[derive(Debug)]
pub struct ArSession {
    calibrator: IntrinsicsCalibrator,
    extractor: CornerExtractor,
    solver: PoseSolver,
    pipeline: ImagePipeline,

    /// 为 None 时使用帧尺寸
    viewport: Option<Viewport>,
    clip: ClipPlanes,

    capture_interval: f64,
    last_capture: Option<f64>,
}

impl ArSession {
    pub fn new(pattern: ChessboardPattern) -> Self {
        let extractor = CornerExtractor::new(pattern);
        Self {
            calibrator: IntrinsicsCalibrator::new(),
            pipeline: ImagePipeline::with_builtin(extractor.clone()),
            extractor,
            solver: PoseSolver::default(),
            viewport: None,
            clip: ClipPlanes::default(),
            capture_interval: CALIBRATION_CAPTURE_INTERVAL,
            last_capture: None,
        }
    }

    pub fn with_calibrator(mut self, calibrator: IntrinsicsCalibrator) -> Self {
        self.calibrator = calibrator;
        self
    }

    pub fn calibrator(&self) -> &IntrinsicsCalibrator {
        &self.calibrator
    }

    pub fn calibrator_mut(&mut self) -> &mut IntrinsicsCalibrator {
        &mut self.calibrator
    }

    pub fn pipeline_mut(&mut self) -> &mut ImagePipeline {
        &mut self.pipeline
    }

    pub fn pattern(&self) -> &ChessboardPattern {
        self.extractor.pattern()
    }

    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }

    pub fn set_clip_planes(&mut self, clip: ClipPlanes) {
        self.clip = clip;
    }

    pub fn set_capture_interval(&mut self, seconds: f64) {
        self.capture_interval = seconds;
    }

    /// 实时采集标定帧，每个间隔内最多尝试一次。返回本帧是否被加入数据集。
    pub fn capture_calibration_frame(&mut self, timestamp: f64, frame: &Mat) -> Result<bool> {
        if let Some(last) = self.last_capture {
            if timestamp - last < self.capture_interval {
                return Ok(false);
            }
        }
        self.last_capture = Some(timestamp);

        let Some(correspondences) = self.extractor.extract(frame)? else {
            log::debug!("t = {:.3}: no chessboard for calibration", timestamp);
            return Ok(false);
        };
        self.calibrator.add_correspondences(&correspondences)?;
        self.calibrator.note_image_size(frame.size()?);
        log::info!(
            "t = {:.3}: calibration view {} captured",
            timestamp,
            self.calibrator.view_count()
        );
        Ok(true)
    }

    /// 以采集帧的尺寸标定
    pub fn calibrate(&mut self) -> Result<f64> {
        if self.calibrator.view_count() == 0 {
            return Err(CalibError::InsufficientData);
        }
        let size = self
            .calibrator
            .image_size()
            .ok_or(CalibError::UnknownImageSize)?;
        self.calibrator.calibrate(size)
    }

    pub fn process_frame(&mut self, frame: &Mat) -> Result<FrameOutput> {
        let image = {
            let mut ctx = FrameContext {
                calibrator: &mut self.calibrator,
            };
            self.pipeline.process_frame(frame, &mut ctx)?
        };

        let Some(correspondences) = self.extractor.extract(frame)? else {
            return Ok(FrameOutput {
                image,
                found: false,
                overlay: None,
            });
        };
        let Some(intrinsics) = self.calibrator.intrinsics() else {
            log::debug!("chessboard found but camera is not calibrated");
            return Ok(FrameOutput {
                image,
                found: true,
                overlay: None,
            });
        };

        let pose = match self.solver.solve_correspondences(&correspondences, intrinsics) {
            Ok(pose) => pose,
            Err(CalibError::PoseNotConverged) => {
                log::debug!("pose did not converge, frame skipped");
                return Ok(FrameOutput {
                    image,
                    found: true,
                    overlay: None,
                });
            }
            Err(e) => return Err(e),
        };

        let viewport = match self.viewport {
            Some(viewport) => viewport,
            None => {
                let size = frame.size()?;
                Viewport::new(size.width as f64, size.height as f64)
            }
        };
        let projection = build_projection_matrix(intrinsics, viewport, self.clip)?;
        let transform = pose.transform()?;

        Ok(FrameOutput {
            image,
            found: true,
            overlay: Some(OverlayMatrices {
                projection,
                pose,
                model_view: cv_to_gl() * transform,
                camera: pose.inverse_transform()?,
            }),
        })
    }
}
