//! 棋盘格角点提取
//!
//! 在单帧图像中寻找棋盘格内角点，并与平面标定板上的三维坐标配对。

use opencv::{
    calib3d,
    core::{Mat, Point2f, Point3f, Size, TermCriteria, Vector},
    imgproc::COLOR_GRAY2BGR,
    prelude::*,
};

use crate::config::*;
use crate::error::Result;
use crate::image_utils::convert_to_gray;

/// 棋盘格：`rows x cols` 个内角点，方格边长 `square_size`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChessboardPattern {
    pub rows: i32,
    pub cols: i32,
    pub square_size: f32,
}

impl Default for ChessboardPattern {
    fn default() -> Self {
        Self {
            rows: BOARD_ROWS,
            cols: BOARD_COLS,
            square_size: SQUARE_SIZE,
        }
    }
}

impl ChessboardPattern {
    pub fn new(rows: i32, cols: i32, square_size: f32) -> Self {
        Self {
            rows,
            cols,
            square_size,
        }
    }

    /// OpenCV 的 patternSize：宽为每行角点数，高为行数
    #[inline]
    pub fn board_size(&self) -> Size {
        Size::new(self.cols, self.rows)
    }

    #[inline]
    pub fn corner_count(&self) -> usize {
        (self.rows.max(0) * self.cols.max(0)) as usize
    }

    /// 生成标定板坐标系下的角点：`(i * s, j * s, 0)`，按行优先排列。
    pub fn object_points(&self) -> Vector<Point3f> {
        let s = self.square_size;
        (0..self.rows)
            .flat_map(|i| {
                (0..self.cols).map(move |j| Point3f::new(i as f32 * s, j as f32 * s, 0.0))
            })
            .collect()
    }
}

/// 一次角点检测的原始结果。`found == false` 时 `image_points` 可能只有部分角点。
#[derive(Debug, Clone, Default)]
pub struct CornerDetection {
    pub found: bool,
    pub image_points: Vector<Point2f>,
}

/// 二维图像点与三维标定板点的对应关系，两者长度恒等于 `rows * cols`
#[derive(Debug, Clone, Default)]
pub struct Correspondences {
    pub image_points: Vector<Point2f>,
    pub object_points: Vector<Point3f>,
}

impl Correspondences {
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// 找到完整棋盘格后总会做亚像素精化
#[derive(Debug, Clone)]
pub struct CornerExtractor {
    pattern: ChessboardPattern,
    flags: i32,
}

impl CornerExtractor {
    pub fn new(pattern: ChessboardPattern) -> Self {
        Self {
            pattern,
            flags: CHESSBOARD_FLAGS,
        }
    }

    pub fn pattern(&self) -> &ChessboardPattern {
        &self.pattern
    }

    fn sub_pixel_criteria() -> Result<TermCriteria> {
        Ok(TermCriteria::new(
            opencv::core::TermCriteria_COUNT + opencv::core::TermCriteria_EPS,
            SUBPIX_MAX_ITER,
            SUBPIX_EPSILON,
        )?)
    }

    /// 检测内角点。图像为空、对比度不足或被遮挡时返回 `found == false`。
    pub fn detect(&self, image: &Mat) -> Result<CornerDetection> {
        if image.empty() {
            log::debug!("empty image, skip chessboard search");
            return Ok(CornerDetection::default());
        }
        let gray = convert_to_gray(image)?;

        let mut corners = Vector::<Point2f>::new();
        let found = calib3d::find_chessboard_corners(
            &gray,
            self.pattern.board_size(),
            &mut corners,
            self.flags,
        )?;
        let found = found && corners.len() == self.pattern.corner_count();

        if found {
            opencv::imgproc::corner_sub_pix(
                &gray,
                &mut corners,
                Size::new(SUBPIX_WINDOW, SUBPIX_WINDOW),
                Size::new(-1, -1),
                Self::sub_pixel_criteria()?,
            )?;
        }
        log::debug!(
            "chessboard {}x{}: found={} corners={}",
            self.pattern.cols,
            self.pattern.rows,
            found,
            corners.len()
        );

        Ok(CornerDetection {
            found,
            image_points: corners,
        })
    }

    /// 检测并配对。未找到完整棋盘时返回 `None`。
    pub fn extract(&self, image: &Mat) -> Result<Option<Correspondences>> {
        let detection = self.detect(image)?;
        if !detection.found {
            return Ok(None);
        }
        Ok(Some(Correspondences {
            image_points: detection.image_points,
            object_points: self.pattern.object_points(),
        }))
    }

    /// 在图像副本上绘制检测到的角点（调试用）
    pub fn draw(&self, image: &Mat, detection: &CornerDetection) -> Result<Mat> {
        let mut canvas = Mat::default();
        if image.channels() == 1 {
            opencv::imgproc::cvt_color(image, &mut canvas, COLOR_GRAY2BGR, 0)?;
        } else {
            image.copy_to(&mut canvas)?;
        }
        if !detection.image_points.is_empty() {
            calib3d::draw_chessboard_corners(
                &mut canvas,
                self.pattern.board_size(),
                &detection.image_points,
                detection.found,
            )?;
        }
        Ok(canvas)
    }
}
