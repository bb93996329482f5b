//! 相机内参标定
//!
//! [IntrinsicsCalibrator] 持有多幅标定图像的角点数据，求解相机矩阵和畸变系数，
//! 并缓存去畸变映射表。

use std::path::Path;

use nalgebra::{Matrix3, Vector3};
use opencv::{
    calib3d,
    core::{Mat, Point2f, Point3f, Scalar, Size, TermCriteria, Vector, BORDER_CONSTANT, CV_32FC1},
    imgcodecs,
    imgproc::INTER_LINEAR,
    prelude::*,
};

use crate::error::{CalibError, Result};
use crate::global_cast::{Matrix3d, MatPrinter, Vector3d, VectorXd};
use crate::pattern::{ChessboardPattern, CornerExtractor, Correspondences};

/// 相机内参：3x3 相机矩阵 + 畸变系数 `(k1, k2, p1, p2[, k3...])`
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics {
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Vec<f64>,
}

impl CameraIntrinsics {
    pub fn new(camera_matrix: Matrix3<f64>, distortion: Vec<f64>) -> Self {
        Self {
            camera_matrix,
            distortion,
        }
    }

    /// 无畸变的针孔相机
    pub fn from_pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            camera_matrix: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            distortion: vec![0.0; 5],
        }
    }

    pub fn from_mats(camera_matrix: &Mat, distortion: &Mat) -> Result<Self> {
        Ok(Self {
            camera_matrix: Matrix3d::try_from(camera_matrix)?.0,
            distortion: VectorXd::try_from(distortion)?.0,
        })
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }
    #[inline]
    pub fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }
    #[inline]
    pub fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }
    #[inline]
    pub fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }

    pub fn camera_mat(&self) -> Result<Mat> {
        Matrix3d(self.camera_matrix).to_mat()
    }

    pub fn distortion_mat(&self) -> Result<Mat> {
        VectorXd(self.distortion.clone()).to_mat()
    }

    /// 相机矩阵按行展开，`rows[r][c]`
    pub fn camera_matrix_rows(&self) -> [[f64; 3]; 3] {
        let m = &self.camera_matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

/// 一次标定的附加结果
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    /// 重投影误差 RMS（像素）
    pub rms: f64,
    pub view_count: usize,
    pub image_size: Size,
    /// 每幅标定图像的外参（Rodrigues 旋转向量、平移向量）
    pub rotations: Vec<Vector3<f64>>,
    pub translations: Vec<Vector3<f64>>,
}

/// 去畸变映射表缓存，由脏标记控制重建
#[derive(Debug, Default)]
pub struct UndistortMaps {
    map_x: Mat,
    map_y: Mat,
    size: Size,
    dirty: bool,
    rebuild_count: usize,
}

impl UndistortMaps {
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 映射表被重建的次数
    pub fn rebuild_count(&self) -> usize {
        self.rebuild_count
    }

    fn needs_rebuild(&self, size: Size) -> bool {
        self.dirty || self.map_x.empty() || self.size != size
    }

    fn rebuild(&mut self, intrinsics: &CameraIntrinsics, size: Size) -> Result<()> {
        if !self.dirty && !self.map_x.empty() {
            log::warn!(
                "frame size changed {}x{} -> {}x{}, rebuilding undistortion maps",
                self.size.width,
                self.size.height,
                size.width,
                size.height
            );
        }
        let camera_matrix = intrinsics.camera_mat()?;
        let distortion = intrinsics.distortion_mat()?;
        let mut map_x = Mat::default();
        let mut map_y = Mat::default();
        // 保持原相机矩阵，去畸变后的图像与投影矩阵一致
        calib3d::init_undistort_rectify_map(
            &camera_matrix,
            &distortion,
            &Mat::default(),
            &camera_matrix,
            size,
            CV_32FC1,
            &mut map_x,
            &mut map_y,
        )?;
        self.map_x = map_x;
        self.map_y = map_y;
        self.size = size;
        self.dirty = false;
        self.rebuild_count += 1;
        log::debug!("undistortion maps rebuilt ({})", self.rebuild_count);
        Ok(())
    }

    fn apply(&self, image: &Mat) -> Result<Mat> {
        let mut undistorted = Mat::default();
        opencv::imgproc::remap(
            image,
            &mut undistorted,
            &self.map_x,
            &self.map_y,
            INTER_LINEAR,
            BORDER_CONSTANT,
            Scalar::default(),
        )?;
        Ok(undistorted)
    }
}

#[derive(Debug, Default)]
pub struct IntrinsicsCalibrator {
    /// 标定板坐标系下的角点
    object_points: Vector<Vector<Point3f>>,
    /// 图像中的角点（像素）
    image_points: Vector<Vector<Point2f>>,
    /// 最近一次成功加入的图像尺寸
    image_size: Option<Size>,

    intrinsics: Option<CameraIntrinsics>,
    report: Option<CalibrationReport>,
    undistort: UndistortMaps,
}

impl IntrinsicsCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已加入的视图数量
    pub fn view_count(&self) -> usize {
        self.image_points.len()
    }

    pub fn image_size(&self) -> Option<Size> {
        self.image_size
    }

    /// 加入一组对应点
    pub fn add_points(
        &mut self,
        image_points: &Vector<Point2f>,
        object_points: &Vector<Point3f>,
    ) -> Result<()> {
        if image_points.len() != object_points.len() {
            return Err(CalibError::PointCountMismatch {
                image: image_points.len(),
                object: object_points.len(),
            });
        }
        self.image_points.push(image_points.clone());
        self.object_points.push(object_points.clone());
        self.undistort.mark_dirty();
        Ok(())
    }

    pub fn add_correspondences(&mut self, correspondences: &Correspondences) -> Result<()> {
        self.add_points(
            &correspondences.image_points,
            &correspondences.object_points,
        )
    }

    /// 记录外部采集帧的尺寸，供 [IntrinsicsCalibrator::image_size] 使用
    pub fn note_image_size(&mut self, size: Size) {
        self.image_size = Some(size);
    }

    /// 逐个读取灰度图并检测棋盘格，返回成功的图像数量。
    ///
    /// 读不到的文件和找不到棋盘格的图像都会被跳过。
    pub fn add_from_files<P: AsRef<Path>>(
        &mut self,
        files: &[P],
        pattern: &ChessboardPattern,
    ) -> Result<usize> {
        let extractor = CornerExtractor::new(*pattern);
        let mut successes = 0;

        for file in files {
            let path = file.as_ref();
            let Some(name) = path.to_str() else {
                log::warn!("skip non utf-8 path {:?}", path);
                continue;
            };
            let image = match imgcodecs::imread(name, imgcodecs::IMREAD_GRAYSCALE) {
                Ok(image) if !image.empty() => image,
                Ok(_) => {
                    log::warn!("cannot read image {}", name);
                    continue;
                }
                Err(e) => {
                    log::warn!("cannot read image {}: {}", name, e);
                    continue;
                }
            };

            match extractor.extract(&image) {
                Ok(Some(correspondences)) => {
                    self.add_correspondences(&correspondences)?;
                    self.image_size = Some(image.size()?);
                    successes += 1;
                }
                Ok(None) => log::debug!("no chessboard in {}", name),
                Err(e) => log::warn!("chessboard search failed on {}: {}", name, e),
            }
        }

        log::info!(
            "chessboard found in {}/{} images, {} views collected",
            successes,
            files.len(),
            self.view_count()
        );
        Ok(successes)
    }

    /// 标定相机，返回重投影误差 RMS
    pub fn calibrate(&mut self, image_size: Size) -> Result<f64> {
        if self.image_points.is_empty() {
            return Err(CalibError::InsufficientData);
        }

        let mut camera_matrix = Mat::default();
        let mut dist_coeffs = Mat::default();
        let mut rvecs = Vector::<Mat>::new();
        let mut tvecs = Vector::<Mat>::new();
        let criteria = TermCriteria::new(
            opencv::core::TermCriteria_COUNT + opencv::core::TermCriteria_EPS,
            30,
            f64::EPSILON,
        )?;

        let rms = calib3d::calibrate_camera(
            &self.object_points,
            &self.image_points,
            image_size,
            &mut camera_matrix,
            &mut dist_coeffs,
            &mut rvecs,
            &mut tvecs,
            0,
            criteria,
        )?;
        log::info!(
            "calibrated from {} views, rms = {:.4} px",
            self.view_count(),
            rms
        );
        log::debug!("camera matrix: {}", MatPrinter(&camera_matrix));
        log::debug!("distortion: {}", MatPrinter(&dist_coeffs));

        let rotations = rvecs
            .iter()
            .map(|r| Vector3d::try_from(&r).map(|v| v.0))
            .collect::<Result<Vec<_>>>()?;
        let translations = tvecs
            .iter()
            .map(|t| Vector3d::try_from(&t).map(|v| v.0))
            .collect::<Result<Vec<_>>>()?;

        self.intrinsics = Some(CameraIntrinsics::from_mats(&camera_matrix, &dist_coeffs)?);
        self.report = Some(CalibrationReport {
            rms,
            view_count: self.view_count(),
            image_size,
            rotations,
            translations,
        });
        self.undistort.mark_dirty();
        Ok(rms)
    }

    /// 去畸变，返回新图像
    pub fn remap(&mut self, image: &Mat) -> Result<Mat> {
        let intrinsics = self.intrinsics.as_ref().ok_or(CalibError::NotCalibrated)?;
        let size = image.size()?;
        if self.undistort.needs_rebuild(size) {
            self.undistort.rebuild(intrinsics, size)?;
        }
        self.undistort.apply(image)
    }

    pub fn intrinsics(&self) -> Option<&CameraIntrinsics> {
        self.intrinsics.as_ref()
    }

    pub fn camera_matrix(&self) -> Option<&Matrix3<f64>> {
        self.intrinsics.as_ref().map(|i| &i.camera_matrix)
    }

    pub fn distortion_coeffs(&self) -> Option<&[f64]> {
        self.intrinsics.as_ref().map(|i| i.distortion.as_slice())
    }

    pub fn report(&self) -> Option<&CalibrationReport> {
        self.report.as_ref()
    }

    pub fn undistort_maps(&self) -> &UndistortMaps {
        &self.undistort
    }

    /// 直接设置内参（例如从配置中读取）
    pub fn set_intrinsics(&mut self, intrinsics: CameraIntrinsics) {
        self.intrinsics = Some(intrinsics);
        self.undistort.mark_dirty();
    }

    pub fn set_distortion_coeffs(&mut self, coeffs: Vec<f64>) -> Result<()> {
        let intrinsics = self.intrinsics.as_mut().ok_or(CalibError::NotCalibrated)?;
        intrinsics.distortion = coeffs;
        self.undistort.mark_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic;
    use approx::assert_relative_eq;
    use opencv::core::{Rect, CV_8UC1};

    fn synthetic_calibrator() -> IntrinsicsCalibrator {
        let pattern = synthetic::pattern();
        let k = synthetic::camera_matrix();
        let mut calibrator = IntrinsicsCalibrator::new();
        for (rotation, translation) in synthetic::view_poses(&pattern) {
            let image_points = synthetic::project(&pattern, &k, &rotation, &translation);
            calibrator
                .add_points(&image_points, &pattern.object_points())
                .unwrap();
        }
        calibrator
    }

    fn test_image() -> Mat {
        let mut img = Mat::new_rows_cols_with_default(120, 160, CV_8UC1, Scalar::all(30.)).unwrap();
        opencv::imgproc::rectangle(
            &mut img,
            Rect::new(20, 20, 60, 40),
            Scalar::all(220.),
            -1,
            opencv::imgproc::LINE_8,
            0,
        )
        .unwrap();
        img
    }

    #[test]
    fn calibrate_without_views_fails() {
        let mut calibrator = IntrinsicsCalibrator::new();
        assert!(matches!(
            calibrator.calibrate(Size::new(640, 480)),
            Err(CalibError::InsufficientData)
        ));
        assert!(calibrator.intrinsics().is_none());
        assert!(calibrator.camera_matrix().is_none());
    }

    #[test]
    fn mismatched_points_rejected() {
        let pattern = synthetic::pattern();
        let mut object_points = pattern.object_points();
        object_points.remove(0).unwrap();
        let image_points: Vector<Point2f> =
            (0..pattern.corner_count()).map(|i| Point2f::new(i as f32, 0.0)).collect();

        let mut calibrator = IntrinsicsCalibrator::new();
        assert!(matches!(
            calibrator.add_points(&image_points, &object_points),
            Err(CalibError::PointCountMismatch { .. })
        ));
        assert_eq!(calibrator.view_count(), 0);
    }

    #[test]
    fn recovers_intrinsics_from_exact_points() {
        let mut calibrator = synthetic_calibrator();
        let rms = calibrator.calibrate(synthetic::image_size()).unwrap();
        assert!(rms < 0.01, "rms = {}", rms);

        let intrinsics = calibrator.intrinsics().unwrap();
        let truth = synthetic::camera_matrix();
        assert_relative_eq!(intrinsics.fx(), truth[(0, 0)], max_relative = 0.005);
        assert_relative_eq!(intrinsics.fy(), truth[(1, 1)], max_relative = 0.005);
        assert_relative_eq!(intrinsics.cx(), truth[(0, 2)], max_relative = 0.005);
        assert_relative_eq!(intrinsics.cy(), truth[(1, 2)], max_relative = 0.005);

        let report = calibrator.report().unwrap();
        assert_eq!(report.view_count, 10);
        assert_eq!(report.rotations.len(), 10);
        assert_eq!(report.translations.len(), 10);
    }

    #[test]
    fn calibrate_twice_is_stable() {
        let mut calibrator = synthetic_calibrator();
        calibrator.calibrate(synthetic::image_size()).unwrap();
        let first = calibrator.intrinsics().unwrap().clone();
        calibrator.calibrate(synthetic::image_size()).unwrap();
        let second = calibrator.intrinsics().unwrap();

        assert_relative_eq!(first.camera_matrix, second.camera_matrix, epsilon = 1e-9);
        assert_eq!(first.distortion.len(), second.distortion.len());
        for (a, b) in first.distortion.iter().zip(&second.distortion) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn calibrate_from_rendered_files() {
        let _ = env_logger::builder().is_test(true).try_init();
        let pattern = synthetic::pattern();
        let k = synthetic::camera_matrix();
        let dir = tempfile::tempdir().unwrap();

        let mut files = Vec::new();
        for (i, (rotation, translation)) in synthetic::view_poses(&pattern).iter().enumerate() {
            let image = synthetic::render_view(&pattern, &k, rotation, translation);
            let path = dir.path().join(format!("view_{:02}.png", i));
            imgcodecs::imwrite(path.to_str().unwrap(), &image, &Vector::new()).unwrap();
            files.push(path);
        }
        // 空白图和不存在的文件都应被跳过
        let blank = Mat::new_rows_cols_with_default(480, 640, CV_8UC1, Scalar::all(200.)).unwrap();
        let blank_path = dir.path().join("blank.png");
        imgcodecs::imwrite(blank_path.to_str().unwrap(), &blank, &Vector::new()).unwrap();
        files.push(blank_path);
        files.push(dir.path().join("missing.png"));

        let mut calibrator = IntrinsicsCalibrator::new();
        let found = calibrator.add_from_files(&files, &pattern).unwrap();
        assert_eq!(found, 10);
        assert_eq!(calibrator.view_count(), 10);
        assert_eq!(calibrator.image_size(), Some(synthetic::image_size()));

        let rms = calibrator.calibrate(synthetic::image_size()).unwrap();
        assert!(rms < 1.0, "rms = {}", rms);

        let intrinsics = calibrator.intrinsics().unwrap();
        assert_relative_eq!(intrinsics.fx(), k[(0, 0)], max_relative = 0.01);
        assert_relative_eq!(intrinsics.fy(), k[(1, 1)], max_relative = 0.01);
        assert_relative_eq!(intrinsics.cx(), k[(0, 2)], max_relative = 0.01);
        assert_relative_eq!(intrinsics.cy(), k[(1, 2)], max_relative = 0.01);
    }

    #[test]
    fn remap_requires_intrinsics() {
        let mut calibrator = IntrinsicsCalibrator::new();
        assert!(matches!(
            calibrator.remap(&test_image()),
            Err(CalibError::NotCalibrated)
        ));
        assert!(matches!(
            calibrator.set_distortion_coeffs(vec![0.1]),
            Err(CalibError::NotCalibrated)
        ));
    }

    #[test]
    fn remap_reuses_maps_until_dirty() {
        let mut calibrator = IntrinsicsCalibrator::new();
        calibrator.set_intrinsics(CameraIntrinsics::new(
            Matrix3::new(150.0, 0.0, 80.0, 0.0, 150.0, 60.0, 0.0, 0.0, 1.0),
            vec![-0.2, 0.05, 0.0, 0.0, 0.0],
        ));
        assert!(calibrator.undistort_maps().is_dirty());

        let image = test_image();
        let first = calibrator.remap(&image).unwrap();
        let second = calibrator.remap(&image).unwrap();
        assert_eq!(calibrator.undistort_maps().rebuild_count(), 1);
        assert_eq!(first.data_bytes().unwrap(), second.data_bytes().unwrap());
        assert_eq!(first.size().unwrap(), image.size().unwrap());

        calibrator.set_distortion_coeffs(vec![0.1, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(calibrator.undistort_maps().is_dirty());
        calibrator.remap(&image).unwrap();
        assert_eq!(calibrator.undistort_maps().rebuild_count(), 2);
        assert!(!calibrator.undistort_maps().is_dirty());
    }

    #[test]
    fn remap_rebuilds_on_new_frame_size() {
        let mut calibrator = IntrinsicsCalibrator::new();
        calibrator.set_intrinsics(CameraIntrinsics::from_pinhole(150.0, 150.0, 80.0, 60.0));
        calibrator.remap(&test_image()).unwrap();
        let bigger = Mat::new_rows_cols_with_default(240, 320, CV_8UC1, Scalar::all(0.)).unwrap();
        let out = calibrator.remap(&bigger).unwrap();
        assert_eq!(out.size().unwrap(), Size::new(320, 240));
        assert_eq!(calibrator.undistort_maps().rebuild_count(), 2);
    }

    #[test]
    fn zero_distortion_keeps_image() {
        let mut calibrator = IntrinsicsCalibrator::new();
        calibrator.set_intrinsics(CameraIntrinsics::from_pinhole(150.0, 150.0, 80.0, 60.0));
        let image = test_image();
        let out = calibrator.remap(&image).unwrap();
        // 内部区域应保持不变
        assert_eq!(*out.at_2d::<u8>(40, 50).unwrap(), 220);
        assert_eq!(*out.at_2d::<u8>(100, 130).unwrap(), 30);
    }
}
