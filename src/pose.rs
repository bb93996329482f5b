//! 单帧位姿求解 (PnP)

use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3};
use opencv::{
    calib3d,
    core::{Mat, Point2f, Point3f, Vector},
    prelude::*,
};

use crate::calibration::CameraIntrinsics;
use crate::config::MIN_PNP_POINTS;
use crate::error::{CalibError, Result};
use crate::global_cast::{Rotation3d, Vector3d};
use crate::pattern::Correspondences;

/// 一帧的位姿：Rodrigues 旋转向量 + 平移向量，描述 object -> camera
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FramePose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl FramePose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    /// 旋转矩阵 (Rodrigues)
    pub fn rotation_matrix(&self) -> Result<Matrix3<f64>> {
        let rvec = Vector3d(self.rvec).to_mat()?;
        let mut rmat = Mat::default();
        calib3d::rodrigues(&rvec, &mut rmat, &mut Mat::default())?;
        Ok(Rotation3d::try_from(&rmat)?.0.into_inner())
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_scaled_axis(self.rvec)
    }

    /// 4x4 齐次变换，左上 3x3 为旋转，右列为平移
    pub fn transform(&self) -> Result<Matrix4<f64>> {
        let r = self.rotation_matrix()?;
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.tvec);
        Ok(m)
    }

    /// camera -> object，用于把虚拟物体放到标定板原点
    pub fn inverse_transform(&self) -> Result<Matrix4<f64>> {
        let rt = self.rotation_matrix()?.transpose();
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-(rt * self.tvec)));
        Ok(m)
    }
}

#[derive(Debug, Clone)]
pub struct PoseSolver {
    /// `SOLVEPNP_*`
    method: i32,
}

impl Default for PoseSolver {
    fn default() -> Self {
        Self {
            method: calib3d::SOLVEPNP_ITERATIVE,
        }
    }
}

impl PoseSolver {
    pub fn new(method: i32) -> Self {
        Self { method }
    }

    /// 每次求解互相独立，不使用上一帧结果作为初值
    pub fn solve(
        &self,
        object_points: &Vector<Point3f>,
        image_points: &Vector<Point2f>,
        intrinsics: &CameraIntrinsics,
    ) -> Result<FramePose> {
        if object_points.len() != image_points.len() {
            return Err(CalibError::PointCountMismatch {
                image: image_points.len(),
                object: object_points.len(),
            });
        }
        if image_points.len() < MIN_PNP_POINTS {
            return Err(CalibError::TooFewPoints {
                required: MIN_PNP_POINTS,
                actual: image_points.len(),
            });
        }

        let k = intrinsics.camera_mat()?;
        let d = intrinsics.distortion_mat()?;
        let mut rvec = Mat::default();
        let mut tvec = Mat::default();
        let converged = calib3d::solve_pnp(
            object_points,
            image_points,
            &k,
            &d,
            &mut rvec,
            &mut tvec,
            false,
            self.method,
        )?;
        if !converged {
            return Err(CalibError::PoseNotConverged);
        }

        let pose = FramePose {
            rvec: Vector3d::try_from(&rvec)?.0,
            tvec: Vector3d::try_from(&tvec)?.0,
        };
        log::debug!(
            "pose: rvec = {:?}, tvec = {:?}",
            pose.rvec.as_slice(),
            pose.tvec.as_slice()
        );
        Ok(pose)
    }

    pub fn solve_correspondences(
        &self,
        correspondences: &Correspondences,
        intrinsics: &CameraIntrinsics,
    ) -> Result<FramePose> {
        self.solve(
            &correspondences.object_points,
            &correspondences.image_points,
            intrinsics,
        )
    }
}
