//! 全局类型转换
//!
//! OpenCV [Mat] 与 nalgebra 类型之间的转换。读取时统一转为 `CV_64F`。

use nalgebra::*;
use opencv::core::{Mat, CV_64F};
use opencv::prelude::*;
use std::fmt::Display;

use crate::error::{CalibError, Result};

/// 统一为 `CV_64F`，避免 `at_2d::<f64>` 类型不匹配
fn to_f64(mat: &Mat) -> Result<Mat> {
    if mat.typ() == CV_64F {
        return Ok(mat.clone());
    }
    let mut out = Mat::default();
    mat.convert_to(&mut out, CV_64F, 1.0, 0.0)?;
    Ok(out)
}

fn check_shape(mat: &Mat, rows: i32, cols: i32, expected: &'static str) -> Result<()> {
    if mat.rows() != rows || mat.cols() != cols {
        return Err(CalibError::MatShape {
            expected,
            rows: mat.rows(),
            cols: mat.cols(),
        });
    }
    Ok(())
}

/// 实现 Display trait 用于打印
pub struct MatPrinter<'a>(pub &'a Mat);

impl Display for MatPrinter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mat = match to_f64(self.0) {
            Ok(mat) => mat,
            Err(_) => return write!(f, "<mat {}x{}>", self.0.rows(), self.0.cols()),
        };
        writeln!(f)?;
        for i in 0..mat.rows() {
            for j in 0..mat.cols() {
                match mat.at_2d::<f64>(i, j) {
                    Ok(v) => write!(f, "{}, ", v)?,
                    Err(_) => write!(f, "?, ")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Matrix3d(pub Matrix3<f64>);

/// 实现 Display trait 用于打印
impl Display for Matrix3d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 将 [Mat] 转换为 [Matrix3]
impl TryFrom<&Mat> for Matrix3d {
    type Error = CalibError;
    fn try_from(mat: &Mat) -> Result<Self> {
        check_shape(mat, 3, 3, "3x3")?;
        let mat = to_f64(mat)?;
        let mut matrix = Matrix3::<f64>::zeros();
        for i in 0..3 {
            for j in 0..3 {
                matrix[(i, j)] = *mat.at_2d::<f64>(i as i32, j as i32)?;
            }
        }
        Ok(Matrix3d(matrix))
    }
}

impl Matrix3d {
    /// 将 [Matrix3] 转换为 [Mat]
    pub fn to_mat(&self) -> Result<Mat> {
        let mut mat = Mat::zeros(3, 3, CV_64F)?.to_mat()?;
        for i in 0..3 {
            for j in 0..3 {
                *mat.at_2d_mut::<f64>(i as i32, j as i32)? = self.0[(i, j)];
            }
        }
        Ok(mat)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Rotation3d(pub Rotation3<f64>);

impl Display for Rotation3d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&Mat> for Rotation3d {
    type Error = CalibError;
    fn try_from(mat: &Mat) -> Result<Self> {
        let matrix = Matrix3d::try_from(mat)?.0;
        Ok(Rotation3d(Rotation3::from_matrix_unchecked(matrix)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Vector3d(pub Vector3<f64>);

impl Display for Vector3d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 接受 3x1 或 1x3 的 [Mat]
impl TryFrom<&Mat> for Vector3d {
    type Error = CalibError;
    fn try_from(mat: &Mat) -> Result<Self> {
        if mat.rows() * mat.cols() != 3 {
            return Err(CalibError::MatShape {
                expected: "3x1",
                rows: mat.rows(),
                cols: mat.cols(),
            });
        }
        let mat = to_f64(mat)?;
        let mut vector = Vector3::<f64>::zeros();
        for i in 0..3 {
            vector[i] = *mat.at::<f64>(i as i32)?;
        }
        Ok(Vector3d(vector))
    }
}

impl Vector3d {
    pub fn to_mat(&self) -> Result<Mat> {
        let mut mat = Mat::zeros(3, 1, CV_64F)?.to_mat()?;
        for i in 0..3 {
            *mat.at_2d_mut::<f64>(i as i32, 0)? = self.0[i];
        }
        Ok(mat)
    }
}

/// 任意长度的系数向量（畸变系数）
#[derive(Debug, Clone, Default)]
pub struct VectorXd(pub Vec<f64>);

impl TryFrom<&Mat> for VectorXd {
    type Error = CalibError;
    fn try_from(mat: &Mat) -> Result<Self> {
        if mat.empty() {
            return Ok(VectorXd(Vec::new()));
        }
        if mat.rows() != 1 && mat.cols() != 1 {
            return Err(CalibError::MatShape {
                expected: "1xN",
                rows: mat.rows(),
                cols: mat.cols(),
            });
        }
        let mat = to_f64(mat)?;
        let coeffs = (0..mat.rows() * mat.cols())
            .map(|i| mat.at::<f64>(i).copied())
            .collect::<opencv::Result<Vec<f64>>>()?;
        Ok(VectorXd(coeffs))
    }
}

impl VectorXd {
    /// 转换为 1xN 的 [Mat]
    pub fn to_mat(&self) -> Result<Mat> {
        if self.0.is_empty() {
            return Ok(Mat::default());
        }
        Ok(Mat::from_slice_2d(&[self.0.as_slice()])?)
    }
}
