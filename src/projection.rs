//! OpenGL 风格的投影矩阵
//!
//! 由相机内参、视口和裁剪面构造，使渲染的虚拟物体与真实相机视场一致。

use nalgebra::Matrix4;

use crate::calibration::CameraIntrinsics;
use crate::config::{FAR_PLANE, NEAR_PLANE};
use crate::error::{CalibError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlanes {
    pub near: f64,
    pub far: f64,
}

impl Default for ClipPlanes {
    fn default() -> Self {
        Self {
            near: NEAR_PLANE,
            far: FAR_PLANE,
        }
    }
}

/// `rows[i]` 即矩阵列表中的第 i 行。
///
/// 按行顺序展开得到的 16 个浮点数就是 OpenGL 上传用的列主序数组。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionMatrix {
    pub rows: [[f64; 4]; 4],
}

impl ProjectionMatrix {
    pub fn as_gl_array(&self) -> [f32; 16] {
        let mut out = [0f32; 16];
        for (i, v) in self.rows.iter().flatten().enumerate() {
            out[i] = *v as f32;
        }
        out
    }

    /// 数学意义上的矩阵（列向量约定），即列表的转置
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        Matrix4::from_fn(|r, c| self.rows[c][r])
    }
}

pub fn build_projection_matrix(
    intrinsics: &CameraIntrinsics,
    viewport: Viewport,
    clip: ClipPlanes,
) -> Result<ProjectionMatrix> {
    build_projection_matrix_from(
        intrinsics.fx(),
        intrinsics.fy(),
        intrinsics.cx(),
        intrinsics.cy(),
        viewport,
        clip,
    )
}

pub fn build_projection_matrix_from(
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    viewport: Viewport,
    clip: ClipPlanes,
) -> Result<ProjectionMatrix> {
    let Viewport { width, height } = viewport;
    let ClipPlanes { near, far } = clip;
    if !(width > 0.0 && height > 0.0) || far == near {
        return Err(CalibError::InvalidViewport);
    }
    let depth = far - near;

    Ok(ProjectionMatrix {
        rows: [
            [-2.0 * fx / width, 0.0, 0.0, 0.0],
            [0.0, 2.0 * fy / height, 0.0, 0.0],
            [
                2.0 * cx / width - 1.0,
                2.0 * cy / height - 1.0,
                -(far + near) / depth,
                -1.0,
            ],
            [0.0, 0.0, -2.0 * far * near / depth, 0.0],
        ],
    })
}
