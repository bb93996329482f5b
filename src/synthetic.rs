//! 测试用的合成棋盘格数据
//!
//! 棋盘纹理通过单应矩阵 `H = K [r1 r2 t] A^-1` 投影到 640x480 的灰度图中，
//! 其中 `A` 把标定板坐标映射到纹理像素坐标。

use nalgebra::{Matrix3, Rotation3, Vector3};
use opencv::{
    core::{Mat, Point2f, Rect, Scalar, Size, Vector, BORDER_CONSTANT, CV_8UC1},
    imgproc,
    prelude::*,
};

use crate::global_cast::Matrix3d;
use crate::pattern::ChessboardPattern;

/// 纹理中每个方格的像素数
const SQUARE_PX: i32 = 40;
/// 标定板中心到相机的距离（以方格边长为单位）
const DISTANCE: f64 = 20.0;

pub fn pattern() -> ChessboardPattern {
    ChessboardPattern::new(6, 9, 25.0)
}

pub fn image_size() -> Size {
    Size::new(640, 480)
}

pub fn camera_matrix() -> Matrix3<f64> {
    Matrix3::new(800.0, 0.0, 320.0, 0.0, 800.0, 240.0, 0.0, 0.0, 1.0)
}

/// 标定板 X 轴沿图像向下，Y 轴沿图像向右，板面朝向相机
fn base_rotation() -> Rotation3<f64> {
    Rotation3::from_matrix_unchecked(Matrix3::new(
        0.0, 1.0, 0.0, //
        1.0, 0.0, 0.0, //
        0.0, 0.0, -1.0,
    ))
}

/// 十个不同朝向的标定板位姿（board -> camera）
pub fn view_poses(pattern: &ChessboardPattern) -> Vec<(Rotation3<f64>, Vector3<f64>)> {
    let s = pattern.square_size as f64;
    let center = Vector3::new(
        (pattern.rows - 1) as f64 * s / 2.0,
        (pattern.cols - 1) as f64 * s / 2.0,
        0.0,
    );
    // (roll, pitch, yaw, dx, dy)
    let views = [
        (0.35, 0.0, 0.0, 0.0, 0.0),
        (-0.35, 0.0, 0.0, 0.5, -0.5),
        (0.0, 0.4, 0.0, -0.5, 0.5),
        (0.0, -0.4, 0.0, 0.5, 0.5),
        (0.3, 0.3, 0.0, -1.0, 0.0),
        (-0.3, 0.3, 0.1, 1.0, 0.0),
        (0.3, -0.3, -0.1, 0.0, 1.0),
        (-0.3, -0.3, 0.0, 0.0, -1.0),
        (0.25, 0.1, 0.3, 0.5, 0.0),
        (-0.1, -0.25, -0.3, -0.5, 0.0),
    ];
    views
        .iter()
        .map(|&(roll, pitch, yaw, dx, dy)| {
            let rotation = Rotation3::from_euler_angles(roll, pitch, yaw) * base_rotation();
            let translation = Vector3::new(dx * s, dy * s, DISTANCE * s) - rotation * center;
            (rotation, translation)
        })
        .collect()
}

/// 标定板坐标 -> 纹理像素坐标
fn board_to_texture(pattern: &ChessboardPattern) -> Matrix3<f64> {
    let scale = SQUARE_PX as f64 / pattern.square_size as f64;
    let origin = 2.0 * SQUARE_PX as f64 - 0.5;
    Matrix3::new(
        0.0, scale, origin, //
        scale, 0.0, origin, //
        0.0, 0.0, 1.0,
    )
}

/// 纹理像素坐标 -> 图像像素坐标
fn texture_to_image(
    pattern: &ChessboardPattern,
    k: &Matrix3<f64>,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Matrix3<f64> {
    let r = rotation.matrix();
    let extrinsic = Matrix3::from_columns(&[
        r.column(0).clone_owned(),
        r.column(1).clone_owned(),
        *translation,
    ]);
    let a_inv = board_to_texture(pattern).try_inverse().unwrap();
    k * extrinsic * a_inv
}

fn texture(pattern: &ChessboardPattern) -> Mat {
    let width = (pattern.cols + 3) * SQUARE_PX;
    let height = (pattern.rows + 3) * SQUARE_PX;
    let mut texture =
        Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(255.)).unwrap();
    for r in 0..=pattern.rows {
        for c in 0..=pattern.cols {
            if (r + c) % 2 != 0 {
                continue;
            }
            imgproc::rectangle(
                &mut texture,
                Rect::new((c + 1) * SQUARE_PX, (r + 1) * SQUARE_PX, SQUARE_PX, SQUARE_PX),
                Scalar::all(0.),
                imgproc::FILLED,
                imgproc::LINE_8,
                0,
            )
            .unwrap();
        }
    }
    texture
}

/// 渲染一帧 640x480 的灰度图像
pub fn render_view(
    pattern: &ChessboardPattern,
    k: &Matrix3<f64>,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Mat {
    let h = Matrix3d(texture_to_image(pattern, k, rotation, translation))
        .to_mat()
        .unwrap();
    let mut image = Mat::default();
    imgproc::warp_perspective(
        &texture(pattern),
        &mut image,
        &h,
        image_size(),
        imgproc::INTER_LINEAR,
        BORDER_CONSTANT,
        Scalar::all(255.),
    )
    .unwrap();
    image
}

/// 渲染图像中内角点的真实位置（纹理坐标系顺序）
pub fn texture_corners_in_image(
    pattern: &ChessboardPattern,
    k: &Matrix3<f64>,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Vec<Point2f> {
    let h = texture_to_image(pattern, k, rotation, translation);
    let origin = 2.0 * SQUARE_PX as f64 - 0.5;
    let mut corners = Vec::with_capacity(pattern.corner_count());
    for i in 0..pattern.rows {
        for j in 0..pattern.cols {
            let p = h * Vector3::new(
                origin + (j * SQUARE_PX) as f64,
                origin + (i * SQUARE_PX) as f64,
                1.0,
            );
            corners.push(Point2f::new((p.x / p.z) as f32, (p.y / p.z) as f32));
        }
    }
    corners
}

/// 无畸变针孔投影 `pattern.object_points()`
pub fn project(
    pattern: &ChessboardPattern,
    k: &Matrix3<f64>,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Vector<Point2f> {
    pattern
        .object_points()
        .iter()
        .map(|p| {
            let camera = rotation * Vector3::new(p.x as f64, p.y as f64, p.z as f64) + translation;
            let pixel = k * camera;
            Point2f::new((pixel.x / pixel.z) as f32, (pixel.y / pixel.z) as f32)
        })
        .collect()
}
