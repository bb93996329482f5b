use opencv::{
    core::Mat,
    imgproc::{COLOR_BGR2GRAY, COLOR_BGRA2GRAY},
    prelude::*,
};

use crate::error::{CalibError, Result};

/// 转换为灰度图
///
/// 支持 BGR、BGRA 和单通道输入；单通道图像直接复制。
pub fn convert_to_gray(image: &Mat) -> Result<Mat> {
    let code = match image.channels() {
        1 => return Ok(image.clone()),
        3 => COLOR_BGR2GRAY,
        4 => COLOR_BGRA2GRAY,
        n => return Err(CalibError::UnsupportedChannels(n)),
    };
    let mut gray = Mat::default();
    opencv::imgproc::cvt_color(image, &mut gray, code, 0)?;
    Ok(gray)
}
