/// 用法: ar-calib <标定图片目录> [图像目录 | EuRoC 数据集]
///
/// 先用目录中的棋盘格图片标定相机，保存参数，再逐帧估计棋盘格位姿并显示。
use std::path::{Path, PathBuf};

use anyhow::Context;
use opencv::{highgui, imgcodecs, prelude::*};

use ar_calib::camera::{CameraParametersTrait, PinholeParameters};
use ar_calib::config::FREQUENCY;
use ar_calib::dataset::{EuRoCDataset, ImageDirectory, ImageSequence};
use ar_calib::settings::CalibrationSettings;
use ar_calib::{ArSession, ChessboardPattern, IntrinsicsCalibrator};

fn open_sequence(path: &Path) -> anyhow::Result<Box<dyn ImageSequence>> {
    if path.join("mav0").is_dir() {
        Ok(Box::new(EuRoCDataset::new(path)?))
    } else {
        Ok(Box::new(ImageDirectory::new(path)?))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_nanos()
        .init();

    let mut args = std::env::args().skip(1);
    let calibration_dir = PathBuf::from(
        args.next()
            .context("usage: ar-calib <calibration images> [sequence]")?,
    );
    let sequence_path = args.next().map(PathBuf::from).unwrap_or(calibration_dir.clone());
    log::info!("calibration images: {:?}", calibration_dir);

    // calibration
    let pattern = ChessboardPattern::default();
    let images = ImageDirectory::new(&calibration_dir)?;
    let mut calibrator = IntrinsicsCalibrator::new();
    calibrator.add_from_files(&images.paths(), &pattern)?;
    let image_size = calibrator
        .image_size()
        .context("no chessboard found in calibration images")?;
    let rms = calibrator.calibrate(image_size)?;
    log::info!("rms reprojection error: {:.4}", rms);

    let intrinsics = calibrator
        .intrinsics()
        .context("calibration produced no intrinsics")?;
    let yaml_path = calibration_dir.join("camera.yaml");
    PinholeParameters::from_intrinsics("camera", image_size, intrinsics)
        .write_to_yaml(yaml_path.to_str().context("non utf-8 output path")?)?;
    CalibrationSettings::from_intrinsics(intrinsics)
        .save(calibration_dir.join("calibration.json"))?;

    // tracking
    let sequence = open_sequence(&sequence_path)?;
    let mut session = ArSession::new(pattern).with_calibrator(calibrator);
    session
        .pipeline_mut()
        .set_configuration(["undistort", "chessboard"]);

    for (timestamp, path) in sequence.frames() {
        let Some(name) = path.to_str() else {
            continue;
        };
        let img = imgcodecs::imread(name, imgcodecs::IMREAD_COLOR)?;
        if img.empty() {
            log::warn!("cannot read {}", name);
            continue;
        }
        let output = session.process_frame(&img)?;
        match &output.overlay {
            Some(overlay) => log::info!(
                "t = {:.3}: rvec = {:?}, tvec = {:?}",
                timestamp,
                overlay.pose.rvec.as_slice(),
                overlay.pose.tvec.as_slice()
            ),
            None => log::debug!("t = {:.3}: no pose", timestamp),
        }
        highgui::imshow("AR Calib", &output.image)?;
        highgui::wait_key(1000 / FREQUENCY)?;
    }
    Ok(())
}
