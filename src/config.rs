/// 棋盘格内角点：每行的角点数（宽）
pub const BOARD_COLS: i32 = 9;
/// 棋盘格内角点：行数（高）
pub const BOARD_ROWS: i32 = 6;
/// 棋盘格方格边长，单位由调用方决定
pub const SQUARE_SIZE: f32 = 1.0;

/// findChessboardCorners 的检测策略：自适应阈值 + 四边形过滤
pub const CHESSBOARD_FLAGS: i32 =
    opencv::calib3d::CALIB_CB_ADAPTIVE_THRESH | opencv::calib3d::CALIB_CB_FILTER_QUADS;

/// 亚像素角点搜索窗口（半宽为 5）
pub const SUBPIX_WINDOW: i32 = 5;
/// 最大迭代次数
pub const SUBPIX_MAX_ITER: i32 = 30;
/// 收敛精度（像素）
pub const SUBPIX_EPSILON: f64 = 0.1;

/// PnP 求解所需的最少点数
pub const MIN_PNP_POINTS: usize = 4;

/// 默认近裁剪面
pub const NEAR_PLANE: f64 = 0.1;
/// 默认远裁剪面
pub const FAR_PLANE: f64 = 100.0;

/// 实时标定时两次采集之间的最小间隔（秒）
pub const CALIBRATION_CAPTURE_INTERVAL: f64 = 1.0;

/// 演示程序的显示帧率
pub const FREQUENCY: i32 = 30;

/// Canny 边缘检测阈值
pub const CANNY_LOW: f64 = 30.0;
pub const CANNY_HIGH: f64 = 150.0;
