//! 航向计算与数值舍入
//!
//! 所有对外发布的坐标/航向都保留 2 位小数，进度保留 1 位小数；
//! 内部累加始终使用完整浮点精度，只在发布时舍入。

/// 2^52：不小于该值的 f64 都是整数
const MAX_EXACT_FRACTION: f64 = 4_503_599_627_370_496.0;

/// 按指定小数位数四舍五入（远离零方向）
///
/// # Example
///
/// ```
/// use robosim_protocol::round_to;
///
/// assert_eq!(round_to(26.565051, 2), 26.57);
/// assert_eq!(round_to(99.96, 1), 100.0);
/// ```
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    // 超过 2^52 的浮点数已没有小数部分，放大还可能溢出为无穷
    if !scaled.is_finite() || scaled.abs() >= MAX_EXACT_FRACTION {
        return value + 0.0;
    }
    // + 0.0 把 -0.0 规范成 0.0
    scaled.round() / factor + 0.0
}

/// 计算位移方向的航向角（度）
///
/// 从 x 正半轴逆时针度量，归一化到 `[0, 360)` 并保留 2 位小数。
/// 舍入后恰好为 360 的值（如 -0.001°）折回 0。
pub fn heading_degrees(dx: f64, dy: f64) -> f64 {
    let mut angle = dy.atan2(dx).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }
    let rounded = round_to(angle, 2);
    if rounded >= 360.0 { 0.0 } else { rounded }
}
