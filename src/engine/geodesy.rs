//! 大圓距離、方位角、RMSE 與 harness 分數

use crate::domain::model::Coordinate;
use crate::utils::error::{GeoError, Result};

/// 球體地球半徑（公尺）
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// RMSE 每公尺扣分
pub const HARNESS_MULTIPLIER: f64 = 10.0;
pub const HARNESS_MAX: f64 = 100.0;

/// Haversine 大圓距離（公尺）
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat().to_radians();
    let phi2 = b.lat().to_radians();
    let d_phi = (b.lat() - a.lat()).to_radians();
    let d_lambda = (b.lng() - a.lng()).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// 從 `from` 指向 `to` 的初始方位角，範圍 [0, 360)
pub fn bearing_deg(from: Coordinate, to: Coordinate) -> f64 {
    let phi1 = from.lat().to_radians();
    let phi2 = to.lat().to_radians();
    let d_lambda = (to.lng() - from.lng()).to_radians();

    let x = d_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    let deg = x.atan2(y).to_degrees().rem_euclid(360.0);
    // rem_euclid 對極小負值可能回傳 360.0
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

/// 成對座標列表的 RMSE（公尺）。兩個列表長度必須相同且非空。
pub fn rmse_m(predicted: &[Coordinate], truth: &[Coordinate]) -> Result<f64> {
    if predicted.len() != truth.len() || predicted.is_empty() {
        return Err(GeoError::LengthMismatch {
            predicted: predicted.len(),
            truth: truth.len(),
        });
    }

    let sum_sq: f64 = predicted
        .iter()
        .zip(truth)
        .map(|(p, t)| distance_m(*p, *t).powi(2))
        .sum();
    Ok((sum_sq / predicted.len() as f64).sqrt())
}

/// 0m → 100, 5m → 50, 10m 以上 → 0
pub fn harness_score(rmse_m: f64) -> u8 {
    let score = (HARNESS_MAX - rmse_m * HARNESS_MULTIPLIER).round();
    if score.is_nan() {
        return 0;
    }
    score.clamp(0.0, HARNESS_MAX) as u8
}
