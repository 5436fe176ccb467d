//! EPSG:5179（Korea 2000 / Unified CS）橫麥卡托投影。
//!
//! GRS80 橢球，原點 38°N 127.5°E，k0 = 0.9996，假東 1,000,000 m，假北 2,000,000 m。
//! 正反算使用 Snyder (USGS PP 1395) 的級數展開，在韓國範圍內往返誤差遠小於 1 mm。

use crate::domain::model::Coordinate;
use crate::domain::ports::{ProjectedPoint, Projection};
use crate::utils::error::{GeoError, Result};
use serde::Serialize;

const GRS80_A: f64 = 6_378_137.0;
const GRS80_INV_F: f64 = 298.257_222_101;

/// 離中央經線太遠時級數發散
const MAX_LONGITUDE_SPAN_DEG: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KoreaTm {
    a: f64,
    e2: f64,
    ep2: f64,
    k0: f64,
    lat0: f64,
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl Default for KoreaTm {
    fn default() -> Self {
        Self::epsg5179()
    }
}

impl KoreaTm {
    pub fn epsg5179() -> Self {
        let f = 1.0 / GRS80_INV_F;
        let e2 = f * (2.0 - f);
        Self {
            a: GRS80_A,
            e2,
            ep2: e2 / (1.0 - e2),
            k0: 0.9996,
            lat0: 38.0_f64.to_radians(),
            lon0: 127.5_f64.to_radians(),
            false_easting: 1_000_000.0,
            false_northing: 2_000_000.0,
        }
    }

    /// 赤道到緯度 phi 的子午線弧長
    fn meridian_arc(&self, phi: f64) -> f64 {
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        self.a
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }
}

impl Projection for KoreaTm {
    fn forward(&self, point: Coordinate) -> Result<ProjectedPoint> {
        if !point.lat().is_finite() || !point.lng().is_finite() {
            return Err(GeoError::ProjectionError {
                message: format!("non-finite coordinate ({}, {})", point.lat(), point.lng()),
            });
        }
        if point.lat().abs() >= 90.0 {
            return Err(GeoError::ProjectionError {
                message: format!("latitude {} is outside the projection domain", point.lat()),
            });
        }
        let d_lon = point.lng().to_radians() - self.lon0;
        if d_lon.to_degrees().abs() > MAX_LONGITUDE_SPAN_DEG {
            return Err(GeoError::ProjectionError {
                message: format!(
                    "longitude {} is too far from the central meridian",
                    point.lng()
                ),
            });
        }

        let phi = point.lat().to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let tan_phi = phi.tan();

        let n = self.a / (1.0 - self.e2 * sin_phi * sin_phi).sqrt();
        let t = tan_phi * tan_phi;
        let c = self.ep2 * cos_phi * cos_phi;
        let a = d_lon * cos_phi;
        let m = self.meridian_arc(phi);
        let m0 = self.meridian_arc(self.lat0);

        let x = self.k0
            * n
            * (a + (1.0 - t + c) * a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * self.ep2) * a.powi(5) / 120.0);
        let y = self.k0
            * (m - m0
                + n * tan_phi
                    * (a * a / 2.0
                        + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                        + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * self.ep2) * a.powi(6)
                            / 720.0));

        Ok(ProjectedPoint {
            x: self.false_easting + x,
            y: self.false_northing + y,
        })
    }

    fn inverse(&self, projected: ProjectedPoint) -> Result<Coordinate> {
        if !projected.x.is_finite() || !projected.y.is_finite() {
            return Err(GeoError::ProjectionError {
                message: format!("non-finite projected point ({}, {})", projected.x, projected.y),
            });
        }

        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        let x = projected.x - self.false_easting;
        let m = self.meridian_arc(self.lat0) + (projected.y - self.false_northing) / self.k0;

        let mu = m / (self.a * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
        let sqrt_1_e2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_1_e2) / (1.0 + sqrt_1_e2);
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin_phi1, cos_phi1) = phi1.sin_cos();
        let tan_phi1 = phi1.tan();
        let c1 = self.ep2 * cos_phi1 * cos_phi1;
        let t1 = tan_phi1 * tan_phi1;
        let w = 1.0 - e2 * sin_phi1 * sin_phi1;
        let n1 = self.a / w.sqrt();
        let r1 = self.a * (1.0 - e2) / w.powf(1.5);
        let d = x / (n1 * self.k0);

        let phi = phi1
            - (n1 * tan_phi1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * self.ep2) * d.powi(4)
                        / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * self.ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lambda = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * self.ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos_phi1;

        let result = Coordinate::unchecked(phi.to_degrees(), lambda.to_degrees());
        if !result.lat().is_finite() || !result.lng().is_finite() {
            return Err(GeoError::ProjectionError {
                message: "inverse projection produced a non-finite result".to_string(),
            });
        }
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionRoundTrip {
    pub epsg5179: ProjectedPoint,
    pub roundtrip: Coordinate,
}

/// WGS84 → EPSG:5179 → WGS84，用於檢查投影往返精度
pub fn transform_pipeline<P: Projection + ?Sized>(
    projection: &P,
    point: Coordinate,
) -> Result<ProjectionRoundTrip> {
    let projected = projection.forward(point)?;
    let roundtrip = projection.inverse(projected)?;
    Ok(ProjectionRoundTrip {
        epsg5179: projected,
        roundtrip,
    })
}
