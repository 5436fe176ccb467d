use crate::domain::model::{round_to, CorrectionDetails, CorrectionMethod, CorrectionResult, Coordinate};
use crate::domain::ports::Projection;
use crate::engine::geodesy::{distance_m, harness_score};
use crate::engine::model_store::{ModelBundle, ModelStore};
use crate::engine::projection::KoreaTm;
use crate::utils::error::PredictorError;
use serde::Serialize;
use std::sync::Arc;

/// 預測座標修正向量。
///
/// 決策順序：ML 模型 → EPSG:5179 投影往返 → 原座標。
/// 任何失敗都只會降低信心值，不會回傳錯誤。
/// 輸入座標須由呼叫端先檢查是否在韓國範圍內。
pub struct InferenceEngine<P: Projection = KoreaTm> {
    store: Arc<ModelStore>,
    projection: P,
}

impl InferenceEngine<KoreaTm> {
    pub fn new(store: Arc<ModelStore>) -> Self {
        Self::with_projection(store, KoreaTm::epsg5179())
    }
}

impl<P: Projection> InferenceEngine<P> {
    pub fn with_projection(store: Arc<ModelStore>, projection: P) -> Self {
        Self { store, projection }
    }

    pub fn model_store(&self) -> &ModelStore {
        &self.store
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn predict_offset(&self, point: Coordinate) -> CorrectionResult {
        if let Some(bundle) = self.store.get_bundle() {
            match predict_with_bundle(&bundle, point) {
                Ok(result) => return result,
                Err(e) => tracing::error!("ML inference failed, falling back to projection: {}", e),
            }
        }
        self.fallback(point)
    }

    fn fallback(&self, point: Coordinate) -> CorrectionResult {
        let round_trip = self
            .projection
            .forward(point)
            .and_then(|projected| Ok((projected, self.projection.inverse(projected)?)));

        match round_trip {
            Ok((projected, back)) => CorrectionResult::projected(back, projected.x, projected.y),
            Err(e) => {
                tracing::error!("Projection fallback failed: {}", e);
                CorrectionResult::identity(point, e.to_string())
            }
        }
    }

    /// 修正後再與原座標比較，回報位移距離與 harness 分數
    pub fn verify_location(&self, point: Coordinate, poi_name: &str) -> LocationCheck {
        let correction = self.predict_offset(point);
        let offset = distance_m(point, correction.corrected);
        LocationCheck {
            poi_name: poi_name.to_string(),
            original: point,
            corrected: correction.corrected,
            method: correction.method,
            confidence: correction.confidence,
            offset_distance_m: round_to(offset, 2),
            harness_score: harness_score(offset),
        }
    }
}

fn predict_with_bundle(
    bundle: &ModelBundle,
    point: Coordinate,
) -> Result<CorrectionResult, PredictorError> {
    let features = bundle.feature_vector(point);
    if features.len() != bundle.feature_columns.len() {
        return Err(PredictorError::ShapeMismatch {
            expected: bundle.feature_columns.len(),
            actual: features.len(),
        });
    }

    let delta_lng = bundle.predictor_lng.predict(&features)?;
    let delta_lat = bundle.predictor_lat.predict(&features)?;
    let corrected = point.offset(delta_lat, delta_lng);
    let confidence = (1.0 - (bundle.rmse_lng + bundle.rmse_lat) / 2.0)
        .max(0.5)
        .min(1.0);

    Ok(CorrectionResult::ml(
        corrected,
        confidence,
        CorrectionDetails::Ml {
            delta_lng: round_to(delta_lng, 8),
            delta_lat: round_to(delta_lat, 8),
            model_rmse_lng: bundle.rmse_lng,
            model_rmse_lat: bundle.rmse_lat,
            n_training_samples: bundle.sample_count,
            gpu_trained: bundle.gpu_trained,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCheck {
    pub poi_name: String,
    pub original: Coordinate,
    pub corrected: Coordinate,
    pub method: CorrectionMethod,
    pub confidence: f64,
    pub offset_distance_m: f64,
    pub harness_score: u8,
}
