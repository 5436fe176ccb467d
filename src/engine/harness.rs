//! 地標批次評估與單點精修報告
//!
//! 批次評估不呼叫推理服務，只量測兩個圖資來源之間的原始誤差。

use crate::domain::model::{CorrectionIteration, Coordinate};
use crate::domain::ports::ReasoningService;
use crate::engine::geodesy::{distance_m, harness_score, rmse_m};
use crate::engine::refinement::{RefinementLoop, RefinementRequest, RefinementStatus};
use crate::utils::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 地面真值比對容許誤差（度）
pub const GROUND_TRUTH_TOLERANCE_DEG: f64 = 1e-4;
pub const SUB_FIVE_METER_THRESHOLD: f64 = 5.0;

/// 找不到對應地標時使用的假地面真值偏移
const DUMMY_LAT_NUDGE: f64 = 0.00001;
const DUMMY_LNG_NUDGE: f64 = -0.00001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub google_coords: Coordinate,
    pub naver_coords: Coordinate,
}

pub fn load_landmarks(path: impl AsRef<Path>) -> Result<Vec<Landmark>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let landmarks: Vec<Landmark> = serde_json::from_str(&content)?;
    tracing::info!("📍 Loaded {} landmarks from {}", landmarks.len(), path.display());
    Ok(landmarks)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundTruth {
    pub position: Coordinate,
    pub source: String,
}

/// 兩軸都在容許誤差內的第一個地標提供地面真值；否則回傳 `None`
pub fn find_ground_truth(point: Coordinate, landmarks: &[Landmark]) -> Option<GroundTruth> {
    landmarks
        .iter()
        .find(|lm| {
            (lm.google_coords.lat() - point.lat()).abs() < GROUND_TRUTH_TOLERANCE_DEG
                && (lm.google_coords.lng() - point.lng()).abs() < GROUND_TRUTH_TOLERANCE_DEG
        })
        .map(|lm| GroundTruth {
            position: lm.naver_coords,
            source: lm.name.clone(),
        })
}

/// 地標比對不到時以微小偏移當作地面真值
pub fn ground_truth_or_dummy(point: Coordinate, landmarks: &[Landmark]) -> GroundTruth {
    find_ground_truth(point, landmarks).unwrap_or_else(|| GroundTruth {
        position: point.offset(DUMMY_LAT_NUDGE, DUMMY_LNG_NUDGE),
        source: "dummy".to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandmarkScore {
    pub label: String,
    pub rmse_m: f64,
    pub harness_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub avg_rmse_m: f64,
    pub max_rmse_m: f64,
    pub min_rmse_m: f64,
    pub avg_harness_score: f64,
    pub all_under_5m: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<LandmarkScore>,
    pub summary: BatchSummary,
}

pub fn evaluate_landmarks(landmarks: &[Landmark]) -> Result<BatchReport> {
    if landmarks.is_empty() {
        return Err(GeoError::EmptyInput {
            what: "landmark set".to_string(),
        });
    }

    let mut results = Vec::with_capacity(landmarks.len());
    for lm in landmarks {
        let rmse = rmse_m(&[lm.google_coords], &[lm.naver_coords])?;
        results.push(LandmarkScore {
            label: lm.name.clone(),
            rmse_m: rmse,
            harness_score: harness_score(rmse),
        });
    }

    let count = results.len() as f64;
    let total_rmse: f64 = results.iter().map(|r| r.rmse_m).sum();
    let total_score: f64 = results.iter().map(|r| f64::from(r.harness_score)).sum();
    let summary = BatchSummary {
        total: results.len(),
        avg_rmse_m: total_rmse / count,
        max_rmse_m: results.iter().map(|r| r.rmse_m).fold(f64::MIN, f64::max),
        min_rmse_m: results.iter().map(|r| r.rmse_m).fold(f64::MAX, f64::min),
        avg_harness_score: total_score / count,
        all_under_5m: results.iter().all(|r| r.rmse_m < SUB_FIVE_METER_THRESHOLD),
    };

    tracing::info!(
        "📊 Evaluated {} landmarks: avg RMSE {:.2}m, avg score {:.1}",
        summary.total,
        summary.avg_rmse_m,
        summary.avg_harness_score
    );
    Ok(BatchReport { results, summary })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarnessReport {
    pub rmse_before_m: f64,
    pub rmse_after_m: f64,
    pub harness_score: u8,
    pub iterations: usize,
    pub corrections: Vec<CorrectionIteration>,
    pub reasoning: Option<String>,
    pub status: RefinementStatus,
}

/// 先量測初始誤差，再跑精修迴圈。沒有設定推理服務時只回報初始誤差。
pub struct HarnessRunner<R: ReasoningService> {
    refinement: Option<RefinementLoop<R>>,
    max_iterations: u32,
}

impl<R: ReasoningService> HarnessRunner<R> {
    pub fn new(refinement: Option<RefinementLoop<R>>, max_iterations: u32) -> Self {
        Self {
            refinement,
            max_iterations,
        }
    }

    pub async fn run(&self, label: &str, point: Coordinate, ground_truth: Coordinate) -> HarnessReport {
        let request =
            RefinementRequest::new(label, point, ground_truth).with_max_iterations(self.max_iterations);

        let Some(refinement) = &self.refinement else {
            tracing::warn!("No reasoning service configured, reporting baseline only");
            let baseline = distance_m(point, ground_truth);
            return HarnessReport {
                rmse_before_m: baseline,
                rmse_after_m: baseline,
                harness_score: harness_score(baseline),
                iterations: 0,
                corrections: Vec::new(),
                reasoning: None,
                status: RefinementStatus::Skipped,
            };
        };

        let before = refinement.run(&request.baseline()).await;
        let after = refinement.run(&request).await;

        HarnessReport {
            rmse_before_m: before.final_error_m,
            rmse_after_m: after.final_error_m,
            harness_score: after.harness_score,
            iterations: after.iterations.len(),
            corrections: after.iterations,
            reasoning: after.reasoning,
            status: after.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ReasoningFailure;
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct NeverCalled;

    #[async_trait]
    impl ReasoningService for NeverCalled {
        async fn generate(&self, _s: &str, _u: &str) -> std::result::Result<String, ReasoningFailure> {
            Err(ReasoningFailure::EmptyResponse)
        }
    }

    fn landmark(name: &str, google: (f64, f64), naver: (f64, f64)) -> Landmark {
        Landmark {
            name: name.to_string(),
            google_coords: Coordinate::unchecked(google.0, google.1),
            naver_coords: Coordinate::unchecked(naver.0, naver.1),
        }
    }

    #[test]
    fn test_load_landmarks_from_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "서울숲", "google_coords": {{"lat": 37.5444, "lng": 127.0374}},
                 "naver_coords": {{"lat": 37.5445, "lng": 127.0375}}}}]"#
        )
        .unwrap();

        let landmarks = load_landmarks(file.path()).unwrap();
        assert_eq!(landmarks.len(), 1);
        assert_eq!(landmarks[0].name, "서울숲");
        assert_eq!(landmarks[0].naver_coords.lng(), 127.0375);
    }

    #[test]
    fn test_empty_landmark_set_is_rejected() {
        assert!(matches!(evaluate_landmarks(&[]), Err(GeoError::EmptyInput { .. })));
    }

    #[test]
    fn test_batch_summary() {
        let landmarks = vec![
            landmark("identical", (37.5444, 127.0374), (37.5444, 127.0374)),
            // 緯度差 0.0001° ≈ 11.1m
            landmark("shifted", (37.5000, 127.0000), (37.5001, 127.0000)),
        ];
        let report = evaluate_landmarks(&landmarks).unwrap();

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.min_rmse_m, 0.0);
        assert!((report.summary.max_rmse_m - 11.1195).abs() < 1e-3);
        assert!(!report.summary.all_under_5m);
        assert_eq!(report.results[0].harness_score, 100);
        assert_eq!(report.results[1].harness_score, 0);
        assert_eq!(report.summary.avg_harness_score, 50.0);
    }

    #[test]
    fn test_ground_truth_lookup_tolerance() {
        let landmarks = vec![landmark("성수역", (37.5446, 127.0559), (37.5447, 127.0560))];

        let hit = find_ground_truth(Coordinate::unchecked(37.54465, 127.05595), &landmarks).unwrap();
        assert_eq!(hit.source, "성수역");
        assert_eq!(hit.position, Coordinate::unchecked(37.5447, 127.0560));

        assert!(find_ground_truth(Coordinate::unchecked(37.5448, 127.0559), &landmarks).is_none());

        let dummy = ground_truth_or_dummy(Coordinate::unchecked(37.5, 127.0), &landmarks);
        assert_eq!(dummy.source, "dummy");
    }

    #[tokio::test]
    async fn test_runner_without_service_reports_skipped_baseline() {
        let runner: HarnessRunner<NeverCalled> = HarnessRunner::new(None, 2);
        let start = Coordinate::unchecked(37.5000, 127.0000);
        let truth = Coordinate::unchecked(37.5001, 127.0000);
        let report = runner.run("API Request Point", start, truth).await;

        assert_eq!(report.status, RefinementStatus::Skipped);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.rmse_before_m, report.rmse_after_m);
        assert!(report.rmse_before_m > 11.0);
    }

    #[tokio::test]
    async fn test_runner_reports_service_failure() {
        let runner = HarnessRunner::new(Some(RefinementLoop::new(NeverCalled)), 2);
        let start = Coordinate::unchecked(37.5000, 127.0000);
        let truth = Coordinate::unchecked(37.5001, 127.0000);
        let report = runner.run("API Request Point", start, truth).await;

        assert_eq!(report.status, RefinementStatus::TimeoutOrError);
        assert_eq!(report.iterations, 0);
        assert!((report.rmse_before_m - report.rmse_after_m).abs() < 1e-9);
    }
}
