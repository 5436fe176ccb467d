use crate::domain::model::{CompetitorCandidate, Coordinate, PoiStatus, PoiVerdict};
use crate::engine::geodesy::distance_m;
use crate::engine::similarity::name_similarity;

pub const VERIFIED_RADIUS_M: f64 = 50.0;
pub const WARNING_RADIUS_M: f64 = 500.0;
pub const NAME_MATCH_THRESHOLD: f64 = 0.4;

/// 比對主要來源的地點與競爭來源的候選，判斷該地點是否仍在營業。
pub fn classify(
    google_name: &str,
    google_point: Coordinate,
    competitor: Option<&CompetitorCandidate>,
) -> PoiVerdict {
    let Some((title, naver_point)) =
        competitor.and_then(|c| c.location.map(|loc| (c.title.as_str(), loc)))
    else {
        return PoiVerdict {
            status: PoiStatus::NotFound,
            confidence: 0.85,
            reason: "not registered on competing source (presumed closed)".to_string(),
            name_similarity: None,
            distance_m: None,
        };
    };

    let dist = distance_m(google_point, naver_point);
    let similarity = name_similarity(google_name, title);
    classify_signals(dist, similarity)
}

/// 由距離與名稱相似度兩個訊號決定判定結果
pub fn classify_signals(dist: f64, similarity: f64) -> PoiVerdict {
    let name_matches = similarity >= NAME_MATCH_THRESHOLD;

    let (status, confidence, reason) = if dist <= VERIFIED_RADIUS_M && name_matches {
        (
            PoiStatus::Verified,
            (0.7 + similarity * 0.3).min(1.0),
            "cross-source confirmed".to_string(),
        )
    } else if dist <= WARNING_RADIUS_M {
        if name_matches {
            (
                PoiStatus::Warning,
                (0.8 - dist / 1000.0).max(0.4),
                format!("location mismatch at {:.0}m (possible relocation)", dist),
            )
        } else {
            (
                PoiStatus::Warning,
                (0.7 - dist / 1000.0).max(0.3),
                format!("name mismatch (similarity {:.0}%)", similarity * 100.0),
            )
        }
    } else {
        (
            PoiStatus::NotFound,
            0.8,
            format!("distance exceeds {:.0}m (presumed closed)", WARNING_RADIUS_M),
        )
    };

    PoiVerdict {
        status,
        confidence,
        reason,
        name_similarity: Some(similarity),
        distance_m: Some(dist),
    }
}
