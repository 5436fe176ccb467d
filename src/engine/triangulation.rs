use crate::domain::model::{Anchor, Coordinate};
use crate::engine::geodesy::{bearing_deg, distance_m};
use serde::Serialize;

/// 訓練資料表的基礎欄位
pub const BASE_FEATURE_COLUMNS: [&str; 2] = ["g_lat", "g_lng"];

/// 最近三個錨點的 (距離, 方位角) 欄位，順序與 `anchor_features` 輸出一致
pub const ANCHOR_FEATURE_COLUMNS: [&str; 6] = [
    "anchor1_dist",
    "anchor1_bear",
    "anchor2_dist",
    "anchor2_bear",
    "anchor3_dist",
    "anchor3_bear",
];

/// 模型是否需要錨點特徵，以此欄位判斷
pub const ANCHOR_MARKER_COLUMN: &str = "anchor1_dist";

pub const NEAREST_ANCHORS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorRelation {
    pub anchor: String,
    pub distance_m: f64,
    pub bearing_deg: f64,
}

/// 所有錨點依距離由近到遠排序（穩定排序）
pub fn rank_anchors(point: Coordinate, anchors: &[Anchor]) -> Vec<AnchorRelation> {
    let mut relations: Vec<AnchorRelation> = anchors
        .iter()
        .map(|a| AnchorRelation {
            anchor: a.name().to_string(),
            distance_m: distance_m(point, a.position()),
            bearing_deg: bearing_deg(point, a.position()),
        })
        .collect();
    relations.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    relations
}

/// `(d1, b1, d2, b2, d3, b3)`。錨點少於三個時回傳全零。
pub fn anchor_features(point: Coordinate, anchors: &[Anchor]) -> [f64; 6] {
    if anchors.len() < NEAREST_ANCHORS {
        return [0.0; 6];
    }

    let ranked = rank_anchors(point, anchors);
    let mut features = [0.0; 6];
    for (i, relation) in ranked.iter().take(NEAREST_ANCHORS).enumerate() {
        features[i * 2] = relation.distance_m;
        features[i * 2 + 1] = relation.bearing_deg;
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seoul_anchors() -> Vec<Anchor> {
        vec![
            Anchor::new("seoul-station", Coordinate::unchecked(37.5547, 126.9707)),
            Anchor::new("seongsu", Coordinate::unchecked(37.5446, 127.0559)),
            Anchor::new("gangnam", Coordinate::unchecked(37.4979, 127.0276)),
        ]
    }

    #[test]
    fn test_three_anchors_sorted_with_recomputed_bearings() {
        let point = Coordinate::unchecked(37.5442, 127.0499);
        let anchors = seoul_anchors();
        let features = anchor_features(point, &anchors);

        // seongsu < gangnam < seoul-station
        let expected = [&anchors[1], &anchors[2], &anchors[0]];
        for (i, anchor) in expected.iter().enumerate() {
            let d = distance_m(point, anchor.position());
            let b = bearing_deg(point, anchor.position());
            assert!((features[i * 2] - d).abs() < 1e-9);
            assert!((features[i * 2 + 1] - b).abs() < 1e-9);
        }
        assert!(features[0] <= features[2] && features[2] <= features[4]);
    }

    #[test]
    fn test_fewer_than_three_anchors_is_zero_filled() {
        let point = Coordinate::unchecked(37.5442, 127.0499);
        let anchors = seoul_anchors();
        assert_eq!(anchor_features(point, &anchors[..2]), [0.0; 6]);
        assert_eq!(anchor_features(point, &[]), [0.0; 6]);
    }

    #[test]
    fn test_only_nearest_three_are_used() {
        let point = Coordinate::unchecked(37.5442, 127.0499);
        let mut anchors = seoul_anchors();
        anchors.push(Anchor::new("busan", Coordinate::unchecked(35.1796, 129.0756)));
        let ranked = rank_anchors(point, &anchors);
        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked[3].anchor, "busan");

        let features = anchor_features(point, &anchors);
        assert!(features[4] < ranked[3].distance_m);
    }
}
