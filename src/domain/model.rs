use crate::utils::error::{GeoError, Result};
use serde::{Deserialize, Serialize};

pub const KOREA_LAT_RANGE: (f64, f64) = (33.0, 43.0);
pub const KOREA_LNG_RANGE: (f64, f64) = (124.0, 132.0);

/// WGS84 座標（度）。建立後不可變。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    /// 建立座標並檢查是否落在韓國範圍內
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let point = Self { lat, lng };
        if point.is_within_korea() {
            Ok(point)
        } else {
            Err(GeoError::OutOfCoverage { lat, lng })
        }
    }

    /// 不做範圍檢查。用於模型錨點與內部偏移計算。
    pub const fn unchecked(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn is_within_korea(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (KOREA_LAT_RANGE.0..=KOREA_LAT_RANGE.1).contains(&self.lat)
            && (KOREA_LNG_RANGE.0..=KOREA_LNG_RANGE.1).contains(&self.lng)
    }

    pub fn offset(&self, lat_offset: f64, lng_offset: f64) -> Self {
        Self {
            lat: self.lat + lat_offset,
            lng: self.lng + lng_offset,
        }
    }
}

/// 固定的地面真值參考點
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(default)]
    name: String,
    #[serde(flatten)]
    position: Coordinate,
}

impl Anchor {
    pub fn new(name: impl Into<String>, position: Coordinate) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Coordinate {
        self.position
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    Ml,
    FallbackProjection,
    Identity,
}

impl CorrectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionMethod::Ml => "ml",
            CorrectionMethod::FallbackProjection => "fallback_projection",
            CorrectionMethod::Identity => "identity",
        }
    }
}

/// 每種修正路徑各自的診斷資訊
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorrectionDetails {
    Ml {
        delta_lng: f64,
        delta_lat: f64,
        model_rmse_lng: f64,
        model_rmse_lat: f64,
        n_training_samples: u64,
        gpu_trained: Option<bool>,
    },
    Projection {
        tm_x: f64,
        tm_y: f64,
        note: String,
    },
    Identity {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionResult {
    pub corrected: Coordinate,
    pub method: CorrectionMethod,
    pub confidence: f64,
    pub details: CorrectionDetails,
}

impl CorrectionResult {
    pub fn ml(corrected: Coordinate, confidence: f64, details: CorrectionDetails) -> Self {
        Self {
            corrected,
            method: CorrectionMethod::Ml,
            confidence,
            details,
        }
    }

    pub fn projected(corrected: Coordinate, tm_x: f64, tm_y: f64) -> Self {
        Self {
            corrected,
            method: CorrectionMethod::FallbackProjection,
            confidence: 0.6,
            details: CorrectionDetails::Projection {
                tm_x: round_to(tm_x, 4),
                tm_y: round_to(tm_y, 4),
                note: "no learned correction available; pure EPSG:5179 round trip".to_string(),
            },
        }
    }

    pub fn identity(original: Coordinate, error: impl Into<String>) -> Self {
        Self {
            corrected: original,
            method: CorrectionMethod::Identity,
            confidence: 0.0,
            details: CorrectionDetails::Identity {
                error: error.into(),
            },
        }
    }
}

/// 精修迴圈的一步，依序累積
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionIteration {
    pub index: u32,
    pub lat_offset: f64,
    pub lng_offset: f64,
    pub confidence: f64,
    pub rmse_after_m: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiStatus {
    Verified,
    Warning,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiVerdict {
    pub status: PoiStatus,
    pub confidence: f64,
    pub reason: String,
    pub name_similarity: Option<f64>,
    pub distance_m: Option<f64>,
}

/// 競爭圖資來源（地區搜尋）回傳的候選地點
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorCandidate {
    pub title: String,
    pub location: Option<Coordinate>,
}

/// 地區搜尋 API 的原始項目。mapx/mapy 為 WGS84 × 10^7，可能是字串或數字。
#[derive(Debug, Clone, Deserialize)]
pub struct LocalSearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mapx: Option<serde_json::Value>,
    #[serde(default)]
    pub mapy: Option<serde_json::Value>,
}

const LOCAL_SEARCH_SCALE: f64 = 1e7;

impl CompetitorCandidate {
    pub fn from_local_search_item(item: &LocalSearchItem) -> Self {
        let title = item.title.replace("<b>", "").replace("</b>", "");
        let lng = item.mapx.as_ref().and_then(scaled_degrees);
        let lat = item.mapy.as_ref().and_then(scaled_degrees);

        let location = match (lat, lng) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng).ok(),
            _ => None,
        };
        if location.is_none() {
            tracing::debug!("Competitor item '{}' has no usable coordinate", title);
        }
        Self { title, location }
    }
}

fn scaled_degrees(raw: &serde_json::Value) -> Option<f64> {
    let value = match raw {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(value / LOCAL_SEARCH_SCALE)
}

/// 主要圖資來源的文字搜尋結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub name: String,
    pub address: String,
    pub place_id: String,
    #[serde(default)]
    pub types: Vec<String>,
    pub rating: Option<f64>,
    pub location: Coordinate,
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
