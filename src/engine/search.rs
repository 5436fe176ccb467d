use crate::config::GeoConfig;
use crate::domain::model::{
    round_to, CompetitorCandidate, CorrectionMethod, Coordinate, PlaceCandidate, PoiVerdict,
};
use crate::domain::ports::{CompetitorProvider, PlaceProvider, Projection};
use crate::engine::cache::ResultCache;
use crate::engine::geodesy::distance_m;
use crate::engine::inference::InferenceEngine;
use crate::engine::projection::KoreaTm;
use crate::engine::survival;
use crate::utils::error::{GeoError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PLACES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMatch {
    pub name: String,
    pub address: String,
    pub place_id: String,
    pub types: Vec<String>,
    pub rating: Option<f64>,
    pub original: Coordinate,
    pub corrected: Coordinate,
    pub naver_location: Option<Coordinate>,
    pub sync_score: Option<f64>,
    pub correction_distance_m: f64,
    pub confidence: f64,
    pub method: CorrectionMethod,
    pub verdict: PoiVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub places: Vec<PlaceMatch>,
}

/// 文字搜尋 → 座標修正 → 跨來源存活判定，結果依查詢字串快取。
pub struct PlaceSearch<G, N, P: Projection = KoreaTm> {
    places: G,
    competitor: N,
    engine: InferenceEngine<P>,
    cache: ResultCache<SearchResponse>,
    max_places: usize,
    default_region: Option<String>,
}

impl<G, N, P> PlaceSearch<G, N, P>
where
    G: PlaceProvider,
    N: CompetitorProvider,
    P: Projection,
{
    pub fn new(
        places: G,
        competitor: N,
        engine: InferenceEngine<P>,
        cache: ResultCache<SearchResponse>,
    ) -> Self {
        Self {
            places,
            competitor,
            engine,
            cache,
            max_places: DEFAULT_MAX_PLACES,
            default_region: None,
        }
    }

    /// 依 `[cache]` 與 `[search]` 區段組裝：TTL、筆數上限與預設地區
    pub fn from_config(
        places: G,
        competitor: N,
        engine: InferenceEngine<P>,
        config: &GeoConfig,
    ) -> Self {
        Self::new(
            places,
            competitor,
            engine,
            ResultCache::new(config.cache.ttl_seconds),
        )
        .with_max_places(config.search.max_places)
        .with_default_region(config.search.region.clone())
    }

    pub fn with_max_places(mut self, max_places: usize) -> Self {
        self.max_places = max_places;
        self
    }

    /// 呼叫端沒給地區時改用這個地區
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = Some(region.into());
        self
    }

    pub fn cache(&self) -> &ResultCache<SearchResponse> {
        &self.cache
    }

    pub async fn search(&self, query: &str, region: &str) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(GeoError::EmptyInput {
                what: "search query".to_string(),
            });
        }

        let region = match (region.trim(), self.default_region.as_deref()) {
            ("", Some(fallback)) => fallback,
            _ => region,
        };
        let key = ResultCache::<SearchResponse>::normalize_key(query, region);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("🎯 Search cache hit: {}", key);
            return Ok(cached);
        }

        let (found, competitor) = tokio::join!(
            self.places.text_search(&key),
            self.competitor.local_search(&key)
        );
        let found = found?;
        // 競爭來源失敗時當作查無資料
        let competitor = competitor.unwrap_or_else(|e| {
            tracing::warn!("Competitor search failed for '{}': {}", key, e);
            None
        });

        let places: Vec<PlaceMatch> = found
            .into_iter()
            .filter(|place| {
                let inside = place.location.is_within_korea();
                if !inside {
                    tracing::warn!("Skipping '{}': outside coverage", place.name);
                }
                inside
            })
            .take(self.max_places)
            .map(|place| self.match_place(place, competitor.as_ref()))
            .collect();

        let response = SearchResponse {
            query: key.clone(),
            total: places.len(),
            places,
        };
        self.cache.put(key, response.clone());
        tracing::info!("🔍 Search '{}' returned {} places", response.query, response.total);
        Ok(response)
    }

    fn match_place(
        &self,
        place: PlaceCandidate,
        competitor: Option<&CompetitorCandidate>,
    ) -> PlaceMatch {
        let correction = self.engine.predict_offset(place.location);
        let correction_distance = distance_m(place.location, correction.corrected);

        let naver_location = competitor.and_then(|c| c.location);
        let sync_score = naver_location.map(|naver| {
            let sync_dist = distance_m(correction.corrected, naver);
            round_to((100.0 - sync_dist).max(0.0), 1)
        });
        let verdict = survival::classify(&place.name, correction.corrected, competitor);

        PlaceMatch {
            name: place.name,
            address: place.address,
            place_id: place.place_id,
            types: place.types,
            rating: place.rating,
            original: place.location,
            corrected: correction.corrected,
            naver_location,
            sync_score,
            correction_distance_m: round_to(correction_distance, 1),
            confidence: correction.confidence,
            method: correction.method,
            verdict,
        }
    }
}
