use crate::domain::model::{CompetitorCandidate, Coordinate, PlaceCandidate};
use crate::utils::error::{ReasoningFailure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// EPSG:5179 平面座標（公尺）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

pub trait Projection: Send + Sync {
    fn forward(&self, point: Coordinate) -> Result<ProjectedPoint>;
    fn inverse(&self, projected: ProjectedPoint) -> Result<Coordinate>;
}

/// 外部推理服務（LLM）。回傳模型原始文字，由呼叫端解析 JSON。
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, ReasoningFailure>;
}

#[async_trait]
impl<T: ReasoningService + ?Sized> ReasoningService for Arc<T> {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> std::result::Result<String, ReasoningFailure> {
        (**self).generate(system_prompt, user_prompt).await
    }
}

#[async_trait]
pub trait PlaceProvider: Send + Sync {
    async fn text_search(&self, query: &str) -> Result<Vec<PlaceCandidate>>;
}

#[async_trait]
pub trait CompetitorProvider: Send + Sync {
    async fn local_search(&self, query: &str) -> Result<Option<CompetitorCandidate>>;
}
