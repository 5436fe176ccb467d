//! 模型檔的延遲載入與熱重載。
//!
//! `get_bundle` 每次都檢查檔案的修改時間：未變則回傳快取，變了就重新反序列化並整個換掉。
//! 讀者拿到的是 `Arc<ModelBundle>`，重載只替換指標，不會改動已發出的 bundle。

use crate::domain::model::{Anchor, Coordinate};
use crate::engine::predictor::Predictor;
use crate::engine::triangulation::{anchor_features, ANCHOR_MARKER_COLUMN};
use crate::utils::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// 模型檔的磁碟格式（JSON）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_x: Predictor,
    pub model_y: Predictor,
    pub feature_cols: Vec<String>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
    pub n_samples: u64,
    pub rmse_x: f64,
    pub rmse_y: f64,
    #[serde(default)]
    pub gpu_trained: Option<bool>,
    #[serde(default)]
    pub method: Option<String>,
}

impl ModelArtifact {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        artifact.check()?;
        Ok(artifact)
    }

    fn check(&self) -> Result<()> {
        if self.feature_cols.is_empty() {
            return Err(GeoError::ModelError {
                message: "feature_cols is empty".to_string(),
            });
        }
        if !self.rmse_x.is_finite() || !self.rmse_y.is_finite() {
            return Err(GeoError::ModelError {
                message: "rmse_x / rmse_y must be finite".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub predictor_lng: Predictor,
    pub predictor_lat: Predictor,
    pub feature_columns: Vec<String>,
    pub anchors: Vec<Anchor>,
    pub sample_count: u64,
    pub rmse_lng: f64,
    pub rmse_lat: f64,
    pub gpu_trained: Option<bool>,
    pub method: Option<String>,
    pub source_mtime: SystemTime,
}

impl ModelBundle {
    pub fn from_artifact(artifact: ModelArtifact, source_mtime: SystemTime) -> Self {
        Self {
            predictor_lng: artifact.model_x,
            predictor_lat: artifact.model_y,
            feature_columns: artifact.feature_cols,
            anchors: artifact.anchors,
            sample_count: artifact.n_samples,
            rmse_lng: artifact.rmse_x,
            rmse_lat: artifact.rmse_y,
            gpu_trained: artifact.gpu_trained,
            method: artifact.method,
            source_mtime,
        }
    }

    /// 以錨點特徵訓練的模型才會宣告 `anchor1_dist`
    pub fn uses_anchor_features(&self) -> bool {
        self.feature_columns
            .iter()
            .any(|c| c == ANCHOR_MARKER_COLUMN)
    }

    /// `[lat, lng]`，若模型宣告錨點欄位再接上六個三角定位特徵
    pub fn feature_vector(&self, point: Coordinate) -> Vec<f64> {
        let mut features = vec![point.lat(), point.lng()];
        if self.uses_anchor_features() {
            features.extend_from_slice(&anchor_features(point, &self.anchors));
        }
        features
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub path: String,
    pub features: Vec<String>,
    pub rmse_lng: Option<f64>,
    pub rmse_lat: Option<f64>,
    pub n_samples: Option<u64>,
    pub gpu_trained: Option<bool>,
    pub method: Option<String>,
    pub fallback: Option<String>,
}

/// 目前的 ModelBundle 的唯一擁有者。多個請求可同時呼叫；
/// 兩個請求同時發現新檔案時各自重載一次，最後寫入者生效。
#[derive(Debug)]
pub struct ModelStore {
    path: PathBuf,
    current: RwLock<Option<Arc<ModelBundle>>>,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 回傳目前可用的模型；沒有模型檔或載入失敗時回傳 `None`
    pub fn get_bundle(&self) -> Option<Arc<ModelBundle>> {
        let mtime = match std::fs::metadata(&self.path) {
            Ok(meta) => match meta.modified() {
                Ok(mtime) => mtime,
                Err(e) => {
                    tracing::error!("Cannot read mtime of {}: {}", self.path.display(), e);
                    return None;
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if self.swap(None).is_some() {
                    tracing::warn!(
                        "⚠️ Model artifact {} removed, clearing cache and falling back to projection",
                        self.path.display()
                    );
                }
                return None;
            }
            Err(e) => {
                tracing::error!("Cannot stat model artifact {}: {}", self.path.display(), e);
                return None;
            }
        };

        if let Some(bundle) = self.snapshot() {
            if bundle.source_mtime == mtime {
                return Some(bundle);
            }
        }

        match Self::load_artifact(&self.path) {
            Ok(artifact) => {
                let bundle = Arc::new(ModelBundle::from_artifact(artifact, mtime));
                tracing::info!(
                    "✅ Model loaded from {} (samples: {})",
                    self.path.display(),
                    bundle.sample_count
                );
                tracing::info!("   Features: {:?}", bundle.feature_columns);
                tracing::info!(
                    "   RMSE: lng={:.6}, lat={:.6}",
                    bundle.rmse_lng,
                    bundle.rmse_lat
                );
                self.swap(Some(Arc::clone(&bundle)));
                Some(bundle)
            }
            Err(e) => {
                tracing::error!("❌ Failed to load model {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// 健康檢查用的模型狀態
    pub fn status(&self) -> ModelStatus {
        let path = self.path.display().to_string();
        match self.get_bundle() {
            Some(bundle) => ModelStatus {
                loaded: true,
                path,
                features: bundle.feature_columns.clone(),
                rmse_lng: Some(bundle.rmse_lng),
                rmse_lat: Some(bundle.rmse_lat),
                n_samples: Some(bundle.sample_count),
                gpu_trained: bundle.gpu_trained,
                method: bundle.method.clone(),
                fallback: None,
            },
            None => ModelStatus {
                loaded: false,
                path,
                features: Vec::new(),
                rmse_lng: None,
                rmse_lat: None,
                n_samples: None,
                gpu_trained: None,
                method: None,
                fallback: Some("projection".to_string()),
            },
        }
    }

    fn load_artifact(path: &Path) -> Result<ModelArtifact> {
        let bytes = std::fs::read(path)?;
        ModelArtifact::from_slice(&bytes)
    }

    fn snapshot(&self) -> Option<Arc<ModelBundle>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn swap(&self, next: Option<Arc<ModelBundle>>) -> Option<Arc<ModelBundle>> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, next)
    }
}
