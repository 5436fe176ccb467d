pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod utils;

pub use adapters::gemini::GeminiClient;
pub use config::GeoConfig;
pub use domain::model::{Coordinate, CorrectionMethod, CorrectionResult, PoiStatus, PoiVerdict};
pub use engine::inference::InferenceEngine;
pub use engine::model_store::ModelStore;
pub use engine::refinement::{RefinementLoop, RefinementRequest, RefinementStatus};
pub use utils::error::{GeoError, Result};
