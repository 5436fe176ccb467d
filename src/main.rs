use anyhow::Context;
use clap::Parser;
use geoharness::adapters::anchors::load_anchor_csv;
use geoharness::config::cli::{Cli, Command};
use geoharness::domain::model::CompetitorCandidate;
use geoharness::engine::harness::{
    evaluate_landmarks, ground_truth_or_dummy, load_landmarks, HarnessRunner, Landmark,
};
use geoharness::engine::projection::{transform_pipeline, KoreaTm};
use geoharness::engine::{survival, triangulation};
use geoharness::utils::error::ErrorSeverity;
use geoharness::utils::{logger, validation::Validate};
use geoharness::{
    Coordinate, GeminiClient, GeoConfig, GeoError, InferenceEngine, ModelStore, RefinementLoop,
    RefinementRequest,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting geoharness CLI");

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path.display());
            match GeoConfig::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path.display(), e);
                    eprintln!("💡 Make sure the file exists and is valid TOML format");
                    std::process::exit(1);
                }
            }
        }
        None => GeoConfig::default(),
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match run(cli.command, &config).await {
        Ok(output) => {
            let rendered =
                serde_json::to_string_pretty(&output).context("failed to render command output")?;
            println!("{}", rendered);
        }
        Err(e) => {
            tracing::error!(
                "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn run(command: Command, config: &GeoConfig) -> geoharness::Result<Value> {
    match command {
        Command::Predict { lat, lng } => {
            let point = Coordinate::new(lat, lng)?;
            let result = inference_engine(config).predict_offset(point);
            Ok(serde_json::to_value(result)?)
        }
        Command::Verify { lat, lng, name } => {
            let point = Coordinate::new(lat, lng)?;
            let check = inference_engine(config).verify_location(point, &name);
            Ok(serde_json::to_value(check)?)
        }
        Command::ModelStatus => {
            let store = ModelStore::new(&config.model.path);
            Ok(serde_json::to_value(store.status())?)
        }
        Command::Transform {
            lat,
            lng,
            no_harness,
        } => {
            let point = Coordinate::new(lat, lng)?;
            let round_trip = transform_pipeline(&KoreaTm::epsg5179(), point)?;
            let landmarks = optional_landmarks(config);
            let ground_truth = ground_truth_or_dummy(point, &landmarks);

            let runner = if no_harness {
                HarnessRunner::new(None, 0)
            } else {
                HarnessRunner::new(reasoning_loop(config)?, config.reasoning.max_iterations)
            };
            let report = runner
                .run("API Request Point", point, ground_truth.position)
                .await;

            Ok(json!({
                "input": point,
                "epsg5179": round_trip.epsg5179,
                "roundtrip": round_trip.roundtrip,
                "ground_truth": ground_truth,
                "harness": report,
            }))
        }
        Command::Refine {
            lat,
            lng,
            truth_lat,
            truth_lng,
            label,
            max_iterations,
        } => {
            let start = Coordinate::new(lat, lng)?;
            let truth = Coordinate::new(truth_lat, truth_lng)?;
            let refinement = reasoning_loop(config)?.ok_or_else(|| GeoError::MissingConfigError {
                field: "reasoning.api_key".to_string(),
            })?;
            let request = RefinementRequest::new(label, start, truth)
                .with_max_iterations(max_iterations.unwrap_or(config.reasoning.max_iterations));
            let outcome = refinement.run(&request).await;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Classify {
            name,
            lat,
            lng,
            candidate_title,
            candidate_lat,
            candidate_lng,
        } => {
            let point = Coordinate::new(lat, lng)?;
            let candidate = candidate_title.map(|title| CompetitorCandidate {
                title,
                location: match (candidate_lat, candidate_lng) {
                    (Some(lat), Some(lng)) => Coordinate::new(lat, lng).ok(),
                    _ => None,
                },
            });
            let verdict = survival::classify(&name, point, candidate.as_ref());
            Ok(serde_json::to_value(verdict)?)
        }
        Command::Batch { landmarks } => {
            let path = landmarks
                .or_else(|| config.data.landmarks_path.as_ref().map(PathBuf::from))
                .ok_or_else(|| GeoError::MissingConfigError {
                    field: "data.landmarks_path".to_string(),
                })?;
            let report = evaluate_landmarks(&load_landmarks(path)?)?;
            Ok(serde_json::to_value(report)?)
        }
        Command::Features { lat, lng, anchors } => {
            let point = Coordinate::new(lat, lng)?;
            let path = anchors
                .or_else(|| config.data.anchors_path.as_ref().map(PathBuf::from))
                .ok_or_else(|| GeoError::MissingConfigError {
                    field: "data.anchors_path".to_string(),
                })?;
            let anchors = load_anchor_csv(path)?;
            let nearest: Vec<_> = triangulation::rank_anchors(point, &anchors)
                .into_iter()
                .take(triangulation::NEAREST_ANCHORS)
                .collect();
            let features = triangulation::anchor_features(point, &anchors);

            let columns = triangulation::BASE_FEATURE_COLUMNS
                .iter()
                .chain(triangulation::ANCHOR_FEATURE_COLUMNS.iter());
            let values = [point.lat(), point.lng()].into_iter().chain(features);
            let vector: serde_json::Map<String, Value> = columns
                .zip(values)
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect();

            Ok(json!({
                "point": point,
                "features": vector,
                "nearest": nearest,
            }))
        }
    }
}

fn inference_engine(config: &GeoConfig) -> InferenceEngine {
    InferenceEngine::new(Arc::new(ModelStore::new(&config.model.path)))
}

fn reasoning_loop(config: &GeoConfig) -> geoharness::Result<Option<RefinementLoop<GeminiClient>>> {
    if !config.reasoning_enabled() {
        tracing::warn!("⚠️ reasoning.api_key not set, refinement disabled");
        return Ok(None);
    }
    let client = GeminiClient::from_config(config)?;
    Ok(Some(
        RefinementLoop::new(client).with_timeout(config.reasoning_timeout()),
    ))
}

/// 地標檔是選用的；讀不到時只記錄警告
fn optional_landmarks(config: &GeoConfig) -> Vec<Landmark> {
    let Some(path) = &config.data.landmarks_path else {
        return Vec::new();
    };
    load_landmarks(path).unwrap_or_else(|e| {
        tracing::warn!("⚠️ Could not load landmarks from {}: {}", path, e);
        Vec::new()
    })
}
