//! 以外部推理服務逐步修正座標，直到誤差低於門檻或用完迭代次數。
//!
//! 終止狀態：
//! - `success`：提前收斂（< 1 m），或跑完所有迭代（不代表已收斂，看 `converged`）
//! - `skipped`：`max_iterations == 0`，只量測初始誤差
//! - `json_parse_error`：服務回應不是合法 JSON，保留先前的迭代
//! - `timeout_or_error`：逾時或傳輸錯誤，保留先前的迭代

use crate::domain::model::{CorrectionIteration, Coordinate};
use crate::domain::ports::ReasoningService;
use crate::engine::geodesy::{distance_m, harness_score};
use crate::engine::prompt::{format_user_prompt, CorrectionContext, SYSTEM_PROMPT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_ITERATIONS: u32 = 2;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const CONVERGENCE_THRESHOLD_M: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementStatus {
    Success,
    Skipped,
    JsonParseError,
    TimeoutOrError,
}

impl RefinementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefinementStatus::Success => "success",
            RefinementStatus::Skipped => "skipped",
            RefinementStatus::JsonParseError => "json_parse_error",
            RefinementStatus::TimeoutOrError => "timeout_or_error",
        }
    }
}

/// 迴圈如何結束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Baseline,
    EarlyStop,
    Exhausted,
    JsonError,
    ServiceError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementRequest {
    pub label: String,
    pub start: Coordinate,
    pub ground_truth: Coordinate,
    pub max_iterations: u32,
}

impl RefinementRequest {
    pub fn new(label: impl Into<String>, start: Coordinate, ground_truth: Coordinate) -> Self {
        Self {
            label: label.into(),
            start,
            ground_truth,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// 只量測初始誤差，不呼叫推理服務
    pub fn baseline(&self) -> Self {
        self.clone().with_max_iterations(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementOutcome {
    pub final_position: Coordinate,
    pub final_error_m: f64,
    pub harness_score: u8,
    pub iterations: Vec<CorrectionIteration>,
    pub reasoning: Option<String>,
    pub status: RefinementStatus,
    pub termination: Termination,
    pub converged: bool,
}

/// 推理服務回應。缺少的欄位視為 0 / 空字串；超出建議範圍的值照單全收。
#[derive(Debug, Clone, Deserialize)]
struct OffsetProposal {
    #[serde(default)]
    lat_offset: f64,
    #[serde(default)]
    lng_offset: f64,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

pub struct RefinementLoop<R: ReasoningService> {
    service: R,
    timeout: Duration,
}

impl<R: ReasoningService> RefinementLoop<R> {
    pub fn new(service: R) -> Self {
        Self {
            service,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(&self, request: &RefinementRequest) -> RefinementOutcome {
        let mut current = request.start;
        let mut error_m = distance_m(current, request.ground_truth);
        let mut iterations = Vec::new();
        let mut reasoning = None;

        let (status, termination) = if request.max_iterations == 0 {
            (RefinementStatus::Skipped, Termination::Baseline)
        } else {
            let mut outcome = (RefinementStatus::Success, Termination::Exhausted);

            for index in 1..=request.max_iterations {
                if error_m < CONVERGENCE_THRESHOLD_M {
                    tracing::info!(
                        "Error {:.3}m < {}m, stopping refinement early",
                        error_m,
                        CONVERGENCE_THRESHOLD_M
                    );
                    outcome = (RefinementStatus::Success, Termination::EarlyStop);
                    break;
                }

                let context =
                    CorrectionContext::new(&request.label, current, request.ground_truth, error_m);
                let user_prompt = format_user_prompt(&context);

                let reply = match tokio::time::timeout(
                    self.timeout,
                    self.service.generate(SYSTEM_PROMPT, &user_prompt),
                )
                .await
                {
                    Ok(Ok(text)) => text,
                    Ok(Err(failure)) => {
                        tracing::error!("Reasoning service error at iteration {}: {}", index, failure);
                        outcome = (RefinementStatus::TimeoutOrError, Termination::ServiceError);
                        break;
                    }
                    Err(_) => {
                        tracing::error!(
                            "Reasoning service timed out after {:?} at iteration {}",
                            self.timeout,
                            index
                        );
                        outcome = (RefinementStatus::TimeoutOrError, Termination::ServiceError);
                        break;
                    }
                };

                let proposal: OffsetProposal = match serde_json::from_str(strip_code_fence(&reply)) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::error!("Failed to parse reasoning JSON at iteration {}: {}", index, e);
                        outcome = (RefinementStatus::JsonParseError, Termination::JsonError);
                        break;
                    }
                };

                current = current.offset(proposal.lat_offset, proposal.lng_offset);
                error_m = distance_m(current, request.ground_truth);
                tracing::debug!(
                    "Iteration {}: offset=({:+.7}, {:+.7}) error={:.3}m",
                    index,
                    proposal.lat_offset,
                    proposal.lng_offset,
                    error_m
                );

                reasoning = Some(proposal.reasoning);
                iterations.push(CorrectionIteration {
                    index,
                    lat_offset: proposal.lat_offset,
                    lng_offset: proposal.lng_offset,
                    confidence: proposal.confidence,
                    rmse_after_m: error_m,
                });
            }
            outcome
        };

        RefinementOutcome {
            final_position: current,
            final_error_m: error_m,
            harness_score: harness_score(error_m),
            iterations,
            reasoning,
            status,
            termination,
            converged: error_m < CONVERGENCE_THRESHOLD_M,
        }
    }
}

/// 有些模型會把 JSON 包在 ```json 區塊裡
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
