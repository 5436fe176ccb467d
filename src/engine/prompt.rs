use crate::domain::model::Coordinate;
use serde::Serialize;

/// 推理服務的固定指令：先推論誤差來源，再輸出指定 JSON
pub const SYSTEM_PROMPT: &str = r#"You are a map-coordinate consistency agent (GeoHarness Spatial-Sync Expert).

Two map providers report WGS84 coordinates for the same physical point in Korea that differ slightly.
Given the current coordinate, the ground-truth coordinate and the current error in meters, reason step by
step about the cause of the discrepancy and propose a correction offset.

Consider at least:
1. datum differences between the providers' tile rendering systems
2. non-linear distortion introduced by projection conversions
3. GPS reference drift in dense urban areas

Respond with JSON only, using exactly this schema:
{
  "lat_offset": number,   // latitude correction in degrees, within +/-0.001
  "lng_offset": number,   // longitude correction in degrees, within +/-0.001
  "confidence": number,   // 0 to 1
  "reasoning": string     // one or two sentences on the cause of the error
}"#;

/// 每次呼叫推理服務時附帶的結構化上下文
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionContext {
    pub label: String,
    pub lat: f64,
    pub lng: f64,
    pub ground_truth: Coordinate,
    pub current_rmse_m: f64,
}

impl CorrectionContext {
    pub fn new(label: &str, current: Coordinate, ground_truth: Coordinate, current_rmse_m: f64) -> Self {
        Self {
            label: label.to_string(),
            lat: current.lat(),
            lng: current.lng(),
            ground_truth,
            current_rmse_m,
        }
    }
}

pub fn format_user_prompt(context: &CorrectionContext) -> String {
    let label = if context.label.trim().is_empty() {
        "Unknown"
    } else {
        context.label.as_str()
    };
    let payload = serde_json::to_string(context).unwrap_or_default();

    format!(
        "Coordinate correction request:\n\
         - Target landmark: {}\n\
         - Current coordinate: {}, {}\n\
         - Ground truth: {}, {}\n\
         - Current error (RMSE): {:.2}m\n\
         - Context: {}\n\n\
         Compute the lat_offset / lng_offset that best reduces this distance and answer in JSON.",
        label,
        context.lat,
        context.lng,
        context.ground_truth.lat(),
        context.ground_truth.lng(),
        context.current_rmse_m,
        payload
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_carries_context() {
        let context = CorrectionContext::new(
            "Seoul Forest",
            Coordinate::unchecked(37.5444, 127.0374),
            Coordinate::unchecked(37.5445, 127.0376),
            21.456,
        );
        let prompt = format_user_prompt(&context);
        assert!(prompt.contains("Seoul Forest"));
        assert!(prompt.contains("37.5444, 127.0374"));
        assert!(prompt.contains("21.46m"));
        assert!(prompt.contains("\"current_rmse_m\":21.456"));
    }

    #[test]
    fn test_blank_label_becomes_unknown() {
        let context = CorrectionContext::new(
            " ",
            Coordinate::unchecked(37.0, 127.0),
            Coordinate::unchecked(37.0, 127.0),
            0.0,
        );
        assert!(format_user_prompt(&context).contains("Target landmark: Unknown"));
    }
}
