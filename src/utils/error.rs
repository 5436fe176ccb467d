use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Coordinate ({lat}, {lng}) is outside the Korean coverage area")]
    OutOfCoverage { lat: f64, lng: f64 },

    #[error("Coordinate lists must have the same non-zero length (predicted: {predicted}, truth: {truth})")]
    LengthMismatch { predicted: usize, truth: usize },

    #[error("Empty input: {what}")]
    EmptyInput { what: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Model error: {message}")]
    ModelError { message: String },

    #[error("Projection error: {message}")]
    ProjectionError { message: String },

    #[error("Reasoning service error: {message}")]
    ReasoningError { message: String },

    #[error("Provider error: {message}")]
    ProviderError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Model,
    External,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GeoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GeoError::OutOfCoverage { .. }
            | GeoError::LengthMismatch { .. }
            | GeoError::EmptyInput { .. } => ErrorCategory::Input,
            GeoError::ConfigValidationError { .. }
            | GeoError::InvalidConfigValueError { .. }
            | GeoError::MissingConfigError { .. } => ErrorCategory::Configuration,
            GeoError::ModelError { .. }
            | GeoError::ProjectionError { .. }
            | GeoError::SerializationError(_) => ErrorCategory::Model,
            GeoError::HttpError(_)
            | GeoError::ReasoningError { .. }
            | GeoError::ProviderError { .. } => ErrorCategory::External,
            GeoError::IoError(_) | GeoError::CsvError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Model => ErrorSeverity::Medium,
            ErrorCategory::External => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            GeoError::OutOfCoverage { .. } => {
                "Use coordinates inside lat 33~43, lng 124~132 (WGS84 degrees)"
            }
            GeoError::LengthMismatch { .. } => {
                "Pass predicted and ground-truth lists of the same non-zero length"
            }
            GeoError::EmptyInput { .. } => "Provide at least one input value",
            GeoError::ConfigValidationError { .. }
            | GeoError::InvalidConfigValueError { .. } => {
                "Check the TOML configuration file against the documented sections"
            }
            GeoError::MissingConfigError { .. } => {
                "Add the missing key to the configuration or export the environment variable"
            }
            GeoError::ModelError { .. } | GeoError::SerializationError(_) => {
                "Re-export the model artifact; inference will fall back to projection meanwhile"
            }
            GeoError::ProjectionError { .. } => "Verify the input coordinate is finite",
            GeoError::HttpError(_)
            | GeoError::ReasoningError { .. }
            | GeoError::ProviderError { .. } => {
                "Check network connectivity and API credentials, then retry"
            }
            GeoError::IoError(_) | GeoError::CsvError(_) => {
                "Check that the file exists and is readable"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Invalid input: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Model => format!("Model problem: {}", self),
            ErrorCategory::External => format!("External service problem: {}", self),
            ErrorCategory::System => format!("System problem: {}", self),
        }
    }
}

/// 回歸模型推論失敗。推論引擎會吸收此錯誤並改走投影 fallback。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictorError {
    #[error("feature vector has {actual} values but the model expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("feature index {index} out of range for {width} features")]
    FeatureIndex { index: usize, width: usize },

    #[error("malformed model: {0}")]
    Malformed(String),

    #[error("prediction is not a finite number")]
    NonFinite,
}

/// 推理服務（LLM）呼叫失敗，不含回應內容 JSON 解析錯誤。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasoningFailure {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("unexpected response envelope: {0}")]
    Envelope(String),

    #[error("service returned no candidate text")]
    EmptyResponse,
}

impl From<reqwest::Error> for ReasoningFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ReasoningFailure::Timeout
        } else {
            ReasoningFailure::Transport(e.to_string())
        }
    }
}

impl From<ReasoningFailure> for GeoError {
    fn from(e: ReasoningFailure) -> Self {
        GeoError::ReasoningError {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_errors_are_input_category() {
        let err = GeoError::LengthMismatch {
            predicted: 2,
            truth: 3,
        };
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.to_string().contains("predicted: 2"));
    }

    #[test]
    fn test_reasoning_failure_converts() {
        let err: GeoError = ReasoningFailure::Timeout.into();
        assert_eq!(err.category(), ErrorCategory::External);
        assert!(err.user_friendly_message().contains("timed out"));
    }
}
