use crate::utils::error::{GeoError, Result};
use crate::utils::validation::{
    validate_data_file, validate_non_empty_string, validate_positive_seconds, validate_range,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_MODEL_PATH: &str = "models/decoder.json";
pub const DEFAULT_REASONING_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REASONING_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_REGION: &str = "성수동";
pub const MAX_ITERATIONS_LIMIT: u32 = 10;
pub const MAX_PLACES_LIMIT: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_MODEL_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default = "default_reasoning_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    #[serde(default = "default_reasoning_model")]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            endpoint: default_reasoning_endpoint(),
            api_key: None,
            model: default_reasoning_model(),
            timeout_seconds: default_timeout_seconds(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_max_places")]
    pub max_places: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            max_places: default_max_places(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    pub landmarks_path: Option<String>,
    pub anchors_path: Option<String>,
}

fn default_reasoning_endpoint() -> String {
    DEFAULT_REASONING_ENDPOINT.to_string()
}

fn default_reasoning_model() -> String {
    DEFAULT_REASONING_MODEL.to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_max_iterations() -> u32 {
    2
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_max_places() -> usize {
    5
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"))
}

impl GeoConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GeoError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| GeoError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEMINI_API_KEY})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// 有 API 金鑰（且不是未替換的 `${...}`）才啟用推理服務
    pub fn reasoning_enabled(&self) -> bool {
        self.reasoning
            .api_key
            .as_deref()
            .map(|key| !key.trim().is_empty() && !env_var_pattern().is_match(key))
            .unwrap_or(false)
    }

    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning.timeout_seconds)
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_data_file("model.path", &self.model.path, "json")?;
        validate_url("reasoning.endpoint", &self.reasoning.endpoint)?;
        validate_non_empty_string("reasoning.model", &self.reasoning.model)?;
        validate_positive_seconds("reasoning.timeout_seconds", self.reasoning.timeout_seconds)?;
        validate_range(
            "reasoning.max_iterations",
            self.reasoning.max_iterations,
            0,
            MAX_ITERATIONS_LIMIT,
        )?;
        validate_positive_seconds("cache.ttl_seconds", self.cache.ttl_seconds)?;
        validate_non_empty_string("search.region", &self.search.region)?;
        validate_range("search.max_places", self.search.max_places, 1, MAX_PLACES_LIMIT)?;

        if let Some(path) = &self.data.landmarks_path {
            validate_data_file("data.landmarks_path", path, "json")?;
        }
        if let Some(path) = &self.data.anchors_path {
            validate_data_file("data.anchors_path", path, "csv")?;
        }

        Ok(())
    }
}

impl Validate for GeoConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = GeoConfig::from_toml_str(
            r#"
[model]
path = "models/decoder.json"
"#,
        )
        .unwrap();

        assert_eq!(config.reasoning.timeout_seconds, 15);
        assert_eq!(config.reasoning.max_iterations, 2);
        assert_eq!(config.reasoning.model, DEFAULT_REASONING_MODEL);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.search.region, "성수동");
        assert_eq!(config.search.max_places, 5);
        assert!(!config.reasoning_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("GEOHARNESS_TEST_API_KEY", "secret-key");

        let config = GeoConfig::from_toml_str(
            r#"
[model]
path = "decoder.json"

[reasoning]
api_key = "${GEOHARNESS_TEST_API_KEY}"
"#,
        )
        .unwrap();
        assert_eq!(config.reasoning.api_key.as_deref(), Some("secret-key"));
        assert!(config.reasoning_enabled());

        std::env::remove_var("GEOHARNESS_TEST_API_KEY");
    }

    #[test]
    fn test_unset_env_var_disables_reasoning() {
        let config = GeoConfig::from_toml_str(
            r#"
[model]
path = "decoder.json"

[reasoning]
api_key = "${GEOHARNESS_SURELY_UNSET_VAR}"
"#,
        )
        .unwrap();
        assert_eq!(
            config.reasoning.api_key.as_deref(),
            Some("${GEOHARNESS_SURELY_UNSET_VAR}")
        );
        assert!(!config.reasoning_enabled());
    }

    #[test]
    fn test_config_validation() {
        let bad_endpoint = GeoConfig::from_toml_str(
            r#"
[model]
path = "decoder.json"

[reasoning]
endpoint = "invalid-url"
"#,
        )
        .unwrap();
        assert!(bad_endpoint.validate().is_err());

        let mut too_many = GeoConfig::default();
        too_many.search.max_places = 50;
        assert!(matches!(
            too_many.validate(),
            Err(GeoError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_missing_model_section_is_rejected() {
        assert!(matches!(
            GeoConfig::from_toml_str("[cache]\nttl_seconds = 60\n"),
            Err(GeoError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(
                br#"
[model]
path = "/srv/models/decoder.json"

[data]
landmarks_path = "data/test_coordinates.json"
"#,
            )
            .unwrap();

        let config = GeoConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.model.path, "/srv/models/decoder.json");
        assert_eq!(
            config.data.landmarks_path.as_deref(),
            Some("data/test_coordinates.json")
        );
        assert_eq!(config.data.anchors_path, None);
    }
}
