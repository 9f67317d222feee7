use crate::agents::spec::{AgentSpec, AgentVariant};
use crate::utils::error::{BlueGuardError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONCURRENT_REQUESTS: usize = 5;
pub const VALID_OUTPUT_FORMATS: [&str; 2] = ["csv", "json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub agents: AgentsConfig,
    pub zones: ZonesConfig,
    pub routing: Option<RoutingConfig>,
    pub batch: Option<BatchConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// 各 agent artifact_dir 的共同根目錄
    pub artifact_root: String,
    /// 註冊順序即路由時的優先順序
    pub registry: Vec<AgentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub key: String,
    pub variant: AgentVariant,
    pub artifact_dir: String,
    pub name: Option<String>,
    pub purpose: Option<String>,
    pub required_features: Option<Vec<String>>,
    pub indicators: Option<Vec<String>>,
    pub default: Option<bool>,
    pub confidence_threshold: Option<f64>,
    pub reconcile_features: Option<bool>,
}

impl AgentEntry {
    /// 預設值來自 variant 預設組合，其餘欄位覆寫；custom 必須提供名稱與必要特徵
    pub fn to_spec(&self) -> Result<AgentSpec> {
        let mut spec = match self.variant.preset() {
            Some(preset) => preset,
            None => {
                let name = self.name.clone().ok_or_else(|| BlueGuardError::MissingConfigError {
                    field: format!("agents.registry[{}].name", self.key),
                })?;
                let required = self.required_features.clone().ok_or_else(|| {
                    BlueGuardError::MissingConfigError {
                        field: format!("agents.registry[{}].required_features", self.key),
                    }
                })?;
                let indicators = self.indicators.clone().unwrap_or_else(|| required.clone());
                AgentSpec::new(name, self.purpose.clone().unwrap_or_default(), required, indicators)
            }
        };

        if let Some(name) = &self.name {
            spec.name = name.clone();
        }
        if let Some(purpose) = &self.purpose {
            spec.purpose = purpose.clone();
        }
        if let Some(required) = &self.required_features {
            spec.required_features = required.clone();
        }
        if let Some(indicators) = &self.indicators {
            spec.indicators = indicators.clone();
        }
        if let Some(threshold) = self.confidence_threshold {
            spec = spec.with_confidence_threshold(threshold);
        }

        spec.validate()?;
        Ok(spec)
    }

    pub fn is_default(&self) -> bool {
        self.default.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesConfig {
    /// 內含 mpa_zones / eez_zones / ports 子目錄
    pub root: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub prediction_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    pub concurrent_requests: Option<usize>,
    pub max_records: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub json_logs: Option<bool>,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BlueGuardError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BlueGuardError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MODEL_ROOT})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| {
            BlueGuardError::ConfigValidationError {
                field: "environment".to_string(),
                message: e.to_string(),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("service.name", &self.service.name)?;
        validation::validate_path("agents.artifact_root", &self.agents.artifact_root)?;
        validation::validate_path("zones.root", &self.zones.root)?;
        validation::validate_path("load.output_path", &self.load.output_path)?;

        if self.agents.registry.is_empty() {
            return Err(BlueGuardError::MissingConfigError {
                field: "agents.registry".to_string(),
            });
        }

        let mut keys = HashSet::new();
        let mut defaults = Vec::new();
        for entry in &self.agents.registry {
            validation::validate_non_empty_string("agents.registry.key", &entry.key)?;
            validation::validate_path("agents.registry.artifact_dir", &entry.artifact_dir)?;
            if !keys.insert(entry.key.as_str()) {
                return Err(BlueGuardError::InvalidConfigValueError {
                    field: "agents.registry.key".to_string(),
                    value: entry.key.clone(),
                    reason: "Agent keys must be unique".to_string(),
                });
            }
            if entry.is_default() {
                defaults.push(entry.key.as_str());
            }
            entry.to_spec()?;
        }
        if defaults.len() > 1 {
            return Err(BlueGuardError::InvalidConfigValueError {
                field: "agents.registry.default".to_string(),
                value: defaults.join(","),
                reason: "At most one agent can be the default".to_string(),
            });
        }

        if let Some(concurrent) = self.batch.as_ref().and_then(|b| b.concurrent_requests) {
            validation::validate_positive_number("batch.concurrent_requests", concurrent, 1)?;
        }
        if let Some(max) = self.batch.as_ref().and_then(|b| b.max_records) {
            validation::validate_positive_number("batch.max_records", max, 1)?;
        }
        if let Some(timeout) = self.routing.as_ref().and_then(|r| r.prediction_timeout_ms) {
            validation::validate_positive_number("routing.prediction_timeout_ms", timeout as usize, 1)?;
        }

        for format in &self.load.output_formats {
            if !VALID_OUTPUT_FORMATS.contains(&format.as_str()) {
                return Err(BlueGuardError::InvalidConfigValueError {
                    field: "load.output_formats".to_string(),
                    value: format.clone(),
                    reason: format!(
                        "Unsupported format. Valid formats: {}",
                        VALID_OUTPUT_FORMATS.join(", ")
                    ),
                });
            }
        }

        if let Some(archive) = self.archive_name() {
            validation::validate_file_extensions(
                "load.compression.filename",
                &[archive.to_string()],
                &["zip"],
            )?;
        }

        Ok(())
    }

    pub fn concurrent_requests(&self) -> usize {
        self.batch
            .as_ref()
            .and_then(|b| b.concurrent_requests)
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS)
    }

    pub fn max_records(&self) -> Option<usize> {
        self.batch.as_ref().and_then(|b| b.max_records)
    }

    pub fn prediction_timeout(&self) -> Option<Duration> {
        self.routing
            .as_ref()
            .and_then(|r| r.prediction_timeout_ms)
            .map(Duration::from_millis)
    }

    /// 啟用壓縮時的 zip 檔名
    pub fn archive_name(&self) -> Option<&str> {
        self.load
            .compression
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| c.filename.as_str())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
