pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use toml_config::AppConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "blueguard")]
#[command(about = "Vessel behaviour classification, geofencing and risk scoring")]
pub struct CliConfig {
    #[arg(long, short, default_value = "blueguard.toml")]
    pub config: String,

    #[arg(long, short, help = "Observation file (.csv or .json)")]
    pub input: Option<String>,

    #[arg(long, help = "Route every observation to this agent key")]
    pub agent: Option<String>,

    #[arg(long, short, help = "Override load.output_path")]
    pub output: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU / memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Validate configuration and load agents without scoring")]
    pub dry_run: bool,

    #[arg(long, help = "Print the registered agents and exit")]
    pub list_agents: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入 TOML 設定並套用命令列覆寫
    pub fn resolve(&self) -> Result<RunConfig> {
        let app = AppConfig::from_file(&self.config)?;
        let input_path = match &self.input {
            Some(input) => std::path::absolute(input)?.display().to_string(),
            None => String::new(),
        };
        Ok(RunConfig {
            output_path: self
                .output
                .clone()
                .unwrap_or_else(|| app.load.output_path.clone()),
            input_path,
            preferred_agent: self.agent.clone(),
            app,
        })
    }
}

/// 一次批次執行的完整設定
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub app: AppConfig,
    pub input_path: String,
    pub output_path: String,
    pub preferred_agent: Option<String>,
}

impl RunConfig {
    pub fn new(app: AppConfig, input_path: impl Into<String>) -> Self {
        Self {
            output_path: app.load.output_path.clone(),
            input_path: input_path.into(),
            preferred_agent: None,
            app,
        }
    }
}

impl ConfigProvider for RunConfig {
    fn input_path(&self) -> &str {
        &self.input_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn concurrent_requests(&self) -> usize {
        self.app.concurrent_requests()
    }

    fn max_records(&self) -> Option<usize> {
        self.app.max_records()
    }

    fn output_formats(&self) -> &[String] {
        &self.app.load.output_formats
    }

    fn archive_name(&self) -> Option<&str> {
        self.app.archive_name()
    }

    fn preferred_agent(&self) -> Option<&str> {
        self.preferred_agent.as_deref()
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        self.app.validate()?;
        validation::validate_path("input", &self.input_path)?;
        validation::validate_file_extensions("input", &[self.input_path.clone()], &["csv", "json"])?;
        validation::validate_path("output", &self.output_path)?;
        if let Some(agent) = &self.preferred_agent {
            validation::validate_non_empty_string("agent", agent)?;
        }
        Ok(())
    }
}
