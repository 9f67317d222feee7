pub mod agents;
pub mod config;
pub mod core;
pub mod domain;
pub mod geo;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::AppConfig, RunConfig};

pub use agents::{AgentRegistry, AgentSpec, ModelAgent};
pub use core::{BatchEngine, BatchPipeline, ScoringService, VesselAnalyzer};
pub use domain::model::{Observation, ScoringRequest, VesselAnalysis};
pub use geo::{check_zone, ZoneStore};
pub use utils::error::{BlueGuardError, Result};
