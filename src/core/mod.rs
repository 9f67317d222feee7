pub mod analysis;
pub mod engine;
pub mod pipeline;
pub mod risk;
pub mod service;
pub mod violation;

pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
pub use analysis::VesselAnalyzer;
pub use engine::BatchEngine;
pub use pipeline::BatchPipeline;
pub use risk::{assess, assess_risk, RiskInputs};
pub use service::ScoringService;
pub use violation::{detect_violations, IllegalFishingRule, RuleContext, ViolationDetector, ViolationRule};
