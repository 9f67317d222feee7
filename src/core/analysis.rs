use std::sync::Arc;

use crate::agents::AgentRegistry;
use crate::core::risk::{assess, RiskInputs};
use crate::core::violation::{ViolationDetector, FISHING_LABEL};
use crate::domain::model::{
    Observation, PredictionOutcome, RoutedPrediction, ScoringRequest, VesselAnalysis,
    ZoneMembership,
};
use crate::geo::{classify, ZoneStore};

/// 觀測中可選的異常分數欄位；缺少時視為 0
pub const ANOMALY_SCORE_FEATURE: &str = "anomaly_score";

/// route → classify → detect → assess
///
/// registry 與 zone store 皆為唯讀，可在多個工作間共享。
pub struct VesselAnalyzer {
    registry: Arc<AgentRegistry>,
    zones: Arc<ZoneStore>,
    detector: ViolationDetector,
}

impl VesselAnalyzer {
    pub fn new(registry: Arc<AgentRegistry>, zones: Arc<ZoneStore>) -> Self {
        Self {
            registry,
            zones,
            detector: ViolationDetector::default(),
        }
    }

    pub fn with_detector(mut self, detector: ViolationDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn zones(&self) -> &ZoneStore {
        &self.zones
    }

    pub fn analyze(&self, observation: &Observation, preferred: Option<&str>) -> VesselAnalysis {
        let prediction = self.registry.route(observation, preferred);
        self.complete(observation, prediction)
    }

    pub fn analyze_request(&self, request: &ScoringRequest) -> VesselAnalysis {
        self.analyze(&request.observation, request.preferred_agent.as_deref())
    }

    /// 以既有的路由結果完成區域、違規與風險評估
    pub fn complete(&self, observation: &Observation, prediction: RoutedPrediction) -> VesselAnalysis {
        self.log_low_confidence(observation, &prediction);

        let membership = classify(observation, &self.zones);
        let label = prediction.outcome.label().map(|l| l.to_string());
        let violations = self
            .detector
            .detect(observation, label.as_deref(), &membership);

        let risk = assess(&risk_inputs(
            observation,
            &prediction.outcome,
            &membership,
            violations.len(),
        ));

        VesselAnalysis {
            vessel_id: observation.vessel_id().to_string(),
            timestamp: observation.timestamp(),
            latitude: observation.latitude(),
            longitude: observation.longitude(),
            prediction,
            membership,
            violations,
            risk,
        }
    }

    fn log_low_confidence(&self, observation: &Observation, prediction: &RoutedPrediction) {
        if !prediction.outcome.is_success() {
            return;
        }
        let agent = prediction
            .routing
            .agent_key()
            .and_then(|key| self.registry.get(key));
        if let Some(agent) = agent {
            if !agent.meets_threshold(&prediction.outcome) {
                tracing::debug!(
                    agent = agent.name(),
                    vessel = observation.vessel_id(),
                    "Low confidence {:?} (threshold {})",
                    prediction.outcome.confidence(),
                    agent.confidence_threshold()
                );
            }
        }
    }
}

fn fishing_probability(outcome: &PredictionOutcome) -> f64 {
    match outcome.label() {
        Some(label) if label.to_string() == FISHING_LABEL => outcome.confidence().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn risk_inputs(
    observation: &Observation,
    outcome: &PredictionOutcome,
    membership: &ZoneMembership,
    violation_count: usize,
) -> RiskInputs {
    RiskInputs {
        anomaly_score: observation.numeric(ANOMALY_SCORE_FEATURE).unwrap_or(0.0),
        zone_violation: membership.in_mpa(),
        violation_count,
        fishing_probability: fishing_probability(outcome),
    }
}
