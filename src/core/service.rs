use std::sync::Arc;
use std::time::Duration;

use crate::agents::{AgentRegistry, RouteDecision};
use crate::core::analysis::VesselAnalyzer;
use crate::domain::model::{
    Observation, PredictionOutcome, RoutedPrediction, ScoringRequest, VesselAnalysis,
};
use crate::domain::ports::InferenceError;

/// VesselAnalyzer 的非同步外殼
///
/// 推論移到 blocking 執行緒；設定逾時時，超時的請求回傳 Failure，
/// 其餘請求不受影響。
#[derive(Clone)]
pub struct ScoringService {
    analyzer: Arc<VesselAnalyzer>,
    prediction_timeout: Option<Duration>,
}

impl ScoringService {
    pub fn new(analyzer: Arc<VesselAnalyzer>) -> Self {
        Self {
            analyzer,
            prediction_timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.prediction_timeout = timeout;
        self
    }

    pub fn analyzer(&self) -> &Arc<VesselAnalyzer> {
        &self.analyzer
    }

    pub fn prediction_timeout(&self) -> Option<Duration> {
        self.prediction_timeout
    }

    pub async fn score(&self, request: ScoringRequest) -> VesselAnalysis {
        let ScoringRequest {
            observation,
            preferred_agent,
        } = request;
        let registry = Arc::clone(self.analyzer.registry());

        let prediction = match registry.resolve(&observation, preferred_agent.as_deref()) {
            RouteDecision::Selected { agent_key, routing } => RoutedPrediction {
                outcome: self
                    .predict(registry, agent_key, observation.clone())
                    .await,
                routing,
            },
            RouteDecision::Unroutable(routed) => routed,
        };

        self.analyzer.complete(&observation, prediction)
    }

    async fn predict(
        &self,
        registry: Arc<AgentRegistry>,
        agent_key: String,
        observation: Observation,
    ) -> PredictionOutcome {
        let agent_name = registry.get(&agent_key).map(|a| a.name().to_string());
        let vessel = observation.vessel_id().to_string();
        let task =
            tokio::task::spawn_blocking(move || registry.predict_with(&agent_key, &observation));

        let joined = match self.prediction_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    // blocking 工作無法中止，會在背景自行結束
                    let error = InferenceError::TimedOut(limit.as_millis() as u64);
                    tracing::warn!(vessel = %vessel, "⏱️ {}", error);
                    return PredictionOutcome::failure(error.to_string(), agent_name.as_deref());
                }
            },
            None => task.await,
        };

        joined.unwrap_or_else(|e| {
            let error = InferenceError::Panicked(e.to_string());
            tracing::error!(vessel = %vessel, "❌ {}", error);
            PredictionOutcome::failure(error.to_string(), agent_name.as_deref())
        })
    }
}
