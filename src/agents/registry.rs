use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::agents::agent::ModelAgent;
use crate::agents::artifacts::load_model_bundle;
use crate::config::toml_config::AgentsConfig;
use crate::domain::model::{Observation, PredictionOutcome, RoutedPrediction, RoutingInfo};
use crate::utils::error::{BlueGuardError, Result};

pub const NO_COMPATIBLE_AGENT: &str = "no compatible agent";

/// resolve() 的結果
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    Selected {
        agent_key: String,
        routing: RoutingInfo,
    },
    Unroutable(RoutedPrediction),
}

/// 已註冊 agent 的摘要資訊
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentInfo {
    pub key: String,
    pub name: String,
    pub purpose: String,
    pub required_features: Vec<String>,
    pub is_default: bool,
}

/// 啟動階段使用；build() 之後 registry 即為唯讀
#[derive(Default)]
pub struct AgentRegistryBuilder {
    agents: Vec<(String, ModelAgent)>,
    default_key: Option<String>,
}

impl AgentRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        agent: ModelAgent,
        is_default: bool,
    ) -> Result<&mut Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(BlueGuardError::RegistryError {
                message: "agent key cannot be empty".to_string(),
            });
        }
        if self.agents.iter().any(|(k, _)| *k == key) {
            return Err(BlueGuardError::RegistryError {
                message: format!("agent key '{}' registered twice", key),
            });
        }
        if is_default {
            if let Some(existing) = &self.default_key {
                return Err(BlueGuardError::RegistryError {
                    message: format!(
                        "'{}' cannot be default, '{}' already is",
                        key, existing
                    ),
                });
            }
            self.default_key = Some(key.clone());
        }

        tracing::info!(
            "✅ Registered agent: {} ({}){}",
            agent.name(),
            key,
            if is_default { " [default]" } else { "" }
        );
        self.agents.push((key, agent));
        Ok(self)
    }

    pub fn build(self) -> Result<AgentRegistry> {
        if self.agents.is_empty() {
            return Err(BlueGuardError::RegistryError {
                message: "no agents registered".to_string(),
            });
        }

        let index = self
            .agents
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (key.clone(), i))
            .collect();

        Ok(AgentRegistry {
            agents: self.agents,
            index,
            default_key: self.default_key,
        })
    }
}

/// 所有 agent 的唯讀集合，同時負責路由
///
/// 啟動後只讀，可在多個請求間以 `Arc` 共享而不需加鎖。
#[derive(Debug)]
pub struct AgentRegistry {
    agents: Vec<(String, ModelAgent)>,
    index: HashMap<String, usize>,
    default_key: Option<String>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::new()
    }

    /// 依設定載入每個 agent 的模型檔並依序註冊
    pub fn from_config(config: &AgentsConfig) -> Result<Self> {
        let mut builder = AgentRegistryBuilder::new();
        let root = Path::new(&config.artifact_root);

        for entry in &config.registry {
            let spec = entry.to_spec()?;
            let dir = root.join(&entry.artifact_dir);
            tracing::info!("📁 Loading agent '{}' from {}", entry.key, dir.display());

            let bundle = load_model_bundle(&dir)?;
            let agent = ModelAgent::builder(spec, bundle.model)
                .optional_scaler(bundle.scaler)
                .optional_decoder(bundle.decoder)
                .reconcile_features(entry.reconcile_features.unwrap_or(false))
                .build()?;

            builder.register(entry.key.clone(), agent, entry.default.unwrap_or(false))?;
        }

        builder.build()
    }

    pub fn get(&self, key: &str) -> Option<&ModelAgent> {
        self.index.get(key).map(|&i| &self.agents[i].1)
    }

    /// 註冊順序的 key 清單
    pub fn keys(&self) -> Vec<String> {
        self.agents.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn default_key(&self) -> Option<&str> {
        self.default_key.as_deref()
    }

    /// 給外部呼叫端的最終備援；route() 本身不會使用
    pub fn default_agent(&self) -> Option<&ModelAgent> {
        self.default_key.as_deref().and_then(|k| self.get(k))
    }

    pub fn find_compatible(&self, observation: &Observation) -> Vec<String> {
        self.agents
            .iter()
            .filter(|(_, agent)| agent.can_handle(observation))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// 指定的 agent 直接使用；否則取第一個相容的 agent
    ///
    /// 只做選擇，不執行推論。沒有相容 agent 時回傳診斷用的結果，不會退回 default。
    pub fn resolve(&self, observation: &Observation, preferred: Option<&str>) -> RouteDecision {
        if let Some(key) = preferred {
            if self.get(key).is_some() {
                tracing::debug!(
                    vessel = observation.vessel_id(),
                    "🎯 Explicit routing to '{}'",
                    key
                );
                return RouteDecision::Selected {
                    agent_key: key.to_string(),
                    routing: RoutingInfo::Explicit {
                        agent_key: key.to_string(),
                    },
                };
            }
            tracing::warn!(
                vessel = observation.vessel_id(),
                "⚠️ Preferred agent '{}' is not registered, auto-selecting",
                key
            );
        }

        let compatible = self.find_compatible(observation);
        let Some(chosen) = compatible.first().cloned() else {
            let available_agents = self.keys();
            let input_features = observation.feature_names();
            tracing::warn!(
                vessel = observation.vessel_id(),
                "❌ No compatible agent (available: {:?}, input: {:?})",
                available_agents,
                input_features
            );
            return RouteDecision::Unroutable(RoutedPrediction {
                outcome: PredictionOutcome::failure(NO_COMPATIBLE_AGENT, None),
                routing: RoutingInfo::NoCompatibleAgent {
                    available_agents,
                    input_features,
                },
            });
        };

        tracing::debug!(
            vessel = observation.vessel_id(),
            "🔀 Auto-selected '{}' from {:?}",
            chosen,
            compatible
        );
        RouteDecision::Selected {
            agent_key: chosen.clone(),
            routing: RoutingInfo::AutoSelected {
                agent_key: chosen,
                compatible_agents: compatible,
            },
        }
    }

    pub fn predict_with(&self, agent_key: &str, observation: &Observation) -> PredictionOutcome {
        match self.get(agent_key) {
            Some(agent) => agent.predict(observation),
            None => PredictionOutcome::failure(format!("unknown agent '{}'", agent_key), None),
        }
    }

    /// resolve() 後以選中的 agent 推論；同一輸入的選擇結果固定
    pub fn route(&self, observation: &Observation, preferred: Option<&str>) -> RoutedPrediction {
        match self.resolve(observation, preferred) {
            RouteDecision::Selected { agent_key, routing } => RoutedPrediction {
                outcome: self.predict_with(&agent_key, observation),
                routing,
            },
            RouteDecision::Unroutable(routed) => routed,
        }
    }

    pub fn agent_info(&self) -> Vec<AgentInfo> {
        self.agents
            .iter()
            .map(|(key, agent)| AgentInfo {
                key: key.clone(),
                name: agent.name().to_string(),
                purpose: agent.purpose().to_string(),
                required_features: agent.required_features().to_vec(),
                is_default: self.default_key.as_deref() == Some(key.as_str()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::artifacts::NearestCentroid;
    use crate::agents::spec::AgentSpec;
    use crate::domain::model::Label;
    use chrono::Utc;
    use serde_json::json;

    fn agent(spec: AgentSpec, label: &str) -> ModelAgent {
        let width = spec.required_features.len();
        let model = NearestCentroid::new(vec![Label::Name(label.to_string())], vec![vec![0.0; width]]);
        ModelAgent::builder(spec, Box::new(model)).build().unwrap()
    }

    fn registry() -> AgentRegistry {
        let mut builder = AgentRegistry::builder();
        builder
            .register("ais", agent(AgentSpec::ais(), "cargo"), false)
            .unwrap()
            .register("fishing", agent(AgentSpec::fishing_trajectories(), "fishing"), false)
            .unwrap()
            .register("kattegat", agent(AgentSpec::kattegat(), "transit"), true)
            .unwrap();
        builder.build().unwrap()
    }

    fn observation(features: serde_json::Value) -> Observation {
        Observation::new(
            "V-9",
            Utc::now(),
            56.0,
            11.0,
            serde_json::from_value(features).unwrap(),
        )
    }

    #[test]
    fn test_duplicate_keys_and_defaults_are_rejected() {
        let mut builder = AgentRegistry::builder();
        builder.register("a", agent(AgentSpec::ais(), "x"), true).unwrap();
        assert!(builder.register("a", agent(AgentSpec::ais(), "x"), false).is_err());
        assert!(builder
            .register("b", agent(AgentSpec::kattegat(), "x"), true)
            .is_err());
        assert!(AgentRegistry::builder().build().is_err());
    }

    #[test]
    fn test_first_registered_compatible_agent_wins() {
        let registry = registry();
        // SOG 是 ais 的指標；distance 是 fishing 的指標
        let obs = observation(json!({"SOG": 2.5, "sog_diff": 0.1, "time_diff": 60.0, "distance": 0.4}));

        let routed = registry.route(&obs, None);
        assert_eq!(
            routed.routing,
            RoutingInfo::AutoSelected {
                agent_key: "ais".to_string(),
                compatible_agents: vec!["ais".to_string(), "fishing".to_string()],
            }
        );
        // ais 缺少必要欄位 → 驗證失敗，不會改用下一個 agent
        assert!(!routed.outcome.is_success());
        assert_eq!(routed.outcome.agent_name(), Some("AIS Vessel Classifier"));
    }

    #[test]
    fn test_routing_is_deterministic() {
        let registry = registry();
        let obs = observation(json!({"length": 20.0, "draught": 3.0, "distance": 1.0}));

        let first = registry.route(&obs, None);
        for _ in 0..10 {
            assert_eq!(registry.route(&obs, None).routing, first.routing);
        }
        assert_eq!(first.routing.agent_key(), Some("fishing"));
    }

    #[test]
    fn test_explicit_routing_bypasses_compatibility() {
        let registry = registry();
        let obs = observation(json!({
            "SOG": 2.5, "COG": 90.0, "Heading": 92.0, "Length": 30.0, "Width": 8.0, "Draft": 4.0
        }));
        assert!(!registry.get("kattegat").unwrap().can_handle(&obs));

        let routed = registry.route(&obs, Some("kattegat"));
        assert_eq!(
            routed.routing,
            RoutingInfo::Explicit {
                agent_key: "kattegat".to_string()
            }
        );
        assert_eq!(routed.outcome.agent_name(), Some("Kattegat Region Analyzer"));
        assert!(routed.outcome.failure_reason().unwrap().contains("Missing features"));
    }

    #[test]
    fn test_unknown_preferred_agent_falls_back_to_auto() {
        let registry = registry();
        let obs = observation(json!({
            "SOG": 2.5, "COG": 90.0, "Heading": 92.0, "Length": 30.0, "Width": 8.0, "Draft": 4.0
        }));

        let routed = registry.route(&obs, Some("does-not-exist"));
        assert_eq!(routed.routing.agent_key(), Some("ais"));
        assert_eq!(routed.outcome.label(), Some(&Label::Name("cargo".to_string())));
    }

    #[test]
    fn test_no_compatible_agent_is_diagnostic_and_never_uses_default() {
        let registry = registry();
        let obs = observation(json!({"wind_speed": 12.0}));

        let routed = registry.route(&obs, None);
        assert_eq!(routed.outcome.failure_reason(), Some(NO_COMPATIBLE_AGENT));
        assert_eq!(routed.outcome.agent_name(), None);
        assert_eq!(
            routed.routing,
            RoutingInfo::NoCompatibleAgent {
                available_agents: vec![
                    "ais".to_string(),
                    "fishing".to_string(),
                    "kattegat".to_string()
                ],
                input_features: vec!["wind_speed".to_string()],
            }
        );
    }

    #[test]
    fn test_resolve_does_not_predict() {
        let registry = registry();
        let obs = observation(json!({"distance": 1.0}));
        match registry.resolve(&obs, None) {
            RouteDecision::Selected { agent_key, .. } => assert_eq!(agent_key, "fishing"),
            other => panic!("unexpected decision: {:?}", other),
        }
        let outcome = registry.predict_with("nope", &obs);
        assert!(outcome.failure_reason().unwrap().contains("unknown agent"));
    }

    #[test]
    fn test_agent_info_and_default() {
        let registry = registry();
        let info = registry.agent_info();

        assert_eq!(info.len(), 3);
        assert_eq!(info[1].key, "fishing");
        assert_eq!(info[1].required_features.len(), 4);
        assert!(info[2].is_default);
        assert_eq!(registry.default_key(), Some("kattegat"));
        assert_eq!(registry.default_agent().unwrap().name(), "Kattegat Region Analyzer");
    }
}
