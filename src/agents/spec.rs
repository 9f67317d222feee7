use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::utils::error::{BlueGuardError, Result};
use crate::utils::validation::{validate_feature_list, validate_non_empty_string, validate_range};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Agent 的宣告式設定：名稱、用途、特徵契約與指標欄位
///
/// 新的船舶模型只需要新增一份設定，不需要新的控制流程。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub purpose: String,
    /// 相容性判斷與輸入模型的欄位順序
    pub required_features: Vec<String>,
    /// can_handle 使用的寬鬆指標：任一存在即視為可能相容
    pub indicators: Vec<String>,
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentVariant {
    Ais,
    Fishing,
    Kattegat,
    Custom,
}

impl AgentVariant {
    pub fn preset(&self) -> Option<AgentSpec> {
        match self {
            AgentVariant::Ais => Some(AgentSpec::ais()),
            AgentVariant::Fishing => Some(AgentSpec::fishing_trajectories()),
            AgentVariant::Kattegat => Some(AgentSpec::kattegat()),
            AgentVariant::Custom => None,
        }
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl AgentSpec {
    pub fn new(
        name: impl Into<String>,
        purpose: impl Into<String>,
        required_features: Vec<String>,
        indicators: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
            required_features,
            indicators,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// AIS 船型分類：所有必要欄位都是指標
    pub fn ais() -> Self {
        let features = names(&["SOG", "COG", "Heading", "Length", "Width", "Draft"]);
        Self::new(
            "AIS Vessel Classifier",
            "Classify vessel type based on AIS data (SOG, COG, Heading, Length, Width, Draft)",
            features.clone(),
            features,
        )
    }

    pub fn fishing_trajectories() -> Self {
        Self::new(
            "Fishing Behavior Predictor",
            "Predict fishing behavior based on vessel trajectory patterns",
            names(&["SOG", "sog_diff", "time_diff", "distance"]),
            names(&["sog_diff", "time_diff", "distance"]),
        )
    }

    pub fn kattegat() -> Self {
        Self::new(
            "Kattegat Region Analyzer",
            "Analyze vessel behavior in Kattegat region (Jan-Mar period)",
            names(&["length", "draught", "cog", "heading", "speed", "area"]),
            names(&["length", "draught", "area"]),
        )
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_non_empty_string("agent.name", &self.name)?;
        validate_feature_list("agent.required_features", &self.required_features)?;
        validate_feature_list("agent.indicators", &self.indicators)?;
        validate_range(
            "agent.confidence_threshold",
            self.confidence_threshold,
            0.0,
            1.0,
        )?;

        let required: HashSet<&str> = self.required_features.iter().map(String::as_str).collect();
        if !self.indicators.iter().any(|i| required.contains(i.as_str())) {
            return Err(BlueGuardError::InvalidConfigValueError {
                field: "agent.indicators".to_string(),
                value: self.indicators.join(","),
                reason: format!(
                    "Indicators of '{}' must overlap its required features",
                    self.name
                ),
            });
        }
        Ok(())
    }

    /// 以模型本身記錄的特徵重建宣告；指標取交集，交集為空時改用全部特徵
    pub fn reconciled_with(&self, model_features: &[String]) -> Self {
        let model_set: HashSet<&str> = model_features.iter().map(String::as_str).collect();
        let mut indicators: Vec<String> = self
            .indicators
            .iter()
            .filter(|i| model_set.contains(i.as_str()))
            .cloned()
            .collect();
        if indicators.is_empty() {
            indicators = model_features.to_vec();
        }

        Self {
            required_features: model_features.to_vec(),
            indicators,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for variant in [AgentVariant::Ais, AgentVariant::Fishing, AgentVariant::Kattegat] {
            let spec = variant.preset().unwrap();
            assert!(spec.validate().is_ok(), "{} should be valid", spec.name);
            assert_eq!(spec.confidence_threshold, 0.7);
        }
        assert!(AgentVariant::Custom.preset().is_none());
    }

    #[test]
    fn test_disjoint_indicators_are_rejected() {
        let spec = AgentSpec::new(
            "broken",
            "p",
            names(&["a", "b"]),
            names(&["c"]),
        );
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_reconcile_keeps_overlapping_indicators() {
        let spec = AgentSpec::fishing_trajectories();
        let model = names(&["SOG", "distance", "heading_change"]);
        let rebuilt = spec.reconciled_with(&model);

        assert_eq!(rebuilt.required_features, model);
        assert_eq!(rebuilt.indicators, names(&["distance"]));
        assert_eq!(rebuilt.name, spec.name);
    }

    #[test]
    fn test_reconcile_falls_back_to_all_features() {
        let spec = AgentSpec::kattegat();
        let model = names(&["x", "y"]);
        let rebuilt = spec.reconciled_with(&model);
        assert_eq!(rebuilt.indicators, model);
    }
}
