use serde_json::json;
use std::collections::BTreeMap;

use crate::domain::model::{Observation, Severity, ViolationFlag, ZoneMembership, ZoneType};

pub const ILLEGAL_FISHING: &str = "illegalFishing";
pub const FISHING_LABEL: &str = "fishing";

/// 規則的輸入；規則只讀取這三個值
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub observation: &'a Observation,
    pub behavior_label: Option<&'a str>,
    pub membership: &'a ZoneMembership,
}

/// 各規則互相獨立、無副作用，每次評估產生零或一個 flag
pub trait ViolationRule: Send + Sync {
    fn rule_id(&self) -> &str;
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<ViolationFlag>;
}

pub fn is_illegal_fishing(membership: &ZoneMembership, behavior_label: Option<&str>) -> bool {
    membership.in_mpa() && behavior_label == Some(FISHING_LABEL)
}

/// 在海洋保護區內從事捕撈
pub struct IllegalFishingRule;

impl ViolationRule for IllegalFishingRule {
    fn rule_id(&self) -> &str {
        ILLEGAL_FISHING
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<ViolationFlag> {
        if !is_illegal_fishing(ctx.membership, ctx.behavior_label) {
            return None;
        }

        let mut evidence = BTreeMap::new();
        evidence.insert("behavior".to_string(), json!(FISHING_LABEL));
        evidence.insert(
            "mpa_zones".to_string(),
            json!(ctx.membership.matched_names(ZoneType::Mpa)),
        );
        evidence.insert("latitude".to_string(), json!(ctx.observation.latitude()));
        evidence.insert("longitude".to_string(), json!(ctx.observation.longitude()));

        Some(ViolationFlag {
            rule_id: ILLEGAL_FISHING.to_string(),
            severity: Severity::High,
            vessel_id: ctx.observation.vessel_id().to_string(),
            evidence,
            timestamp: ctx.observation.timestamp(),
        })
    }
}

pub struct ViolationDetector {
    rules: Vec<Box<dyn ViolationRule>>,
}

impl Default for ViolationDetector {
    fn default() -> Self {
        Self {
            rules: vec![Box::new(IllegalFishingRule)],
        }
    }
}

impl ViolationDetector {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: Box<dyn ViolationRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.rule_id()).collect()
    }

    pub fn detect(
        &self,
        observation: &Observation,
        behavior_label: Option<&str>,
        membership: &ZoneMembership,
    ) -> Vec<ViolationFlag> {
        let ctx = RuleContext {
            observation,
            behavior_label,
            membership,
        };
        let flags: Vec<ViolationFlag> = self.rules.iter().filter_map(|r| r.evaluate(&ctx)).collect();

        for flag in &flags {
            tracing::warn!(
                vessel = %flag.vessel_id,
                "🚨 Violation {} ({:?})",
                flag.rule_id,
                flag.severity
            );
        }
        flags
    }
}

/// 使用預設規則集
pub fn detect_violations(
    observation: &Observation,
    behavior_label: Option<&str>,
    membership: &ZoneMembership,
) -> Vec<ViolationFlag> {
    ViolationDetector::default().detect(observation, behavior_label, membership)
}
