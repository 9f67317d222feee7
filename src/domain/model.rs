use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::utils::error::{BlueGuardError, Result};

/// 識別 / 路由欄位，不屬於模型特徵
pub const VESSEL_ID_FIELD: &str = "vessel_id";
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const LATITUDE_FIELDS: [&str; 3] = ["latitude", "LAT", "lat"];
pub const LONGITUDE_FIELDS: [&str; 3] = ["longitude", "LON", "lon"];
pub const PREFERRED_AGENT_FIELDS: [&str; 2] = ["preferred_agent", "preferredAgent"];

/// 單一船舶在某一時間點的觀測
///
/// 建構後不可變更；各元件只讀取並產生新的衍生值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    vessel_id: String,
    timestamp: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    features: HashMap<String, serde_json::Value>,
}

impl Observation {
    pub fn new(
        vessel_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        features: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            vessel_id: vessel_id.into(),
            timestamp,
            latitude,
            longitude,
            features,
        }
    }

    /// 由扁平欄位對應建立觀測，並取出可選的 preferred agent
    ///
    /// 經緯度為必要欄位；缺少時間戳記時使用目前時間。
    pub fn from_fields(
        mut fields: HashMap<String, serde_json::Value>,
    ) -> Result<(Self, Option<String>)> {
        let latitude = take_coordinate(&mut fields, &LATITUDE_FIELDS)?;
        let longitude = take_coordinate(&mut fields, &LONGITUDE_FIELDS)?;

        let vessel_id = match fields.remove(VESSEL_ID_FIELD) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => "unknown".to_string(),
        };

        let timestamp = match fields.remove(TIMESTAMP_FIELD) {
            Some(serde_json::Value::String(s)) => parse_timestamp(&s)?,
            Some(serde_json::Value::Null) | None => Utc::now(),
            Some(other) => {
                return Err(BlueGuardError::ValidationError {
                    message: format!("timestamp must be a string, got {}", other),
                })
            }
        };

        let mut preferred = None;
        for key in PREFERRED_AGENT_FIELDS {
            if let Some(serde_json::Value::String(s)) = fields.remove(key) {
                if !s.trim().is_empty() {
                    preferred = Some(s);
                }
            }
        }

        Ok((
            Self::new(vessel_id, timestamp, latitude, longitude, fields),
            preferred,
        ))
    }

    pub fn vessel_id(&self) -> &str {
        &self.vessel_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// null 值視為不存在
    pub fn has_feature(&self, name: &str) -> bool {
        matches!(self.features.get(name), Some(v) if !v.is_null())
    }

    pub fn feature(&self, name: &str) -> Option<&serde_json::Value> {
        self.features.get(name).filter(|v| !v.is_null())
    }

    /// 只接受 JSON 數值，不做字串轉換
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.feature(name).and_then(|v| v.as_f64())
    }

    /// 排序後的特徵名稱，供診斷訊息使用
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .features
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.clone())
            .collect();
        names.sort();
        names
    }
}

fn take_coordinate(
    fields: &mut HashMap<String, serde_json::Value>,
    aliases: &[&str],
) -> Result<f64> {
    for key in aliases {
        if let Some(value) = fields.remove(*key) {
            return value.as_f64().ok_or_else(|| BlueGuardError::ValidationError {
                message: format!("{} must be numeric, got {}", key, value),
            });
        }
    }
    Err(BlueGuardError::ValidationError {
        message: format!("missing coordinate field (one of {})", aliases.join(", ")),
    })
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%d/%m/%Y %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|e| BlueGuardError::ValidationError {
            message: format!("invalid timestamp '{}': {}", raw, e),
        })
}

/// 模型輸出的類別：編碼值或解碼後名稱
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Code(i64),
    Name(String),
}

impl Label {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Label::Name(s) => Some(s),
            Label::Code(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Code(c) => write!(f, "{}", c),
            Label::Name(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    Success {
        label: Label,
        confidence: Option<f64>,
        agent_name: String,
        purpose: String,
    },
    Failure {
        reason: String,
        agent_name: Option<String>,
    },
}

impl PredictionOutcome {
    pub fn failure(reason: impl Into<String>, agent_name: Option<&str>) -> Self {
        PredictionOutcome::Failure {
            reason: reason.into(),
            agent_name: agent_name.map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PredictionOutcome::Success { .. })
    }

    pub fn label(&self) -> Option<&Label> {
        match self {
            PredictionOutcome::Success { label, .. } => Some(label),
            PredictionOutcome::Failure { .. } => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            PredictionOutcome::Success { confidence, .. } => *confidence,
            PredictionOutcome::Failure { .. } => None,
        }
    }

    pub fn agent_name(&self) -> Option<&str> {
        match self {
            PredictionOutcome::Success { agent_name, .. } => Some(agent_name),
            PredictionOutcome::Failure { agent_name, .. } => agent_name.as_deref(),
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            PredictionOutcome::Failure { reason, .. } => Some(reason),
            PredictionOutcome::Success { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RoutingInfo {
    Explicit {
        agent_key: String,
    },
    AutoSelected {
        agent_key: String,
        compatible_agents: Vec<String>,
    },
    NoCompatibleAgent {
        available_agents: Vec<String>,
        input_features: Vec<String>,
    },
}

impl RoutingInfo {
    pub fn agent_key(&self) -> Option<&str> {
        match self {
            RoutingInfo::Explicit { agent_key } | RoutingInfo::AutoSelected { agent_key, .. } => {
                Some(agent_key)
            }
            RoutingInfo::NoCompatibleAgent { .. } => None,
        }
    }
}

impl fmt::Display for RoutingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingInfo::Explicit { agent_key } => {
                write!(f, "explicit routing: {}", agent_key)
            }
            RoutingInfo::AutoSelected {
                agent_key,
                compatible_agents,
            } => write!(
                f,
                "auto-selected: {} (compatible: {})",
                agent_key,
                compatible_agents.join(", ")
            ),
            RoutingInfo::NoCompatibleAgent { .. } => write!(f, "no compatible agent"),
        }
    }
}

/// Router 的輸出：預測結果加上路由資訊
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPrediction {
    pub outcome: PredictionOutcome,
    pub routing: RoutingInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneType {
    Mpa,
    Eez,
    Port,
}

impl ZoneType {
    /// 優先順序：MPA、EEZ、PORT
    pub const ALL: [ZoneType; 3] = [ZoneType::Mpa, ZoneType::Eez, ZoneType::Port];

    /// 區域資料目錄下對應的子資料夾
    pub fn folder_name(&self) -> &'static str {
        match self {
            ZoneType::Mpa => "mpa_zones",
            ZoneType::Eez => "eez_zones",
            ZoneType::Port => "ports",
        }
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZoneType::Mpa => "MPA",
            ZoneType::Eez => "EEZ",
            ZoneType::Port => "PORT",
        };
        write!(f, "{}", name)
    }
}

/// 單一觀測的區域歸屬；沒有紀錄的類型即為 false
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneMembership {
    matches: BTreeMap<ZoneType, Vec<String>>,
}

impl ZoneMembership {
    pub fn record_match(&mut self, zone_type: ZoneType, zone_name: impl Into<String>) {
        self.matches
            .entry(zone_type)
            .or_default()
            .push(zone_name.into());
    }

    pub fn is_member(&self, zone_type: ZoneType) -> bool {
        self.matches
            .get(&zone_type)
            .map(|names| !names.is_empty())
            .unwrap_or(false)
    }

    pub fn matched_names(&self, zone_type: ZoneType) -> &[String] {
        self.matches
            .get(&zone_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn in_mpa(&self) -> bool {
        self.is_member(ZoneType::Mpa)
    }

    pub fn in_eez(&self) -> bool {
        self.is_member(ZoneType::Eez)
    }

    pub fn near_port(&self) -> bool {
        self.is_member(ZoneType::Port)
    }

    pub fn flags(&self) -> BTreeMap<ZoneType, bool> {
        ZoneType::ALL
            .iter()
            .map(|zt| (*zt, self.is_member(*zt)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationFlag {
    pub rule_id: String,
    pub severity: Severity,
    pub vessel_id: String,
    pub evidence: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub recommendations: Vec<String>,
}

/// 一筆待評分的請求：觀測加上可選的指定 agent
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRequest {
    pub observation: Observation,
    pub preferred_agent: Option<String>,
}

impl ScoringRequest {
    pub fn new(observation: Observation) -> Self {
        Self {
            observation,
            preferred_agent: None,
        }
    }

    pub fn with_preferred_agent(mut self, key: impl Into<String>) -> Self {
        self.preferred_agent = Some(key.into());
        self
    }

    pub fn from_fields(fields: HashMap<String, serde_json::Value>) -> Result<Self> {
        let (observation, preferred_agent) = Observation::from_fields(fields)?;
        Ok(Self {
            observation,
            preferred_agent,
        })
    }
}

/// route → classify → detect → assess 的完整結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselAnalysis {
    pub vessel_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub prediction: RoutedPrediction,
    pub membership: ZoneMembership,
    pub violations: Vec<ViolationFlag>,
    pub risk: RiskAssessment,
}

impl VesselAnalysis {
    pub fn to_record(&self) -> AssessmentRecord {
        let outcome = &self.prediction.outcome;
        let purpose = match outcome {
            PredictionOutcome::Success { purpose, .. } => Some(purpose.clone()),
            PredictionOutcome::Failure { .. } => None,
        };

        AssessmentRecord {
            vessel_id: self.vessel_id.clone(),
            timestamp: self.timestamp,
            latitude: self.latitude,
            longitude: self.longitude,
            success: outcome.is_success(),
            label: outcome.label().map(|l| l.to_string()),
            confidence: outcome.confidence(),
            agent_name: outcome.agent_name().map(str::to_string),
            purpose,
            error: outcome.failure_reason().map(str::to_string),
            routing: self.prediction.routing.to_string(),
            in_mpa: self.membership.in_mpa(),
            in_eez: self.membership.in_eez(),
            near_port: self.membership.near_port(),
            risk_score: self.risk.score,
            recommendations: self.risk.recommendations.clone(),
            violations: self.violations.iter().map(|v| v.rule_id.clone()).collect(),
        }
    }
}

/// 提供給外部持久層的扁平紀錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub vessel_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub success: bool,
    pub label: Option<String>,
    pub confidence: Option<f64>,
    pub agent_name: Option<String>,
    pub purpose: Option<String>,
    pub error: Option<String>,
    pub routing: String,
    pub in_mpa: bool,
    pub in_eez: bool,
    pub near_port: bool,
    pub risk_score: f64,
    pub recommendations: Vec<String>,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub analyses: Vec<VesselAnalysis>,
    pub csv_output: String,
    pub violations_json: String,
    pub summary: serde_json::Value,
}
