use crate::domain::model::RiskAssessment;

pub const ANOMALY_WEIGHT: f64 = 0.4;
pub const ZONE_VIOLATION_WEIGHT: f64 = 0.3;
pub const VIOLATION_COUNT_WEIGHT: f64 = 0.1;

pub const ANOMALY_ALERT_THRESHOLD: f64 = 0.7;
pub const FISHING_ALERT_THRESHOLD: f64 = 0.8;

pub const RESTRICTED_ZONE_MESSAGE: &str =
    "Vessel is in restricted zone - immediate attention required";
pub const ANOMALY_MESSAGE: &str = "Vessel showing anomalous behavior - monitor closely";
pub const FISHING_PERMIT_MESSAGE: &str = "High probability of fishing activity - verify permits";
pub const NO_ACTION_MESSAGE: &str = "No immediate action required - continue monitoring";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskInputs {
    pub anomaly_score: f64,
    pub zone_violation: bool,
    pub violation_count: usize,
    pub fishing_probability: f64,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn assess_risk(anomaly_score: f64, zone_violation: bool, violation_count: usize) -> RiskAssessment {
    assess(&RiskInputs {
        anomaly_score,
        zone_violation,
        violation_count,
        fishing_probability: 0.0,
    })
}

/// 固定權重：anomaly × 0.4 + 區域違規 0.3 + 違規數 × 0.1，上限 1.0
pub fn assess(inputs: &RiskInputs) -> RiskAssessment {
    let anomaly = finite_or_zero(inputs.anomaly_score);
    let fishing = finite_or_zero(inputs.fishing_probability);

    let contributions = [
        anomaly * ANOMALY_WEIGHT,
        if inputs.zone_violation {
            ZONE_VIOLATION_WEIGHT
        } else {
            0.0
        },
        inputs.violation_count as f64 * VIOLATION_COUNT_WEIGHT,
    ];
    let score = contributions.iter().sum::<f64>().clamp(0.0, 1.0);

    let mut recommendations = Vec::new();
    if inputs.zone_violation {
        recommendations.push(RESTRICTED_ZONE_MESSAGE.to_string());
    }
    if anomaly > ANOMALY_ALERT_THRESHOLD {
        recommendations.push(ANOMALY_MESSAGE.to_string());
    }
    if fishing > FISHING_ALERT_THRESHOLD {
        recommendations.push(FISHING_PERMIT_MESSAGE.to_string());
    }
    if recommendations.is_empty() {
        recommendations.push(NO_ACTION_MESSAGE.to_string());
    }

    RiskAssessment {
        score,
        recommendations,
    }
}
