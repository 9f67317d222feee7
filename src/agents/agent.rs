use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

use crate::agents::spec::AgentSpec;
use crate::domain::model::{Label, Observation, PredictionOutcome};
use crate::domain::ports::{Classifier, FeatureScaler, InferenceError, LabelDecoder};
use crate::utils::error::{BlueGuardError, Result};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    #[error("Missing features: {0:?}")]
    MissingFeatures(Vec<String>),

    #[error("Features must be numeric: {0:?}")]
    NonNumeric(Vec<String>),
}

/// 包裝一個已訓練模型及其特徵契約
///
/// 建構完成後不可變更，模型、scaler、decoder 由 agent 獨佔。
pub struct ModelAgent {
    spec: AgentSpec,
    model: Box<dyn Classifier>,
    scaler: Option<Box<dyn FeatureScaler>>,
    decoder: Option<Box<dyn LabelDecoder>>,
}

impl std::fmt::Debug for ModelAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAgent")
            .field("spec", &self.spec)
            .field("scaler", &self.scaler.is_some())
            .field("decoder", &self.decoder.is_some())
            .finish()
    }
}

pub struct ModelAgentBuilder {
    spec: AgentSpec,
    model: Box<dyn Classifier>,
    scaler: Option<Box<dyn FeatureScaler>>,
    decoder: Option<Box<dyn LabelDecoder>>,
    reconcile_features: bool,
}

impl ModelAgentBuilder {
    pub fn scaler(mut self, scaler: Box<dyn FeatureScaler>) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn decoder(mut self, decoder: Box<dyn LabelDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn optional_scaler(mut self, scaler: Option<Box<dyn FeatureScaler>>) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn optional_decoder(mut self, decoder: Option<Box<dyn LabelDecoder>>) -> Self {
        self.decoder = decoder;
        self
    }

    /// 以模型記錄的特徵清單取代宣告的清單
    pub fn reconcile_features(mut self, enabled: bool) -> Self {
        self.reconcile_features = enabled;
        self
    }

    /// 驗證宣告與模型是否一致，不一致時直接失敗
    pub fn build(self) -> Result<ModelAgent> {
        let mut spec = self.spec;

        if let Some(model_features) = self.model.feature_names() {
            if model_features != spec.required_features.as_slice() {
                if self.reconcile_features {
                    tracing::info!(
                        "🔧 Reconciling '{}' features from model metadata: {:?} -> {:?}",
                        spec.name,
                        spec.required_features,
                        model_features
                    );
                    spec = spec.reconciled_with(model_features);
                } else {
                    return Err(BlueGuardError::FeatureMismatch {
                        agent: spec.name.clone(),
                        declared: spec.required_features.clone(),
                        model: model_features.to_vec(),
                    });
                }
            }
        }

        spec.validate()?;

        if let Some(n) = self.scaler.as_ref().and_then(|s| s.n_features()) {
            if n != spec.required_features.len() {
                return Err(BlueGuardError::FeatureMismatch {
                    agent: spec.name.clone(),
                    declared: spec.required_features.clone(),
                    model: vec![format!("<scaler with {} features>", n)],
                });
            }
        }

        Ok(ModelAgent {
            spec,
            model: self.model,
            scaler: self.scaler,
            decoder: self.decoder,
        })
    }
}

impl ModelAgent {
    pub fn builder(spec: AgentSpec, model: Box<dyn Classifier>) -> ModelAgentBuilder {
        ModelAgentBuilder {
            spec,
            model,
            scaler: None,
            decoder: None,
            reconcile_features: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn purpose(&self) -> &str {
        &self.spec.purpose
    }

    pub fn required_features(&self) -> &[String] {
        &self.spec.required_features
    }

    pub fn indicators(&self) -> &[String] {
        &self.spec.indicators
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.spec.confidence_threshold
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    /// 寬鬆判斷：任一指標欄位存在即回傳 true，不代表輸入有效
    pub fn can_handle(&self, observation: &Observation) -> bool {
        self.spec
            .indicators
            .iter()
            .any(|name| observation.has_feature(name))
    }

    /// 檢查必要欄位是否齊全且為數值，不做任何轉換
    pub fn validate(&self, observation: &Observation) -> std::result::Result<(), ValidationFailure> {
        let missing: Vec<String> = self
            .spec
            .required_features
            .iter()
            .filter(|name| !observation.has_feature(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ValidationFailure::MissingFeatures(missing));
        }

        let non_numeric: Vec<String> = self
            .spec
            .required_features
            .iter()
            .filter(|name| observation.numeric(name).is_none())
            .cloned()
            .collect();
        if !non_numeric.is_empty() {
            return Err(ValidationFailure::NonNumeric(non_numeric));
        }

        Ok(())
    }

    /// 依 required_features 的順序投影觀測，並套用 scaler
    pub fn preprocess(&self, observation: &Observation) -> std::result::Result<Vec<f64>, InferenceError> {
        let row: Vec<f64> = self
            .spec
            .required_features
            .iter()
            .map(|name| observation.numeric(name).unwrap_or(f64::NAN))
            .collect();

        match &self.scaler {
            Some(scaler) => {
                let mut scaled = scaler.transform(&[row])?;
                scaled
                    .pop()
                    .ok_or_else(|| InferenceError::Model("scaler returned no rows".to_string()))
            }
            None => Ok(row),
        }
    }

    /// validate → preprocess → infer → decode；推論錯誤一律轉為 Failure
    pub fn predict(&self, observation: &Observation) -> PredictionOutcome {
        if let Err(failure) = self.validate(observation) {
            tracing::debug!(
                agent = %self.spec.name,
                vessel = observation.vessel_id(),
                "Validation failed: {}",
                failure
            );
            return PredictionOutcome::failure(failure.to_string(), Some(&self.spec.name));
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.infer(observation)))
            .unwrap_or_else(|payload| Err(InferenceError::Panicked(panic_message(payload))));

        match result {
            Ok((label, confidence)) => PredictionOutcome::Success {
                label,
                confidence,
                agent_name: self.spec.name.clone(),
                purpose: self.spec.purpose.clone(),
            },
            Err(e) => {
                tracing::warn!(
                    agent = %self.spec.name,
                    vessel = observation.vessel_id(),
                    "❌ Inference failed: {}",
                    e
                );
                PredictionOutcome::failure(e.to_string(), Some(&self.spec.name))
            }
        }
    }

    /// 信心值低於門檻時回傳 false；沒有信心值視為未達門檻
    pub fn meets_threshold(&self, outcome: &PredictionOutcome) -> bool {
        outcome
            .confidence()
            .map(|c| c >= self.spec.confidence_threshold)
            .unwrap_or(false)
    }

    fn infer(&self, observation: &Observation) -> std::result::Result<(Label, Option<f64>), InferenceError> {
        let row = self.preprocess(observation)?;
        let expected = self.spec.required_features.len();
        if row.len() != expected {
            return Err(InferenceError::DimensionMismatch {
                expected,
                actual: row.len(),
            });
        }
        let rows = vec![row];

        let mut labels = self.model.predict(&rows)?;

        // 取最大類別機率，不論預測的是哪個類別
        let confidence = match self.model.predict_proba(&rows) {
            Some(proba) => {
                let proba = proba?;
                let best = proba
                    .first()
                    .and_then(|p| p.iter().copied().reduce(f64::max))
                    .ok_or_else(|| InferenceError::Model("empty probability output".to_string()))?;
                if !best.is_finite() {
                    return Err(InferenceError::NonFinite);
                }
                if !(0.0..=1.0).contains(&best) {
                    return Err(InferenceError::Model(format!(
                        "probability {} outside [0, 1]",
                        best
                    )));
                }
                Some(best)
            }
            None => None,
        };

        if let Some(decoder) = &self.decoder {
            labels = decoder.inverse_transform(&labels)?;
        }

        let label = labels
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::Model("model returned no prediction".to_string()))?;

        Ok((label, confidence))
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
