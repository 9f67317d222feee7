//! JSON model artifacts and the per-agent bundle loader.
//!
//! An agent directory holds up to three files, matched by name:
//! `*model*.json` (required), `*scaler*.json` and `*encoder*.json`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::model::Label;
use crate::domain::ports::{Classifier, FeatureScaler, InferenceError, LabelDecoder};
use crate::utils::error::{BlueGuardError, Result};

type InferenceResult<T> = std::result::Result<T, InferenceError>;

fn check_width(row: &[f64], expected: usize) -> InferenceResult<()> {
    if row.len() != expected {
        return Err(InferenceError::DimensionMismatch {
            expected,
            actual: row.len(),
        });
    }
    Ok(())
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

/// 多類別 logistic regression；單列係數為二元分類
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearClassifier {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub classes: Vec<Label>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LinearClassifier {
    pub fn new(classes: Vec<Label>, coefficients: Vec<Vec<f64>>, intercepts: Vec<f64>) -> Self {
        Self {
            feature_names: None,
            classes,
            coefficients,
            intercepts,
        }
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    fn n_features(&self) -> usize {
        self.coefficients.first().map(Vec::len).unwrap_or(0)
    }

    fn is_binary(&self) -> bool {
        self.coefficients.len() == 1 && self.classes.len() == 2
    }

    pub fn check(&self) -> std::result::Result<(), String> {
        let n = self.n_features();
        if n == 0 {
            return Err("coefficients are empty".to_string());
        }
        if self.coefficients.iter().any(|row| row.len() != n) {
            return Err("coefficient rows have different widths".to_string());
        }
        if self.intercepts.len() != self.coefficients.len() {
            return Err("one intercept per coefficient row is required".to_string());
        }
        if !self.is_binary() && self.coefficients.len() != self.classes.len() {
            return Err(format!(
                "{} classes but {} coefficient rows",
                self.classes.len(),
                self.coefficients.len()
            ));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != n {
                return Err(format!(
                    "{} feature names for {} coefficients",
                    names.len(),
                    n
                ));
            }
        }
        Ok(())
    }

    fn decision(&self, row: &[f64]) -> InferenceResult<Vec<f64>> {
        check_width(row, self.n_features())?;
        Ok(self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| w.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect())
    }

    fn probabilities(&self, row: &[f64]) -> InferenceResult<Vec<f64>> {
        let scores = self.decision(row)?;
        let proba = if self.is_binary() {
            let p = 1.0 / (1.0 + (-scores[0]).exp());
            vec![1.0 - p, p]
        } else {
            let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exp: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
            let total: f64 = exp.iter().sum();
            exp.into_iter().map(|e| e / total).collect()
        };
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::NonFinite);
        }
        Ok(proba)
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, rows: &[Vec<f64>]) -> InferenceResult<Vec<Label>> {
        rows.iter()
            .map(|row| {
                let proba = self.probabilities(row)?;
                argmax(&proba)
                    .map(|i| self.classes[i].clone())
                    .ok_or(InferenceError::NonFinite)
            })
            .collect()
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Option<InferenceResult<Vec<Vec<f64>>>> {
        Some(rows.iter().map(|row| self.probabilities(row)).collect())
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }
}

/// 最近質心分類器，不提供機率輸出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCentroid {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub classes: Vec<Label>,
    pub centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    pub fn new(classes: Vec<Label>, centroids: Vec<Vec<f64>>) -> Self {
        Self {
            feature_names: None,
            classes,
            centroids,
        }
    }

    pub fn check(&self) -> std::result::Result<(), String> {
        if self.centroids.is_empty() || self.centroids.len() != self.classes.len() {
            return Err("one centroid per class is required".to_string());
        }
        let n = self.centroids[0].len();
        if n == 0 || self.centroids.iter().any(|c| c.len() != n) {
            return Err("centroids must share a non-zero width".to_string());
        }
        Ok(())
    }
}

impl Classifier for NearestCentroid {
    fn predict(&self, rows: &[Vec<f64>]) -> InferenceResult<Vec<Label>> {
        let width = self.centroids.first().map(Vec::len).unwrap_or(0);
        rows.iter()
            .map(|row| {
                check_width(row, width)?;
                let distances: Vec<f64> = self
                    .centroids
                    .iter()
                    .map(|c| c.iter().zip(row).map(|(c, x)| (c - x).powi(2)).sum())
                    .collect();
                argmin(&distances)
                    .map(|i| self.classes[i].clone())
                    .ok_or(InferenceError::NonFinite)
            })
            .collect()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearClassifier),
    NearestCentroid(NearestCentroid),
}

impl ModelArtifact {
    pub fn check(&self) -> std::result::Result<(), String> {
        match self {
            ModelArtifact::Linear(m) => m.check(),
            ModelArtifact::NearestCentroid(m) => m.check(),
        }
    }
}

impl Classifier for ModelArtifact {
    fn predict(&self, rows: &[Vec<f64>]) -> InferenceResult<Vec<Label>> {
        match self {
            ModelArtifact::Linear(m) => m.predict(rows),
            ModelArtifact::NearestCentroid(m) => m.predict(rows),
        }
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Option<InferenceResult<Vec<Vec<f64>>>> {
        match self {
            ModelArtifact::Linear(m) => m.predict_proba(rows),
            ModelArtifact::NearestCentroid(m) => m.predict_proba(rows),
        }
    }

    fn feature_names(&self) -> Option<&[String]> {
        match self {
            ModelArtifact::Linear(m) => m.feature_names(),
            ModelArtifact::NearestCentroid(m) => m.feature_names(),
        }
    }
}

/// (x - mean) / scale；scale 為 0 的欄位只做平移
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { mean, scale }
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, rows: &[Vec<f64>]) -> InferenceResult<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                check_width(row, self.mean.len())?;
                Ok(row
                    .iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
                    .collect())
            })
            .collect()
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.mean.len())
    }
}

/// 類別編碼 → 名稱
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }
}

impl LabelDecoder for LabelEncoder {
    fn inverse_transform(&self, labels: &[Label]) -> InferenceResult<Vec<Label>> {
        labels
            .iter()
            .map(|label| match label {
                Label::Code(code) => usize::try_from(*code)
                    .ok()
                    .and_then(|i| self.classes.get(i))
                    .map(|name| Label::Name(name.clone()))
                    .ok_or(InferenceError::UnknownClass(*code)),
                Label::Name(name) if self.classes.contains(name) => Ok(label.clone()),
                Label::Name(name) => Err(InferenceError::Model(format!(
                    "label '{}' is not a known class",
                    name
                ))),
            })
            .collect()
    }
}

/// 單一 agent 目錄載入後的句柄
pub struct ModelBundle {
    pub model: Box<dyn Classifier>,
    pub scaler: Option<Box<dyn FeatureScaler>>,
    pub decoder: Option<Box<dyn LabelDecoder>>,
    pub path: PathBuf,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| BlueGuardError::ArtifactError {
        path: path.display().to_string(),
        message: format!("invalid artifact JSON: {}", e),
    })
}

/// 掃描 agent 目錄，依檔名載入 model / scaler / encoder
pub fn load_model_bundle(dir: &Path) -> Result<ModelBundle> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| BlueGuardError::ArtifactError {
            path: dir.display().to_string(),
            message: format!("cannot read agent directory: {}", e),
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    entries.sort();

    let mut model: Option<Box<dyn Classifier>> = None;
    let mut scaler: Option<Box<dyn FeatureScaler>> = None;
    let mut decoder: Option<Box<dyn LabelDecoder>> = None;

    for path in entries {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase();

        if file_name.contains("model") {
            let artifact: ModelArtifact = read_json(&path)?;
            artifact
                .check()
                .map_err(|message| BlueGuardError::ArtifactError {
                    path: path.display().to_string(),
                    message,
                })?;
            tracing::debug!("📦 Loaded model artifact {}", path.display());
            model = Some(Box::new(artifact));
        } else if file_name.contains("scaler") {
            let artifact: StandardScaler = read_json(&path)?;
            if artifact.mean.len() != artifact.scale.len() {
                return Err(BlueGuardError::ArtifactError {
                    path: path.display().to_string(),
                    message: "mean and scale lengths differ".to_string(),
                });
            }
            scaler = Some(Box::new(artifact));
        } else if file_name.contains("encoder") {
            let artifact: LabelEncoder = read_json(&path)?;
            decoder = Some(Box::new(artifact));
        }
    }

    let model = model.ok_or_else(|| BlueGuardError::ArtifactError {
        path: dir.display().to_string(),
        message: "no *model*.json artifact found".to_string(),
    })?;

    Ok(ModelBundle {
        model,
        scaler,
        decoder,
        path: dir.to_path_buf(),
    })
}
