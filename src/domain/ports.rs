use crate::domain::model::{BatchResult, Label, ScoringRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use thiserror::Error;

/// 推論期間的錯誤；只在 agent 內部傳遞，最後轉為 PredictionOutcome::Failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("expected {expected} input columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown class code {0}")]
    UnknownClass(i64),

    #[error("model produced a non-finite value")]
    NonFinite,

    #[error("model panicked: {0}")]
    Panicked(String),

    #[error("prediction timed out after {0} ms")]
    TimedOut(u64),

    #[error("{0}")]
    Model(String),
}

/// 已訓練模型的不透明句柄
pub trait Classifier: Send + Sync {
    fn predict(&self, rows: &[Vec<f64>]) -> std::result::Result<Vec<Label>, InferenceError>;

    /// 不支援機率輸出時回傳 None
    fn predict_proba(
        &self,
        _rows: &[Vec<f64>],
    ) -> Option<std::result::Result<Vec<Vec<f64>>, InferenceError>> {
        None
    }

    /// 模型訓練時使用的特徵名稱 (若有記錄)
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

pub trait FeatureScaler: Send + Sync {
    fn transform(&self, rows: &[Vec<f64>]) -> std::result::Result<Vec<Vec<f64>>, InferenceError>;

    fn n_features(&self) -> Option<usize> {
        None
    }
}

pub trait LabelDecoder: Send + Sync {
    fn inverse_transform(
        &self,
        labels: &[Label],
    ) -> std::result::Result<Vec<Label>, InferenceError>;
}

/// 批次執行所需的設定值
pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn concurrent_requests(&self) -> usize;
    fn max_records(&self) -> Option<usize>;
    fn output_formats(&self) -> &[String];
    /// 設定時將所有輸出打包成此名稱的 zip
    fn archive_name(&self) -> Option<&str>;
    /// 覆寫每一筆輸入的指定 agent
    fn preferred_agent(&self) -> Option<&str>;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<ScoringRequest>>;
    async fn transform(&self, data: Vec<ScoringRequest>) -> Result<BatchResult>;
    async fn load(&self, result: BatchResult) -> Result<String>;
}
