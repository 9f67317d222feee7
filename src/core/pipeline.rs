use crate::core::service::ScoringService;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{
    AssessmentRecord, BatchResult, ScoringRequest, VesselAnalysis, PREFERRED_AGENT_FIELDS,
    TIMESTAMP_FIELD, VESSEL_ID_FIELD,
};
use crate::utils::error::{BlueGuardError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use zip::write::{FileOptions, ZipWriter};

pub const ASSESSMENTS_CSV: &str = "assessments.csv";
pub const ASSESSMENTS_JSON: &str = "assessments.json";
pub const VIOLATIONS_JSON: &str = "violations.json";
pub const SUMMARY_JSON: &str = "summary.json";

/// 讀取 CSV / JSON 觀測檔、並行評分、輸出評估結果
pub struct BatchPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    service: ScoringService,
    skipped_rows: AtomicUsize,
}

impl<S: Storage, C: ConfigProvider> BatchPipeline<S, C> {
    pub fn new(storage: S, config: C, service: ScoringService) -> Self {
        Self {
            storage,
            config,
            service,
            skipped_rows: AtomicUsize::new(0),
        }
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows.load(Ordering::Relaxed)
    }
}

fn is_identity_field(name: &str) -> bool {
    name == VESSEL_ID_FIELD || name == TIMESTAMP_FIELD || PREFERRED_AGENT_FIELDS.contains(&name)
}

/// CSV 欄位轉換：空值略過，可解析為浮點數者為數值，其餘為文字
pub fn parse_csv_rows(data: &[u8]) -> Result<Vec<HashMap<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut fields = HashMap::new();
        for (header, raw) in headers.iter().zip(record.iter()) {
            if raw.is_empty() {
                continue;
            }
            let value = if is_identity_field(header) {
                Value::String(raw.to_string())
            } else {
                raw.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(raw.to_string()))
            };
            fields.insert(header.to_string(), value);
        }
        rows.push(fields);
    }
    Ok(rows)
}

/// 接受物件陣列；單一物件視為只有一筆
pub fn parse_json_rows(data: &[u8]) -> Result<Vec<HashMap<String, Value>>> {
    let value: Value = serde_json::from_slice(data)?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(BlueGuardError::ValidationError {
                message: format!("expected a JSON array of observations, got {}", other),
            })
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(obj) => Ok(obj.into_iter().collect()),
            other => Err(BlueGuardError::ValidationError {
                message: format!("row {} is not an object: {}", i + 1, other),
            }),
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    vessel_id: &'a str,
    timestamp: String,
    latitude: f64,
    longitude: f64,
    success: bool,
    label: Option<&'a str>,
    confidence: Option<f64>,
    agent_name: Option<&'a str>,
    error: Option<&'a str>,
    routing: &'a str,
    in_mpa: bool,
    in_eez: bool,
    near_port: bool,
    risk_score: f64,
    violations: String,
    recommendations: String,
}

impl<'a> From<&'a AssessmentRecord> for CsvRow<'a> {
    fn from(r: &'a AssessmentRecord) -> Self {
        Self {
            vessel_id: &r.vessel_id,
            timestamp: r.timestamp.to_rfc3339(),
            latitude: r.latitude,
            longitude: r.longitude,
            success: r.success,
            label: r.label.as_deref(),
            confidence: r.confidence,
            agent_name: r.agent_name.as_deref(),
            error: r.error.as_deref(),
            routing: &r.routing,
            in_mpa: r.in_mpa,
            in_eez: r.in_eez,
            near_port: r.near_port,
            risk_score: r.risk_score,
            violations: r.violations.join("|"),
            recommendations: r.recommendations.join("; "),
        }
    }
}

pub fn assessments_csv(records: &[AssessmentRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| BlueGuardError::ProcessingError {
            message: format!("failed to flush CSV output: {}", e),
        })?;
    String::from_utf8(bytes).map_err(|e| BlueGuardError::ProcessingError {
        message: format!("CSV output is not UTF-8: {}", e),
    })
}

/// 批次統計：筆數、船舶數、時間範圍、違規、失敗與各 agent 使用次數
pub fn summarize(analyses: &[VesselAnalysis], skipped_rows: usize) -> Value {
    let vessels: HashSet<&str> = analyses.iter().map(|a| a.vessel_id.as_str()).collect();
    let start = analyses.iter().map(|a| a.timestamp).min();
    let end = analyses.iter().map(|a| a.timestamp).max();

    let mut per_agent: BTreeMap<String, usize> = BTreeMap::new();
    let mut failure_reasons: BTreeMap<String, usize> = BTreeMap::new();
    let mut per_label: BTreeMap<String, usize> = BTreeMap::new();
    let mut successes = 0;
    for analysis in analyses {
        let outcome = &analysis.prediction.outcome;
        if let Some(key) = analysis.prediction.routing.agent_key() {
            *per_agent.entry(key.to_string()).or_default() += 1;
        }
        match outcome.failure_reason() {
            Some(reason) => *failure_reasons.entry(reason.to_string()).or_default() += 1,
            None => successes += 1,
        }
        if let Some(label) = outcome.label() {
            *per_label.entry(label.to_string()).or_default() += 1;
        }
    }

    let violations: usize = analyses.iter().map(|a| a.violations.len()).sum();
    let flagged_vessels: HashSet<&str> = analyses
        .iter()
        .filter(|a| !a.violations.is_empty())
        .map(|a| a.vessel_id.as_str())
        .collect();
    let mean_risk = if analyses.is_empty() {
        0.0
    } else {
        analyses.iter().map(|a| a.risk.score).sum::<f64>() / analyses.len() as f64
    };

    json!({
        "total_records": analyses.len(),
        "skipped_rows": skipped_rows,
        "unique_vessels": vessels.len(),
        "time_range": {
            "start": start.map(|t| t.to_rfc3339()),
            "end": end.map(|t| t.to_rfc3339()),
        },
        "successful_predictions": successes,
        "failed_predictions": analyses.len() - successes,
        "failure_reasons": failure_reasons,
        "violations": violations,
        "vessels_with_violations": flagged_vessels.len(),
        "in_mpa": analyses.iter().filter(|a| a.membership.in_mpa()).count(),
        "agents": per_agent,
        "labels": per_label,
        "mean_risk_score": mean_risk,
    })
}

fn zip_files(files: &[(&str, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(*name, FileOptions::default())?;
        zip.write_all(data)?;
    }
    Ok(zip.finish()?.into_inner())
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for BatchPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<ScoringRequest>> {
        let input = self.config.input_path();
        tracing::debug!("Reading observations from: {}", input);
        let data = self.storage.read_file(input).await?;

        let extension = Path::new(input)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let mut rows = match extension.as_deref() {
            Some("csv") => parse_csv_rows(&data)?,
            Some("json") => parse_json_rows(&data)?,
            _ => {
                return Err(BlueGuardError::InvalidConfigValueError {
                    field: "input".to_string(),
                    value: input.to_string(),
                    reason: "Input must be a .csv or .json file".to_string(),
                })
            }
        };

        if let Some(max) = self.config.max_records() {
            if rows.len() > max {
                tracing::info!("✂️ Limiting input to {} of {} rows", max, rows.len());
                rows.truncate(max);
            }
        }

        let mut requests = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            match ScoringRequest::from_fields(row) {
                Ok(mut request) => {
                    if let Some(agent) = self.config.preferred_agent() {
                        request.preferred_agent = Some(agent.to_string());
                    }
                    requests.push(request);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Skipping row {}: {}", i + 1, e);
                    self.skipped_rows.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        Ok(requests)
    }

    async fn transform(&self, data: Vec<ScoringRequest>) -> Result<BatchResult> {
        let total = data.len();
        let permits = Arc::new(Semaphore::new(self.config.concurrent_requests().max(1)));
        let mut tasks = JoinSet::new();

        for (i, request) in data.into_iter().enumerate() {
            let service = self.service.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (i, service.score(request).await)
            });
        }

        // 輸出順序與輸入一致
        let mut slots: Vec<Option<VesselAnalysis>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            let (i, analysis) = joined.map_err(|e| BlueGuardError::ProcessingError {
                message: format!("scoring task failed: {}", e),
            })?;
            slots[i] = Some(analysis);
        }
        let analyses: Vec<VesselAnalysis> = slots.into_iter().flatten().collect();

        let records: Vec<AssessmentRecord> = analyses.iter().map(|a| a.to_record()).collect();
        let violations: Vec<_> = analyses.iter().flat_map(|a| a.violations.iter()).collect();

        Ok(BatchResult {
            csv_output: assessments_csv(&records)?,
            violations_json: serde_json::to_string_pretty(&violations)?,
            summary: summarize(&analyses, self.skipped_rows()),
            analyses,
        })
    }

    async fn load(&self, result: BatchResult) -> Result<String> {
        let mut files: Vec<(&str, Vec<u8>)> = Vec::new();
        for format in self.config.output_formats() {
            match format.as_str() {
                "csv" => files.push((ASSESSMENTS_CSV, result.csv_output.clone().into_bytes())),
                "json" => {
                    let records: Vec<AssessmentRecord> =
                        result.analyses.iter().map(|a| a.to_record()).collect();
                    files.push((ASSESSMENTS_JSON, serde_json::to_vec_pretty(&records)?));
                }
                other => tracing::warn!("⚠️ Unsupported output format '{}' ignored", other),
            }
        }
        files.push((VIOLATIONS_JSON, result.violations_json.into_bytes()));
        files.push((SUMMARY_JSON, serde_json::to_vec_pretty(&result.summary)?));

        let output_path = self.config.output_path();
        match self.config.archive_name() {
            Some(archive) => {
                tracing::debug!("Creating ZIP file with {} files", files.len());
                let zip_data = zip_files(&files)?;
                tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
                self.storage.write_file(archive, &zip_data).await?;
                Ok(format!("{}/{}", output_path, archive))
            }
            None => {
                for (name, data) in &files {
                    self.storage.write_file(name, data).await?;
                }
                Ok(output_path.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::artifacts::LinearClassifier;
    use crate::agents::{AgentRegistry, AgentSpec, ModelAgent};
    use crate::core::analysis::VesselAnalyzer;
    use crate::domain::model::{Label, ZoneType};
    use crate::geo::polygon::Polygon;
    use crate::geo::{Zone, ZoneStore};
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn put(&self, path: &str, data: &str) {
            self.files
                .lock()
                .await
                .insert(path.to_string(), data.as_bytes().to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                BlueGuardError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        input_path: String,
        output_formats: Vec<String>,
        max_records: Option<usize>,
        archive: Option<String>,
        preferred_agent: Option<String>,
    }

    impl MockConfig {
        fn new(input_path: &str) -> Self {
            Self {
                input_path: input_path.to_string(),
                output_formats: vec!["csv".to_string()],
                max_records: None,
                archive: None,
                preferred_agent: None,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_path(&self) -> &str {
            &self.input_path
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn concurrent_requests(&self) -> usize {
            3
        }

        fn max_records(&self) -> Option<usize> {
            self.max_records
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn archive_name(&self) -> Option<&str> {
            self.archive.as_deref()
        }

        fn preferred_agent(&self) -> Option<&str> {
            self.preferred_agent.as_deref()
        }
    }

    fn service() -> ScoringService {
        let model = LinearClassifier::new(
            vec![
                Label::Name("non-fishing".to_string()),
                Label::Name("fishing".to_string()),
            ],
            vec![vec![0.0, 1.0, 0.0, 0.0]],
            vec![0.0],
        );
        let agent = ModelAgent::builder(AgentSpec::fishing_trajectories(), Box::new(model))
            .build()
            .unwrap();
        let mut builder = AgentRegistry::builder();
        builder.register("fishing", agent, true).unwrap();

        let ring = vec![(11.0, 56.0), (12.0, 56.0), (12.0, 57.0), (11.0, 57.0)];
        let zones = ZoneStore::new(vec![Zone::new(
            ZoneType::Mpa,
            "Anholt Reef",
            vec![Polygon::new(ring, vec![]).unwrap()],
        )]);
        let analyzer = VesselAnalyzer::new(Arc::new(builder.build().unwrap()), Arc::new(zones));
        ScoringService::new(Arc::new(analyzer))
    }

    // sog_diff > 0 → fishing；V-1 在保護區內
    const CSV_INPUT: &str = "\
vessel_id,timestamp,LAT,LON,SOG,sog_diff,time_diff,distance,anomaly_score
V-1,2024-01-05T10:00:00Z,56.5,11.5,2.5,3.0,60,0.4,0.75
V-2,2024-01-05T11:00:00Z,40.0,3.0,12.0,-3.0,60,4.1,
V-1,2024-01-05T12:00:00Z,56.6,11.6,2.1,2.0,60,0.3,
,,,,1.0,1.0,1.0,1.0,
V-3,2024-01-05T09:00:00Z,10.0,10.0,,,,,
";

    #[test]
    fn test_parse_csv_rows_types() {
        let rows = parse_csv_rows(CSV_INPUT.as_bytes()).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0]["vessel_id"], json!("V-1"));
        assert_eq!(rows[0]["SOG"], json!(2.5));
        assert!(!rows[1].contains_key("anomaly_score"));
        assert!(!rows[4].contains_key("SOG"));
    }

    #[test]
    fn test_parse_json_rows_accepts_single_object() {
        let rows = parse_json_rows(br#"{"LAT": 1.0, "LON": 2.0}"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(parse_json_rows(b"[1, 2]").is_err());
        assert!(parse_json_rows(b"42").is_err());
    }

    #[tokio::test]
    async fn test_extract_skips_rows_without_coordinates() {
        let storage = MockStorage::new();
        storage.put("input.csv", CSV_INPUT).await;
        let pipeline = BatchPipeline::new(storage, MockConfig::new("input.csv"), service());

        let requests = pipeline.extract().await.unwrap();
        assert_eq!(requests.len(), 4);
        assert_eq!(pipeline.skipped_rows(), 1);
        assert_eq!(requests[0].observation.vessel_id(), "V-1");
    }

    #[tokio::test]
    async fn test_extract_respects_max_records_and_agent_override() {
        let storage = MockStorage::new();
        storage.put("input.csv", CSV_INPUT).await;
        let mut config = MockConfig::new("input.csv");
        config.max_records = Some(2);
        config.preferred_agent = Some("fishing".to_string());
        let pipeline = BatchPipeline::new(storage, config, service());

        let requests = pipeline.extract().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests
            .iter()
            .all(|r| r.preferred_agent.as_deref() == Some("fishing")));
    }

    #[tokio::test]
    async fn test_extract_rejects_unknown_extension() {
        let storage = MockStorage::new();
        storage.put("input.xml", "<ais/>").await;
        let pipeline = BatchPipeline::new(storage, MockConfig::new("input.xml"), service());
        assert!(pipeline.extract().await.is_err());
    }

    #[tokio::test]
    async fn test_transform_preserves_order_and_summarizes() {
        let storage = MockStorage::new();
        storage.put("input.csv", CSV_INPUT).await;
        let pipeline = BatchPipeline::new(storage, MockConfig::new("input.csv"), service());

        let requests = pipeline.extract().await.unwrap();
        let result = pipeline.transform(requests).await.unwrap();

        let ids: Vec<&str> = result.analyses.iter().map(|a| a.vessel_id.as_str()).collect();
        assert_eq!(ids, vec!["V-1", "V-2", "V-1", "V-3"]);

        assert_eq!(result.summary["total_records"], 4);
        assert_eq!(result.summary["skipped_rows"], 1);
        assert_eq!(result.summary["unique_vessels"], 3);
        assert_eq!(result.summary["violations"], 2);
        assert_eq!(result.summary["vessels_with_violations"], 1);
        assert_eq!(result.summary["failed_predictions"], 1);
        assert_eq!(result.summary["failure_reasons"]["no compatible agent"], 1);
        assert_eq!(result.summary["agents"]["fishing"], 3);
        assert_eq!(
            result.summary["time_range"]["start"],
            "2024-01-05T09:00:00+00:00"
        );

        assert!(result.csv_output.starts_with("vessel_id,timestamp,latitude"));
        assert_eq!(result.csv_output.lines().count(), 5);
        assert!(result.violations_json.contains("illegalFishing"));
    }

    #[tokio::test]
    async fn test_load_writes_individual_files() {
        let storage = MockStorage::new();
        storage.put("input.csv", CSV_INPUT).await;
        let mut config = MockConfig::new("input.csv");
        config.output_formats = vec!["csv".to_string(), "json".to_string()];
        let pipeline = BatchPipeline::new(storage.clone(), config, service());

        let requests = pipeline.extract().await.unwrap();
        let result = pipeline.transform(requests).await.unwrap();
        let output = pipeline.load(result).await.unwrap();

        assert_eq!(output, "test_output");
        for name in [ASSESSMENTS_CSV, ASSESSMENTS_JSON, VIOLATIONS_JSON, SUMMARY_JSON] {
            assert!(storage.get_file(name).await.is_some(), "missing {}", name);
        }
        let summary: Value =
            serde_json::from_slice(&storage.get_file(SUMMARY_JSON).await.unwrap()).unwrap();
        assert_eq!(summary["total_records"], 4);
    }

    #[tokio::test]
    async fn test_load_creates_zip_archive() {
        let storage = MockStorage::new();
        storage.put("input.json", r#"[{"vessel_id": "V-9", "LAT": 56.5, "LON": 11.5,
            "SOG": 1.0, "sog_diff": 1.0, "time_diff": 30.0, "distance": 0.1}]"#)
            .await;
        let mut config = MockConfig::new("input.json");
        config.archive = Some("blueguard_output.zip".to_string());
        let pipeline = BatchPipeline::new(storage.clone(), config, service());

        let requests = pipeline.extract().await.unwrap();
        let result = pipeline.transform(requests).await.unwrap();
        let output = pipeline.load(result).await.unwrap();

        assert_eq!(output, "test_output/blueguard_output.zip");
        let zip_data = storage.get_file("blueguard_output.zip").await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec![ASSESSMENTS_CSV, SUMMARY_JSON, VIOLATIONS_JSON]);
        assert!(storage.get_file(SUMMARY_JSON).await.is_none());
    }
}
