use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// 依序執行 extract → transform → load
pub struct BatchEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> BatchEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting batch scoring");
        self.monitor.log_stats("Start");

        let requests = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} observations", requests.len());
        self.monitor.log_throughput("Extract", requests.len());

        let result = self.pipeline.transform(requests).await?;
        tracing::info!(
            "🧭 Scored {} observations ({} violations)",
            result.analyses.len(),
            result.summary["violations"]
        );
        self.monitor.log_stats("Transform");
        self.monitor.log_throughput("Transform", result.analyses.len());

        let output_path = self.pipeline.load(result).await?;
        tracing::info!("💾 Output saved to: {}", output_path);
        self.monitor.log_final_stats();

        Ok(output_path)
    }
}
