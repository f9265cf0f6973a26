use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// Runs extract, transform and load once. Returns the destination.
    ///
    /// A failing load aborts the run; rows appended before the failure remain.
    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting ETL process");
        self.monitor.log_stats("Start");

        tracing::info!("📥 Extracting data...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("📊 Extracted {} rows", raw_data.len());
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Parsing rows...");
        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!("📊 Parsed {} records", transformed.records.len());
        self.monitor.log_stats("Transform");

        tracing::info!("📤 Loading data...");
        let destination = self.pipeline.load(transformed).await?;
        tracing::info!("📁 Rows appended to: {}", destination);
        self.monitor.log_stats("Load");

        self.monitor.log_final_stats();
        Ok(destination)
    }
}
