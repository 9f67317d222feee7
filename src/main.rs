use blueguard::agents::AgentRegistry;
use blueguard::utils::{logger, validation::Validate};
use blueguard::{
    BatchEngine, BatchPipeline, BlueGuardError, CliConfig, LocalStorage, RunConfig,
    ScoringService, VesselAnalyzer, ZoneStore,
};
use clap::Parser;
use std::sync::Arc;

fn fail(e: &BlueGuardError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(e.severity().exit_code().max(1))
}

fn print_agents(registry: &AgentRegistry) {
    println!("🤖 Registered agents (routing order):");
    for info in registry.agent_info() {
        println!(
            "  {}{} - {}",
            info.key,
            if info.is_default { " [default]" } else { "" },
            info.name
        );
        println!("      purpose:  {}", info.purpose);
        println!("      features: {}", info.required_features.join(", "));
    }
}

fn display_run_summary(run: &RunConfig, registry: &AgentRegistry, zones: &ZoneStore, cli: &CliConfig) {
    println!("📋 Configuration Summary:");
    println!("  Service: {}", run.app.service.name);
    println!("  Input: {}", run.input_path);
    println!("  Output: {}", run.output_path);
    println!("  Formats: {}", run.app.load.output_formats.join(", "));
    if let Some(archive) = run.app.archive_name() {
        println!("  Compression: {} (ZIP)", archive);
    }
    println!("  Agents: {}", registry.keys().join(", "));
    for (zone_type, count) in zones.counts() {
        println!("  {} zones: {}", zone_type, count);
    }
    println!("  Concurrent Requests: {}", run.app.concurrent_requests());
    if let Some(timeout) = run.app.prediction_timeout() {
        println!("  Prediction Timeout: {:?}", timeout);
    }
    if let Some(agent) = &run.preferred_agent {
        println!("  Forced Agent: {}", agent);
    }
    if cli.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let run = cli.resolve();
    match &run {
        Ok(run) if run.app.json_logs() => logger::init_json_logger(),
        _ => logger::init_cli_logger(cli.verbose),
    }

    tracing::info!("🚀 Starting blueguard");
    tracing::info!("📁 Loading configuration from: {}", cli.config);
    let run = run.unwrap_or_else(|e| fail(&e));
    if cli.verbose {
        tracing::debug!("Run config: {:?}", run);
    }

    // --list-agents 與 --dry-run 不需要輸入檔
    let validation = if cli.list_agents || cli.dry_run {
        run.app.validate()
    } else {
        run.validate()
    };
    if let Err(e) = validation {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    let registry = Arc::new(AgentRegistry::from_config(&run.app.agents).unwrap_or_else(|e| fail(&e)));
    if cli.list_agents {
        print_agents(&registry);
        return Ok(());
    }

    let zones = Arc::new(ZoneStore::load_from_dir(&run.app.zones.root).unwrap_or_else(|e| fail(&e)));
    display_run_summary(&run, &registry, &zones, &cli);

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - agents and zones loaded, nothing scored");
        return Ok(());
    }

    let monitor_enabled = cli.monitor || run.app.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let service = ScoringService::new(Arc::new(VesselAnalyzer::new(registry, zones)))
        .with_timeout(run.app.prediction_timeout());
    let storage = LocalStorage::new(run.output_path.clone());
    let pipeline = BatchPipeline::new(storage, run, service);
    let engine = BatchEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            let skipped = engine.pipeline().skipped_rows();
            if skipped > 0 {
                tracing::warn!("⚠️ {} input rows were skipped", skipped);
            }
            tracing::info!("✅ Batch scoring completed successfully!");
            println!("✅ Batch scoring completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            if e.severity().exit_code() > 0 {
                fail(&e);
            }
            tracing::warn!("⚠️ {}", e);
        }
    }

    Ok(())
}
