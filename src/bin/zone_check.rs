use blueguard::geo::{check_zone, classify_point};
use blueguard::utils::{logger, validation::Validate};
use blueguard::{AppConfig, ZoneStore};
use clap::Parser;

#[derive(Parser)]
#[command(name = "zone-check")]
#[command(about = "Classify a coordinate against the MPA / EEZ / port zone data")]
struct Args {
    /// Latitude (WGS84 degrees)
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude (WGS84 degrees)
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Zone data directory; defaults to zones.root from the configuration
    #[arg(long)]
    zones: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, default_value = "blueguard.toml")]
    config: String,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn zones_root(args: &Args) -> blueguard::Result<String> {
    if let Some(root) = &args.zones {
        return Ok(root.clone());
    }
    let config = AppConfig::from_file(&args.config)?;
    config.validate()?;
    Ok(config.zones.root)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if !(-90.0..=90.0).contains(&args.lat) || !(-180.0..=180.0).contains(&args.lon) {
        eprintln!("❌ Coordinate ({}, {}) is outside WGS84 bounds", args.lat, args.lon);
        std::process::exit(1);
    }

    let store = match zones_root(&args).and_then(ZoneStore::load_from_dir) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("❌ Failed to load zones: {} (Severity: {:?})", e, e.severity());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    };

    let check = check_zone(args.lat, args.lon, &store);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&check)?);
        return Ok(());
    }

    println!("📍 ({}, {})", check.latitude, check.longitude);
    match (&check.zone_type, &check.zone_name) {
        (Some(zone_type), Some(name)) => println!("  Zone: {} ({})", name, zone_type),
        _ => println!("  Zone: none"),
    }
    let membership = classify_point(args.lat, args.lon, &store);
    for (zone_type, member) in membership.flags() {
        println!("  {}: {}", zone_type, if member { "yes" } else { "no" });
    }
    if check.is_violation {
        println!("  🚨 Inside a marine protected area");
    }

    Ok(())
}
