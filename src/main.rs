use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use weather_risk_engine::config::EngineConfig;
use weather_risk_engine::domain::RiskProfile;
use weather_risk_engine::engine::WeatherEngine;
use weather_risk_engine::provider::ProviderClient;
use weather_risk_engine::providers::windy::WindyClient;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "weather-risk-engine",
    about = "Fuse multi-source forecasts for a point in Argentina and score operational risk",
    after_help = "Example:\n  \
    weather-risk-engine --lat -34.6037 --lon -58.3816 --hours 48 --profile farmer"
)]
struct Cli {
    /// Latitude in degrees (-90 to 90)
    #[arg(long)]
    lat: f64,

    /// Longitude in degrees (-180 to 180)
    #[arg(long)]
    lon: f64,

    /// Forecast horizon in hours
    #[arg(long, default_value_t = 48)]
    hours: u32,

    /// Risk profile to score against
    #[arg(long, default_value = "general")]
    profile: String,
}

fn parse_profile(name: &str) -> Result<RiskProfile> {
    Ok(match name {
        "general" => RiskProfile::General,
        "pilot" => RiskProfile::Pilot,
        "trucker" => RiskProfile::Trucker,
        "farmer" => RiskProfile::Farmer,
        "outdoor_sports" => RiskProfile::OutdoorSports,
        "outdoor_event" => RiskProfile::OutdoorEvent,
        "construction" => RiskProfile::Construction,
        "tourism" => RiskProfile::Tourism,
        other => anyhow::bail!(
            "Unknown profile '{other}'. Available: general, pilot, trucker, farmer, \
             outdoor_sports, outdoor_event, construction, tourism"
        ),
    })
}

fn print_error(error_type: &str, message: &str) {
    eprintln!("\n{}", "=".repeat(70));
    eprintln!("{error_type}");
    eprintln!("{}", "=".repeat(70));
    eprintln!("\n{message}");
    eprintln!("\n{}", "=".repeat(70));
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error("ERROR", &format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let profile = parse_profile(&cli.profile)?;
    let config = EngineConfig::from_env()?;

    let http = reqwest::Client::builder().timeout(config.http_timeout).build()?;
    let api_key = config
        .windy_point_forecast_api_key
        .clone()
        .unwrap_or_else(|| "demo".to_string());

    let providers: Vec<Arc<dyn ProviderClient>> = vec![
        Arc::new(WindyClient::new(http.clone(), api_key.clone(), weather_risk_engine::domain::SourceID::WindyEcmwf)),
        Arc::new(WindyClient::new(http.clone(), api_key.clone(), weather_risk_engine::domain::SourceID::WindyGfs)),
        Arc::new(WindyClient::new(http, api_key, weather_risk_engine::domain::SourceID::WindyIcon)),
    ];

    let engine = WeatherEngine::new(config, providers);

    let forecasts = engine.get_unified_forecast(cli.lat, cli.lon, cli.hours, None).await?;
    let patterns = engine.detect_patterns(&forecasts);
    let alerts = engine.generate_alerts(&patterns, &forecasts, chrono::Utc::now());
    let risk = engine.calculate_risk(profile, &forecasts, &patterns, &alerts, cli.hours)?;

    println!("{}", serde_json::to_string_pretty(&forecasts)?);
    println!("Detected {} pattern(s), {} alert(s).", patterns.len(), alerts.len());
    println!(
        "Risk ({:?}): score={:.2} category={:?}",
        risk.profile, risk.score, risk.category
    );

    Ok(())
}
