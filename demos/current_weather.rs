use aemet::{Aemet, Config, ForecastMode, Location, API_KEY_ENV};
use anyhow::Context;
use std::env;

/// Usage: `cargo run --example current_weather [config.toml]`
///
/// Without a config file the key is read from `AEMET_API_KEY` and the
/// location defaults to Madrid.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let mut aemet = match env::args().nth(1) {
        Some(path) => {
            let config = Config::load(&path)
                .await
                .with_context(|| format!("Loading {path}"))?;
            Aemet::from_config(&config).await?
        }
        None => {
            let api_key = env::var(API_KEY_ENV).with_context(|| format!("{API_KEY_ENV} is not set"))?;
            Aemet::builder()
                .api_key(api_key)
                .location(Location::new(40.4168, -3.7038, 667.0))
                .mode(ForecastMode::Hourly)
                .build()
                .await?
        }
    };

    aemet.update().await?;

    println!("{}", aemet.name());
    if let Some(station) = aemet.nearest_station() {
        println!("Station: {} ({})", station.name, station.code);
    }
    if let Some(municipality) = aemet.nearest_municipality() {
        println!("Municipality: {} ({})", municipality.name, municipality.code);
    }

    let Some(view) = aemet.view() else {
        println!("No weather data available");
        return Ok(());
    };
    println!("Condition:   {:?}", view.condition());
    println!("Temperature: {:?} °C", view.temperature());
    println!("Humidity:    {:?} %", view.humidity());
    println!("Pressure:    {:?} hPa", view.pressure());
    println!("Wind:        {:?} km/h from {:?}°", view.wind_speed(), view.wind_bearing());
    println!();

    for entry in view.forecast().iter().take(12) {
        println!(
            "{}  {:<14} {:>6} {:>6}",
            entry.timestamp,
            entry.condition.map(|c| c.to_string()).unwrap_or_default(),
            entry.temperature.map(|t| format!("{t:.1}")).unwrap_or_default(),
            entry.precipitation_probability.map(|p| format!("{p:.0}%")).unwrap_or_default(),
        );
    }
    println!("{}", view.attribution());
    Ok(())
}
