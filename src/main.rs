// src/main.rs

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tripscout::{AutocompleteOptions, LatLng, NearbySearchOptions, PlacesConfig, PlacesEngine, TextSearchOptions};

const USAGE: &str = "Usage: tripscout [--config <path>] <command>

Commands:
  text <query...>                 Free-text search
  nearby <lat> <lng> [category]   Nearby search around a point
  autocomplete <input...>         Place predictions for partial input
  details <place_id>              Full record for one place";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_coord(raw: &str, name: &str) -> Result<f64> {
    raw.parse::<f64>().with_context(|| format!("Invalid {} '{}'", name, raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            bail!("--config needs a path\n\n{}", USAGE);
        }
        config_path = Some(PathBuf::from(args.remove(1)));
        args.remove(0);
    }

    let Some(command) = args.first().cloned() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let config = PlacesConfig::load(config_path.as_deref())?;
    tracing::info!("[Main] Provider mode: {:?}", config.provider);
    let engine = PlacesEngine::from_config(&config)?;

    match command.as_str() {
        "text" => {
            if rest.is_empty() {
                bail!("text needs a query\n\n{}", USAGE);
            }
            let result = engine.search_text(TextSearchOptions::new(rest.join(" "))).await?;
            print_json(&result)?;
        }
        "nearby" => {
            let (Some(lat), Some(lng)) = (rest.first(), rest.get(1)) else {
                bail!("nearby needs <lat> <lng>\n\n{}", USAGE);
            };
            let center = LatLng::new(parse_coord(lat, "latitude")?, parse_coord(lng, "longitude")?);
            let options = NearbySearchOptions {
                category: rest.get(2).cloned(),
                ..NearbySearchOptions::around(center)
            };
            let result = engine.search_nearby(options).await?;
            print_json(&result)?;
        }
        "autocomplete" => {
            let predictions = engine.autocomplete(&rest.join(" "), AutocompleteOptions::default()).await?;
            print_json(&predictions)?;
        }
        "details" => {
            let Some(place_id) = rest.first() else {
                bail!("details needs a place id\n\n{}", USAGE);
            };
            let place = engine.details(place_id, &[]).await?;
            print_json(&place)?;
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }

    tracing::debug!("[Main] Metrics: {:?}", engine.metrics());
    Ok(())
}
