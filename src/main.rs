use clap::Parser;
use std::io;
use tracing::{Level, error, info};
use tsindex::config::ConfigOverrides;
use tsindex::{AnchorStrategy, Config, Locator, TsIndexError, report};

#[derive(Parser)]
#[command(name = "tsindex")]
#[command(version, about = "Find the HLS segment that was live at a past time")]
struct Cli {
    /// Target time: "YYYY-MM-DD HH:MM[:SS]" or "HH:MM[:SS]" (today, civil offset)
    target_time: String,

    /// Anchor source: program-date-time, qos-header or last-modified
    #[arg(short, long, value_parser = parse_strategy)]
    strategy: Option<AnchorStrategy>,

    /// Live playlist URL (overrides PLAYLIST_URL)
    #[arg(long)]
    playlist_url: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn parse_strategy(value: &str) -> Result<AnchorStrategy, String> {
    value.parse().map_err(|e: TsIndexError| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    info!("🦀 tsindex {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env_with(ConfigOverrides {
        anchor_strategy: cli.strategy,
        playlist_url: cli.playlist_url,
    })?;

    let locator = Locator::new(config)?;
    let result = locator.locate_str(&cli.target_time).await?;

    let mut out = io::stdout().lock();
    if cli.json {
        report::write_json(&mut out, &result)?;
    } else {
        report::write_text(&mut out, &result, locator.config().civil_offset)?;
    }
    Ok(())
}
