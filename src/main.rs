use clap::Parser;
use keiba_ingest::cli::{Cli, Commands};
use keiba_ingest::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = keiba_ingest::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting polling loop");
            args.execute(&config).await?;
        }
        Commands::Once(args) => {
            args.execute(&config).await?;
        }
        Commands::Decode(args) => {
            args.execute().await?;
        }
        Commands::Keys(args) => {
            args.execute(&config)?;
        }
        Commands::Config => {
            println!("# Effective configuration ({})", cli.config);
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
