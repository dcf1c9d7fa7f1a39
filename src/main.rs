use anyhow::Result;
use clap::Parser;
use trackline::{config, tui};

#[derive(Parser, Debug)]
#[command(name = "trackline")]
#[command(about = "Terminal client for Linear-style issue tracking")]
#[command(version)]
struct Args {
    /// Initialize configuration
    #[arg(long)]
    init: bool,

    /// Path to config file
    #[arg(long, short)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trackline=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.init {
        config::init_wizard()?;
        return Ok(());
    }

    let config = config::load(args.config.as_deref())?;

    // Run TUI
    tui::run(config).await
}
