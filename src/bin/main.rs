use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "filmes-server")]
#[command(about = "Movie recommendations by overview similarity", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "filmes-server.yaml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Import movies from a JSON file and compute their overview vectors
    Load { file: PathBuf },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.debug {
        "filmes_rs=debug,tower_http=debug"
    } else {
        "filmes_rs=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(args.json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => filmes_rs::run(&args.config).await,
        Command::Load { file } => filmes_rs::load(&args.config, &file)
            .await
            .map(|n| println!("Loaded {} movies", n)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
