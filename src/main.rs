use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use websnap::snapshot::{CaptureRequest, SnapshotService};
use websnap::{Config, Result};

#[derive(Parser)]
#[command(name = "websnap", version, about = "Scripted page automation and network snapshot capture")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a capture request from a JSON file and print the CaptureResult
    Capture {
        /// Path to the CaptureRequest JSON
        #[arg(long)]
        request: PathBuf,

        /// Pretty-print the result JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Probe browser liveness, initializing one if needed
    Dryrun,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let service = SnapshotService::new(Arc::new(config));

    match cli.command {
        Command::Capture { request, pretty } => {
            let content = std::fs::read_to_string(&request)?;
            let capture_request: CaptureRequest = serde_json::from_str(&content)?;

            let result = service.capture_traffic(capture_request).await?;

            let output = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{}", output);
        }
        Command::Dryrun => {
            let status = service.dry_run().await?;
            println!("{}", serde_json::to_string(&status)?);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = if verbose {
        EnvFilter::new("debug").add_directive("chromiumoxide=info".parse().unwrap())
    } else {
        EnvFilter::from_default_env()
            .add_directive("warn".parse().unwrap())
            .add_directive("chromiumoxide=off".parse().unwrap())
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
