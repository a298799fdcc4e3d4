// ABOUTME: Entry point for the points-probe command line tool
// ABOUTME: Parses arguments, sets up logging and turns failures into exit codes

use clap::Parser;

use points_probe_lib::cli::Cli;

const LOG_ENV: &str = "POINTS_PROBE_LOG";

fn init_logging(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level()));

    // Also installs the log -> tracing bridge, so log::info! records show up here
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(error) = points_probe_lib::run(&cli).await {
        eprintln!("❌ Error: {}", error);
        log::debug!("{:?}", error);
        std::process::exit(error.exit_code());
    }
}
