//! # kc-ldap
//!
//! Runs group sync passes and inspects directory group memberships.

#![forbid(unsafe_code)]

use clap::Parser;
use kc_cli::{
    cli::{Cli, Command},
    commands::{run_config, run_groups, run_members, run_sync},
    config::CliConfig,
    output::error,
    CliResult,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    let path = match cli.config {
        Some(path) => path,
        None => CliConfig::config_path()?,
    };
    let mut config = CliConfig::load(Some(&path))?;
    let format = cli.output.unwrap_or(config.output_format);
    let credential = cli.bind_credential.as_deref();

    match cli.command {
        Command::Sync { mode } => run_sync(mode, &config, credential, format).await,
        Command::Groups { username, strategy } => {
            run_groups(&username, strategy, &config, credential, format).await
        }
        Command::Members { group } => run_members(&group, &config, credential, format).await,
        Command::Config(cmd) => run_config(cmd, &mut config, &path, format),
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}
