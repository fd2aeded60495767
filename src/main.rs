#![recursion_limit = "256"]

use anyhow::Result;
use clap::Parser;
use relex::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relex=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
