use anyhow::Result;
use clap::Parser;
use findsim::telemetry::init_subscriber;
use findsim::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_subscriber(cli.verbosity());
    findsim::run(cli)
}
