use clap::Parser;
use xsolla_igs::cli::{run_cli, Cli};
use xsolla_igs::logging::{init_logging, LogConfig};

fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;
    run_cli(Cli::parse())
}
