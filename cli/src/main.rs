mod cli;
mod commands;
mod table_theme;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use commands::handle_command;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_writer(std::io::stderr)
            .init();
    }

    handle_command(&cli)
}
