use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

use cli::config::ConfigCommand;
use cli::exec::ExecCommand;
use cli::run::RunCommand;

#[derive(Parser)]
#[command(name = "shellflow")]
#[command(about = "Run stage/execute/fetch workflows on a remote machine over an interactive SSH shell", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run(RunCommand),
    Exec(ExecCommand),
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // Initialize logging with INFO level by default
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(cmd) => cmd.execute(),
        Commands::Exec(cmd) => cmd.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}
