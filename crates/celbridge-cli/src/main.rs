//! Celbridge CLI
//!
//! Runs operation scripts through the command execution engine

use clap::{Parser, Subcommand};

mod commands;
mod operations;
mod project;
mod script;

#[derive(Debug, Parser)]
#[command(name = "celbridge")]
#[command(about = "Celbridge - Serialized command execution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute the operations in a script file, in order
    Run(commands::run::RunArgs),
    /// List the operation kinds a script may use
    Kinds,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Kinds => commands::kinds::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
