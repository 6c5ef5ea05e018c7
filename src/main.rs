mod cli;
mod commands;
mod merger;

use clap::Parser;

use cli::{Cli, Commands};
use stowage::{actions, logging};

fn main() {
    // Initialize structured logging
    logging::init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Dispatch to appropriate command handler
    let result = match &cli.command {
        Commands::Key(args) => commands::key::run(args),
        Commands::Run(args) => commands::run::run(args),
        Commands::Gitversion(args) => commands::gitversion::run(args),
        Commands::InstallModules(args) => commands::modules::run(args),
        Commands::Config(args) => commands::config::run(&args.command),
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        actions::set_failed(&format!("{:#}", e));
        std::process::exit(1);
    }
}
