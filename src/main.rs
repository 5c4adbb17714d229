//! Multi-Answer CLI entry point.

use clap::Parser;

use multi_answer::cli::{app, commands, handle_error, Cli, Commands};
use multi_answer::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match app::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Held for the whole run so buffered file output is flushed on exit.
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
        Commands::Submit(args) => commands::submit::execute(args, &config, cli.json).await,
        Commands::Logs(args) => commands::logs::execute(args, &config, cli.json).await,
        Commands::Config(args) => {
            commands::config::execute(args, &config, cli.config.as_deref(), cli.json)
        }
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
