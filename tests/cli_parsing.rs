//! Command-line parsing.

use std::path::PathBuf;

use clap::Parser;
use multi_answer::cli::commands::config::ConfigCommands;
use multi_answer::cli::commands::logs::LogsCommands;
use multi_answer::cli::{Cli, Commands};

#[test]
fn test_run_with_global_flags() {
    let cli = Cli::try_parse_from([
        "multi-answer", "run", "-q", "Q1", "-q", "Q2", "--dry-run", "--json", "--config", "cfg.yaml",
    ])
    .unwrap();

    assert!(cli.json);
    assert_eq!(cli.config, Some(PathBuf::from("cfg.yaml")));
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.queries, vec!["Q1", "Q2"]);
            assert!(args.dry_run);
            assert!(!args.keep_open);
            assert!(args.prompt.is_none());
        }
        other => panic!("expected run, got {other:?}"),
    }
}

#[test]
fn test_logs_show_default_limit() {
    let cli = Cli::try_parse_from(["multi-answer", "logs", "show"]).unwrap();
    match cli.command {
        Commands::Logs(args) => assert!(matches!(args.command, LogsCommands::Show { limit: 20 })),
        other => panic!("expected logs, got {other:?}"),
    }
}

#[test]
fn test_submit_reads_stdin_by_default() {
    let cli = Cli::try_parse_from(["multi-answer", "submit"]).unwrap();
    match cli.command {
        Commands::Submit(args) => assert_eq!(args.message, PathBuf::from("-")),
        other => panic!("expected submit, got {other:?}"),
    }
}

#[test]
fn test_config_subcommands() {
    let cli = Cli::try_parse_from(["multi-answer", "config", "validate"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config(args) if matches!(args.command, ConfigCommands::Validate)
    ));
}

#[test]
fn test_unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["multi-answer", "status"]).is_err());
}
