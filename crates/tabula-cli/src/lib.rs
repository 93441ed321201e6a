//! Tabula command line
//!
//! Batch jobs and reports over the document-tracking spreadsheet:
//!
//! - `tabula sweep [--dry-run]`: expire approvals whose window has passed
//! - `tabula stats [--json]`: document counts per status
//! - `tabula pending [--json]`: documents waiting for review
//! - `tabula check-config`: effective configuration, secrets omitted
//!
//! Configuration comes from `--config` (default `tabula.toml`) with
//! `TABULA_SPREADSHEET_ID` and the token variable applied on top.

pub mod commands;
pub mod config;
pub mod logging;

pub use commands::{check_config, render_pending, render_statistics, render_sweep, Action, App};
pub use config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH, SPREADSHEET_ID_ENV};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;

/// Argument parser
#[must_use]
pub fn cli() -> Command {
    let json = || {
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON instead of text")
    };
    Command::new("tabula")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Spreadsheet-backed document tracking")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .default_value(DEFAULT_CONFIG_PATH)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file; missing means defaults"),
        )
        .subcommand(
            Command::new("sweep")
                .about("Expire approved documents whose validity window has passed")
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("List what would expire without writing"),
                ),
        )
        .subcommand(
            Command::new("stats")
                .about("Count documents per review status")
                .arg(json()),
        )
        .subcommand(
            Command::new("pending")
                .about("List documents waiting for review")
                .arg(json()),
        )
        .subcommand(
            Command::new("check-config").about("Print the effective configuration without secrets"),
        )
}

/// Subcommand selected in `matches`
#[must_use]
pub fn action(matches: &ArgMatches) -> Option<Action> {
    let action = match matches.subcommand()? {
        ("sweep", args) => Action::Sweep {
            dry_run: args.get_flag("dry-run"),
        },
        ("stats", args) => Action::Stats {
            json: args.get_flag("json"),
        },
        ("pending", args) => Action::Pending {
            json: args.get_flag("json"),
        },
        ("check-config", _) => Action::CheckConfig,
        _ => return None,
    };
    Some(action)
}

/// Load configuration, start logging and run the selected subcommand
///
/// # Errors
/// Configuration, connection and store failures.
pub async fn run(matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = AppConfig::load(&path)?.apply_env(|key| std::env::var(key).ok());
    logging::init_tracing(&config.logging)?;

    let Some(action) = action(matches) else {
        cli().print_help()?;
        return Ok(ExitCode::FAILURE);
    };

    if action == Action::CheckConfig {
        let (report, usable) = check_config(&config);
        print!("{report}");
        return Ok(if usable { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let app = App::connect(&config)?;
    let output = app.execute(action, &config).await?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(ExitCode::SUCCESS)
}
