//! `omega` - command-line client for the dashboard document
//!
//! Every subcommand runs the same startup protocol the dashboard uses, so
//! `omega pull` against a configured endpoint is a quick way to see what a
//! browser would load.

mod commands;
mod config;
mod logging;

use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use commands::{Context, LoginArgs};
use config::AppConfig;
use logging::LogFormat;
use std::path::PathBuf;

fn cli() -> Command {
    Command::new("omega")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Omega dashboard sync client")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Config file (default: ./omega.toml if present)"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .env("OMEGA_DATA_DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory for the local mirror and session"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .arg(
            Arg::new("memory-remote")
                .long("memory-remote")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Use an in-process remote when no endpoint is configured"),
        )
        .subcommand(Command::new("probe").about("Check whether the remote is reachable"))
        .subcommand(Command::new("pull").about("Load the document and show sync status"))
        .subcommand(Command::new("push").about("Push the local document now"))
        .subcommand(Command::new("team").about("List team members"))
        .subcommand(
            Command::new("login")
                .about("Sign in, or set a password on first access")
                .arg(
                    Arg::new("email")
                        .long("email")
                        .required(true)
                        .help("Email of a team member"),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("OMEGA_PASSWORD")
                        .hide_env_values(true)
                        .help("Password, or the new password on first access"),
                )
                .arg(
                    Arg::new("confirm")
                        .long("confirm")
                        .help("Confirmation of a new password"),
                )
                .arg(
                    Arg::new("reset")
                        .long("reset")
                        .action(ArgAction::SetTrue)
                        .help("Choose a new password instead of signing in"),
                ),
        )
        .subcommand(Command::new("logout").about("Forget the stored session"))
        .subcommand(Command::new("whoami").about("Show and revalidate the stored session"))
}

fn load_config(matches: &ArgMatches) -> Result<AppConfig> {
    let mut config = AppConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(dir) = matches.get_one::<PathBuf>("data-dir") {
        config.data_dir.clone_from(dir);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let format = matches
        .get_one::<String>("log-format")
        .and_then(|f| LogFormat::parse(f))
        .unwrap_or_default();
    logging::init(format, "info")?;

    let config = load_config(&matches)?;
    let ctx = Context::new(config, matches.get_flag("memory-remote"))?;

    match matches.subcommand() {
        Some(("probe", _)) => commands::probe(&ctx).await,
        Some(("pull", _)) => commands::pull(&ctx).await,
        Some(("push", _)) => commands::push(&ctx).await,
        Some(("team", _)) => commands::team(&ctx).await,
        Some(("login", sub)) => {
            let args = LoginArgs {
                email: sub.get_one::<String>("email").cloned().unwrap_or_default(),
                password: sub.get_one::<String>("password").cloned(),
                confirm: sub.get_one::<String>("confirm").cloned(),
                reset: sub.get_flag("reset"),
            };
            commands::login(&ctx, args).await
        }
        Some(("logout", _)) => {
            commands::logout(&ctx);
            Ok(())
        }
        Some(("whoami", _)) => commands::whoami(&ctx).await,
        Some((other, _)) => Err(anyhow!("unknown command: {other}")),
        None => Err(anyhow!("no command given")),
    }
}
