//! rb-site - Main entry point
//!
//! Parses the command line, picks the presentation backend once, and
//! dispatches to the install/upgrade/manage commands. All context flows
//! through explicit values constructed here; there are no process-wide
//! mutable globals.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context;
use crossterm::tty::IsTty;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rbsite::cli::{Cli, Commands};
use rbsite::commands::{install, manage, upgrade};
use rbsite::deps::ExecProber;
use rbsite::site::Site;
use rbsite::ui::{ConsoleUi, TuiWizard, UiToolkit};

/// Initialize the logger with appropriate settings.
///
/// Diagnostics go to stderr; user-facing output belongs to the presentation
/// backend. `RUST_LOG` overrides the default level.
fn init_logger(debug: bool) {
    let default_filter = if debug { "rbsite=debug" } else { "rbsite=warn" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse_args();
    init_logger(cli.debug);
    info!("rb-site starting up");

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("rb-site: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Install { path, options } => {
            let site = Site::new(&path).context("resolving the install directory")?;
            let site = Rc::new(RefCell::new(site));
            install::seed_site(&site, &options)?;

            // --noinput forces the console backend; nothing will prompt.
            let mut ui = pick_ui(cli.console || options.noinput);
            let prober = ExecProber;

            let command_result = install::run(ui.as_mut(), &site, &prober, options.noinput);
            let run_result = ui.run();

            command_result?;
            run_result?;
            Ok(0)
        }
        Commands::Upgrade { path, upgrade_db } => {
            let site = Site::new(&path)?;
            upgrade::run(&site, upgrade_db)?;
            Ok(0)
        }
        Commands::Manage {
            path,
            command,
            args,
        } => {
            let site = Site::new(&path)?;
            Ok(manage::run(&site, &command, &args)?)
        }
    }
}

/// Pick the presentation backend once at startup: the full-screen wizard
/// when we have a terminal and nothing forces the console.
fn pick_ui(force_console: bool) -> Box<dyn UiToolkit> {
    if !force_console && std::io::stdout().is_tty() {
        debug!("using full-screen wizard backend");
        Box::new(TuiWizard::new())
    } else {
        debug!("using console backend");
        Box::new(ConsoleUi::new())
    }
}
