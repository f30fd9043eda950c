// src/main.rs

mod app_logic;
mod core;

use crate::app_logic::router;
use crate::app_logic::{BatchError, Collaborators, Invocation, RunContext, parse_arguments};
use crate::core::{ConfigManagerOperations, CoreConfigManager, RunDefaults};

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::File;
use std::process::ExitCode;

const APP_NAME: &str = "wpbatch";

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/*
 * Diagnostics go to stderr; with `log_file=` they are mirrored into that file.
 * A log file that cannot be created is reported and the run continues with
 * terminal output only.
 */
fn init_logging(invocation: &Invocation) {
    let level = level_for(invocation.verbosity);
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    let mut log_file_error = None;
    if let Some(path) = &invocation.log_file {
        match File::create(path) {
            Ok(file) => loggers.push(WriteLogger::new(level, config, file)),
            Err(e) => log_file_error = Some((path.clone(), e)),
        }
    }
    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("{APP_NAME}: Could not initialize logging: {e}");
    }
    if let Some((path, e)) = log_file_error {
        log::warn!("Main: Could not create log file {path:?}: {e}");
    }
}

fn load_defaults(invocation: &Invocation) -> Result<RunDefaults, BatchError> {
    let config_manager = CoreConfigManager::new();
    let defaults = match &invocation.config {
        Some(path) => config_manager.load_defaults_from_path(path)?,
        None => config_manager.load_defaults(APP_NAME)?,
    };
    Ok(defaults)
}

fn run(invocation: Invocation) -> Result<(), BatchError> {
    let defaults = load_defaults(&invocation)?;
    let current_dir = std::env::current_dir()?;
    let context = RunContext::new(invocation, defaults, &current_dir);
    log::info!(
        "Main: '{}' on {:?}",
        context.verb.keyword(),
        context.site_root
    );
    let collaborators = Collaborators::for_site(&context.defaults, &context.site_root);
    router::route(&context, &collaborators)
}

fn main() -> ExitCode {
    let invocation = match parse_arguments(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&invocation);

    match run(invocation) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Main: {e}");
            ExitCode::FAILURE
        }
    }
}
