//! Main application entry point.
//!
//! Parses the command line and hands off to the matching command in
//! `duskshift::commands`. Errors are reported through the logger and turn
//! into a non-zero exit status.

use anyhow::Result;

use duskshift::args::{self, CliAction, ParsedArgs};
use duskshift::commands;
use duskshift::common::constants::EXIT_FAILURE;
use duskshift::config;
use duskshift::logger::Log;
use duskshift::{log_end, log_error_exit};

fn dispatch(action: CliAction) -> Result<()> {
    match action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => {
            Log::set_debug(debug_enabled);
            config::set_config_dir(config_dir)?;
            commands::run::handle_run_command(debug_enabled)
        }
        CliAction::Simulate {
            debug_enabled,
            start_time,
            end_time,
            multiplier,
            monitors,
            json,
            log_to_file,
            config_dir,
        } => {
            Log::set_debug(debug_enabled);
            config::set_config_dir(config_dir)?;
            commands::simulate::handle_simulate_command(commands::simulate::SimulateOptions {
                start_time,
                end_time,
                multiplier,
                monitors,
                json,
                log_to_file,
                debug_enabled,
            })
        }
        CliAction::Solar {
            debug_enabled,
            date,
            latitude,
            longitude,
            config_dir,
        } => {
            Log::set_debug(debug_enabled);
            config::set_config_dir(config_dir)?;
            commands::solar::handle_solar_command(date, latitude.zip(longitude))
        }
    }
}

fn main() {
    let parsed_args = ParsedArgs::from_env();

    if let Err(e) = dispatch(parsed_args.action) {
        log_error_exit!("{e:#}");
        log_end!();
        std::process::exit(EXIT_FAILURE);
    }
}
