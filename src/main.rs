/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::error;
use log::LevelFilter;

use args::Args;
use platform::HostPlatform;

mod args;
mod cli;
mod engine;
mod errors;
mod platform;
mod registry;
mod resolver;
mod tui;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Help and version are not failures; everything else is, and
            // clap's message already carries the usage block.
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    print!("{}", err);
                    ExitCode::from(cli::EXIT_OK as u8)
                }
                _ => {
                    eprint!("{}", err);
                    ExitCode::from(cli::EXIT_FAILURE as u8)
                }
            };
        }
    };
    init_logging(args.verbose, args.interactive);

    let workspace = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("Error: cannot determine the working directory: {}", err);
            return ExitCode::from(cli::EXIT_FAILURE as u8);
        }
    };

    if args.interactive {
        return match tui::run(workspace, &HostPlatform) {
            Ok(()) => ExitCode::from(cli::EXIT_OK as u8),
            Err(err) => {
                error!("{:?}", err);
                eprintln!("Error: {:#}", err);
                ExitCode::from(cli::EXIT_FAILURE as u8)
            }
        };
    }

    match args.command {
        Some(command) => {
            let code = cli::run(command, workspace, &HostPlatform);
            ExitCode::from(code as u8)
        }
        None => {
            let mut help = Args::command();
            let _ = help.print_help();
            ExitCode::from(cli::EXIT_OK as u8)
        }
    }
}

/// Stderr logger, level driven by `-v`. The interactive mode turns logging
/// off entirely: stray lines would corrupt the alternate screen.
fn init_logging(verbose: u8, interactive: bool) {
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let level = if interactive {
        LevelFilter::Off
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{h({l})} {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level));
    match config {
        Ok(config) => {
            let _ = log4rs::init_config(config);
        }
        Err(err) => eprintln!("Warning: cannot initialize logging: {}", err),
    }
}
