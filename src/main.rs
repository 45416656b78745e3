use anyhow::Result;
use colored::*;
use std::path::PathBuf;

use espmon::commands::{self, build_cli};

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = build_cli().get_matches();

    if matches.get_flag("version") {
        return commands::version::execute();
    }

    let verbose = matches.get_flag("verbose");
    let log_file = matches.get_one::<String>("log-file").map(PathBuf::from);

    match matches.subcommand() {
        Some(("monitor", sub_matches)) => {
            // The dashboard owns the terminal, so its logs go to a file
            let log_file = match log_file {
                None if !sub_matches.get_flag("json") => {
                    Some(std::env::temp_dir().join("espmon.log"))
                }
                other => other,
            };
            espmon::init_logging(verbose, log_file.as_deref())?;
            commands::monitor::execute(sub_matches)
        }
        Some(("ports", _)) => {
            espmon::init_logging(verbose, log_file.as_deref())?;
            commands::ports::execute()
        }
        Some(("completions", sub_matches)) => {
            let mut cli = build_cli();
            commands::completions::execute(sub_matches, &mut cli)
        }
        Some(("version", _)) => commands::version::execute(),
        _ => {
            println!("Welcome to espmon!");
            println!("Use 'espmon ports' to find your board, then 'espmon monitor <PORT>'.");
            Ok(())
        }
    }
}
