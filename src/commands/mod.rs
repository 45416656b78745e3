// Command handlers module
pub mod completions;
pub mod monitor;
pub mod ports;
pub mod version;

use clap::{Arg, ArgAction, Command};

use crate::core::telemetry::SortMode;

/// Command-line definition shared by `main` and shell completion generation.
pub fn build_cli() -> Command {
    Command::new("espmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Live task and memory monitor for ESP32 telemetry over serial")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('V')
                .long("version")
                .help("Print version information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log session events (set RUST_LOG for finer control)")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("PATH")
                .help("Write logs to this file instead of stderr")
                .global(true),
        )
        .subcommand(
            Command::new("monitor")
                .about("Attach to a serial port and show live telemetry")
                .arg(
                    Arg::new("port")
                        .help("Serial port, e.g. /dev/ttyUSB0 or COM3")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("baud")
                        .short('b')
                        .long("baud")
                        .value_name("RATE")
                        .help("Baud rate (usually 9600, 115200 or 230400)")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("115200"),
                )
                .arg(
                    Arg::new("timeout-ms")
                        .long("timeout-ms")
                        .value_name("MS")
                        .help("Read timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("2000"),
                )
                .arg(
                    Arg::new("sort")
                        .short('s')
                        .long("sort")
                        .value_name("KEY")
                        .help("Initial task sort: name, percentage or core")
                        .value_parser(clap::value_parser!(SortMode))
                        .default_value("percentage"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print each update as a JSON line instead of the dashboard")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("ports").about("List available serial ports"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .help("Shell to generate completions for")
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(Command::new("version").about("Shows version information"))
}
