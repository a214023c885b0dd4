use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "weather station reading distribution and APRS-IS reporting")]
pub struct ArgsParser {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// run the distributor, storage backends and APRS-IS reporting
    Run {
        #[arg(short, long, help = "path to the configuration file")]
        config: PathBuf,
    },
    /// validate a configuration file and print the APRS stations it defines
    Check {
        #[arg(short, long, help = "path to the configuration file")]
        config: PathBuf,
    },
    /// print the APRS-IS passcode for a callsign
    Passcode {
        #[arg(help = "callsign, with or without SSID")]
        callsign: String,
    },
}
