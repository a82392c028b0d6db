pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use deskpilot_core::config::{AppConfig, LoadOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "deskpilot",
    about = "Deskpilot operator CLI",
    long_about = "Inspect Deskpilot configuration, check routing readiness, lint tool discovery listings, and replay tool responses offline.",
    after_help = "Examples:\n  deskpilot doctor --json\n  deskpilot route \"the vpn is broken again\"\n  deskpilot schema tools.json\n  deskpilot parse response.json --format status_object"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, keyword layers, tool bindings, and a routing probe")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Route a message through the keyword layers without a remote classifier")]
    Route {
        #[arg(help = "Message text to route")]
        text: String,
    },
    #[command(about = "Parse a tool discovery listing and report structural schema issues")]
    Schema {
        #[arg(help = "Path to a JSON discovery listing")]
        file: PathBuf,
    },
    #[command(about = "Normalize a captured tool response into a success/id/link/error result")]
    Parse {
        #[arg(help = "Path to a captured tool response")]
        file: PathBuf,
        #[arg(
            long,
            help = "Expected response format (content_envelope, status_object, generic or auto)"
        )]
        format: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        logging::init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Route { text } => commands::route::run(&text),
        Command::Schema { file } => commands::schema::run(&file),
        Command::Parse { file, format } => commands::parse::run(&file, format.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
