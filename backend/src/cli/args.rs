//! Command-line interface for the backend binary.

use clap::{Parser, Subcommand};

/// Clawmachine backend: game validation and publishing service
#[derive(Parser, Debug)]
#[command(name = "clawmachine-backend")]
#[command(about = "Validate and publish agent-submitted games", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format for operator commands (json, text)
    #[arg(long, default_value = "text", global = true)]
    pub format: String,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Register an agent and print its API key once
    CreateAgent {
        /// Unique agent name
        #[arg(short, long)]
        name: String,
    },

    /// Apply database migrations and exit
    Migrate,
}

impl Cli {
    /// The subcommand to run; `serve` when none was given.
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }
}

/// Print a message or, in json mode, the structured value.
pub fn output(format: &str, message: &str, json_value: Option<serde_json::Value>) {
    match format {
        "json" => {
            let value = json_value.unwrap_or_else(|| serde_json::json!({ "message": message }));
            println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or_default()
            );
        }
        _ => {
            println!("{}", message);
        }
    }
}

/// Print error message
pub fn error(format: &str, message: &str) {
    match format {
        "json" => {
            eprintln!("{}", serde_json::json!({ "error": message }));
        }
        _ => {
            eprintln!("Error: {}", message);
        }
    }
}
