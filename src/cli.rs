//! CLI argument parsing for Attune.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "attune",
    about = "Edit subject and persona profiles as markup",
    version,
    after_help = "Logs are written to: ~/.local/share/attune/logs/attune.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse a markup file and print its canonical form
    Render {
        /// Markup file
        file: PathBuf,

        /// Profile kind (subject or persona)
        #[arg(short, long, default_value = "subject")]
        kind: String,
    },

    /// Import a markup file into the workspace
    Import {
        /// Profile kind (subject or persona)
        kind: String,

        /// Markup file
        file: PathBuf,
    },

    /// Print the canonical markup of the workspace
    Show {
        /// Profile kind (subject or persona)
        kind: String,
    },

    /// Apply one edit to the workspace
    Edit {
        /// Dotted edit path, e.g. subject.identity.name
        path: String,

        /// JSON value; bare words are taken as strings
        value: String,
    },

    /// Migrate a raw JSON snapshot and print the current shape
    Migrate {
        /// Snapshot file
        file: PathBuf,
    },

    /// Replace the workspace with the deployed documents
    Load,

    /// Compare the workspace against the deployed documents
    Status,

    /// Deploy the workspace
    Deploy,
}
