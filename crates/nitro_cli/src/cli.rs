//! CLI argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Local task lists backed by a single SQLite file.
#[derive(Parser)]
#[command(name = "nitro", about, version, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite file; in-memory when omitted
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print every list with its open-task count
    Lists,
    /// Create a list
    AddList { name: String },
    /// Create a task; `today` and `next` land in the inbox
    Add {
        list: String,
        name: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Print the tasks of a list in display order
    Tasks { list: String },
    /// Toggle completion of a task
    Complete { id: String },
    /// Move a task to another list
    Move { id: String, list: String },
    /// Delete a task
    Delete { id: String },
    /// Delete a list and its tasks
    DeleteList { id: String },
    /// Archive completed tasks of a list
    Archive { list: String },
}
