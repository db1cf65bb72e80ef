use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Edit shared notes with presence, debounced saves, and conflict resolution")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Act as this user instead of QUIRE_USER_ID
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Create {
        /// Note title
        title: String,
        /// Note content (read from stdin when omitted)
        content: Vec<String>,
        /// Tag to attach; repeatable
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// List recently updated notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one note
    Show {
        /// Note ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a note through a collaborative session
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// Replace the title
        #[arg(long)]
        title: Option<String>,
        /// Replace the content (stdin or $EDITOR when omitted)
        content: Vec<String>,
    },
    /// Play collaboration scenarios between two in-process clients
    Simulate {
        /// Scenario to run
        #[arg(value_enum, default_value_t = Scenario::All)]
        scenario: Scenario,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Scenario {
    All,
    /// One write after a burst of edits
    Debounce,
    /// Concurrent edits merged after a conflict
    Conflict,
    /// Typing indicator that expires
    Typing,
}
