//! Command-line interface for smartsum
//!
//! Provides argument parsing using clap derive macros.

use crate::record::RecordKind;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Transcribe, translate, score and summarize media
#[derive(Parser, Debug)]
#[command(
    name = "smartsum",
    version,
    about = "Transcribe, translate, score and summarize media"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Record database (overrides store.path)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Engine run timeout, e.g. 30m or "none" (overrides engine.timeout)
    #[arg(long, global = true, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Record type selector
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Transcript,
    Translation,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Transcript => RecordKind::Transcript,
            KindArg::Translation => RecordKind::Translation,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage media items
    Media {
        #[command(subcommand)]
        action: MediaAction,
    },

    /// Transcribe media in its own language
    Transcribe {
        /// Media ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Translate media speech into another language
    Translate {
        /// Target language code (e.g., en, he)
        #[arg(long, value_name = "LANG")]
        to: String,
        /// Media ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Translate transcript text to English
    TranslateText {
        /// Transcript ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Summarize transcripts or translations
    Summarize {
        /// Record type
        #[arg(long, value_enum, default_value = "transcript")]
        kind: KindArg,
        /// Maximum summary length in words
        #[arg(long, value_name = "N")]
        max_words: Option<usize>,
        /// Minimum summary length in words
        #[arg(long, value_name = "N")]
        min_words: Option<usize>,
        /// Record ids
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// List transcripts or translations
    List {
        #[arg(value_enum, default_value = "transcript")]
        kind: KindArg,
    },

    /// Show one record
    Show {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
        /// Print timed segments
        #[arg(long)]
        segments: bool,
    },

    /// Set the reference text of a record and score it
    Reference {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
        /// Reference text
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,
        /// Read the reference text from a file
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Download Argos Translate language packs
    FetchLangs,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Project management actions
#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// Create a project
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List projects
    List,
    /// Delete a project with its media and records
    Delete { id: i64 },
}

/// Media management actions
#[derive(Subcommand, Debug)]
pub enum MediaAction {
    /// Register a media file
    Add {
        /// Owning project id
        #[arg(long)]
        project: i64,
        /// WAV file
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
        /// Spoken language code (e.g., he, fa, en)
        #[arg(long, value_name = "LANG")]
        language: Option<String>,
        /// Source URL
        #[arg(long)]
        url: Option<String>,
    },
    /// List media
    List {
        /// Only media of this project
        #[arg(long)]
        project: Option<i64>,
    },
    /// Delete a media item with its records
    Delete { id: i64 },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}
