//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "semmap",
    version,
    about = "Semantic mapper - map rows between entity types",
    long_about = "Manage mapping projects and apply them to target repositories.\n\n\
                  A workspace holds semmap.toml, catalog.json, one CSV file of rows per\n\
                  entity type and one JSON file per mapping project."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Workspace directory.
    #[arg(long, short = 'w', value_name = "DIR", default_value = ".", global = true)]
    pub workspace: PathBuf,

    /// Source rows per batch (overrides semmap.toml).
    #[arg(long = "batch-size", value_name = "N", global = true)]
    pub batch_size: Option<usize>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create, inspect and edit mapping projects.
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Show the number of work units a mapping run reports.
    Estimate(EstimateArgs),

    /// List entity types a schema can be mapped into.
    Compatible(CompatibleArgs),

    /// Apply a mapping project to a target repository.
    Apply(ApplyArgs),
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Create a project with one mapping target.
    Create(CreateArgs),

    /// List stored projects.
    List,

    /// Show the mappings of one project.
    Show {
        #[arg(value_name = "PROJECT")]
        project: String,
    },

    /// Store a copy of a project under new identifiers.
    Clone {
        #[arg(value_name = "PROJECT")]
        project: String,

        /// Name of the copy (defaults to the original name).
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a project.
    Delete {
        #[arg(value_name = "PROJECT")]
        project: String,
    },

    /// Add a source entity type to a mapping target.
    AddSource(AddSourceArgs),

    /// Set the expression of one attribute mapping.
    Map(MapArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    pub name: String,

    /// Entity type of the first mapping target.
    #[arg(long)]
    pub target: String,

    /// How many reference hops expressions may follow.
    #[arg(long, default_value_t = 3)]
    pub depth: u32,
}

#[derive(Args)]
pub struct AddSourceArgs {
    #[arg(value_name = "PROJECT")]
    pub project: String,

    #[arg(long)]
    pub source: String,

    /// Mapping target to extend (defaults to the first one).
    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct MapArgs {
    #[arg(value_name = "PROJECT")]
    pub project: String,

    #[arg(long)]
    pub source: String,

    /// Target attribute the expression produces.
    #[arg(long)]
    pub attribute: String,

    /// Attribute name or `$('name').value()`.
    #[arg(long)]
    pub expression: String,

    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct EstimateArgs {
    #[arg(value_name = "PROJECT")]
    pub project: String,

    #[arg(long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct CompatibleArgs {
    #[arg(value_name = "SCHEMA")]
    pub schema: String,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[arg(value_name = "PROJECT")]
    pub project: String,

    /// Repository to write to.
    #[arg(long = "target-id")]
    pub target_id: String,

    /// Create the target repository from the mapping target.
    #[arg(long = "create-new")]
    pub create_new: bool,

    /// Package of a newly created target.
    #[arg(long, requires = "create_new")]
    pub package: Option<String>,

    /// Label of a newly created target.
    #[arg(long, requires = "create_new")]
    pub label: Option<String>,

    /// Record the source entity type of every row.
    #[arg(long = "add-source-attribute", conflicts_with = "no_source_attribute")]
    pub add_source_attribute: bool,

    /// Drop the source attribute (and its values) from the target.
    #[arg(long = "no-source-attribute")]
    pub no_source_attribute: bool,

    /// Mapping target of the project to apply (defaults to the first one).
    #[arg(long = "mapping-target")]
    pub mapping_target: Option<String>,

    /// Do not draw a progress bar.
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

impl ApplyArgs {
    /// Explicit source attribute choice, `None` when neither flag is given.
    pub fn source_attribute(&self) -> Option<bool> {
        match (self.add_source_attribute, self.no_source_attribute) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
