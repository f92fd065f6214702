use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "grist")]
#[command(version)]
#[command(about = "Manage declarative resources: parse, resolve, diff and apply", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to $GRIST_CONFIG, ./grist.yaml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory backing the remote store
    #[arg(long, global = true)]
    pub remote_dir: Option<PathBuf>,

    /// Output format for get, show, pull and export
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Write only the spec of each resource
    #[arg(short = 's', long, global = true)]
    pub only_spec: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl From<OutputFormat> for grist::FileType {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => grist::FileType::Yaml,
            OutputFormat::Json => grist::FileType::Json,
        }
    }
}

/// Options shared by every command that reads local files.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Only operate on resources matching these <kind>/<name> globs
    #[arg(short, long = "target")]
    pub targets: Vec<String>,

    /// Kind assumed for bare specs no handler recognises
    #[arg(short = 'k', long)]
    pub default_kind: Option<String>,

    /// Folder assigned to bare specs of folder-scoped kinds
    #[arg(short = 'f', long)]
    pub default_folder: Option<String>,

    /// Extra jsonnet library paths, searched before the configured ones
    #[arg(short = 'J', long = "jpath")]
    pub jsonnet_paths: Vec<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch one remote resource by <kind>.<uid>
    Get {
        /// Resource id, e.g. Dashboard.my-dashboard
        uid: String,
    },

    /// List local resources, or remote ones with -r
    List {
        /// File or directory to list (ignored with -r)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// List the remote instead
        #[arg(short, long)]
        remote: bool,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Render local resources as they would be sent
    Show {
        path: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Compare local resources with the remote
    Diff {
        path: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Create or update remote resources from local files
    Apply {
        path: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Write remote resources to a directory
    Pull {
        dir: PathBuf,

        /// Only pull resources matching these <kind>/<name> globs
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },

    /// Write local resources to a directory in canonical layout
    Export {
        path: PathBuf,
        dir: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Re-apply PATH every time something under DIR changes
    Watch {
        dir: PathBuf,
        path: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },
}
