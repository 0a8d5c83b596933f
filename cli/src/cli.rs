use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "ingressctl",
    about = "Inspect how ingress custom resources reconcile into proxy configuration",
    version,
    long_about = "A command-line tool that loads GlobalConfiguration, VirtualServer, TransportServer and Policy manifests from disk and shows the configuration, statuses and listeners they produce."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Manifest directory or file
    #[arg(short, long, global = true, env = "INGRESS_MANIFESTS", default_value = ".")]
    pub manifests: PathBuf,

    /// Settings file
    #[arg(short, long, global = true, env = "INGRESS_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use emojis for states in table output
    #[arg(long, global = true)]
    pub emoji: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the configuration compiled for each resource
    Render {
        /// Only resources with this name
        name: Option<String>,
    },
    /// Show the status of every resource
    Status {
        /// Only resources of this kind
        #[arg(short, long)]
        kind: Option<String>,
        /// Exit with an error when any resource is invalid
        #[arg(long)]
        strict: bool,
    },
    /// List the listeners of the selected GlobalConfiguration
    Listeners,
    /// Print the JSON schema of a document type
    Schema {
        #[arg(value_enum)]
        document: SchemaDocument,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemaDocument {
    Manifest,
    Settings,
}
