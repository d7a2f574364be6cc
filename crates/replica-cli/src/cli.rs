use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "replica",
    about = "Replica — inspect and maintain a local replica store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file; flags below override it
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding file-backed stores
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Store name
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Use the in-memory engine
    #[arg(long, global = true)]
    pub memory: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the node stored at a path
    Get(PathArgs),
    /// Write a document
    Put(PutArgs),
    /// Delete a document
    Delete(DeleteArgs),
    /// List a directory
    Ls(LsArgs),
    /// Read, set or forget remote revisions
    Revision(RevisionArgs),
    /// List pending changes
    Changes(ChangesArgs),
    /// Drop the pending change at a path
    ClearChange(PathArgs),
    /// List unresolved and resolved conflicts
    Conflicts,
    /// Record a resolution for a conflict
    Resolve(ResolveArgs),
    /// Print every stored document as an initial change event
    Dump,
    /// Destroy the store's contents and reopen it empty
    Reset,
    /// Destroy the store's contents
    Clean,
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Args)]
pub struct PutArgs {
    pub path: String,
    /// Inline text body
    pub content: Option<String>,
    /// Read the body from a file instead
    #[arg(short, long, conflicts_with = "content")]
    pub file: Option<PathBuf>,
    #[arg(short = 't', long, default_value = "text/plain")]
    pub content_type: String,
    /// Apply as a remote change (no pending change recorded)
    #[arg(long)]
    pub remote: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub path: String,
    #[arg(long)]
    pub remote: bool,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Args)]
pub struct RevisionArgs {
    #[command(subcommand)]
    pub action: RevisionAction,
}

#[derive(Subcommand)]
pub enum RevisionAction {
    Get { path: String },
    Set { path: String, revision: String },
    Forget { paths: Vec<String> },
}

#[derive(Args)]
pub struct ChangesArgs {
    /// Only changes under this prefix
    pub prefix: Option<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub path: String,
    /// `local` or `remote`
    pub resolution: String,
}
