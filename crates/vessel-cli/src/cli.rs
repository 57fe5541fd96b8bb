use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "vessel",
    about = "Vessel: policy-checked blob storage",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Storage configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Filesystem backend root; overrides the configured backend
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a file as a new blob
    Store(StoreArgs),
    /// Write a blob's content to a file or stdout
    Get(GetArgs),
    /// Show a blob's metadata
    Info(RefArgs),
    /// Check whether a blob exists
    Exists(RefArgs),
    /// Delete a blob
    Delete(RefArgs),
    /// Show or change a blob's attributes
    Attrs(AttrsArgs),
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    pub file: PathBuf,
    /// Original name to record (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub content_type: Option<String>,
    /// Attribute as key=value; repeatable
    #[arg(long = "attr", value_parser = parse_key_val)]
    pub attrs: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub blob_ref: String,
    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RefArgs {
    pub blob_ref: String,
}

#[derive(Args, Debug)]
pub struct AttrsArgs {
    pub blob_ref: String,
    /// Set key=value; repeatable
    #[arg(long = "set", value_parser = parse_key_val)]
    pub set: Vec<(String, String)>,
    /// Remove a key; repeatable
    #[arg(long = "unset")]
    pub unset: Vec<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}
