use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// API base URL (default: $SCRIPNAV_API_BASE, then the public endpoint).
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Navigate(NavigateArgs),
    Markers(MarkersArgs),
    ChapterUrl(ChapterUrlArgs),
}

#[derive(Debug, Args)]
pub struct NavigateArgs {
    /// Location hash such as `#1:5:3` (the leading `#` is optional).
    #[arg(long, default_value = "")]
    pub hash: String,
}

#[derive(Debug, Args)]
pub struct MarkersArgs {
    /// Chapter markup to scan for location links.
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct ChapterUrlArgs {
    #[arg(long)]
    pub book: u32,

    #[arg(long)]
    pub chapter: u32,

    /// Verse selection appended as `verses=...`.
    #[arg(long)]
    pub verses: Option<String>,

    /// Request the Joseph Smith Translation text.
    #[arg(long, default_value_t = false)]
    pub jst: bool,
}
