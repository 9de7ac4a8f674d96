use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "threadview", about = "Assemble and display reply threads from a post API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the thread around a post and print it as an indented reply tree
    Show {
        /// post ID to center the thread on
        id: String,
        #[command(flatten)]
        source: SourceArgs,
        /// How many times to retry after a transport failure
        #[arg(long, default_value_t = 0)]
        retries: u32,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List replies whose parent is not part of the loaded thread
    Orphans {
        /// post ID to center the thread on
        id: String,
        #[command(flatten)]
        source: SourceArgs,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Load posts into the local store
    Import {
        /// JSON file with an array of posts or a thread response (stdin when omitted)
        file: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct SourceArgs {
    /// Read from the local post store instead of the API
    #[arg(long)]
    pub local: bool,
    /// Base URL of the post API (overrides THREADVIEW_API_URL)
    #[arg(long)]
    pub api_url: Option<String>,
    /// Maximum number of replies to request from the API
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: Option<u32>,
}
