//! CLI struct definitions for the lexkv command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `main.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "lexkv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect and administer lexkv stores: local typed key-value caches used by legal-data collectors."
)]
pub struct Cli {
    /// Base directory for bare store names (defaults to the profile data dir).
    #[clap(long, global = true)]
    pub base: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List store files in the conventional stores directory
    List {
        /// Verify each file's kv table, not just the header signature
        #[clap(long)]
        schema: bool,
        /// Open each store to count Records and read its description
        #[clap(long)]
        counts: bool,
        /// Emit JSON instead of a table
        #[clap(long)]
        json: bool,
    },
    /// Show size, waste, Record count and description of one store
    Info {
        store: String,
        /// Emit JSON instead of text
        #[clap(long)]
        json: bool,
    },
    /// Print the value stored under a key
    Get {
        store: String,
        key: String,
        /// Kind the key should be parsed as
        #[clap(long, default_value = "text")]
        key_kind: String,
    },
    /// Insert or overwrite one Record
    Put {
        store: String,
        key: String,
        value: String,
        #[clap(long, default_value = "text")]
        key_kind: String,
        #[clap(long, default_value = "text")]
        value_kind: String,
        /// Set the store's description meta entry while at it
        #[clap(long)]
        describe: Option<String>,
    },
    /// Delete one Record
    Delete {
        store: String,
        key: String,
        #[clap(long, default_value = "text")]
        key_kind: String,
    },
    /// Read or write the store's meta sidecar
    Meta {
        #[clap(subcommand)]
        command: MetaCommand,
    },
    /// Reclaim space from deleted Records
    Vacuum { store: String },
    /// Delete every Record in a store
    Truncate {
        store: String,
        /// Skip the vacuum that normally follows truncation
        #[clap(long)]
        no_vacuum: bool,
    },
    /// Fetch a URL through a store-backed cache
    Fetch {
        store: String,
        url: String,
        /// Refetch even if the URL is already cached
        #[clap(long)]
        force: bool,
        /// Write the body to a file instead of stdout
        #[clap(long, short = 'o')]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MetaCommand {
    /// Print one meta entry
    Get { store: String, key: String },
    /// Set one meta entry
    Set {
        store: String,
        key: String,
        value: String,
    },
    /// Delete one meta entry
    Del { store: String, key: String },
}
