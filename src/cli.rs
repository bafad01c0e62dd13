use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vaultcast")]
#[command(author, version, about = "HLS streaming server backed by a chat platform's file attachments")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (playlists, segments, catalog API)
    Serve {
        /// Host to bind to, overriding the config file
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on, overriding the config file
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ingest one local media file: probe, plan, distribute, commit
    Upload {
        /// Input file to ingest
        #[arg(required = true)]
        input: PathBuf,
    },

    /// List videos in the catalog
    List {
        #[arg(long, default_value = "50")]
        limit: i64,

        #[arg(long, default_value = "0")]
        offset: i64,
    },

    /// Delete a video and its segments
    Delete {
        /// video_id to delete
        #[arg(required = true)]
        id: String,
    },

    /// Ping every configured account
    TestBots,

    /// Dump the effective configuration
    Config,

    /// Print catalog row counts by status
    DbStats,
}
