use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidwatch")]
#[command(about = "Finds viral videos on monitored YouTube channels and turns them into fact-checked scripts")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check every channel once and process new viral videos
    Run,

    /// Run every day at the configured time until interrupted
    Watch {
        /// Also run once immediately
        #[arg(long)]
        now: bool,
    },

    /// Classify a view/subscriber pair with the configured thresholds
    Check {
        #[arg(allow_negative_numbers = true)]
        views: i64,

        #[arg(allow_negative_numbers = true)]
        subscribers: i64,
    },

    /// List processed videos, newest first
    Processed {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Show a stored script with its fact checks, or change its status
    Script {
        /// YouTube video URL or video ID
        video: String,

        /// New status: draft, approved, rejected or produced
        #[arg(long)]
        status: Option<String>,
    },

    /// Print the transcript of a video
    Transcript {
        /// YouTube video URL or video ID
        video: String,
    },
}
