use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert videos to vertical format in one batch
    Process {
        /// Input video files
        inputs: Vec<PathBuf>,

        /// Also enqueue every video file found in this directory
        #[arg(short = 'd', long)]
        input_dir: Option<PathBuf>,

        /// Caption applied to every job that has no caption of its own
        #[arg(long)]
        caption: Option<String>,

        /// Caption font (see `tikbatch fonts`)
        #[arg(short, long)]
        font: Option<String>,

        /// Output directory for converted videos
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Verify that the encoder runtime and ffmpeg are usable
    Check,

    /// List the supported caption fonts
    Fonts,
}
