//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// quire static site generator CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Config file path
    #[arg(short = 'C', long, default_value = "quire.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Rebuild every page regardless of fingerprints
    #[arg(short, long)]
    pub force: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site once
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build, then serve the output and rebuild on changes
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve without watching the source tree
        #[arg(long)]
        no_watch: bool,
    },

    /// Build, then list every page with its status
    Summary {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Process the site without writing, then print one page (by source or destination path) as JSON
    Dump {
        /// Source path (relative to the source tree) or destination path
        path: PathBuf,
    },

    /// List available processors
    Processors,

    /// Print the resolved configuration as JSON
    ShowConfig,
}

impl Cli {
    pub fn force(&self) -> bool {
        match &self.command {
            Commands::Build { build_args }
            | Commands::Serve { build_args, .. }
            | Commands::Summary { build_args } => build_args.force,
            _ => false,
        }
    }
}
