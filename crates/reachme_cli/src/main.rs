//! ReachMe CLI
//!
//! Command-line tools for inspecting and replaying ReachMe sync data.
//!
//! # Commands
//!
//! - `decode` - Validate a captured server response
//! - `merge` - Reconcile a captured response into a store
//! - `inspect` - Display store statistics
//! - `preview` - Show the notification a push payload produces

mod commands;
mod config;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ReachMe command-line sync tools.
#[derive(Parser)]
#[command(name = "reachme")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Kind of captured server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResponseKind {
    /// `fetch_msgs`
    Messages,
    /// `get_profile_info`
    Profile,
    /// `fetch_settings`
    Settings,
    /// `list_carriers`
    Carriers,
    /// `sign_in`, `verify_user` or `verify_pwd`
    Login,
    /// `join_user`
    Join,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a captured response and summarize it
    Decode {
        /// Response kind
        #[arg(value_enum)]
        kind: ResponseKind,

        /// File holding the response body
        file: PathBuf,
    },

    /// Reconcile a captured response into a store
    Merge {
        /// Response kind
        #[arg(value_enum)]
        kind: ResponseKind,

        /// File holding the response body
        file: PathBuf,

        /// Store directory
        #[arg(short, long)]
        store: PathBuf,

        /// Contact the carrier list belongs to
        #[arg(long)]
        contact: Option<String>,

        /// Login phone number, creating the profile if needed
        #[arg(long)]
        user: Option<String>,
    },

    /// Display store statistics
    Inspect {
        /// Store directory
        #[arg(short, long)]
        store: PathBuf,

        /// List stored messages
        #[arg(short, long)]
        messages: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the notification a push payload produces
    Preview {
        /// File holding the push payload
        file: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Decode { kind, file } => {
            commands::decode::run(kind, &file)?;
        }
        Commands::Merge {
            kind,
            file,
            store,
            contact,
            user,
        } => {
            let target = commands::merge::MergeTarget {
                contact: contact.as_deref(),
                user: user.as_deref(),
            };
            commands::merge::run(kind, &file, &store, target, &config)?;
        }
        Commands::Inspect {
            store,
            messages,
            format,
        } => {
            commands::inspect::run(&store, messages, &format, &config)?;
        }
        Commands::Preview { file } => {
            commands::preview::run(&file)?;
        }
        Commands::Version => {
            println!("ReachMe CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
