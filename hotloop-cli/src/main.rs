//! Hotloop CLI - Command-line interface for hotloop
//!
//! This is the main entry point. It resolves the configuration, sets up
//! logging, and runs the watch → build → restart loop.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "hotloop")]
#[command(author = "Hotloop Contributors")]
#[command(version)]
#[command(about = "Watches your sources, rebuilds on change, and restarts the app", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch, build and run (the default)
    Run(RunArgs),

    /// Write a default .hotloop.json
    Init {
        /// Project directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Print the resolved configuration as JSON
    Config(RunArgs),
}

/// Overrides applied on top of defaults and the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Config file (defaults to ./.hotloop.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to watch
    #[arg(long)]
    root: Option<PathBuf>,

    /// Folder name to ignore (repeatable)
    #[arg(long = "ignore")]
    ignore: Vec<String>,

    /// File extension to watch (repeatable)
    #[arg(long = "ext")]
    ext: Vec<String>,

    /// Build target handed to the build tool
    #[arg(short, long)]
    target: Option<String>,

    /// Directory the binary is built into
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Binary name
    #[arg(short, long)]
    name: Option<String>,

    /// Debounce delay in milliseconds
    #[arg(short, long)]
    delay: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        None => commands::run(&cli.run).await,
        Some(Commands::Run(args)) => commands::run(&args).await,
        Some(Commands::Init { path }) => commands::init(&path).map(|()| 0),
        Some(Commands::Config(args)) => commands::show_config(&args).map(|()| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
