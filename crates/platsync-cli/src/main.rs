use clap::{Parser, Subcommand};
use platsync::{
    commands::{
        config::{self, ConfigAction},
        list, plan,
        sync::{self, SyncArgs},
    },
    common::PathArgs,
    logger, GlobalOpts, SyncError,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "platsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Build and publish platform modules",
    long_about = "platsync builds every platform whose version is newer than the published one, \
                  uploads its artifact to the release and records it in the platforms manifest."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, upload and record every new or upgraded platform
    Sync(SyncArgs),
    /// Show what sync would do without building or writing anything
    Plan(PathArgs),
    /// List published platforms, or the release history of one
    List {
        /// Platform id to show in detail
        id: Option<String>,
        /// Manifest file to read
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,
    },
    /// Inspect or change the configuration
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

fn init_tracing(verbosity: u8) {
    let fallback = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("PLATSYNC_LOG")
        .unwrap_or_else(|_| format!("platsync={0},platsync_manifest={0}", fallback).into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    let verbosity = cli.global.verbosity_level();

    if let Err(e) = logger::init_with_verbosity(verbosity) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing(verbosity);

    let result = match cli.command {
        Commands::Sync(args) => sync::handle_sync(args, &cli.global),
        Commands::Plan(args) => plan::handle_plan(args, &cli.global),
        Commands::List { id, manifest } => list::list_platforms(&cli.global, manifest, id),
        Commands::Config { action } => config::handle_config(action, &cli.global),
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }
}

fn report_error(error: &SyncError) {
    match (error.module(), logger::get_current_module()) {
        (None, Some(module)) => logger::error(&format!("{} (while processing '{}')", error, module)),
        _ => logger::error(&error.to_string()),
    }
    if logger::get_verbosity() == 0 {
        logger::show_log_path();
    }
}
