//! Common types and utilities shared across commands

use crate::build::BuildMode;
use clap::{Args, Parser};
use platsync_config::{Config, ConfigError};
use std::path::PathBuf;

/// Global CLI options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Decrease verbosity")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace)")]
    pub verbose: u8,

    /// Config file to use instead of the default lookup
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: quiet/warn only
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Path of the config file this invocation reads
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::path)
    }

    pub fn load_config(&self) -> Result<Config, ConfigError> {
        Config::load_from_path(&self.config_path())
    }
}

/// Locations shared by `sync` and `plan`; each overrides the config file
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Build and publish interpreted platforms instead of native ones
    #[arg(long)]
    pub python: bool,

    /// Directory containing one sub-directory per platform
    #[arg(long, value_name = "DIR")]
    pub platforms_dir: Option<PathBuf>,

    /// Local manifest file
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Output directory for built artifacts
    #[arg(long, value_name = "DIR")]
    pub dist_dir: Option<PathBuf>,
}

impl PathArgs {
    pub fn mode(&self) -> BuildMode {
        if self.python {
            BuildMode::Interpreted
        } else {
            BuildMode::Native
        }
    }

    /// Apply the overrides onto a loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.platforms_dir {
            config.platforms_dir = dir.clone();
        }
        if let Some(path) = &self.manifest {
            config.manifest_path = path.clone();
        }
        if let Some(dir) = &self.dist_dir {
            config.dist_dir = dir.clone();
        }
    }
}
