pub mod config;
pub mod list;
pub mod plan;
pub mod sync;

use crate::errors::SyncError;
use crate::publish::{DirectoryReleaseStore, GithubReleaseStore, ReleaseStore};
use crate::sync::{Action, SyncReport};
use colored::Colorize;
use platsync_config::{Config, StoreKind};

/// Open the release store selected in the config
pub(crate) fn open_store(config: &Config) -> Result<Box<dyn ReleaseStore>, SyncError> {
    match config.release.store {
        StoreKind::Github => {
            let store =
                GithubReleaseStore::from_config(&config.release).map_err(SyncError::Store)?;
            if !store.has_token() {
                crate::logger::debug(&format!(
                    "{} is not set, uploads and commits will be refused",
                    config.release.token_env
                ));
            }
            Ok(Box::new(store))
        }
        StoreKind::Local => Ok(Box::new(DirectoryReleaseStore::new(
            config.release.local_dir.clone(),
        ))),
    }
}

pub(crate) fn print_report(report: &SyncReport) {
    if report.modules.is_empty() {
        println!("No platforms found.");
        return;
    }

    let header = if report.dry_run { "Plan:" } else { "Platforms:" };
    println!("{}", header.bold().green());
    for module in &report.modules {
        let marker = match (&module.action, report.dry_run) {
            (Action::Published { .. }, false) => "published".green(),
            (Action::Published { .. }, true) => "publish".green(),
            (Action::Recorded, false) => "recorded".yellow(),
            (Action::Recorded, true) => "record".yellow(),
            (Action::UpToDate, _) => "up to date".dimmed(),
        };
        println!("  {:<12} {}", marker, module);
    }
}
