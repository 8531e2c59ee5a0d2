use super::{open_store, print_report};
use crate::build::SystemToolchain;
use crate::common::{GlobalOpts, PathArgs};
use crate::errors::SyncError;
use crate::logger;
use crate::publish::{CommitOutcome, Publisher};
use crate::sync::{Orchestrator, SyncOptions};
use clap::Args;
use platsync_config::{Config, StoreKind};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    /// Commit the updated manifest to the release repository
    #[arg(long)]
    pub commit: bool,

    /// Release store to publish to (github or local)
    #[arg(long, value_name = "STORE")]
    pub store: Option<StoreKind>,

    /// Root directory of the local store (implies --store local)
    #[arg(long, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,
}

impl SyncArgs {
    pub fn apply(&self, config: &mut Config) {
        self.paths.apply(config);
        if let Some(dir) = &self.store_dir {
            config.release.store = StoreKind::Local;
            config.release.local_dir = dir.clone();
        }
        if let Some(store) = self.store {
            config.release.store = store;
        }
    }
}

pub fn handle_sync(args: SyncArgs, opts: &GlobalOpts) -> Result<(), SyncError> {
    let mut config = opts.load_config()?;
    args.apply(&mut config);
    logger::debug(&format!(
        "Syncing {} ({:?} mode, store {})",
        config.platforms_dir.display(),
        args.paths.mode(),
        config.release.store
    ));

    let options = SyncOptions {
        platforms_dir: config.platforms_dir.clone(),
        manifest_path: config.manifest_path.clone(),
        dist_dir: config.dist_dir.clone(),
        mode: args.paths.mode(),
        commit: args.commit,
    };
    let toolchain = SystemToolchain::from_config(&config.build);
    let publisher = Publisher::new(
        open_store(&config)?,
        config.release.manifest_remote_path.clone(),
        config.release.commit_message.clone(),
    );

    let mut orchestrator = Orchestrator::new(options, toolchain, publisher)?;
    let report = orchestrator.run()?;
    print_report(&report);

    logger::success(&format!(
        "{} published, {} recorded, {} up to date",
        report.published(),
        report.recorded(),
        report.up_to_date()
    ));
    if matches!(report.commit, Some(CommitOutcome::Unchanged)) {
        logger::info("Remote manifest unchanged");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_dir_selects_local_store() {
        let mut config = Config::default();
        let args = SyncArgs {
            store_dir: Some(PathBuf::from("/tmp/release")),
            ..SyncArgs::default()
        };
        args.apply(&mut config);
        assert_eq!(config.release.store, StoreKind::Local);
        assert_eq!(config.release.local_dir, PathBuf::from("/tmp/release"));
    }
}
