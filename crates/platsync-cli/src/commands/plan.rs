use super::print_report;
use crate::build::SystemToolchain;
use crate::common::{GlobalOpts, PathArgs};
use crate::errors::SyncError;
use crate::publish::{DirectoryReleaseStore, Publisher};
use crate::sync::{Orchestrator, SyncOptions};

/// Print what `sync` would do; nothing is built, uploaded or written
pub fn handle_plan(args: PathArgs, opts: &GlobalOpts) -> Result<(), SyncError> {
    let mut config = opts.load_config()?;
    args.apply(&mut config);

    let options = SyncOptions {
        platforms_dir: config.platforms_dir.clone(),
        manifest_path: config.manifest_path.clone(),
        dist_dir: config.dist_dir.clone(),
        mode: args.mode(),
        commit: false,
    };
    // A plan never reaches the store, no need for credentials
    let publisher = Publisher::new(
        DirectoryReleaseStore::new(config.release.local_dir.clone()),
        config.release.manifest_remote_path.clone(),
        config.release.commit_message.clone(),
    );
    let orchestrator = Orchestrator::new(
        options,
        SystemToolchain::from_config(&config.build),
        publisher,
    )?;

    let report = orchestrator.plan()?;
    print_report(&report);
    println!(
        "{} to publish, {} to record, {} up to date",
        report.published(),
        report.recorded(),
        report.up_to_date()
    );
    Ok(())
}
