//! Release pipeline for a directory of platforms
//!
//! For every platform directory, in name order:
//! 1. load and validate `info.json`
//! 2. classify native or interpreted
//! 3. decide eligibility against the manifest (new, or strictly newer)
//! 4. if the build mode admits the platform, build and upload its artifact
//! 5. record the release in the manifest
//!
//! An eligible platform is recorded even when the build mode filters it out,
//! so the complementary run (e.g. `--python`) uploads the matching artifact.
//!
//! Nothing is persisted unless every platform went through. The local
//! manifest is written first, then the remote one is committed when asked.

use crate::build::{BuildContext, BuildMode, ModuleBuild, Toolchain};
use crate::errors::SyncError;
use crate::logger;
use crate::naming::artifact_name;
use crate::publish::{CommitOutcome, Publisher, ReleaseStore};
use platsync_config::HostPlatform;
use platsync_manifest::{Eligibility, Language, Manifest, PlatformDescriptor};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inputs of one pipeline run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub platforms_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub dist_dir: PathBuf,
    pub mode: BuildMode,
    /// Commit the manifest to the release store after a successful run
    pub commit: bool,
}

/// What happened to one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Artifact uploaded (or, in a plan, would be) and release recorded
    Published { asset: String },
    /// Release recorded, artifact left to a run in the other build mode
    Recorded,
    /// Published version is not older; nothing done
    UpToDate,
}

#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub id: Arc<str>,
    pub version: Arc<str>,
    pub language: Language,
    pub eligibility: Eligibility,
    pub action: Action,
}

impl fmt::Display for ModuleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.action, &self.eligibility) {
            (Action::Published { asset }, Eligibility::Upgrade { previous }) => write!(
                f,
                "{} {} -> {} ({})",
                self.id, previous, self.version, asset
            ),
            (Action::Published { asset }, _) => {
                write!(f, "{} {} new ({})", self.id, self.version, asset)
            }
            (Action::Recorded, _) => write!(
                f,
                "{} {} recorded, {} artifact not built in this mode",
                self.id, self.version, self.language
            ),
            (Action::UpToDate, Eligibility::UpToDate { published }) => {
                write!(f, "{} {} up to date (published {})", self.id, self.version, published)
            }
            (Action::UpToDate, _) => write!(f, "{} {} up to date", self.id, self.version),
        }
    }
}

/// Outcome of a run or plan
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub modules: Vec<ModuleReport>,
    /// Whether anything was actually built, uploaded or written
    pub dry_run: bool,
    pub commit: Option<CommitOutcome>,
}

impl SyncReport {
    pub fn count(&self, matches: impl Fn(&Action) -> bool) -> usize {
        self.modules.iter().filter(|m| matches(&m.action)).count()
    }

    pub fn published(&self) -> usize {
        self.count(|a| matches!(a, Action::Published { .. }))
    }

    pub fn recorded(&self) -> usize {
        self.count(|a| matches!(a, Action::Recorded))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|a| matches!(a, Action::UpToDate))
    }
}

/// Platform directories under `platforms_dir`, hidden entries skipped, sorted by name
pub fn discover_modules(platforms_dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let discovery = |source| SyncError::Discovery {
        path: platforms_dir.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(platforms_dir).map_err(discovery)? {
        let entry = entry.map_err(discovery)?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn folder_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

/// Loaded and classified platform with its eligibility
struct Candidate {
    descriptor: PlatformDescriptor,
    build: ModuleBuild,
    eligibility: Eligibility,
}

fn evaluate(manifest: &Manifest, dir: &Path) -> Result<Candidate, SyncError> {
    let folder = folder_name(dir);
    let descriptor =
        PlatformDescriptor::load(dir).map_err(|e| SyncError::descriptor(&folder, e))?;
    let build = ModuleBuild::classify(dir);
    let eligibility = manifest
        .eligibility(&descriptor)
        .map_err(|e| SyncError::manifest(&descriptor.id, e))?;
    Ok(Candidate {
        descriptor,
        build,
        eligibility,
    })
}

/// Drives one pipeline run; owns the manifest for its duration
pub struct Orchestrator<T, S> {
    options: SyncOptions,
    manifest: Manifest,
    toolchain: T,
    publisher: Publisher<S>,
    host: Option<HostPlatform>,
}

impl<T: Toolchain, S: ReleaseStore> Orchestrator<T, S> {
    /// Load the manifest from `options.manifest_path` (empty if absent)
    pub fn new(options: SyncOptions, toolchain: T, publisher: Publisher<S>) -> Result<Self, SyncError> {
        let manifest = Manifest::load_from_path(&options.manifest_path)?;
        Ok(Self::with_manifest(options, manifest, toolchain, publisher))
    }

    pub fn with_manifest(
        options: SyncOptions,
        manifest: Manifest,
        toolchain: T,
        publisher: Publisher<S>,
    ) -> Self {
        Orchestrator {
            options,
            manifest,
            toolchain,
            publisher,
            host: HostPlatform::detect(),
        }
    }

    /// Override the detected host, e.g. to name artifacts for another platform
    #[must_use]
    pub fn with_host(mut self, host: Option<HostPlatform>) -> Self {
        self.host = host;
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Build, publish and record every eligible platform, then persist the manifest
    pub fn run(&mut self) -> Result<SyncReport, SyncError> {
        if self.options.commit {
            self.publisher
                .pin_manifest_revision()
                .map_err(SyncError::commit)?;
        }

        let modules = self.process_all()?;
        logger::set_current_module(None);

        let mut report = SyncReport {
            modules,
            dry_run: false,
            commit: None,
        };
        report.commit = self.persist()?;
        Ok(report)
    }

    /// Same decisions as [`run`](Self::run) without building, uploading or writing
    pub fn plan(&self) -> Result<SyncReport, SyncError> {
        let mut manifest = self.manifest.clone();
        let mut modules = Vec::new();

        for dir in discover_modules(&self.options.platforms_dir)? {
            let candidate = evaluate(&manifest, &dir)?;
            let language = candidate.build.language();
            let action = if !candidate.eligibility.is_eligible() {
                Action::UpToDate
            } else if self.options.mode.admits(language) {
                let asset = artifact_name(
                    &candidate.descriptor.id,
                    candidate.descriptor.version.as_str(),
                    language,
                    self.host.as_ref(),
                )
                .ok_or_else(|| unsupported_host(&candidate.descriptor.id))?;
                Action::Published { asset }
            } else {
                Action::Recorded
            };

            if candidate.eligibility.is_eligible() {
                manifest.record_release(&candidate.descriptor, language);
            }
            modules.push(report_for(&candidate, language, action));
        }

        Ok(SyncReport {
            modules,
            dry_run: true,
            commit: None,
        })
    }

    fn process_all(&mut self) -> Result<Vec<ModuleReport>, SyncError> {
        let dirs = discover_modules(&self.options.platforms_dir)?;
        logger::debug(&format!(
            "Found {} platform(s) in {}",
            dirs.len(),
            self.options.platforms_dir.display()
        ));

        let mut reports = Vec::with_capacity(dirs.len());
        for dir in dirs {
            logger::set_current_module(Some(folder_name(&dir)));
            let report = self.process_module(&dir)?;
            logger::step(&report.to_string());
            reports.push(report);
        }
        Ok(reports)
    }

    fn process_module(&mut self, dir: &Path) -> Result<ModuleReport, SyncError> {
        let candidate = evaluate(&self.manifest, dir)?;
        let descriptor = &candidate.descriptor;
        let language = candidate.build.language();
        logger::set_current_module(Some(descriptor.id.to_string()));

        if !candidate.eligibility.is_eligible() {
            logger::debug(&format!(
                "Skipping '{}' {}: not newer than the published version",
                descriptor.id, descriptor.version
            ));
            return Ok(report_for(&candidate, language, Action::UpToDate));
        }

        let action = if self.options.mode.admits(language) {
            let asset = self.build_and_publish(&candidate)?;
            Action::Published { asset }
        } else {
            logger::info(&format!(
                "Recording '{}' {} without building ({} platform)",
                descriptor.id, descriptor.version, language
            ));
            Action::Recorded
        };

        self.manifest.record_release(descriptor, language);
        Ok(report_for(&candidate, language, action))
    }

    fn build_and_publish(&mut self, candidate: &Candidate) -> Result<String, SyncError> {
        let descriptor = &candidate.descriptor;
        let dist_dir = self.prepare_dist_dir()?;

        logger::spinner_start(&format!("Building {} {}", descriptor.id, descriptor.version));
        let ctx = BuildContext {
            toolchain: &self.toolchain,
            dist_dir: &dist_dir,
            host: self.host.as_ref(),
        };
        let built = candidate.build.build(descriptor, &ctx);
        let artifact = match built {
            Ok(artifact) => artifact,
            Err(e) => {
                logger::spinner_error(&format!("Build of '{}' failed", descriptor.id));
                return Err(e);
            }
        };

        let asset = artifact.file_name();
        self.publisher
            .publish(&artifact)
            .map_err(|source| SyncError::Publish {
                module: descriptor.id.to_string(),
                asset: asset.clone(),
                source,
            })?;
        logger::spinner_success(&format!("Published {}", asset));
        Ok(asset)
    }

    fn prepare_dist_dir(&self) -> Result<PathBuf, SyncError> {
        let dist_dir = if self.options.dist_dir.is_absolute() {
            self.options.dist_dir.clone()
        } else {
            std::env::current_dir()?.join(&self.options.dist_dir)
        };
        std::fs::create_dir_all(&dist_dir)?;
        Ok(dist_dir)
    }

    fn persist(&mut self) -> Result<Option<CommitOutcome>, SyncError> {
        self.manifest.save_to_path(&self.options.manifest_path)?;
        logger::debug(&format!(
            "Wrote {} entries to {}",
            self.manifest.len(),
            self.options.manifest_path.display()
        ));

        if !self.options.commit {
            return Ok(None);
        }
        let bytes = self.manifest.to_json_bytes()?;
        let outcome = self
            .publisher
            .commit_manifest(&bytes)
            .map_err(SyncError::commit)?;
        if let CommitOutcome::Updated(revision) = &outcome {
            logger::success(&format!(
                "Committed {} (revision {})",
                self.publisher.manifest_path(),
                revision
            ));
        }
        Ok(Some(outcome))
    }
}

fn report_for(candidate: &Candidate, language: Language, action: Action) -> ModuleReport {
    ModuleReport {
        id: candidate.descriptor.id.clone(),
        version: candidate.descriptor.version.as_arc(),
        language,
        eligibility: candidate.eligibility.clone(),
        action,
    }
}

fn unsupported_host(module: &str) -> SyncError {
    SyncError::UnsupportedHost(format!(
        "cannot name native artifact of '{}' on {}",
        module,
        std::env::consts::OS
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_skips_hidden_and_files() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let root = temp_dir.path();
        for dir in ["tidal", ".git", "beatport", "deezer"] {
            assert!(std::fs::create_dir_all(root.join(dir)).is_ok());
        }
        assert!(std::fs::write(root.join("README.md"), "platforms").is_ok());

        let Ok(found) = discover_modules(root) else {
            return;
        };
        let names: Vec<String> = found.iter().map(|d| folder_name(d)).collect();
        assert_eq!(names, vec!["beatport", "deezer", "tidal"]);
    }

    #[test]
    fn test_discover_missing_dir_is_error() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let result = discover_modules(&temp_dir.path().join("missing"));
        assert!(matches!(result, Err(SyncError::Discovery { .. })));
    }
}
