//! Build dispatch for platform modules
//!
//! A platform is native when its directory holds a `Cargo.toml`, interpreted
//! otherwise. The classification decides the `language` recorded in the
//! manifest and which strategy produces the artifact:
//! - [`NativeModule`]: `cargo update` + `cargo build --release`, then copy the shared library
//! - [`InterpretedModule`]: `git archive` of the tracked platform directory

pub mod interpreted;
pub mod native;
pub mod toolchain;

pub use interpreted::InterpretedModule;
pub use native::NativeModule;
pub use toolchain::{CommandOutput, Invocation, SystemToolchain, Tool, Toolchain};

use crate::errors::SyncError;
use platsync_config::HostPlatform;
use platsync_manifest::{Language, PlatformDescriptor};
use std::path::{Path, PathBuf};

/// Marker file whose presence selects the native build
pub const NATIVE_MARKER: &str = "Cargo.toml";

pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
pub const MIME_ZIP: &str = "application/zip";

/// Which kind of platform a run builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Build native platforms only
    #[default]
    Native,
    /// Build interpreted platforms only
    Interpreted,
}

impl BuildMode {
    pub fn admits(self, language: Language) -> bool {
        matches!(
            (self, language),
            (BuildMode::Native, Language::Native) | (BuildMode::Interpreted, Language::Interpreted)
        )
    }
}

/// A built file ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub mime: &'static str,
}

impl BuildArtifact {
    /// File name the artifact is published under
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Shared inputs of both build strategies
pub struct BuildContext<'a> {
    pub toolchain: &'a dyn Toolchain,
    /// Absolute output directory
    pub dist_dir: &'a Path,
    pub host: Option<&'a HostPlatform>,
}

impl BuildContext<'_> {
    /// Run a step, turning spawn failures and non-zero exits into build errors
    pub(crate) fn run_step(
        &self,
        module: &str,
        invocation: &Invocation,
    ) -> Result<CommandOutput, SyncError> {
        let output = self
            .toolchain
            .run(invocation)
            .map_err(|source| SyncError::Spawn {
                module: module.to_string(),
                step: invocation.step_name(),
                source,
            })?;

        if !output.success {
            return Err(SyncError::Build {
                module: module.to_string(),
                step: invocation.step_name(),
                reason: output.failure_reason(),
            });
        }
        Ok(output)
    }
}

/// Build strategy selected for one platform directory
#[derive(Debug, Clone)]
pub enum ModuleBuild {
    Native(NativeModule),
    Interpreted(InterpretedModule),
}

impl ModuleBuild {
    /// Select the strategy from the platform's build markers
    pub fn classify(platform_dir: &Path) -> Self {
        let marker = platform_dir.join(NATIVE_MARKER);
        if marker.is_file() {
            ModuleBuild::Native(NativeModule::new(platform_dir))
        } else {
            ModuleBuild::Interpreted(InterpretedModule::new(platform_dir))
        }
    }

    pub fn language(&self) -> Language {
        match self {
            ModuleBuild::Native(_) => Language::Native,
            ModuleBuild::Interpreted(_) => Language::Interpreted,
        }
    }

    pub fn build(
        &self,
        descriptor: &PlatformDescriptor,
        ctx: &BuildContext<'_>,
    ) -> Result<BuildArtifact, SyncError> {
        match self {
            ModuleBuild::Native(module) => module.build(descriptor, ctx),
            ModuleBuild::Interpreted(module) => module.build(descriptor, ctx),
        }
    }
}
