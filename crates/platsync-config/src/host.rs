//! Host operating system and machine architecture
//!
//! Native platforms are published per OS and architecture. This module
//! provides the naming conventions that differ between hosts:
//! - the shared library file cargo produces (`lib{name}.so`, `lib{name}.dylib`, `{name}.dll`)
//! - the OS label used in published file names (`linux`, `macos`, `windows`)
//! - the machine label, with Windows `AMD64` rewritten to `x86_64`

use std::fmt;

/// Operating systems native platforms are published for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Linux,
    Macos,
    Windows,
}

impl HostOs {
    /// The OS this binary was compiled for
    pub fn current() -> Option<Self> {
        Self::from_target_os(std::env::consts::OS)
    }

    pub fn from_target_os(os: &str) -> Option<Self> {
        match os {
            "linux" => Some(HostOs::Linux),
            "macos" => Some(HostOs::Macos),
            "windows" => Some(HostOs::Windows),
            _ => None,
        }
    }

    /// Label used in published artifact names
    pub fn label(self) -> &'static str {
        match self {
            HostOs::Linux => "linux",
            HostOs::Macos => "macos",
            HostOs::Windows => "windows",
        }
    }

    pub fn library_prefix(self) -> &'static str {
        match self {
            HostOs::Linux | HostOs::Macos => "lib",
            HostOs::Windows => "",
        }
    }

    pub fn library_extension(self) -> &'static str {
        match self {
            HostOs::Linux => "so",
            HostOs::Macos => "dylib",
            HostOs::Windows => "dll",
        }
    }

    /// File name cargo gives a `cdylib` called `lib_name` on this OS
    pub fn library_file_name(self, lib_name: &str) -> String {
        format!(
            "{}{}.{}",
            self.library_prefix(),
            lib_name,
            self.library_extension()
        )
    }

    /// Machine label as the OS itself reports it (`uname -m` style)
    pub fn machine_label(self, target_arch: &str) -> String {
        match (self, target_arch) {
            (HostOs::Macos, "aarch64") => "arm64".to_string(),
            (HostOs::Windows, "x86_64") => "AMD64".to_string(),
            (HostOs::Windows, "aarch64") => "ARM64".to_string(),
            (HostOs::Windows, "x86") => "x86".to_string(),
            (_, arch) => arch.to_string(),
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rewrite architecture labels so published names agree across operating systems
pub fn normalize_arch(os: HostOs, raw: &str) -> String {
    match (os, raw) {
        (HostOs::Windows, "AMD64" | "amd64" | "x64") => "x86_64".to_string(),
        (_, arch) => arch.to_string(),
    }
}

/// OS and normalized architecture of the build host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: HostOs,
    pub arch: String,
}

impl HostPlatform {
    pub fn new(os: HostOs, raw_arch: &str) -> Self {
        HostPlatform {
            os,
            arch: normalize_arch(os, raw_arch),
        }
    }

    /// Detect the platform this binary runs on, `None` for unsupported operating systems
    pub fn detect() -> Option<Self> {
        let os = HostOs::current()?;
        let machine = os.machine_label(std::env::consts::ARCH);
        Some(Self::new(os, &machine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_file_names() {
        assert_eq!(HostOs::Linux.library_file_name("tidal"), "libtidal.so");
        assert_eq!(HostOs::Macos.library_file_name("tidal"), "libtidal.dylib");
        assert_eq!(HostOs::Windows.library_file_name("tidal"), "tidal.dll");
    }

    #[test]
    fn test_windows_amd64_normalized() {
        let host = HostPlatform::new(HostOs::Windows, "AMD64");
        assert_eq!(host.arch, "x86_64");
        assert_eq!(normalize_arch(HostOs::Windows, "ARM64"), "ARM64");
    }

    #[test]
    fn test_other_hosts_keep_machine_label() {
        assert_eq!(normalize_arch(HostOs::Linux, "aarch64"), "aarch64");
        assert_eq!(normalize_arch(HostOs::Macos, "arm64"), "arm64");
    }

    #[test]
    fn test_machine_labels() {
        assert_eq!(HostOs::Macos.machine_label("aarch64"), "arm64");
        assert_eq!(HostOs::Linux.machine_label("aarch64"), "aarch64");
        assert_eq!(HostOs::Windows.machine_label("x86_64"), "AMD64");
    }

    #[test]
    fn test_detect_matches_target() {
        let detected = HostPlatform::detect();
        #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
        assert!(detected.is_some_and(|h| h.os.label() == std::env::consts::OS));
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        assert!(detected.is_none());
    }
}
