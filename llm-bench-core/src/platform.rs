//! Host platform detection.

use std::fmt;

const SUPPORTED_OS: &[&str] = &["linux", "macos", "windows", "freebsd", "netbsd", "openbsd"];
const SUPPORTED_ARCH: &[&str] = &["x86_64", "aarch64"];

/// Operating system and CPU architecture of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process runs on.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Whether a LocalScore release exists for this platform.
    pub fn is_supported(&self) -> bool {
        SUPPORTED_OS.contains(&self.os.as_str()) && SUPPORTED_ARCH.contains(&self.arch.as_str())
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// File name of the localscore executable on this platform.
    pub fn binary_name(&self) -> &'static str {
        if self.is_windows() {
            "localscore.exe"
        } else {
            "localscore"
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
