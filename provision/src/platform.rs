//! Host platform resolution.
//!
//! Explicit finite tables: an OS or architecture outside them is a hard
//! error. There is no fallback binary.

use std::fmt;
use std::sync::OnceLock;

use crate::ProvisionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows,
    Macos,
    Linux,
}

impl OsFamily {
    fn from_identifier(os: &str) -> Option<Self> {
        match os {
            "windows" | "win32" => Some(Self::Windows),
            "macos" | "darwin" => Some(Self::Macos),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }

    /// Name used in local binary file names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
        }
    }

    /// Executable suffix, `.exe` on windows and empty elsewhere.
    #[must_use]
    pub fn exe_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::Macos | Self::Linux => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    fn from_identifier(arch: &str) -> Option<Self> {
        match arch {
            "x86_64" | "x64" | "amd64" => Some(Self::X86_64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }
}

/// Operating system family and CPU architecture of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    os: OsFamily,
    arch: Arch,
}

impl PlatformKey {
    #[must_use]
    pub fn new(os: OsFamily, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Map raw OS and architecture identifiers onto a supported key.
    pub fn resolve(os: &str, arch: &str) -> Result<Self, ProvisionError> {
        match (OsFamily::from_identifier(os), Arch::from_identifier(arch)) {
            (Some(os), Some(arch)) => Ok(Self { os, arch }),
            _ => Err(ProvisionError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    /// The running host, read from the environment once per process.
    pub fn host() -> Result<Self, ProvisionError> {
        static HOST: OnceLock<Result<PlatformKey, (String, String)>> = OnceLock::new();
        let resolved = HOST.get_or_init(|| {
            let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
            tracing::debug!(os, arch, "Detected host platform");
            Self::resolve(os, arch).map_err(|_| (os.to_string(), arch.to_string()))
        });
        resolved
            .clone()
            .map_err(|(os, arch)| ProvisionError::UnsupportedPlatform { os, arch })
    }

    #[must_use]
    pub fn os(self) -> OsFamily {
        self.os
    }

    #[must_use]
    pub fn arch(self) -> Arch {
        self.arch
    }
}

impl fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch.label(), self.os.label())
    }
}
