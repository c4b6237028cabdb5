//! Tool descriptors and on-disk binary locations.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::platform::{OsFamily, PlatformKey};

/// The external binaries glint knows how to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// `glslangValidator`, the command-line validator.
    Validator,
    /// `glsl_analyzer`, the language-analysis server.
    Analyzer,
}

impl Tool {
    #[must_use]
    pub fn descriptor(self) -> &'static ToolDescriptor {
        match self {
            Self::Validator => &VALIDATOR,
            Self::Analyzer => &ANALYZER,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a tool's local binary name encodes the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingScheme {
    /// `<name>-<os>[.exe]`
    OsOnly,
    /// `<name>-<arch>-<os>[.exe]`
    ArchAndOs,
}

/// Compile-time description of one provisionable tool.
#[derive(Debug)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub naming: NamingScheme,
    /// Release archive URL with `{os}` and `{arch}` placeholders.
    pub archive_url_template: &'static str,
    /// Archive-side OS labels for windows, macos and linux, in that order.
    pub archive_os_labels: [&'static str; 3],
    /// Path of the binary inside the archive, without the `.exe` suffix.
    pub entry_path: &'static str,
}

pub const VALIDATOR: ToolDescriptor = ToolDescriptor {
    name: "glslangValidator",
    naming: NamingScheme::OsOnly,
    archive_url_template: "https://github.com/KhronosGroup/glslang/releases/download/main-tot/glslang-master-{os}-Release.zip",
    archive_os_labels: ["windows-x64", "osx", "linux"],
    entry_path: "bin/glslangValidator",
};

pub const ANALYZER: ToolDescriptor = ToolDescriptor {
    name: "glsl_analyzer",
    naming: NamingScheme::ArchAndOs,
    archive_url_template: "https://github.com/nolanderc/glsl_analyzer/releases/download/v1.5.1/{arch}-{os}.zip",
    // Linux builds are the statically linked musl variant.
    archive_os_labels: ["windows", "macos", "linux-musl"],
    entry_path: "bin/glsl_analyzer",
};

impl ToolDescriptor {
    /// Local file name for this tool on `platform`.
    #[must_use]
    pub fn binary_name(&self, platform: PlatformKey) -> String {
        let os = platform.os();
        match self.naming {
            NamingScheme::OsOnly => format!("{}-{}{}", self.name, os.label(), os.exe_suffix()),
            NamingScheme::ArchAndOs => format!(
                "{}-{}-{}{}",
                self.name,
                platform.arch().label(),
                os.label(),
                os.exe_suffix()
            ),
        }
    }

    fn archive_os_label(&self, os: OsFamily) -> &'static str {
        match os {
            OsFamily::Windows => self.archive_os_labels[0],
            OsFamily::Macos => self.archive_os_labels[1],
            OsFamily::Linux => self.archive_os_labels[2],
        }
    }

    /// Expand a URL template for `platform`.
    #[must_use]
    pub fn expand_url(&self, template: &str, platform: PlatformKey) -> String {
        template
            .replace("{os}", self.archive_os_label(platform.os()))
            .replace("{arch}", platform.arch().label())
    }

    /// The release archive URL for `platform`.
    #[must_use]
    pub fn archive_url(&self, platform: PlatformKey) -> String {
        self.expand_url(self.archive_url_template, platform)
    }

    /// Suffix the matching archive entry must end with, in `/` form.
    #[must_use]
    pub fn entry_suffix(&self, platform: PlatformKey) -> String {
        format!("{}{}", self.entry_path, platform.os().exe_suffix())
    }
}

/// Where a tool's binary lives under an install root.
///
/// Layout: `<root>/bin/<tool>/<tool>-[<arch>-]<os>[.exe]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLocation {
    tool: Tool,
    relative: PathBuf,
    absolute: PathBuf,
}

impl BinaryLocation {
    #[must_use]
    pub fn resolve(root: &Path, tool: Tool, platform: PlatformKey) -> Self {
        let descriptor = tool.descriptor();
        let relative = Path::new("bin")
            .join(descriptor.name)
            .join(descriptor.binary_name(platform));
        let absolute = root.join(&relative);
        Self {
            tool,
            relative,
            absolute,
        }
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    #[must_use]
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }
}
