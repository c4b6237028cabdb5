use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use glint_provision::{ProvisionError, Provisioner, Tool};

const fn default_true() -> bool {
    true
}

const fn default_debounce_ms() -> u64 {
    500
}

const fn default_kill_timeout_ms() -> u64 {
    5000
}

/// Contents of `~/.glint/config.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct GlintConfig {
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Validation timing.
///
/// ```toml
/// [validation]
/// debounce_ms = 500
/// kill_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Quiet period after the last edit before validating.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Time a validator run may take before it is killed.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            kill_timeout_ms: default_kill_timeout_ms(),
        }
    }
}

impl ValidationConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

/// Where binaries are installed and fetched from.
///
/// ```toml
/// [provision]
/// install_root = "${HOME}/.glint"
/// validator_url = "https://mirror.example/glslang-{os}.zip"
/// analyzer_url = "https://mirror.example/glsl_analyzer-{arch}-{os}.zip"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvisionConfig {
    /// Install root; `${VAR}` references are expanded.
    pub install_root: Option<String>,
    pub validator_url: Option<String>,
    pub analyzer_url: Option<String>,
}

impl ProvisionConfig {
    /// Configured install root, else `<data dir>/glint`, else `./.glint`.
    #[must_use]
    pub fn install_root(&self) -> PathBuf {
        if let Some(root) = &self.install_root {
            return PathBuf::from(expand_env_vars(root));
        }
        dirs::data_dir().map_or_else(|| PathBuf::from(".glint"), |dir| dir.join("glint"))
    }

    /// Provisioner for the host platform with this section's overrides.
    pub fn provisioner(&self) -> Result<Provisioner, ProvisionError> {
        let mut provisioner = Provisioner::new(self.install_root())?;
        if let Some(url) = &self.validator_url {
            provisioner = provisioner.with_archive_url(Tool::Validator, url.clone());
        }
        if let Some(url) = &self.analyzer_url {
            provisioner = provisioner.with_archive_url(Tool::Analyzer, url.clone());
        }
        Ok(provisioner)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    /// Start the analysis server alongside validation.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

/// Expand `${VAR}` references from the environment. Unset variables expand to
/// nothing; an unclosed `${` is kept verbatim.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out
}

impl GlintConfig {
    /// Load the user config. `Ok(None)` when there is no config file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".glint").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // expand_env_vars tests

    #[test]
    fn expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("/opt/glint"), "/opt/glint");
    }

    #[test]
    fn expand_env_vars_single_var() {
        unsafe {
            std::env::set_var("GLINT_TEST_ROOT", "/srv");
        }
        assert_eq!(expand_env_vars("${GLINT_TEST_ROOT}/glint"), "/srv/glint");
        unsafe {
            std::env::remove_var("GLINT_TEST_ROOT");
        }
    }

    #[test]
    fn expand_env_vars_missing_var_becomes_empty() {
        unsafe {
            std::env::remove_var("GLINT_MISSING_VAR");
        }
        assert_eq!(expand_env_vars("a${GLINT_MISSING_VAR}b"), "ab");
    }

    #[test]
    fn expand_env_vars_unclosed_brace_preserved() {
        assert_eq!(expand_env_vars("root ${UNCLOSED"), "root ${UNCLOSED");
    }

    #[test]
    fn expand_env_vars_empty_var_name_dropped() {
        assert_eq!(expand_env_vars("a${}b"), "ab");
    }

    #[test]
    fn expand_env_vars_adjacent_vars() {
        unsafe {
            std::env::set_var("GLINT_ADJ_A", "X");
            std::env::set_var("GLINT_ADJ_B", "Y");
        }
        assert_eq!(expand_env_vars("${GLINT_ADJ_A}${GLINT_ADJ_B}"), "XY");
        unsafe {
            std::env::remove_var("GLINT_ADJ_A");
            std::env::remove_var("GLINT_ADJ_B");
        }
    }

    // parsing tests

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: GlintConfig = toml::from_str("").unwrap();
        assert_eq!(config.validation.debounce(), Duration::from_millis(500));
        assert_eq!(config.validation.kill_timeout(), Duration::from_secs(5));
        assert!(config.analyzer.enabled);
        assert!(config.provision.install_root.is_none());
    }

    #[test]
    fn parse_validation_section() {
        let config: GlintConfig = toml::from_str(
            r"
            [validation]
            debounce_ms = 250
            ",
        )
        .unwrap();
        assert_eq!(config.validation.debounce_ms, 250);
        assert_eq!(config.validation.kill_timeout_ms, 5000);
    }

    #[test]
    fn parse_provision_and_analyzer_sections() {
        let config: GlintConfig = toml::from_str(
            r#"
            [provision]
            install_root = "/opt/glint"
            validator_url = "https://mirror.test/glslang-{os}.zip"

            [analyzer]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.provision.install_root(), PathBuf::from("/opt/glint"));
        assert_eq!(
            config.provision.validator_url.as_deref(),
            Some("https://mirror.test/glslang-{os}.zip")
        );
        assert!(config.provision.analyzer_url.is_none());
        assert!(!config.analyzer.enabled);
    }

    #[test]
    fn default_install_root_is_not_empty() {
        let root = ProvisionConfig::default().install_root();
        assert!(root.ends_with("glint") || root.ends_with(".glint"));
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[validation\n").unwrap();

        let err = GlintConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), &path);
    }

    #[test]
    fn load_from_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = GlintConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[validation]\nkill_timeout_ms = 100\n").unwrap();

        let config = GlintConfig::load_from(&path).unwrap();
        assert_eq!(config.validation.kill_timeout(), Duration::from_millis(100));
    }
}
