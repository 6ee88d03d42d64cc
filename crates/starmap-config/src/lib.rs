//! Configuration loader for StarMap.
//!
//! `defaults/starmap.default.toml` is embedded into the binary.
//! [`Loader`] layers a user file and environment overrides on top of it
//!     before deserializing into [`StarMapConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use starmap::job::JobFile;
use std::path::{Path, PathBuf};

mod discovery;
pub use discovery::*;

const DEFAULT_TOML: &str = include_str!("../defaults/starmap.default.toml");

/// Environment variable that overrides the templates directory.
pub const TEMPLATES_DIR_VAR: &str = "STARMAP_TEMPLATES_DIR";
/// Prefix of the environment variables that override the user placeholder labels.
pub const USER_VAR_PREFIX: &str = "STARMAP_USER";

/// Top-level StarMap configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StarMapConfig {
    pub rosetta: RosettaConfig,
    pub templates: TemplatesConfig,
    pub user: UserLabels,
}

/// Names of the Rosetta executables before discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct RosettaConfig {
    pub scripts: String,
    pub scripts_mpi: String,
    pub density_tools: String,
    pub symmdef: String,
    pub fallback_suffix: String,
    pub macos_fallback_suffix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatesConfig {
    pub directory: PathBuf,
    pub rosetta_script: String,
    pub apix_script: String,
    pub symmetry_check: String,
}

impl TemplatesConfig {
    pub fn rosetta_script_path(&self) -> PathBuf {
        self.directory.join(&self.rosetta_script)
    }

    pub fn apix_script_path(&self) -> PathBuf {
        self.directory.join(&self.apix_script)
    }

    pub fn symmetry_check_path(&self) -> PathBuf {
        self.directory.join(&self.symmetry_check)
    }
}

/// Labels shown for the eight user placeholders.
#[derive(Debug, Clone, Deserialize)]
pub struct UserLabels {
    pub user1: String,
    pub user2: String,
    pub user3: String,
    pub user4: String,
    pub user5: String,
    pub user6: String,
    pub user7: String,
    pub user8: String,
}

impl UserLabels {
    pub fn labels(&self) -> [&str; 8] {
        [
            &self.user1,
            &self.user2,
            &self.user3,
            &self.user4,
            &self.user5,
            &self.user6,
            &self.user7,
            &self.user8,
        ]
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Apply the `STARMAP_*` overrides found in the given variables.
    ///
    /// Empty values are ignored.
    pub fn with_env_vars<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if value.is_empty() {
                continue;
            }
            if name == TEMPLATES_DIR_VAR {
                self = self.set_override("templates.directory", value)?;
            } else if let Some(n) = name.strip_prefix(USER_VAR_PREFIX) {
                if matches!(n, "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8") {
                    self = self.set_override(&format!("user.user{n}"), value)?;
                }
            }
        }
        Ok(self)
    }

    /// Apply the `STARMAP_*` overrides of the process environment.
    pub fn with_environment(self) -> Result<Self, ConfigError> {
        self.with_env_vars(std::env::vars())
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<StarMapConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<StarMapConfig, ConfigError> {
    Loader::new().build()
}

/// Location of the user configuration file, `$XDG_CONFIG_HOME/starmap/config.toml`.
///
/// Falls back to `~/.config` when `XDG_CONFIG_HOME` is not set.
pub fn user_config_path() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(std::env::var_os("HOME")?).join(".config"),
    };
    Some(base.join("starmap").join("config.toml"))
}

/// Load a job file.
pub fn load_job(path: impl AsRef<Path>) -> Result<JobFile, ConfigError> {
    Config::builder()
        .add_source(
            File::from(path.as_ref())
                .format(FileFormat::Toml)
                .required(true),
        )
        .build()?
        .try_deserialize()
}

/// Parse a job from TOML source.
pub fn parse_job(source: &str) -> Result<JobFile, ConfigError> {
    Config::builder()
        .add_source(File::from_str(source, FileFormat::Toml))
        .build()?
        .try_deserialize()
}

/// Configuration listing as `KEY = value` lines.
pub fn report(config: &StarMapConfig, discovery: &Discovery, version: &str, cores: usize) -> String {
    let executables = &discovery.executables;
    let templates = &config.templates;
    let mut entries: Vec<(String, String)> = vec![
        ("STARMAP_VERSION".into(), version.into()),
        ("ROSETTA_SCRIPTS_CMD".into(), executables.scripts.clone()),
        ("ROSETTA_SCRIPTS_MPI_CMD".into(), executables.scripts_mpi.clone()),
        ("ROSETTA_DENSITY_CMD".into(), executables.density_tools.clone()),
        ("ROSETTA_SYMMDEF_CMD".into(), executables.symmdef.clone()),
        (
            "STARMAP_ROSETTA_SCRIPT".into(),
            templates.rosetta_script_path().display().to_string(),
        ),
        (
            "STARMAP_ROSETTA_APIX_SCRIPT".into(),
            templates.apix_script_path().display().to_string(),
        ),
        (
            "STARMAP_SYMMETRY_CMD".into(),
            templates.symmetry_check_path().display().to_string(),
        ),
        (
            "STARMAP_TEMPLATES_DIR".into(),
            templates.directory.display().to_string(),
        ),
    ];
    for (i, label) in config.user.labels().iter().enumerate() {
        entries.push((format!("{USER_VAR_PREFIX}{}", i + 1), label.to_string()));
    }
    entries.push(("LOCAL_CORES".into(), cores.to_string()));
    entries
        .iter()
        .map(|(key, value)| format!("{key:<28}= {value}\n"))
        .collect()
}
