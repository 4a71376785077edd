// Copyright (c) The phaselog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for phaselog.
//!
//! Settings are read from an embedded default configuration, overlaid with either
//! `.config/phaselog.toml` in the workspace root or an explicitly provided file. Settings live in
//! named profiles under `[profile.<name>]`, and every profile inherits unset keys from
//! `[profile.default]`.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, ProfileNotFound},
    router::{LogStyles, RouterSettings, Severity},
    session::{JunitSettings, SessionSettings},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Trait for handling configuration warnings.
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a config file.
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        workspace_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    );
}

/// Logs configuration warnings through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(
        &mut self,
        config_file: &Utf8Path,
        workspace_root: &Utf8Path,
        unknown: &BTreeSet<String>,
    ) {
        let mut unknown_str = String::new();
        if unknown.len() == 1 {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.extend(unknown.iter().map(String::as_str));
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push('\n');
                unknown_str.push_str("  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!(
            "in config file {}, ignoring unknown configuration {unknown_str}",
            config_file
                .strip_prefix(workspace_root)
                .unwrap_or(config_file),
        )
    }
}

/// Settings supplied on the command line that take precedence over the selected profile.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Replaces the profile's `log-dir`. Relative paths are resolved against the workspace root.
    pub log_dir: Option<Utf8PathBuf>,

    /// Replaces the profile's `level`.
    pub level: Option<Severity>,
}

/// Overall configuration for phaselog.
///
/// This is the root data structure for phaselog configuration. Most runners would want to call
/// [`profile`](Self::profile) to get the settings for the active profile.
#[derive(Clone, Debug)]
pub struct PhaselogConfig {
    workspace_root: Utf8PathBuf,
    inner: ConfigImpl,
}

impl PhaselogConfig {
    /// The default location of the config within the workspace: `.config/phaselog.toml`.
    pub const CONFIG_PATH: &'static str = ".config/phaselog.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// Reads the phaselog config from the given file, or if not specified from
    /// `.config/phaselog.toml` in the workspace root.
    ///
    /// Unknown keys are reported through [`DefaultConfigWarnings`].
    pub fn from_sources(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_warnings(workspace_root, config_file, &mut DefaultConfigWarnings)
    }

    /// Reads the phaselog config, reporting warnings to `warnings`.
    pub fn from_sources_with_warnings(
        workspace_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let workspace_root = workspace_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (
                file.to_owned(),
                File::new(file.as_str(), FileFormat::Toml),
            ),
            None => {
                let file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(file.as_str(), FileFormat::Toml).required(false);
                (file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (inner, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(&config_file, &workspace_root, &unknown);
        }

        inner
            .validate()
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        Ok(Self {
            workspace_root,
            inner,
        })
    }

    /// Returns the default phaselog config.
    #[cfg(test)]
    pub(crate) fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Self {
        use itertools::Itertools;

        let config = Self::make_default_config()
            .build()
            .expect("default config is always valid");

        let mut unknown = BTreeSet::new();
        let inner: ConfigImpl = serde_ignored::deserialize(config, |path: serde_ignored::Path| {
            unknown.insert(path.to_string());
        })
        .expect("default config is always valid");

        // The default config is embedded in the binary, so it must not have unknown keys.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.iter().join(", ")
            );
        }

        Self {
            workspace_root: workspace_root.into(),
            inner,
        }
    }

    /// Returns the workspace root that relative paths are resolved against.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Returns the names of all known profiles, including the default one.
    pub fn all_profiles(&self) -> impl Iterator<Item = &str> + '_ {
        self.inner.profiles.all_profiles()
    }

    /// Returns the profile with the given name, or an error if a profile was specified but not
    /// found.
    pub fn profile(&self, name: impl AsRef<str>) -> Result<PhaselogProfile<'_>, ProfileNotFound> {
        let name = name.as_ref();
        let custom_profile = self.inner.profiles.get(name)?;
        Ok(PhaselogProfile {
            name: name.to_owned(),
            workspace_root: &self.workspace_root,
            default_profile: &self.inner.profiles.default,
            custom_profile,
        })
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ConfigImpl, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: ConfigImpl = serde_path_to_error::deserialize(ignored_de).map_err(|error| {
            // serde_path_to_error already reports the key, so drop it from the config error.
            let path = error.path().clone();
            let error = match error.into_inner() {
                ConfigError::At { error, .. } => *error,
                other => other,
            };
            ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                path, error,
            )))
        })?;

        Ok((config, ignored))
    }
}

/// A phaselog profile, with settings resolved against `[profile.default]`.
///
/// Returned by [`PhaselogConfig::profile`].
#[derive(Clone, Debug)]
pub struct PhaselogProfile<'cfg> {
    name: String,
    workspace_root: &'cfg Utf8Path,
    default_profile: &'cfg DefaultProfileImpl,
    custom_profile: Option<&'cfg CustomProfileImpl>,
}

impl<'cfg> PhaselogProfile<'cfg> {
    /// Returns the name of the profile.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the absolute directory for log files and exports.
    pub fn log_dir(&self) -> Utf8PathBuf {
        let log_dir = self
            .custom_profile
            .and_then(|profile| profile.log_dir.as_deref())
            .unwrap_or(&self.default_profile.log_dir);
        self.workspace_root.join(log_dir)
    }

    /// Returns the session-wide minimum severity.
    pub fn level(&self) -> Severity {
        self.custom_profile
            .and_then(|profile| profile.level)
            .unwrap_or(self.default_profile.level)
    }

    /// Returns the command-line threshold.
    pub fn cmd_level(&self) -> Severity {
        self.custom_profile
            .and_then(|profile| profile.cmd_level)
            .unwrap_or(self.default_profile.cmd_level)
    }

    /// Returns the command-line threshold used while a setup phase is current.
    pub fn setup_cmd_level(&self) -> Severity {
        self.custom_profile
            .and_then(|profile| profile.setup_cmd_level)
            .unwrap_or(self.default_profile.setup_cmd_level)
    }

    /// Returns the per-phase file threshold.
    pub fn file_level(&self) -> Severity {
        self.custom_profile
            .and_then(|profile| profile.file_level)
            .unwrap_or(self.default_profile.file_level)
    }

    /// Returns the global log threshold.
    pub fn global_level(&self) -> Severity {
        self.custom_profile
            .and_then(|profile| profile.global_level)
            .unwrap_or(self.default_profile.global_level)
    }

    /// Returns true if the global log is written.
    pub fn global_log(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.global_log)
            .unwrap_or(self.default_profile.global_log)
    }

    /// Returns true if register entries are numbered as substeps.
    pub fn rw_substeps(&self) -> bool {
        self.custom_profile
            .and_then(|profile| profile.rw_substeps)
            .unwrap_or(self.default_profile.rw_substeps)
    }

    /// Returns the export document path, relative to [`log_dir`](Self::log_dir), or `None` if
    /// exports are disabled.
    pub fn export_path(&self) -> Option<&'cfg Utf8Path> {
        let path = self
            .custom_profile
            .and_then(|profile| profile.export.path.as_deref())
            .unwrap_or(&self.default_profile.export.path);
        (!path.as_str().is_empty()).then_some(path)
    }

    /// Returns the JUnit report path relative to [`log_dir`](Self::log_dir), if set.
    pub fn junit_path(&self) -> Option<&'cfg Utf8Path> {
        self.custom_profile
            .and_then(|profile| profile.junit.path.as_deref())
            .or(self.default_profile.junit.path.as_deref())
            .filter(|path| !path.as_str().is_empty())
    }

    /// Returns the JUnit report name.
    pub fn junit_report_name(&self) -> &'cfg str {
        self.custom_profile
            .and_then(|profile| profile.junit.report_name.as_deref())
            .unwrap_or(&self.default_profile.junit.report_name)
    }

    /// Builds session settings from this profile, applying `overrides` on top.
    pub fn session_settings(&self, overrides: &ConfigOverrides, styles: LogStyles) -> SessionSettings {
        let log_dir = match &overrides.log_dir {
            Some(dir) => self.workspace_root.join(dir),
            None => self.log_dir(),
        };

        let router = RouterSettings {
            log_dir: log_dir.clone(),
            level: overrides.level.unwrap_or_else(|| self.level()),
            cmd_level: self.cmd_level(),
            setup_cmd_level: self.setup_cmd_level(),
            file_level: self.file_level(),
            global_level: self.global_level(),
            global_log: self.global_log(),
            rw_substeps: self.rw_substeps(),
            styles,
        };

        SessionSettings {
            router,
            export_path: self.export_path().map(|path| log_dir.join(path)),
            junit: self.junit_path().map(|path| JunitSettings {
                path: log_dir.join(path),
                report_name: self.junit_report_name().to_owned(),
            }),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigImpl {
    #[serde(rename = "profile")]
    profiles: ProfilesImpl,
}

impl ConfigImpl {
    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        if self.profiles.default.log_dir.as_str().is_empty() {
            return Err(invalid_log_dir(PhaselogConfig::DEFAULT_PROFILE));
        }
        for (name, profile) in &self.profiles.other {
            if profile
                .log_dir
                .as_ref()
                .is_some_and(|dir| dir.as_str().is_empty())
            {
                return Err(invalid_log_dir(name));
            }
        }
        Ok(())
    }
}

fn invalid_log_dir(profile: &str) -> ConfigParseErrorKind {
    ConfigParseErrorKind::InvalidProfile {
        profile: profile.to_owned(),
        message: "log-dir must not be empty".to_owned(),
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ProfilesImpl {
    default: DefaultProfileImpl,
    #[serde(flatten)]
    other: HashMap<String, CustomProfileImpl>,
}

impl ProfilesImpl {
    fn get(&self, profile: &str) -> Result<Option<&CustomProfileImpl>, ProfileNotFound> {
        let custom_profile = match profile {
            PhaselogConfig::DEFAULT_PROFILE => None,
            other => Some(
                self.other
                    .get(other)
                    .ok_or_else(|| ProfileNotFound::new(profile, self.all_profiles()))?,
            ),
        };
        Ok(custom_profile)
    }

    fn all_profiles(&self) -> impl Iterator<Item = &str> + '_ {
        self.other
            .keys()
            .map(|key| key.as_str())
            .chain(std::iter::once(PhaselogConfig::DEFAULT_PROFILE))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultProfileImpl {
    log_dir: Utf8PathBuf,
    level: Severity,
    cmd_level: Severity,
    setup_cmd_level: Severity,
    file_level: Severity,
    global_level: Severity,
    global_log: bool,
    rw_substeps: bool,
    export: DefaultExportImpl,
    junit: DefaultJunitImpl,
}

#[derive(Clone, Debug, Deserialize)]
struct DefaultExportImpl {
    path: Utf8PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultJunitImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    report_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomProfileImpl {
    #[serde(default)]
    log_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    level: Option<Severity>,
    #[serde(default)]
    cmd_level: Option<Severity>,
    #[serde(default)]
    setup_cmd_level: Option<Severity>,
    #[serde(default)]
    file_level: Option<Severity>,
    #[serde(default)]
    global_level: Option<Severity>,
    #[serde(default)]
    global_log: Option<bool>,
    #[serde(default)]
    rw_substeps: Option<bool>,
    #[serde(default)]
    export: CustomExportImpl,
    #[serde(default)]
    junit: CustomJunitImpl,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct CustomExportImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CustomJunitImpl {
    #[serde(default)]
    path: Option<Utf8PathBuf>,
    #[serde(default)]
    report_name: Option<String>,
}
