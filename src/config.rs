// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Install profile layout.
//!
//! Specify the layout of the profile file that pymirror uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! A profile is composed of four sections. The `[paths]` section pins the
//! source root, the managed destination tree, and the shared wrapper
//! directory. The `[filter]` section carries the exclusion rule set applied
//! during traversal. The `[manifest]` section names the dependency manifest
//! file and the isolated environment subdirectory it provisions. The
//! `[wrapper]` section controls shim generation: name prefix, fallback
//! interpreter, upward-walk hop budget, and the elevation policy used when
//! the wrapper directory is not writable.
//!
//! Every section and every field is optional in the file; missing pieces
//! fall back to the defaults the original installer shipped with.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Install profile layout.
///
/// Everything a full run needs to know: where to read, where to mirror,
/// what to exclude, what provisions an environment, and how wrappers are
/// named and installed.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct InstallProfile {
    /// Source, destination, and wrapper directory locations.
    #[serde(default)]
    pub paths: PathSettings,

    /// Exclusion rule set applied during traversal.
    #[serde(default)]
    pub filter: FilterSettings,

    /// Dependency manifest recognition and environment placement.
    #[serde(default)]
    pub manifest: ManifestSettings,

    /// Wrapper shim generation settings.
    #[serde(default)]
    pub wrapper: WrapperSettings,
}

impl FromStr for InstallProfile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut profile: InstallProfile =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on all path fields.
        profile.paths.source = expand_opt(profile.paths.source)?;
        profile.paths.dest = expand_opt(profile.paths.dest)?;
        profile.paths.wrapper_dir = expand_opt(profile.paths.wrapper_dir)?;

        Ok(profile)
    }
}

impl Display for InstallProfile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_opt(path: Option<PathBuf>) -> Result<Option<PathBuf>, ConfigError> {
    let Some(path) = path else {
        return Ok(None);
    };

    let expanded = shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned();

    Ok(Some(PathBuf::from(expanded)))
}

/// Filesystem locations of a run.
///
/// Fields left unset fall back to the computed defaults in [`crate::path`]:
/// current working directory for the source root, `~/Documents/Python` for
/// the destination, and `/usr/local/bin` for the wrapper directory.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PathSettings {
    /// Source tree root containing scripts and manifests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Managed destination tree root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,

    /// Shared binary directory receiving wrapper shims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapper_dir: Option<PathBuf>,
}

/// Exclusion rule set applied during traversal.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Glob pattern a file name must match to count as a script.
    pub script_glob: String,

    /// Directory names pruned outright, descendants included.
    pub prune: Vec<String>,

    /// Substring that excludes any directory or file name containing it.
    pub marker: String,

    /// Zero-byte sentinel file opting its directory out entirely.
    pub opt_out_file: String,

    /// Sentinel file bounding the wrapper runtime's upward walk.
    pub root_marker: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            script_glob: "*.py".into(),
            prune: [".git", "__pycache__", "venv", ".venv", ".archive"]
                .map(String::from)
                .to_vec(),
            marker: ".name".into(),
            opt_out_file: ".name".into(),
            root_marker: ".mirror-root".into(),
        }
    }
}

/// Dependency manifest recognition and environment placement.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManifestSettings {
    /// File name whose presence triggers environment provisioning.
    pub file_name: String,

    /// Relative name of the isolated environment subdirectory.
    pub env_dir: String,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            file_name: "venv.txt".into(),
            env_dir: ".venv".into(),
        }
    }
}

/// Wrapper shim generation settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WrapperSettings {
    /// Fixed prefix prepended to every derived wrapper name.
    pub prefix: String,

    /// System-wide interpreter used when no isolated environment is found.
    pub fallback: String,

    /// Upper bound on the upward walk performed at wrapper invocation time.
    pub max_hops: usize,

    /// Privilege behavior when the wrapper directory is not writable.
    pub elevation: ElevationPolicy,
}

impl Default for WrapperSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            fallback: "python3".into(),
            max_hops: 64,
            elevation: ElevationPolicy::default(),
        }
    }
}

/// Privilege behavior for wrapper installation.
///
/// The source material disagrees with itself about which behavior is
/// canonical, so both are exposed as configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElevationPolicy {
    /// Try an unprivileged write first, fall back to elevation.
    #[default]
    PreferUnprivileged,

    /// Always install through the elevation mechanism.
    RequireElevated,
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
