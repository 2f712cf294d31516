// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Wrapper shim synthesis.
//!
//! For every mirrored script, generate a small shell launcher and install
//! it into the shared binary directory. Wrapper content is a pure function
//! of the script path and the profile, so regenerating on every run is
//! idempotent by construction.
//!
//! # Name Derivation
//!
//! The default wrapper name is the script basename without its suffix,
//! behind the configured prefix. The first collision within a run falls
//! back to a path-derived name: the script's path relative to the managed
//! root, suffix stripped, with path separators, underscores, and spaces
//! each replaced by `-`. Two scripts colliding even on the fallback name is
//! reported and the later wrapper skipped, never a silent overwrite.
//! Name bookkeeping lives in [`NameLedger`], an explicit accumulator handed
//! through the run, so the algorithm can be replayed in-process without
//! leaking state between runs.
//!
//! # Installation
//!
//! Content lands in a temporary file first, then moves into place with the
//! executable bits set. When the shared binary directory refuses the
//! unprivileged write, the [`ElevationPolicy`] decides whether to route the
//! install through `sudo install -m 0755`. A wrapper that cannot be
//! installed either way is reported and skipped; the run continues.

use crate::{
    config::{ElevationPolicy, ManifestSettings, WrapperSettings},
    deploy::syscall_interactive,
};

use std::{
    collections::HashSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    process,
};
use tracing::info;

/// Marker comment identifying wrappers owned by this tool.
///
/// Embedded as the second line of every generated wrapper; `clear` removes
/// only files carrying it.
pub const WRAPPER_MARKER: &str = "# managed by pymirror";

/// One synthesized wrapper: chosen name plus baked-in target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperSpec {
    /// Wrapper file name inside the shared binary directory.
    pub name: String,

    /// Absolute path of the mirrored target script.
    pub script: PathBuf,
}

/// Accumulator for names assigned within one run.
///
/// # Invariant
///
/// - No two recorded entries share a name.
#[derive(Debug, Default)]
pub struct NameLedger {
    taken: HashSet<String>,
    entries: Vec<WrapperSpec>,
}

impl NameLedger {
    /// Construct an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a name has already been assigned this run.
    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Record an assigned wrapper.
    pub fn record(&mut self, spec: WrapperSpec) {
        self.taken.insert(spec.name.clone());
        self.entries.push(spec);
    }

    /// Wrappers recorded so far, in assignment order.
    pub fn entries(&self) -> &[WrapperSpec] {
        &self.entries
    }
}

/// Derive a unique wrapper name for a mirrored script.
///
/// # Errors
///
/// - Return [`WrapperError::NameClash`] if even the path-derived fallback
///   name is taken. The caller reports it and skips the wrapper.
pub fn derive_name(
    script: &Path,
    dest_root: &Path,
    prefix: &str,
    ledger: &NameLedger,
) -> Result<String> {
    let stem = script
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let plain = format!("{prefix}{stem}");
    if !ledger.is_taken(&plain) {
        return Ok(plain);
    }

    let rel = script.strip_prefix(dest_root).unwrap_or(script);
    let mangled: String = rel
        .with_extension("")
        .to_string_lossy()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '_' | ' ' => '-',
            other => other,
        })
        .collect();

    let fallback = format!("{prefix}{mangled}");
    if ledger.is_taken(&fallback) {
        return Err(WrapperError::NameClash {
            script: script.to_path_buf(),
            name: fallback,
        });
    }

    Ok(fallback)
}

/// Render wrapper content for a mirrored script.
///
/// Pure function of the script path and profile settings: the same inputs
/// always produce byte-identical output. The embedded shell performs the
/// same upward walk as [`resolve`](crate::deploy::resolve): environment
/// probe first, then the stop conditions (filesystem root, repo-root
/// marker, hop budget), then ascend.
pub fn wrapper_content(
    script: &Path,
    manifest: &ManifestSettings,
    wrapper: &WrapperSettings,
    root_marker: &str,
) -> String {
    let lines = [
        "#!/usr/bin/env bash".to_string(),
        "set -euo pipefail".to_string(),
        WRAPPER_MARKER.to_string(),
        format!("SCRIPT_PATH={}", shell_quote(script.to_string_lossy().as_ref())),
        format!("py={}", shell_quote(&wrapper.fallback)),
        "dir=\"$(dirname \"$SCRIPT_PATH\")\"".to_string(),
        "hops=0".to_string(),
        "while :; do".to_string(),
        format!("  if [ -x \"$dir/{}/bin/python\" ]; then", manifest.env_dir),
        format!("    py=\"$dir/{}/bin/python\"", manifest.env_dir),
        "    break".to_string(),
        "  fi".to_string(),
        format!(
            "  if [ \"$dir\" = / ] || [ -e \"$dir/{}\" ] || [ \"$hops\" -ge {} ]; then",
            root_marker, wrapper.max_hops
        ),
        "    break".to_string(),
        "  fi".to_string(),
        "  dir=\"$(dirname \"$dir\")\"".to_string(),
        "  hops=$((hops + 1))".to_string(),
        "done".to_string(),
        "exec \"$py\" \"$SCRIPT_PATH\" \"$@\"".to_string(),
        String::new(),
    ];

    lines.join("\n")
}

/// Quote a value for safe interpolation into shell source.
///
/// Plain words pass through untouched; anything else is single-quoted with
/// embedded single quotes escaped, so paths containing spaces or shell
/// metacharacters stay inert.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | '+'));
    if safe {
        return value.to_string();
    }

    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Install synthesized wrappers into the shared binary directory.
#[derive(Debug)]
pub struct WrapperForge<'a> {
    wrapper_dir: &'a Path,
    policy: ElevationPolicy,
}

impl<'a> WrapperForge<'a> {
    /// Construct a forge targeting the given binary directory.
    pub fn new(wrapper_dir: &'a Path, policy: ElevationPolicy) -> Self {
        Self {
            wrapper_dir,
            policy,
        }
    }

    /// Install one wrapper, overwriting any previous file of that name.
    ///
    /// # Errors
    ///
    /// - Return [`WrapperError::Install`] if the unprivileged path fails
    ///   for reasons other than permissions.
    /// - Return [`WrapperError::Elevated`] if the elevated path fails or is
    ///   unavailable.
    pub fn install(&self, name: &str, content: &str, dry_run: bool) -> Result<()> {
        let target = self.wrapper_dir.join(name);

        if dry_run {
            info!("[dry-run] would install wrapper {}", target.display());
            return Ok(());
        }

        match self.policy {
            ElevationPolicy::RequireElevated => self.install_elevated(&target, content),
            ElevationPolicy::PreferUnprivileged => {
                match self.install_unprivileged(&target, content) {
                    Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                        info!(
                            "no write access to {}, retrying with elevation",
                            self.wrapper_dir.display()
                        );
                        self.install_elevated(&target, content)
                    }
                    Err(err) => Err(WrapperError::Install {
                        wrapper: target.clone(),
                        source: err,
                    }),
                    Ok(()) => Ok(()),
                }
            }
        }?;

        info!("wrapper installed: {}", target.display());
        Ok(())
    }

    fn install_unprivileged(&self, target: &Path, content: &str) -> std::io::Result<()> {
        mkdirp::mkdirp(self.wrapper_dir)?;

        let staging = self.wrapper_dir.join(format!(
            ".{}.tmp-{}",
            target.file_name().unwrap_or_default().to_string_lossy(),
            process::id()
        ));

        let result = write_executable(&staging, content).and_then(|()| fs::rename(&staging, target));
        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }

        result
    }

    fn install_elevated(&self, target: &Path, content: &str) -> Result<()> {
        let staging = std::env::temp_dir().join(format!(
            "pymirror-{}-{}",
            target.file_name().unwrap_or_default().to_string_lossy(),
            process::id()
        ));

        write_executable(&staging, content).map_err(|err| WrapperError::Elevated {
            wrapper: target.to_path_buf(),
            source: err,
        })?;

        let result = syscall_interactive(
            "sudo",
            [
                "install".as_ref(),
                "-m".as_ref(),
                "0755".as_ref(),
                staging.as_os_str(),
                target.as_os_str(),
            ],
        );
        let _ = fs::remove_file(&staging);

        result.map_err(|err| WrapperError::Elevated {
            wrapper: target.to_path_buf(),
            source: err,
        })
    }
}

#[cfg(unix)]
fn write_executable(path: &Path, content: &str) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, content)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn write_executable(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, content)
}

/// Wrapper synthesis error types.
#[derive(Debug, thiserror::Error)]
pub enum WrapperError {
    /// Even the path-derived fallback name is taken.
    #[error("wrapper name {name:?} already assigned, cannot disambiguate {:?}", script.display())]
    NameClash { script: PathBuf, name: String },

    /// Unprivileged installation fails.
    #[error("failed to install wrapper {:?}", wrapper.display())]
    Install {
        #[source]
        source: std::io::Error,
        wrapper: PathBuf,
    },

    /// Elevated installation fails or elevation is unavailable.
    #[error("no write access and no working elevation for {:?}", wrapper.display())]
    Elevated {
        #[source]
        source: std::io::Error,
        wrapper: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = WrapperError> = std::result::Result<T, E>;
