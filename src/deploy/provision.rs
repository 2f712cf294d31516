// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Environment provisioning.
//!
//! For each directory of the source tree carrying a dependency manifest,
//! make sure an isolated environment exists at the mirrored location and is
//! synced to the manifest. Environment creation is idempotent: an existing
//! environment is never recreated, only re-synced. Re-running against an
//! unchanged manifest issues the same install request every time and lets
//! the package manager converge, with no diffing on our side.
//!
//! All external tooling sits behind [`EnvManager`], a narrow seam with one
//! concrete adapter per package ecosystem. [`PipVenv`] shells out to
//! `python -m venv` and pip; tests substitute an in-memory fake.
//!
//! Failure isolation: a manifest whose environment cannot be created is
//! reported and skipped; pip upgrade and package install failures are
//! reported and leave the environment as-is. Nothing here aborts the run.

use crate::deploy::{
    classify::{filtered_walk, ExcludeRules},
    syscall_non_interactive,
};

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument, warn};

/// Narrow interface over external environment tooling.
///
/// The provisioner depends only on this trait; substituting the concrete
/// adapter lets the whole mirrored-deployment algorithm run in-process
/// without touching Python at all.
pub trait EnvManager {
    /// Create an isolated environment rooted at `env_dir`.
    fn create_env(&self, env_dir: &Path) -> Result<()>;

    /// Upgrade the environment's package manager to latest.
    fn upgrade_manager(&self, env_dir: &Path) -> Result<()>;

    /// Install the package specifiers into the environment in one batch.
    fn install_packages(&self, env_dir: &Path, specs: &[String]) -> Result<()>;
}

/// Environment management through `python -m venv` and pip.
#[derive(Clone, Debug)]
pub struct PipVenv {
    python: PathBuf,
}

impl PipVenv {
    /// Locate a usable base interpreter on PATH.
    ///
    /// Probes `python3` then `python`. This doubles as the precondition
    /// check of a run: no interpreter, no install.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::NoInterpreter`] if neither probe answers.
    pub fn detect() -> Result<Self> {
        for name in ["python3", "python"] {
            let probe = Command::new(name).arg("--version").output();
            if probe.map(|out| out.status.success()).unwrap_or(false) {
                return Ok(Self {
                    python: PathBuf::from(name),
                });
            }
        }

        Err(ProvisionError::NoInterpreter)
    }

    fn env_python(env_dir: &Path) -> PathBuf {
        env_dir.join("bin").join("python")
    }
}

impl EnvManager for PipVenv {
    fn create_env(&self, env_dir: &Path) -> Result<()> {
        syscall_non_interactive(
            &self.python,
            ["-m".as_ref(), "venv".as_ref(), env_dir.as_os_str()],
        )
        .map_err(|err| ProvisionError::CreateEnv {
            source: err,
            env_dir: env_dir.to_path_buf(),
        })?;

        Ok(())
    }

    fn upgrade_manager(&self, env_dir: &Path) -> Result<()> {
        syscall_non_interactive(
            Self::env_python(env_dir),
            ["-m", "pip", "install", "--upgrade", "pip"],
        )
        .map_err(|err| ProvisionError::UpgradeManager {
            source: err,
            env_dir: env_dir.to_path_buf(),
        })?;

        Ok(())
    }

    fn install_packages(&self, env_dir: &Path, specs: &[String]) -> Result<()> {
        let mut args: Vec<&str> = vec!["-m", "pip", "install"];
        args.extend(specs.iter().map(String::as_str));

        syscall_non_interactive(Self::env_python(env_dir), args).map_err(|err| {
            ProvisionError::InstallPackages {
                source: err,
                env_dir: env_dir.to_path_buf(),
            }
        })?;

        Ok(())
    }
}

/// Parse a dependency manifest into package specifiers.
///
/// Strips blank lines and lines whose first non-whitespace character is
/// `#`. Every surviving line is one specifier, order preserved. An empty
/// result is valid and means "bare environment".
pub fn parse_manifest(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Collect all dependency manifests under a root, exclusions applied.
pub fn collect_manifests(root: &Path, rules: &ExcludeRules, file_name: &str) -> Vec<PathBuf> {
    if rules.prune_dir(root) {
        return Vec::new();
    }

    filtered_walk(root, rules)
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ty| ty.is_file()))
        .filter(|entry| entry.file_name().to_string_lossy() == file_name)
        .map(|entry| entry.into_path())
        .collect()
}

/// Per-run provisioning outcome.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Environments created by this run.
    pub created: usize,

    /// Manifests whose environments were synced (created or pre-existing).
    pub synced: usize,

    /// Manifests skipped because their environment could not be created.
    pub skipped: usize,
}

/// Provision environments for every manifest in a source tree.
pub struct Provisioner<'a, M>
where
    M: EnvManager,
{
    rules: &'a ExcludeRules,
    manager: &'a M,
    manifest_name: String,
    env_dir_name: String,
}

impl<'a, M> Provisioner<'a, M>
where
    M: EnvManager,
{
    /// Construct a provisioner over the given exclusion rules and manager.
    pub fn new(
        rules: &'a ExcludeRules,
        manager: &'a M,
        manifest_name: impl Into<String>,
        env_dir_name: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            manager,
            manifest_name: manifest_name.into(),
            env_dir_name: env_dir_name.into(),
        }
    }

    /// Provision every manifest directory of `source` at its mirrored
    /// location under `dest`.
    ///
    /// Individual manifest failures are logged and isolated; the report
    /// carries the counts either way.
    #[instrument(skip(self, source, dest), level = "debug")]
    pub fn provision_all(&self, source: &Path, dest: &Path, dry_run: bool) -> ProvisionReport {
        let mut report = ProvisionReport::default();
        let manifests = collect_manifests(source, self.rules, &self.manifest_name);

        if manifests.is_empty() {
            info!("no {} found, skipping environment creation", self.manifest_name);
            return report;
        }

        info!("found {} {} file(s)", manifests.len(), self.manifest_name);
        for manifest in manifests {
            let src_dir = match manifest.parent() {
                Some(dir) => dir,
                None => continue,
            };
            let rel_dir = match src_dir.strip_prefix(source) {
                Ok(rel) => rel,
                Err(_) => {
                    warn!("skipping manifest outside source root: {}", manifest.display());
                    continue;
                }
            };

            match self.provision_one(&manifest, &dest.join(rel_dir), dry_run) {
                Ok(created) => {
                    report.synced += 1;
                    if created {
                        report.created += 1;
                    }
                }
                Err(err) => {
                    warn!("skipping {}: {err}", manifest.display());
                    report.skipped += 1;
                }
            }
        }

        if report.created > 0 {
            info!("environments created: {}", report.created);
        }

        report
    }

    /// Provision one manifest directory. Returns whether the environment
    /// was newly created.
    ///
    /// # Errors
    ///
    /// - Return [`ProvisionError::ReadManifest`] if the manifest cannot be
    ///   read.
    /// - Propagate [`EnvManager::create_env`] failure; later sync failures
    ///   are demoted to warnings because the environment itself is usable.
    fn provision_one(&self, manifest: &Path, target_dir: &Path, dry_run: bool) -> Result<bool> {
        let env_dir = target_dir.join(&self.env_dir_name);
        let existed = env_dir.is_dir();

        if dry_run {
            if existed {
                info!("[dry-run] environment already present: {}", env_dir.display());
            } else {
                info!("[dry-run] would create environment: {}", env_dir.display());
            }
            let specs = read_to_string(manifest)
                .map(|content| parse_manifest(&content))
                .unwrap_or_default();
            if specs.is_empty() {
                info!("[dry-run] empty manifest, bare environment: {}", manifest.display());
            } else {
                info!(
                    "[dry-run] would install {} package(s) from {}",
                    specs.len(),
                    manifest.display()
                );
            }
            return Ok(!existed);
        }

        mkdirp::mkdirp(target_dir).map_err(|err| ProvisionError::CreateTargetDir {
            source: err,
            target_dir: target_dir.to_path_buf(),
        })?;

        if existed {
            debug!("environment already present: {}", env_dir.display());
        } else {
            info!("creating environment: {}", env_dir.display());
            self.manager.create_env(&env_dir)?;
        }

        if let Err(err) = self.manager.upgrade_manager(&env_dir) {
            warn!("package manager upgrade failed for {}: {err}", env_dir.display());
        }

        let content = read_to_string(manifest).map_err(|err| ProvisionError::ReadManifest {
            source: err,
            manifest: manifest.to_path_buf(),
        })?;

        let specs = parse_manifest(&content);
        if specs.is_empty() {
            info!(
                "empty manifest, bare environment provisioned: {}",
                manifest.display()
            );
            return Ok(!existed);
        }

        info!("installing {} package(s) from {}", specs.len(), manifest.display());
        if let Err(err) = self.manager.install_packages(&env_dir, &specs) {
            warn!("package install failed for {}: {err}", env_dir.display());
        }

        Ok(!existed)
    }
}

/// Environment provisioning error types.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// No Python interpreter available on PATH.
    #[error("no python3 or python interpreter found on PATH")]
    NoInterpreter,

    /// Mirrored target directory cannot be created.
    #[error("failed to create target directory {:?}", target_dir.display())]
    CreateTargetDir {
        #[source]
        source: std::io::Error,
        target_dir: PathBuf,
    },

    /// Isolated environment cannot be created.
    #[error("failed to create environment at {:?}", env_dir.display())]
    CreateEnv {
        #[source]
        source: std::io::Error,
        env_dir: PathBuf,
    },

    /// Package manager upgrade fails inside the environment.
    #[error("failed to upgrade package manager in {:?}", env_dir.display())]
    UpgradeManager {
        #[source]
        source: std::io::Error,
        env_dir: PathBuf,
    },

    /// Batch package install fails inside the environment.
    #[error("failed to install packages into {:?}", env_dir.display())]
    InstallPackages {
        #[source]
        source: std::io::Error,
        env_dir: PathBuf,
    },

    /// Dependency manifest cannot be read.
    #[error("failed to read manifest at {:?}", manifest.display())]
    ReadManifest {
        #[source]
        source: std::io::Error,
        manifest: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn manifest_filtering_keeps_order_and_drops_noise() {
        let content = indoc! {r#"
            requests
            # a comment

            rich==13.7.1
               # indented comment
            numpy >= 1.26
        "#};

        let result = parse_manifest(content);

        assert_eq!(
            result,
            vec![
                "requests".to_string(),
                "rich==13.7.1".to_string(),
                "numpy >= 1.26".to_string(),
            ]
        );
    }

    #[test]
    fn empty_manifest_yields_empty_spec_list() {
        assert_eq!(parse_manifest(""), Vec::<String>::new());
        assert_eq!(parse_manifest("# only\n\n# comments\n"), Vec::<String>::new());
    }
}
