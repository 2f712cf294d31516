// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Mirrored deployment orchestration.
//!
//! One run is three sequential passes over exclusion-filtered trees:
//!
//! 1. [`mirror`] copies classified scripts from the source tree into the
//!    destination tree, preserving relative structure.
//! 2. [`provision`] ensures every manifest-bearing directory has an
//!    isolated environment at its mirrored location, synced to the
//!    manifest.
//! 3. [`wrapper`] synthesizes a launcher for every mirrored script and
//!    installs it into the shared binary directory.
//!
//! The whole pipeline is idempotent: running it twice against an unchanged
//! source produces an identical destination tree and byte-identical
//! wrappers. Non-fatal failures (one file, one manifest, one wrapper) are
//! logged and isolated; only missing preconditions abort a run.
//!
//! The passes share no ambient state. Name assignments accumulate in a
//! [`wrapper::NameLedger`] and counters in a [`RunReport`], both owned by
//! the run, so the algorithm can be exercised repeatedly in-process.

pub mod classify;
pub mod mirror;
pub mod provision;
pub mod resolve;
pub mod wrapper;

use crate::{
    config::InstallProfile,
    deploy::{
        classify::ExcludeRules,
        mirror::collect_scripts,
        provision::{EnvManager, Provisioner},
        wrapper::{derive_name, wrapper_content, NameLedger, WrapperForge, WrapperSpec},
    },
};

use std::{
    ffi::OsStr,
    fs,
    io::Error as IoError,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{info, instrument, warn};

/// Directory under the destination root holding run bookkeeping.
pub const LOG_DIR: &str = ".log";

/// Install ledger file name, one `name -> script` line per wrapper.
pub const LEDGER_FILE: &str = "wrappers.txt";

/// Counters of one full run.
///
/// Reported at the end of every run, dry or not, regardless of how many
/// non-fatal failures were encountered along the way.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Script files mirrored into the destination tree.
    pub copied: usize,

    /// Isolated environments newly created.
    pub envs_created: usize,

    /// Manifests synced (environment created or already present).
    pub envs_synced: usize,

    /// Wrapper shims installed into the shared binary directory.
    pub wrappers_installed: usize,

    /// Wrapper shims skipped (name clash or failed installation).
    pub wrappers_skipped: usize,
}

/// One full mirrored-deployment run.
///
/// Owns nothing but borrowed collaborators: the profile describing the
/// run and an [`EnvManager`] doing the external environment work. All
/// filesystem roots are passed to [`Installer::run`] explicitly.
pub struct Installer<'a, M>
where
    M: EnvManager,
{
    profile: &'a InstallProfile,
    manager: &'a M,
}

impl<'a, M> Installer<'a, M>
where
    M: EnvManager,
{
    /// Construct an installer over a profile and environment manager.
    pub fn new(profile: &'a InstallProfile, manager: &'a M) -> Self {
        Self { profile, manager }
    }

    /// Execute the full pipeline: mirror, provision, synthesize.
    ///
    /// With `dry_run` set, every mutating step reports its plan instead of
    /// acting, and the install ledger is left untouched.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::Classify`] if the exclusion rules fail to
    ///   compile.
    /// - Return [`DeployError::Mirror`] on mirroring setup failure.
    ///   Per-unit failures inside the passes never escape; they are logged
    ///   and tallied in the report.
    #[instrument(skip(self, source, dest, wrapper_dir), level = "debug")]
    pub fn run(
        &self,
        source: &Path,
        dest: &Path,
        wrapper_dir: &Path,
        dry_run: bool,
    ) -> Result<RunReport> {
        let mut report = RunReport::default();
        let rules = ExcludeRules::new(&self.profile.filter)?;

        info!("source root: {}", source.display());
        info!("destination: {}", dest.display());
        info!("wrapper dir: {}", wrapper_dir.display());
        if dry_run {
            info!("mode: dry-run (no changes)");
        }

        report.copied = mirror::mirror(source, dest, &rules, dry_run)?;

        let provisioner = Provisioner::new(
            &rules,
            self.manager,
            self.profile.manifest.file_name.as_str(),
            self.profile.manifest.env_dir.as_str(),
        );
        let provisioned = provisioner.provision_all(source, dest, dry_run);
        report.envs_created = provisioned.created;
        report.envs_synced = provisioned.synced;

        let ledger = self.synthesize(dest, wrapper_dir, &rules, &mut report, dry_run);

        if !dry_run {
            if let Err(err) = write_ledger(dest, &ledger) {
                warn!("failed to write install ledger: {err}");
            }
        }

        Ok(report)
    }

    /// Synthesize and install wrappers for every mirrored script.
    fn synthesize(
        &self,
        dest: &Path,
        wrapper_dir: &Path,
        rules: &ExcludeRules,
        report: &mut RunReport,
        dry_run: bool,
    ) -> NameLedger {
        // Wrapper targets must be absolute so shims work from any cwd.
        let dest_abs = dest
            .canonicalize()
            .unwrap_or_else(|_| dest.to_path_buf());

        let mut scripts = collect_scripts(&dest_abs, rules);
        scripts.sort();

        let forge = WrapperForge::new(wrapper_dir, self.profile.wrapper.elevation);
        let mut ledger = NameLedger::new();

        info!("synthesizing wrappers for {} mirrored script(s)", scripts.len());
        for script in scripts {
            let name = match derive_name(
                &script,
                &dest_abs,
                &self.profile.wrapper.prefix,
                &ledger,
            ) {
                Ok(name) => name,
                Err(err) => {
                    warn!("{err}");
                    report.wrappers_skipped += 1;
                    continue;
                }
            };

            let content = wrapper_content(
                &script,
                &self.profile.manifest,
                &self.profile.wrapper,
                &self.profile.filter.root_marker,
            );

            match forge.install(&name, &content, dry_run) {
                Ok(()) => {
                    ledger.record(WrapperSpec { name, script });
                    report.wrappers_installed += 1;
                }
                Err(err) => {
                    warn!("{err}");
                    report.wrappers_skipped += 1;
                }
            }
        }

        ledger
    }
}

/// Persist the install ledger under the destination root.
///
/// The ledger records every wrapper the most recent run installed, one
/// `name -> script` line each; `uninstall` consumes it later.
fn write_ledger(dest: &Path, ledger: &NameLedger) -> std::io::Result<()> {
    let log_dir = dest.join(LOG_DIR);
    mkdirp::mkdirp(&log_dir)?;

    let mut out = String::new();
    for spec in ledger.entries() {
        out.push_str(&format!("{} -> {}\n", spec.name, spec.script.display()));
    }

    fs::write(log_dir.join(LEDGER_FILE), out)
}

/// Absolute path of the install ledger for a destination root.
pub fn ledger_path(dest: &Path) -> PathBuf {
    dest.join(LOG_DIR).join(LEDGER_FILE)
}

pub(crate) fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> std::io::Result<()> {
    let status = Command::new(cmd.as_ref()).args(args).spawn()?.wait()?;
    if !status.success() {
        return Err(IoError::other(format!(
            "command {:?} failed",
            cmd.as_ref()
        )));
    }

    Ok(())
}

pub(crate) fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> std::io::Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(IoError::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        )));
    }

    Ok(message)
}

/// Mirrored deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Exclusion rule compilation fails.
    #[error(transparent)]
    Classify(#[from] classify::ClassifyError),

    /// Tree mirroring setup fails.
    #[error(transparent)]
    Mirror(#[from] mirror::MirrorError),

    /// Environment provisioning fails outside its isolation boundary.
    #[error(transparent)]
    Provision(#[from] provision::ProvisionError),
}

/// Friendly result alias :3
pub type Result<T, E = DeployError> = std::result::Result<T, E>;
