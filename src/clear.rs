// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Destructive maintenance operations.
//!
//! Two ways to tear managed state back down:
//!
//! - [`clear_install`] resets before a reinstall: the managed destination
//!   tree goes away, and the shared binary directory is scanned for files
//!   carrying the wrapper marker comment, and only those are removed. Every
//!   removal sits behind a confirmation prompt unless the run is
//!   non-interactive.
//! - [`uninstall`] consumes the install ledger written by the last run and
//!   removes exactly the wrappers recorded there, then the destination
//!   tree.
//!
//! Both paths share one hard safety invariant: a removal request that
//! resolves to a protected root (filesystem root, `/home`, `/root`, the
//! invoking user's home directory) is refused unconditionally, prompt or
//! no prompt.

use crate::{
    deploy::{ledger_path, syscall_interactive, wrapper::WRAPPER_MARKER},
    path::home_dir,
};

use inquire::Confirm;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

/// Reset managed state before a reinstall.
///
/// Removes the destination tree and marker-carrying wrappers, each behind
/// confirmation unless `assume_yes`. Individual refusals and failures are
/// logged and skipped; the reset keeps going.
///
/// # Errors
///
/// - Return [`ClearError::ProtectedPath`] if the destination resolves to a
///   protected root. Nothing has been removed when this fires.
pub fn clear_install(
    dest: &Path,
    wrapper_dir: &Path,
    assume_yes: bool,
    dry_run: bool,
) -> Result<()> {
    info!("starting clean reinstall (--clear)");

    guard_protected(dest)?;
    if dest.exists() {
        if confirm(
            &format!("Remove managed destination tree {}?", dest.display()),
            assume_yes,
        ) {
            remove_tree(dest, dry_run);
        } else {
            warn!("destination tree removal declined");
        }
    } else {
        info!("destination tree does not exist yet, nothing to remove");
    }

    if !wrapper_dir.is_dir() {
        info!("wrapper directory does not exist yet, no wrappers to remove");
        return Ok(());
    }

    info!(
        "scanning {} for managed wrappers (only marked files are removed)",
        wrapper_dir.display()
    );
    let entries = match fs::read_dir(wrapper_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot scan {}: {err}", wrapper_dir.display());
            return Ok(());
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !has_wrapper_marker(&path) {
            continue;
        }

        if confirm(&format!("Remove wrapper {}?", path.display()), assume_yes) {
            remove_file(&path, dry_run);
        } else {
            warn!("skipped: {}", path.display());
        }
    }

    Ok(())
}

/// Remove everything the last run installed.
///
/// Reads the install ledger, removes each recorded wrapper from the shared
/// binary directory (with elevation fallback), then removes the
/// destination tree itself.
///
/// # Errors
///
/// - Return [`ClearError::ProtectedPath`] if the destination resolves to a
///   protected root.
pub fn uninstall(dest: &Path, wrapper_dir: &Path, assume_yes: bool) -> Result<()> {
    guard_protected(dest)?;

    info!("destination: {}", dest.display());
    info!("wrapper directory: {}", wrapper_dir.display());

    if !confirm(
        &format!(
            "Remove recorded wrappers and the destination tree {}?",
            dest.display()
        ),
        assume_yes,
    ) {
        warn!("uninstall declined");
        return Ok(());
    }

    let names = read_ledger(&ledger_path(dest));
    if names.is_empty() {
        info!("no wrappers recorded in the install ledger");
    }
    for name in names {
        remove_file(&wrapper_dir.join(name), false);
    }

    remove_tree(dest, false);
    Ok(())
}

/// Parse wrapper names out of an install ledger.
///
/// Each ledger line reads `name -> script`; everything left of the first
/// `->` is the name. Unreadable or absent ledgers yield an empty list with
/// a warning, not an error.
pub fn read_ledger(ledger: &Path) -> Vec<String> {
    let content = match fs::read_to_string(ledger) {
        Ok(content) => content,
        Err(err) => {
            warn!("install ledger not readable ({}): {err}", ledger.display());
            return Vec::new();
        }
    };

    content
        .lines()
        .filter_map(|line| line.split_once("->"))
        .map(|(name, _)| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Refuse removal of protected roots.
///
/// # Errors
///
/// - Return [`ClearError::ProtectedPath`] if the path resolves to `/`,
///   `/home`, `/root`, or the invoking user's home directory. This is
///   unconditional; no flag overrides it.
pub fn guard_protected(path: &Path) -> Result<()> {
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    let mut protected = vec![
        PathBuf::from("/"),
        PathBuf::from("/home"),
        PathBuf::from("/root"),
    ];
    if let Ok(home) = home_dir() {
        protected.push(home);
    }

    if resolved.as_os_str().is_empty() || protected.contains(&resolved) {
        return Err(ClearError::ProtectedPath { path: resolved });
    }

    Ok(())
}

fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }

    // Non-interactive stdin reads as a decline, same as an empty answer.
    Confirm::new(prompt).with_default(false).prompt().unwrap_or(false)
}

fn has_wrapper_marker(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|content| content.contains(WRAPPER_MARKER))
        .unwrap_or(false)
}

fn remove_tree(path: &Path, dry_run: bool) {
    if let Err(err) = guard_protected(path) {
        error!("{err}");
        return;
    }

    if !path.exists() {
        info!("path does not exist: {}", path.display());
        return;
    }

    if dry_run {
        info!("[dry-run] rm -rf -- {}", path.display());
        return;
    }

    match fs::remove_dir_all(path) {
        Ok(()) => info!("removed: {}", path.display()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            info!("no permission to remove {}, retrying with sudo", path.display());
            match syscall_interactive(
                "sudo",
                ["rm".as_ref(), "-rf".as_ref(), "--".as_ref(), path.as_os_str()],
            ) {
                Ok(()) => info!("removed (sudo): {}", path.display()),
                Err(err) => error!("sudo rm -rf failed ({}): {err}", path.display()),
            }
        }
        Err(err) => warn!("cannot remove {}: {err}", path.display()),
    }
}

fn remove_file(path: &Path, dry_run: bool) {
    if !path.exists() {
        info!("wrapper not present: {}", path.display());
        return;
    }

    if dry_run {
        info!("[dry-run] rm -f -- {}", path.display());
        return;
    }

    match fs::remove_file(path) {
        Ok(()) => info!("wrapper removed: {}", path.display()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            info!("no permission to remove {}, retrying with sudo", path.display());
            match syscall_interactive(
                "sudo",
                ["rm".as_ref(), "-f".as_ref(), "--".as_ref(), path.as_os_str()],
            ) {
                Ok(()) => info!("wrapper removed (sudo): {}", path.display()),
                Err(err) => error!("sudo rm failed ({}): {err}", path.display()),
            }
        }
        Err(err) => warn!("cannot remove wrapper {}: {err}", path.display()),
    }
}

/// Destructive operation error types.
#[derive(Debug, thiserror::Error)]
pub enum ClearError {
    /// Removal would touch a protected root.
    #[error("refusing to remove protected path {:?}", path.display())]
    ProtectedPath { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = ClearError> = std::result::Result<T, E>;
