// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations for the destination tree, the shared wrapper
//! directory, and the install profile. None of these checks whether the
//! returned path actually exists.

use std::path::PathBuf;

/// Determine absolute path to user's home directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Default absolute path of the managed destination tree.
///
/// Mirrored scripts land under `$HOME/Documents/Python` unless the profile
/// or the command line says otherwise.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_dest_dir() -> Result<PathBuf> {
    home_dir().map(|path| path.join("Documents").join("Python"))
}

/// Default shared binary directory receiving wrapper shims.
pub fn default_wrapper_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin")
}

/// Default absolute path of the install profile.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/pymirror/profile.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if the configuration directory cannot be
///   determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_profile_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("pymirror").join("profile.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
