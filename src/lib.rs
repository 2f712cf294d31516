// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Mirrored deployment of Python script trees.
//!
//! pymirror copies a curated subset of a source tree into a managed
//! destination tree on every run, provisions one isolated virtual
//! environment per directory carrying a dependency manifest, and installs
//! a wrapper shim per mirrored script into a shared binary directory. At
//! invocation time each shim walks upward from its target script to find
//! the nearest enclosing environment, falling back to the system
//! interpreter.
//!
//! The whole pipeline is idempotent and additive-only: re-running against
//! an unchanged source converges to the same destination tree and
//! byte-identical wrappers, and nothing previously mirrored is ever
//! deleted by an install run (that is what [`clear`] and
//! [`clear::uninstall`] are for).

pub mod clear;
pub mod config;
pub mod deploy;
pub mod path;

pub use config::{ElevationPolicy, InstallProfile};
pub use deploy::{
    provision::{EnvManager, PipVenv},
    resolve::resolve_on_disk,
    Installer, RunReport,
};
