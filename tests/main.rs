// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

mod integration;

use pymirror::deploy::provision::{EnvManager, ProvisionError, Result as ProvisionResult};

use simple_txtar::Archive;
use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
};

/// Materialize a txtar fixture relative to the current directory.
pub(crate) fn materialize(txtar: &str) -> anyhow::Result<()> {
    let archive = Archive::from(txtar);
    for file in archive.iter() {
        let path = Path::new(&file.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &file.content)?;
    }

    Ok(())
}

/// In-memory environment manager.
///
/// Materializes just enough of an environment on disk for the rest of the
/// pipeline (existence probe, interpreter resolution) to behave as if a
/// real venv were present, and records every call for assertions.
#[derive(Debug, Default)]
pub(crate) struct FakeEnvManager {
    pub(crate) calls: RefCell<Vec<String>>,

    /// Environment directories that must fail creation.
    pub(crate) poisoned: Vec<PathBuf>,
}

impl FakeEnvManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn created(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with("create "))
            .count()
    }
}

impl EnvManager for FakeEnvManager {
    fn create_env(&self, env_dir: &Path) -> ProvisionResult<()> {
        if self.poisoned.iter().any(|bad| env_dir.starts_with(bad)) {
            return Err(ProvisionError::CreateEnv {
                source: std::io::Error::other("poisoned by test"),
                env_dir: env_dir.to_path_buf(),
            });
        }

        self.calls
            .borrow_mut()
            .push(format!("create {}", env_dir.display()));

        let bin = env_dir.join("bin");
        fs::create_dir_all(&bin).unwrap();
        write_fake_python(&bin.join("python"));

        Ok(())
    }

    fn upgrade_manager(&self, env_dir: &Path) -> ProvisionResult<()> {
        self.calls
            .borrow_mut()
            .push(format!("upgrade {}", env_dir.display()));

        Ok(())
    }

    fn install_packages(&self, env_dir: &Path, specs: &[String]) -> ProvisionResult<()> {
        self.calls
            .borrow_mut()
            .push(format!("install {} {}", env_dir.display(), specs.join(" ")));
        fs::write(env_dir.join("installed.txt"), specs.join("\n")).unwrap();

        Ok(())
    }
}

#[cfg(unix)]
fn write_fake_python(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn write_fake_python(path: &Path) {
    fs::write(path, "").unwrap();
}

/// Collect every file under a root as sorted (relative path, bytes) pairs.
pub(crate) fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    fn visit(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().display().to_string();
                out.push((rel, fs::read(&path).unwrap()));
            }
        }
    }

    let mut out = Vec::new();
    visit(root, root, &mut out);
    out.sort();

    out
}
