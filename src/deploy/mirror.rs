// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Tree mirroring.
//!
//! Walk the source tree, collect every script that survives classification,
//! and copy it byte-for-byte to the same relative location under the
//! destination root. Every run is a full re-copy: no timestamp or hash
//! comparison, last writer wins. The operation is order-independent and
//! idempotent.
//!
//! Mirroring is additive-only. Directories are created but never removed,
//! and files deleted from the source stay behind in the destination. That
//! is specified behavior, not an oversight; see the README.
//!
//! A single file failing to copy is not fatal: the failure is logged, the
//! file skipped, and the run continues. There is no cross-file transaction
//! to protect.

use crate::deploy::classify::{filtered_walk, ExcludeRules};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Collect all mirrorable scripts under a root, exclusions applied.
pub fn collect_scripts(root: &Path, rules: &ExcludeRules) -> Vec<PathBuf> {
    if rules.prune_dir(root) {
        return Vec::new();
    }

    filtered_walk(root, rules)
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|ty| ty.is_file()))
        .filter(|entry| rules.is_script(entry.file_name().to_string_lossy().as_ref()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Mirror classified scripts from `source` into `dest`.
///
/// Returns the number of files copied. Files that cannot be copied are
/// warned about and skipped.
///
/// # Errors
///
/// - Return [`MirrorError::BarTemplate`] if the progress bar style fails to
///   parse. Nothing filesystem-related escapes this function.
#[instrument(skip(source, dest, rules), level = "debug")]
pub fn mirror(
    source: &Path,
    dest: &Path,
    rules: &ExcludeRules,
    dry_run: bool,
) -> Result<usize> {
    let scripts = collect_scripts(source, rules);
    if scripts.is_empty() {
        warn!("no scripts found under {} (after exclusions)", source.display());
        return Ok(0);
    }

    info!("found {} script(s) under {}", scripts.len(), source.display());
    let bar = if dry_run {
        ProgressBar::hidden()
    } else {
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        let bar = ProgressBar::new(scripts.len() as u64);
        bar.set_style(style);
        bar
    };

    let mut copied = 0;
    for script in scripts {
        let rel = match script.strip_prefix(source) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                warn!("skipping file outside source root: {}", script.display());
                continue;
            }
        };
        let target = dest.join(&rel);

        if dry_run {
            info!("[dry-run] would copy {} -> {}", script.display(), target.display());
            copied += 1;
            continue;
        }

        bar.set_message(rel.display().to_string());
        if let Err(err) = copy_one(&script, &target) {
            warn!("copy failed, skipping {}: {err}", script.display());
        } else {
            copied += 1;
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    info!("copied {} file(s) into {}", copied, dest.display());
    Ok(copied)
}

fn copy_one(source: &Path, target: &Path) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        mkdirp::mkdirp(parent)?;
    }
    fs::copy(source, target)?;

    Ok(())
}

/// Tree mirroring error types.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// Style template cannot be set for the progress bar.
    #[error(transparent)]
    BarTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = MirrorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterSettings;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn rules() -> ExcludeRules {
        ExcludeRules::new(&FilterSettings::default()).unwrap()
    }

    #[sealed_test]
    fn mirrors_scripts_preserving_relative_structure() -> anyhow::Result<()> {
        fs::create_dir_all("src/tools/convert")?;
        fs::write("src/tools/report.py", "print('report')")?;
        fs::write("src/tools/convert/convert.py", "print('convert')")?;
        fs::write("src/tools/notes.txt", "not a script")?;

        let copied = mirror(Path::new("src"), Path::new("dst"), &rules(), false)?;

        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string("dst/tools/report.py")?, "print('report')");
        assert_eq!(
            fs::read_to_string("dst/tools/convert/convert.py")?,
            "print('convert')"
        );
        assert!(!Path::new("dst/tools/notes.txt").exists());

        Ok(())
    }

    #[sealed_test]
    fn overwrites_destination_unconditionally() -> anyhow::Result<()> {
        fs::create_dir_all("src")?;
        fs::create_dir_all("dst")?;
        fs::write("src/run.py", "new body")?;
        fs::write("dst/run.py", "stale body")?;

        mirror(Path::new("src"), Path::new("dst"), &rules(), false)?;

        assert_eq!(fs::read_to_string("dst/run.py")?, "new body");

        Ok(())
    }

    #[sealed_test]
    fn excluded_subtrees_never_reach_the_destination() -> anyhow::Result<()> {
        fs::create_dir_all("src/__pycache__/deep")?;
        fs::write("src/__pycache__/deep/cached.py", "print()")?;
        fs::create_dir_all("src/ok")?;
        fs::write("src/ok/keep.py", "print()")?;

        let copied = mirror(Path::new("src"), Path::new("dst"), &rules(), false)?;

        assert_eq!(copied, 1);
        assert!(Path::new("dst/ok/keep.py").exists());
        assert!(!Path::new("dst/__pycache__").exists());

        Ok(())
    }

    #[sealed_test]
    fn dry_run_copies_nothing() -> anyhow::Result<()> {
        fs::create_dir_all("src")?;
        fs::write("src/run.py", "print()")?;

        let copied = mirror(Path::new("src"), Path::new("dst"), &rules(), true)?;

        assert_eq!(copied, 1);
        assert!(!Path::new("dst").exists());

        Ok(())
    }
}
