// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Path classification.
//!
//! Decide, for any filesystem entry, whether it takes part in a run at all.
//! Classification happens while walking, before descent, so an excluded
//! directory is pruned in one shot and nothing beneath it is ever visited.
//! That ordering is what keeps environments from being provisioned under
//! excluded roots, e.g., nested bytecode caches.
//!
//! # Exclusion Rules
//!
//! A directory is excluded when its name is on the prune list (version
//! control metadata, bytecode caches, existing isolated environments), when
//! its name contains the marker substring, or when it carries the opt-out
//! sentinel file. A file is excluded when its name contains the marker
//! substring or does not match the script suffix pattern.

use crate::config::FilterSettings;

use glob::Pattern;
use ignore::{DirEntry, Walk, WalkBuilder};
use std::{collections::HashSet, path::Path};

/// Exclusion rule set applied during traversal.
///
/// Compiled once per run from [`FilterSettings`], then shared by every
/// discovery pass: script collection, manifest collection, and wrapper
/// enumeration over the destination tree.
#[derive(Clone, Debug)]
pub struct ExcludeRules {
    prune_names: HashSet<String>,
    marker: String,
    opt_out_file: String,
    script_pattern: Pattern,
}

impl ExcludeRules {
    /// Compile exclusion rules from filter settings.
    ///
    /// # Errors
    ///
    /// - Return [`ClassifyError::BadPattern`] if the script suffix glob does
    ///   not parse.
    pub fn new(filter: &FilterSettings) -> Result<Self> {
        let script_pattern =
            Pattern::new(&filter.script_glob).map_err(|err| ClassifyError::BadPattern {
                source: err,
                pattern: filter.script_glob.clone(),
            })?;

        Ok(Self {
            prune_names: filter.prune.iter().cloned().collect(),
            marker: filter.marker.clone(),
            opt_out_file: filter.opt_out_file.clone(),
            script_pattern,
        })
    }

    /// Check whether a directory must be pruned from traversal.
    ///
    /// Pruning cuts the whole subtree: descendants are never visited, no
    /// matter what their own names look like.
    pub fn prune_dir(&self, dir: &Path) -> bool {
        let name = match dir.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return false,
        };

        if self.prune_names.contains(name.as_str()) || name.contains(&self.marker) {
            return true;
        }

        dir.join(&self.opt_out_file).exists()
    }

    /// Check whether a file name counts as a mirrorable script.
    pub fn is_script(&self, name: &str) -> bool {
        !name.contains(&self.marker) && self.script_pattern.matches(name)
    }

    /// Check whether a file name is excluded outright by the marker rule.
    pub fn skip_file(&self, name: &str) -> bool {
        name.contains(&self.marker)
    }
}

/// Walk a tree with exclusion rules applied before descent.
///
/// Standard gitignore-style filters are turned off; the only pruning in
/// play is the rule set itself. The walker yields files and directories
/// that survived classification.
pub fn filtered_walk(root: impl AsRef<Path>, rules: &ExcludeRules) -> Walk {
    let rules = rules.clone();
    WalkBuilder::new(root.as_ref())
        .standard_filters(false)
        .filter_entry(move |entry: &DirEntry| {
            let is_dir = entry.file_type().is_some_and(|ty| ty.is_dir());
            if is_dir {
                !rules.prune_dir(entry.path())
            } else {
                !rules.skip_file(entry.file_name().to_string_lossy().as_ref())
            }
        })
        .build()
}

/// Path classification error types.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// Script suffix glob fails to compile.
    #[error("invalid script pattern {pattern:?}")]
    BadPattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ClassifyError> = std::result::Result<T, E>;
