// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Wrapper runtime interpreter resolution.
//!
//! Every generated wrapper performs the same upward walk at invocation
//! time: starting from the target script's directory, look for an isolated
//! environment interpreter, and fall back to the system-wide interpreter
//! when the walk terminates. The walk terminates at the filesystem root, at
//! a directory carrying the repo-root marker, or after a fixed hop budget.
//!
//! The walk lives here twice over. The shell rendition is templated into
//! each wrapper by [`wrapper`](crate::deploy::wrapper). The Rust rendition
//! below is a pure function over predicates, independent of filesystem
//! access, so the transition logic can be tested exhaustively against
//! synthetic directory layouts. Both must resolve identically for an
//! unchanged filesystem.

use crate::config::{ManifestSettings, WrapperSettings};

use std::path::{Path, PathBuf};

/// Terminal outcome of the interpreter walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An isolated environment interpreter was found at this path.
    Isolated(PathBuf),

    /// No environment on the upward path; use the system interpreter.
    System,
}

/// Resolve the interpreter for a script directory.
///
/// `has_env` answers whether a directory holds an executable isolated
/// interpreter; `is_stop` answers whether the walk must not ascend past a
/// directory (repo-root marker). The filesystem root and the hop budget
/// terminate the walk unconditionally. Deterministic: the same inputs
/// always produce the same resolution.
pub fn resolve_interpreter<S, E>(
    script_dir: &Path,
    is_stop: S,
    has_env: E,
    max_hops: usize,
) -> Resolution
where
    S: Fn(&Path) -> bool,
    E: Fn(&Path) -> bool,
{
    let mut current = script_dir;
    let mut hops = 0;

    loop {
        if has_env(current) {
            return Resolution::Isolated(current.to_path_buf());
        }

        if is_stop(current) || hops >= max_hops {
            return Resolution::System;
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return Resolution::System,
        }

        hops += 1;
    }
}

/// Resolve the interpreter for a mirrored script against the real
/// filesystem.
///
/// Binds [`resolve_interpreter`] to the on-disk predicates the generated
/// wrappers use: `<dir>/<env_dir>/bin/python` for the environment probe and
/// the configured root marker for the stop probe. Returns the concrete
/// interpreter path the wrapper would exec.
pub fn resolve_on_disk(
    script: &Path,
    manifest: &ManifestSettings,
    wrapper: &WrapperSettings,
    root_marker: &str,
) -> PathBuf {
    let script_dir = script.parent().unwrap_or(Path::new("/"));
    let env_dir = manifest.env_dir.clone();
    let marker = root_marker.to_owned();

    let resolution = resolve_interpreter(
        script_dir,
        |dir| dir.join(&marker).exists(),
        |dir| is_executable(&dir.join(&env_dir).join("bin").join("python")),
        wrapper.max_hops,
    );

    match resolution {
        Resolution::Isolated(dir) => dir.join(&manifest.env_dir).join("bin").join("python"),
        Resolution::System => PathBuf::from(&wrapper.fallback),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn never(_: &Path) -> bool {
        false
    }

    #[test_case("/srv/tree/tools/convert", "/srv/tree/tools/convert"; "env beside the script")]
    #[test_case("/srv/tree/tools/convert/deep/nested", "/srv/tree/tools/convert"; "env two levels up")]
    #[test]
    fn finds_nearest_enclosing_environment(start: &str, expect: &str) {
        let result = resolve_interpreter(
            Path::new(start),
            never,
            |dir| dir == Path::new("/srv/tree/tools/convert"),
            64,
        );

        assert_eq!(result, Resolution::Isolated(PathBuf::from(expect)));
    }

    #[test]
    fn falls_back_when_no_environment_on_path() {
        let result = resolve_interpreter(Path::new("/srv/tree/tools"), never, never, 64);

        assert_eq!(result, Resolution::System);
    }

    #[test]
    fn root_marker_bounds_the_walk() {
        // Environment above the marker must stay invisible.
        let result = resolve_interpreter(
            Path::new("/srv/tree/tools"),
            |dir| dir == Path::new("/srv/tree"),
            |dir| dir == Path::new("/srv"),
            64,
        );

        assert_eq!(result, Resolution::System);
    }

    #[test]
    fn marker_directory_itself_is_still_probed() {
        let result = resolve_interpreter(
            Path::new("/srv/tree"),
            |dir| dir == Path::new("/srv/tree"),
            |dir| dir == Path::new("/srv/tree"),
            64,
        );

        assert_eq!(result, Resolution::Isolated(PathBuf::from("/srv/tree")));
    }

    #[test_case(0, Resolution::System; "zero hops never ascends")]
    #[test_case(1, Resolution::Isolated(PathBuf::from("/a/b")); "one hop reaches the env")]
    #[test]
    fn hop_budget_is_honored(max_hops: usize, expect: Resolution) {
        let result = resolve_interpreter(
            Path::new("/a/b/c"),
            never,
            |dir| dir == Path::new("/a/b"),
            max_hops,
        );

        assert_eq!(result, expect);
    }

    #[test]
    fn walk_terminates_at_filesystem_root() {
        let result = resolve_interpreter(Path::new("/"), never, never, usize::MAX);

        assert_eq!(result, Resolution::System);
    }
}
