// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

//! Full-pipeline runs against fixture trees, with environment management
//! faked in-process.

use crate::{materialize, snapshot, FakeEnvManager};

use pymirror::{
    clear::uninstall,
    deploy::{
        classify::ExcludeRules,
        ledger_path,
        provision::Provisioner,
        resolve::resolve_on_disk,
    },
    InstallProfile, Installer,
};

use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{fs, path::Path};

const SCENARIO: &str = "\
-- src/tools/report.py --
print('report')
-- src/tools/convert/convert.py --
print('convert')
-- src/tools/convert/venv.txt --
requests
# comment

rich==13.7.1
";

fn run_once(profile: &InstallProfile, manager: &FakeEnvManager) -> pymirror::RunReport {
    Installer::new(profile, manager)
        .run(Path::new("src"), Path::new("dst"), Path::new("bin"), false)
        .unwrap()
}

#[sealed_test]
fn end_to_end_scenario() -> anyhow::Result<()> {
    materialize(SCENARIO)?;
    let profile = InstallProfile::default();
    let manager = FakeEnvManager::new();

    let report = run_once(&profile, &manager);

    // Both scripts mirrored, manifest not copied.
    assert_eq!(report.copied, 2);
    assert!(Path::new("dst/tools/report.py").exists());
    assert!(Path::new("dst/tools/convert/convert.py").exists());
    assert!(!Path::new("dst/tools/convert/venv.txt").exists());

    // Environment exactly where the manifest was, nowhere else.
    assert_eq!(report.envs_created, 1);
    assert!(Path::new("dst/tools/convert/.venv/bin/python").exists());
    assert!(!Path::new("dst/tools/.venv").exists());
    assert_eq!(
        fs::read_to_string("dst/tools/convert/.venv/installed.txt")?,
        "requests\nrich==13.7.1"
    );

    // One wrapper per mirrored script, marker embedded, target baked in.
    assert_eq!(report.wrappers_installed, 2);
    let convert = fs::read_to_string("bin/convert")?;
    let report_wrapper = fs::read_to_string("bin/report")?;
    assert!(convert.contains("# managed by pymirror"));
    assert!(convert.contains("tools/convert/convert.py"));
    assert!(report_wrapper.contains("tools/report.py"));

    // Runtime resolution: convert finds its sibling environment, report
    // falls back to the system interpreter.
    let convert_script = Path::new("dst/tools/convert/convert.py").canonicalize()?;
    let resolved = resolve_on_disk(
        &convert_script,
        &profile.manifest,
        &profile.wrapper,
        &profile.filter.root_marker,
    );
    assert!(resolved.ends_with("tools/convert/.venv/bin/python"));

    let report_script = Path::new("dst/tools/report.py").canonicalize()?;
    let resolved = resolve_on_disk(
        &report_script,
        &profile.manifest,
        &profile.wrapper,
        &profile.filter.root_marker,
    );
    assert_eq!(resolved, Path::new("python3").to_path_buf());

    Ok(())
}

#[sealed_test]
fn second_run_converges_without_recreating() -> anyhow::Result<()> {
    materialize(SCENARIO)?;
    let profile = InstallProfile::default();
    let manager = FakeEnvManager::new();

    let first = run_once(&profile, &manager);
    let tree_after_first = snapshot(Path::new("dst"));
    let wrappers_after_first = snapshot(Path::new("bin"));

    let second = run_once(&profile, &manager);

    // Same destination tree, byte-identical wrappers.
    assert_eq!(snapshot(Path::new("dst")), tree_after_first);
    assert_eq!(snapshot(Path::new("bin")), wrappers_after_first);

    // The environment is created exactly once across runs.
    assert_eq!(first.envs_created, 1);
    assert_eq!(second.envs_created, 0);
    assert_eq!(second.envs_synced, 1);
    assert_eq!(manager.created(), 1);

    Ok(())
}

#[sealed_test]
fn excluded_subtrees_stay_out_of_everything() -> anyhow::Result<()> {
    materialize(
        "\
-- src/keep/ok.py --
print('ok')
-- src/.git/hook.py --
print('never')
-- src/__pycache__/deep/cached.py --
print('never')
-- src/old.name/legacy.py --
print('never')
-- src/optout/tool.py --
print('never')
-- src/optout/.name --
-- src/.git/deep/venv.txt --
requests
",
    )?;
    let profile = InstallProfile::default();
    let manager = FakeEnvManager::new();

    run_once(&profile, &manager);

    assert!(Path::new("dst/keep/ok.py").exists());
    assert!(!Path::new("dst/.git").exists());
    assert!(!Path::new("dst/__pycache__").exists());
    assert!(!Path::new("dst/old.name").exists());
    assert!(!Path::new("dst/optout").exists());

    // The manifest under an excluded root must not provision anything.
    assert_eq!(manager.created(), 0);

    Ok(())
}

#[sealed_test]
fn identical_basenames_disambiguate_instead_of_overwriting() -> anyhow::Result<()> {
    materialize(
        "\
-- src/alpha/run.py --
print('alpha')
-- src/beta/run.py --
print('beta')
",
    )?;
    let profile = InstallProfile::default();
    let manager = FakeEnvManager::new();

    let report = run_once(&profile, &manager);

    assert_eq!(report.wrappers_installed, 2);
    assert_eq!(report.wrappers_skipped, 0);

    let plain = fs::read_to_string("bin/run")?;
    let disambiguated = fs::read_to_string("bin/beta-run")?;
    assert!(plain.contains("alpha/run.py"));
    assert!(disambiguated.contains("beta/run.py"));

    Ok(())
}

#[sealed_test]
fn provisioning_failure_is_isolated_to_its_manifest() -> anyhow::Result<()> {
    materialize(
        "\
-- src/good/tool.py --
print('good')
-- src/good/venv.txt --
requests
-- src/bad/tool.py --
print('bad')
-- src/bad/venv.txt --
requests
",
    )?;
    let profile = InstallProfile::default();
    let manager = FakeEnvManager {
        poisoned: vec![Path::new("dst/bad").to_path_buf()],
        ..FakeEnvManager::new()
    };

    let rules = ExcludeRules::new(&profile.filter)?;
    let provisioner = Provisioner::new(&rules, &manager, "venv.txt", ".venv");
    let report = provisioner.provision_all(Path::new("src"), Path::new("dst"), false);

    assert_eq!(report.synced, 1);
    assert_eq!(report.skipped, 1);
    assert!(Path::new("dst/good/.venv/bin/python").exists());
    assert!(!Path::new("dst/bad/.venv").exists());

    Ok(())
}

#[sealed_test]
fn ledger_records_wrappers_and_uninstall_consumes_it() -> anyhow::Result<()> {
    materialize(SCENARIO)?;
    let profile = InstallProfile::default();
    let manager = FakeEnvManager::new();

    run_once(&profile, &manager);

    let ledger = fs::read_to_string(ledger_path(Path::new("dst")))?;
    assert!(ledger.contains("report -> "));
    assert!(ledger.contains("convert -> "));

    uninstall(Path::new("dst"), Path::new("bin"), true)?;

    assert!(!Path::new("dst").exists());
    assert!(!Path::new("bin/report").exists());
    assert!(!Path::new("bin/convert").exists());

    Ok(())
}

#[sealed_test]
fn dry_run_plans_but_mutates_nothing() -> anyhow::Result<()> {
    materialize(SCENARIO)?;
    let profile = InstallProfile::default();
    let manager = FakeEnvManager::new();

    let report = Installer::new(&profile, &manager)
        .run(Path::new("src"), Path::new("dst"), Path::new("bin"), true)
        .unwrap();

    assert_eq!(report.copied, 2);
    assert!(!Path::new("dst").exists());
    assert!(!Path::new("bin").exists());
    assert!(manager.calls.borrow().is_empty());

    Ok(())
}

#[sealed_test]
fn source_files_removed_later_stay_mirrored() -> anyhow::Result<()> {
    materialize(SCENARIO)?;
    let profile = InstallProfile::default();
    let manager = FakeEnvManager::new();

    run_once(&profile, &manager);
    fs::remove_file("src/tools/report.py")?;
    let report = run_once(&profile, &manager);

    // Additive-only: the mirror never deletes.
    assert_eq!(report.copied, 1);
    assert!(Path::new("dst/tools/report.py").exists());

    Ok(())
}
