// SPDX-FileCopyrightText: 2026 pymirror contributors
// SPDX-License-Identifier: MIT

use pymirror::{
    clear::{clear_install, uninstall},
    config::ElevationPolicy,
    path::{default_dest_dir, default_profile_path, default_wrapper_dir},
    InstallProfile, Installer, PipVenv,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, fs, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  pymirror [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Command::Install(opts) => run_install(opts),
            Command::Clear(opts) => run_clear(opts),
            Command::Uninstall(opts) => run_uninstall(opts),
            Command::Resolve(opts) => run_resolve(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Mirror scripts, provision environments, install wrapper shims.
    #[command(override_usage = "pymirror install [options]")]
    Install(InstallOptions),

    /// Remove the managed destination tree and marked wrappers.
    #[command(override_usage = "pymirror clear [options]")]
    Clear(ClearOptions),

    /// Remove wrappers recorded in the install ledger, then the tree.
    #[command(override_usage = "pymirror uninstall [options]")]
    Uninstall(UninstallOptions),

    /// Print the interpreter a mirrored script would launch with.
    #[command(override_usage = "pymirror resolve [options] <script>")]
    Resolve(ResolveOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallOptions {
    /// Source tree root (defaults to the current directory).
    #[arg(short, long, value_name = "path")]
    pub source: Option<PathBuf>,

    /// Managed destination tree root.
    #[arg(short, long, value_name = "path")]
    pub dest: Option<PathBuf>,

    /// Shared binary directory receiving wrapper shims.
    #[arg(short, long, value_name = "path")]
    pub wrapper_dir: Option<PathBuf>,

    /// Install profile to load instead of the default location.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Force the elevated wrapper installation path.
    #[arg(long)]
    pub root: bool,

    /// Reset managed state before installing.
    #[arg(long)]
    pub clear: bool,

    /// Assume yes on every confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,

    /// Report planned actions without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ClearOptions {
    /// Managed destination tree root.
    #[arg(short, long, value_name = "path")]
    pub dest: Option<PathBuf>,

    /// Shared binary directory holding wrapper shims.
    #[arg(short, long, value_name = "path")]
    pub wrapper_dir: Option<PathBuf>,

    /// Install profile to load instead of the default location.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Assume yes on every confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,

    /// Report planned removals without changing anything.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UninstallOptions {
    /// Install profile to load instead of the default location.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Assume yes on every confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ResolveOptions {
    /// Mirrored script to resolve an interpreter for.
    #[arg(required = true, value_name = "script")]
    pub script: PathBuf,

    /// Install profile to load instead of the default location.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,
}

fn main() {
    let layer = fmt::layer().compact().with_target(false).without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_profile(path_override: Option<PathBuf>) -> Result<InstallProfile> {
    let path = match path_override {
        Some(path) => path,
        None => default_profile_path()?,
    };

    if !path.is_file() {
        return Ok(InstallProfile::default());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("cannot read profile at {}", path.display()))?;

    content
        .parse()
        .with_context(|| format!("cannot parse profile at {}", path.display()))
}

fn run_install(opts: InstallOptions) -> Result<()> {
    let mut profile = load_profile(opts.config)?;
    if opts.source.is_some() {
        profile.paths.source = opts.source;
    }
    if opts.dest.is_some() {
        profile.paths.dest = opts.dest;
    }
    if opts.wrapper_dir.is_some() {
        profile.paths.wrapper_dir = opts.wrapper_dir;
    }
    if opts.root {
        profile.wrapper.elevation = ElevationPolicy::RequireElevated;
    }

    let source = match &profile.paths.source {
        Some(path) => path.clone(),
        None => env::current_dir().context("cannot determine current directory")?,
    };
    let dest = match &profile.paths.dest {
        Some(path) => path.clone(),
        None => default_dest_dir()?,
    };
    let wrapper_dir = profile
        .paths
        .wrapper_dir
        .clone()
        .unwrap_or_else(default_wrapper_dir);

    // Precondition: no interpreter, no install. Checked before any mutation.
    let manager = PipVenv::detect().context("required interpreter missing")?;

    if opts.clear {
        clear_install(&dest, &wrapper_dir, opts.yes, opts.dry_run)?;
    }

    let installer = Installer::new(&profile, &manager);
    let report = installer.run(&source, &dest, &wrapper_dir, opts.dry_run)?;

    info!("done.");
    info!(
        "mode: {}",
        if opts.dry_run {
            "dry-run (no changes)"
        } else {
            "executed"
        }
    );
    info!("scripts mirrored: {}", report.copied);
    info!("environments created: {}", report.envs_created);
    info!("environments synced: {}", report.envs_synced);
    info!("wrappers installed: {}", report.wrappers_installed);
    if report.wrappers_skipped > 0 {
        warn!("wrappers skipped: {}", report.wrappers_skipped);
    }

    Ok(())
}

fn run_clear(opts: ClearOptions) -> Result<()> {
    let profile = load_profile(opts.config)?;
    let dest = match opts.dest.or_else(|| profile.paths.dest.clone()) {
        Some(path) => path,
        None => default_dest_dir()?,
    };
    let wrapper_dir = opts
        .wrapper_dir
        .or_else(|| profile.paths.wrapper_dir.clone())
        .unwrap_or_else(default_wrapper_dir);

    clear_install(&dest, &wrapper_dir, opts.yes, opts.dry_run)?;

    Ok(())
}

fn run_uninstall(opts: UninstallOptions) -> Result<()> {
    let profile = load_profile(opts.config)?;
    let dest = match profile.paths.dest.clone() {
        Some(path) => path,
        None => default_dest_dir()?,
    };
    let wrapper_dir = profile
        .paths
        .wrapper_dir
        .clone()
        .unwrap_or_else(default_wrapper_dir);

    uninstall(&dest, &wrapper_dir, opts.yes)?;

    Ok(())
}

fn run_resolve(opts: ResolveOptions) -> Result<()> {
    let profile = load_profile(opts.config)?;
    let script = opts
        .script
        .canonicalize()
        .unwrap_or(opts.script);

    let interpreter = pymirror::resolve_on_disk(
        &script,
        &profile.manifest,
        &profile.wrapper,
        &profile.filter.root_marker,
    );

    println!("{}", interpreter.display());

    Ok(())
}
