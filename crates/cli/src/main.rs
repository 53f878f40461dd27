use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::info;

use syncswitch_core::backup::{self, BackupStore};
use syncswitch_core::config::Config;
use syncswitch_core::convert;
use syncswitch_core::human::human_bytes;
use syncswitch_core::logging;
use syncswitch_core::report;
use syncswitch_core::scanner::{ScanMsg, Scanner};
use syncswitch_core::state::SyncState;
use syncswitch_core::switch::Workspace;
use syncswitch_core::{Result, SwitchError, Variant};

#[derive(Parser, Debug)]
#[command(name = "syncswitch", about = "Two-variant client install switcher")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "sync_config.json")]
    config: PathBuf,
    /// Directory holding snapshot, diff and state documents
    #[arg(short, long, default_value = ".")]
    work_dir: PathBuf,
    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Record the currently installed variant (first run only)
    Init { variant: Variant },
    /// Show the current variant and recorded backups
    Status,
    /// Scan the live tree into the current variant's snapshot document
    Scan,
    /// Diff the other variant's snapshot against the current one
    Diff,
    /// Plan a backup of the current variant; --yes performs it
    Backup {
        #[arg(long)]
        yes: bool,
        /// Also export the plan as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Write the conversion plan for switching to the other variant
    Plan {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Full flow: scan, diff, backup, plan, restore, flip state
    Switch {
        #[arg(long)]
        yes: bool,
        #[arg(long)]
        skip_backup: bool,
    },
    /// Launch the current variant's client
    Launch,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_level);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::from_file(&args.config)?;
    let ws = Workspace::new(&args.work_dir);
    let mut state = ws.load_state()?;

    match args.command {
        Cmd::Init { variant } => {
            if let Some(current) = state.current_ver {
                return Err(SwitchError::Config(format!(
                    "already initialized, current variant is {current}"
                )));
            }
            state.set_current(variant);
            ws.store_state(&state)?;
            println!("current variant set to {variant}");
        }
        Cmd::Status => {
            match state.current_ver {
                Some(v) => println!("current variant: {v}"),
                None => println!("current variant: not initialized"),
            }
            for variant in Variant::ALL {
                match state.latest_backup(variant) {
                    Some(b) => println!(
                        "{variant}: backup {} - {} files, {} at {}",
                        b.timestamp,
                        b.file_count,
                        human_bytes(b.total_size),
                        b.path.display()
                    ),
                    None => println!("{variant}: no backup recorded"),
                }
            }
        }
        Cmd::Scan => {
            let current = state.current()?;
            run_scan(&config, &ws, current)?;
        }
        Cmd::Diff => {
            let current = state.current()?;
            match ws.generate_diff(current)? {
                Some(d) => println!(
                    "diff written to {} (base {})",
                    ws.diff_path().display(),
                    d.path
                ),
                None => println!("snapshots are identical, no diff written"),
            }
        }
        Cmd::Backup { yes, csv } => {
            run_backup(&config, &ws, &mut state, yes, csv.as_deref())?;
        }
        Cmd::Plan { csv } => {
            let current = state.current()?;
            let diff = ws.load_diff()?;
            let record = state.require_backup(current.other())?;
            let plan = convert::plan(&diff, record, &config.ignore_set());
            report::write_conversion_plan(&plan, &ws.conversion_plan_path())?;
            if let Some(path) = csv {
                report::conversion_plan_to_csv(&plan, File::create(path)?)?;
            }
            println!(
                "{} operations, {} to restore, {} warnings - plan written to {}",
                plan.total_ops,
                human_bytes(plan.total_size),
                plan.warning_count(),
                ws.conversion_plan_path().display()
            );
        }
        Cmd::Switch { yes, skip_backup } => {
            run_switch(&config, &ws, &mut state, yes, skip_backup)?;
        }
        Cmd::Launch => {
            let current = state.current()?;
            let path = config.launch_path(current).ok_or_else(|| {
                SwitchError::Config(format!("no client_launch_paths entry for {current}"))
            })?;
            std::process::Command::new(path).spawn()?;
            println!("launched {current} client: {}", path.display());
        }
    }
    Ok(())
}

/// Scan on a worker thread, draining progress from the channel, then
/// write the snapshot document.
fn run_scan(config: &Config, ws: &Workspace, current: Variant) -> Result<()> {
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = crossbeam_channel::unbounded::<ScanMsg>();
    let scanner = Scanner::new(cancel);
    std::thread::spawn({
        let root = config.game_folder_path.clone();
        move || scanner.scan(root, tx)
    });

    let mut scanned = 0u64;
    let mut bytes = 0u64;
    while let Ok(msg) = rx.recv() {
        match msg {
            ScanMsg::Progress {
                scanned: s,
                bytes: b,
            } => {
                scanned = s;
                bytes = b;
            }
            ScanMsg::Error(e) => eprintln!("scan: {e}"),
            ScanMsg::Done(tree) => {
                ws.store_snapshot(current, &tree)?;
                println!(
                    "scanned {} files, {} - snapshot written to {}",
                    scanned,
                    human_bytes(bytes),
                    ws.snapshot_path(current).display()
                );
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Plan, report, and (with `yes`) perform the backup of the current
/// variant, recording it in state. Returns whether the backup phase is
/// satisfied: a backup was taken, one already exists, or nothing
/// needed backing up. Only an unconfirmed non-empty plan with no prior
/// backup leaves the phase unsatisfied.
fn run_backup(
    config: &Config,
    ws: &Workspace,
    state: &mut SyncState,
    yes: bool,
    csv: Option<&std::path::Path>,
) -> Result<bool> {
    let current = state.current()?;
    let diff = ws.load_diff()?;
    let plan = backup::plan(&diff, &config.game_folder_path, &config.ignore_set())?;

    if plan.is_empty() {
        println!("nothing to back up");
        return Ok(true);
    }

    report::write_backup_plan(&plan, &ws.backup_plan_path())?;
    if let Some(path) = csv {
        report::backup_plan_to_csv(&plan, File::create(path)?)?;
    }
    println!(
        "{} files, {} - plan written to {}",
        plan.file_count(),
        human_bytes(plan.total_size),
        ws.backup_plan_path().display()
    );

    if !yes {
        println!("re-run with --yes to perform the backup");
        return Ok(state.latest_backup(current).is_some());
    }

    let store = BackupStore::new(config.backup_dir.clone(), config.max_backups);
    let record = store.create(current, &plan, &config.game_folder_path)?;
    info!(variant = %current, timestamp = record.timestamp.as_str(), "backup recorded");
    state.record_backup(current, record);
    ws.store_state(state)?;
    println!("backup of {current} complete");
    Ok(true)
}

fn run_switch(
    config: &Config,
    ws: &Workspace,
    state: &mut SyncState,
    yes: bool,
    skip_backup: bool,
) -> Result<()> {
    let current = state.current()?;
    let other = current.other();
    info!(%current, %other, "starting switch");

    run_scan(config, ws, current)?;

    let Some(diff) = ws.generate_diff(current)? else {
        println!("snapshots are identical, nothing to convert");
        return Ok(());
    };

    if !skip_backup && !run_backup(config, ws, state, yes, None)? {
        println!("stopping before conversion; no backup was taken");
        return Ok(());
    }

    // hard stop when the other variant was never backed up
    let record = state.require_backup(other)?.clone();
    let ignore = config.ignore_set();
    let plan = convert::plan(&diff, &record, &ignore);
    report::write_conversion_plan(&plan, &ws.conversion_plan_path())?;
    println!(
        "conversion plan: {} operations, {} to restore, {} warnings - see {}",
        plan.total_ops,
        human_bytes(plan.total_size),
        plan.warning_count(),
        ws.conversion_plan_path().display()
    );

    if !yes {
        println!("review the plan, then re-run with --yes to apply it");
        return Ok(());
    }

    let outcome = convert::apply(&diff, &record.path, &config.game_folder_path, &ignore);
    // the state flips only after the restore traversal has finished,
    // so an interrupted run still points at the pre-restore variant
    state.set_current(other);
    ws.store_state(state)?;
    println!(
        "switched to {other}: {} restored, {} missing, {} failed",
        outcome.restored, outcome.missing, outcome.failed
    );
    Ok(())
}
