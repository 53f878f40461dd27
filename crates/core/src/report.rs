//! Human-readable and CSV renderings of backup and conversion plans.
//! Content is load-bearing; the exact layout is not.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::backup::BackupPlan;
use crate::convert::{RestoreAction, RestorePlan};
use crate::error::Result;
use crate::human::mib;

pub fn write_backup_plan(plan: &BackupPlan, out: &Path) -> Result<()> {
    let mut w = BufWriter::new(File::create(out)?);
    for entry in &plan.entries {
        writeln!(w, "{}, ({})", entry.path.display(), mib(entry.size))?;
    }
    writeln!(
        w,
        "\ntotal: {} files, {}",
        plan.file_count(),
        mib(plan.total_size)
    )?;
    w.flush()?;
    Ok(())
}

pub fn write_conversion_plan(plan: &RestorePlan, out: &Path) -> Result<()> {
    let mut w = BufWriter::new(File::create(out)?);
    writeln!(w, "=== planned conversion operations ===")?;
    writeln!(w, "[restore] copy a file back from the backup")?;
    writeln!(w, "[warning] backup file missing, will be skipped\n")?;
    for action in &plan.actions {
        match action {
            RestoreAction::Restore { kind, path, size } => {
                writeln!(w, "[restore] ({}) {} ({})", kind.as_str(), path, mib(*size))?;
            }
            RestoreAction::Warning { path } => {
                writeln!(w, "[warning] missing backup file: {path}")?;
            }
        }
    }
    writeln!(
        w,
        "\ntotal: {} operations, {} to restore, {} warnings",
        plan.total_ops,
        mib(plan.total_size),
        plan.warning_count()
    )?;
    w.flush()?;
    Ok(())
}

pub fn backup_plan_to_csv(plan: &BackupPlan, w: impl Write) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(["path", "size"])?;
    for entry in &plan.entries {
        writer.write_record([entry.path.display().to_string(), entry.size.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn conversion_plan_to_csv(plan: &RestorePlan, w: impl Write) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(["action", "kind", "path", "size"])?;
    for action in &plan.actions {
        match action {
            RestoreAction::Restore { kind, path, size } => {
                writer.write_record(["restore", kind.as_str(), path, &size.to_string()])?;
            }
            RestoreAction::Warning { path } => {
                writer.write_record(["warning", "", path, ""])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::BackupEntry;
    use crate::convert::RestoreKind;
    use std::path::PathBuf;

    fn restore_plan() -> RestorePlan {
        RestorePlan {
            actions: vec![
                RestoreAction::Restore {
                    kind: RestoreKind::Update,
                    path: "a.txt".to_string(),
                    size: 1024 * 1024,
                },
                RestoreAction::Warning {
                    path: "sub/lost.txt".to_string(),
                },
            ],
            total_ops: 1,
            total_size: 1024 * 1024,
        }
    }

    #[test]
    fn backup_plan_lists_paths_and_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("backup_plan.txt");
        let plan = BackupPlan {
            entries: vec![BackupEntry {
                path: PathBuf::from("/live/a.txt"),
                size: 2 * 1024 * 1024,
            }],
            total_size: 2 * 1024 * 1024,
        };
        write_backup_plan(&plan, &out).unwrap();

        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.contains("/live/a.txt, (2.00 MiB)"));
        assert!(text.contains("total: 1 files"));
    }

    #[test]
    fn conversion_plan_lists_actions_and_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("conversion_plan.txt");
        write_conversion_plan(&restore_plan(), &out).unwrap();

        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.contains("[restore] (update) a.txt (1.00 MiB)"));
        assert!(text.contains("[warning] missing backup file: sub/lost.txt"));
        assert!(text.contains("total: 1 operations, 1.00 MiB to restore, 1 warnings"));
    }

    #[test]
    fn csv_export_roundtrips_through_reader() {
        let mut buf = Vec::new();
        conversion_plan_to_csv(&restore_plan(), &mut buf).unwrap();

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "restore");
        assert_eq!(&rows[1][2], "sub/lost.txt");
    }
}
