/// Retention enforcer
///
/// Keeps the N newest archives matching the naming convention, whatever
/// their strategy. N is floored at 1 so a misconfigured retention of zero
/// cannot delete the archive that was just published.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::core::catalog;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionOutcome {
    pub kept: usize,
    pub deleted: Vec<PathBuf>,
}

pub fn effective_retention(requested: usize) -> usize {
    if requested == 0 {
        warn!("retention of 0 requested, keeping the newest archive");
        1
    } else {
        requested
    }
}

/// Delete every archive in `dir` beyond the `keep` newest
pub fn enforce(dir: &Path, keep: usize) -> std::io::Result<RetentionOutcome> {
    let keep = effective_retention(keep);
    let archives = catalog::list(dir)?;

    let mut outcome = RetentionOutcome {
        kept: archives.len().min(keep),
        deleted: Vec::new(),
    };

    for archive in archives.into_iter().skip(keep) {
        std::fs::remove_file(&archive.path)?;
        info!(archive = %archive.name, "deleted by retention");
        outcome.deleted.push(archive.path);
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"x").unwrap();
        }
    }

    #[test]
    fn test_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[
            "backup_2024-05-14_03-00-00.tar.gz",
            "backup_2024-05-15_03-00-00_data_only.tar.gz",
            "nc_data_only_2024-05-16_03-00-00.tar.gz",
            "backup_2024-05-17_03-00-00.tar.gz",
            "unrelated.tar.gz",
        ]);

        let outcome = enforce(dir.path(), 2).unwrap();
        assert_eq!(outcome.kept, 2);
        assert_eq!(outcome.deleted.len(), 2);

        let remaining: Vec<String> = catalog::list(dir.path()).unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(remaining, vec![
            "backup_2024-05-17_03-00-00.tar.gz",
            "nc_data_only_2024-05-16_03-00-00.tar.gz",
        ]);
        assert!(dir.path().join("unrelated.tar.gz").exists());
    }

    #[test]
    fn test_zero_never_deletes_last_archive() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &["backup_2024-05-17_03-00-00.tar.gz"]);

        let outcome = enforce(dir.path(), 0).unwrap();
        assert!(outcome.deleted.is_empty());
        assert_eq!(catalog::list(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_zero_keeps_only_newest() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &[
            "backup_2024-05-16_03-00-00.tar.gz",
            "backup_2024-05-17_03-00-00.tar.gz",
        ]);

        enforce(dir.path(), 0).unwrap();
        let remaining = catalog::list(dir.path()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "backup_2024-05-17_03-00-00.tar.gz");
    }

    #[test]
    fn test_under_limit_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), &["backup_2024-05-17_03-00-00.tar.gz"]);
        assert_eq!(enforce(dir.path(), 8).unwrap(), RetentionOutcome { kept: 1, deleted: vec![] });
    }
}
