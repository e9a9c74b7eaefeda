/// Archive naming and the backup volume catalog
///
/// The directory listing is the index: every archive name embeds its creation
/// timestamp and strategy, so listing, retention and `latest` need nothing
/// but the file names.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::error::{EngineError, EngineResult};
use crate::utils::{
    ARCHIVE_EXTENSION, ARCHIVE_PREFIX, DATA_ONLY_TAG, LEGACY_DATA_ONLY_PREFIX, PARTIAL_SUFFIX,
    TIMESTAMP_FORMAT,
};

/// Which components a backup captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Data, database, config, apps and automation config
    #[default]
    Full,
    /// The data tree only
    DataOnly,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Full => f.write_str("full"),
            Strategy::DataOnly => f.write_str("data-only"),
        }
    }
}

/// Parsed archive file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub timestamp: NaiveDateTime,
    pub strategy: Strategy,
    /// `nc_data_only_<ts>.tar.gz`, written by older appliance releases
    pub legacy: bool,
}

impl ArchiveName {
    pub fn new(timestamp: NaiveDateTime, strategy: Strategy) -> Self {
        Self {
            timestamp,
            strategy,
            legacy: false,
        }
    }

    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(ARCHIVE_EXTENSION)?;

        if let Some(ts) = stem.strip_prefix(LEGACY_DATA_ONLY_PREFIX) {
            let timestamp = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()?;
            return Some(Self {
                timestamp,
                strategy: Strategy::DataOnly,
                legacy: true,
            });
        }

        let rest = stem.strip_prefix(ARCHIVE_PREFIX)?;
        let (ts, strategy) = match rest.strip_suffix(DATA_ONLY_TAG) {
            Some(ts) => (ts, Strategy::DataOnly),
            None => (rest, Strategy::Full),
        };
        let timestamp = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            timestamp,
            strategy,
            legacy: false,
        })
    }

    pub fn file_name(&self) -> String {
        let ts = self.timestamp.format(TIMESTAMP_FORMAT);
        match (self.legacy, self.strategy) {
            (true, _) => format!("{}{}{}", LEGACY_DATA_ONLY_PREFIX, ts, ARCHIVE_EXTENSION),
            (false, Strategy::Full) => format!("{}{}{}", ARCHIVE_PREFIX, ts, ARCHIVE_EXTENSION),
            (false, Strategy::DataOnly) => {
                format!("{}{}{}{}", ARCHIVE_PREFIX, ts, DATA_ONLY_TAG, ARCHIVE_EXTENSION)
            }
        }
    }

    /// Hidden in-progress name; never matches the naming convention
    pub fn partial_name(&self) -> String {
        format!(".{}{}", self.file_name(), PARTIAL_SUFFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
    pub strategy: Strategy,
    pub size_bytes: u64,
}

fn newest_first(a: &ArchiveEntry, b: &ArchiveEntry) -> Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| b.name.cmp(&a.name))
}

/// All archives in `dir` matching the naming convention, newest first.
/// A missing directory is an empty catalog.
pub fn list(dir: &Path) -> std::io::Result<Vec<ArchiveEntry>> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut archives = Vec::new();
    for entry in read_dir {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(parsed) = ArchiveName::parse(&name) else {
            continue;
        };
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        archives.push(ArchiveEntry {
            name,
            path: entry.path(),
            timestamp: parsed.timestamp,
            strategy: parsed.strategy,
            size_bytes: metadata.len(),
        });
    }

    archives.sort_by(newest_first);
    Ok(archives)
}

pub fn latest(dir: &Path) -> std::io::Result<Option<ArchiveEntry>> {
    Ok(list(dir)?.into_iter().next())
}

/// Resolve an operator-supplied archive reference to a file inside `dir`.
///
/// Accepts `latest`, a bare file name, or a path that already points inside
/// `dir`. Anything resolving elsewhere is rejected.
pub fn resolve(dir: &Path, reference: &str) -> EngineResult<PathBuf> {
    if reference == "latest" {
        return latest(dir)?
            .map(|entry| entry.path)
            .ok_or_else(|| EngineError::ArchiveNotFound(format!("no archives in {}", dir.display())));
    }

    let candidate = Path::new(reference);
    let name = candidate
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EngineError::ArchiveNotFound(reference.to_string()))?;

    if candidate.components().count() > 1 {
        let parent = candidate.parent().unwrap_or(Path::new(""));
        let same_dir = match (parent.canonicalize(), dir.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same_dir {
            return Err(EngineError::ArchiveNotFound(format!(
                "{} is outside the backup directory {}",
                reference,
                dir.display()
            )));
        }
    }

    if ArchiveName::parse(name).is_none() {
        return Err(EngineError::ArchiveNotFound(format!(
            "{} does not follow the archive naming convention",
            name
        )));
    }

    let path = dir.join(name);
    if !path.is_file() {
        return Err(EngineError::ArchiveNotFound(path.display().to_string()));
    }
    Ok(path)
}
