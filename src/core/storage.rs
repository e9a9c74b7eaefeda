use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Backup volume usage information
#[derive(Debug, Clone, Serialize)]
pub struct VolumeStats {
    pub mounted: bool,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub use_percent: f64,
}

impl VolumeStats {
    fn unmounted() -> Self {
        Self {
            mounted: false,
            total_bytes: 0,
            used_bytes: 0,
            available_bytes: 0,
            use_percent: 0.0,
        }
    }
}

/// Whether `path` is the root of a mounted filesystem (device differs from its parent)
#[cfg(unix)]
pub fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let Some(parent) = path.parent() else {
        return true;
    };
    match std::fs::metadata(parent) {
        Ok(parent_meta) => parent_meta.dev() != meta.dev() || parent_meta.ino() == meta.ino(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_mount_point(path: &Path) -> bool {
    path.exists()
}

/// Bytes available to unprivileged writers on the volume holding `path`
pub fn available_space(path: &Path) -> std::io::Result<u64> {
    fs2::available_space(path)
}

/// Usage of the volume holding `path`. `mounted` is false when the backup
/// directory is missing or sits on its parent's filesystem.
pub fn volume_stats(path: &Path) -> Result<VolumeStats> {
    if !path.is_dir() {
        return Ok(VolumeStats::unmounted());
    }

    let total = fs2::total_space(path)
        .with_context(|| format!("Failed to query size of {}", path.display()))?;
    let free = fs2::free_space(path)
        .with_context(|| format!("Failed to query free space of {}", path.display()))?;
    let available = available_space(path)
        .with_context(|| format!("Failed to query available space of {}", path.display()))?;
    let used = total.saturating_sub(free);

    let use_percent = if total > 0 {
        ((used as f64 / total as f64) * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(VolumeStats {
        mounted: is_mount_point(path),
        total_bytes: total,
        used_bytes: used,
        available_bytes: available,
        use_percent,
    })
}
