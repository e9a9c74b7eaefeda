/// Archive collaborator: gzip-compressed tar
///
/// Packaging writes under a temporary dot-prefixed name on the destination
/// volume and renames into place only after the stream is finished and
/// flushed to disk.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io;
use std::path::{Component as PathComponent, Path, PathBuf};
use tar::{Archive, Builder};
use tracing::{debug, info};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Compress the contents of `src_dir` into `dest`; returns the archive size
    async fn compress(&self, src_dir: &Path, dest: &Path) -> Result<u64>;

    /// Read the whole archive, checking every entry header and the gzip checksum.
    /// Returns the number of entries.
    async fn verify(&self, archive: &Path) -> Result<usize>;

    /// Unpack into `dest_dir`, refusing entries that would land outside it
    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()>;
}

/// Write `dest` from `src_dir` and flush it to disk
fn write_tar_gz(src_dir: &Path, dest: &Path) -> Result<u64> {
    let file = File::create(dest)
        .with_context(|| format!("Failed to create archive file: {}", dest.display()))?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut tar_builder = Builder::new(encoder);
    tar_builder.follow_symlinks(false);

    tar_builder
        .append_dir_all(".", src_dir)
        .with_context(|| format!("Failed to archive {}", src_dir.display()))?;

    // Finish the tarball (this flushes the GzEncoder too)
    let file = tar_builder
        .into_inner()
        .context("Failed to finalize tarball builder")?
        .finish()
        .context("Failed to finalize gzip compression")?;

    file.sync_all().context("Failed to flush archive to disk")?;
    Ok(file.metadata()?.len())
}

fn verify_tar_gz(archive_path: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut count = 0;
    for entry in archive.entries().context("Unreadable archive header")? {
        let mut entry = entry.context("Corrupt archive entry")?;
        let path = entry
            .path()
            .context("Invalid path in archive entry")?
            .into_owned();
        // Reading every body is what drives the gzip CRC check
        io::copy(&mut entry, &mut io::sink())
            .with_context(|| format!("Corrupt data for {}", path.display()))?;
        count += 1;
    }

    Ok(count)
}

/// Entry path relative to the extraction root, or an error for escaping paths
fn safe_relative(path: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for part in path.components() {
        match part {
            PathComponent::Normal(p) => clean.push(p),
            PathComponent::CurDir => {}
            PathComponent::ParentDir | PathComponent::RootDir | PathComponent::Prefix(_) => {
                return Err(anyhow!("archive entry escapes destination: {}", path.display()));
            }
        }
    }
    Ok(clean)
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(true);
    archive.set_unpack_xattrs(true);

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path_in_archive = entry.path()?.into_owned();
        let relative = safe_relative(&path_in_archive)?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        // unpack_in re-checks containment, including through symlinks
        if !entry.unpack_in(dest_dir)? {
            return Err(anyhow!(
                "archive entry escapes destination: {}",
                path_in_archive.display()
            ));
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct TarGz;

#[async_trait]
impl Archiver for TarGz {
    async fn compress(&self, src_dir: &Path, dest: &Path) -> Result<u64> {
        let (src, dst) = (src_dir.to_path_buf(), dest.to_path_buf());
        debug!(src = %src.display(), dest = %dst.display(), "compressing");
        tokio::task::spawn_blocking(move || write_tar_gz(&src, &dst))
            .await
            .context("Compression task panicked")?
    }

    async fn verify(&self, archive: &Path) -> Result<usize> {
        let path = archive.to_path_buf();
        let count = tokio::task::spawn_blocking(move || verify_tar_gz(&path))
            .await
            .context("Verification task panicked")??;
        info!(archive = %archive.display(), entries = count, "archive integrity verified");
        Ok(count)
    }

    async fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()> {
        let (src, dst) = (archive.to_path_buf(), dest_dir.to_path_buf());
        tokio::task::spawn_blocking(move || extract_tar_gz(&src, &dst))
            .await
            .context("Extraction task panicked")?
    }
}

/// Flush directory metadata so a completed rename survives power loss
pub fn sync_dir(dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        File::open(dir)
            .and_then(|d| d.sync_all())
            .with_context(|| format!("Failed to sync directory {}", dir.display()))?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Compress `src_dir` to `partial`, then rename onto `final_path` on the same volume.
///
/// On any failure the partial file is removed and nothing exists at `final_path`.
pub async fn publish(archiver: &dyn Archiver, src_dir: &Path, partial: &Path, final_path: &Path) -> Result<u64> {
    let size = match archiver.compress(src_dir, partial).await {
        Ok(size) => size,
        Err(e) => {
            let _ = tokio::fs::remove_file(partial).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(partial, final_path).await {
        let _ = tokio::fs::remove_file(partial).await;
        return Err(e).with_context(|| format!("Failed to publish {}", final_path.display()));
    }

    if let Some(parent) = final_path.parent() {
        let parent = parent.to_path_buf();
        tokio::task::spawn_blocking(move || sync_dir(&parent))
            .await
            .context("Directory sync task panicked")??;
    }

    Ok(size)
}
