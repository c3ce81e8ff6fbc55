// ABOUTME: Packs a local directory into a single gzip-compressed tar archive.
// ABOUTME: Runs on the blocking pool; entries are stored relative to the directory root.

use super::error::{PipelineError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::path::Path;

/// Archive `source` into `dest`, returning the archive size in bytes.
pub async fn package_directory(source: &Path, dest: &Path) -> Result<u64> {
    let source = source.to_path_buf();
    let dest = dest.to_path_buf();
    let display = source.display().to_string();

    tokio::task::spawn_blocking(move || write_archive(&source, &dest))
        .await
        .map_err(|e| PipelineError::PackagingFailed {
            path: display.clone(),
            reason: format!("packaging task failed: {e}"),
        })?
        .map_err(|e| PipelineError::PackagingFailed {
            path: display,
            reason: e.to_string(),
        })
}

fn write_archive(source: &Path, dest: &Path) -> std::io::Result<u64> {
    if !source.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "not a directory",
        ));
    }
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", source)?;
    let encoder = builder.into_inner()?;
    let file = encoder.finish()?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}
