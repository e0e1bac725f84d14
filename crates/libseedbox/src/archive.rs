use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{Error, Result};

pub const MIN_LEVEL: i64 = 0;
pub const MAX_LEVEL: i64 = 9;

pub fn clamp_level(level: i64) -> i64 {
    level.clamp(MIN_LEVEL, MAX_LEVEL)
}

fn file_options(level: i64) -> SimpleFileOptions {
    match clamp_level(level) {
        0 => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        level => SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level)),
    }
}

// Entries of 4 GiB and more need zip64 headers, which must be requested
// before the entry is written.
fn entry_options(options: SimpleFileOptions, len: u64) -> SimpleFileOptions {
    options.large_file(len >= u64::from(u32::MAX))
}

fn zip_err(dest: &Path, e: zip::result::ZipError) -> Error {
    let source = match e {
        zip::result::ZipError::Io(e) => e,
        other => std::io::Error::other(other),
    };
    Error::archive_io(dest, source)
}

// Entry names inside the archive always use '/' separators.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_archive(source: &Path, dest: &Path, level: i64) -> Result<()> {
    let metadata = std::fs::metadata(source).map_err(|e| Error::archive_io(source, e))?;
    let out = File::create(dest).map_err(|e| Error::archive_io(dest, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = file_options(level);

    if metadata.is_dir() {
        for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(source).to_owned();
                Error::archive_io(path, e.into())
            })?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| Error::archive_io(entry.path(), std::io::Error::other(e)))?;
            let name = entry_name(relative);
            if entry.file_type().is_dir() {
                zip.add_directory(name, options)
                    .map_err(|e| zip_err(dest, e))?;
            } else if entry.file_type().is_file() {
                add_file(&mut zip, entry.path(), name, options, dest)?;
            }
        }
    } else {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::archive_io(source, std::io::Error::other("source has no file name"))
            })?;
        add_file(&mut zip, source, name, options, dest)?;
    }

    let mut out = zip.finish().map_err(|e| zip_err(dest, e))?;
    out.flush().map_err(|e| Error::archive_io(dest, e))?;
    out.get_ref()
        .sync_all()
        .map_err(|e| Error::archive_io(dest, e))?;
    Ok(())
}

fn add_file<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    name: String,
    options: SimpleFileOptions,
    dest: &Path,
) -> Result<()> {
    let mut input = File::open(path).map_err(|e| Error::archive_io(path, e))?;
    let len = input
        .metadata()
        .map_err(|e| Error::archive_io(path, e))?
        .len();
    debug!(?path, %name, len, "adding to archive");
    zip.start_file(name, entry_options(options, len))
        .map_err(|e| zip_err(dest, e))?;
    std::io::copy(&mut input, zip).map_err(|e| Error::archive_io(dest, e))?;
    Ok(())
}

/// Writes `source` (a directory or a single file) into a zip archive at `dest`.
///
/// `level` is clamped to 0..=9; 0 stores entries uncompressed. On error the
/// content of `dest` is unspecified and should be removed by the caller.
pub async fn archive(source: impl Into<PathBuf>, dest: impl Into<PathBuf>, level: i64) -> Result<()> {
    let source = source.into();
    let dest = dest.into();
    let level = clamp_level(level);
    info!(?source, ?dest, level, "creating archive");
    let dest_for_err = dest.clone();
    tokio::task::spawn_blocking(move || write_archive(&source, &dest, level))
        .await
        .map_err(|e| Error::archive_io(dest_for_err, std::io::Error::other(e)))?
}
