//! Downloaded items and their archives on disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{Error, Result, archive::archive};

pub const ARCHIVE_EXTENSION: &str = "zip";

/// A name is usable only if it refers to an entry directly inside a root.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[derive(Debug, Clone)]
pub struct Library {
    download_dir: PathBuf,
    archive_dir: PathBuf,
}

impl Library {
    pub fn new(download_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            archive_dir: archive_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Creates both roots if missing.
    pub async fn prepare(&self) -> Result<()> {
        for dir in [&self.download_dir, &self.archive_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| Error::io(dir, e))?;
        }
        Ok(())
    }

    pub async fn list_downloaded(&self) -> Result<Vec<String>> {
        list_dir(&self.download_dir).await
    }

    pub async fn list_archives(&self) -> Result<Vec<String>> {
        let mut names = list_dir(&self.archive_dir).await?;
        names.retain(|n| {
            Path::new(n).extension().and_then(|e| e.to_str()) == Some(ARCHIVE_EXTENSION)
        });
        Ok(names)
    }

    pub fn downloaded_path(&self, name: &str) -> Option<PathBuf> {
        is_plain_name(name).then(|| self.download_dir.join(name))
    }

    /// Path of an existing archive file directly under the archive root.
    pub async fn archive_path(&self, file_name: &str) -> Option<PathBuf> {
        if !is_plain_name(file_name) {
            return None;
        }
        let path = self.archive_dir.join(file_name);
        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => Some(path),
            _ => None,
        }
    }

    pub async fn delete_downloaded(&self, name: &str) -> Result<()> {
        let path = self
            .downloaded_path(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        remove_any(&path, name).await?;
        info!(?path, "deleted downloaded item");
        Ok(())
    }

    pub async fn delete_archive(&self, file_name: &str) -> Result<()> {
        let path = self
            .archive_path(file_name)
            .await
            .ok_or_else(|| Error::NotFound(file_name.to_owned()))?;
        remove_any(&path, file_name).await?;
        info!(?path, "deleted archive");
        Ok(())
    }

    /// Removes everything under both roots and recreates them empty.
    pub async fn clean(&self) -> Result<()> {
        for dir in [&self.download_dir, &self.archive_dir] {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(dir, e)),
            }
            debug!(?dir, "cleaned");
        }
        self.prepare().await
    }

    /// Archives the downloaded item `name` into `<archive_dir>/<name>.zip` and
    /// returns the archive path. A failed attempt leaves no archive behind.
    pub async fn archive_item(&self, name: &str, level: i64) -> Result<PathBuf> {
        let source = self
            .downloaded_path(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;
        if tokio::fs::symlink_metadata(&source).await.is_err() {
            return Err(Error::NotFound(name.to_owned()));
        }
        tokio::fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(|e| Error::archive_io(&self.archive_dir, e))?;

        let dest = self
            .archive_dir
            .join(format!("{name}.{ARCHIVE_EXTENSION}"));
        if let Err(e) = archive(&source, &dest, level).await {
            if let Err(rm) = tokio::fs::remove_file(&dest).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(?dest, "error removing partial archive: {rm:#}");
                }
            }
            return Err(e);
        }
        Ok(dest)
    }
}

async fn list_dir(dir: &Path) -> Result<Vec<String>> {
    let mut rd = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(dir, e)),
    };
    let mut names = Vec::new();
    while let Some(entry) = rd.next_entry().await.map_err(|e| Error::io(dir, e))? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

async fn remove_any(path: &Path, name: &str) -> Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(name.to_owned()));
        }
        Err(e) => return Err(Error::io(path, e)),
    };
    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    result.map_err(|e| Error::io(path, e))
}
