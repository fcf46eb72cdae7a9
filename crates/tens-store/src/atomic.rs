//! Temp-file-then-rename writes.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::{Builder, TempDir};

use crate::layout::STAGING_PREFIX;

/// Writes `bytes` to `dir/name` through a temp file in the same directory.
///
/// Readers see either the previous file or the complete new one.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8], sync: bool) -> io::Result<()> {
    let mut file = Builder::new().prefix(STAGING_PREFIX).tempfile_in(dir)?;
    file.write_all(bytes)?;
    if sync {
        file.as_file().sync_all()?;
    }
    file.persist(dir.join(name)).map_err(|e| e.error)?;
    if sync {
        sync_dir(dir)?;
    }
    Ok(())
}

/// Writes `bytes` to a new file that is not yet visible under its final name.
pub fn write_new(path: &Path, bytes: &[u8], sync: bool) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    if sync {
        file.sync_all()?;
    }
    Ok(())
}

/// Creates a staging directory inside `parent`.
///
/// The directory is removed on drop unless it was renamed away first.
pub fn staging_dir(parent: &Path) -> io::Result<TempDir> {
    Builder::new().prefix(STAGING_PREFIX).tempdir_in(parent)
}

/// Flushes directory entries (renames) to disk.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Directory handles cannot be synced on this platform.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
