//! Atomic output writes.
//!
//! Bytes go to a temp file next to the target, then the temp file is
//! renamed over it. A failure at any point drops the temp file and leaves
//! whatever was at the target before.

use super::error::WriteError;
use std::{
    fs::{self, File},
    io::{self, Write},
    path::Path,
};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Target already held these bytes.
    Unchanged,
}

/// Write `bytes` to `target` unless it already holds them.
pub fn write_output(target: &Path, bytes: &[u8]) -> Result<WriteOutcome, WriteError> {
    if fs::read(target).is_ok_and(|existing| existing == bytes) {
        return Ok(WriteOutcome::Unchanged);
    }
    write_with(target, |file| file.write_all(bytes))?;
    Ok(WriteOutcome::Written)
}

/// Atomically replace `target` with whatever `fill` writes.
pub fn write_with(
    target: &Path,
    fill: impl FnOnce(&mut File) -> io::Result<()>,
) -> Result<(), WriteError> {
    let error = |source| WriteError {
        dest: target.to_path_buf(),
        source,
    };

    let parent = target
        .parent()
        .ok_or_else(|| error(io::Error::other("destination has no parent directory")))?;
    fs::create_dir_all(parent).map_err(error)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(error)?;
    fill(tmp.as_file_mut()).map_err(error)?;
    tmp.as_file_mut().flush().map_err(error)?;

    // Temp files are created private; published files are not.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(error)?;
    }

    tmp.persist(target).map_err(|e| error(e.error))?;
    Ok(())
}

/// Delete a published file and any directories it leaves empty, up to `root`.
pub fn remove_output(root: &Path, target: &Path) -> io::Result<()> {
    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    }
    let mut dir = target.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) || fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
    Ok(())
}
