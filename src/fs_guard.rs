use std::{fs, io, path::Path};

/// Reads a file after verifying it is not a symlink and is within `max_bytes`.
///
/// NOTE: narrow TOCTOU window between `symlink_metadata()` and `fs::read()`.
/// The check still catches accidental symlinks and oversized inputs.
pub fn read_validated(path: &Path, max_bytes: u64) -> io::Result<Vec<u8>> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to read symlink",
        ));
    }
    if meta.len() > max_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("file too large ({} bytes, max {max_bytes} bytes)", meta.len()),
        ));
    }
    fs::read(path)
}
