use std::fs::{self, FileTimes};
use std::io;
use std::path::Path;

/// Copy `src` to `dst`, overwriting any existing file, then carry over the
/// source's modification and access times. Permissions come along with
/// `fs::copy` already.
pub fn copy_preserving_times(src: &Path, dst: &Path) -> io::Result<u64> {
    let bytes = fs::copy(src, dst)?;

    let meta = fs::metadata(src)?;
    let mut times = FileTimes::new();
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }

    let file = fs::OpenOptions::new().write(true).open(dst)?;
    file.set_times(times)?;

    Ok(bytes)
}

/// `Path::file_stem` as an owned string ("" when there is none).
pub fn stem_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `Path::extension` with its leading dot ("" when there is none).
pub fn dotted_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}
