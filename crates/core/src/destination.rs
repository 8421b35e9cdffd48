use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Bytes per megabyte used for size comparisons.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Whole megabytes, rounded down.
pub fn size_mb(bytes: u64) -> u64 {
    bytes / BYTES_PER_MB
}

/// Directory name for a station under the log base directory.
///
/// Station names may contain `/` (e.g. `XAFS/XRF`), so we flatten to a
/// single path component by replacing `/` with `__`.
pub fn station_dir(station: &str) -> String {
    station.replace('/', "__")
}

/// Local destination for a pulled file:
/// `{base_dir}/{station}/{stem}_{YYYYMMDD_HHMMSS}{ext}`.
pub fn destination_path(
    base_dir: &Path,
    station: &str,
    remote_path: &str,
    at: &NaiveDateTime,
) -> PathBuf {
    base_dir
        .join(station_dir(station))
        .join(stamped_file_name(remote_path, at))
}

/// `{stem}_{YYYYMMDD_HHMMSS}{ext}` for the last component of `remote_path`.
pub fn stamped_file_name(remote_path: &str, at: &NaiveDateTime) -> String {
    let file_name = remote_path
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(remote_path);
    let (stem, ext) = split_ext(file_name);
    format!("{stem}_{}{ext}", at.format("%Y%m%d_%H%M%S"))
}

/// Split at the last dot; leading dots belong to the stem (`.bashrc` has no extension).
fn split_ext(file_name: &str) -> (&str, &str) {
    let leading = file_name.len() - file_name.trim_start_matches('.').len();
    match file_name[leading..].rfind('.') {
        Some(idx) => file_name.split_at(leading + idx),
        None => (file_name, ""),
    }
}
