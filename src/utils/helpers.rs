/// Helper utilities for paths, names and display

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Create the directory (and parents) when it does not exist yet.
/// An empty path means the current directory and is left alone.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// `<dir>/<database><extension>`
///
/// The extension is appended rather than substituted so that dotted
/// database names keep their full stem.
pub fn artifact_path(dir: &Path, database: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}{}", database, extension))
}

/// Database name for a dump file name, `None` when the extension does not match.
/// The comparison is exact so the name maps back to the same file on
/// case-sensitive filesystems.
pub fn database_name_from_file(file_name: &str, extension: &str) -> Option<String> {
    if file_name.len() <= extension.len() {
        return None;
    }
    let split = file_name.len() - extension.len();
    if !file_name.is_char_boundary(split) {
        return None;
    }
    let (stem, ext) = file_name.split_at(split);
    (ext == extension).then(|| stem.to_string())
}

/// Blank or whitespace-only names are rejected everywhere a name is required
pub fn is_blank(name: &str) -> bool {
    name.trim().is_empty()
}

/// Format duration to human-readable string
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else if seconds > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
