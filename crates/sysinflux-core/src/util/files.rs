//! Pid and secret files.

use std::io;
use std::path::Path;

/// Writes the current process id to `path`, followed by a newline.
pub fn write_pidfile(path: &Path) -> io::Result<()> {
    std::fs::write(path, format!("{}\n", std::process::id()))
}

/// Reads a password from the first line of `path`.
pub fn read_secret(path: &Path) -> io::Result<String> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .next()
        .map(|line| line.trim_end_matches('\r').to_string())
        .unwrap_or_default())
}
