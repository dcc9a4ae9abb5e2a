use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::errors::Result;

/// Append `file_name` to the marked-items log unless it is already listed.
/// Returns whether a line was written.
pub fn mark(log_path: &Path, file_name: &str) -> Result<bool> {
    let existing = if log_path.exists() {
        fs::read_to_string(log_path)?
    } else {
        String::new()
    };

    if existing.lines().any(|line| line == file_name) {
        log::debug!("{} is already marked", file_name);
        return Ok(false);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{}", file_name)?;

    log::info!("Marked {} in {}", file_name, log_path.display());
    Ok(true)
}
