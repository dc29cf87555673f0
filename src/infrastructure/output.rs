//! Export file output.
//!
//! Files are rendered into a temporary file next to the destination and
//! renamed into place only once complete, so an interrupted export never
//! leaves a truncated file behind.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::domain::{AppError, Result};

/// Destination meaning "standard output".
pub const STDOUT_PATH: &str = "-";

/// Renders into `path` atomically, or to stdout when `path` is `-`.
///
/// # Errors
/// Returns `OutputWrite` if the destination cannot be written, or whatever
/// error `render` returns, with the destination filled into write errors.
/// In both cases the destination is left untouched.
pub fn write_output<F>(path: &Path, render: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    if path.as_os_str() == STDOUT_PATH {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        render(&mut lock).map_err(|e| e.with_output_path(path))?;
        return lock.flush().map_err(|e| AppError::output(path, e));
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AppError::output(path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        render(&mut writer).map_err(|e| e.with_output_path(path))?;
        writer.flush().map_err(|e| AppError::output(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| AppError::output(path, e))?;
    tmp.persist(path)
        .map_err(|e| AppError::output(path, e.error))?;

    tracing::info!(path = %path.display(), "Export written");

    Ok(())
}
