//! Log destination resolution.
//!
//! Opens a log file for append, creating its parent directory on demand.
//! There is exactly one retry: after the directory is created the open is
//! attempted once more, and any failure from then on is fatal.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};

use tracing::info;

use crate::error::Error;

/// Mode for newly created log files, before umask.
pub const FILE_MODE: u32 = 0o666;

/// Mode for newly created log directories, before umask.
pub const DIR_MODE: u32 = 0o777;

/// Opens `path` for create+append.
///
/// A missing parent directory is created (recursively) and the open retried
/// once. Directory creation tolerates concurrent creators.
///
/// # Errors
///
/// [`Error::LogDirectory`] when the directory cannot be created,
/// [`Error::LogFile`] for any other open failure. Both are fatal.
pub fn resolve(path: &Path) -> Result<File, Error> {
    let log_file_error = |source: io::Error| Error::LogFile { path: path.to_path_buf(), source };

    match open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let parent = path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            info!(dir = %parent.display(), "log directory does not exist, creating it");
            create_dir(parent)
                .map_err(|source| Error::LogDirectory { path: parent.to_path_buf(), source })?;
            open(path).map_err(log_file_error)
        }
        Err(e) => Err(log_file_error(e)),
    }
}

fn open(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);
    options.open(path)
}

// `recursive(true)` treats an already existing directory as success.
fn create_dir(dir: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);
    builder.create(dir)
}
