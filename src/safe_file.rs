//! Scoped file access.
//!
//! [`with_file`] hands the body either an open handle or `None` when the file
//! could not be opened. The handle is dropped, and therefore closed, on every
//! exit from the body, including a panic unwinding through it.

use std::fs::File;
use std::path::Path;

use tracing::{debug, error, warn};

use crate::error::FileAccessError;

/// Opens `path` read-only, classifying the failure.
pub fn open_scoped(path: &Path) -> Result<File, FileAccessError> {
    let file =
        File::open(path).map_err(|err| FileAccessError::from_io(path.to_path_buf(), err))?;
    debug!(path = %path.display(), "Successfully opened file");
    Ok(file)
}

/// Runs `body` with the opened file, or with `None` if it cannot be opened.
pub fn with_file<R>(path: &Path, body: impl FnOnce(Option<&mut File>) -> R) -> R {
    match open_scoped(path) {
        Ok(mut file) => {
            let out = body(Some(&mut file));
            drop(file);
            debug!(path = %path.display(), "Closed file");
            out
        }
        Err(err) => {
            match &err {
                FileAccessError::NotFound(_) => warn!("{err}"),
                _ => error!("{err}"),
            }
            body(None)
        }
    }
}

/// Reads the whole file as UTF-8 text.
pub fn read_to_string(path: &Path) -> Result<String, FileAccessError> {
    use std::io::Read;

    let mut file = open_scoped(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|err| FileAccessError::from_io(path.to_path_buf(), err))?;
    Ok(contents)
}
