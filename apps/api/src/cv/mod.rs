pub mod handlers;

use crate::errors::AppError;
use crate::extraction::FileKind;

/// Synchronous upload checks, run before anything is stored or enqueued.
pub fn validate_upload(filename: &str, size: usize, max_bytes: usize) -> Result<FileKind, AppError> {
    if filename.trim().is_empty() {
        return Err(AppError::InvalidInput("file name is missing".to_string()));
    }
    let kind = FileKind::from_filename(filename)?;
    if size == 0 {
        return Err(AppError::InvalidInput("file is empty".to_string()));
    }
    if size > max_bytes {
        return Err(AppError::InvalidInput(format!(
            "file is {size} bytes; the limit is {max_bytes} bytes"
        )));
    }
    Ok(kind)
}
