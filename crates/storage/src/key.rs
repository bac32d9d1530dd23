//! Object key validation.
//!
//! Keys are always forward-slash separated, regardless of the host platform,
//! and must stay inside the bucket (or local target) root.

use crate::error::{ErrorKind, Result};

/// Validates and normalizes an object key.
///
/// Empty segments and `.` segments are dropped, `..` pops the previous
/// segment. Keys that resolve to nothing, leave the root, or contain null
/// bytes or backslashes are rejected.
///
/// > **Note:** A leading slash is tolerated and stripped; object stores have
/// >           no notion of an absolute key.
///
/// # Examples
///
/// ```
/// use cachet_storage::validate_key;
/// assert_eq!(validate_key("assets/app-1f3870be.js").unwrap(), "assets/app-1f3870be.js");
/// assert_eq!(validate_key("/assets//./css/../app.css").unwrap(), "assets/app.css");
/// assert!(validate_key("../escape").is_err());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate(key: &str) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
            // Backslashes would be read as separators by a local backend on
            // Windows and as literal characters by S3. Refuse to guess.
            s if s.contains('\0') || s.contains('\\') => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
            s => segments.push(s),
        }
    }
    match segments.is_empty() {
        true => exn::bail!(ErrorKind::InvalidKey(key.to_string())),
        false => Ok(segments.join("/")),
    }
}
