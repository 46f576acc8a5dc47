//! Output-file helpers shared by the CSV adapters.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// `<dir>/<base>.<ext>` if free, else `<dir>/<base>_<i>.<ext>` for the
/// first free `i` starting at 0.
pub fn safe_filename(dir: &Path, base: &str, ext: &str) -> PathBuf {
    let first = dir.join(format!("{base}.{ext}"));
    if !first.exists() {
        return first;
    }
    (0u32..)
        .map(|i| dir.join(format!("{base}_{i}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Create (if needed) and return `<out>/<animal>_<date>/`.
pub fn session_dir(out: &Path, animal: &str, date: &str) -> Result<PathBuf> {
    let dir = out.join(format!("{animal}_{date}"));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Quote a CSV field when it contains a separator, quote or line break.
pub(super) fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}
