//! On-disk archive of generated newsletters.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SourceError;
use crate::html::strip_tags;

const FILE_PREFIX: &str = "newsletter_";
const FILE_SUFFIX: &str = ".html";

fn ensure_dir(dir: &Path) -> Result<(), SourceError> {
    fs::create_dir_all(dir).map_err(|e| SourceError::io(dir, e))
}

/// Archive file name for a date label: spaces become `_`, commas are dropped.
pub fn newsletter_file_name(date: &str) -> String {
    format!(
        "{FILE_PREFIX}{}{FILE_SUFFIX}",
        date.replace(' ', "_").replace(',', "")
    )
}

/// Writes a newsletter into `dir` (created if needed) and returns its path.
pub fn save_newsletter(dir: &Path, html: &str, date: &str) -> Result<PathBuf, SourceError> {
    ensure_dir(dir)?;
    let path = dir.join(newsletter_file_name(date));
    fs::write(&path, html).map_err(|e| SourceError::io(&path, e))?;
    debug!(event = "archive.saved", path = %path.display(), bytes = html.len(), "newsletter saved");
    Ok(path)
}

/// Archived newsletters sorted by file name, reference copies excluded.
pub fn list_newsletters(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    ensure_dir(dir)?;
    let entries = fs::read_dir(dir).map_err(|e| SourceError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SourceError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(FILE_PREFIX)
            && name.ends_with(FILE_SUFFIX)
            && !name.contains("reference")
            && entry.path().is_file()
        {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Renders the last `n` archived newsletters as plain text inside a
/// `<recent_newsletters>` block.
pub fn load_recent_newsletters_for_prompt(dir: &Path, n: usize) -> Result<String, SourceError> {
    let files = list_newsletters(dir)?;
    let recent = &files[files.len().saturating_sub(n)..];

    let mut lines = vec!["<recent_newsletters>".to_string()];
    if recent.is_empty() {
        lines.push("<none>No prior newsletters saved.</none>".to_string());
        lines.push("</recent_newsletters>".to_string());
        return Ok(lines.join("\n"));
    }
    for path in recent {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let date = file_name
            .trim_start_matches(FILE_PREFIX)
            .trim_end_matches(FILE_SUFFIX);
        let html = fs::read_to_string(path).map_err(|e| SourceError::io(path, e))?;
        let text = strip_tags(&html);
        lines.push(format!("\n<newsletter date=\"{date}\" filename=\"{file_name}\">"));
        if text.is_empty() {
            lines.push("<text>No content available.</text>".to_string());
        } else {
            lines.push(format!("<text>\n{text}\n</text>"));
        }
        lines.push("</newsletter>".to_string());
    }
    lines.push("\n</recent_newsletters>".to_string());
    Ok(lines.join("\n"))
}

/// Full HTML of the reference newsletter, or an empty string when none is
/// configured or the file does not exist.
pub fn load_reference_newsletter(dir: &Path, file_name: &str) -> Result<String, SourceError> {
    if file_name.trim().is_empty() {
        return Ok(String::new());
    }
    let path = dir.join(file_name);
    if !path.is_file() {
        return Ok(String::new());
    }
    fs::read_to_string(&path).map_err(|e| SourceError::io(&path, e))
}
