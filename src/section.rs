//! Shared markdown section editor.
//!
//! One splice primitive used by every routing rule: locate a section header
//! line, insert new content directly under it (most-recent-first within the
//! section), creating the file or the section when absent. The editor never
//! deduplicates — suppressing duplicate processing is the dedup store's job.

use std::path::Path;

use tokio::fs;

/// Insert `content` under the line exactly equal to `header`.
///
/// - File missing: create it with a derived title, the header, and the
///   content.
/// - Header found: insert content as the line immediately after it.
/// - Header absent: append a blank separator, the header, then the content
///   at end-of-file.
pub async fn insert_into_section(
    path: &Path,
    header: &str,
    content: &str,
) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    if !path.exists() {
        let title = title_from_path(path);
        let text = format!("# {title}\n\n{header}\n{content}\n");
        fs::write(path, text).await?;
        return Ok(());
    }

    let text = fs::read_to_string(path).await?;
    let mut lines: Vec<&str> = text.split('\n').collect();

    match lines.iter().position(|line| line.trim() == header) {
        Some(idx) => lines.insert(idx + 1, content),
        None => {
            lines.push("");
            lines.push(header);
            lines.push(content);
        }
    }

    fs::write(path, lines.join("\n")).await?;
    Ok(())
}

/// Title-cased file stem, used when creating a file from scratch.
fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Notes");
    title_case(stem)
}

/// Capitalize the first letter of every alphabetic run.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

/// Filesystem-safe slug: lowercase, strip characters outside
/// `[word, space, hyphen]`, collapse space/hyphen runs to a single `-`,
/// trim leading/trailing hyphens.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_sep = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '_' {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_sep = true;
        }
        // Everything else is stripped outright.
    }
    out
}
