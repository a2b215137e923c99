//! Input validation and sanitization for path-bearing parameters.

use std::path::{Path, PathBuf};

use seqgen_models::{JobId, MAX_SHOTS};
use uuid::Uuid;

/// Maximum length of a sanitized upload file name.
const MAX_FILENAME_LENGTH: usize = 128;

/// Reduce an uploaded file name to a safe ASCII basename.
///
/// Path components are dropped, whitespace becomes `_`, and anything outside
/// `[A-Za-z0-9._-]` is removed. Leading dots are stripped so the result is
/// never hidden or a traversal segment. Returns `None` if nothing is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    let trimmed = cleaned.trim_start_matches('.').trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    let mut result: String = trimmed.chars().take(MAX_FILENAME_LENGTH).collect();
    if result.ends_with('.') {
        result = result.trim_end_matches('.').to_string();
    }
    Some(result)
}

/// Where an upload is stored until its job finishes.
///
/// The prefix is an MD5 digest of a per-upload nonce and the name, so two
/// uploads of the same file never share a path.
pub fn upload_path(temp_dir: &Path, original_name: &str) -> Option<PathBuf> {
    let name = sanitize_filename(original_name)?;
    let digest = md5::compute(format!("{}:{}", Uuid::new_v4(), name));
    Some(temp_dir.join(format!("{:x}_{}", digest, name)))
}

/// Validate a sequence/job identifier used as a directory name.
pub fn is_valid_sequence_id(id: &str) -> bool {
    JobId::is_valid(id) && !id.contains("..")
}

/// Validate a shot number path segment.
pub fn parse_shot_number(raw: &str) -> Option<u8> {
    raw.parse::<u8>()
        .ok()
        .filter(|n| (1..=MAX_SHOTS as u8).contains(n))
}

/// Validate a remote video identifier.
///
/// Valid format: alphanumerics, `_` and `-`, 1-128 chars.
pub fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
