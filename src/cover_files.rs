//! Sidecar cover-file conventions inside an album folder.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

/// Recognized sidecar cover names, in priority order.
pub const COVER_FILE_NAMES: [&str; 12] = [
    "cover.jpg",
    "cover.png",
    "folder.jpg",
    "folder.png",
    "album.jpg",
    "album.png",
    "front.jpg",
    "front.png",
    "artwork.jpg",
    "artwork.png",
    "albumart.jpg",
    "albumart.png",
];

/// Name given to covers this tool writes itself.
pub const DOWNLOADED_COVER_NAME: &str = "cover.jpg";

/// Returns the first recognized cover file present in `folder`.
pub fn find_existing_cover(folder: &Path) -> Option<PathBuf> {
    COVER_FILE_NAMES
        .iter()
        .map(|name| folder.join(name))
        .find(|candidate| candidate.is_file())
}

/// Writes downloaded cover bytes to `folder/cover.jpg` via a temp file
/// so a partial download never lands under a recognized name.
pub fn save_cover(folder: &Path, bytes: &[u8]) -> Result<PathBuf, String> {
    let target_path = folder.join(DOWNLOADED_COVER_NAME);
    let temp_path = target_path.with_extension("jpg.tmp");

    if temp_path.exists() {
        let _ = fs::remove_file(&temp_path);
    }
    fs::write(&temp_path, bytes)
        .map_err(|error| format!("Failed to write {}: {error}", temp_path.display()))?;
    fs::rename(&temp_path, &target_path)
        .map_err(|error| format!("Failed to move cover into {}: {error}", target_path.display()))?;

    debug!("Saved cover to {}", target_path.display());
    Ok(target_path)
}

/// File stem safe for any filesystem. Path separators and other reserved
/// characters become underscores, and an unusable stem falls back to "cover".
pub fn sanitize_file_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|character| match character {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            character if character.is_control() => '_',
            character => character,
        })
        .collect();
    let trimmed = cleaned.trim().trim_end_matches('.').trim();
    if trimmed.is_empty() {
        "cover".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Target path for an extracted embedded cover, extension matched to MIME.
pub fn extract_target_path(folder: &Path, stem: &str, mime_type: &str) -> PathBuf {
    let extension = if mime_type == "image/png" { "png" } else { "jpg" };
    folder.join(format!("{}.{extension}", sanitize_file_stem(stem)))
}

pub fn delete_cover(cover_path: &Path) -> Result<(), String> {
    fs::remove_file(cover_path)
        .map_err(|error| format!("Failed to delete {}: {error}", cover_path.display()))
}
