//! Writes cover art into audio file tags and extracts it back out.

use std::fs;
use std::path::{Path, PathBuf};

use lofty::config::{ParsingMode, WriteOptions};
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::Tag;
use log::{debug, warn};

use crate::cover_files::extract_target_path;
use crate::metadata_tags::{read_embedded_cover, tag_parse_options};

const FAILED_FILES_SHOWN: usize = 5;

/// Per-album outcome of writing one cover into every file.
#[derive(Debug, Clone, Default)]
pub struct EmbedReport {
    pub success_count: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl EmbedReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() || self.success_count > 0
    }

    /// One-line outcome for the frontend, naming the first few failed files.
    pub fn render_message(&self) -> String {
        if self.failed.is_empty() {
            return format!(
                "Successfully embedded cover in all {} files",
                self.success_count
            );
        }

        let names: Vec<String> = self
            .failed
            .iter()
            .take(FAILED_FILES_SHOWN)
            .map(|(path, _)| file_display_name(path))
            .collect();
        let mut message = format!(
            "Embedded cover in {} files. Failed for {} files: {}",
            self.success_count,
            self.failed.len(),
            names.join(", ")
        );
        if self.failed.len() > FAILED_FILES_SHOWN {
            message.push_str("...");
        }
        message
    }
}

fn file_display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn mime_type_for_cover_path(cover_path: &Path) -> MimeType {
    let is_png = cover_path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if is_png {
        MimeType::Png
    } else {
        MimeType::Jpeg
    }
}

fn read_tagged_file_for_write(path: &Path) -> Result<TaggedFile, String> {
    Probe::open(path)
        .map_err(|error| format!("Failed to open file: {error}"))?
        .options(tag_parse_options(true, ParsingMode::BestAttempt, 1024))
        .read()
        .map_err(|error| format!("Failed to read tags: {error}"))
}

fn embed_cover_into_file(
    image_data: &[u8],
    mime_type: &MimeType,
    path: &Path,
) -> Result<(), String> {
    let mut tagged_file = read_tagged_file_for_write(path)?;
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }

    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| format!("No writable tag available for {:?}", tag_type))?;

    let picture = Picture::unchecked(image_data.to_vec())
        .pic_type(PictureType::CoverFront)
        .mime_type(mime_type.clone())
        .build();

    // Replace whatever art was there, front cover or otherwise
    while !tag.pictures().is_empty() {
        tag.remove_picture(0);
    }
    tag.push_picture(picture);

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|error| format!("Failed to write tags: {error}"))
}

/// Writes one cover image into every file's tags as the front cover.
/// Files that cannot be written are collected instead of aborting the batch.
pub fn embed_cover_into_files(cover_path: &Path, files: &[PathBuf]) -> Result<EmbedReport, String> {
    let image_data = fs::read(cover_path).map_err(|error| {
        format!(
            "Failed to read cover image {}: {error}",
            cover_path.display()
        )
    })?;
    let mime_type = mime_type_for_cover_path(cover_path);

    let mut report = EmbedReport::default();
    for file in files {
        match embed_cover_into_file(&image_data, &mime_type, file) {
            Ok(()) => {
                debug!("Embedded cover in {}", file.display());
                report.success_count += 1;
            }
            Err(error) => {
                warn!("Cover embed failed for {}: {}", file.display(), error);
                report.failed.push((file.clone(), error));
            }
        }
    }
    Ok(report)
}

/// Copies a file's embedded picture onto disk as `{file_stem}.jpg` or
/// `{file_stem}.png` after its image type. Writes next to the audio file
/// unless an output folder is given.
pub fn extract_embedded_cover(
    audio_path: &Path,
    output_folder: Option<&Path>,
    file_stem: &str,
) -> Result<PathBuf, String> {
    let cover = read_embedded_cover(audio_path)
        .ok_or_else(|| format!("No embedded cover found in {}", audio_path.display()))?;

    let folder = match output_folder {
        Some(folder) => {
            // The target folder may not exist yet when given on the command line.
            fs::create_dir_all(folder)
                .map_err(|error| format!("Failed to create output folder: {error}"))?;
            folder.to_path_buf()
        }
        None => audio_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let target = extract_target_path(&folder, file_stem, &cover.mime_type);

    fs::write(&target, &cover.data)
        .map_err(|error| format!("Failed to write cover art: {error}"))?;
    Ok(target)
}
