//! Tag and cover-art readers backed by `lofty` with a `symphonia` fallback.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use lofty::config::{ParseOptions, ParsingMode};
use lofty::file::TaggedFile;
use lofty::file::TaggedFileExt;
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::tag::Tag;
use log::{debug, warn};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey, StandardVisualKey};
use symphonia::core::probe::Hint;

use crate::image_pipeline::sniff_image_mime;

/// Grouping fields read from a file's tags. Both are non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumTags {
    pub artist: String,
    pub album: String,
}

/// One embedded picture with its resolved MIME type.
#[derive(Debug, Clone)]
pub struct EmbeddedCover {
    pub data: Vec<u8>,
    pub mime_type: String,
}

fn first_non_empty_value<F>(primary_tag: Option<&Tag>, tags: &[Tag], mut extractor: F) -> String
where
    F: FnMut(&Tag) -> Option<String>,
{
    if let Some(tag) = primary_tag {
        if let Some(value) = extractor(tag) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    for tag in tags {
        if let Some(value) = extractor(tag) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    String::new()
}

pub(crate) fn tag_parse_options(
    read_cover_art: bool,
    parsing_mode: ParsingMode,
    max_junk_bytes: usize,
) -> ParseOptions {
    ParseOptions::new()
        .read_properties(false)
        .read_cover_art(read_cover_art)
        .parsing_mode(parsing_mode)
        .max_junk_bytes(max_junk_bytes)
}

fn read_tagged_file(path: &Path, read_cover_art: bool) -> Option<TaggedFile> {
    let primary_options = tag_parse_options(read_cover_art, ParsingMode::BestAttempt, 1024);
    let relaxed_options = tag_parse_options(read_cover_art, ParsingMode::Relaxed, 64 * 1024);

    match Probe::open(path) {
        Ok(probe) => match probe.options(primary_options).read() {
            Ok(tagged_file) => return Some(tagged_file),
            Err(primary_error) => {
                debug!(
                    "Tag read primary parse failed for {}: {}",
                    path.display(),
                    primary_error
                );
            }
        },
        Err(open_error) => {
            debug!(
                "Tag read could not open {} with extension-based probe: {}",
                path.display(),
                open_error
            );
        }
    }

    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) => {
            debug!(
                "Tag read failed for {} while preparing relaxed/content-based fallback: {}",
                path.display(),
                error
            );
            return None;
        }
    };

    let guessed_probe = match Probe::new(BufReader::new(file))
        .options(relaxed_options)
        .guess_file_type()
    {
        Ok(probe) => probe,
        Err(error) => {
            debug!(
                "Tag read failed for {} while guessing file type from content: {}",
                path.display(),
                error
            );
            return None;
        }
    };

    match guessed_probe.read() {
        Ok(tagged_file) => {
            debug!(
                "Tag read recovered via relaxed/content-based parsing for {}",
                path.display()
            );
            Some(tagged_file)
        }
        Err(error) => {
            debug!(
                "Tag read failed for {} after relaxed/content-based fallback: {}",
                path.display(),
                error
            );
            None
        }
    }
}

fn build_album_tags(artist: String, album: String) -> Option<AlbumTags> {
    if artist.is_empty() || album.is_empty() {
        return None;
    }
    Some(AlbumTags { artist, album })
}

fn read_album_tags_with_lofty(path: &Path) -> Option<AlbumTags> {
    let tagged_file = read_tagged_file(path, false)?;
    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();

    let artist = first_non_empty_value(primary_tag, tags, |tag| {
        tag.artist().map(|value| value.into_owned())
    });
    let album = first_non_empty_value(primary_tag, tags, |tag| {
        tag.album().map(|value| value.into_owned())
    });

    build_album_tags(artist, album)
}

fn open_symphonia_probe(path: &Path) -> Option<symphonia::core::probe::ProbeResult> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()
}

fn set_if_empty(target: &mut String, value: &str) {
    let trimmed = value.trim();
    if target.is_empty() && !trimmed.is_empty() {
        *target = trimmed.to_string();
    }
}

fn apply_symphonia_tag(artist: &mut String, album: &mut String, tag: &symphonia::core::meta::Tag) {
    let value = tag.value.to_string();
    if value.trim().is_empty() {
        return;
    }

    match tag.std_key {
        Some(StandardTagKey::Artist) => {
            set_if_empty(artist, &value);
            return;
        }
        Some(StandardTagKey::Album) => {
            set_if_empty(album, &value);
            return;
        }
        _ => {}
    }

    match tag.key.trim().to_ascii_uppercase().as_str() {
        "TPE1" | "ARTIST" | "\u{a9}ART" => set_if_empty(artist, &value),
        "TALB" | "ALBUM" | "\u{a9}ALB" => set_if_empty(album, &value),
        _ => {}
    }
}

fn apply_symphonia_revision(artist: &mut String, album: &mut String, revision: &MetadataRevision) {
    for tag in revision.tags() {
        apply_symphonia_tag(artist, album, tag);
    }
}

fn read_album_tags_with_symphonia(path: &Path) -> Option<AlbumTags> {
    let mut probed = open_symphonia_probe(path)?;
    let mut artist = String::new();
    let mut album = String::new();

    if let Some(probe_meta) = probed.metadata.get() {
        if let Some(revision) = probe_meta.current() {
            apply_symphonia_revision(&mut artist, &mut album, revision);
        }
    }

    while !probed.format.metadata().is_latest() {
        let _ = probed.format.metadata().pop();
    }
    if let Some(revision) = probed.format.metadata().current() {
        apply_symphonia_revision(&mut artist, &mut album, revision);
    }

    build_album_tags(artist, album)
}

/// Reads the grouping fields from a file's tags.
/// Returns `None` when the file is unreadable or artist/album is missing.
pub fn read_album_tags(path: &Path) -> Option<AlbumTags> {
    if let Some(lofty_tags) = read_album_tags_with_lofty(path) {
        return Some(lofty_tags);
    }

    let symphonia_tags = read_album_tags_with_symphonia(path);
    if symphonia_tags.is_some() {
        debug!(
            "Tag read recovered via symphonia fallback for {}",
            path.display()
        );
    } else {
        warn!(
            "Tag read found no usable artist/album for {}",
            path.display()
        );
    }
    symphonia_tags
}

fn first_visual_data(revision: &MetadataRevision) -> Option<Vec<u8>> {
    revision
        .visuals()
        .iter()
        .find(|visual| {
            matches!(visual.usage, Some(StandardVisualKey::FrontCover)) && !visual.data.is_empty()
        })
        .or_else(|| {
            revision
                .visuals()
                .iter()
                .find(|visual| !visual.data.is_empty())
        })
        .map(|visual| visual.data.to_vec())
}

fn read_embedded_cover_with_lofty(path: &Path) -> Option<EmbeddedCover> {
    let tagged_file = read_tagged_file(path, true)?;
    let primary_tag = tagged_file.primary_tag();
    let tags = tagged_file.tags();

    let picture = primary_tag
        .and_then(|tag| tag.pictures().first())
        .or_else(|| tags.iter().find_map(|tag| tag.pictures().first()))?;

    let data = picture.data().to_vec();
    let mime_type = picture
        .mime_type()
        .map(|mime| mime.as_str().to_string())
        .unwrap_or_else(|| sniff_image_mime(&data).to_string());
    Some(EmbeddedCover { data, mime_type })
}

fn read_embedded_cover_with_symphonia(path: &Path) -> Option<EmbeddedCover> {
    let mut probed = open_symphonia_probe(path)?;

    if let Some(probe_meta) = probed.metadata.get() {
        if let Some(revision) = probe_meta.current() {
            if let Some(data) = first_visual_data(revision) {
                let mime_type = sniff_image_mime(&data).to_string();
                return Some(EmbeddedCover { data, mime_type });
            }
        }
    }

    while !probed.format.metadata().is_latest() {
        let _ = probed.format.metadata().pop();
    }
    if let Some(revision) = probed.format.metadata().current() {
        let data = first_visual_data(revision)?;
        let mime_type = sniff_image_mime(&data).to_string();
        return Some(EmbeddedCover { data, mime_type });
    }

    None
}

/// Reads the first embedded picture from a media file, if present.
/// Containers that record no MIME type get one sniffed from the data.
pub fn read_embedded_cover(path: &Path) -> Option<EmbeddedCover> {
    if let Some(lofty_cover) = read_embedded_cover_with_lofty(path) {
        return Some(lofty_cover);
    }

    let symphonia_cover = read_embedded_cover_with_symphonia(path);
    if symphonia_cover.is_some() {
        debug!(
            "Embedded cover read recovered via symphonia fallback for {}",
            path.display()
        );
    }
    symphonia_cover
}

/// Whether a media file carries any embedded picture.
pub fn has_embedded_cover(path: &Path) -> bool {
    if let Some(tagged_file) = read_tagged_file(path, true) {
        let in_primary = tagged_file
            .primary_tag()
            .is_some_and(|tag| !tag.pictures().is_empty());
        if in_primary || tagged_file.tags().iter().any(|tag| !tag.pictures().is_empty()) {
            return true;
        }
    }

    read_embedded_cover_with_symphonia(path).is_some()
}
