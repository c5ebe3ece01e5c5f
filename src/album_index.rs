//! Grouping of discovered audio files into (artist, album) entries.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::metadata_tags::{self, AlbumTags};

/// One album aggregated from discovered files.
#[derive(Debug, Clone)]
pub struct Album {
    pub artist: String,
    pub album: String,
    /// Parent directory of the first file seen for this album.
    pub folder: PathBuf,
    /// Member files in discovery order.
    pub files: Vec<PathBuf>,
}

impl Album {
    /// Display label used by the console surface.
    pub fn label(&self) -> String {
        format!("{} - {}", self.artist, self.album)
    }
}

/// Groups already-tagged files by their exact (artist, album) pair.
/// The key is case-sensitive: albums differing only in case stay distinct.
pub fn group_tagged_files(tagged_files: Vec<(PathBuf, AlbumTags)>) -> Vec<Album> {
    let mut albums: BTreeMap<(String, String), Album> = BTreeMap::new();

    for (file, tags) in tagged_files {
        let key = (tags.artist.clone(), tags.album.clone());
        match albums.entry(key) {
            Entry::Vacant(vacant) => {
                let folder = file
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                vacant.insert(Album {
                    artist: tags.artist,
                    album: tags.album,
                    folder,
                    files: vec![file],
                });
            }
            Entry::Occupied(mut occupied) => occupied.get_mut().files.push(file),
        }
    }

    albums.into_values().collect()
}

/// Reads grouping tags for every file and groups the readable ones.
/// Files without usable artist/album tags are skipped.
pub fn group_files_into_albums(files: &[PathBuf]) -> Vec<Album> {
    let mut tagged_files = Vec::with_capacity(files.len());
    for file in files {
        match metadata_tags::read_album_tags(file) {
            Some(tags) => tagged_files.push((file.clone(), tags)),
            None => {
                debug!("Skipping {} without artist/album tags", file.display());
            }
        }
    }
    group_tagged_files(tagged_files)
}
