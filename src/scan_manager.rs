//! Cover pipeline runtime component.
//!
//! This manager walks the music tree, resolves each album's cover through
//! sidecar probing and the search provider, and serves the embed/extract/
//! remove maintenance requests. It owns all file and network I/O; the
//! console frontend only renders its messages and answers its prompts.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender};

use crate::album_index::{group_files_into_albums, Album};
use crate::config::Config;
use crate::cover_embed::{embed_cover_into_files, extract_embedded_cover};
use crate::cover_files::{delete_cover, find_existing_cover, save_cover};
use crate::cover_search::CoverSearchClient;
use crate::image_pipeline::inspect_image;
use crate::media_file_discovery::collect_audio_files_from_folder;
use crate::metadata_tags::has_embedded_cover;
use crate::protocol::{
    AlbumActionReport, AlbumReport, CoverCandidate, CoverMessage, Message, ScanMessage,
    ScanRequest, ScanSummary,
};

/// Background worker owning the scan pipeline and cover maintenance.
pub struct ScanManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    search_client: CoverSearchClient,
    max_candidates: usize,
    last_request_id: u64,
}

impl ScanManager {
    /// Creates a manager bound to bus channels, with its HTTP client built
    /// from the configured endpoint and timeouts.
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        config: &Config,
    ) -> Self {
        let search_client = CoverSearchClient::new(&config.search, &config.network);
        Self {
            bus_consumer,
            bus_producer,
            search_client,
            max_candidates: config.search.max_candidates as usize,
            last_request_id: 0,
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Scan(ScanMessage::RequestScan(request))) => {
                    self.handle_scan_request(request);
                }
                Ok(Message::Cover(CoverMessage::RequestEmbed { folder })) => {
                    self.handle_embed_request(&folder);
                }
                Ok(Message::Cover(CoverMessage::RequestExtract { folder, output })) => {
                    self.handle_extract_request(&folder, output.as_deref());
                }
                Ok(Message::Cover(CoverMessage::RequestRemove { folder, assume_yes })) => {
                    self.handle_remove_request(&folder, assume_yes);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "ScanManager lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    fn allocate_request_id(&mut self) -> u64 {
        self.last_request_id += 1;
        self.last_request_id
    }

    /// Blocks on the bus until `matcher` recognizes a reply. Returns `None`
    /// only when the bus closed before one arrived.
    fn wait_for_reply<T, F>(&mut self, mut matcher: F) -> Option<T>
    where
        F: FnMut(&Message) -> Option<T>,
    {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => {
                    if let Some(reply) = matcher(&message) {
                        return Some(reply);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "ScanManager lagged on control bus while awaiting a reply, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn load_albums(&self, folder: &Path) -> Result<Vec<Album>, String> {
        if !folder.is_dir() {
            return Err(format!("Music folder not found: {}", folder.display()));
        }
        let files = collect_audio_files_from_folder(folder);
        Ok(group_files_into_albums(&files))
    }

    fn handle_scan_request(&mut self, request: ScanRequest) {
        debug!(
            "ScanManager: scanning {} (auto_select={}, skip_download={})",
            request.folder.display(),
            request.auto_select,
            request.skip_download
        );

        let albums = match self.load_albums(&request.folder) {
            Ok(albums) => albums,
            Err(error) => {
                let _ = self
                    .bus_producer
                    .send(Message::Scan(ScanMessage::ScanFailed(error)));
                return;
            }
        };

        let total = albums.len();
        let _ = self.bus_producer.send(Message::Scan(ScanMessage::ScanStarted {
            folder: request.folder.clone(),
            album_count: total,
        }));

        let mut summary = ScanSummary {
            total_albums: total,
            new_covers: 0,
            albums_with_embedded: 0,
        };

        for (index, album) in albums.into_iter().enumerate() {
            let report = self.process_album(album, request.auto_select, request.skip_download);
            if report.is_new {
                summary.new_covers += 1;
            }
            if !report.files_with_embedded.is_empty() {
                summary.albums_with_embedded += 1;
            }
            let _ = self
                .bus_producer
                .send(Message::Scan(ScanMessage::AlbumReady(report)));
            let _ = self.bus_producer.send(Message::Scan(ScanMessage::Progress {
                processed: index + 1,
                total,
            }));
        }

        let _ = self
            .bus_producer
            .send(Message::Scan(ScanMessage::ScanFinished(summary)));
    }

    fn process_album(&mut self, album: Album, auto_select: bool, skip_download: bool) -> AlbumReport {
        let existing_cover = find_existing_cover(&album.folder);
        let files_with_embedded: Vec<PathBuf> = album
            .files
            .iter()
            .filter(|file| has_embedded_cover(file))
            .cloned()
            .collect();

        let (cover_path, is_new) = match existing_cover {
            Some(path) => (Some(path), false),
            None if skip_download => (None, false),
            None => match self.resolve_cover_online(&album, auto_select) {
                Some(path) => (Some(path), true),
                None => (None, false),
            },
        };

        AlbumReport {
            artist: album.artist,
            album: album.album,
            folder: album.folder,
            cover_path,
            is_new,
            files_with_embedded,
        }
    }

    /// Searches, lets the user pick, downloads, validates, and saves one
    /// album's cover. Every failure degrades to `None` with a warning so the
    /// scan keeps going.
    fn resolve_cover_online(&mut self, album: &Album, auto_select: bool) -> Option<PathBuf> {
        let candidates = match self.search_client.search_album_covers(
            &album.artist,
            &album.album,
            self.max_candidates,
        ) {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!("Cover search failed for {}: {}", album.label(), error);
                return None;
            }
        };
        if candidates.is_empty() {
            debug!("Cover search returned no candidates for {}", album.label());
            return None;
        }

        let choice = if auto_select {
            0
        } else {
            self.request_candidate_choice(album, candidates.clone())?
        };
        let candidate = candidates.get(choice)?;

        let bytes = match self.search_client.download_cover(&candidate.url) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!("Cover download failed for {}: {}", album.label(), error);
                return None;
            }
        };

        // Validate before anything lands in the album folder
        match inspect_image(&bytes) {
            Ok((width, height)) => {
                debug!(
                    "Downloaded cover for {} ({}x{}, {} bytes)",
                    album.label(),
                    width,
                    height,
                    bytes.len()
                );
            }
            Err(error) => {
                warn!("Discarding cover for {}: {}", album.label(), error);
                return None;
            }
        }

        match save_cover(&album.folder, &bytes) {
            Ok(path) => Some(path),
            Err(error) => {
                warn!("Failed to save cover for {}: {}", album.label(), error);
                None
            }
        }
    }

    fn request_candidate_choice(
        &mut self,
        album: &Album,
        candidates: Vec<CoverCandidate>,
    ) -> Option<usize> {
        let request_id = self.allocate_request_id();
        let _ = self
            .bus_producer
            .send(Message::Cover(CoverMessage::SelectionNeeded {
                request_id,
                artist: album.artist.clone(),
                album: album.album.clone(),
                folder: album.folder.clone(),
                candidates,
            }));

        self.wait_for_reply(|message| match message {
            Message::Cover(CoverMessage::SelectionMade {
                request_id: reply_id,
                choice,
            }) if *reply_id == request_id => Some(*choice),
            _ => None,
        })
        .flatten()
    }

    fn handle_embed_request(&mut self, folder: &Path) {
        let albums = match self.load_albums(folder) {
            Ok(albums) => albums,
            Err(error) => {
                let _ = self
                    .bus_producer
                    .send(Message::Scan(ScanMessage::ScanFailed(error)));
                return;
            }
        };

        let mut reports = Vec::with_capacity(albums.len());
        for album in albums {
            let report = match find_existing_cover(&album.folder) {
                Some(cover_path) => match embed_cover_into_files(&cover_path, &album.files) {
                    Ok(embed_report) => AlbumActionReport {
                        artist: album.artist,
                        album: album.album,
                        success: embed_report.is_success(),
                        message: embed_report.render_message(),
                    },
                    Err(error) => AlbumActionReport {
                        artist: album.artist,
                        album: album.album,
                        success: false,
                        message: error,
                    },
                },
                None => AlbumActionReport {
                    artist: album.artist,
                    album: album.album,
                    success: false,
                    message: "No cover available to embed".to_string(),
                },
            };
            reports.push(report);
        }

        let _ = self
            .bus_producer
            .send(Message::Cover(CoverMessage::EmbedFinished { reports }));
    }

    fn handle_extract_request(&mut self, folder: &Path, output: Option<&Path>) {
        let albums = match self.load_albums(folder) {
            Ok(albums) => albums,
            Err(error) => {
                let _ = self
                    .bus_producer
                    .send(Message::Scan(ScanMessage::ScanFailed(error)));
                return;
            }
        };

        let mut reports = Vec::with_capacity(albums.len());
        for album in albums {
            let files_with_embedded: Vec<PathBuf> = album
                .files
                .iter()
                .filter(|file| has_embedded_cover(file))
                .cloned()
                .collect();

            let report = if files_with_embedded.is_empty() {
                AlbumActionReport {
                    artist: album.artist,
                    album: album.album,
                    success: false,
                    message: "No files with embedded covers found".to_string(),
                }
            } else {
                // A shared output folder needs per-album file names
                let file_stem = if output.is_some() {
                    album.label()
                } else {
                    "cover".to_string()
                };
                let source = if files_with_embedded.len() == 1 {
                    Some(files_with_embedded[0].clone())
                } else {
                    self.request_extract_choice(&album, files_with_embedded.clone())
                        .and_then(|index| files_with_embedded.get(index).cloned())
                };

                match source {
                    Some(file) => match extract_embedded_cover(&file, output, &file_stem) {
                        Ok(path) => AlbumActionReport {
                            artist: album.artist,
                            album: album.album,
                            success: true,
                            message: format!("Embedded cover extracted to {}", path.display()),
                        },
                        Err(error) => AlbumActionReport {
                            artist: album.artist,
                            album: album.album,
                            success: false,
                            message: error,
                        },
                    },
                    None => AlbumActionReport {
                        artist: album.artist,
                        album: album.album,
                        success: false,
                        message: "Skipped".to_string(),
                    },
                }
            };
            reports.push(report);
        }

        let _ = self
            .bus_producer
            .send(Message::Cover(CoverMessage::ExtractFinished { reports }));
    }

    fn request_extract_choice(&mut self, album: &Album, files: Vec<PathBuf>) -> Option<usize> {
        let request_id = self.allocate_request_id();
        let _ = self
            .bus_producer
            .send(Message::Cover(CoverMessage::ExtractChoiceNeeded {
                request_id,
                artist: album.artist.clone(),
                album: album.album.clone(),
                files,
            }));

        self.wait_for_reply(|message| match message {
            Message::Cover(CoverMessage::ExtractChoiceMade {
                request_id: reply_id,
                choice,
            }) if *reply_id == request_id => Some(*choice),
            _ => None,
        })
        .flatten()
    }

    fn handle_remove_request(&mut self, folder: &Path, assume_yes: bool) {
        let albums = match self.load_albums(folder) {
            Ok(albums) => albums,
            Err(error) => {
                let _ = self
                    .bus_producer
                    .send(Message::Scan(ScanMessage::ScanFailed(error)));
                return;
            }
        };

        let mut reports = Vec::with_capacity(albums.len());
        for album in albums {
            let report = match find_existing_cover(&album.folder) {
                None => AlbumActionReport {
                    artist: album.artist,
                    album: album.album,
                    success: false,
                    message: "No cover available to delete".to_string(),
                },
                Some(cover_path) => {
                    let confirmed =
                        assume_yes || self.request_remove_confirmation(&album, &cover_path);
                    if !confirmed {
                        AlbumActionReport {
                            artist: album.artist,
                            album: album.album,
                            success: false,
                            message: "Skipped".to_string(),
                        }
                    } else {
                        match delete_cover(&cover_path) {
                            Ok(()) => AlbumActionReport {
                                artist: album.artist,
                                album: album.album,
                                success: true,
                                message: format!("Deleted {}", cover_path.display()),
                            },
                            Err(error) => AlbumActionReport {
                                artist: album.artist,
                                album: album.album,
                                success: false,
                                message: error,
                            },
                        }
                    }
                }
            };
            reports.push(report);
        }

        let _ = self
            .bus_producer
            .send(Message::Cover(CoverMessage::RemoveFinished { reports }));
    }

    fn request_remove_confirmation(&mut self, album: &Album, cover_path: &Path) -> bool {
        let request_id = self.allocate_request_id();
        let _ = self
            .bus_producer
            .send(Message::Cover(CoverMessage::RemoveConfirmationNeeded {
                request_id,
                artist: album.artist.clone(),
                album: album.album.clone(),
                cover_path: cover_path.to_path_buf(),
            }));

        self.wait_for_reply(|message| match message {
            Message::Cover(CoverMessage::RemoveConfirmed {
                request_id: reply_id,
                confirmed,
            }) if *reply_id == request_id => Some(*confirmed),
            _ => None,
        })
        .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::thread;
    use std::time::{SystemTime, UNIX_EPOCH};

    use tokio::sync::broadcast::{self, Receiver, Sender};

    use super::ScanManager;
    use crate::config::Config;
    use crate::metadata_tags::has_embedded_cover;
    use crate::protocol::{CoverMessage, Message, ScanMessage, ScanRequest};

    fn unique_temp_dir(name: &str) -> PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be valid")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("coverscout_{name}_{nonce}"));
        fs::create_dir_all(&dir).expect("should create temp dir");
        dir
    }

    fn id3_text_frame(id: &[u8; 4], text: &str) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(id);
        let payload_len = (text.len() + 1) as u32;
        frame.extend_from_slice(&payload_len.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        // ISO-8859-1 text encoding marker
        frame.push(0x00);
        frame.extend_from_slice(text.as_bytes());
        frame
    }

    fn id3_picture_frame(mime: &str, data: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.push(0x00);
        payload.extend_from_slice(mime.as_bytes());
        payload.push(0x00);
        // Picture type 3 = front cover, empty description
        payload.push(0x03);
        payload.push(0x00);
        payload.extend_from_slice(data);

        let mut frame = Vec::new();
        frame.extend_from_slice(b"APIC");
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&payload);
        frame
    }

    fn write_mp3_fixture(path: &PathBuf, frames: &[Vec<u8>]) {
        let payload_len: usize = frames.iter().map(Vec::len).sum();
        assert!(payload_len < 0x7F, "fixture payload must fit one syncsafe byte");

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[0x49, 0x44, 0x33, 0x03, 0x00, 0x00]);
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, payload_len as u8]);
        for frame in frames {
            bytes.extend_from_slice(frame);
        }
        // Start of an MPEG frame so the probe sees audio content after the tag
        bytes.extend_from_slice(&[
            0xFF, 0xFB, 0x50, 0xC4, 0x00, 0x03, 0xC0, 0x00, 0x01, 0xA4, 0x00, 0x00, 0x00, 0x20,
            0x00, 0x00, 0x34, 0x80, 0x00, 0x00, 0x04,
        ]);

        fs::write(path, bytes).expect("should write mp3 fixture");
    }

    fn write_album_track(folder: &PathBuf, file_name: &str, artist: &str, album: &str) -> PathBuf {
        let path = folder.join(file_name);
        write_mp3_fixture(
            &path,
            &[id3_text_frame(b"TPE1", artist), id3_text_frame(b"TALB", album)],
        );
        path
    }

    fn spawn_manager(bus_sender: &Sender<Message>) -> Receiver<Message> {
        let mut manager = ScanManager::new(
            bus_sender.subscribe(),
            bus_sender.clone(),
            &Config::default(),
        );
        let test_receiver = bus_sender.subscribe();
        thread::spawn(move || manager.run());
        test_receiver
    }

    fn recv_scan_message(receiver: &mut Receiver<Message>) -> ScanMessage {
        loop {
            match receiver.blocking_recv().expect("bus should stay open") {
                Message::Scan(scan_message) => return scan_message,
                Message::Cover(_) => {}
            }
        }
    }

    fn recv_cover_message(receiver: &mut Receiver<Message>) -> CoverMessage {
        loop {
            match receiver.blocking_recv().expect("bus should stay open") {
                Message::Cover(cover_message) => return cover_message,
                Message::Scan(_) => {}
            }
        }
    }

    #[test]
    fn test_scan_reports_existing_cover_without_network() {
        let music_dir = unique_temp_dir("scan_existing");
        let album_dir = music_dir.join("harvest");
        fs::create_dir_all(&album_dir).expect("should create album dir");
        write_album_track(&album_dir, "01.mp3", "Neil Young", "Harvest");
        let cover_path = album_dir.join("cover.jpg");
        fs::write(&cover_path, [0xFF, 0xD8, 0xFF, 0xE0]).expect("should write cover");

        let (bus_sender, _) = broadcast::channel::<Message>(1024);
        let mut receiver = spawn_manager(&bus_sender);
        bus_sender
            .send(Message::Scan(ScanMessage::RequestScan(ScanRequest {
                folder: music_dir.clone(),
                auto_select: false,
                skip_download: false,
            })))
            .expect("send should succeed");

        // Skip the looped-back request, then check the sequence
        loop {
            match recv_scan_message(&mut receiver) {
                ScanMessage::RequestScan(_) => {}
                ScanMessage::ScanStarted { album_count, .. } => {
                    assert_eq!(album_count, 1);
                    break;
                }
                other => panic!("unexpected message before ScanStarted: {other:?}"),
            }
        }

        match recv_scan_message(&mut receiver) {
            ScanMessage::AlbumReady(report) => {
                assert_eq!(report.artist, "Neil Young");
                assert_eq!(report.album, "Harvest");
                assert_eq!(report.cover_path.as_deref(), Some(cover_path.as_path()));
                assert!(!report.is_new);
                assert!(report.files_with_embedded.is_empty());
            }
            other => panic!("expected AlbumReady, got {other:?}"),
        }
        match recv_scan_message(&mut receiver) {
            ScanMessage::Progress { processed, total } => {
                assert_eq!((processed, total), (1, 1));
            }
            other => panic!("expected Progress, got {other:?}"),
        }
        match recv_scan_message(&mut receiver) {
            ScanMessage::ScanFinished(summary) => {
                assert_eq!(summary.total_albums, 1);
                assert_eq!(summary.new_covers, 0);
                assert_eq!(summary.albums_with_embedded, 0);
            }
            other => panic!("expected ScanFinished, got {other:?}"),
        }

        fs::remove_dir_all(music_dir).expect("temp tree should be removable");
    }

    #[test]
    fn test_scan_with_skip_download_counts_embedded_albums() {
        let music_dir = unique_temp_dir("scan_skip_download");
        let album_dir = music_dir.join("dummy");
        fs::create_dir_all(&album_dir).expect("should create album dir");
        let jpeg_stub = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
        let track = album_dir.join("01.mp3");
        write_mp3_fixture(
            &track,
            &[
                id3_text_frame(b"TPE1", "Portishead"),
                id3_text_frame(b"TALB", "Dummy"),
                id3_picture_frame("image/jpeg", &jpeg_stub),
            ],
        );

        let (bus_sender, _) = broadcast::channel::<Message>(1024);
        let mut receiver = spawn_manager(&bus_sender);
        bus_sender
            .send(Message::Scan(ScanMessage::RequestScan(ScanRequest {
                folder: music_dir.clone(),
                auto_select: false,
                skip_download: true,
            })))
            .expect("send should succeed");

        let mut album_seen = false;
        loop {
            match recv_scan_message(&mut receiver) {
                ScanMessage::AlbumReady(report) => {
                    assert!(report.cover_path.is_none());
                    assert!(!report.is_new);
                    assert_eq!(report.files_with_embedded, vec![track.clone()]);
                    album_seen = true;
                }
                ScanMessage::ScanFinished(summary) => {
                    assert_eq!(summary.total_albums, 1);
                    assert_eq!(summary.new_covers, 0);
                    assert_eq!(summary.albums_with_embedded, 1);
                    break;
                }
                _ => {}
            }
        }
        assert!(album_seen, "AlbumReady should precede ScanFinished");

        fs::remove_dir_all(music_dir).expect("temp tree should be removable");
    }

    #[test]
    fn test_scan_of_missing_folder_fails() {
        let missing = std::env::temp_dir().join("coverscout_definitely_missing_folder");

        let (bus_sender, _) = broadcast::channel::<Message>(1024);
        let mut receiver = spawn_manager(&bus_sender);
        bus_sender
            .send(Message::Scan(ScanMessage::RequestScan(ScanRequest {
                folder: missing,
                auto_select: false,
                skip_download: true,
            })))
            .expect("send should succeed");

        loop {
            match recv_scan_message(&mut receiver) {
                ScanMessage::ScanFailed(error) => {
                    assert!(error.contains("Music folder not found"));
                    break;
                }
                ScanMessage::RequestScan(_) => {}
                other => panic!("expected ScanFailed, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_embed_request_round_trip() {
        let music_dir = unique_temp_dir("embed_request");
        let album_dir = music_dir.join("low");
        fs::create_dir_all(&album_dir).expect("should create album dir");
        let track = write_album_track(&album_dir, "01.mp3", "David Bowie", "Low");
        let jpeg_stub = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
        fs::write(album_dir.join("cover.jpg"), jpeg_stub).expect("should write cover");

        let (bus_sender, _) = broadcast::channel::<Message>(1024);
        let mut receiver = spawn_manager(&bus_sender);
        bus_sender
            .send(Message::Cover(CoverMessage::RequestEmbed {
                folder: music_dir.clone(),
            }))
            .expect("send should succeed");

        loop {
            match recv_cover_message(&mut receiver) {
                CoverMessage::EmbedFinished { reports } => {
                    assert_eq!(reports.len(), 1);
                    assert!(reports[0].success, "embed should succeed: {}", reports[0].message);
                    assert_eq!(
                        reports[0].message,
                        "Successfully embedded cover in all 1 files"
                    );
                    break;
                }
                CoverMessage::RequestEmbed { .. } => {}
                other => panic!("expected EmbedFinished, got {other:?}"),
            }
        }
        assert!(has_embedded_cover(&track));

        fs::remove_dir_all(music_dir).expect("temp tree should be removable");
    }

    #[test]
    fn test_remove_request_confirmation_round_trip() {
        let music_dir = unique_temp_dir("remove_request");
        let album_dir = music_dir.join("blue");
        fs::create_dir_all(&album_dir).expect("should create album dir");
        write_album_track(&album_dir, "01.mp3", "Joni Mitchell", "Blue");
        let cover_path = album_dir.join("cover.jpg");
        fs::write(&cover_path, [0xFF, 0xD8, 0xFF, 0xE0]).expect("should write cover");

        let (bus_sender, _) = broadcast::channel::<Message>(1024);
        let mut receiver = spawn_manager(&bus_sender);
        bus_sender
            .send(Message::Cover(CoverMessage::RequestRemove {
                folder: music_dir.clone(),
                assume_yes: false,
            }))
            .expect("send should succeed");

        // Decline the first confirmation; cover must survive
        loop {
            match recv_cover_message(&mut receiver) {
                CoverMessage::RemoveConfirmationNeeded {
                    request_id,
                    cover_path: asked_path,
                    ..
                } => {
                    assert_eq!(asked_path, cover_path);
                    bus_sender
                        .send(Message::Cover(CoverMessage::RemoveConfirmed {
                            request_id,
                            confirmed: false,
                        }))
                        .expect("send should succeed");
                }
                CoverMessage::RemoveFinished { reports } => {
                    assert_eq!(reports.len(), 1);
                    assert!(!reports[0].success);
                    assert_eq!(reports[0].message, "Skipped");
                    break;
                }
                _ => {}
            }
        }
        assert!(cover_path.is_file(), "declined removal must keep the cover");

        // Accept on the second pass
        bus_sender
            .send(Message::Cover(CoverMessage::RequestRemove {
                folder: music_dir.clone(),
                assume_yes: false,
            }))
            .expect("send should succeed");
        loop {
            match recv_cover_message(&mut receiver) {
                CoverMessage::RemoveConfirmationNeeded { request_id, .. } => {
                    bus_sender
                        .send(Message::Cover(CoverMessage::RemoveConfirmed {
                            request_id,
                            confirmed: true,
                        }))
                        .expect("send should succeed");
                }
                CoverMessage::RemoveFinished { reports } => {
                    assert_eq!(reports.len(), 1);
                    assert!(reports[0].success, "removal should succeed: {}", reports[0].message);
                    break;
                }
                _ => {}
            }
        }
        assert!(!cover_path.exists(), "confirmed removal must delete the cover");

        fs::remove_dir_all(music_dir).expect("temp tree should be removable");
    }

    #[test]
    fn test_extract_request_writes_sidecar() {
        let music_dir = unique_temp_dir("extract_request");
        let album_dir = music_dir.join("kid_a");
        fs::create_dir_all(&album_dir).expect("should create album dir");
        let png_stub = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
        ];
        let track = album_dir.join("01.mp3");
        write_mp3_fixture(
            &track,
            &[
                id3_text_frame(b"TPE1", "Radiohead"),
                id3_text_frame(b"TALB", "Kid A"),
                id3_picture_frame("image/png", &png_stub),
            ],
        );

        let (bus_sender, _) = broadcast::channel::<Message>(1024);
        let mut receiver = spawn_manager(&bus_sender);
        bus_sender
            .send(Message::Cover(CoverMessage::RequestExtract {
                folder: music_dir.clone(),
                output: None,
            }))
            .expect("send should succeed");

        loop {
            match recv_cover_message(&mut receiver) {
                CoverMessage::ExtractFinished { reports } => {
                    assert_eq!(reports.len(), 1);
                    assert!(
                        reports[0].success,
                        "extract should succeed: {}",
                        reports[0].message
                    );
                    break;
                }
                CoverMessage::RequestExtract { .. } => {}
                other => panic!("expected ExtractFinished, got {other:?}"),
            }
        }
        let extracted = album_dir.join("cover.png");
        assert_eq!(
            fs::read(&extracted).expect("extracted cover should exist"),
            png_stub
        );

        fs::remove_dir_all(music_dir).expect("temp tree should be removable");
    }

    #[test]
    fn test_extract_into_shared_output_folder_names_files_per_album() {
        let music_dir = unique_temp_dir("extract_shared_output");
        let jpeg_stub = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

        for (dir_name, artist, album) in [
            ("marquee", "Television", "Marquee Moon"),
            ("horses", "Patti Smith", "Horses"),
        ] {
            let album_dir = music_dir.join(dir_name);
            fs::create_dir_all(&album_dir).expect("should create album dir");
            write_mp3_fixture(
                &album_dir.join("01.mp3"),
                &[
                    id3_text_frame(b"TPE1", artist),
                    id3_text_frame(b"TALB", album),
                    id3_picture_frame("image/jpeg", &jpeg_stub),
                ],
            );
        }

        let output_dir = unique_temp_dir("extract_shared_covers");
        let (bus_sender, _) = broadcast::channel::<Message>(1024);
        let mut receiver = spawn_manager(&bus_sender);
        bus_sender
            .send(Message::Cover(CoverMessage::RequestExtract {
                folder: music_dir.clone(),
                output: Some(output_dir.clone()),
            }))
            .expect("send should succeed");

        loop {
            match recv_cover_message(&mut receiver) {
                CoverMessage::ExtractFinished { reports } => {
                    assert_eq!(reports.len(), 2);
                    assert!(reports.iter().all(|report| report.success));
                    break;
                }
                CoverMessage::RequestExtract { .. } => {}
                other => panic!("expected ExtractFinished, got {other:?}"),
            }
        }
        for name in ["Television - Marquee Moon.jpg", "Patti Smith - Horses.jpg"] {
            assert_eq!(
                fs::read(output_dir.join(name)).expect("extracted cover should exist"),
                jpeg_stub
            );
        }

        fs::remove_dir_all(music_dir).expect("temp tree should be removable");
        fs::remove_dir_all(output_dir).expect("output dir should be removable");
    }

    #[test]
    fn test_extract_choice_round_trip() {
        let music_dir = unique_temp_dir("extract_choice");
        let album_dir = music_dir.join("marquee");
        fs::create_dir_all(&album_dir).expect("should create album dir");
        let jpeg_stub = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
        let png_stub = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
        ];
        let first_track = album_dir.join("01.mp3");
        write_mp3_fixture(
            &first_track,
            &[
                id3_text_frame(b"TPE1", "Television"),
                id3_text_frame(b"TALB", "Marquee Moon"),
                id3_picture_frame("image/jpeg", &jpeg_stub),
            ],
        );
        let second_track = album_dir.join("02.mp3");
        write_mp3_fixture(
            &second_track,
            &[
                id3_text_frame(b"TPE1", "Television"),
                id3_text_frame(b"TALB", "Marquee Moon"),
                id3_picture_frame("image/png", &png_stub),
            ],
        );

        let (bus_sender, _) = broadcast::channel::<Message>(1024);
        let mut receiver = spawn_manager(&bus_sender);

        // Skip the album on the first pass; nothing must land on disk
        bus_sender
            .send(Message::Cover(CoverMessage::RequestExtract {
                folder: music_dir.clone(),
                output: None,
            }))
            .expect("send should succeed");
        loop {
            match recv_cover_message(&mut receiver) {
                CoverMessage::ExtractChoiceNeeded {
                    request_id,
                    artist,
                    album,
                    files,
                } => {
                    assert_eq!(artist, "Television");
                    assert_eq!(album, "Marquee Moon");
                    assert_eq!(files, vec![first_track.clone(), second_track.clone()]);
                    bus_sender
                        .send(Message::Cover(CoverMessage::ExtractChoiceMade {
                            request_id,
                            choice: None,
                        }))
                        .expect("send should succeed");
                }
                CoverMessage::ExtractFinished { reports } => {
                    assert_eq!(reports.len(), 1);
                    assert!(!reports[0].success);
                    assert_eq!(reports[0].message, "Skipped");
                    break;
                }
                _ => {}
            }
        }
        assert!(!album_dir.join("cover.jpg").exists());
        assert!(!album_dir.join("cover.png").exists());

        // Pick the second file on the second pass
        bus_sender
            .send(Message::Cover(CoverMessage::RequestExtract {
                folder: music_dir.clone(),
                output: None,
            }))
            .expect("send should succeed");
        loop {
            match recv_cover_message(&mut receiver) {
                CoverMessage::ExtractChoiceNeeded { request_id, .. } => {
                    bus_sender
                        .send(Message::Cover(CoverMessage::ExtractChoiceMade {
                            request_id,
                            choice: Some(1),
                        }))
                        .expect("send should succeed");
                }
                CoverMessage::ExtractFinished { reports } => {
                    assert_eq!(reports.len(), 1);
                    assert!(
                        reports[0].success,
                        "extract should succeed: {}",
                        reports[0].message
                    );
                    break;
                }
                _ => {}
            }
        }
        // The second file carries the png, so the sidecar must be the png
        assert_eq!(
            fs::read(album_dir.join("cover.png")).expect("extracted cover should exist"),
            png_stub
        );
        assert!(!album_dir.join("cover.jpg").exists());

        fs::remove_dir_all(music_dir).expect("temp tree should be removable");
    }
}
