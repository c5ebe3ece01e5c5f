//! Event-bus protocol shared by the worker and the console frontend.
//!
//! This module defines all message payloads exchanged between the scan
//! worker, cover maintenance operations, and the console surface.

use std::path::PathBuf;

/// Envelope wrapping every message that travels over the bus.
#[derive(Debug, Clone)]
pub enum Message {
    Scan(ScanMessage),
    Cover(CoverMessage),
}

/// One cover option returned by the search provider.
#[derive(Debug, Clone)]
pub struct CoverCandidate {
    /// Image URL to download.
    pub url: String,
    /// Album title as reported by the provider.
    pub album_title: String,
    /// Artist name as reported by the provider.
    pub artist_name: String,
}

/// Options governing one scan run.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Root folder to walk for audio files.
    pub folder: PathBuf,
    /// Take the first search candidate without prompting.
    pub auto_select: bool,
    /// Never contact the search provider.
    pub skip_download: bool,
}

/// Outcome of one album during a scan.
#[derive(Debug, Clone)]
pub struct AlbumReport {
    pub artist: String,
    pub album: String,
    /// Directory holding the album's files.
    pub folder: PathBuf,
    /// Sidecar cover on disk after processing, if any.
    pub cover_path: Option<PathBuf>,
    /// Whether the cover was downloaded during this scan.
    pub is_new: bool,
    /// Album files that carry embedded art.
    pub files_with_embedded: Vec<PathBuf>,
}

/// Counters shown after a completed scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanSummary {
    pub total_albums: usize,
    pub new_covers: usize,
    pub albums_with_embedded: usize,
}

/// Outcome of one album for embed/extract/remove operations.
#[derive(Debug, Clone)]
pub struct AlbumActionReport {
    pub artist: String,
    pub album: String,
    pub success: bool,
    /// Human-readable result line for the console.
    pub message: String,
}

/// Scan-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum ScanMessage {
    RequestScan(ScanRequest),
    ScanStarted {
        folder: PathBuf,
        album_count: usize,
    },
    AlbumReady(AlbumReport),
    /// Emitted after each album has been processed.
    Progress {
        processed: usize,
        total: usize,
    },
    ScanFailed(String),
    ScanFinished(ScanSummary),
}

/// Cover-maintenance commands and notifications.
#[derive(Debug, Clone)]
pub enum CoverMessage {
    /// Worker asks the frontend to pick among search candidates.
    SelectionNeeded {
        request_id: u64,
        artist: String,
        album: String,
        folder: PathBuf,
        candidates: Vec<CoverCandidate>,
    },
    /// Candidate index chosen by the user, `None` to skip.
    SelectionMade {
        request_id: u64,
        choice: Option<usize>,
    },
    RequestEmbed {
        folder: PathBuf,
    },
    EmbedFinished {
        reports: Vec<AlbumActionReport>,
    },
    RequestExtract {
        folder: PathBuf,
        output: Option<PathBuf>,
    },
    /// Worker asks which file's embedded art to extract when several
    /// files in an album carry one.
    ExtractChoiceNeeded {
        request_id: u64,
        artist: String,
        album: String,
        files: Vec<PathBuf>,
    },
    /// File index chosen by the user, `None` to skip the album.
    ExtractChoiceMade {
        request_id: u64,
        choice: Option<usize>,
    },
    ExtractFinished {
        reports: Vec<AlbumActionReport>,
    },
    RequestRemove {
        folder: PathBuf,
        assume_yes: bool,
    },
    /// Worker asks the frontend to confirm deleting one cover file.
    RemoveConfirmationNeeded {
        request_id: u64,
        artist: String,
        album: String,
        cover_path: PathBuf,
    },
    RemoveConfirmed {
        request_id: u64,
        confirmed: bool,
    },
    RemoveFinished {
        reports: Vec<AlbumActionReport>,
    },
}
