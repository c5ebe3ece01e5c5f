//! Console frontend: renders worker messages and answers its prompts.
//!
//! Runs on the main thread. Scan output mirrors the original album list
//! markers; selection and confirmation prompts read replies from stdin and
//! route them back to the worker over the bus.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender};

use crate::protocol::{
    AlbumActionReport, AlbumReport, CoverCandidate, CoverMessage, Message, ScanMessage,
    ScanSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptChoice {
    Pick(usize),
    Skip,
    Invalid,
}

/// Album list line in the original's marker style.
fn render_album_line(report: &AlbumReport) -> String {
    let base_text = format!("{} - {}", report.artist, report.album);
    let mut line = if report.cover_path.is_none() {
        format!("{base_text} [NO COVER]")
    } else if report.is_new {
        format!("[NEW] {base_text}")
    } else {
        base_text
    };
    if !report.files_with_embedded.is_empty() {
        line.push_str(" [HAS EMBEDDED]");
    }
    line
}

fn render_summary(summary: &ScanSummary) -> String {
    format!(
        "Total Albums: {}\nNew Covers Downloaded: {}\nAlbums with Embedded Covers: {}",
        summary.total_albums, summary.new_covers, summary.albums_with_embedded
    )
}

/// Header of the candidate prompt, naming the album folder the cover
/// would land in.
fn render_selection_header(artist: &str, album: &str, folder: &Path) -> String {
    format!(
        "Select the best cover for \"{artist} - {album}\":\n  Folder: {}",
        folder.display()
    )
}

/// `1..=option_count` picks an option, empty or `s` skips.
fn parse_choice_input(input: &str, option_count: usize) -> PromptChoice {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("s") {
        return PromptChoice::Skip;
    }
    match trimmed.parse::<usize>() {
        Ok(number) if (1..=option_count).contains(&number) => PromptChoice::Pick(number - 1),
        _ => PromptChoice::Invalid,
    }
}

/// `y`/`yes` confirms, `n`/`no` or empty declines, anything else is invalid.
fn parse_confirmation_input(input: &str) -> Option<bool> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(false);
    }
    if trimmed.eq_ignore_ascii_case("y") || trimmed.eq_ignore_ascii_case("yes") {
        return Some(true);
    }
    if trimmed.eq_ignore_ascii_case("n") || trimmed.eq_ignore_ascii_case("no") {
        return Some(false);
    }
    None
}

/// Reads one line from stdin. `None` on EOF or read failure.
fn read_input_line() -> Option<String> {
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(error) => {
            warn!("Failed to read from stdin: {error}");
            None
        }
    }
}

fn print_action_reports(reports: &[AlbumActionReport]) {
    for report in reports {
        println!("{} - {}: {}", report.artist, report.album, report.message);
    }
    let succeeded = reports.iter().filter(|report| report.success).count();
    println!("{succeeded}/{} albums processed", reports.len());
}

/// Main-thread frontend bound to the bus.
pub struct ConsoleFrontend {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    pending_album_line: Option<String>,
}

impl ConsoleFrontend {
    pub fn new(bus_consumer: Receiver<Message>, bus_producer: Sender<Message>) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            pending_album_line: None,
        }
    }

    /// Consumes the bus until the requested operation finishes.
    /// Returns the process exit code.
    pub fn run(&mut self) -> i32 {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Scan(message)) => {
                    if let Some(code) = self.handle_scan_message(message) {
                        return code;
                    }
                }
                Ok(Message::Cover(message)) => {
                    if let Some(code) = self.handle_cover_message(message) {
                        return code;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Console lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(RecvError::Closed) => return 1,
            }
        }
    }

    fn handle_scan_message(&mut self, message: ScanMessage) -> Option<i32> {
        match message {
            ScanMessage::RequestScan(_) => {}
            ScanMessage::ScanStarted {
                folder,
                album_count,
            } => {
                println!("Scanning {} ({} albums)", folder.display(), album_count);
            }
            ScanMessage::AlbumReady(report) => {
                debug!("Album folder: {}", report.folder.display());
                self.pending_album_line = Some(render_album_line(&report));
            }
            ScanMessage::Progress { processed, total } => {
                match self.pending_album_line.take() {
                    Some(line) => println!("[{processed}/{total}] {line}"),
                    None => println!("[{processed}/{total}]"),
                }
            }
            ScanMessage::ScanFailed(error) => {
                eprintln!("Error: {error}");
                return Some(1);
            }
            ScanMessage::ScanFinished(summary) => {
                println!();
                println!("{}", render_summary(&summary));
                return Some(0);
            }
        }
        None
    }

    fn handle_cover_message(&mut self, message: CoverMessage) -> Option<i32> {
        match message {
            CoverMessage::SelectionNeeded {
                request_id,
                artist,
                album,
                folder,
                candidates,
            } => {
                let choice = prompt_candidate_selection(&artist, &album, &folder, &candidates);
                let _ = self
                    .bus_producer
                    .send(Message::Cover(CoverMessage::SelectionMade {
                        request_id,
                        choice,
                    }));
            }
            CoverMessage::ExtractChoiceNeeded {
                request_id,
                artist,
                album,
                files,
            } => {
                let choice = prompt_extract_choice(&artist, &album, &files);
                let _ = self
                    .bus_producer
                    .send(Message::Cover(CoverMessage::ExtractChoiceMade {
                        request_id,
                        choice,
                    }));
            }
            CoverMessage::RemoveConfirmationNeeded {
                request_id,
                artist,
                album,
                cover_path,
            } => {
                let confirmed = prompt_remove_confirmation(&artist, &album, &cover_path);
                let _ = self
                    .bus_producer
                    .send(Message::Cover(CoverMessage::RemoveConfirmed {
                        request_id,
                        confirmed,
                    }));
            }
            CoverMessage::EmbedFinished { reports }
            | CoverMessage::ExtractFinished { reports }
            | CoverMessage::RemoveFinished { reports } => {
                print_action_reports(&reports);
                return Some(0);
            }
            CoverMessage::SelectionMade { .. }
            | CoverMessage::ExtractChoiceMade { .. }
            | CoverMessage::RemoveConfirmed { .. }
            | CoverMessage::RequestEmbed { .. }
            | CoverMessage::RequestExtract { .. }
            | CoverMessage::RequestRemove { .. } => {}
        }
        None
    }
}

fn prompt_candidate_selection(
    artist: &str,
    album: &str,
    folder: &Path,
    candidates: &[CoverCandidate],
) -> Option<usize> {
    println!();
    println!("{}", render_selection_header(artist, album, folder));
    for (index, candidate) in candidates.iter().enumerate() {
        println!("  {}. From: {}", index + 1, candidate.artist_name);
        println!("     Album: {}", candidate.album_title);
        println!("     {}", candidate.url);
    }

    loop {
        print!("Choice [1-{}, Enter to skip]: ", candidates.len());
        let _ = io::stdout().flush();
        let Some(line) = read_input_line() else {
            return None;
        };
        match parse_choice_input(&line, candidates.len()) {
            PromptChoice::Pick(index) => return Some(index),
            PromptChoice::Skip => return None,
            PromptChoice::Invalid => {
                println!(
                    "Enter a number between 1 and {}, or press Enter to skip.",
                    candidates.len()
                );
            }
        }
    }
}

fn prompt_extract_choice(artist: &str, album: &str, files: &[PathBuf]) -> Option<usize> {
    println!();
    println!("Multiple files of \"{artist} - {album}\" have embedded covers. Choose one:");
    for (index, file) in files.iter().enumerate() {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        println!("  {}. {}", index + 1, name);
    }

    loop {
        print!("Choice [1-{}, Enter to skip]: ", files.len());
        let _ = io::stdout().flush();
        let Some(line) = read_input_line() else {
            return None;
        };
        match parse_choice_input(&line, files.len()) {
            PromptChoice::Pick(index) => return Some(index),
            PromptChoice::Skip => return None,
            PromptChoice::Invalid => {
                println!(
                    "Enter a number between 1 and {}, or press Enter to skip.",
                    files.len()
                );
            }
        }
    }
}

fn prompt_remove_confirmation(artist: &str, album: &str, cover_path: &Path) -> bool {
    println!();
    println!("Are you sure you want to delete this cover?");
    println!("  {artist} - {album}");
    println!("  {}", cover_path.display());

    loop {
        print!("Delete cover? [y/N]: ");
        let _ = io::stdout().flush();
        let Some(line) = read_input_line() else {
            return false;
        };
        match parse_confirmation_input(&line) {
            Some(answer) => return answer,
            None => println!("Please answer y or n."),
        }
    }
}
