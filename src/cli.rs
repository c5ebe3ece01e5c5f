//! Command-line argument parsing.
//!
//! Each subcommand maps onto one bus request served by the scan manager.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::protocol::{CoverMessage, Message, ScanMessage, ScanRequest};

/// Album cover finder for a music folder tree
#[derive(Parser, Debug)]
#[command(name = "coverscout")]
#[command(about = "Finds, downloads, and embeds album cover art")]
pub struct Cli {
    /// Log debug detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a music folder and resolve a cover for every album
    Scan {
        /// Root music folder (defaults to the configured one)
        #[arg(long)]
        folder: Option<PathBuf>,

        /// Take the first search candidate without prompting
        #[arg(long)]
        auto: bool,

        /// Never contact the search provider
        #[arg(long)]
        skip_download: bool,
    },

    /// Embed each album's cover file into all of its audio files
    Embed {
        /// Root music folder
        #[arg(long)]
        folder: PathBuf,
    },

    /// Extract each album's embedded cover to a sidecar file
    Extract {
        /// Root music folder
        #[arg(long)]
        folder: PathBuf,

        /// Folder receiving the extracted covers (album folder when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Delete albums' sidecar cover files
    Remove {
        /// Root music folder
        #[arg(long)]
        folder: PathBuf,

        /// Delete without asking per album
        #[arg(long)]
        yes: bool,
    },
}

impl Command {
    /// Builds the bus request that starts this invocation's work.
    pub fn initial_message(&self, configured_music_folder: &str) -> Result<Message, String> {
        match self {
            Command::Scan {
                folder,
                auto,
                skip_download,
            } => {
                let folder = match folder {
                    Some(folder) => folder.clone(),
                    None if configured_music_folder.trim().is_empty() => {
                        return Err(
                            "No music folder given. Pass --folder or set scan.music_folder \
                             in the config file."
                                .to_string(),
                        );
                    }
                    None => PathBuf::from(configured_music_folder),
                };
                Ok(Message::Scan(ScanMessage::RequestScan(ScanRequest {
                    folder,
                    auto_select: *auto,
                    skip_download: *skip_download,
                })))
            }
            Command::Embed { folder } => Ok(Message::Cover(CoverMessage::RequestEmbed {
                folder: folder.clone(),
            })),
            Command::Extract { folder, output } => {
                Ok(Message::Cover(CoverMessage::RequestExtract {
                    folder: folder.clone(),
                    output: output.clone(),
                }))
            }
            Command::Remove { folder, yes } => Ok(Message::Cover(CoverMessage::RequestRemove {
                folder: folder.clone(),
                assume_yes: *yes,
            })),
        }
    }
}
