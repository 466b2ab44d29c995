//! Streaming PGN file reader.
//!
//! A background thread performs blocking reads of the underlying file and
//! hands filled chunks back over a bounded channel, giving the consumer one
//! chunk of read-ahead while it frames and returns the previous one.
//! Each [`UnparsedGame`] owns its tag and movetext text rather than
//! borrowing from the reader's internal buffer: safe Rust has no ergonomic
//! way to hand out a view into a buffer this reader is about to overwrite,
//! so we pay one string allocation per game instead.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use thiserror::Error;

use crate::game::UnparsedGame;

/// Minimum chunk size requested from the background reader thread per read.
pub const MIN_BUFFER_SIZE: usize = 128 * 1024;

#[derive(Debug, Error)]
pub enum PgnReaderError {
    #[error("failed to open PGN file: {0}")]
    Open(#[source] io::Error),
}

enum Chunk {
    Data(Vec<u8>),
    Eof,
    Err(io::Error),
}

fn spawn_reader_thread(mut file: File, buffer_size: usize, tx: SyncSender<Chunk>) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        let mut buf = vec![0u8; buffer_size];
        match file.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(Chunk::Eof);
                return;
            }
            Ok(n) => {
                buf.truncate(n);
                if tx.send(Chunk::Data(buf)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Chunk::Err(e));
                return;
            }
        }
    })
}

/// Iterates the games of a PGN file, one [`UnparsedGame`] at a time.
pub struct PgnReader {
    rx: Receiver<Chunk>,
    _handle: JoinHandle<()>,
    buffer: String,
    at_eof: bool,
    eof_sentinel_appended: bool,
    errored: bool,
}

impl PgnReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PgnReaderError> {
        Self::open_with_buffer_size(path, MIN_BUFFER_SIZE)
    }

    pub fn open_with_buffer_size(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self, PgnReaderError> {
        let file = File::open(path).map_err(PgnReaderError::Open)?;
        let (tx, rx) = sync_channel(1);
        let handle = spawn_reader_thread(file, buffer_size.max(1), tx);
        Ok(PgnReader {
            rx,
            _handle: handle,
            buffer: String::new(),
            at_eof: false,
            eof_sentinel_appended: false,
            errored: false,
        })
    }

    /// Whether the background thread hit an I/O error while reading. Once
    /// set, the reader behaves as if it reached a clean end of file.
    pub fn had_io_error(&self) -> bool {
        self.errored
    }

    fn refill(&mut self) -> bool {
        if self.at_eof {
            if !self.eof_sentinel_appended {
                if !self.buffer.ends_with('\n') {
                    self.buffer.push('\n');
                }
                self.buffer.push('\n');
                self.eof_sentinel_appended = true;
                return true;
            }
            return false;
        }

        match self.rx.recv() {
            Ok(Chunk::Data(bytes)) => {
                self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                true
            }
            Ok(Chunk::Eof) | Err(_) => {
                self.at_eof = true;
                self.refill()
            }
            Ok(Chunk::Err(_)) => {
                self.at_eof = true;
                self.errored = true;
                self.refill()
            }
        }
    }

    /// Attempts to frame one complete (tag section, movetext) pair out of
    /// the buffer. Returns `None` when more data is needed (or there is
    /// none left).
    fn try_frame_game(&mut self) -> Option<(String, String)> {
        let text = &self.buffer;
        let idx = text.len() - text.trim_start().len();
        if idx >= text.len() {
            return None;
        }

        let mut pos = idx;
        let mut saw_tag = false;
        let tag_start = idx;
        let tag_end;
        loop {
            let nl = text[pos..].find('\n')?;
            let line = &text[pos..pos + nl];
            let line_end = pos + nl + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if saw_tag {
                    tag_end = pos;
                    pos = line_end;
                    break;
                }
                pos = line_end;
                continue;
            } else if trimmed.starts_with('[') {
                saw_tag = true;
                pos = line_end;
            } else {
                // Movetext began without a separating blank line.
                tag_end = pos;
                break;
            }
        }

        let tag_section = text[tag_start..tag_end].to_string();
        let move_start = pos;

        loop {
            let nl = text[pos..].find('\n')?;
            let line = &text[pos..pos + nl];
            let line_end = pos + nl + 1;
            if line.trim().is_empty() {
                let move_section = text[move_start..pos].to_string();
                self.buffer.drain(..line_end);
                return Some((tag_section, move_section));
            }
            pos = line_end;
        }
    }
}

impl Iterator for PgnReader {
    type Item = UnparsedGame;

    fn next(&mut self) -> Option<UnparsedGame> {
        loop {
            if let Some((tags, moves)) = self.try_frame_game() {
                return Some(UnparsedGame::new(tags, moves));
            }

            if !self.refill() {
                if !self.buffer.trim().is_empty() {
                    // Leftover data that never framed into a full game:
                    // best-effort skip, matching the malformed-game
                    // tolerance policy for this reader.
                    self.buffer.clear();
                }
                return None;
            }
        }
    }
}
