//! BCGN file reader: reads the fixed 32-byte file header
//! synchronously, then iterates length-prefixed game records out of a byte
//! stream kept topped up by a background thread — the same one-chunk
//! read-ahead `chess-pgn::PgnReader` uses, operating on raw bytes instead of
//! UTF-8 text since BCGN framing is a binary length prefix, not a blank
//! line.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use crate::error::BcgnError;
use crate::game::UnparsedGame;
use crate::header::{CompressionLevel, FileHeader, FILE_HEADER_LEN};

/// Minimum chunk size requested from the background reader thread per read.
pub const MIN_BUFFER_SIZE: usize = 128 * 1024;

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

/// Iterates the game records of a BCGN file, one [`UnparsedGame`] at a time.
///
/// A malformed record (bad magic/version at open, a truncated record, or an
/// index/bitfield that decodes to an illegal move) is fatal: the iterator
/// yields that one error and then ends, matching "subsequent advance yields
/// end-of-stream".
pub struct BcgnReader {
    rx: Receiver<Chunk>,
    _handle: JoinHandle<()>,
    buffer: Vec<u8>,
    level: CompressionLevel,
    is_headerless: bool,
    at_eof: bool,
    errored: bool,
    finished: bool,
}

impl BcgnReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BcgnError> {
        Self::open_with_buffer_size(path, MIN_BUFFER_SIZE)
    }

    pub fn open_with_buffer_size(path: impl AsRef<Path>, buffer_size: usize) -> Result<Self, BcgnError> {
        let mut file = File::open(path)?;
        let mut header_buf = [0u8; FILE_HEADER_LEN];
        file.read_exact(&mut header_buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => BcgnError::InvalidHeader("file shorter than the 32-byte file header".to_string()),
            _ => BcgnError::Io(e),
        })?;
        let header = FileHeader::read_from(&header_buf)?;

        let (tx, rx) = sync_channel(1);
        let handle = spawn_reader_thread(file, buffer_size.max(1), tx);
        Ok(BcgnReader {
            rx,
            _handle: handle,
            buffer: Vec::new(),
            level: header.compression_level,
            is_headerless: header.is_headerless,
            at_eof: false,
            errored: false,
            finished: false,
        })
    }

    /// Whether the background thread hit an I/O error while reading. Once
    /// set, the reader behaves as if it reached a clean end of file.
    pub fn had_io_error(&self) -> bool {
        self.errored
    }

    fn refill(&mut self) -> bool {
        if self.at_eof {
            return false;
        }
        match self.rx.recv() {
            Ok(Chunk::Data(bytes)) => {
                self.buffer.extend_from_slice(&bytes);
                true
            }
            Ok(Chunk::Eof) | Err(_) => {
                self.at_eof = true;
                false
            }
            Ok(Chunk::Err(_)) => {
                self.at_eof = true;
                self.errored = true;
                false
            }
        }
    }

    /// Frames one record off the front of the buffer once its full
    /// `total_length` has arrived.
    fn try_frame_record(&mut self) -> Option<Vec<u8>> {
        if self.buffer.len() < 2 {
            return None;
        }
        let total_length = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
        if self.buffer.len() < total_length {
            return None;
        }
        Some(self.buffer.drain(..total_length).collect())
    }
}

impl Iterator for BcgnReader {
    type Item = Result<UnparsedGame, BcgnError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if let Some(record) = self.try_frame_record() {
                let parsed = UnparsedGame::parse(record, self.level, self.is_headerless);
                if parsed.is_err() {
                    self.finished = true;
                }
                return Some(parsed);
            }

            if !self.refill() {
                self.finished = true;
                if !self.buffer.is_empty() {
                    return Some(Err(BcgnError::TruncatedRecord));
                }
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{HeaderOptions, OpenMode};
    use crate::writer::{BcgnWriter, GameSetup};
    use chess_core::{Move, Square};
    use chess_engine::Position;
    use chess_pgn::GameResult;

    fn write_sample(level: CompressionLevel, num_games: usize) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = HeaderOptions { compression_level: level, ..Default::default() };
        let mut writer = BcgnWriter::create(file.path(), options, OpenMode::Truncate).unwrap();
        for i in 0..num_games {
            writer.begin_game(GameSetup { white_player: format!("Player {i}"), ..Default::default() });
            let mut pos = Position::startpos();
            for mv in [Move::normal(Square::E2, Square::E4), Move::normal(Square::E7, Square::E5)] {
                writer.add_move(&pos, mv);
                pos.do_move(mv);
            }
            writer.set_result(Some(GameResult::WhiteWin));
            writer.end_game().unwrap();
        }
        writer.flush().unwrap();
        drop(writer);
        file
    }

    #[test]
    fn reads_multiple_games_across_all_levels() {
        for level in CompressionLevel::ALL {
            let file = write_sample(level, 5);
            let reader = BcgnReader::open(file.path()).unwrap();
            let games: Vec<_> = reader.map(|g| g.unwrap()).collect();
            assert_eq!(games.len(), 5);
            for (i, game) in games.iter().enumerate() {
                assert_eq!(game.white_player().unwrap(), format!("Player {i}"));
                assert_eq!(game.moves().count(), 2);
            }
        }
    }

    #[test]
    fn reads_across_small_read_chunks() {
        let file = write_sample(CompressionLevel::Level2, 10);
        let reader = BcgnReader::open_with_buffer_size(file.path(), 3).unwrap();
        let games: Vec<_> = reader.map(|g| g.unwrap()).collect();
        assert_eq!(games.len(), 10);
    }

    #[test]
    fn rejects_bad_magic_at_open() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[0u8; FILE_HEADER_LEN]).unwrap();
        assert!(BcgnReader::open(file.path()).is_err());
    }

    #[test]
    fn truncated_trailing_record_is_fatal() {
        let file = write_sample(CompressionLevel::Level0, 2);
        let mut bytes = std::fs::read(file.path()).unwrap();
        bytes.truncate(bytes.len() - 1);
        std::fs::write(file.path(), &bytes).unwrap();

        let reader = BcgnReader::open(file.path()).unwrap();
        let results: Vec<_> = reader.collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
