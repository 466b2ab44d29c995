//! BCGN writer: accumulates one game at a time into a
//! growing record buffer, then pipelines the finished record out through a
//! one-deep double buffer — a front buffer the caller keeps filling while a
//! background thread blocks on writing the back buffer, mirroring
//! `chess-pgn`'s reader thread but for output instead of input.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use chess_core::Move;
use chess_engine::{compressed, Position};
use chess_pgn::{Date, Eco, GameResult};

use crate::error::BcgnError;
use crate::header::{CompressionLevel, FileHeader, HeaderOptions, OpenMode, FILE_HEADER_LEN};
use crate::move_codec::{write_level0, write_level1, write_level2};

use crate::bits::BitWriter;

/// The `total_length` field is a `u16`; no record may reach or exceed this.
pub const MAX_GAME_LENGTH: usize = 65535;

const DEFAULT_FRONT_BUFFER_CAPACITY: usize = 1 << 20;

/// Per-game header fields a writer is configured with before `add_move`ing
/// the game's moves. `result` is set separately via
/// [`BcgnWriter::set_result`] since it is typically only known at the end
/// of the game.
#[derive(Debug, Clone)]
pub struct GameSetup {
    pub white_player: String,
    pub black_player: String,
    pub event: String,
    pub site: String,
    pub date: Date,
    pub white_elo: u16,
    pub black_elo: u16,
    pub round: u16,
    pub eco: Eco,
    pub additional_tags: Vec<(String, String)>,
    /// Non-standard starting position, embedded as a 24-byte
    /// [`chess_engine::CompressedPosition`]. `None` means the game starts
    /// from the standard starting position.
    pub custom_start_position: Option<Position>,
}

impl Default for GameSetup {
    fn default() -> Self {
        GameSetup {
            white_player: String::new(),
            black_player: String::new(),
            event: String::new(),
            site: String::new(),
            date: Date::UNKNOWN,
            white_elo: 0,
            black_elo: 0,
            round: 0,
            eco: Eco::UNKNOWN,
            additional_tags: Vec::new(),
            custom_start_position: None,
        }
    }
}

/// Truncates `s` to at most 255 bytes at a `char` boundary and writes it as
/// a 1-byte-length-prefixed, non-null-terminated string.
fn write_len_str(buf: &mut Vec<u8>, s: &str) {
    let mut len = s.len().min(255);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    buf.push(len as u8);
    buf.extend_from_slice(&s.as_bytes()[..len]);
}

/// Accumulates one game's header fields and move bytes until [`Self::finish`]
/// packs them into the final length-prefixed record.
struct GameEntryBuffer {
    setup: GameSetup,
    level: CompressionLevel,
    is_headerless: bool,
    plies: u16,
    result: Option<GameResult>,
    byte_moves: Vec<u8>,
    bit_moves: BitWriter,
}

impl GameEntryBuffer {
    fn new(setup: GameSetup, level: CompressionLevel, is_headerless: bool) -> Self {
        GameEntryBuffer {
            setup,
            level,
            is_headerless,
            plies: 0,
            result: None,
            byte_moves: Vec::new(),
            bit_moves: BitWriter::new(),
        }
    }

    fn add_move(&mut self, pos: &Position, mv: Move) {
        match self.level {
            CompressionLevel::Level0 => write_level0(&mut self.byte_moves, mv),
            CompressionLevel::Level1 => write_level1(&mut self.byte_moves, pos, mv),
            CompressionLevel::Level2 => write_level2(&mut self.bit_moves, pos, mv),
        }
        self.plies += 1;
    }

    fn finish(self) -> Result<Vec<u8>, BcgnError> {
        let movetext: Vec<u8> = match self.level {
            CompressionLevel::Level0 | CompressionLevel::Level1 => self.byte_moves,
            CompressionLevel::Level2 => self.bit_moves.into_bytes(),
        };

        let ply_result = ((self.plies & 0x3FFF) << 2) | GameResult::to_wire(self.result) as u16;
        let custom_start = self.setup.custom_start_position.as_ref().map(|p| compressed::compress(p).to_bytes());

        let mut buf = Vec::new();
        if self.is_headerless {
            buf.extend_from_slice(&[0, 0]);
            buf.extend_from_slice(&ply_result.to_be_bytes());
            buf.push(if custom_start.is_some() { 0b10 } else { 0 });
            if let Some(cp) = &custom_start {
                buf.extend_from_slice(cp);
            }
        } else {
            buf.extend_from_slice(&[0, 0]); // total_length, patched below
            buf.extend_from_slice(&[0, 0]); // header_length, patched below
            buf.extend_from_slice(&ply_result.to_be_bytes());
            buf.extend_from_slice(&self.setup.date.year().to_be_bytes());
            buf.push(self.setup.date.month());
            buf.push(self.setup.date.day());
            buf.extend_from_slice(&self.setup.white_elo.to_be_bytes());
            buf.extend_from_slice(&self.setup.black_elo.to_be_bytes());
            buf.extend_from_slice(&self.setup.round.to_be_bytes());
            buf.push(self.setup.eco.category() as u8);
            buf.push(self.setup.eco.index());

            let has_tags = !self.setup.additional_tags.is_empty();
            buf.push((has_tags as u8) | ((custom_start.is_some() as u8) << 1));
            if let Some(cp) = &custom_start {
                buf.extend_from_slice(cp);
            }

            write_len_str(&mut buf, &self.setup.white_player);
            write_len_str(&mut buf, &self.setup.black_player);
            write_len_str(&mut buf, &self.setup.event);
            write_len_str(&mut buf, &self.setup.site);

            if has_tags {
                let count = self.setup.additional_tags.len().min(255) as u8;
                buf.push(count);
                for (name, value) in self.setup.additional_tags.iter().take(count as usize) {
                    write_len_str(&mut buf, name);
                    write_len_str(&mut buf, value);
                }
            }

            let header_length = buf.len() as u16;
            buf[2..4].copy_from_slice(&header_length.to_be_bytes());
        }

        buf.extend_from_slice(&movetext);

        if buf.len() >= MAX_GAME_LENGTH {
            return Err(BcgnError::OverlongGameRecord { max: MAX_GAME_LENGTH });
        }
        let total_length = buf.len() as u16;
        buf[0..2].copy_from_slice(&total_length.to_be_bytes());
        Ok(buf)
    }
}

/// Owns the file handle on a background thread and performs one blocking
/// `write_all` per scheduled buffer, acknowledging completion (or its I/O
/// error) back to the caller.
struct WriteWorker {
    tx: Option<SyncSender<Vec<u8>>>,
    ack_rx: Receiver<io::Result<()>>,
    handle: Option<JoinHandle<()>>,
}

impl WriteWorker {
    fn spawn(mut file: File) -> Self {
        let (tx, rx) = sync_channel::<Vec<u8>>(1);
        let (ack_tx, ack_rx) = sync_channel::<io::Result<()>>(1);
        let handle = std::thread::spawn(move || {
            while let Ok(buf) = rx.recv() {
                let result = file.write_all(&buf);
                if ack_tx.send(result).is_err() {
                    return;
                }
            }
        });
        WriteWorker { tx: Some(tx), ack_rx, handle: Some(handle) }
    }

    fn schedule(&self, buf: Vec<u8>) -> Result<(), BcgnError> {
        self.tx
            .as_ref()
            .expect("worker thread outlives the writer")
            .send(buf)
            .map_err(|_| BcgnError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "BCGN writer thread terminated")))
    }

    fn join_pending(&self) -> Result<(), BcgnError> {
        match self.ack_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BcgnError::Io(e)),
            Err(_) => Err(BcgnError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "BCGN writer thread terminated"))),
        }
    }
}

impl Drop for WriteWorker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Writes a BCGN archive: one file header followed by length-prefixed game
/// records, double-buffered so encoding game N+1 overlaps with the
/// background `write` of game N.
pub struct BcgnWriter {
    level: CompressionLevel,
    is_headerless: bool,
    current: Option<GameEntryBuffer>,
    front: Vec<u8>,
    capacity: usize,
    worker: WriteWorker,
    pending: bool,
}

impl BcgnWriter {
    /// Opens `path` for writing with the front/back buffer sized at
    /// [`DEFAULT_FRONT_BUFFER_CAPACITY`].
    pub fn create(path: impl AsRef<Path>, options: HeaderOptions, mode: OpenMode) -> Result<Self, BcgnError> {
        Self::create_with_buffer_capacity(path, options, mode, DEFAULT_FRONT_BUFFER_CAPACITY)
    }

    pub fn create_with_buffer_capacity(
        path: impl AsRef<Path>,
        options: HeaderOptions,
        mode: OpenMode,
        buffer_capacity: usize,
    ) -> Result<Self, BcgnError> {
        let path = path.as_ref();
        let mut file = match mode {
            OpenMode::Truncate => File::create(path)?,
            OpenMode::Append => OpenOptions::new().read(true).write(true).create(true).open(path)?,
        };

        let needs_header = match mode {
            OpenMode::Truncate => true,
            OpenMode::Append => file.metadata()?.len() == 0,
        };
        if needs_header {
            let header = FileHeader::new(options);
            let mut buf = [0u8; FILE_HEADER_LEN];
            header.write_to(&mut buf);
            file.write_all(&buf)?;
        } else {
            use std::io::{Seek, SeekFrom};
            file.seek(SeekFrom::End(0))?;
        }

        let worker = WriteWorker::spawn(file);
        Ok(BcgnWriter {
            level: options.compression_level,
            is_headerless: options.is_headerless,
            current: None,
            front: Vec::with_capacity(buffer_capacity),
            capacity: buffer_capacity.max(MAX_GAME_LENGTH),
            worker,
            pending: false,
        })
    }

    /// Starts a new game record. Must precede any `add_move`/`set_result`/
    /// `end_game` call.
    pub fn begin_game(&mut self, setup: GameSetup) {
        self.current = Some(GameEntryBuffer::new(setup, self.level, self.is_headerless));
    }

    /// Encodes one more ply of the current game's movetext, using `pos` (the
    /// position *before* `mv`) to disambiguate for levels 1 and 2.
    pub fn add_move(&mut self, pos: &Position, mv: Move) {
        self.current.as_mut().expect("begin_game must precede add_move").add_move(pos, mv);
    }

    pub fn set_result(&mut self, result: Option<GameResult>) {
        self.current.as_mut().expect("begin_game must precede set_result").result = result;
    }

    /// Packs the current game into its final record and appends it to the
    /// front buffer, swapping buffers and scheduling a background write if
    /// the front buffer no longer has room for another record.
    pub fn end_game(&mut self) -> Result<(), BcgnError> {
        let game = self.current.take().expect("begin_game must precede end_game");
        let bytes = game.finish()?;
        self.front.extend_from_slice(&bytes);
        if self.capacity.saturating_sub(self.front.len()) < MAX_GAME_LENGTH {
            self.swap()?;
        }
        Ok(())
    }

    fn swap(&mut self) -> Result<(), BcgnError> {
        if self.pending {
            self.worker.join_pending()?;
            self.pending = false;
        }
        if !self.front.is_empty() {
            let back = std::mem::replace(&mut self.front, Vec::with_capacity(self.capacity));
            self.worker.schedule(back)?;
            self.pending = true;
        }
        Ok(())
    }

    /// Forces any buffered records out to the file and waits for the write
    /// to complete.
    pub fn flush(&mut self) -> Result<(), BcgnError> {
        self.swap()?;
        if self.pending {
            self.worker.join_pending()?;
            self.pending = false;
        }
        Ok(())
    }
}

impl Drop for BcgnWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::CompressionLevel as Level;
    use crate::reader::BcgnReader;
    use chess_core::Square;

    #[test]
    fn writes_and_reads_back_a_simple_game() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = HeaderOptions { compression_level: Level::Level2, ..Default::default() };
        {
            let mut writer = BcgnWriter::create(file.path(), options, OpenMode::Truncate).unwrap();
            writer.begin_game(GameSetup { white_player: "Alice".to_string(), black_player: "Bob".to_string(), ..Default::default() });
            let mut pos = Position::startpos();
            for mv in [Move::normal(Square::E2, Square::E4), Move::normal(Square::E7, Square::E5)] {
                writer.add_move(&pos, mv);
                pos.do_move(mv);
            }
            writer.set_result(Some(GameResult::Draw));
            writer.end_game().unwrap();
        }

        let reader = BcgnReader::open(file.path()).unwrap();
        let games: Vec<_> = reader.map(|g| g.unwrap()).collect();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].white_player().unwrap(), "Alice");
        assert_eq!(games[0].black_player().unwrap(), "Bob");
        assert_eq!(games[0].result(), Some(GameResult::Draw));
        let moves: Vec<Move> = games[0].moves().map(|m| m.unwrap()).collect();
        assert_eq!(moves, vec![Move::normal(Square::E2, Square::E4), Move::normal(Square::E7, Square::E5)]);
    }

    #[test]
    fn append_mode_does_not_rewrite_the_file_header() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = HeaderOptions { compression_level: Level::Level0, ..Default::default() };
        {
            let mut writer = BcgnWriter::create(file.path(), options, OpenMode::Truncate).unwrap();
            writer.begin_game(GameSetup::default());
            writer.end_game().unwrap();
        }
        {
            let mut writer = BcgnWriter::create(file.path(), options, OpenMode::Append).unwrap();
            writer.begin_game(GameSetup::default());
            writer.end_game().unwrap();
        }
        let reader = BcgnReader::open(file.path()).unwrap();
        let games: Vec<_> = reader.map(|g| g.unwrap()).collect();
        assert_eq!(games.len(), 2);
    }

    #[test]
    fn many_games_exercise_the_buffer_swap() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = HeaderOptions { compression_level: Level::Level1, ..Default::default() };
        {
            let mut writer = BcgnWriter::create_with_buffer_capacity(file.path(), options, OpenMode::Truncate, 4096).unwrap();
            for _ in 0..200 {
                writer.begin_game(GameSetup::default());
                let mut pos = Position::startpos();
                for mv in [Move::normal(Square::E2, Square::E4), Move::normal(Square::E7, Square::E5)] {
                    writer.add_move(&pos, mv);
                    pos.do_move(mv);
                }
                writer.end_game().unwrap();
            }
        }
        let reader = BcgnReader::open(file.path()).unwrap();
        let games: Vec<_> = reader.map(|g| g.unwrap()).collect();
        assert_eq!(games.len(), 200);
        for game in &games {
            assert_eq!(game.moves().count(), 2);
        }
    }

    #[test]
    fn overlong_record_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = HeaderOptions { compression_level: Level::Level0, ..Default::default() };
        let mut writer = BcgnWriter::create(file.path(), options, OpenMode::Truncate).unwrap();
        writer.begin_game(GameSetup { white_player: "a".repeat(255), ..Default::default() });
        let pos = Position::startpos();
        // Level 0 is 2 bytes/move; comfortably over 65535 bytes needs >32000 moves.
        for _ in 0..33000 {
            writer.add_move(&pos, Move::normal(Square::E2, Square::E4));
        }
        assert!(matches!(writer.end_game(), Err(BcgnError::OverlongGameRecord { .. })));
    }
}
