//! A single BCGN game record: fixed-offset header fields are
//! parsed eagerly, strings and movetext are parsed lazily from the owned
//! record bytes.

use chess_core::Move;
use chess_engine::{compressed, CompressedPosition, Position};
use chess_pgn::{Date, Eco, GameResult};

use crate::bits::BitReader;
use crate::error::BcgnError;
use crate::header::CompressionLevel;
use crate::move_codec::{read_level0, read_level1, read_level2};

const FULL_HEADER_FIXED_LEN: usize = 19;
const HEADERLESS_FIXED_LEN: usize = 5;

/// One parsed-on-demand game record. Owns the raw bytes of the record
/// (length-prefix included); header fields with a fixed offset are read out
/// at construction, strings and the movetext are views into `data`.
#[derive(Debug, Clone)]
pub struct UnparsedGame {
    data: Vec<u8>,
    level: CompressionLevel,
    is_headerless: bool,
    plies: u16,
    result: Option<GameResult>,
    date: Date,
    white_elo: u16,
    black_elo: u16,
    round: u16,
    eco: Eco,
    has_additional_tags: bool,
    custom_start_pos: Option<[u8; compressed::ENCODED_LEN]>,
    /// Offset into `data` where the movetext begins.
    movetext_start: usize,
}

impl UnparsedGame {
    pub(crate) fn parse(data: Vec<u8>, level: CompressionLevel, is_headerless: bool) -> Result<Self, BcgnError> {
        if is_headerless {
            Self::parse_headerless(data, level)
        } else {
            Self::parse_full(data, level)
        }
    }

    fn parse_headerless(data: Vec<u8>, level: CompressionLevel) -> Result<Self, BcgnError> {
        if data.len() < HEADERLESS_FIXED_LEN {
            return Err(BcgnError::TruncatedRecord);
        }
        let ply_result = u16::from_be_bytes([data[2], data[3]]);
        let plies = ply_result >> 2;
        let result = GameResult::from_wire((ply_result & 0b11) as u8);
        let flags = data[4];
        let has_custom_start_pos = flags & 0b10 != 0;

        let mut offset = HEADERLESS_FIXED_LEN;
        let custom_start_pos = if has_custom_start_pos {
            offset += compressed::ENCODED_LEN;
            if data.len() < offset {
                return Err(BcgnError::TruncatedRecord);
            }
            let mut bytes = [0u8; compressed::ENCODED_LEN];
            bytes.copy_from_slice(&data[offset - compressed::ENCODED_LEN..offset]);
            Some(bytes)
        } else {
            None
        };

        Ok(UnparsedGame {
            data,
            level,
            is_headerless: true,
            plies,
            result,
            date: Date::UNKNOWN,
            white_elo: 0,
            black_elo: 0,
            round: 0,
            eco: Eco::UNKNOWN,
            has_additional_tags: false,
            custom_start_pos,
            movetext_start: offset,
        })
    }

    fn parse_full(data: Vec<u8>, level: CompressionLevel) -> Result<Self, BcgnError> {
        if data.len() < FULL_HEADER_FIXED_LEN {
            return Err(BcgnError::TruncatedRecord);
        }
        let header_length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if data.len() < header_length {
            return Err(BcgnError::TruncatedRecord);
        }

        let ply_result = u16::from_be_bytes([data[4], data[5]]);
        let plies = ply_result >> 2;
        let result = GameResult::from_wire((ply_result & 0b11) as u8);
        let year = u16::from_be_bytes([data[6], data[7]]);
        let date = Date::new(year, data[8], data[9]);
        let white_elo = u16::from_be_bytes([data[10], data[11]]);
        let black_elo = u16::from_be_bytes([data[12], data[13]]);
        let round = u16::from_be_bytes([data[14], data[15]]);
        let eco = Eco::new(data[16] as char, data[17]).unwrap_or(Eco::UNKNOWN);
        let flags = data[18];
        let has_additional_tags = flags & 0b01 != 0;
        let has_custom_start_pos = flags & 0b10 != 0;

        let mut offset = FULL_HEADER_FIXED_LEN;
        let custom_start_pos = if has_custom_start_pos {
            offset += compressed::ENCODED_LEN;
            if data.len() < offset {
                return Err(BcgnError::TruncatedRecord);
            }
            let mut bytes = [0u8; compressed::ENCODED_LEN];
            bytes.copy_from_slice(&data[offset - compressed::ENCODED_LEN..offset]);
            Some(bytes)
        } else {
            None
        };

        Ok(UnparsedGame {
            data,
            level,
            is_headerless: false,
            plies,
            result,
            date,
            white_elo,
            black_elo,
            round,
            eco,
            has_additional_tags,
            custom_start_pos,
            movetext_start: header_length,
        })
    }

    pub fn plies(&self) -> u16 {
        self.plies
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn white_elo(&self) -> u16 {
        self.white_elo
    }

    pub fn black_elo(&self) -> u16 {
        self.black_elo
    }

    pub fn round(&self) -> u16 {
        self.round
    }

    pub fn eco(&self) -> Eco {
        self.eco
    }

    pub fn has_custom_start_position(&self) -> bool {
        self.custom_start_pos.is_some()
    }

    pub fn has_additional_tags(&self) -> bool {
        self.has_additional_tags
    }

    /// Offset right after the fixed fields and optional compressed start
    /// position, where the variable-length string section begins.
    fn string_section_start(&self) -> usize {
        let fixed = if self.is_headerless { HEADERLESS_FIXED_LEN } else { FULL_HEADER_FIXED_LEN };
        fixed + if self.custom_start_pos.is_some() { compressed::ENCODED_LEN } else { 0 }
    }

    fn read_len_str(&self, pos: usize) -> Result<(&str, usize), BcgnError> {
        let len = *self.data.get(pos).ok_or(BcgnError::TruncatedRecord)? as usize;
        let start = pos + 1;
        let end = start + len;
        let bytes = self.data.get(start..end).ok_or(BcgnError::TruncatedRecord)?;
        let s = std::str::from_utf8(bytes).map_err(|e| BcgnError::MalformedMovetext(e.to_string()))?;
        Ok((s, end))
    }

    fn player_strings(&self) -> Result<(&str, &str, &str, &str), BcgnError> {
        if self.is_headerless {
            return Ok(("", "", "", ""));
        }
        let (white, pos) = self.read_len_str(self.string_section_start())?;
        let (black, pos) = self.read_len_str(pos)?;
        let (event, pos) = self.read_len_str(pos)?;
        let (site, _pos) = self.read_len_str(pos)?;
        Ok((white, black, event, site))
    }

    pub fn white_player(&self) -> Result<&str, BcgnError> {
        self.player_strings().map(|(w, _, _, _)| w)
    }

    pub fn black_player(&self) -> Result<&str, BcgnError> {
        self.player_strings().map(|(_, b, _, _)| b)
    }

    pub fn event(&self) -> Result<&str, BcgnError> {
        self.player_strings().map(|(_, _, e, _)| e)
    }

    pub fn site(&self) -> Result<&str, BcgnError> {
        self.player_strings().map(|(_, _, _, s)| s)
    }

    /// Iterates the `(name, value)` additional tag pairs, if any.
    pub fn additional_tags(&self) -> Result<Vec<(&str, &str)>, BcgnError> {
        if self.is_headerless || !self.has_additional_tags {
            return Ok(Vec::new());
        }
        let (_, _, _, site) = self.player_strings()?;
        // `site` borrows from `self.data`; recompute its end offset instead
        // of trying to carry a position alongside the borrow.
        let mut pos = self.string_section_start();
        for _ in 0..4 {
            let (_, next) = self.read_len_str(pos)?;
            pos = next;
        }
        let _ = site;

        let count = *self.data.get(pos).ok_or(BcgnError::TruncatedRecord)? as usize;
        pos += 1;
        let mut tags = Vec::with_capacity(count);
        for _ in 0..count {
            let (name, next) = self.read_len_str(pos)?;
            let (value, next) = self.read_len_str(next)?;
            tags.push((name, value));
            pos = next;
        }
        Ok(tags)
    }

    /// The game's starting position: the standard starting position, or the
    /// embedded [`CompressedPosition`] if `hasCustomStartPos` was set.
    pub fn start_position(&self) -> Position {
        match &self.custom_start_pos {
            Some(bytes) => compressed::decompress(&CompressedPosition::from_bytes(bytes)),
            None => Position::startpos(),
        }
    }

    fn movetext(&self) -> &[u8] {
        &self.data[self.movetext_start..]
    }

    fn game_moves(&self) -> GameMoves<'_> {
        let cursor = match self.level {
            CompressionLevel::Level0 | CompressionLevel::Level1 => MovetextCursor::Bytes(self.movetext()),
            CompressionLevel::Level2 => MovetextCursor::Bits(BitReader::new(self.movetext())),
        };
        GameMoves { level: self.level, position: self.start_position(), remaining: self.plies, cursor }
    }

    /// A lazy sequence of the game's moves, decoded against a running
    /// position that starts at [`UnparsedGame::start_position`].
    pub fn moves(&self) -> Moves<'_> {
        Moves(self.game_moves())
    }

    /// Like [`UnparsedGame::moves`], but yields the position after each
    /// move instead of the move itself.
    pub fn positions(&self) -> Positions<'_> {
        Positions(self.game_moves())
    }
}

enum MovetextCursor<'a> {
    Bytes(&'a [u8]),
    Bits(BitReader<'a>),
}

struct GameMoves<'a> {
    level: CompressionLevel,
    position: Position,
    remaining: u16,
    cursor: MovetextCursor<'a>,
}

impl<'a> GameMoves<'a> {
    fn advance(&mut self) -> Option<Result<Move, BcgnError>> {
        if self.remaining == 0 {
            return None;
        }
        let result = match (&mut self.cursor, self.level) {
            (MovetextCursor::Bytes(buf), CompressionLevel::Level0) => read_level0(buf, &self.position).map(|(mv, used)| {
                *buf = &buf[used..];
                mv
            }),
            (MovetextCursor::Bytes(buf), CompressionLevel::Level1) => read_level1(buf, &self.position).map(|(mv, used)| {
                *buf = &buf[used..];
                mv
            }),
            (MovetextCursor::Bits(r), CompressionLevel::Level2) => read_level2(r, &self.position),
            _ => unreachable!("cursor kind always matches the file's compression level"),
        };

        match result {
            Ok(mv) => {
                self.remaining -= 1;
                self.position.do_move(mv);
                Some(Ok(mv))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Lazily decodes a game's moves, one at a time.
pub struct Moves<'a>(GameMoves<'a>);

impl<'a> Iterator for Moves<'a> {
    type Item = Result<Move, BcgnError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.advance()
    }
}

/// Lazily replays a game's moves, yielding the position after each one.
pub struct Positions<'a>(GameMoves<'a>);

impl<'a> Iterator for Positions<'a> {
    type Item = Result<Position, BcgnError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.0.advance() {
            Some(Ok(_)) => Some(Ok(self.0.position.clone())),
            Some(Err(e)) => Some(Err(e)),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{BcgnWriter, GameSetup};
    use chess_engine::movegen::generate_moves;
    use std::io::Write as _;

    fn sample_record(level: CompressionLevel) -> Vec<u8> {
        let options = crate::header::HeaderOptions { compression_level: level, ..Default::default() };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut writer = BcgnWriter::create(file.path(), options, crate::header::OpenMode::Truncate).unwrap();
            writer.begin_game(GameSetup::default());
            let mut pos = Position::startpos();
            for mv in [
                Move::normal(chess_core::Square::E2, chess_core::Square::E4),
                Move::normal(chess_core::Square::E7, chess_core::Square::E5),
                Move::normal(chess_core::Square::G1, chess_core::Square::F3),
            ] {
                writer.add_move(&pos, mv);
                pos.do_move(mv);
            }
            writer.set_result(Some(GameResult::WhiteWin));
            writer.end_game().unwrap();
            writer.flush().unwrap();
        }
        file.flush().unwrap();
        std::fs::read(file.path()).unwrap()[crate::header::FILE_HEADER_LEN..].to_vec()
    }

    #[test]
    fn parses_plies_and_result_across_levels() {
        for level in CompressionLevel::ALL {
            let raw = sample_record(level);
            let game = UnparsedGame::parse(raw, level, false).unwrap();
            assert_eq!(game.plies(), 3);
            assert_eq!(game.result(), Some(GameResult::WhiteWin));
            let moves: Vec<Move> = game.moves().map(|m| m.unwrap()).collect();
            assert_eq!(moves.len(), 3);
            assert_eq!(moves[0], Move::normal(chess_core::Square::E2, chess_core::Square::E4));
        }
    }

    #[test]
    fn positions_iterator_tracks_moves_iterator() {
        let raw = sample_record(CompressionLevel::Level2);
        let game = UnparsedGame::parse(raw, CompressionLevel::Level2, false).unwrap();
        let moves: Vec<Move> = game.moves().map(|m| m.unwrap()).collect();
        let positions: Vec<Position> = game.positions().map(|p| p.unwrap()).collect();
        assert_eq!(positions.len(), moves.len());
        let mut replay = Position::startpos();
        for (mv, pos) in moves.iter().zip(positions.iter()) {
            replay.do_move(*mv);
            assert_eq!(&replay, pos);
        }
    }

    #[test]
    fn level2_every_move_from_startpos_survives_one_ply() {
        let pos = Position::startpos();
        for &mv in generate_moves(&pos).as_slice() {
            let options = crate::header::HeaderOptions { compression_level: CompressionLevel::Level2, ..Default::default() };
            let mut file = tempfile::NamedTempFile::new().unwrap();
            {
                let mut writer = BcgnWriter::create(file.path(), options, crate::header::OpenMode::Truncate).unwrap();
                writer.begin_game(GameSetup::default());
                writer.add_move(&pos, mv);
                writer.end_game().unwrap();
                writer.flush().unwrap();
            }
            file.flush().unwrap();
            let raw = std::fs::read(file.path()).unwrap()[crate::header::FILE_HEADER_LEN..].to_vec();
            let game = UnparsedGame::parse(raw, CompressionLevel::Level2, false).unwrap();
            let decoded: Vec<Move> = game.moves().map(|m| m.unwrap()).collect();
            assert_eq!(decoded, vec![mv]);
        }
    }
}
