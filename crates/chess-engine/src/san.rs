//! Standard Algebraic Notation (SAN) resolution.
//!
//! SAN is the standard human-readable move notation: `"e4"`, `"Nf3"`,
//! `"Bxc6"`, `"O-O"`, `"e8=Q"`. This module only resolves SAN tokens
//! against a position (the direction a PGN reader needs); it does not
//! render moves back to SAN.

use crate::movegen::generate_moves;
use crate::Position;
use chess_core::{File, Move, MoveType, PieceType, Rank, Square};
use thiserror::Error;

/// Errors resolving a SAN token against a position.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SanError {
    #[error("empty SAN token")]
    Empty,
    #[error("invalid SAN format: {0}")]
    InvalidFormat(String),
    #[error("no legal move matches: {0}")]
    NoMatchingMove(String),
    #[error("ambiguous SAN, ties not broken by candidate filtering: {0}")]
    AmbiguousMove(String),
}

/// Resolves a SAN token against `position`. Does not require the result
/// to be legal against `position` beyond what candidate filtering
/// already guarantees (king safety is checked as the final filter for
/// piece moves; see [`try_san_to_move`] for an end-to-end legality
/// check).
pub fn san_to_move(position: &Position, san: &str) -> Result<Move, SanError> {
    let san = san.trim();
    if san.is_empty() {
        return Err(SanError::Empty);
    }

    // Strip trailing decorations: # + ! ?
    let san = san.trim_end_matches(['#', '+', '!', '?']);

    if san == "--" {
        return Ok(Move::NULL);
    }
    if san == "O-O-O" || san == "0-0-0" {
        return find_castling_move(position, false);
    }
    if san == "O-O" || san == "0-0" {
        return find_castling_move(position, true);
    }

    let first = san.chars().next().ok_or(SanError::Empty)?;
    if first.is_ascii_uppercase() {
        resolve_piece_move(position, san)
    } else {
        resolve_pawn_move(position, san)
    }
}

/// Resolves a SAN token and additionally checks the result is legal
/// against `position`. Returns `None` for empty/ambiguous/illegal SAN
/// rather than an error, matching the resolver's "null move on failure"
/// contract used by lenient PGN parsing.
pub fn try_san_to_move(position: &Position, san: &str) -> Option<Move> {
    let m = san_to_move(position, san).ok()?;
    if m.is_null() || position.is_move_legal(m) {
        Some(m)
    } else {
        None
    }
}

fn find_castling_move(position: &Position, kingside: bool) -> Result<Move, SanError> {
    let moves = generate_moves(position);
    let king_home = position.king_square(position.side_to_move());
    for m in moves.as_slice() {
        if m.is_castle() && m.from() == king_home {
            let is_kingside = m.to().file() > m.from().file();
            if is_kingside == kingside {
                return Ok(*m);
            }
        }
    }
    let name = if kingside { "O-O" } else { "O-O-O" };
    Err(SanError::NoMatchingMove(name.to_string()))
}

fn resolve_piece_move(position: &Position, san: &str) -> Result<Move, SanError> {
    let piece_type = piece_char_to_type(san.as_bytes()[0])
        .ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;

    let body = &san[1..];
    let body = body.replace('x', "");

    let chars: Vec<char> = body.chars().collect();
    if chars.len() < 2 {
        return Err(SanError::InvalidFormat(san.to_string()));
    }
    let to = parse_square(&chars[chars.len() - 2..])
        .ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;
    let disambig = &chars[..chars.len() - 2];
    let (from_file, from_rank) = parse_disambiguation(disambig)
        .ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;

    let us = position.side_to_move();
    let mut candidates: Vec<Move> = generate_moves(position)
        .as_slice()
        .iter()
        .copied()
        .filter(|m| {
            m.to() == to
                && !m.is_castle()
                && position.piece_at(m.from()).piece_type() == piece_type
                && position.piece_at(m.from()).color() == Some(us)
        })
        .collect();

    if let Some(file) = from_file {
        candidates.retain(|m| m.from().file() == file);
    }
    if let Some(rank) = from_rank {
        candidates.retain(|m| m.from().rank() == rank);
    }

    match candidates.len() {
        0 => Err(SanError::NoMatchingMove(san.to_string())),
        1 => Ok(candidates[0]),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

fn resolve_pawn_move(position: &Position, san: &str) -> Result<Move, SanError> {
    let (body, promotion) = match san.split_once('=') {
        Some((b, p)) => {
            let mut chars = p.chars();
            let c = chars.next().ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;
            let pt = PieceType::from_promotion_char(c)
                .ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;
            (b, Some(pt))
        }
        None => (san, None),
    };

    let body = body.replace('x', "");
    let chars: Vec<char> = body.chars().collect();
    if chars.len() < 2 {
        return Err(SanError::InvalidFormat(san.to_string()));
    }
    let to = parse_square(&chars[chars.len() - 2..])
        .ok_or_else(|| SanError::InvalidFormat(san.to_string()))?;
    // "a1" is a push; "ba1" (or "b" alone with the destination's rank, for
    // captures that may omit it) is a capture from the file to the left.
    let from_file = if chars.len() > 2 {
        char_to_file(chars[0]).ok_or_else(|| SanError::InvalidFormat(san.to_string()))?
    } else {
        to.file()
    };

    let us = position.side_to_move();
    let mut candidates: Vec<Move> = generate_moves(position)
        .as_slice()
        .iter()
        .copied()
        .filter(|m| {
            m.to() == to
                && m.from().file() == from_file
                && position.piece_at(m.from()).piece_type() == PieceType::Pawn
                && position.piece_at(m.from()).color() == Some(us)
        })
        .collect();

    if let Some(pt) = promotion {
        candidates.retain(|m| m.is_promotion() && m.promoted_piece().piece_type() == pt);
    } else {
        candidates.retain(|m| !m.is_promotion());
    }

    match candidates.len() {
        0 => Err(SanError::NoMatchingMove(san.to_string())),
        1 => Ok(candidates[0]),
        _ => Err(SanError::AmbiguousMove(san.to_string())),
    }
}

fn parse_disambiguation(chars: &[char]) -> Option<(Option<File>, Option<Rank>)> {
    match chars.len() {
        0 => Some((None, None)),
        1 => {
            if let Some(f) = char_to_file(chars[0]) {
                Some((Some(f), None))
            } else {
                char_to_rank(chars[0]).map(|r| (None, Some(r)))
            }
        }
        2 => {
            let file = char_to_file(chars[0])?;
            let rank = char_to_rank(chars[1])?;
            Some((Some(file), Some(rank)))
        }
        _ => None,
    }
}

fn parse_square(chars: &[char]) -> Option<Square> {
    let file = char_to_file(chars[0])?;
    let rank = char_to_rank(chars[1])?;
    Some(Square::new(file, rank))
}

fn piece_char_to_type(c: u8) -> Option<PieceType> {
    match c {
        b'N' => Some(PieceType::Knight),
        b'B' => Some(PieceType::Bishop),
        b'R' => Some(PieceType::Rook),
        b'Q' => Some(PieceType::Queen),
        b'K' => Some(PieceType::King),
        _ => None,
    }
}

fn char_to_file(c: char) -> Option<File> {
    match c {
        'a' => Some(File::A),
        'b' => Some(File::B),
        'c' => Some(File::C),
        'd' => Some(File::D),
        'e' => Some(File::E),
        'f' => Some(File::F),
        'g' => Some(File::G),
        'h' => Some(File::H),
        _ => None,
    }
}

fn char_to_rank(c: char) -> Option<Rank> {
    match c {
        '1' => Some(Rank::R1),
        '2' => Some(Rank::R2),
        '3' => Some(Rank::R3),
        '4' => Some(Rank::R4),
        '5' => Some(Rank::R5),
        '6' => Some(Rank::R6),
        '7' => Some(Rank::R7),
        '8' => Some(Rank::R8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pawn_push() {
        let pos = Position::startpos();
        let m = san_to_move(&pos, "e4").unwrap();
        assert_eq!(m.to(), Square::new(File::E, Rank::R4));
        assert_eq!(m.kind(), MoveType::Normal);
    }

    #[test]
    fn knight_move() {
        let pos = Position::startpos();
        let m = san_to_move(&pos, "Nf3").unwrap();
        assert_eq!(m.from(), Square::new(File::G, Rank::R1));
        assert_eq!(m.to(), Square::new(File::F, Rank::R3));
    }

    #[test]
    fn pawn_capture_with_explicit_file() {
        let pos =
            Position::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2")
                .unwrap();
        let m = san_to_move(&pos, "exd5").unwrap();
        assert_eq!(m.from(), Square::new(File::E, Rank::R4));
        assert_eq!(m.to(), Square::new(File::D, Rank::R5));
    }

    #[test]
    fn castling_both_sides() {
        let pos =
            Position::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let kingside = san_to_move(&pos, "O-O").unwrap();
        assert!(kingside.is_castle());
        assert_eq!(kingside.to(), Square::H1);

        let queenside = san_to_move(&pos, "O-O-O").unwrap();
        assert!(queenside.is_castle());
        assert_eq!(queenside.to(), Square::A1);
    }

    #[test]
    fn promotion() {
        let pos = Position::from_fen("8/P7/8/8/8/8/8/4K1k1 w - - 0 1").unwrap();
        let m = san_to_move(&pos, "a8=Q").unwrap();
        assert!(m.is_promotion());
        assert_eq!(m.promoted_piece().piece_type(), PieceType::Queen);
    }

    #[test]
    fn knight_disambiguation_by_file() {
        let pos = Position::from_fen("8/8/8/8/8/8/8/1N1K1N1k w - - 0 1").unwrap();
        let m = san_to_move(&pos, "Nbd2").unwrap();
        assert_eq!(m.from(), Square::new(File::B, Rank::R1));
    }

    #[test]
    fn check_suffix_is_stripped() {
        let pos = Position::from_fen("8/8/8/8/8/8/8/4K1Qk w - - 0 1").unwrap();
        let m = san_to_move(&pos, "Qh2+").unwrap();
        assert_eq!(m.to(), Square::new(File::H, Rank::R2));
    }

    #[test]
    fn invalid_san_is_rejected() {
        let pos = Position::startpos();
        assert!(san_to_move(&pos, "").is_err());
        assert!(san_to_move(&pos, "Ke4").is_err());
        assert!(san_to_move(&pos, "xyz").is_err());
    }

    #[test]
    fn try_variant_rejects_pinned_piece_move() {
        // Rook on e-file pinned to the king; Nc3 would be legal SAN syntax
        // but moving the knight is fine here since it isn't pinned, so
        // instead check that an illegal king move yields None.
        let pos = Position::from_fen("4r3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(try_san_to_move(&pos, "Kxe2"), None);
    }

    #[test]
    fn roundtrip_every_legal_move_resolves_back() {
        let pos = Position::startpos();
        let moves = generate_moves(&pos);
        for m in moves.as_slice() {
            // Build a minimal disambiguation-free SAN by destination only
            // where unambiguous; this smoke-tests that plain pawn pushes
            // and unique knight moves resolve.
            if position_has_unique_mover_to(&pos, *m) {
                let square = m.to().to_algebraic();
                if position_piece_is_pawn(&pos, *m) {
                    if let Ok(resolved) = san_to_move(&pos, &square) {
                        assert_eq!(resolved, *m);
                    }
                }
            }
        }
    }

    fn position_piece_is_pawn(pos: &Position, m: Move) -> bool {
        pos.piece_at(m.from()).piece_type() == PieceType::Pawn
    }

    fn position_has_unique_mover_to(pos: &Position, m: Move) -> bool {
        generate_moves(pos)
            .as_slice()
            .iter()
            .filter(|o| o.to() == m.to() && pos.piece_at(o.from()).piece_type() == pos.piece_at(m.from()).piece_type())
            .count()
            == 1
    }
}
