//! Move-index codec.
//!
//! Maps a legal `(Position, Move)` pair to a short integer and back. The
//! mapping is position-dependent: the same index decodes to different
//! moves in different positions, because it is built by enumerating the
//! side to move's own pieces (in ascending-square order) and, for each,
//! its empty-board destination squares (also ascending). This lets most
//! positions fit a move in a single byte — see [`requires_long_move_index`].
//!
//! Same offset-accumulation decode loop, castling/king/pawn special cases,
//! and empty-board destination tables on every call, built against this
//! crate's bitboard/position types.

use std::sync::OnceLock;

use chess_core::{Color, Move, MoveType, Piece, PieceType, Square};
use thiserror::Error;

use crate::bitboard::Bitboard;
use crate::movegen::attacks;
use crate::Position;

/// Errors decoding a move index against a position.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveIndexError {
    #[error("move index {index} is out of range for this position")]
    OutOfRange { index: u16 },
}

const CASTLING_SLOTS: u32 = 2;
const KING_SLOTS: u32 = 8;

/// `maxDestinationCounts`, fixed by the original format: the widest
/// possible empty-board destination-slot count per piece type.
const fn max_destination_count(pt: PieceType) -> u32 {
    match pt {
        PieceType::Pawn => 12,
        PieceType::Knight => 8,
        PieceType::Bishop => 13,
        PieceType::Rook => 14,
        PieceType::Queen => 27,
        PieceType::King => 8,
        PieceType::None => 0,
    }
}

/// Empty-board destination tables for the non-pawn piece types, built once
/// from this crate's own attack tables: destinations for sliders use
/// empty-board rays in ascending-square order.
struct DestinationTables {
    /// `squares[pt][from][i]` = the i-th ascending destination square.
    squares: [[[Square; 27]; 64]; 4],
    /// `counts[pt][from]` = how many of `squares[pt][from]` are valid.
    counts: [[u8; 64]; 4],
    /// `index_of[pt][from][to]` = the slot index of `to` among `from`'s
    /// destinations, if `to` is reachable.
    index_of: [[[u8; 64]; 64]; 4],
}

/// Index into [`DestinationTables`]'s piece-type-major arrays.
fn table_slot(pt: PieceType) -> usize {
    match pt {
        PieceType::Knight => 0,
        PieceType::Bishop => 1,
        PieceType::Rook => 2,
        PieceType::Queen => 3,
        other => unreachable!("no destination table for {other:?}"),
    }
}

fn empty_board_attacks(pt: PieceType, sq: Square) -> Bitboard {
    match pt {
        PieceType::Knight => attacks::knight_attacks(sq),
        PieceType::Bishop => attacks::bishop_attacks(sq, Bitboard::EMPTY),
        PieceType::Rook => attacks::rook_attacks(sq, Bitboard::EMPTY),
        PieceType::Queen => attacks::bishop_attacks(sq, Bitboard::EMPTY) | attacks::rook_attacks(sq, Bitboard::EMPTY),
        other => unreachable!("no empty-board attacks for {other:?}"),
    }
}

impl DestinationTables {
    fn build() -> Self {
        let mut squares = [[[Square::NONE; 27]; 64]; 4];
        let mut counts = [[0u8; 64]; 4];
        let mut index_of = [[[0u8; 64]; 64]; 4];

        for &pt in &[PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen] {
            let slot = table_slot(pt);
            for from_idx in 0u8..64 {
                let from = Square::from_index(from_idx).expect("0..64 are valid square indices");
                let dests = empty_board_attacks(pt, from);
                let mut i = 0u8;
                for to in dests {
                    squares[slot][from.index() as usize][i as usize] = to;
                    counts[slot][from.index() as usize] = i + 1;
                    index_of[slot][from.index() as usize][to.index() as usize] = i;
                    i += 1;
                }
            }
        }

        DestinationTables { squares, counts, index_of }
    }
}

static TABLES: OnceLock<DestinationTables> = OnceLock::new();

fn tables() -> &'static DestinationTables {
    TABLES.get_or_init(DestinationTables::build)
}

/// The `idx`-th ascending empty-board destination of a `pt` piece on `from`.
fn destination_square_by_index(pt: PieceType, from: Square, idx: u8) -> Square {
    tables().squares[table_slot(pt)][from.index() as usize][idx as usize]
}

/// The slot index of `to` among `from`'s empty-board destinations.
fn destination_index(pt: PieceType, from: Square, to: Square) -> u8 {
    tables().index_of[table_slot(pt)][from.index() as usize][to.index() as usize]
}

/// `0` for king-side, `1` for queen-side. Castle moves are encoded
/// king-captures-own-rook, so `to` is the rook's home square and its file
/// tells us which side.
fn castling_destination_index(to: Square) -> u32 {
    if to.file() == chess_core::File::A {
        1
    } else {
        0
    }
}

/// `pawnDestinationIndex`: push/capture encoded as
/// `(to - from)` (White) or `(from - to)` (Black) minus 7, giving
/// capture-left=0, push=1, capture-right=2, double-push=9; promotions
/// multiply by 4 and add the promoted-piece offset from Knight.
fn pawn_destination_index(from: Square, to: Square, side_to_move: Color, promoted: PieceType) -> u32 {
    let raw = match side_to_move {
        Color::White => to.index() as i32 - from.index() as i32 - 7,
        Color::Black => from.index() as i32 - to.index() as i32 - 7,
    };
    let mut idx = raw as u32;
    if promoted != PieceType::None {
        idx <<= 2;
        idx += promoted.index() as u32 - PieceType::Knight.index() as u32;
    }
    idx
}

/// Inverse of [`pawn_destination_index`], needing the position's live
/// en-passant square to distinguish a normal push/capture from en passant.
fn destination_index_to_pawn_move(ep_square: Square, index: u32, from: Square, side_to_move: Color) -> Move {
    let from_rank_7 = match side_to_move {
        Color::White => from.rank() == chess_core::Rank::R7,
        Color::Black => from.rank() == chess_core::Rank::R2,
    };

    let (index, promoted) = if from_rank_7 {
        let promoted_type = piece_type_from_promotion_slot((index & 3) as u8);
        (index >> 2, Piece::new(promoted_type, side_to_move))
    } else {
        (index, Piece::NONE)
    };

    let offset = match side_to_move {
        Color::White => index as i32 + 7,
        Color::Black => -(index as i32 + 7),
    };
    let to = Square::from_index((from.index() as i32 + offset) as u8).expect("pawn destination stays on board");

    if from_rank_7 {
        Move::promotion(from, to, promoted)
    } else if to == ep_square {
        Move::en_passant(from, to)
    } else {
        Move::normal(from, to)
    }
}

/// Maps a 2-bit promotion slot (Knight=0, Bishop=1, Rook=2, Queen=3) back
/// to its [`PieceType`].
fn piece_type_from_promotion_slot(slot: u8) -> PieceType {
    match slot {
        0 => PieceType::Knight,
        1 => PieceType::Bishop,
        2 => PieceType::Rook,
        _ => PieceType::Queen,
    }
}

/// We cannot guarantee a move index fits in a byte once the side to move
/// has 3 or more queens: `219 + 13*N` exceeds 255 starting at `N = 3`
/// (`219 + 13*2 = 245` fits, `219 + 13*3 = 258` doesn't).
pub fn requires_long_move_index(pos: &Position) -> bool {
    pos.pieces_of(PieceType::Queen, pos.side_to_move()).count() > 2
}

fn piece_type_base_offset(pos: &Position, us: Color, pt: PieceType) -> u32 {
    let mut offset = CASTLING_SLOTS;
    if pt == PieceType::King {
        return offset;
    }
    offset += KING_SLOTS;
    if pt == PieceType::Pawn {
        return offset;
    }
    offset += max_destination_count(PieceType::Pawn) * pos.pieces_of(PieceType::Pawn, us).count();
    if pt == PieceType::Knight {
        return offset;
    }
    offset += max_destination_count(PieceType::Knight) * pos.pieces_of(PieceType::Knight, us).count();
    if pt == PieceType::Bishop {
        return offset;
    }
    offset += max_destination_count(PieceType::Bishop) * pos.pieces_of(PieceType::Bishop, us).count();
    if pt == PieceType::Rook {
        return offset;
    }
    offset += max_destination_count(PieceType::Rook) * pos.pieces_of(PieceType::Rook, us).count();
    offset
}

fn move_to_index(pos: &Position, m: Move) -> u32 {
    let us = pos.side_to_move();

    if m.kind() == MoveType::Castle {
        return castling_destination_index(m.to());
    }

    let from = m.from();
    let to = m.to();
    let piece_type = pos.piece_at(from).piece_type();

    let mut offset = piece_type_base_offset(pos, us, piece_type);

    let pieces_before = pos.pieces_of(piece_type, us) & Bitboard::before(from);
    offset += max_destination_count(piece_type) * pieces_before.count();

    offset += if piece_type == PieceType::Pawn {
        pawn_destination_index(from, to, us, m.promoted_piece().piece_type())
    } else {
        destination_index(piece_type, from, to) as u32
    };

    offset
}

/// Encodes `m` as a short index. Precondition: `!requires_long_move_index(pos)`.
pub fn move_to_short_index(pos: &Position, m: Move) -> u8 {
    move_to_index(pos, m) as u8
}

/// Encodes `m` as a long index. Always valid, used when
/// `requires_long_move_index(pos)`.
pub fn move_to_long_index(pos: &Position, m: Move) -> u16 {
    move_to_index(pos, m) as u16
}

fn index_to_move(pos: &Position, index: u32) -> Result<Move, MoveIndexError> {
    let us = pos.side_to_move();

    if index < CASTLING_SLOTS + KING_SLOTS {
        if index < CASTLING_SLOTS {
            // index 0 => king-side, 1 => queen-side.
            let rook_home_file = if index == 1 { chess_core::File::A } else { chess_core::File::H };
            let rook_home_rank = match us {
                Color::White => chess_core::Rank::R1,
                Color::Black => chess_core::Rank::R8,
            };
            let king_home = pos.king_square(us);
            return Ok(Move::castle(king_home, Square::new(rook_home_file, rook_home_rank)));
        }
        let from = pos.king_square(us);
        let to = destination_square_by_index(PieceType::King, from, (index - CASTLING_SLOTS) as u8);
        return Ok(Move::normal(from, to));
    }

    let mut offset = CASTLING_SLOTS + KING_SLOTS;

    let pawn_count = pos.pieces_of(PieceType::Pawn, us).count();
    let next = offset + max_destination_count(PieceType::Pawn) * pawn_count;
    if index < next {
        let local = index - offset;
        let n = local / max_destination_count(PieceType::Pawn);
        let from = nth_piece_square(pos.pieces_of(PieceType::Pawn, us), n)
            .ok_or(MoveIndexError::OutOfRange { index: index as u16 })?;
        let pawn_local_index = local - n * max_destination_count(PieceType::Pawn);
        return Ok(destination_index_to_pawn_move(pos.en_passant_square(), pawn_local_index, from, us));
    }
    offset = next;

    for pt in [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen] {
        let count = pos.pieces_of(pt, us).count();
        let next = offset + max_destination_count(pt) * count;
        if index < next {
            let local = index - offset;
            let n = local / max_destination_count(pt);
            let from = nth_piece_square(pos.pieces_of(pt, us), n)
                .ok_or(MoveIndexError::OutOfRange { index: index as u16 })?;
            let dest_index = (local - n * max_destination_count(pt)) as u8;
            let to = destination_square_by_index(pt, from, dest_index);
            return Ok(Move::normal(from, to));
        }
        offset = next;
    }

    Err(MoveIndexError::OutOfRange { index: index as u16 })
}

/// The square of the `n`-th set bit of `bb` in ascending order, if any.
fn nth_piece_square(mut bb: Bitboard, n: u32) -> Option<Square> {
    for _ in 0..n {
        bb.pop_lsb()?;
    }
    bb.pop_lsb()
}

/// Decodes a short index. Precondition: `!requires_long_move_index(pos)`.
pub fn short_index_to_move(pos: &Position, index: u8) -> Result<Move, MoveIndexError> {
    index_to_move(pos, index as u32)
}

/// Decodes a long index. Precondition: `requires_long_move_index(pos)`.
pub fn long_index_to_move(pos: &Position, index: u16) -> Result<Move, MoveIndexError> {
    index_to_move(pos, index as u32)
}
