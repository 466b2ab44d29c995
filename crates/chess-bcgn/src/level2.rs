//! BCGN level-2 move encoding: a `pieceId` selecting the
//! source piece among the side to move's own pieces (ascending square
//! order), followed by a `moveId` selecting one of that piece's legal
//! destinations given the current occupancy. Both widths are derived from
//! counts both sides of the stream already know, so no width is ever
//! transmitted.

use chess_core::{Color, Move, Piece, PieceType, Square};
use chess_engine::{bishop_attacks, king_attacks, knight_attacks, pawn_attacks, queen_attacks, rook_attacks, Bitboard, Position};

use crate::error::BcgnError;

/// Knight=0, Bishop=1, Rook=2, Queen=3 — same convention the wire's
/// `CompressedMove` promotion bits use.
fn promotion_slot(pt: PieceType) -> u32 {
    match pt {
        PieceType::Knight => 0,
        PieceType::Bishop => 1,
        PieceType::Rook => 2,
        _ => 3,
    }
}

fn promotion_slot_to_piece_type(slot: u32) -> PieceType {
    match slot & 0b11 {
        0 => PieceType::Knight,
        1 => PieceType::Bishop,
        2 => PieceType::Rook,
        _ => PieceType::Queen,
    }
}

fn rook_home(side: Color, kingside: bool) -> Square {
    match (side, kingside) {
        (Color::White, true) => Square::H1,
        (Color::White, false) => Square::A1,
        (Color::Black, true) => Square::H8,
        (Color::Black, false) => Square::A8,
    }
}

/// The `n`-th set square of `bb` in ascending order, if any.
fn nth_set_square(mut bb: Bitboard, n: u32) -> Option<Square> {
    for _ in 0..n {
        bb.pop_lsb()?;
    }
    bb.pop_lsb()
}

/// The index of `sq` among the ascending set bits of `bb`, if present.
fn index_of_square(bb: Bitboard, sq: Square) -> Option<u32> {
    if !bb.contains(sq) {
        return None;
    }
    Some((bb & Bitboard::before(sq)).count())
}

/// A piece's encoded destination set, computed once and shared by both the
/// encoder (which maps a known move to a `moveId`) and the decoder (which
/// needs `num_moves` before it knows how many bits to read).
pub(crate) enum PieceMoves {
    Pawn { destinations: Bitboard, is_promotion_rank: bool },
    King { attacks: Bitboard, num_castling_rights: u32, castle_queenside_first: bool },
    Other { attacks: Bitboard },
}

impl PieceMoves {
    pub fn compute(pos: &Position, from: Square, pt: PieceType) -> PieceMoves {
        let side = pos.side_to_move();
        let own = pos.color_bb(side);
        let occ = pos.occupied();

        match pt {
            PieceType::Pawn => {
                let their = pos.color_bb(side.opposite());
                let ep = pos.en_passant_square();
                let mut targets = their;
                if ep.is_ok() {
                    targets.set(ep);
                }
                let mut destinations = pawn_attacks(from, side) & targets;

                let forward = side.pawn_direction();
                if let Some(one) = from.offset(0, forward) {
                    if !occ.contains(one) {
                        destinations.set(one);
                        let start_rank = match side {
                            Color::White => chess_core::Rank::R2,
                            Color::Black => chess_core::Rank::R7,
                        };
                        if from.rank() == start_rank {
                            if let Some(two) = one.offset(0, forward) {
                                if !occ.contains(two) {
                                    destinations.set(two);
                                }
                            }
                        }
                    }
                }

                let promotion_rank = match side {
                    Color::White => chess_core::Rank::R7,
                    Color::Black => chess_core::Rank::R2,
                };
                PieceMoves::Pawn { destinations, is_promotion_rank: from.rank() == promotion_rank }
            }
            PieceType::King => {
                let attacks = king_attacks(from) & !own;
                let rights = pos.castling_rights();
                let has_kingside = rights.can_castle_kingside(side);
                let has_queenside = rights.can_castle_queenside(side);
                let num_castling_rights = has_kingside as u32 + has_queenside as u32;
                PieceMoves::King { attacks, num_castling_rights, castle_queenside_first: has_queenside }
            }
            PieceType::Knight => PieceMoves::Other { attacks: knight_attacks(from) & !own },
            PieceType::Bishop => PieceMoves::Other { attacks: bishop_attacks(from, occ) & !own },
            PieceType::Rook => PieceMoves::Other { attacks: rook_attacks(from, occ) & !own },
            PieceType::Queen => PieceMoves::Other { attacks: queen_attacks(from, occ) & !own },
            PieceType::None => unreachable!("no piece at a pieceId slot"),
        }
    }

    pub fn num_moves(&self) -> u32 {
        match self {
            PieceMoves::Pawn { destinations, is_promotion_rank } => {
                let count = destinations.count();
                if *is_promotion_rank {
                    count * 4
                } else {
                    count
                }
            }
            PieceMoves::King { attacks, num_castling_rights, .. } => attacks.count() + num_castling_rights,
            PieceMoves::Other { attacks } => attacks.count(),
        }
    }

    /// Encodes a legal move consistent with this piece's moves into its
    /// `moveId`.
    pub fn encode(&self, mv: Move) -> u32 {
        match self {
            PieceMoves::Pawn { destinations, is_promotion_rank } => {
                let dest_index = index_of_square(*destinations, mv.to()).expect("move's destination is in its own destination set");
                if *is_promotion_rank {
                    dest_index * 4 + promotion_slot(mv.promoted_piece().piece_type())
                } else {
                    dest_index
                }
            }
            PieceMoves::King { attacks, castle_queenside_first, .. } => {
                if mv.is_castle() {
                    let queenside = mv.to().file() == chess_core::File::A;
                    let idx = if queenside == *castle_queenside_first { 0 } else { 1 };
                    attacks.count() + idx
                } else {
                    index_of_square(*attacks, mv.to()).expect("move's destination is in its own attack set")
                }
            }
            PieceMoves::Other { attacks } => index_of_square(*attacks, mv.to()).expect("move's destination is in its own attack set"),
        }
    }

    /// Decodes `move_id` (already known to be `< self.num_moves()`) back
    /// into a [`Move`] from `from`.
    pub fn decode(&self, pos: &Position, from: Square, side: Color, move_id: u32) -> Result<Move, BcgnError> {
        match self {
            PieceMoves::Pawn { destinations, is_promotion_rank } => {
                if *is_promotion_rank {
                    let dest_index = move_id / 4;
                    let promoted = Piece::new(promotion_slot_to_piece_type(move_id % 4), side);
                    let to = nth_set_square(*destinations, dest_index)
                        .ok_or_else(|| BcgnError::MalformedMovetext("pawn promotion destination out of range".to_string()))?;
                    Ok(Move::promotion(from, to, promoted))
                } else {
                    let to = nth_set_square(*destinations, move_id)
                        .ok_or_else(|| BcgnError::MalformedMovetext("pawn destination out of range".to_string()))?;
                    let ep = pos.en_passant_square();
                    if ep.is_ok() && to == ep {
                        Ok(Move::en_passant(from, to))
                    } else {
                        Ok(Move::normal(from, to))
                    }
                }
            }
            PieceMoves::King { attacks, castle_queenside_first, .. } => {
                let attacks_size = attacks.count();
                if move_id >= attacks_size {
                    let idx = move_id - attacks_size;
                    let queenside = (idx == 0) == *castle_queenside_first;
                    Ok(Move::castle(from, rook_home(side, !queenside)))
                } else {
                    let to = nth_set_square(*attacks, move_id)
                        .ok_or_else(|| BcgnError::MalformedMovetext("king destination out of range".to_string()))?;
                    Ok(Move::normal(from, to))
                }
            }
            PieceMoves::Other { attacks } => {
                let to = nth_set_square(*attacks, move_id)
                    .ok_or_else(|| BcgnError::MalformedMovetext("piece destination out of range".to_string()))?;
                Ok(Move::normal(from, to))
            }
        }
    }
}

pub(crate) fn piece_id_and_from(pos: &Position, mv: Move) -> (u32, Square, PieceType) {
    let side = pos.side_to_move();
    let from = mv.from();
    let pt = pos.piece_at(from).piece_type();
    let id = index_of_square(pos.pieces_of(pt, side), from).expect("mover is one of its own side's pieces");
    (id, from, pt)
}

pub(crate) fn piece_type_at_nth_own_piece(pos: &Position, piece_id: u32) -> Result<(Square, PieceType), BcgnError> {
    let side = pos.side_to_move();
    let own = pos.color_bb(side);
    let from = nth_set_square(own, piece_id).ok_or_else(|| BcgnError::MalformedMovetext("pieceId out of range".to_string()))?;
    Ok((from, pos.piece_at(from).piece_type()))
}

pub(crate) fn num_own_pieces(pos: &Position) -> u32 {
    pos.color_bb(pos.side_to_move()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{used_bits, BitReader, BitWriter};
    use chess_engine::movegen::generate_moves;

    fn roundtrip_every_legal_move(pos: &Position) {
        for &mv in generate_moves(pos).as_slice() {
            let (piece_id, from, pt) = piece_id_and_from(pos, mv);
            let piece_moves = PieceMoves::compute(pos, from, pt);
            let move_id = piece_moves.encode(mv);
            assert!(move_id < piece_moves.num_moves(), "move_id {move_id} out of range for {mv:?}");

            let mut w = BitWriter::new();
            w.push(piece_id, used_bits(num_own_pieces(pos) - 1));
            w.push(move_id, used_bits(piece_moves.num_moves() - 1));
            let bytes = w.into_bytes();

            let mut r = BitReader::new(&bytes);
            let decoded_piece_id = r.extract(used_bits(num_own_pieces(pos) - 1)).unwrap();
            assert_eq!(decoded_piece_id, piece_id);
            let (decoded_from, decoded_pt) = piece_type_at_nth_own_piece(pos, decoded_piece_id).unwrap();
            assert_eq!(decoded_from, from);
            assert_eq!(decoded_pt, pt);
            let decoded_piece_moves = PieceMoves::compute(pos, decoded_from, decoded_pt);
            let decoded_move_id = r.extract(used_bits(decoded_piece_moves.num_moves() - 1)).unwrap();
            let decoded = decoded_piece_moves.decode(pos, decoded_from, pos.side_to_move(), decoded_move_id).unwrap();
            assert_eq!(decoded, mv, "roundtrip mismatch for {mv:?}");
        }
    }

    #[test]
    fn startpos_every_move_roundtrips() {
        roundtrip_every_legal_move(&Position::startpos());
    }

    #[test]
    fn castling_rights_roundtrip() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        roundtrip_every_legal_move(&pos);
    }

    #[test]
    fn partial_castling_rights_roundtrip() {
        let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w Kq - 0 1").unwrap();
        roundtrip_every_legal_move(&pos);
    }

    #[test]
    fn promotion_roundtrips() {
        let pos = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        roundtrip_every_legal_move(&pos);
    }

    #[test]
    fn en_passant_roundtrips() {
        let pos = Position::from_fen("rnbqkbnr/pppp1ppp/8/4pP2/8/8/PPPPP1PP/RNBQKBNR w KQkq e6 0 1").unwrap();
        roundtrip_every_legal_move(&pos);
    }

    #[test]
    fn single_legal_move_uses_zero_bits_for_piece_id() {
        // A position where the side to move has exactly one piece: pieceId
        // needs zero bits, only moveId is transmitted.
        let pos = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(used_bits(num_own_pieces(&pos) - 1), 0);
        roundtrip_every_legal_move(&pos);
    }
}
