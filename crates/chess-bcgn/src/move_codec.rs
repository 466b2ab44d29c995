//! Per-move encode/decode for all three BCGN compression levels, wired onto
//! `chess-engine`'s existing position-dependent codecs for levels 0 and 1,
//! and [`crate::level2`] for level 2's bit-packed form.

use chess_core::{CompressedMove, Move};
use chess_engine::{move_index, Position};

use crate::bits::{used_bits, BitReader, BitWriter};
use crate::error::BcgnError;
use crate::level2::{num_own_pieces, piece_id_and_from, piece_type_at_nth_own_piece, PieceMoves};

pub(crate) fn write_level0(out: &mut Vec<u8>, mv: Move) {
    out.extend_from_slice(&CompressedMove::compress(mv).to_be_bytes());
}

pub(crate) fn read_level0(data: &[u8], pos: &Position) -> Result<(Move, usize), BcgnError> {
    if data.len() < 2 {
        return Err(BcgnError::TruncatedRecord);
    }
    let cm = CompressedMove::from_be_bytes([data[0], data[1]]);
    Ok((cm.decompress(pos.side_to_move()), 2))
}

pub(crate) fn write_level1(out: &mut Vec<u8>, pos: &Position, mv: Move) {
    if move_index::requires_long_move_index(pos) {
        out.extend_from_slice(&move_index::move_to_long_index(pos, mv).to_be_bytes());
    } else {
        out.push(move_index::move_to_short_index(pos, mv));
    }
}

pub(crate) fn read_level1(data: &[u8], pos: &Position) -> Result<(Move, usize), BcgnError> {
    if move_index::requires_long_move_index(pos) {
        if data.len() < 2 {
            return Err(BcgnError::TruncatedRecord);
        }
        let index = u16::from_be_bytes([data[0], data[1]]);
        let mv = move_index::long_index_to_move(pos, index).map_err(|e| BcgnError::MalformedMovetext(e.to_string()))?;
        Ok((mv, 2))
    } else {
        let index = *data.first().ok_or(BcgnError::TruncatedRecord)?;
        let mv = move_index::short_index_to_move(pos, index).map_err(|e| BcgnError::MalformedMovetext(e.to_string()))?;
        Ok((mv, 1))
    }
}

pub(crate) fn write_level2(w: &mut BitWriter, pos: &Position, mv: Move) {
    let (piece_id, from, pt) = piece_id_and_from(pos, mv);
    let piece_moves = PieceMoves::compute(pos, from, pt);

    w.push(piece_id, used_bits(num_own_pieces(pos) - 1));
    w.push(piece_moves.encode(mv), used_bits(piece_moves.num_moves() - 1));
}

pub(crate) fn read_level2(r: &mut BitReader<'_>, pos: &Position) -> Result<Move, BcgnError> {
    let piece_id = r.extract(used_bits(num_own_pieces(pos) - 1))?;
    let (from, pt) = piece_type_at_nth_own_piece(pos, piece_id)?;
    let piece_moves = PieceMoves::compute(pos, from, pt);
    let move_id = r.extract(used_bits(piece_moves.num_moves() - 1))?;
    piece_moves.decode(pos, from, pos.side_to_move(), move_id)
}
