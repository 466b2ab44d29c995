//! Board and position representation (component C).
//!
//! [`Board`] holds only piece placement. [`Position`] adds side to move,
//! castling rights, and the en-passant square, and is the type every other
//! component in this crate (movegen, the compressed-position codec, the
//! move-index codec, SAN resolution) operates on.

use chess_core::{CastlingRights, Color, FenError, FenParser, Move, MoveType, Piece, PieceType, ReverseMove, Square};

use crate::bitboard::Bitboard;
use crate::movegen::attacks;

/// Piece placement: a 64-entry piece array kept in sync with per-piece and
/// per-color bitboards.
///
/// Invariant: `piece_bb[Piece::NONE.index()] | color_bb[White] | color_bb[Black]`
/// covers every square exactly once.
#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    squares: [Piece; 64],
    piece_bb: [Bitboard; 13],
    color_bb: [Bitboard; 2],
}

impl Board {
    /// An empty board (every square holds [`Piece::NONE`]).
    pub fn empty() -> Self {
        Board {
            squares: [Piece::NONE; 64],
            piece_bb: [Bitboard::EMPTY; 13],
            color_bb: [Bitboard::EMPTY; 2],
        }
    }

    /// Places `piece` on `sq`, replacing whatever was there. Idempotent:
    /// placing the same piece that is already on `sq` is a no-op.
    pub fn place(&mut self, piece: Piece, sq: Square) {
        let old = self.squares[sq.index() as usize];
        if old == piece {
            return;
        }
        self.piece_bb[old.index() as usize].clear(sq);
        if let Some(color) = old.color() {
            self.color_bb[color.index()].clear(sq);
        }
        self.squares[sq.index() as usize] = piece;
        self.piece_bb[piece.index() as usize].set(sq);
        if let Some(color) = piece.color() {
            self.color_bb[color.index()].set(sq);
        }
    }

    /// Returns the piece at `sq` ([`Piece::NONE`] if empty).
    #[inline]
    pub fn piece_at(&self, sq: Square) -> Piece {
        self.squares[sq.index() as usize]
    }

    /// Bitboard of every square holding `piece` (any color encoded in
    /// `piece` itself).
    #[inline]
    pub fn piece_bb(&self, piece: Piece) -> Bitboard {
        self.piece_bb[piece.index() as usize]
    }

    /// Bitboard of every square holding a piece of `piece_type` and `color`.
    #[inline]
    pub fn pieces_of(&self, piece_type: PieceType, color: Color) -> Bitboard {
        self.piece_bb(Piece::new(piece_type, color))
    }

    /// Bitboard of every square holding a piece of `color`.
    #[inline]
    pub fn color_bb(&self, color: Color) -> Bitboard {
        self.color_bb[color.index()]
    }

    /// Bitboard of every occupied square.
    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.color_bb[0] | self.color_bb[1]
    }

    /// Bitboard of every empty square.
    #[inline]
    pub fn empty_squares(&self) -> Bitboard {
        !self.occupied()
    }

    /// The (unique, by construction) square holding `color`'s king, if any.
    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces_of(PieceType::King, color).first_or_none()
    }
}

trait FirstOrNone {
    fn first_or_none(self) -> Option<Square>;
}

impl FirstOrNone for Bitboard {
    #[inline]
    fn first_or_none(self) -> Option<Square> {
        if self.is_empty() {
            None
        } else {
            Some(self.first())
        }
    }
}

/// King home squares, indexed by `Color::index()`.
pub const KING_HOME: [Square; 2] = [Square::E1, Square::E8];
/// Rook home squares for (white-kingside, white-queenside, black-kingside,
/// black-queenside), i.e. the `to` square of a castling [`Move`].
pub const ROOK_HOME_KINGSIDE: [Square; 2] = [Square::H1, Square::H8];
pub const ROOK_HOME_QUEENSIDE: [Square; 2] = [Square::A1, Square::A8];

/// Where the king and rook land for a castle move, given the mover's color
/// and the rook's home square (the move's `to`). Chess960 is out of scope,
/// so these squares are fixed.
pub fn castle_landing_squares(color: Color, rook_home: Square) -> (Square, Square) {
    let kingside = rook_home == ROOK_HOME_KINGSIDE[color.index()];
    match (color, kingside) {
        (Color::White, true) => (Square::G1, Square::F1),
        (Color::White, false) => (Square::C1, Square::D1),
        (Color::Black, true) => (Square::G8, Square::F8),
        (Color::Black, false) => (Square::C8, Square::D8),
    }
}

/// The squares the king actually traverses (home, through, landing) during
/// a castle — all of them must be unattacked for the move to be legal.
fn castle_king_path(color: Color, kingside: bool) -> [Square; 3] {
    match (color, kingside) {
        (Color::White, true) => [Square::E1, Square::F1, Square::G1],
        (Color::White, false) => [Square::E1, Square::D1, Square::C1],
        (Color::Black, true) => [Square::E8, Square::F8, Square::G8],
        (Color::Black, false) => [Square::E8, Square::D8, Square::C8],
    }
}

/// Squares (other than the king/rook themselves) that must be empty for a
/// castle to be possible.
fn castle_empty_path(color: Color, kingside: bool) -> Bitboard {
    let squares: &[Square] = match (color, kingside) {
        (Color::White, true) => &[Square::F1, Square::G1],
        (Color::White, false) => &[Square::B1, Square::C1, Square::D1],
        (Color::Black, true) => &[Square::F8, Square::G8],
        (Color::Black, false) => &[Square::B8, Square::C8, Square::D8],
    };
    squares.iter().fold(Bitboard::EMPTY, |acc, &s| acc | Bitboard::from_square(s))
}

/// `preservedCastlingRights[sq]`: the castling-rights mask to AND into the
/// current rights whenever a move's `from` or `to` square is `sq`. Neutral
/// squares preserve everything; king/rook home squares clear the rights
/// they anchor.
const fn preserved_castling_rights(sq: Square) -> u8 {
    match sq.index() {
        4 => !(CastlingRights::WHITE_KINGSIDE | CastlingRights::WHITE_QUEENSIDE), // e1
        60 => !(CastlingRights::BLACK_KINGSIDE | CastlingRights::BLACK_QUEENSIDE), // e8
        7 => !CastlingRights::WHITE_KINGSIDE,   // h1
        0 => !CastlingRights::WHITE_QUEENSIDE,  // a1
        63 => !CastlingRights::BLACK_KINGSIDE,  // h8
        56 => !CastlingRights::BLACK_QUEENSIDE, // a8
        _ => 0b1111,
    }
}

/// Complete chess position: a [`Board`] plus side to move, castling
/// rights, and the en-passant square.
///
/// Invariant 1: the side NOT to move is never in check.
/// Invariant 2: `en_passant` is set only when the side to move has a pawn
/// that can *legally* capture onto it.
#[derive(Clone, PartialEq, Eq)]
pub struct Position {
    board: Board,
    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Square,
}

impl Position {
    /// Builds a position directly from its parts, bypassing FEN parsing.
    /// Used by the compressed-position codec, which reconstructs a
    /// [`Board`] nibble-by-nibble rather than from a FEN string.
    pub(crate) fn from_parts(board: Board, side_to_move: Color, castling: CastlingRights, en_passant: Square) -> Self {
        Position { board, side_to_move, castling, en_passant }
    }

    /// An empty board, White to move, no castling rights, no en passant.
    pub fn empty() -> Self {
        Position {
            board: Board::empty(),
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: Square::NONE,
        }
    }

    /// The standard starting position.
    pub fn startpos() -> Self {
        Self::from_fen(FenParser::STARTPOS).expect("STARTPOS is valid")
    }

    /// Parses a FEN string into a position.
    ///
    /// The en-passant square is nullified (per invariant 2) if no pawn of
    /// the side to move could legally capture onto it.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parsed = FenParser::parse(fen)?;
        let mut board = Board::empty();

        for (rank_idx, rank_str) in parsed.piece_placement.split('/').enumerate() {
            let rank = 7 - rank_idx;
            let mut file = 0usize;
            for c in rank_str.chars() {
                if let Some(digit) = c.to_digit(10) {
                    file += digit as usize;
                } else if let Some(piece) = Piece::from_fen_char(c) {
                    let sq = unsafe { Square::from_index_unchecked((rank * 8 + file) as u8) };
                    board.place(piece, sq);
                    file += 1;
                }
            }
        }

        let side_to_move = match parsed.active_color {
            'w' => Color::White,
            'b' => Color::Black,
            _ => unreachable!("FEN parser validated this"),
        };

        let mut castling_raw = 0u8;
        for c in parsed.castling.chars() {
            castling_raw |= match c {
                'K' => CastlingRights::WHITE_KINGSIDE,
                'Q' => CastlingRights::WHITE_QUEENSIDE,
                'k' => CastlingRights::BLACK_KINGSIDE,
                'q' => CastlingRights::BLACK_QUEENSIDE,
                _ => 0,
            };
        }

        let candidate_ep = if parsed.en_passant == "-" {
            Square::NONE
        } else {
            Square::from_algebraic(&parsed.en_passant).unwrap_or(Square::NONE)
        };

        let mut position = Position {
            board,
            side_to_move,
            castling: CastlingRights::new(castling_raw),
            en_passant: Square::NONE,
        };
        if candidate_ep.is_ok() && position.en_passant_capture_is_legal(candidate_ep) {
            position.en_passant = candidate_ep;
        }

        Ok(position)
    }

    /// Serializes to FEN. Clock/fullmove fields this crate doesn't track
    /// (they belong to the caller's game-record bookkeeping, not this
    /// position-only view) are emitted as `0 1`.
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8).rev() {
            let mut empty_count = 0;
            for file in 0..8 {
                let sq = unsafe { Square::from_index_unchecked(rank * 8 + file) };
                let piece = self.board.piece_at(sq);
                if let Some(c) = piece.to_fen_char() {
                    if empty_count > 0 {
                        fen.push_str(&empty_count.to_string());
                        empty_count = 0;
                    }
                    fen.push(c);
                } else {
                    empty_count += 1;
                }
            }
            if empty_count > 0 {
                fen.push_str(&empty_count.to_string());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        fen.push(' ');
        if self.castling.raw() == 0 {
            fen.push('-');
        } else {
            if self.castling.can_castle_kingside(Color::White) {
                fen.push('K');
            }
            if self.castling.can_castle_queenside(Color::White) {
                fen.push('Q');
            }
            if self.castling.can_castle_kingside(Color::Black) {
                fen.push('k');
            }
            if self.castling.can_castle_queenside(Color::Black) {
                fen.push('q');
            }
        }

        fen.push(' ');
        if self.en_passant.is_ok() {
            fen.push_str(&self.en_passant.to_algebraic());
        } else {
            fen.push('-');
        }

        fen.push_str(" 0 1");
        fen
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling_rights(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant_square(&self) -> Square {
        self.en_passant
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Piece {
        self.board.piece_at(sq)
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.board.occupied()
    }

    #[inline]
    pub fn empty_squares(&self) -> Bitboard {
        self.board.empty_squares()
    }

    #[inline]
    pub fn color_bb(&self, color: Color) -> Bitboard {
        self.board.color_bb(color)
    }

    #[inline]
    pub fn pieces_of(&self, piece_type: PieceType, color: Color) -> Bitboard {
        self.board.pieces_of(piece_type, color)
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        self.board
            .king_square(color)
            .expect("a legal position always has a king of each color")
    }

    /// True iff `sq` is attacked by any piece of `by_color`.
    pub fn is_square_attacked(&self, sq: Square, by_color: Color) -> bool {
        let occupied = self.occupied();
        let pawns = self.pieces_of(PieceType::Pawn, by_color);
        if (attacks::pawn_attacks(sq, by_color.opposite()) & pawns).is_not_empty() {
            return true;
        }
        let knights = self.pieces_of(PieceType::Knight, by_color);
        if (attacks::knight_attacks(sq) & knights).is_not_empty() {
            return true;
        }
        let king = self.pieces_of(PieceType::King, by_color);
        if (attacks::king_attacks(sq) & king).is_not_empty() {
            return true;
        }
        let bishops_queens =
            self.pieces_of(PieceType::Bishop, by_color) | self.pieces_of(PieceType::Queen, by_color);
        if (attacks::bishop_attacks(sq, occupied) & bishops_queens).is_not_empty() {
            return true;
        }
        let rooks_queens =
            self.pieces_of(PieceType::Rook, by_color) | self.pieces_of(PieceType::Queen, by_color);
        if (attacks::rook_attacks(sq, occupied) & rooks_queens).is_not_empty() {
            return true;
        }
        false
    }

    /// Bitboard of every `by_color` piece attacking `sq` — the converse
    /// view of [`Position::is_square_attacked`].
    pub fn attackers_to(&self, sq: Square, by_color: Color) -> Bitboard {
        let occupied = self.occupied();
        let mut attackers = Bitboard::EMPTY;
        attackers |= attacks::pawn_attacks(sq, by_color.opposite()) & self.pieces_of(PieceType::Pawn, by_color);
        attackers |= attacks::knight_attacks(sq) & self.pieces_of(PieceType::Knight, by_color);
        attackers |= attacks::king_attacks(sq) & self.pieces_of(PieceType::King, by_color);
        let bishops_queens =
            self.pieces_of(PieceType::Bishop, by_color) | self.pieces_of(PieceType::Queen, by_color);
        attackers |= attacks::bishop_attacks(sq, occupied) & bishops_queens;
        let rooks_queens =
            self.pieces_of(PieceType::Rook, by_color) | self.pieces_of(PieceType::Queen, by_color);
        attackers |= attacks::rook_attacks(sq, occupied) & rooks_queens;
        attackers
    }

    /// True iff `color`'s king is currently attacked.
    pub fn is_check(&self, color: Color) -> bool {
        self.is_square_attacked(self.king_square(color), color.opposite())
    }

    /// True iff the position satisfies invariant 1: the side NOT to move
    /// is not in check, and each side has exactly one king.
    pub fn is_legal(&self) -> bool {
        if self.board.king_square(Color::White).is_none() || self.board.king_square(Color::Black).is_none() {
            return false;
        }
        if self.pieces_of(PieceType::King, Color::White).count() != 1
            || self.pieces_of(PieceType::King, Color::Black).count() != 1
        {
            return false;
        }
        !self.is_check(self.side_to_move.opposite())
    }

    /// Invariant 2's validity test: would a pawn of the side to move
    /// capturing onto `ep_sq` be legal (not leave its own king in check)?
    fn en_passant_capture_is_legal(&self, ep_sq: Square) -> bool {
        let us = self.side_to_move;
        let capturing_pawns = attacks::pawn_attacks(ep_sq, us.opposite()) & self.pieces_of(PieceType::Pawn, us);
        let captured_sq = Square::new(ep_sq.file(), self.en_passant_victim_rank(us));

        for from in capturing_pawns {
            let mut probe = self.clone();
            probe.board.place(Piece::NONE, from);
            probe.board.place(Piece::NONE, captured_sq);
            probe.board.place(Piece::new(PieceType::Pawn, us), ep_sq);
            if !probe.is_square_attacked(probe.king_square(us), us.opposite()) {
                return true;
            }
        }
        false
    }

    fn en_passant_victim_rank(&self, mover: Color) -> chess_core::Rank {
        match mover {
            Color::White => chess_core::Rank::R5,
            Color::Black => chess_core::Rank::R4,
        }
    }

    /// Applies `m`, returning the [`ReverseMove`] needed to undo it.
    ///
    /// This is the only mutator in the crate that changes side to move,
    /// castling rights, or the en-passant square — every other piece of
    /// code that needs a hypothetical position goes through this and
    /// [`Position::undo_move`].
    pub fn do_move(&mut self, m: Move) -> ReverseMove {
        let us = self.side_to_move;
        let them = us.opposite();
        let old_en_passant_square = self.en_passant;
        let old_castling_rights = self.castling;
        let from = m.from();
        let to = m.to();
        let moving_piece = self.board.piece_at(from);
        let mut captured_piece = Piece::NONE;

        match m.kind() {
            MoveType::Normal => {
                captured_piece = self.board.piece_at(to);
                self.board.place(Piece::NONE, from);
                self.board.place(moving_piece, to);
            }
            MoveType::Promotion => {
                captured_piece = self.board.piece_at(to);
                self.board.place(Piece::NONE, from);
                self.board.place(m.promoted_piece(), to);
            }
            MoveType::EnPassant => {
                let captured_sq = Square::new(to.file(), from.rank());
                captured_piece = self.board.piece_at(captured_sq);
                self.board.place(Piece::NONE, captured_sq);
                self.board.place(Piece::NONE, from);
                self.board.place(moving_piece, to);
            }
            MoveType::Castle => {
                let rook = self.board.piece_at(to);
                let (king_landing, rook_landing) = castle_landing_squares(us, to);
                self.board.place(Piece::NONE, from);
                self.board.place(Piece::NONE, to);
                self.board.place(moving_piece, king_landing);
                self.board.place(rook, rook_landing);
            }
        }

        self.castling
            .restrict(preserved_castling_rights(from) & preserved_castling_rights(to));

        self.en_passant = Square::NONE;
        if matches!(m.kind(), MoveType::Normal)
            && moving_piece.piece_type() == PieceType::Pawn
            && (to.index() as i16 - from.index() as i16).abs() == 16
        {
            let skipped_rank = match us {
                Color::White => chess_core::Rank::R3,
                Color::Black => chess_core::Rank::R6,
            };
            let candidate = Square::new(from.file(), skipped_rank);
            self.side_to_move = them;
            if self.en_passant_capture_is_legal(candidate) {
                self.en_passant = candidate;
            }
            self.side_to_move = us;
        }

        self.side_to_move = them;

        ReverseMove {
            mov: m,
            captured_piece,
            old_en_passant_square,
            old_castling_rights,
        }
    }

    /// Undoes a move previously applied by [`Position::do_move`]. Must be
    /// called with the exact [`ReverseMove`] that move returned.
    pub fn undo_move(&mut self, rm: ReverseMove) {
        let them = self.side_to_move;
        let us = them.opposite();
        self.side_to_move = us;
        self.castling = rm.old_castling_rights;
        self.en_passant = rm.old_en_passant_square;

        let m = rm.mov;
        let from = m.from();
        let to = m.to();

        match m.kind() {
            MoveType::Normal => {
                let moving_piece = self.board.piece_at(to);
                self.board.place(moving_piece, from);
                self.board.place(rm.captured_piece, to);
            }
            MoveType::Promotion => {
                self.board.place(Piece::new(PieceType::Pawn, us), from);
                self.board.place(rm.captured_piece, to);
            }
            MoveType::EnPassant => {
                let moving_piece = self.board.piece_at(to);
                self.board.place(Piece::NONE, to);
                self.board.place(moving_piece, from);
                let captured_sq = Square::new(to.file(), from.rank());
                self.board.place(rm.captured_piece, captured_sq);
            }
            MoveType::Castle => {
                let (king_landing, rook_landing) = castle_landing_squares(us, to);
                let king = self.board.piece_at(king_landing);
                let rook = self.board.piece_at(rook_landing);
                self.board.place(Piece::NONE, king_landing);
                self.board.place(Piece::NONE, rook_landing);
                self.board.place(king, from);
                self.board.place(rook, to);
            }
        }
    }

    /// True iff `m` is legal in this position: pseudo-legal and, applied,
    /// does not leave the mover's own king attacked. Castling moves must
    /// already be legal by construction (only emitted by move generation
    /// when the path/king-safety conditions hold).
    pub fn is_move_legal(&self, m: Move) -> bool {
        if m.is_castle() {
            return self.is_castle_legal(m);
        }
        let mut probe = self.clone();
        let us = self.side_to_move;
        probe.do_move(m);
        !probe.is_square_attacked(probe.king_square(us), us.opposite())
    }

    fn is_castle_legal(&self, m: Move) -> bool {
        let us = self.side_to_move;
        let kingside = m.to() == ROOK_HOME_KINGSIDE[us.index()];
        let has_right = if kingside {
            self.castling.can_castle_kingside(us)
        } else {
            self.castling.can_castle_queenside(us)
        };
        if !has_right {
            return false;
        }
        let empty_path = castle_empty_path(us, kingside);
        if (self.occupied() & empty_path).is_not_empty() {
            return false;
        }
        castle_king_path(us, kingside)
            .iter()
            .all(|&sq| !self.is_square_attacked(sq, us.opposite()))
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl std::fmt::Debug for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Position({})", self.to_fen())
    }
}

/// Caches per-position legality data so pseudo-legal move generation can
/// filter without a do/undo round trip per candidate.
pub struct MoveLegalityChecker {
    king_square: Square,
    checkers: Bitboard,
    /// Squares a non-king, non-en-passant move must land on: all squares
    /// when not in check, the single checker plus the blocking ray when in
    /// single check, empty when in double check (only the king may move).
    check_mask: Bitboard,
    /// Own pieces pinned to their king by an enemy slider.
    pinned: Bitboard,
}

impl MoveLegalityChecker {
    pub fn new(position: &Position) -> Self {
        let us = position.side_to_move();
        let them = us.opposite();
        let king_square = position.king_square(us);
        let checkers = position.attackers_to(king_square, them);

        let check_mask = match checkers.count() {
            0 => Bitboard::FULL,
            1 => {
                let checker_sq = checkers.first();
                crate::movegen::rays::between(king_square, checker_sq) | checkers
            }
            _ => Bitboard::EMPTY,
        };

        let mut pinned = Bitboard::EMPTY;
        let their_sliders = (position.pieces_of(PieceType::Bishop, them)
            | position.pieces_of(PieceType::Queen, them))
            & attacks::bishop_attacks(king_square, Bitboard::EMPTY)
            | (position.pieces_of(PieceType::Rook, them) | position.pieces_of(PieceType::Queen, them))
                & attacks::rook_attacks(king_square, Bitboard::EMPTY);
        for slider_sq in their_sliders {
            let between = crate::movegen::rays::between(king_square, slider_sq);
            let blockers = between & position.occupied();
            if blockers.count() == 1 && (blockers & position.board.color_bb(us)).is_not_empty() {
                pinned |= blockers;
            }
        }

        MoveLegalityChecker {
            king_square,
            checkers,
            check_mask,
            pinned,
        }
    }

    #[inline]
    pub fn king_square(&self) -> Square {
        self.king_square
    }

    #[inline]
    pub fn checkers(&self) -> Bitboard {
        self.checkers
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        self.checkers.is_not_empty()
    }

    #[inline]
    pub fn in_double_check(&self) -> bool {
        self.checkers.count() >= 2
    }

    #[inline]
    pub fn check_mask(&self) -> Bitboard {
        self.check_mask
    }

    #[inline]
    pub fn is_pinned(&self, sq: Square) -> bool {
        self.pinned.contains(sq)
    }

    /// The legal destination mask for a non-king piece on `from`: the
    /// check-removal mask, further restricted to the pin ray if `from` is
    /// pinned.
    pub fn destination_mask(&self, from: Square) -> Bitboard {
        if self.is_pinned(from) {
            self.check_mask & crate::movegen::rays::line(self.king_square, from)
        } else {
            self.check_mask
        }
    }
}
