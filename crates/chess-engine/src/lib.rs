//! High-performance chess engine built on bitboards: attack generation,
//! position representation and legality, and the two position-dependent
//! wire codecs ([`compressed`] and [`move_index`]) the archive formats in
//! `chess-bcgn` build on.
//!
//! - [`Bitboard`] - 64-bit board representation with efficient operations
//! - [`Position`] - full position state: placement, side to move, castling
//!   rights, en-passant square, reversible move application
//! - [`movegen`] - legal move generation via magic-bitboard sliders
//! - [`compressed`] - the 24-byte compressed-position codec
//! - [`move_index`] - the position-dependent short/long move-index codec
//! - [`san`] - resolving a SAN token to a [`chess_core::Move`] against a position
//!
//! # Example
//!
//! ```
//! use chess_engine::{movegen, Position};
//!
//! let position = Position::startpos();
//! let moves = movegen::generate_moves(&position);
//! println!("Legal moves from starting position: {}", moves.len());
//! ```

mod bitboard;
pub mod compressed;
pub mod move_index;
pub mod movegen;
mod position;
pub mod san;
mod zobrist;

pub use bitboard::Bitboard;
pub use compressed::CompressedPosition;
pub use move_index::MoveIndexError;
pub use movegen::{
    bishop_attacks, generate_moves, king_attacks, knight_attacks, pawn_attacks, queen_attacks,
    rook_attacks, MoveList,
};
pub use position::{Board, MoveLegalityChecker, Position};
pub use san::{san_to_move, try_san_to_move, SanError};
pub use zobrist::{PositionWithZobrist, ZobristKeys, ZOBRIST};
