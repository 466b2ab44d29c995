//! Core types for chess.
//!
//! This crate provides the fundamental types used across the chess engine:
//! - [`Piece`] and [`PieceType`] for piece representation, [`Color`] for side
//! - [`Square`], [`File`], and [`Rank`] for board coordinates
//! - [`CastlingRights`] for castling-right bookkeeping
//! - [`Move`], [`CompressedMove`], [`ReverseMove`], [`PackedReverseMove`] for
//!   move representation and its wire/undo forms
//! - FEN parsing and serialization

mod castling;
mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use castling::CastlingRights;
pub use color::Color;
pub use fen::{FenError, FenParser};
pub use mov::{CompressedMove, Move, MoveType, PackedReverseMove, ReverseMove};
pub use piece::{Piece, PieceType};
pub use square::{File, Rank, Square};
