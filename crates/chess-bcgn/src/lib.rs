//! BCGN: a compact, self-describing binary chess game archive, the dense
//! counterpart to `chess-pgn`'s textual format.
//!
//! - [`BcgnReader`] iterates a file's game records, one [`UnparsedGame`] at
//!   a time, reading ahead on a background thread
//! - [`BcgnWriter`] accumulates games into length-prefixed records and
//!   flushes them through a one-deep double buffer, overlapping encoding of
//!   the next game with the background write of the last
//! - Three move-encoding levels trade density for decode cost: level 0 is a
//!   flat 2-byte [`chess_core::CompressedMove`] per move, level 1 is a
//!   position-dependent 1- or 2-byte move index, level 2 is a bit-packed
//!   piece/destination pair with no transmitted bit widths
//!
//! # Example
//!
//! ```no_run
//! use chess_bcgn::BcgnReader;
//!
//! let reader = BcgnReader::open("games.bcgn").unwrap();
//! for game in reader {
//!     let game = game.unwrap();
//!     for mv in game.moves() {
//!         let _ = mv.unwrap();
//!     }
//! }
//! ```

mod bits;
mod error;
mod game;
mod header;
mod level2;
mod move_codec;
mod reader;
mod writer;

pub use error::BcgnError;
pub use game::{Moves, Positions, UnparsedGame};
pub use header::{AuxCompression, CompressionLevel, FileHeader, HeaderOptions, OpenMode, FILE_HEADER_LEN};
pub use reader::{BcgnReader, MIN_BUFFER_SIZE};
pub use writer::{BcgnWriter, GameSetup, MAX_GAME_LENGTH};
