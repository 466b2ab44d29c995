//! Streaming reader for PGN chess game archives.
//!
//! - [`PgnReader`] iterates the games in a `.pgn` file, reading ahead on a
//!   background thread
//! - [`UnparsedGame`] exposes a game's tags and movetext, parsing fields out
//!   lazily, plus [`UnparsedGame::positions`] to replay the game through
//!   `chess-engine`'s SAN resolver
//! - [`Date`], [`Eco`], [`GameResult`] are the typed tag values shared with
//!   `chess-bcgn`'s per-game header
//!
//! # Example
//!
//! ```no_run
//! use chess_pgn::PgnReader;
//!
//! let reader = PgnReader::open("games.pgn").unwrap();
//! for game in reader {
//!     println!("{:?} vs {:?}: {:?}", game.tag("White"), game.tag("Black"), game.result());
//! }
//! ```

mod date;
mod eco;
mod game;
mod reader;
mod result;
mod tokenizer;

pub use date::Date;
pub use eco::Eco;
pub use game::{Positions, Tag, Tags, UnparsedGame};
pub use reader::{PgnReader, PgnReaderError, MIN_BUFFER_SIZE};
pub use result::GameResult;
pub use tokenizer::SanTokens;
