//! A single parsed-on-demand PGN game: a tag section and a movetext section,
//! with lazy accessors over both.

use chess_engine::{san, Position};

use crate::date::Date;
use crate::eco::Eco;
use crate::result::GameResult;
use crate::tokenizer::SanTokens;

/// One `[Key "Value"]` pair from a tag section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Iterates the tag pairs of a game's tag section in file order.
pub struct Tags<'a> {
    rest: &'a str,
}

impl<'a> Tags<'a> {
    pub fn new(tag_section: &'a str) -> Self {
        Tags { rest: tag_section }
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Tag<'a>> {
        loop {
            self.rest = self.rest.trim_start();
            if self.rest.is_empty() {
                return None;
            }
            if !self.rest.starts_with('[') {
                // Not a well-formed tag line; skip it and keep scanning.
                let end = self.rest.find('\n').map(|i| i + 1).unwrap_or(self.rest.len());
                self.rest = &self.rest[end..];
                continue;
            }

            let after_bracket = &self.rest[1..];
            let key_end = match after_bracket.find(char::is_whitespace) {
                Some(i) => i,
                None => return None,
            };
            let key = &after_bracket[..key_end];

            let after_key = &after_bracket[key_end..];
            let quote_start = match after_key.find('"') {
                Some(i) => i + 1,
                None => return None,
            };
            let value_section = &after_key[quote_start..];
            let quote_end = match value_section.find('"') {
                Some(i) => i,
                None => return None,
            };
            let value = &value_section[..quote_end];

            let close_bracket = value_section[quote_end..].find(']').map(|i| quote_end + i + 1);
            let line_end = close_bracket.unwrap_or(value_section.len());
            self.rest = &value_section[line_end..];

            return Some(Tag { key, value });
        }
    }
}

/// One unparsed game: a raw tag section and movetext section. Header fields
/// and moves are only parsed out on demand.
#[derive(Debug, Clone)]
pub struct UnparsedGame {
    tag_section: String,
    move_section: String,
}

impl UnparsedGame {
    pub(crate) fn new(tag_section: String, move_section: String) -> Self {
        UnparsedGame { tag_section, move_section }
    }

    pub fn tag_section(&self) -> &str {
        &self.tag_section
    }

    pub fn move_section(&self) -> &str {
        &self.move_section
    }

    pub fn tags(&self) -> Tags<'_> {
        Tags::new(&self.tag_section)
    }

    /// Looks up a single tag's value by key, e.g. `tag("White")`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags().find(|t| t.key == key).map(|t| t.value)
    }

    pub fn result(&self) -> Option<GameResult> {
        self.tag("Result").and_then(GameResult::parse)
    }

    /// Reads the `Date` tag, falling back to `UTCDate` (lichess archives
    /// use this in place of `Date`).
    pub fn date(&self) -> Date {
        self.tag("Date")
            .or_else(|| self.tag("UTCDate"))
            .and_then(Date::parse)
            .unwrap_or(Date::UNKNOWN)
    }

    pub fn eco(&self) -> Eco {
        self.tag("ECO").and_then(Eco::parse).unwrap_or(Eco::UNKNOWN)
    }

    /// The `PlyCount` tag if present, otherwise a live count of the SAN
    /// tokens in the movetext.
    pub fn ply_count(&self) -> u16 {
        if let Some(tag) = self.tag("PlyCount").and_then(|v| v.parse().ok()) {
            return tag;
        }
        self.moves().count() as u16
    }

    /// Raw SAN move tokens, in order.
    pub fn moves(&self) -> SanTokens<'_> {
        SanTokens::new(&self.move_section)
    }

    /// Resolves each SAN token against a running position (starting from
    /// the standard starting position), yielding the position after each
    /// move. A SAN token that fails to resolve ends the sequence early.
    pub fn positions(&self) -> Positions<'_> {
        Positions { tokens: self.moves(), position: Position::startpos(), done: false }
    }
}

/// Lazily replays a game's movetext, yielding the position after each move.
pub struct Positions<'a> {
    tokens: SanTokens<'a>,
    position: Position,
    done: bool,
}

impl<'a> Iterator for Positions<'a> {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        if self.done {
            return None;
        }
        let token = self.tokens.next()?;
        match san::san_to_move(&self.position, token) {
            Ok(mov) if !mov.is_null() => {
                self.position.do_move(mov);
                Some(self.position.clone())
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UnparsedGame {
        UnparsedGame::new(
            "[Event \"Test\"]\n[White \"Alice\"]\n[Black \"Bob\"]\n[Result \"1-0\"]\n[Date \"1851.06.21\"]\n[ECO \"C50\"]\n"
                .to_string(),
            "1. e4 e5 2. Nf3 Nc6 1-0".to_string(),
        )
    }

    #[test]
    fn reads_tags() {
        let game = sample();
        assert_eq!(game.tag("White"), Some("Alice"));
        assert_eq!(game.tag("Black"), Some("Bob"));
        assert_eq!(game.tag("Missing"), None);
    }

    #[test]
    fn reads_typed_fields() {
        let game = sample();
        assert_eq!(game.result(), Some(GameResult::WhiteWin));
        assert_eq!(game.date(), Date::new(1851, 6, 21));
        assert_eq!(game.eco().to_string(), "C50");
    }

    #[test]
    fn date_falls_back_to_utc_date_tag() {
        let game = UnparsedGame::new(
            "[Event \"Test\"]\n[UTCDate \"2024.01.15\"]\n".to_string(),
            "1. e4 *".to_string(),
        );
        assert_eq!(game.date(), Date::new(2024, 1, 15));
    }

    #[test]
    fn ply_count_falls_back_to_counting_moves() {
        let game = sample();
        assert_eq!(game.ply_count(), 4);
    }

    #[test]
    fn moves_returns_raw_san() {
        let game = sample();
        let moves: Vec<&str> = game.moves().collect();
        assert_eq!(moves, vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn positions_replays_the_game() {
        let game = sample();
        let positions: Vec<Position> = game.positions().collect();
        assert_eq!(positions.len(), 4);
        assert_eq!(positions.last().unwrap().side_to_move(), chess_core::Color::White);
    }
}
