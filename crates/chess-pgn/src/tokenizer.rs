//! Movetext tokenization. Skips comments, variations, NAGs,
//! move numbers and whitespace, yielding raw SAN move tokens; stops at the
//! first result token or end of input.

fn is_san_first_char(c: u8) -> bool {
    matches!(c, b'N' | b'B' | b'R' | b'Q' | b'K' | b'O') || c.is_ascii_lowercase() && (b'a'..=b'h').contains(&c)
}

fn is_result_token(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2")
}

/// Iterates the SAN move tokens of a movetext section, in order.
pub struct SanTokens<'a> {
    rest: &'a str,
}

impl<'a> SanTokens<'a> {
    pub fn new(move_section: &'a str) -> Self {
        SanTokens { rest: move_section }
    }
}

impl<'a> Iterator for SanTokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            self.rest = self.rest.trim_start();
            if self.rest.is_empty() {
                return None;
            }
            let bytes = self.rest.as_bytes();
            let c = bytes[0];

            match c {
                b';' => {
                    let end = self.rest.find('\n').map(|i| i + 1).unwrap_or(self.rest.len());
                    self.rest = &self.rest[end..];
                }
                b'{' => {
                    let end = self.rest.find('}').map(|i| i + 1).unwrap_or(self.rest.len());
                    self.rest = &self.rest[end..];
                }
                b'(' => {
                    let mut depth = 0usize;
                    let mut end = self.rest.len();
                    for (i, ch) in self.rest.char_indices() {
                        match ch {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    end = i + 1;
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    self.rest = &self.rest[end..];
                }
                b'$' => {
                    let end = self.rest[1..]
                        .find(|ch: char| !ch.is_ascii_digit())
                        .map(|i| i + 1)
                        .unwrap_or(self.rest.len());
                    self.rest = &self.rest[end..];
                }
                b'*' => {
                    self.rest = &self.rest[1..];
                    return None;
                }
                b'-' if self.rest.starts_with("--") => {
                    let end = self.rest.find(|ch: char| ch.is_whitespace()).unwrap_or(self.rest.len());
                    let token = &self.rest[..end];
                    self.rest = &self.rest[end..];
                    return Some(token);
                }
                b'0'..=b'9' => {
                    let end = self.rest.find(|ch: char| ch.is_whitespace()).unwrap_or(self.rest.len());
                    let token = &self.rest[..end];
                    self.rest = &self.rest[end..];
                    if is_result_token(token) {
                        return None;
                    }
                    // otherwise a move number like "12." or "12...": discard
                }
                _ if is_san_first_char(c) => {
                    let end = self.rest.find(|ch: char| ch.is_whitespace()).unwrap_or(self.rest.len());
                    let token = &self.rest[..end];
                    self.rest = &self.rest[end..];
                    return Some(token);
                }
                _ => {
                    self.rest = &self.rest[1..];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_plain_movetext() {
        let tokens: Vec<&str> = SanTokens::new("1. e4 e5 2. Nf3 Nc6 1-0").collect();
        assert_eq!(tokens, vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn skips_block_comments() {
        let tokens: Vec<&str> = SanTokens::new("1. e4 {best by test} e5 *").collect();
        assert_eq!(tokens, vec!["e4", "e5"]);
    }

    #[test]
    fn skips_line_comments() {
        let tokens: Vec<&str> = SanTokens::new("1. e4 ; this is a line comment\ne5 *").collect();
        assert_eq!(tokens, vec!["e4", "e5"]);
    }

    #[test]
    fn skips_nested_variations() {
        let tokens: Vec<&str> = SanTokens::new("1. e4 (1. d4 d5 (1... Nf6)) e5 *").collect();
        assert_eq!(tokens, vec!["e4", "e5"]);
    }

    #[test]
    fn skips_nags() {
        let tokens: Vec<&str> = SanTokens::new("1. e4 $1 e5 $2 *").collect();
        assert_eq!(tokens, vec!["e4", "e5"]);
    }

    #[test]
    fn stops_at_draw_result() {
        let tokens: Vec<&str> = SanTokens::new("1. e4 e5 1/2-1/2").collect();
        assert_eq!(tokens, vec!["e4", "e5"]);
    }

    #[test]
    fn accepts_null_move() {
        let tokens: Vec<&str> = SanTokens::new("1. e4 -- 2. Nf3 *").collect();
        assert_eq!(tokens, vec!["e4", "--", "Nf3"]);
    }

    #[test]
    fn accepts_castling() {
        let tokens: Vec<&str> = SanTokens::new("1. O-O O-O-O *").collect();
        assert_eq!(tokens, vec!["O-O", "O-O-O"]);
    }
}
