//! Pull-based token producer consumed by the compiler one token at a time.

mod tokens;

pub use tokens::{identifier_type, Token, TokenType};

/// Scans a source string into tokens on demand. Holds no owned storage;
/// every token it returns borrows from `source`.
pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner { source, start: 0, current: 0, line: 1 }
    }

    /// Returns the next token, advancing past it. Returns `Eof` tokens
    /// indefinitely once the source is exhausted.
    pub fn scan_token(&mut self) -> Token<'a> {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenType::Eof);
        }

        let c = self.advance();

        if is_alpha(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            '(' => self.make_token(TokenType::LeftParen),
            ')' => self.make_token(TokenType::RightParen),
            '{' => self.make_token(TokenType::LeftBrace),
            '}' => self.make_token(TokenType::RightBrace),
            ';' => self.make_token(TokenType::Semicolon),
            ',' => self.make_token(TokenType::Comma),
            '.' => self.make_token(TokenType::Dot),
            '-' => self.make_token(TokenType::Minus),
            '+' => self.make_token(TokenType::Plus),
            '/' => self.make_token(TokenType::Slash),
            '*' => self.make_token(TokenType::Star),
            '!' => {
                let t = if self.matches('=') { TokenType::BangEqual } else { TokenType::Bang };
                self.make_token(t)
            }
            '=' => {
                let t = if self.matches('=') { TokenType::EqualEqual } else { TokenType::Equal };
                self.make_token(t)
            }
            '<' => {
                let t = if self.matches('=') { TokenType::LessEqual } else { TokenType::Less };
                self.make_token(t)
            }
            '>' => {
                let t = if self.matches('=') { TokenType::GreaterEqual } else { TokenType::Greater };
                self.make_token(t)
            }
            '"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn peek(&self) -> char {
        self.source[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += c.len_utf8();
        c
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.current += expected.len_utf8();
        true
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                '/' if self.peek_next() == '/' => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == '*' => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    /// Skips a `/* */` comment, supporting arbitrary nesting.
    fn skip_block_comment(&mut self) {
        self.advance(); // consumes '/'
        self.advance(); // consumes '*'
        let mut depth = 1;

        while depth > 0 && !self.is_at_end() {
            match (self.peek(), self.peek_next()) {
                ('/', '*') => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                ('*', '/') => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                }
                ('\n', _) => {
                    self.line += 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn string(&mut self) -> Token<'a> {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }

        self.advance(); // closing quote
        self.make_token(TokenType::String)
    }

    fn number(&mut self) -> Token<'a> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        self.make_token(TokenType::Number)
    }

    fn identifier(&mut self) -> Token<'a> {
        while is_alpha(self.peek()) || self.peek().is_ascii_digit() {
            self.advance();
        }

        let lexeme = &self.source[self.start..self.current];
        self.make_token(identifier_type(lexeme))
    }

    fn make_token(&self, token_type: TokenType) -> Token<'a> {
        Token::new(token_type, &self.source[self.start..self.current], self.line)
    }

    fn error_token(&self, message: &'static str) -> Token<'a> {
        Token::new(TokenType::Error, message, self.line)
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenType> {
        let mut s = Scanner::new(src);
        let mut out = vec![];
        loop {
            let tok = s.scan_token();
            let done = tok.token_type == TokenType::Eof;
            out.push(tok.token_type);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_print_statement() {
        let kinds = kinds("print 1 + 2;");
        assert_eq!(
            kinds,
            vec![
                TokenType::Print,
                TokenType::Number,
                TokenType::Plus,
                TokenType::Number,
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        let mut s = Scanner::new("// hi\n/* nested /* block */ still */ 42;");
        let tok = s.scan_token();
        assert_eq!(tok.token_type, TokenType::Number);
        assert_eq!(tok.lexeme, "42");
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let mut s = Scanner::new("\"abc");
        let tok = s.scan_token();
        assert_eq!(tok.token_type, TokenType::Error);
        assert_eq!(tok.lexeme, "Unterminated string.");
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let mut s = Scanner::new("1;\n2;\n3;");
        s.scan_token(); // 1
        s.scan_token(); // ;
        let two = s.scan_token();
        assert_eq!(two.line, 2);
    }
}
