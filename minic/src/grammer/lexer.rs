use super::token::{Pos, Token, TokenKind};
use std::iter::Peekable;
use std::str::CharIndices;

pub struct Lexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(code: &'a str) -> Self {
        Self {
            iter: code.char_indices().peekable(),
            line: 1,
            col: 0,
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

impl<'a> Lexer<'a> {
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.iter.clone().nth(n).map(|(_, ch)| ch)
    }

    fn consume(&mut self) -> Option<char> {
        let (_, ch) = self.iter.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(ch)
    }
}

// ----------------------------------------------------------------------------
// Tokenizer
// ----------------------------------------------------------------------------

impl<'a> Lexer<'a> {
    pub fn parse(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(ch0) = self.peek_nth(0) {
            // 0. Skip whitespace
            if ch0.is_whitespace() {
                self.consume();
                continue;
            }

            let pos = Pos {
                line: self.line,
                col: self.col,
            };

            if let Some(ch1) = self.peek_nth(1) {
                // Line comment
                if ch0 == '/' && ch1 == '/' {
                    while let Some(ch) = self.peek_nth(0) {
                        if ch == '\n' {
                            break;
                        }
                        self.consume();
                    }
                    continue;
                }

                // Block comment
                if ch0 == '/' && ch1 == '*' {
                    self.consume();
                    self.consume();
                    self.skip_block_comment();
                    continue;
                }

                // 1. Double character token
                if let Some(kind) = double_char_token(ch0, ch1) {
                    self.consume();
                    self.consume();
                    tokens.push(Token::new(kind, pos));
                    continue;
                }
            }

            // 2. Single character token
            if let Some(kind) = single_char_token(ch0) {
                self.consume();
                tokens.push(Token::new(kind, pos));
                continue;
            }

            // 3. Number literal
            if ch0.is_ascii_digit() {
                let kind = self.parse_number();
                tokens.push(Token::new(kind, pos));
                continue;
            }

            // 4. Identifier or keyword
            if ch0.is_ascii_alphabetic() || ch0 == '_' {
                let kind = self.parse_ident();
                tokens.push(Token::new(kind, pos));
                continue;
            }

            // Error
            self.consume();
            tokens.push(Token::new(TokenKind::Error(format!("{ch0}")), pos));
        }
        tokens
    }

    fn skip_block_comment(&mut self) {
        while let Some(ch0) = self.peek_nth(0) {
            if ch0 == '*' && self.peek_nth(1) == Some('/') {
                self.consume();
                self.consume();
                return;
            }
            self.consume();
        }
    }

    fn parse_ident(&mut self) -> TokenKind {
        let mut lexeme = String::new();
        while let Some(ch) = self.peek_nth(0) {
            if matches!(ch, '_' | '0'..='9' | 'a'..='z' | 'A'..='Z') {
                lexeme.push(ch);
                self.consume();
            } else {
                break;
            }
        }
        match keyword(&lexeme) {
            Some(kind) => kind,
            None => TokenKind::Ident(lexeme),
        }
    }

    fn parse_number(&mut self) -> TokenKind {
        if self.peek_nth(0) == Some('0') && matches!(self.peek_nth(1), Some('x') | Some('X')) {
            self.consume();
            self.consume();
            return self.parse_number_hex();
        }
        self.parse_number_dec()
    }

    fn parse_number_hex(&mut self) -> TokenKind {
        let mut lexeme = String::new();
        while let Some(ch) = self.peek_nth(0) {
            if matches!(ch, '_' | '0'..='9' | 'a'..='f' | 'A'..='F') {
                lexeme.push(ch);
                self.consume();
            } else {
                break;
            }
        }
        match i64::from_str_radix(&lexeme.replace('_', ""), 16) {
            Ok(num) if num <= i32::MAX as i64 => TokenKind::Number(num as i32),
            _ => TokenKind::Error(format!("0x{}", lexeme)),
        }
    }

    fn parse_number_dec(&mut self) -> TokenKind {
        let mut lexeme = String::new();
        while let Some(ch) = self.peek_nth(0) {
            if matches!(ch, '_' | '0'..='9') {
                lexeme.push(ch);
                self.consume();
            } else {
                break;
            }
        }
        match lexeme.replace('_', "").parse::<i32>() {
            Ok(num) => TokenKind::Number(num),
            Err(_) => TokenKind::Error(lexeme),
        }
    }
}

fn double_char_token(ch0: char, ch1: char) -> Option<TokenKind> {
    match (ch0, ch1) {
        ('=', '=') => Some(TokenKind::EqualEqual),
        ('!', '=') => Some(TokenKind::ExclEqual),
        ('<', '=') => Some(TokenKind::LAngleEqual),
        ('>', '=') => Some(TokenKind::RAngleEqual),
        ('&', '&') => Some(TokenKind::AmpAmp),
        ('|', '|') => Some(TokenKind::PipePipe),
        ('-', '>') => Some(TokenKind::Arrow),
        _ => None,
    }
}

fn single_char_token(ch: char) -> Option<TokenKind> {
    match ch {
        '=' => Some(TokenKind::Equal),
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Star),
        '/' => Some(TokenKind::Slash),
        '%' => Some(TokenKind::Percent),
        '&' => Some(TokenKind::Amp),
        '!' => Some(TokenKind::Excl),
        ';' => Some(TokenKind::Semicolon),
        ',' => Some(TokenKind::Comma),
        '.' => Some(TokenKind::Period),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        '[' => Some(TokenKind::LBracket),
        ']' => Some(TokenKind::RBracket),
        '{' => Some(TokenKind::LCurly),
        '}' => Some(TokenKind::RCurly),
        '<' => Some(TokenKind::LAngle),
        '>' => Some(TokenKind::RAngle),
        _ => None,
    }
}

fn keyword(s: &str) -> Option<TokenKind> {
    match s {
        "int" => Some(TokenKind::KwInt),
        "void" => Some(TokenKind::KwVoid),
        "struct" => Some(TokenKind::KwStruct),
        "if" => Some(TokenKind::KwIf),
        "else" => Some(TokenKind::KwElse),
        "while" => Some(TokenKind::KwWhile),
        "for" => Some(TokenKind::KwFor),
        "do" => Some(TokenKind::KwDo),
        "break" => Some(TokenKind::KwBreak),
        "continue" => Some(TokenKind::KwContinue),
        "return" => Some(TokenKind::KwReturn),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(code: &str) -> Vec<TokenKind> {
        Lexer::new(code).parse().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_declaration() {
        assert_eq!(
            kinds("int x = 42;"),
            vec![KwInt, Ident("x".to_string()), Equal, Number(42), Semicolon]
        );
    }

    #[test]
    fn test_double_char_tokens() {
        assert_eq!(
            kinds("== != <= >= && || ->"),
            vec![EqualEqual, ExclEqual, LAngleEqual, RAngleEqual, AmpAmp, PipePipe, Arrow]
        );
    }

    #[test]
    fn test_hex_number() {
        assert_eq!(kinds("0x40 0X10"), vec![Number(64), Number(16)]);
    }

    #[test]
    fn test_comments_are_skipped() {
        let code = "int a; // trailing\n/* block\n spanning */ int b;";
        assert_eq!(
            kinds(code),
            vec![KwInt, Ident("a".to_string()), Semicolon, KwInt, Ident("b".to_string()), Semicolon]
        );
    }

    #[test]
    fn test_line_tracking() {
        let tokens = Lexer::new("int\nx;\n").parse();
        assert_eq!(tokens[0].pos.line, 1);
        assert_eq!(tokens[1].pos.line, 2);
        assert_eq!(tokens[2].pos.line, 2);
    }

    #[test]
    fn test_error_token() {
        assert_eq!(kinds("@"), vec![Error("@".to_string())]);
    }
}
