use dj_core::Span;

use crate::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    IntLiteral,
    LongLiteral,
    FloatLiteral,
    DoubleLiteral,
    CharLiteral,
    StringLiteral,
    At,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Ellipsis,
    Question,
    Colon,
    Eq,
    EqEq,
    Bang,
    BangEq,
    Tilde,
    Lt,
    /// Always a single `>`; the parser glues adjacent ones into shifts and `>=`.
    Gt,
    LtEq,
    Shl,
    Plus,
    PlusPlus,
    Minus,
    MinusMinus,
    Star,
    Slash,
    Percent,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    Arrow,
    ColonColon,
}

/// Reserved words that can never be identifiers.
pub(crate) fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "abstract"
            | "assert"
            | "boolean"
            | "break"
            | "byte"
            | "case"
            | "catch"
            | "char"
            | "class"
            | "const"
            | "continue"
            | "default"
            | "do"
            | "double"
            | "else"
            | "enum"
            | "extends"
            | "final"
            | "finally"
            | "float"
            | "for"
            | "goto"
            | "if"
            | "implements"
            | "import"
            | "instanceof"
            | "int"
            | "interface"
            | "long"
            | "native"
            | "new"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "return"
            | "short"
            | "static"
            | "strictfp"
            | "super"
            | "switch"
            | "synchronized"
            | "this"
            | "throw"
            | "throws"
            | "transient"
            | "try"
            | "void"
            | "volatile"
            | "while"
            | "true"
            | "false"
            | "null"
    )
}

pub(crate) struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Lexer { text, pos: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.remaining().chars().nth(n)
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.bump_char();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ParseError> {
        loop {
            while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
                self.bump_char();
            }

            let rem = self.remaining();
            if rem.starts_with("//") {
                while let Some(c) = self.bump_char() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }

            if rem.starts_with("/*") {
                let start = self.pos;
                match rem[2..].find("*/") {
                    Some(close) => self.pos += close + 4,
                    None => {
                        self.pos = self.text.len();
                        return Err(ParseError::incomplete(
                            "Unterminated comment",
                            Span::new(start, self.pos),
                        ));
                    }
                }
                continue;
            }

            return Ok(());
        }
    }

    fn lex_identifier(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                self.bump_char();
            } else {
                break;
            }
        }
    }

    fn lex_number(&mut self, first: char) -> TokenKind {
        let hex = first == '0' && matches!(self.peek_char(), Some('x' | 'X'));
        let binary = first == '0' && matches!(self.peek_char(), Some('b' | 'B'));
        if hex || binary {
            self.bump_char();
        }

        let is_digit = |c: char| {
            if hex {
                c.is_ascii_hexdigit() || c == '_'
            } else {
                c.is_ascii_digit() || c == '_'
            }
        };

        let mut floating = first == '.';
        while matches!(self.peek_char(), Some(c) if is_digit(c)) {
            self.bump_char();
        }

        if !binary
            && !floating
            && self.peek_char() == Some('.')
            && self.peek_char_n(1).map_or(true, |c| is_digit(c) || !c.is_alphabetic() || (!hex && matches!(c, 'e' | 'E' | 'f' | 'F' | 'd' | 'D')))
            && self.peek_char_n(1) != Some('.')
        {
            floating = true;
            self.bump_char();
            while matches!(self.peek_char(), Some(c) if is_digit(c)) {
                self.bump_char();
            }
        }

        let exponent = if hex { ['p', 'P'] } else { ['e', 'E'] };
        if !binary && matches!(self.peek_char(), Some(c) if exponent.contains(&c)) {
            floating = true;
            self.bump_char();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.bump_char();
            }
            while matches!(self.peek_char(), Some(c) if c.is_ascii_digit() || c == '_') {
                self.bump_char();
            }
        }

        match self.peek_char() {
            Some('l' | 'L') if !floating => {
                self.bump_char();
                TokenKind::LongLiteral
            }
            Some('f' | 'F') if !hex || floating => {
                self.bump_char();
                TokenKind::FloatLiteral
            }
            Some('d' | 'D') if !hex || floating => {
                self.bump_char();
                TokenKind::DoubleLiteral
            }
            _ if floating => TokenKind::DoubleLiteral,
            _ => TokenKind::IntLiteral,
        }
    }

    fn lex_quoted(&mut self, quote: char, start: usize) -> Result<(), ParseError> {
        // opening quote already consumed
        loop {
            match self.bump_char() {
                Some(c) if c == quote => return Ok(()),
                Some('\\') => {
                    if self.bump_char().is_none() {
                        break;
                    }
                }
                Some('\n') => {
                    return Err(ParseError::new(
                        "Unterminated literal",
                        Span::new(start, self.pos),
                    ))
                }
                Some(_) => {}
                None => break,
            }
        }
        Err(ParseError::incomplete(
            "Unterminated literal",
            Span::new(start, self.pos),
        ))
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_whitespace_and_comments()?;
        let start = self.pos;
        let Some(ch) = self.bump_char() else {
            return Ok(None);
        };

        use TokenKind as K;
        let kind = match ch {
            '{' => K::LBrace,
            '}' => K::RBrace,
            '(' => K::LParen,
            ')' => K::RParen,
            '[' => K::LBracket,
            ']' => K::RBracket,
            ';' => K::Semi,
            ',' => K::Comma,
            '@' => K::At,
            '?' => K::Question,
            '~' => K::Tilde,
            '.' if matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) => self.lex_number('.'),
            '.' => {
                if self.remaining().starts_with("..") {
                    self.pos += 2;
                    K::Ellipsis
                } else {
                    K::Dot
                }
            }
            ':' => {
                if self.eat(':') {
                    K::ColonColon
                } else {
                    K::Colon
                }
            }
            '=' => {
                if self.eat('=') {
                    K::EqEq
                } else {
                    K::Eq
                }
            }
            '!' => {
                if self.eat('=') {
                    K::BangEq
                } else {
                    K::Bang
                }
            }
            '<' => {
                if self.eat('=') {
                    K::LtEq
                } else if self.eat('<') {
                    if self.eat('=') {
                        K::ShlEq
                    } else {
                        K::Shl
                    }
                } else {
                    K::Lt
                }
            }
            '>' => K::Gt,
            '+' => {
                if self.eat('+') {
                    K::PlusPlus
                } else if self.eat('=') {
                    K::PlusEq
                } else {
                    K::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    K::MinusMinus
                } else if self.eat('=') {
                    K::MinusEq
                } else if self.eat('>') {
                    K::Arrow
                } else {
                    K::Minus
                }
            }
            '*' => {
                if self.eat('=') {
                    K::StarEq
                } else {
                    K::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    K::SlashEq
                } else {
                    K::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    K::PercentEq
                } else {
                    K::Percent
                }
            }
            '^' => {
                if self.eat('=') {
                    K::CaretEq
                } else {
                    K::Caret
                }
            }
            '&' => {
                if self.eat('&') {
                    K::AmpAmp
                } else if self.eat('=') {
                    K::AmpEq
                } else {
                    K::Amp
                }
            }
            '|' => {
                if self.eat('|') {
                    K::PipePipe
                } else if self.eat('=') {
                    K::PipeEq
                } else {
                    K::Pipe
                }
            }
            '"' => {
                self.lex_quoted('"', start)?;
                K::StringLiteral
            }
            '\'' => {
                self.lex_quoted('\'', start)?;
                K::CharLiteral
            }
            c if c.is_ascii_digit() => self.lex_number(c),
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                self.lex_identifier();
                K::Ident
            }
            other => {
                return Err(ParseError::new(
                    format!("Unexpected character `{other}`"),
                    Span::new(start, self.pos),
                ))
            }
        };

        Ok(Some(Token {
            kind,
            text: self.text[start..self.pos].to_string(),
            span: Span::new(start, self.pos),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Lexer::new(text)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn numbers_and_member_access() {
        use TokenKind::*;
        assert_eq!(kinds("1.5 2f 3L 0x1F 1e3"), vec![
            DoubleLiteral,
            FloatLiteral,
            LongLiteral,
            IntLiteral,
            DoubleLiteral
        ]);
        assert_eq!(kinds("a.b"), vec![Ident, Dot, Ident]);
        assert_eq!(kinds("1..2").len(), 3);
        assert_eq!(kinds("String... s"), vec![Ident, Ellipsis, Ident]);
    }

    #[test]
    fn greater_than_is_never_glued() {
        use TokenKind::*;
        assert_eq!(kinds("a >>= b"), vec![Ident, Gt, Gt, Eq, Ident]);
        assert_eq!(kinds("x <<= 1"), vec![Ident, ShlEq, IntLiteral]);
    }

    #[test]
    fn unterminated_input_is_incomplete() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert!(err.incomplete);
        let err = Lexer::new("/* open").tokenize().unwrap_err();
        assert!(err.incomplete);
    }
}
