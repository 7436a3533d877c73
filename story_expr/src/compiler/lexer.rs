//! Tokenizer for the expression grammar.

use std::fmt;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Undefined,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    QuestionQuestion,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    Tilde,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Lt,
    LtLt,
    LtEq,
    Gt,
    GtGt,
    GtGtGt,
    GtEq,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Str(s) => write!(f, "string {:?}", s),
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            other => write!(f, "'{}'", other.symbol()),
        }
    }
}

impl TokenKind {
    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Undefined => "undefined",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::QuestionQuestion => "??",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Bang => "!",
            TokenKind::Tilde => "~",
            TokenKind::Amp => "&",
            TokenKind::AmpAmp => "&&",
            TokenKind::Pipe => "|",
            TokenKind::PipePipe => "||",
            TokenKind::Caret => "^",
            TokenKind::Lt => "<",
            TokenKind::LtLt => "<<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtGt => ">>",
            TokenKind::GtGtGt => ">>>",
            TokenKind::GtEq => ">=",
            TokenKind::EqEq => "==",
            TokenKind::EqEqEq => "===",
            TokenKind::BangEq => "!=",
            TokenKind::BangEqEq => "!==",
            TokenKind::Number(_) | TokenKind::Str(_) | TokenKind::Ident(_) => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the source.
    pub offset: usize,
}

/// Split `source` into tokens.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        chars: source.char_indices().collect(),
        pos: 0,
        source,
    };
    let mut tokens: Vec<Token> = Vec::new();
    while let Some(token) = lexer.next_token(tokens.last().map(|t| &t.kind))? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    source: &'a str,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.source.len())
    }

    fn next_token(&mut self, prev: Option<&TokenKind>) -> Result<Option<Token>, ParseError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }

        let offset = self.offset();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let ends_operand = matches!(
            prev,
            Some(
                TokenKind::Ident(_)
                    | TokenKind::Number(_)
                    | TokenKind::Str(_)
                    | TokenKind::RParen
                    | TokenKind::RBracket
            )
        );

        let kind = if c.is_ascii_digit() && prev == Some(&TokenKind::Dot) {
            // `items.0.name`: a segment after a dot is a plain index.
            self.index_segment()
        } else if c.is_ascii_digit()
            || (c == '.' && !ends_operand && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()))
        {
            self.number()?
        } else if c == '"' || c == '\'' {
            self.string(c)?
        } else if is_ident_start(c) {
            self.identifier()
        } else {
            self.punctuator(c, offset)?
        };

        Ok(Some(Token { kind, offset }))
    }

    fn number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        let offset = self.offset();

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = self.slice(digits_start, self.pos);
            return u64::from_str_radix(&digits, 16)
                .map(|n| TokenKind::Number(n as f64))
                .map_err(|_| ParseError::InvalidNumber {
                    text: self.slice(start, self.pos),
                    offset,
                });
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        } else if self.peek() == Some('.') && !matches!(self.peek_at(1), Some(c) if is_ident_start(c)) {
            // Trailing dot: `5.` is a number, `5.toFixed` is not supported.
            self.pos += 1;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }

        let text = self.slice(start, self.pos);
        if matches!(self.peek(), Some(c) if is_ident_start(c)) {
            return Err(ParseError::InvalidNumber { text, offset });
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ParseError::InvalidNumber { text, offset })
    }

    fn index_segment(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = self.slice(start, self.pos);
        TokenKind::Number(digits.parse().unwrap_or(f64::NAN))
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, ParseError> {
        let start_offset = self.offset();
        self.pos += 1;
        let mut out = String::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(ParseError::UnterminatedString {
                    offset: start_offset,
                });
            };
            self.pos += 1;
            match c {
                c if c == quote => return Ok(TokenKind::Str(out)),
                '\\' => out.push(self.escape()?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, ParseError> {
        let offset = self.offset();
        let Some(c) = self.peek() else {
            return Err(ParseError::UnterminatedString { offset });
        };
        self.pos += 1;
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            'x' => self.hex_escape(2, offset)?,
            'u' => self.hex_escape(4, offset)?,
            other => other,
        };
        Ok(decoded)
    }

    fn hex_escape(&mut self, len: usize, offset: usize) -> Result<char, ParseError> {
        let end = self.pos + len;
        if end > self.chars.len() {
            return Err(ParseError::InvalidEscape { offset });
        }
        let digits = self.slice(self.pos, end);
        self.pos = end;
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(ParseError::InvalidEscape { offset })
    }

    fn identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            self.pos += 1;
        }
        let name = self.slice(start, self.pos);
        match name.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            _ => TokenKind::Ident(name),
        }
    }

    fn punctuator(&mut self, c: char, offset: usize) -> Result<TokenKind, ParseError> {
        let next = self.peek_at(1);
        let third = self.peek_at(2);

        let (kind, len) = match (c, next, third) {
            ('(', _, _) => (TokenKind::LParen, 1),
            (')', _, _) => (TokenKind::RParen, 1),
            ('[', _, _) => (TokenKind::LBracket, 1),
            (']', _, _) => (TokenKind::RBracket, 1),
            (',', _, _) => (TokenKind::Comma, 1),
            ('.', _, _) => (TokenKind::Dot, 1),
            (':', _, _) => (TokenKind::Colon, 1),
            ('?', Some('?'), _) => (TokenKind::QuestionQuestion, 2),
            ('?', _, _) => (TokenKind::Question, 1),
            ('+', _, _) => (TokenKind::Plus, 1),
            ('-', _, _) => (TokenKind::Minus, 1),
            ('*', Some('*'), _) => (TokenKind::StarStar, 2),
            ('*', _, _) => (TokenKind::Star, 1),
            ('/', _, _) => (TokenKind::Slash, 1),
            ('%', _, _) => (TokenKind::Percent, 1),
            ('~', _, _) => (TokenKind::Tilde, 1),
            ('^', _, _) => (TokenKind::Caret, 1),
            ('&', Some('&'), _) => (TokenKind::AmpAmp, 2),
            ('&', _, _) => (TokenKind::Amp, 1),
            ('|', Some('|'), _) => (TokenKind::PipePipe, 2),
            ('|', _, _) => (TokenKind::Pipe, 1),
            ('!', Some('='), Some('=')) => (TokenKind::BangEqEq, 3),
            ('!', Some('='), _) => (TokenKind::BangEq, 2),
            ('!', _, _) => (TokenKind::Bang, 1),
            ('=', Some('='), Some('=')) => (TokenKind::EqEqEq, 3),
            ('=', Some('='), _) => (TokenKind::EqEq, 2),
            ('=', _, _) => return Err(ParseError::AssignmentNotAllowed { offset }),
            ('<', Some('<'), _) => (TokenKind::LtLt, 2),
            ('<', Some('='), _) => (TokenKind::LtEq, 2),
            ('<', _, _) => (TokenKind::Lt, 1),
            ('>', Some('>'), Some('>')) => (TokenKind::GtGtGt, 3),
            ('>', Some('>'), _) => (TokenKind::GtGt, 2),
            ('>', Some('='), _) => (TokenKind::GtEq, 2),
            ('>', _, _) => (TokenKind::Gt, 1),
            (ch, _, _) => return Err(ParseError::UnexpectedChar { ch, offset }),
        };

        self.pos += len;
        Ok(kind)
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().map(|(_, c)| *c).collect()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
