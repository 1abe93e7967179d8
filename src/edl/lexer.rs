//! A hand-written lexer for EDL source files.
//!
//! EDL sources are 7-bit ASCII: outside comments, any byte that is not
//! printable ASCII or whitespace is an error. The lexer tracks 1-based
//! line/column positions and stamps each token with the location and byte
//! range of its first character, so the parser can report precise
//! diagnostics without re-scanning.

use std::fmt;
use std::ops::Range;
use std::str::CharIndices;

use crate::edl::is_reserved_word;
use crate::files::FileId;
use crate::reporting::Message;
use crate::source::Location;

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn is_dec_digit(ch: char) -> bool {
    ch.is_ascii_digit()
}

fn is_hex_digit(ch: char) -> bool {
    ch.is_ascii_hexdigit()
}

const PUNCTUATION: &[char] = &['{', '}', '(', ')', '[', ']', '<', '>', ';', ',', '=', '*'];

/// The shape of a [`Token`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    /// An identifier-shaped lexeme that happens to be a reserved word. The
    /// parser recognises keywords by comparing token text, so keyword tokens
    /// still answer `true` to [`Token::is_identifier`].
    Keyword,
    UnsignedInteger,
    HexInteger,
    Punct(char),
    Eof,
}

/// A token of an EDL source file. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
    /// Byte range in the source, for diagnostic labels.
    pub range: Range<usize>,
}

impl Token {
    pub fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    /// True for plain identifiers and for reserved words, which are
    /// identifier-shaped and legal in type position.
    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier | TokenKind::Keyword)
    }

    pub fn is_unsigned_integer(&self) -> bool {
        self.kind == TokenKind::UnsignedInteger
    }

    pub fn is_hex_integer(&self) -> bool {
        self.kind == TokenKind::HexInteger
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

impl PartialEq<char> for Token {
    fn eq(&self, other: &char) -> bool {
        self.kind == TokenKind::Punct(*other)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "<end of file>"),
            _ => write!(f, "{}", self.text),
        }
    }
}

/// An iterator-like lexer over a source string. [`Lexer::next_token`] keeps
/// returning the EOF sentinel once the input is exhausted.
pub struct Lexer<'source> {
    file_id: FileId,
    src: &'source str,
    chars: CharIndices<'source>,
    lookahead: Option<(usize, char)>,
    line: u32,
    column: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(file_id: FileId, src: &'source str) -> Lexer<'source> {
        let mut chars = src.char_indices();

        Lexer {
            file_id,
            src,
            lookahead: chars.next(),
            chars,
            line: 1,
            column: 1,
        }
    }

    /// Consume one character, returning its byte position and value.
    /// Newlines advance the line counter and reset the column.
    fn bump(&mut self) -> Option<(usize, char)> {
        let current = self.lookahead;
        self.lookahead = self.chars.next();
        if let Some((_, ch)) = current {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        current
    }

    fn peek(&self) -> Option<char> {
        self.lookahead.map(|(_, ch)| ch)
    }

    fn slice(&self, start: usize, end: usize) -> &'source str {
        &self.src[start..end]
    }

    /// Consume characters while the predicate holds, returning the end byte
    /// position (exclusive) of the consumed run.
    fn take_while(&mut self, mut keep_going: impl FnMut(char) -> bool) -> usize {
        while let Some((end, ch)) = self.lookahead {
            if !keep_going(ch) {
                return end;
            }
            self.bump();
        }
        self.src.len()
    }

    fn token(
        &self,
        kind: TokenKind,
        text: impl Into<String>,
        line: u32,
        column: u32,
        range: Range<usize>,
    ) -> Token {
        Token {
            kind,
            text: text.into(),
            line,
            column,
            range,
        }
    }

    fn eof_token(&self) -> Token {
        let eof = self.src.len();
        self.token(TokenKind::Eof, "", self.line, self.column, eof..eof)
    }

    /// Produce the next token, skipping whitespace and comments.
    pub fn next_token(&mut self) -> Result<Token, Message> {
        loop {
            let (line, column) = (self.line, self.column);
            let (start, ch) = match self.bump() {
                Some(current) => current,
                None => return Ok(self.eof_token()),
            };

            match ch {
                ch if ch.is_ascii_whitespace() => continue,
                '/' if self.peek() == Some('/') => {
                    self.take_while(|ch| ch != '\n');
                    continue;
                }
                '/' if self.peek() == Some('*') => {
                    self.skip_block_comment(start)?;
                    continue;
                }
                ch if PUNCTUATION.contains(&ch) => {
                    let end = start + ch.len_utf8();
                    return Ok(self.token(TokenKind::Punct(ch), ch, line, column, start..end));
                }
                '0' if matches!(self.peek(), Some('x') | Some('X')) => {
                    return self.hex_literal(start, line, column);
                }
                ch if is_dec_digit(ch) => return self.dec_literal(start, line, column),
                ch if is_ident_start(ch) => return Ok(self.identifier(start, line, column)),
                ch => {
                    let end = start + ch.len_utf8();
                    return Err(Message::UnexpectedCharacter {
                        file_id: self.file_id,
                        range: start..end,
                        found: ch,
                    });
                }
            }
        }
    }

    fn skip_block_comment(&mut self, start: usize) -> Result<(), Message> {
        self.bump(); // skip '*'

        // Comment bodies may contain arbitrary bytes.
        let mut previous = '\0';
        while let Some((_, ch)) = self.bump() {
            if previous == '*' && ch == '/' {
                return Ok(());
            }
            previous = ch;
        }

        Err(Message::UnterminatedComment {
            file_id: self.file_id,
            range: start..self.src.len(),
        })
    }

    fn identifier(&mut self, start: usize, line: u32, column: u32) -> Token {
        let end = self.take_while(is_ident_continue);
        let text = self.slice(start, end);
        let kind = if is_reserved_word(text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };

        self.token(kind, text, line, column, start..end)
    }

    fn dec_literal(&mut self, start: usize, line: u32, column: u32) -> Result<Token, Message> {
        let end = self.take_while(is_dec_digit);

        // `123abc` is a malformed literal, not two tokens.
        if self.peek().map_or(false, is_ident_start) {
            let end = self.take_while(is_ident_continue);
            return Err(Message::MalformedIntegerLiteral {
                file_id: self.file_id,
                range: start..end,
                found: self.slice(start, end).to_owned(),
            });
        }

        Ok(self.token(
            TokenKind::UnsignedInteger,
            self.slice(start, end),
            line,
            column,
            start..end,
        ))
    }

    fn hex_literal(&mut self, start: usize, line: u32, column: u32) -> Result<Token, Message> {
        self.bump(); // skip 'x'
        let end = self.take_while(is_hex_digit);
        let digits = &self.src[start + 2..end];

        if digits.is_empty() || self.peek().map_or(false, is_ident_continue) {
            let end = self.take_while(is_ident_continue);
            return Err(Message::MalformedIntegerLiteral {
                file_id: self.file_id,
                range: start..end,
                found: self.slice(start, end).to_owned(),
            });
        }

        Ok(self.token(
            TokenKind::HexInteger,
            self.slice(start, end),
            line,
            column,
            start..end,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_id() -> FileId {
        FileId::try_from(1).unwrap()
    }

    /// A handy macro to give us a nice syntax for declaring test cases
    ///
    /// Each `~` span marks the byte range of an expected token.
    macro_rules! test {
        ($src:expr, $($span:expr => ($kind:expr, $text:expr),)*) => {{
            let mut lexer = Lexer::new(file_id(), $src);
            let mut lexed_tokens = Vec::new();
            loop {
                let token = lexer.next_token().unwrap();
                if token.is_eof() {
                    break;
                }
                lexed_tokens.push((token.range.clone(), token.kind, token.text));
            }
            let expected_tokens = vec![$({
                let start = $span.find("~").unwrap();
                let end = $span.rfind("~").unwrap() + 1;
                (start..end, $kind, $text.to_owned())
            }),*];

            assert_eq!(lexed_tokens, expected_tokens);
        }};
    }

    #[test]
    fn data() {
        test! {
            "  foo  0x6Ffa6  1234  ",
            "  ~~~                 " => (TokenKind::Identifier, "foo"),
            "       ~~~~~~~        " => (TokenKind::HexInteger, "0x6Ffa6"),
            "                ~~~~  " => (TokenKind::UnsignedInteger, "1234"),
        };
    }

    #[test]
    fn keywords() {
        test! {
            "  enclave  trusted  untrusted  enum  struct  uint8_t  vector  ",
            "  ~~~~~~~                                                     " => (TokenKind::Keyword, "enclave"),
            "           ~~~~~~~                                            " => (TokenKind::Keyword, "trusted"),
            "                    ~~~~~~~~~                                 " => (TokenKind::Keyword, "untrusted"),
            "                               ~~~~                           " => (TokenKind::Keyword, "enum"),
            "                                     ~~~~~~                   " => (TokenKind::Keyword, "struct"),
            "                                             ~~~~~~~          " => (TokenKind::Keyword, "uint8_t"),
            "                                                      ~~~~~~  " => (TokenKind::Keyword, "vector"),
        };
    }

    #[test]
    fn punctuation() {
        test! {
            " { } ( ) [ ] < > ; , = * ",
            " ~                       " => (TokenKind::Punct('{'), "{"),
            "   ~                     " => (TokenKind::Punct('}'), "}"),
            "     ~                   " => (TokenKind::Punct('('), "("),
            "       ~                 " => (TokenKind::Punct(')'), ")"),
            "         ~               " => (TokenKind::Punct('['), "["),
            "           ~             " => (TokenKind::Punct(']'), "]"),
            "             ~           " => (TokenKind::Punct('<'), "<"),
            "               ~         " => (TokenKind::Punct('>'), ">"),
            "                 ~       " => (TokenKind::Punct(';'), ";"),
            "                   ~     " => (TokenKind::Punct(','), ","),
            "                     ~   " => (TokenKind::Punct('='), "="),
            "                       ~ " => (TokenKind::Punct('*'), "*"),
        };
    }

    #[test]
    fn attribute_words_are_identifiers() {
        test! {
            "in out size count",
            "~~               " => (TokenKind::Identifier, "in"),
            "   ~~~           " => (TokenKind::Identifier, "out"),
            "       ~~~~      " => (TokenKind::Identifier, "size"),
            "            ~~~~~" => (TokenKind::Identifier, "count"),
        };
    }

    #[test]
    fn comments() {
        test! {
            "a // line comment\nb /* block \n comment */ c",
            "~                                           " => (TokenKind::Identifier, "a"),
            "                  ~                         " => (TokenKind::Identifier, "b"),
            "                                           ~" => (TokenKind::Identifier, "c"),
        };
    }

    #[test]
    fn line_and_column_tracking() {
        let src = "enclave {\n    trusted\n};";
        let mut lexer = Lexer::new(file_id(), src);

        let expected = [
            ("enclave", 1, 1),
            ("{", 1, 9),
            ("trusted", 2, 5),
            ("}", 3, 1),
            (";", 3, 2),
        ];
        for (text, line, column) in expected {
            let token = lexer.next_token().unwrap();
            assert_eq!((token.text.as_str(), token.line, token.column), (text, line, column));
        }
        assert!(lexer.next_token().unwrap().is_eof());
    }

    #[test]
    fn eof_is_repeatable() {
        let mut lexer = Lexer::new(file_id(), "");
        assert!(lexer.next_token().unwrap().is_eof());
        assert!(lexer.next_token().unwrap().is_eof());
    }

    #[test]
    fn unterminated_block_comment() {
        let mut lexer = Lexer::new(file_id(), "/* never closed");
        let message = lexer.next_token().unwrap_err();
        assert_eq!(message.code(), "EdlUnexpectedToken");
    }

    #[test]
    fn invalid_character() {
        let mut lexer = Lexer::new(file_id(), "uint8_t \u{2603} x");
        lexer.next_token().unwrap();
        let message = lexer.next_token().unwrap_err();
        assert_eq!(message.code(), "EdlUnexpectedToken");
    }

    #[test]
    fn non_ascii_allowed_in_comments() {
        let mut lexer = Lexer::new(file_id(), "// snowman \u{2603}\nfoo /* \u{2603} */");
        assert_eq!(lexer.next_token().unwrap().text, "foo");
        assert!(lexer.next_token().unwrap().is_eof());
    }

    #[test]
    fn malformed_literals() {
        let mut lexer = Lexer::new(file_id(), "123abc");
        assert_eq!(lexer.next_token().unwrap_err().code(), "EdlUnexpectedToken");

        let mut lexer = Lexer::new(file_id(), "0x");
        assert_eq!(lexer.next_token().unwrap_err().code(), "EdlUnexpectedToken");

        let mut lexer = Lexer::new(file_id(), "0xFGz");
        assert_eq!(lexer.next_token().unwrap_err().code(), "EdlUnexpectedToken");
    }
}
