// This module implements the character-level lexer of the B compiler. The parser never
// sees a token stream: it pulls characters one at a time and pushes back whatever it
// over-read, so the lexer offers read/unread/peek primitives with an unbounded pushback
// stack plus scanners for the handful of lexical forms B has. Whitespace skipping also
// consumes /* ... */ comments. Numbers starting with 0 are octal. Character literals pack
// up to one word of bytes big-endian. Strings and characters share the '*' escape syntax.
// The lexer keeps the current line number, adjusted on pushback, so errors can be located.

//! Character-level lexer with pushback.

use crate::core::{CompileError, CompileResult};

/// True for characters that may appear inside an identifier.
pub fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// True for characters that may start an identifier.
pub fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

pub struct Lexer<'a> {
    chars: std::str::Chars<'a>,
    pushback: Vec<char>,
    line: usize,
    word_size: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, word_size: usize) -> Self {
        Self {
            chars: source.chars(),
            pushback: Vec::new(),
            line: 1,
            word_size,
        }
    }

    /// Line of the next character to be read.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn read_char(&mut self) -> Option<char> {
        let ch = self.pushback.pop().or_else(|| self.chars.next())?;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    pub fn unread_char(&mut self, ch: char) {
        if ch == '\n' {
            self.line -= 1;
        }
        self.pushback.push(ch);
    }

    /// Push back a whole string so that its first character is read next.
    pub fn unread_str(&mut self, s: &str) {
        for ch in s.chars().rev() {
            self.unread_char(ch);
        }
    }

    pub fn peek_char(&mut self) -> Option<char> {
        let ch = self.read_char()?;
        self.unread_char(ch);
        Some(ch)
    }

    pub fn is_eof(&mut self) -> bool {
        self.peek_char().is_none()
    }

    /// Skip whitespace and comments.
    pub fn whitespace(&mut self) -> CompileResult<()> {
        while let Some(ch) = self.read_char() {
            if ch.is_whitespace() {
                continue;
            }
            if ch == '/' {
                match self.read_char() {
                    Some('*') => {
                        self.comment()?;
                        continue;
                    }
                    Some(other) => self.unread_char(other),
                    None => {}
                }
            }
            self.unread_char(ch);
            break;
        }
        Ok(())
    }

    fn comment(&mut self) -> CompileResult<()> {
        let mut star = false;
        loop {
            match self.read_char() {
                None => return Err(CompileError::UnclosedComment),
                Some('/') if star => return Ok(()),
                Some(ch) => star = ch == '*',
            }
        }
    }

    /// Read an identifier after skipping whitespace. Returns an empty string when
    /// the next character cannot start one.
    pub fn identifier(&mut self) -> CompileResult<String> {
        self.whitespace()?;
        let mut name = String::new();
        match self.read_char() {
            Some(ch) if is_identifier_start(ch) => name.push(ch),
            Some(ch) => {
                self.unread_char(ch);
                return Ok(name);
            }
            None => return Ok(name),
        }
        while let Some(ch) = self.read_char() {
            if !is_identifier_char(ch) {
                self.unread_char(ch);
                break;
            }
            name.push(ch);
        }
        Ok(name)
    }

    /// Read an integer constant. A leading `0` selects octal.
    pub fn number(&mut self) -> CompileResult<i64> {
        self.whitespace()?;
        let first = self.read_char();
        let Some(first_digit) = first.and_then(|c| c.to_digit(10)) else {
            if let Some(ch) = first {
                self.unread_char(ch);
            }
            return Err(CompileError::expected("number", first));
        };
        let base: i64 = if first_digit == 0 { 8 } else { 10 };
        let mut value = i64::from(first_digit);
        while let Some(ch) = self.read_char() {
            let Some(digit) = ch.to_digit(10) else {
                self.unread_char(ch);
                break;
            };
            if base == 8 && digit > 7 {
                return Err(CompileError::InvalidOctalDigit(ch));
            }
            value = value.wrapping_mul(base).wrapping_add(i64::from(digit));
        }
        Ok(value)
    }

    /// Read the body of a character literal; the opening quote is already consumed.
    /// Up to one word of bytes is packed big-endian.
    pub fn character(&mut self) -> CompileResult<i64> {
        let mut value: i64 = 0;
        for _ in 0..self.word_size {
            let ch = match self.read_char() {
                None => return Err(CompileError::UnclosedCharLiteral),
                Some('\'') => return Ok(value),
                Some('*') => self.escape()?.ok_or(CompileError::UnclosedCharLiteral)?,
                Some(ch) => ch,
            };
            value = (value << 8) | (u32::from(ch) & 0xff) as i64;
        }
        match self.read_char() {
            Some('\'') => Ok(value),
            _ => Err(CompileError::UnclosedCharLiteral),
        }
    }

    /// Read the body of a string literal; the opening quote is already consumed.
    pub fn string(&mut self) -> CompileResult<String> {
        let mut text = String::new();
        loop {
            match self.read_char() {
                None => return Err(CompileError::UnterminatedString),
                Some('"') => return Ok(text),
                Some('*') => text.push(self.escape()?.ok_or(CompileError::UnterminatedString)?),
                Some(ch) => text.push(ch),
            }
        }
    }

    /// Decode the character after a `*` escape. `None` at end of input; the literal
    /// being read decides which error that is.
    pub fn escape(&mut self) -> CompileResult<Option<char>> {
        let decoded = match self.read_char() {
            Some('0') | Some('e') => '\0',
            Some('t') => '\t',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('(') => '{',
            Some(')') => '}',
            Some(ch @ ('\'' | '"' | '*')) => ch,
            Some(ch) => return Err(CompileError::UndefinedEscapeCharacter(ch)),
            None => return Ok(None),
        };
        Ok(Some(decoded))
    }

    /// Skip whitespace and consume `ch` if it comes next.
    pub fn try_read(&mut self, ch: char) -> CompileResult<bool> {
        self.whitespace()?;
        match self.read_char() {
            Some(c) if c == ch => Ok(true),
            Some(c) => {
                self.unread_char(c);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Skip whitespace and require `ch`; `context` completes the error message.
    pub fn expect(&mut self, ch: char, context: &str) -> CompileResult<()> {
        self.whitespace()?;
        match self.read_char() {
            Some(c) if c == ch => Ok(()),
            found => Err(CompileError::expected(format!("'{ch}' {context}"), found)),
        }
    }

    /// Match `word` as a whole keyword. Everything read is pushed back on mismatch.
    pub fn try_keyword(&mut self, word: &str) -> CompileResult<bool> {
        self.whitespace()?;
        let mut consumed = String::new();
        for expected in word.chars() {
            match self.read_char() {
                Some(ch) if ch == expected => consumed.push(ch),
                Some(ch) => {
                    self.unread_char(ch);
                    self.unread_str(&consumed);
                    return Ok(false);
                }
                None => {
                    self.unread_str(&consumed);
                    return Ok(false);
                }
            }
        }
        if let Some(next) = self.peek_char() {
            if is_identifier_char(next) {
                self.unread_str(&consumed);
                return Ok(false);
            }
        }
        Ok(true)
    }
}
