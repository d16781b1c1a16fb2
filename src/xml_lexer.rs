use crate::errors::Error;
use crate::files::File;
use std::path::PathBuf;

#[derive(Copy, Clone)]
pub struct Context {
    // The next character to process, the source line it is at, and the
    // offset at which we read it.
    offset: usize,
    line: u32,
    current: char,
}

/// Character-level services used by the XML reader.
pub(crate) struct XmlLexer<'a> {
    path: PathBuf,
    input: &'a str,
    context: Context,
}

impl<'a> XmlLexer<'a> {
    /// Builds a new lexer
    pub fn new(file: &'a File) -> Self {
        let f = file.as_str();
        Self {
            path: file.path().to_owned(),
            context: Context {
                current: f.chars().next().unwrap_or('\x00'),
                line: 1,
                offset: 0,
            },
            input: f,
        }
    }

    /// The character that will be processed next (\x00 at end of file)
    #[inline]
    pub fn current(&self) -> char {
        self.context.current
    }

    pub fn line(&self) -> u32 {
        self.context.line
    }

    /// Whether the current character is valid inside an element or
    /// attribute name.
    pub fn is_namechar(&self) -> bool {
        matches!(
            self.context.current,
            '0' ..= '9' | 'A' ..= 'Z' | 'a' ..= 'z' | '_' | '-' | '.' | ':'
        )
    }

    /// Wraps an error with location information, so that we can report
    /// which file+line the error occurred at.
    pub fn error_with_location(&self, error: Error) -> Error {
        Error::WithLocation {
            path: self.path.clone(),
            line: self.context.line,
            error: Box::new(error),
        }
    }

    /// Consumes one character.  This character is both returned and made
    /// available in self.current.
    /// At end of file, it returns \x00
    #[inline]
    pub fn scan_char(&mut self) -> char {
        if self.context.current == '\x00' {
            return '\x00';
        }
        self.context.offset += self.context.current.len_utf8();
        match self.input[self.context.offset..].chars().next() {
            None => self.context.current = '\x00',
            Some('\n') => {
                self.context.line += 1;
                self.context.current = '\n';
            }
            Some(c) => self.context.current = c,
        };
        self.context.current
    }

    /// Whether the remaining input starts with the given text
    pub fn starts_with(&self, s: &str) -> bool {
        self.input[self.context.offset..].starts_with(s)
    }

    /// Consume the given text, which must have been tested with
    /// `starts_with` first.
    pub fn skip_str(&mut self, s: &str) {
        for _ in s.chars() {
            self.scan_char();
        }
    }

    /// Expect the given text at the current position, and consume it.
    pub fn expect_str(&mut self, s: &str) -> Result<(), Error> {
        if self.starts_with(s) {
            self.skip_str(s);
            Ok(())
        } else {
            Err(Error::wrong_token(s, self.describe_current()))
        }
    }

    /// Skip all whitespaces
    pub fn skip_whitespaces(&mut self) {
        while let ' ' | '\t' | '\n' | '\r' = self.context.current {
            self.scan_char(); // skip whitespace
        }
    }

    /// Skip all characters until `end` is found.  The terminator is consumed,
    /// and the text before it is returned.
    pub fn skip_until(&mut self, end: &str) -> Result<&'a str, Error> {
        let start_offset = self.context.offset;
        loop {
            if self.context.current == '\x00' {
                return Err(Error::UnexpectedEOF);
            }
            if self.starts_with(end) {
                let text = &self.input[start_offset..self.context.offset];
                self.skip_str(end);
                return Ok(text);
            }
            self.scan_char();
        }
    }

    /// Get the next element or attribute name.
    pub fn scan_name(&mut self) -> Result<&'a str, Error> {
        let start_offset = self.context.offset;
        while self.is_namechar() {
            self.scan_char();
        }
        if start_offset == self.context.offset {
            Err(Error::wrong_token("name", self.describe_current()))
        } else {
            Ok(&self.input[start_offset..self.context.offset])
        }
    }

    /// On input, self.current is the leading quote.  Entities in the value
    /// are decoded.
    pub fn scan_quote(&mut self) -> Result<String, Error> {
        let endquote = match self.context.current {
            '"' => '"',
            '\'' => '\'',
            _ => {
                return Err(Error::wrong_token(
                    "quoted value",
                    self.describe_current(),
                ))
            }
        };
        self.scan_char(); // consume leading quote

        let mut value = String::new();
        loop {
            match self.context.current {
                '\x00' => return Err(Error::UnexpectedEOF),
                c if c == endquote => {
                    self.scan_char();
                    return Ok(value);
                }
                '&' => value.push(self.scan_entity()?),
                '<' => return Err(Error::wrong_token("quote", "'<'")),
                c => {
                    value.push(c);
                    self.scan_char();
                }
            }
        }
    }

    /// Character data up to the next markup.  Entities are decoded.
    pub fn scan_text(&mut self) -> Result<String, Error> {
        let mut value = String::new();
        loop {
            match self.context.current {
                '\x00' | '<' => return Ok(value),
                '&' => value.push(self.scan_entity()?),
                c => {
                    value.push(c);
                    self.scan_char();
                }
            }
        }
    }

    /// On input, self.current is the '&'
    fn scan_entity(&mut self) -> Result<char, Error> {
        self.scan_char(); // consume '&'
        let name = self.skip_until(";")?;
        match name {
            "lt" => Ok('<'),
            "gt" => Ok('>'),
            "amp" => Ok('&'),
            "quot" => Ok('"'),
            "apos" => Ok('\''),
            _ => {
                let code = if let Some(hex) = name.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = name.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| Error::UnknownEntity(name.to_string()))
            }
        }
    }

    fn describe_current(&self) -> String {
        match self.context.current {
            '\x00' => "end of file".to_string(),
            c => format!("'{}'", c),
        }
    }
}
