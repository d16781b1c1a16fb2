/// Arguments of a `<function>` action.
/// The content of the element is a list of literal arguments, positional
/// first, then keywords, for instance:
///     <function name="setConfigValue">"stop-year", 2050</function>
///     <function name="renameComponent">old='a', new="b"</function>
/// Only strings, numbers and booleans are accepted: the text is never
/// evaluated as an expression.
use itertools::join;
use std::iter::Peekable;
use std::str::Chars;
use ustr::Ustr;

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "{}", s),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Literal>,
    pub keywords: Vec<(Ustr, Literal)>,
}

#[derive(Debug, PartialEq)]
enum ArgToken {
    Literal(Literal),
    Identifier(String),
    Comma,
    Equal,
}

struct ArgScanner<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> ArgScanner<'a> {
    fn skip_whitespaces(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    /// Return the next token, or None at the end of the text
    fn next_token(&mut self) -> Result<Option<ArgToken>, String> {
        self.skip_whitespaces();
        let c = match self.chars.peek() {
            None => return Ok(None),
            Some(c) => *c,
        };
        match c {
            ',' => {
                self.chars.next();
                Ok(Some(ArgToken::Comma))
            }
            '=' => {
                self.chars.next();
                Ok(Some(ArgToken::Equal))
            }
            '"' | '\'' => self.scan_string(c).map(Some),
            '0'..='9' | '-' | '+' | '.' => self.scan_number().map(Some),
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = self.chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    ident.push(c);
                    self.chars.next();
                }
                Ok(Some(match ident.as_str() {
                    "True" | "true" => ArgToken::Literal(Literal::Bool(true)),
                    "False" | "false" => {
                        ArgToken::Literal(Literal::Bool(false))
                    }
                    _ => ArgToken::Identifier(ident),
                }))
            }
            c => Err(format!("unexpected character '{}'", c)),
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<ArgToken, String> {
        self.chars.next(); // consume leading quote
        let mut s = String::new();
        loop {
            match self.chars.next() {
                None => return Err("unterminated string".into()),
                Some(c) if c == quote => {
                    return Ok(ArgToken::Literal(Literal::Str(s)))
                }
                Some('\\') => match self.chars.next() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => s.push(c),
                    Some(c) => {
                        s.push('\\');
                        s.push(c);
                    }
                    None => return Err("unterminated string".into()),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn scan_number(&mut self) -> Result<ArgToken, String> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'))
            {
                break;
            }
            // A sign is only valid at the start, or after an exponent
            if matches!(c, '-' | '+')
                && !(text.is_empty() || text.ends_with(|c| c == 'e' || c == 'E'))
            {
                break;
            }
            text.push(c);
            self.chars.next();
        }
        let clean = text.replace('_', "");
        if let Ok(i) = clean.parse::<i64>() {
            Ok(ArgToken::Literal(Literal::Int(i)))
        } else if let Ok(f) = clean.parse::<f64>() {
            Ok(ArgToken::Literal(Literal::Float(f)))
        } else {
            Err(format!("invalid number '{}'", text))
        }
    }
}

impl Arguments {
    /// Parse a comma-separated list of literals.  Keyword arguments must
    /// come after all positional arguments.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut scan = ArgScanner {
            chars: text.chars().peekable(),
        };
        let mut args = Arguments::default();

        loop {
            let token = match scan.next_token()? {
                None => return Ok(args),
                Some(t) => t,
            };
            match token {
                ArgToken::Literal(lit) => {
                    if !args.keywords.is_empty() {
                        return Err(
                            "positional argument follows keyword argument"
                                .into(),
                        );
                    }
                    args.positional.push(lit);
                }
                ArgToken::Identifier(name) => {
                    if scan.next_token()? != Some(ArgToken::Equal) {
                        return Err(format!(
                            "'{}': only literal values are allowed",
                            name
                        ));
                    }
                    match scan.next_token()? {
                        Some(ArgToken::Literal(lit)) => {
                            let name = Ustr::from(name.as_str());
                            if args.keywords.iter().any(|(n, _)| *n == name) {
                                return Err(format!(
                                    "keyword argument '{}' repeated",
                                    name
                                ));
                            }
                            args.keywords.push((name, lit));
                        }
                        _ => {
                            return Err(format!(
                                "expected a literal value for '{}'",
                                name
                            ))
                        }
                    }
                }
                ArgToken::Comma | ArgToken::Equal => {
                    return Err("expected an argument".into())
                }
            }

            match scan.next_token()? {
                None => return Ok(args),
                Some(ArgToken::Comma) => {}
                Some(_) => return Err("expected ',' between arguments".into()),
            }
        }
    }

    /// The argument given either at position `index`, or with the keyword
    /// `name`.
    pub fn get(&self, index: usize, name: &str) -> Option<&Literal> {
        self.positional.get(index).or_else(|| {
            self.keywords
                .iter()
                .find(|(n, _)| n.as_str() == name)
                .map(|(_, v)| v)
        })
    }

    /// Same as `get`, but the argument is required
    pub fn require(&self, index: usize, name: &str) -> Result<&Literal, String> {
        self.get(index, name)
            .ok_or_else(|| format!("missing argument '{}'", name))
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |lit: &Literal| match lit {
            Literal::Str(s) => format!("{:?}", s),
            l => l.to_string(),
        };
        let positional = self.positional.iter().map(show);
        let keywords = self
            .keywords
            .iter()
            .map(|(n, v)| format!("{}={}", n, show(v)));
        write!(f, "{}", join(positional.chain(keywords), ", "))
    }
}

#[cfg(test)]
mod tests {
    use crate::args::{Arguments, Literal};
    use ustr::Ustr;

    #[test]
    fn parse_literals() -> Result<(), String> {
        let args = Arguments::parse(
            "'a,b', \"it's\", 2050, -1.5e2, True, year=2020, name='x'",
        )?;
        assert_eq!(
            args.positional,
            vec![
                Literal::Str("a,b".into()),
                Literal::Str("it's".into()),
                Literal::Int(2050),
                Literal::Float(-150.0),
                Literal::Bool(true),
            ]
        );
        assert_eq!(
            args.keywords,
            vec![
                (Ustr::from("year"), Literal::Int(2020)),
                (Ustr::from("name"), Literal::Str("x".into())),
            ]
        );
        assert_eq!(args.get(5, "name"), Some(&Literal::Str("x".into())));
        assert_eq!(args.len(), 7);
        Ok(())
    }

    #[test]
    fn empty_and_trailing_comma() -> Result<(), String> {
        assert!(Arguments::parse("")?.is_empty());
        assert!(Arguments::parse("   ")?.is_empty());
        assert_eq!(Arguments::parse("1,")?.positional, vec![Literal::Int(1)]);
        Ok(())
    }

    #[test]
    fn display() -> Result<(), String> {
        let args = Arguments::parse("'a', 3, flag=false")?;
        assert_eq!(args.to_string(), "\"a\", 3, flag=false");
        Ok(())
    }

    #[test]
    fn rejected() {
        assert!(Arguments::parse("os.remove('x')").is_err());
        assert!(Arguments::parse("x").is_err());
        assert!(Arguments::parse("a=1, 2").is_err());
        assert!(Arguments::parse("'unterminated").is_err());
        assert!(Arguments::parse("1 2").is_err());
        assert!(Arguments::parse(",").is_err());
        assert!(Arguments::parse("a=1, a=2").is_err());
        assert!(Arguments::parse("1.2.3").is_err());
    }
}
