/// A minimal reader for setup documents.
/// It builds an element tree similar to what ElementTree-like libraries
/// provide: for each element, its tag, its attributes (in declaration order),
/// its leading text and its child elements.  Comments, processing
/// instructions and the doctype are skipped.  Validation against a schema is
/// not performed here, the loaders check what they need.
use crate::errors::Error;
use crate::files::File;
use crate::xml_lexer::XmlLexer;
use ustr::Ustr;

#[derive(Clone, Debug, PartialEq)]
pub struct XmlElement {
    pub tag: Ustr,
    pub attrs: Vec<(Ustr, String)>,
    pub text: Option<String>, // text before the first child element
    pub children: Vec<XmlElement>,
    pub line: u32,
}

impl XmlElement {
    pub fn new(tag: &str) -> Self {
        XmlElement {
            tag: Ustr::from(tag),
            attrs: Vec::new(),
            text: None,
            children: Vec::new(),
            line: 0,
        }
    }

    /// Value of an optional attribute
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Value of an optional attribute, where an empty string is the same as
    /// a missing attribute.
    pub fn get_non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|v| !v.is_empty())
    }

    /// Value of a mandatory attribute
    pub fn require(&self, name: &'static str) -> Result<&str, Error> {
        self.get(name).ok_or_else(|| Error::MissingAttribute {
            element: self.describe(),
            attr: name,
        })
    }

    /// Read a boolean attribute.  All of "1", "true", "yes" and "on" are
    /// accepted (case insensitive), as well as their opposite.
    pub fn get_bool(
        &self,
        name: &'static str,
        default: bool,
    ) -> Result<bool, Error> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" | "" => Ok(false),
                _ => Err(Error::invalid_attribute(self, name, v)),
            },
        }
    }

    /// How the element is shown in error messages
    pub fn describe(&self) -> String {
        match self.get_non_empty("name") {
            Some(name) => format!("<{} name='{}'>", self.tag, name),
            None => format!("<{}>", self.tag),
        }
    }

    /// Attach the element's line to an error raised while loading it.
    /// Errors that already have a location are left unchanged, so the
    /// innermost element wins.
    pub fn locate(&self, err: Error) -> Error {
        match err {
            Error::AtLine { .. } | Error::WithLocation { .. } | Error::WithPath { .. } => {
                err
            }
            _ => Error::AtLine {
                line: self.line,
                error: Box::new(err),
            },
        }
    }

    /// The child elements with a specific tag
    pub fn children_named<'a>(
        &'a self,
        tag: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.tag.as_str() == tag)
    }
}

struct XmlReader<'a> {
    lex: XmlLexer<'a>,
}

/// Parse a whole document and return its root element.
pub fn parse_document(file: &File) -> Result<XmlElement, Error> {
    let mut reader = XmlReader {
        lex: XmlLexer::new(file),
    };
    match reader.parse() {
        Ok(root) => Ok(root),
        Err(e) => Err(reader.lex.error_with_location(e)),
    }
}

impl<'a> XmlReader<'a> {
    fn parse(&mut self) -> Result<XmlElement, Error> {
        self.skip_misc()?;
        if self.lex.current() != '<' {
            return Err(Error::wrong_token("root element", "text"));
        }
        let root = self.parse_element()?;
        self.skip_misc()?;
        match self.lex.current() {
            '\x00' => Ok(root),
            _ => Err(Error::wrong_token("end of file", "extra content")),
        }
    }

    /// Skip whitespaces, comments, processing instructions and doctype
    /// outside of the root element.
    fn skip_misc(&mut self) -> Result<(), Error> {
        loop {
            self.lex.skip_whitespaces();
            if self.lex.starts_with("<?") {
                self.lex.skip_until("?>")?;
            } else if self.lex.starts_with("<!--") {
                self.lex.skip_until("-->")?;
            } else if self.lex.starts_with("<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    /// Skip the doctype, including its internal subset.  Entities declared
    /// there are not available in the document.
    fn skip_doctype(&mut self) -> Result<(), Error> {
        self.lex.skip_str("<!DOCTYPE");
        let mut in_subset = false;
        loop {
            match self.lex.current() {
                '\x00' => return Err(Error::UnexpectedEOF),
                '"' => {
                    self.lex.scan_char();
                    self.lex.skip_until("\"")?;
                }
                '\'' => {
                    self.lex.scan_char();
                    self.lex.skip_until("'")?;
                }
                '[' if !in_subset => {
                    in_subset = true;
                    self.lex.scan_char();
                }
                ']' if in_subset => {
                    in_subset = false;
                    self.lex.scan_char();
                }
                '>' if !in_subset => {
                    self.lex.scan_char();
                    return Ok(());
                }
                _ if self.lex.starts_with("<!--") => {
                    self.lex.skip_until("-->")?;
                }
                _ => {
                    self.lex.scan_char();
                }
            }
        }
    }

    /// On input, the current character is the '<' that starts the element
    fn parse_element(&mut self) -> Result<XmlElement, Error> {
        let line = self.lex.line();
        self.lex.expect_str("<")?;
        let mut elem = XmlElement::new(self.lex.scan_name()?);
        elem.line = line;

        loop {
            self.lex.skip_whitespaces();
            if self.lex.starts_with("/>") {
                self.lex.skip_str("/>");
                return Ok(elem);
            }
            if self.lex.current() == '>' {
                self.lex.scan_char();
                break;
            }
            let name = Ustr::from(self.lex.scan_name()?);
            self.lex.skip_whitespaces();
            self.lex.expect_str("=")?;
            self.lex.skip_whitespaces();
            let value = self.lex.scan_quote()?;
            elem.attrs.push((name, value));
        }

        let mut text = String::new();
        loop {
            if self.lex.starts_with("</") {
                self.lex.skip_str("</");
                let name = Ustr::from(self.lex.scan_name()?);
                self.lex.skip_whitespaces();
                self.lex.expect_str(">")?;
                if name != elem.tag {
                    return Err(Error::MismatchEndName(name, elem.tag));
                }
                if !text.is_empty() {
                    elem.text = Some(text);
                }
                return Ok(elem);
            } else if self.lex.starts_with("<!--") {
                self.lex.skip_until("-->")?;
            } else if self.lex.starts_with("<![CDATA[") {
                self.lex.skip_str("<![CDATA[");
                let data = self.lex.skip_until("]]>")?;
                if elem.children.is_empty() {
                    text.push_str(data);
                }
            } else if self.lex.starts_with("<?") {
                self.lex.skip_until("?>")?;
            } else if self.lex.current() == '<' {
                elem.children.push(self.parse_element()?);
            } else if self.lex.current() == '\x00' {
                return Err(Error::UnexpectedEOF);
            } else {
                //  Text after a child element (the "tail") is not kept
                let data = self.lex.scan_text()?;
                if elem.children.is_empty() {
                    text.push_str(&data);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::Error;
    use crate::files::File;
    use crate::xml::{parse_document, XmlElement};

    fn parse(s: &str) -> Result<XmlElement, Error> {
        parse_document(&File::new_from_str(s))
    }

    fn expect_error(s: &str, msg: &str) {
        match parse(s) {
            Err(e) => assert_eq!(e.to_string(), msg),
            Ok(_) => panic!("while parsing {}, expected an error", s),
        }
    }

    #[test]
    fn parse_tree() -> Result<(), Error> {
        let root = parse(
            "<?xml version='1.0' encoding='UTF-8'?>
             <!-- header -->
             <setup defaultGroup='g'>
                <iterator name='i' type='int' min='1' max='3'/>
                <scenarioGroup name=\"g\">
                   <scenario name='s'>
                      <add name='x'>a &amp; b</add>
                      <replace name='y'><![CDATA[<raw>]]></replace>
                   </scenario>
                </scenarioGroup>
             </setup>",
        )?;
        assert_eq!(root.tag.as_str(), "setup");
        assert_eq!(root.get("defaultGroup"), Some("g"));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children_named("iterator").count(), 1);
        assert_eq!(root.children[0].get("max"), Some("3"));
        assert_eq!(root.children[0].line, 4);

        let scen = &root.children[1].children[0];
        assert_eq!(scen.children[0].text.as_deref(), Some("a & b"));
        assert_eq!(scen.children[1].text.as_deref(), Some("<raw>"));
        Ok(())
    }

    #[test]
    fn doctype_subset() -> Result<(), Error> {
        let root = parse(
            "<?xml version='1.0'?>
             <!DOCTYPE setup [
                <!ENTITY year \"2050>\">
                <!-- a ] in a comment -->
                <!ELEMENT setup ANY>
             ]>
             <setup defaultGroup='g'/>",
        )?;
        assert_eq!(root.tag.as_str(), "setup");
        assert_eq!(root.get("defaultGroup"), Some("g"));
        assert_eq!(root.line, 7);

        let root = parse("<!DOCTYPE setup SYSTEM 'setup.dtd'><setup/>")?;
        assert_eq!(root.tag.as_str(), "setup");

        expect_error(
            "<!DOCTYPE setup [ <!ENTITY a 'b'>",
            ":memory::1 Unexpected end of file",
        );
        Ok(())
    }

    #[test]
    fn booleans() -> Result<(), Error> {
        let root = parse("<g a='1' b='False' c='yes' d='maybe'/>")?;
        assert!(root.get_bool("a", false)?);
        assert!(!root.get_bool("b", true)?);
        assert!(root.get_bool("c", false)?);
        assert!(root.get_bool("missing", true)?);
        assert!(root.get_bool("d", false).is_err());
        Ok(())
    }

    #[test]
    fn parse_errors() {
        expect_error("<a>", ":memory::1 Unexpected end of file");
        expect_error(
            "<a>\n</b>",
            ":memory::2 Name b should have been a",
        );
        expect_error(
            "<a x=1/>",
            ":memory::1 Expected quoted value, got '1'",
        );
    }

    #[test]
    fn missing_attribute() -> Result<(), Error> {
        let root = parse("<iterator name='x'/>")?;
        match root.require("type") {
            Err(e) => assert_eq!(
                e.to_string(),
                "<iterator name='x'>: missing required attribute 'type'"
            ),
            Ok(_) => panic!("expected an error"),
        }
        Ok(())
    }

    #[test]
    fn error_location() -> Result<(), Error> {
        let root = parse("<setup>\n\n  <add name='x' dynamic='maybe'/>\n</setup>")?;
        let add = &root.children[0];
        assert_eq!(add.describe(), "<add name='x'>");
        let err = add.locate(add.get_bool("dynamic", false).unwrap_err());
        assert_eq!(
            err.to_string(),
            "line 3: <add name='x'>: invalid value 'maybe' for attribute 'dynamic'"
        );

        // The innermost location is kept
        let err = root.locate(err);
        assert!(matches!(err, Error::AtLine { line: 3, .. }));
        assert!(matches!(err.unlocated(), Error::InvalidAttribute { .. }));
        Ok(())
    }
}
