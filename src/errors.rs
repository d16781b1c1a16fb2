use crate::xml::XmlElement;
use ustr::Ustr;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{path}:{line} {error}")]
    WithLocation {
        path: std::path::PathBuf,
        line: u32,
        error: Box<Error>,
    },

    #[error("line {line}: {error}")]
    AtLine { line: u32, error: Box<Error> },

    #[error("{path}: {error}")]
    WithPath {
        path: std::path::PathBuf,
        error: Box<Error>,
    },

    // Errors from the XML reader

    #[error("Unexpected end of file")]
    UnexpectedEOF,

    #[error("Expected {expected}, got {got}")]
    WrongToken { expected: String, got: String },

    #[error("Name {0} should have been {1}")]
    MismatchEndName(Ustr, Ustr),

    #[error("Unknown entity &{0};")]
    UnknownEntity(String),

    // Configuration errors, detected while loading or expanding a setup

    #[error("{element}: missing required attribute '{attr}'")]
    MissingAttribute {
        element: String,
        attr: &'static str,
    },

    #[error("{element}: invalid value '{value}' for attribute '{attr}'")]
    InvalidAttribute {
        element: String,
        attr: &'static str,
        value: String,
    },

    #[error("Iterator '{name}': {reason}")]
    InvalidIterator { name: Ustr, reason: String },

    #[error("Invalid format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },

    #[error("<{0} name='{1}'>: missing content")]
    MissingContent(Ustr, String),

    #[error("Unknown element <{0}>")]
    UnknownTag(Ustr),

    #[error(
        "<function name='{0}'>: function doesn't exist or is not callable \
         from XML"
    )]
    UnknownFunction(Ustr),

    #[error("<function name='{name}'>: cannot parse arguments ({text}): {reason}")]
    InvalidArguments {
        name: Ustr,
        text: String,
        reason: String,
    },

    #[error(
        "baselineSource error: \"{0}\"; should be of the form \
         \"groupName/baselineName\""
    )]
    InvalidBaselineSource(String),

    #[error("Scenario \"{scenario}\" in group \"{group}\" is not a baseline")]
    NotABaseline { group: Ustr, scenario: Ustr },

    #[error("No group requested, and no default group declared")]
    NoDefaultGroup,

    // Lookup errors

    #[error("Iterator '{0}' is not defined")]
    UnknownIterator(Ustr),

    #[error("Group \"{0}\" was not found")]
    UnknownGroup(Ustr),

    #[error("Scenario \"{scenario}\" was not found in group \"{group}\"")]
    UnknownScenario { group: Ustr, scenario: Ustr },

    #[error("Unknown placeholder {{{0}}} in \"{1}\"")]
    UnknownPlaceholder(String, String),

    #[error("Missing argument {0}")]
    MissingArgument(&'static str),

    #[error("No editor registered for key \"{0}\"")]
    UnknownEditor(String),

    // Execution errors, reported by the configuration editor

    #[error("Component \"{0}\" not found")]
    UnknownComponent(String),

    #[error("{0}")]
    Editor(String),

    #[error("{1}: {0}")]
    IoWithPath(std::io::Error, std::path::PathBuf),

    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("{source}")]
    FmtIo {
        #[from]
        source: std::fmt::Error,
    },
}

impl Error {
    pub fn wrong_token<T1, T2>(expected: T1, got: T2) -> Self
    where
        T1: std::fmt::Display,
        T2: std::fmt::Display,
    {
        Error::WrongToken {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub fn invalid_attribute<T: std::fmt::Display>(
        node: &XmlElement,
        attr: &'static str,
        value: T,
    ) -> Self {
        Error::InvalidAttribute {
            element: node.describe(),
            attr,
            value: value.to_string(),
        }
    }

    pub fn invalid_iterator<T: std::fmt::Display>(name: Ustr, reason: T) -> Self {
        Error::InvalidIterator {
            name,
            reason: reason.to_string(),
        }
    }

    /// Wraps the error with the path of the document being processed.
    pub fn with_path(self, path: &std::path::Path) -> Self {
        match self {
            Error::AtLine { line, error } => Error::WithLocation {
                path: path.to_owned(),
                line,
                error,
            },
            Error::WithLocation { .. } | Error::WithPath { .. } => self,
            _ => Error::WithPath {
                path: path.to_owned(),
                error: Box::new(self),
            },
        }
    }

    /// The error itself, without the location it was reported at
    pub fn unlocated(&self) -> &Error {
        match self {
            Error::AtLine { error, .. }
            | Error::WithLocation { error, .. }
            | Error::WithPath { error, .. } => error.unlocated(),
            _ => self,
        }
    }

    /// Whether this error was caused by an invalid setup document (as opposed
    /// to a failed lookup or a failure in the editor).
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::WithLocation { error, .. }
            | Error::AtLine { error, .. }
            | Error::WithPath { error, .. } => error.is_configuration(),
            Error::UnexpectedEOF
            | Error::WrongToken { .. }
            | Error::MismatchEndName(..)
            | Error::UnknownEntity(_)
            | Error::MissingAttribute { .. }
            | Error::InvalidAttribute { .. }
            | Error::InvalidIterator { .. }
            | Error::InvalidFormat { .. }
            | Error::MissingContent(..)
            | Error::UnknownTag(_)
            | Error::UnknownFunction(_)
            | Error::InvalidArguments { .. }
            | Error::InvalidBaselineSource(_)
            | Error::NotABaseline { .. }
            | Error::NoDefaultGroup => true,
            _ => false,
        }
    }
}
