//! Purpose: Error model shared by the cache core, the gateway, and the CLI.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Single error type; context is attached via builder methods.
//! Invariants: Schema/path misuse kinds are raised synchronously, never retried.
//! Invariants: `Remote` wraps gateway faults verbatim; the cause stays chained.

use std::error::Error as StdError;
use std::fmt;

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Model name is not registered on the remote server.
    UnknownModel,
    /// A dotted path named an unknown field or traversed a non-relational one.
    InvalidFieldPath,
    /// Relation accessor used on a scalar field.
    NotARelation,
    /// Underscore-prefixed method rejected before reaching the wire.
    PrivateMethod,
    /// Opaque wrapper around any failure surfaced by the remote gateway.
    Remote,
    /// Caller-side misuse (bad arguments, unusable connection parameters).
    Usage,
    /// Local filesystem failure (session file).
    Io,
    /// Gateway payload did not have the promised shape.
    Corrupt,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    model: Option<String>,
    field: Option<String>,
    segment: Option<String>,
    fault: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            model: None,
            field: None,
            segment: None,
            fault: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// First unresolvable segment of a dotted path.
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    /// Remote fault code, kept verbatim from the wire.
    pub fn with_fault(mut self, fault: impl Into<String>) -> Self {
        self.fault = Some(fault.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(model) = &self.model {
            write!(f, " (model: {model})")?;
        }
        if let Some(field) = &self.field {
            write!(f, " (field: {field})")?;
        }
        if let Some(segment) = &self.segment {
            write!(f, " (segment: {segment})")?;
        }
        if let Some(fault) = &self.fault {
            write!(f, " (fault: {fault})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Usage => 2,
        ErrorKind::UnknownModel => 3,
        ErrorKind::InvalidFieldPath => 4,
        ErrorKind::NotARelation => 5,
        ErrorKind::PrivateMethod => 6,
        ErrorKind::Remote => 7,
        ErrorKind::Io => 8,
        ErrorKind::Corrupt => 9,
    }
}
