//! Error types for the ngxrow library.

use thiserror::Error;

/// Result type alias for ngxrow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while compiling formats and processing lines.
#[derive(Error, Debug)]
pub enum Error {
    /// The log format template is empty.
    #[error("log format template is empty")]
    EmptyTemplate,

    /// Two tokens follow each other with no literal text between them.
    #[error("ambiguous adjacent tokens '${first}${second}': a literal separator is required")]
    AdjacentTokens { first: String, second: String },

    /// The template references tokens the catalog does not know.
    #[error("unsupported tokens in format: {}", join_tokens(.tokens))]
    UnsupportedTokens { tokens: Vec<String> },

    /// Two tokens in the template would bind the same field.
    #[error("field '{field}' is bound more than once in format")]
    DuplicateField { field: String },

    /// Error when the generated pattern cannot be compiled.
    #[error("invalid format string '{format}': {source}")]
    InvalidFormat {
        format: String,
        #[source]
        source: regex::Error,
    },

    /// Error when a log line doesn't match the expected format.
    #[error("log line '{line}' does not match format '{format}'")]
    LineFormatMismatch { line: String, format: String },

    /// Error when a field is not found in an entry.
    #[error("field '{field}' not found")]
    FieldNotFound { field: String },

    /// Error when a field value cannot be parsed as the requested type.
    #[error("field '{field}' with value '{value}' cannot be parsed as {target_type}: {source}")]
    FieldParseError {
        field: String,
        value: String,
        target_type: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A field the row cannot be built without failed to convert.
    #[error("required field '{field}' is invalid: {source}")]
    InvalidRequiredField {
        field: String,
        #[source]
        source: Box<Error>,
    },

    /// Neither `time_local` nor `time_iso8601` carried a value.
    #[error("no timestamp found in row")]
    MissingTimestamp,

    /// A timestamp field is present but malformed.
    #[error("field '{field}' with value '{value}' is not a valid timestamp: {source}")]
    InvalidTimestamp {
        field: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A named preset does not exist.
    #[error("unknown log format preset '{name}'")]
    UnknownPreset { name: String },

    /// The configured timezone is not an IANA zone name.
    #[error("unknown timezone '{name}'")]
    UnknownTimezone { name: String },

    /// A configuration value failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Error when a log format is not found in nginx configuration.
    #[error("log format '{format_name}' not found in nginx configuration")]
    NginxFormatNotFound { format_name: String },

    /// Error when nginx configuration parsing fails.
    #[error("failed to parse nginx configuration: {message}")]
    NginxConfigError { message: String },

    /// IO error when reading log streams or nginx configuration.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

fn join_tokens(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| format!("${t}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coarse classification of an [`Error`].
///
/// Compile errors are fatal for a format. No-match, row validation and type
/// conversion errors are scoped to one line and never stop a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Compile,
    NoMatch,
    RowValidation,
    TypeConversion,
    Config,
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyTemplate
            | Self::AdjacentTokens { .. }
            | Self::UnsupportedTokens { .. }
            | Self::DuplicateField { .. }
            | Self::InvalidFormat { .. } => ErrorKind::Compile,
            Self::LineFormatMismatch { .. } => ErrorKind::NoMatch,
            Self::FieldNotFound { .. }
            | Self::InvalidRequiredField { .. }
            | Self::MissingTimestamp
            | Self::InvalidTimestamp { .. } => ErrorKind::RowValidation,
            Self::FieldParseError { .. } => ErrorKind::TypeConversion,
            Self::UnknownPreset { .. }
            | Self::UnknownTimezone { .. }
            | Self::InvalidConfig { .. }
            | Self::NginxFormatNotFound { .. }
            | Self::NginxConfigError { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// The field this error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::DuplicateField { field }
            | Self::FieldNotFound { field }
            | Self::FieldParseError { field, .. }
            | Self::InvalidRequiredField { field, .. }
            | Self::InvalidTimestamp { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Create a new adjacent tokens error.
    pub fn adjacent_tokens(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::AdjacentTokens {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Create a new unsupported tokens error.
    pub fn unsupported_tokens(tokens: Vec<String>) -> Self {
        Self::UnsupportedTokens { tokens }
    }

    /// Create a new duplicate field error.
    pub fn duplicate_field(field: impl Into<String>) -> Self {
        Self::DuplicateField {
            field: field.into(),
        }
    }

    /// Create a new invalid format error.
    pub fn invalid_format(format: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidFormat {
            format: format.into(),
            source,
        }
    }

    /// Create a new line format mismatch error.
    pub fn line_format_mismatch(line: impl Into<String>, format: impl Into<String>) -> Self {
        Self::LineFormatMismatch {
            line: line.into(),
            format: format.into(),
        }
    }

    /// Create a new field not found error.
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Self::FieldNotFound {
            field: field.into(),
        }
    }

    /// Create a new field parse error.
    pub fn field_parse_error(
        field: impl Into<String>,
        value: impl Into<String>,
        target_type: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::FieldParseError {
            field: field.into(),
            value: value.into(),
            target_type: target_type.into(),
            source: Box::new(source),
        }
    }

    /// Mark a conversion failure as fatal for the row.
    pub fn invalid_required_field(field: impl Into<String>, source: Error) -> Self {
        Self::InvalidRequiredField {
            field: field.into(),
            source: Box::new(source),
        }
    }

    /// Create a new invalid timestamp error.
    pub fn invalid_timestamp(
        field: impl Into<String>,
        value: impl Into<String>,
        source: chrono::ParseError,
    ) -> Self {
        Self::InvalidTimestamp {
            field: field.into(),
            value: value.into(),
            source,
        }
    }

    /// Create a new unknown preset error.
    pub fn unknown_preset(name: impl Into<String>) -> Self {
        Self::UnknownPreset { name: name.into() }
    }

    /// Create a new unknown timezone error.
    pub fn unknown_timezone(name: impl Into<String>) -> Self {
        Self::UnknownTimezone { name: name.into() }
    }

    /// Create a new invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new nginx format not found error.
    pub fn nginx_format_not_found(format_name: impl Into<String>) -> Self {
        Self::NginxFormatNotFound {
            format_name: format_name.into(),
        }
    }

    /// Create a new nginx config error.
    pub fn nginx_config_error(message: impl Into<String>) -> Self {
        Self::NginxConfigError {
            message: message.into(),
        }
    }
}

/// A failure scoped to one input line.
#[derive(Error, Debug)]
#[error("line {line_number}: {error}")]
pub struct LineError {
    /// 1-based line number within the stream.
    pub line_number: usize,
    /// The offending line, without its terminator.
    pub line: String,
    #[source]
    pub error: Error,
}

impl LineError {
    pub fn new(line_number: usize, line: impl Into<String>, error: Error) -> Self {
        Self {
            line_number,
            line: line.into(),
            error,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_tokens_message_lists_all() {
        let err = Error::unsupported_tokens(vec!["remote_usr".into(), "foo".into()]);
        assert_eq!(
            err.to_string(),
            "unsupported tokens in format: $remote_usr, $foo"
        );
        assert_eq!(err.kind(), ErrorKind::Compile);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::MissingTimestamp.kind(), ErrorKind::RowValidation);
        assert_eq!(
            Error::line_format_mismatch("x", "$status").kind(),
            ErrorKind::NoMatch
        );
        let parse_err = "x".parse::<i64>().unwrap_err();
        let err = Error::field_parse_error("status", "x", "i64", parse_err);
        assert_eq!(err.kind(), ErrorKind::TypeConversion);
        assert_eq!(err.field(), Some("status"));
    }

    #[test]
    fn test_required_field_is_row_validation() {
        let parse_err = "2xx".parse::<i64>().unwrap_err();
        let err = Error::invalid_required_field(
            "status",
            Error::field_parse_error("status", "2xx", "integer", parse_err),
        );
        assert_eq!(err.kind(), ErrorKind::RowValidation);
        assert_eq!(err.field(), Some("status"));

        let line_err = LineError::new(3, "garbage", err);
        assert_eq!(line_err.kind(), ErrorKind::RowValidation);
        assert!(line_err.to_string().starts_with("line 3: required field 'status'"));
    }

    #[test]
    fn test_adjacent_message() {
        let err = Error::adjacent_tokens("remote_addr", "status");
        assert_eq!(
            err.to_string(),
            "ambiguous adjacent tokens '$remote_addr$status': a literal separator is required"
        );
    }
}
