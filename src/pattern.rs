//! Compiled line patterns and field extraction.

use crate::entry::{Entry, Fields};
use crate::error::{Error, Result};
use regex::Regex;
use tracing::trace;

/// A compiled log format.
///
/// Patterns are immutable once built and can be shared between threads;
/// cloning is cheap.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// The format the pattern was compiled from.
    layout: String,
    /// The compiled regular expression.
    regex: Regex,
    /// Bound field names, in template order.
    fields: Vec<String>,
}

impl Pattern {
    pub(crate) fn new(layout: &str, regex: Regex, fields: Vec<String>) -> Self {
        Self {
            layout: layout.to_string(),
            regex,
            fields,
        }
    }

    /// The format this pattern was compiled from.
    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// The compiled regular expression.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// The generated pattern text.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// The field names this pattern can bind.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Check whether a line conforms to the format.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Extract the named fields from a line.
    ///
    /// Returns `None` when the line does not conform to the format. Optional
    /// groups that did not participate in the match are left out of the
    /// entry.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ngxrow::format::compile;
    ///
    /// let pattern = compile(r#""$request" $status"#)?;
    /// let entry = pattern.extract(r#""GET /health" 204"#).unwrap();
    ///
    /// assert_eq!(entry.get("request_uri"), Some("/health"));
    /// assert_eq!(entry.get("server_protocol"), None);
    /// # Ok::<(), ngxrow::Error>(())
    /// ```
    pub fn extract(&self, line: &str) -> Option<Entry> {
        let captures = self.regex.captures(line)?;

        let mut fields = Fields::with_capacity(self.fields.len());
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                fields.insert(name.to_string(), value.as_str().to_string());
            }
        }

        trace!(fields = fields.len(), "extracted line");
        Some(Entry::from_fields(fields))
    }

    /// Like [`extract`](Self::extract), but a non-conforming line is an error.
    pub fn parse_line(&self, line: &str) -> Result<Entry> {
        self.extract(line)
            .ok_or_else(|| Error::line_format_mismatch(line, &self.layout))
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::format::{compile, COMBINED};
    use std::thread;

    #[test]
    fn test_optional_request_parts_are_absent() {
        let pattern = compile(r#""$request" $status"#).unwrap();

        let entry = pattern.extract(r#""GET /index.html" 200"#).unwrap();
        assert_eq!(entry.get("request_method"), Some("GET"));
        assert_eq!(entry.get("request_uri"), Some("/index.html"));
        assert!(!entry.contains("server_protocol"));

        let entry = pattern.extract(r#""PRI" 400"#).unwrap();
        assert_eq!(entry.get("request_method"), Some("PRI"));
        assert!(!entry.contains("request_uri"));
        assert_eq!(entry.len(), 2);
    }

    #[test]
    fn test_empty_capture_is_kept() {
        let pattern = compile("$remote_addr [$time_local]").unwrap();
        let entry = pattern.extract("10.0.0.1 []").unwrap();
        assert_eq!(entry.get("time_local"), Some(""));
    }

    #[test]
    fn test_parse_line_mismatch() {
        let pattern = compile(COMBINED).unwrap();
        let err = pattern.parse_line("This is not a valid log line").unwrap_err();
        assert!(matches!(err, Error::LineFormatMismatch { .. }));
        assert!(!pattern.is_match("This is not a valid log line"));
    }

    #[test]
    fn test_pattern_shared_across_threads() {
        let pattern = compile(COMBINED).unwrap();
        let lines: Vec<String> = (0..8)
            .map(|i| {
                format!(
                    r#"10.0.0.{i} - - [10/Oct/2024:13:55:36 -0700] "GET /{i} HTTP/1.1" 200 {i} "-" "curl""#
                )
            })
            .collect();

        let pattern = &pattern;
        thread::scope(|scope| {
            let handles: Vec<_> = lines
                .iter()
                .map(|line| scope.spawn(move || pattern.extract(line).unwrap()))
                .collect();
            for (i, handle) in handles.into_iter().enumerate() {
                let entry = handle.join().unwrap();
                assert_eq!(entry.get("remote_addr"), Some(format!("10.0.0.{i}").as_str()));
                assert_eq!(entry.get("body_bytes_sent"), Some(i.to_string().as_str()));
            }
        });
    }
}
