//! Single-line processing: extract, then enrich.

use crate::config::{Config, SourceMetadata};
use crate::enrich::{Enricher, Row};
use crate::error::Result;
use crate::format::Format;
use crate::pattern::Pattern;

/// A compiled format paired with an enricher.
///
/// Build one per format and share it; processing a line does not mutate it.
#[derive(Debug, Clone)]
pub struct Processor {
    pattern: Pattern,
    enricher: Enricher,
}

impl Processor {
    /// Compile the configured log format.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ngxrow::{Config, Processor, SourceMetadata};
    ///
    /// let processor = Processor::new(&Config::default())?;
    /// let source = SourceMetadata::new("web-1", "/var/log/nginx/access.log");
    /// let row = processor.process(
    ///     r#"10.0.0.1 - - [10/Oct/2024:13:55:36 +0000] "GET / HTTP/1.1" 200 612 "-" "curl/8.0""#,
    ///     &source,
    /// )?;
    ///
    /// assert_eq!(row.status, Some(200));
    /// assert_eq!(row.common.tp_tags, vec!["method:GET"]);
    /// # Ok::<(), ngxrow::Error>(())
    /// ```
    pub fn new(config: &Config) -> Result<Self> {
        let enricher = Enricher::new(config)?;
        let pattern = config.log_format().compile()?;
        Ok(Self { pattern, enricher })
    }

    /// Use an explicit format instead of [`Config::log_format`].
    pub fn with_format(format: &impl Format, config: &Config) -> Result<Self> {
        Ok(Self {
            pattern: format.compile()?,
            enricher: Enricher::new(config)?,
        })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Turn one log line into a row.
    pub fn process(&self, line: &str, source: &SourceMetadata) -> Result<Row> {
        let entry = self.pattern.parse_line(line)?;
        self.enricher.enrich(entry, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::format::{LogFormat, RegexFormat};

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let err = Processor::new(&Config::default().with_log_format("$remote_addr$status")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);

        let err = Processor::new(&Config::default().with_timezone("Bad/Zone")).unwrap_err();
        assert!(matches!(err, Error::UnknownTimezone { .. }));
    }

    #[test]
    fn test_mismatch_is_no_match() {
        let processor = Processor::new(&Config::default()).unwrap();
        let err = processor
            .process("definitely not nginx", &SourceMetadata::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoMatch);
    }

    #[test]
    fn test_regex_format_splits_request() {
        let format = RegexFormat::new(
            r#"^(?P<remote_addr>\S+) \[(?P<time_local>[^\]]+)\] "(?P<request>[^"]*)" (?P<status>\d{3})"#,
        );
        let processor = Processor::with_format(&format, &Config::default()).unwrap();
        let row = processor
            .process(
                r#"10.1.1.1 [10/Oct/2024:13:55:36 +0000] "POST /login HTTP/2.0" 401"#,
                &SourceMetadata::default(),
            )
            .unwrap();
        assert_eq!(row.method(), Some("POST"));
        assert_eq!(row.path(), Some("/login"));
        assert_eq!(row.http_version(), Some("2.0"));
        assert_eq!(row.common.tp_tags, vec!["method:POST", "error", "client_error"]);
    }

    #[test]
    fn test_custom_layout() {
        let format = LogFormat::new("$remote_addr|$status|$time_iso8601");
        let processor = Processor::with_format(&format, &Config::default()).unwrap();
        let row = processor
            .process("10.1.1.1|204|2024-10-10T13:55:36Z", &SourceMetadata::default())
            .unwrap();
        assert_eq!(row.status, Some(204));
        assert_eq!(row.request, None);
        assert_eq!(row.common.tp_index, "default");
    }
}
