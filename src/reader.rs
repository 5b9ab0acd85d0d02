//! Line-stream processing.

use crate::config::{Config, SourceMetadata};
use crate::enrich::Row;
use crate::error::{Error, ErrorKind, LineError, Result};
use crate::processor::Processor;
use std::borrow::Cow;
use std::io::{BufRead, BufReader, Read};
use tracing::{debug, warn};

/// Turns every non-empty line of an input stream into a [`Row`].
///
/// The reader implements `Iterator`, yielding one result per non-empty line.
/// A line that fails never ends the stream; only a read error does, and it is
/// reported once before the iterator finishes.
#[derive(Debug)]
pub struct Reader<R: Read> {
    /// The underlying buffered reader.
    reader: BufReader<R>,
    processor: Processor,
    source: SourceMetadata,
    line_number: usize,
    done: bool,
}

/// Totals from [`Reader::process_rows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadStats {
    pub rows: usize,
    pub skipped: usize,
}

impl<R: Read> Reader<R> {
    /// Create a reader using the log format in `config`.
    ///
    /// # Arguments
    ///
    /// * `input` - The input source (file, stdin, etc.)
    /// * `config` - Log format, timezone and enrichment options
    /// * `source` - Metadata about where the lines come from
    ///
    /// # Returns
    ///
    /// A new reader, or an error if the configuration is invalid or the
    /// log format does not compile.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ngxrow::{Config, Reader, SourceMetadata};
    /// use std::io::Cursor;
    ///
    /// let log_data = r#"127.0.0.1 [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200"#;
    /// let config = Config::default().with_log_format(r#"$remote_addr [$time_local] "$request" $status"#);
    ///
    /// let reader = Reader::new(Cursor::new(log_data), &config, SourceMetadata::default())?;
    /// for row in reader {
    ///     assert_eq!(row?.path(), Some("/api/foo"));
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(input: R, config: &Config, source: SourceMetadata) -> Result<Self> {
        Ok(Self::with_processor(input, Processor::new(config)?, source))
    }

    /// Create a reader with a pre-built processor.
    ///
    /// Use this to share one compiled format across several inputs.
    ///
    /// # Arguments
    ///
    /// * `input` - The input source (file, stdin, etc.)
    /// * `processor` - The processor that turns each line into a row
    /// * `source` - Metadata about where the lines come from
    pub fn with_processor(input: R, processor: Processor, source: SourceMetadata) -> Self {
        Self {
            reader: BufReader::new(input),
            processor,
            source,
            line_number: 0,
            done: false,
        }
    }

    /// Get a reference to the processor used for every line.
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Get the source metadata attached to every row.
    pub fn source(&self) -> &SourceMetadata {
        &self.source
    }

    /// Read and process the next non-empty line.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD, so an
    /// undecodable line is handled like any other line.
    ///
    /// # Returns
    ///
    /// * `Some(Ok(row))` - The line was enriched into a row
    /// * `Some(Err(e))` - The line failed, or the input could not be read
    /// * `None` - End of input, or a read error was already returned
    pub fn read(&mut self) -> Option<std::result::Result<Row, LineError>> {
        if self.done {
            return None;
        }

        let mut buf = Vec::new();
        loop {
            buf.clear();
            self.line_number += 1;
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if let Cow::Owned(_) = line {
                        debug!(line_number = self.line_number, "replaced invalid UTF-8");
                    }
                    let trimmed = line.trim_end_matches(['\n', '\r']);
                    if trimmed.trim().is_empty() {
                        continue;
                    }
                    return Some(
                        self.processor
                            .process(trimmed, &self.source)
                            .map_err(|e| LineError::new(self.line_number, trimmed, e)),
                    );
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(LineError::new(self.line_number, "", Error::from(e))));
                }
            }
        }
    }

    /// Collect all rows and all line failures.
    ///
    /// Use this for smaller inputs; [`process_rows`](Self::process_rows)
    /// streams instead.
    ///
    /// # Returns
    ///
    /// The rows in input order, and one [`LineError`] per line that failed.
    pub fn collect_all(self) -> (Vec<Row>, Vec<LineError>) {
        let mut rows = Vec::new();
        let mut errors = Vec::new();
        for result in self {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => errors.push(e),
            }
        }
        (rows, errors)
    }

    /// Hand each row to a closure, skipping lines that fail.
    ///
    /// Skipped lines are logged at `warn`. A read error, or an error from
    /// the closure, stops processing.
    ///
    /// # Arguments
    ///
    /// * `f` - Called once per row, in input order
    ///
    /// # Returns
    ///
    /// Row and skip counts, or the first read or closure error.
    pub fn process_rows<F, E>(&mut self, mut f: F) -> std::result::Result<ReadStats, E>
    where
        F: FnMut(Row) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        let mut stats = ReadStats::default();
        while let Some(result) = self.read() {
            match result {
                Ok(row) => {
                    f(row)?;
                    stats.rows += 1;
                }
                Err(e) if e.kind() == ErrorKind::Io => return Err(e.error.into()),
                Err(e) => {
                    warn!(line_number = e.line_number, kind = ?e.kind(), error = %e.error, "skipping line");
                    stats.skipped += 1;
                }
            }
        }
        Ok(stats)
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = std::result::Result<Row, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    const FORMAT: &str = r#"$remote_addr [$time_local] "$request" $status $body_bytes_sent"#;

    fn reader(data: &'static str) -> Reader<Cursor<&'static str>> {
        let config = Config::default().with_log_format(FORMAT);
        Reader::new(Cursor::new(data), &config, SourceMetadata::new("test", "test.log")).unwrap()
    }

    #[test]
    fn test_reader_basic() {
        let mut reader = reader(r#"127.0.0.1 [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200 612"#);

        let row = reader.read().unwrap().unwrap();
        assert_eq!(row.field("remote_addr"), Some("127.0.0.1"));
        assert_eq!(row.status, Some(200));
        assert_eq!(row.common.tp_source_name, "test");

        // Should be EOF now
        assert!(reader.read().is_none());
    }

    #[test]
    fn test_failures_do_not_stop_the_stream() {
        let data = "127.0.0.1 [08/Nov/2013:13:39:18 +0000] \"GET /a HTTP/1.1\" 200 612\r\n\
                    \n\
                    garbage\n\
                    10.0.0.1 [08/Nov/2013:13:39:18 +0000] \"GET /b HTTP/1.1\" oops 0\n\
                    192.168.1.1 [08/Nov/2013:13:40:18 +0000] \"POST /c HTTP/1.1\" 404 0\n";

        let (rows, errors) = reader(data).collect_all();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].path(), Some("/a"));
        assert_eq!(rows[1].path(), Some("/c"));

        assert_eq!(errors.len(), 2);
        assert_eq!((errors[0].line_number, errors[0].kind()), (3, ErrorKind::NoMatch));
        assert_eq!(errors[0].line, "garbage");
        assert_eq!((errors[1].line_number, errors[1].kind()), (4, ErrorKind::RowValidation));
    }

    #[test]
    fn test_invalid_utf8_does_not_stop_the_stream() {
        let mut data = b"127.0.0.1 [08/Nov/2013:13:39:18 +0000] \"GET /a HTTP/1.1\" 200 1\n".to_vec();
        data.extend_from_slice(b"10.0.0.1 [08/Nov/2013:13:39:19 +0000] \"GET /caf\xff HTTP/1.1\" 200 2\n");
        data.extend_from_slice(b"10.0.0.2 [08/Nov/2013:13:39:20 +0000] \"GET /c HTTP/1.1\" 200 3\n");

        let config = Config::default().with_log_format(FORMAT);
        let reader = Reader::new(Cursor::new(data), &config, SourceMetadata::default()).unwrap();
        let (rows, errors) = reader.collect_all();

        assert!(errors.is_empty(), "{errors:?}");
        let paths: Vec<_> = rows.iter().map(|r| r.path()).collect();
        assert_eq!(paths, vec![Some("/a"), Some("/caf\u{fffd}"), Some("/c")]);
    }

    #[test]
    fn test_process_rows_counts() {
        let data = "127.0.0.1 [08/Nov/2013:13:39:18 +0000] \"GET / HTTP/1.1\" 200 1\nnope\n";
        let mut paths = Vec::new();
        let stats = reader(data)
            .process_rows(|row| -> Result<()> {
                paths.extend(row.path().map(str::to_string));
                Ok(())
            })
            .unwrap();
        assert_eq!(stats, ReadStats { rows: 1, skipped: 1 });
        assert_eq!(paths, vec!["/"]);
    }

    struct FailingRead;

    impl Read for FailingRead {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
        }
    }

    #[test]
    fn test_read_error_is_reported_once() {
        let processor = Processor::new(&Config::default()).unwrap();
        let mut reader = Reader::with_processor(FailingRead, processor, SourceMetadata::default());

        let err = reader.read().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(reader.read().is_none());
    }
}
