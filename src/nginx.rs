//! Nginx configuration parsing functionality.
//!
//! Only as much of the configuration grammar is understood as is needed to
//! find `log_format` directives: quoted and bare parameters, comments and
//! statement terminators.

use crate::config::{Config, SourceMetadata};
use crate::error::{Error, Result};
use crate::format::LogFormat;
use crate::processor::Processor;
use crate::reader::Reader;
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfigToken {
    Word(String),
    Quoted(String),
    Semicolon,
    OpenBrace,
    CloseBrace,
}

/// Split configuration text into tokens.
fn tokenize(text: &str) -> Result<Vec<ConfigToken>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            ';' | '{' | '}' => {
                chars.next();
                tokens.push(match ch {
                    ';' => ConfigToken::Semicolon,
                    '{' => ConfigToken::OpenBrace,
                    _ => ConfigToken::CloseBrace,
                });
            }
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some(escaped @ ('\'' | '"' | '\\')) => value.push(escaped),
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some('r') => value.push('\r'),
                            Some(other) => {
                                value.push('\\');
                                value.push(other);
                            }
                            None => break,
                        },
                        c if c == ch => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(Error::nginx_config_error(format!(
                        "unterminated {ch}-quoted string"
                    )));
                }
                tokens.push(ConfigToken::Quoted(value));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, ';' | '{' | '}' | '\'' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(ConfigToken::Word(word));
            }
        }
    }

    Ok(tokens)
}

/// Find the layout of `log_format <name> ...;` among the tokens.
fn find_log_format(tokens: &[ConfigToken], name: &str) -> Result<Option<String>> {
    let mut statement_start = true;
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        let is_directive =
            statement_start && matches!(token, ConfigToken::Word(w) if w == "log_format");
        statement_start = !matches!(token, ConfigToken::Word(_) | ConfigToken::Quoted(_));
        if !is_directive {
            continue;
        }

        let declared = match iter.next() {
            Some(ConfigToken::Word(n)) | Some(ConfigToken::Quoted(n)) => n,
            _ => return Err(Error::nginx_config_error("log_format without a name")),
        };

        let mut layout = String::new();
        let mut terminated = false;
        for param in iter.by_ref() {
            match param {
                ConfigToken::Semicolon => {
                    terminated = true;
                    break;
                }
                ConfigToken::Word(w) if w.starts_with("escape=") && layout.is_empty() => {}
                ConfigToken::Word(s) | ConfigToken::Quoted(s) => layout.push_str(s),
                _ => {
                    return Err(Error::nginx_config_error(format!(
                        "unexpected brace in log_format '{declared}'"
                    )))
                }
            }
        }
        if !terminated {
            return Err(Error::nginx_config_error(format!(
                "log_format '{declared}' is not terminated by ';'"
            )));
        }
        statement_start = true;

        if declared == name {
            return Ok(Some(layout));
        }
    }

    Ok(None)
}

/// Extract a named log format from nginx configuration.
///
/// The quoted parts of the directive are concatenated verbatim, as nginx
/// does, and an `escape=` parameter is ignored. The built-in `combined`
/// format is returned when the configuration does not redefine it.
///
/// # Arguments
///
/// * `nginx_config` - The nginx configuration text
/// * `format_name` - The name given to `log_format`
///
/// # Returns
///
/// The named format, or [`Error::NginxFormatNotFound`] if it is neither
/// declared nor `combined`. Read failures are returned as [`Error::Io`]
/// and malformed configuration as [`Error::NginxConfigError`].
///
/// # Example
///
/// ```rust
/// use ngxrow::nginx::extract_log_format;
/// use ngxrow::Format;
/// use std::io::Cursor;
///
/// let nginx_config = r#"
/// http {
///     log_format main escape=json '$remote_addr - $remote_user [$time_local] "$request" '
///                     '$status $body_bytes_sent';
/// }
/// "#;
///
/// let format = extract_log_format(Cursor::new(nginx_config), "main")?;
/// assert_eq!(format.name(), Some("main"));
/// assert_eq!(
///     format.layout(),
///     r#"$remote_addr - $remote_user [$time_local] "$request" $status $body_bytes_sent"#
/// );
/// # Ok::<(), ngxrow::Error>(())
/// ```
pub fn extract_log_format<R: Read>(mut nginx_config: R, format_name: &str) -> Result<LogFormat> {
    let mut text = String::new();
    nginx_config.read_to_string(&mut text)?;

    match find_log_format(&tokenize(&text)?, format_name)? {
        Some(layout) if layout.trim().is_empty() => Err(Error::nginx_config_error(format!(
            "log_format '{format_name}' has an empty layout"
        ))),
        Some(layout) => Ok(LogFormat::named(format_name, layout)),
        None if format_name == "combined" => Ok(LogFormat::combined()),
        None => Err(Error::nginx_format_not_found(format_name)),
    }
}

/// A [`Reader`] whose format comes from an nginx configuration file.
///
/// # Example
///
/// ```rust
/// use ngxrow::{Config, NginxReader, SourceMetadata};
/// use std::io::Cursor;
///
/// let nginx_config = r#"
/// log_format main '$remote_addr - $remote_user [$time_local] "$request" '
///                 '$status $body_bytes_sent "$http_referer" '
///                 '"$http_user_agent" "$http_x_forwarded_for"';
/// "#;
/// let log_data = r#"127.0.0.1 - - [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200 612 "-" "curl/7.64.1" "-""#;
///
/// // $http_x_forwarded_for is not a supported token.
/// let result = NginxReader::new(
///     Cursor::new(log_data),
///     Cursor::new(nginx_config),
///     "main",
///     &Config::default(),
///     SourceMetadata::default(),
/// );
/// assert!(result.is_err());
/// ```
#[derive(Debug)]
pub struct NginxReader<R: Read> {
    reader: Reader<R>,
}

impl<R: Read> NginxReader<R> {
    /// Create a reader for `log_input` using the format `format_name`
    /// declared in `nginx_config`. Everything but the log format is taken
    /// from `config`.
    ///
    /// # Arguments
    ///
    /// * `log_input` - The access log to read
    /// * `nginx_config` - The nginx configuration declaring the format
    /// * `format_name` - The name given to `log_format`
    /// * `config` - Timezone and enrichment options
    /// * `source` - Metadata about where the lines come from
    ///
    /// # Returns
    ///
    /// A new reader, or an error if the format is missing or does not
    /// compile.
    pub fn new<C: Read>(
        log_input: R,
        nginx_config: C,
        format_name: &str,
        config: &Config,
        source: SourceMetadata,
    ) -> Result<Self> {
        let format = extract_log_format(nginx_config, format_name)?;
        let processor = Processor::with_format(&format, config)?;

        Ok(Self {
            reader: Reader::with_processor(log_input, processor, source),
        })
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Reader<R> {
        &self.reader
    }

    /// Get a mutable reference to the underlying reader.
    pub fn reader_mut(&mut self) -> &mut Reader<R> {
        &mut self.reader
    }

    /// Consume this reader, returning the underlying [`Reader`].
    pub fn into_inner(self) -> Reader<R> {
        self.reader
    }
}

impl<R: Read> Iterator for NginxReader<R> {
    type Item = <Reader<R> as Iterator>::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Format, COMBINED};
    use std::io::Cursor;

    fn extract(config: &str, name: &str) -> Result<LogFormat> {
        extract_log_format(Cursor::new(config), name)
    }

    #[test]
    fn test_extract_simple_format() {
        let config = r#"
        log_format main '$remote_addr - $remote_user [$time_local] "$request" $status';
        "#;

        let format = extract(config, "main").unwrap();
        assert_eq!(
            format.layout(),
            r#"$remote_addr - $remote_user [$time_local] "$request" $status"#
        );
    }

    #[test]
    fn test_parts_are_concatenated_verbatim() {
        let config = r#"
        log_format upstream '$remote_addr|'
                            '$upstream_addr|'   # no separator added
                            "$upstream_response_time";
        "#;

        let format = extract(config, "upstream").unwrap();
        assert_eq!(format.layout(), "$remote_addr|$upstream_addr|$upstream_response_time");
    }

    #[test]
    fn test_selects_named_format_among_many() {
        let config = r#"
        # log_format main '$status';
        http {
            log_format short '$remote_addr $status';
            log_format main '$remote_addr [$time_local] \'$request\'';
            access_log /var/log/nginx/access.log main;
        }
        "#;

        assert_eq!(extract(config, "short").unwrap().layout(), "$remote_addr $status");
        assert_eq!(
            extract(config, "main").unwrap().layout(),
            "$remote_addr [$time_local] '$request'"
        );
    }

    #[test]
    fn test_combined_fallback() {
        let format = extract("events {}", "combined").unwrap();
        assert_eq!(format.layout(), COMBINED);
    }

    #[test]
    fn test_format_not_found() {
        let config = r#"
        log_format main '$remote_addr - $remote_user [$time_local]';
        "#;

        assert!(matches!(
            extract(config, "nonexistent").unwrap_err(),
            Error::NginxFormatNotFound { .. }
        ));
    }

    #[test]
    fn test_malformed_config() {
        assert!(matches!(
            extract("log_format main '$status", "main").unwrap_err(),
            Error::NginxConfigError { .. }
        ));
        assert!(matches!(
            extract("log_format main '$status'", "main").unwrap_err(),
            Error::NginxConfigError { .. }
        ));
    }

    #[test]
    fn test_nginx_reader() {
        let config = r#"
        log_format main '$remote_addr - $remote_user [$time_local] "$request" $status';
        "#;
        let log_data = r#"127.0.0.1 - - [08/Nov/2013:13:39:18 +0000] "GET /api/foo HTTP/1.1" 200"#;

        let mut reader = NginxReader::new(
            Cursor::new(log_data),
            Cursor::new(config),
            "main",
            &Config::default(),
            SourceMetadata::new("main", "access.log"),
        )
        .unwrap();

        let row = reader.next().unwrap().unwrap();
        assert_eq!(row.field("remote_addr"), Some("127.0.0.1"));
        assert_eq!(row.status, Some(200));
        assert!(reader.next().is_none());
    }
}
